//! API error type

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use geofence_core::GeofenceError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Geofence(#[from] GeofenceError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Geofence(GeofenceError::InvalidArgument(_)) => StatusCode::BAD_REQUEST,
            ApiError::Geofence(GeofenceError::InvalidConfig(_)) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        log::debug!("Request failed ({}): {}", status, self);
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}
