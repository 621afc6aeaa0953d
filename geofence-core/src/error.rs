//! Error types for the geofence engine

use thiserror::Error;

/// Errors returned by engine operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeofenceError {
    /// Caller supplied input the engine refuses to evaluate
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Engine configuration out of range
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl GeofenceError {
    pub(crate) fn invalid_argument(msg: impl Into<String>) -> Self {
        GeofenceError::InvalidArgument(msg.into())
    }

    pub(crate) fn invalid_config(msg: impl Into<String>) -> Self {
        GeofenceError::InvalidConfig(msg.into())
    }
}

/// Error a listener may return from a notification.
///
/// Listener errors never reach the caller of `evaluate`; they are logged
/// and the remaining listeners still run.
pub type ListenerError = Box<dyn std::error::Error + Send + Sync>;
