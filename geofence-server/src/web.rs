//! HTTP API
//!
//! | Method | Path                             | Purpose                           |
//! |--------|----------------------------------|-----------------------------------|
//! | GET    | /health                          | Liveness                          |
//! | GET    | /v1/subjects                     | Subjects with recorded state      |
//! | DELETE | /v1/subjects                     | Forget all subjects               |
//! | POST   | /v1/subjects/{id}/evaluate       | Evaluate a fix, returns events    |
//! | GET    | /v1/subjects/{id}/state          | Membership state per geofence     |
//! | DELETE | /v1/subjects/{id}                | Forget one subject                |
//! | GET    | /v1/events                       | WebSocket stream of events        |

use std::collections::BTreeMap;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{delete, get, post},
    Router,
};
use futures_util::{SinkExt, StreamExt};
use geofence_core::{
    GeofenceDefinition, GeofenceError, LocationFix, MembershipState, SharedGeofenceEngine,
    TransitionEvent,
};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio_graceful_shutdown::SubsystemHandle;

use crate::config::ServerConfig;
use crate::error::ApiError;
use crate::events::EventBroadcaster;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<SharedGeofenceEngine>,
    pub events: EventBroadcaster,
}

impl AppState {
    pub fn new(config: &ServerConfig) -> Result<Self, GeofenceError> {
        config.validate()?;
        let engine = Arc::new(SharedGeofenceEngine::new(config.shards, config.engine)?);
        let events = EventBroadcaster::new(config.event_buffer);
        events.attach(&engine);

        Ok(AppState { engine, events })
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateRequest {
    pub fix: LocationFix,
    #[serde(default)]
    pub geofences: Vec<GeofenceDefinition>,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/v1/subjects", get(list_subjects).delete(clear_all))
        .route("/v1/subjects/{subject_id}", delete(clear_subject))
        .route("/v1/subjects/{subject_id}/evaluate", post(evaluate))
        .route("/v1/subjects/{subject_id}/state", get(get_state))
        .route("/v1/events", get(events_handler))
        .with_state(state)
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn list_subjects(State(state): State<AppState>) -> Json<Vec<String>> {
    Json(state.engine.subjects())
}

async fn clear_all(State(state): State<AppState>) -> StatusCode {
    state.engine.clear_all();
    log::info!("Cleared all subjects");
    StatusCode::NO_CONTENT
}

async fn clear_subject(
    State(state): State<AppState>,
    Path(subject_id): Path<String>,
) -> StatusCode {
    state.engine.clear_subject(&subject_id);
    log::info!("{}: cleared", subject_id);
    StatusCode::NO_CONTENT
}

async fn evaluate(
    State(state): State<AppState>,
    Path(subject_id): Path<String>,
    Json(request): Json<EvaluateRequest>,
) -> Result<Json<Vec<TransitionEvent>>, ApiError> {
    let events = state
        .engine
        .evaluate(&subject_id, &request.fix, &request.geofences)?;

    for event in &events {
        log::info!(
            "{}: {} '{}' ({:.0}m from center, accuracy {:.0}m)",
            event.subject_id,
            event.event_kind,
            event.geofence_name,
            event.distance_meters,
            event.accuracy_meters
        );
    }

    Ok(Json(events))
}

async fn get_state(
    State(state): State<AppState>,
    Path(subject_id): Path<String>,
) -> Json<BTreeMap<String, MembershipState>> {
    Json(state.engine.get_state(&subject_id))
}

async fn events_handler(State(state): State<AppState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    let rx = state.events.subscribe();
    ws.on_upgrade(move |socket| stream_events(socket, rx))
}

/// Next event for a stream client.
///
/// Events dropped while the client lagged behind the channel are skipped;
/// streaming continues with the oldest event still buffered. `None` once
/// the channel is closed.
pub(crate) async fn next_event(
    rx: &mut broadcast::Receiver<TransitionEvent>,
) -> Option<TransitionEvent> {
    loop {
        match rx.recv().await {
            Ok(event) => return Some(event),
            Err(RecvError::Lagged(skipped)) => {
                log::warn!("Event stream client lagging, skipped {} events", skipped);
            }
            Err(RecvError::Closed) => return None,
        }
    }
}

/// Forward broadcast events to one WebSocket client until either side closes
async fn stream_events(socket: WebSocket, mut rx: broadcast::Receiver<TransitionEvent>) {
    let (mut sender, mut receiver) = socket.split();
    log::debug!("Event stream client connected");

    loop {
        tokio::select! {
            event = next_event(&mut rx) => match event {
                Some(event) => {
                    let json = match serde_json::to_string(&event) {
                        Ok(json) => json,
                        Err(e) => {
                            log::warn!("Cannot serialize event: {}", e);
                            continue;
                        }
                    };
                    if sender.send(Message::Text(json.into())).await.is_err() {
                        break;
                    }
                }
                None => break,
            },

            msg = receiver.next() => match msg {
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                Some(Ok(_)) => {}
            },
        }
    }

    log::debug!("Event stream client disconnected");
}

/// Run the webserver until shutdown is requested
pub async fn run(subsys: SubsystemHandle, config: ServerConfig) -> anyhow::Result<()> {
    let state = AppState::new(&config)?;
    let app = create_router(state);

    let addr = SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, config.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    log::info!("Starting HTTP web server on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { subsys.on_shutdown_requested().await })
        .await?;

    log::info!("HTTP web server stopped");
    Ok(())
}
