//! Geofence Server
//!
//! Hosts a shared [`geofence_core::SharedGeofenceEngine`] behind a REST API
//! and streams transition events to WebSocket clients.

pub mod config;
pub mod error;
pub mod events;
pub mod web;

pub use config::{Cli, ServerConfig};
pub use error::ApiError;
pub use events::EventBroadcaster;
pub use web::{create_router, AppState};
