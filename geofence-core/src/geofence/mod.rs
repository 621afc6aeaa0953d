//! Geofence Membership Detection
//!
//! This module tracks whether subjects are inside or outside circular
//! geofences and raises discrete entry/exit events when that changes.
//!
//! # Features
//!
//! - Circular geofences (center + radius, great-circle distance)
//! - Per (subject, geofence) membership state, created lazily
//! - Entry/exit events fire exactly once per transition
//! - Push-style listeners alongside the returned event list
//! - Optional hysteresis band against boundary flicker
//! - Sharded, thread-safe engine for multi-subject hosts
//!
//! # Example
//!
//! ```rust
//! use geofence_core::{GeofenceEngine, GeofenceDefinition, GeographicPoint, LocationFix};
//!
//! let mut engine = GeofenceEngine::new();
//! let _sub = engine.subscribe(|event: &geofence_core::TransitionEvent| {
//!     println!("{} {:?} {}", event.subject_id, event.event_kind, event.geofence_name);
//!     Ok(())
//! });
//!
//! let school = GeofenceDefinition::new("school", "School", GeographicPoint::new(51.5, -0.1), 250.0);
//! let fix = LocationFix::new(51.5005, -0.1, 10.0, 1_700_000_000_000);
//! let events = engine.evaluate("bob", &fix, &[school]).unwrap();
//! assert_eq!(events.len(), 1);
//! ```
//!
//! Membership state belongs to the engines and is only changed by
//! evaluation; the state table is not reachable from outside the crate:
//!
//! ```compile_fail
//! use geofence_core::geofence::MembershipTable;
//! ```

mod engine;
mod listener;
mod shared;
mod state;
mod types;

pub use engine::{EngineConfig, GeofenceEngine};
pub use listener::{ListenerId, Subscription, TransitionListener};
pub use shared::{SharedGeofenceEngine, DEFAULT_SHARD_COUNT};
pub use types::*;
