//! Geofence Core
//!
//! Platform-independent geofence membership detection. Given a stream of
//! location fixes for a subject and the current set of geofence
//! definitions, the engine tracks inside/outside state per
//! (subject, geofence) pair and raises an entry or exit event exactly once
//! per transition.
//!
//! The crate has no I/O and no async runtime. Hosts (the native server,
//! tests, embedded callers) supply fixes and geofences and consume the
//! resulting [`TransitionEvent`]s, either from the value returned by
//! [`GeofenceEngine::evaluate`] or through a subscribed listener.
//!
//! ```rust
//! use geofence_core::{GeofenceEngine, GeofenceDefinition, GeographicPoint, LocationFix, EventKind};
//!
//! let mut engine = GeofenceEngine::new();
//! let home = GeofenceDefinition::new("home", "Home", GeographicPoint::new(40.0, -75.0), 100.0);
//!
//! let fix = LocationFix::new(40.0, -75.0, 5.0, 1_000);
//! let events = engine.evaluate("alice", &fix, &[home.clone()]).unwrap();
//! assert_eq!(events.len(), 1);
//! assert_eq!(events[0].event_kind, EventKind::Entry);
//!
//! // Same position again: nothing changes
//! assert!(engine.evaluate("alice", &fix, &[home]).unwrap().is_empty());
//! ```

pub mod error;
pub mod geo;
pub mod geofence;

pub use error::{GeofenceError, ListenerError};
pub use geo::{haversine_distance, GeographicPoint, EARTH_RADIUS_METERS};
pub use geofence::*;
