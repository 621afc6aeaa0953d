//! Geofence data model
//!
//! Definitions and fixes are owned by callers and only borrowed by the
//! engine. Membership state is owned by the engine. Transition events are
//! handed out by value.

use serde::{Deserialize, Serialize};

use crate::geo::GeographicPoint;

/// A named circular region
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeofenceDefinition {
    /// Unique geofence ID
    pub id: String,

    /// Display name, copied into events
    pub name: String,

    /// Center of the circle
    pub center: GeographicPoint,

    /// Radius in meters (boundary is inclusive)
    pub radius_meters: f64,

    /// Inactive geofences are skipped entirely during evaluation
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl GeofenceDefinition {
    /// Create an active geofence
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        center: GeographicPoint,
        radius_meters: f64,
    ) -> Self {
        GeofenceDefinition {
            id: id.into(),
            name: name.into(),
            center,
            radius_meters,
            active: true,
        }
    }

    /// Same geofence with the given active flag
    pub fn with_active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }
}

/// A single location reading for a subject
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationFix {
    pub latitude: f64,
    pub longitude: f64,

    /// Reported horizontal accuracy in meters
    #[serde(default)]
    pub accuracy_meters: f64,

    /// Milliseconds since epoch
    #[serde(default)]
    pub timestamp_millis: i64,
}

impl LocationFix {
    pub fn new(latitude: f64, longitude: f64, accuracy_meters: f64, timestamp_millis: i64) -> Self {
        LocationFix {
            latitude,
            longitude,
            accuracy_meters,
            timestamp_millis,
        }
    }

    /// Fix at `point` with zero accuracy and timestamp
    pub fn at(point: GeographicPoint) -> Self {
        LocationFix::new(point.latitude, point.longitude, 0.0, 0)
    }

    pub fn position(&self) -> GeographicPoint {
        GeographicPoint::new(self.latitude, self.longitude)
    }
}

/// Direction of a membership change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Entry,
    Exit,
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventKind::Entry => write!(f, "entry"),
            EventKind::Exit => write!(f, "exit"),
        }
    }
}

/// Recorded membership for one (subject, geofence) pair
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MembershipState {
    pub is_inside: bool,

    /// Kind of the last event fired for this pair, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_event_kind: Option<EventKind>,
}

/// A membership change produced by one evaluation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionEvent {
    pub subject_id: String,
    pub geofence_id: String,
    pub geofence_name: String,
    pub event_kind: EventKind,

    /// Subject's distance from the geofence center at evaluation time
    pub distance_meters: f64,

    /// Copied from the input fix
    pub accuracy_meters: f64,

    /// Copied from the input fix
    pub timestamp_millis: i64,
}
