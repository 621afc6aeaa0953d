//! Geofence Detection Engine
//!
//! Two-state machine per (subject, geofence) pair:
//!
//! | Prior   | Now inside | Event | New state |
//! |---------|------------|-------|-----------|
//! | Outside | no         | -     | Outside   |
//! | Outside | yes        | Entry | Inside    |
//! | Inside  | yes        | -     | Inside    |
//! | Inside  | no         | Exit  | Outside   |
//!
//! A pair with no recorded state is Outside, so the first fix inside a
//! geofence always fires an Entry.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::{GeofenceError, ListenerError};

use super::listener::{ListenerRegistry, Subscription, TransitionListener};
use super::state::MembershipTable;
use super::types::{EventKind, GeofenceDefinition, LocationFix, MembershipState, TransitionEvent};

/// Engine settings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineConfig {
    /// Extra meters beyond the radius a subject that is already inside may
    /// drift before an Exit fires. Entry always uses the plain radius.
    pub hysteresis_meters: f64,

    /// Reject empty subject IDs and non-finite fix coordinates
    pub validate_input: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            hysteresis_meters: 0.0,
            validate_input: true,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), GeofenceError> {
        if !self.hysteresis_meters.is_finite() || self.hysteresis_meters < 0.0 {
            return Err(GeofenceError::invalid_config(format!(
                "hysteresis must be a finite, non-negative distance (got {})",
                self.hysteresis_meters
            )));
        }
        Ok(())
    }
}

/// Single-owner geofence engine.
///
/// Holds the membership table for all subjects it has seen. Construct one
/// per tracking session; see [`super::SharedGeofenceEngine`] for use from
/// several threads.
pub struct GeofenceEngine {
    config: EngineConfig,
    table: MembershipTable,
    listeners: ListenerRegistry,
}

impl GeofenceEngine {
    /// Engine with default settings
    pub fn new() -> Self {
        GeofenceEngine {
            config: EngineConfig::default(),
            table: MembershipTable::new(),
            listeners: ListenerRegistry::new(),
        }
    }

    pub fn with_config(config: EngineConfig) -> Result<Self, GeofenceError> {
        config.validate()?;
        Ok(GeofenceEngine {
            config,
            ..GeofenceEngine::new()
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Evaluate one fix for a subject against a set of geofences.
    ///
    /// Returns one event per active geofence whose membership changed, in
    /// the order the geofences were given. Each event is also delivered to
    /// every subscribed listener before this returns.
    pub fn evaluate(
        &mut self,
        subject_id: &str,
        fix: &LocationFix,
        geofences: &[GeofenceDefinition],
    ) -> Result<Vec<TransitionEvent>, GeofenceError> {
        let events = evaluate_fix(&mut self.table, &self.config, subject_id, fix, geofences)?;
        self.listeners.dispatch(&events);
        Ok(events)
    }

    /// Register a closure listener
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&TransitionEvent) -> Result<(), ListenerError> + Send + Sync + 'static,
    {
        self.listeners.add(Arc::new(listener))
    }

    /// Register a shared listener object
    pub fn subscribe_listener(&self, listener: Arc<dyn TransitionListener>) -> Subscription {
        self.listeners.add(listener)
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Copy of the subject's membership state, keyed by geofence ID
    pub fn get_state(&self, subject_id: &str) -> BTreeMap<String, MembershipState> {
        self.table.snapshot(subject_id)
    }

    pub fn clear_subject(&mut self, subject_id: &str) {
        if self.table.clear_subject(subject_id) {
            log::debug!("{}: cleared geofence state", subject_id);
        }
    }

    pub fn clear_all(&mut self) {
        self.table.clear_all();
    }

    /// Subjects with recorded state, sorted
    pub fn subjects(&self) -> Vec<String> {
        let mut subjects: Vec<String> = self.table.subjects().map(str::to_string).collect();
        subjects.sort();
        subjects
    }
}

impl Default for GeofenceEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn validate_input(subject_id: &str, fix: &LocationFix) -> Result<(), GeofenceError> {
    if subject_id.is_empty() {
        return Err(GeofenceError::invalid_argument("subject id must not be empty"));
    }
    if !fix.position().is_finite() {
        return Err(GeofenceError::invalid_argument(format!(
            "fix coordinates must be finite (got {}, {})",
            fix.latitude, fix.longitude
        )));
    }
    Ok(())
}

/// Run the membership state machine for one fix.
///
/// Validation happens before any state is touched. Every active geofence
/// has its state overwritten, whether or not an event fires. Inactive
/// geofences are neither read nor written.
pub(crate) fn evaluate_fix(
    table: &mut MembershipTable,
    config: &EngineConfig,
    subject_id: &str,
    fix: &LocationFix,
    geofences: &[GeofenceDefinition],
) -> Result<Vec<TransitionEvent>, GeofenceError> {
    if config.validate_input {
        validate_input(subject_id, fix)?;
    }

    let position = fix.position();
    let mut events = Vec::new();

    for fence in geofences.iter().filter(|f| f.active) {
        let distance = position.distance_to(&fence.center);
        let was_inside = table
            .get(subject_id, &fence.id)
            .map(|s| s.is_inside)
            .unwrap_or(false);

        let limit = if was_inside {
            fence.radius_meters + config.hysteresis_meters
        } else {
            fence.radius_meters
        };
        let is_inside = distance <= limit;

        let kind = match (was_inside, is_inside) {
            (false, true) => Some(EventKind::Entry),
            (true, false) => Some(EventKind::Exit),
            _ => None,
        };

        table.record(subject_id, &fence.id, is_inside, kind);

        if let Some(event_kind) = kind {
            log::debug!(
                "{}: {} '{}' ({}) at {:.1}m, radius {:.1}m",
                subject_id,
                event_kind,
                fence.name,
                fence.id,
                distance,
                fence.radius_meters
            );
            events.push(TransitionEvent {
                subject_id: subject_id.to_string(),
                geofence_id: fence.id.clone(),
                geofence_name: fence.name.clone(),
                event_kind,
                distance_meters: distance,
                accuracy_meters: fix.accuracy_meters,
                timestamp_millis: fix.timestamp_millis,
            });
        }
    }

    log::trace!(
        "{}: evaluated {} geofences, {} transitions",
        subject_id,
        geofences.len(),
        events.len()
    );

    Ok(events)
}
