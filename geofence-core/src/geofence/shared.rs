//! Thread-safe Geofence Engine
//!
//! Membership state is split into shards by subject ID, each behind its own
//! mutex. All evaluations for one subject go through the same shard, so
//! updates to a (subject, geofence) pair are serialized while different
//! subjects can be evaluated in parallel.
//!
//! Each shard also has a dispatch lock, held from before the state update
//! until listeners have seen the events. Listeners therefore receive a
//! subject's events in the same order the state was written. A listener may
//! read state (`get_state`, `subjects`) but must not call `evaluate` for a
//! subject on the same shard; that would wait on the dispatch lock it is
//! running under.

use std::collections::hash_map::DefaultHasher;
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::{GeofenceError, ListenerError};

use super::engine::{evaluate_fix, EngineConfig};
use super::listener::{ListenerRegistry, Subscription, TransitionListener};
use super::state::MembershipTable;
use super::types::{GeofenceDefinition, LocationFix, MembershipState, TransitionEvent};

pub const DEFAULT_SHARD_COUNT: usize = 16;

struct Shard {
    state: Mutex<MembershipTable>,
    dispatch: Mutex<()>,
}

impl Shard {
    fn new() -> Self {
        Shard {
            state: Mutex::new(MembershipTable::new()),
            dispatch: Mutex::new(()),
        }
    }
}

/// Geofence engine that can be shared between threads (`Arc<SharedGeofenceEngine>`)
pub struct SharedGeofenceEngine {
    config: EngineConfig,
    shards: Vec<Shard>,
    listeners: ListenerRegistry,
}

impl SharedGeofenceEngine {
    pub fn new(shard_count: usize, config: EngineConfig) -> Result<Self, GeofenceError> {
        config.validate()?;
        if shard_count == 0 {
            return Err(GeofenceError::invalid_config("shard count must be at least 1"));
        }

        Ok(SharedGeofenceEngine {
            config,
            shards: (0..shard_count).map(|_| Shard::new()).collect(),
            listeners: ListenerRegistry::new(),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    fn shard_index(&self, subject_id: &str) -> usize {
        let mut hasher = DefaultHasher::new();
        subject_id.hash(&mut hasher);
        (hasher.finish() % self.shards.len() as u64) as usize
    }

    // Listener panics are caught before they reach a held lock, and the
    // state machine leaves the table consistent between records.
    fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
        mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn shard(&self, subject_id: &str) -> MutexGuard<'_, MembershipTable> {
        Self::lock(&self.shards[self.shard_index(subject_id)].state)
    }

    /// Evaluate one fix for a subject.
    ///
    /// Events reach listeners in state-write order for the shard. The state
    /// lock is released before dispatch, so listeners may read state.
    pub fn evaluate(
        &self,
        subject_id: &str,
        fix: &LocationFix,
        geofences: &[GeofenceDefinition],
    ) -> Result<Vec<TransitionEvent>, GeofenceError> {
        let shard = &self.shards[self.shard_index(subject_id)];

        // Taken before the state lock so a listener holding it can still
        // read state while the next evaluation waits here.
        let _dispatch = Self::lock(&shard.dispatch);
        let events = {
            let mut table = Self::lock(&shard.state);
            evaluate_fix(&mut table, &self.config, subject_id, fix, geofences)?
        };
        self.listeners.dispatch(&events);
        Ok(events)
    }

    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&TransitionEvent) -> Result<(), ListenerError> + Send + Sync + 'static,
    {
        self.listeners.add(Arc::new(listener))
    }

    pub fn subscribe_listener(&self, listener: Arc<dyn TransitionListener>) -> Subscription {
        self.listeners.add(listener)
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    pub fn get_state(&self, subject_id: &str) -> BTreeMap<String, MembershipState> {
        self.shard(subject_id).snapshot(subject_id)
    }

    pub fn clear_subject(&self, subject_id: &str) {
        if self.shard(subject_id).clear_subject(subject_id) {
            log::debug!("{}: cleared geofence state", subject_id);
        }
    }

    /// Clears shard by shard; evaluations running concurrently on other
    /// shards may record state after their shard was cleared.
    pub fn clear_all(&self) {
        for shard in &self.shards {
            Self::lock(&shard.state).clear_all();
        }
        log::debug!("Cleared geofence state for all subjects");
    }

    pub fn subjects(&self) -> Vec<String> {
        let mut subjects: Vec<String> = self
            .shards
            .iter()
            .flat_map(|shard| {
                Self::lock(&shard.state)
                    .subjects()
                    .map(str::to_string)
                    .collect::<Vec<_>>()
            })
            .collect();
        subjects.sort();
        subjects
    }
}

impl Default for SharedGeofenceEngine {
    fn default() -> Self {
        SharedGeofenceEngine {
            config: EngineConfig::default(),
            shards: (0..DEFAULT_SHARD_COUNT).map(|_| Shard::new()).collect(),
            listeners: ListenerRegistry::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::GeographicPoint;
    use crate::geofence::types::EventKind;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    fn center() -> GeographicPoint {
        GeographicPoint::new(-33.86, 151.21)
    }

    fn fences() -> Vec<GeofenceDefinition> {
        vec![
            GeofenceDefinition::new("harbour", "Harbour", center(), 200.0),
            GeofenceDefinition::new("city", "City", center(), 5_000.0),
        ]
    }

    fn fix_north(meters: f64) -> LocationFix {
        LocationFix::at(center().offset_meters(meters, 0.0))
    }

    #[test]
    fn test_rejects_zero_shards() {
        assert!(matches!(
            SharedGeofenceEngine::new(0, EngineConfig::default()),
            Err(GeofenceError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_same_semantics_as_single_engine() {
        let engine = SharedGeofenceEngine::new(4, EngineConfig::default()).unwrap();
        let fences = fences();

        let events = engine.evaluate("alice", &fix_north(100.0), &fences).unwrap();
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| e.event_kind == EventKind::Entry));

        assert!(engine.evaluate("alice", &fix_north(100.0), &fences).unwrap().is_empty());

        let events = engine.evaluate("alice", &fix_north(1_000.0), &fences).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].geofence_id, "harbour");
        assert_eq!(events[0].event_kind, EventKind::Exit);

        let state = engine.get_state("alice");
        assert!(!state["harbour"].is_inside);
        assert!(state["city"].is_inside);
    }

    #[test]
    fn test_parallel_subjects() {
        let engine = Arc::new(SharedGeofenceEngine::default());
        let entries = Arc::new(AtomicUsize::new(0));
        let exits = Arc::new(AtomicUsize::new(0));

        let (en, ex) = (entries.clone(), exits.clone());
        engine.subscribe(move |e| {
            match e.event_kind {
                EventKind::Entry => en.fetch_add(1, Ordering::SeqCst),
                EventKind::Exit => ex.fetch_add(1, Ordering::SeqCst),
            };
            Ok(())
        });

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let engine = engine.clone();
                thread::spawn(move || {
                    let subject = format!("subject-{}", i);
                    let fences = fences();
                    for _ in 0..50 {
                        engine.evaluate(&subject, &fix_north(50.0), &fences).unwrap();
                        engine.evaluate(&subject, &fix_north(50.0), &fences).unwrap();
                        engine.evaluate(&subject, &fix_north(800.0), &fences).unwrap();
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        // Each round: harbour enters and exits; city enters once and stays
        assert_eq!(entries.load(Ordering::SeqCst), 8 * 50 + 8);
        assert_eq!(exits.load(Ordering::SeqCst), 8 * 50);
        assert_eq!(engine.subjects().len(), 8);
    }

    #[test]
    fn test_listener_may_call_back_into_engine() {
        let engine = Arc::new(SharedGeofenceEngine::new(1, EngineConfig::default()).unwrap());
        let observed = Arc::new(Mutex::new(Vec::new()));

        let weak = Arc::downgrade(&engine);
        let sink = observed.clone();
        engine.subscribe(move |e| {
            if let Some(engine) = weak.upgrade() {
                let state = engine.get_state(&e.subject_id);
                sink.lock().unwrap().push(state[&e.geofence_id].is_inside);
            }
            Ok(())
        });

        engine.evaluate("alice", &fix_north(10.0), &fences()).unwrap();
        assert_eq!(*observed.lock().unwrap(), vec![true, true]);
    }

    #[test]
    fn test_listener_order_matches_state_order() {
        let engine = Arc::new(SharedGeofenceEngine::new(1, EngineConfig::default()).unwrap());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let (started_tx, started_rx) = mpsc::sync_channel(1);

        let sink = seen.clone();
        engine.subscribe(move |e| {
            if e.event_kind == EventKind::Entry {
                let _ = started_tx.send(());
                thread::sleep(Duration::from_millis(100));
            }
            sink.lock().unwrap().push(e.event_kind);
            Ok(())
        });

        let harbour = vec![GeofenceDefinition::new("harbour", "Harbour", center(), 200.0)];

        let entering = {
            let engine = engine.clone();
            let harbour = harbour.clone();
            thread::spawn(move || {
                engine
                    .evaluate("alice", &LocationFix::at(center()), &harbour)
                    .unwrap()
            })
        };

        // Entry listener is now running; evaluate the exit meanwhile
        started_rx.recv().unwrap();
        let leaving = engine.evaluate("alice", &fix_north(500.0), &harbour).unwrap();

        let entered = entering.join().unwrap();
        assert_eq!(entered[0].event_kind, EventKind::Entry);
        assert_eq!(leaving[0].event_kind, EventKind::Exit);
        assert_eq!(*seen.lock().unwrap(), vec![EventKind::Entry, EventKind::Exit]);
    }

    #[test]
    fn test_clear() {
        let engine = SharedGeofenceEngine::new(3, EngineConfig::default()).unwrap();
        for subject in ["alice", "bob", "carol"] {
            engine.evaluate(subject, &fix_north(10.0), &fences()).unwrap();
        }
        assert_eq!(engine.subjects(), vec!["alice", "bob", "carol"]);

        engine.clear_subject("bob");
        assert!(engine.get_state("bob").is_empty());
        assert_eq!(engine.subjects(), vec!["alice", "carol"]);

        engine.clear_all();
        assert!(engine.subjects().is_empty());
    }

    #[test]
    fn test_invalid_subject() {
        let engine = SharedGeofenceEngine::default();
        assert!(engine.evaluate("", &fix_north(10.0), &fences()).is_err());
    }
}
