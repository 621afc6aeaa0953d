//! Membership State Table
//!
//! In-memory inside/outside state keyed by subject, then by geofence ID.
//! Entries are created lazily on first observation and live until the
//! subject (or the whole table) is cleared.

use std::collections::{BTreeMap, HashMap};

use super::types::{EventKind, MembershipState};

/// Membership state for every observed (subject, geofence) pair.
///
/// Only the engines write to it, through the transition function.
#[derive(Debug, Clone, Default)]
pub(crate) struct MembershipTable {
    subjects: HashMap<String, HashMap<String, MembershipState>>,
}

impl MembershipTable {
    pub(crate) fn new() -> Self {
        MembershipTable::default()
    }

    /// Recorded state for one pair, `None` if never observed
    pub(crate) fn get(&self, subject_id: &str, geofence_id: &str) -> Option<MembershipState> {
        self.subjects
            .get(subject_id)
            .and_then(|fences| fences.get(geofence_id))
            .copied()
    }

    /// Overwrite the inside flag for a pair.
    ///
    /// `event` is recorded as the last event kind only when one fired; an
    /// unchanged evaluation keeps the previous value.
    pub(crate) fn record(
        &mut self,
        subject_id: &str,
        geofence_id: &str,
        is_inside: bool,
        event: Option<EventKind>,
    ) {
        let fences = match self.subjects.get_mut(subject_id) {
            Some(fences) => fences,
            None => self.subjects.entry(subject_id.to_string()).or_default(),
        };

        let state = match fences.get_mut(geofence_id) {
            Some(state) => state,
            None => fences.entry(geofence_id.to_string()).or_default(),
        };

        state.is_inside = is_inside;
        if event.is_some() {
            state.last_event_kind = event;
        }
    }

    /// Copy of all state for a subject, ordered by geofence ID
    pub(crate) fn snapshot(&self, subject_id: &str) -> BTreeMap<String, MembershipState> {
        self.subjects
            .get(subject_id)
            .map(|fences| {
                fences
                    .iter()
                    .map(|(id, state)| (id.clone(), *state))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Forget a subject. Returns true if anything was stored.
    pub(crate) fn clear_subject(&mut self, subject_id: &str) -> bool {
        self.subjects.remove(subject_id).is_some()
    }

    pub(crate) fn clear_all(&mut self) {
        self.subjects.clear();
    }

    /// Subjects with recorded state, in no particular order
    pub(crate) fn subjects(&self) -> impl Iterator<Item = &str> {
        self.subjects.keys().map(String::as_str)
    }

}
