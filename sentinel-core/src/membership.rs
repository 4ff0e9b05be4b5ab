//! Event-sourced index membership.
//!
//! The log is append-only: current membership of a group is never stored,
//! it is derived by replaying JOIN/LEAVE events in date order. Recording a
//! new observation produces a diff against that derived state and appends
//! only the transitions.

use crate::domain::{EventType, MembershipEvent};
use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet};
use tracing::warn;

/// Immutable snapshot of the membership history.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MembershipLog {
    events: Vec<MembershipEvent>,
}

impl MembershipLog {
    pub fn new(events: Vec<MembershipEvent>) -> Self {
        Self { events }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Events in append order.
    pub fn events(&self) -> &[MembershipEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Every group name that appears in the log.
    pub fn groups(&self) -> BTreeSet<&str> {
        self.events.iter().map(|e| e.index_name.as_str()).collect()
    }

    /// Codes whose latest event for `group` is a JOIN.
    ///
    /// Events are replayed by date; same-day events keep append order, so the
    /// one appended last wins.
    pub fn current_members(&self, group: &str) -> BTreeSet<String> {
        let mut relevant: Vec<&MembershipEvent> =
            self.events.iter().filter(|e| e.index_name == group).collect();
        relevant.sort_by_key(|e| e.event_date);

        let mut latest: BTreeMap<&str, EventType> = BTreeMap::new();
        for event in relevant {
            latest.insert(event.code.as_str(), event.event_type);
        }
        latest
            .into_iter()
            .filter(|(_, kind)| *kind == EventType::Join)
            .map(|(code, _)| code.to_string())
            .collect()
    }

    /// Transitions that take `group` from its derived membership to `observed`.
    ///
    /// JOINs come first, then LEAVEs, each in code order. An empty observation
    /// is treated as a failed scrape and yields no events, so a broken source
    /// cannot wipe out a group.
    pub fn diff(
        &self,
        observed: &BTreeSet<String>,
        group: &str,
        as_of: NaiveDate,
    ) -> Vec<MembershipEvent> {
        if observed.is_empty() {
            warn!(group, "observed constituent set is empty; no membership events recorded");
            return Vec::new();
        }
        let current = self.current_members(group);

        let joins = observed
            .difference(&current)
            .map(|code| MembershipEvent::join(code.as_str(), group, as_of));
        let leaves = current
            .difference(observed)
            .map(|code| MembershipEvent::leave(code.as_str(), group, as_of));
        joins.chain(leaves).collect()
    }

    /// New snapshot with `events` appended.
    pub fn append(mut self, events: impl IntoIterator<Item = MembershipEvent>) -> Self {
        self.events.extend(events);
        self
    }
}
