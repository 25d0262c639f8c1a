//! Last-emitted event per (vehicle, stop) pair, used to gate redundant output.

use std::collections::HashMap;

use crate::model::{ScheduleEvent, ScheduleStatus};

/// Minimum age of the previous emission before an unchanged status is re-emitted.
pub const REFRESH_INTERVAL_MINUTES: i64 = 1;

/// Why a candidate event was (or was not) let through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Nothing has been emitted for the pair yet.
    First,
    StatusChanged { previous: ScheduleStatus },
    /// Same status, but the previous emission is at least a minute old.
    Refresh,
    Suppress,
}

impl Decision {
    pub fn should_emit(&self) -> bool {
        !matches!(self, Decision::Suppress)
    }
}

/// Gating rule for `candidate` given the last event emitted for its pair.
pub fn decide(previous: Option<&ScheduleEvent>, candidate: &ScheduleEvent) -> Decision {
    let Some(previous) = previous else {
        return Decision::First;
    };

    if previous.status != candidate.status {
        return Decision::StatusChanged {
            previous: previous.status,
        };
    }

    // Whole minutes, truncated: 59.9 seconds is still "less than a minute".
    let elapsed = candidate.timestamp - previous.timestamp;
    if elapsed.num_minutes() >= REFRESH_INTERVAL_MINUTES {
        Decision::Refresh
    } else {
        Decision::Suppress
    }
}

/// Map from `vehicleId-stopId` to the most recently emitted event.
///
/// Entries are never evicted; the map holds one entry for every pair seen
/// over the lifetime of the owning worker.
#[derive(Debug, Default)]
pub struct DedupStore {
    entries: HashMap<String, ScheduleEvent>,
}

impl DedupStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&ScheduleEvent> {
        self.entries.get(key)
    }

    /// Stores `event` as the latest emission for its pair.
    pub fn put(&mut self, event: ScheduleEvent) {
        self.entries.insert(event.dedup_key(), event);
    }

    /// Applies the gating rule, recording the candidate only when it is emitted.
    pub fn admit(&mut self, candidate: &ScheduleEvent) -> Decision {
        let decision = decide(self.get(&candidate.dedup_key()), candidate);
        if decision.should_emit() {
            self.put(candidate.clone());
        }
        decision
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveDateTime, TimeDelta};

    fn at(seconds: i64) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
            + TimeDelta::seconds(seconds)
    }

    fn event(vehicle: &str, stop: &str, status: ScheduleStatus, seconds: i64) -> ScheduleEvent {
        let ts = at(seconds);
        ScheduleEvent {
            vehicle_id: vehicle.to_string(),
            plate_number: None,
            stop_id: stop.to_string(),
            stop_name: String::new(),
            stop_address: String::new(),
            estimated_time: ts.time(),
            actual_time: ts.time(),
            delay_minutes: 0,
            timestamp: ts,
            route_id: None,
            sequence_number: 1,
            status,
        }
    }

    #[test]
    fn test_first_event_emits() {
        let mut store = DedupStore::new();
        let e = event("V1", "P001", ScheduleStatus::Arrived, 0);
        assert_eq!(store.admit(&e), Decision::First);
        assert_eq!(store.get("V1-P001"), Some(&e));
    }

    #[test]
    fn test_same_status_within_a_minute_is_suppressed() {
        let mut store = DedupStore::new();
        let first = event("V1", "P001", ScheduleStatus::Arrived, 0);
        store.admit(&first);

        let second = event("V1", "P001", ScheduleStatus::Arrived, 59);
        assert_eq!(store.admit(&second), Decision::Suppress);
        // the suppressed candidate never replaces the stored emission
        assert_eq!(store.get("V1-P001"), Some(&first));
    }

    #[test]
    fn test_same_status_after_a_minute_emits() {
        let mut store = DedupStore::new();
        store.admit(&event("V1", "P001", ScheduleStatus::Arrived, 0));

        let later = event("V1", "P001", ScheduleStatus::Arrived, 60);
        assert_eq!(store.admit(&later), Decision::Refresh);
        assert_eq!(store.get("V1-P001"), Some(&later));
    }

    #[test]
    fn test_refresh_measured_from_last_emission() {
        let mut store = DedupStore::new();
        store.admit(&event("V1", "P001", ScheduleStatus::Estimated, 0));
        store.admit(&event("V1", "P001", ScheduleStatus::Estimated, 45));

        // 75s after the stored emission, 30s after the suppressed one
        let e = event("V1", "P001", ScheduleStatus::Estimated, 75);
        assert_eq!(store.admit(&e), Decision::Refresh);
    }

    #[test]
    fn test_status_change_emits_immediately() {
        let mut store = DedupStore::new();
        store.admit(&event("V1", "P001", ScheduleStatus::Arriving, 0));

        let e = event("V1", "P001", ScheduleStatus::Arrived, 1);
        assert_eq!(
            store.admit(&e),
            Decision::StatusChanged {
                previous: ScheduleStatus::Arriving
            }
        );
        assert_eq!(store.get("V1-P001").unwrap().status, ScheduleStatus::Arrived);
    }

    #[test]
    fn test_clock_going_backwards_is_suppressed() {
        let mut store = DedupStore::new();
        store.admit(&event("V1", "P001", ScheduleStatus::Arrived, 120));
        let e = event("V1", "P001", ScheduleStatus::Arrived, 0);
        assert_eq!(store.admit(&e), Decision::Suppress);
    }

    #[test]
    fn test_pairs_are_independent() {
        let mut store = DedupStore::new();
        store.admit(&event("V1", "P001", ScheduleStatus::Arrived, 0));

        assert_eq!(
            store.admit(&event("V1", "P002", ScheduleStatus::Arrived, 1)),
            Decision::First
        );
        assert_eq!(
            store.admit(&event("V2", "P001", ScheduleStatus::Arrived, 1)),
            Decision::First
        );
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn test_store_is_never_evicted() {
        // Growth is unbounded: one entry per distinct pair for the store's lifetime.
        let mut store = DedupStore::new();
        for v in 0..200 {
            for s in 1..=5 {
                let e = event(&format!("V{v}"), &format!("P{s:03}"), ScheduleStatus::Estimated, 0);
                store.admit(&e);
            }
        }
        assert_eq!(store.len(), 1000);

        store.admit(&event("V0", "P001", ScheduleStatus::Estimated, 3600));
        assert_eq!(store.len(), 1000);
    }

    #[test]
    fn test_decide_without_store() {
        let e = event("V1", "P001", ScheduleStatus::Passed, 0);
        assert_eq!(decide(None, &e), Decision::First);
        assert!(Decision::Refresh.should_emit());
        assert!(!Decision::Suppress.should_emit());
    }
}
