use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use serde::Serialize;

use crate::processor::Outcome;

/// Running counters shared by the consumer and the HTTP surface.
#[derive(Debug, Default)]
pub struct ProcessorStats {
    received: AtomicU64,
    emitted: AtomicU64,
    suppressed: AtomicU64,
    no_stop: AtomicU64,
    failed: AtomicU64,
    publish_failed: AtomicU64,
    malformed: AtomicU64,
    running: AtomicBool,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub received: u64,
    pub emitted: u64,
    pub suppressed: u64,
    pub no_stop: u64,
    pub failed: u64,
    pub publish_failed: u64,
    pub malformed: u64,
}

impl ProcessorStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_received(&self) {
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_outcome(&self, outcome: &Outcome) {
        let counter = match outcome {
            Outcome::NoNearbyStop => &self.no_stop,
            Outcome::Suppressed(_) => &self.suppressed,
            Outcome::Emit { .. } => &self.emitted,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_publish_failure(&self) {
        self.publish_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_malformed(&self) {
        self.malformed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::Relaxed);
    }

    /// Whether a consumer is currently draining the input stream.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            received: self.received.load(Ordering::Relaxed),
            emitted: self.emitted.load(Ordering::Relaxed),
            suppressed: self.suppressed.load(Ordering::Relaxed),
            no_stop: self.no_stop.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            publish_failed: self.publish_failed.load(Ordering::Relaxed),
            malformed: self.malformed.load(Ordering::Relaxed),
        }
    }
}

impl StatsSnapshot {
    pub fn pct(part: u64, total: u64) -> f64 {
        if total == 0 {
            0.0
        } else {
            (part as f64 / total as f64) * 100.0
        }
    }

    /// Share of received positions that produced an emission.
    pub fn emit_pct(&self) -> f64 {
        Self::pct(self.emitted, self.received)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pct_with_zero_total() {
        assert_eq!(StatsSnapshot::pct(10, 0), 0.0);
    }

    #[test]
    fn test_pct_normal_values() {
        assert_eq!(StatsSnapshot::pct(50, 100), 50.0);
        assert_eq!(StatsSnapshot::pct(1, 4), 25.0);
    }

    #[test]
    fn test_outcomes_are_counted() {
        let stats = ProcessorStats::new();
        for _ in 0..4 {
            stats.record_received();
        }
        stats.record_outcome(&Outcome::NoNearbyStop);
        stats.record_outcome(&Outcome::NoNearbyStop);
        stats.record_failure();
        stats.record_malformed();
        stats.record_publish_failure();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.received, 4);
        assert_eq!(snapshot.no_stop, 2);
        assert_eq!(snapshot.emitted, 0);
        assert_eq!(snapshot.failed, 1);
        assert_eq!(snapshot.malformed, 1);
        assert_eq!(snapshot.publish_failed, 1);
        assert_eq!(snapshot.emit_pct(), 0.0);
    }

    #[test]
    fn test_running_flag() {
        let stats = ProcessorStats::new();
        assert!(!stats.is_running());
        stats.set_running(true);
        assert!(stats.is_running());
    }
}
