//! The signal processor: matches a position to a nearby stop, classifies the
//! vehicle, synthesizes a schedule event and gates redundant emissions.
//!
//! Each [`SignalProcessor`] owns its [`DedupStore`]. Concurrent workers each
//! get their own processor and share only the read-only [`StopRegistry`].

pub mod dedup;
pub mod proximity;
pub mod schedule;

use std::sync::Arc;

use chrono::{Local, NaiveDateTime};
use tracing::{debug, info};

pub use dedup::{Decision, DedupStore};
pub use proximity::{NearbyStop, classify, nearest_stop};

use crate::config::ProcessorConfig;
use crate::error::Result;
use crate::model::{PositionEvent, ScheduleEvent};
use crate::stops::StopRegistry;

/// Result of processing one position event.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// No stop within the proximity threshold.
    NoNearbyStop,
    /// A schedule event was synthesized but matches the last emission.
    Suppressed(ScheduleEvent),
    /// A schedule event to hand to the egress stream.
    Emit {
        event: ScheduleEvent,
        decision: Decision,
    },
}

impl Outcome {
    /// The event to publish, if any.
    pub fn into_event(self) -> Option<ScheduleEvent> {
        match self {
            Outcome::Emit { event, .. } => Some(event),
            _ => None,
        }
    }

    pub fn is_emit(&self) -> bool {
        matches!(self, Outcome::Emit { .. })
    }
}

pub struct SignalProcessor {
    registry: Arc<StopRegistry>,
    config: ProcessorConfig,
    store: DedupStore,
}

impl SignalProcessor {
    pub fn new(registry: Arc<StopRegistry>, config: ProcessorConfig) -> Self {
        Self {
            registry,
            config,
            store: DedupStore::new(),
        }
    }

    pub fn config(&self) -> &ProcessorConfig {
        &self.config
    }

    pub fn store(&self) -> &DedupStore {
        &self.store
    }

    /// Processes `event` against the local wall clock.
    pub fn process(&mut self, event: &PositionEvent) -> Result<Outcome> {
        self.process_at(event, Local::now().naive_local())
    }

    /// Processes `event` as if it were observed at `now`.
    ///
    /// # Errors
    ///
    /// Fails when the matched stop's id carries no parsable ordinal. The
    /// dedup store is left untouched in that case.
    #[tracing::instrument(skip_all, fields(vehicle_id = %event.vehicle_id))]
    pub fn process_at(&mut self, event: &PositionEvent, now: NaiveDateTime) -> Result<Outcome> {
        let Some(nearby) = nearest_stop(
            &self.registry,
            event.latitude,
            event.longitude,
            self.config.proximity_threshold_km,
        ) else {
            debug!(
                latitude = event.latitude,
                longitude = event.longitude,
                "Vehicle is not near any stop"
            );
            return Ok(Outcome::NoNearbyStop);
        };

        info!(
            stop_id = %nearby.stop.stop_id,
            stop_name = %nearby.stop.name,
            distance_km = format_args!("{:.3}", nearby.distance_km),
            "Vehicle near stop"
        );

        let status = classify(
            nearby.distance_km,
            event.speed_kmh,
            self.config.proximity_threshold_km,
        );
        let candidate = schedule::synthesize(event, &nearby, status, now)?;

        let decision = self.store.admit(&candidate);
        if decision.should_emit() {
            debug!(?decision, %status, "Schedule event admitted");
            Ok(Outcome::Emit {
                event: candidate,
                decision,
            })
        } else {
            debug!(%status, stop_id = %candidate.stop_id, "Schedule event suppressed");
            Ok(Outcome::Suppressed(candidate))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use crate::model::{ScheduleStatus, Stop};
    use chrono::{NaiveDate, TimeDelta};

    const KM_PER_DEGREE_LAT: f64 = 111.194_926_645_502_9;

    fn t0() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 1)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap()
    }

    fn position(vehicle_id: &str, latitude: f64, longitude: f64, speed_kmh: f64) -> PositionEvent {
        PositionEvent {
            vehicle_id: vehicle_id.to_string(),
            plate_number: Some("ABC-123".to_string()),
            latitude,
            longitude,
            speed_kmh,
            address: None,
            city: Some("Lima".to_string()),
            status: Some("EN_ROUTE".to_string()),
            timestamp: None,
            driver: None,
            passenger_count: None,
            route_id: Some("R1".to_string()),
        }
    }

    fn processor() -> SignalProcessor {
        SignalProcessor::new(Arc::new(StopRegistry::default()), ProcessorConfig::default())
    }

    #[test]
    fn test_end_to_end_terminal_norte() {
        let mut p = processor();
        let at_stop = position("V1", -12.0464, -77.0428, 2.0);

        let first = p.process_at(&at_stop, t0()).unwrap();
        let Outcome::Emit { event, decision } = first else {
            panic!("expected emission, got {first:?}");
        };
        assert_eq!(decision, Decision::First);
        assert_eq!(event.stop_id, "P001");
        assert_eq!(event.status, ScheduleStatus::Arrived);
        assert_eq!(event.sequence_number, 1);
        assert_eq!(event.delay_minutes, -5);

        let after_30s = p.process_at(&at_stop, t0() + TimeDelta::seconds(30)).unwrap();
        assert!(matches!(after_30s, Outcome::Suppressed(_)));

        let after_90s = p.process_at(&at_stop, t0() + TimeDelta::seconds(90)).unwrap();
        assert!(matches!(
            after_90s,
            Outcome::Emit {
                decision: Decision::Refresh,
                ..
            }
        ));

        let lat = -12.0464 + 0.6 / KM_PER_DEGREE_LAT;
        let away = position("V1", lat, -77.0428, 30.0);
        let outcome = p.process_at(&away, t0() + TimeDelta::seconds(120)).unwrap();
        assert_eq!(outcome, Outcome::NoNearbyStop);
        assert_eq!(p.store().len(), 1);
    }

    #[test]
    fn test_status_change_emits_within_a_minute() {
        let mut p = processor();
        // ~0.1 km from Terminal Norte, slow
        let lat = -12.0464 + 0.1 / KM_PER_DEGREE_LAT;
        let approaching = position("V1", lat, -77.0428, 5.0);
        let arrived = position("V1", -12.0464, -77.0428, 0.0);

        let first = p.process_at(&approaching, t0()).unwrap().into_event().unwrap();
        assert_eq!(first.status, ScheduleStatus::Arriving);

        let second = p
            .process_at(&arrived, t0() + TimeDelta::seconds(10))
            .unwrap()
            .into_event()
            .unwrap();
        assert_eq!(second.status, ScheduleStatus::Arrived);
    }

    #[test]
    fn test_fast_vehicle_near_stop_is_estimated() {
        let mut p = processor();
        let lat = -12.0464 + 0.1 / KM_PER_DEGREE_LAT;
        let event = p
            .process_at(&position("V9", lat, -77.0428, 45.0), t0())
            .unwrap()
            .into_event()
            .unwrap();
        assert_eq!(event.status, ScheduleStatus::Estimated);
    }

    #[test]
    fn test_redelivered_event_is_suppressed() {
        let mut p = processor();
        let e = position("V1", -12.0565, -77.0352, 0.0);

        assert!(p.process_at(&e, t0()).unwrap().is_emit());
        let replay_1 = p.process_at(&e, t0() + TimeDelta::seconds(5)).unwrap();
        let replay_2 = p.process_at(&e, t0() + TimeDelta::seconds(6)).unwrap();
        assert!(matches!(replay_1, Outcome::Suppressed(_)));
        assert!(matches!(replay_2, Outcome::Suppressed(_)));
    }

    #[test]
    fn test_vehicles_are_gated_independently() {
        let mut p = processor();
        let v1 = position("V1", -12.0464, -77.0428, 0.0);
        let v2 = position("V2", -12.0464, -77.0428, 0.0);

        assert!(p.process_at(&v1, t0()).unwrap().is_emit());
        assert!(p.process_at(&v2, t0()).unwrap().is_emit());
        assert_eq!(p.store().len(), 2);
    }

    #[test]
    fn test_malformed_stop_id_is_a_processing_fault() {
        let registry = StopRegistry::new(vec![Stop::new("HUB", "Hub", "", 0.0, 0.0)]).unwrap();
        let mut p = SignalProcessor::new(Arc::new(registry), ProcessorConfig::default());

        let err = p
            .process_at(&position("V1", 0.0, 0.0, 0.0), t0())
            .unwrap_err();
        assert!(matches!(err, Error::InvalidStopId(_)));
        assert!(p.store().is_empty());
    }

    #[test]
    fn test_nan_position_yields_no_stop() {
        let mut p = processor();
        let outcome = p
            .process_at(&position("V1", f64::NAN, f64::NAN, 0.0), t0())
            .unwrap();
        assert_eq!(outcome, Outcome::NoNearbyStop);
    }

    #[test]
    fn test_custom_threshold_widens_matching() {
        let config = ProcessorConfig::new(1.0, 5).unwrap();
        let mut p = SignalProcessor::new(Arc::new(StopRegistry::default()), config);
        let lat = -12.0464 + 0.6 / KM_PER_DEGREE_LAT;

        let event = p
            .process_at(&position("V1", lat, -77.0428, 20.0), t0())
            .unwrap()
            .into_event()
            .unwrap();
        assert_eq!(event.stop_id, "P001");
        assert_eq!(event.status, ScheduleStatus::Estimated);
    }

    #[test]
    fn test_process_uses_wall_clock() {
        let mut p = processor();
        let before = Local::now().naive_local();
        let event = p
            .process(&position("V1", -12.0464, -77.0428, 0.0))
            .unwrap()
            .into_event()
            .unwrap();
        assert!(event.timestamp >= before);
        assert_eq!(event.actual_time, event.timestamp.time());
    }
}
