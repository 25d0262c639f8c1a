//! Nearest-stop search and vehicle state classification.

use crate::geo::distance_km;
use crate::model::{ScheduleStatus, Stop};
use crate::stops::StopRegistry;

/// Closer than this, the vehicle is at the stop regardless of speed.
pub const ARRIVED_RADIUS_KM: f64 = 0.05;
/// Within this radius a slow vehicle is pulling in.
pub const ARRIVING_RADIUS_KM: f64 = 0.2;
pub const ARRIVING_MAX_SPEED_KMH: f64 = 10.0;

/// A stop within the proximity threshold together with its distance.
#[derive(Debug, Clone, Copy)]
pub struct NearbyStop<'a> {
    pub stop: &'a Stop,
    pub distance_km: f64,
}

/// Returns the closest stop no further than `threshold_km`.
///
/// Ties keep the first stop in registry order. NaN coordinates never
/// compare within the threshold, so they yield `None`.
pub fn nearest_stop(
    registry: &StopRegistry,
    latitude: f64,
    longitude: f64,
    threshold_km: f64,
) -> Option<NearbyStop<'_>> {
    let mut nearest: Option<NearbyStop<'_>> = None;

    for stop in registry.iter() {
        let d = distance_km(latitude, longitude, stop.latitude, stop.longitude);
        if d <= threshold_km && nearest.is_none_or(|n| d < n.distance_km) {
            nearest = Some(NearbyStop {
                stop,
                distance_km: d,
            });
        }
    }

    nearest
}

/// Classifies a vehicle by its distance to the matched stop and its speed.
///
/// `Passed` is only returned for distances beyond `threshold_km`, which the
/// nearest-stop search never hands over; it is kept for callers that
/// classify arbitrary distances.
pub fn classify(distance_km: f64, speed_kmh: f64, threshold_km: f64) -> ScheduleStatus {
    if distance_km < ARRIVED_RADIUS_KM {
        ScheduleStatus::Arrived
    } else if distance_km < ARRIVING_RADIUS_KM && speed_kmh < ARRIVING_MAX_SPEED_KMH {
        ScheduleStatus::Arriving
    } else if distance_km <= threshold_km {
        ScheduleStatus::Estimated
    } else {
        ScheduleStatus::Passed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const THRESHOLD: f64 = 0.5;

    const KM_PER_DEGREE_LAT: f64 = 111.194_926_645_502_9;

    fn registry(stops: Vec<Stop>) -> StopRegistry {
        StopRegistry::new(stops).unwrap()
    }

    #[test]
    fn test_exact_position_matches_with_zero_distance() {
        let registry = StopRegistry::default();
        let nearby = nearest_stop(&registry, -12.0464, -77.0428, THRESHOLD).unwrap();
        assert_eq!(nearby.stop.stop_id, "P001");
        assert_eq!(nearby.distance_km, 0.0);
    }

    #[test]
    fn test_nothing_within_threshold() {
        let registry = StopRegistry::default();
        // ~0.6 km north of Terminal Norte, everything else is further away
        let lat = -12.0464 + 0.6 / KM_PER_DEGREE_LAT;
        assert!(nearest_stop(&registry, lat, -77.0428, THRESHOLD).is_none());
    }

    #[test]
    fn test_nearer_stop_wins() {
        let registry = registry(vec![
            Stop::new("P001", "Far", "", 0.003, 0.0),
            Stop::new("P002", "Near", "", 0.001, 0.0),
        ]);
        let nearby = nearest_stop(&registry, 0.0, 0.0, THRESHOLD).unwrap();
        assert_eq!(nearby.stop.stop_id, "P002");
    }

    #[test]
    fn test_exact_tie_keeps_registry_order() {
        let registry = registry(vec![
            Stop::new("P001", "North", "", 0.001, 0.0),
            Stop::new("P002", "South", "", -0.001, 0.0),
        ]);
        let nearby = nearest_stop(&registry, 0.0, 0.0, THRESHOLD).unwrap();
        assert_eq!(nearby.stop.stop_id, "P001");
    }

    #[test]
    fn test_stop_outside_threshold_is_skipped_even_if_only_candidate() {
        let registry = registry(vec![Stop::new("P001", "A", "", 0.01, 0.0)]);
        // 0.01 deg ~ 1.1 km
        assert!(nearest_stop(&registry, 0.0, 0.0, THRESHOLD).is_none());
        assert!(nearest_stop(&registry, 0.0, 0.0, 2.0).is_some());
    }

    #[test]
    fn test_nan_coordinates_match_nothing() {
        let registry = StopRegistry::default();
        assert!(nearest_stop(&registry, f64::NAN, -77.0428, THRESHOLD).is_none());
        assert!(nearest_stop(&registry, -12.0464, f64::NAN, THRESHOLD).is_none());
    }

    #[test]
    fn test_empty_registry() {
        let registry = registry(vec![]);
        assert!(nearest_stop(&registry, 0.0, 0.0, THRESHOLD).is_none());
    }

    #[test]
    fn test_classify_arrived() {
        assert_eq!(classify(0.0, 50.0, THRESHOLD), ScheduleStatus::Arrived);
        assert_eq!(classify(0.049, 50.0, THRESHOLD), ScheduleStatus::Arrived);
    }

    #[test]
    fn test_classify_arrived_boundary_is_strict() {
        assert_eq!(classify(0.05, 2.0, THRESHOLD), ScheduleStatus::Arriving);
        assert_eq!(classify(0.05, 20.0, THRESHOLD), ScheduleStatus::Estimated);
    }

    #[test]
    fn test_classify_arriving() {
        assert_eq!(classify(0.1, 9.9, THRESHOLD), ScheduleStatus::Arriving);
        assert_eq!(classify(0.199, 0.0, THRESHOLD), ScheduleStatus::Arriving);
    }

    #[test]
    fn test_classify_arriving_boundaries_are_strict() {
        assert_eq!(classify(0.2, 5.0, THRESHOLD), ScheduleStatus::Estimated);
        assert_eq!(classify(0.1, 10.0, THRESHOLD), ScheduleStatus::Estimated);
        assert_eq!(classify(0.2, 10.0, THRESHOLD), ScheduleStatus::Estimated);
    }

    #[test]
    fn test_classify_estimated_up_to_threshold() {
        assert_eq!(classify(0.3, 40.0, THRESHOLD), ScheduleStatus::Estimated);
        assert_eq!(classify(0.5, 40.0, THRESHOLD), ScheduleStatus::Estimated);
    }

    #[test]
    fn test_classify_passed_only_beyond_threshold() {
        assert_eq!(classify(0.51, 40.0, THRESHOLD), ScheduleStatus::Passed);
        assert_eq!(classify(0.51, 1.0, 1.0), ScheduleStatus::Estimated);
    }
}
