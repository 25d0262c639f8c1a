//! Great-circle distance between coordinates.

const EARTH_RADIUS_KM: f64 = 6371.0;

/// Haversine distance in kilometres between two latitude/longitude points.
///
/// NaN coordinates yield NaN; callers comparing the result against a
/// threshold therefore never treat an invalid position as "near".
pub fn distance_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let delta_lat = (lat2 - lat1).to_radians();
    let delta_lon = (lon2 - lon1).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_KM * c
}
