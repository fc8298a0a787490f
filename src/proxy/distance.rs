//! Great-circle distance between coordinate pairs

/// Earth radius in miles
const EARTH_RADIUS_MILES: f64 = 3959.0;

/// Haversine distance between two (latitude, longitude) pairs in
/// degrees, returned in miles. Pure and total: NaN coordinates yield
/// NaN, degenerate inputs are the caller's problem.
pub fn haversine_miles(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let delta_lat = (lat2 - lat1).to_radians();
    let delta_lon = (lon2 - lon1).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_MILES * c
}
