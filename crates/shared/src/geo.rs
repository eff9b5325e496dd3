//! Great-circle geometry helpers.

/// Mean Earth radius in kilometers.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Conversion factor from meters per second to kilometers per hour.
pub const MPS_TO_KMH: f64 = 3.6;

/// Great-circle distance in kilometers between two points given in decimal degrees.
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let dlat = (lat2 - lat1).to_radians();
    let dlon = (lon2 - lon1).to_radians();
    let lat1 = lat1.to_radians();
    let lat2 = lat2.to_radians();

    let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_KM * c
}

/// Converts a speed in meters per second to kilometers per hour.
pub fn mps_to_kmh(speed_mps: f64) -> f64 {
    speed_mps * MPS_TO_KMH
}
