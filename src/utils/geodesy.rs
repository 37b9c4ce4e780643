use crate::utils::constants::EARTH_RADIUS_M;

/// Great-circle distance in metres between two points using the Haversine formula
pub fn haversine_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let delta_lat = (lat2 - lat1).to_radians();
    let delta_lon = (lon2 - lon1).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().asin();

    EARTH_RADIUS_M * c
}

/// Ground length of the span between two longitudes along one parallel.
///
/// The renderer uses this as the metres-per-unit calibration of its scale bar.
pub fn scale_bar_distance(latitude: f64, lon_a: f64, lon_b: f64) -> f64 {
    haversine_distance(latitude, lon_a, latitude, lon_b)
}
