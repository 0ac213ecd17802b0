//! Great-circle distance helpers.

use crate::GeoPoint;

/// Mean earth radius (IUGG) in meters.
pub const EARTH_RADIUS_METERS: f64 = 6_371_008.8;

/// Great-circle distance between two points in meters, using the haversine formula.
pub fn haversine_meters(a: &GeoPoint, b: &GeoPoint) -> f64 {
	let lat1 = a.lat.to_radians();
	let lat2 = b.lat.to_radians();
	let dlat = (b.lat - a.lat).to_radians();
	let dlng = (b.lng - a.lng).to_radians();

	let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlng / 2.0).sin().powi(2);
	2.0 * EARTH_RADIUS_METERS * h.sqrt().min(1.0).asin()
}
