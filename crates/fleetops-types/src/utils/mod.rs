//! Utility functions shared across the optimization crates.

pub mod geo;
pub mod helpers;
pub mod naming;

pub use geo::{haversine_meters, EARTH_RADIUS_METERS};
pub use helpers::current_timestamp;
pub use naming::normalize_key;
