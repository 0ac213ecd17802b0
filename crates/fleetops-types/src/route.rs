//! Route and plan types exchanged with optimization engines.
//!
//! The registry never looks inside optimization parameters; these types are
//! the shapes built-in engines understand and the plan every engine returns.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// A WGS84 coordinate in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
	pub lat: f64,
	pub lng: f64,
}

impl GeoPoint {
	pub fn new(lat: f64, lng: f64) -> Self {
		Self { lat, lng }
	}

	/// Returns true when both coordinates are finite and within range.
	pub fn is_valid(&self) -> bool {
		self.lat.is_finite()
			&& self.lng.is_finite()
			&& (-90.0..=90.0).contains(&self.lat)
			&& (-180.0..=180.0).contains(&self.lng)
	}
}

/// A place a vehicle must visit: a pickup, drop-off or waypoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stop {
	/// Identifier of the stop in the calling system (order or place id).
	pub id: String,
	pub location: GeoPoint,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub label: Option<String>,
}

/// A stop placed in the optimized visiting order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedStop {
	/// Zero-based position in the route.
	pub sequence: usize,
	pub stop: Stop,
	/// Distance from the previous point (origin or stop) in meters.
	pub leg_distance_meters: f64,
}

/// The result of an optimization: stops in visiting order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutePlan {
	pub id: String,
	/// Registry key of the engine that produced the plan.
	pub engine: String,
	pub stops: Vec<PlannedStop>,
	pub total_distance_meters: f64,
	/// Engine specific extras (iterations, provider job ids, ...).
	#[serde(default)]
	pub metadata: serde_json::Value,
}

impl RoutePlan {
	/// Creates a plan with a fresh identifier.
	pub fn new(engine: impl Into<String>, stops: Vec<PlannedStop>) -> Self {
		let total_distance_meters = stops.iter().map(|s| s.leg_distance_meters).sum();
		Self {
			id: Uuid::new_v4().to_string(),
			engine: engine.into(),
			stops,
			total_distance_meters,
			metadata: serde_json::Value::Null,
		}
	}

	/// Stop ids in visiting order.
	pub fn stop_ids(&self) -> Vec<&str> {
		self.stops.iter().map(|s| s.stop.id.as_str()).collect()
	}
}

/// Context for an event-driven engine invocation, such as a provider webhook.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HandlerContext {
	/// Event name, e.g. "optimization.completed".
	pub event: String,
	/// Where the event came from (remote address, queue name, ...).
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub source: Option<String>,
	/// UNIX timestamp (seconds) at which the event was received.
	#[serde(default)]
	pub received_at: u64,
	#[serde(default)]
	pub attributes: HashMap<String, String>,
}

impl HandlerContext {
	pub fn new(event: impl Into<String>) -> Self {
		Self {
			event: event.into(),
			received_at: crate::current_timestamp(),
			..Default::default()
		}
	}
}
