//! Distance-based route optimization engine.
//!
//! Orders stops by great-circle distance: a nearest-neighbour tour from the
//! origin, optionally improved with 2-opt segment reversals. Runs in-process
//! and needs no external service.

use crate::{EngineError, EngineFactory, EngineFactoryRegistry, OptimizationEngine};
use async_trait::async_trait;
use fleetops_types::{
	haversine_meters, ConfigSchema, Field, FieldType, GeoPoint, ImplementationRegistry,
	PlannedStop, RoutePlan, Schema, Stop, ValidationError,
};
use serde::Deserialize;
use serde_json::{json, Value};

/// Improvements smaller than this many meters are treated as ties.
const IMPROVEMENT_EPSILON: f64 = 1e-9;

/// Configuration for the distance engine.
#[derive(Debug, Clone, Deserialize)]
pub struct DistanceEngineConfig {
	/// Whether 2-opt improvement runs when a request does not say.
	#[serde(default = "default_two_opt")]
	pub two_opt: bool,
	/// Upper bound on 2-opt sweeps over the route.
	#[serde(default = "default_max_iterations")]
	pub max_iterations: u32,
	#[serde(default)]
	pub display_name: Option<String>,
}

fn default_two_opt() -> bool {
	true
}

fn default_max_iterations() -> u32 {
	1000
}

impl Default for DistanceEngineConfig {
	fn default() -> Self {
		Self {
			two_opt: default_two_opt(),
			max_iterations: default_max_iterations(),
			display_name: None,
		}
	}
}

/// Configuration schema for DistanceEngine.
pub struct DistanceEngineSchema;

impl ConfigSchema for DistanceEngineSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			// Required fields
			vec![],
			// Optional fields
			vec![
				Field::new("two_opt", FieldType::Boolean),
				Field::new(
					"max_iterations",
					FieldType::Integer {
						min: Some(1),
						max: Some(u32::MAX as i64),
					},
				),
				Field::new("display_name", FieldType::String),
			],
		);
		schema.validate(config)
	}
}

/// Request shape understood by the distance engine.
#[derive(Debug, Deserialize)]
struct DistanceParams {
	/// Depot or current vehicle position. Defaults to the first stop.
	#[serde(default)]
	origin: Option<GeoPoint>,
	stops: Vec<Stop>,
	#[serde(default)]
	return_to_origin: bool,
}

#[derive(Debug, Default, Deserialize)]
struct DistanceOptions {
	#[serde(default)]
	two_opt: Option<bool>,
	#[serde(default)]
	max_iterations: Option<u32>,
}

/// Nearest-neighbour engine with optional 2-opt refinement.
pub struct DistanceEngine {
	key: String,
	config: DistanceEngineConfig,
}

impl DistanceEngine {
	pub fn new(key: impl Into<String>, config: DistanceEngineConfig) -> Self {
		Self {
			key: key.into(),
			config,
		}
	}

	fn plan(&self, params: DistanceParams, options: DistanceOptions) -> Result<RoutePlan, EngineError> {
		if params.stops.is_empty() {
			return Err(EngineError::InvalidParams(
				"at least one stop is required".to_string(),
			));
		}
		if let Some(origin) = &params.origin {
			if !origin.is_valid() {
				return Err(EngineError::InvalidParams(format!(
					"origin ({}, {}) is outside valid coordinates",
					origin.lat, origin.lng
				)));
			}
		}
		if let Some(stop) = params.stops.iter().find(|s| !s.location.is_valid()) {
			return Err(EngineError::InvalidParams(format!(
				"stop '{}' has coordinates outside valid range",
				stop.id
			)));
		}

		let two_opt = options.two_opt.unwrap_or(self.config.two_opt);
		let max_iterations = options
			.max_iterations
			.unwrap_or(self.config.max_iterations);

		let mut route = Route::nearest_neighbour(
			params.origin,
			&params.stops,
			params.return_to_origin,
		);
		let iterations = if two_opt {
			route.two_opt(max_iterations)
		} else {
			0
		};

		let (stops, closing_leg) = route.into_planned(&params.stops);
		let mut plan = RoutePlan::new(self.key.clone(), stops);
		plan.total_distance_meters += closing_leg;
		let algorithm = if two_opt {
			"nearest_neighbour+2opt"
		} else {
			"nearest_neighbour"
		};
		plan.metadata = json!({
			"algorithm": algorithm,
			"iterations": iterations,
			"return_to_origin": params.return_to_origin,
			"return_leg_meters": closing_leg,
		});

		tracing::debug!(
			engine = %self.key,
			stops = plan.stops.len(),
			total_meters = plan.total_distance_meters,
			iterations,
			"Computed distance plan"
		);
		Ok(plan)
	}
}

/// A path through the stops. Node 0 is the fixed starting point: the origin,
/// or the first stop when no origin was given.
struct Route {
	points: Vec<GeoPoint>,
	/// Stop index for each node; `None` for an explicit origin.
	stop_indices: Vec<Option<usize>>,
	closed: bool,
}

impl Route {
	fn nearest_neighbour(origin: Option<GeoPoint>, stops: &[Stop], closed: bool) -> Self {
		let (start, start_index, mut unvisited): (GeoPoint, Option<usize>, Vec<usize>) =
			match origin {
				Some(origin) => (origin, None, (0..stops.len()).collect()),
				None => (stops[0].location, Some(0), (1..stops.len()).collect()),
			};

		let mut points = vec![start];
		let mut stop_indices = vec![start_index];
		let mut current = start;

		while !unvisited.is_empty() {
			let mut best = 0;
			let mut best_distance = f64::INFINITY;
			for (pos, &idx) in unvisited.iter().enumerate() {
				let d = haversine_meters(&current, &stops[idx].location);
				if d < best_distance {
					best = pos;
					best_distance = d;
				}
			}
			let idx = unvisited.remove(best);
			current = stops[idx].location;
			points.push(current);
			stop_indices.push(Some(idx));
		}

		Self {
			points,
			stop_indices,
			closed,
		}
	}

	fn distance(&self, a: usize, b: usize) -> f64 {
		haversine_meters(&self.points[a], &self.points[b])
	}

	/// Distance of the edge leaving node `j`: to the next node, back to the
	/// start for closed routes, or nothing at the end of an open route.
	fn exit_edge(&self, j: usize, from: usize) -> f64 {
		if j + 1 < self.points.len() {
			self.distance(from, j + 1)
		} else if self.closed {
			self.distance(from, 0)
		} else {
			0.0
		}
	}

	/// Applies improving segment reversals until none remain or the sweep
	/// budget runs out. Returns the number of sweeps performed.
	fn two_opt(&mut self, max_iterations: u32) -> u32 {
		let n = self.points.len();
		let mut iterations = 0;
		let mut improved = true;

		while improved && iterations < max_iterations {
			improved = false;
			iterations += 1;
			for i in 1..n.saturating_sub(1) {
				for j in (i + 1)..n {
					let before = self.distance(i - 1, i) + self.exit_edge(j, j);
					let after = self.distance(i - 1, j) + self.exit_edge(j, i);
					if after + IMPROVEMENT_EPSILON < before {
						self.points[i..=j].reverse();
						self.stop_indices[i..=j].reverse();
						improved = true;
					}
				}
			}
		}

		iterations
	}

	/// Converts the path into planned stops plus the closing leg length.
	fn into_planned(self, stops: &[Stop]) -> (Vec<PlannedStop>, f64) {
		let closing_leg = if self.closed && self.points.len() > 1 {
			self.distance(self.points.len() - 1, 0)
		} else {
			0.0
		};

		let mut planned = Vec::with_capacity(stops.len());
		for (node, idx) in self.stop_indices.iter().enumerate() {
			let Some(idx) = idx else { continue };
			let leg_distance_meters = if node == 0 {
				0.0
			} else {
				self.distance(node - 1, node)
			};
			planned.push(PlannedStop {
				sequence: planned.len(),
				stop: stops[*idx].clone(),
				leg_distance_meters,
			});
		}

		(planned, closing_leg)
	}
}

#[async_trait]
impl OptimizationEngine for DistanceEngine {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(DistanceEngineSchema)
	}

	fn display_name(&self) -> Option<String> {
		self.config.display_name.clone()
	}

	async fn optimize(&self, params: &Value, options: &Value) -> Result<RoutePlan, EngineError> {
		let params: DistanceParams = serde_json::from_value(params.clone())
			.map_err(|e| EngineError::InvalidParams(format!("invalid distance params: {}", e)))?;
		let options: DistanceOptions = if options.is_null() {
			DistanceOptions::default()
		} else {
			serde_json::from_value(options.clone())
				.map_err(|e| EngineError::InvalidParams(format!("invalid distance options: {}", e)))?
		};

		self.plan(params, options)
	}
}

/// Factory function to create a distance engine from configuration.
///
/// Configuration parameters:
/// - `two_opt`: run 2-opt improvement by default (default: true)
/// - `max_iterations`: maximum 2-opt sweeps (default: 1000)
/// - `display_name`: label shown in engine selectors
pub fn create_engine(
	key: &str,
	config: &toml::Value,
) -> Result<Box<dyn OptimizationEngine>, EngineError> {
	DistanceEngineSchema
		.validate(config)
		.map_err(|e| EngineError::Configuration(format!("Invalid distance config: {}", e)))?;

	let engine_config: DistanceEngineConfig = config
		.clone()
		.try_into()
		.map_err(|e| EngineError::Configuration(format!("Invalid distance config: {}", e)))?;

	Ok(Box::new(DistanceEngine::new(key, engine_config)))
}

/// Registry for the distance engine implementation.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "distance";
	type Factory = EngineFactory;

	fn factory() -> Self::Factory {
		create_engine
	}
}

impl EngineFactoryRegistry for Registry {}
