//! Factory catalog for optimization engine implementations.
//!
//! Configuration names engines by implementation; this module resolves those
//! names to factory functions and builds the [`EngineRegistry`] the service
//! dispatches through.

use fleetops_config::Config;
use fleetops_optimize::{EngineError, EngineFactory, EngineRegistry, OptimizationEngine};
use fleetops_types::normalize_key;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use thiserror::Error;

/// Errors that can occur while composing the engine registry.
#[derive(Debug, Error)]
pub enum BuildError {
	#[error("Unknown engine implementation '{implementation}' for '{name}'. Available: [{available}]")]
	UnknownImplementation {
		name: String,
		implementation: String,
		available: String,
	},
	#[error("Failed to create engine '{name}': {source}")]
	Engine {
		name: String,
		#[source]
		source: EngineError,
	},
}

/// Catalog of every engine factory compiled into the service.
pub struct FactoryRegistry {
	pub engines: HashMap<String, EngineFactory>,
}

impl FactoryRegistry {
	/// Create a new empty catalog
	pub fn new() -> Self {
		Self {
			engines: HashMap::new(),
		}
	}

	/// Register an engine implementation
	pub fn register_engine(&mut self, name: impl Into<String>, factory: EngineFactory) {
		self.engines.insert(name.into(), factory);
	}

	/// Sorted implementation names, for error messages.
	pub fn available(&self) -> Vec<&str> {
		let mut names: Vec<&str> = self.engines.keys().map(String::as_str).collect();
		names.sort_unstable();
		names
	}
}

impl Default for FactoryRegistry {
	fn default() -> Self {
		Self::new()
	}
}

static REGISTRY: OnceLock<FactoryRegistry> = OnceLock::new();

/// Get the factory catalog, populating it on first use.
pub fn get_registry() -> &'static FactoryRegistry {
	REGISTRY.get_or_init(|| {
		let mut registry = FactoryRegistry::new();
		for (name, factory) in fleetops_optimize::get_all_implementations() {
			tracing::debug!("Registering engine implementation: {}", name);
			registry.register_engine(name, factory);
		}
		registry
	})
}

/// Builds an engine registry holding every engine the configuration names.
///
/// Engines are created in name order so start-up logs are stable. A
/// `display_name` in an engine's table becomes its registry label.
pub fn build_engine_registry(config: &Config) -> Result<EngineRegistry, BuildError> {
	build_with(get_registry(), config)
}

fn build_with(catalog: &FactoryRegistry, config: &Config) -> Result<EngineRegistry, BuildError> {
	let optimization = &config.optimization;
	let registry = EngineRegistry::new();

	let mut names: Vec<&String> = optimization.implementations.keys().collect();
	names.sort();

	for name in names {
		let implementation = optimization.implementation_of(name);
		let factory = catalog.engines.get(implementation).ok_or_else(|| {
			BuildError::UnknownImplementation {
				name: name.clone(),
				implementation: implementation.to_string(),
				available: catalog.available().join(", "),
			}
		})?;

		let table = &optimization.implementations[name];
		let engine = factory(&normalize_key(name), table).map_err(|source| BuildError::Engine {
			name: name.clone(),
			source,
		})?;
		let engine: Arc<dyn OptimizationEngine> = Arc::from(engine);
		let registered = match optimization.display_name_of(name) {
			Some(label) => registry.register_with_display_name(name, label, engine),
			None => registry.register(name, engine),
		};
		let key = registered.map_err(|source| BuildError::Engine {
			name: name.clone(),
			source,
		})?;
		tracing::info!(engine = %key, implementation, "Configured optimization engine");
	}

	Ok(registry)
}

#[cfg(test)]
mod tests {
	use super::*;
	use fleetops_optimize::implementations::distance::{DistanceEngine, DistanceEngineConfig};
	use std::str::FromStr;

	fn config(engines: &str) -> Config {
		Config::from_str(&format!("[service]\nid = \"fleetops-test\"\n\n{}", engines)).unwrap()
	}

	#[test]
	fn test_catalog_contains_builtin_engines() {
		assert_eq!(get_registry().available(), vec!["distance", "http"]);
	}

	#[test]
	fn test_build_registry_from_config() {
		let config = config(
			r#"
[optimization]
default = "distance"

[optimization.implementations.distance]
display_name = "Straight-line distance"

[optimization.implementations."Acme Routing"]
implementation = "http"
base_url = "https://routing.example.com"
"#,
		);

		let registry = build_engine_registry(&config).unwrap();

		assert_eq!(registry.available_engines(), vec!["acme-routing", "distance"]);
		let services = registry.available_services();
		assert_eq!(services[0].display_name, "acme-routing");
		assert_eq!(services[1].display_name, "Straight-line distance");
	}

	/// Builds a distance engine that ignores its table, so it has no label
	/// of its own.
	fn create_unlabelled(
		key: &str,
		_config: &toml::Value,
	) -> Result<Box<dyn OptimizationEngine>, EngineError> {
		let engine = DistanceEngine::new(key, DistanceEngineConfig::default());
		Ok(Box::new(engine))
	}

	#[test]
	fn test_configured_display_name_labels_registration() {
		let mut catalog = FactoryRegistry::new();
		catalog.register_engine("unlabelled", create_unlabelled);
		let config = config(
			r#"
[optimization.implementations.depot]
implementation = "unlabelled"
display_name = "Depot round trip"

[optimization.implementations.plain]
implementation = "unlabelled"
"#,
		);

		let registry = build_with(&catalog, &config).unwrap();
		let labels: Vec<String> = registry
			.available_services()
			.into_iter()
			.map(|service| service.display_name)
			.collect();
		assert_eq!(labels, vec!["Depot round trip", "plain"]);
	}

	#[test]
	fn test_unknown_implementation_lists_available() {
		let config = config(
			r#"
[optimization.implementations.osrm]
"#,
		);

		let err = build_engine_registry(&config).unwrap_err();
		assert_eq!(
			err.to_string(),
			"Unknown engine implementation 'osrm' for 'osrm'. Available: [distance, http]"
		);
	}

	#[test]
	fn test_engine_factory_error_is_reported() {
		let config = config(
			r#"
[optimization.implementations.remote]
implementation = "http"
timeout_seconds = 5
"#,
		);

		match build_engine_registry(&config).unwrap_err() {
			BuildError::Engine { name, source } => {
				assert_eq!(name, "remote");
				assert!(matches!(source, EngineError::Configuration(_)));
			},
			other => panic!("unexpected error: {other}"),
		}
	}

	#[test]
	fn test_custom_catalog() {
		let mut catalog = FactoryRegistry::new();
		for (name, factory) in fleetops_optimize::get_all_implementations() {
			if name == "distance" {
				catalog.register_engine("greedy", factory);
			}
		}
		let config = config(
			r#"
[optimization.implementations.nearest]
implementation = "greedy"
two_opt = false
"#,
		);

		let registry = build_with(&catalog, &config).unwrap();
		assert!(registry.contains("Nearest"));
	}
}
