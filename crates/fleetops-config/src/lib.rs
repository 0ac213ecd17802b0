//! Configuration module for the fleet-ops optimization service.
//!
//! This module provides structures and utilities for managing service
//! configuration. It supports loading configuration from TOML files and
//! validates that the engine registry can be composed from it.
//!
//! ## Modular Configuration Support
//!
//! Configurations can be split into multiple files for better organization:
//! - Use `include = ["file1.toml", "file2.toml"]` to include other config files
//! - Each top-level section must be unique across all files (no duplicates allowed)

mod loader;

use fleetops_types::normalize_key;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// Error that occurs during file I/O operations.
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
	/// Error that occurs when parsing TOML configuration.
	#[error("Configuration error: {0}")]
	Parse(String),
	/// Error that occurs when configuration validation fails.
	#[error("Validation error: {0}")]
	Validation(String),
}

impl From<toml::de::Error> for ConfigError {
	fn from(err: toml::de::Error) -> Self {
		ConfigError::Parse(err.to_string())
	}
}

/// Main configuration structure for the optimization service.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
	/// Identity of this service instance.
	pub service: ServiceConfig,
	/// Engines to register at start-up.
	pub optimization: OptimizationConfig,
	/// Configuration for the HTTP API server.
	pub api: Option<ApiConfig>,
}

/// Configuration specific to the service instance.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceConfig {
	/// Unique identifier for this instance, used in logs.
	pub id: String,
}

/// Key inside an engine table naming the factory to build it with.
pub const IMPLEMENTATION_FIELD: &str = "implementation";
/// Key inside an engine table holding its selector label.
pub const DISPLAY_NAME_FIELD: &str = "display_name";

/// Engines registered at start-up.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OptimizationConfig {
	/// Engine used by requests that do not name one.
	#[serde(default)]
	pub default: Option<String>,
	/// Map of registration names to engine configuration tables.
	///
	/// The table's `implementation` field selects the factory; when absent
	/// the registration name itself is the factory name.
	pub implementations: HashMap<String, toml::Value>,
}

impl OptimizationConfig {
	/// Factory name for the engine registered as `name`.
	pub fn implementation_of<'a>(&'a self, name: &'a str) -> &'a str {
		self.implementations
			.get(name)
			.and_then(|table| table.get(IMPLEMENTATION_FIELD))
			.and_then(|value| value.as_str())
			.unwrap_or(name)
	}

	/// Display name configured for the engine registered as `name`.
	pub fn display_name_of(&self, name: &str) -> Option<&str> {
		self.implementations
			.get(name)
			.and_then(|table| table.get(DISPLAY_NAME_FIELD))
			.and_then(|value| value.as_str())
	}

	/// Normalized key of the default engine, if one is configured.
	pub fn default_key(&self) -> Option<String> {
		self.default.as_deref().map(normalize_key)
	}
}

/// CORS configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CorsConfig {
	/// Allowed origins for CORS. Empty allows any origin.
	#[serde(default)]
	pub allowed_origins: Vec<String>,
}

/// Configuration for the HTTP API server.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
	/// Whether the API server is enabled.
	#[serde(default)]
	pub enabled: bool,
	/// Host address to bind the server to.
	#[serde(default = "default_api_host")]
	pub host: String,
	/// Port to bind the server to.
	#[serde(default = "default_api_port")]
	pub port: u16,
	/// Maximum request size in bytes.
	#[serde(default = "default_max_request_size")]
	pub max_request_size: usize,
	/// CORS configuration; permissive when absent.
	pub cors: Option<CorsConfig>,
}

fn default_api_host() -> String {
	"127.0.0.1".to_string()
}

fn default_api_port() -> u16 {
	3000
}

/// 1 MiB, enough for a few thousand stops.
fn default_max_request_size() -> usize {
	1024 * 1024
}

/// Resolves environment variables in a string.
///
/// Replaces ${VAR_NAME} with the value of the environment variable VAR_NAME.
/// Supports default values with ${VAR_NAME:-default_value}.
///
/// Input strings are limited to 1MB to prevent ReDoS attacks.
pub(crate) fn resolve_env_vars(input: &str) -> Result<String, ConfigError> {
	const MAX_INPUT_SIZE: usize = 1024 * 1024;
	if input.len() > MAX_INPUT_SIZE {
		return Err(ConfigError::Validation(format!(
			"Configuration file too large: {} bytes (max: {} bytes)",
			input.len(),
			MAX_INPUT_SIZE
		)));
	}

	let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]{0,127})(?::-([^}]{0,256}))?\}")
		.map_err(|e| ConfigError::Parse(format!("Regex error: {}", e)))?;

	let mut result = String::with_capacity(input.len());
	let mut last_end = 0;

	for cap in re.captures_iter(input) {
		let (Some(full_match), Some(var_name)) = (cap.get(0), cap.get(1)) else {
			continue;
		};
		let value = match std::env::var(var_name.as_str()) {
			Ok(v) => v,
			Err(_) => match cap.get(2) {
				Some(default) => default.as_str().to_string(),
				None => {
					return Err(ConfigError::Validation(format!(
						"Environment variable '{}' not found",
						var_name.as_str()
					)));
				},
			},
		};

		result.push_str(&input[last_end..full_match.start()]);
		result.push_str(&value);
		last_end = full_match.end();
	}
	result.push_str(&input[last_end..]);

	Ok(result)
}

impl Config {
	/// Loads configuration from a file, following `include` directives.
	///
	/// Each top-level section must be unique across all configuration files.
	pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
		let path = path.as_ref();
		let base_dir = path.parent().unwrap_or_else(|| Path::new("."));

		let mut loader = loader::ConfigLoader::new(base_dir);
		let file_name = path
			.file_name()
			.ok_or_else(|| ConfigError::Validation(format!("Invalid path: {}", path.display())))?;
		loader.load_config(file_name).await
	}

	/// Validates the configuration to ensure the registry can be built from it.
	///
	/// - Ensures the service ID is not empty
	/// - Requires at least one engine, with no two names normalizing to the same key
	/// - Requires every `implementation` field to be a string
	/// - Checks the default engine, if set, names a configured engine
	/// - Checks the API port when the API is enabled
	fn validate(&self) -> Result<(), ConfigError> {
		if self.service.id.trim().is_empty() {
			return Err(ConfigError::Validation("Service ID cannot be empty".into()));
		}

		if self.optimization.implementations.is_empty() {
			return Err(ConfigError::Validation(
				"At least one optimization implementation must be configured".into(),
			));
		}

		let mut keys: HashMap<String, &str> = HashMap::new();
		for (name, table) in &self.optimization.implementations {
			let key = normalize_key(name);
			if key.is_empty() {
				return Err(ConfigError::Validation(format!(
					"Optimization implementation name '{}' has no letters or digits",
					name
				)));
			}
			if !table.is_table() {
				return Err(ConfigError::Validation(format!(
					"Optimization implementation '{}' must be a table",
					name
				)));
			}
			if let Some(implementation) = table.get(IMPLEMENTATION_FIELD) {
				if !implementation.is_str() {
					return Err(ConfigError::Validation(format!(
						"Optimization implementation '{}' has a non-string '{}' field",
						name, IMPLEMENTATION_FIELD
					)));
				}
			}
			if let Some(existing) = keys.insert(key.clone(), name) {
				return Err(ConfigError::Validation(format!(
					"Optimization implementations '{}' and '{}' both normalize to '{}'",
					existing, name, key
				)));
			}
		}

		if let Some(default_key) = self.optimization.default_key() {
			if !keys.contains_key(&default_key) {
				return Err(ConfigError::Validation(format!(
					"Default engine '{}' not found in optimization.implementations",
					self.optimization.default.as_deref().unwrap_or_default()
				)));
			}
		}

		if let Some(ref api) = self.api {
			if api.enabled && api.port == 0 {
				return Err(ConfigError::Validation(
					"API port must be non-zero when the API is enabled".into(),
				));
			}
		}

		Ok(())
	}
}

/// Parses a TOML string, resolving environment variables and validating
/// the result.
impl FromStr for Config {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let resolved = resolve_env_vars(s)?;
		let config: Config = toml::from_str(&resolved)?;
		config.validate()?;
		Ok(config)
	}
}
