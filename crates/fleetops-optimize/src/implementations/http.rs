//! External solver API engine.
//!
//! Forwards optimization requests to a remote routing service over HTTP and
//! accepts that service's webhook callbacks through the engine handler.

use crate::{
	EngineCapabilities, EngineError, EngineFactory, EngineFactoryRegistry, OptimizationEngine,
};
use async_trait::async_trait;
use fleetops_types::{
	ConfigSchema, Field, FieldType, HandlerContext, ImplementationRegistry, RoutePlan, Schema,
	SecretString, ValidationError,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

/// Webhook event sent when a remote optimization job finishes.
pub const EVENT_COMPLETED: &str = "optimization.completed";
/// Webhook event sent when a remote optimization job fails.
pub const EVENT_FAILED: &str = "optimization.failed";

/// Configuration for the HTTP engine.
#[derive(Debug, Clone, Deserialize)]
pub struct HttpEngineConfig {
	/// Base URL of the solver API; requests go to `{base_url}/optimize`.
	pub base_url: String,
	/// Bearer token sent with every request. Empty means none.
	#[serde(default)]
	pub api_key: Option<SecretString>,
	#[serde(default = "default_timeout_seconds")]
	pub timeout_seconds: u64,
	#[serde(default)]
	pub display_name: Option<String>,
}

fn default_timeout_seconds() -> u64 {
	30
}

/// Configuration schema for HttpEngine.
pub struct HttpEngineSchema;

impl ConfigSchema for HttpEngineSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			// Required fields
			vec![Field::new("base_url", FieldType::Url)],
			// Optional fields
			vec![
				Field::new("api_key", FieldType::String),
				Field::new(
					"timeout_seconds",
					FieldType::Integer {
						min: Some(1),
						max: Some(300),
					},
				),
				Field::new("display_name", FieldType::String),
			],
		);
		schema.validate(config)
	}
}

/// Engine that delegates to a remote solver API.
pub struct HttpEngine {
	key: String,
	config: HttpEngineConfig,
	client: reqwest::Client,
}

impl HttpEngine {
	pub fn new(key: impl Into<String>, config: HttpEngineConfig) -> Result<Self, EngineError> {
		let client = reqwest::Client::builder()
			.timeout(Duration::from_secs(config.timeout_seconds))
			.build()
			.map_err(|e| EngineError::Configuration(format!("Failed to build HTTP client: {}", e)))?;

		Ok(Self {
			key: key.into(),
			config,
			client,
		})
	}

	fn endpoint(&self) -> String {
		format!("{}/optimize", self.config.base_url.trim_end_matches('/'))
	}

	fn api_key(&self) -> Option<&SecretString> {
		self.config.api_key.as_ref().filter(|key| !key.is_empty())
	}
}

#[async_trait]
impl OptimizationEngine for HttpEngine {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(HttpEngineSchema)
	}

	fn display_name(&self) -> Option<String> {
		self.config.display_name.clone()
	}

	fn capabilities(&self) -> EngineCapabilities {
		EngineCapabilities {
			optimize: true,
			handler: true,
		}
	}

	async fn optimize(&self, params: &Value, options: &Value) -> Result<RoutePlan, EngineError> {
		let url = self.endpoint();
		let mut request = self
			.client
			.post(&url)
			.json(&json!({ "params": params, "options": options }));
		if let Some(key) = self.api_key() {
			request = request.bearer_auth(key.expose_secret());
		}

		tracing::debug!(engine = %self.key, url = %url, "Sending optimization request");
		let response = request
			.send()
			.await
			.map_err(|e| EngineError::Network(format!("request to {} failed: {}", url, e)))?;

		let status = response.status();
		if !status.is_success() {
			let body = response.text().await.unwrap_or_default();
			tracing::warn!(engine = %self.key, status = %status, "Solver API rejected request");
			return Err(EngineError::Provider(format!(
				"{} returned {}: {}",
				url, status, body
			)));
		}

		let mut plan: RoutePlan = response
			.json()
			.await
			.map_err(|e| EngineError::Provider(format!("invalid plan from {}: {}", url, e)))?;
		plan.engine = self.key.clone();
		Ok(plan)
	}

	fn handler(&self, context: &HandlerContext, data: &Value) -> Result<Value, EngineError> {
		match context.event.as_str() {
			EVENT_COMPLETED => {
				let mut plan: RoutePlan = serde_json::from_value(data.clone()).map_err(|e| {
					EngineError::InvalidParams(format!("invalid completed job payload: {}", e))
				})?;
				plan.engine = self.key.clone();
				tracing::info!(engine = %self.key, plan = %plan.id, "Remote optimization completed");
				Ok(json!({ "status": "completed", "plan": plan }))
			},
			EVENT_FAILED => {
				let reason = data
					.get("reason")
					.and_then(Value::as_str)
					.unwrap_or("unknown");
				tracing::warn!(engine = %self.key, reason, "Remote optimization failed");
				Ok(json!({ "status": "failed", "reason": reason }))
			},
			other => Err(EngineError::InvalidParams(format!(
				"unsupported event '{}'",
				other
			))),
		}
	}
}

/// Factory function to create an HTTP engine from configuration.
///
/// Configuration parameters:
/// - `base_url`: solver API base URL (required)
/// - `api_key`: bearer token
/// - `timeout_seconds`: request timeout, 1 to 300 (default: 30)
/// - `display_name`: label shown in engine selectors
pub fn create_engine(
	key: &str,
	config: &toml::Value,
) -> Result<Box<dyn OptimizationEngine>, EngineError> {
	HttpEngineSchema
		.validate(config)
		.map_err(|e| EngineError::Configuration(format!("Invalid http config: {}", e)))?;

	let engine_config: HttpEngineConfig = config
		.clone()
		.try_into()
		.map_err(|e| EngineError::Configuration(format!("Invalid http config: {}", e)))?;

	Ok(Box::new(HttpEngine::new(key, engine_config)?))
}

/// Registry for the HTTP engine implementation.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "http";
	type Factory = EngineFactory;

	fn factory() -> Self::Factory {
		create_engine
	}
}

impl EngineFactoryRegistry for Registry {}
