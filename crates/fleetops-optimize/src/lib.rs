//! Route optimization module for the fleet-ops system.
//!
//! This module defines the contract every route optimization engine must
//! satisfy, the errors engines and the registry report, and the
//! [`EngineRegistry`] through which callers reach engines by name without
//! depending on any concrete provider.

use async_trait::async_trait;
use fleetops_types::{APIError, ConfigSchema, HandlerContext, ImplementationRegistry, RoutePlan};
use serde_json::Value;
use thiserror::Error;

/// Re-export implementations
pub mod implementations {
	pub mod distance;
	pub mod http;
}

mod registry;

pub use registry::{EngineEntry, EngineRegistry};

/// Errors that can occur during engine registration and dispatch.
///
/// The registry produces `NotFound` and `ContractViolation`; every other
/// variant comes from an engine and is returned to the caller unchanged.
#[derive(Debug, Error)]
pub enum EngineError {
	/// No engine is registered under the requested name.
	#[error("No optimization engine registered as '{0}'")]
	NotFound(String),
	/// A registration did not satisfy the engine contract.
	#[error("Engine '{name}' violates the engine contract: {reason}")]
	ContractViolation { name: String, reason: String },
	/// The engine does not expose the requested capability.
	#[error("Engine '{engine}' does not support {capability}")]
	Unsupported { engine: String, capability: String },
	/// Params, options or event data could not be interpreted.
	#[error("Invalid parameters: {0}")]
	InvalidParams(String),
	/// The external provider answered with an error.
	#[error("Provider error: {0}")]
	Provider(String),
	/// The external provider could not be reached.
	#[error("Network error: {0}")]
	Network(String),
	/// The engine configuration is invalid.
	#[error("Configuration error: {0}")]
	Configuration(String),
}

impl From<EngineError> for APIError {
	fn from(err: EngineError) -> Self {
		let message = err.to_string();
		match err {
			EngineError::NotFound(_) => APIError::NotFound {
				error_type: "ENGINE_NOT_FOUND".to_string(),
				message,
			},
			EngineError::ContractViolation { .. } => APIError::BadRequest {
				error_type: "CONTRACT_VIOLATION".to_string(),
				message,
			},
			EngineError::InvalidParams(_) => APIError::BadRequest {
				error_type: "INVALID_PARAMS".to_string(),
				message,
			},
			EngineError::Unsupported { .. } => APIError::UnprocessableEntity {
				error_type: "UNSUPPORTED_OPERATION".to_string(),
				message,
			},
			EngineError::Provider(_) => APIError::BadGateway {
				error_type: "PROVIDER_ERROR".to_string(),
				message,
			},
			EngineError::Network(_) => APIError::BadGateway {
				error_type: "PROVIDER_UNREACHABLE".to_string(),
				message,
			},
			EngineError::Configuration(_) => APIError::InternalServerError {
				error_type: "ENGINE_MISCONFIGURED".to_string(),
				message,
			},
		}
	}
}

/// Operations an engine declares it exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineCapabilities {
	/// Direct request/response optimization. Required for registration.
	pub optimize: bool,
	/// Event-driven invocation through [`OptimizationEngine::handler`].
	pub handler: bool,
}

impl Default for EngineCapabilities {
	fn default() -> Self {
		Self {
			optimize: true,
			handler: false,
		}
	}
}

/// Trait defining the interface for route optimization engines.
///
/// This trait must be implemented by any provider that wants to be plugged
/// into the [`EngineRegistry`]. Params and options are passed through
/// verbatim from the caller; each engine defines the shapes it accepts.
#[async_trait]
pub trait OptimizationEngine: Send + Sync {
	/// Returns the configuration schema for this engine implementation.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;

	/// Human readable label used when the registration gives none.
	fn display_name(&self) -> Option<String> {
		None
	}

	/// Declares which entry points this engine exposes.
	fn capabilities(&self) -> EngineCapabilities {
		EngineCapabilities::default()
	}

	/// Computes an optimized route plan.
	///
	/// # Arguments
	///
	/// * `params` - Description of the optimization request
	/// * `options` - Call-site behaviour switches, `Value::Null` when absent
	async fn optimize(&self, params: &Value, options: &Value) -> Result<RoutePlan, EngineError>;

	/// Handles an event-driven invocation such as a provider webhook.
	///
	/// An engine reports `handler: true` from
	/// [`capabilities`](Self::capabilities) if and only if it overrides this
	/// method. The registry never calls the default for engines that report
	/// `handler: false`; an engine that reports `true` without overriding it
	/// gets `Unsupported` naming its display name, or its type when it has
	/// none.
	fn handler(&self, _context: &HandlerContext, _data: &Value) -> Result<Value, EngineError> {
		Err(EngineError::Unsupported {
			engine: self
				.display_name()
				.unwrap_or_else(|| std::any::type_name::<Self>().to_string()),
			capability: "handler".to_string(),
		})
	}
}

/// Type alias for engine factory functions.
///
/// Factories receive the registry key the engine is configured under and
/// the engine's raw configuration table.
pub type EngineFactory = fn(&str, &toml::Value) -> Result<Box<dyn OptimizationEngine>, EngineError>;

/// Registry trait for engine implementations.
///
/// This trait extends the base ImplementationRegistry to specify that
/// engine implementations must provide an EngineFactory.
pub trait EngineFactoryRegistry: ImplementationRegistry<Factory = EngineFactory> {}

/// Get all built-in engine implementations.
///
/// Returns a vector of (name, factory) tuples used by the service's factory
/// catalog to resolve `implementation` names from configuration.
pub fn get_all_implementations() -> Vec<(&'static str, EngineFactory)> {
	use implementations::{distance, http};

	vec![
		(distance::Registry::NAME, distance::Registry::factory()),
		(http::Registry::NAME, http::Registry::factory()),
	]
}
