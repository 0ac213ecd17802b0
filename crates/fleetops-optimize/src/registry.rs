//! Named registry of route optimization engines.
//!
//! The registry maps normalized engine keys to engine implementations and
//! forwards `optimize` and `handler` calls to them. One instance is built by
//! the application's composition root and shared by handle; tests construct
//! their own.

use crate::{EngineError, OptimizationEngine};
use dashmap::DashMap;
use fleetops_types::{normalize_key, EngineService, HandlerContext, RoutePlan};
use futures::future::{self, BoxFuture, FutureExt};
use serde_json::Value;
use std::sync::Arc;

/// A registered engine.
#[derive(Clone)]
pub struct EngineEntry {
	pub key: String,
	pub display_name: String,
	pub engine: Arc<dyn OptimizationEngine>,
}

impl std::fmt::Debug for EngineEntry {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("EngineEntry")
			.field("key", &self.key)
			.field("display_name", &self.display_name)
			.finish_non_exhaustive()
	}
}

/// Registry of optimization engines keyed by normalized name.
///
/// Registration and lookup may happen from any thread; a lookup always sees
/// the latest completed registration. No lock is held while an engine runs.
#[derive(Debug, Default)]
pub struct EngineRegistry {
	entries: DashMap<String, EngineEntry>,
}

impl EngineRegistry {
	/// Creates an empty registry.
	pub fn new() -> Self {
		Self::default()
	}

	/// Registers `engine` under `name`, replacing any engine already using
	/// the same normalized key.
	///
	/// The display name is taken from the engine, falling back to the key.
	/// Returns the normalized key.
	///
	/// # Errors
	///
	/// Returns `EngineError::ContractViolation` when `name` normalizes to an
	/// empty key or the engine does not expose `optimize`. Nothing is
	/// registered in that case.
	pub fn register(
		&self,
		name: &str,
		engine: Arc<dyn OptimizationEngine>,
	) -> Result<String, EngineError> {
		let display_name = engine.display_name();
		self.insert(name, display_name, engine)
	}

	/// Registers `engine` under `name` with an explicit display name.
	pub fn register_with_display_name(
		&self,
		name: &str,
		display_name: impl Into<String>,
		engine: Arc<dyn OptimizationEngine>,
	) -> Result<String, EngineError> {
		self.insert(name, Some(display_name.into()), engine)
	}

	fn insert(
		&self,
		name: &str,
		display_name: Option<String>,
		engine: Arc<dyn OptimizationEngine>,
	) -> Result<String, EngineError> {
		let key = normalize_key(name);
		if key.is_empty() {
			return Err(EngineError::ContractViolation {
				name: name.to_string(),
				reason: "engine name must contain at least one letter or digit".to_string(),
			});
		}
		if !engine.capabilities().optimize {
			return Err(EngineError::ContractViolation {
				name: name.to_string(),
				reason: "engine does not expose an optimize operation".to_string(),
			});
		}

		let display_name = display_name
			.filter(|label| !label.trim().is_empty())
			.unwrap_or_else(|| key.clone());
		let entry = EngineEntry {
			key: key.clone(),
			display_name,
			engine,
		};

		if self.entries.insert(key.clone(), entry).is_some() {
			tracing::info!(engine = %key, "Replaced optimization engine");
		} else {
			tracing::info!(engine = %key, "Registered optimization engine");
		}
		Ok(key)
	}

	/// Removes the engine registered under `name`.
	///
	/// Returns whether an engine was removed; an unknown name is not an error.
	pub fn unregister(&self, name: &str) -> bool {
		let key = normalize_key(name);
		let removed = self.entries.remove(&key).is_some();
		if removed {
			tracing::info!(engine = %key, "Unregistered optimization engine");
		}
		removed
	}

	/// Returns true if an engine is registered under `name`.
	pub fn contains(&self, name: &str) -> bool {
		self.entries.contains_key(&normalize_key(name))
	}

	/// Returns the registration for `name`, if any.
	pub fn entry(&self, name: &str) -> Option<EngineEntry> {
		self.entries
			.get(&normalize_key(name))
			.map(|entry| entry.value().clone())
	}

	fn lookup(&self, name: &str) -> Result<EngineEntry, EngineError> {
		self.entry(name).ok_or_else(|| {
			tracing::warn!(engine = %name, "No optimization engine registered");
			EngineError::NotFound(name.to_string())
		})
	}

	/// Dispatches an optimization request to the engine registered as `name`.
	///
	/// The lookup happens when this method is called. If it fails, no engine
	/// is invoked and the returned future resolves to `EngineError::NotFound`.
	/// Errors from the engine are returned unchanged.
	pub fn optimize(
		&self,
		name: &str,
		params: Value,
		options: Value,
	) -> BoxFuture<'static, Result<RoutePlan, EngineError>> {
		let entry = match self.lookup(name) {
			Ok(entry) => entry,
			Err(e) => return future::ready(Err(e)).boxed(),
		};

		tracing::debug!(engine = %entry.key, "Dispatching optimization request");
		async move { entry.engine.optimize(&params, &options).await }.boxed()
	}

	/// Dispatches an event to the handler of the engine registered as `name`.
	///
	/// Unlike [`optimize`](Self::optimize) this runs synchronously, and a
	/// missing engine is reported immediately as `EngineError::NotFound`.
	pub fn handler(
		&self,
		name: &str,
		context: &HandlerContext,
		data: &Value,
	) -> Result<Value, EngineError> {
		let entry = self.lookup(name)?;
		if !entry.engine.capabilities().handler {
			return Err(EngineError::Unsupported {
				engine: entry.key,
				capability: "handler".to_string(),
			});
		}

		tracing::debug!(engine = %entry.key, event = %context.event, "Dispatching engine event");
		entry.engine.handler(context, data)
	}

	/// Keys of all registered engines, sorted.
	pub fn available_engines(&self) -> Vec<String> {
		let mut keys: Vec<String> = self.entries.iter().map(|e| e.key().clone()).collect();
		keys.sort();
		keys
	}

	/// Key and display name of all registered engines, sorted by key.
	pub fn available_services(&self) -> Vec<EngineService> {
		let mut services: Vec<EngineService> = self
			.entries
			.iter()
			.map(|e| EngineService {
				key: e.value().key.clone(),
				display_name: e.value().display_name.clone(),
			})
			.collect();
		services.sort_by(|a, b| a.key.cmp(&b.key));
		services
	}

	/// Number of registered engines.
	pub fn len(&self) -> usize {
		self.entries.len()
	}

	/// Returns true if no engine is registered.
	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::EngineCapabilities;
	use async_trait::async_trait;
	use fleetops_types::{ConfigSchema, Schema, ValidationError};
	use serde_json::json;
	use std::sync::Mutex;

	struct EmptySchema;

	impl ConfigSchema for EmptySchema {
		fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
			Schema::new(vec![], vec![]).validate(config)
		}
	}

	/// Records every call so tests can check what was forwarded.
	#[derive(Default)]
	struct RecordingEngine {
		tag: &'static str,
		label: Option<&'static str>,
		with_handler: bool,
		calls: Mutex<Vec<(Value, Value)>>,
	}

	impl RecordingEngine {
		fn new(tag: &'static str) -> Arc<Self> {
			Arc::new(Self {
				tag,
				..Default::default()
			})
		}

		fn calls(&self) -> Vec<(Value, Value)> {
			self.calls.lock().unwrap().clone()
		}
	}

	#[async_trait]
	impl OptimizationEngine for RecordingEngine {
		fn config_schema(&self) -> Box<dyn ConfigSchema> {
			Box::new(EmptySchema)
		}

		fn display_name(&self) -> Option<String> {
			self.label.map(str::to_string)
		}

		fn capabilities(&self) -> EngineCapabilities {
			EngineCapabilities {
				optimize: true,
				handler: self.with_handler,
			}
		}

		async fn optimize(&self, params: &Value, options: &Value) -> Result<RoutePlan, EngineError> {
			self.calls
				.lock()
				.unwrap()
				.push((params.clone(), options.clone()));
			let mut plan = RoutePlan::new(self.tag, vec![]);
			plan.metadata = json!({ "tag": self.tag });
			Ok(plan)
		}

		fn handler(&self, context: &HandlerContext, data: &Value) -> Result<Value, EngineError> {
			Ok(json!({ "tag": self.tag, "event": context.event, "data": data }))
		}
	}

	/// An engine that only reacts to events, which the registry must reject.
	struct HandlerOnlyEngine;

	#[async_trait]
	impl OptimizationEngine for HandlerOnlyEngine {
		fn config_schema(&self) -> Box<dyn ConfigSchema> {
			Box::new(EmptySchema)
		}

		fn capabilities(&self) -> EngineCapabilities {
			EngineCapabilities {
				optimize: false,
				handler: true,
			}
		}

		async fn optimize(&self, _params: &Value, _options: &Value) -> Result<RoutePlan, EngineError> {
			unreachable!("never registered")
		}
	}

	struct FailingEngine;

	#[async_trait]
	impl OptimizationEngine for FailingEngine {
		fn config_schema(&self) -> Box<dyn ConfigSchema> {
			Box::new(EmptySchema)
		}

		async fn optimize(&self, _params: &Value, _options: &Value) -> Result<RoutePlan, EngineError> {
			Err(EngineError::Provider("quota exceeded".to_string()))
		}
	}

	/// Declares a handler but keeps the trait's default one.
	struct UndeclaredHandlerEngine;

	#[async_trait]
	impl OptimizationEngine for UndeclaredHandlerEngine {
		fn config_schema(&self) -> Box<dyn ConfigSchema> {
			Box::new(EmptySchema)
		}

		fn capabilities(&self) -> EngineCapabilities {
			EngineCapabilities {
				optimize: true,
				handler: true,
			}
		}

		async fn optimize(&self, _params: &Value, _options: &Value) -> Result<RoutePlan, EngineError> {
			Ok(RoutePlan::new("undeclared", vec![]))
		}
	}

	#[tokio::test]
	async fn test_register_then_optimize_forwards_arguments() {
		let registry = EngineRegistry::new();
		let engine = RecordingEngine::new("osrm");
		let key = registry.register("OSRM", engine.clone()).unwrap();

		assert_eq!(key, "osrm");
		assert_eq!(registry.available_engines(), vec!["osrm"]);

		let params = json!({ "stops": [{ "id": "order-1" }] });
		let options = json!({ "traffic": true });
		let plan = registry
			.optimize("osrm", params.clone(), options.clone())
			.await
			.unwrap();

		assert_eq!(plan.engine, "osrm");
		assert_eq!(engine.calls(), vec![(params, options)]);
	}

	#[tokio::test]
	async fn test_lookup_ignores_case_and_separators() {
		let registry = EngineRegistry::new();
		let engine = RecordingEngine::new("google");
		registry.register("Google Maps", engine.clone()).unwrap();

		let plan = registry
			.optimize("google-maps", json!({}), Value::Null)
			.await
			.unwrap();
		assert_eq!(plan.engine, "google");
		assert_eq!(engine.calls().len(), 1);
		assert!(registry.contains("GOOGLE_MAPS"));
		assert_eq!(registry.available_engines(), vec!["google-maps"]);
	}

	#[tokio::test]
	async fn test_lookup_resolves_case_only_variants() {
		let registry = EngineRegistry::new();
		let engine = RecordingEngine::new("google");
		let key = registry.register("GoogleMaps", engine.clone()).unwrap();
		assert_eq!(key, "googlemaps");

		for name in ["googlemaps", "GOOGLEMAPS", "googleMaps"] {
			let plan = registry
				.optimize(name, json!({}), Value::Null)
				.await
				.unwrap();
			assert_eq!(plan.engine, "google");
		}
		assert_eq!(engine.calls().len(), 3);

		registry.register("OSRM", RecordingEngine::new("osrm")).unwrap();
		assert!(registry.contains("osRM"));
		assert_eq!(registry.available_engines(), vec!["googlemaps", "osrm"]);
	}

	#[test]
	fn test_engine_without_optimize_is_rejected() {
		let registry = EngineRegistry::new();
		let err = registry.register("x", Arc::new(HandlerOnlyEngine)).unwrap_err();

		match err {
			EngineError::ContractViolation { name, reason } => {
				assert_eq!(name, "x");
				assert!(reason.contains("optimize"));
			},
			other => panic!("unexpected error: {other}"),
		}
		assert!(registry.available_engines().is_empty());
	}

	#[test]
	fn test_blank_name_is_rejected() {
		let registry = EngineRegistry::new();
		for name in ["", "   ", "--_"] {
			let err = registry
				.register(name, RecordingEngine::new("blank"))
				.unwrap_err();
			assert!(matches!(err, EngineError::ContractViolation { .. }));
		}
		assert!(registry.is_empty());
	}

	#[tokio::test]
	async fn test_unregister_removes_access() {
		let registry = EngineRegistry::new();
		let engine = RecordingEngine::new("x");
		registry.register("x", engine.clone()).unwrap();

		assert!(registry.unregister("X"));
		assert!(!registry.available_engines().contains(&"x".to_string()));

		let err = registry
			.optimize("x", json!({}), Value::Null)
			.await
			.unwrap_err();
		assert!(matches!(err, EngineError::NotFound(name) if name == "x"));
		assert!(engine.calls().is_empty());
	}

	#[test]
	fn test_unregister_unknown_name_is_noop() {
		let registry = EngineRegistry::new();
		registry.register("distance", RecordingEngine::new("d")).unwrap();

		assert!(!registry.unregister("never-registered"));
		assert_eq!(registry.len(), 1);
	}

	#[tokio::test]
	async fn test_optimize_not_found_is_deferred_to_the_future() {
		let registry = EngineRegistry::new();

		// Calling optimize hands back a future; the failure only surfaces when awaited.
		let pending = registry.optimize("missing", json!({}), Value::Null);
		let err = pending.await.unwrap_err();
		assert!(matches!(err, EngineError::NotFound(name) if name == "missing"));
	}

	#[test]
	fn test_handler_not_found_is_immediate() {
		let registry = EngineRegistry::new();
		let context = HandlerContext::new("optimization.completed");

		let result: Result<Value, EngineError> = registry.handler("missing", &context, &json!({}));
		assert!(matches!(result, Err(EngineError::NotFound(name)) if name == "missing"));
	}

	#[tokio::test]
	async fn test_last_registration_wins() {
		let registry = EngineRegistry::new();
		let first = RecordingEngine::new("first");
		let second = RecordingEngine::new("second");
		registry.register("x", first.clone()).unwrap();
		registry.register("X", second.clone()).unwrap();

		let plan = registry.optimize("x", json!({}), Value::Null).await.unwrap();
		assert_eq!(plan.engine, "second");
		assert!(first.calls().is_empty());
		assert_eq!(second.calls().len(), 1);
		assert_eq!(registry.len(), 1);
	}

	#[test]
	fn test_handler_dispatch() {
		let registry = EngineRegistry::new();
		let engine = Arc::new(RecordingEngine {
			tag: "hooks",
			with_handler: true,
			..Default::default()
		});
		registry.register("hooks", engine).unwrap();

		let context = HandlerContext::new("optimization.completed");
		let out = registry
			.handler("Hooks", &context, &json!({ "job": 7 }))
			.unwrap();
		assert_eq!(out["tag"], "hooks");
		assert_eq!(out["event"], "optimization.completed");
		assert_eq!(out["data"]["job"], 7);
	}

	#[test]
	fn test_handler_on_engine_without_handler_is_unsupported() {
		let registry = EngineRegistry::new();
		registry.register("plain", RecordingEngine::new("plain")).unwrap();

		let err = registry
			.handler("plain", &HandlerContext::new("ping"), &Value::Null)
			.unwrap_err();
		match err {
			EngineError::Unsupported { engine, capability } => {
				assert_eq!(engine, "plain");
				assert_eq!(capability, "handler");
			},
			other => panic!("unexpected error: {other}"),
		}
	}

	#[test]
	fn test_default_handler_names_the_engine_type() {
		let registry = EngineRegistry::new();
		registry
			.register("undeclared", Arc::new(UndeclaredHandlerEngine))
			.unwrap();

		let err = registry
			.handler("undeclared", &HandlerContext::new("ping"), &Value::Null)
			.unwrap_err();
		match err {
			EngineError::Unsupported { engine, capability } => {
				assert!(engine.ends_with("UndeclaredHandlerEngine"), "engine {:?}", engine);
				assert_eq!(capability, "handler");
			},
			other => panic!("unexpected error: {other}"),
		}
	}

	#[test]
	fn test_registry_debug_lists_entries() {
		let registry = EngineRegistry::new();
		registry.register("osrm", RecordingEngine::new("osrm")).unwrap();
		assert!(format!("{:?}", registry).contains("osrm"));
	}

	#[tokio::test]
	async fn test_engine_errors_pass_through_unchanged() {
		let registry = EngineRegistry::new();
		registry.register("flaky", Arc::new(FailingEngine)).unwrap();

		let err = registry
			.optimize("flaky", json!({}), Value::Null)
			.await
			.unwrap_err();
		assert!(matches!(err, EngineError::Provider(msg) if msg == "quota exceeded"));
	}

	#[test]
	fn test_available_services_display_names() {
		let registry = EngineRegistry::new();
		let labelled = Arc::new(RecordingEngine {
			tag: "v",
			label: Some("VROOM Solver"),
			..Default::default()
		});
		registry.register("vroom", labelled).unwrap();
		registry.register("distance", RecordingEngine::new("d")).unwrap();
		registry
			.register_with_display_name(
				"Google Maps",
				"Google Route Optimization",
				RecordingEngine::new("g"),
			)
			.unwrap();

		let services = registry.available_services();
		assert_eq!(
			services,
			vec![
				EngineService {
					key: "distance".to_string(),
					display_name: "distance".to_string(),
				},
				EngineService {
					key: "google-maps".to_string(),
					display_name: "Google Route Optimization".to_string(),
				},
				EngineService {
					key: "vroom".to_string(),
					display_name: "VROOM Solver".to_string(),
				},
			]
		);
	}

	#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
	async fn test_registrations_from_other_threads_are_visible() {
		let registry = Arc::new(EngineRegistry::new());

		let mut tasks = Vec::new();
		for i in 0..16 {
			let registry = Arc::clone(&registry);
			tasks.push(tokio::spawn(async move {
				registry
					.register(&format!("Engine {}", i), RecordingEngine::new("spawned"))
					.unwrap();
			}));
		}
		for task in tasks {
			task.await.unwrap();
		}

		assert_eq!(registry.len(), 16);
		let plan = registry
			.optimize("engine-15", json!({}), Value::Null)
			.await
			.unwrap();
		assert_eq!(plan.engine, "spawned");
	}
}
