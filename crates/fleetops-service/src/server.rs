//! HTTP server for the fleet-ops optimization API.
//!
//! Exposes the engine registry over JSON endpoints under `/api`.

use axum::{
	extract::{DefaultBodyLimit, Path, State},
	http::{header, HeaderMap, HeaderValue, Method},
	response::Json,
	routing::{get, post},
	Router,
};
use fleetops_config::{ApiConfig, CorsConfig};
use fleetops_optimize::EngineRegistry;
use fleetops_types::{
	APIError, EnginesResponse, HandlerContext, HandlerRequest, OptimizeRequest, OptimizeResponse,
};
use serde_json::Value;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
	cors::{AllowOrigin, CorsLayer},
	trace::TraceLayer,
};

/// Shared application state for the API server.
#[derive(Clone)]
pub struct AppState {
	/// Engines reachable by name.
	pub registry: Arc<EngineRegistry>,
	/// Normalized key used by `POST /api/optimize`.
	pub default_engine: Option<String>,
}

/// Starts the HTTP server and serves until the listener fails.
pub async fn start_server(
	api_config: ApiConfig,
	state: AppState,
) -> Result<(), Box<dyn std::error::Error>> {
	let app = router(state, &api_config)?;

	let bind_address = format!("{}:{}", api_config.host, api_config.port);
	let listener = TcpListener::bind(&bind_address).await?;

	tracing::info!("Fleet-ops optimization API starting on {}", bind_address);

	axum::serve(listener, app).await?;

	Ok(())
}

/// Builds the API router with its middleware stack.
pub fn router(
	state: AppState,
	api_config: &ApiConfig,
) -> Result<Router, header::InvalidHeaderValue> {
	let cors = cors_layer(api_config.cors.as_ref())?;

	Ok(Router::new()
		.nest(
			"/api",
			Router::new()
				.route("/engines", get(handle_list_engines))
				.route("/engines/{name}/optimize", post(handle_engine_optimize))
				.route("/engines/{name}/handler", post(handle_engine_event))
				.route("/optimize", post(handle_default_optimize)),
		)
		.layer(
			ServiceBuilder::new()
				.layer(TraceLayer::new_for_http())
				.layer(cors)
				.layer(DefaultBodyLimit::max(api_config.max_request_size)),
		)
		.with_state(state))
}

/// Permissive unless specific origins are configured.
fn cors_layer(cors: Option<&CorsConfig>) -> Result<CorsLayer, header::InvalidHeaderValue> {
	let origins = match cors {
		Some(cors) if !cors.allowed_origins.is_empty() => &cors.allowed_origins,
		_ => return Ok(CorsLayer::permissive()),
	};

	let origins = origins
		.iter()
		.map(|origin| HeaderValue::from_str(origin))
		.collect::<Result<Vec<_>, _>>()?;

	Ok(CorsLayer::new()
		.allow_origin(AllowOrigin::list(origins))
		.allow_methods([Method::GET, Method::POST])
		.allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]))
}

/// Handles GET /api/engines requests.
async fn handle_list_engines(State(state): State<AppState>) -> Json<EnginesResponse> {
	Json(EnginesResponse {
		engines: state.registry.available_engines(),
		services: state.registry.available_services(),
		default: state.default_engine.clone(),
	})
}

/// Handles POST /api/engines/{name}/optimize requests.
async fn handle_engine_optimize(
	State(state): State<AppState>,
	Path(name): Path<String>,
	Json(request): Json<OptimizeRequest>,
) -> Result<Json<OptimizeResponse>, APIError> {
	optimize(&state, &name, request).await
}

/// Handles POST /api/optimize requests with the configured default engine.
async fn handle_default_optimize(
	State(state): State<AppState>,
	Json(request): Json<OptimizeRequest>,
) -> Result<Json<OptimizeResponse>, APIError> {
	let Some(name) = state.default_engine.clone() else {
		return Err(APIError::ServiceUnavailable {
			error_type: "NO_DEFAULT_ENGINE".to_string(),
			message: "No default optimization engine is configured".to_string(),
		});
	};
	optimize(&state, &name, request).await
}

async fn optimize(
	state: &AppState,
	name: &str,
	request: OptimizeRequest,
) -> Result<Json<OptimizeResponse>, APIError> {
	match state
		.registry
		.optimize(name, request.params, request.options)
		.await
	{
		Ok(plan) => Ok(Json(plan)),
		Err(e) => {
			tracing::warn!(engine = %name, "Optimization request failed: {}", e);
			Err(APIError::from(e))
		},
	}
}

/// Handles POST /api/engines/{name}/handler requests.
///
/// Request headers starting with `x-` are passed to the engine as context
/// attributes.
async fn handle_engine_event(
	State(state): State<AppState>,
	Path(name): Path<String>,
	headers: HeaderMap,
	Json(request): Json<HandlerRequest>,
) -> Result<Json<Value>, APIError> {
	let mut context = HandlerContext::new(request.event);
	context.source = request.source;
	context.attributes = headers
		.iter()
		.filter(|(key, _)| key.as_str().starts_with("x-"))
		.filter_map(|(key, value)| Some((key.to_string(), value.to_str().ok()?.to_string())))
		.collect();

	match state.registry.handler(&name, &context, &request.data) {
		Ok(value) => Ok(Json(value)),
		Err(e) => {
			tracing::warn!(engine = %name, event = %context.event, "Engine event failed: {}", e);
			Err(APIError::from(e))
		},
	}
}
