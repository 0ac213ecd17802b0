//! API types for the fleet-ops optimization HTTP endpoints.

use crate::RoutePlan;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A registered engine as shown in selection lists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineService {
	/// Normalized registry key.
	pub key: String,
	/// Human readable label; equals `key` when none was given.
	pub display_name: String,
}

/// Response body for `GET /api/engines`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnginesResponse {
	pub engines: Vec<String>,
	pub services: Vec<EngineService>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub default: Option<String>,
}

/// Request body for the optimize endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizeRequest {
	pub params: serde_json::Value,
	#[serde(default)]
	pub options: serde_json::Value,
}

/// Response body for the optimize endpoints.
pub type OptimizeResponse = RoutePlan;

/// Request body for `POST /api/engines/{name}/handler`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandlerRequest {
	pub event: String,
	#[serde(default)]
	pub source: Option<String>,
	#[serde(default)]
	pub data: serde_json::Value,
}

/// JSON error body returned by every endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
	pub error: String,
	pub message: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub details: Option<serde_json::Value>,
}

/// API errors with their HTTP status.
#[derive(Debug, Clone)]
pub enum APIError {
	/// Malformed request or invalid registration (400)
	BadRequest { error_type: String, message: String },
	/// Unknown engine (404)
	NotFound { error_type: String, message: String },
	/// Engine cannot perform the requested operation (422)
	UnprocessableEntity { error_type: String, message: String },
	/// Upstream provider failed (502)
	BadGateway { error_type: String, message: String },
	/// No engine available for the request (503)
	ServiceUnavailable { error_type: String, message: String },
	/// Internal server error (500)
	InternalServerError { error_type: String, message: String },
}

impl APIError {
	/// Get the HTTP status code for this error.
	pub fn status_code(&self) -> u16 {
		match self {
			APIError::BadRequest { .. } => 400,
			APIError::NotFound { .. } => 404,
			APIError::UnprocessableEntity { .. } => 422,
			APIError::BadGateway { .. } => 502,
			APIError::ServiceUnavailable { .. } => 503,
			APIError::InternalServerError { .. } => 500,
		}
	}

	fn parts(&self) -> (&str, &str) {
		match self {
			APIError::BadRequest {
				error_type,
				message,
			}
			| APIError::NotFound {
				error_type,
				message,
			}
			| APIError::UnprocessableEntity {
				error_type,
				message,
			}
			| APIError::BadGateway {
				error_type,
				message,
			}
			| APIError::ServiceUnavailable {
				error_type,
				message,
			}
			| APIError::InternalServerError {
				error_type,
				message,
			} => (error_type.as_str(), message.as_str()),
		}
	}

	/// Convert to ErrorResponse for JSON serialization.
	pub fn to_error_response(&self) -> ErrorResponse {
		let (error_type, message) = self.parts();
		ErrorResponse {
			error: error_type.to_string(),
			message: message.to_string(),
			details: None,
		}
	}
}

impl fmt::Display for APIError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let (error_type, message) = self.parts();
		write!(f, "{} ({}): {}", error_type, self.status_code(), message)
	}
}

impl std::error::Error for APIError {}

impl axum::response::IntoResponse for APIError {
	fn into_response(self) -> axum::response::Response {
		use axum::{http::StatusCode, response::Json};

		let status = StatusCode::from_u16(self.status_code())
			.unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
		(status, Json(self.to_error_response())).into_response()
	}
}
