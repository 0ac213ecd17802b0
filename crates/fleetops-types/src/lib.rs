//! Common types module for the fleet-ops route optimization system.
//!
//! This module defines the data types shared by the engine registry, the
//! built-in engines, the configuration layer and the HTTP service, so that
//! every crate speaks the same route and plan vocabulary.

/// API types for HTTP endpoints and request/response structures.
pub mod api;
/// Base trait for self-registering engine implementations.
pub mod registry;
/// Route, plan and handler context types.
pub mod route;
/// Redacting wrapper for API keys and other credentials.
pub mod secret_string;
/// Utility functions for key normalization, geodesy and time.
pub mod utils;
/// Configuration validation types for ensuring type-safe configurations.
pub mod validation;

pub use api::*;
pub use registry::ImplementationRegistry;
pub use route::*;
pub use secret_string::SecretString;
pub use utils::{current_timestamp, haversine_meters, normalize_key};
pub use validation::*;
