//! Registry trait for self-registering engine implementations.
//!
//! Every built-in optimization engine declares the name it is referenced by in
//! configuration together with the factory that builds it.

/// Base trait for implementation registries.
///
/// Each engine module provides a `Registry` unit struct implementing this
/// trait, which is how the service's factory catalog discovers it.
pub trait ImplementationRegistry {
	/// The factory name used in configuration files to select this implementation.
	///
	/// This matches either the table key under `[optimization.implementations]`
	/// or the explicit `implementation = "..."` field inside that table, e.g.
	/// "distance" or "http".
	const NAME: &'static str;

	/// The factory function type this implementation provides.
	type Factory;

	/// Get the factory function for this implementation.
	fn factory() -> Self::Factory;
}
