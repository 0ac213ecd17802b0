//! Main entry point for the fleet-ops optimization service.
//!
//! The binary builds an engine registry from configuration and either serves
//! it over HTTP or runs a single command against it.

use clap::{Parser, Subcommand};
use fleetops_config::Config;
use fleetops_optimize::EngineRegistry;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;

mod factory_registry;
mod server;

/// Command-line arguments for the optimization service.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
	/// Path to configuration file
	#[arg(short, long, default_value = "config.toml", env = "FLEETOPS_CONFIG")]
	config: PathBuf,

	/// Log level (trace, debug, info, warn, error)
	#[arg(short, long, default_value = "info")]
	log_level: String,

	#[command(subcommand)]
	command: Option<Command>,
}

#[derive(Subcommand, Debug, PartialEq)]
enum Command {
	/// Run the HTTP API (default)
	Serve,
	/// List configured engines as `key<TAB>display name`
	Engines,
	/// Run one optimization and print the plan as JSON
	Optimize {
		/// Engine name; the configured default when omitted
		#[arg(short, long)]
		engine: Option<String>,
		/// JSON file holding the optimization params
		#[arg(short, long)]
		params: PathBuf,
		/// JSON file holding the optimization options
		#[arg(short, long)]
		options: Option<PathBuf>,
	},
}

/// Main entry point for the optimization service.
///
/// This function:
/// 1. Parses command-line arguments
/// 2. Initializes logging infrastructure
/// 3. Loads configuration from file
/// 4. Builds the engine registry from the configured implementations
/// 5. Runs the requested command
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	use tracing_subscriber::{fmt, EnvFilter};

	// RUST_LOG takes precedence over --log-level
	let env_filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

	fmt()
		.with_env_filter(env_filter)
		.with_thread_ids(true)
		.with_target(true)
		// Keep stdout clean for command output
		.with_writer(std::io::stderr)
		.init();

	let config = Config::from_file(&args.config).await?;
	tracing::info!("Loaded configuration [{}]", config.service.id);

	let registry = Arc::new(factory_registry::build_engine_registry(&config)?);
	tracing::info!("Registered {} optimization engines", registry.len());

	match args.command.unwrap_or(Command::Serve) {
		Command::Serve => serve(config, registry).await?,
		Command::Engines => {
			for service in registry.available_services() {
				println!("{}\t{}", service.key, service.display_name);
			}
		},
		Command::Optimize {
			engine,
			params,
			options,
		} => {
			let name = engine
				.or_else(|| config.optimization.default_key())
				.ok_or("No --engine given and no default engine configured")?;
			let params = read_json(&params).await?;
			let options = match options {
				Some(path) => read_json(&path).await?,
				None => Value::Null,
			};

			let plan = registry.optimize(&name, params, options).await?;
			println!("{}", serde_json::to_string_pretty(&plan)?);
		},
	}

	Ok(())
}

async fn serve(
	config: Config,
	registry: Arc<EngineRegistry>,
) -> Result<(), Box<dyn std::error::Error>> {
	let api_config = match config.api {
		Some(ref api) if api.enabled => api.clone(),
		_ => return Err("API server is disabled; set [api] enabled = true".into()),
	};

	let state = server::AppState {
		registry,
		default_engine: config.optimization.default_key(),
	};

	tracing::info!("Started fleet-ops service [{}]", config.service.id);
	tokio::select! {
		result = server::start_server(api_config, state) => result?,
		_ = tokio::signal::ctrl_c() => tracing::info!("Shutdown requested"),
	}
	tracing::info!("Stopped fleet-ops service");

	Ok(())
}

/// Reads a JSON document from `path`.
async fn read_json(path: &Path) -> Result<Value, Box<dyn std::error::Error>> {
	let content = tokio::fs::read_to_string(path)
		.await
		.map_err(|e| format!("Cannot read {}: {}", path.display(), e))?;
	Ok(serde_json::from_str(&content)
		.map_err(|e| format!("Invalid JSON in {}: {}", path.display(), e))?)
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;
	use tempfile::tempdir;

	#[test]
	fn test_defaults_to_serve() {
		let args = Args::try_parse_from(["fleetops"]).unwrap();
		assert_eq!(args.log_level, "info");
		assert!(args.command.is_none());
	}

	#[test]
	fn test_parse_optimize_command() {
		let args = Args::try_parse_from([
			"fleetops",
			"--config",
			"fleet.toml",
			"optimize",
			"--engine",
			"Acme Routing",
			"--params",
			"stops.json",
		])
		.unwrap();

		assert_eq!(args.config, PathBuf::from("fleet.toml"));
		assert_eq!(
			args.command,
			Some(Command::Optimize {
				engine: Some("Acme Routing".to_string()),
				params: PathBuf::from("stops.json"),
				options: None,
			})
		);
	}

	#[test]
	fn test_optimize_requires_params() {
		assert!(Args::try_parse_from(["fleetops", "optimize", "--engine", "distance"]).is_err());
	}

	#[tokio::test]
	async fn test_read_json() {
		let temp_dir = tempdir().unwrap();
		let path = temp_dir.path().join("params.json");
		std::fs::write(&path, r#"{ "stops": [] }"#).unwrap();
		assert_eq!(read_json(&path).await.unwrap(), json!({ "stops": [] }));

		std::fs::write(&path, "not json").unwrap();
		let err = read_json(&path).await.unwrap_err();
		assert!(err.to_string().contains("Invalid JSON"));
	}

	#[tokio::test]
	async fn test_config_file_to_plan() {
		let temp_dir = tempdir().unwrap();
		let config_path = temp_dir.path().join("fleet.toml");
		std::fs::write(
			&config_path,
			r#"
[service]
id = "fleetops-test"

[optimization]
default = "Distance"

[optimization.implementations.distance]
two_opt = false
"#,
		)
		.unwrap();

		let config = Config::from_file(&config_path).await.unwrap();
		let registry = factory_registry::build_engine_registry(&config).unwrap();
		let name = config.optimization.default_key().unwrap();

		let params = json!({
			"stops": [
				{ "id": "a", "location": { "lat": 0.0, "lng": 0.0 } },
				{ "id": "b", "location": { "lat": 0.0, "lng": 0.5 } }
			]
		});
		let plan = registry.optimize(&name, params, Value::Null).await.unwrap();
		assert_eq!(plan.stop_ids(), vec!["a", "b"]);
	}

	#[tokio::test]
	async fn test_serve_requires_enabled_api() {
		let config: Config = r#"
[service]
id = "fleetops-test"

[optimization.implementations.distance]
"#
		.parse()
		.unwrap();

		let err = serve(config, Arc::new(EngineRegistry::new()))
			.await
			.unwrap_err();
		assert!(err.to_string().contains("API server is disabled"));
	}
}
