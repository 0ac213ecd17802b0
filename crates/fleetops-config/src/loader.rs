//! Loader for configurations split across several files.
//!
//! A file may name other files through a top-level `include` key holding a
//! path or an array of paths, relative to the directory of the entry file.
//! Included files may include further files. Every top-level section must
//! come from exactly one file.

use crate::{resolve_env_vars, Config, ConfigError};
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};

const INCLUDE_KEY: &str = "include";

/// Configuration loader that follows `include` directives.
pub struct ConfigLoader {
	/// Directory relative includes are resolved against
	base_path: PathBuf,
	/// Canonical paths already read, for circular include detection
	loaded_files: HashSet<PathBuf>,
	/// File each top-level section came from, for error reporting
	section_sources: HashMap<String, PathBuf>,
}

impl ConfigLoader {
	pub fn new(base_path: impl AsRef<Path>) -> Self {
		Self {
			base_path: base_path.as_ref().to_path_buf(),
			loaded_files: HashSet::new(),
			section_sources: HashMap::new(),
		}
	}

	/// Loads a configuration file together with everything it includes.
	pub async fn load_config(
		&mut self,
		config_path: impl AsRef<Path>,
	) -> Result<Config, ConfigError> {
		let mut pending = VecDeque::from([self.resolve_path(config_path)?]);
		let mut combined = toml::Table::new();

		while let Some(path) = pending.pop_front() {
			let mut table = self.load_table(&path).await?;
			for include in Self::extract_includes(&mut table)? {
				pending.push_back(self.resolve_path(include)?);
			}
			self.merge(&mut combined, table, &path)?;
		}

		tracing::debug!(
			files = self.loaded_files.len(),
			sections = combined.len(),
			"Loaded configuration"
		);

		let config: Config = toml::Value::Table(combined).try_into()?;
		config.validate()?;
		Ok(config)
	}

	/// Reads a file, resolves environment variables and parses it.
	async fn load_table(&mut self, path: &Path) -> Result<toml::Table, ConfigError> {
		let canonical_path = path.canonicalize().map_err(|e| {
			ConfigError::Io(std::io::Error::new(
				std::io::ErrorKind::NotFound,
				format!("Cannot resolve path {}: {}", path.display(), e),
			))
		})?;

		if !self.loaded_files.insert(canonical_path.clone()) {
			return Err(ConfigError::Validation(format!(
				"Circular include detected: {} was already loaded",
				canonical_path.display()
			)));
		}

		let content = tokio::fs::read_to_string(path).await?;
		let resolved = resolve_env_vars(&content)?;
		Ok(toml::from_str(&resolved)?)
	}

	/// Removes the include directive from a table and returns its paths.
	fn extract_includes(table: &mut toml::Table) -> Result<Vec<PathBuf>, ConfigError> {
		match table.remove(INCLUDE_KEY) {
			None => Ok(Vec::new()),
			Some(toml::Value::String(path)) => Ok(vec![PathBuf::from(path)]),
			Some(toml::Value::Array(items)) => items
				.into_iter()
				.map(|item| match item {
					toml::Value::String(path) => Ok(PathBuf::from(path)),
					_ => Err(ConfigError::Validation(
						"Include array must contain only strings".into(),
					)),
				})
				.collect(),
			Some(_) => Err(ConfigError::Validation(
				"Include must be a string or array of strings".into(),
			)),
		}
	}

	/// Moves every section of `table` into `combined`, rejecting duplicates.
	fn merge(
		&mut self,
		combined: &mut toml::Table,
		table: toml::Table,
		source: &Path,
	) -> Result<(), ConfigError> {
		for (key, value) in table {
			if let Some(existing_source) = self.section_sources.get(&key) {
				return Err(ConfigError::Validation(format!(
					"Duplicate section '{}' found in {} and {}. \
					Each top-level section must be unique across all configuration files.",
					key,
					existing_source.display(),
					source.display()
				)));
			}
			self.section_sources.insert(key.clone(), source.to_path_buf());
			combined.insert(key, value);
		}
		Ok(())
	}

	/// Resolves a path relative to the base path.
	fn resolve_path(&self, path: impl AsRef<Path>) -> Result<PathBuf, ConfigError> {
		let path = path.as_ref();

		let resolved = if path.is_absolute() {
			path.to_path_buf()
		} else {
			self.base_path.join(path)
		};

		if !resolved.exists() {
			return Err(ConfigError::Io(std::io::Error::new(
				std::io::ErrorKind::NotFound,
				format!("Configuration file not found: {}", resolved.display()),
			)));
		}

		Ok(resolved)
	}
}
