//! Configuration loading and discovery
//!
//! Finds the configuration document, parses it according to its extension,
//! and validates every declared environment.

use super::schema::ConfigDocument;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File names searched for, in priority order, in each directory.
pub const CONFIG_FILE_NAMES: &[&str] = &["stagehand.toml", "config.json", "config.json5"];

/// Configuration loading and resolution error
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// No configuration document could be found
    #[error("No configuration file found (looked for {})", CONFIG_FILE_NAMES.join(", "))]
    NotFound,
    /// File I/O error
    #[error("Failed to read config {}: {1}", .0.display())]
    Io(PathBuf, #[source] std::io::Error),
    /// Parse error (any supported format)
    #[error("Failed to parse {}: {1}", .0.display())]
    Parse(PathBuf, String),
    /// Unknown file extension
    #[error("Unsupported config format '{}' (expected .toml, .json or .json5)", .0.display())]
    UnsupportedFormat(PathBuf),
    /// Validation error
    #[error("Config validation failed:\n{}", .0.iter().map(|e| format!("  - {}", e)).collect::<Vec<_>>().join("\n"))]
    Validation(Vec<String>),
    /// The document declares no environments
    #[error("No environments declared in the configuration document")]
    NoEnvironments,
    /// The requested environment is not declared
    #[error("Unknown environment '{name}' (available: {})", .available.join(", "))]
    UnknownEnvironment { name: String, available: Vec<String> },
}

/// Find a configuration document by walking up from the current working directory.
///
/// # Returns
/// - `Some(path)` if a configuration file is found
/// - `None` otherwise
pub fn find_config() -> Option<PathBuf> {
    env::current_dir().ok().and_then(find_config_from)
}

/// Find a configuration document by walking up from a specific directory.
///
/// Within one directory `stagehand.toml` wins over `config.json`, which wins
/// over `config.json5`.
pub fn find_config_from(start: PathBuf) -> Option<PathBuf> {
    let mut current = start;

    loop {
        for name in CONFIG_FILE_NAMES {
            let config_path = current.join(name);
            if config_path.is_file() {
                return Some(config_path);
            }
        }

        if !current.pop() {
            return None;
        }
    }
}

/// Load the configuration document.
///
/// If a path is provided, loads from that file. Otherwise uses [`find_config`].
/// Unlike single-project tools there is no built-in default: a missing document
/// is an error.
pub fn load_config(path: Option<&Path>) -> Result<(ConfigDocument, PathBuf), ConfigError> {
    let config_path = match path {
        Some(p) => p.to_path_buf(),
        None => find_config().ok_or(ConfigError::NotFound)?,
    };

    let document = load_config_file(&config_path)?;
    Ok((document, config_path))
}

/// Load configuration from a specific file path.
pub fn load_config_file(path: &Path) -> Result<ConfigDocument, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
    let document = parse_config(path, &contents)?;

    let errors = document.validate();
    if !errors.is_empty() {
        return Err(ConfigError::Validation(errors.into_iter().map(|e| e.to_string()).collect()));
    }

    Ok(document)
}

/// Parse document text, choosing the format from the file extension.
pub fn parse_config(path: &Path, contents: &str) -> Result<ConfigDocument, ConfigError> {
    let parse_err = |e: &dyn std::fmt::Display| ConfigError::Parse(path.to_path_buf(), e.to_string());

    match path.extension().and_then(|e| e.to_str()) {
        Some("toml") => toml::from_str(contents).map_err(|e| parse_err(&e)),
        Some("json") => serde_json::from_str(contents).map_err(|e| parse_err(&e)),
        Some("json5") => json5::from_str(contents).map_err(|e| parse_err(&e)),
        _ => Err(ConfigError::UnsupportedFormat(path.to_path_buf())),
    }
}

/// Get the project root directory from a config file path.
///
/// Returns the parent directory of the configuration file.
pub fn project_root(config_path: &Path) -> Option<&Path> {
    config_path.parent()
}

/// Resolve a path relative to the project root.
///
/// If the path is absolute, returns it unchanged.
/// If relative, joins it with the project root.
pub fn resolve_path(project_root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        project_root.join(path)
    }
}
