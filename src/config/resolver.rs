//! Environment selection
//!
//! Picks one environment out of a [`ConfigDocument`], either by explicit name
//! or by taking the first-declared one. The selection is computed at most once
//! per resolver and then handed out as an immutable, shareable value.

use super::loader::ConfigError;
use super::schema::{ConfigDocument, Environment};
use std::sync::{Arc, OnceLock};

/// The outcome of environment selection.
#[derive(Debug, Clone)]
pub struct ResolvedEnvironment {
    /// Name of the selected environment
    pub name: String,
    /// The selected environment (read-only, shared across stages)
    pub env: Arc<Environment>,
}

/// Select an environment from a document.
///
/// - Empty document: [`ConfigError::NoEnvironments`]
/// - Requested name not declared: [`ConfigError::UnknownEnvironment`]
/// - No name requested: the first-declared environment
pub fn resolve(
    document: &ConfigDocument,
    requested: Option<&str>,
) -> Result<ResolvedEnvironment, ConfigError> {
    let (name, env) = document.first().ok_or(ConfigError::NoEnvironments)?;

    let (name, env) = match requested {
        None => (name, env),
        Some(wanted) => match document.get(wanted) {
            Some(env) => (wanted, env),
            None => {
                return Err(ConfigError::UnknownEnvironment {
                    name: wanted.to_string(),
                    available: document.names().map(str::to_string).collect(),
                })
            }
        },
    };

    Ok(ResolvedEnvironment { name: name.to_string(), env: Arc::new(env.clone()) })
}

/// Memoizing resolver owning the loaded document.
///
/// The first successful [`EnvironmentResolver::resolve`] call fixes the
/// selection; later calls return it without consulting the document again.
#[derive(Debug)]
pub struct EnvironmentResolver {
    document: ConfigDocument,
    selected: OnceLock<ResolvedEnvironment>,
}

impl EnvironmentResolver {
    pub fn new(document: ConfigDocument) -> Self {
        Self { document, selected: OnceLock::new() }
    }

    /// Resolve (or return the cached) environment selection.
    pub fn resolve(&self, requested: Option<&str>) -> Result<&ResolvedEnvironment, ConfigError> {
        if let Some(selected) = self.selected.get() {
            if requested.is_some_and(|r| r != selected.name) {
                tracing::debug!(
                    "Environment already resolved to '{}', ignoring request for '{}'",
                    selected.name,
                    requested.unwrap_or_default()
                );
            }
            return Ok(selected);
        }

        let resolved = resolve(&self.document, requested)?;
        tracing::info!("Using environment '{}'", resolved.name);
        Ok(self.selected.get_or_init(|| resolved))
    }

    /// The selection, if one has been made.
    pub fn selected(&self) -> Option<&ResolvedEnvironment> {
        self.selected.get()
    }
}
