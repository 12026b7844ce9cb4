//! Build context shared by every stage of a run.

use crate::build::discovery::{DiscoveryError, GlobSet};
use crate::build::stage::StageKind;
use crate::config::{Environment, ResolvedEnvironment};
use crate::tools::Toolchain;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Build context containing the resolved environment and the collaborators.
///
/// The environment is immutable and shared; cloning a context is cheap and is
/// how concurrent stages and watch workers each get their own handle.
#[derive(Debug, Clone)]
pub struct BuildContext {
    /// Name of the selected environment
    env_name: String,
    /// The selected environment
    env: Arc<Environment>,
    /// Project root directory (where the configuration file lives)
    project_root: PathBuf,
    /// Compile, minify and prefix collaborators
    toolchain: Toolchain,
}

impl BuildContext {
    /// Create a context with the toolchain configured by the environment.
    pub fn new(resolved: &ResolvedEnvironment, project_root: PathBuf) -> Self {
        let toolchain = Toolchain::from_environment(&resolved.env, &project_root);
        Self { env_name: resolved.name.clone(), env: Arc::clone(&resolved.env), project_root, toolchain }
    }

    /// Create a context from its parts.
    pub fn from_parts(env_name: &str, env: Arc<Environment>, project_root: PathBuf, toolchain: Toolchain) -> Self {
        Self { env_name: env_name.to_string(), env, project_root, toolchain }
    }

    /// Replace the collaborators.
    pub fn with_toolchain(mut self, toolchain: Toolchain) -> Self {
        self.toolchain = toolchain;
        self
    }

    /// Get the environment.
    pub fn env(&self) -> &Environment {
        &self.env
    }

    /// Get the environment name.
    pub fn env_name(&self) -> &str {
        &self.env_name
    }

    /// Get the project root directory.
    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    pub fn toolchain(&self) -> &Toolchain {
        &self.toolchain
    }

    /// Resolve a path relative to the project root.
    ///
    /// If the path is absolute, returns it unchanged.
    /// If relative, joins it with the project root.
    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        crate::config::resolve_path(&self.project_root, path)
    }

    /// The output root, resolved.
    pub fn dist_dir(&self) -> PathBuf {
        self.resolve_path(self.env.dist_dir())
    }

    /// Compiled input globs of a stage.
    pub fn input_globs(&self, stage: StageKind) -> Result<GlobSet, DiscoveryError> {
        stage.input_globs(&self.project_root, &self.env)
    }
}

/// Environment used by unit tests across the crate.
#[cfg(test)]
pub(crate) fn sample_environment() -> Environment {
    let toml = r#"
dist = "out"
clean = ["out"]

[html]
src = ["src/*.html"]
outDir = "out"

[typescript]
src = ["src/ts/**/*.ts"]
outDir = "out/js"
outExt = ".js"

[sass]
src = ["src/scss/*.scss"]
outDir = "out/css"
outExt = ".css"

[[assets]]
src = ["src/img/**/*"]
outDir = "out/img"
"#;
    toml::from_str(toml).expect("sample environment parses")
}
