//! Stage vocabulary.
//!
//! A stage is one named transform unit. The set is fixed, so it is an enum
//! rather than a registry; the executor orders stages with plain tables.

use crate::build::discovery::{DiscoveryError, GlobSet};
use crate::config::{resolve_path, Environment};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// One named transform unit in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum StageKind {
    /// Delete the declared output paths
    Cleanup,
    /// Compile, optionally minify, and map the script sources
    TypeCompile,
    /// Prefix, compile, optionally minify, and map the stylesheet sources
    StyleCompile,
    /// Expand inclusion directives in markup files
    MarkupInclude,
    /// Copy declared asset sets verbatim
    AssetCopy,
    /// Measure the output tree
    SizeReport,
}

/// How a stage failure propagates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Halts a full build; reported only in watch mode
    Hard,
    /// Logged; the pipeline continues
    Degraded,
    /// Logged; never affects the exit status
    Observation,
}

impl StageKind {
    /// All stages, in full-build order.
    pub const ALL: [StageKind; 6] = [
        StageKind::Cleanup,
        StageKind::TypeCompile,
        StageKind::StyleCompile,
        StageKind::AssetCopy,
        StageKind::MarkupInclude,
        StageKind::SizeReport,
    ];

    /// The task name of this stage.
    pub fn name(self) -> &'static str {
        match self {
            StageKind::Cleanup => "cleanup",
            StageKind::TypeCompile => "type-compile",
            StageKind::StyleCompile => "style-compile",
            StageKind::MarkupInclude => "markup-include",
            StageKind::AssetCopy => "asset-copy",
            StageKind::SizeReport => "size-report",
        }
    }

    /// Look a stage up by task name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    /// Failure policy of this stage. Style errors never halt a build.
    pub fn severity(self) -> Severity {
        match self {
            StageKind::StyleCompile => Severity::Degraded,
            StageKind::SizeReport => Severity::Observation,
            _ => Severity::Hard,
        }
    }

    /// Raw input patterns this stage reads, straight from the environment.
    pub fn input_patterns(self, env: &Environment) -> Vec<String> {
        match self {
            StageKind::TypeCompile => env.typescript.src.clone(),
            StageKind::StyleCompile => env.sass.compile.src.clone(),
            StageKind::MarkupInclude => env.html.src.clone(),
            StageKind::AssetCopy => env.assets.iter().flat_map(|a| a.src.iter().cloned()).collect(),
            StageKind::Cleanup => vec![],
            StageKind::SizeReport => vec![format!("{}/**/*", env.dist_dir().display())],
        }
    }

    /// The compiled input glob set, used by the watcher without running the stage.
    pub fn input_globs(self, root: &Path, env: &Environment) -> Result<GlobSet, DiscoveryError> {
        GlobSet::new(root, &self.input_patterns(env))
    }

    /// Directories this stage writes into.
    pub fn output_dirs(self, root: &Path, env: &Environment) -> Vec<PathBuf> {
        match self {
            StageKind::TypeCompile => vec![resolve_path(root, &env.typescript.out_dir)],
            StageKind::StyleCompile => vec![resolve_path(root, &env.sass.compile.out_dir)],
            StageKind::MarkupInclude => vec![resolve_path(root, &env.html.out_dir)],
            StageKind::AssetCopy => env.assets.iter().map(|a| resolve_path(root, &a.out_dir)).collect(),
            StageKind::Cleanup | StageKind::SizeReport => vec![],
        }
    }
}

impl std::fmt::Display for StageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Successful (possibly degraded) outcome of one stage run.
#[derive(Debug, Clone, Default)]
pub struct StageReport {
    /// Input files seen at invocation time
    pub inputs: Vec<PathBuf>,
    /// Files written (or, for cleanup, paths removed)
    pub outputs: Vec<PathBuf>,
    /// Non-fatal problems; a non-empty list makes the run degraded
    pub problems: Vec<String>,
    /// Informational lines for the operator
    pub notes: Vec<String>,
}

impl StageReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_inputs(mut self, inputs: Vec<PathBuf>) -> Self {
        self.inputs = inputs;
        self
    }

    pub fn is_degraded(&self) -> bool {
        !self.problems.is_empty()
    }
}

/// A stage failure, carrying the stage name and the collaborator's message.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{stage} failed: {message}")]
pub struct StageError {
    pub stage: StageKind,
    pub message: String,
}

impl StageError {
    pub fn new(stage: StageKind, message: impl Into<String>) -> Self {
        Self { stage, message: message.into() }
    }

    /// Severity follows from the failing stage.
    pub fn severity(&self) -> Severity {
        self.stage.severity()
    }
}
