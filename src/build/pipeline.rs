//! Build pipeline orchestration.
//!
//! The pipeline runs the fixed stage vocabulary in one of two orders. A full
//! build is strictly sequential and stops at the first hard failure. Watch
//! startup runs the independent compile stages as one concurrent group
//! between cleanup and markup, and never stops early.

use rayon::prelude::*;
use std::sync::Arc;
use std::time::Instant;

use crate::build::{format_duration, BuildContext, BuildResult, StageError, StageKind, StageReport, StageResult, StageStatus};

/// One entry in an ordering table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Run one stage to completion
    Single(StageKind),
    /// Run these stages concurrently and wait for all of them
    Concurrent(&'static [StageKind]),
}

impl Step {
    pub fn stages(&self) -> &[StageKind] {
        match self {
            Step::Single(kind) => std::slice::from_ref(kind),
            Step::Concurrent(kinds) => kinds,
        }
    }
}

/// Full build: `cleanup → type-compile → style-compile → asset-copy → markup-include → size-report`.
pub const FULL_BUILD: &[Step] = &[
    Step::Single(StageKind::Cleanup),
    Step::Single(StageKind::TypeCompile),
    Step::Single(StageKind::StyleCompile),
    Step::Single(StageKind::AssetCopy),
    Step::Single(StageKind::MarkupInclude),
    Step::Single(StageKind::SizeReport),
];

/// Watch startup: cleanup, then the independent compile stages together, then markup.
pub const WATCH_STARTUP: &[Step] = &[
    Step::Single(StageKind::Cleanup),
    Step::Concurrent(&[StageKind::TypeCompile, StageKind::StyleCompile, StageKind::AssetCopy]),
    Step::Single(StageKind::MarkupInclude),
];

/// Invocation mode of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    FullBuild,
    WatchStartup,
}

impl Mode {
    /// The ordering table of this mode.
    pub fn steps(self) -> &'static [Step] {
        match self {
            Mode::FullBuild => FULL_BUILD,
            Mode::WatchStartup => WATCH_STARTUP,
        }
    }

    /// Whether a hard stage failure stops the remaining steps.
    pub fn halts_on_failure(self) -> bool {
        matches!(self, Mode::FullBuild)
    }

    pub fn name(self) -> &'static str {
        match self {
            Mode::FullBuild => "full build",
            Mode::WatchStartup => "watch startup",
        }
    }
}

/// Executes a single stage. The default runs the real stages; tests substitute their own.
pub trait StageRunner: Send + Sync {
    fn run(&self, stage: StageKind, context: &BuildContext) -> Result<StageReport, StageError>;
}

/// Runs the stages in [`crate::stages`].
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardStages;

impl StageRunner for StandardStages {
    fn run(&self, stage: StageKind, context: &BuildContext) -> Result<StageReport, StageError> {
        crate::stages::run(stage, context)
    }
}

/// Build pipeline for executing builds.
#[derive(Clone)]
pub struct BuildPipeline {
    /// Build context
    context: BuildContext,
    /// Stage implementation
    runner: Arc<dyn StageRunner>,
}

impl BuildPipeline {
    /// Create a new build pipeline running the standard stages.
    pub fn new(context: BuildContext) -> Self {
        Self { context, runner: Arc::new(StandardStages) }
    }

    /// Replace the stage implementation.
    pub fn with_runner(mut self, runner: Arc<dyn StageRunner>) -> Self {
        self.runner = runner;
        self
    }

    pub fn context(&self) -> &BuildContext {
        &self.context
    }

    /// Run one stage and record the outcome. Never panics on stage failure.
    pub fn run_stage(&self, stage: StageKind) -> StageResult {
        tracing::info!("Starting '{}'...", stage);
        let start = Instant::now();
        let outcome = self.runner.run(stage, &self.context);
        let result = StageResult::from_outcome(stage, outcome, start.elapsed());

        let took = format_duration(result.duration);
        match &result.status {
            StageStatus::Success => tracing::info!("Finished '{}' after {}", stage, took),
            StageStatus::Degraded(message) => {
                tracing::warn!("Finished '{}' with errors after {}: {}", stage, took, message)
            }
            StageStatus::Failed(message) => tracing::error!("'{}' failed after {}: {}", stage, took, message),
        }
        result
    }

    /// Run every step of `mode` in order.
    pub fn run(&self, mode: Mode) -> BuildResult {
        let start = Instant::now();
        tracing::debug!("Running {} for environment '{}'", mode.name(), self.context.env_name());

        let mut build = BuildResult::new();
        for step in mode.steps() {
            let results: Vec<StageResult> = match step {
                Step::Single(stage) => vec![self.run_stage(*stage)],
                Step::Concurrent(stages) => stages.par_iter().map(|stage| self.run_stage(*stage)).collect(),
            };

            let failed = results.iter().find(|r| r.status.is_failure()).map(|r| r.stage);
            for result in results {
                build.add_result(result);
            }

            if let Some(stage) = failed {
                if mode.halts_on_failure() {
                    build.halted_at = Some(stage);
                    break;
                }
            }
        }

        build.with_duration(start.elapsed())
    }

    /// Strict sequential build of every stage.
    pub fn full_build(&self) -> BuildResult {
        self.run(Mode::FullBuild)
    }

    /// The build that precedes watching.
    pub fn watch_startup(&self) -> BuildResult {
        self.run(Mode::WatchStartup)
    }
}

impl std::fmt::Debug for BuildPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuildPipeline").field("context", &self.context).finish_non_exhaustive()
    }
}
