//! Build result types.
//!
//! Contains types for representing the outcome of stage runs and pipelines.

use crate::build::stage::{Severity, StageError, StageKind, StageReport};
use std::path::PathBuf;
use std::time::Duration;

/// Status of a single stage run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageStatus {
    /// Stage succeeded
    Success,
    /// Stage reported problems but the pipeline may continue
    Degraded(String),
    /// Stage failed hard
    Failed(String),
}

impl StageStatus {
    /// Check if the status allows the pipeline to continue.
    pub fn is_success(&self) -> bool {
        !self.is_failure()
    }

    /// Check if the status indicates a hard failure.
    pub fn is_failure(&self) -> bool {
        matches!(self, StageStatus::Failed(_))
    }
}

impl std::fmt::Display for StageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StageStatus::Success => write!(f, "success"),
            StageStatus::Degraded(err) => write!(f, "degraded: {}", err),
            StageStatus::Failed(err) => write!(f, "failed: {}", err),
        }
    }
}

/// Record of one stage invocation. Not persisted.
#[derive(Debug, Clone)]
pub struct StageResult {
    /// Stage that ran
    pub stage: StageKind,
    /// Outcome
    pub status: StageStatus,
    /// Input files at invocation time
    pub inputs: Vec<PathBuf>,
    /// Output files produced
    pub outputs: Vec<PathBuf>,
    /// Run duration
    pub duration: Duration,
    /// Informational lines
    pub notes: Vec<String>,
}

impl StageResult {
    /// Build a record from what the stage returned.
    pub fn from_outcome(
        stage: StageKind,
        outcome: Result<StageReport, StageError>,
        duration: Duration,
    ) -> Self {
        match outcome {
            Ok(report) => {
                let status = if report.is_degraded() {
                    StageStatus::Degraded(report.problems.join("; "))
                } else {
                    StageStatus::Success
                };
                Self {
                    stage,
                    status,
                    inputs: report.inputs,
                    outputs: report.outputs,
                    duration,
                    notes: report.notes,
                }
            }
            Err(err) => {
                let status = match err.severity() {
                    Severity::Hard => StageStatus::Failed(err.message),
                    Severity::Degraded | Severity::Observation => StageStatus::Degraded(err.message),
                };
                Self { stage, status, inputs: vec![], outputs: vec![], duration, notes: vec![] }
            }
        }
    }

    /// Create a successful result.
    pub fn success(stage: StageKind, outputs: Vec<PathBuf>, duration: Duration) -> Self {
        Self { stage, status: StageStatus::Success, inputs: vec![], outputs, duration, notes: vec![] }
    }

    /// Create a failed result.
    pub fn failed(stage: StageKind, error: String, duration: Duration) -> Self {
        Self {
            stage,
            status: StageStatus::Failed(error),
            inputs: vec![],
            outputs: vec![],
            duration,
            notes: vec![],
        }
    }

    /// Check if this result lets the pipeline continue.
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

/// Result of a complete pipeline run.
#[derive(Debug, Default)]
pub struct BuildResult {
    /// Results for each stage, in completion order within a group
    pub stages: Vec<StageResult>,
    /// Stage whose hard failure stopped the sequence
    pub halted_at: Option<StageKind>,
    /// Total build duration
    pub total_duration: Duration,
}

impl BuildResult {
    /// Create a new empty build result.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a stage result.
    pub fn add_result(&mut self, result: StageResult) {
        self.stages.push(result);
    }

    /// Set the total duration.
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.total_duration = duration;
        self
    }

    /// Look up the record of a stage.
    pub fn stage(&self, kind: StageKind) -> Option<&StageResult> {
        self.stages.iter().find(|r| r.stage == kind)
    }

    /// Stages that ran, in recorded order.
    pub fn ran(&self) -> Vec<StageKind> {
        self.stages.iter().map(|r| r.stage).collect()
    }

    /// Get the number of clean successes.
    pub fn success_count(&self) -> usize {
        self.stages.iter().filter(|r| matches!(r.status, StageStatus::Success)).count()
    }

    /// Get the number of degraded stages.
    pub fn degraded_count(&self) -> usize {
        self.stages.iter().filter(|r| matches!(r.status, StageStatus::Degraded(_))).count()
    }

    /// Get the number of failed stages.
    pub fn failed_count(&self) -> usize {
        self.stages.iter().filter(|r| r.status.is_failure()).count()
    }

    /// Check if the overall build succeeded (no hard failures).
    pub fn is_success(&self) -> bool {
        self.failed_count() == 0
    }

    /// Get all outputs produced.
    pub fn all_outputs(&self) -> Vec<&PathBuf> {
        self.stages.iter().flat_map(|r| r.outputs.iter()).collect()
    }

    /// Get failed and degraded stage results.
    pub fn problems(&self) -> Vec<&StageResult> {
        self.stages.iter().filter(|r| !matches!(r.status, StageStatus::Success)).collect()
    }

    /// Format a summary of the build result.
    pub fn summary(&self) -> String {
        let mut lines = Vec::new();

        let success = self.success_count();
        let degraded = self.degraded_count();
        let failed = self.failed_count();
        let total = self.stages.len();

        if failed > 0 {
            lines.push(format!(
                "Build failed: {} succeeded, {} degraded, {} failed ({} stages)",
                success, degraded, failed, total
            ));
        } else {
            lines.push(format!(
                "Build succeeded: {} stages ({} degraded) in {}",
                total,
                degraded,
                format_duration(self.total_duration)
            ));
        }

        for stage in self.problems() {
            lines.push(format!("  - {}: {}", stage.stage, stage.status));
        }

        if let Some(halted) = self.halted_at {
            lines.push(format!("  Halted after '{}'; remaining stages skipped", halted));
        }

        lines.join("\n")
    }
}

/// Format duration for display
pub fn format_duration(duration: Duration) -> String {
    let millis = duration.as_millis();
    if millis < 1000 {
        format!("{}ms", millis)
    } else {
        format!("{:.2}s", duration.as_secs_f64())
    }
}
