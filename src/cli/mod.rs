//! Command-line interface implementation
//!
//! This module provides the CLI entry point and dispatches tasks to the
//! runners in [`build`].

mod build;

use clap::{CommandFactory, Parser, ValueEnum};
use std::path::PathBuf;
use std::process::ExitCode;

use crate::build::StageKind;

/// Process exit codes
pub(crate) const EXIT_SUCCESS: u8 = 0;
pub(crate) const EXIT_ERROR: u8 = 1;
pub(crate) const EXIT_INVALID_ARGS: u8 = 2;

/// A task selectable on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Task {
    /// Clean, compile, copy, expand and report, in order
    #[value(aliases = ["build", "default"])]
    FullBuild,
    /// Build, serve the output with live reload, and rebuild on change
    Watch,
    /// Compile the script sources
    #[value(alias = "ts")]
    TypeCompile,
    /// Compile the stylesheet sources
    #[value(alias = "sass")]
    StyleCompile,
    /// Expand include directives in the markup sources
    #[value(alias = "html")]
    MarkupInclude,
    /// Copy the declared asset sets
    #[value(alias = "assets")]
    AssetCopy,
    /// Delete the declared output paths
    #[value(alias = "clean")]
    Cleanup,
    /// Report the size of the output tree
    #[value(alias = "size-dist")]
    SizeReport,
    /// Serve the output tree with live reload
    #[value(alias = "browser-sync")]
    LiveServer,
    /// Print this help
    Help,
}

impl Task {
    /// The single stage this task runs, if it is a stage task.
    pub fn stage(self) -> Option<StageKind> {
        match self {
            Task::TypeCompile => Some(StageKind::TypeCompile),
            Task::StyleCompile => Some(StageKind::StyleCompile),
            Task::MarkupInclude => Some(StageKind::MarkupInclude),
            Task::AssetCopy => Some(StageKind::AssetCopy),
            Task::Cleanup => Some(StageKind::Cleanup),
            Task::SizeReport => Some(StageKind::SizeReport),
            Task::FullBuild | Task::Watch | Task::LiveServer | Task::Help => None,
        }
    }
}

/// Stagehand - configuration-driven asset builds with watch mode and live reload
#[derive(Debug, Parser)]
#[command(name = "stagehand")]
#[command(about = "Stagehand - build script, stylesheet, markup and asset outputs for one environment")]
#[command(version)]
pub struct Cli {
    /// Task to run
    #[arg(value_enum, default_value_t = Task::FullBuild)]
    pub task: Task,

    /// Environment to build (defaults to the first one declared)
    #[arg(short, long)]
    pub env: Option<String>,

    /// Configuration file (defaults to stagehand.toml, config.json or
    /// config.json5 in the working directory or one of its parents)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Show per-file detail
    #[arg(short, long)]
    pub verbose: bool,
}

/// Entry point: parse arguments and run the selected task.
pub fn run() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let code = if e.use_stderr() { EXIT_INVALID_ARGS } else { EXIT_SUCCESS };
            let _ = e.print();
            return ExitCode::from(code);
        }
    };

    crate::logging::init(cli.verbose);

    if cli.task == Task::Help {
        let _ = Cli::command().print_long_help();
        return ExitCode::from(EXIT_SUCCESS);
    }

    let context = match build::prepare(cli.config.as_deref(), cli.env.as_deref()) {
        Ok(context) => context,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::from(EXIT_ERROR);
        }
    };

    match cli.task {
        Task::FullBuild => build::run_full_build(context),
        Task::Watch => build::run_watch(context),
        Task::LiveServer => build::run_live_server(context),
        task => match task.stage() {
            Some(stage) => build::run_stage(context, stage),
            None => ExitCode::from(EXIT_INVALID_ARGS),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_task_is_full_build() {
        let cli = Cli::try_parse_from(["stagehand"]).unwrap();
        assert_eq!(cli.task, Task::FullBuild);
        assert_eq!(cli.env, None);
    }

    #[test]
    fn test_task_names_and_aliases() {
        let parse = |name: &str| Cli::try_parse_from(["stagehand", name]).unwrap().task;
        assert_eq!(parse("full-build"), Task::FullBuild);
        assert_eq!(parse("default"), Task::FullBuild);
        assert_eq!(parse("build"), Task::FullBuild);
        assert_eq!(parse("ts"), Task::TypeCompile);
        assert_eq!(parse("sass"), Task::StyleCompile);
        assert_eq!(parse("html"), Task::MarkupInclude);
        assert_eq!(parse("assets"), Task::AssetCopy);
        assert_eq!(parse("clean"), Task::Cleanup);
        assert_eq!(parse("size-dist"), Task::SizeReport);
        assert_eq!(parse("browser-sync"), Task::LiveServer);
        assert_eq!(parse("live-server"), Task::LiveServer);
        assert_eq!(parse("watch"), Task::Watch);
        assert_eq!(parse("help"), Task::Help);
    }

    #[test]
    fn test_environment_flag() {
        let cli = Cli::try_parse_from(["stagehand", "watch", "--env", "prod", "-v"]).unwrap();
        assert_eq!(cli.task, Task::Watch);
        assert_eq!(cli.env.as_deref(), Some("prod"));
        assert!(cli.verbose);
    }

    #[test]
    fn test_unknown_task_is_rejected() {
        assert!(Cli::try_parse_from(["stagehand", "deploy"]).is_err());
    }

    #[test]
    fn test_stage_tasks() {
        assert_eq!(Task::Cleanup.stage(), Some(StageKind::Cleanup));
        assert_eq!(Task::SizeReport.stage(), Some(StageKind::SizeReport));
        assert_eq!(Task::Watch.stage(), None);
    }

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }
}
