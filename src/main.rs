//! Stagehand - command-line asset build orchestrator

use std::process::ExitCode;

use stagehand::cli;

fn main() -> ExitCode {
    cli::run()
}
