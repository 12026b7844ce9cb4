//! Task runners (full build, single stages, watch, live server)

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use super::{EXIT_ERROR, EXIT_SUCCESS};
use crate::build::{BuildContext, BuildPipeline, StageKind, StageStatus};
use crate::config::loader::project_root;
use crate::config::{load_config, ConfigError, EnvironmentResolver};
use crate::reload::Notifier;
use crate::watch::WatchCoordinator;

/// Load the configuration and select the environment.
///
/// Nothing touches the filesystem beyond reading the document until this succeeds.
pub fn prepare(config: Option<&Path>, env: Option<&str>) -> Result<BuildContext, ConfigError> {
    let (document, config_path) = load_config(config)?;
    tracing::debug!("Using config: {}", config_path.display());

    let root = match project_root(&config_path) {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let root = root.canonicalize().map_err(|e| ConfigError::Io(root.to_path_buf(), e))?;

    let resolver = EnvironmentResolver::new(document);
    let resolved = resolver.resolve(env)?;
    Ok(BuildContext::new(resolved, root))
}

/// Run the full build
pub fn run_full_build(context: BuildContext) -> ExitCode {
    let result = BuildPipeline::new(context).full_build();

    if result.is_success() {
        println!("{}", result.summary());
        ExitCode::from(EXIT_SUCCESS)
    } else {
        eprintln!("{}", result.summary());
        ExitCode::from(EXIT_ERROR)
    }
}

/// Run one stage on its own. Only a hard failure is an error.
pub fn run_stage(context: BuildContext, stage: StageKind) -> ExitCode {
    let result = BuildPipeline::new(context).run_stage(stage);

    match &result.status {
        StageStatus::Failed(message) => {
            eprintln!("Error: {} failed: {}", stage, message);
            ExitCode::from(EXIT_ERROR)
        }
        _ => ExitCode::from(EXIT_SUCCESS),
    }
}

/// Run the watch-startup build, then watch until terminated.
pub fn run_watch(context: BuildContext) -> ExitCode {
    let pipeline = BuildPipeline::new(context);

    // Startup failures are reported, never fatal
    let startup = pipeline.watch_startup();
    if startup.is_success() {
        tracing::info!("{}", startup.summary());
    } else {
        tracing::warn!("{}", startup.summary());
    }

    let notifier = start_notifier(pipeline.context());
    let coordinator = match WatchCoordinator::new(pipeline, notifier) {
        Ok(coordinator) => coordinator,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::from(EXIT_ERROR);
        }
    };

    println!("Watching for changes. Press Ctrl+C to stop");
    match coordinator.run() {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(e) => {
            eprintln!("Watch error: {}", e);
            ExitCode::from(EXIT_ERROR)
        }
    }
}

/// Start the live-reload server in the background and return its notifier.
#[cfg(feature = "live-server")]
fn start_notifier(context: &BuildContext) -> Arc<dyn Notifier> {
    use crate::reload::BroadcastNotifier;
    use crate::server::{serve, ServerOptions};

    let notifier = BroadcastNotifier::new();
    let options = ServerOptions::from_context(context);
    let server_notifier = notifier.clone();

    std::thread::spawn(move || {
        let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
            Ok(runtime) => runtime,
            Err(e) => {
                tracing::error!("Cannot start live-reload server: {}", e);
                return;
            }
        };
        if let Err(e) = runtime.block_on(serve(options, server_notifier)) {
            tracing::error!("{}", e);
        }
    });

    Arc::new(notifier)
}

#[cfg(not(feature = "live-server"))]
fn start_notifier(_context: &BuildContext) -> Arc<dyn Notifier> {
    tracing::info!("Live reload is not available in this build");
    Arc::new(crate::reload::LogNotifier)
}

/// Serve the output tree until terminated.
#[cfg(feature = "live-server")]
pub fn run_live_server(context: BuildContext) -> ExitCode {
    use crate::reload::BroadcastNotifier;
    use crate::server::{serve, ServerOptions};

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Error: cannot start runtime: {}", e);
            return ExitCode::from(EXIT_ERROR);
        }
    };

    match runtime.block_on(serve(ServerOptions::from_context(&context), BroadcastNotifier::new())) {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::from(EXIT_ERROR)
        }
    }
}

#[cfg(not(feature = "live-server"))]
pub fn run_live_server(_context: BuildContext) -> ExitCode {
    eprintln!("Error: stagehand was built without the live-server feature");
    ExitCode::from(EXIT_ERROR)
}
