//! Watch mode: re-run individual stages when their sources change.
//!
//! Every watched stage owns a subscription (its input glob set). A debounced
//! batch of file-system events is routed to the stages whose subscription
//! matches, and each matching stage is re-invoked once. Each stage has its own
//! worker, so re-invocations of one stage never overlap while different stages
//! may run side by side.

use notify::RecursiveMode;
use notify_debouncer_mini::new_debouncer;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use crate::build::{BuildPipeline, DiscoveryError, GlobSet, StageKind, StageResult, StageStatus};
use crate::reload::{Notifier, ReloadScope};

/// Stages that are re-run on change, in routing order.
pub const WATCHED: [StageKind; 4] =
    [StageKind::TypeCompile, StageKind::StyleCompile, StageKind::MarkupInclude, StageKind::AssetCopy];

/// Error during watch mode
#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    /// Failed to initialize file watcher
    #[error("Failed to initialize file watcher: {0}")]
    WatcherInit(#[source] notify::Error),
    /// Failed to add watch path
    #[error("Failed to watch {}: {source}", path.display())]
    WatchPath { path: PathBuf, source: notify::Error },
    /// A stage's input globs could not be compiled
    #[error("Cannot watch '{stage}': {source}")]
    Subscription { stage: StageKind, source: DiscoveryError },
    /// No watched stage has an existing source directory
    #[error("Nothing to watch: no source directory exists")]
    NothingToWatch,
    /// Event channel closed
    #[error("Watch channel error: {0}")]
    Channel(String),
}

/// A stage's interest in file-system changes.
#[derive(Debug, Clone)]
pub struct Subscription {
    pub stage: StageKind,
    globs: GlobSet,
}

impl Subscription {
    pub fn new(stage: StageKind, globs: GlobSet) -> Self {
        Self { stage, globs }
    }

    /// Whether a change at `path` concerns this stage.
    pub fn matches(&self, path: &Path) -> bool {
        self.globs.matches(path)
    }

    pub fn watch_roots(&self) -> Vec<PathBuf> {
        self.globs.watch_roots()
    }
}

/// Tracks stages whose last run failed, for recovery messages.
#[derive(Debug, Default)]
pub struct StageHealth {
    failing: HashSet<StageKind>,
}

impl StageHealth {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a run; returns true when the stage just recovered.
    pub fn update(&mut self, result: &StageResult) -> bool {
        if matches!(result.status, StageStatus::Success) {
            self.failing.remove(&result.stage)
        } else {
            self.failing.insert(result.stage);
            false
        }
    }

    pub fn is_failing(&self, stage: StageKind) -> bool {
        self.failing.contains(&stage)
    }

    pub fn failing_count(&self) -> usize {
        self.failing.len()
    }
}

/// Routes changes to stages, re-runs them and requests reloads.
#[derive(Clone)]
pub struct WatchCoordinator {
    pipeline: Arc<BuildPipeline>,
    notifier: Arc<dyn Notifier>,
    subscriptions: Arc<Vec<Subscription>>,
    health: Arc<Mutex<StageHealth>>,
    debounce: Duration,
}

impl WatchCoordinator {
    /// Subscribe every watched stage that declares inputs.
    pub fn new(pipeline: BuildPipeline, notifier: Arc<dyn Notifier>) -> Result<Self, WatchError> {
        let context = pipeline.context();
        let debounce = Duration::from_millis(u64::from(context.env().watch.debounce_ms));

        let mut subscriptions = Vec::new();
        for stage in WATCHED {
            let globs =
                context.input_globs(stage).map_err(|source| WatchError::Subscription { stage, source })?;
            if globs.is_empty() {
                tracing::debug!("'{}' declares no inputs; not watching it", stage);
                continue;
            }
            subscriptions.push(Subscription::new(stage, globs));
        }

        Ok(Self {
            pipeline: Arc::new(pipeline),
            notifier,
            subscriptions: Arc::new(subscriptions),
            health: Arc::new(Mutex::new(StageHealth::new())),
            debounce,
        })
    }

    /// Override the debounce window.
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    pub fn subscriptions(&self) -> &[Subscription] {
        &self.subscriptions
    }

    pub fn pipeline(&self) -> &BuildPipeline {
        &self.pipeline
    }

    /// Stages concerned by a batch of changed paths, each at most once.
    pub fn route(&self, paths: &[PathBuf]) -> Vec<StageKind> {
        self.subscriptions
            .iter()
            .filter(|sub| paths.iter().any(|path| sub.matches(path)))
            .map(|sub| sub.stage)
            .collect()
    }

    /// Re-run one stage, then request the matching reload.
    ///
    /// Failures are logged and remembered; they never end the watch.
    pub fn reinvoke(&self, stage: StageKind) -> StageResult {
        let result = self.pipeline.run_stage(stage);

        let recovered = match self.health.lock() {
            Ok(mut health) => health.update(&result),
            Err(poisoned) => poisoned.into_inner().update(&result),
        };
        if recovered {
            tracing::info!("'{}' recovered", stage);
        }

        self.notifier.notify(ReloadScope::after(stage, &result.outputs));
        result
    }

    /// Whether `stage` failed on its last re-invocation.
    pub fn is_failing(&self, stage: StageKind) -> bool {
        match self.health.lock() {
            Ok(health) => health.is_failing(stage),
            Err(poisoned) => poisoned.into_inner().is_failing(stage),
        }
    }

    /// Existing directories to watch, with nested ones folded into their parents.
    /// Nothing outside the project root is watched.
    pub fn watch_roots(&self) -> Vec<PathBuf> {
        let project_root = self.pipeline.context().project_root();
        let mut roots: Vec<PathBuf> = self
            .subscriptions
            .iter()
            .flat_map(|s| s.watch_roots())
            .filter(|root| root.starts_with(project_root))
            .collect();
        roots.sort();
        roots.dedup();

        let mut folded: Vec<PathBuf> = Vec::new();
        for root in roots {
            if !folded.iter().any(|parent| root.starts_with(parent)) {
                folded.push(root);
            }
        }
        folded
    }

    /// Start one worker per subscribed stage.
    pub fn spawn_workers(&self) -> Dispatcher {
        let mut senders = HashMap::new();
        let mut handles = Vec::new();
        for sub in self.subscriptions.iter() {
            let (tx, rx) = channel();
            let coordinator = self.clone();
            let stage = sub.stage;
            handles.push(std::thread::spawn(move || stage_worker(&coordinator, stage, rx)));
            senders.insert(stage, tx);
        }
        Dispatcher { senders, handles }
    }

    /// Watch until the process is terminated. Returns only on setup failure.
    pub fn run(self) -> Result<(), WatchError> {
        let roots = self.watch_roots();
        if roots.is_empty() {
            return Err(WatchError::NothingToWatch);
        }

        let (tx, rx) = channel();
        let mut debouncer = new_debouncer(self.debounce, tx).map_err(WatchError::WatcherInit)?;
        for root in &roots {
            debouncer
                .watcher()
                .watch(root, RecursiveMode::Recursive)
                .map_err(|source| WatchError::WatchPath { path: root.clone(), source })?;
            tracing::debug!("Watching {}", root.display());
        }

        let dispatcher = self.spawn_workers();
        tracing::info!("Watching {} director(ies) for changes...", roots.len());

        loop {
            match rx.recv() {
                Ok(Ok(events)) => {
                    let paths: Vec<PathBuf> = events.into_iter().map(|e| e.path).collect();
                    for stage in self.route(&paths) {
                        tracing::info!("Change detected for '{}'", stage);
                        dispatcher.trigger(stage);
                    }
                }
                Ok(Err(error)) => {
                    // Non-fatal; keep watching
                    tracing::warn!("Watch error: {:?}", error);
                }
                Err(e) => {
                    return Err(WatchError::Channel(e.to_string()));
                }
            }
        }
    }
}

impl std::fmt::Debug for WatchCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchCoordinator")
            .field("subscriptions", &self.subscriptions)
            .field("debounce", &self.debounce)
            .finish_non_exhaustive()
    }
}

/// Serializes one stage's re-invocations. Requests arriving while a run is in
/// flight collapse into a single follow-up run.
fn stage_worker(coordinator: &WatchCoordinator, stage: StageKind, rx: Receiver<()>) {
    while rx.recv().is_ok() {
        while rx.try_recv().is_ok() {}
        coordinator.reinvoke(stage);
    }
    tracing::debug!("'{}' worker stopped", stage);
}

/// Handle to the per-stage workers.
#[derive(Debug)]
pub struct Dispatcher {
    senders: HashMap<StageKind, Sender<()>>,
    handles: Vec<JoinHandle<()>>,
}

impl Dispatcher {
    /// Queue a re-invocation of `stage`. Unsubscribed stages are ignored.
    pub fn trigger(&self, stage: StageKind) {
        if let Some(tx) = self.senders.get(&stage) {
            if tx.send(()).is_err() {
                tracing::warn!("'{}' worker is gone", stage);
            }
        }
    }

    /// Stop accepting requests and wait for queued runs to finish.
    pub fn shutdown(self) {
        drop(self.senders);
        for handle in self.handles {
            if handle.join().is_err() {
                tracing::error!("A stage worker panicked");
            }
        }
    }
}
