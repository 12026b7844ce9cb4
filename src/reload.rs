//! Reload notifications for connected browsers.
//!
//! Notifications are best-effort: there is no retry and nothing is queued for
//! clients that connect later.

use serde::Serialize;
use std::path::PathBuf;

use crate::build::StageKind;

/// What connected clients should do after a stage re-ran.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "scope", rename_all = "camelCase")]
pub enum ReloadScope {
    /// Reload the whole page
    Full,
    /// Swap in the listed outputs without navigating
    StreamUpdate { stage: StageKind, paths: Vec<PathBuf> },
}

impl ReloadScope {
    /// Scope requested after `stage` re-ran and produced `outputs`.
    ///
    /// Script and style re-runs stream their outputs; every other stage asks
    /// for a full reload.
    pub fn after(stage: StageKind, outputs: &[PathBuf]) -> Self {
        match stage {
            StageKind::TypeCompile | StageKind::StyleCompile => {
                ReloadScope::StreamUpdate { stage, paths: outputs.to_vec() }
            }
            _ => ReloadScope::Full,
        }
    }

    pub fn is_full(&self) -> bool {
        matches!(self, ReloadScope::Full)
    }
}

impl std::fmt::Display for ReloadScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReloadScope::Full => write!(f, "full reload"),
            ReloadScope::StreamUpdate { stage, paths } => {
                write!(f, "stream update from '{}' ({} file(s))", stage, paths.len())
            }
        }
    }
}

/// Sink for reload requests.
pub trait Notifier: Send + Sync {
    fn notify(&self, scope: ReloadScope);
}

/// Notifier that only logs. Used when no live-reload transport is running.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, scope: ReloadScope) {
        tracing::debug!("Reload requested: {}", scope);
    }
}

#[cfg(feature = "live-server")]
pub use broadcast::BroadcastNotifier;

#[cfg(feature = "live-server")]
mod broadcast {
    use super::{Notifier, ReloadScope};
    use tokio::sync::broadcast;

    const CAPACITY: usize = 64;

    /// Fans notifications out to every subscribed client stream.
    #[derive(Debug, Clone)]
    pub struct BroadcastNotifier {
        sender: broadcast::Sender<ReloadScope>,
    }

    impl BroadcastNotifier {
        pub fn new() -> Self {
            let (sender, _) = broadcast::channel(CAPACITY);
            Self { sender }
        }

        pub fn subscribe(&self) -> broadcast::Receiver<ReloadScope> {
            self.sender.subscribe()
        }

        pub fn client_count(&self) -> usize {
            self.sender.receiver_count()
        }
    }

    impl Default for BroadcastNotifier {
        fn default() -> Self {
            Self::new()
        }
    }

    impl Notifier for BroadcastNotifier {
        fn notify(&self, scope: ReloadScope) {
            match self.sender.send(scope) {
                Ok(clients) => tracing::debug!("Sent reload to {} client(s)", clients),
                // No connected clients
                Err(broadcast::error::SendError(scope)) => tracing::debug!("Dropped {}: no clients", scope),
            }
        }
    }
}
