//! # Background Action Queue
//!
//! Serializes side-effecting actions against the film catalog site. Actions
//! run strictly one at a time, in enqueue order, on a dedicated worker task;
//! a single slow or hung action can therefore never interleave with another,
//! and a per-action timeout guarantees the worker always advances.
//!
//! Local registry state is the source of truth: it is updated before the
//! action is enqueued and is never rolled back when the action fails. A
//! failure is logged and the worker moves on.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::SyncConfig;

/// The catalog-site operation an action performs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    /// Toggle the watched marker
    Watch,
    /// Toggle the like marker
    Like,
    /// Toggle watchlist membership
    List,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ActionKind::Watch => "watch",
            ActionKind::Like => "like",
            ActionKind::List => "list",
        };
        f.write_str(name)
    }
}

/// One pending catalog-site action
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedAction {
    /// Absolute URL of the film page to act on
    pub target_url: String,
    pub kind: ActionKind,
}

/// Action execution errors
#[derive(Debug, Error)]
pub enum ActionError {
    /// The executor reported a failure
    #[error("action failed: {reason}")]
    Failed {
        /// Executor-provided description
        reason: String,
    },

    /// The action exceeded the per-action timeout
    #[error("action timed out after {timeout:?}")]
    TimedOut {
        /// The configured limit that was exceeded
        timeout: Duration,
    },
}

impl ActionError {
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed {
            reason: reason.into(),
        }
    }
}

/// Performs one action against the catalog site
///
/// Implementations drive whatever transport reaches the site (an open page,
/// a headless session). The queue owns ordering and timeouts; executors
/// only need to run a single action to completion.
pub trait ActionExecutor: Send + Sync + 'static {
    fn execute(&self, action: QueuedAction) -> BoxFuture<'static, Result<(), ActionError>>;
}

/// Strictly serialized queue of catalog-site actions
pub struct ActionQueue {
    tx: mpsc::UnboundedSender<QueuedAction>,
    worker: JoinHandle<()>,
}

impl ActionQueue {
    /// Spawn the worker task; actions run in enqueue order
    pub fn new(executor: Arc<dyn ActionExecutor>, config: &SyncConfig) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let timeout = config.action_timeout;
        let worker = tokio::spawn(run_worker(executor, rx, timeout));
        Self { tx, worker }
    }

    /// Append an action; returns false once the queue is closed
    pub fn enqueue(&self, action: QueuedAction) -> bool {
        self.tx.send(action).is_ok()
    }

    /// Stop accepting actions and wait for the backlog to drain
    pub async fn close(self) {
        drop(self.tx);
        if let Err(e) = self.worker.await {
            tracing::error!("[Actions] worker task panicked: {}", e);
        }
    }
}

async fn run_worker(
    executor: Arc<dyn ActionExecutor>,
    mut rx: mpsc::UnboundedReceiver<QueuedAction>,
    timeout: Duration,
) {
    while let Some(action) = rx.recv().await {
        let label = format!("{} on {}", action.kind, action.target_url);
        match tokio::time::timeout(timeout, executor.execute(action)).await {
            Ok(Ok(())) => tracing::debug!("[Actions] completed {}", label),
            Ok(Err(e)) => tracing::warn!("[Actions] {} failed: {}", label, e),
            Err(_) => tracing::warn!(
                "[Actions] {} timed out after {:?}, moving on",
                label,
                timeout
            ),
        }
    }
    tracing::debug!("[Actions] queue drained, worker exiting");
}
