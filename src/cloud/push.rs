//! # Cloud Push Pipeline
//!
//! Ships local flag changes to the remote store as they happen. Each
//! user-initiated mutation becomes a sparse single-flag upsert; a failed
//! delivery lands in the offline [`WriteQueue`] instead of being lost.
//! Changes that arrived FROM the cloud (or from a collection crawl) are
//! never pushed back, which keeps sync loops out of the pipeline.
//!
//! [`CloudPush::run`] drives the pipeline from the store's change
//! broadcast; [`sync_bidirectional`] performs the full push + pull + merge
//! cycle used at sign-in and on demand.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::registry::{RecordChanged, RecordStore, Source};

use super::auth::SessionStore;
use super::client::{CloudClient, StateRow};
use super::write_queue::{FlushReport, QueuedWrite, WriteQueue};
use super::CloudError;

/// Summary of one bidirectional sync cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncSummary {
    /// Queued offline writes delivered before the bulk push
    pub flushed: usize,
    /// Rows pushed from the local registry
    pub pushed: usize,
    /// Remote fields adopted into the local registry
    pub adopted: usize,
}

/// Streams local mutations to the remote store
pub struct CloudPush {
    client: Arc<CloudClient>,
    session: SessionStore,
    queue: Arc<WriteQueue>,
}

impl CloudPush {
    pub fn new(client: Arc<CloudClient>, session: SessionStore, queue: Arc<WriteQueue>) -> Self {
        Self {
            client,
            session,
            queue,
        }
    }

    /// Push one change, queueing it if delivery fails
    ///
    /// Only `Source::UserAction` changes are pushed; changes applied by
    /// remote or collection sync stay local. Without a valid session the
    /// change is dropped silently, matching the signed-out contract.
    pub async fn handle_change(&self, change: &RecordChanged) -> Result<(), CloudError> {
        if change.source != Source::UserAction {
            return Ok(());
        }
        let Some(auth) = self.session.load()? else {
            tracing::debug!("[Push] not signed in, skipping {}", change.slug);
            return Ok(());
        };

        let write = QueuedWrite {
            id: Uuid::new_v4(),
            slug: change.slug.clone(),
            flag: change.flag,
            value: change.value,
            timestamp: change.timestamp,
            owner_id: auth.user_id.clone(),
            queued_at: Utc::now(),
        };
        let row = StateRow::from_write(&write);
        match self.client.upsert_rows(&auth, &[row]).await {
            Ok(_) => {
                tracing::debug!("[Push] delivered {} {}", change.slug, change.flag.as_str());
                Ok(())
            }
            Err(e) => {
                tracing::warn!("[Push] delivery failed for {}, queueing: {}", change.slug, e);
                self.queue.push(write).await
            }
        }
    }

    /// Re-attempt the queued backlog against the current session
    pub async fn flush(&self) -> Result<FlushReport, CloudError> {
        let Some(auth) = self.session.load()? else {
            return Err(CloudError::NotSignedIn);
        };
        self.queue.flush(&self.client, &auth).await
    }

    /// Consume the store's change broadcast until the sender is dropped
    ///
    /// A lagged receiver logs and keeps going; individual delivery errors
    /// are already absorbed into the queue by `handle_change`.
    pub async fn run(&self, mut rx: broadcast::Receiver<RecordChanged>) {
        loop {
            match rx.recv().await {
                Ok(change) => {
                    if let Err(e) = self.handle_change(&change).await {
                        tracing::error!("[Push] change handling failed: {}", e);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    tracing::warn!("[Push] receiver lagged, missed {} changes", missed);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
        tracing::info!("[Push] change stream closed");
    }
}

/// Full sync cycle: flush the backlog, push everything, pull and merge
///
/// Requires a valid session. Local state is only touched through the
/// store's timestamped merge, so a mid-cycle failure leaves the registry
/// consistent.
pub async fn sync_bidirectional(
    client: &CloudClient,
    session: &SessionStore,
    queue: &WriteQueue,
    store: &RecordStore,
) -> Result<SyncSummary, CloudError> {
    let Some(auth) = session.load()? else {
        return Err(CloudError::NotSignedIn);
    };

    let flushed = queue.flush(client, &auth).await?.delivered;
    let pushed = client.push_registry(&auth, &store.registry()?).await?;
    let remote = client.pull_registry(&auth).await?;
    let adopted = store.merge_remote(&remote)?;

    let summary = SyncSummary {
        flushed,
        pushed,
        adopted,
    };
    tracing::info!(
        "[Cloud] sync complete: flushed {}, pushed {}, adopted {}",
        summary.flushed,
        summary.pushed,
        summary.adopted
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SyncConfig;
    use crate::registry::Flag;
    use crate::storage::MemoryBackend;

    fn push_without_session() -> CloudPush {
        let storage: Arc<MemoryBackend> = Arc::new(MemoryBackend::new());
        let config = SyncConfig::default();
        CloudPush::new(
            Arc::new(CloudClient::new("https://cloud.invalid", "anon-key", &config)),
            SessionStore::new(storage.clone()),
            Arc::new(WriteQueue::new(storage, &config)),
        )
    }

    fn change(source: Source) -> RecordChanged {
        RecordChanged {
            slug: "dune".to_string(),
            flag: Flag::Watched,
            value: true,
            timestamp: Utc::now(),
            source,
        }
    }

    #[tokio::test]
    async fn test_signed_out_change_is_dropped_not_queued() {
        let push = push_without_session();
        push.handle_change(&change(Source::UserAction)).await.unwrap();
        assert!(push.queue.is_empty().await);
    }

    #[tokio::test]
    async fn test_remote_sourced_changes_are_not_echoed() {
        let push = push_without_session();
        push.handle_change(&change(Source::RemoteSync)).await.unwrap();
        push.handle_change(&change(Source::CollectionSync)).await.unwrap();
        push.handle_change(&change(Source::PageSync)).await.unwrap();
        assert!(push.queue.is_empty().await);
    }

    #[tokio::test]
    async fn test_flush_without_session_is_rejected() {
        let push = push_without_session();
        assert!(matches!(push.flush().await, Err(CloudError::NotSignedIn)));
    }
}
