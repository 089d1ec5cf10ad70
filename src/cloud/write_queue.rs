//! # Offline Write Queue
//!
//! Buffers single-record cloud writes that failed their immediate attempt.
//! Bounded FIFO: beyond the cap the oldest entries are discarded, favoring
//! recency over completeness under sustained disconnection. The backlog is
//! persisted in the device-local domain so a restart picks it back up.
//!
//! `flush` is an idempotent, re-entrant pass: it takes the current backlog,
//! re-attempts each entry front to back, and re-collects the still-failing
//! ones in their original relative order ahead of anything enqueued while
//! the flush was running.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::config::SyncConfig;
use crate::registry::Flag;
use crate::storage::StorageBackend;

use super::client::{CloudClient, StateRow};
use super::{CloudAuth, CloudError};

/// Device-local storage key for the queued backlog
pub const QUEUE_KEY: &str = "reelsync_queue";

/// One pending single-record remote write
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuedWrite {
    pub id: Uuid,
    pub slug: String,
    pub flag: Flag,
    pub value: bool,
    /// Timestamp of the original local mutation, not of the enqueue
    pub timestamp: DateTime<Utc>,
    pub owner_id: String,
    pub queued_at: DateTime<Utc>,
}

/// Result of a flush pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushReport {
    /// Entries delivered to the remote store
    pub delivered: usize,
    /// Entries that failed again and were retained
    pub retained: usize,
}

/// Bounded FIFO queue of pending remote writes
pub struct WriteQueue {
    entries: Mutex<VecDeque<QueuedWrite>>,
    storage: Arc<dyn StorageBackend>,
    cap: usize,
}

impl WriteQueue {
    /// Create an empty queue over the device-local domain, bounded by the
    /// configured cap
    pub fn new(storage: Arc<dyn StorageBackend>, config: &SyncConfig) -> Self {
        Self {
            entries: Mutex::new(VecDeque::new()),
            storage,
            cap: config.write_queue_cap.max(1),
        }
    }

    /// Restore a persisted backlog; returns the number of restored entries
    pub async fn load(&self) -> Result<usize, CloudError> {
        let Some(bytes) = self.storage.get(QUEUE_KEY)? else {
            return Ok(0);
        };
        let restored: VecDeque<QueuedWrite> = serde_json::from_slice(&bytes)?;
        let count = restored.len();
        let mut entries = self.entries.lock().await;
        *entries = restored;
        tracing::info!("[Queue] restored {} queued writes", count);
        Ok(count)
    }

    /// Append a write, dropping the oldest entries beyond the cap
    pub async fn push(&self, write: QueuedWrite) -> Result<(), CloudError> {
        let mut entries = self.entries.lock().await;
        entries.push_back(write);
        while entries.len() > self.cap {
            entries.pop_front();
            tracing::warn!("[Queue] over capacity, dropped oldest write");
        }
        self.persist(&entries)?;
        Ok(())
    }

    /// Number of pending writes
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    /// Whether the queue holds no pending writes
    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }

    /// Snapshot of the pending writes, front first
    pub async fn pending(&self) -> Vec<QueuedWrite> {
        self.entries.lock().await.iter().cloned().collect()
    }

    /// Drain the backlog front to back, re-attempting each write
    ///
    /// Still-failing entries are retained in original relative order,
    /// ahead of writes enqueued while the flush ran. Safe to call
    /// concurrently with new enqueues and with itself.
    pub async fn flush(
        &self,
        client: &CloudClient,
        auth: &CloudAuth,
    ) -> Result<FlushReport, CloudError> {
        // Take the backlog so concurrent enqueues land in a fresh queue
        // instead of blocking behind remote attempts.
        let backlog: Vec<QueuedWrite> = {
            let mut entries = self.entries.lock().await;
            entries.drain(..).collect()
        };
        if backlog.is_empty() {
            return Ok(FlushReport::default());
        }

        let mut retained = Vec::new();
        let mut delivered = 0;
        for write in backlog {
            let row = StateRow::from_write(&write);
            match client.upsert_rows(auth, &[row]).await {
                Ok(_) => delivered += 1,
                Err(e) => {
                    tracing::debug!("[Queue] write for {} still failing: {}", write.slug, e);
                    retained.push(write);
                }
            }
        }

        let report = FlushReport {
            delivered,
            retained: retained.len(),
        };
        {
            let mut entries = self.entries.lock().await;
            for write in retained.into_iter().rev() {
                entries.push_front(write);
            }
            self.persist(&entries)?;
        }
        tracing::info!(
            "[Queue] flush delivered {} writes, retained {}",
            report.delivered,
            report.retained
        );
        Ok(report)
    }

    fn persist(&self, entries: &VecDeque<QueuedWrite>) -> Result<(), CloudError> {
        let bytes = serde_json::to_vec(entries)?;
        self.storage.set(QUEUE_KEY, &bytes)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryBackend;

    fn write_for(slug: &str) -> QueuedWrite {
        QueuedWrite {
            id: Uuid::new_v4(),
            slug: slug.to_string(),
            flag: Flag::Watched,
            value: true,
            timestamp: Utc::now(),
            owner_id: "owner-1".to_string(),
            queued_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_queue_is_bounded_favoring_recency() {
        let queue = WriteQueue::new(Arc::new(MemoryBackend::new()), &SyncConfig::default());
        for i in 0..1005 {
            queue.push(write_for(&format!("film-{}", i))).await.unwrap();
        }

        assert_eq!(queue.len().await, 1000);
        let pending = queue.pending().await;
        // The 5 oldest are gone; the rest keep original relative order.
        assert_eq!(pending[0].slug, "film-5");
        assert_eq!(pending[999].slug, "film-1004");
        for (i, write) in pending.iter().enumerate() {
            assert_eq!(write.slug, format!("film-{}", i + 5));
        }
    }

    #[tokio::test]
    async fn test_cap_comes_from_config() {
        let config = SyncConfig::builder().write_queue_cap(3).build().unwrap();
        let queue = WriteQueue::new(Arc::new(MemoryBackend::new()), &config);
        for i in 0..5 {
            queue.push(write_for(&format!("film-{}", i))).await.unwrap();
        }

        assert_eq!(queue.len().await, 3);
        let pending = queue.pending().await;
        assert_eq!(pending[0].slug, "film-2");
        assert_eq!(pending[2].slug, "film-4");
    }

    #[tokio::test]
    async fn test_backlog_survives_restart() {
        let storage: Arc<MemoryBackend> = Arc::new(MemoryBackend::new());

        let queue = WriteQueue::new(storage.clone(), &SyncConfig::default());
        queue.push(write_for("dune")).await.unwrap();
        queue.push(write_for("heat")).await.unwrap();

        let restored = WriteQueue::new(storage, &SyncConfig::default());
        assert_eq!(restored.load().await.unwrap(), 2);
        let pending = restored.pending().await;
        assert_eq!(pending[0].slug, "dune");
        assert_eq!(pending[1].slug, "heat");
    }

    #[tokio::test]
    async fn test_load_on_empty_storage_is_zero() {
        let queue = WriteQueue::new(Arc::new(MemoryBackend::new()), &SyncConfig::default());
        assert_eq!(queue.load().await.unwrap(), 0);
        assert!(queue.is_empty().await);
    }
}
