//! Remote store REST client
//!
//! Speaks the remote store's row-oriented REST interface: batched upserts
//! with a conflict target on `(owner_id, slug)` and a full-owner read.
//! Rows are sparse on the wire: a single-flag write serializes only that
//! flag's columns, so the server-side upsert leaves other flags alone.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::SyncConfig;
use crate::registry::{Flag, Source, StateRecord};

use super::write_queue::QueuedWrite;
use super::{CloudAuth, CloudError};

/// Remote table holding one row per `(owner_id, slug)`
const STATES_TABLE: &str = "film_states";

/// One row of the remote `film_states` table
///
/// All flag columns are optional so a partial write can serialize only
/// the columns it actually changes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateRow {
    pub owner_id: String,
    pub slug: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub watched: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub watched_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub liked: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub liked_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub listed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub listed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skipped: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skipped_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_action: Option<Flag>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<Source>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl StateRow {
    /// Full row for a bulk push of one local record
    pub fn from_record(owner_id: &str, slug: &str, record: &StateRecord) -> Self {
        Self {
            owner_id: owner_id.to_string(),
            slug: slug.to_string(),
            watched: Some(record.watched),
            watched_at: record.watched_at,
            liked: Some(record.liked),
            liked_at: record.liked_at,
            listed: Some(record.listed),
            listed_at: record.listed_at,
            skipped: Some(record.skipped),
            skipped_at: record.skipped_at,
            last_action: record.last_action,
            source: record.source,
            updated_at: record.updated_at,
        }
    }

    /// Sparse row carrying only the single flag of a queued write
    pub fn from_write(write: &QueuedWrite) -> Self {
        let mut row = Self {
            owner_id: write.owner_id.clone(),
            slug: write.slug.clone(),
            last_action: Some(write.flag),
            source: Some(Source::UserAction),
            updated_at: Some(write.timestamp),
            ..Self::default()
        };
        match write.flag {
            Flag::Watched => {
                row.watched = Some(write.value);
                row.watched_at = Some(write.timestamp);
            }
            Flag::Liked => {
                row.liked = Some(write.value);
                row.liked_at = Some(write.timestamp);
            }
            Flag::Listed => {
                row.listed = Some(write.value);
                row.listed_at = Some(write.timestamp);
            }
            Flag::Skipped => {
                row.skipped = Some(write.value);
                row.skipped_at = Some(write.timestamp);
            }
        }
        row
    }

    /// Convert a pulled row back into a local record with remote provenance
    pub fn into_record(self) -> StateRecord {
        StateRecord {
            watched: self.watched.unwrap_or(false),
            watched_at: self.watched_at,
            liked: self.liked.unwrap_or(false),
            liked_at: self.liked_at,
            listed: self.listed.unwrap_or(false),
            listed_at: self.listed_at,
            skipped: self.skipped.unwrap_or(false),
            skipped_at: self.skipped_at,
            last_action: self.last_action,
            source: Some(Source::RemoteSync),
            updated_at: self.updated_at,
        }
    }
}

/// REST client for the remote store
pub struct CloudClient {
    http: Client,
    base_url: String,
    api_key: String,
    batch_size: usize,
}

impl CloudClient {
    /// Create a client for the remote store at `base_url`, batching bulk
    /// upserts at the configured size
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        config: &SyncConfig,
    ) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            batch_size: config.push_batch_size.max(1),
        }
    }

    /// Full URL for a REST path
    fn rest_url(&self, path: &str) -> String {
        format!("{}/rest/v1{}", self.base_url, path)
    }

    /// Upsert rows in batches; returns the number of rows delivered
    pub async fn upsert_rows(
        &self,
        auth: &CloudAuth,
        rows: &[StateRow],
    ) -> Result<usize, CloudError> {
        let mut delivered = 0;
        for batch in rows.chunks(self.batch_size) {
            let url = self.rest_url(&format!("/{}?on_conflict=owner_id,slug", STATES_TABLE));
            let response = self
                .http
                .post(&url)
                .header("apikey", &self.api_key)
                .header("Authorization", format!("Bearer {}", auth.access_token))
                .header("Prefer", "resolution=merge-duplicates")
                .json(batch)
                .send()
                .await?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(CloudError::Http {
                    status: status.as_u16(),
                    body,
                });
            }
            delivered += batch.len();
        }
        Ok(delivered)
    }

    /// Fetch every row belonging to the session's owner
    pub async fn fetch_rows(&self, auth: &CloudAuth) -> Result<Vec<StateRow>, CloudError> {
        let url = self.rest_url(&format!(
            "/{}?owner_id=eq.{}&select=*",
            STATES_TABLE, auth.user_id
        ));
        let response = self
            .http
            .get(&url)
            .header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", auth.access_token))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CloudError::Http {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response.json().await?)
    }

    /// Push the whole local registry; returns the number of rows delivered
    pub async fn push_registry(
        &self,
        auth: &CloudAuth,
        registry: &HashMap<String, StateRecord>,
    ) -> Result<usize, CloudError> {
        let rows: Vec<StateRow> = registry
            .iter()
            .map(|(slug, record)| StateRow::from_record(&auth.user_id, slug, record))
            .collect();
        let delivered = self.upsert_rows(auth, &rows).await?;
        tracing::info!("[Cloud] pushed {} rows", delivered);
        Ok(delivered)
    }

    /// Pull the full remote registry as records with remote provenance
    ///
    /// The caller feeds the result to the store's timestamped merge; this
    /// never touches local state itself.
    pub async fn pull_registry(
        &self,
        auth: &CloudAuth,
    ) -> Result<HashMap<String, StateRecord>, CloudError> {
        let rows = self.fetch_rows(auth).await?;
        tracing::info!("[Cloud] pulled {} rows", rows.len());
        Ok(rows
            .into_iter()
            .map(|row| (row.slug.clone(), row.into_record()))
            .collect())
    }
}
