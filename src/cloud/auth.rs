//! Cloud session state
//!
//! The token-exchange and refresh flows live outside this crate; all the
//! sync engine needs is a valid-or-absent session. An expired session is
//! treated as "not signed in" until the external flow replaces it.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::storage::StorageBackend;

use super::CloudError;

/// Device-local storage key for the cloud session
pub const SESSION_KEY: &str = "reelsync_session";

/// Bearer session for the remote store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloudAuth {
    pub access_token: String,
    pub refresh_token: Option<String>,
    /// Remote account identifier all rows are scoped to
    pub user_id: String,
    pub email: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl CloudAuth {
    /// Whether the access token has passed its expiry
    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(expires_at) => expires_at < Utc::now(),
            None => false,
        }
    }
}

/// Persisted session handle over the device-local storage domain
pub struct SessionStore {
    storage: Arc<dyn StorageBackend>,
}

impl SessionStore {
    pub fn new(storage: Arc<dyn StorageBackend>) -> Self {
        Self { storage }
    }

    /// Load the current session; expired or absent sessions yield `None`
    pub fn load(&self) -> Result<Option<CloudAuth>, CloudError> {
        let Some(bytes) = self.storage.get(SESSION_KEY)? else {
            return Ok(None);
        };
        let auth: CloudAuth = serde_json::from_slice(&bytes)?;
        if auth.is_expired() {
            tracing::debug!("[Cloud] session expired, treating as signed out");
            return Ok(None);
        }
        Ok(Some(auth))
    }

    /// Replace the persisted session (called by the external auth flow)
    pub fn store(&self, auth: &CloudAuth) -> Result<(), CloudError> {
        let bytes = serde_json::to_vec(auth)?;
        self.storage.set(SESSION_KEY, &bytes)?;
        Ok(())
    }

    /// Sign out: drop the persisted session
    pub fn clear(&self) -> Result<(), CloudError> {
        self.storage.remove(SESSION_KEY)?;
        Ok(())
    }
}
