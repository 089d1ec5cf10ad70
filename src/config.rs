//! Synchronization configuration
//!
//! Provides the tuning knobs shared by the record store, cloud push,
//! action queue and crawler. Defaults match the reference deployment;
//! tests override them through the builder.

use std::time::Duration;

use thiserror::Error;

/// Quiescence window before a debounced registry save.
const DEFAULT_SAVE_DEBOUNCE: Duration = Duration::from_millis(300);

/// Maximum entries retained by the offline write queue.
const DEFAULT_WRITE_QUEUE_CAP: usize = 1000;

/// Per-item timeout for background action replay.
const DEFAULT_ACTION_TIMEOUT: Duration = Duration::from_secs(10);

/// Minimum delay between crawled pages of the same category.
const DEFAULT_PAGE_DELAY: Duration = Duration::from_secs(1);

/// Absolute page cap per crawled category.
const DEFAULT_MAX_PAGES: usize = 100;

/// Rows per cloud upsert batch.
const DEFAULT_PUSH_BATCH_SIZE: usize = 500;

/// Capacity of the record-changed broadcast channel.
const DEFAULT_EVENT_CAPACITY: usize = 1024;

/// Synchronization engine configuration
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Quiescence window for debounced persistence
    pub save_debounce: Duration,
    /// Offline write queue bound (oldest entries dropped beyond this)
    pub write_queue_cap: usize,
    /// Timeout after which an in-flight background action is abandoned
    pub action_timeout: Duration,
    /// Minimum inter-page delay during a collection crawl
    pub page_delay: Duration,
    /// Circuit-breaker page cap per crawled category
    pub max_pages: usize,
    /// Batch size for bulk cloud upserts
    pub push_batch_size: usize,
    /// Record-changed broadcast channel capacity
    pub event_capacity: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            save_debounce: DEFAULT_SAVE_DEBOUNCE,
            write_queue_cap: DEFAULT_WRITE_QUEUE_CAP,
            action_timeout: DEFAULT_ACTION_TIMEOUT,
            page_delay: DEFAULT_PAGE_DELAY,
            max_pages: DEFAULT_MAX_PAGES,
            push_batch_size: DEFAULT_PUSH_BATCH_SIZE,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl SyncConfig {
    /// Create a new SyncConfigBuilder
    pub fn builder() -> SyncConfigBuilder {
        SyncConfigBuilder::default()
    }
}

/// Builder for SyncConfig
#[derive(Debug, Default)]
pub struct SyncConfigBuilder {
    save_debounce: Option<Duration>,
    write_queue_cap: Option<usize>,
    action_timeout: Option<Duration>,
    page_delay: Option<Duration>,
    max_pages: Option<usize>,
    push_batch_size: Option<usize>,
    event_capacity: Option<usize>,
}

impl SyncConfigBuilder {
    /// Set the debounce window for registry persistence
    pub fn save_debounce(mut self, window: Duration) -> Self {
        self.save_debounce = Some(window);
        self
    }

    /// Set the offline write queue bound
    pub fn write_queue_cap(mut self, cap: usize) -> Self {
        self.write_queue_cap = Some(cap);
        self
    }

    /// Set the background action timeout
    pub fn action_timeout(mut self, timeout: Duration) -> Self {
        self.action_timeout = Some(timeout);
        self
    }

    /// Set the minimum inter-page crawl delay
    pub fn page_delay(mut self, delay: Duration) -> Self {
        self.page_delay = Some(delay);
        self
    }

    /// Set the per-category page cap
    pub fn max_pages(mut self, pages: usize) -> Self {
        self.max_pages = Some(pages);
        self
    }

    /// Set the cloud upsert batch size
    pub fn push_batch_size(mut self, size: usize) -> Self {
        self.push_batch_size = Some(size);
        self
    }

    /// Set the broadcast channel capacity
    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = Some(capacity);
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<SyncConfig, ConfigError> {
        let defaults = SyncConfig::default();
        let config = SyncConfig {
            save_debounce: self.save_debounce.unwrap_or(defaults.save_debounce),
            write_queue_cap: self.write_queue_cap.unwrap_or(defaults.write_queue_cap),
            action_timeout: self.action_timeout.unwrap_or(defaults.action_timeout),
            page_delay: self.page_delay.unwrap_or(defaults.page_delay),
            max_pages: self.max_pages.unwrap_or(defaults.max_pages),
            push_batch_size: self.push_batch_size.unwrap_or(defaults.push_batch_size),
            event_capacity: self.event_capacity.unwrap_or(defaults.event_capacity),
        };
        if config.write_queue_cap == 0 {
            return Err(ConfigError::InvalidValue("write_queue_cap must be non-zero"));
        }
        if config.push_batch_size == 0 {
            return Err(ConfigError::InvalidValue("push_batch_size must be non-zero"));
        }
        if config.max_pages == 0 {
            return Err(ConfigError::InvalidValue("max_pages must be non-zero"));
        }
        if config.event_capacity == 0 {
            return Err(ConfigError::InvalidValue("event_capacity must be non-zero"));
        }
        Ok(config)
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value: {0}")]
    InvalidValue(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_reference_values() {
        let config = SyncConfig::default();
        assert_eq!(config.save_debounce, Duration::from_millis(300));
        assert_eq!(config.write_queue_cap, 1000);
        assert_eq!(config.action_timeout, Duration::from_secs(10));
        assert_eq!(config.page_delay, Duration::from_secs(1));
        assert_eq!(config.max_pages, 100);
        assert_eq!(config.push_batch_size, 500);
    }

    #[test]
    fn test_builder_overrides() {
        let config = SyncConfig::builder()
            .save_debounce(Duration::from_millis(5))
            .write_queue_cap(10)
            .build()
            .unwrap();
        assert_eq!(config.save_debounce, Duration::from_millis(5));
        assert_eq!(config.write_queue_cap, 10);
        assert_eq!(config.max_pages, 100);
    }

    #[test]
    fn test_builder_rejects_zero_cap() {
        let result = SyncConfig::builder().write_queue_cap(0).build();
        assert!(result.is_err());
    }
}
