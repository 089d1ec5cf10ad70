//! # Collection Crawler
//!
//! Walks the catalog site's paginated collection listings (watched films,
//! liked films, watchlist) and folds every slug it sees into per-film
//! upgrade flags. The crawl is read-only with respect to the site and
//! feeds the registry's monotonic merge, so it can only ever turn flags on.
//!
//! Pacing and bounds are deliberate: a fixed delay between page fetches,
//! a hard page cap per category, and an early stop as soon as a page
//! yields nothing new. Only one crawl runs at a time.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures_util::future::BoxFuture;
use thiserror::Error;
use tokio::time::{sleep, Instant};

use crate::config::SyncConfig;
use crate::registry::{Flag, RecordStore, RegistryError, SyncCounts, UpgradeFlags};

/// A crawlable collection on the catalog site
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Watched,
    Liked,
    Listed,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::Watched, Category::Liked, Category::Listed];

    /// The registry flag this collection's membership implies
    pub fn flag(&self) -> Flag {
        match self {
            Category::Watched => Flag::Watched,
            Category::Liked => Flag::Liked,
            Category::Listed => Flag::Listed,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Watched => "watched",
            Category::Liked => "liked",
            Category::Listed => "listed",
        }
    }
}

/// One fetched listing page
#[derive(Debug, Clone, Default)]
pub struct CrawlPage {
    /// Film slugs present on the page, in page order
    pub slugs: Vec<String>,
    /// Whether the site advertises a further page
    pub has_next: bool,
}

/// Fetches listing pages from the catalog site
///
/// Pages are numbered from 1. Implementations do not paginate or pace
/// themselves; the [`Crawler`] owns both.
pub trait PageSource: Send + Sync {
    fn fetch_page(
        &self,
        category: Category,
        page: usize,
    ) -> BoxFuture<'_, Result<CrawlPage, CrawlError>>;
}

/// Crawl errors
#[derive(Debug, Error)]
pub enum CrawlError {
    /// A crawl is already in progress
    #[error("a collection crawl is already running")]
    AlreadyRunning,

    /// A listing page could not be fetched
    #[error("failed to fetch {category} page {page}: {reason}")]
    PageFetch {
        /// Collection being crawled
        category: &'static str,
        /// 1-based page number
        page: usize,
        /// Underlying failure description
        reason: String,
    },

    /// Registry rejected the crawl results
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

impl CrawlError {
    pub fn page_fetch(category: Category, page: usize, reason: impl Into<String>) -> Self {
        Self::PageFetch {
            category: category.as_str(),
            page,
            reason: reason.into(),
        }
    }
}

/// Result of a full crawl pass
#[derive(Debug, Clone, Default)]
pub struct CrawlOutcome {
    /// Per-slug flags observed across all categories
    pub upgrades: HashMap<String, UpgradeFlags>,
    /// Distinct slugs seen per category
    pub counts: SyncCounts,
    /// Total pages fetched
    pub pages: usize,
    /// Wall-clock crawl duration
    pub duration: Duration,
}

/// Paced, bounded walker over the site's collection listings
pub struct Crawler {
    source: Arc<dyn PageSource>,
    config: SyncConfig,
    running: AtomicBool,
}

impl Crawler {
    pub fn new(source: Arc<dyn PageSource>, config: SyncConfig) -> Self {
        Self {
            source,
            config,
            running: AtomicBool::new(false),
        }
    }

    /// Whether a crawl is currently in progress
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Crawl every category and collect the observed flags
    ///
    /// Non-reentrant: a second call while one is in flight returns
    /// [`CrawlError::AlreadyRunning`]. A page fetch failure ends that
    /// category early but keeps everything gathered so far.
    pub async fn crawl(&self) -> Result<CrawlOutcome, CrawlError> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(CrawlError::AlreadyRunning);
        }
        let outcome = self.crawl_inner().await;
        self.running.store(false, Ordering::SeqCst);
        Ok(outcome)
    }

    async fn crawl_inner(&self) -> CrawlOutcome {
        let started = Instant::now();
        let mut outcome = CrawlOutcome::default();

        for category in Category::ALL {
            let seen = self.crawl_category(category, &mut outcome).await;
            match category {
                Category::Watched => outcome.counts.watched = seen,
                Category::Liked => outcome.counts.liked = seen,
                Category::Listed => outcome.counts.listed = seen,
            }
        }

        outcome.duration = started.elapsed();
        tracing::info!(
            "[Crawl] finished: {} films over {} pages in {:?}",
            outcome.upgrades.len(),
            outcome.pages,
            outcome.duration
        );
        outcome
    }

    /// Walk one category's pages; returns the distinct slugs seen
    async fn crawl_category(&self, category: Category, outcome: &mut CrawlOutcome) -> usize {
        let flag = category.flag();
        let mut seen: HashSet<String> = HashSet::new();
        let mut page = 1;

        loop {
            if page > self.config.max_pages {
                tracing::warn!(
                    "[Crawl] {} hit the {}-page cap, stopping",
                    category.as_str(),
                    self.config.max_pages
                );
                break;
            }
            if page > 1 {
                sleep(self.config.page_delay).await;
            }

            let fetched = match self.source.fetch_page(category, page).await {
                Ok(fetched) => fetched,
                Err(e) => {
                    // Keep what this category gathered so far.
                    tracing::warn!("[Crawl] {} page {} failed: {}", category.as_str(), page, e);
                    break;
                }
            };
            outcome.pages += 1;

            let mut new_on_page = 0;
            for slug in fetched.slugs {
                if seen.insert(slug.clone()) {
                    new_on_page += 1;
                    let entry = outcome.upgrades.remove(&slug).unwrap_or_default();
                    outcome.upgrades.insert(slug, entry.with(flag));
                }
            }
            tracing::debug!(
                "[Crawl] {} page {}: {} new films",
                category.as_str(),
                page,
                new_on_page
            );

            if new_on_page == 0 || !fetched.has_next {
                break;
            }
            page += 1;
        }

        seen.len()
    }
}

/// Run a crawl and fold the results into the registry
///
/// Applies the monotonic merge, then records when the crawl ran and what
/// it saw in the registry metadata.
pub async fn run_collection_sync(
    store: &RecordStore,
    crawler: &Crawler,
) -> Result<CrawlOutcome, CrawlError> {
    let outcome = crawler.crawl().await?;
    let upgraded = store.apply_upgrades(&outcome.upgrades)?;
    store.set_sync_meta(Utc::now(), outcome.duration, outcome.counts)?;
    tracing::info!(
        "[Crawl] collection sync upgraded {} flags from {} films",
        upgraded,
        outcome.upgrades.len()
    );
    Ok(outcome)
}
