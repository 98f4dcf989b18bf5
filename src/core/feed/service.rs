use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;

use super::retriever::FeedRetriever;
use super::types::Delivery;
use crate::core::clock::millis_to_iso;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FeedStatus {
    pub feed_url: String,
    pub cached_posts: usize,
    pub fetched_at: Option<String>,
    pub stale: bool,
    pub refreshing: bool,
}

/// Entry point for callers. Overlapping refreshes are collapsed: a refresh
/// requested while another is running returns `None` and does no I/O.
pub struct FeedService {
    retriever: FeedRetriever,
    in_flight: AtomicBool,
}

struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl FeedService {
    pub fn new(retriever: FeedRetriever) -> Self {
        Self {
            retriever,
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn retriever(&self) -> &FeedRetriever {
        &self.retriever
    }

    pub async fn refresh(&self) -> Option<Delivery> {
        let _guard = self.begin()?;
        Some(self.retriever.latest_posts().await)
    }

    pub async fn refresh_if_stale(&self) -> Option<Delivery> {
        if !self.retriever.should_refresh().await {
            tracing::debug!("cached posts are fresh; skipping refresh");
            return None;
        }
        self.refresh().await
    }

    /// Drops the cache and fetches again, ignoring staleness.
    pub async fn force_refresh(&self) -> Option<Delivery> {
        let _guard = self.begin()?;
        tracing::info!("manual refresh triggered");
        self.retriever.clear_cache().await;
        Some(self.retriever.latest_posts().await)
    }

    pub async fn should_refresh(&self) -> bool {
        self.retriever.should_refresh().await
    }

    pub async fn clear_cache(&self) {
        self.retriever.clear_cache().await;
    }

    pub async fn status(&self) -> FeedStatus {
        let cache = self.retriever.cache();
        let cached_posts = cache.load_posts().await.map(|posts| posts.len()).unwrap_or(0);
        let fetched_at = cache.last_fetched_at().await;
        FeedStatus {
            feed_url: self.retriever.settings().feed_url.clone(),
            cached_posts,
            fetched_at: fetched_at.map(millis_to_iso),
            stale: self.retriever.should_refresh().await,
            refreshing: self.in_flight.load(Ordering::Acquire),
        }
    }

    fn begin(&self) -> Option<InFlightGuard<'_>> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!("refresh already in flight; ignoring request");
            return None;
        }
        Some(InFlightGuard(&self.in_flight))
    }
}
