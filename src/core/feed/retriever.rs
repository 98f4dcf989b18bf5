use std::sync::Arc;
use std::time::Duration;

use super::fetcher::FeedTransport;
use super::strategy::{FeedStrategy, FetchRequest};
use super::types::{placeholder_posts, Delivery, Post};
use crate::core::clock::{millis_to_iso, Clock};
use crate::core::storage::cache::PostCache;
use crate::core::storage::models::CacheEntry;

pub const DEFAULT_MAX_POSTS: usize = 3;
pub const DEFAULT_STALE_AFTER: Duration = Duration::from_secs(30 * 60);

/// Every configured strategy failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("all {attempted} feed strategies failed")]
pub struct Exhausted {
    pub attempted: usize,
}

#[derive(Debug, Clone)]
pub struct RetrieverSettings {
    pub feed_url: String,
    pub site_url: String,
    pub max_posts: usize,
    pub stale_after: Duration,
}

pub struct FeedRetriever {
    settings: RetrieverSettings,
    strategies: Vec<Box<dyn FeedStrategy>>,
    transport: Arc<dyn FeedTransport>,
    cache: PostCache,
    clock: Arc<dyn Clock>,
}

impl FeedRetriever {
    pub fn new(
        settings: RetrieverSettings,
        strategies: Vec<Box<dyn FeedStrategy>>,
        transport: Arc<dyn FeedTransport>,
        cache: PostCache,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            settings,
            strategies,
            transport,
            cache,
            clock,
        }
    }

    pub fn settings(&self) -> &RetrieverSettings {
        &self.settings
    }

    pub fn cache(&self) -> &PostCache {
        &self.cache
    }

    /// Tries each strategy in order and stops at the first one that yields
    /// posts. The winning result is capped and cached before returning.
    pub async fn retrieve_latest_posts(&self) -> Result<Vec<Post>, Exhausted> {
        let now = self.clock.now_millis();
        let fallback_published_at = millis_to_iso(now);
        let request = FetchRequest {
            feed_url: &self.settings.feed_url,
            fallback_published_at: &fallback_published_at,
        };

        for (position, strategy) in self.strategies.iter().enumerate() {
            let attempt = position + 1;
            tracing::debug!(strategy = strategy.name(), attempt, feed_url = %self.settings.feed_url, "trying feed strategy");
            let mut posts = match strategy.fetch(self.transport.as_ref(), request).await {
                Ok(posts) => posts,
                Err(error) => {
                    tracing::warn!(strategy = strategy.name(), attempt, %error, "feed strategy failed");
                    continue;
                }
            };

            posts.truncate(self.settings.max_posts);
            tracing::info!(strategy = strategy.name(), posts = posts.len(), "fetched latest posts");
            let entry = CacheEntry {
                posts,
                fetched_at: self.clock.now_millis(),
            };
            if let Err(error) = self.cache.store_entry(&entry).await {
                tracing::warn!(%error, "failed to cache fetched posts");
            }
            return Ok(entry.posts);
        }

        Err(Exhausted {
            attempted: self.strategies.len(),
        })
    }

    /// Live posts when any strategy succeeds, otherwise whatever the cache
    /// holds, otherwise the placeholder set.
    pub async fn latest_posts(&self) -> Delivery {
        match self.retrieve_latest_posts().await {
            Ok(posts) => Delivery::Live(posts),
            Err(exhausted) => {
                tracing::error!(%exhausted, "could not fetch blog posts");
                if let Some(posts) = self.cache.load_posts().await {
                    tracing::info!(posts = posts.len(), "showing cached posts");
                    return Delivery::Cached(posts);
                }
                tracing::info!("showing placeholder posts");
                Delivery::Placeholder(placeholder_posts(&self.settings.site_url))
            }
        }
    }

    pub async fn should_refresh(&self) -> bool {
        let fetched_at = self.cache.last_fetched_at().await;
        is_stale(self.clock.now_millis(), fetched_at, self.settings.stale_after)
    }

    pub async fn clear_cache(&self) {
        match self.cache.clear().await {
            Ok(removed) => tracing::info!(removed, "cleared cached posts"),
            Err(error) => tracing::warn!(%error, "failed to clear cached posts"),
        }
    }
}

/// True when nothing has been fetched yet or the last fetch is older than
/// `stale_after`.
pub fn is_stale(now_millis: i64, fetched_at: Option<i64>, stale_after: Duration) -> bool {
    match fetched_at {
        None => true,
        Some(fetched_at) => {
            let threshold = i64::try_from(stale_after.as_millis()).unwrap_or(i64::MAX);
            now_millis.saturating_sub(fetched_at) > threshold
        }
    }
}
