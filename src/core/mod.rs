pub mod clock;
pub mod feed;
pub mod render;
pub mod storage;
pub mod sync;

use std::sync::Arc;

use crate::config::Config;
use clock::SystemClock;
use feed::fetcher::{FetchError, HttpTransport};
use feed::strategy::build_strategies;
use feed::{FeedRetriever, FeedService, RetrieverSettings};
use storage::cache::PostCache;
use storage::open_store;
use storage::repository::StorageError;
use sync::RefreshScheduler;

#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    #[error("cache store: {0}")]
    Storage(#[from] StorageError),
    #[error("http client: {0}")]
    Transport(#[from] FetchError),
}

/// Fully wired collaborators for one configured feed.
#[derive(Clone)]
pub struct AppServices {
    feed: Arc<FeedService>,
    check_interval: std::time::Duration,
}

impl AppServices {
    pub async fn build(config: &Config) -> Result<Self, SetupError> {
        let store = open_store(&config.database_url).await?;
        let transport = HttpTransport::new(config.request_timeout)?;
        let strategies = build_strategies(&config.strategies, &config.endpoints, config.max_posts);
        tracing::debug!(
            strategies = ?config.strategies,
            feed_url = %config.feed_url,
            "feed strategies configured"
        );

        let retriever = FeedRetriever::new(
            RetrieverSettings {
                feed_url: config.feed_url.clone(),
                site_url: config.site_url.clone(),
                max_posts: config.max_posts,
                stale_after: config.stale_after,
            },
            strategies,
            Arc::new(transport),
            PostCache::new(store),
            Arc::new(SystemClock),
        );

        Ok(Self {
            feed: Arc::new(FeedService::new(retriever)),
            check_interval: config.check_interval,
        })
    }

    pub fn feed(&self) -> &Arc<FeedService> {
        &self.feed
    }

    pub fn scheduler(&self) -> RefreshScheduler {
        RefreshScheduler::new(self.feed.clone(), self.check_interval)
    }
}
