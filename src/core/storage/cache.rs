use std::sync::Arc;

use super::models::CacheEntry;
use super::repository::{KeyValueStore, StorageError};
use crate::core::feed::types::Post;

pub const POSTS_KEY: &str = "cached_blog_posts";
pub const FETCHED_AT_KEY: &str = "last_blog_fetch";

/// Posts blob and fetch timestamp kept under two keys of a [`KeyValueStore`].
///
/// Reads never fail: a missing, unreadable or malformed value is reported as
/// absent and logged.
#[derive(Clone)]
pub struct PostCache {
    store: Arc<dyn KeyValueStore>,
}

impl PostCache {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Writes both keys together. An entry without posts is not persisted.
    pub async fn store_entry(&self, entry: &CacheEntry) -> Result<(), StorageError> {
        if entry.posts.is_empty() {
            tracing::debug!("refusing to cache an empty post list");
            return Ok(());
        }
        let posts = serde_json::to_string(&entry.posts)?;
        let fetched_at = entry.fetched_at.to_string();
        self.store
            .set_many(&[(POSTS_KEY, posts.as_str()), (FETCHED_AT_KEY, fetched_at.as_str())])
            .await
    }

    pub async fn load_posts(&self) -> Option<Vec<Post>> {
        let raw = match self.store.get(POSTS_KEY).await {
            Ok(raw) => raw?,
            Err(error) => {
                tracing::warn!(%error, key = POSTS_KEY, "cache read failed");
                return None;
            }
        };
        match serde_json::from_str::<Vec<Post>>(&raw) {
            Ok(posts) if posts.is_empty() => None,
            Ok(posts) => Some(posts),
            Err(error) => {
                tracing::warn!(%error, key = POSTS_KEY, "cached posts are malformed");
                None
            }
        }
    }

    pub async fn last_fetched_at(&self) -> Option<i64> {
        let raw = match self.store.get(FETCHED_AT_KEY).await {
            Ok(raw) => raw?,
            Err(error) => {
                tracing::warn!(%error, key = FETCHED_AT_KEY, "cache read failed");
                return None;
            }
        };
        match raw.trim().parse::<i64>() {
            Ok(millis) => Some(millis),
            Err(error) => {
                tracing::warn!(%error, key = FETCHED_AT_KEY, value = %raw, "cached timestamp is malformed");
                None
            }
        }
    }

    /// Both halves of the entry, or nothing when either is unavailable.
    pub async fn load(&self) -> Option<CacheEntry> {
        let posts = self.load_posts().await?;
        let fetched_at = self.last_fetched_at().await?;
        Some(CacheEntry { posts, fetched_at })
    }

    /// Drops both keys in a single store operation.
    pub async fn clear(&self) -> Result<u64, StorageError> {
        self.store.remove_many(&[POSTS_KEY, FETCHED_AT_KEY]).await
    }
}
