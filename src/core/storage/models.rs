use serde::{Deserialize, Serialize};

use crate::core::feed::types::Post;

/// Last successful retrieval, as persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CacheEntry {
    pub posts: Vec<Post>,
    pub fetched_at: i64,
}
