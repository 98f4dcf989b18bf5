pub mod fetcher;
pub mod parser;
pub mod retriever;
pub mod service;
pub mod strategy;
pub mod types;

pub use retriever::{Exhausted, FeedRetriever, RetrieverSettings};
pub use service::{FeedService, FeedStatus};
pub use types::{Delivery, Post};
