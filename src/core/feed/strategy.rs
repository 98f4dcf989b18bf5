use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use reqwest::Url;
use serde::{Deserialize, Serialize};

use super::fetcher::{FeedTransport, FetchError};
use super::parser::{parse_relay_json, parse_wrapped_feed, parse_xml_feed, FeedParseError};
use super::types::Post;

pub const DEFAULT_RSS2JSON_ENDPOINT: &str = "https://api.rss2json.com/v1/api.json";
pub const DEFAULT_ALLORIGINS_ENDPOINT: &str = "https://api.allorigins.win/get";
pub const DEFAULT_CORS_PROXY: &str = "https://cors-anywhere.herokuapp.com";

#[derive(Debug, thiserror::Error)]
pub enum StrategyError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("bad response: {0}")]
    BadResponse(String),
    #[error("parse error: {0}")]
    Parse(#[from] FeedParseError),
    #[error("feed returned no items")]
    EmptyResult,
}

impl From<FetchError> for StrategyError {
    fn from(error: FetchError) -> Self {
        match error {
            FetchError::Request(inner) => StrategyError::Transport(inner.to_string()),
            FetchError::HttpStatus(code) => {
                StrategyError::BadResponse(format!("unexpected status code: {code}"))
            }
        }
    }
}

/// Per-call inputs shared by every strategy.
#[derive(Debug, Clone, Copy)]
pub struct FetchRequest<'a> {
    pub feed_url: &'a str,
    /// Publication time given to items that carry none.
    pub fallback_published_at: &'a str,
}

/// One technique for getting the feed and turning it into posts.
#[async_trait]
pub trait FeedStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    async fn fetch(
        &self,
        transport: &dyn FeedTransport,
        request: FetchRequest<'_>,
    ) -> Result<Vec<Post>, StrategyError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyKind {
    Rss2Json,
    AllOrigins,
    CorsAnywhere,
    Direct,
}

impl StrategyKind {
    pub const DEFAULT_ORDER: [StrategyKind; 3] = [
        StrategyKind::Rss2Json,
        StrategyKind::AllOrigins,
        StrategyKind::CorsAnywhere,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rss2Json => "rss2json",
            Self::AllOrigins => "allorigins",
            Self::CorsAnywhere => "cors-anywhere",
            Self::Direct => "direct",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StrategyKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "rss2json" => Ok(Self::Rss2Json),
            "allorigins" => Ok(Self::AllOrigins),
            "cors-anywhere" | "cors_anywhere" | "corsanywhere" => Ok(Self::CorsAnywhere),
            "direct" => Ok(Self::Direct),
            unsupported => Err(format!("unsupported strategy: {unsupported}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayEndpoints {
    pub rss2json: String,
    pub allorigins: String,
    pub cors_proxy: String,
}

impl Default for RelayEndpoints {
    fn default() -> Self {
        Self {
            rss2json: DEFAULT_RSS2JSON_ENDPOINT.to_string(),
            allorigins: DEFAULT_ALLORIGINS_ENDPOINT.to_string(),
            cors_proxy: DEFAULT_CORS_PROXY.to_string(),
        }
    }
}

pub fn build_strategies(
    kinds: &[StrategyKind],
    endpoints: &RelayEndpoints,
    max_posts: usize,
) -> Vec<Box<dyn FeedStrategy>> {
    kinds
        .iter()
        .map(|kind| -> Box<dyn FeedStrategy> {
            match kind {
                StrategyKind::Rss2Json => Box::new(JsonRelayStrategy {
                    endpoint: endpoints.rss2json.clone(),
                    count: max_posts,
                }),
                StrategyKind::AllOrigins => Box::new(WrappedFeedStrategy {
                    endpoint: endpoints.allorigins.clone(),
                }),
                StrategyKind::CorsAnywhere => Box::new(ProxiedFeedStrategy {
                    proxy: endpoints.cors_proxy.clone(),
                }),
                StrategyKind::Direct => Box::new(DirectFeedStrategy),
            }
        })
        .collect()
}

/// Relay that converts the feed to JSON (`{status, items}`).
#[derive(Debug, Clone)]
pub struct JsonRelayStrategy {
    endpoint: String,
    count: usize,
}

#[async_trait]
impl FeedStrategy for JsonRelayStrategy {
    fn name(&self) -> &'static str {
        StrategyKind::Rss2Json.as_str()
    }

    async fn fetch(
        &self,
        transport: &dyn FeedTransport,
        request: FetchRequest<'_>,
    ) -> Result<Vec<Post>, StrategyError> {
        let count = self.count.to_string();
        let url = relay_url(
            &self.endpoint,
            &[("rss_url", request.feed_url), ("count", count.as_str())],
        )?;
        let fetched = transport.get(url.as_str()).await?;
        let relay = parse_relay_json(&fetched.body, request.fallback_published_at)?;
        if !relay.is_ok() {
            return Err(StrategyError::BadResponse(format!(
                "relay reported status {}",
                relay.status.as_deref().unwrap_or("<missing>")
            )));
        }
        non_empty(relay.feed.posts)
    }
}

/// Relay that returns the raw feed inside a JSON `contents` field.
#[derive(Debug, Clone)]
pub struct WrappedFeedStrategy {
    endpoint: String,
}

#[async_trait]
impl FeedStrategy for WrappedFeedStrategy {
    fn name(&self) -> &'static str {
        StrategyKind::AllOrigins.as_str()
    }

    async fn fetch(
        &self,
        transport: &dyn FeedTransport,
        request: FetchRequest<'_>,
    ) -> Result<Vec<Post>, StrategyError> {
        let url = relay_url(&self.endpoint, &[("url", request.feed_url)])?;
        let fetched = transport.get(url.as_str()).await?;
        let parsed = parse_wrapped_feed(&fetched.body, request.fallback_published_at)?;
        non_empty(parsed.posts)
    }
}

/// CORS proxy that takes the feed URL as its path and passes the XML through.
#[derive(Debug, Clone)]
pub struct ProxiedFeedStrategy {
    proxy: String,
}

#[async_trait]
impl FeedStrategy for ProxiedFeedStrategy {
    fn name(&self) -> &'static str {
        StrategyKind::CorsAnywhere.as_str()
    }

    async fn fetch(
        &self,
        transport: &dyn FeedTransport,
        request: FetchRequest<'_>,
    ) -> Result<Vec<Post>, StrategyError> {
        let url = format!("{}/{}", self.proxy.trim_end_matches('/'), request.feed_url);
        let fetched = transport.get(&url).await?;
        let parsed = parse_xml_feed(&fetched.body, request.fallback_published_at)?;
        non_empty(parsed.posts)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DirectFeedStrategy;

#[async_trait]
impl FeedStrategy for DirectFeedStrategy {
    fn name(&self) -> &'static str {
        StrategyKind::Direct.as_str()
    }

    async fn fetch(
        &self,
        transport: &dyn FeedTransport,
        request: FetchRequest<'_>,
    ) -> Result<Vec<Post>, StrategyError> {
        let fetched = transport.get(request.feed_url).await?;
        let parsed = parse_xml_feed(&fetched.body, request.fallback_published_at)?;
        non_empty(parsed.posts)
    }
}

fn relay_url(endpoint: &str, params: &[(&str, &str)]) -> Result<Url, StrategyError> {
    Url::parse_with_params(endpoint, params)
        .map_err(|error| StrategyError::Transport(format!("invalid relay endpoint {endpoint}: {error}")))
}

fn non_empty(posts: Vec<Post>) -> Result<Vec<Post>, StrategyError> {
    if posts.is_empty() {
        return Err(StrategyError::EmptyResult);
    }
    Ok(posts)
}
