use async_trait::async_trait;
use reqwest::header::ACCEPT;
use std::time::Duration;

const ACCEPT_FEEDS: &str =
    "application/rss+xml, application/atom+xml, application/json;q=0.9, text/xml;q=0.8, */*;q=0.5";

#[derive(Debug, Clone)]
pub struct FetchedBody {
    pub body: Vec<u8>,
}

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("unexpected status code: {0}")]
    HttpStatus(u16),
}

/// Plain unauthenticated GET against a feed or relay URL.
#[async_trait]
pub trait FeedTransport: Send + Sync {
    async fn get(&self, url: &str) -> Result<FetchedBody, FetchError>;
}

#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl FeedTransport for HttpTransport {
    async fn get(&self, url: &str) -> Result<FetchedBody, FetchError> {
        let response = self
            .client
            .get(url)
            .header(ACCEPT, ACCEPT_FEEDS)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus(status.as_u16()));
        }

        let body = response.bytes().await?.to_vec();

        Ok(FetchedBody { body })
    }
}
