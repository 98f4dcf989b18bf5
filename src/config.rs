use std::env;
use std::time::Duration;

use crate::core::feed::retriever::{DEFAULT_MAX_POSTS, DEFAULT_STALE_AFTER};
use crate::core::feed::strategy::{RelayEndpoints, StrategyKind};
use crate::core::sync::DEFAULT_CHECK_INTERVAL;

pub const DEFAULT_FEED_URL: &str = "http://blog.adityashah.dev/feed";
pub const DEFAULT_SITE_URL: &str = "http://blog.adityashah.dev";
pub const DEFAULT_DATABASE_URL: &str = "sqlite://blog-feed.db?mode=rwc";
const DEFAULT_TIMEOUT_SECS: u64 = 20;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?} ({reason})")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub feed_url: String,
    pub site_url: String,
    pub strategies: Vec<StrategyKind>,
    pub endpoints: RelayEndpoints,
    pub database_url: String,
    pub max_posts: usize,
    pub stale_after: Duration,
    pub check_interval: Duration,
    pub request_timeout: Duration,
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            feed_url: DEFAULT_FEED_URL.to_string(),
            site_url: DEFAULT_SITE_URL.to_string(),
            strategies: StrategyKind::DEFAULT_ORDER.to_vec(),
            endpoints: RelayEndpoints::default(),
            database_url: DEFAULT_DATABASE_URL.to_string(),
            max_posts: DEFAULT_MAX_POSTS,
            stale_after: DEFAULT_STALE_AFTER,
            check_interval: DEFAULT_CHECK_INTERVAL,
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            log_format: LogFormat::Pretty,
        }
    }
}

impl Config {
    /// Reads `.env.local` and `.env` if present, then the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::from_filename(".env.local");
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();
        let read = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let strategies = match read("BLOG_FEED_STRATEGIES") {
            Some(raw) => parse_strategies(&raw)?,
            None => defaults.strategies,
        };

        Ok(Config {
            feed_url: read("BLOG_FEED_URL").unwrap_or(defaults.feed_url),
            site_url: read("BLOG_SITE_URL").unwrap_or(defaults.site_url),
            strategies,
            endpoints: RelayEndpoints {
                rss2json: read("BLOG_FEED_RSS2JSON_ENDPOINT").unwrap_or(defaults.endpoints.rss2json),
                allorigins: read("BLOG_FEED_ALLORIGINS_ENDPOINT")
                    .unwrap_or(defaults.endpoints.allorigins),
                cors_proxy: read("BLOG_FEED_CORS_PROXY").unwrap_or(defaults.endpoints.cors_proxy),
            },
            database_url: read("BLOG_FEED_DATABASE_URL").unwrap_or(defaults.database_url),
            max_posts: parse_positive("BLOG_FEED_MAX_POSTS", read("BLOG_FEED_MAX_POSTS"))?
                .map(|value| value as usize)
                .unwrap_or(defaults.max_posts),
            stale_after: parse_positive("BLOG_FEED_STALE_AFTER_SECS", read("BLOG_FEED_STALE_AFTER_SECS"))?
                .map(Duration::from_secs)
                .unwrap_or(defaults.stale_after),
            check_interval: parse_positive(
                "BLOG_FEED_CHECK_INTERVAL_SECS",
                read("BLOG_FEED_CHECK_INTERVAL_SECS"),
            )?
            .map(Duration::from_secs)
            .unwrap_or(defaults.check_interval),
            request_timeout: parse_positive("BLOG_FEED_TIMEOUT_SECS", read("BLOG_FEED_TIMEOUT_SECS"))?
                .map(Duration::from_secs)
                .unwrap_or(defaults.request_timeout),
            log_format: match read("LOG_FORMAT").map(|value| value.to_lowercase()).as_deref() {
                Some("json") => LogFormat::Json,
                _ => LogFormat::Pretty,
            },
        })
    }
}

fn parse_strategies(raw: &str) -> Result<Vec<StrategyKind>, ConfigError> {
    let strategies = raw
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::parse::<StrategyKind>)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|reason| ConfigError::Invalid {
            key: "BLOG_FEED_STRATEGIES",
            value: raw.to_string(),
            reason,
        })?;
    if strategies.is_empty() {
        return Err(ConfigError::Invalid {
            key: "BLOG_FEED_STRATEGIES",
            value: raw.to_string(),
            reason: "at least one strategy is required".to_string(),
        });
    }
    Ok(strategies)
}

fn parse_positive(key: &'static str, raw: Option<String>) -> Result<Option<u64>, ConfigError> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    match raw.trim().parse::<u64>() {
        Ok(0) => Err(ConfigError::Invalid {
            key,
            value: raw,
            reason: "must be greater than zero".to_string(),
        }),
        Ok(value) => Ok(Some(value)),
        Err(error) => Err(ConfigError::Invalid {
            key,
            value: raw,
            reason: error.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let values: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        Config::from_lookup(|key| values.get(key).cloned())
    }

    #[test]
    fn defaults_point_at_production_blog() {
        let config = config_from(&[]).expect("defaults should load");

        assert_eq!(config.feed_url, "http://blog.adityashah.dev/feed");
        assert_eq!(config.strategies, StrategyKind::DEFAULT_ORDER.to_vec());
        assert_eq!(config.max_posts, 3);
        assert_eq!(config.stale_after, Duration::from_secs(1800));
        assert_eq!(config.check_interval, Duration::from_secs(300));
        assert_eq!(config.log_format, LogFormat::Pretty);
    }

    #[test]
    fn environment_overrides_are_applied() {
        let config = config_from(&[
            ("BLOG_FEED_URL", "https://blog.example.com/feed.xml"),
            ("BLOG_FEED_STRATEGIES", "direct, rss2json"),
            ("BLOG_FEED_MAX_POSTS", "5"),
            ("BLOG_FEED_STALE_AFTER_SECS", "60"),
            ("BLOG_FEED_DATABASE_URL", "memory"),
            ("LOG_FORMAT", "JSON"),
        ])
        .expect("overrides should load");

        assert_eq!(config.feed_url, "https://blog.example.com/feed.xml");
        assert_eq!(
            config.strategies,
            vec![StrategyKind::Direct, StrategyKind::Rss2Json]
        );
        assert_eq!(config.max_posts, 5);
        assert_eq!(config.stale_after, Duration::from_secs(60));
        assert_eq!(config.database_url, "memory");
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn unknown_strategy_is_rejected() {
        let result = config_from(&[("BLOG_FEED_STRATEGIES", "rss2json,telepathy")]);
        assert!(matches!(
            result,
            Err(ConfigError::Invalid { key: "BLOG_FEED_STRATEGIES", .. })
        ));
    }

    #[test]
    fn zero_interval_is_rejected() {
        let result = config_from(&[("BLOG_FEED_CHECK_INTERVAL_SECS", "0")]);
        assert!(matches!(
            result,
            Err(ConfigError::Invalid { key: "BLOG_FEED_CHECK_INTERVAL_SECS", .. })
        ));
    }
}
