use serde::{Deserialize, Serialize};

pub const UNTITLED_POST: &str = "Untitled";
pub const FALLBACK_LINK: &str = "#";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum FeedFormat {
    RelayJson,
    RssXml,
    AtomXml,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Post {
    pub title: String,
    pub link: String,
    #[serde(default)]
    pub description: String,
    pub published_at: String,
}

impl Post {
    /// Builds a post from optional source fields, defaulting the ones that are
    /// missing or blank.
    pub fn from_parts(
        title: Option<String>,
        link: Option<String>,
        description: Option<String>,
        published_at: Option<String>,
        fallback_published_at: &str,
    ) -> Self {
        Self {
            title: non_blank(title).unwrap_or_else(|| UNTITLED_POST.to_string()),
            link: non_blank(link).unwrap_or_else(|| FALLBACK_LINK.to_string()),
            description: description.unwrap_or_default(),
            published_at: non_blank(published_at)
                .unwrap_or_else(|| fallback_published_at.to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ParsedFeed {
    pub format: FeedFormat,
    pub posts: Vec<Post>,
}

/// Outcome handed to the rendering side once fallbacks have been applied.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "source", content = "posts", rename_all = "snake_case")]
pub enum Delivery {
    Live(Vec<Post>),
    Cached(Vec<Post>),
    Placeholder(Vec<Post>),
}

impl Delivery {
    pub fn posts(&self) -> &[Post] {
        match self {
            Self::Live(posts) | Self::Cached(posts) | Self::Placeholder(posts) => posts,
        }
    }

    pub fn is_cached(&self) -> bool {
        matches!(self, Self::Cached(_))
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Live(_) => "live",
            Self::Cached(_) => "cached",
            Self::Placeholder(_) => "placeholder",
        }
    }
}

/// Hard-coded posts shown when neither a live fetch nor the cache can supply
/// anything. These are never written to the cache.
pub fn placeholder_posts(site_url: &str) -> Vec<Post> {
    [
        (
            "WordPress Performance Optimization Tips",
            "Learn essential techniques to boost your WordPress site's performance and improve user experience...",
        ),
        (
            "DevOps Best Practices for WordPress",
            "Explore modern DevOps practices specifically tailored for WordPress development and deployment...",
        ),
        (
            "Building WordPress Communities",
            "Tips and insights from organizing WordPress communities and events across India...",
        ),
    ]
    .into_iter()
    .map(|(title, description)| Post {
        title: title.to_string(),
        link: site_url.to_string(),
        description: description.to_string(),
        published_at: String::new(),
    })
    .collect()
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|text| !text.trim().is_empty())
}
