use feed_rs::model::{Entry, FeedType};
use roxmltree::{Document, Node, ParsingOptions};
use serde::Deserialize;

use super::types::{FeedFormat, ParsedFeed, Post};

#[derive(Debug, thiserror::Error)]
pub enum FeedParseError {
    #[error("feed payload is empty")]
    EmptyPayload,
    #[error("xml feed parse error: {0}")]
    Xml(#[from] roxmltree::Error),
    #[error("feed parse error: {0}")]
    Syndication(#[from] feed_rs::parser::ParseFeedError),
    #[error("json feed parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("relay response is missing `{0}`")]
    MissingField(&'static str),
}

/// Relay response that converts the feed to JSON on the relay side.
#[derive(Debug, Clone, Deserialize)]
struct RelayJsonFeed {
    status: Option<String>,
    #[serde(default)]
    items: Vec<RelayJsonItem>,
}

#[derive(Debug, Clone, Deserialize)]
struct RelayJsonItem {
    title: Option<String>,
    link: Option<String>,
    description: Option<String>,
    content: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
}

/// Relay response that wraps the untouched feed document in a JSON envelope.
#[derive(Debug, Clone, Deserialize)]
struct WrappedFeed {
    contents: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayFeed {
    pub status: Option<String>,
    pub feed: ParsedFeed,
}

impl RelayFeed {
    pub fn is_ok(&self) -> bool {
        self.status.as_deref() == Some("ok")
    }
}

pub fn parse_relay_json(
    raw: &[u8],
    fallback_published_at: &str,
) -> Result<RelayFeed, FeedParseError> {
    let trimmed = non_empty_payload(raw)?;
    let relay: RelayJsonFeed = serde_json::from_slice(trimmed)?;
    let posts = relay
        .items
        .into_iter()
        .map(|item| {
            let description = item
                .description
                .filter(|text| !text.is_empty())
                .or(item.content);
            Post::from_parts(
                item.title,
                item.link,
                description,
                item.pub_date,
                fallback_published_at,
            )
        })
        .collect();

    Ok(RelayFeed {
        status: relay.status,
        feed: ParsedFeed {
            format: FeedFormat::RelayJson,
            posts,
        },
    })
}

pub fn parse_wrapped_feed(
    raw: &[u8],
    fallback_published_at: &str,
) -> Result<ParsedFeed, FeedParseError> {
    let trimmed = non_empty_payload(raw)?;
    let wrapped: WrappedFeed = serde_json::from_slice(trimmed)?;
    let contents = wrapped
        .contents
        .filter(|contents| !contents.trim().is_empty())
        .ok_or(FeedParseError::MissingField("contents"))?;
    parse_xml_feed(contents.as_bytes(), fallback_published_at)
}

/// Parses an RSS document by `item` elements. Documents without any items, and
/// documents in a declared encoding other than UTF-8, are given to feed-rs.
pub fn parse_xml_feed(
    raw: &[u8],
    fallback_published_at: &str,
) -> Result<ParsedFeed, FeedParseError> {
    let trimmed = non_empty_payload(raw)?;
    let text = match std::str::from_utf8(trimmed) {
        Ok(text) => text.trim_start_matches('\u{feff}'),
        Err(error) => {
            tracing::debug!(%error, "feed is not utf-8; decoding its declared encoding");
            return parse_with_feed_rs(trimmed, fallback_published_at);
        }
    };
    let options = ParsingOptions {
        allow_dtd: true,
        ..ParsingOptions::default()
    };
    let doc = Document::parse_with_options(text, options)?;

    let posts: Vec<Post> = doc
        .descendants()
        .filter(|node| node.has_tag_name("item"))
        .map(|item| post_from_item(item, fallback_published_at))
        .collect();

    if posts.is_empty() && doc.root_element().has_tag_name("feed") {
        return parse_with_feed_rs(trimmed, fallback_published_at);
    }

    Ok(ParsedFeed {
        format: FeedFormat::RssXml,
        posts,
    })
}

fn parse_with_feed_rs(raw: &[u8], fallback_published_at: &str) -> Result<ParsedFeed, FeedParseError> {
    let feed = feed_rs::parser::parse(raw)?;
    let format = match feed.feed_type {
        FeedType::Atom => FeedFormat::AtomXml,
        _ => FeedFormat::RssXml,
    };
    let posts = feed
        .entries
        .iter()
        .map(|entry| post_from_entry(entry, fallback_published_at))
        .collect();

    Ok(ParsedFeed { format, posts })
}

fn post_from_item(item: Node<'_, '_>, fallback_published_at: &str) -> Post {
    Post::from_parts(
        child_text(item, "title"),
        child_text(item, "link"),
        child_text(item, "description"),
        child_text(item, "pubDate"),
        fallback_published_at,
    )
}

fn post_from_entry(entry: &Entry, fallback_published_at: &str) -> Post {
    let title = entry.title.as_ref().map(|text| text.content.clone());
    let link = entry.links.first().map(|link| link.href.clone());
    let description = entry
        .summary
        .as_ref()
        .map(|text| text.content.clone())
        .or_else(|| {
            entry
                .content
                .as_ref()
                .and_then(|content| content.body.clone())
        });
    let published_at = entry
        .published
        .or(entry.updated)
        .map(|timestamp| timestamp.to_rfc3339());

    Post::from_parts(title, link, description, published_at, fallback_published_at)
}

/// Full text of the first child element of `parent` named `name` in the
/// parent's own namespace, CDATA included.
fn child_text(parent: Node<'_, '_>, name: &str) -> Option<String> {
    let namespace = parent.tag_name().namespace();
    parent
        .children()
        .find(|child| {
            child.is_element()
                && child.tag_name().name() == name
                && child.tag_name().namespace() == namespace
        })
        .map(|child| {
            child
                .descendants()
                .filter(|node| node.is_text())
                .filter_map(|node| node.text())
                .collect::<String>()
                .trim()
                .to_string()
        })
}

fn non_empty_payload(raw: &[u8]) -> Result<&[u8], FeedParseError> {
    let trimmed = trim_leading_ascii_whitespace(raw);
    if trimmed.is_empty() {
        return Err(FeedParseError::EmptyPayload);
    }
    Ok(trimmed)
}

fn trim_leading_ascii_whitespace(raw: &[u8]) -> &[u8] {
    let mut index = 0;
    while index < raw.len() && raw[index].is_ascii_whitespace() {
        index += 1;
    }
    &raw[index..]
}
