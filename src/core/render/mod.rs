//! HTML fragment for the landing page's "latest posts" block.
//!
//! Every value coming from the feed is treated as untrusted: descriptions are
//! reduced to plain text and all interpolated text is escaped.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use html2text::render::text_renderer::TrivialDecorator;
use reqwest::Url;

use crate::core::feed::{Delivery, Post};

pub const EXCERPT_CHARS: usize = 150;
pub const CACHED_NOTE: &str = "Showing cached posts (live feed temporarily unavailable)";
const EMPTY_EXCERPT: &str = "Click to read more";
const UNDATED: &str = "Recent Post";
const DISPLAY_DATE: &str = "%B %-d, %Y";
const INERT_HREF: &str = "#";

pub fn render_delivery(delivery: &Delivery) -> String {
    let mut html: String = delivery.posts().iter().map(render_post).collect();
    if delivery.is_cached() {
        html.push_str(&format!(
            "<div class=\"blog-cache-note\">{}</div>\n",
            escape_html(CACHED_NOTE)
        ));
    }
    html
}

pub fn render_post(post: &Post) -> String {
    let title = escape_html(&post.title);
    let link = escape_html(&safe_href(&post.link));
    let datetime = escape_html(&post.published_at);
    format!(
        concat!(
            "<article class=\"blog-post\">\n",
            "  <h3 class=\"blog-post-title\">\n",
            "    <a href=\"{link}\" target=\"_blank\" rel=\"noopener\" aria-label=\"Read blog post: {title}\">{title}</a>\n",
            "  </h3>\n",
            "  <p class=\"blog-post-excerpt\">{excerpt}</p>\n",
            "  <div class=\"blog-post-meta\">\n",
            "    <time datetime=\"{datetime}\" class=\"blog-post-date\">{date}</time>\n",
            "  </div>\n",
            "</article>\n",
        ),
        link = link,
        title = title,
        excerpt = escape_html(&excerpt(&post.description)),
        datetime = datetime,
        date = escape_html(&display_date(&post.published_at)),
    )
}

/// Plain-text preview of a possibly-HTML description.
pub fn excerpt(description: &str) -> String {
    let text = strip_html(description);
    if text.is_empty() {
        return EMPTY_EXCERPT.to_string();
    }
    let truncated: String = text.chars().take(EXCERPT_CHARS).collect();
    format!("{truncated}...")
}

/// Text content only: no link footnotes, emphasis markers, bullets or table
/// borders.
pub fn strip_html(html: &str) -> String {
    if html.trim().is_empty() {
        return String::new();
    }
    let text = html2text::config::with_decorator(TrivialDecorator::new())
        .raw_mode(true)
        .string_from_read(html.as_bytes(), usize::MAX);
    match text {
        Ok(text) => text.split_whitespace().collect::<Vec<_>>().join(" "),
        Err(error) => {
            tracing::warn!(%error, "could not convert description to text");
            String::new()
        }
    }
}

/// Link target that cannot run script: absolute `http`/`https` URLs and
/// same-site paths or fragments pass, anything else becomes `#`.
pub fn safe_href(link: &str) -> String {
    let link = link.trim();
    let allowed = match Url::parse(link) {
        Ok(url) => matches!(url.scheme(), "http" | "https"),
        Err(_) => link.starts_with(['/', '#', '?']),
    };
    if allowed {
        link.to_string()
    } else {
        INERT_HREF.to_string()
    }
}

/// `January 5, 2024` for recognised timestamp shapes; anything else is shown
/// as given.
pub fn display_date(published_at: &str) -> String {
    let value = published_at.trim();
    if value.is_empty() {
        return UNDATED.to_string();
    }
    parse_date(value)
        .map(|date| date.format(DISPLAY_DATE).to_string())
        .unwrap_or_else(|| value.to_string())
}

fn parse_date(value: &str) -> Option<NaiveDate> {
    if let Ok(parsed) = DateTime::parse_from_rfc2822(value) {
        return Some(parsed.date_naive());
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.date_naive());
    }
    if let Ok(parsed) = NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S") {
        return Some(parsed.date());
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d").ok()
}

fn escape_html(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::feed::types::placeholder_posts;
    use pretty_assertions::assert_eq;

    fn post(description: &str, published_at: &str) -> Post {
        Post {
            title: "Scaling WordPress".to_string(),
            link: "https://blog.example.com/scaling".to_string(),
            description: description.to_string(),
            published_at: published_at.to_string(),
        }
    }

    #[test]
    fn formats_supported_date_shapes() {
        assert_eq!(display_date("Mon, 12 Feb 2024 09:30:00 +0000"), "February 12, 2024");
        assert_eq!(display_date("2024-03-01T08:00:00+00:00"), "March 1, 2024");
        assert_eq!(display_date("2024-01-20 07:15:00"), "January 20, 2024");
        assert_eq!(display_date("2024-01-01"), "January 1, 2024");
    }

    #[test]
    fn undated_and_unknown_dates_degrade() {
        assert_eq!(display_date(""), "Recent Post");
        assert_eq!(display_date("sometime last week"), "sometime last week");
    }

    #[test]
    fn excerpt_strips_markup_and_truncates() {
        let long = format!("<p>{}</p>", "word ".repeat(60));
        let preview = excerpt(&long);

        assert!(!preview.contains('<'));
        assert!(preview.ends_with("..."));
        assert_eq!(preview.chars().count(), EXCERPT_CHARS + 3);
    }

    #[test]
    fn empty_description_invites_click() {
        assert_eq!(excerpt(""), "Click to read more");
        assert_eq!(excerpt("   "), "Click to read more");
    }

    #[test]
    fn script_in_feed_is_never_emitted() {
        let hostile = Post {
            title: "<script>alert(1)</script>".to_string(),
            link: "\" onmouseover=\"alert(2)".to_string(),
            description: "<img src=x onerror=alert(3)><script>alert(4)</script>Hello".to_string(),
            published_at: "2024-01-01".to_string(),
        };

        let html = render_post(&hostile);

        assert!(!html.contains("<script>"));
        assert!(!html.contains("<img"));
        assert!(!html.contains("\" onmouseover"));
        assert!(html.contains("&lt;script&gt;alert(1)&lt;/script&gt;"));
    }

    #[test]
    fn script_and_data_links_become_inert() {
        for link in [
            "javascript:alert(document.cookie)",
            "  JavaScript:alert(1)",
            "java\tscript:alert(1)",
            "data:text/html;base64,PHNjcmlwdD5hbGVydCgxKTwvc2NyaXB0Pg==",
            "vbscript:msgbox(1)",
        ] {
            let mut hostile = post("", "2024-01-01");
            hostile.link = link.to_string();

            let html = render_post(&hostile);

            assert!(html.contains("<a href=\"#\""), "{link} was emitted as a link");
        }
    }

    #[test]
    fn web_links_and_fragments_are_kept() {
        assert_eq!(safe_href("https://blog.example.com/a?b=1"), "https://blog.example.com/a?b=1");
        assert_eq!(safe_href("http://blog.example.com"), "http://blog.example.com");
        assert_eq!(safe_href("/2024/01/post"), "/2024/01/post");
        assert_eq!(safe_href("#"), "#");
        assert_eq!(safe_href("mailto:me@example.com"), "#");
    }

    #[test]
    fn tables_lists_and_links_reduce_to_text() {
        let html = "<table><tr><td>a</td><td>b</td></tr><tr><td>c</td></tr></table>\
                    <ul><li><strong>one</strong></li><li><a href=\"https://x.test\">two</a></li></ul>";

        assert_eq!(strip_html(html), "a b c one two");
    }

    #[test]
    fn renders_post_markup() {
        let html = render_post(&post("<p>Object caching</p>", "2024-01-01"));

        assert!(html.contains("<a href=\"https://blog.example.com/scaling\""));
        assert!(html.contains("aria-label=\"Read blog post: Scaling WordPress\""));
        assert!(html.contains("<p class=\"blog-post-excerpt\">Object caching...</p>"));
        assert!(html.contains("<time datetime=\"2024-01-01\" class=\"blog-post-date\">January 1, 2024</time>"));
    }

    #[test]
    fn cached_delivery_carries_note() {
        let cached = render_delivery(&Delivery::Cached(vec![post("", "2024-01-01")]));
        let live = render_delivery(&Delivery::Live(vec![post("", "2024-01-01")]));

        assert!(cached.contains(CACHED_NOTE));
        assert!(!live.contains(CACHED_NOTE));
    }

    #[test]
    fn placeholder_delivery_renders_recent_post_labels() {
        let html = render_delivery(&Delivery::Placeholder(placeholder_posts("http://blog.example.com")));

        assert_eq!(html.matches("<article class=\"blog-post\">").count(), 3);
        assert_eq!(html.matches("Recent Post").count(), 3);
    }
}
