//! Handlers behind the `blog-feed` subcommands.

use std::future::Future;
use std::io::Write;

use anyhow::{bail, Context};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use crate::core::feed::Delivery;
use crate::core::render::{display_date, render_delivery};
use crate::core::AppServices;

/// Loads the latest posts the way a page load does and formats them.
pub async fn show(services: &AppServices, html: bool) -> anyhow::Result<String> {
    let Some(delivery) = services.feed().refresh().await else {
        bail!("a refresh is already running");
    };
    Ok(if html {
        render_delivery(&delivery)
    } else {
        summarize(&delivery)
    })
}

pub async fn refresh(services: &AppServices) -> anyhow::Result<String> {
    let Some(delivery) = services.feed().force_refresh().await else {
        bail!("a refresh is already running");
    };
    Ok(summarize(&delivery))
}

pub async fn status(services: &AppServices) -> anyhow::Result<String> {
    let status = services.feed().status().await;
    serde_json::to_string_pretty(&status).context("failed to encode status")
}

pub async fn clear(services: &AppServices) -> String {
    services.feed().clear_cache().await;
    "cache cleared".to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WatchCommand {
    Visible,
    Refresh,
    Quit,
}

fn parse_watch_command(line: &str) -> Option<WatchCommand> {
    match line.trim().to_ascii_lowercase().as_str() {
        "visible" | "v" => Some(WatchCommand::Visible),
        "refresh" | "r" => Some(WatchCommand::Refresh),
        "quit" | "exit" | "q" => Some(WatchCommand::Quit),
        _ => None,
    }
}

/// Runs the refresh scheduler, printing every published delivery, until
/// `shutdown` resolves or `quit` is read from `input`.
pub async fn watch<R, W, S>(
    services: &AppServices,
    input: R,
    out: &mut W,
    shutdown: S,
) -> anyhow::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: Write,
    S: Future<Output = ()>,
{
    let handle = services.scheduler().spawn();
    let mut deliveries = handle.subscribe();
    let mut lines = input.lines();
    let mut input_open = true;
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            changed = deliveries.changed() => {
                if changed.is_err() {
                    break;
                }
                let delivery = deliveries.borrow_and_update().clone();
                if let Some(delivery) = delivery {
                    write!(out, "{}", summarize(&delivery))?;
                    out.flush()?;
                }
            }
            line = lines.next_line(), if input_open => match line? {
                Some(line) if line.trim().is_empty() => {}
                Some(line) => match parse_watch_command(&line) {
                    Some(WatchCommand::Visible) => {
                        if !handle.notify_visible().await {
                            break;
                        }
                    }
                    Some(WatchCommand::Refresh) => {
                        if !handle.request_refresh().await {
                            break;
                        }
                    }
                    Some(WatchCommand::Quit) => break,
                    None => tracing::warn!(input = %line.trim(), "unknown watch command"),
                },
                None => input_open = false,
            },
        }
    }

    handle.shutdown().await;
    Ok(())
}

fn summarize(delivery: &Delivery) -> String {
    let mut text = format!("[{}] {} posts\n", delivery.label(), delivery.posts().len());
    for post in delivery.posts() {
        text.push_str(&format!(
            "- {}  {}\n  {}\n",
            display_date(&post.published_at),
            post.title,
            post.link
        ));
    }
    text
}
