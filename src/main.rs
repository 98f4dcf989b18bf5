use anyhow::Context;
use blog_feed::config::Config;
use blog_feed::core::AppServices;
use blog_feed::{commands, init_logging};
use clap::{Parser, Subcommand};
use tokio::io::BufReader;

#[derive(Debug, Parser)]
#[command(name = "blog-feed", version, about = "Latest posts from a blog feed, with relay fallbacks and a local cache")]
struct Cli {
    /// Feed to read (overrides BLOG_FEED_URL)
    #[arg(long, env = "BLOG_FEED_URL")]
    feed_url: Option<String>,

    /// Cache database, or `memory` (overrides BLOG_FEED_DATABASE_URL)
    #[arg(long, env = "BLOG_FEED_DATABASE_URL")]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Fetch the latest posts, falling back to the cache or placeholders
    Show {
        /// Print the HTML fragment instead of a text list
        #[arg(long)]
        html: bool,
    },
    /// Clear the cache and fetch again
    Refresh,
    /// Print cache state as JSON
    Status,
    /// Remove cached posts and the fetch timestamp
    Clear,
    /// Keep refreshing in the background; reads `visible` and `refresh` from stdin
    Watch,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mut config = Config::from_env().context("invalid configuration")?;
    let cli = Cli::parse();
    if let Some(feed_url) = cli.feed_url {
        config.feed_url = feed_url;
    }
    if let Some(database_url) = cli.database_url {
        config.database_url = database_url;
    }

    init_logging(&config.log_format);

    let services = AppServices::build(&config)
        .await
        .context("failed to initialise feed services")?;

    match cli.command {
        Command::Show { html } => print!("{}", commands::show(&services, html).await?),
        Command::Refresh => print!("{}", commands::refresh(&services).await?),
        Command::Status => println!("{}", commands::status(&services).await?),
        Command::Clear => println!("{}", commands::clear(&services).await),
        Command::Watch => {
            let stdin = BufReader::new(tokio::io::stdin());
            let shutdown = async {
                if let Err(error) = tokio::signal::ctrl_c().await {
                    tracing::warn!(%error, "failed to listen for ctrl-c");
                    std::future::pending::<()>().await;
                }
            };
            commands::watch(&services, stdin, &mut std::io::stdout(), shutdown).await?;
        }
    }

    Ok(())
}
