use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use feedsync::engine::build_http_client;
use feedsync::feed::{SyncError, SyncOutcome};
use feedsync::storage::{Database, DatabaseError, FeedRef, ItemFilter};
use feedsync::{Config, FeedEngine, Scheduler};

/// Get the config directory path (~/.config/feedsync/)
fn get_config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".config").join("feedsync"))
}

#[derive(Parser, Debug)]
#[command(
    name = "feedsync",
    version,
    about = "RSS/Atom synchronizer with adaptive polling and an icon cache"
)]
struct Args {
    /// Config file (default: ~/.config/feedsync/config.toml)
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Database file, overriding the config
    #[arg(long, value_name = "FILE", global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the background scheduler until interrupted
    Serve,
    /// Start tracking one or more feeds
    Add {
        #[arg(required = true)]
        urls: Vec<String>,
    },
    /// Sync the given feeds, or every feed that is due
    Sync {
        /// Ignore poll intervals
        #[arg(long)]
        force: bool,
        urls: Vec<String>,
    },
    /// Fetch icons for feed domains that have none
    Icons {
        /// Re-fetch icons that are already stored
        #[arg(long)]
        force: bool,
    },
    /// Stop tracking feeds and delete their items
    Remove {
        #[arg(required = true)]
        urls: Vec<String>,
    },
    /// List feeds as JSON
    Feeds,
    /// List items as JSON
    Items {
        #[arg(long)]
        feed: Option<i64>,
        #[arg(long)]
        limit: Option<i64>,
    },
    /// Write the icon for a domain to a file
    Icon {
        domain: String,
        #[arg(long, value_name = "FILE")]
        out: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let config_dir = get_config_dir()?;
    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| config_dir.join("config.toml"));
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    let db_path = args
        .db
        .clone()
        .unwrap_or_else(|| config.database_path(&config_dir));
    if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let db_path_str = db_path
        .to_str()
        .ok_or_else(|| anyhow::anyhow!("Invalid UTF-8 in database path"))?;
    let db = match Database::open(db_path_str).await {
        Ok(db) => db,
        Err(DatabaseError::InstanceLocked) => {
            eprintln!("Error: The feed database is locked by another process.");
            std::process::exit(1);
        }
        Err(e) => return Err(anyhow::anyhow!("Failed to open database: {}", e)),
    };

    let client = build_http_client(&config.user_agent).context("Failed to build HTTP client")?;
    let engine = Arc::new(FeedEngine::new(
        db,
        client,
        config.sync_settings(),
        config.icon_settings(),
    ));

    match args.command {
        Command::Serve => {
            let scheduler =
                Scheduler::with_timing(engine, config.pass_interval(), config.startup_delay());
            tokio::select! {
                _ = scheduler.run_forever() => {}
                result = tokio::signal::ctrl_c() => {
                    result.context("Failed to listen for shutdown signal")?;
                    tracing::info!("Shutting down");
                }
            }
        }
        Command::Add { urls } => {
            let mut failed = false;
            for url in &urls {
                match engine.add_feed(url).await {
                    Ok(feed) => println!("{}\t{}\t{}", feed.id, feed.url, feed.title),
                    Err(e @ SyncError::Unreachable { .. }) => {
                        // Row is kept and retried by later passes
                        eprintln!("Warning: {e}");
                    }
                    Err(e) => {
                        eprintln!("Error: {url}: {e}");
                        failed = true;
                    }
                }
            }
            if failed {
                std::process::exit(1);
            }
        }
        Command::Sync { force, urls } => {
            if urls.is_empty() {
                let report = engine
                    .sync_all_feeds(force)
                    .await
                    .context("Failed to sync feeds")?;
                println!(
                    "updated: {}, unchanged: {}, skipped: {}, failed: {}, new items: {}",
                    report.updated, report.unchanged, report.skipped, report.failed, report.new_items
                );
            } else {
                for url in urls {
                    let outcome = engine
                        .sync_feed(&FeedRef::Url(url.clone()), force)
                        .await
                        .with_context(|| format!("Failed to sync {url}"))?;
                    match outcome {
                        SyncOutcome::Skipped { due_in, .. } => {
                            println!("{url}: not due for {}s", due_in / 1000)
                        }
                        SyncOutcome::Updated { new_items, .. } => {
                            println!("{url}: {new_items} new items")
                        }
                        SyncOutcome::NoUpdate { .. } => println!("{url}: no new items"),
                        SyncOutcome::Failed { error, .. } => println!("{url}: failed: {error}"),
                    }
                }
            }
        }
        Command::Icons { force } => {
            let report = engine
                .refresh_icons(force)
                .await
                .context("Failed to refresh icons")?;
            println!(
                "fetched: {}, skipped: {}, failed: {}",
                report.fetched, report.skipped, report.failed
            );
        }
        Command::Remove { urls } => {
            for url in urls {
                let removed = engine
                    .delete_feed(&FeedRef::Url(url.clone()))
                    .await
                    .with_context(|| format!("Failed to remove {url}"))?;
                if removed {
                    println!("Removed {url}");
                } else {
                    eprintln!("Not tracked: {url}");
                }
            }
        }
        Command::Feeds => {
            let feeds = engine.get_feeds().await.context("Failed to list feeds")?;
            println!("{}", serde_json::to_string_pretty(&feeds)?);
        }
        Command::Items { feed, limit } => {
            let filter = ItemFilter {
                feed,
                limit,
                ..ItemFilter::default()
            };
            let items = engine
                .get_items(&filter)
                .await
                .context("Failed to list items")?;
            println!("{}", serde_json::to_string_pretty(&items)?);
        }
        Command::Icon { domain, out } => {
            let data = engine.get_icon(&domain).await;
            tokio::fs::write(&out, &data)
                .await
                .with_context(|| format!("Failed to write {}", out.display()))?;
            println!("Wrote {} bytes to {}", data.len(), out.display());
        }
    }

    Ok(())
}
