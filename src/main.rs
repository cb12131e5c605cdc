mod bookmark;
mod cache;
mod config;
mod db;
mod dispatch;
mod error;
mod extractor;
mod fetch;
mod pipeline;
mod store;
mod sync;
mod tagger;

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing::{debug, warn};

use crate::config::Config;
use crate::db::SqliteStore;
use crate::dispatch::{dispatch, HostEvent, MenuItem, Outcome, Shortcut};
use crate::error::CaptureError;
use crate::fetch::Fetcher;
use crate::pipeline::{DraftEdits, Pipeline, Tab};
use crate::tagger::parse_tag_list;

#[derive(Parser)]
#[command(name = "bookmark_capture", about = "Capture web pages as enriched bookmarks")]
struct Cli {
    /// SQLite database (default: $BOOKMARK_DB or data/bookmarks.sqlite)
    #[arg(long, global = true)]
    db: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the database and write default settings
    Init,
    /// Quick-capture a page
    Page {
        url: String,
        /// Comma-separated tags
        #[arg(short, long, default_value = "")]
        tags: String,
    },
    /// Quick-capture a link found on a page
    Link {
        url: String,
        /// Page the link was found on
        #[arg(long)]
        from: String,
        #[arg(short, long, default_value = "")]
        tags: String,
    },
    /// Quick-capture text selected on a page
    Selection {
        url: String,
        #[arg(long)]
        text: String,
        #[arg(short, long, default_value = "")]
        tags: String,
    },
    /// Build an editable draft of a page
    Draft { url: String },
    /// Save the current draft, applying edits
    Save {
        #[arg(long)]
        title: Option<String>,
        /// Replaces the draft's tags
        #[arg(short, long)]
        tags: Option<String>,
        #[arg(long)]
        note: Option<String>,
    },
    /// Capture every URL listed in a file (one per line)
    Batch {
        file: PathBuf,
        /// Max URLs to capture
        #[arg(short = 'n', long)]
        limit: Option<usize>,
        #[arg(short, long, default_value = "")]
        tags: String,
    },
    /// Show locally cached bookmarks, newest first
    List {
        /// Max rows to display
        #[arg(short = 'n', long, default_value = "20")]
        limit: usize,
    },
    /// Show local cache statistics
    Stats,
    /// Show or change settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    Show,
    /// Set one key (serverUrl, apiKey, userId, autoTags, notifications, defaultTags, autoFillTags)
    Set { key: String, value: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let db_path = db::resolve_path(cli.db);
    let store = SqliteStore::open(&db_path)
        .with_context(|| format!("Failed to open {}", db_path.display()))?;

    let result = match cli.command {
        Commands::Init => {
            if Config::init_defaults(&store)? {
                println!("Initialised {} with default settings", db_path.display());
            } else {
                println!("{} already initialised", db_path.display());
            }
            Ok(())
        }
        Commands::Page { url, tags } => {
            let tab = load_tab(&url).await?;
            let event = HostEvent::Shortcut {
                shortcut: Shortcut::QuickSave,
                tab,
                tags: parse_tag_list(&tags),
            };
            run_event(&store, event).await
        }
        Commands::Link { url, from, tags } => {
            let fetcher = Fetcher::new()?;
            let link_html = fetch_best_effort(&fetcher, &url).await;
            let event = HostEvent::Menu {
                item: MenuItem::BookmarkLink,
                tab: Tab {
                    url: from,
                    ..Tab::default()
                },
                link_url: Some(url),
                link_html,
                selection: None,
                tags: parse_tag_list(&tags),
            };
            run_event(&store, event).await
        }
        Commands::Selection { url, text, tags } => {
            let tab = load_tab(&url).await?;
            let event = HostEvent::Menu {
                item: MenuItem::BookmarkSelection,
                tab,
                link_url: None,
                link_html: None,
                selection: Some(text),
                tags: parse_tag_list(&tags),
            };
            run_event(&store, event).await
        }
        Commands::Draft { url } => {
            let tab = load_tab(&url).await?;
            let event = HostEvent::Menu {
                item: MenuItem::BookmarkPage,
                tab,
                link_url: None,
                link_html: None,
                selection: None,
                tags: Vec::new(),
            };
            run_event(&store, event).await
        }
        Commands::Save { title, tags, note } => {
            let pipeline = Pipeline::new(Config::load(&store)?, &store);
            let Some(draft) = pipeline.load_draft()? else {
                bail!("No draft stored. Run 'draft <url>' first.");
            };
            let edits = DraftEdits {
                title,
                tags: tags.as_deref().map(parse_tag_list),
                note,
            };
            run_event(&store, HostEvent::Save { draft, edits }).await
        }
        Commands::Batch { file, limit, tags } => {
            let raw = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let mut urls: Vec<String> = raw
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty() && !l.starts_with('#'))
                .map(str::to_string)
                .collect();
            if let Some(limit) = limit {
                urls.truncate(limit);
            }
            if urls.is_empty() {
                println!("No URLs in {}.", file.display());
                return Ok(());
            }

            let config = Config::load(&store)?;
            let notifications = config.notifications;
            let mut pipeline = Pipeline::new(config, &store);

            let t_fetch = Instant::now();
            println!("Fetching {} pages...", urls.len());
            let pages = Arc::new(Fetcher::new()?).fetch_many(urls).await;
            println!("Fetched in {:.1}s", t_fetch.elapsed().as_secs_f64());

            let report = pipeline.capture_batch(pages, &parse_tag_list(&tags)).await;
            if notifications {
                println!(
                    "Saved {} bookmarks ({} local only, {} failed).",
                    report.synced + report.local_only,
                    report.local_only,
                    report.failed
                );
            }
            Ok(())
        }
        Commands::List { limit } => {
            let mut pipeline = Pipeline::new(Config::load(&store)?, &store);
            let entries = pipeline.cache().entries()?;
            if entries.is_empty() {
                println!("No bookmarks cached yet.");
                return Ok(());
            }

            println!(
                "{:>3} | {:<9} | {:<32} | {:<20} | {:<24} | {:<16}",
                "#", "Type", "Title", "Domain", "Tags", "Saved"
            );
            println!("{}", "-".repeat(118));
            for (i, r) in entries.iter().take(limit).enumerate() {
                println!(
                    "{:>3} | {:<9} | {:<32} | {:<20} | {:<24} | {:<16}",
                    i + 1,
                    r.kind.to_string(),
                    truncate(&r.title, 32),
                    truncate(&r.domain, 20),
                    truncate(&r.tags.join(", "), 24),
                    r.extracted_at.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M").to_string()
                );
            }
            println!("\n{} of {} cached bookmarks", limit.min(entries.len()), entries.len());
            Ok(())
        }
        Commands::Stats => {
            let mut pipeline = Pipeline::new(Config::load(&store)?, &store);
            let entries = pipeline.cache().entries()?;

            let domains: HashSet<&str> = entries.iter().map(|r| r.domain.as_str()).collect();
            let mut tag_counts: HashMap<&str, usize> = HashMap::new();
            for tag in entries.iter().flat_map(|r| r.tags.iter()) {
                *tag_counts.entry(tag.as_str()).or_insert(0) += 1;
            }
            let mut top: Vec<_> = tag_counts.into_iter().collect();
            top.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));

            println!("Cached:  {}", entries.len());
            println!("Domains: {}", domains.len());
            if !top.is_empty() {
                println!("\n--- Top tags ---");
                for (tag, count) in top.iter().take(10) {
                    println!("  {:<16} {}", tag, count);
                }
            }
            Ok(())
        }
        Commands::Config { action } => match action {
            ConfigAction::Show => {
                let mut config = Config::load(&store)?;
                if !config.api_key.is_empty() {
                    config.api_key = "********".into();
                }
                println!("{}", serde_json::to_string_pretty(&config)?);
                Ok(())
            }
            ConfigAction::Set { key, value } => {
                Config::set_key(&store, &key, &value)?;
                println!("Set {}", key);
                Ok(())
            }
        },
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

/// Run one host event through the pipeline and report the outcome.
async fn run_event(store: &SqliteStore, event: HostEvent) -> anyhow::Result<()> {
    let config = Config::load(store)?;
    let notifications = config.notifications;
    let mut pipeline = Pipeline::new(config, store);

    match dispatch(&mut pipeline, event).await {
        Ok(Outcome::Saved(synced)) => {
            debug!("Server replied: {}", synced.response);
            if let Some(e) = &synced.local_error {
                warn!("Local copy of {} was not written: {}", synced.document.url, e);
                if notifications {
                    println!("Synced \"{}\", but the local copy failed: {}", synced.document.title, e);
                }
                return Ok(());
            }
            if notifications {
                println!("Saved \"{}\" [{}]", synced.document.title, synced.document.tags);
            }
            Ok(())
        }
        Ok(Outcome::Drafted(draft)) => {
            pipeline.stash_draft(&draft)?;
            println!("{}", serde_json::to_string_pretty(&draft)?);
            println!("\nDraft stored. Edit and confirm with 'save'.");
            Ok(())
        }
        Ok(Outcome::Ignored(reason)) => {
            println!("Nothing captured: {}", reason);
            Ok(())
        }
        Err(e) if e.is_sync_failure() => {
            if notifications {
                println!("Saved locally, sync failed: {}", e);
            }
            Ok(())
        }
        Err(e @ CaptureError::RecordLost { .. }) => Err(e.into()),
        Err(e) => Err(anyhow::Error::new(e).context("Capture failed")),
    }
}

/// Fetch a page for capture. A failed fetch still yields a tab to capture from.
async fn load_tab(url: &str) -> anyhow::Result<Tab> {
    let fetcher = Fetcher::new()?;
    Ok(Tab {
        url: url.to_string(),
        html: fetch_best_effort(&fetcher, url).await,
        ..Tab::default()
    })
}

async fn fetch_best_effort(fetcher: &Fetcher, url: &str) -> Option<String> {
    match fetcher.fetch_html(url).await {
        Ok(html) => Some(html),
        Err(e) => {
            warn!("Could not fetch {}: {}", url, e);
            None
        }
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{}...", truncated)
    }
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
