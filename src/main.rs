use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use console::Emoji;
use indicatif::{ProgressBar, ProgressStyle};

use podvault::{
    DirectResolver, EngineConfig, EngineEvent, EpisodeStore, EventSink, FeedUrlResolver,
    NoopSink, NoopTagWriter, Orchestrator, ReqwestClient, SharedEventSink,
};

// Emoji with fallback for terminals without Unicode support
static MICROPHONE: Emoji<'_, '_> = Emoji("🎙️  ", "");
static SEARCH: Emoji<'_, '_> = Emoji("🔍 ", "[~] ");
static DOWNLOAD: Emoji<'_, '_> = Emoji("📥 ", "[v] ");
static SUCCESS: Emoji<'_, '_> = Emoji("✅ ", "[+] ");
static FAILURE: Emoji<'_, '_> = Emoji("❌ ", "[!] ");
static DISK: Emoji<'_, '_> = Emoji("💾 ", "[=] ");
static WARNING: Emoji<'_, '_> = Emoji("⚠️  ", "[?] ");
static CHART: Emoji<'_, '_> = Emoji("📊 ", "");

/// Archive podcast feeds: download episodes, tag them, keep metadata
#[derive(Parser, Debug)]
#[command(name = "podvault")]
#[command(about = "Download and archive podcast episodes from RSS feeds")]
#[command(version)]
struct Args {
    /// RSS feed URL
    feed: String,

    /// SQLite database tracking episode state
    #[arg(long, default_value = "podvault.db")]
    db: PathBuf,

    /// Root directory for downloaded episodes
    #[arg(short, long, default_value = "downloads")]
    downloads_dir: PathBuf,

    /// JSON configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Download only the most recent pending episode
    #[arg(short, long)]
    latest: bool,

    /// Seconds to wait between episodes
    #[arg(long)]
    delay: Option<u64>,

    /// Report episodes whose files are missing from disk
    #[arg(long)]
    verify: bool,

    /// Quiet mode - suppress progress output
    #[arg(short, long)]
    quiet: bool,
}

/// Event sink rendering engine progress on a single spinner line
struct ConsoleSink {
    bar: ProgressBar,
}

impl ConsoleSink {
    fn new() -> Self {
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} {wide_msg}")
            .expect("static template is valid");

        let bar = ProgressBar::new_spinner();
        bar.set_style(style);
        bar.enable_steady_tick(Duration::from_millis(100));

        Self { bar }
    }
}

impl EventSink for ConsoleSink {
    fn emit(&self, event: EngineEvent) {
        match event {
            EngineEvent::FeedRefreshStarted { url } => {
                self.bar
                    .set_message(format!("{SEARCH}Fetching feed: {}", url.cyan()));
            }

            EngineEvent::FeedRefreshed {
                scope,
                total_episodes,
                new_episodes,
            } => {
                self.bar.println(format!(
                    "{SEARCH}{} • {} episodes total, {} new",
                    scope.bold().green(),
                    total_episodes.to_string().cyan(),
                    new_episodes.to_string().yellow()
                ));
            }

            EngineEvent::EpisodeStarted {
                title,
                index,
                total,
                ..
            } => {
                self.bar.set_message(format!(
                    "{DOWNLOAD}[{}/{}] {}",
                    (index + 1).to_string().cyan(),
                    total.to_string().cyan(),
                    truncate_title(&title, 50)
                ));
            }

            EngineEvent::EpisodeDownloaded { title, bytes, .. } => {
                self.bar.println(format!(
                    "{SUCCESS}{} ({} bytes)",
                    truncate_title(&title, 50).green(),
                    bytes
                ));
            }

            EngineEvent::EpisodeAlreadyPresent { title, .. } => {
                self.bar.println(format!(
                    "{SUCCESS}{} {}",
                    truncate_title(&title, 50).green(),
                    "(already on disk)".dimmed()
                ));
            }

            EngineEvent::EpisodeFailed { title, error, .. } => {
                self.bar.println(format!(
                    "{FAILURE}{} - {}",
                    truncate_title(&title, 40).red(),
                    error.red()
                ));
            }

            EngineEvent::RetryScheduled {
                attempt,
                max_attempts,
                delay,
                ..
            } => {
                self.bar.set_message(format!(
                    "{WARNING}retrying (attempt {attempt}/{max_attempts}) in {}s",
                    delay.as_secs()
                ));
            }

            EngineEvent::BatchCommitted { count } => {
                self.bar
                    .println(format!("{DISK}committed {count} episode updates"));
            }

            EngineEvent::BatchDiscarded { count, error } => {
                self.bar.println(format!(
                    "{FAILURE}discarded batch of {count}: {}",
                    error.red()
                ));
            }

            EngineEvent::TagWriteFailed { error, .. } => {
                self.bar
                    .println(format!("{WARNING}tag update failed: {}", error.dimmed()));
            }

            EngineEvent::ArchiveSkipped { reason, .. } => {
                self.bar
                    .println(format!("{WARNING}metadata not archived: {}", reason.dimmed()));
            }

            EngineEvent::RunCompleted { succeeded, failed } => {
                self.bar.finish_and_clear();
                println!(
                    "\n{} {} downloaded, {} failed",
                    "Run complete:".bold().green(),
                    succeeded.to_string().green().bold(),
                    if failed > 0 {
                        failed.to_string().red().bold()
                    } else {
                        failed.to_string().green()
                    }
                );
            }

            // Cache and cover-art chatter stays off the console
            _ => {}
        }
    }
}

fn truncate_title(title: &str, max_len: usize) -> String {
    if title.chars().count() <= max_len {
        title.to_string()
    } else {
        let truncated: String = title.chars().take(max_len.saturating_sub(3)).collect();
        format!("{truncated}...")
    }
}

fn load_config(args: &Args) -> Result<EngineConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config file {}", path.display()))?;
            serde_json::from_str(&raw)
                .with_context(|| format!("failed to parse config file {}", path.display()))?
        }
        None => EngineConfig::default(),
    };

    config.downloads_dir = args.downloads_dir.clone();
    if let Some(secs) = args.delay {
        config.episode_delay = Duration::from_secs(secs);
    }

    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if !args.quiet {
        println!(
            "\n{}{} {}\n",
            MICROPHONE,
            "podvault".bold().magenta(),
            "- Podcast Archiver".dimmed()
        );
    }

    let config = load_config(&args)?;

    let feed_url = DirectResolver
        .resolve(&args.feed)
        .context("invalid feed URL")?;

    let store = EpisodeStore::open(&args.db)
        .await
        .context("failed to open episode store")?;

    let sink: SharedEventSink = if args.quiet {
        NoopSink::shared()
    } else {
        Arc::new(ConsoleSink::new())
    };

    let mut orchestrator = Orchestrator::new(
        &config,
        store,
        ReqwestClient::new(),
        Box::new(NoopTagWriter),
        sink,
    );

    let scope = orchestrator
        .refresh_feed(&feed_url)
        .await
        .context("failed to refresh feed")?;

    let report = if args.latest {
        let downloaded = orchestrator
            .download_latest(&scope)
            .await
            .context("failed to download latest episode")?;
        if !args.quiet && !downloaded {
            println!("{}", "Nothing pending; latest episode already present.".dimmed());
        }
        None
    } else {
        Some(
            orchestrator
                .download_all(&scope)
                .await
                .context("download run failed")?,
        )
    };

    if args.verify {
        let missing = orchestrator
            .store()
            .verify_files_exist(&scope)
            .await
            .context("failed to verify downloaded files")?;
        if missing.is_empty() {
            if !args.quiet {
                println!("{SUCCESS}All recorded downloads are present on disk.");
            }
        } else {
            println!(
                "\n{WARNING}{} recorded as downloaded but missing on disk:",
                missing.len().to_string().red().bold()
            );
            for id in &missing {
                println!("  {} {}", "✗".red(), id.yellow());
            }
        }
    }

    if !args.quiet
        && let Some(summary) = orchestrator.store().summary(&scope).await?
    {
        println!(
            "\n{CHART}{}: {}/{} episodes downloaded ({:.1}%)",
            summary.name.bold(),
            summary.downloaded_count.to_string().green(),
            summary.total_episodes,
            summary.percent_downloaded
        );
        println!(
            "{}Output: {}\n",
            Emoji("📁 ", ""),
            config.downloads_dir.display().to_string().cyan()
        );
    }

    if let Some(report) = report
        && report.failed > 0
        && report.succeeded == 0
    {
        std::process::exit(1);
    }

    Ok(())
}
