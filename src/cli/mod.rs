use clap::{Parser, Subcommand};

use crate::app::{App, DigestOptions, RankOptions};
use crate::error::Result;
use crate::models::{ReadState, SummaryMode};
use crate::render;

#[derive(Parser, Debug)]
#[command(
    name = "techread",
    about = "Fetch, rank, and summarize technical blogs locally.",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Fetch new posts from enabled sources, extract readable text, and store locally.
    Fetch {
        /// Max entries to consider per source per run.
        #[arg(long, default_value_t = 50)]
        limit_per_source: usize,
    },

    /// Compute ranking scores for posts and print a ranked list with explanations.
    Rank {
        /// Rank all stored posts instead of only the recent window.
        #[arg(long)]
        all: bool,

        /// Show top N ranked posts.
        #[arg(long)]
        top: Option<usize>,

        /// Include already read posts.
        #[arg(long)]
        include_read: bool,

        /// Recent window in hours.
        #[arg(long, default_value_t = 48)]
        hours: i64,

        /// Filter by source id (repeatable).
        #[arg(short = 's', long = "source")]
        sources: Vec<i64>,

        /// Filter by source name/tags containing tag (repeatable).
        #[arg(short = 't', long = "tag")]
        tags: Vec<String>,
    },

    /// Print a busy-reader digest: ranked titles + optional 1-line takeaways.
    Digest {
        /// Use all stored posts instead of the recent window.
        #[arg(long)]
        all: bool,

        /// Top N items.
        #[arg(long)]
        top: Option<usize>,

        /// Time budget in minutes (0 = no budget).
        #[arg(long, default_value_t = 0)]
        minutes: u32,

        /// Skip generating missing 1-line summaries.
        #[arg(long)]
        no_summaries: bool,

        /// Filter by source id (repeatable).
        #[arg(short = 's', long = "source")]
        sources: Vec<i64>,

        /// Filter by source name/tags containing tag (repeatable).
        #[arg(short = 't', long = "tag")]
        tags: Vec<String>,
    },

    /// Summarize a stored post using the configured model. Cached by content hash.
    Summarize {
        post_id: i64,

        /// Summary mode.
        #[arg(long, value_enum, default_value_t = SummaryMode::Takeaways)]
        mode: SummaryMode,
    },

    /// Open a post in your default browser.
    Open { post_id: i64 },

    /// Update read state for a post.
    Mark {
        post_id: i64,

        #[arg(value_enum)]
        state: ReadState,
    },

    /// Manage sources (RSS/Atom).
    Sources {
        #[command(subcommand)]
        command: SourcesCommand,
    },
}

#[derive(Subcommand, Debug)]
pub enum SourcesCommand {
    /// List all sources.
    List,

    /// Add an RSS/Atom feed source.
    Add {
        /// RSS/Atom feed URL.
        url: String,

        /// Display name.
        #[arg(long)]
        name: Option<String>,

        /// Source weight (ranking prior).
        #[arg(long, default_value_t = 1.0)]
        weight: f64,

        /// Comma-separated tags.
        #[arg(long, default_value = "")]
        tags: String,
    },

    /// Enable a source.
    Enable { source_id: i64 },

    /// Disable a source (the soft-delete path; posts are kept).
    Disable { source_id: i64 },

    /// Remove posts below the minimum word count threshold.
    Purge {
        /// Limit purge to specific source ids (repeatable).
        #[arg(short = 's', long = "source")]
        sources: Vec<i64>,

        /// Show count without deleting.
        #[arg(long)]
        dry_run: bool,
    },

    /// Quick validation: parse a feed and show the first 5 entries.
    Test { url: String },

    /// Auto-fill missing source names and tags from feed metadata.
    Autofill {
        /// Only update this source id.
        #[arg(long)]
        id: Option<i64>,

        /// Overwrite existing name/tags.
        #[arg(long)]
        force: bool,
    },
}

pub async fn run(app: &App, cli: Cli) -> Result<()> {
    let now = chrono::Utc::now();
    match cli.command {
        Command::Fetch { limit_per_source } => {
            let report = app.fetch(limit_per_source).await?;
            if report.sources.is_empty() {
                println!("No sources enabled. Add one with: techread sources add <rss_url>");
                return Ok(());
            }
            for source in &report.sources {
                if source.feed_failed {
                    println!("Failed to fetch {}", source.source_name);
                } else {
                    println!(
                        "{}: {} new, {} skipped, {} failures",
                        source.source_name,
                        source.new_posts,
                        source.skipped,
                        source.fetch_failures
                    );
                }
            }
            println!(
                "Done. New posts added: {} ({} sources failed)",
                report.new_posts, report.sources_failed
            );
        }

        Command::Rank {
            all,
            top,
            include_read,
            hours,
            sources,
            tags,
        } => {
            let ranked = app
                .rank(
                    now,
                    RankOptions {
                        window_hours: (!all).then_some(hours),
                        top,
                        include_read,
                        source_ids: sources,
                        tags,
                    },
                )
                .await?;
            if ranked.is_empty() {
                println!("No posts to rank (try `techread fetch` first).");
                return Ok(());
            }
            render::print_ranked(&ranked, true);
        }

        Command::Digest {
            all,
            top,
            minutes,
            no_summaries,
            sources,
            tags,
        } => {
            let items = app
                .digest(
                    now,
                    DigestOptions {
                        window_hours: (!all).then_some(48),
                        top,
                        budget_minutes: (minutes > 0).then_some(minutes),
                        auto_summarize: !no_summaries,
                        source_ids: sources,
                        tags,
                    },
                )
                .await?;
            render::print_digest(&items);
        }

        Command::Summarize { post_id, mode } => {
            let (post, outcome) = app.summarize_post(post_id, mode).await?;
            println!("{}", post.title);
            println!("  {}", post.url);
            let author = if post.author.trim().is_empty() {
                "-"
            } else {
                post.author.trim()
            };
            println!("  author={author}  published={}", post.published_at);
            println!("  id={post_id}");
            println!("  ---");
            println!("{}", outcome.text);
        }

        Command::Open { post_id } => {
            let url = app.open_post(post_id).await?;
            println!("Opened {url}");
        }

        Command::Mark { post_id, state } => {
            app.mark_post(post_id, state).await?;
            println!("Marked {post_id} as {state}.");
        }

        Command::Sources { command } => run_sources(app, command).await?,
    }
    Ok(())
}

async fn run_sources(app: &App, command: SourcesCommand) -> Result<()> {
    match command {
        SourcesCommand::List => {
            let sources = app.list_sources().await?;
            render::print_sources(&sources);
        }

        SourcesCommand::Add {
            url,
            name,
            weight,
            tags,
        } => match app.add_source(url, name, weight, tags).await {
            Ok((name, warnings)) => {
                for warning in warnings {
                    eprintln!("Warn: {warning}");
                }
                println!("Added source: {name}");
            }
            Err(e) => {
                return Err(anyhow::anyhow!("Could not add source: {e}").into());
            }
        },

        SourcesCommand::Enable { source_id } => {
            app.set_source_enabled(source_id, true).await?;
            println!("Enabled source {source_id}.");
        }

        SourcesCommand::Disable { source_id } => {
            app.set_source_enabled(source_id, false).await?;
            println!("Disabled source {source_id}.");
        }

        SourcesCommand::Purge { sources, dry_run } => {
            if dry_run {
                let count = app.count_purgeable(sources).await?;
                println!("Short posts found: {count}");
            } else {
                let purged = app.purge_short_posts(sources).await?;
                println!("Purged posts: {purged}");
            }
        }

        SourcesCommand::Test { url } => {
            let (_, entries) = app.test_feed(&url).await?;
            if entries.is_empty() {
                println!("No entries found.");
                return Ok(());
            }
            println!("Top entries for {url}");
            for (i, entry) in entries.iter().take(5).enumerate() {
                println!("{}. {}", i + 1, entry.title);
                println!("   {}", entry.url);
                if let Some(published) = entry.published {
                    println!("   published: {}", published.to_rfc3339());
                }
                println!();
            }
        }

        SourcesCommand::Autofill { id, force } => {
            let (updated, warnings) = app.autofill_sources(id, force).await?;
            for warning in warnings {
                eprintln!("Warn: {warning}");
            }
            println!("Updated sources: {updated}");
        }
    }
    Ok(())
}
