//! Command-line interface definitions for the archive ingester.
//!
//! This module defines the CLI subcommands and options using the `clap` crate.
//! The database path and base URL can also be provided via environment variables.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Command-line arguments for the archive ingester.
///
/// # Examples
///
/// ```sh
/// # Crawl 50 listing pages into the default database
/// archive_ingest crawl --base-url https://www.politico.eu/newsletter/london-playbook
///
/// # Export to a flat text file instead of SQLite
/// archive_ingest crawl --base-url https://example.test/news --export articles.txt
///
/// # Mentions of a term (or two terms together) per date
/// archive_ingest mentions brexit
/// archive_ingest mentions brexit trade
///
/// # Wipe the database before a fresh import
/// archive_ingest reset --yes
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Crawl the paginated archive and store every complete article
    Crawl(CrawlArgs),
    /// Drop every table in the database and recreate the schema (destructive)
    Reset(ResetArgs),
    /// Count articles mentioning a term, or two terms together, per date
    Mentions(MentionsArgs),
    /// List stored articles
    Articles(ArticlesArgs),
}

#[derive(Args, Debug)]
pub struct CrawlArgs {
    /// Archive root; article URLs must start with it
    #[arg(short, long, env = "ARCHIVE_BASE_URL")]
    pub base_url: String,

    /// First listing page to fetch (defaults to the base URL)
    #[arg(long)]
    pub start_url: Option<String>,

    /// Text an article URL's suffix (after the base URL) must contain
    #[arg(long, default_value = "-")]
    pub slug_marker: String,

    /// Maximum number of listing pages to visit (at least 1)
    #[arg(
        short = 'p',
        long,
        default_value_t = crate::config::DEFAULT_MAX_PAGES,
        value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..)
    )]
    pub max_pages: usize,

    /// SQLite database file
    #[arg(short, long, env = "ARCHIVE_DB", default_value = "scraped_articles.db", conflicts_with = "export")]
    pub db: PathBuf,

    /// Write articles to this flat text file instead of the database
    #[arg(short, long)]
    pub export: Option<PathBuf>,

    /// Number of concurrent article fetches
    #[arg(short, long, default_value_t = crate::config::DEFAULT_WORKERS)]
    pub workers: usize,

    /// Pause between listing pages, in milliseconds
    #[arg(long, default_value_t = 2000)]
    pub page_delay_ms: u64,

    /// Per-request timeout, in seconds
    #[arg(long, default_value_t = 10)]
    pub timeout_secs: u64,

    /// YAML site profile overriding the default selectors
    #[arg(long)]
    pub profile: Option<PathBuf>,

    /// Also write the run summary as JSON to this path
    #[arg(long)]
    pub summary_json: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct ResetArgs {
    /// SQLite database file
    #[arg(short, long, env = "ARCHIVE_DB", default_value = "scraped_articles.db")]
    pub db: PathBuf,

    /// Confirm that every table should be dropped
    #[arg(long)]
    pub yes: bool,
}

#[derive(Args, Debug)]
pub struct MentionsArgs {
    /// SQLite database file
    #[arg(short, long, env = "ARCHIVE_DB", default_value = "scraped_articles.db")]
    pub db: PathBuf,

    /// Term to search for in titles and content
    pub term: String,

    /// Second term that must also appear (co-occurrence)
    pub and_term: Option<String>,
}

#[derive(Args, Debug)]
pub struct ArticlesArgs {
    /// SQLite database file
    #[arg(short, long, env = "ARCHIVE_DB", default_value = "scraped_articles.db")]
    pub db: PathBuf,

    /// Only articles containing this term (repeatable, all must match)
    #[arg(short, long = "term")]
    pub terms: Vec<String>,

    /// Earliest stored date (inclusive, compared as text)
    #[arg(long)]
    pub from: Option<String>,

    /// Latest stored date (inclusive, compared as text)
    #[arg(long)]
    pub to: Option<String>,

    /// Maximum number of rows
    #[arg(short, long)]
    pub limit: Option<usize>,
}
