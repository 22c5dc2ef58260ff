//! # Archive Ingest
//!
//! Crawls a paginated news archive, extracts each article's title, author,
//! date and body, and stores the complete ones in SQLite for later textual
//! analysis.
//!
//! ## Usage
//!
//! ```sh
//! archive_ingest crawl --base-url https://www.politico.eu/newsletter/london-playbook --max-pages 50
//! archive_ingest mentions brexit
//! ```
//!
//! ## Architecture
//!
//! The crawl follows a pipeline:
//! 1. **Listing**: Walk the listing pages via their "next" links and collect article URLs
//! 2. **Extracting**: Fetch each distinct article URL (a few at a time) and pull out its fields
//! 3. **Persisting**: Write every complete article to the store in one batch
//!
//! The `reset`, `mentions` and `articles` subcommands operate on the store only.

use clap::Parser;
use std::error::Error;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::{fmt as tfmt, EnvFilter};

mod cli;
mod config;
mod crawler;
mod extract;
mod fetcher;
mod listing;
mod models;
mod outputs;
mod store;
mod utils;

use cli::{ArticlesArgs, Cli, Command, CrawlArgs, MentionsArgs, ResetArgs};
use config::{CrawlConfig, SiteProfile};
use crawler::Crawler;
use listing::SlugMarker;
use outputs::{json, text::TextExport};
use store::{ArticleQuery, ArticleSink, Store};
use utils::{ensure_writable_parent, truncate_for_log};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .with_writer(std::io::stderr)
        .init();

    let args = Cli::parse();
    debug!(?args, "Parsed CLI arguments");

    match args.command {
        Command::Crawl(args) => crawl(args).await,
        Command::Reset(args) => reset(args),
        Command::Mentions(args) => mentions(args),
        Command::Articles(args) => articles(args),
    }
}

#[instrument(level = "info", skip_all, fields(base_url = %args.base_url))]
async fn crawl(args: CrawlArgs) -> Result<(), Box<dyn Error>> {
    let start_time = std::time::Instant::now();

    let profile = match &args.profile {
        Some(path) => SiteProfile::load(path).await?,
        None => SiteProfile::default(),
    };
    let config = CrawlConfig {
        start_url: args.start_url.clone(),
        max_pages: args.max_pages,
        page_delay: Duration::from_millis(args.page_delay_ms),
        workers: args.workers,
        timeout: Duration::from_secs(args.timeout_secs),
        profile,
        ..CrawlConfig::new(args.base_url.clone())
    };
    info!(
        max_pages = config.max_pages,
        workers = config.workers,
        page_delay_ms = args.page_delay_ms,
        "Crawl configured"
    );
    let crawler = Crawler::new(config)?.with_classifier(SlugMarker::new(args.slug_marker.clone()));

    let mut sink: Box<dyn ArticleSink> = match &args.export {
        Some(path) => {
            ensure_writable_parent(path).await?;
            info!(path = %path.display(), "Exporting to flat file");
            Box::new(TextExport::new(path))
        }
        None => {
            ensure_writable_parent(&args.db).await?;
            let store = Store::open(&args.db)?;
            store.ensure_schema()?;
            info!(path = %args.db.display(), existing = store.count()?, "Opened article store");
            Box::new(store)
        }
    };

    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received; finishing in-flight fetches and flushing");
            signal_token.cancel();
        }
    });

    let summary = match crawler.run(sink.as_mut(), &cancel).await {
        Ok(summary) => summary,
        Err(e) => {
            error!(error = %e, "Crawl failed");
            return Err(e);
        }
    };

    if let Some(path) = &args.summary_json {
        json::write_summary(&summary, path).await?;
    }

    println!("pages visited:        {}", summary.pages_visited);
    println!("urls discovered:      {}", summary.urls_discovered);
    println!("articles persisted:   {}", summary.articles_persisted);
    println!("articles incomplete:  {}", summary.articles_incomplete);
    println!("fetch failures:       {}", summary.fetch_failures);
    if summary.cancelled {
        println!("run was cancelled before completion");
    }

    let elapsed = start_time.elapsed();
    info!(?elapsed, secs = elapsed.as_secs(), "Execution complete");
    Ok(())
}

#[instrument(level = "info", skip_all, fields(db = %args.db.display()))]
fn reset(args: ResetArgs) -> Result<(), Box<dyn Error>> {
    if !args.yes {
        error!("Refusing to clear the database without --yes");
        return Err("reset drops every table; re-run with --yes to confirm".into());
    }

    let mut store = Store::open(&args.db)?;
    let dropped = store.clear_all()?;
    store.ensure_schema()?;
    println!("dropped {dropped} table(s); schema recreated");
    Ok(())
}

fn mentions(args: MentionsArgs) -> Result<(), Box<dyn Error>> {
    let store = Store::open(&args.db)?;
    let counts = match &args.and_term {
        Some(second) => store.co_mention_counts(&args.term, second)?,
        None => store.mention_counts(&args.term)?,
    };
    info!(rows = counts.len(), "Mention query complete");

    for row in counts {
        println!("{}\t{}", row.date.as_deref().unwrap_or("(no date)"), row.count);
    }
    Ok(())
}

fn articles(args: ArticlesArgs) -> Result<(), Box<dyn Error>> {
    let store = Store::open(&args.db)?;
    let rows = store.query(&ArticleQuery {
        terms: args.terms,
        date_from: args.from,
        date_to: args.to,
        limit: args.limit,
    })?;
    info!(rows = rows.len(), "Article query complete");

    for row in rows {
        println!(
            "{}\t{}\t{}\t{}\t{}",
            row.id,
            row.date.as_deref().unwrap_or(""),
            row.title.as_deref().unwrap_or(""),
            row.author.as_deref().unwrap_or(""),
            truncate_for_log(row.content.as_deref().unwrap_or(""), 80)
        );
    }
    Ok(())
}
