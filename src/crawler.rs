//! The crawl controller: pagination, frontier, extraction and the final flush.
//!
//! A run moves through these phases:
//!
//! 1. **Listing**: fetch listing pages one after another, following each page's
//!    "next" link, and union the article URLs into the frontier. Stops when a
//!    page has no next link, a listing fetch fails, the page ceiling is reached,
//!    the next link points at a page already visited, or the run is cancelled.
//! 2. **Extracting**: fetch every frontier URL through a fixed-size pool and keep
//!    the complete articles. One failing article never affects its siblings.
//! 3. **Finished**: hand the kept articles to the sink in one batch and report
//!    a [`CrawlSummary`].
//!
//! Item failures are logged and counted. Only a failed flush is an error.

use chrono::Utc;
use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use std::error::Error;
use tokio::runtime::{Handle, RuntimeFlavor};
use tokio::task;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};
use url::Url;

use crate::config::CrawlConfig;
use crate::extract::Extractor;
use crate::fetcher::{FetchError, Fetcher};
use crate::listing::{ListingParser, SlugMarker, UrlClassifier};
use crate::models::{Article, CrawlSummary, Extraction};
use crate::store::ArticleSink;

/// Transient state of one crawl run. Created at start, dropped at the end.
#[derive(Debug, Default)]
pub struct CrawlState {
    /// Number of the listing page currently being processed (1-based).
    pub page: usize,
    /// Discovered article URLs.
    pub frontier: HashSet<String>,
    /// Listing pages already requested, to stop pagination cycles.
    pub visited_pages: HashSet<String>,
    /// Complete articles waiting for the final flush.
    pub pending: Vec<Article>,
    pub pages_visited: usize,
    pub articles_incomplete: usize,
    pub fetch_failures: usize,
    pub cancelled: bool,
}

/// Drives one crawl of a paginated archive.
pub struct Crawler {
    config: CrawlConfig,
    start_url: Url,
    fetcher: Fetcher,
    listing: ListingParser,
    extractor: Extractor,
    classifier: Box<dyn UrlClassifier>,
}

impl std::fmt::Debug for Crawler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Crawler")
            .field("base_url", &self.config.base_url)
            .field("max_pages", &self.config.max_pages)
            .field("workers", &self.config.workers)
            .finish()
    }
}

impl Crawler {
    /// Build a crawler using the hyphen-in-slug article heuristic.
    ///
    /// # Errors
    ///
    /// Fails if the base or start URL does not parse, a profile selector is
    /// not valid CSS, or the HTTP client cannot be built.
    pub fn new(config: CrawlConfig) -> Result<Self, Box<dyn Error>> {
        let start_url = Url::parse(config.start_url())?;
        Url::parse(&config.base_url)?;
        let fetcher = Fetcher::new(config.timeout)?;
        let listing = ListingParser::new(&config.profile.next_page)?;
        let extractor = Extractor::new(&config.profile.article)?;

        Ok(Self {
            config,
            start_url,
            fetcher,
            listing,
            extractor,
            classifier: Box::new(SlugMarker::default()),
        })
    }

    /// Replace the article URL heuristic.
    pub fn with_classifier(mut self, classifier: impl UrlClassifier + 'static) -> Self {
        self.classifier = Box::new(classifier);
        self
    }

    /// Run the crawl to completion and flush the kept articles into `sink`.
    ///
    /// Cancelling `cancel` stops new fetches; articles already extracted are
    /// still flushed and the summary is marked as cancelled.
    ///
    /// # Errors
    ///
    /// Returns the sink's error if the final batch write fails.
    #[instrument(level = "info", skip_all, fields(base_url = %self.config.base_url))]
    pub async fn run(
        &self,
        sink: &mut dyn ArticleSink,
        cancel: &CancellationToken,
    ) -> Result<CrawlSummary, Box<dyn Error>> {
        let started_at = Utc::now();
        let mut state = CrawlState::default();

        self.paginate(&mut state, cancel).await;
        let urls_discovered = state.frontier.len();
        info!(
            pages = state.pages_visited,
            urls = urls_discovered,
            "Pagination finished"
        );

        self.extract_all(&mut state, cancel).await;

        let articles_persisted = match flush(sink, &state.pending) {
            Ok(n) => n,
            Err(e) => {
                error!(count = state.pending.len(), error = %e, "Failed to persist articles");
                return Err(e.into());
            }
        };

        let summary = CrawlSummary {
            pages_visited: state.pages_visited,
            urls_discovered,
            articles_persisted,
            articles_incomplete: state.articles_incomplete,
            fetch_failures: state.fetch_failures,
            cancelled: state.cancelled,
            started_at,
            finished_at: Utc::now(),
        };
        info!(
            pages_visited = summary.pages_visited,
            urls_discovered = summary.urls_discovered,
            articles_persisted = summary.articles_persisted,
            articles_incomplete = summary.articles_incomplete,
            fetch_failures = summary.fetch_failures,
            cancelled = summary.cancelled,
            "Crawl finished"
        );
        Ok(summary)
    }

    /// Walk the listing pages sequentially, filling the frontier.
    async fn paginate(&self, state: &mut CrawlState, cancel: &CancellationToken) {
        let max_pages = self.config.max_pages;
        if max_pages == 0 {
            info!("Page ceiling is zero; no listing pages to fetch");
            return;
        }
        let mut next = Some(self.start_url.clone());

        while let Some(page_url) = next.take() {
            if state.page > 0 && !self.config.page_delay.is_zero() {
                tokio::select! {
                    () = sleep(self.config.page_delay) => {}
                    () = cancel.cancelled() => {}
                }
            }
            if cancel.is_cancelled() {
                info!(page = state.page, "Cancelled during pagination");
                state.cancelled = true;
                break;
            }

            state.page += 1;
            state.visited_pages.insert(page_url.to_string());
            info!(page = state.page, url = %page_url, "Fetching listing page");

            let html = match self.fetcher.fetch(page_url.as_str()).await {
                Ok(html) => html,
                Err(e) => {
                    warn!(page = state.page, url = %page_url, error = %e, "Listing fetch failed; ending pagination");
                    state.fetch_failures += 1;
                    break;
                }
            };
            state.pages_visited += 1;

            let listing = self.listing.parse(
                &html,
                &page_url,
                &self.config.base_url,
                self.classifier.as_ref(),
            );
            let found = listing.urls.len();
            let before = state.frontier.len();
            state.frontier.extend(listing.urls);
            info!(
                page = state.page,
                found,
                new = state.frontier.len() - before,
                total = state.frontier.len(),
                "Processed listing page"
            );

            next = match listing.next_page {
                None => {
                    info!(page = state.page, "No next page link; pagination complete");
                    None
                }
                Some(_) if state.page >= max_pages => {
                    info!(page = state.page, max_pages, "Reached page ceiling");
                    None
                }
                Some(href) => match Url::parse(&href) {
                    Ok(url) if state.visited_pages.contains(url.as_str()) => {
                        warn!(url = %url, "Next page already visited; ending pagination");
                        None
                    }
                    Ok(url) => Some(url),
                    Err(e) => {
                        warn!(href = %href, error = %e, "Unparsable next page link");
                        None
                    }
                },
            };
        }
    }

    /// Fetch and extract every frontier URL through the worker pool.
    async fn extract_all(&self, state: &mut CrawlState, cancel: &CancellationToken) {
        let urls: Vec<String> = state.frontier.iter().cloned().collect();
        let total = urls.len();
        let workers = self.config.workers.max(1);
        info!(total, workers, "Extracting articles");

        let outcomes: Vec<(String, Result<Extraction, FetchError>)> = stream::iter(urls)
            .take_until(cancel.cancelled())
            .map(|url| async move {
                let outcome = self.process_article(&url).await;
                (url, outcome)
            })
            .buffer_unordered(workers)
            .collect()
            .await;

        if cancel.is_cancelled() {
            info!(
                processed = outcomes.len(),
                not_started = total - outcomes.len(),
                "Cancelled during extraction"
            );
            state.cancelled = true;
        }

        for (url, outcome) in outcomes {
            match outcome {
                Ok(Extraction::Complete(article)) => {
                    debug!(%url, title = %article.title, "Kept article");
                    state.pending.push(article);
                }
                Ok(Extraction::Incomplete(reason)) => {
                    info!(%url, %reason, "Skipping incomplete article");
                    state.articles_incomplete += 1;
                }
                Err(e) => {
                    warn!(%url, error = %e, "Article fetch failed; skipping");
                    state.fetch_failures += 1;
                }
            }
        }
    }

    #[instrument(level = "debug", skip(self))]
    async fn process_article(&self, url: &str) -> Result<Extraction, FetchError> {
        let html = self.fetcher.fetch(url).await?;
        Ok(self.extractor.extract(url, &html).into_extraction())
    }
}

/// Write the batch. On a multi-threaded runtime the blocking write moves
/// this worker's other tasks elsewhere first.
fn flush(sink: &mut dyn ArticleSink, articles: &[Article]) -> crate::store::Result<usize> {
    match Handle::current().runtime_flavor() {
        RuntimeFlavor::MultiThread => task::block_in_place(|| sink.insert_many(articles)),
        _ => sink.insert_many(articles),
    }
}
