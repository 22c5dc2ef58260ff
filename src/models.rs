//! Data models for crawled articles, stored records and crawl results.
//!
//! This module defines the core data structures used throughout the pipeline:
//! - [`RawArticle`]: Fields scraped from one article page, any of which may be missing
//! - [`Extraction`]: The tagged outcome of checking a [`RawArticle`] for completeness
//! - [`Article`]: A complete article ready to be written to a sink
//! - [`PersistedArticle`]: A row read back from the article store
//! - [`MentionCount`]: One row of the per-date mention query
//! - [`CrawlSummary`]: Counters reported at the end of a crawl run

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Fields scraped from a single article page.
///
/// Every field except `body` is optional because the extractor never fails on a
/// missing selector; it records the absence instead. Only title and author decide
/// whether the article is kept (see [`RawArticle::into_extraction`]).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawArticle {
    /// The URL the page was fetched from.
    pub url: String,
    /// The headline text.
    pub title: Option<String>,
    /// The first credited author.
    pub author: Option<String>,
    /// The publication date exactly as printed on the page.
    pub published_at: Option<String>,
    /// Every paragraph of the page joined by single spaces.
    pub body: String,
}

impl RawArticle {
    /// Apply the completeness rule: an article needs a non-empty title and author.
    ///
    /// Date and body absence never block an article.
    pub fn into_extraction(self) -> Extraction {
        let title = self.title.filter(|t| !t.trim().is_empty());
        let author = self.author.filter(|a| !a.trim().is_empty());

        match (title, author) {
            (Some(title), Some(author)) => Extraction::Complete(Article {
                url: self.url,
                title,
                author,
                date: self.published_at.filter(|d| !d.trim().is_empty()),
                content: self.body,
            }),
            (None, Some(_)) => Extraction::Incomplete(MissingField::Title),
            (Some(_), None) => Extraction::Incomplete(MissingField::Author),
            (None, None) => Extraction::Incomplete(MissingField::TitleAndAuthor),
        }
    }
}

/// Which required field was missing from an extracted article.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingField {
    Title,
    Author,
    TitleAndAuthor,
}

impl fmt::Display for MissingField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MissingField::Title => write!(f, "missing title"),
            MissingField::Author => write!(f, "missing author"),
            MissingField::TitleAndAuthor => write!(f, "missing title and author"),
        }
    }
}

/// Outcome of extracting one article page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction {
    /// Title and author were both present; the article is kept.
    Complete(Article),
    /// A required field was absent; the article is dropped.
    Incomplete(MissingField),
}

/// A complete article, ready to be handed to an [`crate::store::ArticleSink`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Article {
    /// The source URL (used for logging and flat export, not stored in SQLite).
    pub url: String,
    pub title: String,
    pub author: String,
    /// Free-form publication date as scraped; `None` is stored as NULL.
    pub date: Option<String>,
    pub content: String,
}

/// An article row as read back from the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedArticle {
    /// Surrogate key assigned on insert.
    pub id: i64,
    pub title: Option<String>,
    pub author: Option<String>,
    pub date: Option<String>,
    pub content: Option<String>,
}

/// Number of matching articles for one stored date value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MentionCount {
    /// The date text as stored; articles without a date group under `None`.
    pub date: Option<String>,
    pub count: i64,
}

/// Counters describing a finished crawl run.
///
/// A crawl always ends with a summary rather than an error for item-level
/// failures; only a failed flush to the sink aborts the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CrawlSummary {
    /// Listing pages fetched successfully.
    pub pages_visited: usize,
    /// Distinct article URLs in the frontier once pagination ended.
    pub urls_discovered: usize,
    /// Complete articles written to the sink.
    pub articles_persisted: usize,
    /// Articles dropped for a missing title or author.
    pub articles_incomplete: usize,
    /// Listing or article fetches that failed.
    pub fetch_failures: usize,
    /// Whether the run was cut short by a cancellation signal.
    pub cancelled: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}
