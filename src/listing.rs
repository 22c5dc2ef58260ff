//! Listing page parsing: candidate article links and the "next page" control.
//!
//! A listing page is an index that links to many articles. Every anchor on the
//! page is resolved to an absolute URL and kept only if a [`UrlClassifier`]
//! accepts it as an article under the base URL.

use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use std::collections::HashSet;
use tracing::{debug, instrument};
use url::Url;

/// Default CSS marker of the pagination "next" anchor.
pub const DEFAULT_NEXT_SELECTOR: &str = "a.next.page-numbers";

static ANCHOR_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("a[href]").expect("static anchor selector is valid"));

/// Decides whether an absolute URL is an article under the base URL.
///
/// The crawler only depends on this capability, so the heuristic can be
/// replaced without touching pagination or extraction.
pub trait UrlClassifier: Send + Sync {
    fn is_article(&self, base_url: &str, candidate: &str) -> bool;
}

/// Accepts URLs that start with the base URL and whose remaining suffix
/// contains a marker string. With the default `-` marker this separates
/// article slugs (`/news/brexit-deal`) from category pages (`/news/category/`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlugMarker {
    marker: String,
}

impl SlugMarker {
    pub fn new(marker: impl Into<String>) -> Self {
        Self {
            marker: marker.into(),
        }
    }
}

impl Default for SlugMarker {
    fn default() -> Self {
        Self::new("-")
    }
}

impl UrlClassifier for SlugMarker {
    fn is_article(&self, base_url: &str, candidate: &str) -> bool {
        candidate
            .strip_prefix(base_url)
            .is_some_and(|suffix| suffix.contains(self.marker.as_str()))
    }
}

impl<F> UrlClassifier for F
where
    F: Fn(&str, &str) -> bool + Send + Sync,
{
    fn is_article(&self, base_url: &str, candidate: &str) -> bool {
        self(base_url, candidate)
    }
}

/// What one listing page yielded.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Listing {
    /// Absolute article URLs found on the page, fragments removed.
    pub urls: HashSet<String>,
    /// Absolute URL of the next listing page, if the page links to one.
    pub next_page: Option<String>,
}

/// Parses listing pages with a fixed "next page" selector.
#[derive(Debug, Clone)]
pub struct ListingParser {
    next_selector: Selector,
}

impl ListingParser {
    /// Compile the "next page" selector.
    ///
    /// # Errors
    ///
    /// Returns a message describing the selector if it is not valid CSS.
    pub fn new(next_selector: &str) -> Result<Self, String> {
        let next_selector = Selector::parse(next_selector)
            .map_err(|e| format!("invalid next-page selector {next_selector:?}: {e}"))?;
        Ok(Self { next_selector })
    }

    /// Extract article URLs and the next-page link from a listing page.
    ///
    /// # Arguments
    ///
    /// * `html` - Raw listing page HTML
    /// * `page_url` - URL the page was fetched from; relative hrefs resolve against it
    /// * `base_url` - Prefix every kept article URL must start with
    /// * `classifier` - Predicate separating article links from everything else
    #[instrument(level = "debug", skip(self, html, classifier))]
    pub fn parse(
        &self,
        html: &str,
        page_url: &Url,
        base_url: &str,
        classifier: &dyn UrlClassifier,
    ) -> Listing {
        let document = Html::parse_document(html);

        let urls: HashSet<String> = document
            .select(&ANCHOR_SELECTOR)
            .filter_map(|a| a.value().attr("href"))
            .filter_map(|href| resolve(page_url, href))
            .filter(|absolute| classifier.is_article(base_url, absolute))
            .collect();

        let next_page = document
            .select(&self.next_selector)
            .find_map(|a| a.value().attr("href"))
            .and_then(|href| resolve(page_url, href));

        debug!(
            count = urls.len(),
            next_page = next_page.as_deref().unwrap_or("-"),
            "Parsed listing page"
        );
        Listing { urls, next_page }
    }
}

impl Default for ListingParser {
    fn default() -> Self {
        Self {
            next_selector: Selector::parse(DEFAULT_NEXT_SELECTOR)
                .expect("default next-page selector is valid"),
        }
    }
}

fn resolve(page_url: &Url, href: &str) -> Option<String> {
    let mut absolute = page_url.join(href.trim()).ok()?;
    if !matches!(absolute.scheme(), "http" | "https") {
        return None;
    }
    absolute.set_fragment(None);
    Some(absolute.to_string())
}
