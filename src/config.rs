//! Crawl configuration and YAML site profiles.
//!
//! A [`SiteProfile`] holds the DOM conventions of the target site (the CSS
//! selectors for pagination and article fields). It defaults to the layout of
//! the archive this tool was written for and can be overridden from a YAML
//! file:
//!
//! ```yaml
//! next_page: "a.next.page-numbers"
//! article:
//!   title: "h1.hero__title"
//!   author: "div.authors.article-meta__authors a"
//!   date: "span.date-time__date"
//!   body: "p"
//! ```
//!
//! Omitted keys keep their defaults.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, instrument};

use crate::extract::ArticleSelectors;
use crate::fetcher::DEFAULT_TIMEOUT;
use crate::listing::DEFAULT_NEXT_SELECTOR;

pub const DEFAULT_MAX_PAGES: usize = 50;
pub const DEFAULT_PAGE_DELAY: Duration = Duration::from_secs(2);
pub const DEFAULT_WORKERS: usize = 4;

/// Errors raised while loading a site profile.
#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("failed to read profile {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse profile {path}: {source}")]
    Yaml {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Selectors describing one site's listing and article pages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteProfile {
    /// Anchor marking the pagination "next" control.
    pub next_page: String,
    pub article: ArticleSelectors,
}

impl Default for SiteProfile {
    fn default() -> Self {
        Self {
            next_page: DEFAULT_NEXT_SELECTOR.to_string(),
            article: ArticleSelectors::default(),
        }
    }
}

impl SiteProfile {
    /// Load a profile from a YAML file.
    #[instrument(level = "info", skip_all, fields(path = %path.as_ref().display()))]
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ProfileError> {
        let path = path.as_ref();
        let display = path.display().to_string();
        let text = tokio::fs::read_to_string(path).await.map_err(|source| ProfileError::Io {
            path: display.clone(),
            source,
        })?;
        let profile = Self::from_yaml(&text).map_err(|source| ProfileError::Yaml {
            path: display,
            source,
        })?;
        info!(next_page = %profile.next_page, "Loaded site profile");
        Ok(profile)
    }

    pub fn from_yaml(text: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(text)
    }
}

/// Everything the crawl controller needs to know about one run.
#[derive(Debug, Clone)]
pub struct CrawlConfig {
    /// Every article URL must start with this prefix.
    pub base_url: String,
    /// First listing page; the base URL when `None`.
    pub start_url: Option<String>,
    /// Ceiling on listing pages visited.
    pub max_pages: usize,
    /// Pause before each listing fetch after the first.
    pub page_delay: Duration,
    /// Size of the article fetch pool.
    pub workers: usize,
    /// Per-request timeout.
    pub timeout: Duration,
    pub profile: SiteProfile,
}

impl CrawlConfig {
    /// A configuration with default knobs for `base_url`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            start_url: None,
            max_pages: DEFAULT_MAX_PAGES,
            page_delay: DEFAULT_PAGE_DELAY,
            workers: DEFAULT_WORKERS,
            timeout: DEFAULT_TIMEOUT,
            profile: SiteProfile::default(),
        }
    }

    /// The first listing page to fetch.
    pub fn start_url(&self) -> &str {
        self.start_url.as_deref().unwrap_or(&self.base_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CrawlConfig::new("https://example.test/news");
        assert_eq!(config.start_url(), "https://example.test/news");
        assert_eq!(config.max_pages, 50);
        assert_eq!(config.page_delay, Duration::from_secs(2));
        assert_eq!(config.timeout, Duration::from_secs(10));
        assert_eq!(config.profile, SiteProfile::default());
    }

    #[test]
    fn test_partial_profile_keeps_defaults() {
        let profile = SiteProfile::from_yaml(
            r#"
article:
  title: "h2.headline"
"#,
        )
        .unwrap();

        assert_eq!(profile.next_page, DEFAULT_NEXT_SELECTOR);
        assert_eq!(profile.article.title, "h2.headline");
        assert_eq!(profile.article.body, "p");
    }

    #[tokio::test]
    async fn test_load_profile_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("site.yaml");
        tokio::fs::write(&path, "next_page: \"a.older\"\n").await.unwrap();

        let profile = SiteProfile::load(&path).await.unwrap();
        assert_eq!(profile.next_page, "a.older");
    }

    #[tokio::test]
    async fn test_load_missing_profile_reports_path() {
        let err = SiteProfile::load("/definitely/not/here.yaml").await.unwrap_err();
        assert!(err.to_string().contains("/definitely/not/here.yaml"));
    }

    #[tokio::test]
    async fn test_load_malformed_profile_is_a_yaml_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.yaml");
        tokio::fs::write(&path, "next_page: [unclosed\n").await.unwrap();

        let err = SiteProfile::load(&path).await.unwrap_err();
        assert!(matches!(err, ProfileError::Yaml { .. }));
    }
}
