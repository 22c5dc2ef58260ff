//! JSON output of the crawl summary.
//!
//! The summary is what schedulers and scripts read to decide whether a run
//! degraded: it carries the page, URL, article and failure counters plus the
//! run's start and finish timestamps.

use crate::models::CrawlSummary;
use std::error::Error;
use std::path::Path;
use tokio::fs;
use tracing::{error, info, instrument};

/// Write a [`CrawlSummary`] as pretty-printed JSON to `path`.
///
/// Parent directories are created as needed.
///
/// # Arguments
///
/// * `summary` - Counters of the finished crawl
/// * `path` - Destination file
///
/// # Returns
///
/// `Ok(())` on success, or an error if directory creation or file writing fails.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn write_summary(summary: &CrawlSummary, path: &Path) -> Result<(), Box<dyn Error>> {
    let json = serde_json::to_string_pretty(summary)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        if let Err(e) = fs::create_dir_all(parent).await {
            error!(dir = %parent.display(), error = %e, "Failed to create summary dir");
            return Err(e.into());
        }
    }

    fs::write(path, json).await?;
    info!("Wrote crawl summary");
    Ok(())
}
