//! Flat-file article export.
//!
//! Each crawl batch replaces the export file. The batch is rendered in full,
//! written to a sibling temporary file and then renamed over the target, so a
//! failed write never leaves a half-written export behind.

use std::fmt::Write as _;
use std::fs;
use std::path::PathBuf;
use tracing::{info, instrument};

use crate::models::Article;
use crate::store::{ArticleSink, Result};

/// An [`ArticleSink`] writing plain-text records to a single file.
#[derive(Debug, Clone)]
pub struct TextExport {
    path: PathBuf,
}

impl TextExport {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ArticleSink for TextExport {
    #[instrument(level = "info", skip_all, fields(path = %self.path.display(), count = articles.len()))]
    fn insert_many(&mut self, articles: &[Article]) -> Result<usize> {
        let rendered = render(articles);

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        fs::write(&tmp, rendered)?;
        if let Err(e) = fs::rename(&tmp, &self.path) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }

        info!(written = articles.len(), "Wrote flat export");
        Ok(articles.len())
    }
}

fn render(articles: &[Article]) -> String {
    let mut out = String::new();
    for article in articles {
        let _ = writeln!(out, "URL: {}", article.url);
        let _ = writeln!(out, "Title: {}", article.title);
        let _ = writeln!(out, "Author: {}", article.author);
        let _ = writeln!(out, "Date: {}", article.date.as_deref().unwrap_or(""));
        let _ = writeln!(out, "Content: {}", article.content);
        out.push('\n');
    }
    out
}
