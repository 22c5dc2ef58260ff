//! SQLite article store and the [`ArticleSink`] seam the crawler writes through.
//!
//! The store is append-only: rows get an auto-increment surrogate key and no
//! natural key is enforced. Deduplication happens upstream, by URL, inside a
//! single crawl run.

use rusqlite::{params, params_from_iter, Connection};
use std::path::Path;
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::models::{Article, MentionCount, PersistedArticle};

/// Errors raised by the article store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("export error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Destination for the single batch of articles produced by a crawl.
///
/// `insert_many` is all-or-nothing: on error nothing from the batch may be
/// visible to readers.
pub trait ArticleSink {
    /// Persist `articles` and return how many were written.
    fn insert_many(&mut self, articles: &[Article]) -> Result<usize>;
}

/// Read-side filter for [`Store::query`].
///
/// Every term must occur (case-insensitive ASCII) in the title or the content.
/// Date bounds are inclusive and compared lexically against the stored text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArticleQuery {
    pub terms: Vec<String>,
    pub date_from: Option<String>,
    pub date_to: Option<String>,
    pub limit: Option<usize>,
}

/// SQLite-backed article store.
pub struct Store {
    conn: Connection,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("path", &self.conn.path())
            .finish()
    }
}

impl Store {
    /// Open (or create) the database file at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        Ok(Self { conn })
    }

    /// Open a private in-memory database.
    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self { conn })
    }

    /// Create the `articles` table if it does not exist yet.
    #[instrument(level = "debug", skip(self))]
    pub fn ensure_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS articles (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT,
                author TEXT,
                date TEXT,
                content TEXT
            );
            "#,
        )?;
        Ok(())
    }

    /// Drop every user table in the database.
    ///
    /// Destructive. Only ever invoked by an explicit operator command; the
    /// crawler never calls it.
    #[instrument(level = "info", skip(self))]
    pub fn clear_all(&mut self) -> Result<usize> {
        let tx = self.conn.transaction()?;
        let tables: Vec<String> = {
            let mut stmt = tx.prepare(
                "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%'",
            )?;
            stmt.query_map([], |row| row.get::<_, String>(0))?
                .collect::<std::result::Result<Vec<String>, _>>()?
        };
        for table in &tables {
            tx.execute_batch(&format!("DROP TABLE IF EXISTS \"{}\"", table.replace('"', "\"\"")))?;
        }
        // AUTOINCREMENT bookkeeping lives in sqlite_sequence and cannot be dropped.
        let has_sequence: bool = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'sqlite_sequence')",
            [],
            |row| row.get(0),
        )?;
        if has_sequence {
            tx.execute("DELETE FROM sqlite_sequence", [])?;
        }
        tx.commit()?;

        warn!(dropped = tables.len(), "Cleared all tables");
        Ok(tables.len())
    }

    /// Total number of stored articles.
    pub fn count(&self) -> Result<i64> {
        let n = self
            .conn
            .query_row("SELECT COUNT(*) FROM articles", [], |row| row.get(0))?;
        Ok(n)
    }

    /// Read articles matching `query`, ordered by id.
    #[instrument(level = "debug", skip(self))]
    pub fn query(&self, query: &ArticleQuery) -> Result<Vec<PersistedArticle>> {
        let mut sql = String::from("SELECT id, title, author, date, content FROM articles");
        let mut clauses = Vec::new();
        let mut values: Vec<String> = Vec::new();

        for term in &query.terms {
            clauses.push("(title LIKE ? ESCAPE '\\' OR content LIKE ? ESCAPE '\\')".to_string());
            let pattern = like_pattern(term);
            values.push(pattern.clone());
            values.push(pattern);
        }
        if let Some(from) = &query.date_from {
            clauses.push("date >= ?".to_string());
            values.push(from.clone());
        }
        if let Some(to) = &query.date_to {
            clauses.push("date <= ?".to_string());
            values.push(to.clone());
        }
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(" ORDER BY id");
        if let Some(limit) = query.limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(values.iter()), |row| {
                Ok(PersistedArticle {
                    id: row.get("id")?,
                    title: row.get("title")?,
                    author: row.get("author")?,
                    date: row.get("date")?,
                    content: row.get("content")?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Count articles mentioning `term` in title or content, grouped by date.
    pub fn mention_counts(&self, term: &str) -> Result<Vec<MentionCount>> {
        let pattern = like_pattern(term);
        self.grouped_counts(
            "SELECT date, COUNT(*) FROM articles
             WHERE title LIKE ?1 ESCAPE '\\' OR content LIKE ?1 ESCAPE '\\'
             GROUP BY date ORDER BY date",
            &[pattern],
        )
    }

    /// Count articles mentioning both `first` and `second`, grouped by date.
    pub fn co_mention_counts(&self, first: &str, second: &str) -> Result<Vec<MentionCount>> {
        self.grouped_counts(
            "SELECT date, COUNT(*) FROM articles
             WHERE (title LIKE ?1 ESCAPE '\\' OR content LIKE ?1 ESCAPE '\\')
               AND (title LIKE ?2 ESCAPE '\\' OR content LIKE ?2 ESCAPE '\\')
             GROUP BY date ORDER BY date",
            &[like_pattern(first), like_pattern(second)],
        )
    }

    fn grouped_counts(&self, sql: &str, patterns: &[String]) -> Result<Vec<MentionCount>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt
            .query_map(params_from_iter(patterns.iter()), |row| {
                Ok(MentionCount {
                    date: row.get(0)?,
                    count: row.get(1)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

impl ArticleSink for Store {
    #[instrument(level = "info", skip_all, fields(count = articles.len()))]
    fn insert_many(&mut self, articles: &[Article]) -> Result<usize> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO articles (title, author, date, content) VALUES (?1, ?2, ?3, ?4)",
            )?;
            for article in articles {
                stmt.execute(params![
                    article.title,
                    article.author,
                    article.date,
                    article.content
                ])?;
            }
        }
        tx.commit()?;

        info!(inserted = articles.len(), "Inserted articles");
        Ok(articles.len())
    }
}

/// Wrap `term` in `%` wildcards, escaping LIKE metacharacters so it matches literally.
fn like_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}
