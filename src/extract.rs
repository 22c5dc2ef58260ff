//! Fixed-selector article extraction.
//!
//! Each field comes from one CSS selector. A selector that matches nothing
//! yields an absent field; it never fails the extraction.

use itertools::Itertools;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::models::RawArticle;

/// CSS selectors locating each article field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArticleSelectors {
    /// Headline element.
    pub title: String,
    /// The first match is taken as the author.
    pub author: String,
    /// Publication date element.
    pub date: String,
    /// Every match is concatenated into the body, in document order.
    pub body: String,
}

impl Default for ArticleSelectors {
    fn default() -> Self {
        Self {
            title: "h1.hero__title".to_string(),
            author: "div.authors.article-meta__authors a".to_string(),
            date: "span.date-time__date".to_string(),
            body: "p".to_string(),
        }
    }
}

/// Compiled [`ArticleSelectors`].
#[derive(Debug, Clone)]
pub struct Extractor {
    title: Selector,
    author: Selector,
    date: Selector,
    body: Selector,
}

impl Extractor {
    /// Compile the selectors.
    ///
    /// # Errors
    ///
    /// Returns a message naming the field whose selector is not valid CSS.
    pub fn new(selectors: &ArticleSelectors) -> Result<Self, String> {
        let compile = |field: &str, css: &str| {
            Selector::parse(css).map_err(|e| format!("invalid {field} selector {css:?}: {e}"))
        };
        Ok(Self {
            title: compile("title", &selectors.title)?,
            author: compile("author", &selectors.author)?,
            date: compile("date", &selectors.date)?,
            body: compile("body", &selectors.body)?,
        })
    }

    /// Pull title, author, date and body out of an article page.
    #[instrument(level = "debug", skip(self, html))]
    pub fn extract(&self, url: &str, html: &str) -> RawArticle {
        let document = Html::parse_document(html);

        let title = first_text(&document, &self.title);
        let author = first_text(&document, &self.author);
        let published_at = first_text(&document, &self.date);
        let body = document
            .select(&self.body)
            .map(|p| p.text().collect::<String>())
            .join(" ");

        debug!(
            title = title.as_deref().unwrap_or("-"),
            author = author.as_deref().unwrap_or("-"),
            date = published_at.as_deref().unwrap_or("-"),
            body_bytes = body.len(),
            "Extracted article fields"
        );

        RawArticle {
            url: url.to_string(),
            title,
            author,
            published_at,
            body,
        }
    }
}

impl Default for Extractor {
    fn default() -> Self {
        Self::new(&ArticleSelectors::default()).expect("default article selectors are valid")
    }
}

/// Trimmed text of the first element matching `selector`, if it has any.
fn first_text(document: &Html, selector: &Selector) -> Option<String> {
    document
        .select(selector)
        .next()
        .map(stripped_text)
        .filter(|text| !text.is_empty())
}

fn stripped_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .concat()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Extraction, MissingField};

    const URL: &str = "https://example.test/news/brexit-deal";

    const FULL_PAGE: &str = r#"<html><body>
        <h1 class="hero__title">
            Brexit deal reached
        </h1>
        <div class="authors article-meta__authors">
            <a href="/author/jane">Jane Doe</a>
            <a href="/author/john">John Roe</a>
        </div>
        <span class="date-time__date">March 3, 2024 6:01 am</span>
        <p>First paragraph.</p>
        <p>Second <b>bold</b> paragraph.</p>
    </body></html>"#;

    #[test]
    fn test_extracts_all_fields() {
        let raw = Extractor::default().extract(URL, FULL_PAGE);

        assert_eq!(raw.url, URL);
        assert_eq!(raw.title.as_deref(), Some("Brexit deal reached"));
        assert_eq!(raw.author.as_deref(), Some("Jane Doe"));
        assert_eq!(raw.published_at.as_deref(), Some("March 3, 2024 6:01 am"));
        assert_eq!(raw.body, "First paragraph. Second bold paragraph.");
    }

    #[test]
    fn test_missing_author_container_yields_incomplete() {
        let html = r#"<h1 class="hero__title">Only a title</h1><p>Body</p>"#;
        let raw = Extractor::default().extract(URL, html);

        assert_eq!(raw.author, None);
        assert_eq!(
            raw.into_extraction(),
            Extraction::Incomplete(MissingField::Author)
        );
    }

    #[test]
    fn test_missing_date_and_body_still_complete() {
        let html = r#"<h1 class="hero__title">T</h1>
            <div class="authors article-meta__authors"><a>A</a></div>"#;
        let raw = Extractor::default().extract(URL, html);

        assert_eq!(raw.published_at, None);
        assert_eq!(raw.body, "");
        assert!(matches!(raw.into_extraction(), Extraction::Complete(_)));
    }

    #[test]
    fn test_author_outside_container_is_ignored() {
        let html = r#"<h1 class="hero__title">T</h1><a class="author">Stray</a>"#;
        let raw = Extractor::default().extract(URL, html);
        assert_eq!(raw.author, None);
    }

    #[test]
    fn test_custom_selectors() {
        let selectors = ArticleSelectors {
            title: "h2.headline".to_string(),
            author: ".byline".to_string(),
            date: "time".to_string(),
            body: "article p".to_string(),
        };
        let html = r#"<h2 class="headline">Custom</h2><span class="byline">Ann</span>
            <time>2024-01-02</time><p>outside</p><article><p>inside</p></article>"#;
        let raw = Extractor::new(&selectors).unwrap().extract(URL, html);

        assert_eq!(raw.title.as_deref(), Some("Custom"));
        assert_eq!(raw.author.as_deref(), Some("Ann"));
        assert_eq!(raw.published_at.as_deref(), Some("2024-01-02"));
        assert_eq!(raw.body, "inside");
    }

    #[test]
    fn test_invalid_selector_names_field() {
        let selectors = ArticleSelectors {
            date: "span[".to_string(),
            ..ArticleSelectors::default()
        };
        let err = Extractor::new(&selectors).unwrap_err();
        assert!(err.contains("date"));
    }
}
