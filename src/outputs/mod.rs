//! Output destinations other than the SQLite store.
//!
//! # Submodules
//!
//! - [`text`]: Flat-file article export, usable in place of the database
//! - [`json`]: Writes the crawl summary as JSON for scripts and schedulers
//!
//! # Flat Export Layout
//!
//! ```text
//! URL: https://www.politico.eu/newsletter/london-playbook/some-slug/
//! Title: ...
//! Author: ...
//! Date: ...
//! Content: ...
//!
//! URL: ...
//! ```

pub mod json;
pub mod text;
