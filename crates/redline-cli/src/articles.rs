//! # Article Files
//!
//! Reads the base document as a list of `{number, title, text}` records.
//! Files ending in `.json` are parsed as JSON, anything else as YAML.

use std::path::Path;

use anyhow::{Context, Result};

use redline_core::{Article, InMemoryArticleStore};

/// Parse an article list. `json` selects the JSON parser.
pub fn parse_articles(content: &str, json: bool) -> Result<InMemoryArticleStore> {
    let articles: Vec<Article> = if json {
        serde_json::from_str(content).context("parsing article list as JSON")?
    } else {
        serde_yaml::from_str(content).context("parsing article list as YAML")?
    };
    InMemoryArticleStore::new(articles).context("building article store")
}

/// Load an article file.
pub fn load_articles(path: &Path) -> Result<InMemoryArticleStore> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading articles from {}", path.display()))?;
    let json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    let store = parse_articles(&content, json)
        .with_context(|| format!("loading articles from {}", path.display()))?;
    tracing::info!(path = %path.display(), articles = store.len(), "articles loaded");
    Ok(store)
}
