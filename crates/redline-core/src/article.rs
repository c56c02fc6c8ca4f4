//! # Base-Document Articles
//!
//! An [`Article`] is one addressable unit of the base document. The
//! pipeline only ever reads articles, through the [`ArticleStore`] trait;
//! importing and segmenting the base document happens elsewhere.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::identity::ArticleNumber;

/// A numbered unit of the base document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    /// Number of the article, unique within the base document.
    pub number: ArticleNumber,
    /// Heading text, without the number.
    #[serde(default)]
    pub title: String,
    /// Full text of the article at snapshot time.
    pub text: String,
}

impl Article {
    /// Create an article snapshot.
    pub fn new(number: ArticleNumber, title: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            number,
            title: title.into(),
            text: text.into(),
        }
    }
}

/// Read-only view over the articles of one base document.
pub trait ArticleStore: Send + Sync {
    /// Look up an article by number.
    fn get(&self, number: &ArticleNumber) -> Option<Article>;

    /// All articles in document order.
    fn list(&self) -> Vec<Article>;

    /// Whether an article with this number exists.
    fn contains(&self, number: &ArticleNumber) -> bool {
        self.get(number).is_some()
    }
}

/// An [`ArticleStore`] backed by a vector, preserving document order.
#[derive(Debug, Clone, Default)]
pub struct InMemoryArticleStore {
    articles: Vec<Article>,
    index: HashMap<ArticleNumber, usize>,
}

impl InMemoryArticleStore {
    /// Build a store, rejecting duplicate article numbers.
    pub fn new(articles: Vec<Article>) -> Result<Self, CoreError> {
        let mut index = HashMap::with_capacity(articles.len());
        for (pos, article) in articles.iter().enumerate() {
            if index.insert(article.number.clone(), pos).is_some() {
                return Err(CoreError::DuplicateArticle {
                    number: article.number.to_string(),
                });
            }
        }
        Ok(Self { articles, index })
    }

    /// Number of articles.
    pub fn len(&self) -> usize {
        self.articles.len()
    }

    /// Whether the store holds no articles.
    pub fn is_empty(&self) -> bool {
        self.articles.is_empty()
    }
}

impl ArticleStore for InMemoryArticleStore {
    fn get(&self, number: &ArticleNumber) -> Option<Article> {
        self.index.get(number).map(|&pos| self.articles[pos].clone())
    }

    fn list(&self) -> Vec<Article> {
        self.articles.clone()
    }

    fn contains(&self, number: &ArticleNumber) -> bool {
        self.index.contains_key(number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn article(number: &str, text: &str) -> Article {
        Article::new(ArticleNumber::new(number).unwrap(), "", text)
    }

    #[test]
    fn test_lookup_by_normalized_number() {
        let store = InMemoryArticleStore::new(vec![article("6.1", "text")]).unwrap();
        let key = ArticleNumber::new("6.1.").unwrap();
        assert_eq!(store.get(&key).unwrap().text, "text");
        assert!(store.contains(&key));
    }

    #[test]
    fn test_list_preserves_document_order() {
        let store =
            InMemoryArticleStore::new(vec![article("2", "b"), article("1", "a")]).unwrap();
        let numbers: Vec<String> = store.list().iter().map(|a| a.number.to_string()).collect();
        assert_eq!(numbers, vec!["2", "1"]);
    }

    #[test]
    fn test_duplicate_numbers_rejected() {
        let err = InMemoryArticleStore::new(vec![article("1", "a"), article("1.", "b")]);
        assert!(matches!(err, Err(CoreError::DuplicateArticle { .. })));
    }

    #[test]
    fn test_missing_article() {
        let store = InMemoryArticleStore::new(vec![article("1", "a")]).unwrap();
        assert!(store.get(&ArticleNumber::new("99").unwrap()).is_none());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_article_deserializes_without_title() {
        let a: Article = serde_json::from_str(r#"{"number":"5","text":"body"}"#).unwrap();
        assert_eq!(a.title, "");
        assert_eq!(a.number.as_str(), "5");
    }
}
