//! # Error Types
//!
//! Errors raised while constructing core domain values. Pipeline and diff
//! errors live in their own crates and wrap these where needed.

use thiserror::Error;

/// Errors produced by `redline-core` constructors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// An article number failed validation.
    #[error("invalid article number {value:?}: {reason}")]
    InvalidArticleNumber {
        /// The rejected input.
        value: String,
        /// Why it was rejected.
        reason: String,
    },

    /// Two articles in one base document share a number.
    #[error("duplicate article number {number} in base document")]
    DuplicateArticle {
        /// The repeated number.
        number: String,
    },
}
