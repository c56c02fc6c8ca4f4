//! # redline-core — Foundational Types for Redline
//!
//! The leaf of the workspace dependency graph. Defines the identifiers,
//! owner context, timestamps, digests, and base-document article types that
//! every other `redline-*` crate builds on.
//!
//! ## Key Design Principles
//!
//! 1. **Newtype identifiers.** `SourceFileId`, `EditTargetId`, `FragmentId`,
//!    and `OwnerId` wrap UUIDs; `ArticleNumber` is normalized at
//!    construction. No bare strings or UUIDs cross crate boundaries.
//!
//! 2. **Explicit owner.** Every pipeline operation receives an
//!    [`OwnerContext`] from its caller. Nothing reads an ambient identity.
//!
//! 3. **Read-only articles.** The pipeline consumes the base document
//!    through the [`ArticleStore`] trait and never mutates it.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `redline-*` crates.
//! - No `unsafe` code.
//! - No `.unwrap()` outside tests; the static regexes panic only on a
//!   malformed literal pattern.

pub mod article;
pub mod digest;
pub mod error;
pub mod identity;
pub mod reference;
pub mod temporal;

pub use article::{Article, ArticleStore, InMemoryArticleStore};
pub use digest::ContentDigest;
pub use error::CoreError;
pub use identity::{
    ArticleNumber, EditTargetId, FragmentId, OwnerContext, OwnerId, SourceFileId,
};
pub use reference::{heading_references, parse_article_reference, HeadingReference};
pub use temporal::Timestamp;
