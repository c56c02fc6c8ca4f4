//! # Domain Identity Newtypes
//!
//! Newtype wrappers for every identifier that crosses a crate boundary.
//! You cannot pass an `EditTargetId` where a `FragmentId` is expected, and
//! article numbers are normalized once at construction instead of being
//! compared as raw strings all over the pipeline.
//!
//! ## Owner Context
//!
//! Records are scoped to an owner. The owner is supplied by the caller on
//! every operation through [`OwnerContext`]; there is no process-wide
//! default identity.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CoreError;

macro_rules! uuid_identifier {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Generate a new random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Access the inner UUID.
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, concat!($prefix, ":{}"), self.0)
            }
        }
    };
}

uuid_identifier!(
    /// Identifier of an uploaded edit-instructions file.
    SourceFileId,
    "source"
);

uuid_identifier!(
    /// Identifier of a single unit of work binding instruction text to an article.
    EditTargetId,
    "target"
);

uuid_identifier!(
    /// Identifier of an immutable before/after patch record.
    FragmentId,
    "fragment"
);

uuid_identifier!(
    /// Identifier of the party that owns pipeline records.
    OwnerId,
    "owner"
);

// ─── Article Number ──────────────────────────────────────────────────

/// Number of an article within a base document (`"1"`, `"6.1"`, `"11.3"`).
///
/// Surrounding whitespace and a trailing period are stripped at
/// construction, so `"6.1."` and `" 6.1"` name the same article.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ArticleNumber(String);

impl ArticleNumber {
    /// Maximum accepted length of an article number.
    pub const MAX_LEN: usize = 64;

    /// Create a normalized article number.
    pub fn new(raw: impl AsRef<str>) -> Result<Self, CoreError> {
        let trimmed = raw.as_ref().trim().trim_end_matches('.').trim();
        if trimmed.is_empty() {
            return Err(CoreError::InvalidArticleNumber {
                value: raw.as_ref().to_string(),
                reason: "must not be empty".to_string(),
            });
        }
        if trimmed.len() > Self::MAX_LEN {
            return Err(CoreError::InvalidArticleNumber {
                value: raw.as_ref().to_string(),
                reason: format!("must not exceed {} characters", Self::MAX_LEN),
            });
        }
        if trimmed.chars().any(char::is_whitespace) {
            return Err(CoreError::InvalidArticleNumber {
                value: raw.as_ref().to_string(),
                reason: "must not contain whitespace".to_string(),
            });
        }
        Ok(Self(trimmed.to_string()))
    }

    /// The normalized number as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ArticleNumber {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ArticleNumber> for String {
    fn from(value: ArticleNumber) -> Self {
        value.0
    }
}

impl std::fmt::Display for ArticleNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// ─── Owner Context ───────────────────────────────────────────────────

/// Caller-supplied identity threaded through every pipeline operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OwnerContext {
    /// The owner on whose behalf the operation runs.
    pub owner: OwnerId,
}

impl OwnerContext {
    /// Create a context for an existing owner.
    pub fn new(owner: OwnerId) -> Self {
        Self { owner }
    }

    /// Create a context with a freshly generated owner identity.
    pub fn generate() -> Self {
        Self {
            owner: OwnerId::new(),
        }
    }
}
