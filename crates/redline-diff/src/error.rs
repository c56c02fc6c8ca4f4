//! # Patch Errors
//!
//! Computing a diff never fails. Applying a unified patch to a text can,
//! when the patch is malformed or was produced from a different text.

use thiserror::Error;

/// Errors returned by [`crate::apply_unified`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PatchError {
    /// A hunk header could not be parsed.
    #[error("malformed hunk header at patch line {line}: {header:?}")]
    MalformedHeader {
        /// 1-based line number in the patch.
        line: usize,
        /// The offending header.
        header: String,
    },

    /// A line inside a hunk has an unknown prefix, or a stray line sits
    /// between hunks.
    #[error("unexpected patch line {line}: {content:?}")]
    UnexpectedLine {
        /// 1-based line number in the patch.
        line: usize,
        /// The offending line.
        content: String,
    },

    /// A context or deleted line does not match the target text.
    #[error("patch does not apply: line {line} of the original text differs")]
    ContextMismatch {
        /// 1-based line number in the original text.
        line: usize,
    },

    /// A hunk starts before the end of the previous hunk or past the end
    /// of the text.
    #[error("hunk at patch line {line} is out of order or out of range")]
    HunkOutOfRange {
        /// 1-based line number of the hunk header in the patch.
        line: usize,
    },

    /// The patch ended before a hunk supplied all the lines its header
    /// announced.
    #[error("hunk at patch line {line} is truncated")]
    TruncatedHunk {
        /// 1-based line number of the hunk header in the patch.
        line: usize,
    },
}
