//! # Patched Fragments
//!
//! The immutable result of applying one target: the article text before
//! and after, the instruction that produced it, and digests of both texts.
//! Re-applying a target creates a new fragment that names the one it
//! supersedes; existing fragments are never changed.

use serde::{Deserialize, Serialize};

use redline_core::{ArticleNumber, ContentDigest, EditTargetId, FragmentId, OwnerId, Timestamp};

/// How an application changed the article text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    /// The article was empty and now has text.
    Added,
    Modified,
    /// The article had text and is now empty.
    Deleted,
}

impl ChangeKind {
    pub fn classify(before: &str, after: &str) -> Self {
        match (before.is_empty(), after.is_empty()) {
            (true, false) => Self::Added,
            (false, true) => Self::Deleted,
            _ => Self::Modified,
        }
    }
}

impl std::fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Added => "added",
            Self::Modified => "modified",
            Self::Deleted => "deleted",
        })
    }
}

/// A before/after pair produced by one application of a target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchedFragment {
    pub id: FragmentId,
    pub target_id: EditTargetId,
    pub owner: OwnerId,
    pub article: ArticleNumber,
    /// Instruction text of the target at application time.
    pub instruction_text: String,
    pub before_text: String,
    pub after_text: String,
    pub change_kind: ChangeKind,
    pub before_digest: ContentDigest,
    pub after_digest: ContentDigest,
    pub applied_at: Timestamp,
    /// The fragment this one replaces, for re-applications.
    pub supersedes: Option<FragmentId>,
}

/// Everything needed to create a [`PatchedFragment`].
#[derive(Debug, Clone)]
pub struct FragmentDraft {
    pub target_id: EditTargetId,
    pub owner: OwnerId,
    pub article: ArticleNumber,
    pub instruction_text: String,
    pub before_text: String,
    pub after_text: String,
    pub supersedes: Option<FragmentId>,
}

impl PatchedFragment {
    pub fn new(draft: FragmentDraft) -> Self {
        let change_kind = ChangeKind::classify(&draft.before_text, &draft.after_text);
        Self {
            id: FragmentId::new(),
            target_id: draft.target_id,
            owner: draft.owner,
            article: draft.article,
            instruction_text: draft.instruction_text,
            before_digest: ContentDigest::of_text(&draft.before_text),
            after_digest: ContentDigest::of_text(&draft.after_text),
            before_text: draft.before_text,
            after_text: draft.after_text,
            change_kind,
            applied_at: Timestamp::now(),
            supersedes: draft.supersedes,
        }
    }

    /// Whether the article text changed since this fragment was computed.
    pub fn is_stale(&self, current_article_text: &str) -> bool {
        ContentDigest::of_text(current_article_text) != self.before_digest
    }

    /// Whether applying the instruction left the text unchanged.
    pub fn is_noop(&self) -> bool {
        self.before_digest == self.after_digest
    }
}
