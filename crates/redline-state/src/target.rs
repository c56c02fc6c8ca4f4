//! # Edit Target State Machine
//!
//! An edit target binds one block of instruction text to one article of
//! the base document and tracks its processing state.
//!
//! ## States
//!
//! ```text
//!            rebind (operator)
//!  Review ──────────────────▶ Pending ──▶ Completed ──┐
//!                               ▲  │          ▲        │ reapply
//!                               │  ▼          └────────┘
//!                  retry ─────  Failed
//! ```
//!
//! - A target starts in `Review` exactly when its article reference did not
//!   resolve, and in `Pending` otherwise.
//! - `Review → Pending` happens only through an operator rebind and
//!   `Failed → Pending` only through an operator retry.
//! - Nothing returns to `Review`, and `Review` never reaches `Completed` or
//!   `Failed` without passing through `Pending`.
//! - Re-applying a `Completed` target leaves it `Completed`.
//!
//! The in-flight claim that keeps two workers off the same target is held
//! by the store, not encoded as a status, so a crashed or cancelled worker
//! can never leave a target stuck in a running state.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use redline_core::{ArticleNumber, EditTargetId, OwnerId, SourceFileId, Timestamp};

// ─── Target Status ───────────────────────────────────────────────────

/// Processing state of an edit target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetStatus {
    /// Bound to an article and waiting for application.
    Pending,
    /// A fragment was produced.
    Completed,
    /// The last application failed; waiting for an operator retry.
    Failed,
    /// The article reference did not resolve; waiting for an operator rebind.
    Review,
}

impl TargetStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Review => "review",
        }
    }
}

impl std::fmt::Display for TargetStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── Errors ──────────────────────────────────────────────────────────

/// Rejected operations on an edit target.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TargetError {
    /// The operation is not allowed from the target's current status.
    #[error("invalid transition for {target}: {from} -> {to}")]
    InvalidTransition {
        target: EditTargetId,
        from: TargetStatus,
        /// The attempted status or operation.
        to: String,
    },
}

/// A serialized target whose status does not match its article binding.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("inconsistent target {target}: status {status} with article {article:?}")]
pub struct InconsistentTarget {
    pub target: EditTargetId,
    pub status: TargetStatus,
    pub article: Option<ArticleNumber>,
}

// ─── Transition Record ───────────────────────────────────────────────

/// One entry of a target's transition history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetTransitionRecord {
    pub from_state: TargetStatus,
    pub to_state: TargetStatus,
    pub timestamp: Timestamp,
    pub reason: String,
}

// ─── Edit Target ─────────────────────────────────────────────────────

/// A unit of work binding instruction text to an article.
///
/// `status` and `resolved_article` are private so that the invariant
/// "`Review` exactly when no article is bound" cannot be broken from
/// outside this module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "EditTargetRecord")]
pub struct EditTarget {
    pub id: EditTargetId,
    pub owner: OwnerId,
    pub source_file: SourceFileId,
    /// Position among the targets of the source file.
    pub ordinal: usize,
    pub instruction_text: String,
    /// The reference as written in the instructions, if any.
    pub article_ref: Option<String>,
    resolved_article: Option<ArticleNumber>,
    status: TargetStatus,
    /// Reason of the most recent failed application.
    pub last_error: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    transitions: Vec<TargetTransitionRecord>,
}

/// Serialized form of an [`EditTarget`], checked before it becomes one.
#[derive(Deserialize)]
struct EditTargetRecord {
    id: EditTargetId,
    owner: OwnerId,
    source_file: SourceFileId,
    ordinal: usize,
    instruction_text: String,
    article_ref: Option<String>,
    resolved_article: Option<ArticleNumber>,
    status: TargetStatus,
    last_error: Option<String>,
    created_at: Timestamp,
    updated_at: Timestamp,
    transitions: Vec<TargetTransitionRecord>,
}

impl TryFrom<EditTargetRecord> for EditTarget {
    type Error = InconsistentTarget;

    fn try_from(r: EditTargetRecord) -> Result<Self, Self::Error> {
        if (r.status == TargetStatus::Review) != r.resolved_article.is_none() {
            return Err(InconsistentTarget {
                target: r.id,
                status: r.status,
                article: r.resolved_article,
            });
        }
        Ok(Self {
            id: r.id,
            owner: r.owner,
            source_file: r.source_file,
            ordinal: r.ordinal,
            instruction_text: r.instruction_text,
            article_ref: r.article_ref,
            resolved_article: r.resolved_article,
            status: r.status,
            last_error: r.last_error,
            created_at: r.created_at,
            updated_at: r.updated_at,
            transitions: r.transitions,
        })
    }
}

impl EditTarget {
    /// Create a target. It is `Pending` when `resolved_article` is set and
    /// `Review` otherwise.
    pub fn new(
        owner: OwnerId,
        source_file: SourceFileId,
        ordinal: usize,
        instruction_text: impl Into<String>,
        article_ref: Option<String>,
        resolved_article: Option<ArticleNumber>,
    ) -> Self {
        let now = Timestamp::now();
        let status = if resolved_article.is_some() {
            TargetStatus::Pending
        } else {
            TargetStatus::Review
        };
        Self {
            id: EditTargetId::new(),
            owner,
            source_file,
            ordinal,
            instruction_text: instruction_text.into(),
            article_ref,
            resolved_article,
            status,
            last_error: None,
            created_at: now,
            updated_at: now,
            transitions: Vec::new(),
        }
    }

    pub fn status(&self) -> TargetStatus {
        self.status
    }

    /// The article this target is bound to. `None` exactly in `Review`.
    pub fn resolved_article(&self) -> Option<&ArticleNumber> {
        self.resolved_article.as_ref()
    }

    /// Ordered log of status changes.
    pub fn transitions(&self) -> &[TargetTransitionRecord] {
        &self.transitions
    }

    /// Check that the target may be applied and return its article.
    ///
    /// `Pending` targets are always applicable; `Completed` targets only
    /// when `reapply` is set.
    pub fn applicable_article(&self, reapply: bool) -> Result<&ArticleNumber, TargetError> {
        let allowed = match self.status {
            TargetStatus::Pending => true,
            TargetStatus::Completed => reapply,
            TargetStatus::Failed | TargetStatus::Review => false,
        };
        match (&self.resolved_article, allowed) {
            (Some(article), true) => Ok(article),
            _ => Err(self.invalid(TargetStatus::Completed.as_str())),
        }
    }

    /// Record a successful application (`Pending → Completed`). On a
    /// completed target this is a re-application and the status stays.
    pub fn complete(&mut self, reason: &str) -> Result<(), TargetError> {
        match self.status {
            TargetStatus::Pending => {
                self.last_error = None;
                self.do_transition(TargetStatus::Completed, reason);
                Ok(())
            }
            TargetStatus::Completed => {
                self.updated_at = Timestamp::now();
                Ok(())
            }
            _ => Err(self.invalid(TargetStatus::Completed.as_str())),
        }
    }

    /// Record a failed application (`Pending → Failed`).
    pub fn fail(&mut self, reason: &str) -> Result<(), TargetError> {
        self.require_state(TargetStatus::Pending, TargetStatus::Failed.as_str())?;
        self.last_error = Some(reason.to_string());
        self.do_transition(TargetStatus::Failed, reason);
        Ok(())
    }

    /// Operator retry of a failed target (`Failed → Pending`).
    pub fn retry(&mut self) -> Result<(), TargetError> {
        self.require_state(TargetStatus::Failed, TargetStatus::Pending.as_str())?;
        self.do_transition(TargetStatus::Pending, "manual retry");
        Ok(())
    }

    /// Operator rebind to `article`.
    ///
    /// From `Review` this moves the target to `Pending`. `Pending` and
    /// `Failed` targets keep their status and only change article.
    /// Completed targets cannot be rebound.
    pub fn rebind(&mut self, article: ArticleNumber) -> Result<(), TargetError> {
        match self.status {
            TargetStatus::Review => {
                self.resolved_article = Some(article);
                self.do_transition(TargetStatus::Pending, "manual rebind");
                Ok(())
            }
            TargetStatus::Pending | TargetStatus::Failed => {
                self.resolved_article = Some(article);
                self.updated_at = Timestamp::now();
                Ok(())
            }
            TargetStatus::Completed => Err(self.invalid("rebind")),
        }
    }

    fn require_state(&self, expected: TargetStatus, to: &str) -> Result<(), TargetError> {
        if self.status != expected {
            return Err(self.invalid(to));
        }
        Ok(())
    }

    fn invalid(&self, to: &str) -> TargetError {
        TargetError::InvalidTransition {
            target: self.id,
            from: self.status,
            to: to.to_string(),
        }
    }

    fn do_transition(&mut self, to: TargetStatus, reason: &str) {
        let now = Timestamp::now();
        self.transitions.push(TargetTransitionRecord {
            from_state: self.status,
            to_state: to,
            timestamp: now,
            reason: reason.to_string(),
        });
        self.status = to;
        self.updated_at = now;
    }
}

// ─── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn article(n: &str) -> ArticleNumber {
        ArticleNumber::new(n).unwrap()
    }

    fn pending() -> EditTarget {
        EditTarget::new(
            OwnerId::new(),
            SourceFileId::new(),
            0,
            "replace X with Y",
            Some("Статья 1".to_string()),
            Some(article("1")),
        )
    }

    fn review() -> EditTarget {
        EditTarget::new(
            OwnerId::new(),
            SourceFileId::new(),
            1,
            "delete Z",
            Some("Статья 99".to_string()),
            None,
        )
    }

    // ── Construction ─────────────────────────────────────────────────

    #[test]
    fn test_resolved_target_starts_pending() {
        let t = pending();
        assert_eq!(t.status(), TargetStatus::Pending);
        assert_eq!(t.resolved_article(), Some(&article("1")));
        assert!(t.transitions().is_empty());
    }

    #[test]
    fn test_unresolved_target_starts_in_review() {
        let t = review();
        assert_eq!(t.status(), TargetStatus::Review);
        assert!(t.resolved_article().is_none());
    }

    // ── Happy paths ──────────────────────────────────────────────────

    #[test]
    fn test_pending_to_completed() {
        let mut t = pending();
        t.complete("applied").unwrap();
        assert_eq!(t.status(), TargetStatus::Completed);
        assert_eq!(t.transitions().len(), 1);
        assert_eq!(t.transitions()[0].from_state, TargetStatus::Pending);
    }

    #[test]
    fn test_fail_then_retry_then_complete() {
        let mut t = pending();
        t.fail("transform timed out").unwrap();
        assert_eq!(t.status(), TargetStatus::Failed);
        assert_eq!(t.last_error.as_deref(), Some("transform timed out"));
        t.retry().unwrap();
        assert_eq!(t.status(), TargetStatus::Pending);
        t.complete("applied").unwrap();
        assert_eq!(t.status(), TargetStatus::Completed);
        assert!(t.last_error.is_none());
        assert_eq!(t.transitions().len(), 3);
    }

    #[test]
    fn test_rebind_from_review() {
        let mut t = review();
        t.rebind(article("2")).unwrap();
        assert_eq!(t.status(), TargetStatus::Pending);
        assert_eq!(t.resolved_article(), Some(&article("2")));
    }

    #[test]
    fn test_rebind_keeps_pending_and_failed_status() {
        let mut t = pending();
        t.rebind(article("3")).unwrap();
        assert_eq!(t.status(), TargetStatus::Pending);
        t.fail("boom").unwrap();
        t.rebind(article("4")).unwrap();
        assert_eq!(t.status(), TargetStatus::Failed);
        assert_eq!(t.resolved_article(), Some(&article("4")));
    }

    #[test]
    fn test_reapply_keeps_completed() {
        let mut t = pending();
        t.complete("applied").unwrap();
        assert!(t.applicable_article(true).is_ok());
        t.complete("reapplied").unwrap();
        assert_eq!(t.status(), TargetStatus::Completed);
        assert_eq!(t.transitions().len(), 1);
    }

    // ── Rejections ───────────────────────────────────────────────────

    #[test]
    fn test_review_is_not_applicable() {
        let t = review();
        let err = t.applicable_article(true).unwrap_err();
        assert!(matches!(
            err,
            TargetError::InvalidTransition {
                from: TargetStatus::Review,
                ..
            }
        ));
    }

    #[test]
    fn test_completed_requires_reapply_flag() {
        let mut t = pending();
        t.complete("applied").unwrap();
        assert!(t.applicable_article(false).is_err());
    }

    #[test]
    fn test_review_cannot_complete_or_fail() {
        let mut t = review();
        assert!(t.complete("x").is_err());
        assert!(t.fail("x").is_err());
        assert_eq!(t.status(), TargetStatus::Review);
    }

    #[test]
    fn test_completed_cannot_fail_or_rebind() {
        let mut t = pending();
        t.complete("applied").unwrap();
        assert!(t.fail("x").is_err());
        assert!(t.rebind(article("2")).is_err());
        assert_eq!(t.resolved_article(), Some(&article("1")));
    }

    #[test]
    fn test_retry_only_from_failed() {
        assert!(pending().retry().is_err());
        assert!(review().retry().is_err());
    }

    #[test]
    fn test_nothing_returns_to_review() {
        let mut t = review();
        t.rebind(article("1")).unwrap();
        t.fail("x").unwrap();
        t.retry().unwrap();
        t.complete("ok").unwrap();
        assert!(t
            .transitions()
            .iter()
            .all(|r| r.to_state != TargetStatus::Review));
    }

    #[test]
    fn test_error_message() {
        let t = review();
        let msg = t.applicable_article(false).unwrap_err().to_string();
        assert!(msg.contains("review -> completed"), "{msg}");
    }

    #[test]
    fn test_serde_status_is_snake_case() {
        let json = serde_json::to_value(pending()).unwrap();
        assert_eq!(json["status"], "pending");
        assert_eq!(json["resolved_article"], "1");
    }

    #[test]
    fn test_deserialize_keeps_history() {
        let mut t = review();
        t.rebind(article("2")).unwrap();
        let json = serde_json::to_string(&t).unwrap();
        let back: EditTarget = serde_json::from_str(&json).unwrap();
        assert_eq!(back, t);
    }

    #[test]
    fn test_deserialize_rejects_inconsistent_binding() {
        let mut bound_review = serde_json::to_value(pending()).unwrap();
        bound_review["status"] = "review".into();
        let err = serde_json::from_value::<EditTarget>(bound_review).unwrap_err();
        assert!(err.to_string().contains("inconsistent target"), "{err}");

        let mut unbound_pending = serde_json::to_value(review()).unwrap();
        unbound_pending["status"] = "completed".into();
        assert!(serde_json::from_value::<EditTarget>(unbound_pending).is_err());
    }
}
