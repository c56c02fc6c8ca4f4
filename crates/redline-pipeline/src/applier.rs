//! # Patch Applier
//!
//! Applies one edit target: reads the bound article's current text, asks
//! the [`TextTransform`] for the new text, and records the (before, after)
//! pair as a [`PatchedFragment`].
//!
//! One call makes exactly one transform attempt, bounded by the configured
//! timeout. A timeout counts as a transform failure. Retries are a policy
//! of the coordinator, which drives [`PatchApplier::prepare`],
//! [`PatchApplier::attempt`] and [`PatchApplier::finish`] separately.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use redline_core::{ArticleNumber, ArticleStore, EditTargetId, FragmentId, OwnerId};
use redline_state::{EditTarget, FragmentDraft, PatchedFragment, TargetStatus};

use crate::capability::TextTransform;
use crate::error::{ApplyError, TransformError};

/// Which targets an application run touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplyMode {
    /// Only `Pending` targets.
    #[default]
    Pending,
    /// `Pending` and `Completed` targets. Completed targets get a new
    /// fragment and stay completed.
    Reapply,
}

impl ApplyMode {
    fn reapply(self) -> bool {
        self == Self::Reapply
    }

    /// Whether a target in `status` is applied in this mode.
    pub fn selects(self, status: TargetStatus) -> bool {
        match status {
            TargetStatus::Pending => true,
            TargetStatus::Completed => self.reapply(),
            TargetStatus::Failed | TargetStatus::Review => false,
        }
    }
}

/// Inputs of one application, captured before the transform runs.
#[derive(Debug, Clone)]
pub struct PreparedApplication {
    pub target_id: EditTargetId,
    pub owner: OwnerId,
    pub article: ArticleNumber,
    pub instruction_text: String,
    pub before_text: String,
    pub supersedes: Option<FragmentId>,
}

pub struct PatchApplier {
    transform: Arc<dyn TextTransform>,
    timeout: Duration,
}

impl PatchApplier {
    pub fn new(transform: Arc<dyn TextTransform>, timeout: Duration) -> Self {
        Self { transform, timeout }
    }

    /// Check the precondition and read the article text.
    ///
    /// `previous` is the target's current fragment, which a successful
    /// re-application supersedes.
    pub fn prepare(
        target: &EditTarget,
        articles: &dyn ArticleStore,
        mode: ApplyMode,
        previous: Option<FragmentId>,
    ) -> Result<PreparedApplication, ApplyError> {
        let number = target.applicable_article(mode.reapply())?;
        let article = articles.get(number).ok_or_else(|| ApplyError::ArticleMissing {
            target: target.id,
            article: number.clone(),
        })?;
        Ok(PreparedApplication {
            target_id: target.id,
            owner: target.owner,
            article: article.number,
            instruction_text: target.instruction_text.clone(),
            before_text: article.text,
            supersedes: previous.filter(|_| target.status() == TargetStatus::Completed),
        })
    }

    /// One transform call, bounded by the timeout.
    pub async fn attempt(&self, prepared: &PreparedApplication) -> Result<String, ApplyError> {
        tracing::debug!(target_id = %prepared.target_id, article = %prepared.article, "calling transform");
        let call = self
            .transform
            .transform(&prepared.before_text, &prepared.instruction_text);
        let error = match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(after)) => return Ok(after),
            Ok(Err(e)) => e,
            Err(_) => TransformError::TimedOut(self.timeout),
        };
        Err(ApplyError::Transform {
            target: prepared.target_id,
            error,
        })
    }

    /// Record the outcome on `target`.
    ///
    /// Success creates the fragment and completes the target. Failure marks
    /// a pending target failed; a completed target stays completed.
    pub fn finish(
        target: &mut EditTarget,
        prepared: PreparedApplication,
        outcome: Result<String, ApplyError>,
    ) -> Result<PatchedFragment, ApplyError> {
        match outcome {
            Ok(after_text) => {
                target.complete("applied")?;
                Ok(PatchedFragment::new(FragmentDraft {
                    target_id: prepared.target_id,
                    owner: prepared.owner,
                    article: prepared.article,
                    instruction_text: prepared.instruction_text,
                    before_text: prepared.before_text,
                    after_text,
                    supersedes: prepared.supersedes,
                }))
            }
            Err(err) => Err(Self::record_failure(target, err)),
        }
    }

    /// Mark a pending target failed with `err` as the reason.
    pub fn record_failure(target: &mut EditTarget, err: ApplyError) -> ApplyError {
        if target.status() == TargetStatus::Pending {
            if let Err(e) = target.fail(&err.to_string()) {
                return e.into();
            }
        }
        err
    }

    /// Prepare, attempt once, and finish.
    pub async fn apply(
        &self,
        target: &mut EditTarget,
        articles: &dyn ArticleStore,
        mode: ApplyMode,
        previous: Option<FragmentId>,
    ) -> Result<PatchedFragment, ApplyError> {
        let prepared = match Self::prepare(target, articles, mode, previous) {
            Ok(prepared) => prepared,
            Err(err @ ApplyError::InvalidState(_)) => return Err(err),
            Err(err) => return Err(Self::record_failure(target, err)),
        };
        let outcome = self.attempt(&prepared).await;
        Self::finish(target, prepared, outcome)
    }
}
