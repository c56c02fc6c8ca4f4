//! # Pipeline Error Types
//!
//! Errors of the injected capabilities ([`TransformError`],
//! [`GroupingError`]), of a single application ([`ApplyError`]), and of
//! coordinator operations ([`PipelineError`]).
//!
//! Per-target failures during a run are recorded on the target and listed
//! in the run report. A `PipelineError` is returned only when the whole
//! operation is rejected or aborted. None of them are fatal to the process.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use redline_core::{ArticleNumber, EditTargetId, FragmentId, SourceFileId};
use redline_state::{TargetError, TargetStatus};

/// Pipeline stage an error belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Grouping instructions and creating targets.
    Resolution,
    /// Transforming article text for targets.
    Application,
    /// Operator actions on targets and read access.
    Operator,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Resolution => "resolution",
            Self::Application => "application",
            Self::Operator => "operator",
        })
    }
}

// ─── Capability Errors ───────────────────────────────────────────────

/// Failure of the injected text transform.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransformError {
    /// The transform ran and reported an error.
    #[error("transform failed: {0}")]
    Failed(String),

    /// The transform did not finish in time.
    #[error("transform timed out after {0:?}")]
    TimedOut(Duration),
}

/// Failure to split raw instructions into groups.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GroupingError {
    /// The instruction text is blank.
    #[error("instruction text is empty")]
    EmptyInput,

    /// Grouping returned no non-blank group for non-blank input.
    #[error("grouping produced no instruction groups")]
    NoGroups,

    /// The groups do not hold the input text exactly once, in order.
    #[error("instruction groups do not cover the input text")]
    IncompleteCoverage,

    /// The grouping capability reported an error.
    #[error("grouping failed: {0}")]
    Failed(String),
}

// ─── Application Errors ──────────────────────────────────────────────

/// Failure of one application attempt.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApplyError {
    /// The target is not in an applicable state.
    #[error(transparent)]
    InvalidState(#[from] TargetError),

    /// The bound article is no longer in the article store.
    #[error("article {article} of {target} is not in the article store")]
    ArticleMissing {
        target: EditTargetId,
        article: ArticleNumber,
    },

    /// The transform failed or timed out.
    #[error("{target}: {error}")]
    Transform {
        target: EditTargetId,
        error: TransformError,
    },
}

impl ApplyError {
    /// Whether another attempt could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transform { .. })
    }
}

// ─── Coordinator Errors ──────────────────────────────────────────────

/// Rejection or abort of a coordinator operation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    /// Instructions could not be grouped. No target was persisted.
    #[error("grouping failed for {source_file}: {reason}")]
    GroupingFailure {
        source_file: SourceFileId,
        reason: String,
    },

    /// The operation is not allowed from the target's current status.
    #[error("invalid state transition for {target_id} during {phase}: {from} -> {to}")]
    InvalidStateTransition {
        target_id: EditTargetId,
        phase: Phase,
        from: TargetStatus,
        to: String,
    },

    /// A single-target application failed. The target was marked failed
    /// unless it was already completed.
    #[error("transform failed for {target_id}: {reason}")]
    TransformFailure {
        target_id: EditTargetId,
        reason: String,
    },

    #[error("source file {0} not found")]
    SourceFileNotFound(SourceFileId),

    #[error("edit target {0} not found")]
    TargetNotFound(EditTargetId),

    #[error("fragment {0} not found")]
    FragmentNotFound(FragmentId),

    /// The article named by an operator action does not exist.
    #[error("article {0} not found")]
    ArticleNotFound(ArticleNumber),

    /// A completed target has no fragment to diff.
    #[error("edit target {0} has no fragment")]
    NoFragment(EditTargetId),

    /// The target is being applied right now.
    #[error("edit target {0} is busy")]
    Busy(EditTargetId),
}

impl PipelineError {
    pub(crate) fn invalid_transition(phase: Phase, err: TargetError) -> Self {
        match err {
            TargetError::InvalidTransition { target, from, to } => Self::InvalidStateTransition {
                target_id: target,
                phase,
                from,
                to,
            },
        }
    }

    /// Stage the error belongs to.
    pub fn phase(&self) -> Phase {
        match self {
            Self::GroupingFailure { .. } => Phase::Resolution,
            Self::InvalidStateTransition { phase, .. } => *phase,
            Self::TransformFailure { .. } => Phase::Application,
            Self::SourceFileNotFound(_)
            | Self::TargetNotFound(_)
            | Self::FragmentNotFound(_)
            | Self::ArticleNotFound(_)
            | Self::NoFragment(_)
            | Self::Busy(_) => Phase::Operator,
        }
    }

    /// Target the error concerns, where there is one.
    pub fn target_id(&self) -> Option<EditTargetId> {
        match self {
            Self::InvalidStateTransition { target_id, .. }
            | Self::TransformFailure { target_id, .. } => Some(*target_id),
            Self::TargetNotFound(id) | Self::NoFragment(id) | Self::Busy(id) => Some(*id),
            _ => None,
        }
    }

    /// Machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::GroupingFailure { .. } => "GROUPING_FAILURE",
            Self::InvalidStateTransition { .. } => "INVALID_STATE_TRANSITION",
            Self::TransformFailure { .. } => "TRANSFORM_FAILURE",
            Self::SourceFileNotFound(_)
            | Self::TargetNotFound(_)
            | Self::FragmentNotFound(_)
            | Self::ArticleNotFound(_)
            | Self::NoFragment(_) => "NOT_FOUND",
            Self::Busy(_) => "BUSY",
        }
    }
}
