//! # redline-pipeline — Edit-Resolution Pipeline
//!
//! Turns a free-text instructions file into reviewable before/after
//! changes against a base document split into articles.
//!
//! ## Flow
//!
//! raw instructions → [`TargetResolver`] → edit targets → review gate →
//! [`PatchApplier`] → patched fragments → diffs
//!
//! - **Resolution** groups the instructions by article reference through an
//!   injected [`InstructionGrouping`] and creates one target per article.
//!   Unresolved references go to review instead of being dropped.
//! - **Application** feeds each pending target's article text and
//!   instruction to an injected [`TextTransform`] on a bounded worker pool.
//! - **Diffs** are recomputed on demand from each fragment's text pair.
//!
//! [`PipelineCoordinator`] is the entry point and the only component with
//! shared state or concurrency.
//!
//! ## Crate Policy
//!
//! - Instruction language is opaque here. Both the grouping and the
//!   transform are trait objects supplied by the caller.
//! - Every operation is scoped by an [`OwnerContext`](redline_core::OwnerContext).
//! - Per-target failures are recorded on the target and never abort a run.

pub mod applier;
pub mod audit;
pub mod capability;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod grouping;
pub mod resolver;
pub mod store;

pub use applier::{ApplyMode, PatchApplier, PreparedApplication};
pub use audit::{AuditAction, AuditEntry, AuditLog};
pub use capability::{InstructionGroup, InstructionGrouping, TextTransform};
pub use config::{ConfigError, PipelineConfig};
pub use coordinator::{
    ApplicationReport, DiffSubject, FragmentDiff, PipelineCoordinator, ResolutionReport,
    TargetFailure, UnresolvedReference,
};
pub use error::{ApplyError, GroupingError, Phase, PipelineError, TransformError};
pub use grouping::ArticleHeadingGrouping;
pub use resolver::{build_targets, TargetResolver};
pub use store::{ClaimGuard, PipelineStore, SourceFile, Store};
pub use tokio_util::sync::CancellationToken;
