//! # Pipeline Coordinator
//!
//! Orchestrates resolution, the review gate, application, and diffs for
//! the instruction files of many owners.
//!
//! ## Runs
//!
//! - [`PipelineCoordinator::run_resolution`] groups a file's instructions
//!   and persists its targets atomically. Re-running it returns the
//!   existing targets unchanged.
//! - [`PipelineCoordinator::run_application`] applies the file's selected
//!   targets on a bounded worker pool. Each target is claimed before its
//!   transform runs; a per-target failure never stops its siblings.
//!   Cancelling the run leaves every unfinished target as it was.
//!
//! ## Ownership
//!
//! Every operation takes the caller's [`OwnerContext`]. Records of other
//! owners are reported as not found.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use redline_core::{
    ArticleNumber, ArticleStore, EditTargetId, FragmentId, OwnerContext, SourceFileId,
};
use redline_diff::{DiffEngine, DiffResult};
use redline_state::{ChangeKind, EditTarget, PatchedFragment, TargetStatus};

use crate::applier::{ApplyMode, PatchApplier};
use crate::audit::{AuditAction, AuditEntry, AuditLog};
use crate::capability::{InstructionGrouping, TextTransform};
use crate::config::{ConfigError, PipelineConfig};
use crate::error::{ApplyError, Phase, PipelineError};
use crate::resolver::TargetResolver;
use crate::store::{PipelineStore, SourceFile};

// ─── Reports ─────────────────────────────────────────────────────────

/// A target whose article reference did not resolve.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnresolvedReference {
    pub target_id: EditTargetId,
    pub article_ref: Option<String>,
}

/// Outcome of [`PipelineCoordinator::run_resolution`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolutionReport {
    pub source_file: SourceFileId,
    /// All targets of the file, in ordinal order.
    pub targets: Vec<EditTarget>,
    /// Whether this call created the targets.
    pub created: bool,
    /// Targets waiting in review.
    pub unresolved: Vec<UnresolvedReference>,
}

impl ResolutionReport {
    fn new(source_file: SourceFileId, targets: Vec<EditTarget>, created: bool) -> Self {
        let unresolved = targets
            .iter()
            .filter(|t| t.status() == TargetStatus::Review)
            .map(|t| UnresolvedReference {
                target_id: t.id,
                article_ref: t.article_ref.clone(),
            })
            .collect();
        Self {
            source_file,
            targets,
            created,
            unresolved,
        }
    }
}

/// A target that failed during a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetFailure {
    pub target_id: EditTargetId,
    pub phase: Phase,
    pub reason: String,
}

/// Outcome of [`PipelineCoordinator::run_application`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApplicationReport {
    /// Targets that produced a fragment, with the fragment.
    pub applied: Vec<(EditTargetId, FragmentId)>,
    pub failed: Vec<TargetFailure>,
    /// Targets not selected by the mode, or claimed by another run.
    pub skipped: Vec<EditTargetId>,
    /// Targets left untouched because the run was cancelled.
    pub cancelled: Vec<EditTargetId>,
}

/// What to diff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffSubject {
    /// Current fragments of every target of a file.
    File(SourceFileId),
    /// One fragment.
    Fragment(FragmentId),
}

/// Diff of one fragment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FragmentDiff {
    pub target_id: EditTargetId,
    pub fragment_id: FragmentId,
    pub article: ArticleNumber,
    pub change_kind: ChangeKind,
    /// The article text changed since the fragment was computed.
    pub stale: bool,
    pub diff: DiffResult,
}

// ─── Worker ──────────────────────────────────────────────────────────

#[derive(Debug)]
enum SkipReason {
    Claimed,
    Gone,
    NotSelected(TargetStatus),
}

#[derive(Debug)]
enum Outcome {
    Applied(PatchedFragment),
    Failed(TargetFailure),
    Skipped(EditTargetId, SkipReason),
    Cancelled(EditTargetId),
}

/// Everything one application task needs.
struct ApplyJob {
    ctx: OwnerContext,
    mode: ApplyMode,
    store: PipelineStore,
    audit: AuditLog,
    articles: Arc<dyn ArticleStore>,
    applier: Arc<PatchApplier>,
    config: PipelineConfig,
    cancel: CancellationToken,
}

impl ApplyJob {
    async fn run(self, id: EditTargetId) -> Outcome {
        if self.cancel.is_cancelled() {
            return Outcome::Cancelled(id);
        }
        let Some(_claim) = self.store.claim(id) else {
            return Outcome::Skipped(id, SkipReason::Claimed);
        };
        let target = match self.store.target(id) {
            Some(t) if t.owner == self.ctx.owner => t,
            _ => return Outcome::Skipped(id, SkipReason::Gone),
        };
        if !self.mode.selects(target.status()) {
            return Outcome::Skipped(id, SkipReason::NotSelected(target.status()));
        }
        let source_file = target.source_file;

        let previous = self.store.current_fragment(id).map(|f| f.id);
        let prepared =
            match PatchApplier::prepare(&target, self.articles.as_ref(), self.mode, previous) {
                Ok(prepared) => prepared,
                Err(err) => return self.fail(id, source_file, err),
            };

        let mut attempt = 1;
        let result = loop {
            let result = tokio::select! {
                _ = self.cancel.cancelled() => return Outcome::Cancelled(id),
                r = self.applier.attempt(&prepared) => r,
            };
            match result {
                Err(err) if err.is_retryable() && attempt < self.config.transform_attempts => {
                    tracing::warn!(
                        target_id = %id,
                        source_file = %source_file,
                        attempt,
                        error = %err,
                        "transform attempt failed, retrying"
                    );
                    tokio::select! {
                        _ = self.cancel.cancelled() => return Outcome::Cancelled(id),
                        _ = tokio::time::sleep(self.config.retry_backoff()) => {}
                    }
                    attempt += 1;
                }
                other => break other,
            }
        };

        let store = &self.store;
        let committed = store.update_target(id, |t| {
            let fragment = PatchApplier::finish(t, prepared, result)?;
            store.push_fragment(fragment.clone());
            Ok::<_, ApplyError>(fragment)
        });
        match committed {
            Some(Ok(fragment)) => {
                tracing::info!(
                    target_id = %id,
                    source_file = %source_file,
                    fragment_id = %fragment.id,
                    change_kind = %fragment.change_kind,
                    "target applied"
                );
                self.audit.record(
                    &self.ctx,
                    AuditAction::TargetApplied,
                    Some(source_file),
                    Some(id),
                    fragment.id.to_string(),
                );
                Outcome::Applied(fragment)
            }
            Some(Err(err)) => self.failed(id, source_file, &err),
            None => Outcome::Skipped(id, SkipReason::Gone),
        }
    }

    /// Record a failure that happened before the transform ran.
    fn fail(&self, id: EditTargetId, source_file: SourceFileId, err: ApplyError) -> Outcome {
        let err = self
            .store
            .update_target(id, |t| {
                Ok::<_, ApplyError>(PatchApplier::record_failure(t, err.clone()))
            })
            .and_then(Result::ok)
            .unwrap_or(err);
        self.failed(id, source_file, &err)
    }

    fn failed(&self, id: EditTargetId, source_file: SourceFileId, err: &ApplyError) -> Outcome {
        tracing::warn!(
            target_id = %id,
            source_file = %source_file,
            phase = %Phase::Application,
            error = %err,
            "target application failed"
        );
        self.audit.record(
            &self.ctx,
            AuditAction::TargetFailed,
            Some(source_file),
            Some(id),
            err.to_string(),
        );
        Outcome::Failed(TargetFailure {
            target_id: id,
            phase: Phase::Application,
            reason: err.to_string(),
        })
    }
}

// ─── Coordinator ─────────────────────────────────────────────────────

/// Entry point for every pipeline operation.
pub struct PipelineCoordinator {
    config: PipelineConfig,
    articles: Arc<dyn ArticleStore>,
    resolver: TargetResolver,
    applier: Arc<PatchApplier>,
    store: PipelineStore,
    audit: AuditLog,
    diff_engine: DiffEngine,
}

impl PipelineCoordinator {
    /// Build a coordinator. Fails if `config` does not validate.
    pub fn new(
        articles: Arc<dyn ArticleStore>,
        transform: Arc<dyn TextTransform>,
        grouping: Arc<dyn InstructionGrouping>,
        config: PipelineConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            applier: Arc::new(PatchApplier::new(transform, config.transform_timeout())),
            resolver: TargetResolver::new(grouping),
            diff_engine: DiffEngine::new(config.context_lines),
            store: PipelineStore::new(),
            audit: AuditLog::new(),
            articles,
            config,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    // ── Source files ─────────────────────────────────────────────────

    /// Store raw instruction text for later resolution.
    pub fn register_source_file(
        &self,
        ctx: &OwnerContext,
        raw_text: impl Into<String>,
        filename: Option<String>,
    ) -> SourceFileId {
        let source = SourceFile::new(ctx.owner, raw_text, filename);
        let id = source.id;
        tracing::debug!(source_file = %id, "source file registered");
        self.store.insert_source(source);
        id
    }

    pub fn source_file(
        &self,
        ctx: &OwnerContext,
        id: SourceFileId,
    ) -> Result<SourceFile, PipelineError> {
        self.store
            .source(id)
            .filter(|s| s.owner == ctx.owner)
            .ok_or(PipelineError::SourceFileNotFound(id))
    }

    // ── Resolution ───────────────────────────────────────────────────

    /// Group the file's instructions and persist one target per article.
    ///
    /// Idempotent: once a file is resolved, later calls return its
    /// current targets without creating any.
    pub async fn run_resolution(
        &self,
        ctx: &OwnerContext,
        source_file: SourceFileId,
    ) -> Result<ResolutionReport, PipelineError> {
        let source = self.source_file(ctx, source_file)?;
        if source.resolved_at.is_some() {
            return Ok(ResolutionReport::new(
                source_file,
                self.store.targets_of(source_file),
                false,
            ));
        }

        self.audit.record(ctx, AuditAction::ResolutionStarted, Some(source_file), None, "");
        tracing::info!(source_file = %source_file, phase = %Phase::Resolution, "resolution started");

        let targets = self
            .resolver
            .resolve(ctx.owner, source_file, &source.raw_text, self.articles.as_ref())
            .await
            .map_err(|e| {
                tracing::warn!(source_file = %source_file, error = %e, "resolution aborted");
                PipelineError::GroupingFailure {
                    source_file,
                    reason: e.to_string(),
                }
            })?;

        let (targets, created) = self
            .store
            .insert_targets_once(source_file, targets)
            .ok_or(PipelineError::SourceFileNotFound(source_file))?;
        let report = ResolutionReport::new(source_file, targets, created);
        if created {
            let detail = format!(
                "{} targets, {} in review",
                report.targets.len(),
                report.unresolved.len()
            );
            tracing::info!(source_file = %source_file, targets = report.targets.len(), unresolved = report.unresolved.len(), "targets created");
            self.audit.record(ctx, AuditAction::TargetsCreated, Some(source_file), None, detail);
        }
        Ok(report)
    }

    /// Resolve a file's targets. Same as [`Self::run_resolution`].
    pub async fn resolve_targets(
        &self,
        ctx: &OwnerContext,
        source_file: SourceFileId,
    ) -> Result<ResolutionReport, PipelineError> {
        self.run_resolution(ctx, source_file).await
    }

    // ── Targets ──────────────────────────────────────────────────────

    /// Targets of a file in ordinal order.
    pub fn list_targets(
        &self,
        ctx: &OwnerContext,
        source_file: SourceFileId,
    ) -> Result<Vec<EditTarget>, PipelineError> {
        self.source_file(ctx, source_file)?;
        Ok(self.store.targets_of(source_file))
    }

    pub fn get_target(
        &self,
        ctx: &OwnerContext,
        id: EditTargetId,
    ) -> Result<EditTarget, PipelineError> {
        self.store
            .target(id)
            .filter(|t| t.owner == ctx.owner)
            .ok_or(PipelineError::TargetNotFound(id))
    }

    /// Bind a target to another article. A target in review becomes
    /// pending; pending and failed targets keep their status.
    pub fn rebind_target(
        &self,
        ctx: &OwnerContext,
        id: EditTargetId,
        article: &ArticleNumber,
    ) -> Result<EditTarget, PipelineError> {
        let before = self.get_target(ctx, id)?;
        if !self.articles.contains(article) {
            return Err(PipelineError::ArticleNotFound(article.clone()));
        }
        let updated = self.mutate_unclaimed(id, |t| {
            t.rebind(article.clone())?;
            Ok(t.clone())
        })?;
        tracing::info!(target_id = %id, article = %article, status = %updated.status(), "target rebound");
        self.audit.record(
            ctx,
            AuditAction::TargetRebound,
            Some(before.source_file),
            Some(id),
            format!("{} -> {article}", display_article(before.resolved_article())),
        );
        Ok(updated)
    }

    /// Operator-created target bound to an existing article, placed after
    /// every other target of the file.
    pub fn add_target(
        &self,
        ctx: &OwnerContext,
        source_file: SourceFileId,
        instruction_text: impl Into<String>,
        article: &ArticleNumber,
    ) -> Result<EditTarget, PipelineError> {
        self.source_file(ctx, source_file)?;
        if !self.articles.contains(article) {
            return Err(PipelineError::ArticleNotFound(article.clone()));
        }
        let target = self.store.insert_target_last(EditTarget::new(
            ctx.owner,
            source_file,
            0,
            instruction_text,
            Some(article.to_string()),
            Some(article.clone()),
        ));
        tracing::info!(target_id = %target.id, source_file = %source_file, article = %article, "target added");
        self.audit.record(
            ctx,
            AuditAction::TargetAdded,
            Some(source_file),
            Some(target.id),
            article.to_string(),
        );
        Ok(target)
    }

    /// Remove a target and its fragments.
    pub fn delete_target(
        &self,
        ctx: &OwnerContext,
        id: EditTargetId,
    ) -> Result<EditTarget, PipelineError> {
        self.get_target(ctx, id)?;
        let removed = self
            .store
            .with_unclaimed(id, || self.store.remove_target(id))
            .ok_or(PipelineError::Busy(id))?
            .ok_or(PipelineError::TargetNotFound(id))?;
        tracing::info!(target_id = %id, "target deleted");
        self.audit.record(
            ctx,
            AuditAction::TargetDeleted,
            Some(removed.source_file),
            Some(id),
            "",
        );
        Ok(removed)
    }

    /// Move a failed target back to pending.
    pub fn retry_target(
        &self,
        ctx: &OwnerContext,
        id: EditTargetId,
    ) -> Result<EditTarget, PipelineError> {
        self.get_target(ctx, id)?;
        let updated = self.mutate_unclaimed(id, |t| {
            t.retry()?;
            Ok(t.clone())
        })?;
        tracing::info!(target_id = %id, "target queued for retry");
        self.audit.record(
            ctx,
            AuditAction::TargetRetried,
            Some(updated.source_file),
            Some(id),
            "",
        );
        Ok(updated)
    }

    fn mutate_unclaimed(
        &self,
        id: EditTargetId,
        f: impl FnOnce(&mut EditTarget) -> Result<EditTarget, redline_state::TargetError>,
    ) -> Result<EditTarget, PipelineError> {
        self.store
            .with_unclaimed(id, || self.store.update_target(id, f))
            .ok_or(PipelineError::Busy(id))?
            .ok_or(PipelineError::TargetNotFound(id))?
            .map_err(|e| PipelineError::invalid_transition(Phase::Operator, e))
    }

    // ── Application ──────────────────────────────────────────────────

    /// Apply the file's targets selected by `mode` on the worker pool.
    ///
    /// Targets in review or failed are always skipped. Per-target failures
    /// are listed in the report; they do not fail the run.
    pub async fn run_application(
        &self,
        ctx: &OwnerContext,
        source_file: SourceFileId,
        mode: ApplyMode,
        cancel: CancellationToken,
    ) -> Result<ApplicationReport, PipelineError> {
        self.source_file(ctx, source_file)?;
        let mut report = ApplicationReport::default();

        let (selected, skipped): (Vec<EditTarget>, Vec<EditTarget>) = self
            .store
            .targets_of(source_file)
            .into_iter()
            .partition(|t| mode.selects(t.status()));
        report.skipped.extend(skipped.iter().map(|t| t.id));

        self.audit.record(
            ctx,
            AuditAction::ApplicationStarted,
            Some(source_file),
            None,
            format!("{} targets selected", selected.len()),
        );
        tracing::info!(
            source_file = %source_file,
            phase = %Phase::Application,
            selected = selected.len(),
            skipped = skipped.len(),
            workers = self.config.workers,
            "application started"
        );

        let semaphore = Arc::new(Semaphore::new(self.config.workers));
        let mut tasks = JoinSet::new();
        for target in selected {
            let job = self.job(ctx, mode, cancel.clone());
            let semaphore = Arc::clone(&semaphore);
            let id = target.id;
            tasks.spawn(async move {
                let permit = tokio::select! {
                    _ = job.cancel.cancelled() => return Outcome::Cancelled(id),
                    permit = semaphore.acquire_owned() => permit,
                };
                let Ok(_permit) = permit else {
                    return Outcome::Cancelled(id);
                };
                job.run(id).await
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Outcome::Applied(fragment)) => {
                    report.applied.push((fragment.target_id, fragment.id));
                }
                Ok(Outcome::Failed(failure)) => report.failed.push(failure),
                Ok(Outcome::Skipped(id, reason)) => {
                    tracing::debug!(target_id = %id, ?reason, "target skipped");
                    report.skipped.push(id);
                }
                Ok(Outcome::Cancelled(id)) => report.cancelled.push(id),
                Err(e) => tracing::error!(error = %e, "application task aborted"),
            }
        }

        tracing::info!(
            source_file = %source_file,
            applied = report.applied.len(),
            failed = report.failed.len(),
            cancelled = report.cancelled.len(),
            "application finished"
        );
        Ok(report)
    }

    /// Apply every pending target of a file.
    pub async fn apply_targets(
        &self,
        ctx: &OwnerContext,
        source_file: SourceFileId,
    ) -> Result<ApplicationReport, PipelineError> {
        self.run_application(ctx, source_file, ApplyMode::Pending, CancellationToken::new())
            .await
    }

    /// Apply one pending or completed target now.
    ///
    /// A completed target gets a new fragment superseding the current one
    /// and stays completed, also when the transform fails.
    pub async fn reapply_target(
        &self,
        ctx: &OwnerContext,
        id: EditTargetId,
    ) -> Result<PatchedFragment, PipelineError> {
        let target = self.get_target(ctx, id)?;
        if !ApplyMode::Reapply.selects(target.status()) {
            return Err(invalid_for_application(id, target.status()));
        }
        match self.job(ctx, ApplyMode::Reapply, CancellationToken::new()).run(id).await {
            Outcome::Applied(fragment) => Ok(fragment),
            Outcome::Failed(failure) => Err(PipelineError::TransformFailure {
                target_id: id,
                reason: failure.reason,
            }),
            Outcome::Skipped(_, SkipReason::NotSelected(status)) => {
                Err(invalid_for_application(id, status))
            }
            Outcome::Skipped(_, SkipReason::Gone) => Err(PipelineError::TargetNotFound(id)),
            Outcome::Skipped(_, SkipReason::Claimed) | Outcome::Cancelled(_) => {
                Err(PipelineError::Busy(id))
            }
        }
    }

    fn job(&self, ctx: &OwnerContext, mode: ApplyMode, cancel: CancellationToken) -> ApplyJob {
        ApplyJob {
            ctx: *ctx,
            mode,
            store: self.store.clone(),
            audit: self.audit.clone(),
            articles: Arc::clone(&self.articles),
            applier: Arc::clone(&self.applier),
            config: self.config.clone(),
            cancel,
        }
    }

    // ── Fragments and diffs ──────────────────────────────────────────

    /// Latest fragment of a target.
    pub fn current_fragment(
        &self,
        ctx: &OwnerContext,
        target: EditTargetId,
    ) -> Result<Option<PatchedFragment>, PipelineError> {
        self.get_target(ctx, target)?;
        Ok(self.store.current_fragment(target))
    }

    /// Every fragment of a target, oldest first.
    pub fn fragment_history(
        &self,
        ctx: &OwnerContext,
        target: EditTargetId,
    ) -> Result<Vec<PatchedFragment>, PipelineError> {
        self.get_target(ctx, target)?;
        Ok(self.store.fragment_history(target))
    }

    /// Diffs of the current fragments of a file, in target order, or of a
    /// single fragment.
    pub fn get_diff(
        &self,
        ctx: &OwnerContext,
        subject: DiffSubject,
    ) -> Result<Vec<FragmentDiff>, PipelineError> {
        let fragments = match subject {
            DiffSubject::File(source_file) => self
                .list_targets(ctx, source_file)?
                .into_iter()
                .filter_map(|t| self.store.current_fragment(t.id))
                .collect(),
            DiffSubject::Fragment(id) => {
                let fragment = self
                    .store
                    .fragment(id)
                    .filter(|f| f.owner == ctx.owner)
                    .ok_or(PipelineError::FragmentNotFound(id))?;
                vec![fragment]
            }
        };
        Ok(fragments.iter().map(|f| self.fragment_diff(f)).collect())
    }

    /// Diff of a target's current fragment.
    pub fn target_diff(
        &self,
        ctx: &OwnerContext,
        target: EditTargetId,
    ) -> Result<FragmentDiff, PipelineError> {
        self.current_fragment(ctx, target)?
            .map(|f| self.fragment_diff(&f))
            .ok_or(PipelineError::NoFragment(target))
    }

    fn fragment_diff(&self, fragment: &PatchedFragment) -> FragmentDiff {
        let engine = self.diff_engine.clone().with_labels(
            format!("article {} (before)", fragment.article),
            format!("article {} (after)", fragment.article),
        );
        let stale = self
            .articles
            .get(&fragment.article)
            .map_or(true, |a| fragment.is_stale(&a.text));
        FragmentDiff {
            target_id: fragment.target_id,
            fragment_id: fragment.id,
            article: fragment.article.clone(),
            change_kind: fragment.change_kind,
            stale,
            diff: engine.diff(&fragment.before_text, &fragment.after_text),
        }
    }

    // ── Audit ────────────────────────────────────────────────────────

    pub fn audit_log(&self, ctx: &OwnerContext) -> Vec<AuditEntry> {
        self.audit.entries(ctx)
    }

    pub fn audit_log_for(&self, ctx: &OwnerContext, source_file: SourceFileId) -> Vec<AuditEntry> {
        self.audit.entries_for_source(ctx, source_file)
    }
}

fn invalid_for_application(id: EditTargetId, status: TargetStatus) -> PipelineError {
    PipelineError::InvalidStateTransition {
        target_id: id,
        phase: Phase::Application,
        from: status,
        to: TargetStatus::Completed.to_string(),
    }
}

fn display_article(article: Option<&ArticleNumber>) -> String {
    article.map_or_else(|| "unresolved".to_string(), ToString::to_string)
}
