//! # Pipeline Coordinator Integration Tests
//!
//! Drives the coordinator end to end with stub transforms: resolution,
//! the review gate, bounded concurrent application, operator actions, and
//! diffs of the results.

use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;

use redline_core::{Article, ArticleNumber, InMemoryArticleStore, OwnerContext, SourceFileId};
use redline_diff::{apply_unified, OpKind};
use redline_pipeline::{
    ApplyMode, ArticleHeadingGrouping, AuditAction, CancellationToken, DiffSubject, GroupingError,
    InstructionGroup, InstructionGrouping, Phase, PipelineConfig, PipelineCoordinator,
    PipelineError, TextTransform, TransformError,
};
use redline_state::{ChangeKind, TargetStatus};

const SCENARIO: &str = "Статья 1\n1) replace X with Y\nСтатья 99\n1) delete Z";

// ─── Stub Transforms ─────────────────────────────────────────────────

/// Replaces `X` with `Y`; fails when the instruction says `FAIL`.
struct ReplaceX;

#[async_trait]
impl TextTransform for ReplaceX {
    async fn transform(&self, current: &str, instruction: &str) -> Result<String, TransformError> {
        if instruction.contains("FAIL") {
            return Err(TransformError::Failed("instruction rejected".to_string()));
        }
        Ok(current.replace('X', "Y"))
    }
}

/// Fails the first `failures` calls, then appends a line.
struct Flaky {
    failures: u32,
    calls: AtomicU32,
}

impl Flaky {
    fn new(failures: u32) -> Self {
        Self {
            failures,
            calls: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl TextTransform for Flaky {
    async fn transform(&self, current: &str, _: &str) -> Result<String, TransformError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            return Err(TransformError::Failed(format!("call {call} failed")));
        }
        Ok(format!("{current}\nappended"))
    }
}

/// Signals `started` and waits for `release` before answering.
#[derive(Default)]
struct Gate {
    started: Notify,
    release: Notify,
}

#[async_trait]
impl TextTransform for Gate {
    async fn transform(&self, current: &str, _: &str) -> Result<String, TransformError> {
        self.started.notify_one();
        self.release.notified().await;
        Ok(current.to_uppercase())
    }
}

struct Slow;

#[async_trait]
impl TextTransform for Slow {
    async fn transform(&self, current: &str, _: &str) -> Result<String, TransformError> {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Ok(current.to_string())
    }
}

/// Tracks how many calls run at once.
#[derive(Default)]
struct Concurrency {
    active: AtomicUsize,
    peak: AtomicUsize,
}

#[async_trait]
impl TextTransform for Concurrency {
    async fn transform(&self, current: &str, _: &str) -> Result<String, TransformError> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(50)).await;
        self.active.fetch_sub(1, Ordering::SeqCst);
        Ok(format!("{current}changed\n"))
    }
}

/// Returns the first article block and loses the rest.
struct FirstBlockOnly;

#[async_trait]
impl InstructionGrouping for FirstBlockOnly {
    async fn group(&self, _: &str) -> Result<Vec<InstructionGroup>, GroupingError> {
        Ok(vec![InstructionGroup::new(Some("1"), "Статья 1\n1) replace X with Y")])
    }
}

// ─── Helpers ─────────────────────────────────────────────────────────

fn number(n: &str) -> ArticleNumber {
    ArticleNumber::new(n).unwrap()
}

fn articles() -> Arc<InMemoryArticleStore> {
    Arc::new(
        InMemoryArticleStore::new(vec![
            Article::new(number("1"), "Subject", "keep\nX marks\nkeep\n"),
            Article::new(number("2"), "Scope", "X\n"),
            Article::new(number("3"), "Terms", "one X\n"),
            Article::new(number("4"), "Empty", ""),
        ])
        .unwrap(),
    )
}

fn coordinator_with(transform: Arc<dyn TextTransform>, config: PipelineConfig) -> PipelineCoordinator {
    PipelineCoordinator::new(articles(), transform, Arc::new(ArticleHeadingGrouping), config).unwrap()
}

fn coordinator(transform: impl TextTransform + 'static) -> PipelineCoordinator {
    coordinator_with(Arc::new(transform), PipelineConfig::default())
}

async fn resolved(
    pipeline: &PipelineCoordinator,
    ctx: &OwnerContext,
    raw: &str,
) -> SourceFileId {
    let file = pipeline.register_source_file(ctx, raw, Some("edits.txt".to_string()));
    pipeline.run_resolution(ctx, file).await.unwrap();
    file
}

// ─── Resolution ──────────────────────────────────────────────────────

#[tokio::test]
async fn test_scenario_one_pending_one_review_one_fragment() {
    let pipeline = coordinator(ReplaceX);
    let ctx = OwnerContext::generate();
    let file = pipeline.register_source_file(&ctx, SCENARIO, None);

    let report = pipeline.run_resolution(&ctx, file).await.unwrap();
    assert!(report.created);
    assert_eq!(report.targets.len(), 2);
    assert_eq!(report.targets[0].status(), TargetStatus::Pending);
    assert_eq!(report.targets[0].resolved_article(), Some(&number("1")));
    assert_eq!(report.targets[1].status(), TargetStatus::Review);
    assert_eq!(report.unresolved.len(), 1);
    assert_eq!(report.unresolved[0].target_id, report.targets[1].id);
    assert_eq!(report.unresolved[0].article_ref.as_deref(), Some("99"));

    let applied = pipeline.apply_targets(&ctx, file).await.unwrap();
    assert_eq!(applied.applied.len(), 1);
    assert!(applied.failed.is_empty());
    assert_eq!(applied.skipped, vec![report.targets[1].id]);

    let diffs = pipeline.get_diff(&ctx, DiffSubject::File(file)).unwrap();
    assert_eq!(diffs.len(), 1);
    assert_eq!(diffs[0].article, number("1"));
    assert_eq!(diffs[0].change_kind, ChangeKind::Modified);
    assert!(!diffs[0].stale);

    let targets = pipeline.list_targets(&ctx, file).unwrap();
    assert_eq!(targets[0].status(), TargetStatus::Completed);
    assert_eq!(targets[1].status(), TargetStatus::Review);
}

#[tokio::test]
async fn test_resolution_is_idempotent() {
    let pipeline = coordinator(ReplaceX);
    let ctx = OwnerContext::generate();
    let file = pipeline.register_source_file(&ctx, "Статья 1\na\nСтатья 2\nb\nСтатья 1\nc", None);

    let first = pipeline.run_resolution(&ctx, file).await.unwrap();
    let second = pipeline.resolve_targets(&ctx, file).await.unwrap();
    assert!(first.created);
    assert!(!second.created);
    assert_eq!(first.targets, second.targets);
    assert_eq!(first.targets.len(), 2);
    assert!(first.targets[0].instruction_text.ends_with("Статья 1\nc"));

    let created = pipeline
        .audit_log_for(&ctx, file)
        .into_iter()
        .filter(|e| e.action == AuditAction::TargetsCreated)
        .count();
    assert_eq!(created, 1);
}

#[tokio::test]
async fn test_blank_instructions_persist_nothing() {
    let pipeline = coordinator(ReplaceX);
    let ctx = OwnerContext::generate();
    let file = pipeline.register_source_file(&ctx, " \n\t", None);

    let err = pipeline.run_resolution(&ctx, file).await.unwrap_err();
    assert!(matches!(err, PipelineError::GroupingFailure { .. }));
    assert_eq!(err.phase(), Phase::Resolution);
    assert!(pipeline.list_targets(&ctx, file).unwrap().is_empty());
    assert!(pipeline.source_file(&ctx, file).unwrap().resolved_at.is_none());
}

#[tokio::test]
async fn test_lossy_grouping_persists_nothing() {
    let pipeline = PipelineCoordinator::new(
        articles(),
        Arc::new(ReplaceX),
        Arc::new(FirstBlockOnly),
        PipelineConfig::default(),
    )
    .unwrap();
    let ctx = OwnerContext::generate();
    let file = pipeline.register_source_file(&ctx, SCENARIO, None);

    let err = pipeline.run_resolution(&ctx, file).await.unwrap_err();
    assert!(matches!(err, PipelineError::GroupingFailure { .. }));
    assert!(err.to_string().contains("do not cover"));
    assert!(pipeline.list_targets(&ctx, file).unwrap().is_empty());
    assert!(pipeline.source_file(&ctx, file).unwrap().resolved_at.is_none());
}

// ─── Application ─────────────────────────────────────────────────────

#[tokio::test]
async fn test_failure_is_isolated_to_its_target() {
    let pipeline = coordinator(ReplaceX);
    let ctx = OwnerContext::generate();
    let file = resolved(
        &pipeline,
        &ctx,
        "Статья 1\nreplace\nСтатья 2\nFAIL here\nСтатья 3\nreplace",
    )
    .await;

    let report = pipeline.apply_targets(&ctx, file).await.unwrap();
    assert_eq!(report.applied.len(), 2);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].phase, Phase::Application);
    assert!(report.failed[0].reason.contains("instruction rejected"));

    let targets = pipeline.list_targets(&ctx, file).unwrap();
    let statuses: Vec<TargetStatus> = targets.iter().map(|t| t.status()).collect();
    assert_eq!(
        statuses,
        vec![TargetStatus::Completed, TargetStatus::Failed, TargetStatus::Completed]
    );
    let failed = &targets[1];
    assert_eq!(failed.id, report.failed[0].target_id);
    assert!(failed.instruction_text.contains("FAIL here"));
    assert!(pipeline.current_fragment(&ctx, failed.id).unwrap().is_none());

    let again = pipeline.apply_targets(&ctx, file).await.unwrap();
    assert!(again.applied.is_empty());
    assert_eq!(again.skipped.len(), 3);
}

#[tokio::test]
async fn test_retries_until_success() {
    let flaky = Arc::new(Flaky::new(2));
    let config = PipelineConfig {
        transform_attempts: 3,
        retry_backoff_ms: 10,
        ..PipelineConfig::default()
    };
    let pipeline = coordinator_with(flaky.clone(), config);
    let ctx = OwnerContext::generate();
    let file = resolved(&pipeline, &ctx, "Статья 2\nappend a line").await;

    let report = pipeline.apply_targets(&ctx, file).await.unwrap();
    assert_eq!(report.applied.len(), 1);
    assert_eq!(flaky.calls.load(Ordering::SeqCst), 3);

    let target = &pipeline.list_targets(&ctx, file).unwrap()[0];
    assert_eq!(target.status(), TargetStatus::Completed);
    assert_eq!(target.transitions().len(), 1);
}

#[tokio::test]
async fn test_retries_exhausted_fail_once() {
    let flaky = Arc::new(Flaky::new(u32::MAX));
    let config = PipelineConfig {
        transform_attempts: 2,
        retry_backoff_ms: 10,
        ..PipelineConfig::default()
    };
    let pipeline = coordinator_with(flaky.clone(), config);
    let ctx = OwnerContext::generate();
    let file = resolved(&pipeline, &ctx, "Статья 2\nappend a line").await;

    let report = pipeline.apply_targets(&ctx, file).await.unwrap();
    assert_eq!(report.failed.len(), 1);
    assert_eq!(flaky.calls.load(Ordering::SeqCst), 2);

    let target = &pipeline.list_targets(&ctx, file).unwrap()[0];
    assert_eq!(target.status(), TargetStatus::Failed);
    assert_eq!(target.transitions().len(), 1);
    assert!(target.last_error.as_deref().unwrap_or("").contains("call 1 failed"));
}

#[tokio::test]
async fn test_timeout_fails_target() {
    let config = PipelineConfig {
        transform_timeout_secs: 1,
        ..PipelineConfig::default()
    };
    let pipeline = coordinator_with(Arc::new(Slow), config);
    let ctx = OwnerContext::generate();
    let file = resolved(&pipeline, &ctx, "Статья 1\nslow").await;

    let report = pipeline.apply_targets(&ctx, file).await.unwrap();
    assert_eq!(report.failed.len(), 1);
    assert!(report.failed[0].reason.contains("timed out"));
    let target = &pipeline.list_targets(&ctx, file).unwrap()[0];
    assert_eq!(target.status(), TargetStatus::Failed);
}

#[tokio::test]
async fn test_cancelled_run_leaves_targets_pending() {
    let gate = Arc::new(Gate::default());
    let pipeline = Arc::new(coordinator_with(gate.clone(), PipelineConfig::default()));
    let ctx = OwnerContext::generate();
    let file = resolved(&pipeline, &ctx, "Статья 1\nupper").await;

    let cancel = CancellationToken::new();
    let run = {
        let pipeline = Arc::clone(&pipeline);
        let cancel = cancel.clone();
        tokio::spawn(async move {
            pipeline
                .run_application(&ctx, file, ApplyMode::Pending, cancel)
                .await
        })
    };
    gate.started.notified().await;
    cancel.cancel();

    let report = run.await.unwrap().unwrap();
    assert!(report.applied.is_empty());
    assert_eq!(report.cancelled.len(), 1);

    let target = &pipeline.list_targets(&ctx, file).unwrap()[0];
    assert_eq!(target.status(), TargetStatus::Pending);
    assert!(target.transitions().is_empty());

    // Claim released with the cancelled task.
    assert!(pipeline.delete_target(&ctx, target.id).is_ok());
}

#[tokio::test]
async fn test_claimed_target_rejects_operator_actions() {
    let gate = Arc::new(Gate::default());
    let pipeline = Arc::new(coordinator_with(gate.clone(), PipelineConfig::default()));
    let ctx = OwnerContext::generate();
    let file = resolved(&pipeline, &ctx, "Статья 1\nupper").await;
    let id = pipeline.list_targets(&ctx, file).unwrap()[0].id;

    let run = {
        let pipeline = Arc::clone(&pipeline);
        tokio::spawn(async move { pipeline.apply_targets(&ctx, file).await })
    };
    gate.started.notified().await;

    assert_eq!(
        pipeline.rebind_target(&ctx, id, &number("2")).unwrap_err(),
        PipelineError::Busy(id)
    );
    assert_eq!(pipeline.delete_target(&ctx, id).unwrap_err(), PipelineError::Busy(id));
    assert_eq!(
        pipeline.reapply_target(&ctx, id).await.unwrap_err(),
        PipelineError::Busy(id)
    );

    gate.release.notify_one();
    let report = run.await.unwrap().unwrap();
    assert_eq!(report.applied.len(), 1);
    let fragment = pipeline.current_fragment(&ctx, id).unwrap().unwrap();
    assert_eq!(fragment.after_text, "KEEP\nX MARKS\nKEEP\n");
}

#[tokio::test]
async fn test_bounded_pool_applies_every_target() {
    let config = PipelineConfig {
        workers: 2,
        ..PipelineConfig::default()
    };
    let pipeline = coordinator_with(Arc::new(ReplaceX), config);
    let ctx = OwnerContext::generate();
    let file = resolved(&pipeline, &ctx, "Статья 1\na\nСтатья 2\nb\nСтатья 3\nc\nСтатья 4\nd").await;

    let report = pipeline.apply_targets(&ctx, file).await.unwrap();
    assert_eq!(report.applied.len(), 4);

    let kinds: Vec<ChangeKind> = pipeline
        .get_diff(&ctx, DiffSubject::File(file))
        .unwrap()
        .iter()
        .map(|d| d.change_kind)
        .collect();
    assert_eq!(kinds.len(), 4);
    // Article 4 is empty and stays empty.
    assert_eq!(kinds[3], ChangeKind::Modified);
}

#[tokio::test]
async fn test_pool_never_exceeds_worker_limit() {
    let config = PipelineConfig {
        workers: 2,
        ..PipelineConfig::default()
    };
    let transform = Arc::new(Concurrency::default());
    let pipeline = coordinator_with(transform.clone(), config);
    let ctx = OwnerContext::generate();
    let raw = "Статья 1\na\nСтатья 2\nb\nСтатья 3\nc\nСтатья 4\nd\nСтатья 1\ne\nСтатья 2\nf";
    let file = resolved(&pipeline, &ctx, raw).await;
    // Repeated headings merge, so add two more targets by hand.
    pipeline.add_target(&ctx, file, "g", &number("3")).unwrap();
    pipeline.add_target(&ctx, file, "h", &number("4")).unwrap();

    let report = pipeline.apply_targets(&ctx, file).await.unwrap();
    assert_eq!(report.applied.len(), 6);
    assert_eq!(transform.active.load(Ordering::SeqCst), 0);
    let peak = transform.peak.load(Ordering::SeqCst);
    assert!(peak <= 2, "peak concurrency {peak}");
    assert_eq!(peak, 2);
}

// ─── Operator Actions ────────────────────────────────────────────────

#[tokio::test]
async fn test_rebind_review_target_then_apply() {
    let pipeline = coordinator(ReplaceX);
    let ctx = OwnerContext::generate();
    let file = resolved(&pipeline, &ctx, SCENARIO).await;
    let review = pipeline.list_targets(&ctx, file).unwrap()[1].clone();

    assert_eq!(
        pipeline.rebind_target(&ctx, review.id, &number("99")).unwrap_err(),
        PipelineError::ArticleNotFound(number("99"))
    );

    let rebound = pipeline.rebind_target(&ctx, review.id, &number("2")).unwrap();
    assert_eq!(rebound.status(), TargetStatus::Pending);
    assert_eq!(rebound.resolved_article(), Some(&number("2")));

    let report = pipeline.apply_targets(&ctx, file).await.unwrap();
    assert_eq!(report.applied.len(), 2);

    let err = pipeline.rebind_target(&ctx, review.id, &number("3")).unwrap_err();
    assert!(matches!(
        err,
        PipelineError::InvalidStateTransition {
            phase: Phase::Operator,
            from: TargetStatus::Completed,
            ..
        }
    ));
}

#[tokio::test]
async fn test_retry_failed_target() {
    let pipeline = coordinator(ReplaceX);
    let ctx = OwnerContext::generate();
    let file = resolved(&pipeline, &ctx, "Статья 1\nFAIL").await;
    let id = pipeline.list_targets(&ctx, file).unwrap()[0].id;

    let err = pipeline.retry_target(&ctx, id).unwrap_err();
    assert_eq!(err.code(), "INVALID_STATE_TRANSITION");

    pipeline.apply_targets(&ctx, file).await.unwrap();
    assert_eq!(pipeline.get_target(&ctx, id).unwrap().status(), TargetStatus::Failed);

    let retried = pipeline.retry_target(&ctx, id).unwrap();
    assert_eq!(retried.status(), TargetStatus::Pending);

    let statuses: Vec<(TargetStatus, TargetStatus)> = retried
        .transitions()
        .iter()
        .map(|r| (r.from_state, r.to_state))
        .collect();
    assert_eq!(
        statuses,
        vec![
            (TargetStatus::Pending, TargetStatus::Failed),
            (TargetStatus::Failed, TargetStatus::Pending),
        ]
    );
}

#[tokio::test]
async fn test_status_never_returns_to_review() {
    let pipeline = coordinator(ReplaceX);
    let ctx = OwnerContext::generate();
    let file = resolved(&pipeline, &ctx, "Статья 1\nFAIL\nСтатья 42\nx\nСтатья 2\ny").await;
    let targets = pipeline.list_targets(&ctx, file).unwrap();

    pipeline.apply_targets(&ctx, file).await.unwrap();
    pipeline.retry_target(&ctx, targets[0].id).unwrap();
    pipeline.rebind_target(&ctx, targets[1].id, &number("3")).unwrap();
    pipeline.apply_targets(&ctx, file).await.unwrap();

    for target in pipeline.list_targets(&ctx, file).unwrap() {
        assert_ne!(target.status(), TargetStatus::Review);
        assert!(target
            .transitions()
            .iter()
            .all(|r| r.to_state != TargetStatus::Review));
        assert!(target
            .transitions()
            .iter()
            .all(|r| r.from_state != TargetStatus::Review || r.to_state == TargetStatus::Pending));
    }
}

#[tokio::test]
async fn test_add_and_delete_targets() {
    let pipeline = coordinator(ReplaceX);
    let ctx = OwnerContext::generate();
    let file = resolved(&pipeline, &ctx, SCENARIO).await;

    let added = pipeline.add_target(&ctx, file, "replace in 3", &number("3")).unwrap();
    assert_eq!(added.status(), TargetStatus::Pending);
    assert_eq!(added.ordinal, 2);
    assert!(matches!(
        pipeline.add_target(&ctx, file, "x", &number("77")),
        Err(PipelineError::ArticleNotFound(_))
    ));

    pipeline.apply_targets(&ctx, file).await.unwrap();
    let fragment = pipeline.current_fragment(&ctx, added.id).unwrap().unwrap();
    assert_eq!(fragment.after_text, "one Y\n");

    let removed = pipeline.delete_target(&ctx, added.id).unwrap();
    assert_eq!(removed.id, added.id);
    assert_eq!(
        pipeline.get_target(&ctx, added.id).unwrap_err(),
        PipelineError::TargetNotFound(added.id)
    );
    assert_eq!(
        pipeline.get_diff(&ctx, DiffSubject::Fragment(fragment.id)).unwrap_err(),
        PipelineError::FragmentNotFound(fragment.id)
    );
    assert_eq!(pipeline.list_targets(&ctx, file).unwrap().len(), 2);

    let actions: Vec<AuditAction> = pipeline.audit_log(&ctx).iter().map(|e| e.action).collect();
    assert!(actions.contains(&AuditAction::TargetAdded));
    assert!(actions.contains(&AuditAction::TargetDeleted));
}

#[tokio::test]
async fn test_reapply_supersedes_and_keeps_completed() {
    let pipeline = coordinator(ReplaceX);
    let ctx = OwnerContext::generate();
    let file = resolved(&pipeline, &ctx, SCENARIO).await;
    let targets = pipeline.list_targets(&ctx, file).unwrap();
    let (bound, review) = (targets[0].id, targets[1].id);

    assert!(matches!(
        pipeline.reapply_target(&ctx, review).await.unwrap_err(),
        PipelineError::InvalidStateTransition {
            phase: Phase::Application,
            from: TargetStatus::Review,
            ..
        }
    ));

    pipeline.apply_targets(&ctx, file).await.unwrap();
    let first = pipeline.current_fragment(&ctx, bound).unwrap().unwrap();
    let second = pipeline.reapply_target(&ctx, bound).await.unwrap();
    assert_eq!(second.supersedes, Some(first.id));
    assert_eq!(pipeline.get_target(&ctx, bound).unwrap().status(), TargetStatus::Completed);
    assert_eq!(pipeline.fragment_history(&ctx, bound).unwrap().len(), 2);

    let by_file = pipeline.get_diff(&ctx, DiffSubject::File(file)).unwrap();
    assert_eq!(by_file.len(), 1);
    assert_eq!(by_file[0].fragment_id, second.id);
    let old = pipeline.get_diff(&ctx, DiffSubject::Fragment(first.id)).unwrap();
    assert_eq!(old[0].fragment_id, first.id);

    let forced = pipeline
        .run_application(&ctx, file, ApplyMode::Reapply, CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(forced.applied.len(), 1);
    assert_eq!(forced.skipped, vec![review]);
}

// ─── Diffs ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_fragment_diff_round_trips() {
    let pipeline = coordinator(ReplaceX);
    let ctx = OwnerContext::generate();
    let file = resolved(&pipeline, &ctx, "Статья 1\nreplace X").await;
    pipeline.apply_targets(&ctx, file).await.unwrap();

    let diff = pipeline.get_diff(&ctx, DiffSubject::File(file)).unwrap().remove(0);
    let fragment = pipeline.current_fragment(&ctx, diff.target_id).unwrap().unwrap();
    assert!(diff.diff.has_changes());
    assert!(diff.diff.unified.starts_with("--- article 1 (before)\n+++ article 1 (after)\n"));
    assert_eq!(
        apply_unified(&fragment.before_text, &diff.diff.unified).unwrap(),
        fragment.after_text
    );
    let changed: Vec<OpKind> = diff
        .diff
        .ops
        .iter()
        .map(|op| op.kind)
        .filter(|k| *k != OpKind::Equal)
        .collect();
    assert_eq!(changed, vec![OpKind::Delete, OpKind::Insert]);
    assert_eq!(diff.diff.stats.deleted, 1);
    assert_eq!(diff.diff.stats.inserted, 1);

    let single = pipeline.target_diff(&ctx, diff.target_id).unwrap();
    assert_eq!(single.fragment_id, diff.fragment_id);
}

#[tokio::test]
async fn test_target_without_fragment_has_no_diff() {
    let pipeline = coordinator(ReplaceX);
    let ctx = OwnerContext::generate();
    let file = resolved(&pipeline, &ctx, "Статья 1\nreplace X").await;
    let id = pipeline.list_targets(&ctx, file).unwrap()[0].id;
    assert_eq!(
        pipeline.target_diff(&ctx, id).unwrap_err(),
        PipelineError::NoFragment(id)
    );
    assert!(pipeline.get_diff(&ctx, DiffSubject::File(file)).unwrap().is_empty());
}

// ─── Ownership ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_foreign_records_are_not_found() {
    let pipeline = coordinator(ReplaceX);
    let alice = OwnerContext::generate();
    let mallory = OwnerContext::generate();
    let file = resolved(&pipeline, &alice, SCENARIO).await;
    let id = pipeline.list_targets(&alice, file).unwrap()[0].id;

    assert_eq!(
        pipeline.list_targets(&mallory, file).unwrap_err(),
        PipelineError::SourceFileNotFound(file)
    );
    assert_eq!(
        pipeline.run_resolution(&mallory, file).await.unwrap_err(),
        PipelineError::SourceFileNotFound(file)
    );
    assert!(pipeline.apply_targets(&mallory, file).await.is_err());
    assert_eq!(
        pipeline.get_target(&mallory, id).unwrap_err(),
        PipelineError::TargetNotFound(id)
    );
    assert_eq!(
        pipeline.delete_target(&mallory, id).unwrap_err(),
        PipelineError::TargetNotFound(id)
    );

    pipeline.apply_targets(&alice, file).await.unwrap();
    let fragment = pipeline.current_fragment(&alice, id).unwrap().unwrap();
    assert!(pipeline
        .get_diff(&mallory, DiffSubject::Fragment(fragment.id))
        .is_err());
    assert!(pipeline.audit_log(&mallory).is_empty());
    assert!(!pipeline.audit_log(&alice).is_empty());
}

#[test]
fn test_invalid_config_is_rejected() {
    for workers in [0, usize::MAX] {
        let config = PipelineConfig {
            workers,
            ..PipelineConfig::default()
        };
        let result = PipelineCoordinator::new(
            articles(),
            Arc::new(ReplaceX),
            Arc::new(ArticleHeadingGrouping),
            config,
        );
        assert!(result.is_err(), "workers = {workers}");
    }
}
