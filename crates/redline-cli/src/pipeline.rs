//! # Resolve and Apply Subcommands
//!
//! Both run the pipeline in process against an article file, using the
//! deterministic article-heading grouping.
//!
//! - `resolve` prints the edit targets as JSON.
//! - `apply` also applies every pending target through `--transform-cmd`
//!   and prints the run report and one unified diff per applied target.
//!   Ctrl-C cancels the run; unfinished targets stay pending.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use serde::Serialize;

use redline_core::{InMemoryArticleStore, OwnerContext, SourceFileId};
use redline_pipeline::{
    ApplicationReport, ApplyMode, ArticleHeadingGrouping, CancellationToken, DiffSubject,
    FragmentDiff, PipelineConfig, PipelineCoordinator, ResolutionReport, TargetResolver,
};
use redline_state::EditTarget;

use crate::articles::load_articles;
use crate::transform::CommandTransform;

/// Output format of `apply`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ReportFormat {
    /// Target summary followed by unified diffs.
    #[default]
    Text,
    /// Resolution, application and diffs as one JSON document.
    Json,
}

/// Arguments for the resolve subcommand.
#[derive(Args, Debug)]
pub struct ResolveArgs {
    /// Article list (YAML, or JSON with a `.json` extension).
    #[arg(long)]
    pub articles: PathBuf,

    /// Edit instructions text file.
    #[arg(long)]
    pub instructions: PathBuf,
}

/// Arguments for the apply subcommand.
#[derive(Args, Debug)]
pub struct ApplyArgs {
    /// Article list (YAML, or JSON with a `.json` extension).
    #[arg(long)]
    pub articles: PathBuf,

    /// Edit instructions text file.
    #[arg(long)]
    pub instructions: PathBuf,

    /// Shell command computing the new article text. Receives
    /// `{"text", "instruction"}` as JSON on stdin and prints the new text.
    #[arg(long)]
    pub transform_cmd: String,

    /// Output format.
    #[arg(long, value_enum, default_value_t = ReportFormat::Text)]
    pub format: ReportFormat,
}

fn read_instructions(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("reading instructions from {}", path.display()))
}

// ─── Resolve ─────────────────────────────────────────────────────────

/// Group the instructions and bind them to articles.
pub async fn resolve_targets(args: &ResolveArgs) -> Result<Vec<EditTarget>> {
    let articles = load_articles(&args.articles)?;
    let raw = read_instructions(&args.instructions)?;
    let ctx = OwnerContext::generate();
    let targets = TargetResolver::new(Arc::new(ArticleHeadingGrouping))
        .resolve(ctx.owner, SourceFileId::new(), &raw, &articles)
        .await
        .with_context(|| format!("resolving {}", args.instructions.display()))?;
    Ok(targets)
}

/// Execute the resolve subcommand.
pub async fn run_resolve(args: &ResolveArgs) -> Result<u8> {
    let targets = resolve_targets(args).await?;
    println!(
        "{}",
        serde_json::to_string_pretty(&targets).context("serializing targets")?
    );
    Ok(0)
}

// ─── Apply ───────────────────────────────────────────────────────────

/// Everything an `apply` run produced.
#[derive(Debug, Serialize)]
pub struct ApplyOutcome {
    pub resolution: ResolutionReport,
    pub application: ApplicationReport,
    /// Targets after the run, in ordinal order.
    pub targets: Vec<EditTarget>,
    pub diffs: Vec<FragmentDiff>,
}

/// Resolve and apply with `articles`, cancelling when `cancel` fires.
pub async fn apply_pipeline(
    articles: InMemoryArticleStore,
    raw: String,
    filename: Option<String>,
    transform_cmd: &str,
    config: PipelineConfig,
    cancel: CancellationToken,
) -> Result<ApplyOutcome> {
    let pipeline = PipelineCoordinator::new(
        Arc::new(articles),
        Arc::new(CommandTransform::new(transform_cmd)),
        Arc::new(ArticleHeadingGrouping),
        config,
    )
    .context("building pipeline")?;
    let ctx = OwnerContext::generate();

    let file = pipeline.register_source_file(&ctx, raw, filename);
    let resolution = pipeline.run_resolution(&ctx, file).await?;
    let application = pipeline
        .run_application(&ctx, file, ApplyMode::Pending, cancel)
        .await?;
    Ok(ApplyOutcome {
        resolution,
        application,
        targets: pipeline.list_targets(&ctx, file)?,
        diffs: pipeline.get_diff(&ctx, DiffSubject::File(file))?,
    })
}

/// Human-readable report.
pub fn render_text(outcome: &ApplyOutcome) -> String {
    let mut out = String::new();
    for target in &outcome.targets {
        let article = target
            .resolved_article()
            .map_or_else(|| "-".to_string(), ToString::to_string);
        out.push_str(&format!(
            "#{:<3} {:<10} article {:<8} ref {}\n",
            target.ordinal,
            target.status().as_str(),
            article,
            target.article_ref.as_deref().unwrap_or("-"),
        ));
        if let Some(error) = &target.last_error {
            out.push_str(&format!("     error: {error}\n"));
        }
    }
    out.push_str(&format!(
        "\n{} applied, {} failed, {} skipped, {} cancelled, {} in review\n",
        outcome.application.applied.len(),
        outcome.application.failed.len(),
        outcome.application.skipped.len(),
        outcome.application.cancelled.len(),
        outcome.resolution.unresolved.len(),
    ));
    for diff in &outcome.diffs {
        out.push('\n');
        out.push_str(&diff.diff.unified);
    }
    out
}

/// Execute the apply subcommand.
pub async fn run_apply(args: &ApplyArgs, config: PipelineConfig) -> Result<u8> {
    let articles = load_articles(&args.articles)?;
    let raw = read_instructions(&args.instructions)?;
    let filename = args
        .instructions
        .file_name()
        .map(|n| n.to_string_lossy().into_owned());

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, cancelling application");
            on_interrupt.cancel();
        }
    });

    let outcome = apply_pipeline(articles, raw, filename, &args.transform_cmd, config, cancel).await?;
    match args.format {
        ReportFormat::Text => print!("{}", render_text(&outcome)),
        ReportFormat::Json => println!(
            "{}",
            serde_json::to_string_pretty(&outcome).context("serializing report")?
        ),
    }
    Ok(u8::from(!outcome.application.failed.is_empty()))
}
