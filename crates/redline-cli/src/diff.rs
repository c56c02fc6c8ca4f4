//! # Diff Subcommand
//!
//! `redline diff BEFORE AFTER` compares two files line by line.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};

use redline_diff::{DiffEngine, DiffResult};
use redline_pipeline::PipelineConfig;

/// Output format of a diff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum DiffFormat {
    /// Unified patch, applicable with `patch(1)`.
    #[default]
    Unified,
    /// Two-column table.
    SideBySide,
    /// Edit script, patch, table and stats as JSON.
    Json,
}

/// Arguments for the diff subcommand.
#[derive(Args, Debug)]
pub struct DiffArgs {
    /// Original file.
    pub before: PathBuf,

    /// Changed file.
    pub after: PathBuf,

    /// Output format.
    #[arg(long, value_enum, default_value_t = DiffFormat::Unified)]
    pub format: DiffFormat,

    /// Context lines around each change. Defaults to the configured value.
    #[arg(long, short = 'U')]
    pub context: Option<usize>,

    /// Column width of the side-by-side table.
    #[arg(long, default_value_t = 60)]
    pub width: usize,
}

/// Render `result` in `format`.
pub fn render(result: &DiffResult, format: DiffFormat, width: usize) -> Result<String> {
    Ok(match format {
        DiffFormat::Unified => result.unified.clone(),
        DiffFormat::SideBySide => result.side_by_side.render(width),
        DiffFormat::Json => {
            let mut json = serde_json::to_string_pretty(result).context("serializing diff")?;
            json.push('\n');
            json
        }
    })
}

/// Read and compare the two files.
pub fn diff_files(args: &DiffArgs, config: &PipelineConfig) -> Result<DiffResult> {
    let before = std::fs::read_to_string(&args.before)
        .with_context(|| format!("reading {}", args.before.display()))?;
    let after = std::fs::read_to_string(&args.after)
        .with_context(|| format!("reading {}", args.after.display()))?;
    let engine = DiffEngine::new(args.context.unwrap_or(config.context_lines))
        .with_labels(args.before.display().to_string(), args.after.display().to_string());
    Ok(engine.diff(&before, &after))
}

/// Execute the diff subcommand.
pub fn run_diff(args: &DiffArgs, config: &PipelineConfig) -> Result<u8> {
    let result = diff_files(args, config)?;
    tracing::info!(
        inserted = result.stats.inserted,
        deleted = result.stats.deleted,
        unchanged = result.stats.unchanged,
        "diff computed"
    );
    print!("{}", render(&result, args.format, args.width)?);
    Ok(u8::from(result.has_changes()))
}
