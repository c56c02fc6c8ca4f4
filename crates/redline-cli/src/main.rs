//! # redline CLI entry point
//!
//! Parses command-line arguments, installs logging, loads the pipeline
//! config, and dispatches to subcommand handlers.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use redline_cli::diff::{run_diff, DiffArgs};
use redline_cli::logging::{self, LogFormat};
use redline_cli::pipeline::{run_apply, run_resolve, ApplyArgs, ResolveArgs};
use redline_cli::settings::load_config;

/// Redline: resolve edit instructions against a segmented document and
/// review the changes as diffs.
#[derive(Parser, Debug)]
#[command(name = "redline", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Log line format.
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    log_format: LogFormat,

    /// Path to a YAML pipeline config file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Compare two files line by line.
    Diff(DiffArgs),

    /// Group edit instructions by article and print the edit targets.
    Resolve(ResolveArgs),

    /// Resolve and apply edit instructions through an external command.
    Apply(ApplyArgs),
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.verbose, cli.log_format);
    tracing::debug!("redline CLI starting");

    let result = match load_config(cli.config.as_deref()) {
        Ok(config) => match cli.command {
            Commands::Diff(args) => run_diff(&args, &config),
            Commands::Resolve(args) => run_resolve(&args).await,
            Commands::Apply(args) => run_apply(&args, config).await,
        },
        Err(e) => Err(e),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            eprintln!("error: {e:#}");
            ExitCode::from(2)
        }
    }
}

#[cfg(test)]
mod tests {
    use redline_cli::diff::DiffFormat;
    use redline_cli::pipeline::ReportFormat;

    use super::*;

    #[test]
    fn cli_parse_diff_defaults() {
        let cli = Cli::try_parse_from(["redline", "diff", "a.txt", "b.txt"]).unwrap();
        let Commands::Diff(args) = cli.command else {
            panic!("expected diff");
        };
        assert_eq!(args.format, DiffFormat::Unified);
        assert_eq!(args.context, None);
        assert_eq!(cli.verbose, 0);
        assert_eq!(cli.log_format, LogFormat::Text);
    }

    #[test]
    fn cli_parse_diff_options() {
        let cli = Cli::try_parse_from([
            "redline",
            "-vv",
            "diff",
            "a.txt",
            "b.txt",
            "--format",
            "side-by-side",
            "--context",
            "1",
            "--log-format",
            "json",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.log_format, LogFormat::Json);
        let Commands::Diff(args) = cli.command else {
            panic!("expected diff");
        };
        assert_eq!(args.format, DiffFormat::SideBySide);
        assert_eq!(args.context, Some(1));
    }

    #[test]
    fn cli_parse_apply() {
        let cli = Cli::try_parse_from([
            "redline",
            "--config",
            "redline.yaml",
            "apply",
            "--articles",
            "articles.yaml",
            "--instructions",
            "edits.txt",
            "--transform-cmd",
            "./rewrite.sh",
            "--format",
            "json",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("redline.yaml")));
        let Commands::Apply(args) = cli.command else {
            panic!("expected apply");
        };
        assert_eq!(args.transform_cmd, "./rewrite.sh");
        assert_eq!(args.format, ReportFormat::Json);
    }

    #[test]
    fn cli_apply_requires_transform() {
        assert!(Cli::try_parse_from([
            "redline",
            "apply",
            "--articles",
            "a.yaml",
            "--instructions",
            "e.txt",
        ])
        .is_err());
    }

    #[test]
    fn cli_parse_resolve() {
        let cli = Cli::try_parse_from([
            "redline",
            "resolve",
            "--articles",
            "a.json",
            "--instructions",
            "e.txt",
        ])
        .unwrap();
        assert!(matches!(cli.command, Commands::Resolve(_)));
    }
}
