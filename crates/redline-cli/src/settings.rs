//! # Pipeline Settings
//!
//! Loads [`PipelineConfig`] for a command: the `--config` YAML file if
//! given, else the defaults, then `REDLINE_*` environment overrides, then
//! validation.

use std::path::Path;

use anyhow::{Context, Result};

use redline_pipeline::PipelineConfig;

pub fn load_config(path: Option<&Path>) -> Result<PipelineConfig> {
    let base = match path {
        Some(path) => PipelineConfig::from_yaml_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    let config = base
        .with_env_overrides()
        .context("applying REDLINE_* environment overrides")?;
    config.validate().context("validating pipeline config")?;
    tracing::debug!(?config, "pipeline config loaded");
    Ok(config)
}
