//! # Pipeline Configuration
//!
//! Worker pool size, transform timeout, retry policy, and diff context.
//! Values come from defaults, then an optional YAML file, then
//! environment variables:
//!
//! - `REDLINE_WORKERS` (default: 4, at most 1024)
//! - `REDLINE_TRANSFORM_TIMEOUT_SECS` (default: 60)
//! - `REDLINE_TRANSFORM_ATTEMPTS` (default: 1)
//! - `REDLINE_RETRY_BACKOFF_MS` (default: 500)
//! - `REDLINE_CONTEXT_LINES` (default: 3)

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration of a [`crate::PipelineCoordinator`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Maximum number of concurrent transform calls.
    pub workers: usize,
    /// Upper bound on a single transform call.
    pub transform_timeout_secs: u64,
    /// Attempts per target and run before the target is marked failed.
    pub transform_attempts: u32,
    /// Pause between attempts.
    pub retry_backoff_ms: u64,
    /// Context lines around each change in unified diffs.
    pub context_lines: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            transform_timeout_secs: 60,
            transform_attempts: 1,
            retry_backoff_ms: 500,
            context_lines: redline_diff::DEFAULT_CONTEXT_LINES,
        }
    }
}

impl PipelineConfig {
    /// Largest accepted worker pool.
    pub const MAX_WORKERS: usize = 1024;

    /// Parse a YAML document. Missing keys keep their defaults.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(yaml).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Read and parse a YAML file.
    pub fn from_yaml_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_yaml_str(&raw)
    }

    /// Apply `REDLINE_*` environment overrides.
    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from `lookup`, keyed by environment variable name.
    pub fn with_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(v) = parse_var(&lookup, "REDLINE_WORKERS")? {
            self.workers = v;
        }
        if let Some(v) = parse_var(&lookup, "REDLINE_TRANSFORM_TIMEOUT_SECS")? {
            self.transform_timeout_secs = v;
        }
        if let Some(v) = parse_var(&lookup, "REDLINE_TRANSFORM_ATTEMPTS")? {
            self.transform_attempts = v;
        }
        if let Some(v) = parse_var(&lookup, "REDLINE_RETRY_BACKOFF_MS")? {
            self.retry_backoff_ms = v;
        }
        if let Some(v) = parse_var(&lookup, "REDLINE_CONTEXT_LINES")? {
            self.context_lines = v;
        }
        Ok(self)
    }

    /// Reject values the coordinator cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == 0 {
            return Err(ConfigError::Invalid("workers must be at least 1".to_string()));
        }
        if self.workers > Self::MAX_WORKERS {
            return Err(ConfigError::Invalid(format!(
                "workers must not exceed {}",
                Self::MAX_WORKERS
            )));
        }
        if self.transform_attempts == 0 {
            return Err(ConfigError::Invalid(
                "transform_attempts must be at least 1".to_string(),
            ));
        }
        if self.transform_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "transform_timeout_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn transform_timeout(&self) -> Duration {
        Duration::from_secs(self.transform_timeout_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

fn parse_var<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>, ConfigError> {
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidEnv {
                var: key.to_string(),
                value: raw,
            }),
    }
}

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {reason}")]
    Io { path: String, reason: String },
    #[error("invalid config file: {0}")]
    Parse(String),
    #[error("invalid value for {var}: {value:?}")]
    InvalidEnv { var: String, value: String },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::io::Write;

    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = PipelineConfig::default();
        assert_eq!(cfg.workers, 4);
        assert_eq!(cfg.transform_timeout(), Duration::from_secs(60));
        assert_eq!(cfg.transform_attempts, 1);
        assert_eq!(cfg.context_lines, 3);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let cfg = PipelineConfig::from_yaml_str("workers: 8\ntransform_attempts: 3\n").unwrap();
        assert_eq!(cfg.workers, 8);
        assert_eq!(cfg.transform_attempts, 3);
        assert_eq!(cfg.transform_timeout_secs, 60);
    }

    #[test]
    fn test_unknown_key_is_rejected() {
        let err = PipelineConfig::from_yaml_str("wrokers: 8\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_empty_yaml_is_default() {
        assert_eq!(PipelineConfig::from_yaml_str("").unwrap(), PipelineConfig::default());
    }

    #[test]
    fn test_yaml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "context_lines: 1").unwrap();
        let cfg = PipelineConfig::from_yaml_file(file.path()).unwrap();
        assert_eq!(cfg.context_lines, 1);
    }

    #[test]
    fn test_missing_file() {
        let err = PipelineConfig::from_yaml_file(Path::new("/nonexistent/redline.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = [
            ("REDLINE_WORKERS", "2"),
            ("REDLINE_TRANSFORM_TIMEOUT_SECS", " 5 "),
            ("REDLINE_RETRY_BACKOFF_MS", "0"),
        ]
        .into_iter()
        .collect();
        let cfg = PipelineConfig::default()
            .with_overrides(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(cfg.workers, 2);
        assert_eq!(cfg.transform_timeout_secs, 5);
        assert_eq!(cfg.retry_backoff(), Duration::ZERO);
        assert_eq!(cfg.transform_attempts, 1);
    }

    #[test]
    fn test_bad_override() {
        let err = PipelineConfig::default()
            .with_overrides(|k| (k == "REDLINE_WORKERS").then(|| "many".to_string()))
            .unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidEnv {
                var: "REDLINE_WORKERS".to_string(),
                value: "many".to_string(),
            }
        );
    }

    #[test]
    fn test_worker_pool_is_capped() {
        let at_cap = PipelineConfig {
            workers: PipelineConfig::MAX_WORKERS,
            ..PipelineConfig::default()
        };
        assert!(at_cap.validate().is_ok());
        for workers in [PipelineConfig::MAX_WORKERS + 1, usize::MAX] {
            let cfg = PipelineConfig {
                workers,
                ..PipelineConfig::default()
            };
            assert!(matches!(cfg.validate(), Err(ConfigError::Invalid(_))));
        }
        let from_env = PipelineConfig::default()
            .with_overrides(|k| (k == "REDLINE_WORKERS").then(|| usize::MAX.to_string()))
            .unwrap();
        assert!(from_env.validate().is_err());
    }

    #[test]
    fn test_validation() {
        let zero_workers = PipelineConfig {
            workers: 0,
            ..PipelineConfig::default()
        };
        assert!(zero_workers.validate().is_err());
        let zero_attempts = PipelineConfig {
            transform_attempts: 0,
            ..PipelineConfig::default()
        };
        assert!(zero_attempts.validate().is_err());
        let zero_timeout = PipelineConfig {
            transform_timeout_secs: 0,
            ..PipelineConfig::default()
        };
        assert!(zero_timeout.validate().is_err());
    }
}
