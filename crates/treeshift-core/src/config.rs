//! Run configuration
//!
//! Loaded from an optional TOML file and refined with `with_*` builders:
//!
//! ```toml
//! [sampler]
//! limit = 3
//! max_depth = 10
//!
//! [migration]
//! max_depth = 64
//! concurrency = 4
//! io_timeout_ms = 30000
//! on_missing = "skip"
//! on_mismatch = "abort"
//! ```

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Children kept per object in a structure summary
pub const DEFAULT_SAMPLE_LIMIT: usize = 3;

/// Depth past which the summary shows the max-depth marker
pub const DEFAULT_SAMPLE_DEPTH: usize = 10;

/// Recursion guard for the migrator
pub const DEFAULT_MIGRATION_DEPTH: usize = 64;

/// What to do with a path that has no classification
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingPolicy {
    /// Log a warning and leave the subtree unwritten
    #[default]
    Skip,
    /// Stop the run with `MissingClassification`
    Fail,
}

/// What to do when a classification does not fit the value
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MismatchPolicy {
    /// Stop the run with `TypeClassification`
    #[default]
    Abort,
    /// Log a warning and leave the subtree unwritten
    Skip,
}

/// Sampler settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplerConfig {
    /// Maximum children kept per object
    pub limit: usize,
    /// Depth after which the marker replaces recursion
    pub max_depth: usize,
    /// Per-read timeout in milliseconds
    pub io_timeout_ms: Option<u64>,
}

impl SamplerConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With fan-out limit
    #[inline]
    #[must_use]
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// With depth limit
    #[inline]
    #[must_use]
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    /// With per-read timeout
    #[inline]
    #[must_use]
    pub fn with_io_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.io_timeout_ms = timeout.map(duration_millis);
        self
    }

    /// Per-read timeout
    #[inline]
    #[must_use]
    pub fn io_timeout(&self) -> Option<Duration> {
        self.io_timeout_ms.map(Duration::from_millis)
    }
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            limit: DEFAULT_SAMPLE_LIMIT,
            max_depth: DEFAULT_SAMPLE_DEPTH,
            io_timeout_ms: None,
        }
    }
}

/// Migrator settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MigrationConfig {
    /// Deepest collection nesting the migrator will follow
    pub max_depth: usize,
    /// Sibling jobs in flight per level
    pub concurrency: usize,
    /// Per-operation timeout in milliseconds
    pub io_timeout_ms: Option<u64>,
    /// Policy for paths missing from the decision map
    pub on_missing: MissingPolicy,
    /// Policy for classifications that do not fit the value
    pub on_mismatch: MismatchPolicy,
}

impl MigrationConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With recursion guard
    #[inline]
    #[must_use]
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    /// With sibling concurrency
    #[inline]
    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// With per-operation timeout
    #[inline]
    #[must_use]
    pub fn with_io_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.io_timeout_ms = timeout.map(duration_millis);
        self
    }

    /// With missing-classification policy
    #[inline]
    #[must_use]
    pub fn with_missing_policy(mut self, policy: MissingPolicy) -> Self {
        self.on_missing = policy;
        self
    }

    /// With mismatch policy
    #[inline]
    #[must_use]
    pub fn with_mismatch_policy(mut self, policy: MismatchPolicy) -> Self {
        self.on_mismatch = policy;
        self
    }

    /// Per-operation timeout
    #[inline]
    #[must_use]
    pub fn io_timeout(&self) -> Option<Duration> {
        self.io_timeout_ms.map(Duration::from_millis)
    }
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MIGRATION_DEPTH,
            concurrency: 1,
            io_timeout_ms: Some(30_000),
            on_missing: MissingPolicy::Skip,
            on_mismatch: MismatchPolicy::Abort,
        }
    }
}

/// Complete run configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub sampler: SamplerConfig,
    pub migration: MigrationConfig,
}

impl Config {
    /// Parse and validate TOML
    ///
    /// # Errors
    /// Returns [`ConfigError`] for syntax errors or out-of-range values.
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file
    ///
    /// # Errors
    /// Returns [`ConfigError`] if the file cannot be read or is invalid.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    /// Check value ranges
    ///
    /// # Errors
    /// Returns [`ConfigError::Invalid`] naming the first bad field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sampler.limit == 0 {
            return Err(ConfigError::Invalid {
                field: "sampler.limit",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.migration.concurrency == 0 {
            return Err(ConfigError::Invalid {
                field: "migration.concurrency",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.migration.io_timeout_ms == Some(0) || self.sampler.io_timeout_ms == Some(0) {
            return Err(ConfigError::Invalid {
                field: "io_timeout_ms",
                reason: "must be positive when set".to_string(),
            });
        }
        Ok(())
    }
}

fn duration_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.sampler.limit, 3);
        assert_eq!(config.sampler.max_depth, 10);
        assert_eq!(config.migration.max_depth, 64);
        assert_eq!(config.migration.concurrency, 1);
        assert_eq!(config.migration.on_missing, MissingPolicy::Skip);
        assert_eq!(config.migration.on_mismatch, MismatchPolicy::Abort);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = Config::from_toml_str(
            r#"
            [migration]
            concurrency = 8
            on_missing = "fail"
            "#,
        )
        .unwrap();
        assert_eq!(config.migration.concurrency, 8);
        assert_eq!(config.migration.on_missing, MissingPolicy::Fail);
        assert_eq!(config.migration.max_depth, DEFAULT_MIGRATION_DEPTH);
        assert_eq!(config.sampler, SamplerConfig::default());
    }

    #[test]
    fn rejects_zero_limit() {
        let result = Config::from_toml_str("[sampler]\nlimit = 0\n");
        assert!(matches!(
            result,
            Err(ConfigError::Invalid {
                field: "sampler.limit",
                ..
            })
        ));
    }

    #[test]
    fn rejects_unknown_policy() {
        let result = Config::from_toml_str("[migration]\non_mismatch = \"maybe\"\n");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[sampler]\nlimit = 5").unwrap();
        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.sampler.limit, 5);
    }

    #[test]
    fn load_missing_file() {
        let result = Config::load("/definitely/not/here.toml");
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }

    #[test]
    fn builders() {
        let config = MigrationConfig::new()
            .with_concurrency(3)
            .with_io_timeout(Some(Duration::from_secs(2)))
            .with_mismatch_policy(MismatchPolicy::Skip);
        assert_eq!(config.concurrency, 3);
        assert_eq!(config.io_timeout(), Some(Duration::from_secs(2)));
        assert_eq!(config.on_mismatch, MismatchPolicy::Skip);
    }
}
