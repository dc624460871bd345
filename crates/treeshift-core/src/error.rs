//! Error types for treeshift core
//!
//! Provides error handling for:
//! - Malformed source documents and decision maps
//! - Classification/value mismatches
//! - Paths without a classification
//! - Source and target store I/O, with the path that was being processed

use crate::decision::Classification;
use std::path::PathBuf;
use std::time::Duration;
use treeshift_tree::TreePath;

/// Main migration error type
#[derive(Debug, thiserror::Error)]
pub enum MigrationError {
    /// Source data or decision map is not valid structured data
    #[error("malformed input: {0}")]
    MalformedInput(String),

    /// Classification cannot be applied to the value found at the path
    #[error("cannot treat '{path}' as {classification}: value is {found}")]
    TypeClassification {
        path: TreePath,
        classification: Classification,
        found: &'static str,
    },

    /// Path has no entry in the decision map
    #[error("no classification for '{path}'")]
    MissingClassification { path: TreePath },

    /// Source or target store failure
    #[error("store error at '{path}'{}: {source}", display_classification(.classification))]
    StoreIo {
        path: TreePath,
        classification: Option<Classification>,
        #[source]
        source: StoreError,
    },

    /// Migration recursion guard tripped
    #[error("'{path}' is deeper than the migration limit of {max_depth} levels")]
    DepthExceeded { path: TreePath, max_depth: usize },

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

fn display_classification(classification: &Option<Classification>) -> String {
    classification
        .map(|c| format!(" (as {c})"))
        .unwrap_or_default()
}

impl MigrationError {
    /// Create malformed input error
    #[inline]
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedInput(message.into())
    }

    /// Create store error for a path
    #[inline]
    pub fn store_io(
        path: TreePath,
        classification: Option<Classification>,
        source: StoreError,
    ) -> Self {
        Self::StoreIo {
            path,
            classification,
            source,
        }
    }

    /// Path the failure is attributed to, if any
    #[must_use]
    pub fn path(&self) -> Option<&TreePath> {
        match self {
            Self::TypeClassification { path, .. }
            | Self::MissingClassification { path }
            | Self::StoreIo { path, .. }
            | Self::DepthExceeded { path, .. } => Some(path),
            Self::MalformedInput(_) | Self::Config(_) => None,
        }
    }

    /// Check if retrying the same path may succeed
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::StoreIo { source, .. } if source.is_retryable())
    }
}

/// Failure of a source read or target write
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Backend refused the operation
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Backend is temporarily unreachable or over quota
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    /// Operation did not complete in time
    #[error("operation timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    /// Local IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Encoding or decoding failed
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    /// Check if error is transient
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Timeout(_) | Self::Io(_))
    }
}

/// Configuration loading errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// IO error reading a config file
    #[error("io error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// TOML syntax or schema error
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Value out of range
    #[error("invalid value for {field}: {reason}")]
    Invalid {
        field: &'static str,
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_classification_display() {
        let err = MigrationError::TypeClassification {
            path: TreePath::single("b"),
            classification: Classification::Collection,
            found: "string",
        };
        assert_eq!(
            err.to_string(),
            "cannot treat '/b' as collection: value is string"
        );
    }

    #[test]
    fn store_io_display_includes_path_and_classification() {
        let err = MigrationError::store_io(
            TreePath::single("users").child("alice"),
            Some(Classification::Document),
            StoreError::Unavailable("quota".to_string()),
        );
        let msg = err.to_string();
        assert!(msg.contains("'/users/alice'"));
        assert!(msg.contains("(as document)"));
        assert!(msg.contains("quota"));
    }

    #[test]
    fn store_io_display_without_classification() {
        let err = MigrationError::store_io(
            TreePath::root(),
            None,
            StoreError::PermissionDenied("root".to_string()),
        );
        assert_eq!(err.to_string(), "store error at '': permission denied: root");
    }

    #[test]
    fn retryable_errors() {
        let timeout = MigrationError::store_io(
            TreePath::single("a"),
            Some(Classification::Field),
            StoreError::Timeout(Duration::from_secs(1)),
        );
        assert!(timeout.is_retryable());

        let denied = MigrationError::store_io(
            TreePath::single("a"),
            None,
            StoreError::PermissionDenied("nope".to_string()),
        );
        assert!(!denied.is_retryable());
        assert!(!MigrationError::malformed("bad").is_retryable());
    }

    #[test]
    fn error_path_attribution() {
        let err = MigrationError::MissingClassification {
            path: TreePath::single("x"),
        };
        assert_eq!(err.path(), Some(&TreePath::single("x")));
        assert_eq!(MigrationError::malformed("bad").path(), None);
    }
}
