//! Error taxonomy for the vault memory engine.
//!
//! Absence (missing directories or files) is never an error here; callers get
//! empty results instead. What remains are corruption of an explicitly
//! requested archive, I/O failures that must surface, and invalid input.

use std::path::PathBuf;

/// Errors produced by vault memory operations.
#[derive(Debug, thiserror::Error)]
pub enum VaultError {
    #[error("invalid date '{input}': expected YYYY-MM, YYYY-MM-DD or a calendar date")]
    InvalidDate { input: String },

    #[error("invalid month key '{input}': expected YYYY-MM")]
    InvalidMonthKey { input: String },

    #[error("restore requires one filter: --date, --search or --all")]
    MissingRestoreFilter,

    #[error("restore filters are mutually exclusive, got: {given}")]
    ConflictingRestoreFilters { given: String },

    #[error("corrupt archive {}: {source}", path.display())]
    CorruptArchive {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("io error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid vault id '{id}'")]
    InvalidVaultId { id: String },

    #[error("invalid ranking config: {0}")]
    InvalidRankingConfig(String),

    #[error("config error ({source_name}): {message}")]
    Config { source_name: String, message: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl VaultError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type for vault memory operations.
pub type VaultResult<T> = std::result::Result<T, VaultError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_date_names_input() {
        let err = VaultError::InvalidDate {
            input: "next tuesday-ish".to_string(),
        };
        assert!(err.to_string().contains("next tuesday-ish"));
    }

    #[test]
    fn test_corrupt_archive_names_file() {
        let source = serde_json::from_str::<serde_json::Value>("{oops").unwrap_err();
        let err = VaultError::CorruptArchive {
            path: PathBuf::from("/v/.archives/memories-archive-2025-01.json"),
            source,
        };
        let msg = err.to_string();
        assert!(msg.contains("corrupt archive"));
        assert!(msg.contains("memories-archive-2025-01.json"));
    }

    #[test]
    fn test_io_error_names_path() {
        let err = VaultError::io(
            "/tmp/missing",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(err.to_string().contains("/tmp/missing"));
    }
}
