//! Muninn error types

use std::path::PathBuf;

/// Muninn error types
///
/// Most operations in this crate degrade to an empty/default value instead
/// of returning an error. The variants below surface only where a caller
/// must know that persistence did not happen (credential writes) or where
/// it explicitly asked for strict loading (configuration).
#[derive(Debug, thiserror::Error)]
pub enum MuninnError {
    // Storage errors
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Data errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Persisted document declares a format newer than this build understands.
    #[error("unsupported {document} version {found} (max supported: {max})")]
    UnsupportedVersion {
        document: &'static str,
        found: u32,
        max: u32,
    },

    /// Persisted document parsed as JSON but has the wrong shape.
    #[error("malformed {document}: {reason}")]
    Malformed {
        document: &'static str,
        reason: String,
    },

    // Configuration errors
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl MuninnError {
    /// Wrap an I/O error together with the path it occurred on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        MuninnError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type alias for Muninn operations
pub type Result<T> = std::result::Result<T, MuninnError>;
