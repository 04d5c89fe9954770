//! Unified error types for shelfsort
//!
//! Error strategy:
//! - Per-file errors (probe, encode, backup, relocate): Recoverable, record against the job and continue
//! - Configuration, missing tools, interrupt: Fatal, abort the run
//!
//! All errors include actionable suggestions where possible.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Top-level error type for shelfsort operations
#[derive(Debug, Error)]
pub enum ShelfError {
    // =========================================================================
    // Recoverable errors - record against the job, continue the run
    // =========================================================================
    #[error("Failed to probe '{path}': {reason}")]
    Probe { path: PathBuf, reason: String },

    #[error("Probe of '{path}' timed out after {}s\n  Tip: The file may be corrupted or truncated", timeout.as_secs())]
    ProbeTimeout { path: PathBuf, timeout: Duration },

    #[error("{encoder} failed for '{path}': {reason}")]
    Encode {
        encoder: &'static str,
        path: PathBuf,
        reason: String,
    },

    #[error("Could not move '{from}' to '{to}': {reason}\n  Tip: Check write permissions for the target directory")]
    Relocate {
        from: PathBuf,
        to: PathBuf,
        reason: String,
    },

    #[error("Cannot back up '{path}': {reason}\n  Tip: Existing conversions are never overwritten; free space or fix permissions and re-run")]
    Backup { path: PathBuf, reason: String },

    #[error("File not found: '{0}'\n  Tip: Check the path exists and is accessible")]
    FileNotFound(PathBuf),

    // =========================================================================
    // Fatal errors - abort the run
    // =========================================================================
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Missing required tools: {}\n  Tip: Install them and make sure they are on PATH, or point SHELFSORT_<TOOL> at the binary", tools.join(", "))]
    MissingTools { tools: Vec<String> },

    #[error("No audio files found in '{0}'")]
    NoInputFiles(PathBuf),

    #[error("Interrupted")]
    Interrupted,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for shelfsort operations
pub type Result<T> = std::result::Result<T, ShelfError>;

impl ShelfError {
    /// Returns true if this error is recoverable (record on the job, continue the run)
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ShelfError::Probe { .. }
                | ShelfError::ProbeTimeout { .. }
                | ShelfError::Encode { .. }
                | ShelfError::Relocate { .. }
                | ShelfError::Backup { .. }
                | ShelfError::FileNotFound(_)
        )
    }

    /// Process exit code for a fatal error
    pub fn exit_code(&self) -> u8 {
        match self {
            ShelfError::Interrupted => 130,
            _ => 1,
        }
    }

    /// Create a probe error with context about the issue
    pub fn probe_error(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        ShelfError::Probe {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create an encode error for the named encoder
    pub fn encode_error(
        encoder: &'static str,
        path: impl Into<PathBuf>,
        reason: impl Into<String>,
    ) -> Self {
        ShelfError::Encode {
            encoder,
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a relocation error, translating common io failures
    pub fn relocate_error(
        from: impl Into<PathBuf>,
        to: impl Into<PathBuf>,
        err: &std::io::Error,
    ) -> Self {
        let to = to.into();
        let reason = match err.kind() {
            std::io::ErrorKind::PermissionDenied => {
                format!("Permission denied writing to {}", to.display())
            }
            std::io::ErrorKind::NotFound => "Source file disappeared".to_string(),
            _ => err.to_string(),
        };
        ShelfError::Relocate {
            from: from.into(),
            to,
            reason,
        }
    }
}
