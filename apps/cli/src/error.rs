//! # CLI Error Type
//!
//! Unified error type for `tonton` commands.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Flow in the CLI                                │
//! │                                                                         │
//! │  Operation returns a result DTO ──► printed as-is, exit 1 on failure   │
//! │                                                                         │
//! │  Anything else (settings file unreadable, bad arguments, ...)          │
//! │         │                                                               │
//! │         ▼                                                               │
//! │  SyncError ──► CliError { code, message } ──► stdout JSON + exit code  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Scripts read either a result DTO or:
//! ```json
//! { "code": "CONFIGURATION", "message": "Failed to load config: ..." }
//! ```

use serde::Serialize;
use tonton_core::SyncErrorKind;
use tonton_sync::SyncError;

/// Result type for CLI operations.
pub type Result<T> = std::result::Result<T, CliError>;

/// Exit code for operations that ran and reported failure.
pub const EXIT_FAILURE: u8 = 1;

/// Exit code for configuration and usage problems.
pub const EXIT_CONFIG: u8 = 2;

/// Exit code after Ctrl-C, as shells report SIGINT.
pub const EXIT_INTERRUPTED: u8 = 130;

/// Error returned from CLI commands.
#[derive(Debug, Clone, Serialize, thiserror::Error)]
#[error("{message}")]
pub struct CliError {
    /// Machine-readable error code, shared with result DTOs.
    pub code: SyncErrorKind,

    /// Human-readable error message.
    pub message: String,

    #[serde(skip)]
    interrupted: bool,
}

impl CliError {
    pub fn new(code: SyncErrorKind, message: impl Into<String>) -> Self {
        CliError {
            code,
            message: message.into(),
            interrupted: false,
        }
    }

    /// Invalid command-line input.
    pub fn usage(message: impl Into<String>) -> Self {
        CliError::new(SyncErrorKind::InvalidInput, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        CliError::new(SyncErrorKind::Internal, message)
    }

    /// The user cancelled a running operation.
    pub fn interrupted(message: impl Into<String>) -> Self {
        CliError {
            interrupted: true,
            ..CliError::new(SyncErrorKind::TransferProcess, message)
        }
    }

    /// Process exit code for this error.
    pub fn exit_code(&self) -> u8 {
        if self.interrupted {
            return EXIT_INTERRUPTED;
        }
        match self.code {
            SyncErrorKind::Configuration | SyncErrorKind::InvalidInput => EXIT_CONFIG,
            _ => EXIT_FAILURE,
        }
    }
}

/// Converts engine errors to CLI errors.
impl From<SyncError> for CliError {
    fn from(err: SyncError) -> Self {
        CliError::new(err.kind(), err.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(err: serde_json::Error) -> Self {
        tracing::error!("Failed to encode output: {}", err);
        CliError::internal("Failed to encode output")
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        CliError::internal(err.to_string())
    }
}
