//! # Sync Error Types
//!
//! Error types for sync operations.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Sync Error Categories                             │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Configuration  │  │   Connection    │  │     Transfer            │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  MissingConn.   │  │  Connection     │  │  SpawnFailed            │ │
//! │  │  InvalidConfig  │  │  Failed         │  │  TransferFailed (exit)  │ │
//! │  │  ConfigLoad/Save│  │  Connection     │  │  TransferTimeout        │ │
//! │  │  InvalidRequest │  │  Timeout        │  │                         │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │     Parse       │  │   Concurrency   │  │      Internal           │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  ParseFailed    │  │  SyncInProgress │  │  Io / Internal          │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every variant maps onto a [`SyncErrorKind`] so the service layer can hand
//! callers a structured `{ success, error, error_kind }` value instead of
//! propagating the error.

use std::time::Duration;

use thiserror::Error;
use tonton_core::{CoreError, SyncErrorKind, ValidationError};

/// Result type alias for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Sync error type covering all possible sync failures.
#[derive(Debug, Error)]
pub enum SyncError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// PC address or user not set.
    #[error("Configure PC connection first")]
    MissingConnection,

    /// Invalid engine configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Request arguments failed validation.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Failed to load config file.
    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    /// Failed to save config file.
    #[error("Failed to save config: {0}")]
    ConfigSaveFailed(String),

    // =========================================================================
    // Connection Errors
    // =========================================================================
    /// ssh could not reach or authenticate against the PC.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// The connection attempt exceeded its budget.
    #[error("Connection timeout after {0} seconds")]
    ConnectionTimeout(u64),

    // =========================================================================
    // Transfer Errors
    // =========================================================================
    /// The transfer tool could not be started at all.
    #[error("Failed to start {program}: {reason}")]
    SpawnFailed { program: String, reason: String },

    /// rsync exited non-zero.
    #[error("rsync failed: {}", failure_reason(.exit_code, .stderr))]
    TransferFailed {
        exit_code: Option<i32>,
        stderr: String,
    },

    /// rsync ran past its wall-clock budget and was killed.
    #[error("Sync timeout: transfer exceeded {}s and was stopped", .timeout.as_secs_f64())]
    TransferTimeout { timeout: Duration },

    // =========================================================================
    // Parse Errors
    // =========================================================================
    /// Remote output was not the structured data expected.
    #[error("Failed to parse game list: {0}")]
    ParseFailed(String),

    // =========================================================================
    // Concurrency Errors
    // =========================================================================
    /// A second sync was requested while one is running.
    #[error("A sync is already in progress for '{game}'")]
    SyncInProgress { game: String },

    // =========================================================================
    // Internal Errors
    // =========================================================================
    /// Local file system or process I/O failed.
    #[error("I/O error: {0}")]
    Io(String),

    /// Internal sync engine error.
    #[error("Internal error: {0}")]
    Internal(String),
}

fn failure_reason(exit_code: &Option<i32>, stderr: &str) -> String {
    let stderr = stderr.trim();
    match (stderr.is_empty(), exit_code) {
        (false, _) => stderr.to_string(),
        (true, Some(code)) => format!("exit code {}", code),
        (true, None) => "terminated by signal".to_string(),
    }
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        SyncError::Io(err.to_string())
    }
}

impl From<toml::de::Error> for SyncError {
    fn from(err: toml::de::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for SyncError {
    fn from(err: toml::ser::Error) -> Self {
        SyncError::ConfigSaveFailed(err.to_string())
    }
}

impl From<ValidationError> for SyncError {
    fn from(err: ValidationError) -> Self {
        SyncError::InvalidRequest(err.to_string())
    }
}

impl From<CoreError> for SyncError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InvalidGameList(reason) => SyncError::ParseFailed(reason),
            CoreError::Validation(e) => e.into(),
        }
    }
}

// =============================================================================
// Error Categorization
// =============================================================================

impl SyncError {
    /// Maps the error onto the caller-facing taxonomy.
    pub fn kind(&self) -> SyncErrorKind {
        match self {
            SyncError::MissingConnection
            | SyncError::InvalidConfig(_)
            | SyncError::ConfigLoadFailed(_)
            | SyncError::ConfigSaveFailed(_) => SyncErrorKind::Configuration,
            SyncError::InvalidRequest(_) => SyncErrorKind::InvalidInput,
            SyncError::ConnectionFailed(_) | SyncError::ConnectionTimeout(_) => {
                SyncErrorKind::Connection
            }
            SyncError::SpawnFailed { .. } | SyncError::TransferFailed { .. } => {
                SyncErrorKind::TransferProcess
            }
            SyncError::TransferTimeout { .. } => SyncErrorKind::TransferTimeout,
            SyncError::ParseFailed(_) => SyncErrorKind::Parse,
            SyncError::SyncInProgress { .. } => SyncErrorKind::SyncInProgress,
            SyncError::Io(_) | SyncError::Internal(_) => SyncErrorKind::Internal,
        }
    }

    /// Returns true if retrying the same operation may succeed.
    ///
    /// ## Retryable Errors
    /// - Connection failures and timeouts (network issues)
    /// - Transfer timeouts (retry with a longer budget)
    /// - A sync already running (retry once it finishes)
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SyncError::ConnectionFailed(_)
                | SyncError::ConnectionTimeout(_)
                | SyncError::TransferTimeout { .. }
                | SyncError::SyncInProgress { .. }
        )
    }

    /// Returns true if this error indicates a configuration problem.
    pub fn is_config_error(&self) -> bool {
        self.kind() == SyncErrorKind::Configuration
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_errors() {
        assert!(SyncError::ConnectionFailed("no route".into()).is_retryable());
        assert!(SyncError::TransferTimeout {
            timeout: Duration::from_secs(60)
        }
        .is_retryable());

        assert!(!SyncError::MissingConnection.is_retryable());
        assert!(!SyncError::ParseFailed("bad".into()).is_retryable());
    }

    #[test]
    fn test_transfer_failure_surfaces_stderr() {
        let err = SyncError::TransferFailed {
            exit_code: Some(23),
            stderr: "rsync: link_stat \"/x\" failed: No such file or directory (2)\n".into(),
        };
        assert_eq!(
            err.to_string(),
            "rsync failed: rsync: link_stat \"/x\" failed: No such file or directory (2)"
        );

        let err = SyncError::TransferFailed {
            exit_code: Some(12),
            stderr: String::new(),
        };
        assert_eq!(err.to_string(), "rsync failed: exit code 12");
    }

    #[test]
    fn test_timeout_and_exit_failure_are_distinct_kinds() {
        let timeout = SyncError::TransferTimeout {
            timeout: Duration::from_secs(5),
        };
        let failed = SyncError::TransferFailed {
            exit_code: Some(1),
            stderr: "boom".into(),
        };
        assert_eq!(timeout.kind(), SyncErrorKind::TransferTimeout);
        assert_eq!(failed.kind(), SyncErrorKind::TransferProcess);
    }

    #[test]
    fn test_config_errors() {
        assert!(SyncError::MissingConnection.is_config_error());
        assert!(SyncError::ConfigSaveFailed("read-only".into()).is_config_error());
        assert!(!SyncError::Io("disk".into()).is_config_error());
    }

    #[test]
    fn test_core_error_conversion() {
        let err: SyncError = CoreError::InvalidGameList("expected value".into()).into();
        assert_eq!(err.kind(), SyncErrorKind::Parse);
    }
}
