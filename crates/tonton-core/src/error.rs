//! # Error Types
//!
//! Domain-specific error types for tonton-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  tonton-core errors (this file)                                        │
//! │  ├── CoreError        - Domain errors (bad game list, bad input)       │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  tonton-sync errors (separate crate)                                   │
//! │  └── SyncError        - Settings, ssh, rsync, concurrency failures     │
//! │                                                                         │
//! │  CLI errors (in app)                                                   │
//! │  └── CliError         - What the terminal sees (code + message)        │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → SyncError → result DTO / CliError │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core domain errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The remote enumeration script printed something that is not a JSON
    /// array of games.
    ///
    /// ## When This Occurs
    /// - `python3` is missing on the PC and the shell printed an error
    /// - The steam path points somewhere unexpected and the script crashed
    /// - A login banner was written to stdout ahead of the JSON
    #[error("Failed to parse game list: {0}")]
    InvalidGameList(String),

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Invalid format (e.g., path separator in a game name).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
