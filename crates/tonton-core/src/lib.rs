//! # tonton-core: Pure Domain Logic for TonTon Sync
//!
//! This crate holds everything about a game sync that can be expressed
//! without touching the network, the file system or a subprocess.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        TonTon Sync Architecture                         │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                Caller (plugin frontend / CLI)                   │   │
//! │  │   settings ──► list games ──► sync game ──► poll status         │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                 tonton-sync (engine, all I/O)                   │   │
//! │  │      rsync/ssh processes, sync state, settings file             │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ tonton-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │  itemize  │  │  library  │  │ validation│  │   │
//! │  │   │   DTOs    │  │  parser   │  │ JSON list │  │   rules   │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO PROCESSES • NO NETWORK • PURE FUNCTIONS          │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Request/result/status DTOs
//! - [`itemize`] - rsync `--itemize-changes` line classifier
//! - [`library`] - Remote game list decoding
//! - [`error`] - Domain error types
//! - [`validation`] - Request and settings validation
//!
//! ## Example Usage
//!
//! ```rust
//! use tonton_core::itemize::ProgressTally;
//!
//! let mut tally = ProgressTally::new();
//! tally.feed(">f+++++++++ data/a.bin");
//! tally.feed("cd+++++++++ data/");
//!
//! assert_eq!(tally.files_done, 1);
//! assert_eq!(tally.current_file.as_deref(), Some("data/a.bin"));
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod itemize;
pub mod library;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use itemize::{ProgressTally, TransferItemEvent, TransferItemKind};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// App id used when the PC has no manifest for an install directory.
///
/// Requests carrying this id skip the manifest transfer entirely.
pub const UNKNOWN_APP_ID: &str = "unknown";

/// Default Steam root, on both the PC and the handheld.
pub const DEFAULT_STEAM_PATH: &str = "~/.steam/steam";
