//! # tonton-sync: Sync Engine for TonTon
//!
//! Copies games installed on a PC to the handheld by driving rsync over ssh,
//! and keeps a live, consistent view of the transfer for status queries.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Sync Engine Architecture                         │
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                      SyncService (facade)                        │  │
//! │  │  settings • test connection • list games • sync • status         │  │
//! │  └───────────┬─────────────────────┬──────────────────────┬─────────┘  │
//! │              │                     │                      │             │
//! │              ▼                     ▼                      ▼             │
//! │  ┌────────────────────┐  ┌────────────────────┐  ┌──────────────────┐  │
//! │  │  SettingsStore     │  │  RemoteShell       │  │ SyncOrchestrator │  │
//! │  │                    │  │                    │  │                  │  │
//! │  │  TOML file, env    │  │  ssh echo ok       │  │ content phase    │  │
//! │  │  overrides, 0600   │  │  python3 listing   │  │ manifest phase   │  │
//! │  └────────────────────┘  └────────────────────┘  └────────┬─────────┘  │
//! │                                                           │             │
//! │                               ┌───────────────────────────┤             │
//! │                               ▼                           ▼             │
//! │                    ┌────────────────────┐      ┌──────────────────┐    │
//! │                    │  TransferInvoker   │      │  SyncStateStore  │    │
//! │                    │                    │      │                  │    │
//! │                    │  rsync subprocess  │─────►│  RwLock snapshot │    │
//! │                    │  line channel      │ lines│  single-flight   │    │
//! │                    │  timeout + kill    │      │  guard           │    │
//! │                    └────────────────────┘      └──────────────────┘    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//! - [`service`] - Operations exposed to callers
//! - [`orchestrator`] - Two-phase game sync and its success policy
//! - [`invoker`] - rsync process, output streaming, timeouts
//! - [`state`] - Process-wide sync record
//! - [`remote`] - ssh connection test and game listing
//! - [`command`] - Command lines for rsync/ssh/sshpass
//! - [`config`] - Settings file and environment overrides
//! - [`error`] - Sync error types
//!
//! ## Example
//! ```rust,no_run
//! use tonton_sync::SyncService;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let service = SyncService::open(None)?;
//! let games = service.list_remote_games().await;
//! for game in &games.games {
//!     let result = service.sync_game(&game.name, &game.app_id).await;
//!     println!("{}: {:?}", game.name, result.message);
//! }
//! # Ok(())
//! # }
//! ```

pub mod command;
pub mod config;
pub mod error;
pub mod invoker;
pub mod orchestrator;
pub mod remote;
pub mod service;
pub mod state;

#[cfg(test)]
mod testing;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use config::{SettingsStore, TonTonConfig};
pub use error::{SyncError, SyncResult};
pub use orchestrator::{
    ManifestOutcome, NoOpEmitter, SyncEventEmitter, SyncFailure, SyncOrchestrator, SyncReport,
};
pub use service::SyncService;
pub use state::{SyncGuard, SyncStateStore};
