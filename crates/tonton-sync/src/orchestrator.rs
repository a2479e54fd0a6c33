//! # Sync Orchestrator
//!
//! Sequences the two transfers of a game sync and owns the success policy.
//!
//! ## State Machine
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Game Sync Phases                                │
//! │                                                                         │
//! │   Idle ──try_begin──► ContentTransfer ──ok──► MetadataTransfer ──► Done │
//! │    │                        │                       │                   │
//! │    │ rejected:              │ exit != 0 / timeout   │ failure:          │
//! │    │  • sync in progress    │  → Done (failure)     │  warning only,    │
//! │    │  • no connection       │  manifest skipped     │  still success    │
//! │    │  • invalid request     │                       │                   │
//! │    ▼                        ▼                       │ app_id unknown:   │
//! │  (state untouched)     syncing = false              │  phase skipped    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Content failure is fatal because the game is unusable without its files.
//! A missing manifest only means Steam has to rediscover the install.

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use tonton_core::validation::validate_request;
use tonton_core::{GameSyncRequest, GameSyncResult, ProgressTally, SyncPhase, SyncStatus, TransferItemKind};

use crate::command::ToolChain;
use crate::config::{RemoteSettings, TonTonConfig, TransferSettings};
use crate::error::SyncError;
use crate::invoker::{TransferInvoker, TransferJob};
use crate::state::{SyncGuard, SyncStateStore};

// =============================================================================
// Event Emitter Trait
// =============================================================================

/// Receives progress while a sync runs (implemented by front ends).
pub trait SyncEventEmitter: Send + Sync {
    /// Emits the state after each recorded change.
    fn emit_status(&self, status: &SyncStatus);

    /// Emits a non-fatal problem.
    fn emit_warning(&self, message: &str);
}

/// No-op event emitter for headless use.
pub struct NoOpEmitter;

impl SyncEventEmitter for NoOpEmitter {
    fn emit_status(&self, _status: &SyncStatus) {}
    fn emit_warning(&self, _message: &str) {}
}

// =============================================================================
// Outcomes
// =============================================================================

/// What happened to the app manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestOutcome {
    /// Copied next to the install directory.
    Synced,
    /// App id unknown, nothing to copy.
    Skipped,
    /// Copy failed; the reason is also in the report's warnings.
    Failed(String),
}

/// A completed game sync.
#[derive(Debug, Clone)]
pub struct SyncReport {
    pub sync_id: Uuid,
    pub game_name: String,
    pub files_transferred: u64,
    pub manifest: ManifestOutcome,
    pub warnings: Vec<String>,
}

impl SyncReport {
    pub fn into_result(self) -> GameSyncResult {
        GameSyncResult::succeeded(&self.game_name, self.files_transferred, self.warnings)
    }
}

/// A game sync that did not complete.
#[derive(Debug)]
pub struct SyncFailure {
    pub error: SyncError,
    /// Files recorded before the failure. Zero if the sync never started.
    pub files_transferred: u64,
}

impl SyncFailure {
    pub fn into_result(self) -> GameSyncResult {
        GameSyncResult::failed(
            self.files_transferred,
            self.error.kind(),
            self.error.to_string(),
        )
    }
}

impl From<SyncError> for SyncFailure {
    fn from(error: SyncError) -> Self {
        SyncFailure {
            error,
            files_transferred: 0,
        }
    }
}

impl std::fmt::Display for SyncFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.error.fmt(f)
    }
}

// =============================================================================
// Orchestrator
// =============================================================================

/// Runs game syncs against the shared state record. Cheap to clone.
#[derive(Clone)]
pub struct SyncOrchestrator {
    state: SyncStateStore,
    emitter: Arc<dyn SyncEventEmitter>,
}

impl SyncOrchestrator {
    pub fn new(state: SyncStateStore) -> Self {
        Self::with_emitter(state, Arc::new(NoOpEmitter))
    }

    pub fn with_emitter(state: SyncStateStore, emitter: Arc<dyn SyncEventEmitter>) -> Self {
        SyncOrchestrator { state, emitter }
    }

    pub fn state(&self) -> &SyncStateStore {
        &self.state
    }

    /// Copies one game, then its manifest, from the PC.
    ///
    /// Requests that fail validation, lack a configured connection, or
    /// arrive while another sync runs are rejected before the state record
    /// is touched.
    pub async fn sync_game(
        &self,
        config: &TonTonConfig,
        request: &GameSyncRequest,
    ) -> Result<SyncReport, SyncFailure> {
        validate_request(request).map_err(SyncError::from)?;
        let remote = config.require_connection()?;
        let steamapps = config.local.steamapps_dir()?;

        let guard = self.state.try_begin(&request.game_name)?;
        let sync_id = Uuid::new_v4();
        let span = info_span!(
            "game_sync",
            %sync_id,
            game = %request.game_name,
            app_id = %request.app_id
        );

        let run = GameSync {
            emitter: self.emitter.as_ref(),
            state: &self.state,
            invoker: TransferInvoker::new(ToolChain::new(&config.transfer, &remote.secret)),
            remote,
            transfer: &config.transfer,
            steamapps: &steamapps,
            request,
        };

        run.execute(guard, sync_id).instrument(span).await
    }
}

/// Borrowed context of one run.
struct GameSync<'a> {
    emitter: &'a dyn SyncEventEmitter,
    state: &'a SyncStateStore,
    invoker: TransferInvoker,
    remote: &'a RemoteSettings,
    transfer: &'a TransferSettings,
    steamapps: &'a Path,
    request: &'a GameSyncRequest,
}

impl GameSync<'_> {
    async fn execute(self, guard: SyncGuard, sync_id: Uuid) -> Result<SyncReport, SyncFailure> {
        info!("Starting game sync");
        self.emit();

        if let Err(error) = self.transfer_content(&guard).await {
            let files_transferred = guard.finish(Some(error.to_string()));
            self.emit();
            warn!(files_done = files_transferred, error = %error, "Game sync failed");
            return Err(SyncFailure {
                error,
                files_transferred,
            });
        }

        let mut warnings = Vec::new();
        let manifest = self.transfer_manifest(&guard, &mut warnings).await;

        let files_transferred = guard.finish(None);
        self.emit();
        info!(files_done = files_transferred, manifest = ?manifest, "Game sync complete");

        Ok(SyncReport {
            sync_id,
            game_name: self.request.game_name.clone(),
            files_transferred,
            manifest,
            warnings,
        })
    }

    async fn transfer_content(&self, guard: &SyncGuard) -> Result<(), SyncError> {
        let game = &self.request.game_name;
        let job = TransferJob::content(
            self.remote.steamapps_source(&format!("common/{}/", game)),
            self.steamapps.join("common").join(game),
            self.transfer.content_timeout(),
        );

        let mut tally = ProgressTally::new();
        let handle = self.invoker.spawn(&job).await?;
        handle
            .drive(|line| {
                let Some(event) = tally.feed(line) else {
                    return;
                };
                match event.kind {
                    TransferItemKind::FileTransferred => {
                        guard.record_event(&event);
                        self.emit();
                    }
                    TransferItemKind::DirectoryNoticed => {
                        debug!(path = %event.path, "Directory");
                    }
                    TransferItemKind::Unrecognized => {
                        debug!(line = %event.path, "Unrecognized transfer output");
                    }
                }
            })
            .await?;

        debug!(
            files_done = guard.files_done(),
            directories = tally.directories.len(),
            unrecognized = tally.unrecognized,
            "Content transfer finished"
        );
        Ok(())
    }

    async fn transfer_manifest(&self, guard: &SyncGuard, warnings: &mut Vec<String>) -> ManifestOutcome {
        let Some(manifest) = self.request.manifest_file_name() else {
            debug!("App id unknown, skipping manifest");
            return ManifestOutcome::Skipped;
        };

        guard.set_phase(SyncPhase::MetadataTransfer);
        guard.set_current_file(manifest.as_str());
        self.emit();

        let job = TransferJob::metadata(
            self.remote.steamapps_source(&manifest),
            self.steamapps.join(&manifest),
            self.transfer.metadata_timeout(),
        );

        let outcome = match self.invoker.spawn(&job).await {
            Ok(handle) => handle.wait().await.map(|_| ()),
            Err(e) => Err(e),
        };

        match outcome {
            Ok(()) => {
                info!(manifest = %manifest, "Manifest synced");
                ManifestOutcome::Synced
            }
            Err(error) => {
                let message = format!("Failed to sync {}: {}", manifest, error);
                warn!(manifest = %manifest, error = %error, "Manifest transfer failed, game files are in place");
                self.emitter.emit_warning(&message);
                warnings.push(message);
                ManifestOutcome::Failed(error.to_string())
            }
        }
    }

    fn emit(&self) {
        self.emitter.emit_status(&self.state.snapshot());
    }
}
