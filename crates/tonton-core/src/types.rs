//! # Domain Types
//!
//! Data transfer objects shared by the sync engine and its callers.
//!
//! ## Type Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │ GameSyncRequest │   │ GameSyncResult  │   │   SyncStatus    │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  game_name      │──►│  success        │   │  syncing        │       │
//! │  │  app_id         │   │  files_transf.  │   │  current_game   │       │
//! │  └─────────────────┘   │  error?         │   │  current_file   │       │
//! │                        │  warnings       │   │  files_done     │       │
//! │                        └─────────────────┘   │  phase          │       │
//! │                                              └─────────────────┘       │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │   RemoteGame    │   │ SyncErrorKind   │   │   SyncPhase     │       │
//! │  │  name           │   │  CONFIGURATION  │   │  Idle           │       │
//! │  │  app_id         │   │  CONNECTION     │   │  ContentTransfer│       │
//! │  │  size_bytes     │   │  TRANSFER_...   │   │  MetadataTrans. │       │
//! │  └─────────────────┘   └─────────────────┘   │  Done           │       │
//! │                                              └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Field names stay snake_case on the wire; the plugin frontend reads them
//! as-is.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::UNKNOWN_APP_ID;

// =============================================================================
// Sync Phase
// =============================================================================

/// Where the orchestrator currently is in a game sync.
///
/// ```text
///  Idle ──► ContentTransfer ──► MetadataTransfer ──► Done
///                 │                                   ▲
///                 └─────────── failure / timeout ─────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum SyncPhase {
    /// No sync has started since the process came up.
    #[default]
    Idle,
    /// Transferring the game's content directory.
    ContentTransfer,
    /// Transferring the app manifest.
    MetadataTransfer,
    /// The most recent sync reached a terminal outcome.
    Done,
}

impl std::fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncPhase::Idle => write!(f, "idle"),
            SyncPhase::ContentTransfer => write!(f, "content_transfer"),
            SyncPhase::MetadataTransfer => write!(f, "metadata_transfer"),
            SyncPhase::Done => write!(f, "done"),
        }
    }
}

// =============================================================================
// Sync Status (snapshot)
// =============================================================================

/// Snapshot of the single process-wide sync record.
///
/// Readers always receive a whole copy of this struct; individual fields are
/// never observed mid-update.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SyncStatus {
    /// True strictly between the start of a sync and its terminal outcome.
    pub syncing: bool,

    /// Game currently (or most recently) being synced.
    pub current_game: Option<String>,

    /// Most recent transfer item observed. Cleared on completion.
    pub current_file: Option<String>,

    /// Items observed as transferred in the current run.
    #[ts(type = "number")]
    pub files_done: u64,

    /// Always 0: rsync is not asked for a pre-transfer file count.
    #[ts(type = "number")]
    pub files_total: u64,

    /// Reserved for byte-level progress.
    #[ts(type = "number")]
    pub bytes_done: u64,

    /// Reserved for byte-level progress.
    #[ts(type = "number")]
    pub bytes_total: u64,

    /// Orchestrator phase.
    pub phase: SyncPhase,

    /// When the current/most recent run started.
    #[ts(as = "Option<String>")]
    pub started_at: Option<DateTime<Utc>>,

    /// When the most recent run reached its terminal outcome.
    #[ts(as = "Option<String>")]
    pub finished_at: Option<DateTime<Utc>>,

    /// Error of the most recent run, if it failed.
    pub last_error: Option<String>,
}

// =============================================================================
// Game Sync Request
// =============================================================================

/// A request to copy one game from the PC.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct GameSyncRequest {
    /// Install directory name under `steamapps/common`.
    pub game_name: String,

    /// Steam app id, or `"unknown"` when the PC had no manifest for it.
    pub app_id: String,
}

impl GameSyncRequest {
    /// Creates a request. An empty app id is treated as unknown.
    pub fn new(game_name: impl Into<String>, app_id: impl Into<String>) -> Self {
        let app_id = app_id.into();
        let app_id = if app_id.trim().is_empty() {
            UNKNOWN_APP_ID.to_string()
        } else {
            app_id
        };

        GameSyncRequest {
            game_name: game_name.into(),
            app_id,
        }
    }

    /// Returns true if the app id refers to a real manifest.
    pub fn has_known_app_id(&self) -> bool {
        self.app_id != UNKNOWN_APP_ID
    }

    /// File name of the app manifest, if the app id is known.
    pub fn manifest_file_name(&self) -> Option<String> {
        self.has_known_app_id()
            .then(|| format!("appmanifest_{}.acf", self.app_id))
    }
}

// =============================================================================
// Error Kind
// =============================================================================

/// Machine-readable failure category carried in result DTOs.
///
/// Lets callers tell a timeout (offer a retry with a longer budget) apart
/// from an rsync exit failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncErrorKind {
    /// Required settings are missing or invalid.
    Configuration,
    /// The remote host could not be reached or refused authentication.
    Connection,
    /// The transfer process exited non-zero.
    TransferProcess,
    /// The transfer process exceeded its wall-clock budget and was killed.
    TransferTimeout,
    /// Remote output could not be decoded.
    Parse,
    /// Another sync is already running.
    SyncInProgress,
    /// Request arguments failed validation.
    InvalidInput,
    /// Local I/O or anything else unexpected.
    Internal,
}

// =============================================================================
// Game Sync Result
// =============================================================================

/// Outcome of `SyncGame`.
///
/// A failed manifest copy does not flip `success`; it lands in `warnings`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct GameSyncResult {
    pub success: bool,

    #[ts(type = "number")]
    pub files_transferred: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub error: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub error_kind: Option<SyncErrorKind>,

    /// Human-readable summary, e.g. `Synced Hades (1234 files)`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub message: Option<String>,

    /// Non-fatal problems (e.g. the manifest could not be copied).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl GameSyncResult {
    /// Builds a successful result.
    pub fn succeeded(game_name: &str, files_transferred: u64, warnings: Vec<String>) -> Self {
        GameSyncResult {
            success: true,
            files_transferred,
            error: None,
            error_kind: None,
            message: Some(format!("Synced {} ({} files)", game_name, files_transferred)),
            warnings,
        }
    }

    /// Builds a failed result.
    pub fn failed(files_transferred: u64, kind: SyncErrorKind, error: impl Into<String>) -> Self {
        GameSyncResult {
            success: false,
            files_transferred,
            error: Some(error.into()),
            error_kind: Some(kind),
            message: None,
            warnings: Vec::new(),
        }
    }
}

// =============================================================================
// Remote Library
// =============================================================================

/// A game installed on the PC, as reported by the enumeration script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct RemoteGame {
    pub name: String,

    #[serde(default = "unknown_app_id")]
    pub app_id: String,

    #[serde(default)]
    #[ts(type = "number")]
    pub size_bytes: u64,
}

fn unknown_app_id() -> String {
    UNKNOWN_APP_ID.to_string()
}

/// Outcome of `ListRemoteGames`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct RemoteGameList {
    pub success: bool,

    pub games: Vec<RemoteGame>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub error: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub error_kind: Option<SyncErrorKind>,
}

impl RemoteGameList {
    pub fn found(games: Vec<RemoteGame>) -> Self {
        RemoteGameList {
            success: true,
            games,
            error: None,
            error_kind: None,
        }
    }

    /// A failed listing always carries an empty game list.
    pub fn failed(kind: SyncErrorKind, error: impl Into<String>) -> Self {
        RemoteGameList {
            success: false,
            games: Vec::new(),
            error: Some(error.into()),
            error_kind: Some(kind),
        }
    }
}

// =============================================================================
// Connection Test
// =============================================================================

/// Outcome of `TestConnection`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ConnectionTestResult {
    pub success: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub error: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub error_kind: Option<SyncErrorKind>,
}

impl ConnectionTestResult {
    pub fn ok() -> Self {
        ConnectionTestResult {
            success: true,
            error: None,
            error_kind: None,
        }
    }

    pub fn failed(kind: SyncErrorKind, error: impl Into<String>) -> Self {
        ConnectionTestResult {
            success: false,
            error: Some(error.into()),
            error_kind: Some(kind),
        }
    }
}

// =============================================================================
// Settings
// =============================================================================

/// Connection settings as exposed to callers of `GetSettings`/`SaveSettings`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SettingsDto {
    /// PC host name or IP address.
    pub pc_address: String,

    /// SSH user on the PC.
    pub pc_user: String,

    /// SSH password. Empty means key-based authentication.
    pub pc_secret: String,

    /// Steam root on the PC (may start with `~`).
    pub steam_path: String,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_manifest_name() {
        let req = GameSyncRequest::new("Hades", "1145360");
        assert!(req.has_known_app_id());
        assert_eq!(
            req.manifest_file_name().as_deref(),
            Some("appmanifest_1145360.acf")
        );

        let req = GameSyncRequest::new("Game X", "unknown");
        assert!(!req.has_known_app_id());
        assert!(req.manifest_file_name().is_none());
    }

    #[test]
    fn test_empty_app_id_is_unknown() {
        let req = GameSyncRequest::new("Game X", "  ");
        assert_eq!(req.app_id, UNKNOWN_APP_ID);
    }

    #[test]
    fn test_success_result_has_no_error_field() {
        let result = GameSyncResult::succeeded("Hades", 12, Vec::new());
        let json = serde_json::to_value(&result).unwrap();

        assert_eq!(json["success"], true);
        assert_eq!(json["files_transferred"], 12);
        assert!(json.get("error").is_none());
        assert!(json.get("warnings").is_none());
        assert_eq!(json["message"], "Synced Hades (12 files)");
    }

    #[test]
    fn test_failed_result_serializes_kind() {
        let result = GameSyncResult::failed(3, SyncErrorKind::TransferTimeout, "timed out");
        let json = serde_json::to_value(&result).unwrap();

        assert_eq!(json["success"], false);
        assert_eq!(json["error_kind"], "TRANSFER_TIMEOUT");
        assert_eq!(json["error"], "timed out");
    }

    #[test]
    fn test_status_default_is_idle() {
        let status = SyncStatus::default();
        assert!(!status.syncing);
        assert_eq!(status.phase, SyncPhase::Idle);
        assert_eq!(status.files_done, 0);
        assert_eq!(status.files_total, 0);
        assert!(status.current_game.is_none());
    }

    #[test]
    fn test_failed_listing_is_empty() {
        let list = RemoteGameList::failed(SyncErrorKind::Parse, "Failed to parse game list");
        assert!(!list.success);
        assert!(list.games.is_empty());
    }
}
