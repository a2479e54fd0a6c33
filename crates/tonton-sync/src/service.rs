//! # Sync Service
//!
//! The operations callers invoke. Every failure is converted into a
//! structured result value here; nothing below this layer is exposed.
//!
//! ## Operation Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Service Operations                               │
//! │                                                                         │
//! │  get_settings()       - Current connection settings                    │
//! │  save_settings()      - Validate, persist, apply                       │
//! │  test_connection()    - ssh echo ok                                    │
//! │  list_remote_games()  - Remote enumeration script                      │
//! │  sync_game()          - Content + manifest transfer                    │
//! │  get_sync_status()    - Snapshot, never blocks on a running sync       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{error, warn};

use tonton_core::{
    ConnectionTestResult, GameSyncRequest, GameSyncResult, RemoteGameList, SettingsDto,
    SyncStatus,
};

use crate::config::{SettingsStore, TonTonConfig};
use crate::error::SyncResult;
use crate::orchestrator::{SyncEventEmitter, SyncOrchestrator};
use crate::remote::RemoteShell;
use crate::state::SyncStateStore;

/// Facade over settings, remote shell and orchestrator. Cheap to clone.
#[derive(Clone)]
pub struct SyncService {
    settings: Arc<SettingsStore>,
    orchestrator: SyncOrchestrator,
}

impl SyncService {
    /// Opens the settings file at `config_path` (or the platform default).
    ///
    /// The sync record is shared through the platform state directory, so
    /// single-flight and `get_sync_status` hold across processes.
    pub fn open(config_path: Option<PathBuf>) -> SyncResult<Self> {
        let settings = SettingsStore::open(config_path)?;
        let state = match TonTonConfig::default_state_dir() {
            Some(dir) => SyncStateStore::shared(dir),
            None => {
                warn!("No state directory available, sync status is private to this process");
                SyncStateStore::new()
            }
        };
        Ok(Self::with_state(settings, state))
    }

    /// A service with a process-private sync record.
    pub fn new(settings: SettingsStore) -> Self {
        Self::with_state(settings, SyncStateStore::new())
    }

    pub fn with_state(settings: SettingsStore, state: SyncStateStore) -> Self {
        SyncService {
            settings: Arc::new(settings),
            orchestrator: SyncOrchestrator::new(state),
        }
    }

    /// A service that never touches the file system for settings.
    pub fn in_memory(config: TonTonConfig) -> Self {
        Self::new(SettingsStore::in_memory(config))
    }

    /// Routes sync progress to `emitter`.
    pub fn with_emitter(mut self, emitter: Arc<dyn SyncEventEmitter>) -> Self {
        self.orchestrator = SyncOrchestrator::with_emitter(self.orchestrator.state().clone(), emitter);
        self
    }

    pub fn settings_store(&self) -> &SettingsStore {
        &self.settings
    }

    // =========================================================================
    // Settings
    // =========================================================================

    pub fn get_settings(&self) -> SettingsDto {
        self.settings.settings()
    }

    /// Returns false if the settings were rejected or could not be written.
    pub fn save_settings(&self, settings: &SettingsDto) -> bool {
        match self.settings.save_settings(settings) {
            Ok(()) => true,
            Err(e) => {
                error!(error = %e, "Failed to save settings");
                false
            }
        }
    }

    // =========================================================================
    // Remote
    // =========================================================================

    pub async fn test_connection(&self) -> ConnectionTestResult {
        let config = self.settings.snapshot();
        let outcome = match RemoteShell::new(&config) {
            Ok(shell) => shell.test_connection().await,
            Err(e) => Err(e),
        };

        match outcome {
            Ok(()) => ConnectionTestResult::ok(),
            Err(e) => ConnectionTestResult::failed(e.kind(), e.to_string()),
        }
    }

    pub async fn list_remote_games(&self) -> RemoteGameList {
        let config = self.settings.snapshot();
        let outcome = match RemoteShell::new(&config) {
            Ok(shell) => shell.list_games().await,
            Err(e) => Err(e),
        };

        match outcome {
            Ok(games) => RemoteGameList::found(games),
            Err(e) => {
                warn!(error = %e, "Listing remote games failed");
                RemoteGameList::failed(e.kind(), e.to_string())
            }
        }
    }

    // =========================================================================
    // Sync
    // =========================================================================

    /// Copies one game from the PC.
    ///
    /// An empty `app_id` is treated as `"unknown"`.
    pub async fn sync_game(&self, game_name: &str, app_id: &str) -> GameSyncResult {
        let request = GameSyncRequest::new(game_name, app_id);
        let config = self.settings.snapshot();

        match self.orchestrator.sync_game(&config, &request).await {
            Ok(report) => report.into_result(),
            Err(failure) => failure.into_result(),
        }
    }

    pub fn get_sync_status(&self) -> SyncStatus {
        self.orchestrator.state().snapshot()
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::config::EnvOverrides;
    use crate::testing::FakeTools;
    use std::time::{Duration, Instant};
    use tonton_core::{SyncErrorKind, SyncPhase};

    #[tokio::test]
    async fn test_sync_game_result() {
        let tools = FakeTools::new();
        tools.rsync_script(
            "case \"$*\" in *appmanifest_*) exit 1;; *) printf '>f+++++++++ a\\n>f+++++++++ b\\n';; esac",
        );
        let service = SyncService::in_memory(tools.config());

        let result = service.sync_game("Hades", "1145360").await;
        assert!(result.success);
        assert_eq!(result.files_transferred, 2);
        assert!(result.error.is_none());
        assert_eq!(result.warnings.len(), 1);

        let status = service.get_sync_status();
        assert!(!status.syncing);
        assert_eq!(status.phase, SyncPhase::Done);
        assert_eq!(status.current_game.as_deref(), Some("Hades"));
    }

    #[tokio::test]
    async fn test_unconfigured_operations_fail_with_configuration_kind() {
        let service = SyncService::in_memory(TonTonConfig::default());

        let result = service.sync_game("Hades", "1").await;
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("Configure PC connection first"));
        assert_eq!(result.error_kind, Some(SyncErrorKind::Configuration));

        let list = service.list_remote_games().await;
        assert!(!list.success);
        assert!(list.games.is_empty());
        assert_eq!(list.error_kind, Some(SyncErrorKind::Configuration));

        let test = service.test_connection().await;
        assert!(!test.success);
        assert_eq!(test.error_kind, Some(SyncErrorKind::Configuration));
    }

    #[tokio::test]
    async fn test_malformed_listing_is_parse_failure() {
        let tools = FakeTools::new();
        tools.ssh_script("cat > /dev/null; echo '{oops'");
        let service = SyncService::in_memory(tools.config());

        let list = service.list_remote_games().await;
        assert!(!list.success);
        assert_eq!(list.error_kind, Some(SyncErrorKind::Parse));
    }

    #[tokio::test]
    async fn test_settings_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        let open = |path: PathBuf| {
            SyncService::new(SettingsStore::open_with(Some(path), EnvOverrides::default()).unwrap())
        };
        let service = open(path.clone());

        let settings = SettingsDto {
            pc_address: "192.168.1.20".into(),
            pc_user: "steam".into(),
            pc_secret: "pw".into(),
            steam_path: "/home/steam/.steam/steam".into(),
        };
        assert!(service.save_settings(&settings));
        assert_eq!(service.get_settings(), settings);

        let reopened = open(path);
        assert_eq!(reopened.get_settings(), settings);

        let invalid = SettingsDto {
            pc_address: "bad host".into(),
            ..settings.clone()
        };
        assert!(!service.save_settings(&invalid));
        assert_eq!(service.get_settings(), settings);
    }

    #[tokio::test]
    async fn test_services_sharing_state_dir_are_single_flight() {
        let tools = FakeTools::new();
        tools.rsync_script("printf '>f+++++++++ a\\n'; sleep 2");
        let state_dir = tools.dir().join("state");
        let service = |tools: &FakeTools| {
            SyncService::with_state(
                SettingsStore::in_memory(tools.config()),
                SyncStateStore::shared(&state_dir),
            )
        };
        let first = service(&tools);
        let second = service(&tools);

        let running = tokio::spawn({
            let first = first.clone();
            async move { first.sync_game("Hades", "unknown").await }
        });

        let deadline = Instant::now() + Duration::from_secs(5);
        while !second.get_sync_status().syncing && Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        let seen = second.get_sync_status();
        assert!(seen.syncing);
        assert_eq!(seen.current_game.as_deref(), Some("Hades"));

        let rejected = second.sync_game("Celeste", "unknown").await;
        assert!(!rejected.success);
        assert_eq!(rejected.error_kind, Some(SyncErrorKind::SyncInProgress));

        let result = running.await.unwrap();
        assert!(result.success);
        assert_eq!(result.files_transferred, 1);

        let seen = second.get_sync_status();
        assert!(!seen.syncing);
        assert_eq!(seen.phase, SyncPhase::Done);
        assert_eq!(seen.files_done, 1);
        assert_eq!(tools.rsync_calls().len(), 1);
    }

    #[test]
    fn test_status_starts_idle() {
        let service = SyncService::in_memory(TonTonConfig::default());
        assert_eq!(service.get_sync_status(), SyncStatus::default());
    }
}
