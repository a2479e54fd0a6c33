//! # Sync Configuration
//!
//! Connection settings, local layout and transfer tuning for the sync engine.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     TONTON_PC_ADDRESS=192.168.1.20                                     │
//! │     TONTON_PC_USER=steam                                               │
//! │                                                                         │
//! │  2. TOML Settings File                                                 │
//! │     ~/.config/sync/settings.toml (Linux)                               │
//! │     TONTON_CONFIG=/path/to/settings.toml overrides the location        │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     No connection, ~/.steam/steam on both ends                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # settings.toml
//! [remote]
//! address = "192.168.1.20"
//! user = "steam"
//! secret = ""                 # empty: key-based auth
//! steam_path = "~/.steam/steam"
//!
//! [local]
//! steam_path = "~/.steam/steam"
//!
//! [transfer]
//! content_timeout_secs = 1800
//! metadata_timeout_secs = 60
//! ```
//!
//! The file holds the ssh password in clear text, so it is written with
//! owner-only permissions. Environment overrides apply to the running
//! process only and are never written back to the file.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};
use std::time::Duration;
use tracing::{debug, info, warn};

use tonton_core::validation::validate_settings;
use tonton_core::{SettingsDto, DEFAULT_STEAM_PATH};

use crate::error::{SyncError, SyncResult};

/// Environment variable that relocates the settings file.
pub const CONFIG_PATH_ENV: &str = "TONTON_CONFIG";

/// Environment variable that relocates the shared sync lock and status file.
pub const STATE_DIR_ENV: &str = "TONTON_STATE_DIR";

const PC_ADDRESS_ENV: &str = "TONTON_PC_ADDRESS";
const PC_USER_ENV: &str = "TONTON_PC_USER";
const PC_SECRET_ENV: &str = "TONTON_PC_SECRET";
const REMOTE_STEAM_PATH_ENV: &str = "TONTON_REMOTE_STEAM_PATH";
const LOCAL_STEAM_PATH_ENV: &str = "TONTON_LOCAL_STEAM_PATH";
const RSYNC_ENV: &str = "TONTON_RSYNC";
const SSH_ENV: &str = "TONTON_SSH";
const SSHPASS_PROGRAM_ENV: &str = "TONTON_SSHPASS";

const OVERRIDE_VARS: [&str; 8] = [
    PC_ADDRESS_ENV,
    PC_USER_ENV,
    PC_SECRET_ENV,
    REMOTE_STEAM_PATH_ENV,
    LOCAL_STEAM_PATH_ENV,
    RSYNC_ENV,
    SSH_ENV,
    SSHPASS_PROGRAM_ENV,
];

// =============================================================================
// Secret
// =============================================================================

/// The ssh password.
///
/// Never printed by `Debug`, never placed on a command line. The invoker
/// hands it to `sshpass -e` through the child's environment only.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Secret(value.into())
    }

    /// Returns true when key-based authentication should be used.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the clear-text value.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.0.is_empty() {
            write!(f, "Secret(<empty>)")
        } else {
            write!(f, "Secret(<redacted>)")
        }
    }
}

// =============================================================================
// Remote Settings
// =============================================================================

/// Where the games come from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteSettings {
    /// PC host name or IP address.
    #[serde(default)]
    pub address: String,

    /// SSH user on the PC.
    #[serde(default)]
    pub user: String,

    /// SSH password. Empty means key-based authentication.
    #[serde(default)]
    pub secret: Secret,

    /// Steam root on the PC. A leading `~` is left for the remote shell.
    #[serde(default = "default_steam_path")]
    pub steam_path: String,
}

fn default_steam_path() -> String {
    DEFAULT_STEAM_PATH.to_string()
}

impl Default for RemoteSettings {
    fn default() -> Self {
        RemoteSettings {
            address: String::new(),
            user: String::new(),
            secret: Secret::default(),
            steam_path: default_steam_path(),
        }
    }
}

impl RemoteSettings {
    /// Returns true if host and user are both set.
    pub fn is_configured(&self) -> bool {
        !self.address.trim().is_empty() && !self.user.trim().is_empty()
    }

    /// `user@host`, as passed to ssh.
    pub fn login(&self) -> String {
        format!("{}@{}", self.user, self.address)
    }

    /// rsync source for a path relative to the remote `steamapps` directory.
    ///
    /// ```rust
    /// use tonton_sync::config::RemoteSettings;
    ///
    /// let remote = RemoteSettings {
    ///     address: "pc".into(),
    ///     user: "deck".into(),
    ///     ..Default::default()
    /// };
    /// assert_eq!(
    ///     remote.steamapps_source("common/Hades/"),
    ///     "deck@pc:~/.steam/steam/steamapps/common/Hades/"
    /// );
    /// ```
    pub fn steamapps_source(&self, relative: &str) -> String {
        format!(
            "{}:{}/steamapps/{}",
            self.login(),
            self.steam_path.trim_end_matches('/'),
            relative
        )
    }
}

// =============================================================================
// Local Settings
// =============================================================================

/// Where the games go on the handheld.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalSettings {
    /// Local Steam root. A leading `~` is expanded against the home directory.
    #[serde(default = "default_steam_path")]
    pub steam_path: String,
}

impl Default for LocalSettings {
    fn default() -> Self {
        LocalSettings {
            steam_path: default_steam_path(),
        }
    }
}

impl LocalSettings {
    /// Absolute path of the local `steamapps` directory.
    pub fn steamapps_dir(&self) -> SyncResult<PathBuf> {
        Ok(expand_home(&self.steam_path)?.join("steamapps"))
    }
}

fn expand_home(path: &str) -> SyncResult<PathBuf> {
    let rest = match path.strip_prefix('~') {
        Some(rest) if rest.is_empty() || rest.starts_with('/') => rest.trim_start_matches('/'),
        _ => return Ok(PathBuf::from(path)),
    };

    let dirs = directories::BaseDirs::new().ok_or_else(|| {
        SyncError::InvalidConfig("cannot determine the home directory".into())
    })?;

    Ok(dirs.home_dir().join(rest))
}

// =============================================================================
// Transfer Settings
// =============================================================================

/// External tool names and time budgets.
///
/// The `*_extra_args` lists are inserted right after the program name. They
/// exist for wrappers (e.g. `nice`) and let tests run scripts through a shell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferSettings {
    #[serde(default = "default_rsync")]
    pub rsync_program: String,

    #[serde(default)]
    pub rsync_extra_args: Vec<String>,

    #[serde(default = "default_ssh")]
    pub ssh_program: String,

    #[serde(default)]
    pub ssh_extra_args: Vec<String>,

    #[serde(default = "default_sshpass")]
    pub sshpass_program: String,

    /// Budget for the game content transfer (seconds).
    #[serde(default = "default_content_timeout")]
    pub content_timeout_secs: u64,

    /// Budget for the manifest transfer (seconds).
    #[serde(default = "default_metadata_timeout")]
    pub metadata_timeout_secs: u64,

    /// Wall-clock budget for `TestConnection` (seconds).
    #[serde(default = "default_connect_test_timeout")]
    pub connect_test_timeout_secs: u64,

    /// ssh `ConnectTimeout` used by `TestConnection` (seconds).
    #[serde(default = "default_test_connect_timeout")]
    pub test_connect_timeout_secs: u64,

    /// Wall-clock budget for `ListRemoteGames` (seconds).
    #[serde(default = "default_list_timeout")]
    pub list_timeout_secs: u64,

    /// ssh `ConnectTimeout` used by `ListRemoteGames` (seconds).
    #[serde(default = "default_list_connect_timeout")]
    pub list_connect_timeout_secs: u64,
}

fn default_rsync() -> String {
    "rsync".to_string()
}
fn default_ssh() -> String {
    "ssh".to_string()
}
fn default_sshpass() -> String {
    "sshpass".to_string()
}
fn default_content_timeout() -> u64 {
    30 * 60
}
fn default_metadata_timeout() -> u64 {
    60
}
fn default_connect_test_timeout() -> u64 {
    10
}
fn default_test_connect_timeout() -> u64 {
    5
}
fn default_list_timeout() -> u64 {
    120
}
fn default_list_connect_timeout() -> u64 {
    10
}

impl Default for TransferSettings {
    fn default() -> Self {
        TransferSettings {
            rsync_program: default_rsync(),
            rsync_extra_args: Vec::new(),
            ssh_program: default_ssh(),
            ssh_extra_args: Vec::new(),
            sshpass_program: default_sshpass(),
            content_timeout_secs: default_content_timeout(),
            metadata_timeout_secs: default_metadata_timeout(),
            connect_test_timeout_secs: default_connect_test_timeout(),
            test_connect_timeout_secs: default_test_connect_timeout(),
            list_timeout_secs: default_list_timeout(),
            list_connect_timeout_secs: default_list_connect_timeout(),
        }
    }
}

impl TransferSettings {
    pub fn content_timeout(&self) -> Duration {
        Duration::from_secs(self.content_timeout_secs)
    }

    pub fn metadata_timeout(&self) -> Duration {
        Duration::from_secs(self.metadata_timeout_secs)
    }

    pub fn connect_test_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_test_timeout_secs)
    }

    pub fn list_timeout(&self) -> Duration {
        Duration::from_secs(self.list_timeout_secs)
    }
}

// =============================================================================
// Environment Overrides
// =============================================================================

/// `TONTON_*` values captured once and layered over the settings file.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct EnvOverrides {
    vars: HashMap<String, String>,
}

impl EnvOverrides {
    /// Captures the override variables set in this process.
    pub fn from_env() -> Self {
        Self::from_pairs(
            OVERRIDE_VARS
                .iter()
                .filter_map(|key| std::env::var(key).ok().map(|value| (*key, value))),
        )
    }

    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        EnvOverrides {
            vars: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    /// The settings to persist when `submitted` is saved over `stored`.
    ///
    /// A submitted field that still carries its override value came from
    /// the environment, not from the user, so the stored value is kept.
    fn persisted_dto(&self, submitted: &SettingsDto, stored: &SettingsDto) -> SettingsDto {
        let pick = |key: &str, submitted: &str, stored: &str| -> String {
            match self.get(key) {
                Some(value) if value == submitted => {
                    debug!(key, "Keeping environment override out of the settings file");
                    stored.to_string()
                }
                _ => submitted.to_string(),
            }
        };

        SettingsDto {
            pc_address: pick(PC_ADDRESS_ENV, &submitted.pc_address, &stored.pc_address),
            pc_user: pick(PC_USER_ENV, &submitted.pc_user, &stored.pc_user),
            pc_secret: pick(PC_SECRET_ENV, &submitted.pc_secret, &stored.pc_secret),
            steam_path: pick(REMOTE_STEAM_PATH_ENV, &submitted.steam_path, &stored.steam_path),
        }
    }
}

impl std::fmt::Debug for EnvOverrides {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut keys: Vec<&str> = self.vars.keys().map(String::as_str).collect();
        keys.sort_unstable();
        f.debug_struct("EnvOverrides").field("keys", &keys).finish()
    }
}

// =============================================================================
// Main Configuration
// =============================================================================

/// Complete engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TonTonConfig {
    #[serde(default)]
    pub remote: RemoteSettings,

    #[serde(default)]
    pub local: LocalSettings,

    #[serde(default)]
    pub transfer: TransferSettings,
}

impl TonTonConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Settings file
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> SyncResult<Self> {
        let mut config = Self::load_file(config_path)?;
        config.apply_overrides(&EnvOverrides::from_env());
        config.validate()?;

        Ok(config)
    }

    /// Loads the settings file (or defaults) without environment overrides.
    pub fn load_file(config_path: Option<PathBuf>) -> SyncResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading settings from file");
                let contents = std::fs::read_to_string(&path)
                    .map_err(|e| SyncError::ConfigLoadFailed(e.to_string()))?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Settings file not found, using defaults");
            }
        }

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load settings: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Saves configuration to file with owner-only permissions.
    pub fn save(&self, config_path: Option<PathBuf>) -> SyncResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| SyncError::ConfigSaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| SyncError::ConfigSaveFailed(e.to_string()))?;
        }

        let contents = toml::to_string_pretty(self)?;
        write_private(&path, &contents).map_err(|e| SyncError::ConfigSaveFailed(e.to_string()))?;

        info!(?path, "Settings saved");
        Ok(())
    }

    /// Validates the configuration.
    ///
    /// Connection presence is not checked here; settings may legitimately be
    /// empty until the user configures them. See [`Self::require_connection`].
    pub fn validate(&self) -> SyncResult<()> {
        let t = &self.transfer;

        for (name, value) in [
            ("rsync_program", &t.rsync_program),
            ("ssh_program", &t.ssh_program),
            ("sshpass_program", &t.sshpass_program),
        ] {
            if value.trim().is_empty() {
                return Err(SyncError::InvalidConfig(format!("{} must not be empty", name)));
            }
        }

        for (name, value) in [
            ("content_timeout_secs", t.content_timeout_secs),
            ("metadata_timeout_secs", t.metadata_timeout_secs),
            ("connect_test_timeout_secs", t.connect_test_timeout_secs),
            ("test_connect_timeout_secs", t.test_connect_timeout_secs),
            ("list_timeout_secs", t.list_timeout_secs),
            ("list_connect_timeout_secs", t.list_connect_timeout_secs),
        ] {
            if value == 0 {
                return Err(SyncError::InvalidConfig(format!(
                    "{} must be greater than 0",
                    name
                )));
            }
        }

        if self.local.steam_path.trim().is_empty() {
            return Err(SyncError::InvalidConfig("local steam_path must not be empty".into()));
        }

        Ok(())
    }

    /// Returns the remote settings, or `MissingConnection` if host or user
    /// is unset.
    pub fn require_connection(&self) -> SyncResult<&RemoteSettings> {
        if self.remote.is_configured() {
            Ok(&self.remote)
        } else {
            Err(SyncError::MissingConnection)
        }
    }

    /// Layers environment overrides over this configuration.
    pub fn apply_overrides(&mut self, overrides: &EnvOverrides) {
        if let Some(address) = overrides.get(PC_ADDRESS_ENV) {
            debug!(address = %address, "Overriding PC address from environment");
            self.remote.address = address.to_string();
        }

        if let Some(user) = overrides.get(PC_USER_ENV) {
            debug!(user = %user, "Overriding PC user from environment");
            self.remote.user = user.to_string();
        }

        if let Some(secret) = overrides.get(PC_SECRET_ENV) {
            debug!("Overriding PC secret from environment");
            self.remote.secret = Secret::new(secret);
        }

        if let Some(path) = overrides.get(REMOTE_STEAM_PATH_ENV) {
            self.remote.steam_path = path.to_string();
        }

        if let Some(path) = overrides.get(LOCAL_STEAM_PATH_ENV) {
            self.local.steam_path = path.to_string();
        }

        if let Some(program) = overrides.get(RSYNC_ENV) {
            self.transfer.rsync_program = program.to_string();
        }

        if let Some(program) = overrides.get(SSH_ENV) {
            self.transfer.ssh_program = program.to_string();
        }

        if let Some(program) = overrides.get(SSHPASS_PROGRAM_ENV) {
            self.transfer.sshpass_program = program.to_string();
        }
    }

    /// Returns the default settings file path.
    pub fn default_config_path() -> Option<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
            if !path.is_empty() {
                return Some(PathBuf::from(path));
            }
        }

        directories::ProjectDirs::from("com", "tonton", "sync")
            .map(|dirs| dirs.config_dir().join("settings.toml"))
    }

    /// Directory holding the cross-process sync lock and status file.
    pub fn default_state_dir() -> Option<PathBuf> {
        if let Ok(path) = std::env::var(STATE_DIR_ENV) {
            if !path.is_empty() {
                return Some(PathBuf::from(path));
            }
        }

        directories::ProjectDirs::from("com", "tonton", "sync")
            .map(|dirs| dirs.data_local_dir().to_path_buf())
    }

    // =========================================================================
    // DTO Conversion
    // =========================================================================

    /// Connection settings as returned by `GetSettings`.
    pub fn to_dto(&self) -> SettingsDto {
        SettingsDto {
            pc_address: self.remote.address.clone(),
            pc_user: self.remote.user.clone(),
            pc_secret: self.remote.secret.expose().to_string(),
            steam_path: self.remote.steam_path.clone(),
        }
    }

    /// Replaces the connection settings with the ones submitted through
    /// `SaveSettings`.
    pub fn apply_dto(&mut self, dto: &SettingsDto) {
        self.remote.address = dto.pc_address.trim().to_string();
        self.remote.user = dto.pc_user.trim().to_string();
        self.remote.secret = Secret::new(dto.pc_secret.clone());
        self.remote.steam_path = if dto.steam_path.trim().is_empty() {
            default_steam_path()
        } else {
            dto.steam_path.trim().to_string()
        };
    }
}

#[cfg(unix)]
fn write_private(path: &Path, contents: &str) -> std::io::Result<()> {
    use std::io::Write;
    use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    // `mode` only applies on creation.
    file.set_permissions(std::fs::Permissions::from_mode(0o600))?;
    file.write_all(contents.as_bytes())?;
    file.sync_all()
}

#[cfg(not(unix))]
fn write_private(path: &Path, contents: &str) -> std::io::Result<()> {
    std::fs::write(path, contents)
}

// =============================================================================
// Settings Store
// =============================================================================

/// The loaded configuration plus where it lives on disk.
///
/// Two layers are kept: `stored` mirrors the settings file and `effective`
/// is `stored` with the environment overrides on top. Callers only ever see
/// `effective`; only `stored` is written back.
#[derive(Debug)]
pub struct SettingsStore {
    path: Option<PathBuf>,
    overrides: EnvOverrides,
    layers: RwLock<Layers>,
}

#[derive(Debug)]
struct Layers {
    stored: TonTonConfig,
    effective: TonTonConfig,
}

impl Layers {
    fn new(stored: TonTonConfig, overrides: &EnvOverrides) -> SyncResult<Self> {
        let mut effective = stored.clone();
        effective.apply_overrides(overrides);
        effective.validate()?;
        Ok(Layers { stored, effective })
    }
}

impl SettingsStore {
    /// Loads the settings file (or defaults) from `path`, falling back to the
    /// platform location, with this process's environment overrides.
    pub fn open(path: Option<PathBuf>) -> SyncResult<Self> {
        Self::open_with(path, EnvOverrides::from_env())
    }

    /// Like [`Self::open`] with explicit overrides.
    pub fn open_with(path: Option<PathBuf>, overrides: EnvOverrides) -> SyncResult<Self> {
        let path = path.or_else(TonTonConfig::default_config_path);
        let stored = TonTonConfig::load_file(path.clone())?;
        let layers = Layers::new(stored, &overrides)?;

        Ok(SettingsStore {
            path,
            overrides,
            layers: RwLock::new(layers),
        })
    }

    /// A store that never touches the file system.
    pub fn in_memory(config: TonTonConfig) -> Self {
        SettingsStore {
            path: None,
            overrides: EnvOverrides::default(),
            layers: RwLock::new(Layers {
                stored: config.clone(),
                effective: config,
            }),
        }
    }

    /// Settings file location, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// A copy of the configuration in effect.
    pub fn snapshot(&self) -> TonTonConfig {
        self.layers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .effective
            .clone()
    }

    /// Connection settings in effect.
    pub fn settings(&self) -> SettingsDto {
        self.layers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .effective
            .to_dto()
    }

    /// Validates, persists and applies new connection settings.
    ///
    /// The file is written first; the in-memory layers are swapped only once
    /// that succeeded. Values that came from environment overrides are not
    /// written.
    pub fn save_settings(&self, dto: &SettingsDto) -> SyncResult<()> {
        validate_settings(dto)?;

        let mut stored = self
            .layers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .stored
            .clone();
        let persisted = self.overrides.persisted_dto(dto, &stored.to_dto());
        stored.apply_dto(&persisted);
        let next = Layers::new(stored, &self.overrides)?;

        if let Some(path) = &self.path {
            next.stored.save(Some(path.clone()))?;
        }

        *self.layers.write().unwrap_or_else(PoisonError::into_inner) = next;
        if !self.overrides.is_empty() {
            debug!(overrides = ?self.overrides, "Environment overrides still apply");
        }
        info!(address = %dto.pc_address, user = %dto.pc_user, "Connection settings updated");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TonTonConfig::default();
        assert!(!config.remote.is_configured());
        assert_eq!(config.remote.steam_path, "~/.steam/steam");
        assert_eq!(config.transfer.content_timeout(), Duration::from_secs(1800));
        assert_eq!(config.transfer.metadata_timeout(), Duration::from_secs(60));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = TonTonConfig::default();

        config.transfer.content_timeout_secs = 0;
        assert!(config.validate().is_err());

        config.transfer.content_timeout_secs = 10;
        config.transfer.rsync_program = " ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_require_connection() {
        let mut config = TonTonConfig::default();
        let err = config.require_connection().unwrap_err();
        assert_eq!(err.to_string(), "Configure PC connection first");

        config.remote.address = "10.0.0.2".into();
        config.remote.user = "deck".into();
        assert_eq!(config.require_connection().unwrap().login(), "deck@10.0.0.2");
    }

    #[test]
    fn test_secret_is_redacted() {
        let secret = Secret::new("hunter2");
        let debug = format!("{:?}", secret);
        assert!(!debug.contains("hunter2"));

        let remote = RemoteSettings {
            secret,
            ..Default::default()
        };
        assert!(!format!("{:?}", remote).contains("hunter2"));
    }

    #[test]
    fn test_env_overrides() {
        let overrides = EnvOverrides::from_pairs([
            ("TONTON_PC_ADDRESS", "gaming-pc"),
            ("TONTON_PC_USER", "deck"),
            ("TONTON_RSYNC", "/usr/local/bin/rsync"),
        ]);

        let mut config = TonTonConfig::default();
        config.apply_overrides(&overrides);

        assert_eq!(config.remote.address, "gaming-pc");
        assert_eq!(config.remote.user, "deck");
        assert_eq!(config.transfer.rsync_program, "/usr/local/bin/rsync");
        assert_eq!(config.transfer.ssh_program, "ssh");
    }

    #[test]
    fn test_toml_serialization() {
        let mut config = TonTonConfig::default();
        config.remote.secret = Secret::new("pw");
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[remote]"));
        assert!(toml_str.contains("[transfer]"));
        assert!(toml_str.contains("secret = \"pw\""));

        let parsed: TonTonConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: TonTonConfig = toml::from_str("[remote]\naddress = \"pc\"\n").unwrap();
        assert_eq!(config.remote.address, "pc");
        assert_eq!(config.remote.steam_path, "~/.steam/steam");
        assert_eq!(config.transfer.list_timeout_secs, 120);
    }

    #[test]
    fn test_local_steamapps_dir() {
        let local = LocalSettings {
            steam_path: "/data/steam".into(),
        };
        assert_eq!(local.steamapps_dir().unwrap(), PathBuf::from("/data/steam/steamapps"));

        let home = LocalSettings::default().steamapps_dir().unwrap();
        assert!(home.is_absolute());
        assert!(home.ends_with(".steam/steam/steamapps"));
    }

    #[test]
    fn test_store_save_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.toml");
        let store = SettingsStore::open_with(Some(path.clone()), EnvOverrides::default()).unwrap();

        let dto = SettingsDto {
            pc_address: "192.168.1.20".into(),
            pc_user: "steam".into(),
            pc_secret: "pw".into(),
            steam_path: "~/.steam/steam".into(),
        };
        store.save_settings(&dto).unwrap();

        assert_eq!(store.settings(), dto);
        let reloaded = SettingsStore::open_with(Some(path.clone()), EnvOverrides::default()).unwrap();
        assert_eq!(reloaded.settings().pc_address, "192.168.1.20");

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }

    #[test]
    fn test_store_rejects_invalid_settings() {
        let store = SettingsStore::in_memory(TonTonConfig::default());
        let dto = SettingsDto {
            pc_address: "user@host".into(),
            pc_user: "steam".into(),
            pc_secret: String::new(),
            steam_path: "~/.steam/steam".into(),
        };

        assert!(store.save_settings(&dto).is_err());
        assert!(!store.snapshot().remote.is_configured());
    }

    fn overridden_store(dir: &Path) -> (PathBuf, SettingsStore) {
        let path = dir.join("settings.toml");
        std::fs::write(&path, "[remote]\naddress = \"10.0.0.2\"\nuser = \"deck\"\n").unwrap();

        let overrides = EnvOverrides::from_pairs([
            ("TONTON_PC_SECRET", "env-only-secret"),
            ("TONTON_RSYNC", "/opt/env/rsync"),
        ]);
        let store = SettingsStore::open_with(Some(path.clone()), overrides).unwrap();
        (path, store)
    }

    #[test]
    fn test_save_keeps_env_overrides_out_of_file() {
        let dir = tempfile::tempdir().unwrap();
        let (path, store) = overridden_store(dir.path());
        assert_eq!(store.settings().pc_secret, "env-only-secret");

        let mut dto = store.settings();
        dto.pc_address = "gaming-pc".into();
        store.save_settings(&dto).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("gaming-pc"));
        assert!(!written.contains("env-only-secret"));
        assert!(!written.contains("/opt/env/rsync"));

        let on_disk = TonTonConfig::load_file(Some(path)).unwrap();
        assert!(on_disk.remote.secret.is_empty());
        assert_eq!(on_disk.transfer.rsync_program, "rsync");

        let effective = store.snapshot();
        assert_eq!(effective.remote.address, "gaming-pc");
        assert_eq!(effective.remote.secret.expose(), "env-only-secret");
        assert_eq!(effective.transfer.rsync_program, "/opt/env/rsync");
    }

    #[test]
    fn test_save_persists_explicitly_changed_secret() {
        let dir = tempfile::tempdir().unwrap();
        let (path, store) = overridden_store(dir.path());

        let mut dto = store.settings();
        dto.pc_secret = "typed-by-user".into();
        store.save_settings(&dto).unwrap();

        let on_disk = TonTonConfig::load_file(Some(path)).unwrap();
        assert_eq!(on_disk.remote.secret.expose(), "typed-by-user");
        // The override still wins for this process.
        assert_eq!(store.settings().pc_secret, "env-only-secret");
    }

    #[test]
    fn test_overrides_debug_hides_values() {
        let overrides = EnvOverrides::from_pairs([("TONTON_PC_SECRET", "hunter2")]);
        let debug = format!("{:?}", overrides);
        assert!(debug.contains("TONTON_PC_SECRET"));
        assert!(!debug.contains("hunter2"));
    }
}
