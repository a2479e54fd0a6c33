//! # Settings Commands
//!
//! ```text
//!  tonton settings show [--reveal]
//!  tonton settings set [--address A] [--user U] [--secret S | --secret-stdin] [--steam-path P]
//! ```
//!
//! `set` only changes the fields that were given.

use std::io::BufRead;

use tonton_core::SettingsDto;
use tonton_sync::SyncService;
use tracing::info;

use super::Output;
use crate::error::{CliError, Result};

/// Shown instead of a stored password.
pub const SECRET_MASK: &str = "********";

/// Fields to change; `None` keeps the stored value.
#[derive(Debug, Clone, Default)]
pub struct SettingsChanges {
    pub address: Option<String>,
    pub user: Option<String>,
    pub secret: Option<String>,
    pub steam_path: Option<String>,
}

impl SettingsChanges {
    fn is_empty(&self) -> bool {
        self.address.is_none()
            && self.user.is_none()
            && self.secret.is_none()
            && self.steam_path.is_none()
    }
}

/// Applies `changes` on top of `current`.
pub fn merge(current: SettingsDto, changes: SettingsChanges) -> SettingsDto {
    SettingsDto {
        pc_address: changes.address.unwrap_or(current.pc_address),
        pc_user: changes.user.unwrap_or(current.pc_user),
        pc_secret: changes.secret.unwrap_or(current.pc_secret),
        steam_path: changes.steam_path.unwrap_or(current.steam_path),
    }
}

/// Replaces a non-empty password with [`SECRET_MASK`].
pub fn masked(mut settings: SettingsDto) -> SettingsDto {
    if !settings.pc_secret.is_empty() {
        settings.pc_secret = SECRET_MASK.to_string();
    }
    settings
}

/// Reads a password from the first line of `input`.
pub fn read_secret(mut input: impl BufRead) -> Result<String> {
    let mut line = String::new();
    input.read_line(&mut line)?;
    Ok(line.trim_end_matches(['\n', '\r']).to_string())
}

pub fn show(service: &SyncService, reveal: bool) -> Result<Output> {
    let settings = service.get_settings();
    let settings = if reveal { settings } else { masked(settings) };
    Output::new(&settings, true)
}

pub fn set(service: &SyncService, changes: SettingsChanges) -> Result<Output> {
    if changes.is_empty() {
        return Err(CliError::usage("Nothing to change: pass at least one setting"));
    }

    let updated = merge(service.get_settings(), changes);
    service.settings_store().save_settings(&updated)?;

    if let Some(path) = service.settings_store().path() {
        info!(path = %path.display(), "Settings written");
    }
    Output::new(&masked(updated), true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tonton_sync::TonTonConfig;

    fn current() -> SettingsDto {
        SettingsDto {
            pc_address: "10.0.0.2".into(),
            pc_user: "deck".into(),
            pc_secret: "pw".into(),
            steam_path: "~/.steam/steam".into(),
        }
    }

    #[test]
    fn test_merge_keeps_unspecified_fields() {
        let merged = merge(
            current(),
            SettingsChanges {
                address: Some("gaming-pc".into()),
                ..Default::default()
            },
        );
        assert_eq!(merged.pc_address, "gaming-pc");
        assert_eq!(merged.pc_user, "deck");
        assert_eq!(merged.pc_secret, "pw");
    }

    #[test]
    fn test_masking() {
        assert_eq!(masked(current()).pc_secret, SECRET_MASK);
        let keyless = SettingsDto {
            pc_secret: String::new(),
            ..current()
        };
        assert_eq!(masked(keyless).pc_secret, "");
    }

    #[test]
    fn test_read_secret_first_line() {
        let secret = read_secret("hunter2\r\nignored\n".as_bytes()).unwrap();
        assert_eq!(secret, "hunter2");
    }

    #[test]
    fn test_set_requires_a_change() {
        let service = SyncService::in_memory(TonTonConfig::default());
        let err = set(&service, SettingsChanges::default()).unwrap_err();
        assert_eq!(err.exit_code(), crate::error::EXIT_CONFIG);
    }

    #[test]
    fn test_set_and_show() {
        let service = SyncService::in_memory(TonTonConfig::default());
        let output = set(
            &service,
            SettingsChanges {
                address: Some("10.0.0.2".into()),
                user: Some("deck".into()),
                secret: Some("pw".into()),
                steam_path: None,
            },
        )
        .unwrap();
        assert!(output.success);
        assert!(!output.rendered.contains("\"pw\""));

        let shown = show(&service, true).unwrap();
        assert!(shown.rendered.contains("\"pw\""));
        assert_eq!(service.get_settings().steam_path, "~/.steam/steam");
    }

    #[test]
    fn test_set_rejects_invalid_address() {
        let service = SyncService::in_memory(TonTonConfig::default());
        let err = set(
            &service,
            SettingsChanges {
                address: Some("user@host".into()),
                user: Some("deck".into()),
                ..Default::default()
            },
        )
        .unwrap_err();
        assert_eq!(err.code, tonton_core::SyncErrorKind::InvalidInput);
    }
}
