//! # Validation Module
//!
//! Input validation for sync requests and connection settings.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Frontend / CLI                                               │
//! │  └── Basic presence checks                                             │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE                                                  │
//! │  ├── game_name is one path component (it becomes a local directory)    │
//! │  └── app_id is numeric or "unknown" (it becomes a file name)           │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: rsync / ssh                                                  │
//! │  └── Host reachability, permissions, remote path existence             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use crate::error::ValidationError;
use crate::types::{GameSyncRequest, SettingsDto};
use crate::UNKNOWN_APP_ID;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Longest install directory name accepted (ext4 file name limit).
pub const MAX_GAME_NAME_LEN: usize = 255;

// =============================================================================
// Request Validators
// =============================================================================

/// Validates a game install directory name.
///
/// ## Rules
/// - Must not be empty
/// - Must be a single path component: no `/`, `\`, NUL, and not `.`/`..`
/// - At most 255 bytes
///
/// ## Example
/// ```rust
/// use tonton_core::validation::validate_game_name;
///
/// assert!(validate_game_name("Hollow Knight").is_ok());
/// assert!(validate_game_name("../etc").is_err());
/// ```
pub fn validate_game_name(name: &str) -> ValidationResult<()> {
    if name.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "game_name".to_string(),
        });
    }

    if name.len() > MAX_GAME_NAME_LEN {
        return Err(ValidationError::TooLong {
            field: "game_name".to_string(),
            max: MAX_GAME_NAME_LEN,
        });
    }

    if name == "." || name == ".." {
        return Err(ValidationError::InvalidFormat {
            field: "game_name".to_string(),
            reason: "must not be a relative directory reference".to_string(),
        });
    }

    if name.contains(['/', '\\', '\0']) {
        return Err(ValidationError::InvalidFormat {
            field: "game_name".to_string(),
            reason: "must be a single directory name".to_string(),
        });
    }

    Ok(())
}

/// Validates a Steam app id.
///
/// ## Rules
/// - `"unknown"` is accepted (no manifest will be copied)
/// - Otherwise ASCII digits only
pub fn validate_app_id(app_id: &str) -> ValidationResult<()> {
    if app_id == UNKNOWN_APP_ID {
        return Ok(());
    }

    if app_id.is_empty() || !app_id.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ValidationError::InvalidFormat {
            field: "app_id".to_string(),
            reason: format!("must be numeric or '{}'", UNKNOWN_APP_ID),
        });
    }

    Ok(())
}

/// Validates a whole sync request.
pub fn validate_request(request: &GameSyncRequest) -> ValidationResult<()> {
    validate_game_name(&request.game_name)?;
    validate_app_id(&request.app_id)
}

// =============================================================================
// Settings Validators
// =============================================================================

/// Validates a host address.
///
/// Whitespace and `@`/`:` are rejected because the address is spliced into
/// `user@host:path`.
pub fn validate_address(address: &str) -> ValidationResult<()> {
    if address.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "pc_address".to_string(),
        });
    }

    if address.contains(|c: char| c.is_whitespace() || c == '@' || c == ':' || c == '/') {
        return Err(ValidationError::InvalidFormat {
            field: "pc_address".to_string(),
            reason: "must be a bare host name or IPv4 address".to_string(),
        });
    }

    Ok(())
}

/// Validates an ssh user name.
pub fn validate_user(user: &str) -> ValidationResult<()> {
    if user.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "pc_user".to_string(),
        });
    }

    if user.contains(|c: char| c.is_whitespace() || c == '@' || c == ':') {
        return Err(ValidationError::InvalidFormat {
            field: "pc_user".to_string(),
            reason: "must not contain whitespace, '@' or ':'".to_string(),
        });
    }

    Ok(())
}

/// Validates settings submitted through `SaveSettings`.
///
/// Address and user may both be left empty (clearing the connection); if
/// either is given, both must be valid. The secret is free-form.
pub fn validate_settings(settings: &SettingsDto) -> ValidationResult<()> {
    if settings.pc_address.is_empty() && settings.pc_user.is_empty() {
        return Ok(());
    }

    validate_address(&settings.pc_address)?;
    validate_user(&settings.pc_user)?;

    if settings.steam_path.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "steam_path".to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_game_name() {
        assert!(validate_game_name("Hades").is_ok());
        assert!(validate_game_name("Baldur's Gate 3").is_ok());
        assert!(validate_game_name("").is_err());
        assert!(validate_game_name("   ").is_err());
        assert!(validate_game_name("..").is_err());
        assert!(validate_game_name(".").is_err());
        assert!(validate_game_name("a/b").is_err());
        assert!(validate_game_name("a\\b").is_err());
        assert!(validate_game_name(&"x".repeat(300)).is_err());
    }

    #[test]
    fn test_validate_app_id() {
        assert!(validate_app_id("1145360").is_ok());
        assert!(validate_app_id("unknown").is_ok());
        assert!(validate_app_id("").is_err());
        assert!(validate_app_id("12a").is_err());
        assert!(validate_app_id("1;rm -rf").is_err());
    }

    #[test]
    fn test_validate_address() {
        assert!(validate_address("192.168.1.20").is_ok());
        assert!(validate_address("gaming-pc.local").is_ok());
        assert!(validate_address("").is_err());
        assert!(validate_address("user@host").is_err());
        assert!(validate_address("host:22").is_err());
    }

    #[test]
    fn test_validate_settings_allows_clearing() {
        let cleared = SettingsDto {
            steam_path: "~/.steam/steam".to_string(),
            ..Default::default()
        };
        assert!(validate_settings(&cleared).is_ok());

        let half = SettingsDto {
            pc_address: "10.0.0.2".to_string(),
            steam_path: "~/.steam/steam".to_string(),
            ..Default::default()
        };
        assert!(validate_settings(&half).is_err());
    }

    #[test]
    fn test_validate_request() {
        assert!(validate_request(&GameSyncRequest::new("Game X", "unknown")).is_ok());
        assert!(validate_request(&GameSyncRequest::new("../x", "1")).is_err());
    }
}
