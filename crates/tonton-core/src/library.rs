//! # Remote Library
//!
//! Decoding of the game list printed by the remote enumeration script.
//!
//! The script prints a single JSON array on stdout:
//! ```json
//! [{"name": "Hades", "app_id": "1145360", "size_bytes": 15032385536}]
//! ```
//! Anything else is a parse failure, reported as a value and never a panic.

use crate::error::{CoreError, CoreResult};
use crate::types::RemoteGame;

/// Parses the enumeration script's stdout.
///
/// Leading lines that are not part of the JSON (login banners, MOTD) are
/// skipped: decoding starts at the last line that opens an array.
///
/// ## Example
/// ```rust
/// use tonton_core::library::parse_game_list;
///
/// let games = parse_game_list(r#"[{"name":"Hades","app_id":"1145360","size_bytes":10}]"#).unwrap();
/// assert_eq!(games[0].name, "Hades");
///
/// assert!(parse_game_list("python3: command not found").is_err());
/// ```
pub fn parse_game_list(stdout: &str) -> CoreResult<Vec<RemoteGame>> {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        return Err(CoreError::InvalidGameList("empty output".to_string()));
    }

    let payload = trimmed
        .lines()
        .rev()
        .find(|line| line.trim_start().starts_with('['))
        .map(str::trim)
        .unwrap_or(trimmed);

    serde_json::from_str::<Vec<RemoteGame>>(payload)
        .map_err(|e| CoreError::InvalidGameList(e.to_string()))
}

/// Total size of a listing, in bytes.
pub fn total_size(games: &[RemoteGame]) -> u64 {
    games.iter().map(|g| g.size_bytes).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::UNKNOWN_APP_ID;

    #[test]
    fn test_parse_valid_list() {
        let out = r#"[
            {"name": "Hades", "app_id": "1145360", "size_bytes": 100},
            {"name": "Celeste", "app_id": "unknown", "size_bytes": 50}
        ]"#;
        let games = parse_game_list(out).unwrap();

        assert_eq!(games.len(), 2);
        assert_eq!(games[1].app_id, UNKNOWN_APP_ID);
        assert_eq!(total_size(&games), 150);
    }

    #[test]
    fn test_parse_empty_array() {
        assert!(parse_game_list("[]\n").unwrap().is_empty());
    }

    #[test]
    fn test_banner_before_json_is_skipped() {
        let out = "Welcome to Ubuntu\n[{\"name\": \"Hades\", \"app_id\": \"1\", \"size_bytes\": 1}]\n";
        let games = parse_game_list(out).unwrap();
        assert_eq!(games[0].name, "Hades");
    }

    #[test]
    fn test_missing_fields_take_defaults() {
        let games = parse_game_list(r#"[{"name": "Mystery"}]"#).unwrap();
        assert_eq!(games[0].app_id, UNKNOWN_APP_ID);
        assert_eq!(games[0].size_bytes, 0);
    }

    #[test]
    fn test_malformed_output_is_error() {
        for out in ["", "not json", "{\"name\": \"x\"}", "[{\"size_bytes\": 1}]", "[1, 2"] {
            let err = parse_game_list(out).unwrap_err();
            assert!(matches!(err, CoreError::InvalidGameList(_)), "{out}");
        }
    }
}
