//! # Itemize Parser
//!
//! Classifies rsync `--itemize-changes` output, one line at a time.
//!
//! ## Line Format
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  YXcstpoguax path/to/entry                                              │
//! │  ││                                                                     │
//! │  │└── X: entry type   f = file, d = directory, L = symlink, ...         │
//! │  └─── Y: update type  > = received, < = sent, c = created locally,      │
//! │                       . = unchanged, * = message (e.g. *deleting)       │
//! │                                                                         │
//! │  >f+++++++++ data/a.bin    ──► FileTransferred  "data/a.bin"            │
//! │  cd+++++++++ data/         ──► DirectoryNoticed "data/"                 │
//! │  sending incremental ...   ──► Unrecognized                             │
//! │  (empty)                   ──► no event                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The parser is stateless per line. Feeding the same line twice yields two
//! events and counts twice; nothing is deduplicated. Byte counts are never
//! read, so no percentage or ETA can be derived from this module.

use serde::{Deserialize, Serialize};

/// Prefixes that mean "a regular file was transferred".
pub const FILE_CODES: [&str; 3] = [">f", "<f", "cf"];

/// Prefixes that mean "a directory entry was touched".
pub const DIRECTORY_CODES: [&str; 2] = [">d", "cd"];

// =============================================================================
// Events
// =============================================================================

/// Classification of one itemize line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferItemKind {
    FileTransferred,
    DirectoryNoticed,
    Unrecognized,
}

/// One parsed output line.
///
/// For `Unrecognized` lines `path` holds the whole (trimmed) line so it can be
/// logged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferItemEvent {
    pub kind: TransferItemKind,
    pub path: String,
}

impl TransferItemEvent {
    fn new(kind: TransferItemKind, path: impl Into<String>) -> Self {
        TransferItemEvent {
            kind,
            path: path.into(),
        }
    }

    /// Returns true if this event counts towards `files_done`.
    pub fn is_file(&self) -> bool {
        self.kind == TransferItemKind::FileTransferred
    }
}

// =============================================================================
// Classification
// =============================================================================

/// Classifies a single line of itemize output.
///
/// Returns `None` for blank lines. Never panics: lines without a whitespace
/// separator after the code come back as `Unrecognized`.
///
/// ## Example
/// ```rust
/// use tonton_core::itemize::{parse_line, TransferItemKind};
///
/// let event = parse_line(">f+++++++++ data/a.bin").unwrap();
/// assert_eq!(event.kind, TransferItemKind::FileTransferred);
/// assert_eq!(event.path, "data/a.bin");
///
/// assert!(parse_line("   ").is_none());
/// ```
pub fn parse_line(line: &str) -> Option<TransferItemEvent> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    let kind = if FILE_CODES.iter().any(|code| line.starts_with(code)) {
        TransferItemKind::FileTransferred
    } else if DIRECTORY_CODES.iter().any(|code| line.starts_with(code)) {
        TransferItemKind::DirectoryNoticed
    } else {
        return Some(TransferItemEvent::new(TransferItemKind::Unrecognized, line));
    };

    match line.split_once(char::is_whitespace) {
        Some((_code, path)) if !path.is_empty() => Some(TransferItemEvent::new(kind, path)),
        _ => Some(TransferItemEvent::new(TransferItemKind::Unrecognized, line)),
    }
}

// =============================================================================
// Progress Tally
// =============================================================================

/// Running totals over a stream of itemize lines.
///
/// The sync engine keeps one per content transfer and mirrors the file
/// counters into its shared state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgressTally {
    /// Number of `FileTransferred` events seen.
    pub files_done: u64,

    /// Path of the most recent `FileTransferred` event.
    pub current_file: Option<String>,

    /// Every directory noticed, in order.
    pub directories: Vec<String>,

    /// Number of non-blank lines that matched no known code.
    pub unrecognized: u64,
}

impl ProgressTally {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses `line` and folds the event into the totals.
    pub fn feed(&mut self, line: &str) -> Option<TransferItemEvent> {
        let event = parse_line(line)?;
        self.apply(&event);
        Some(event)
    }

    /// Folds an already-parsed event into the totals.
    pub fn apply(&mut self, event: &TransferItemEvent) {
        match event.kind {
            TransferItemKind::FileTransferred => {
                self.files_done += 1;
                self.current_file = Some(event.path.clone());
            }
            TransferItemKind::DirectoryNoticed => {
                self.directories.push(event.path.clone());
            }
            TransferItemKind::Unrecognized => {
                self.unrecognized += 1;
            }
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
