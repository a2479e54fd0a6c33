//! # Sync Commands
//!
//! `tonton sync <game>` runs a full game sync and prints a live ticker on
//! stderr while rsync works:
//!
//! ```text
//! [Hades] content: 42 files, Hades/Content/pack3.pak
//! [Hades] manifest
//! [Hades] done: 318 files
//! ```
//!
//! `tonton status` prints the status snapshot shared by every `tonton`
//! process, so it shows the progress of a sync running in another terminal.
//! Ctrl-C during `sync` kills rsync and releases the sync lock.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use tonton_core::{SyncPhase, SyncStatus};
use tonton_sync::{SyncEventEmitter, SyncService};

use tracing::warn;

use super::Output;
use crate::error::{CliError, Result};

/// Minimum gap between two ticker lines within one phase.
const TICK_INTERVAL: Duration = Duration::from_millis(250);

/// Renders one ticker line.
pub fn format_status(status: &SyncStatus) -> String {
    let game = status.current_game.as_deref().unwrap_or("-");
    match status.phase {
        SyncPhase::Idle => "idle".to_string(),
        SyncPhase::ContentTransfer => match status.current_file.as_deref() {
            Some(file) => format!("[{}] content: {} files, {}", game, status.files_done, file),
            None => format!("[{}] content: {} files", game, status.files_done),
        },
        SyncPhase::MetadataTransfer => format!("[{}] manifest", game),
        SyncPhase::Done => match status.last_error.as_deref() {
            Some(error) => format!("[{}] failed after {} files: {}", game, status.files_done, error),
            None => format!("[{}] done: {} files", game, status.files_done),
        },
    }
}

/// Prints throttled progress lines on stderr.
///
/// Phase changes are always printed.
pub struct StderrTicker {
    last: Mutex<Option<(Instant, SyncPhase)>>,
}

impl StderrTicker {
    pub fn new() -> Self {
        StderrTicker {
            last: Mutex::new(None),
        }
    }

    /// Returns true if a status in `phase` at `now` should be printed.
    fn should_print(&self, phase: SyncPhase, now: Instant) -> bool {
        let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
        let due = match *last {
            Some((at, previous)) => previous != phase || now.duration_since(at) >= TICK_INTERVAL,
            None => true,
        };
        if due {
            *last = Some((now, phase));
        }
        due
    }
}

impl Default for StderrTicker {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncEventEmitter for StderrTicker {
    fn emit_status(&self, status: &SyncStatus) {
        if self.should_print(status.phase, Instant::now()) {
            eprintln!("{}", format_status(status));
        }
    }

    fn emit_warning(&self, message: &str) {
        eprintln!("warning: {}", message);
    }
}

pub async fn sync(service: SyncService, game: &str, app_id: &str) -> Result<Output> {
    let service = service.with_emitter(Arc::new(StderrTicker::new()));
    tokio::select! {
        result = service.sync_game(game, app_id) => Output::new(&result, result.success),
        _ = tokio::signal::ctrl_c() => {
            warn!(game, "Sync interrupted");
            Err(CliError::interrupted("Sync interrupted"))
        }
    }
}

pub fn status(service: &SyncService) -> Result<Output> {
    Output::new(&service.get_sync_status(), true)
}
