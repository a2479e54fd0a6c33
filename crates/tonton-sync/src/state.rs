//! # Sync State Module
//!
//! The single record of the in-flight (or most recent) sync.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Sync State Architecture                           │
//! │                                                                         │
//! │  ┌──────────────────┐          ┌──────────────────────────────────┐    │
//! │  │  Orchestrator    │          │  GetSyncStatus callers (N)       │    │
//! │  │                  │          │                                  │    │
//! │  │  try_begin() ────┼──┐    ┌──┼── snapshot()                     │    │
//! │  │  SyncGuard       │  │    │  │   (whole-record clone)           │    │
//! │  │   record_event() │  ▼    ▼  │                                  │    │
//! │  │   finish()       │ ┌────────┴───────┐                          │    │
//! │  └──────────────────┘ │ RwLock         │                          │    │
//! │                       │  SyncStatus    │                          │    │
//! │                       └───────┬────────┘                          │    │
//! │                               │ shared stores only                     │
//! │                               ▼                                         │
//! │              <state dir>/sync.lock    flock held by the running sync   │
//! │              <state dir>/status.json  last published record            │
//! │                                                                         │
//! │  • Exactly one SyncGuard exists at a time (check-and-set under lock)   │
//! │  • Dropping the guard always returns the record to `syncing = false`   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The lock is a `std::sync::RwLock`: every critical section is a handful of
//! field writes and never spans an `.await`.
//!
//! A store created with [`SyncStateStore::shared`] extends single-flight to
//! every process using the same state directory. The running sync holds an
//! exclusive `flock` on `sync.lock` and publishes its record to
//! `status.json`; other processes read that file. A published run whose lock
//! is free again belonged to a process that died, and reads as interrupted.

use chrono::Utc;
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockWriteGuard};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use tonton_core::{SyncPhase, SyncStatus, TransferItemEvent, TransferItemKind};

use crate::error::{SyncError, SyncResult};

/// Lock file held for the duration of a sync.
pub const LOCK_FILE: &str = "sync.lock";

/// Published copy of the record.
pub const STATUS_FILE: &str = "status.json";

/// Minimum gap between two progress publications.
const PUBLISH_INTERVAL: Duration = Duration::from_millis(250);

const INTERRUPTED: &str = "Sync interrupted";

/// Shared handle to the sync record. Cheap to clone.
#[derive(Debug, Clone, Default)]
pub struct SyncStateStore {
    status: Arc<RwLock<SyncStatus>>,
    shared: Option<Arc<SharedRecord>>,
}

impl SyncStateStore {
    /// Creates an idle store private to this process.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an idle store coordinated through files in `dir`.
    pub fn shared(dir: impl Into<PathBuf>) -> Self {
        SyncStateStore {
            status: Arc::default(),
            shared: Some(Arc::new(SharedRecord::new(dir.into()))),
        }
    }

    /// Returns a consistent copy of the whole record.
    ///
    /// For a shared store that is not syncing itself, this is the record
    /// last published by any process.
    pub fn snapshot(&self) -> SyncStatus {
        let local = self.local();
        if local.syncing {
            return local;
        }

        match &self.shared {
            Some(shared) => shared.load().unwrap_or(local),
            None => local,
        }
    }

    /// Returns true while a sync holds the guard.
    pub fn is_syncing(&self) -> bool {
        self.snapshot().syncing
    }

    /// Atomically claims the record for `game`.
    ///
    /// Fails with `SyncInProgress` and leaves the record untouched if another
    /// sync is running, here or in another process sharing the state
    /// directory. On success the counters are reset and the returned guard is
    /// the only writer until it is finished or dropped.
    pub fn try_begin(&self, game: &str) -> SyncResult<SyncGuard> {
        let mut status = self.write();

        if status.syncing {
            let running = status.current_game.clone().unwrap_or_default();
            debug!(requested = %game, running = %running, "Rejecting concurrent sync");
            return Err(SyncError::SyncInProgress { game: running });
        }

        let lock = match &self.shared {
            Some(shared) => Some(shared.acquire(game)?),
            None => None,
        };

        *status = SyncStatus {
            syncing: true,
            current_game: Some(game.to_string()),
            phase: SyncPhase::ContentTransfer,
            started_at: Some(Utc::now()),
            ..SyncStatus::default()
        };
        drop(status);

        self.publish(true);
        Ok(SyncGuard {
            store: self.clone(),
            finished: false,
            _lock: lock,
        })
    }

    fn local(&self) -> SyncStatus {
        self.status
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn write(&self) -> RwLockWriteGuard<'_, SyncStatus> {
        self.status.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Copies the local record to the status file, throttled unless `force`.
    fn publish(&self, force: bool) {
        if let Some(shared) = &self.shared {
            if shared.due(force) {
                shared.store(&self.local());
            }
        }
    }
}

// =============================================================================
// Shared Record
// =============================================================================

/// Lock and status files of a shared store.
#[derive(Debug)]
struct SharedRecord {
    dir: PathBuf,
    last_publish: Mutex<Option<Instant>>,
}

impl SharedRecord {
    fn new(dir: PathBuf) -> Self {
        SharedRecord {
            dir,
            last_publish: Mutex::new(None),
        }
    }

    fn open_lock(&self) -> io::Result<File> {
        std::fs::create_dir_all(&self.dir)?;
        OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(self.dir.join(LOCK_FILE))
    }

    /// Takes the cross-process lock; it is held until the file is dropped.
    fn acquire(&self, game: &str) -> SyncResult<File> {
        let file = self.open_lock()?;

        match FileExt::try_lock_exclusive(&file) {
            Ok(()) => Ok(file),
            Err(e) if e.raw_os_error() == fs2::lock_contended_error().raw_os_error() => {
                let running = self
                    .read()
                    .and_then(|status| status.current_game)
                    .unwrap_or_else(|| "another process".to_string());
                debug!(requested = %game, running = %running, "Sync running in another process");
                Err(SyncError::SyncInProgress { game: running })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Returns true if the lock is held by some sync.
    fn lock_held(&self) -> bool {
        let Ok(file) = self.open_lock() else {
            return true;
        };

        match FileExt::try_lock_shared(&file) {
            Ok(()) => {
                let _ = FileExt::unlock(&file);
                false
            }
            Err(_) => true,
        }
    }

    fn due(&self, force: bool) -> bool {
        let mut last = self.last_publish.lock().unwrap_or_else(PoisonError::into_inner);
        let now = Instant::now();
        let due = force || last.map_or(true, |at| now.duration_since(at) >= PUBLISH_INTERVAL);
        if due {
            *last = Some(now);
        }
        due
    }

    fn store(&self, status: &SyncStatus) {
        if let Err(e) = self.write(status) {
            warn!(dir = %self.dir.display(), error = %e, "Failed to publish sync status");
        }
    }

    /// Writes through a temp file and a rename so readers never see half a
    /// record.
    fn write(&self, status: &SyncStatus) -> io::Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        let json = serde_json::to_vec_pretty(status).map_err(io::Error::from)?;
        let temp = self
            .dir
            .join(format!(".{}.{}.tmp", STATUS_FILE, std::process::id()));
        std::fs::write(&temp, json)?;
        std::fs::rename(&temp, self.dir.join(STATUS_FILE))
    }

    fn read(&self) -> Option<SyncStatus> {
        let bytes = std::fs::read(self.dir.join(STATUS_FILE)).ok()?;
        serde_json::from_slice(&bytes)
            .map_err(|e| debug!(error = %e, "Ignoring unreadable status file"))
            .ok()
    }

    /// The published record. A run whose owner is gone reads as interrupted.
    fn load(&self) -> Option<SyncStatus> {
        let mut status = self.read()?;
        if status.syncing && !self.lock_held() {
            debug!(game = ?status.current_game, "Published sync has no owner");
            status.syncing = false;
            status.current_file = None;
            status.phase = SyncPhase::Done;
            status.last_error.get_or_insert_with(|| INTERRUPTED.to_string());
        }
        Some(status)
    }
}

// =============================================================================
// Sync Guard
// =============================================================================

/// Exclusive write access to the sync record for one run.
#[derive(Debug)]
pub struct SyncGuard {
    store: SyncStateStore,
    finished: bool,
    // Released after `Drop::drop` has published the terminal record.
    _lock: Option<File>,
}

impl SyncGuard {
    /// Moves the record to `phase`.
    pub fn set_phase(&self, phase: SyncPhase) {
        self.store.write().phase = phase;
        self.store.publish(true);
    }

    /// Folds one parsed itemize event into the record.
    ///
    /// Only `FileTransferred` events change the counters.
    pub fn record_event(&self, event: &TransferItemEvent) {
        if event.kind == TransferItemKind::FileTransferred {
            {
                let mut status = self.store.write();
                status.files_done += 1;
                status.current_file = Some(event.path.clone());
            }
            self.store.publish(false);
        }
    }

    /// Shows `file` as the item currently being transferred.
    pub fn set_current_file(&self, file: impl Into<String>) {
        self.store.write().current_file = Some(file.into());
        self.store.publish(false);
    }

    /// Files recorded so far in this run.
    pub fn files_done(&self) -> u64 {
        self.store
            .status
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .files_done
    }

    /// Commits the terminal outcome and releases the record.
    ///
    /// Returns the final transferred-file count.
    pub fn finish(mut self, error: Option<String>) -> u64 {
        self.finished = true;
        self.release(error)
    }

    fn release(&self, error: Option<String>) -> u64 {
        let files_done = {
            let mut status = self.store.write();
            status.syncing = false;
            status.current_file = None;
            status.phase = SyncPhase::Done;
            status.finished_at = Some(Utc::now());
            status.last_error = error;
            status.files_done
        };
        self.store.publish(true);
        files_done
    }
}

impl Drop for SyncGuard {
    fn drop(&mut self) {
        if !self.finished {
            warn!("Sync ended without a terminal outcome, releasing state");
            self.release(Some(INTERRUPTED.to_string()));
        }
    }
}
