//! # Transfer Invoker
//!
//! Runs one rsync transfer and streams its itemize output line by line.
//!
//! ## Process Wiring
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Transfer Process                                 │
//! │                                                                         │
//! │   ┌───────────────┐  stdout   ┌──────────────┐  mpsc   ┌─────────────┐ │
//! │   │ [sshpass -e]  │──────────►│ reader task  │────────►│ drive()     │ │
//! │   │ rsync -az     │           │ (lossy UTF-8)│ (256)   │             │ │
//! │   │ --itemize-... │  stderr   ┌──────────────┐         └─────────────┘ │
//! │   │               │──────────►│ stderr task  │──► TransferFailed.stderr │
//! │   └───────────────┘           └──────────────┘                         │
//! │           ▲                                                             │
//! │           └── whole process group killed when the budget runs out      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The reader decodes lossily so a file name that is not valid UTF-8 never
//! stops the drain and never lets the pipe fill up.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::command::{read_all, GroupChild, ToolChain};
use crate::error::{SyncError, SyncResult};

/// Output lines buffered between the reader task and the consumer.
const LINE_CHANNEL_CAPACITY: usize = 256;

/// How long to wait for stderr to close after the process exited.
const STDERR_GRACE: Duration = Duration::from_secs(2);

// =============================================================================
// Transfer Job
// =============================================================================

/// Which half of a game sync a transfer belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferKind {
    /// The game's install directory tree.
    Content,
    /// The single app manifest file.
    Metadata,
}

impl std::fmt::Display for TransferKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransferKind::Content => write!(f, "content"),
            TransferKind::Metadata => write!(f, "metadata"),
        }
    }
}

/// One source/destination pair.
#[derive(Debug, Clone)]
pub struct TransferJob {
    pub kind: TransferKind,
    /// `user@host:path` on the PC.
    pub source: String,
    /// Local directory (content) or file (metadata).
    pub destination: PathBuf,
    pub timeout: Duration,
}

impl TransferJob {
    /// A directory transfer. The contents of `source` land inside `destination`.
    pub fn content(source: impl Into<String>, destination: impl Into<PathBuf>, timeout: Duration) -> Self {
        TransferJob {
            kind: TransferKind::Content,
            source: source.into(),
            destination: destination.into(),
            timeout,
        }
    }

    /// A single-file transfer to exactly `destination`.
    pub fn metadata(source: impl Into<String>, destination: impl Into<PathBuf>, timeout: Duration) -> Self {
        TransferJob {
            kind: TransferKind::Metadata,
            source: source.into(),
            destination: destination.into(),
            timeout,
        }
    }

    /// Directory that has to exist before rsync starts.
    pub fn local_dir(&self) -> Option<&Path> {
        match self.kind {
            TransferKind::Content => Some(&self.destination),
            TransferKind::Metadata => self.destination.parent(),
        }
    }

    /// The destination as rsync should see it.
    ///
    /// Directory transfers get a trailing slash so rsync copies into the
    /// directory rather than nesting another level.
    fn destination_arg(&self) -> PathBuf {
        match self.kind {
            TransferKind::Content => self.destination.join(""),
            TransferKind::Metadata => self.destination.clone(),
        }
    }
}

// =============================================================================
// Transfer Invoker
// =============================================================================

/// Spawns rsync transfers for one set of credentials.
#[derive(Debug, Clone)]
pub struct TransferInvoker {
    tools: ToolChain,
}

impl TransferInvoker {
    pub fn new(tools: ToolChain) -> Self {
        TransferInvoker { tools }
    }

    /// Creates the local destination directory and starts rsync.
    pub async fn spawn(&self, job: &TransferJob) -> SyncResult<TransferHandle> {
        if let Some(dir) = job.local_dir() {
            tokio::fs::create_dir_all(dir).await?;
        }

        let spec = self.tools.rsync(&job.source, job.destination_arg().as_os_str());
        info!(
            kind = %job.kind,
            source = %job.source,
            destination = %job.destination.display(),
            timeout_secs = job.timeout.as_secs(),
            "Starting transfer"
        );
        debug!(
            program = %spec.program,
            args = %spec.display_args(),
            password_auth = spec.uses_password(),
            "Transfer command"
        );

        let mut child = GroupChild::spawn(&mut spec.to_command()).map_err(|e| SyncError::SpawnFailed {
            program: spec.program.clone(),
            reason: e.to_string(),
        })?;

        let stdout = child
            .leader_mut()
            .stdout
            .take()
            .ok_or_else(|| SyncError::Internal("child stdout was not captured".into()))?;
        let stderr = child
            .leader_mut()
            .stderr
            .take()
            .ok_or_else(|| SyncError::Internal("child stderr was not captured".into()))?;

        let (tx, rx) = mpsc::channel(LINE_CHANNEL_CAPACITY);
        let stdout_task = tokio::spawn(forward_lines(stdout, tx));
        let stderr_task = tokio::spawn(read_all(stderr));

        Ok(TransferHandle {
            kind: job.kind,
            child,
            lines: rx,
            stdout_task,
            stderr_task,
            timeout: job.timeout,
        })
    }
}

/// Sends each stdout line to `tx`, stripping the line terminator.
///
/// Keeps draining after the receiver is gone so the child never blocks on a
/// full pipe.
async fn forward_lines<R: AsyncRead + Unpin>(reader: R, tx: mpsc::Sender<String>) {
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    let mut receiver_alive = true;

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                if !receiver_alive {
                    continue;
                }
                let line = String::from_utf8_lossy(&buf)
                    .trim_end_matches(['\n', '\r'])
                    .to_string();
                if tx.send(line).await.is_err() {
                    receiver_alive = false;
                }
            }
            Err(e) => {
                warn!(error = %e, "Failed to read transfer output");
                break;
            }
        }
    }
}

// =============================================================================
// Transfer Handle
// =============================================================================

/// A running transfer.
///
/// Dropping the handle kills the process group.
#[derive(Debug)]
pub struct TransferHandle {
    kind: TransferKind,
    child: GroupChild,
    lines: mpsc::Receiver<String>,
    stdout_task: JoinHandle<()>,
    stderr_task: JoinHandle<String>,
    timeout: Duration,
}

/// How a transfer that exited with status 0 ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferExit {
    /// Output lines consumed.
    pub lines: u64,
    /// Whatever rsync wrote to stderr (warnings, usually empty).
    pub stderr: String,
}

impl TransferHandle {
    /// Waits for the process to exit, discarding its output.
    pub async fn wait(self) -> SyncResult<TransferExit> {
        self.drive(|_| {}).await
    }

    /// Feeds every stdout line to `on_line` in arrival order and waits for
    /// the process to exit.
    ///
    /// The whole run, draining included, is bounded by the job's timeout.
    /// When it runs out the process group is killed and `TransferTimeout`
    /// is returned. A non-zero exit becomes `TransferFailed` carrying stderr.
    pub async fn drive<F>(self, mut on_line: F) -> SyncResult<TransferExit>
    where
        F: FnMut(&str),
    {
        let TransferHandle {
            kind,
            mut child,
            mut lines,
            stdout_task,
            stderr_task,
            timeout,
        } = self;

        let mut consumed = 0u64;
        let outcome = tokio::time::timeout(timeout, async {
            while let Some(line) = lines.recv().await {
                consumed += 1;
                on_line(&line);
                tokio::task::yield_now().await;
            }
            child.wait().await
        })
        .await;

        let status = match outcome {
            Ok(status) => status?,
            Err(_) => {
                warn!(kind = %kind, timeout_secs = timeout.as_secs(), "Transfer timed out, killing process group");
                if let Err(e) = child.kill().await {
                    warn!(kind = %kind, error = %e, "Failed to kill transfer process");
                }
                stdout_task.abort();
                stderr_task.abort();
                return Err(SyncError::TransferTimeout { timeout });
            }
        };

        // Anything still buffered belongs to the finished run.
        drop(lines);
        let stderr = match tokio::time::timeout(STDERR_GRACE, stderr_task).await {
            Ok(Ok(stderr)) => stderr,
            _ => String::new(),
        };
        stdout_task.abort();

        if status.success() {
            debug!(kind = %kind, lines = consumed, "Transfer finished");
            Ok(TransferExit {
                lines: consumed,
                stderr,
            })
        } else {
            warn!(kind = %kind, code = ?status.code(), stderr = %stderr.trim(), "Transfer failed");
            Err(SyncError::TransferFailed {
                exit_code: status.code(),
                stderr,
            })
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::config::Secret;
    use crate::testing::FakeTools;

    fn invoker(tools: &FakeTools) -> TransferInvoker {
        TransferInvoker::new(ToolChain::new(&tools.transfer_settings(), &Secret::default()))
    }

    #[tokio::test]
    async fn test_streams_lines_in_order() {
        let tools = FakeTools::new();
        tools.rsync_script(
            r#"printf '>f+++++++++ a\n'
printf 'cd+++++++++ d/\n'
printf '>f+++++++++ b\n'"#,
        );

        let dest = tools.dir().join("out");
        let job = TransferJob::content("deck@pc:src/", &dest, Duration::from_secs(10));
        let handle = invoker(&tools).spawn(&job).await.unwrap();

        let mut seen = Vec::new();
        let exit = handle.drive(|line| seen.push(line.to_string())).await.unwrap();

        assert_eq!(seen, vec![">f+++++++++ a", "cd+++++++++ d/", ">f+++++++++ b"]);
        assert_eq!(exit.lines, 3);
        assert!(dest.is_dir());
    }

    #[tokio::test]
    async fn test_wait_drains_output() {
        let tools = FakeTools::new();
        tools.rsync_script("echo first; echo second; echo warning >&2");

        let job = TransferJob::content("deck@pc:src/", tools.dir().join("out"), Duration::from_secs(10));
        let exit = invoker(&tools).spawn(&job).await.unwrap().wait().await.unwrap();

        assert_eq!(exit.lines, 2);
        assert_eq!(exit.stderr.trim(), "warning");
    }

    #[tokio::test]
    async fn test_non_zero_exit_carries_stderr() {
        let tools = FakeTools::new();
        tools.rsync_script("echo 'rsync: connection unexpectedly closed' >&2; exit 12");

        let job = TransferJob::content("deck@pc:src/", tools.dir().join("out"), Duration::from_secs(10));
        let err = invoker(&tools).spawn(&job).await.unwrap().wait().await.unwrap_err();

        match err {
            SyncError::TransferFailed { exit_code, stderr } => {
                assert_eq!(exit_code, Some(12));
                assert!(stderr.contains("connection unexpectedly closed"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_timeout_kills_process() {
        let tools = FakeTools::new();
        tools.rsync_script("echo started; exec sleep 30");

        let job = TransferJob::content("deck@pc:src/", tools.dir().join("out"), Duration::from_millis(300));
        let started = std::time::Instant::now();
        let err = invoker(&tools).spawn(&job).await.unwrap().wait().await.unwrap_err();

        assert!(matches!(err, SyncError::TransferTimeout { .. }));
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    /// True while `pid` exists and is not a zombie.
    #[cfg(target_os = "linux")]
    fn process_alive(pid: &str) -> bool {
        match std::fs::read_to_string(format!("/proc/{}/stat", pid)) {
            // State follows the parenthesised command name.
            Ok(stat) => stat
                .rsplit_once(')')
                .map(|(_, rest)| !rest.trim_start().starts_with('Z'))
                .unwrap_or(false),
            Err(_) => false,
        }
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_timeout_kills_forked_children() {
        let tools = FakeTools::new();
        let pid_file = tools.dir().join("grandchild.pid");
        tools.rsync_script(&format!(
            "sleep 41 &\necho $! > '{}'\necho started\nwait",
            pid_file.display()
        ));

        let job = TransferJob::content("deck@pc:src/", tools.dir().join("out"), Duration::from_millis(500));
        let err = invoker(&tools).spawn(&job).await.unwrap().wait().await.unwrap_err();
        assert!(matches!(err, SyncError::TransferTimeout { .. }));

        let pid = std::fs::read_to_string(&pid_file).unwrap();
        let pid = pid.trim();
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while process_alive(pid) && std::time::Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        assert!(!process_alive(pid), "forked sleep {} survived the timeout", pid);
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_dropped_handle_kills_forked_children() {
        let tools = FakeTools::new();
        let pid_file = tools.dir().join("grandchild.pid");
        tools.rsync_script(&format!(
            "sleep 43 &\necho $! > '{}'\necho started\nwait",
            pid_file.display()
        ));

        let job = TransferJob::content("deck@pc:src/", tools.dir().join("out"), Duration::from_secs(30));
        let handle = invoker(&tools).spawn(&job).await.unwrap();

        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while !pid_file.exists() && std::time::Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
        drop(handle);

        let pid = std::fs::read_to_string(&pid_file).unwrap();
        let pid = pid.trim();
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while process_alive(pid) && std::time::Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        assert!(!process_alive(pid), "forked sleep {} survived the drop", pid);
    }

    #[tokio::test]
    async fn test_invalid_utf8_does_not_stop_reader() {
        let tools = FakeTools::new();
        tools.rsync_script(r#"printf '>f+++++++++ caf\351.txt\n>f+++++++++ next.txt\n'"#);

        let job = TransferJob::content("deck@pc:src/", tools.dir().join("out"), Duration::from_secs(10));
        let mut seen = Vec::new();
        invoker(&tools)
            .spawn(&job)
            .await
            .unwrap()
            .drive(|line| seen.push(line.to_string()))
            .await
            .unwrap();

        assert_eq!(seen.len(), 2);
        assert_eq!(seen[1], ">f+++++++++ next.txt");
    }

    #[tokio::test]
    async fn test_metadata_creates_parent_only() {
        let tools = FakeTools::new();
        tools.rsync_script("exit 0");

        let dest = tools.dir().join("steamapps").join("appmanifest_1.acf");
        let job = TransferJob::metadata("deck@pc:m.acf", &dest, Duration::from_secs(10));
        invoker(&tools).spawn(&job).await.unwrap().wait().await.unwrap();

        assert!(dest.parent().unwrap().is_dir());
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn test_missing_program_is_spawn_failure() {
        let transfer = crate::config::TransferSettings {
            rsync_program: "/nonexistent/rsync".into(),
            ..Default::default()
        };
        let dir = tempfile::tempdir().unwrap();
        let invoker = TransferInvoker::new(ToolChain::new(&transfer, &Secret::default()));
        let job = TransferJob::content("a:b/", dir.path().join("out"), Duration::from_secs(5));

        let err = invoker.spawn(&job).await.unwrap_err();
        assert!(matches!(err, SyncError::SpawnFailed { .. }));
    }
}
