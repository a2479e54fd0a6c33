//! # Remote Shell
//!
//! Short-lived ssh sessions against the PC: the connection test and the
//! installed-game listing.
//!
//! ```text
//!  TestConnection   ssh -o ConnectTimeout=5  user@pc echo ok        (10 s budget)
//!  ListRemoteGames  ssh -o ConnectTimeout=10 user@pc python3 - '<steam_path>'
//!                   └── stdin: scripts/list_games.py                 (120 s budget)
//! ```

use std::process::Stdio;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use tonton_core::library::{parse_game_list, total_size};
use tonton_core::RemoteGame;

use crate::command::{read_all, shell_quote, GroupChild, ToolChain};
use crate::config::{RemoteSettings, TonTonConfig, TransferSettings};
use crate::error::{SyncError, SyncResult};

/// Remote enumeration script, piped to `python3 -` on the PC.
pub const LIST_GAMES_SCRIPT: &str = include_str!("../scripts/list_games.py");

/// Sentinel echoed back by the connection test.
const SENTINEL: &str = "ok";

#[derive(Debug)]
struct RemoteOutput {
    code: Option<i32>,
    stdout: String,
    stderr: String,
}

impl RemoteOutput {
    fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// ssh access to the configured PC.
#[derive(Debug, Clone)]
pub struct RemoteShell {
    tools: ToolChain,
    remote: RemoteSettings,
    transfer: TransferSettings,
}

impl RemoteShell {
    /// Fails with `MissingConnection` if host or user is unset.
    pub fn new(config: &TonTonConfig) -> SyncResult<Self> {
        let remote = config.require_connection()?.clone();
        Ok(RemoteShell {
            tools: ToolChain::new(&config.transfer, &remote.secret),
            remote,
            transfer: config.transfer.clone(),
        })
    }

    /// Opens a session and expects `ok` back.
    ///
    /// Only the last non-empty stdout line is compared, so output from the
    /// remote login scripts does not fail the test.
    pub async fn test_connection(&self) -> SyncResult<()> {
        info!(host = %self.remote.address, user = %self.remote.user, "Testing connection");

        let output = self
            .run(
                &["echo".to_string(), SENTINEL.to_string()],
                self.transfer.test_connect_timeout_secs,
                self.transfer.connect_test_timeout(),
                None,
            )
            .await?;

        if !output.success() {
            let reason = non_empty_or(&output.stderr, "host unreachable or login rejected");
            warn!(code = ?output.code, reason = %reason, "Connection test failed");
            return Err(SyncError::ConnectionFailed(reason));
        }

        let reply = last_line(&output.stdout);
        if reply != SENTINEL {
            return Err(SyncError::ConnectionFailed(format!(
                "unexpected response: {}",
                reply
            )));
        }

        info!("Connection test succeeded");
        Ok(())
    }

    /// Runs the enumeration script on the PC and decodes its JSON output.
    pub async fn list_games(&self) -> SyncResult<Vec<RemoteGame>> {
        let args = vec![
            "python3".to_string(),
            "-".to_string(),
            shell_quote(&self.remote.steam_path),
        ];

        let output = self
            .run(
                &args,
                self.transfer.list_connect_timeout_secs,
                self.transfer.list_timeout(),
                Some(LIST_GAMES_SCRIPT),
            )
            .await?;

        if !output.success() {
            let reason = non_empty_or(&output.stderr, "Failed to fetch games");
            warn!(code = ?output.code, reason = %reason, "Game listing failed");
            return Err(SyncError::ConnectionFailed(reason));
        }

        let games = parse_game_list(&output.stdout).map_err(|e| {
            debug!(stdout = %output.stdout, "Unparseable game list");
            SyncError::from(e)
        })?;

        info!(
            count = games.len(),
            total_bytes = total_size(&games),
            "Found games on PC"
        );
        Ok(games)
    }

    async fn run(
        &self,
        remote_args: &[String],
        connect_timeout_secs: u64,
        budget: Duration,
        stdin: Option<&'static str>,
    ) -> SyncResult<RemoteOutput> {
        let spec = self.tools.ssh(&self.remote.login(), connect_timeout_secs, remote_args);
        debug!(
            program = %spec.program,
            args = %spec.display_args(),
            password_auth = spec.uses_password(),
            "Remote command"
        );

        let mut cmd = spec.to_command();
        if stdin.is_some() {
            cmd.stdin(Stdio::piped());
        }

        let mut child = GroupChild::spawn(&mut cmd).map_err(|e| SyncError::SpawnFailed {
            program: spec.program.clone(),
            reason: e.to_string(),
        })?;

        let leader = child.leader_mut();
        let (Some(stdout), Some(stderr)) = (leader.stdout.take(), leader.stderr.take()) else {
            return Err(SyncError::Internal("child output was not captured".into()));
        };
        let stdout_task = tokio::spawn(read_all(stdout));
        let stderr_task = tokio::spawn(read_all(stderr));

        if let (Some(input), Some(mut pipe)) = (stdin, child.leader_mut().stdin.take()) {
            tokio::spawn(async move {
                // The remote side may exit before reading everything.
                if let Err(e) = pipe.write_all(input.as_bytes()).await {
                    debug!(error = %e, "Remote stdin closed early");
                }
                let _ = pipe.shutdown().await;
            });
        }

        let collected = tokio::time::timeout(budget, async {
            let status = child.wait().await?;
            let stdout = stdout_task.await.unwrap_or_default();
            let stderr = stderr_task.await.unwrap_or_default();
            Ok::<_, std::io::Error>((status, stdout, stderr))
        })
        .await;

        let (status, stdout, stderr) = match collected {
            Ok(result) => result?,
            Err(_) => {
                warn!(timeout_secs = budget.as_secs(), "Remote command timed out, killing process group");
                if let Err(e) = child.kill().await {
                    debug!(error = %e, "Failed to kill remote command");
                }
                return Err(SyncError::ConnectionTimeout(budget.as_secs()));
            }
        };

        Ok(RemoteOutput {
            code: status.code(),
            stdout,
            stderr,
        })
    }
}

/// Last non-empty line of `stdout`, trimmed.
fn last_line(stdout: &str) -> &str {
    stdout
        .lines()
        .map(str::trim)
        .rfind(|line| !line.is_empty())
        .unwrap_or("")
}

fn non_empty_or(stderr: &str, fallback: &str) -> String {
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        fallback.to_string()
    } else {
        trimmed.to_string()
    }
}
