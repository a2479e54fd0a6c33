//! # External Tool Command Lines
//!
//! Builds `rsync` and `ssh` invocations from the transfer settings.
//!
//! ```text
//!  password set:   sshpass -e rsync -az --itemize-changes -e "ssh -o StrictHostKeyChecking=no" SRC DST
//!                  └── SSHPASS=<secret> in the child environment only
//!
//!  no password:    rsync -az --itemize-changes -e "ssh -o StrictHostKeyChecking=no -o BatchMode=yes" SRC DST
//! ```
//!
//! The secret never appears in an argument vector; `BatchMode=yes` makes
//! key-only setups fail fast instead of prompting on a terminal nobody reads.
//!
//! ## Process Groups
//! ```text
//!  tonton
//!    └── sshpass        ◄── group leader (pgid = its pid)
//!          └── rsync
//!                └── ssh    (holds the network connection)
//! ```
//! Every spawned tool leads its own process group. Killing a [`GroupChild`]
//! signals the whole group, so no `ssh` is left behind when the leader dies.

use std::ffi::{OsStr, OsString};
use std::io;
use std::process::{ExitStatus, Stdio};

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tracing::debug;

use crate::config::{Secret, TransferSettings};

/// Environment variable `sshpass -e` reads the password from.
pub const SSHPASS_ENV: &str = "SSHPASS";

// =============================================================================
// Command Spec
// =============================================================================

/// A fully resolved invocation, ready to spawn.
#[derive(Debug, Clone)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<OsString>,
    secret: Option<Secret>,
}

impl CommandSpec {
    /// Builds a tokio command with stdout/stderr piped and stdin closed.
    ///
    /// On unix the child starts a new process group; spawn it through
    /// [`GroupChild::spawn`] so the group is killed with it.
    pub fn to_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        #[cfg(unix)]
        cmd.process_group(0);

        if let Some(secret) = &self.secret {
            cmd.env(SSHPASS_ENV, secret.expose());
        }

        cmd
    }

    /// Returns true if the invocation authenticates through sshpass.
    pub fn uses_password(&self) -> bool {
        self.secret.is_some()
    }

    /// Arguments rendered for logs.
    pub fn display_args(&self) -> String {
        self.args
            .iter()
            .map(|a| a.to_string_lossy())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

// =============================================================================
// Group Child
// =============================================================================

/// A spawned tool together with everything it forked.
///
/// Dropping a `GroupChild` whose leader was never reaped kills the group.
#[derive(Debug)]
pub struct GroupChild {
    child: Child,
    reaped: bool,
}

impl GroupChild {
    pub fn spawn(cmd: &mut Command) -> io::Result<Self> {
        Ok(GroupChild {
            child: cmd.spawn()?,
            reaped: false,
        })
    }

    /// The group leader, for taking its pipes.
    pub fn leader_mut(&mut self) -> &mut Child {
        &mut self.child
    }

    /// Waits for the leader to exit.
    pub async fn wait(&mut self) -> io::Result<ExitStatus> {
        let status = self.child.wait().await?;
        self.reaped = true;
        Ok(status)
    }

    /// Kills every process in the group, then reaps the leader.
    pub async fn kill(&mut self) -> io::Result<()> {
        self.signal_group();
        let result = self.child.kill().await;
        self.reaped = true;
        result
    }

    #[cfg(unix)]
    fn signal_group(&self) {
        // `id()` is None once the leader was reaped; its pgid may be reused.
        let Some(pid) = self.child.id() else {
            return;
        };
        let Ok(pgid) = libc::pid_t::try_from(pid) else {
            return;
        };

        // SAFETY: killpg only sends a signal; no memory is shared.
        let rc = unsafe { libc::killpg(pgid, libc::SIGKILL) };
        if rc != 0 {
            debug!(pgid, error = %io::Error::last_os_error(), "killpg failed");
        }
    }

    #[cfg(not(unix))]
    fn signal_group(&self) {}
}

impl Drop for GroupChild {
    fn drop(&mut self) {
        if !self.reaped {
            self.signal_group();
        }
    }
}

/// Reads `reader` to the end, lossily decoded.
pub(crate) async fn read_all<R: AsyncRead + Unpin>(mut reader: R) -> String {
    let mut buf = Vec::new();
    if let Err(e) = reader.read_to_end(&mut buf).await {
        debug!(error = %e, "Failed to read process output");
    }
    String::from_utf8_lossy(&buf).into_owned()
}

// =============================================================================
// Tool Chain
// =============================================================================

/// Knows how to call rsync and ssh for one set of credentials.
#[derive(Debug, Clone)]
pub struct ToolChain {
    transfer: TransferSettings,
    secret: Secret,
}

impl ToolChain {
    pub fn new(transfer: &TransferSettings, secret: &Secret) -> Self {
        ToolChain {
            transfer: transfer.clone(),
            secret: secret.clone(),
        }
    }

    /// `rsync -az --itemize-changes -e <ssh> <source> <destination>`.
    pub fn rsync(&self, source: &str, destination: &OsStr) -> CommandSpec {
        let mut args: Vec<OsString> = self
            .transfer
            .rsync_extra_args
            .iter()
            .map(OsString::from)
            .collect();

        let remote_shell = std::iter::once(self.transfer.ssh_program.as_str())
            .chain(self.transfer.ssh_extra_args.iter().map(String::as_str))
            .map(rsync_quote)
            .chain(self.ssh_options())
            .collect::<Vec<_>>()
            .join(" ");

        args.extend(
            ["-az", "--itemize-changes", "-e"]
                .into_iter()
                .map(OsString::from),
        );
        args.push(remote_shell.into());
        args.push(source.into());
        args.push(destination.to_os_string());

        self.wrap(&self.transfer.rsync_program, args)
    }

    /// `ssh <options> -o ConnectTimeout=<n> <login> <remote args...>`.
    ///
    /// `remote_args` are concatenated by the remote shell, so callers must
    /// quote anything that is not a literal word.
    pub fn ssh(&self, login: &str, connect_timeout_secs: u64, remote_args: &[String]) -> CommandSpec {
        let mut args: Vec<OsString> = self
            .transfer
            .ssh_extra_args
            .iter()
            .map(OsString::from)
            .collect();

        args.extend(self.ssh_options().into_iter().map(OsString::from));
        args.push("-o".into());
        args.push(format!("ConnectTimeout={}", connect_timeout_secs).into());
        args.push(login.into());
        args.extend(remote_args.iter().map(OsString::from));

        self.wrap(&self.transfer.ssh_program, args)
    }

    fn ssh_options(&self) -> Vec<String> {
        let mut options = vec!["-o".to_string(), "StrictHostKeyChecking=no".to_string()];
        if self.secret.is_empty() {
            options.push("-o".to_string());
            options.push("BatchMode=yes".to_string());
        }
        options
    }

    fn wrap(&self, program: &str, args: Vec<OsString>) -> CommandSpec {
        if self.secret.is_empty() {
            return CommandSpec {
                program: program.to_string(),
                args,
                secret: None,
            };
        }

        let mut wrapped: Vec<OsString> = vec!["-e".into(), program.into()];
        wrapped.extend(args);

        CommandSpec {
            program: self.transfer.sshpass_program.clone(),
            args: wrapped,
            secret: Some(self.secret.clone()),
        }
    }
}

// =============================================================================
// Quoting
// =============================================================================

/// Quotes `value` for a POSIX shell.
///
/// ```rust
/// use tonton_sync::command::shell_quote;
///
/// assert_eq!(shell_quote("~/.steam/steam"), "'~/.steam/steam'");
/// assert_eq!(shell_quote("it's"), r#"'it'\''s'"#);
/// ```
pub fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r#"'\''"#))
}

/// Quotes one word of rsync's `-e` string.
///
/// rsync splits that string on spaces and honours single or double quotes,
/// but not backslashes.
fn rsync_quote(word: &str) -> String {
    if !word.is_empty() && !word.contains(|c: char| c.is_whitespace() || c == '\'' || c == '"') {
        word.to_string()
    } else if !word.contains('\'') {
        format!("'{}'", word)
    } else {
        format!("\"{}\"", word)
    }
}
