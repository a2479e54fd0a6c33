//! Shell-script stand-ins for rsync and ssh.
//!
//! Scripts are run through `/bin/sh <script>` rather than executed directly,
//! which sidesteps `ETXTBSY` when a freshly written file is spawned while
//! another test thread is forking. Every call appends its arguments to a log
//! so tests can count invocations.

use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::config::{LocalSettings, RemoteSettings, TonTonConfig, TransferSettings};

pub struct FakeTools {
    dir: TempDir,
}

impl FakeTools {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");
        let tools = FakeTools { dir };
        tools.rsync_script("exit 0");
        tools.ssh_script("exit 0");
        tools
    }

    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    /// Replaces the fake rsync body.
    pub fn rsync_script(&self, body: &str) {
        self.write_script("rsync.sh", "rsync.log", body);
    }

    /// Replaces the fake ssh body.
    pub fn ssh_script(&self, body: &str) {
        self.write_script("ssh.sh", "ssh.log", body);
    }

    /// Argument lines of every rsync call so far.
    pub fn rsync_calls(&self) -> Vec<String> {
        self.read_log("rsync.log")
    }

    /// Argument lines of every ssh call so far.
    pub fn ssh_calls(&self) -> Vec<String> {
        self.read_log("ssh.log")
    }

    /// Local Steam root used by [`Self::config`].
    pub fn local_steam(&self) -> PathBuf {
        self.dir().join("local-steam")
    }

    pub fn transfer_settings(&self) -> TransferSettings {
        TransferSettings {
            rsync_program: "/bin/sh".into(),
            rsync_extra_args: vec![self.script_path("rsync.sh")],
            ssh_program: "/bin/sh".into(),
            ssh_extra_args: vec![self.script_path("ssh.sh")],
            content_timeout_secs: 10,
            metadata_timeout_secs: 10,
            connect_test_timeout_secs: 10,
            list_timeout_secs: 10,
            ..Default::default()
        }
    }

    /// A connected configuration pointing at the fakes.
    pub fn config(&self) -> TonTonConfig {
        TonTonConfig {
            remote: RemoteSettings {
                address: "gaming-pc".into(),
                user: "deck".into(),
                ..Default::default()
            },
            local: LocalSettings {
                steam_path: self.local_steam().to_string_lossy().into_owned(),
            },
            transfer: self.transfer_settings(),
        }
    }

    fn script_path(&self, name: &str) -> String {
        self.dir().join(name).to_string_lossy().into_owned()
    }

    fn write_script(&self, name: &str, log: &str, body: &str) {
        let log = self.dir().join(log);
        let contents = format!(
            "#!/bin/sh\nprintf '%s\\n' \"$*\" >> '{}'\n{}\n",
            log.display(),
            body
        );
        std::fs::write(self.dir().join(name), contents).expect("write fake script");
    }

    fn read_log(&self, name: &str) -> Vec<String> {
        std::fs::read_to_string(self.dir().join(name))
            .map(|s| s.lines().map(str::to_string).collect())
            .unwrap_or_default()
    }
}
