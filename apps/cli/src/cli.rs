//! CLI argument parsing using clap derive

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// TonTon - Copy games from your PC to this device
#[derive(Parser, Debug)]
#[command(name = "tonton")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Settings file (defaults to the platform config directory)
    #[arg(long, global = true, env = "TONTON_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable debug logging on stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// The command to run
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Show or change the PC connection
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },

    /// Check that the PC accepts an ssh session
    TestConnection,

    /// List games installed on the PC
    List,

    /// Copy one game (and its manifest) from the PC
    ///
    /// Examples:
    ///   tonton sync "Hollow Knight" --app-id 367520
    ///   tonton sync "Some Game"          # no manifest copied
    Sync {
        /// Install directory name under steamapps/common
        game: String,

        /// Steam app id; omit when unknown
        #[arg(long, default_value = "unknown")]
        app_id: String,
    },

    /// Print the sync status snapshot
    Status,
}

/// Settings subcommands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum SettingsAction {
    /// Print the current settings
    Show {
        /// Include the password in the output
        #[arg(long)]
        reveal: bool,
    },

    /// Update the connection settings
    Set {
        /// PC host name or IP address
        #[arg(long)]
        address: Option<String>,

        /// SSH user on the PC
        #[arg(long)]
        user: Option<String>,

        /// SSH password (visible to other local users; prefer --secret-stdin)
        #[arg(long, conflicts_with = "secret_stdin")]
        secret: Option<String>,

        /// Read the SSH password from the first line of stdin
        #[arg(long)]
        secret_stdin: bool,

        /// Steam root on the PC
        #[arg(long)]
        steam_path: Option<String>,
    },
}
