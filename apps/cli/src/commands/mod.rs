//! # Commands
//!
//! One module per command group. Every command produces an [`Output`]: the
//! JSON printed on stdout and whether the operation succeeded.

pub mod library;
pub mod settings;
pub mod sync;

use serde::Serialize;
use tonton_sync::SyncService;

use crate::cli::{Cli, Commands, SettingsAction};
use crate::error::Result;

/// What a command prints.
#[derive(Debug, Clone)]
pub struct Output {
    pub rendered: String,
    pub success: bool,
}

impl Output {
    pub fn new<T: Serialize>(value: &T, success: bool) -> Result<Self> {
        Ok(Output {
            rendered: serde_json::to_string_pretty(value)?,
            success,
        })
    }
}

/// Opens the service and runs the parsed command.
pub async fn execute(cli: Cli) -> Result<Output> {
    let service = SyncService::open(cli.config)?;

    match cli.command {
        Commands::Settings { action } => match action {
            SettingsAction::Show { reveal } => settings::show(&service, reveal),
            SettingsAction::Set {
                address,
                user,
                secret,
                secret_stdin,
                steam_path,
            } => {
                let secret = if secret_stdin {
                    Some(settings::read_secret(std::io::stdin().lock())?)
                } else {
                    secret
                };
                let changes = settings::SettingsChanges {
                    address,
                    user,
                    secret,
                    steam_path,
                };
                settings::set(&service, changes)
            }
        },
        Commands::TestConnection => library::test_connection(&service).await,
        Commands::List => library::list(&service).await,
        Commands::Sync { game, app_id } => sync::sync(service, &game, &app_id).await,
        Commands::Status => sync::status(&service),
    }
}
