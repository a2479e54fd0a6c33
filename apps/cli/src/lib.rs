//! # TonTon CLI Library
//!
//! Argument parsing, logging setup and output for the `tonton` binary.
//!
//! ## Module Organization
//! ```text
//! tonton_cli/
//! ├── lib.rs          ◄─── You are here (logging, run, output)
//! ├── cli.rs          ◄─── clap argument definitions
//! ├── commands/
//! │   ├── mod.rs      ◄─── Dispatch and JSON output
//! │   ├── settings.rs ◄─── settings show / set
//! │   ├── library.rs  ◄─── test-connection, list
//! │   └── sync.rs     ◄─── sync (with live ticker), status
//! └── error.rs        ◄─── CLI error type and exit codes
//! ```
//!
//! ## Output Streams
//! - stdout: exactly one JSON document per invocation
//! - stderr: tracing logs and the live sync ticker

pub mod cli;
pub mod commands;
pub mod error;

use clap::Parser;
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

use cli::Cli;
use error::EXIT_FAILURE;

/// Runs the CLI and returns the process exit code.
///
/// ## Sequence
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │  1. Parse arguments (clap exits with usage on error)                   │
/// │  2. Initialize logging to stderr                                        │
/// │     • Default: info,tonton=debug; RUST_LOG overrides                    │
/// │  3. Open settings and build the SyncService                            │
/// │  4. Execute the command, print JSON on stdout                          │
/// │  5. Exit 0 on success, 1 on reported failure, 2 on config/usage errors │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
pub async fn run() -> u8 {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    debug!(command = ?cli.command, "Starting tonton");

    match commands::execute(cli).await {
        Ok(output) => {
            println!("{}", output.rendered);
            if output.success {
                0
            } else {
                EXIT_FAILURE
            }
        }
        Err(e) => {
            error!(code = ?e.code, "{}", e.message);
            match serde_json::to_string_pretty(&e) {
                Ok(json) => println!("{}", json),
                Err(_) => println!("{{\"code\":\"INTERNAL\",\"message\":\"{}\"}}", e.message.escape_default()),
            }
            e.exit_code()
        }
    }
}

/// Initializes the tracing subscriber for structured logging.
///
/// ## Log Levels
/// - `RUST_LOG=debug` - Show debug messages
/// - `RUST_LOG=tonton=trace` - Show trace for tonton crates only
/// - Default: INFO, DEBUG for tonton crates (`--verbose`: TRACE)
pub fn init_tracing(verbose: bool) {
    let default = if verbose {
        "debug,tonton=trace"
    } else {
        "info,tonton=debug"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    // A second init (tests) is harmless.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
