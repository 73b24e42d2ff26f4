//! # Salary Ledger Entry Point
//!
//! ```text
//! main()
//!   │
//!   ├─> Parse CLI arguments (clap)
//!   ├─> Load config (--config / SALARY_LEDGER_CONFIG, else defaults)
//!   ├─> Install tracing subscriber
//!   └─> Run the command on a current-thread Tokio runtime
//!       (no command means `run`)
//! ```
//!
//! ```bash
//! salary-ledger                      # load salaries.csv into salarios.db and report
//! salary-ledger run --input data.csv --no-preview
//! salary-ledger report --path composed
//! ```

#![warn(clippy::all, rust_2018_idioms)]
#![expect(clippy::print_stdout)] // Allow println! in main binary

mod cli;

use anyhow::Result;
use clap::Parser as _;
use salary_ledger::config::LedgerConfig;
use salary_ledger::logging;

/// # Errors
///
/// Returns error if the config cannot be loaded, logging cannot be set up, or
/// the command fails
fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    let config = LedgerConfig::load(cli.config.as_deref())?;
    logging::init(&config.logging)?;

    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?
        .block_on(cli::run_command(cli.command.unwrap_or_default(), config))
}
