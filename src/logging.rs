//! Logging setup for the salary ledger
//!
//! Console output goes to stderr so stdout stays reserved for the report. The
//! console filter defaults to `warn` and follows `RUST_LOG`. When a log
//! directory is configured, a second layer writes everything at the configured
//! file level to a daily-rotating file.
//!
//! ```no_run
//! use salary_ledger::config::LoggingConfig;
//! use salary_ledger::logging;
//!
//! logging::init(&LoggingConfig::default()).expect("Failed to initialize logging");
//! tracing::info!("Pipeline started");
//! ```

use crate::config::LoggingConfig;
use anyhow::{Context as _, Result};
use std::path::Path;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    EnvFilter, Layer as _, fmt, layer::SubscriberExt as _, util::SubscriberInitExt as _,
};

const LOG_FILE_PREFIX: &str = "salary-ledger";

/// Builds the console filter: `RUST_LOG` when set, `warn` otherwise.
///
/// # Errors
///
/// Returns error if the fallback directive cannot be parsed
pub fn console_filter() -> Result<EnvFilter> {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("warn"))
        .context("Failed to create env filter")
}

fn file_appender(log_dir: &Path) -> Result<RollingFileAppender> {
    if !log_dir.exists() {
        std::fs::create_dir_all(log_dir)
            .with_context(|| format!("Failed to create log directory: {}", log_dir.display()))?;
    }

    RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .max_log_files(10)
        .filename_prefix(LOG_FILE_PREFIX)
        .filename_suffix("log")
        .build(log_dir)
        .context("Failed to create log file appender")
}

/// Installs the global subscriber.
///
/// # Errors
///
/// Returns error if the log directory or appender cannot be created, or if a
/// filter directive is invalid
pub fn init(config: &LoggingConfig) -> Result<()> {
    let console_layer = fmt::layer()
        .with_target(true)
        .with_writer(std::io::stderr)
        .with_filter(console_filter()?);

    let file_layer = match &config.log_dir {
        Some(dir) => {
            let file_filter = EnvFilter::try_new(&config.file_level)
                .with_context(|| format!("Invalid file log level: {}", config.file_level))?;
            Some(
                fmt::layer()
                    .with_target(true)
                    .with_line_number(true)
                    .with_file(true)
                    .with_ansi(false)
                    .with_writer(file_appender(dir)?)
                    .with_filter(file_filter),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .init();

    if let Some(dir) = &config.log_dir {
        tracing::info!("Logging initialized, log directory: {}", dir.display());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_appender_creates_directory() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let log_dir = dir.path().join("nested").join("logs");
        let _appender = file_appender(&log_dir)?;
        assert!(log_dir.is_dir());
        Ok(())
    }
}
