/*!
 * Logging and tracing initialization
 *
 * Appends and verifications emit flat `tracing` events (the core opens no
 * spans). The filter honors `CUSTODIA_LOG`, then `RUST_LOG`, then the
 * configured level. File logging writes JSON lines in append mode: a
 * traceability tool must never truncate its own log history on restart.
 */

use std::fs::OpenOptions;
use std::path::Path;

use tracing::{debug, Level};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::CoreConfig;
use crate::error::{CustodiaError, Result};

const FILTER_ENV: &str = "CUSTODIA_LOG";

/// Initialize structured logging based on configuration
pub fn init_logging(config: &CoreConfig) -> Result<()> {
    let log_level = if config.verbose {
        Level::DEBUG
    } else {
        config.log_level.to_tracing_level()
    };

    let env_filter = EnvFilter::try_from_env(FILTER_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .or_else(|_| EnvFilter::try_new(format!("custodia={}", log_level)))
        .map_err(|e| CustodiaError::Config(format!("Failed to create log filter: {}", e)))?;

    if let Some(ref log_path) = config.log_file {
        init_file_logging(log_path, env_filter)?;
    } else {
        init_stdout_logging(env_filter);
    }

    debug!(
        version = crate::VERSION,
        db_path = %config.db_path.display(),
        "logging initialized"
    );
    Ok(())
}

/// Compact human-readable events on stdout, for interactive CLI use.
fn init_stdout_logging(env_filter: EnvFilter) {
    let fmt_layer = fmt::layer()
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .compact();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}

/// JSON lines appended to a file, one event per line, for ingestion by
/// external log tooling.
fn init_file_logging(log_path: &Path, env_filter: EnvFilter) -> Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)
        .map_err(|e| CustodiaError::Config(format!("Failed to open log file: {}", e)))?;

    let fmt_layer = fmt::layer()
        .with_writer(file)
        .with_target(true)
        .with_ansi(false)
        .json();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();

    Ok(())
}
