//! Tracing subscriber setup

use anyhow::Result;
use std::path::Path;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub const LOG_FILE_PREFIX: &str = "airfare-client.log";

fn filter(default_directive: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive))
}

/// Log to a daily rolling file so output never interleaves with the terminal session
pub fn init_file_logging(log_dir: &Path) -> Result<()> {
    std::fs::create_dir_all(log_dir)?;
    let file_appender = tracing_appender::rolling::daily(log_dir, LOG_FILE_PREFIX);

    tracing_subscriber::registry()
        .with(filter("airfare_client=debug,info"))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(file_appender)
                .with_ansi(false)
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .json(),
        )
        .try_init()?;

    info!(log_dir = %log_dir.display(), "Logging initialized");
    debug!("Debug logging is enabled");
    Ok(())
}

/// Compact stderr logging for one-shot commands
pub fn init_stderr_logging(verbose: bool) -> Result<()> {
    let default_directive = if verbose { "airfare_client=debug,info" } else { "airfare_client=warn" };

    tracing_subscriber::registry()
        .with(filter(default_directive))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .compact(),
        )
        .try_init()?;

    Ok(())
}
