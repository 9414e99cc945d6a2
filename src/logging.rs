//! Logging configuration using the tracing ecosystem.
//!
//! Log records go to a daily rotated file so stdout stays free for report
//! rows. With `--verbose` they are mirrored to stderr, next to the report
//! summary. The level is taken from `RUST_LOG` when set.

use std::path::PathBuf;

use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

/// Default log level if RUST_LOG is not set.
const DEFAULT_LOG_FILTER: &str = "jira_reports=info,warn";

/// Default log level with `--verbose` if RUST_LOG is not set.
const VERBOSE_LOG_FILTER: &str = "jira_reports=debug,warn";

fn default_filter(verbose: bool) -> &'static str {
    if verbose {
        VERBOSE_LOG_FILTER
    } else {
        DEFAULT_LOG_FILTER
    }
}

/// Initialize the logging system.
///
/// # Log Directory
///
/// Logs are stored in the platform-specific local data directory:
/// - Linux: `~/.local/share/jira-reports/logs/`
/// - macOS: `~/Library/Application Support/jira-reports/logs/`
/// - Windows: `C:\Users\<User>\AppData\Local\jira-reports\logs\`
///
/// When `verbose` is set, records are also written to stderr and the default
/// level drops to debug.
///
/// # Log Levels
///
/// - `RUST_LOG=jira_reports=debug` - Request and page details
/// - `RUST_LOG=jira_reports=trace,reqwest=debug` - Everything
///
/// # Errors
///
/// Returns an error if the log directory cannot be determined or created,
/// or if a global subscriber is already set.
///
/// # Example
///
/// ```no_run
/// use jira_reports::logging;
///
/// logging::init(false).expect("Failed to initialize logging");
/// ```
pub fn init(verbose: bool) -> anyhow::Result<()> {
    let log_dir = get_log_directory()?;
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = RollingFileAppender::new(Rotation::DAILY, &log_dir, "jira-reports.log");

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(verbose)));

    let stderr_layer = verbose.then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .compact()
    });

    let subscriber = tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(file_appender)
                .with_ansi(false)
                .with_target(true)
                .with_file(true)
                .with_line_number(true),
        )
        .with(stderr_layer)
        .with(filter);

    tracing::subscriber::set_global_default(subscriber)?;

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "jira-reports starting up");
    tracing::debug!(log_dir = %log_dir.display(), "Log directory");

    Ok(())
}

fn get_log_directory() -> anyhow::Result<PathBuf> {
    let base_dir = dirs::data_local_dir()
        .ok_or_else(|| anyhow::anyhow!("Could not determine local data directory"))?;

    Ok(base_dir.join("jira-reports").join("logs"))
}

/// Get the path where logs are stored.
pub fn log_directory() -> Option<PathBuf> {
    get_log_directory().ok()
}
