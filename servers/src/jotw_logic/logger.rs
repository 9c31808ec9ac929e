use anyhow::Result;
use glob::glob;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

const LOG_FILE_PREFIX: &str = "server_jotw";
/// Daily files kept on startup, newest first.
const LOG_FILES_KEPT: usize = 7;

/// Console plus JSON daily-rolling file logging.
///
/// The returned guard flushes the non-blocking file writer; keep it alive
/// until the process exits.
pub fn setup_logging(log_dir: &Path, log_level: &str) -> Result<WorkerGuard> {
    if !log_dir.exists() {
        fs::create_dir_all(log_dir)?;
    }

    let file_appender = rolling::daily(log_dir, LOG_FILE_PREFIX);
    let (non_blocking_appender, guard) = non_blocking(file_appender);

    let console_layer = fmt::layer().with_target(true).with_ansi(true);

    let file_layer = fmt::layer()
        .with_ansi(false)
        .with_writer(non_blocking_appender)
        .json();

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()?;

    info!("Logging initialized with level: {}", log_level);
    cleanup_old_logs(log_dir, LOG_FILES_KEPT);
    Ok(guard)
}

/// Deletes all but the `keep` newest log files (daily file names sort by date).
/// Today's file, just opened by the appender, is always among them.
fn cleanup_old_logs(log_dir: &Path, keep: usize) {
    let pattern = format!("{}/{}.*", log_dir.display(), LOG_FILE_PREFIX);
    let mut log_files: Vec<PathBuf> = match glob(&pattern) {
        Ok(paths) => paths.filter_map(|entry| entry.ok()).collect(),
        Err(e) => {
            warn!("Invalid log glob pattern {}: {}", pattern, e);
            return;
        }
    };

    log_files.sort_by(|a, b| b.file_name().cmp(&a.file_name()));

    for old_file in log_files.iter().skip(keep) {
        if let Err(e) = fs::remove_file(old_file) {
            warn!("Error deleting old log file {}: {}", old_file.display(), e);
        }
    }
}
