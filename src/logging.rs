use crate::config::{ensure_logs_dir, get_logs_dir};
use crate::error::AnalysisError;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{
    fmt::{self},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityEntry {
    pub timestamp: String,
    pub level: String,
    pub scope: String,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

static LOGGER_INITIALIZED: std::sync::Once = std::sync::Once::new();
use std::sync::LazyLock;

// Keep the guard alive for the lifetime of the program
static FILE_APPENDER_GUARD: LazyLock<Mutex<Option<tracing_appender::non_blocking::WorkerGuard>>> =
    LazyLock::new(|| Mutex::new(None));

pub fn init_logging() -> Result<(), AnalysisError> {
    ensure_logs_dir()?;
    let logs_dir = get_logs_dir()?;

    LOGGER_INITIALIZED.call_once(|| {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        // Console logging for development - compact format
        let console_layer = fmt::layer()
            .compact()
            .with_target(false)
            .with_thread_ids(false)
            .with_thread_names(false)
            .with_filter(env_filter.clone());

        // File logging for all application output
        let file_appender = tracing_appender::rolling::never(&logs_dir, "complere.log");
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        // Store the guard to keep the writer alive
        if let Ok(mut guard_mutex) = FILE_APPENDER_GUARD.lock() {
            *guard_mutex = Some(guard);
        }

        let file_layer = fmt::layer()
            .with_writer(non_blocking)
            .with_ansi(false)
            .with_target(true)
            .with_filter(env_filter.clone());

        tracing_subscriber::registry()
            .with(console_layer)
            .with(file_layer)
            .init();
    });

    Ok(())
}

/// Records an analysis activity entry to the tracing system and to the
/// scope-specific activity file the dashboard reads back.
pub fn record_activity(
    scope: &str,
    level: &str,
    message: &str,
    details: Option<serde_json::Value>,
) -> Result<(), AnalysisError> {
    ensure_logs_dir()?;

    let entry = ActivityEntry {
        timestamp: Utc::now().to_rfc3339(),
        level: level.to_string(),
        scope: scope.to_string(),
        message: message.to_string(),
        details,
    };

    // Log to tracing system
    match level {
        "ERROR" => error!(scope = scope, "{}", message),
        "WARN" => warn!(scope = scope, "{}", message),
        "DEBUG" => debug!(scope = scope, "{}", message),
        _ => info!(scope = scope, "{}", message),
    }

    // Also write to scope-specific file
    let logs_dir = get_logs_dir()?;
    write_activity_entry(&logs_dir, scope, &entry)?;

    Ok(())
}

fn activity_log_path(logs_dir: &Path, scope: &str) -> PathBuf {
    logs_dir.join(format!("{}.log", scope))
}

fn write_activity_entry(
    logs_dir: &Path,
    scope: &str,
    entry: &ActivityEntry,
) -> Result<(), AnalysisError> {
    let log_file_path = activity_log_path(logs_dir, scope);

    // Check if we need to rotate the log file
    if should_rotate_log(&log_file_path)? {
        rotate_log_file(&log_file_path)?;
    }

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_file_path)?;

    // Write JSON entry
    let json_line = serde_json::to_string(entry)?;
    writeln!(file, "{}", json_line)?;
    file.flush()?;

    Ok(())
}

fn should_rotate_log(log_file_path: &PathBuf) -> Result<bool, AnalysisError> {
    if !log_file_path.exists() {
        return Ok(false);
    }

    let metadata = std::fs::metadata(log_file_path)?;
    const MAX_SIZE: u64 = 10 * 1024 * 1024; // 10MB

    Ok(metadata.len() > MAX_SIZE)
}

fn rotate_log_file(log_file_path: &PathBuf) -> Result<(), AnalysisError> {
    // Rotate existing backup files (4 -> 5, 3 -> 4, etc.)
    for i in (1..5).rev() {
        let current_backup = log_file_path.with_extension(format!("log.{}", i));
        let next_backup = log_file_path.with_extension(format!("log.{}", i + 1));

        if current_backup.exists() {
            std::fs::rename(&current_backup, &next_backup)?;
        }
    }

    // Move current log to .1
    if log_file_path.exists() {
        let first_backup = log_file_path.with_extension("log.1");
        std::fs::rename(log_file_path, first_backup)?;
    }

    Ok(())
}

pub fn read_activity(
    scope: &str,
    max_lines: Option<usize>,
) -> Result<Vec<ActivityEntry>, AnalysisError> {
    let logs_dir = get_logs_dir()?;
    read_activity_entries(&logs_dir, scope, max_lines)
}

fn read_activity_entries(
    logs_dir: &Path,
    scope: &str,
    max_lines: Option<usize>,
) -> Result<Vec<ActivityEntry>, AnalysisError> {
    let log_file_path = activity_log_path(logs_dir, scope);

    if !log_file_path.exists() {
        return Ok(Vec::new());
    }

    let file = File::open(&log_file_path)?;
    let reader = BufReader::new(file);
    let mut entries = Vec::new();

    for line in reader.lines() {
        match line {
            Ok(line_content) => {
                if let Ok(entry) = serde_json::from_str::<ActivityEntry>(&line_content) {
                    entries.push(entry);
                }
            }
            Err(e) => {
                eprintln!("Error reading log line: {}", e);
            }
        }
    }

    // Always return in reverse chronological order (newest first)
    entries.reverse();

    // If max_lines is specified, return only the first N entries (which are now the newest)
    if let Some(max) = max_lines {
        if entries.len() > max {
            entries.truncate(max);
        }
    }

    Ok(entries)
}

// Convenience functions for different log levels
pub fn log_info(scope: &str, message: &str) -> Result<(), AnalysisError> {
    record_activity(scope, "INFO", message, None)
}

pub fn log_warn(scope: &str, message: &str) -> Result<(), AnalysisError> {
    record_activity(scope, "WARN", message, None)
}

pub fn log_error(scope: &str, message: &str) -> Result<(), AnalysisError> {
    record_activity(scope, "ERROR", message, None)
}
