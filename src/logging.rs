//! Tracing configuration and log routing.
//!
//! Every request failure is logged here before the JSON error body goes back to the caller.
//! Output goes to stdout (compact) and is mirrored into a log file: the path in
//! `ASKDOC_LOG_FILE` (appended to), or `logs/askdoc.log` through a non-rotating appender.
use std::fs::{File, OpenOptions};
use std::path::Path;
use std::sync::OnceLock;

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

const LOG_FILE_ENV: &str = "ASKDOC_LOG_FILE";
const DEFAULT_LOG_DIR: &str = "logs";
const DEFAULT_LOG_FILE: &str = "askdoc.log";

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Install the global tracing subscriber.
///
/// `RUST_LOG` drives filtering (default `info`). When the log file cannot be opened the server
/// keeps running with stdout logging only.
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stdout_layer = fmt::layer().with_target(false).compact();
    let file_layer = configure_file_writer(configured_log_file(std::env::var(LOG_FILE_ENV).ok()))
        .map(|writer| {
            fmt::layer()
                .with_writer(writer)
                .with_target(true)
                .with_ansi(false)
                .compact()
        });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .init();
}

/// Explicit log file override, ignoring blank values.
fn configured_log_file(value: Option<String>) -> Option<String> {
    value.filter(|path| !path.trim().is_empty())
}

fn configure_file_writer(configured: Option<String>) -> Option<NonBlocking> {
    match configured {
        Some(path) => match open_append(Path::new(&path)) {
            Ok(file) => Some(install_writer(file)),
            Err(err) => {
                eprintln!("Failed to open log file {path}: {err}");
                None
            }
        },
        None => {
            if let Err(err) = std::fs::create_dir_all(DEFAULT_LOG_DIR) {
                eprintln!("Failed to create {DEFAULT_LOG_DIR} directory: {err}");
                return None;
            }
            let appender = tracing_appender::rolling::never(DEFAULT_LOG_DIR, DEFAULT_LOG_FILE);
            Some(install_writer(appender))
        }
    }
}

fn install_writer<W>(writer: W) -> NonBlocking
where
    W: std::io::Write + Send + 'static,
{
    let (non_blocking, guard) = tracing_appender::non_blocking(writer);
    let _ = LOG_GUARD.set(guard);
    non_blocking
}

fn open_append(path: &Path) -> std::io::Result<File> {
    if let Some(parent) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}
