//! File logging for voxscribe.
//!
//! Events go to a daily file under the XDG state directory and never to the
//! terminal, because stdout carries the transcript. The writer is
//! non-blocking; call [`flush_logging`] before exiting the process so buffered
//! lines reach disk.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::SystemTime;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

/// File name stem of the daily log files.
pub const LOG_FILE_NAME: &str = "voxscribe.log";

/// Rotated files kept on disk, one per day.
const RETAINED_LOG_FILES: usize = 7;

/// Filter applied when `RUST_LOG` is unset or unparsable.
const DEFAULT_FILTER: &str = "info";

/// Flushes the background writer when dropped.
static WRITER_GUARD: Mutex<Option<WorkerGuard>> = Mutex::new(None);

/// Installs the global subscriber writing to the daily log file.
///
/// Prunes old rotated files first; a failed prune is reported on stderr and
/// does not stop startup.
///
/// # Errors
/// - If the log directory cannot be determined or created
/// - If logging was already initialized
pub fn init_logging() -> Result<(), anyhow::Error> {
    let dir = log_dir()?;
    fs::create_dir_all(&dir)?;

    if let Err(e) = prune_rotated_logs(&dir, RETAINED_LOG_FILES) {
        eprintln!("Warning: could not prune old logs in {}: {e}", dir.display());
    }

    let (writer, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::daily(&dir, LOG_FILE_NAME));
    {
        let mut slot = WRITER_GUARD
            .lock()
            .map_err(|_| anyhow::anyhow!("Log writer lock poisoned"))?;
        if slot.is_some() {
            return Err(anyhow::anyhow!("Logging already initialized"));
        }
        *slot = Some(guard);
    }

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true);

    tracing_subscriber::registry().with(filter).with(file_layer).try_init()?;

    tracing::debug!("Writing logs to {}", dir.display());
    Ok(())
}

/// Stops the background writer after it drains buffered lines.
///
/// Returns whether a writer was running. Events logged afterwards are dropped.
pub fn flush_logging() -> bool {
    let guard = match WRITER_GUARD.lock() {
        Ok(mut slot) => slot.take(),
        Err(poisoned) => poisoned.into_inner().take(),
    };
    guard.is_some()
}

/// Directory holding the log files: `$XDG_STATE_HOME/voxscribe`, or
/// `~/.local/state/voxscribe` when that is unset.
///
/// # Errors
/// - If the home directory cannot be determined
pub fn log_dir() -> Result<PathBuf, anyhow::Error> {
    if let Some(state) = std::env::var_os("XDG_STATE_HOME").filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(state).join("voxscribe"));
    }
    dirs::home_dir()
        .map(|home| home.join(".local").join("state").join("voxscribe"))
        .ok_or_else(|| anyhow::anyhow!("Could not determine home directory"))
}

/// Whether `name` is a dated file written by the daily appender,
/// `voxscribe.log.YYYY-MM-DD`.
fn is_rotated_log(name: &str) -> bool {
    let Some(date) = name
        .strip_prefix(LOG_FILE_NAME)
        .and_then(|rest| rest.strip_prefix('.'))
    else {
        return false;
    };
    let parts: Vec<&str> = date.split('-').collect();
    matches!(parts.as_slice(), [y, m, d]
        if y.len() == 4 && m.len() == 2 && d.len() == 2
            && parts.iter().all(|p| p.bytes().all(|b| b.is_ascii_digit())))
}

/// Deletes rotated log files in `dir` beyond the `keep` most recently modified.
///
/// Returns the number of files removed.
///
/// # Errors
/// - If `dir` cannot be read
fn prune_rotated_logs(dir: &Path, keep: usize) -> Result<usize, anyhow::Error> {
    let mut rotated: Vec<(SystemTime, PathBuf)> = Vec::new();
    for entry in fs::read_dir(dir)?.flatten() {
        let path = entry.path();
        if !path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(is_rotated_log)
        {
            continue;
        }
        if let Ok(modified) = entry.metadata().and_then(|m| m.modified()) {
            rotated.push((modified, path));
        }
    }

    rotated.sort_unstable_by(|a, b| b.0.cmp(&a.0));

    let mut removed = 0;
    for (_, path) in rotated.into_iter().skip(keep) {
        match fs::remove_file(&path) {
            Ok(()) => removed += 1,
            Err(e) => eprintln!("Warning: could not delete {}: {e}", path.display()),
        }
    }
    Ok(removed)
}
