use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

// ── Directory bootstrap ────────────────────────────────────────────────────────

fn home_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from("."))
}

fn board_dir(home: &Path) -> PathBuf {
    home.join(".machine-board")
}

/// Ensure `~/.machine-board/` and `~/.machine-board/logs/` exist.
pub fn ensure_directories() -> anyhow::Result<()> {
    let dir = board_dir(&home_dir());
    std::fs::create_dir_all(dir.join("logs"))?;
    Ok(())
}

// ── Logging bootstrap ──────────────────────────────────────────────────────────

/// Map a user-facing level name to a filter directive.
///
/// Unrecognised strings pass through untouched so full `EnvFilter`
/// directives such as `board_runtime=trace` keep working.
fn filter_directive(log_level: &str, debug: bool) -> String {
    if debug {
        return "debug".to_string();
    }
    match log_level.to_uppercase().as_str() {
        "DEBUG" => "debug".to_string(),
        "INFO" => "info".to_string(),
        "WARNING" | "WARN" => "warn".to_string(),
        "ERROR" | "CRITICAL" => "error".to_string(),
        _ => log_level.to_string(),
    }
}

/// Where log output goes: the explicit file, or `logs/board.log` under the
/// board directory in `home`.
fn log_path(log_file: Option<&PathBuf>, home: &Path) -> PathBuf {
    match log_file {
        Some(path) => path.clone(),
        None => board_dir(home).join("logs").join("board.log"),
    }
}

/// Initialise the global `tracing` subscriber.
///
/// The terminal belongs to the board view, so output is appended to a file
/// rather than written to stderr.
pub fn setup_logging(log_level: &str, debug: bool, log_file: Option<&PathBuf>) -> anyhow::Result<PathBuf> {
    let path = log_path(log_file, &home_dir());
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new().create(true).append(true).open(&path)?;

    let directive = filter_directive(log_level, debug);
    let filter = EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new("info"));

    let layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_ansi(false)
        .with_writer(Mutex::new(file));

    tracing_subscriber::registry()
        .with(filter)
        .with(layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to install log subscriber: {e}"))?;

    Ok(path)
}

// ── Tests ──────────────────────────────────────────────────────────────────────
