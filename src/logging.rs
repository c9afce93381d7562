//! Logging initialisation for qemu-tracker.
//!
//! Logs go to stderr, filtered by `RUST_LOG` (default `info`). When the
//! `QEMU_TRACKER_LOG` environment variable is set to `1`, the same events
//! are also written without ANSI colour to `qemu-tracker.log` in the OS
//! data directory (`/tmp` when no home directory is known).
//!
//! Returns a guard that must be kept alive for the duration of the process
//! so that buffered log lines are flushed on exit.

use std::path::{Path, PathBuf};

use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const APP_NAME: &str = "qemu-tracker";
const LOG_FILE: &str = "qemu-tracker.log";
const FILE_LOG_ENV: &str = "QEMU_TRACKER_LOG";

pub struct LogGuard {
    _file_guard: Option<WorkerGuard>,
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Initialise the global tracing subscriber.
///
/// Call once from `main`, store the returned `LogGuard` in a local variable
/// for the duration of the process.
pub fn init() -> LogGuard {
    let file_dir = (std::env::var(FILE_LOG_ENV).as_deref() == Ok("1")).then(|| {
        log_dir(
            std::env::var("XDG_DATA_HOME").ok(),
            std::env::var("HOME").ok(),
        )
        .unwrap_or_else(|| PathBuf::from("/tmp"))
    });

    let mut dir_error = None;
    let (file_layer, file_guard) = match &file_dir {
        Some(dir) => {
            if let Err(e) = std::fs::create_dir_all(dir) {
                dir_error = Some(e);
            }
            let (writer, guard) =
                tracing_appender::non_blocking(tracing_appender::rolling::never(dir, LOG_FILE));
            (
                Some(fmt::layer().with_writer(writer).with_ansi(false)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter())
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();

    if let Some(dir) = &file_dir {
        let path = log_file_path(dir);
        match dir_error {
            Some(e) => warn!(path = %path.display(), error = %e, "cannot create log directory"),
            None => info!(path = %path.display(), "file logging enabled"),
        }
    }

    LogGuard {
        _file_guard: file_guard,
    }
}

fn log_file_path(dir: &Path) -> PathBuf {
    dir.join(LOG_FILE)
}

/// `$XDG_DATA_HOME/qemu-tracker`, else the per-OS data directory under `home`.
fn log_dir(xdg_data_home: Option<String>, home: Option<String>) -> Option<PathBuf> {
    if let Some(xdg) = xdg_data_home.filter(|x| !x.is_empty()) {
        return Some(PathBuf::from(xdg).join(APP_NAME));
    }
    let mut p = PathBuf::from(home?);
    #[cfg(target_os = "macos")]
    {
        p.push("Library");
        p.push("Logs");
    }
    #[cfg(not(target_os = "macos"))]
    {
        p.push(".local");
        p.push("share");
    }
    p.push(APP_NAME);
    Some(p)
}
