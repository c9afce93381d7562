//! Error types for the tracker.
//!
//! `TrackerError` covers everything a refresh cycle or an API request can
//! fail with. None of these are fatal to the service: a failed refresh keeps
//! the previous snapshot, and a failed request is reported as `{error}` JSON.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TrackerError {
    /// The process listing could not be run or exited abnormally.
    #[error("failed to list processes: {0}")]
    ProcessList(String),

    #[error("VM configuration not found: {0}")]
    ConfigNotFound(String),

    /// An instance with the requested name is already in the cached snapshot.
    #[error("VM already running with PID {pid}")]
    AlreadyRunning { pid: String },

    #[error("invalid PID: {0}")]
    InvalidPid(String),

    #[error("failed to start VM: {0}")]
    Launch(String),

    /// Signal delivery failed; `detail` carries the command's diagnostic output.
    #[error("failed to {action} VM (PID {pid}): {detail}")]
    Signal {
        action: &'static str,
        pid: u32,
        detail: String,
    },
}

/// Errors raised while loading the VM configuration document.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

pub type Result<T, E = TrackerError> = std::result::Result<T, E>;
