//! VM management for qemu-tracker.
//!
//! Holds the user-declared VM templates loaded from `vms.json`, assembles
//! QEMU launch commands from them, and starts or signals VM processes via
//! the privilege-escalation wrapper.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::ConfigError;

pub mod command;
pub mod lifecycle;
pub mod runner;

/// Default location of the VM configuration document, relative to the
/// working directory.
pub const DEFAULT_VMS_CONFIG: &str = "vms.json";

// ---------------------------------------------------------------------------
// Shared types used across submodules
// ---------------------------------------------------------------------------

/// A host-to-guest TCP port forward on a `user` network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortForward {
    pub host: u16,
    pub guest: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VmNetwork {
    /// QEMU netdev backend, e.g. `user` or `vmnet-shared`.
    #[serde(rename = "type")]
    pub kind: String,
    pub id: String,
    pub mac: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub port_forwards: Vec<PortForward>,
}

/// Template for a VM that may or may not currently be running.
///
/// `memory` and `cpus` are passed to QEMU verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VmConfig {
    pub name: String,
    pub disk: String,
    pub memory: String,
    pub cpus: String,
    /// Firmware image passed to `-bios`.
    pub bios: String,
    #[serde(default)]
    pub snapshot: bool,
    #[serde(default)]
    pub networks: Vec<VmNetwork>,
    #[serde(default)]
    pub ssh_port: Option<u16>,
    #[serde(default)]
    pub http_port: Option<u16>,
    #[serde(default)]
    pub working_dir: String,
}

/// The whole configuration document. Immutable once loaded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VmsConfig {
    #[serde(default)]
    pub vms: Vec<VmConfig>,
}

/// Document shape before each entry is checked on its own.
#[derive(Deserialize)]
struct RawVmsConfig {
    #[serde(default)]
    vms: Vec<serde_json::Value>,
}

impl VmsConfig {
    /// Read and parse the document at `path`.
    ///
    /// A missing file is not an error: VM management is simply disabled and
    /// an empty configuration is returned. Entries that do not fit
    /// [`VmConfig`] (e.g. a port above 65535) are skipped with a warning;
    /// the rest of the document still loads.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let data = match std::fs::read_to_string(path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(path = %path.display(), "VM config not found, VM management disabled");
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.display().to_string(),
                    source,
                });
            }
        };

        let raw: RawVmsConfig = serde_json::from_str(&data).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::from_entries(raw.vms);

        config.warn_on_duplicates();
        info!(count = config.vms.len(), "loaded VM configuration");
        Ok(config)
    }

    /// Like [`VmsConfig::load`], but a broken file degrades to an empty
    /// configuration instead of failing startup.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_else(|e| {
            warn!(error = %e, "failed to load VM config, VM management disabled");
            Self::default()
        })
    }

    fn from_entries(entries: Vec<serde_json::Value>) -> Self {
        let vms = entries
            .into_iter()
            .enumerate()
            .filter_map(|(index, entry)| match serde_json::from_value::<VmConfig>(entry) {
                Ok(vm) => Some(vm),
                Err(e) => {
                    warn!(index, error = %e, "skipping invalid VM entry");
                    None
                }
            })
            .collect();
        Self { vms }
    }

    /// The first template named `name`.
    pub fn find(&self, name: &str) -> Option<&VmConfig> {
        self.vms.iter().find(|vm| vm.name == name)
    }

    fn warn_on_duplicates(&self) {
        for (i, vm) in self.vms.iter().enumerate() {
            if self.vms[..i].iter().any(|earlier| earlier.name == vm.name) {
                warn!(name = %vm.name, "duplicate VM name in config, first entry wins");
            }
        }
    }
}

pub use command::{LaunchCommand, LaunchProfile, Signal, build_launch_command, build_signal_command};
pub use lifecycle::{Controller, ShellInfo, StopOutcome};
pub use runner::{ProcessRunner, SystemRunner};

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
