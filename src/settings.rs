//! Service settings for qemu-tracker.
//!
//! Settings come from an optional TOML file (default `tracker.toml`) and
//! are then overridden by command-line flags. Every key has a default, so a
//! missing file or a partial one is fine:
//!
//! ```toml
//! bind = "0.0.0.0:5450"
//! vms_config = "vms.json"
//! refresh_interval_secs = 5
//!
//! [launch]
//! wrapper = "sudo"
//! binary = "qemu-system-aarch64"
//! accelerator = "hvf"
//! cpu_model = "cortex-a72"
//! machine = "virt"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::cache::DEFAULT_REFRESH_INTERVAL;
use crate::vm::{DEFAULT_VMS_CONFIG, LaunchProfile};

pub const DEFAULT_SETTINGS_FILE: &str = "tracker.toml";
pub const DEFAULT_BIND: &str = "0.0.0.0:5450";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Listen address for the HTTP API and dashboard.
    pub bind: String,
    /// VM template document, relative to the working directory.
    pub vms_config: PathBuf,
    pub refresh_interval_secs: u64,
    /// QEMU binary, privilege wrapper and fixed machine profile.
    pub launch: LaunchProfile,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND.to_string(),
            vms_config: PathBuf::from(DEFAULT_VMS_CONFIG),
            refresh_interval_secs: DEFAULT_REFRESH_INTERVAL.as_secs(),
            launch: LaunchProfile::default(),
        }
    }
}

impl Settings {
    pub fn from_toml(s: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(s)
    }

    /// Load settings from `path`, falling back to defaults when the file
    /// does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(content) => Self::from_toml(&content)
                .with_context(|| format!("invalid settings file {}", path.display())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e).with_context(|| format!("failed to read {}", path.display())),
        }
    }

    /// Refresh period, clamped to at least one second.
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs.max(1))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load(&dir.path().join("tracker.toml")).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.bind, "0.0.0.0:5450");
        assert_eq!(settings.refresh_interval(), Duration::from_secs(5));
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let settings = Settings::from_toml(
            r#"
            refresh_interval_secs = 10

            [launch]
            binary = "qemu-system-x86_64"
            accelerator = "kvm"
            "#,
        )
        .unwrap();

        assert_eq!(settings.refresh_interval(), Duration::from_secs(10));
        assert_eq!(settings.vms_config, PathBuf::from("vms.json"));
        assert_eq!(settings.launch.binary, "qemu-system-x86_64");
        assert_eq!(settings.launch.accelerator, "kvm");
        assert_eq!(settings.launch.wrapper, "sudo");
    }

    #[test]
    fn zero_interval_is_clamped() {
        let settings = Settings {
            refresh_interval_secs: 0,
            ..Default::default()
        };
        assert_eq!(settings.refresh_interval(), Duration::from_secs(1));
    }

    #[test]
    fn invalid_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tracker.toml");
        std::fs::write(&path, "bind = [").unwrap();
        assert!(Settings::load(&path).is_err());
    }
}
