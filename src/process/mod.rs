//! Process discovery for QEMU virtual machines.
//!
//! Turns the output of the OS process listing into typed [`Instance`]
//! records. The pipeline is split in two:
//!
//! ```text
//! ps -ef ──► listing::parse_listing ──► one line per VM process
//!                                          └─► extract::extract(cmdline)
//! ```
//!
//! Everything here is stateless; the [`crate::cache`] module owns the most
//! recent result.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

pub mod extract;
pub mod listing;

// ---------------------------------------------------------------------------
// Shared types used across submodules
// ---------------------------------------------------------------------------

/// How the VM process was launched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum InstanceKind {
    /// Started by Canonical Multipass.
    Multipass,
    #[default]
    Custom,
}

/// Run-mode derived from command-line flags, not from process introspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    #[default]
    Running,
    /// Restored from a `suspend` snapshot via `-loadvm suspend`.
    Suspended,
    /// Disk writes are discarded on exit (`-snapshot`).
    Snapshot,
}

/// One network adapter. `type` is empty when the command line had fewer
/// `-netdev` clauses than `mac=` values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Network {
    #[serde(rename = "type")]
    pub kind: String,
    pub mac: String,
}

/// A running process believed to be a VM.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Instance {
    pub pid: String,
    pub ppid: String,
    pub user: String,
    pub cpu_time: String,
    pub start_time: String,
    pub memory: String,
    pub cpu_count: String,
    pub disk_image: String,
    pub name: String,
    pub machine: String,
    pub networks: Vec<Network>,
    #[serde(rename = "type")]
    pub kind: InstanceKind,
    #[serde(rename = "status")]
    pub run_mode: RunMode,
    /// Accumulated CPU time, surfaced as-is. This is not wall-clock uptime.
    pub uptime: String,
}

/// An immutable, timestamped list of discovered instances.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub instances: Vec<Instance>,
    pub captured_at: DateTime<Local>,
}

impl Snapshot {
    pub fn new(instances: Vec<Instance>) -> Self {
        Self {
            instances,
            captured_at: Local::now(),
        }
    }

    /// Capture time formatted as `YYYY-MM-DD HH:MM:SS`.
    pub fn last_updated(&self) -> String {
        self.captured_at.format("%Y-%m-%d %H:%M:%S").to_string()
    }

    /// First instance whose declared name equals `name`.
    pub fn find_by_name(&self, name: &str) -> Option<&Instance> {
        self.instances.iter().find(|inst| inst.name == name)
    }
}

pub use extract::{CommandLineFields, extract};
pub use listing::{ProcessSource, PsSource, SnapshotBuilder, parse_listing};

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn instance_serializes_with_wire_names() {
        let inst = Instance {
            pid: "100".into(),
            kind: InstanceKind::Multipass,
            run_mode: RunMode::Suspended,
            networks: vec![Network {
                kind: "user".into(),
                mac: "52:54:00:12:34:56".into(),
            }],
            ..Default::default()
        };

        let json = serde_json::to_value(&inst).expect("serialise");
        assert_eq!(json["type"], "multipass");
        assert_eq!(json["status"], "suspended");
        assert_eq!(json["networks"][0]["type"], "user");
        assert_eq!(json["cpu_time"], "");
    }

    #[test]
    fn last_updated_uses_plain_datetime_format() {
        let snapshot = Snapshot {
            instances: Vec::new(),
            captured_at: Local.with_ymd_and_hms(2026, 1, 15, 10, 30, 5).unwrap(),
        };
        assert_eq!(snapshot.last_updated(), "2026-01-15 10:30:05");
    }

    #[test]
    fn find_by_name_matches_exactly() {
        let snapshot = Snapshot::new(vec![
            Instance {
                pid: "1".into(),
                name: "alpha".into(),
                ..Default::default()
            },
            Instance {
                pid: "2".into(),
                name: "alphabet".into(),
                ..Default::default()
            },
        ]);

        assert_eq!(snapshot.find_by_name("alpha").map(|i| i.pid.as_str()), Some("1"));
        assert!(snapshot.find_by_name("alp").is_none());
    }
}
