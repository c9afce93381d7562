//! Process snapshot builder.
//!
//! Reads the full-format process listing (`ps -ef`) and keeps one
//! [`Instance`] per QEMU worker process. Column layout expected from `ps`:
//!
//! ```text
//! UID   PID  PPID  C STIME   TTY      TIME CMD...
//! 0     1    2     3 4       5        6    7..
//! ```

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use super::{Instance, extract};
use crate::error::{Result, TrackerError};

/// Default QEMU binary whose processes are tracked.
pub const DEFAULT_BINARY: &str = "qemu-system-aarch64";

/// Minimum number of whitespace-separated columns on a usable line.
const MIN_FIELDS: usize = 8;

/// Source of raw process-listing text.
#[async_trait]
pub trait ProcessSource: Send + Sync {
    async fn list(&self) -> Result<String>;
}

/// Runs `ps -ef` on the host.
#[derive(Debug, Clone, Default)]
pub struct PsSource;

#[async_trait]
impl ProcessSource for PsSource {
    async fn list(&self) -> Result<String> {
        let output = Command::new("ps")
            .arg("-ef")
            .output()
            .await
            .map_err(|e| TrackerError::ProcessList(format!("could not run ps: {e}")))?;

        if !output.status.success() {
            return Err(TrackerError::ProcessList(format!(
                "ps exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Parse a full-format listing into instances of `binary`.
///
/// Skips the filter's own echo (`grep`), short lines, and the `sudo`
/// wrapper that launched a worker, so each VM appears once.
pub fn parse_listing(output: &str, binary: &str) -> Vec<Instance> {
    output
        .lines()
        .filter(|line| line.contains(binary) && !line.contains("grep"))
        .filter_map(parse_line)
        .collect()
}

fn parse_line(line: &str) -> Option<Instance> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < MIN_FIELDS {
        return None;
    }

    let cmdline = fields[7..].join(" ");
    if cmdline.starts_with("sudo ") {
        debug!(pid = fields[1], "skipping privilege wrapper process");
        return None;
    }

    let parsed = extract(&cmdline);
    Some(Instance {
        pid: fields[1].to_string(),
        ppid: fields[2].to_string(),
        user: fields[0].to_string(),
        cpu_time: fields[6].to_string(),
        start_time: fields[4].to_string(),
        memory: parsed.memory,
        cpu_count: parsed.cpu_count,
        disk_image: parsed.disk_image,
        name: parsed.name,
        machine: parsed.machine,
        networks: parsed.networks,
        kind: parsed.kind,
        run_mode: parsed.run_mode,
        uptime: fields[6].to_string(),
    })
}

/// Builds the instance list for one point in time.
pub struct SnapshotBuilder {
    source: Box<dyn ProcessSource>,
    binary: String,
}

impl SnapshotBuilder {
    pub fn new(source: impl ProcessSource + 'static, binary: impl Into<String>) -> Self {
        Self {
            source: Box::new(source),
            binary: binary.into(),
        }
    }

    pub fn binary(&self) -> &str {
        &self.binary
    }

    pub async fn build(&self) -> Result<Vec<Instance>> {
        let output = self.source.list().await?;
        Ok(parse_listing(&output, &self.binary))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
