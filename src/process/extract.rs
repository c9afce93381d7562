//! Command-line field extraction.
//!
//! Each VM attribute is pulled out of the raw QEMU command line by its own
//! pure extractor. [`extract`] runs them in a fixed order; only `name`
//! depends on earlier results (`kind` and `disk_image`). Extraction never
//! fails: a field whose pattern does not match stays empty.

use std::sync::LazyLock;

use regex::Regex;

use super::{InstanceKind, Network, RunMode};

// ---------------------------------------------------------------------------
// Patterns
// ---------------------------------------------------------------------------

static MEMORY: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"-m\s+(\d+[MG]?)").unwrap());
static CPU_COUNT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"-smp\s+(\d+)").unwrap());
static DISK_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"file=([^,]+\.(?:qcow2|img))").unwrap());
static NAME_FLAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"-name\s+(\S+)").unwrap());
static MULTIPASS_INSTANCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"instances/([^/]+)/").unwrap());
static MACHINE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"-machine\s+([^,\s]+)").unwrap());
static MAC: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"mac=([0-9a-f:]+)").unwrap());
static NETDEV_TYPE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"-netdev\s+([^,]+)").unwrap());

/// Attributes recovered from a single command line.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommandLineFields {
    pub kind: InstanceKind,
    pub memory: String,
    pub cpu_count: String,
    pub disk_image: String,
    pub name: String,
    pub machine: String,
    pub networks: Vec<Network>,
    pub run_mode: RunMode,
}

/// Run every field extractor over `cmdline`.
pub fn extract(cmdline: &str) -> CommandLineFields {
    let kind = extract_kind(cmdline);
    let disk_image = extract_disk_image(cmdline).unwrap_or_default();
    let name = extract_name(cmdline, kind, &disk_image).unwrap_or_default();

    CommandLineFields {
        kind,
        memory: extract_memory(cmdline).unwrap_or_default(),
        cpu_count: extract_cpu_count(cmdline).unwrap_or_default(),
        name,
        disk_image,
        machine: extract_machine(cmdline).unwrap_or_default(),
        networks: extract_networks(cmdline),
        run_mode: extract_run_mode(cmdline),
    }
}

// ---------------------------------------------------------------------------
// Field extractors
// ---------------------------------------------------------------------------

fn first_capture(re: &Regex, haystack: &str) -> Option<String> {
    re.captures(haystack)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

pub fn extract_kind(cmdline: &str) -> InstanceKind {
    if cmdline.contains("multipass") {
        InstanceKind::Multipass
    } else {
        InstanceKind::Custom
    }
}

/// Value of `-m`, e.g. `2048M`.
pub fn extract_memory(cmdline: &str) -> Option<String> {
    first_capture(&MEMORY, cmdline)
}

pub fn extract_cpu_count(cmdline: &str) -> Option<String> {
    first_capture(&CPU_COUNT, cmdline)
}

/// Basename of the first `.qcow2` / `.img` path inside a `file=` clause.
pub fn extract_disk_image(cmdline: &str) -> Option<String> {
    let path = first_capture(&DISK_PATH, cmdline)?;
    path.rsplit('/').next().map(str::to_string)
}

/// Declared name, in priority order: `-name` flag, the Multipass instance
/// directory, then the disk image without its `.qcow2` suffix.
pub fn extract_name(cmdline: &str, kind: InstanceKind, disk_image: &str) -> Option<String> {
    if let Some(name) = first_capture(&NAME_FLAG, cmdline) {
        return Some(name);
    }
    if kind == InstanceKind::Multipass {
        return first_capture(&MULTIPASS_INSTANCE, cmdline);
    }
    if !disk_image.is_empty() {
        return Some(
            disk_image
                .strip_suffix(".qcow2")
                .unwrap_or(disk_image)
                .to_string(),
        );
    }
    None
}

pub fn extract_machine(cmdline: &str) -> Option<String> {
    first_capture(&MACHINE, cmdline)
}

/// Pair every `mac=` value with the `-netdev` type at the same position.
pub fn extract_networks(cmdline: &str) -> Vec<Network> {
    let types: Vec<&str> = NETDEV_TYPE
        .captures_iter(cmdline)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str())
        .collect();

    MAC.captures_iter(cmdline)
        .filter_map(|caps| caps.get(1))
        .enumerate()
        .map(|(i, mac)| Network {
            kind: types.get(i).map(|t| t.to_string()).unwrap_or_default(),
            mac: mac.as_str().to_string(),
        })
        .collect()
}

/// `-loadvm suspend` wins over `-snapshot` when both are present.
pub fn extract_run_mode(cmdline: &str) -> RunMode {
    if cmdline.contains("-loadvm suspend") {
        RunMode::Suspended
    } else if cmdline.contains("-snapshot") {
        RunMode::Snapshot
    } else {
        RunMode::Running
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
