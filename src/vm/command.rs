//! QEMU launch command assembly.
//!
//! [`build_launch_command`] turns a [`VmConfig`] into the exact argument
//! vector handed to the privilege-escalation wrapper. It is pure so the
//! command can be inspected without starting anything.

use std::fmt::Write as _;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::{VmConfig, VmNetwork};
use crate::process::listing::DEFAULT_BINARY;

/// Host-specific parts of the launch command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LaunchProfile {
    /// Privilege-escalation wrapper, e.g. `sudo`.
    pub wrapper: String,
    pub binary: String,
    pub accelerator: String,
    pub cpu_model: String,
    pub machine: String,
}

impl Default for LaunchProfile {
    fn default() -> Self {
        Self {
            wrapper: "sudo".to_string(),
            binary: DEFAULT_BINARY.to_string(),
            accelerator: "hvf".to_string(),
            cpu_model: "cortex-a72".to_string(),
            machine: "virt".to_string(),
        }
    }
}

/// A fully assembled command: `program args...`, optionally run from
/// `working_dir`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchCommand {
    pub program: String,
    pub args: Vec<String>,
    pub working_dir: Option<PathBuf>,
}

impl LaunchCommand {
    /// Shell-like rendering for log lines.
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Assemble the launch command for `vm`.
///
/// ```text
/// sudo qemu-system-aarch64 -nographic -accel hvf -cpu cortex-a72 -machine virt
///      -bios <bios> -smp <cpus> -m <memory> -device virtio-rng-pci
///      -drive file=<disk>,format=qcow2,if=virtio
///      [-netdev <type>,id=<id>[,hostfwd=...] -device virtio-net-pci,netdev=<id>,mac=<mac>]...
///      -name <name> [-snapshot] -serial mon:stdio
/// ```
pub fn build_launch_command(vm: &VmConfig, profile: &LaunchProfile) -> LaunchCommand {
    let mut args: Vec<String> = vec![
        profile.binary.clone(),
        "-nographic".into(),
        "-accel".into(),
        profile.accelerator.clone(),
        "-cpu".into(),
        profile.cpu_model.clone(),
        "-machine".into(),
        profile.machine.clone(),
        "-bios".into(),
        vm.bios.clone(),
        "-smp".into(),
        vm.cpus.clone(),
        "-m".into(),
        vm.memory.clone(),
        "-device".into(),
        "virtio-rng-pci".into(),
        "-drive".into(),
        format!("file={},format=qcow2,if=virtio", vm.disk),
    ];

    for net in &vm.networks {
        args.push("-netdev".into());
        args.push(netdev_arg(net));
        args.push("-device".into());
        args.push(format!("virtio-net-pci,netdev={},mac={}", net.id, net.mac));
    }

    args.push("-name".into());
    args.push(vm.name.clone());

    if vm.snapshot {
        args.push("-snapshot".into());
    }

    args.push("-serial".into());
    args.push("mon:stdio".into());

    LaunchCommand {
        program: profile.wrapper.clone(),
        args,
        working_dir: (!vm.working_dir.is_empty()).then(|| PathBuf::from(&vm.working_dir)),
    }
}

/// Signal sent to a VM process by [`build_signal_command`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// Graceful shutdown (`SIGTERM`).
    Term,
    /// Immediate kill (`SIGKILL`).
    Kill,
}

impl Signal {
    fn kill_flag(self) -> &'static str {
        match self {
            Signal::Term => "-TERM",
            Signal::Kill => "-9",
        }
    }
}

/// `sudo kill -TERM <pid>` or `sudo kill -9 <pid>`.
pub fn build_signal_command(pid: u32, signal: Signal, profile: &LaunchProfile) -> LaunchCommand {
    LaunchCommand {
        program: profile.wrapper.clone(),
        args: vec!["kill".into(), signal.kill_flag().into(), pid.to_string()],
        working_dir: None,
    }
}

/// `<type>,id=<id>` plus one `hostfwd` rule per forward on `user` networks.
fn netdev_arg(net: &VmNetwork) -> String {
    let mut arg = format!("{},id={}", net.kind, net.id);
    if net.kind == "user" {
        for pf in &net.port_forwards {
            let _ = write!(arg, ",hostfwd=tcp::{}-:{}", pf.host, pf.guest);
        }
    }
    arg
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
