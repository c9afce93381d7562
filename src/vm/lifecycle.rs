//! VM lifecycle control: start, stop, and shell connection info.
//!
//! ## Architecture
//!
//! ```text
//! start_instance(name)
//!     ├─► VmsConfig::find          (ConfigNotFound)
//!     ├─► SnapshotCache::current   (AlreadyRunning)
//!     └─► ProcessRunner::spawn_detached(sudo qemu-system-aarch64 ...)
//!
//! stop_instance(pid, force)
//!     └─► ProcessRunner::run(sudo kill -TERM|-9 <pid>)
//! ```
//!
//! The controller only reads the cache. A started or stopped VM shows up in
//! (or disappears from) the next scheduled refresh, so the "already running"
//! check can be stale for up to one refresh interval.

use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use super::VmsConfig;
use super::command::{LaunchProfile, Signal, build_launch_command, build_signal_command};
use super::runner::ProcessRunner;
use crate::cache::SnapshotCache;
use crate::error::{Result, TrackerError};

/// What `stop_instance` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    Stopped,
    ForceStopped,
}

impl StopOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            StopOutcome::Stopped => "stopped",
            StopOutcome::ForceStopped => "force stopped",
        }
    }
}

/// Connection hints for a configured VM. Informational only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShellInfo {
    pub name: String,
    pub running: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssh_command: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssh_port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_port: Option<u16>,
}

pub struct Controller {
    vms: Arc<VmsConfig>,
    cache: Arc<SnapshotCache>,
    runner: Arc<dyn ProcessRunner>,
    profile: LaunchProfile,
}

impl Controller {
    pub fn new(
        vms: Arc<VmsConfig>,
        cache: Arc<SnapshotCache>,
        runner: Arc<dyn ProcessRunner>,
        profile: LaunchProfile,
    ) -> Self {
        Self {
            vms,
            cache,
            runner,
            profile,
        }
    }

    pub fn vms(&self) -> &VmsConfig {
        &self.vms
    }

    /// Launch the configured VM `name` and return the wrapper's PID.
    pub async fn start_instance(&self, name: &str) -> Result<u32> {
        let vm = self
            .vms
            .find(name)
            .ok_or_else(|| TrackerError::ConfigNotFound(name.to_string()))?;

        if let Some(existing) = self.cache.current().find_by_name(name) {
            return Err(TrackerError::AlreadyRunning {
                pid: existing.pid.clone(),
            });
        }

        let cmd = build_launch_command(vm, &self.profile);
        let pid = self
            .runner
            .spawn_detached(&cmd)
            .await
            .map_err(|e| TrackerError::Launch(e.to_string()))?;

        info!(name, pid, command = %cmd.display(), "started VM");
        Ok(pid)
    }

    /// Send SIGTERM (or SIGKILL when `force`) to `pid`.
    ///
    /// Returns once the signal has been delivered; termination itself is not
    /// awaited.
    pub async fn stop_instance(&self, pid: &str, force: bool) -> Result<StopOutcome> {
        let pid_num = parse_pid(pid)?;
        let (signal, outcome, action) = if force {
            (Signal::Kill, StopOutcome::ForceStopped, "force stop")
        } else {
            (Signal::Term, StopOutcome::Stopped, "stop")
        };

        let cmd = build_signal_command(pid_num, signal, &self.profile);
        self.runner
            .run(&cmd)
            .await
            .map_err(|detail| TrackerError::Signal {
                action,
                pid: pid_num,
                detail,
            })?;

        info!(pid = pid_num, ?signal, "signal sent");
        Ok(outcome)
    }

    pub fn shell_info(&self, name: &str) -> Result<ShellInfo> {
        let vm = self
            .vms
            .find(name)
            .ok_or_else(|| TrackerError::ConfigNotFound(name.to_string()))?;

        let running = self.cache.current().find_by_name(name).is_some();

        Ok(ShellInfo {
            name: name.to_string(),
            running,
            ssh_command: vm.ssh_port.map(|port| format!("ssh -p {port} root@localhost")),
            ssh_port: vm.ssh_port,
            http_url: vm.http_port.map(|port| format!("http://localhost:{port}")),
            http_port: vm.http_port,
        })
    }
}

/// A PID must be a positive decimal integer.
fn parse_pid(pid: &str) -> Result<u32> {
    match pid.parse::<u32>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(TrackerError::InvalidPid(pid.to_string())),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::process::{ProcessSource, SnapshotBuilder};
    use crate::vm::{LaunchCommand, VmConfig};

    struct FixedSource(String);

    #[async_trait]
    impl ProcessSource for FixedSource {
        async fn list(&self) -> Result<String> {
            Ok(self.0.clone())
        }
    }

    /// Records every command instead of running it.
    #[derive(Default)]
    struct RecordingRunner {
        commands: Mutex<Vec<LaunchCommand>>,
        fail_with: Option<String>,
    }

    #[async_trait]
    impl ProcessRunner for RecordingRunner {
        async fn spawn_detached(&self, cmd: &LaunchCommand) -> std::io::Result<u32> {
            self.commands.lock().unwrap().push(cmd.clone());
            match &self.fail_with {
                Some(msg) => Err(std::io::Error::new(std::io::ErrorKind::NotFound, msg.clone())),
                None => Ok(4321),
            }
        }

        async fn run(&self, cmd: &LaunchCommand) -> std::result::Result<(), String> {
            self.commands.lock().unwrap().push(cmd.clone());
            match &self.fail_with {
                Some(msg) => Err(msg.clone()),
                None => Ok(()),
            }
        }
    }

    fn vm(name: &str, ssh_port: Option<u16>, http_port: Option<u16>) -> VmConfig {
        VmConfig {
            name: name.into(),
            disk: format!("/vms/{name}.qcow2"),
            memory: "1024M".into(),
            cpus: "1".into(),
            bios: "/fw.fd".into(),
            snapshot: false,
            networks: Vec::new(),
            ssh_port,
            http_port,
            working_dir: String::new(),
        }
    }

    async fn controller(listing: &str, runner: Arc<RecordingRunner>) -> Controller {
        let vms = VmsConfig {
            vms: vec![
                vm("alpha", Some(2222), Some(8080)),
                vm("beta", None, None),
            ],
        };
        let builder = SnapshotBuilder::new(FixedSource(listing.to_string()), "qemu-system-aarch64");
        let cache = SnapshotCache::initialize(builder).await.unwrap();
        Controller::new(
            Arc::new(vms),
            Arc::new(cache),
            runner,
            LaunchProfile::default(),
        )
    }

    const ALPHA_RUNNING: &str = "0 555 1 0 9:00AM ?? 0:02.00 qemu-system-aarch64 -m 1024M -name alpha";

    #[tokio::test]
    async fn start_unknown_vm_is_config_not_found() {
        let runner = Arc::new(RecordingRunner::default());
        let ctl = controller("", runner.clone()).await;

        let err = ctl.start_instance("gamma").await.unwrap_err();
        assert!(matches!(err, TrackerError::ConfigNotFound(ref n) if n == "gamma"));
        assert!(runner.commands.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn start_running_vm_is_refused_with_pid() {
        let runner = Arc::new(RecordingRunner::default());
        let ctl = controller(ALPHA_RUNNING, runner.clone()).await;

        let err = ctl.start_instance("alpha").await.unwrap_err();
        assert!(matches!(err, TrackerError::AlreadyRunning { ref pid } if pid == "555"));
        assert!(runner.commands.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn start_launches_wrapped_qemu() {
        let runner = Arc::new(RecordingRunner::default());
        let ctl = controller(ALPHA_RUNNING, runner.clone()).await;

        let pid = ctl.start_instance("beta").await.unwrap();
        assert_eq!(pid, 4321);

        let commands = runner.commands.lock().unwrap();
        assert_eq!(commands.len(), 1);
        assert_eq!(commands[0].program, "sudo");
        assert_eq!(commands[0].args[0], "qemu-system-aarch64");
        assert!(commands[0].args.windows(2).any(|w| w == ["-name", "beta"]));
    }

    #[tokio::test]
    async fn start_spawn_failure_is_launch_error() {
        let runner = Arc::new(RecordingRunner {
            fail_with: Some("sudo: not found".into()),
            ..Default::default()
        });
        let ctl = controller("", runner).await;

        let err = ctl.start_instance("alpha").await.unwrap_err();
        assert!(matches!(err, TrackerError::Launch(_)));
    }

    #[tokio::test]
    async fn stop_rejects_malformed_pid_without_signalling() {
        let runner = Arc::new(RecordingRunner::default());
        let ctl = controller("", runner.clone()).await;

        for bad in ["notanumber", "", "0", "-5", "12abc"] {
            let err = ctl.stop_instance(bad, false).await.unwrap_err();
            assert!(matches!(err, TrackerError::InvalidPid(_)), "pid {bad:?}");
        }
        assert!(runner.commands.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn stop_sends_term_or_kill() {
        let runner = Arc::new(RecordingRunner::default());
        let ctl = controller("", runner.clone()).await;

        assert_eq!(ctl.stop_instance("555", false).await.unwrap(), StopOutcome::Stopped);
        assert_eq!(ctl.stop_instance("555", true).await.unwrap(), StopOutcome::ForceStopped);

        let commands = runner.commands.lock().unwrap();
        assert_eq!(commands[0].display(), "sudo kill -TERM 555");
        assert_eq!(commands[1].display(), "sudo kill -9 555");
    }

    #[tokio::test]
    async fn stop_failure_carries_diagnostic() {
        let runner = Arc::new(RecordingRunner {
            fail_with: Some("exit status: 1 - sudo: a password is required".into()),
            ..Default::default()
        });
        let ctl = controller("", runner).await;

        let err = ctl.stop_instance("555", true).await.unwrap_err();
        let msg = err.to_string();
        assert!(msg.starts_with("failed to force stop VM (PID 555)"), "got: {msg}");
        assert!(msg.contains("a password is required"));
    }

    #[tokio::test]
    async fn shell_info_reports_ports_and_liveness() {
        let ctl = controller(ALPHA_RUNNING, Arc::new(RecordingRunner::default())).await;

        let alpha = ctl.shell_info("alpha").unwrap();
        assert!(alpha.running);
        assert_eq!(alpha.ssh_command.as_deref(), Some("ssh -p 2222 root@localhost"));
        assert_eq!(alpha.http_url.as_deref(), Some("http://localhost:8080"));

        let beta = ctl.shell_info("beta").unwrap();
        assert!(!beta.running);
        let json = serde_json::to_value(&beta).unwrap();
        assert_eq!(json, serde_json::json!({"name": "beta", "running": false}));

        assert!(matches!(
            ctl.shell_info("gamma"),
            Err(TrackerError::ConfigNotFound(_))
        ));
    }
}
