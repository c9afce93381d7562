//! Process spawning for launch and signal commands.
//!
//! [`SystemRunner`] executes commands on the host with `tokio::process`.
//! Launches are fire-and-forget: the child is reaped by a background task
//! that only logs the exit status. Whether the VM actually came up (or went
//! away after a signal) is observed through the next snapshot refresh.

use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{info, warn};

use super::LaunchCommand;

#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Start `cmd` without waiting for it and return its PID.
    async fn spawn_detached(&self, cmd: &LaunchCommand) -> std::io::Result<u32>;

    /// Run `cmd` to completion. `Err` carries a diagnostic when it could not
    /// be started or exited unsuccessfully.
    async fn run(&self, cmd: &LaunchCommand) -> Result<(), String>;
}

#[derive(Debug, Clone, Default)]
pub struct SystemRunner;

fn to_command(cmd: &LaunchCommand) -> Command {
    let mut command = Command::new(&cmd.program);
    command.args(&cmd.args);
    if let Some(dir) = &cmd.working_dir {
        command.current_dir(dir);
    }
    command
}

#[async_trait]
impl ProcessRunner for SystemRunner {
    async fn spawn_detached(&self, cmd: &LaunchCommand) -> std::io::Result<u32> {
        let mut child = to_command(cmd)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;

        let pid = child.id().ok_or_else(|| {
            std::io::Error::other("process exited before its PID could be read")
        })?;

        let program = cmd.program.clone();
        tokio::spawn(async move {
            match child.wait().await {
                Ok(status) => info!(pid, %program, exit_status = ?status, "launched process exited"),
                Err(e) => warn!(pid, %program, error = %e, "failed to wait for launched process"),
            }
        });

        Ok(pid)
    }

    async fn run(&self, cmd: &LaunchCommand) -> Result<(), String> {
        let output = to_command(cmd)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| format!("could not run {}: {e}", cmd.program))?;

        if output.status.success() {
            return Ok(());
        }

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));
        Err(format!("{} - {}", output.status, combined.trim()))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn command(program: &str, args: &[&str]) -> LaunchCommand {
        LaunchCommand {
            program: program.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
            working_dir: None,
        }
    }

    #[tokio::test]
    async fn run_reports_success() {
        assert!(SystemRunner.run(&command("true", &[])).await.is_ok());
    }

    #[tokio::test]
    async fn run_failure_includes_output() {
        let err = SystemRunner
            .run(&command("sh", &["-c", "echo not permitted >&2; exit 1"]))
            .await
            .unwrap_err();
        assert!(err.contains("not permitted"), "got: {err}");
    }

    #[tokio::test]
    async fn run_missing_program_is_an_error() {
        let err = SystemRunner
            .run(&command("definitely-not-a-real-binary-xyz", &[]))
            .await
            .unwrap_err();
        assert!(err.starts_with("could not run"), "got: {err}");
    }

    #[tokio::test]
    async fn spawn_detached_returns_pid() {
        let pid = SystemRunner
            .spawn_detached(&command("sleep", &["0"]))
            .await
            .expect("spawn");
        assert!(pid > 0);
    }
}
