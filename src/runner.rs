//! Generic subprocess execution.

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{error, info};

use crate::project::DeployCommand;

/// The seam between deployment logic and the operating system. The
/// synchronizer and the pipeline both go through this trait, so tests can
/// substitute a recording double.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Runs a command to completion in its bound working directory.
    /// Returns true only if the process exited successfully.
    async fn run(&self, command: &DeployCommand) -> bool;
}

/// Spawns real OS processes. Stdout/stderr are inherited so build output
/// lands in the operator's console; nothing is captured. No timeout: a
/// command runs until it exits or the OS kills it.
pub struct ProcessRunner;

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, command: &DeployCommand) -> bool {
        info!(
            "Running (cwd = '{}'): {}",
            command.cwd.display(),
            command
        );

        let status = Command::new(&command.program)
            .args(&command.args)
            .current_dir(&command.cwd)
            .status()
            .await;

        match status {
            Ok(status) if status.success() => true,
            Ok(status) => {
                error!("'{}' exited with {}", command, status);
                false
            }
            Err(e) => {
                error!("'{}' failed to start: {}", command, e);
                false
            }
        }
    }
}
