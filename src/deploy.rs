//! Deployment orchestration: workspace synchronization followed by the
//! project's deploy pipeline.
//!
//! A run moves through `Synchronizing -> Deploying -> Completed`, bailing
//! out at `SyncFailed` or `StepFailed`. Failures are terminal for the run
//! only; the caller already got its HTTP response and the next qualifying
//! event retries from the top.

use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{error, info};
use uuid::Uuid;

use crate::DeployConfig;
use crate::error::{DeployError, Result};
use crate::project::{DeployCommand, ProjectIdentity, deployment_plan};
use crate::runner::CommandRunner;
use crate::webhook::PullRequestEvent;

/// Brings the project workspace up to date: clone when `{dir}/{name}` does
/// not exist yet, otherwise a forced pull from origin master. The force
/// flag discards local drift; the workspace is build-only and never
/// hand-edited, so mirroring the remote head is what we want.
async fn sync_repository(
    config: &DeployConfig,
    runner: &dyn CommandRunner,
    identity: ProjectIdentity,
    clone_url: &str,
) -> Result<()> {
    let base = config.workspace_base();
    let workspace = base.join(identity.name());

    let command = if workspace.exists() {
        info!("[{}] Pull..", identity);
        DeployCommand::new(workspace, "git", &["pull", "origin", "master", "-f"])
    } else {
        info!("[{}] Clone..", identity);
        DeployCommand::new(base, "git", &["clone", clone_url])
    };

    if runner.run(&command).await {
        Ok(())
    } else {
        Err(DeployError::SyncFailed {
            repository: identity.name().to_string(),
            command: command.to_string(),
        })
    }
}

/// Runs one deployment end to end: resolve the project, synchronize its
/// workspace, then execute the plan in order, stopping at the first
/// failing step.
///
/// An unrecognized repository name is not an error: the event was genuine,
/// there is just nothing configured to deploy for it.
pub async fn run_deployment(
    config: &DeployConfig,
    runner: &dyn CommandRunner,
    event: &PullRequestEvent,
) -> Result<()> {
    let Some(identity) = ProjectIdentity::from_repo_name(&event.repo_name) else {
        info!("Repository not supported: {}", event.repo_name);
        return Ok(());
    };

    sync_repository(config, runner, identity, &event.clone_url).await?;

    let workspace = config.workspace_base().join(identity.name());
    let plan = deployment_plan(identity, &workspace, config.websocket_port());

    for (index, command) in plan.iter().enumerate() {
        if !runner.run(command).await {
            return Err(DeployError::StepFailed {
                repository: identity.name().to_string(),
                step: index + 1,
                command: command.to_string(),
            });
        }
    }

    Ok(())
}

/// Owns deployment execution. Submission is fire-and-forget from the HTTP
/// handler's perspective, but every spawned task is tracked so callers
/// (tests in particular) can await quiescence instead of sleeping.
pub struct Deployer {
    config: DeployConfig,
    runner: Arc<dyn CommandRunner>,
    run_lock: Arc<Mutex<()>>,
    tasks: StdMutex<Vec<JoinHandle<()>>>,
}

impl Deployer {
    pub fn new(config: DeployConfig, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            config,
            runner,
            run_lock: Arc::new(Mutex::new(())),
            tasks: StdMutex::new(Vec::new()),
        }
    }

    /// Launches a deployment run on a background task and returns
    /// immediately. Runs are serialized through one execution lock: two
    /// qualifying events never race on a shared workspace, and a small
    /// host is never asked to run two builds at once.
    pub fn submit(&self, event: PullRequestEvent) {
        let config = self.config.clone();
        let runner = Arc::clone(&self.runner);
        let run_lock = Arc::clone(&self.run_lock);

        let handle = tokio::spawn(async move {
            let _guard = run_lock.lock().await;

            let run_id = Uuid::now_v7();
            info!(
                "Run {} - deploying '{}' after merge into '{}'",
                run_id, event.repo_name, event.base_ref
            );

            match run_deployment(&config, runner.as_ref(), &event).await {
                Ok(()) => info!("Run {} completed.", run_id),
                Err(e) => error!("Run {} failed: {}", run_id, e),
            }
        });

        self.tasks.lock().unwrap().push(handle);
    }

    /// Awaits every submitted run. Lets tests observe deployment outcomes
    /// deterministically; the server itself never calls this.
    pub async fn wait_idle(&self) {
        let handles: Vec<JoinHandle<()>> = {
            let mut tasks = self.tasks.lock().unwrap();
            tasks.drain(..).collect()
        };
        for handle in handles {
            let _ = handle.await;
        }
    }
}
