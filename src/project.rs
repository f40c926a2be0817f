//! Known project identities and their deployment plans.
//!
//! The set of deployable repositories is closed. Each identity maps to a
//! fixed, ordered command sequence; later steps rely on the side effects of
//! earlier ones (config:cache assumes config:clear already ran), so order
//! is part of the contract.

use std::fmt;
use std::path::{Path, PathBuf};

/// The closed set of repositories this service knows how to deploy.
/// Unrecognized repository names are valid deliveries that deploy nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectIdentity {
    Web,
    Server,
    Websocket,
}

impl ProjectIdentity {
    /// Maps a repository name from the webhook payload to a known project.
    pub fn from_repo_name(name: &str) -> Option<Self> {
        match name {
            "web" => Some(ProjectIdentity::Web),
            "server" => Some(ProjectIdentity::Server),
            "websocket" => Some(ProjectIdentity::Websocket),
            _ => None,
        }
    }

    /// The project's directory name under the workspace base.
    pub fn name(&self) -> &'static str {
        match self {
            ProjectIdentity::Web => "web",
            ProjectIdentity::Server => "server",
            ProjectIdentity::Websocket => "websocket",
        }
    }
}

impl fmt::Display for ProjectIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One external command: program, arguments, and the working directory it
/// runs in. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployCommand {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
}

impl DeployCommand {
    pub fn new(cwd: impl Into<PathBuf>, program: &str, args: &[&str]) -> Self {
        Self {
            program: program.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
            cwd: cwd.into(),
        }
    }
}

impl fmt::Display for DeployCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// The build/deploy command sequence for a project, each command bound to
/// the project's workspace directory. This is data, not control flow; the
/// pipeline executes it in order and stops at the first failure.
pub fn deployment_plan(
    identity: ProjectIdentity,
    workspace: &Path,
    websocket_port: &str,
) -> Vec<DeployCommand> {
    let cmd = |program: &str, args: &[&str]| DeployCommand::new(workspace, program, args);

    match identity {
        ProjectIdentity::Web => vec![
            cmd("npm", &["ci"]),
            cmd("npm", &["run", "build"]),
        ],
        ProjectIdentity::Websocket => vec![
            // Free the port a previous production run may still hold.
            cmd("fuser", &["-k", &format!("{}/tcp", websocket_port)]),
            cmd("npm", &["ci"]),
            cmd("npm", &["run", "build"]),
            cmd("npm", &["run", "prod"]),
        ],
        ProjectIdentity::Server => vec![
            cmd("composer", &["install", "--optimize-autoloader"]),
            cmd("php", &["artisan", "cache:clear"]),
            cmd("php", &["artisan", "config:clear"]),
            cmd("php", &["artisan", "migrate:refresh", "--force"]),
            cmd("php", &["artisan", "db:seed", "--force"]),
            cmd("php", &["artisan", "config:cache"]),
        ],
    }
}
