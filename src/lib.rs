pub mod deploy;
pub mod error;
pub mod handlers;
pub mod project;
pub mod runner;
pub mod webhook;

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::deploy::Deployer;
use crate::error::DeployError;

const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:4000";
const DEFAULT_WEBSOCKET_PORT: &str = "3000";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct DeployConfig {
    pub addr: Option<String>,
    pub secret: Option<String>,
    pub dir: Option<String>,
    pub websocket_port: Option<String>,
    pub ssl: Option<bool>,
    pub ssl_crt: Option<String>,
    pub ssl_key: Option<String>,
}

impl DeployConfig {
    /// Returns the address the HTTP server should bind to.
    pub fn listen_addr(&self) -> &str {
        self.addr.as_deref().unwrap_or(DEFAULT_LISTEN_ADDR)
    }

    /// Returns the shared webhook secret used for signature verification.
    pub fn secret(&self) -> &str {
        self.secret.as_deref().unwrap_or("")
    }

    /// Returns the base directory under which project workspaces live.
    /// Each known project occupies `{dir}/{project name}`.
    pub fn workspace_base(&self) -> &Path {
        Path::new(self.dir.as_deref().unwrap_or("."))
    }

    /// Returns the TCP port freed before the websocket project's deploy
    /// sequence runs.
    pub fn websocket_port(&self) -> &str {
        self.websocket_port
            .as_deref()
            .unwrap_or(DEFAULT_WEBSOCKET_PORT)
    }

    /// Returns true if the server should terminate TLS itself.
    pub fn use_ssl(&self) -> bool {
        self.ssl.unwrap_or(false)
    }

    /// Returns the certificate and key paths for TLS serving.
    /// Both must be configured when `ssl = true`.
    pub fn tls_paths(&self) -> Result<(PathBuf, PathBuf), DeployError> {
        let crt = self.ssl_crt.as_deref().ok_or_else(|| {
            DeployError::ConfigError("ssl is enabled but 'ssl_crt' is not set".to_string())
        })?;
        let key = self.ssl_key.as_deref().ok_or_else(|| {
            DeployError::ConfigError("ssl is enabled but 'ssl_key' is not set".to_string())
        })?;
        Ok((PathBuf::from(crt), PathBuf::from(key)))
    }
}

pub struct AppState {
    pub config: DeployConfig,
    pub deployer: Deployer,
}

pub type SharedState = Arc<AppState>;
