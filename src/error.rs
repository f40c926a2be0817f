use std::io;

/// Custom error type for simple_merge_deploy operations
#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    #[error("Repository synchronization failed for '{repository}': {command}")]
    SyncFailed { repository: String, command: String },

    #[error("Deploy step {step} failed for '{repository}': {command}")]
    StepFailed {
        repository: String,
        step: usize,
        command: String,
    },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] io::Error),

    #[error("TOML parsing error: {0}")]
    TomlParseError(#[from] toml::de::Error),
}

/// Helper type for Results that use DeployError
pub type Result<T> = std::result::Result<T, DeployError>;
