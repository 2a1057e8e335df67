//! Error types for the publishing pipeline.
//!
//! Plugin failures and orchestration faults are kept disjoint: a [`PluginError`]
//! is recorded on a result and the run carries on, an [`EngineFault`] ends the
//! current run and is surfaced through its `Finished` notification.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure raised by plugin or action logic while it runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{message}")]
pub struct PluginError {
    pub message: String,
    /// Outermost first; one entry per cause in the error chain.
    #[serde(default)]
    pub traceback: Vec<String>,
}

impl PluginError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            traceback: Vec::new(),
        }
    }

    pub fn with_traceback(mut self, frames: impl IntoIterator<Item = String>) -> Self {
        self.traceback.extend(frames);
        self
    }
}

impl From<anyhow::Error> for PluginError {
    fn from(err: anyhow::Error) -> Self {
        let traceback = err.chain().skip(1).map(|cause| cause.to_string()).collect();
        PluginError {
            message: err.to_string(),
            traceback,
        }
    }
}

impl From<ContextError> for PluginError {
    fn from(err: ContextError) -> Self {
        PluginError::new(err.to_string())
    }
}

/// Context mutation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContextError {
    #[error("Instance already exists in context: {0}")]
    DuplicateInstance(String),

    #[error("Instance not found in context: {0}")]
    InstanceNotFound(String),
}

/// Plugin registry errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("Plugin discovery failed: {0}")]
    DiscoveryFailed(String),

    #[error("Manifest error: {0}")]
    Manifest(String),
}

impl From<ManifestError> for RegistryError {
    fn from(err: ManifestError) -> Self {
        RegistryError::Manifest(err.to_string())
    }
}

/// Defect in the orchestration itself. Always fatal to the current run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EngineFault {
    #[error("Plugin registry failure: {message}")]
    Registry { message: String },

    #[error("Malformed plugin '{plugin}': {reason}")]
    MalformedPlugin { plugin: String, reason: String },

    #[error("Plugin '{plugin}' was paired with instance '{instance}' which is no longer in the context")]
    MissingInstance { plugin: String, instance: String },

    #[error("Plugin '{plugin}' panicked: {message}")]
    PluginPanicked { plugin: String, message: String },
}

impl From<RegistryError> for EngineFault {
    fn from(err: RegistryError) -> Self {
        EngineFault::Registry {
            message: err.to_string(),
        }
    }
}

/// Command rejected by the engine before anything was scheduled.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("A run is already in progress; stop it or wait for it to finish")]
    Busy,

    #[error("Engine has not been reset; call reset() first")]
    NotReset,

    #[error("Plugin not found: {0}")]
    UnknownPlugin(String),

    #[error("Action '{action}' not found on plugin '{plugin}'")]
    UnknownAction { plugin: String, action: String },

    #[error("Action '{action}' on plugin '{plugin}' is a {kind} and cannot be run")]
    ActionNotRunnable {
        plugin: String,
        action: String,
        kind: String,
    },

    #[error("Plugin '{0}' is not optional; its active state cannot be changed")]
    NotOptional(String),

    #[error("Instance not found: {0}")]
    UnknownInstance(String),
}

/// Manifest loading errors
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("Failed to read manifest {path}: {source}")]
    Read {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse manifest: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid manifest: {0}")]
    Invalid(String),
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration error: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Errors surfaced by CLI commands
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Fault(#[from] EngineFault),

    #[error("Failed to render output: {0}")]
    Output(#[from] serde_json::Error),
}
