//! Configuration System
//!
//! Layered configuration for the publishing pipeline: built-in defaults, a global
//! file, a workspace file and `PUBFLOW__*` environment overrides, merged with the
//! `config` crate and validated before use.

use crate::error::ConfigError;
use crate::logging::LoggingConfig;
use crate::pipeline::StageOrders;
use crate::plugin::DEFAULT_TARGET;
use serde::{Deserialize, Serialize};
use std::time::Duration;

mod facade;
mod merge;
mod sources;

pub use facade::ConfigLoader;
pub use sources::global_file::global_config_path;
pub use sources::workspace_file::WORKSPACE_CONFIG_FILE;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PubflowConfig {
    #[serde(default)]
    pub pipeline: PipelineConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Pipeline behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Registered targets; plugins must share at least one to be discovered.
    #[serde(default = "default_targets")]
    pub targets: Vec<String>,

    /// Orders at which validation, extraction and conform begin.
    #[serde(default)]
    pub stage_orders: StageOrders,

    /// Delay handed back to the host scheduler between steps.
    #[serde(default = "default_step_delay_ms")]
    pub step_delay_ms: u64,

    /// Keep optional-plugin and instance toggles across reset.
    #[serde(default = "default_true")]
    pub preserve_toggles: bool,
}

fn default_targets() -> Vec<String> {
    vec![DEFAULT_TARGET.to_string()]
}

fn default_step_delay_ms() -> u64 {
    10
}

fn default_true() -> bool {
    true
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            targets: default_targets(),
            stage_orders: StageOrders::default(),
            step_delay_ms: default_step_delay_ms(),
            preserve_toggles: default_true(),
        }
    }
}

impl PipelineConfig {
    pub fn step_delay(&self) -> Duration {
        Duration::from_millis(self.step_delay_ms)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.targets.is_empty() {
            return Err("at least one target must be registered".to_string());
        }
        if self.targets.iter().any(|t| t.trim().is_empty()) {
            return Err("targets cannot be blank".to_string());
        }
        self.stage_orders.validate()
    }
}

impl PubflowConfig {
    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.pipeline
            .validate()
            .map_err(|e| ConfigError::Invalid(format!("pipeline: {}", e)))?;
        self.logging
            .validate()
            .map_err(|e| ConfigError::Invalid(format!("logging: {}", e)))
    }
}
