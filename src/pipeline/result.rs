use crate::context::Instance;
use crate::error::PluginError;
use crate::plugin::{LogRecord, PluginRef};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceRef {
    pub id: String,
    pub name: String,
}

impl From<&Instance> for InstanceRef {
    fn from(instance: &Instance) -> Self {
        Self {
            id: instance.id.clone(),
            name: instance.name.clone(),
        }
    }
}

/// Outcome of one plugin (or action) invocation. Never modified once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishResult {
    pub plugin: PluginRef,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance: Option<InstanceRef>,
    /// Set when the result comes from an action rather than processing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<PluginError>,
    #[serde(default)]
    pub records: Vec<LogRecord>,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u128,
}

impl PublishResult {
    pub fn has_warning(&self) -> bool {
        self.records.iter().any(|r| r.level.is_warning_or_worse())
    }
}
