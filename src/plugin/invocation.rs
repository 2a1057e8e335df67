//! Invocation handle passed to plugin and action logic.

use crate::context::{Context, Instance};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl LogLevel {
    /// Warning and above mark the emitting item as having a warning.
    pub fn is_warning_or_worse(self) -> bool {
        self >= LogLevel::Warning
    }
}

/// Log record emitted by plugin logic during one invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    pub level: LogLevel,
    pub message: String,
    pub created: DateTime<Utc>,
}

/// What plugin logic sees while it runs: the shared context, the instance it
/// was paired with (if any) and a sink for log records.
pub struct Invocation<'a> {
    plugin_id: &'a str,
    context: &'a mut Context,
    instance: Option<usize>,
    records: Vec<LogRecord>,
}

impl<'a> Invocation<'a> {
    pub(crate) fn new(plugin_id: &'a str, context: &'a mut Context, instance: Option<usize>) -> Self {
        Self {
            plugin_id,
            context,
            instance,
            records: Vec::new(),
        }
    }

    pub fn plugin_id(&self) -> &str {
        self.plugin_id
    }

    pub fn context(&self) -> &Context {
        self.context
    }

    pub fn context_mut(&mut self) -> &mut Context {
        self.context
    }

    pub fn instance(&self) -> Option<&Instance> {
        self.instance
            .and_then(|index| self.context.instances().get(index))
    }

    pub fn instance_mut(&mut self) -> Option<&mut Instance> {
        match self.instance {
            Some(index) => self.context.instance_at_mut(index),
            None => None,
        }
    }

    pub fn log(&mut self, level: LogLevel, message: impl Into<String>) {
        let message = message.into();
        match level {
            LogLevel::Debug => tracing::debug!(plugin = self.plugin_id, "{}", message),
            LogLevel::Info => tracing::info!(plugin = self.plugin_id, "{}", message),
            LogLevel::Warning => tracing::warn!(plugin = self.plugin_id, "{}", message),
            LogLevel::Error | LogLevel::Critical => {
                tracing::error!(plugin = self.plugin_id, "{}", message)
            }
        }
        self.records.push(LogRecord {
            level,
            message,
            created: Utc::now(),
        });
    }

    pub fn info(&mut self, message: impl Into<String>) {
        self.log(LogLevel::Info, message);
    }

    pub fn warning(&mut self, message: impl Into<String>) {
        self.log(LogLevel::Warning, message);
    }

    pub(crate) fn into_records(self) -> Vec<LogRecord> {
        self.records
    }
}
