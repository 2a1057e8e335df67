//! Named actions a plugin exposes for running on demand.

use crate::error::PluginError;
use crate::plugin::invocation::Invocation;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Logic behind a runnable action.
pub trait Action: Send + Sync {
    fn run(&self, invocation: &mut Invocation<'_>) -> Result<(), PluginError>;
}

impl<F> Action for F
where
    F: Fn(&mut Invocation<'_>) -> Result<(), PluginError> + Send + Sync,
{
    fn run(&self, invocation: &mut Invocation<'_>) -> Result<(), PluginError> {
        self(invocation)
    }
}

/// When an action is offered, relative to its plugin's processing outcome.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ActionTrigger {
    #[default]
    All,
    Failed,
    Succeeded,
    Processed,
    NotProcessed,
}

impl ActionTrigger {
    pub fn applies(self, processed: bool, has_error: bool) -> bool {
        match self {
            ActionTrigger::All => true,
            ActionTrigger::Failed => has_error,
            ActionTrigger::Succeeded => processed && !has_error,
            ActionTrigger::Processed => processed,
            ActionTrigger::NotProcessed => !processed,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    #[default]
    Action,
    Category,
    Separator,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ActionKind::Action => "action",
            ActionKind::Category => "category",
            ActionKind::Separator => "separator",
        };
        f.write_str(name)
    }
}

#[derive(Clone)]
pub struct ActionDescriptor {
    pub id: String,
    pub label: Option<String>,
    pub on: ActionTrigger,
    pub kind: ActionKind,
    logic: Option<Arc<dyn Action>>,
}

impl ActionDescriptor {
    pub fn new(id: impl Into<String>, logic: impl Action + 'static) -> Self {
        Self {
            id: id.into(),
            label: None,
            on: ActionTrigger::All,
            kind: ActionKind::Action,
            logic: Some(Arc::new(logic)),
        }
    }

    /// Menu heading grouping the actions that follow it.
    pub fn category(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: Some(label.into()),
            on: ActionTrigger::All,
            kind: ActionKind::Category,
            logic: None,
        }
    }

    pub fn separator(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: None,
            on: ActionTrigger::All,
            kind: ActionKind::Separator,
            logic: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn on(mut self, trigger: ActionTrigger) -> Self {
        self.on = trigger;
        self
    }

    pub fn logic(&self) -> Option<&Arc<dyn Action>> {
        self.logic.as_ref()
    }
}

impl fmt::Debug for ActionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionDescriptor")
            .field("id", &self.id)
            .field("label", &self.label)
            .field("on", &self.on)
            .field("kind", &self.kind)
            .finish()
    }
}
