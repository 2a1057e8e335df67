//! Plugin descriptor: ordering, activity and filtering metadata around plugin logic.

use crate::context::Instance;
use crate::error::{EngineFault, PluginError};
use crate::plugin::action::ActionDescriptor;
use crate::plugin::invocation::Invocation;
use crate::plugin::registry::DEFAULT_TARGET;
use crate::types::Order;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// Family that makes a plugin compatible with every instance.
pub const WILDCARD_FAMILY: &str = "*";

/// Processing logic of a plugin. Host supplied.
pub trait Plugin: Send + Sync {
    fn process(&self, invocation: &mut Invocation<'_>) -> Result<(), PluginError>;
}

impl<F> Plugin for F
where
    F: Fn(&mut Invocation<'_>) -> Result<(), PluginError> + Send + Sync,
{
    fn process(&self, invocation: &mut Invocation<'_>) -> Result<(), PluginError> {
        self(invocation)
    }
}

/// Descriptor for one plugin. Immutable for the duration of a run, apart from
/// the `active` toggle of optional plugins between commands.
#[derive(Clone)]
pub struct PluginDescriptor {
    pub id: String,
    pub label: Option<String>,
    pub order: Order,
    pub active: bool,
    pub optional: bool,
    /// Runs once per compatible instance instead of once on the context.
    pub instance_enabled: bool,
    pub families: Vec<String>,
    pub targets: Vec<String>,
    pub actions: Vec<ActionDescriptor>,
    logic: Arc<dyn Plugin>,
}

impl PluginDescriptor {
    pub fn new(id: impl Into<String>, order: impl Into<Order>, logic: impl Plugin + 'static) -> Self {
        Self::from_shared(id, order, Arc::new(logic))
    }

    pub fn from_shared(
        id: impl Into<String>,
        order: impl Into<Order>,
        logic: Arc<dyn Plugin>,
    ) -> Self {
        Self {
            id: id.into(),
            label: None,
            order: order.into(),
            active: true,
            optional: false,
            instance_enabled: false,
            families: vec![WILDCARD_FAMILY.to_string()],
            targets: vec![DEFAULT_TARGET.to_string()],
            actions: Vec::new(),
            logic,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn instance_enabled(mut self) -> Self {
        self.instance_enabled = true;
        self
    }

    pub fn with_active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn with_families<I, S>(mut self, families: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.families = families.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_targets<I, S>(mut self, targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.targets = targets.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_action(mut self, action: ActionDescriptor) -> Self {
        self.actions.push(action);
        self
    }

    pub fn logic(&self) -> &Arc<dyn Plugin> {
        &self.logic
    }

    pub fn display_name(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.id)
    }

    pub fn action(&self, action_id: &str) -> Option<&ActionDescriptor> {
        self.actions.iter().find(|a| a.id == action_id)
    }

    pub fn is_compatible(&self, instance: &Instance) -> bool {
        if self.accepts_any_family() {
            return true;
        }
        instance
            .families()
            .iter()
            .any(|family| self.families.iter().any(|f| f == family))
    }

    pub fn accepts_any_family(&self) -> bool {
        self.families.iter().any(|f| f == WILDCARD_FAMILY)
    }

    pub fn matches_targets(&self, targets: &[String]) -> bool {
        self.targets.iter().any(|t| targets.contains(t))
    }

    /// Structural checks a descriptor must pass before it may be scheduled.
    pub fn check(&self) -> Result<(), EngineFault> {
        let malformed = |reason: String| EngineFault::MalformedPlugin {
            plugin: self.id.clone(),
            reason,
        };
        if self.id.trim().is_empty() {
            return Err(malformed("plugin id cannot be empty".to_string()));
        }
        if !self.order.is_finite() {
            return Err(malformed(format!("order must be finite, got {}", self.order)));
        }
        if self.families.is_empty() {
            return Err(malformed("families cannot be empty".to_string()));
        }
        let mut seen = HashSet::new();
        for action in &self.actions {
            if !seen.insert(action.id.as_str()) {
                return Err(malformed(format!("duplicate action id '{}'", action.id)));
            }
        }
        Ok(())
    }

    pub fn to_ref(&self) -> PluginRef {
        PluginRef {
            id: self.id.clone(),
            label: self.display_name().to_string(),
            order: self.order,
        }
    }
}

impl fmt::Debug for PluginDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginDescriptor")
            .field("id", &self.id)
            .field("order", &self.order)
            .field("active", &self.active)
            .field("optional", &self.optional)
            .field("instance_enabled", &self.instance_enabled)
            .field("families", &self.families)
            .field("targets", &self.targets)
            .field("actions", &self.actions)
            .finish()
    }
}

/// Read-only snapshot of a plugin carried in notifications and results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginRef {
    pub id: String,
    pub label: String,
    pub order: Order,
}
