//! Publishing context: the session-wide data map and its collected instances.

use crate::error::ContextError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const KEY_PUBLISH: &str = "publish";
pub const KEY_FAMILY: &str = "family";
pub const KEY_FAMILIES: &str = "families";
pub const KEY_COMMENT: &str = "comment";
pub const KEY_INTENT: &str = "intent";

/// One publishable unit produced by a collector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instance {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub data: Map<String, Value>,
}

impl Instance {
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            data: Map::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_family(mut self, family: impl Into<String>) -> Self {
        self.data
            .insert(KEY_FAMILY.to_string(), Value::String(family.into()));
        self
    }

    pub fn with_families<I, S>(mut self, families: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let families = families
            .into_iter()
            .map(|f| Value::String(f.into()))
            .collect();
        self.data
            .insert(KEY_FAMILIES.to_string(), Value::Array(families));
        self
    }

    pub fn with_publish(mut self, publish: bool) -> Self {
        self.set_publish(publish);
        self
    }

    pub fn with_data(mut self, key: impl Into<String>, value: Value) -> Self {
        self.data.insert(key.into(), value);
        self
    }

    /// Instances publish unless their `publish` flag is explicitly `false`.
    pub fn publish(&self) -> bool {
        !matches!(self.data.get(KEY_PUBLISH), Some(Value::Bool(false)))
    }

    pub fn set_publish(&mut self, publish: bool) {
        self.data
            .insert(KEY_PUBLISH.to_string(), Value::Bool(publish));
    }

    /// Primary family followed by any additional families, deduplicated.
    pub fn families(&self) -> Vec<&str> {
        let mut families: Vec<&str> = Vec::new();
        if let Some(Value::String(family)) = self.data.get(KEY_FAMILY) {
            families.push(family.as_str());
        }
        if let Some(Value::Array(extra)) = self.data.get(KEY_FAMILIES) {
            for family in extra.iter().filter_map(Value::as_str) {
                if !families.contains(&family) {
                    families.push(family);
                }
            }
        }
        families
    }
}

/// Status flags the engine derives while processing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextStatus {
    pub is_processing: bool,
    pub has_failed: bool,
    pub has_succeeded: bool,
}

/// The publishing session. Instances keep their insertion order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Context {
    instances: Vec<Instance>,
    #[serde(default)]
    data: Map<String, Value>,
    #[serde(default)]
    status: ContextStatus,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an instance; identifiers are unique within a context.
    pub fn add_instance(&mut self, instance: Instance) -> Result<&mut Instance, ContextError> {
        if self.position(&instance.id).is_some() {
            return Err(ContextError::DuplicateInstance(instance.id));
        }
        self.instances.push(instance);
        let last = self.instances.len() - 1;
        Ok(&mut self.instances[last])
    }

    pub fn instances(&self) -> &[Instance] {
        &self.instances
    }

    pub fn instance(&self, id: &str) -> Option<&Instance> {
        self.instances.iter().find(|i| i.id == id)
    }

    pub fn instance_mut(&mut self, id: &str) -> Option<&mut Instance> {
        self.instances.iter_mut().find(|i| i.id == id)
    }

    pub(crate) fn position(&self, id: &str) -> Option<usize> {
        self.instances.iter().position(|i| i.id == id)
    }

    pub(crate) fn instance_at_mut(&mut self, index: usize) -> Option<&mut Instance> {
        self.instances.get_mut(index)
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    pub fn data(&self) -> &Map<String, Value> {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.data
    }

    pub fn comment(&self) -> Option<&str> {
        self.data.get(KEY_COMMENT).and_then(Value::as_str)
    }

    pub fn set_comment(&mut self, comment: impl Into<String>) {
        self.data
            .insert(KEY_COMMENT.to_string(), Value::String(comment.into()));
    }

    pub fn intent(&self) -> Option<&str> {
        self.data.get(KEY_INTENT).and_then(Value::as_str)
    }

    /// `None` clears the intent ("not set").
    pub fn set_intent(&mut self, intent: Option<String>) {
        match intent {
            Some(value) => {
                self.data.insert(KEY_INTENT.to_string(), Value::String(value));
            }
            None => {
                self.data.remove(KEY_INTENT);
            }
        }
    }

    pub fn status(&self) -> ContextStatus {
        self.status
    }

    pub(crate) fn status_mut(&mut self) -> &mut ContextStatus {
        &mut self.status
    }
}
