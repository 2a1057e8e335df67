//! Manifest registry: plugins described in TOML with scripted behaviour.
//!
//! Lets a pipeline's shape be rehearsed without host code: each plugin can
//! create instances, log, and fail on chosen instances.
//!
//! ```toml
//! [[plugin]]
//! id = "collect_shots"
//! order = 0.0
//!
//! [[plugin.create]]
//! id = "shot010"
//! family = "render"
//!
//! [[plugin]]
//! id = "validate_frames"
//! order = 1.0
//! instance_enabled = true
//! families = ["render"]
//! fail_instances = ["shot010"]
//! fail = "missing frames 1001-1004"
//!
//! [[plugin.action]]
//! id = "rerender"
//! on = "failed"
//! ```

use crate::context::Instance;
use crate::error::{ManifestError, PluginError, RegistryError};
use crate::plugin::{
    ActionDescriptor, ActionKind, ActionTrigger, Invocation, Plugin, PluginDescriptor,
    PluginRegistry, DEFAULT_TARGET, WILDCARD_FAMILY,
};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

const SCRIPTED_FAILURE: &str = "scripted failure";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default, rename = "plugin")]
    pub plugins: Vec<PluginManifest>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginManifest {
    pub id: String,
    #[serde(default)]
    pub label: Option<String>,
    pub order: f64,
    #[serde(default)]
    pub instance_enabled: bool,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default)]
    pub optional: bool,
    #[serde(default = "default_families")]
    pub families: Vec<String>,
    #[serde(default = "default_targets")]
    pub targets: Vec<String>,
    /// Instances this plugin adds to the context when it runs.
    #[serde(default, rename = "create")]
    pub creates: Vec<InstanceManifest>,
    #[serde(default)]
    pub info: Vec<String>,
    #[serde(default)]
    pub warn: Vec<String>,
    /// Error message. Without `fail_instances` every invocation fails.
    #[serde(default)]
    pub fail: Option<String>,
    #[serde(default)]
    pub fail_instances: Vec<String>,
    #[serde(default, rename = "action")]
    pub actions: Vec<ActionManifest>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceManifest {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub family: Option<String>,
    #[serde(default)]
    pub families: Vec<String>,
    #[serde(default = "default_true")]
    pub publish: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionManifest {
    pub id: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub kind: ActionKind,
    #[serde(default)]
    pub on: ActionTrigger,
    #[serde(default)]
    pub info: Vec<String>,
    #[serde(default)]
    pub fail: Option<String>,
}

fn default_true() -> bool {
    true
}

fn default_families() -> Vec<String> {
    vec![WILDCARD_FAMILY.to_string()]
}

fn default_targets() -> Vec<String> {
    vec![DEFAULT_TARGET.to_string()]
}

impl Manifest {
    pub fn parse(content: &str) -> Result<Self, ManifestError> {
        let manifest: Manifest = toml::from_str(content)?;
        manifest.validate()?;
        Ok(manifest)
    }

    pub fn load(path: &Path) -> Result<Self, ManifestError> {
        let content = std::fs::read_to_string(path).map_err(|source| ManifestError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content)
    }

    fn validate(&self) -> Result<(), ManifestError> {
        for plugin in &self.plugins {
            if plugin.id.trim().is_empty() {
                return Err(ManifestError::Invalid("plugin id cannot be empty".to_string()));
            }
            if !plugin.order.is_finite() {
                return Err(ManifestError::Invalid(format!(
                    "plugin '{}' has a non-finite order",
                    plugin.id
                )));
            }
            if let Some(instance) = plugin.creates.iter().find(|i| i.id.trim().is_empty()) {
                return Err(ManifestError::Invalid(format!(
                    "plugin '{}' creates an instance with an empty id (name {:?})",
                    plugin.id, instance.name
                )));
            }
        }
        Ok(())
    }

    pub fn descriptors(&self) -> Vec<PluginDescriptor> {
        self.plugins.iter().map(PluginManifest::descriptor).collect()
    }
}

impl PluginManifest {
    pub fn descriptor(&self) -> PluginDescriptor {
        let mut descriptor = PluginDescriptor::from_shared(
            self.id.clone(),
            self.order,
            Arc::new(ScriptedPlugin::from(self)),
        )
        .with_active(self.active)
        .with_families(self.families.iter().cloned())
        .with_targets(self.targets.iter().cloned());
        if let Some(label) = &self.label {
            descriptor = descriptor.with_label(label.clone());
        }
        if self.instance_enabled {
            descriptor = descriptor.instance_enabled();
        }
        if self.optional {
            descriptor = descriptor.optional();
        }
        for action in &self.actions {
            descriptor = descriptor.with_action(action.descriptor());
        }
        descriptor
    }
}

impl ActionManifest {
    fn descriptor(&self) -> ActionDescriptor {
        let label = self.label.clone().unwrap_or_else(|| self.id.clone());
        let descriptor = match self.kind {
            ActionKind::Action => ActionDescriptor::new(
                self.id.clone(),
                ScriptedAction {
                    info: self.info.clone(),
                    fail: self.fail.clone(),
                },
            )
            .with_label(label),
            ActionKind::Category => ActionDescriptor::category(self.id.clone(), label),
            ActionKind::Separator => ActionDescriptor::separator(self.id.clone()),
        };
        descriptor.on(self.on)
    }
}

impl InstanceManifest {
    fn instance(&self) -> Instance {
        let mut instance = Instance::new(self.id.clone()).with_publish(self.publish);
        if let Some(name) = &self.name {
            instance = instance.with_name(name.clone());
        }
        if let Some(family) = &self.family {
            instance = instance.with_family(family.clone());
        }
        if !self.families.is_empty() {
            instance = instance.with_families(self.families.iter().cloned());
        }
        instance
    }
}

/// Plugin logic replaying what the manifest describes.
#[derive(Debug, Clone)]
struct ScriptedPlugin {
    creates: Vec<InstanceManifest>,
    info: Vec<String>,
    warn: Vec<String>,
    fail: Option<String>,
    fail_instances: Vec<String>,
}

impl From<&PluginManifest> for ScriptedPlugin {
    fn from(manifest: &PluginManifest) -> Self {
        Self {
            creates: manifest.creates.clone(),
            info: manifest.info.clone(),
            warn: manifest.warn.clone(),
            fail: manifest.fail.clone(),
            fail_instances: manifest.fail_instances.clone(),
        }
    }
}

impl Plugin for ScriptedPlugin {
    fn process(&self, invocation: &mut Invocation<'_>) -> Result<(), PluginError> {
        for message in &self.info {
            invocation.info(message.clone());
        }
        for message in &self.warn {
            invocation.warning(message.clone());
        }
        for instance in &self.creates {
            invocation.context_mut().add_instance(instance.instance())?;
        }

        let fails = if self.fail_instances.is_empty() {
            self.fail.is_some()
        } else {
            invocation
                .instance()
                .map_or(false, |i| self.fail_instances.contains(&i.id))
        };
        if fails {
            let message = self.fail.as_deref().unwrap_or(SCRIPTED_FAILURE);
            return Err(PluginError::new(message));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
struct ScriptedAction {
    info: Vec<String>,
    fail: Option<String>,
}

impl crate::plugin::Action for ScriptedAction {
    fn run(&self, invocation: &mut Invocation<'_>) -> Result<(), PluginError> {
        for message in &self.info {
            invocation.info(message.clone());
        }
        match &self.fail {
            Some(message) => Err(PluginError::new(message.clone())),
            None => Ok(()),
        }
    }
}

/// Registry backed by a manifest. A file-backed registry re-reads the file on
/// every discovery, so edits show up at the next reset.
pub struct ManifestRegistry {
    path: Option<PathBuf>,
    manifest: RwLock<Manifest>,
}

impl ManifestRegistry {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, ManifestError> {
        let path = path.into();
        let manifest = Manifest::load(&path)?;
        Ok(Self {
            path: Some(path),
            manifest: RwLock::new(manifest),
        })
    }

    pub fn from_manifest(manifest: Manifest) -> Self {
        Self {
            path: None,
            manifest: RwLock::new(manifest),
        }
    }

    pub fn manifest(&self) -> Manifest {
        self.manifest.read().clone()
    }
}

impl PluginRegistry for ManifestRegistry {
    fn discover(&self) -> Result<Vec<PluginDescriptor>, RegistryError> {
        if let Some(path) = &self.path {
            let manifest = Manifest::load(path)?;
            *self.manifest.write() = manifest;
        }
        Ok(self.manifest.read().descriptors())
    }
}
