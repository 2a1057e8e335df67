//! Plugin registry port and discovery post-processing.

use crate::error::{EngineFault, RegistryError};
use crate::plugin::descriptor::PluginDescriptor;
use parking_lot::RwLock;
use std::collections::HashSet;

/// Target registered when the host registers none.
pub const DEFAULT_TARGET: &str = "default";

/// Source of plugin descriptors. Queried on every reset and again after collection.
pub trait PluginRegistry: Send + Sync {
    fn discover(&self) -> Result<Vec<PluginDescriptor>, RegistryError>;
}

/// In-memory registry; plugins registered here are returned in registration order.
#[derive(Default)]
pub struct StaticRegistry {
    plugins: RwLock<Vec<PluginDescriptor>>,
}

impl StaticRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_plugins(plugins: Vec<PluginDescriptor>) -> Self {
        Self {
            plugins: RwLock::new(plugins),
        }
    }

    /// Register a plugin, replacing any previous plugin with the same id.
    pub fn register(&self, plugin: PluginDescriptor) {
        let mut plugins = self.plugins.write();
        if let Some(existing) = plugins.iter_mut().find(|p| p.id == plugin.id) {
            *existing = plugin;
        } else {
            plugins.push(plugin);
        }
    }

    pub fn deregister(&self, plugin_id: &str) {
        self.plugins.write().retain(|p| p.id != plugin_id);
    }

    pub fn len(&self) -> usize {
        self.plugins.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.read().is_empty()
    }
}

impl PluginRegistry for StaticRegistry {
    fn discover(&self) -> Result<Vec<PluginDescriptor>, RegistryError> {
        Ok(self.plugins.read().clone())
    }
}

/// Validate discovered plugins, keep those matching `targets`, and sort them by
/// order. The sort is stable so registry order survives within equal orders.
pub fn prepare_plugins(
    discovered: Vec<PluginDescriptor>,
    targets: &[String],
) -> Result<Vec<PluginDescriptor>, EngineFault> {
    let mut seen = HashSet::new();
    for plugin in &discovered {
        plugin.check()?;
        if !seen.insert(plugin.id.clone()) {
            return Err(EngineFault::MalformedPlugin {
                plugin: plugin.id.clone(),
                reason: "plugin id registered more than once".to_string(),
            });
        }
    }

    let mut plugins: Vec<PluginDescriptor> = discovered
        .into_iter()
        .filter(|plugin| {
            let keep = plugin.matches_targets(targets);
            if !keep {
                tracing::debug!(plugin = %plugin.id, targets = ?plugin.targets, "Plugin excluded by targets");
            }
            keep
        })
        .collect();
    plugins.sort_by(|a, b| a.order.cmp(&b.order));
    Ok(plugins)
}
