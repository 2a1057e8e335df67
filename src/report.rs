//! Publish report: per-plugin and per-instance status built from engine
//! notifications, the data a front-end renders.

use crate::context::Context;
use crate::engine::{Engine, Listener, Notification, RunSummary};
use crate::pipeline::PublishResult;
use crate::plugin::{ActionDescriptor, ActionKind, LogRecord, PluginDescriptor, PluginRef};
use crate::types::Order;
use parking_lot::{Mutex, MutexGuard};
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Clone, Serialize)]
pub struct PluginStatus {
    pub plugin: PluginRef,
    pub active: bool,
    pub optional: bool,
    pub instance_enabled: bool,
    /// Has work to do against the current context.
    pub compatible: bool,
    pub in_progress: bool,
    pub processed: bool,
    /// Its order group was passed without it running.
    pub skipped: bool,
    pub has_warning: bool,
    pub has_error: bool,
    pub records: Vec<LogRecord>,
    #[serde(skip)]
    actions: Vec<ActionDescriptor>,
}

impl PluginStatus {
    fn new(plugin: PluginRef) -> Self {
        Self {
            plugin,
            active: true,
            optional: false,
            instance_enabled: false,
            compatible: false,
            in_progress: false,
            processed: false,
            skipped: false,
            has_warning: false,
            has_error: false,
            records: Vec::new(),
            actions: Vec::new(),
        }
    }

    fn clear_flags(&mut self) {
        self.compatible = false;
        self.in_progress = false;
        self.processed = false;
        self.skipped = false;
        self.has_warning = false;
        self.has_error = false;
        self.records.clear();
    }
}

/// Status of one instance. `id == None` is the row for the context itself,
/// which context-level plugins report against.
#[derive(Debug, Clone, Serialize)]
pub struct InstanceStatus {
    pub id: Option<String>,
    pub name: String,
    pub in_progress: bool,
    pub processed: bool,
    pub finished: bool,
    pub has_warning: bool,
    pub has_error: bool,
    pub records: Vec<LogRecord>,
}

impl InstanceStatus {
    fn new(id: Option<String>, name: String) -> Self {
        Self {
            id,
            name,
            in_progress: false,
            processed: false,
            finished: false,
            has_warning: false,
            has_error: false,
            records: Vec::new(),
        }
    }

    fn context_row() -> Self {
        Self::new(None, "Context".to_string())
    }

    fn apply(&mut self, result: &PublishResult) {
        self.in_progress = false;
        self.processed = true;
        self.has_warning |= result.has_warning();
        self.has_error |= !result.success;
        self.records.extend(result.records.iter().cloned());
    }
}

#[derive(Debug, Clone, Default)]
pub struct PublishReport {
    plugins: Vec<PluginStatus>,
    instances: Vec<InstanceStatus>,
    groups: Vec<Order>,
    last_summary: Option<RunSummary>,
}

impl PublishReport {
    pub fn new() -> Self {
        Self {
            instances: vec![InstanceStatus::context_row()],
            ..Self::default()
        }
    }

    pub fn shared() -> SharedReport {
        SharedReport(Arc::new(Mutex::new(Self::new())))
    }

    /// Pull plugin metadata, instances and compatibility from the engine.
    /// Flags gathered from notifications are kept.
    pub fn sync(&mut self, engine: &Engine) {
        self.track_plugins(engine.plugins());
        self.track_instances(engine.context());
        self.update_compatibility(engine.plugins(), engine.context());
    }

    pub fn track_plugins(&mut self, plugins: &[PluginDescriptor]) {
        for descriptor in plugins {
            let row = self.plugin_row(descriptor.to_ref());
            row.plugin = descriptor.to_ref();
            row.active = descriptor.active;
            row.optional = descriptor.optional;
            row.instance_enabled = descriptor.instance_enabled;
            row.actions = descriptor.actions.clone();
        }
        self.plugins
            .retain(|row| plugins.iter().any(|p| p.id == row.plugin.id));
        self.plugins.sort_by(|a, b| a.plugin.order.cmp(&b.plugin.order));
    }

    pub fn track_instances(&mut self, context: &Context) {
        for instance in context.instances() {
            let row = self.instance_row(Some(instance.id.as_str()), &instance.name);
            row.name = instance.name.clone();
        }
    }

    /// Recompute `compatible` for rows that have neither run nor been skipped.
    pub fn update_compatibility(&mut self, plugins: &[PluginDescriptor], context: &Context) {
        for descriptor in plugins {
            let Some(row) = self.plugins.iter_mut().find(|r| r.plugin.id == descriptor.id) else {
                continue;
            };
            if row.processed || row.skipped {
                continue;
            }
            let has_instance = context
                .instances()
                .iter()
                .any(|instance| instance.publish() && descriptor.is_compatible(instance));
            row.compatible = if descriptor.instance_enabled {
                has_instance
            } else {
                descriptor.accepts_any_family() || has_instance
            };
        }
    }

    pub fn plugins(&self) -> &[PluginStatus] {
        &self.plugins
    }

    pub fn plugin(&self, plugin_id: &str) -> Option<&PluginStatus> {
        self.plugins.iter().find(|r| r.plugin.id == plugin_id)
    }

    pub fn instances(&self) -> &[InstanceStatus] {
        &self.instances
    }

    pub fn instance(&self, instance_id: &str) -> Option<&InstanceStatus> {
        self.instances
            .iter()
            .find(|r| r.id.as_deref() == Some(instance_id))
    }

    pub fn context_status(&self) -> Option<&InstanceStatus> {
        self.instances.iter().find(|r| r.id.is_none())
    }

    pub fn last_summary(&self) -> Option<&RunSummary> {
        self.last_summary.as_ref()
    }

    /// Actions currently offered for a plugin.
    ///
    /// Only active, compatible plugins that were not skipped offer actions. Each
    /// action's trigger is checked against the plugin's outcome, and a category
    /// survives only when an action directly follows it.
    pub fn valid_actions(&self, plugin_id: &str) -> Vec<&ActionDescriptor> {
        let Some(row) = self.plugin(plugin_id) else {
            return Vec::new();
        };
        if !row.active || !row.compatible || row.skipped {
            return Vec::new();
        }

        let valid: Vec<&ActionDescriptor> = row
            .actions
            .iter()
            .filter(|action| action.on.applies(row.processed, row.has_error))
            .collect();

        valid
            .iter()
            .enumerate()
            .filter(|(index, action)| {
                action.kind != ActionKind::Category
                    || valid
                        .get(index + 1)
                        .map_or(false, |next| next.kind == ActionKind::Action)
            })
            .map(|(_, action)| *action)
            .collect()
    }

    pub fn actions_visible(&self, plugin_id: &str) -> bool {
        self.valid_actions(plugin_id)
            .iter()
            .any(|action| action.kind == ActionKind::Action)
    }

    fn plugin_row(&mut self, plugin: PluginRef) -> &mut PluginStatus {
        match self.plugins.iter().position(|r| r.plugin.id == plugin.id) {
            Some(index) => &mut self.plugins[index],
            None => {
                self.plugins.push(PluginStatus::new(plugin));
                let last = self.plugins.len() - 1;
                &mut self.plugins[last]
            }
        }
    }

    fn instance_row(&mut self, id: Option<&str>, name: &str) -> &mut InstanceStatus {
        match self.instances.iter().position(|r| r.id.as_deref() == id) {
            Some(index) => &mut self.instances[index],
            None => {
                self.instances
                    .push(InstanceStatus::new(id.map(str::to_string), name.to_string()));
                let last = self.instances.len() - 1;
                &mut self.instances[last]
            }
        }
    }

    fn group_of(&self, order: Order) -> Order {
        self.groups
            .iter()
            .rev()
            .find(|group| **group <= order)
            .copied()
            .unwrap_or(order)
    }

    fn on_reset(&mut self, groups: &[Order]) {
        self.groups = groups.to_vec();
        self.last_summary = None;
        self.instances = vec![InstanceStatus::context_row()];
        for row in &mut self.plugins {
            row.clear_flags();
        }
    }

    fn on_processed(&mut self, result: &PublishResult) {
        let row = self.plugin_row(result.plugin.clone());
        row.in_progress = false;
        row.processed = true;
        row.compatible = true;
        row.has_warning |= result.has_warning();
        row.has_error |= !result.success;
        row.records.extend(result.records.iter().cloned());

        let (id, name) = match &result.instance {
            Some(instance) => (Some(instance.id.as_str()), instance.name.as_str()),
            None => (None, "Context"),
        };
        self.instance_row(id, name).apply(result);
    }

    fn on_stage_passed(&mut self, passed: Order) {
        let groups: Vec<Order> = self
            .plugins
            .iter()
            .map(|row| self.group_of(row.plugin.order))
            .collect();
        for (row, group) in self.plugins.iter_mut().zip(groups) {
            if group <= passed && !row.processed {
                row.skipped = true;
            }
        }
    }

    fn on_finished(&mut self, summary: &RunSummary) {
        for row in &mut self.plugins {
            row.in_progress = false;
        }
        for row in &mut self.instances {
            row.in_progress = false;
            if row.processed {
                row.finished = true;
            }
        }
        self.last_summary = Some(summary.clone());
    }
}

impl Listener for PublishReport {
    fn on_notification(&mut self, notification: &Notification) {
        match notification {
            Notification::ResetComplete { groups, .. } => self.on_reset(groups),
            Notification::AboutToProcess { plugin, instance } => {
                self.plugin_row(plugin.clone()).in_progress = true;
                let row = match instance {
                    Some(instance) => self.instance_row(Some(instance.id.as_str()), &instance.name),
                    None => self.instance_row(None, "Context"),
                };
                row.in_progress = true;
            }
            Notification::Processed { result } => self.on_processed(result),
            Notification::StagePassed { order, .. } => self.on_stage_passed(*order),
            Notification::Finished { summary } => self.on_finished(summary),
            Notification::Acted { result } => {
                self.plugin_row(result.plugin.clone())
                    .records
                    .extend(result.records.iter().cloned());
            }
            Notification::PluginsDiscovered { .. } | Notification::Stopped { .. } => {}
        }
    }
}

/// A report shared between the engine (as a listener) and the host.
#[derive(Debug, Clone)]
pub struct SharedReport(Arc<Mutex<PublishReport>>);

impl SharedReport {
    pub fn lock(&self) -> MutexGuard<'_, PublishReport> {
        self.0.lock()
    }
}

impl Listener for SharedReport {
    fn on_notification(&mut self, notification: &Notification) {
        self.0.lock().on_notification(notification);
    }
}
