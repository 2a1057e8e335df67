//! CLI output: error mapping and text/json rendering of plans and runs.

use crate::engine::Notification;
use crate::error::{CliError, EngineFault};
use crate::pipeline::OrderGroups;
use crate::plugin::PluginDescriptor;
use crate::report::PublishReport;
use crate::types::{Order, Stage};
use serde::Serialize;
use std::fmt::Write as _;

/// Map command errors to a string for CLI output.
pub fn map_error(e: &CliError) -> String {
    match e {
        CliError::Fault(EngineFault::Registry { message }) => {
            format!("Could not load plugins: {}", message)
        }
        other => other.to_string(),
    }
}

#[derive(Debug, Serialize)]
pub struct PlanView {
    pub groups: Vec<GroupView>,
}

#[derive(Debug, Serialize)]
pub struct GroupView {
    pub order: Order,
    pub stage: Stage,
    pub plugins: Vec<PlanPluginView>,
}

#[derive(Debug, Serialize)]
pub struct PlanPluginView {
    pub id: String,
    pub label: String,
    pub order: Order,
    pub active: bool,
    pub optional: bool,
    pub instance_enabled: bool,
    pub families: Vec<String>,
}

impl PlanView {
    pub fn build(plugins: &[PluginDescriptor], groups: &OrderGroups) -> Self {
        let mut views: Vec<GroupView> = groups
            .orders()
            .iter()
            .map(|order| GroupView {
                order: *order,
                stage: groups.stage_of(*order),
                plugins: Vec::new(),
            })
            .collect();
        for plugin in plugins {
            let group = groups.group_of(plugin.order);
            let view = PlanPluginView {
                id: plugin.id.clone(),
                label: plugin.display_name().to_string(),
                order: plugin.order,
                active: plugin.active,
                optional: plugin.optional,
                instance_enabled: plugin.instance_enabled,
                families: plugin.families.clone(),
            };
            match views.iter_mut().find(|g| g.order == group) {
                Some(existing) => existing.plugins.push(view),
                // Inactive plugins contribute no group of their own.
                None => views.push(GroupView {
                    order: group,
                    stage: groups.stage_of(group),
                    plugins: vec![view],
                }),
            }
        }
        views.sort_by(|a, b| a.order.cmp(&b.order));
        Self { groups: views }
    }
}

pub fn format_plan_text(plan: &PlanView) -> String {
    if plan.groups.is_empty() {
        return "No plugins discovered.".to_string();
    }
    let mut out = String::new();
    for group in &plan.groups {
        let _ = writeln!(out, "group {} ({})", group.order, group.stage);
        for plugin in &group.plugins {
            let scope = if plugin.instance_enabled {
                "instance"
            } else {
                "context"
            };
            let mut flags = Vec::new();
            if !plugin.active {
                flags.push("inactive");
            }
            if plugin.optional {
                flags.push("optional");
            }
            let flags = if flags.is_empty() {
                String::new()
            } else {
                format!(" ({})", flags.join(", "))
            };
            let _ = writeln!(
                out,
                "  {:<6} {:<32} {:<8} [{}]{}",
                plugin.order.to_string(),
                plugin.label,
                scope,
                plugin.families.join(", "),
                flags
            );
        }
    }
    out.trim_end().to_string()
}

/// One line per notification worth showing.
pub fn format_notification_text(notification: &Notification) -> Option<String> {
    let line = match notification {
        Notification::ResetComplete { plugins, groups } => {
            format!("reset: {} plugins in {} order groups", plugins, groups.len())
        }
        Notification::PluginsDiscovered { plugins } => {
            format!("re-discovered: {} plugins", plugins)
        }
        Notification::AboutToProcess { .. } => return None,
        Notification::Processed { result } => {
            let target = result
                .instance
                .as_ref()
                .map(|i| i.name.as_str())
                .unwrap_or("context");
            let mut line = match &result.error {
                Some(error) => format!("  FAIL {} @ {}: {}", result.plugin.label, target, error),
                None => format!("  ok   {} @ {}", result.plugin.label, target),
            };
            for record in &result.records {
                let _ = write!(line, "\n       {:?}: {}", record.level, record.message);
            }
            line
        }
        Notification::StagePassed { order, stage } => {
            format!("passed {} group {}", stage, order)
        }
        Notification::Stopped { reason } => format!("stopped: {}", reason),
        Notification::Finished { summary } => {
            let mut line = format!(
                "finished {:?}: {} (processed {}, failed {})",
                summary.command, summary.termination, summary.processed, summary.failed
            );
            if let Some(fault) = &summary.fault {
                let _ = write!(line, "\n  fault: {}", fault);
            }
            line
        }
        Notification::Acted { result } => format!(
            "  action {} on {}: {}",
            result.action.as_deref().unwrap_or("?"),
            result.plugin.label,
            if result.success { "ok" } else { "failed" }
        ),
    };
    Some(line)
}

pub fn format_run_text(notifications: &[Notification], report: &PublishReport) -> String {
    let mut out: Vec<String> = notifications
        .iter()
        .filter_map(format_notification_text)
        .collect();

    let failed: Vec<&str> = report
        .plugins()
        .iter()
        .filter(|p| p.has_error)
        .map(|p| p.plugin.label.as_str())
        .collect();
    let warned = report.plugins().iter().filter(|p| p.has_warning).count();
    out.push(String::new());
    if failed.is_empty() {
        out.push(format!("No errors ({} plugins with warnings).", warned));
    } else {
        out.push(format!("Errors in: {}", failed.join(", ")));
    }
    out.join("\n")
}

pub fn format_run_json(notifications: &[Notification]) -> Result<String, CliError> {
    let lines: Result<Vec<String>, serde_json::Error> =
        notifications.iter().map(serde_json::to_string).collect();
    Ok(lines?.join("\n"))
}
