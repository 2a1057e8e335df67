//! Pair sequencer: a resumable, pull-based producer of (plugin, instance) pairs.
//!
//! The sequencer owns only its cursor. Plugins, context, order groups and the
//! processing state are lent to it on every pull, so the same cursor can be
//! resumed by successive commands within one reset cycle and inspected or
//! tested without an engine around it.

use crate::context::{Context, Instance};
use crate::pipeline::order_groups::OrderGroups;
use crate::pipeline::state::{ProcessingState, StopPredicate};
use crate::plugin::PluginDescriptor;
use crate::types::{Order, Stage};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

/// How far the current command may run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunUntil {
    Collect,
    Validate,
    Publish,
}

impl RunUntil {
    /// Last stage the command may enter.
    pub fn last_stage(self) -> Stage {
        match self {
            RunUntil::Collect => Stage::Collect,
            RunUntil::Validate => Stage::Validate,
            RunUntil::Publish => Stage::Conform,
        }
    }
}

/// One scheduling unit. `plugin_index` points into the plugin list the pair
/// was produced from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pair {
    pub plugin_index: usize,
    pub plugin_id: String,
    pub order: Order,
    pub instance_id: Option<String>,
}

/// Why a command's sequence ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", content = "message", rename_all = "snake_case")]
pub enum Termination {
    /// Collect-only run reached the end of collection.
    Collected,
    /// Stop-on-validation run reached the end of validation.
    Validated,
    /// A stop request was honored.
    Stopped,
    /// The stop predicate returned this reason.
    Aborted(String),
    /// No plugins left.
    Exhausted,
}

impl Termination {
    /// Terminations reported through a `Stopped` notification.
    pub fn is_stop(&self) -> bool {
        matches!(self, Termination::Stopped | Termination::Aborted(_))
    }
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Termination::Collected => f.write_str("collected"),
            Termination::Validated => f.write_str("validated"),
            Termination::Stopped => f.write_str("stopped"),
            Termination::Aborted(reason) => write!(f, "stopped due to {}", reason),
            Termination::Exhausted => f.write_str("finished"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SequencerStep {
    Pair(Pair),
    /// The cursor left the group at `order`.
    StagePassed { order: Order, stage: Stage },
    Finished(Termination),
}

/// Explicit cursor state. Survives across commands until the next reset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SequencerCursor {
    /// Next plugin to consider.
    pub plugin_index: usize,
    /// Group the cursor is in; `None` before the first plugin.
    pub group: Option<Order>,
    /// Expanded pairs of the current plugin not yet handed out.
    pub pending: VecDeque<Pair>,
    pub collected: bool,
    pub validated: bool,
    /// Final group notification already emitted after exhaustion.
    pub final_group_passed: bool,
}

/// Everything a pull needs besides the cursor.
pub struct SequencerInput<'a> {
    pub plugins: &'a [PluginDescriptor],
    pub context: &'a Context,
    pub groups: &'a OrderGroups,
    pub state: &'a mut ProcessingState,
    pub predicate: &'a dyn StopPredicate,
    pub until: RunUntil,
    pub stop_requested: bool,
}

#[derive(Debug, Clone, Default)]
pub struct PairSequencer {
    cursor: SequencerCursor,
}

impl PairSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_cursor(cursor: SequencerCursor) -> Self {
        Self { cursor }
    }

    pub fn cursor(&self) -> &SequencerCursor {
        &self.cursor
    }

    pub fn has_more(&self, plugins: &[PluginDescriptor]) -> bool {
        !self.cursor.pending.is_empty() || self.cursor.plugin_index < plugins.len()
    }

    /// Put a pair back at the front, e.g. when a stop arrived before it ran.
    pub fn requeue(&mut self, pair: Pair) {
        self.cursor.pending.push_front(pair);
    }

    /// Pull the next step. Deterministic for identical inputs.
    pub fn next_step(&mut self, input: SequencerInput<'_>) -> SequencerStep {
        let SequencerInput {
            plugins,
            context,
            groups,
            state,
            predicate,
            until,
            stop_requested,
        } = input;

        loop {
            if let Some(pair) = self.cursor.pending.front() {
                let order = pair.order;
                if let Some(instance_id) = pair.instance_id.as_deref() {
                    if !context.instance(instance_id).map_or(false, Instance::publish) {
                        tracing::debug!(
                            plugin = %pair.plugin_id,
                            instance = instance_id,
                            "Queued instance no longer published, dropping pair"
                        );
                        self.cursor.pending.pop_front();
                        continue;
                    }
                }
                if let Some(termination) = self.stage_limit(groups.stage_of(order), state, until) {
                    return SequencerStep::Finished(termination);
                }
                if let Some(termination) = gate(order, state, predicate, stop_requested) {
                    return SequencerStep::Finished(termination);
                }
                if let Some(pair) = self.cursor.pending.pop_front() {
                    return SequencerStep::Pair(pair);
                }
            }

            let Some(plugin) = plugins.get(self.cursor.plugin_index) else {
                return self.exhausted(groups);
            };
            let order = plugin.order;

            let group = groups.group_of(order);
            if self.cursor.group.map_or(true, |current| group > current) {
                let previous = self.cursor.group.replace(group);
                state.current_order = Some(group);
                // Plugins appended after exhaustion: the last group was already reported.
                let already_passed = std::mem::take(&mut self.cursor.final_group_passed);
                if let (Some(previous), false) = (previous, already_passed) {
                    return SequencerStep::StagePassed {
                        order: previous,
                        stage: groups.stage_of(previous),
                    };
                }
            }

            if let Some(termination) = self.stage_limit(groups.stage_of(order), state, until) {
                return SequencerStep::Finished(termination);
            }
            if let Some(termination) = gate(order, state, predicate, stop_requested) {
                return SequencerStep::Finished(termination);
            }

            self.cursor.plugin_index += 1;
            let plugin_index = self.cursor.plugin_index - 1;

            if !plugin.active {
                tracing::debug!(plugin = %plugin.id, "Plugin inactive, skipping");
                continue;
            }

            let mut expanded = expand(plugin_index, plugin, context);
            if expanded.is_empty() {
                continue;
            }
            let first = expanded.remove(0);
            self.cursor.pending.extend(expanded);
            return SequencerStep::Pair(first);
        }
    }

    /// Ends the command before anything in `stage` runs if the command stops short of it.
    fn stage_limit(
        &mut self,
        stage: Stage,
        state: &ProcessingState,
        until: RunUntil,
    ) -> Option<Termination> {
        if stage > Stage::Collect && until == RunUntil::Collect {
            self.cursor.collected = true;
            return Some(Termination::Collected);
        }
        if stage > Stage::Validate && (until == RunUntil::Validate || state.stop_on_validation) {
            self.cursor.validated = true;
            return Some(Termination::Validated);
        }
        None
    }

    fn exhausted(&mut self, groups: &OrderGroups) -> SequencerStep {
        if !self.cursor.final_group_passed {
            self.cursor.final_group_passed = true;
            if let Some(order) = self.cursor.group {
                return SequencerStep::StagePassed {
                    order,
                    stage: groups.stage_of(order),
                };
            }
        }
        SequencerStep::Finished(Termination::Exhausted)
    }
}

/// Stop request and stop predicate, checked before anything at `order` runs.
fn gate(
    order: Order,
    state: &mut ProcessingState,
    predicate: &dyn StopPredicate,
    stop_requested: bool,
) -> Option<Termination> {
    if stop_requested {
        return Some(Termination::Stopped);
    }
    state.next_order = Some(order);
    predicate
        .test(state)
        .filter(|reason| !reason.is_empty())
        .map(Termination::Aborted)
}

/// Pairs a plugin yields against the context as it is right now.
fn expand(plugin_index: usize, plugin: &PluginDescriptor, context: &Context) -> Vec<Pair> {
    let pair = |instance_id: Option<String>| Pair {
        plugin_index,
        plugin_id: plugin.id.clone(),
        order: plugin.order,
        instance_id,
    };

    if plugin.instance_enabled {
        let mut pairs = Vec::new();
        for instance in context.instances() {
            if !plugin.is_compatible(instance) {
                continue;
            }
            if !instance.publish() {
                tracing::debug!(plugin = %plugin.id, instance = %instance.id, "Instance not published, skipping");
                continue;
            }
            pairs.push(pair(Some(instance.id.clone())));
        }
        return pairs;
    }

    let compatible = plugin.accepts_any_family()
        || context
            .instances()
            .iter()
            .any(|instance| instance.publish() && plugin.is_compatible(instance));
    if compatible {
        vec![pair(None)]
    } else {
        tracing::debug!(plugin = %plugin.id, "No compatible instances, skipping context plugin");
        Vec::new()
    }
}
