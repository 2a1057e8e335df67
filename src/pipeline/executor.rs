//! Executor: runs exactly one pair against the shared context.

use crate::context::Context;
use crate::error::{EngineFault, PluginError};
use crate::pipeline::result::{InstanceRef, PublishResult};
use crate::pipeline::sequencer::Pair;
use crate::pipeline::state::ProcessingState;
use crate::plugin::{Invocation, LogRecord, PluginDescriptor};
use chrono::{DateTime, Utc};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

/// Raw outcome of running plugin or action logic once.
pub(crate) struct Outcome {
    pub error: Option<PluginError>,
    pub records: Vec<LogRecord>,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u128,
}

/// Run `logic` inside an invocation. A panic comes back as `Err(message)`.
pub(crate) fn invoke<F>(
    plugin_id: &str,
    context: &mut Context,
    instance: Option<usize>,
    logic: F,
) -> Result<Outcome, String>
where
    F: FnOnce(&mut Invocation<'_>) -> Result<(), PluginError>,
{
    let started_at = Utc::now();
    let timer = Instant::now();
    let mut invocation = Invocation::new(plugin_id, context, instance);
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| logic(&mut invocation)));
    let records = invocation.into_records();
    let duration_ms = timer.elapsed().as_millis();
    match outcome {
        Ok(result) => Ok(Outcome {
            error: result.err(),
            records,
            started_at,
            duration_ms,
        }),
        Err(payload) => Err(panic_message(payload)),
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Runs single pairs. Plugin errors land on the result; plumbing failures are faults.
pub struct Executor;

impl Executor {
    pub fn execute(
        plugin: &PluginDescriptor,
        pair: &Pair,
        context: &mut Context,
        state: &mut ProcessingState,
    ) -> Result<PublishResult, EngineFault> {
        if plugin.id != pair.plugin_id {
            return Err(EngineFault::MalformedPlugin {
                plugin: pair.plugin_id.clone(),
                reason: format!("pair resolved to a different plugin '{}'", plugin.id),
            });
        }
        state.next_order = Some(plugin.order);

        let instance_index = match &pair.instance_id {
            Some(instance_id) => Some(context.position(instance_id).ok_or_else(|| {
                EngineFault::MissingInstance {
                    plugin: plugin.id.clone(),
                    instance: instance_id.clone(),
                }
            })?),
            None => None,
        };
        let instance_ref =
            instance_index.map(|index| InstanceRef::from(&context.instances()[index]));

        let logic = Arc::clone(plugin.logic());
        let outcome = invoke(&plugin.id, context, instance_index, |invocation| {
            logic.process(invocation)
        })
        .map_err(|message| EngineFault::PluginPanicked {
            plugin: plugin.id.clone(),
            message,
        })?;

        state.last_plugin_order = Some(plugin.order);
        if let Some(error) = &outcome.error {
            state.orders_with_error.insert(plugin.order);
            tracing::warn!(
                plugin = %plugin.id,
                instance = pair.instance_id.as_deref().unwrap_or("-"),
                error = %error,
                "Plugin reported an error"
            );
        }

        Ok(PublishResult {
            plugin: plugin.to_ref(),
            instance: instance_ref,
            action: None,
            success: outcome.error.is_none(),
            error: outcome.error,
            records: outcome.records,
            started_at: outcome.started_at,
            duration_ms: outcome.duration_ms,
        })
    }
}
