//! Runs a single named action on a plugin, outside normal sequencing.

use crate::context::Context;
use crate::error::{EngineError, PluginError};
use crate::pipeline::executor::invoke;
use crate::pipeline::result::PublishResult;
use crate::plugin::{Action, ActionDescriptor, ActionKind, PluginDescriptor};
use std::sync::Arc;

pub struct ActionRunner;

impl ActionRunner {
    /// Resolve `action_id` on `plugin` to runnable logic.
    pub fn resolve<'p>(
        plugin: &'p PluginDescriptor,
        action_id: &str,
    ) -> Result<&'p Arc<dyn Action>, EngineError> {
        let action: &ActionDescriptor =
            plugin
                .action(action_id)
                .ok_or_else(|| EngineError::UnknownAction {
                    plugin: plugin.id.clone(),
                    action: action_id.to_string(),
                })?;
        match (action.kind, action.logic()) {
            (ActionKind::Action, Some(logic)) => Ok(logic),
            (kind, _) => Err(EngineError::ActionNotRunnable {
                plugin: plugin.id.clone(),
                action: action_id.to_string(),
                kind: kind.to_string(),
            }),
        }
    }

    /// Run the action against the context. Processing state is left alone.
    ///
    /// Actions run outside any command, so a panic has no run to end: it is
    /// reported as an error on the result instead.
    pub fn run(
        plugin: &PluginDescriptor,
        action_id: &str,
        context: &mut Context,
    ) -> Result<PublishResult, EngineError> {
        let logic = Arc::clone(Self::resolve(plugin, action_id)?);

        let (error, records, started_at, duration_ms) =
            match invoke(&plugin.id, context, None, |invocation| logic.run(invocation)) {
                Ok(outcome) => (
                    outcome.error,
                    outcome.records,
                    outcome.started_at,
                    outcome.duration_ms,
                ),
                Err(message) => {
                    tracing::error!(plugin = %plugin.id, action = action_id, %message, "Action panicked");
                    (
                        Some(PluginError::new(format!("action panicked: {}", message))),
                        Vec::new(),
                        chrono::Utc::now(),
                        0,
                    )
                }
            };

        Ok(PublishResult {
            plugin: plugin.to_ref(),
            instance: None,
            action: Some(action_id.to_string()),
            success: error.is_none(),
            error,
            records,
            started_at,
            duration_ms,
        })
    }
}
