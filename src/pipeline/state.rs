//! Transient processing state and the stop predicate evaluated against it.

use crate::types::Order;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Rebuilt on every reset; read by the stop predicate before each pair.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessingState {
    pub stop_on_validation: bool,
    /// Order group the sequencer cursor is in.
    pub current_order: Option<Order>,
    /// Order of the plugin about to run.
    pub next_order: Option<Order>,
    /// Order of the plugin that ran last.
    pub last_plugin_order: Option<Order>,
    pub orders_with_error: BTreeSet<Order>,
}

impl ProcessingState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_errors(&self) -> bool {
        !self.orders_with_error.is_empty()
    }
}

/// Host policy deciding whether to abort before the next pair.
///
/// A returned reason (non-empty) ends the current command; `None` or an empty
/// string lets it continue.
pub trait StopPredicate: Send + Sync {
    fn test(&self, state: &ProcessingState) -> Option<String>;
}

impl<F> StopPredicate for F
where
    F: Fn(&ProcessingState) -> Option<String> + Send + Sync,
{
    fn test(&self, state: &ProcessingState) -> Option<String> {
        self(state)
    }
}

/// Stops once validation has failed and the next order is past validation.
///
/// An error at any order below `validation + 0.5` blocks every order at or
/// beyond `validation + 0.5`.
#[derive(Debug, Clone, Copy)]
pub struct DefaultStopPredicate {
    cutoff: Order,
}

impl DefaultStopPredicate {
    const OFFSET: f64 = 0.5;

    pub fn new(validation_order: f64) -> Self {
        Self {
            cutoff: Order::new(validation_order).offset(Self::OFFSET),
        }
    }
}

impl Default for DefaultStopPredicate {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl StopPredicate for DefaultStopPredicate {
    fn test(&self, state: &ProcessingState) -> Option<String> {
        let failed_before_cutoff = state.orders_with_error.iter().any(|o| *o < self.cutoff);
        let next_past_cutoff = state.next_order.map_or(false, |o| o >= self.cutoff);
        if failed_before_cutoff && next_past_cutoff {
            Some("failed validation".to_string())
        } else {
            None
        }
    }
}

/// Predicate that never stops a run.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverStop;

impl StopPredicate for NeverStop {
    fn test(&self, _state: &ProcessingState) -> Option<String> {
        None
    }
}
