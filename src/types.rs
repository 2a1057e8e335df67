//! Core types shared by the pipeline: plugin orders and the stages they map to.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Sequencing key of a plugin.
///
/// Orders are finite real numbers. The newtype gives them a total ordering so
/// they can be deduplicated, sorted and used as set keys; non-finite values are
/// rejected when a plugin set is built. Negative zero is stored as zero, so
/// `-0.0` and `0.0` share one order group.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(from = "f64", into = "f64")]
pub struct Order(f64);

impl Order {
    pub fn new(value: f64) -> Self {
        // -0.0 + 0.0 == +0.0
        Order(value + 0.0)
    }

    pub fn value(self) -> f64 {
        self.0
    }

    pub fn is_finite(self) -> bool {
        self.0.is_finite()
    }

    /// Order shifted by `delta`, used for the half-step offsets between stages.
    pub fn offset(self, delta: f64) -> Self {
        Order::new(self.0 + delta)
    }
}

impl PartialEq for Order {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Order {}

impl PartialOrd for Order {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Order {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl From<f64> for Order {
    fn from(value: f64) -> Self {
        Order::new(value)
    }
}

impl From<Order> for f64 {
    fn from(order: Order) -> Self {
        order.0
    }
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Publishing stage an order falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Collect,
    Validate,
    Extract,
    Conform,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Collect => "collect",
            Stage::Validate => "validate",
            Stage::Extract => "extract",
            Stage::Conform => "conform",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
