//! Order groups: the stage partition derived from the orders of active plugins.

use crate::plugin::PluginDescriptor;
use crate::types::{Order, Stage};
use serde::{Deserialize, Serialize};

/// Order thresholds at which each stage after collection begins.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StageOrders {
    #[serde(default = "default_validation")]
    pub validation: f64,
    #[serde(default = "default_extraction")]
    pub extraction: f64,
    #[serde(default = "default_conform")]
    pub conform: f64,
}

fn default_validation() -> f64 {
    1.0
}

fn default_extraction() -> f64 {
    2.0
}

fn default_conform() -> f64 {
    3.0
}

impl Default for StageOrders {
    fn default() -> Self {
        Self {
            validation: default_validation(),
            extraction: default_extraction(),
            conform: default_conform(),
        }
    }
}

impl StageOrders {
    pub fn stage_of(&self, order: Order) -> Stage {
        let value = order.value();
        if value < self.validation {
            Stage::Collect
        } else if value < self.extraction {
            Stage::Validate
        } else if value < self.conform {
            Stage::Extract
        } else {
            Stage::Conform
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        let thresholds = [self.validation, self.extraction, self.conform];
        if thresholds.iter().any(|t| !t.is_finite()) {
            return Err("stage orders must be finite".to_string());
        }
        if !(self.validation < self.extraction && self.extraction < self.conform) {
            return Err(format!(
                "stage orders must increase: validation {} < extraction {} < conform {}",
                self.validation, self.extraction, self.conform
            ));
        }
        Ok(())
    }
}

/// Deduplicated, ascending orders of the active plugins, classified into stages
/// by the registered thresholds.
///
/// Recomputed as a fresh value on every reset. An empty plugin set yields no
/// groups and no boundaries: the run is a single implicit stage with nothing in it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderGroups {
    orders: Vec<Order>,
    stages: StageOrders,
}

impl OrderGroups {
    pub fn compute(plugins: &[PluginDescriptor], stages: StageOrders) -> Self {
        let mut orders: Vec<Order> = plugins
            .iter()
            .filter(|p| p.active)
            .map(|p| p.order)
            .collect();
        orders.sort();
        orders.dedup();
        Self { orders, stages }
    }

    pub fn orders(&self) -> &[Order] {
        &self.orders
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn stages(&self) -> StageOrders {
        self.stages
    }

    /// Lowest group: where collection starts.
    pub fn collect_boundary(&self) -> Option<Order> {
        self.orders.first().copied()
    }

    /// Registered validation order. Need not be one of the groups.
    pub fn validate_boundary(&self) -> Option<Order> {
        if self.orders.is_empty() {
            None
        } else {
            Some(Order::new(self.stages.validation))
        }
    }

    pub fn stage_of(&self, order: Order) -> Stage {
        self.stages.stage_of(order)
    }

    /// Group an order belongs to: the greatest group not above it. Orders below
    /// every group (or with no groups at all) form their own group.
    pub fn group_of(&self, order: Order) -> Order {
        match self.orders.partition_point(|g| *g <= order) {
            0 => order,
            n => self.orders[n - 1],
        }
    }

    /// Groups belonging to `stage`, ascending.
    pub fn groups_in(&self, stage: Stage) -> Vec<Order> {
        self.orders
            .iter()
            .copied()
            .filter(|o| self.stage_of(*o) == stage)
            .collect()
    }
}
