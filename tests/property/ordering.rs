//! Property-based tests for sequencing order, publish flags and determinism

use proptest::prelude::*;
use pubflow::config::PipelineConfig;
use pubflow::engine::{run_until_idle, Engine, Notification};
use pubflow::error::PluginError;
use pubflow::pipeline::{NeverStop, OrderGroups, StageOrders};
use pubflow::plugin::{Invocation, PluginDescriptor, StaticRegistry};
use pubflow::{Instance, Order};
use std::sync::{Arc, Mutex};

/// (order step, instance enabled, active)
type PluginSpec = (u8, bool, bool);

fn noop(_: &mut Invocation<'_>) -> Result<(), PluginError> {
    Ok(())
}

fn plugin_set(specs: &[PluginSpec], publish: &[bool]) -> Vec<PluginDescriptor> {
    let flags = publish.to_vec();
    let mut plugins = vec![PluginDescriptor::new(
        "collect",
        -1.0,
        move |inv: &mut Invocation<'_>| -> Result<(), PluginError> {
            for (i, publish) in flags.iter().enumerate() {
                inv.context_mut()
                    .add_instance(Instance::new(format!("i{}", i)).with_publish(*publish))?;
            }
            Ok(())
        },
    )];
    for (idx, (step, instance_enabled, active)) in specs.iter().enumerate() {
        let mut plugin =
            PluginDescriptor::new(format!("p{}", idx), f64::from(*step) * 0.5, noop)
                .with_active(*active);
        if *instance_enabled {
            plugin = plugin.instance_enabled();
        }
        plugins.push(plugin);
    }
    plugins
}

/// Reset, then publish everything; returns `(plugin, instance)` per processed pair.
fn publish_all(plugins: Vec<PluginDescriptor>) -> Vec<(String, Option<String>, Order)> {
    let registry = Arc::new(StaticRegistry::with_plugins(plugins));
    let mut engine = Engine::new(
        registry,
        PipelineConfig {
            step_delay_ms: 0,
            ..PipelineConfig::default()
        },
    );
    engine.set_stop_predicate(NeverStop);
    let processed = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&processed);
    engine.add_listener(move |n: &Notification| {
        if let Notification::Processed { result } = n {
            sink.lock().unwrap().push((
                result.plugin.id.clone(),
                result.instance.as_ref().map(|i| i.id.clone()),
                result.plugin.order,
            ));
        }
    });

    engine.reset();
    run_until_idle(&mut engine);
    engine.publish().unwrap();
    run_until_idle(&mut engine);

    let out = processed.lock().unwrap().clone();
    out
}

fn specs() -> impl Strategy<Value = (Vec<PluginSpec>, Vec<bool>)> {
    (
        prop::collection::vec((0u8..8, any::<bool>(), any::<bool>()), 1..12),
        prop::collection::vec(any::<bool>(), 0..5),
    )
}

/// Processed orders never go backwards, across commands included.
#[test]
fn test_processed_orders_are_non_decreasing() {
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(&specs(), |(specs, publish)| {
            let processed = publish_all(plugin_set(&specs, &publish));
            for window in processed.windows(2) {
                prop_assert!(window[0].2 <= window[1].2);
            }
            Ok(())
        })
        .unwrap();
}

/// Every active plugin runs once on the context or once per published instance;
/// inactive plugins and unpublished instances never show up.
#[test]
fn test_pair_counts_follow_flags() {
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(&specs(), |(specs, publish)| {
            let processed = publish_all(plugin_set(&specs, &publish));
            let published = publish.iter().filter(|p| **p).count();

            for (idx, (_, instance_enabled, active)) in specs.iter().enumerate() {
                let id = format!("p{}", idx);
                let runs = processed.iter().filter(|(p, _, _)| *p == id).count();
                let expected = match (*active, *instance_enabled) {
                    (false, _) => 0,
                    (true, true) => published,
                    (true, false) => 1,
                };
                prop_assert_eq!(runs, expected, "plugin {}", id);
            }

            for (_, instance, _) in &processed {
                if let Some(instance) = instance {
                    let index: usize = instance[1..].parse().unwrap();
                    prop_assert!(publish[index], "unpublished instance {} ran", instance);
                }
            }
            Ok(())
        })
        .unwrap();
}

/// Same plugins, same instances, same sequence.
#[test]
fn test_sequence_is_deterministic() {
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(&specs(), |(specs, publish)| {
            let first = publish_all(plugin_set(&specs, &publish));
            let second = publish_all(plugin_set(&specs, &publish));
            prop_assert_eq!(first, second);
            Ok(())
        })
        .unwrap();
}

proptest! {
    #[test]
    fn test_order_groups_are_sorted_active_orders(specs in prop::collection::vec((0u8..8, any::<bool>(), any::<bool>()), 0..12)) {
        let plugins = plugin_set(&specs, &[]);
        let groups = OrderGroups::compute(&plugins, StageOrders::default());

        let mut expected: Vec<Order> = plugins
            .iter()
            .filter(|p| p.active)
            .map(|p| p.order)
            .collect();
        expected.sort();
        expected.dedup();
        prop_assert_eq!(groups.orders(), expected.as_slice());

        for order in groups.orders() {
            prop_assert_eq!(groups.group_of(*order), *order);
        }
    }
}
