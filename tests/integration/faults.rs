//! Plugin errors versus engine faults.

use crate::integration::test_utils::{
    collector, engine_for, engine_with, failing_on, instance_plugin, reset_and_collect,
};
use pubflow::engine::{run_until_idle, EngineState, Notification, RunSummary};
use pubflow::error::{EngineFault, PluginError, RegistryError};
use pubflow::plugin::{Invocation, PluginDescriptor, PluginRegistry};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn last_summary(notifications: Vec<Notification>) -> Option<RunSummary> {
    notifications.into_iter().rev().find_map(|n| match n {
        Notification::Finished { summary } => Some(summary),
        _ => None,
    })
}

#[test]
fn plugin_error_is_recorded_and_the_group_carries_on() {
    let (mut engine, recorder) = engine_with(vec![
        collector("collect", 0.0, &[("X", true)]),
        failing_on("validate_names", 1.0, &["X"]),
        instance_plugin("validate_uvs", 1.0),
        instance_plugin("extract", 2.0),
    ]);
    reset_and_collect(&mut engine);
    engine.publish().unwrap();
    run_until_idle(&mut engine);

    assert_eq!(
        recorder.processed(),
        vec!["collect:-", "validate_names:X", "validate_uvs:X"]
    );
    let summary = last_summary(recorder.all()).unwrap();
    assert!(!summary.is_fault());
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.processed, 2);
}

#[test]
fn panicking_plugin_ends_the_run_with_a_fault() {
    let (mut engine, recorder) = engine_with(vec![
        collector("collect", 0.0, &[("X", true)]),
        PluginDescriptor::new(
            "validate",
            1.0,
            |_: &mut Invocation<'_>| -> Result<(), PluginError> { panic!("mesh exploded") },
        )
        .instance_enabled(),
        instance_plugin("extract", 2.0),
    ]);
    reset_and_collect(&mut engine);
    recorder.clear();

    engine.publish().unwrap();
    run_until_idle(&mut engine);

    assert_eq!(
        recorder.kinds(),
        vec!["about_to_process", "stopped", "finished"]
    );
    let summary = last_summary(recorder.all()).unwrap();
    assert_eq!(
        summary.fault,
        Some(EngineFault::PluginPanicked {
            plugin: "validate".to_string(),
            message: "mesh exploded".to_string(),
        })
    );
    assert_eq!(engine.state(), EngineState::Stopped);
    assert!(engine.context().status().has_failed);
    assert!(!engine.context().status().has_succeeded);
}

struct BrokenRegistry;

impl PluginRegistry for BrokenRegistry {
    fn discover(&self) -> Result<Vec<PluginDescriptor>, RegistryError> {
        Err(RegistryError::DiscoveryFailed("plugin path unreadable".to_string()))
    }
}

#[test]
fn registry_failure_finishes_the_reset_run() {
    let (mut engine, recorder) = engine_for(Arc::new(BrokenRegistry));
    engine.reset();

    assert_eq!(
        recorder.kinds(),
        vec!["reset_complete", "stopped", "finished"]
    );
    let summary = last_summary(recorder.all()).unwrap();
    assert!(matches!(summary.fault, Some(EngineFault::Registry { .. })));
    assert!(!engine.is_running());
    assert!(engine.plugins().is_empty());
}

/// Succeeds on the first discovery only.
struct FlakyRegistry {
    calls: AtomicUsize,
    plugins: Vec<PluginDescriptor>,
}

impl PluginRegistry for FlakyRegistry {
    fn discover(&self) -> Result<Vec<PluginDescriptor>, RegistryError> {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            Ok(self.plugins.clone())
        } else {
            Err(RegistryError::DiscoveryFailed("network share went away".to_string()))
        }
    }
}

#[test]
fn failed_rediscovery_keeps_the_current_plugins() {
    let registry = Arc::new(FlakyRegistry {
        calls: AtomicUsize::new(0),
        plugins: vec![
            collector("collect", 0.0, &[("X", true)]),
            instance_plugin("validate", 1.0),
        ],
    });
    let (mut engine, recorder) = engine_for(registry.clone());
    reset_and_collect(&mut engine);

    assert_eq!(registry.calls.load(Ordering::SeqCst), 2);
    assert_eq!(recorder.count("plugins_discovered"), 0);
    assert_eq!(engine.plugins().len(), 2);

    engine.publish().unwrap();
    run_until_idle(&mut engine);
    assert_eq!(recorder.processed(), vec!["collect:-", "validate:X"]);
}

#[test]
fn malformed_plugins_are_faults() {
    let (mut engine, recorder) = engine_with(vec![
        collector("collect", 0.0, &[]),
        instance_plugin("validate", f64::NAN),
    ]);
    reset_and_collect(&mut engine);

    let summary = last_summary(recorder.all()).unwrap();
    assert!(matches!(
        summary.fault,
        Some(EngineFault::MalformedPlugin { ref plugin, .. }) if plugin == "validate"
    ));
    assert_eq!(recorder.count("processed"), 0);

    let (mut engine, recorder) = engine_with(vec![
        collector("collect", 0.0, &[]),
        collector("collect", 0.5, &[]),
    ]);
    reset_and_collect(&mut engine);
    let summary = last_summary(recorder.all()).unwrap();
    assert!(matches!(summary.fault, Some(EngineFault::MalformedPlugin { .. })));
}

#[test]
fn duplicate_instance_is_a_plugin_error_not_a_fault() {
    let (mut engine, recorder) = engine_with(vec![
        collector("collect_a", 0.0, &[("X", true)]),
        collector("collect_b", 0.1, &[("X", true)]),
    ]);
    reset_and_collect(&mut engine);

    let results = recorder.results();
    assert_eq!(results.len(), 2);
    assert!(results[0].success);
    assert!(!results[1].success);
    assert!(last_summary(recorder.all()).unwrap().fault.is_none());
    assert_eq!(engine.context().len(), 1);
}
