//! On-demand actions, plugin and instance toggles, and re-discovery after collection.

use crate::integration::test_utils::{
    collector, engine_for, engine_with, fast_config, instance_plugin, reset_and_collect, Recorder,
};
use pubflow::config::PipelineConfig;
use pubflow::engine::{run_until_idle, Engine, Notification};
use pubflow::error::{EngineError, PluginError};
use pubflow::plugin::{ActionDescriptor, Invocation, PluginDescriptor, StaticRegistry};
use std::sync::Arc;

fn with_actions() -> Vec<PluginDescriptor> {
    vec![
        collector("collect", 0.0, &[("X", true), ("Z", true)]),
        instance_plugin("validate", 1.0)
            .with_action(ActionDescriptor::category("menu", "Repair"))
            .with_action(ActionDescriptor::new(
                "repair",
                |inv: &mut Invocation<'_>| -> Result<(), PluginError> {
                    inv.context_mut().set_comment("repaired");
                    inv.info("repaired normals");
                    Ok(())
                },
            ))
            .with_action(ActionDescriptor::new(
                "explode",
                |_: &mut Invocation<'_>| -> Result<(), PluginError> {
                    Err(PluginError::new("nothing to explode"))
                },
            )),
    ]
}

#[test]
fn action_waits_for_the_pair_in_flight() {
    let (mut engine, recorder) = engine_with(with_actions());
    reset_and_collect(&mut engine);
    recorder.clear();

    engine.publish().unwrap();
    engine.step();
    engine.act("validate", "repair").unwrap();
    engine.step();
    engine.step();

    assert_eq!(
        recorder.kinds(),
        vec!["about_to_process", "processed", "acted"]
    );
    assert_eq!(engine.context().comment(), Some("repaired"));

    run_until_idle(&mut engine);
    assert_eq!(recorder.processed(), vec!["validate:X", "validate:Z"]);
}

#[test]
fn failing_action_does_not_touch_processing_state() {
    let (mut engine, recorder) = engine_with(with_actions());
    reset_and_collect(&mut engine);

    engine.act("validate", "explode").unwrap();
    run_until_idle(&mut engine);

    let acted = recorder.all().into_iter().find_map(|n| match n {
        Notification::Acted { result } => Some(result),
        _ => None,
    });
    let acted = acted.unwrap();
    assert!(!acted.success);
    assert_eq!(acted.action.as_deref(), Some("explode"));
    assert!(engine.processing().orders_with_error.is_empty());
    assert_eq!(engine.results().last().map(|r| r.success), Some(false));
}

#[test]
fn act_rejects_unknown_and_non_runnable_actions() {
    let (mut engine, _recorder) = engine_with(with_actions());
    reset_and_collect(&mut engine);

    assert_eq!(
        engine.act("missing", "repair"),
        Err(EngineError::UnknownPlugin("missing".to_string()))
    );
    assert!(matches!(
        engine.act("validate", "nope"),
        Err(EngineError::UnknownAction { .. })
    ));
    assert!(matches!(
        engine.act("validate", "menu"),
        Err(EngineError::ActionNotRunnable { kind, .. }) if kind == "category"
    ));
}

fn with_optional_lint() -> Vec<PluginDescriptor> {
    vec![
        collector("collect", 0.0, &[("X", true)]),
        instance_plugin("lint", 1.0).optional(),
        instance_plugin("validate", 1.0),
    ]
}

#[test]
fn disabled_optional_plugin_is_skipped_and_remembered() {
    let (mut engine, recorder) = engine_with(with_optional_lint());
    reset_and_collect(&mut engine);

    engine.set_plugin_active("lint", false).unwrap();
    engine.publish().unwrap();
    run_until_idle(&mut engine);
    assert_eq!(recorder.processed(), vec!["collect:-", "validate:X"]);

    reset_and_collect(&mut engine);
    let lint = engine.plugins().iter().find(|p| p.id == "lint").unwrap();
    assert!(!lint.active);
}

#[test]
fn toggles_are_dropped_on_reset_when_not_preserved() {
    let config = PipelineConfig {
        preserve_toggles: false,
        ..fast_config()
    };
    let mut engine = Engine::new(
        Arc::new(StaticRegistry::with_plugins(with_optional_lint())),
        config,
    );
    let _recorder = Recorder::attach(&mut engine);
    reset_and_collect(&mut engine);

    engine.set_plugin_active("lint", false).unwrap();
    reset_and_collect(&mut engine);

    let lint = engine.plugins().iter().find(|p| p.id == "lint").unwrap();
    assert!(lint.active);
}

#[test]
fn required_plugins_cannot_be_toggled() {
    let (mut engine, _recorder) = engine_with(with_optional_lint());
    reset_and_collect(&mut engine);

    assert_eq!(
        engine.set_plugin_active("validate", false),
        Err(EngineError::NotOptional("validate".to_string()))
    );
    assert_eq!(
        engine.set_plugin_active("ghost", false),
        Err(EngineError::UnknownPlugin("ghost".to_string()))
    );
}

#[test]
fn instance_toggle_survives_recollection() {
    let (mut engine, recorder) = engine_with(vec![
        collector("collect", 0.0, &[("X", true), ("Z", true)]),
        instance_plugin("validate", 1.0),
    ]);
    reset_and_collect(&mut engine);

    engine.set_instance_publish("X", false).unwrap();
    engine.publish().unwrap();
    run_until_idle(&mut engine);
    assert_eq!(recorder.processed(), vec!["collect:-", "validate:Z"]);

    reset_and_collect(&mut engine);
    assert!(!engine.context().instance("X").unwrap().publish());
    assert!(engine.context().instance("Z").unwrap().publish());

    assert_eq!(
        engine.set_instance_publish("W", true),
        Err(EngineError::UnknownInstance("W".to_string()))
    );
}

#[test]
fn plugins_registered_during_collection_join_later_stages() {
    let registry = Arc::new(StaticRegistry::new());
    let weak = Arc::downgrade(&registry);
    registry.register(PluginDescriptor::new(
        "collect",
        0.0,
        move |inv: &mut Invocation<'_>| -> Result<(), PluginError> {
            inv.context_mut()
                .add_instance(pubflow::Instance::new("X"))?;
            if let Some(registry) = weak.upgrade() {
                registry.register(instance_plugin("late_validate", 1.0));
                registry.register(instance_plugin("too_early", -1.0));
            }
            Ok(())
        },
    ));
    registry.register(instance_plugin("validate", 1.0));

    let (mut engine, recorder) = engine_for(registry.clone());
    reset_and_collect(&mut engine);

    assert!(recorder
        .all()
        .contains(&Notification::PluginsDiscovered { plugins: 3 }));
    let ids: Vec<&str> = engine.plugins().iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, vec!["collect", "validate", "late_validate"]);

    engine.publish().unwrap();
    run_until_idle(&mut engine);
    assert_eq!(
        recorder.processed(),
        vec!["collect:-", "validate:X", "late_validate:X"]
    );
}

#[test]
fn rediscovery_runs_even_when_collection_used_every_plugin() {
    let registry = Arc::new(StaticRegistry::with_plugins(vec![collector(
        "collect",
        0.0,
        &[("X", true)],
    )]));
    let (mut engine, recorder) = engine_for(registry.clone());

    engine.reset();
    registry.register(instance_plugin("validate", 1.0));
    run_until_idle(&mut engine);

    assert!(recorder
        .all()
        .contains(&Notification::PluginsDiscovered { plugins: 2 }));

    engine.publish().unwrap();
    run_until_idle(&mut engine);
    assert_eq!(recorder.processed(), vec!["collect:-", "validate:X"]);
    assert_eq!(recorder.count("stage_passed"), 2);
}

#[test]
fn plugins_outside_registered_targets_are_not_discovered() {
    let config = PipelineConfig {
        targets: vec!["farm".to_string()],
        ..fast_config()
    };
    let mut engine = Engine::new(
        Arc::new(StaticRegistry::with_plugins(vec![
            collector("collect", 0.0, &[]).with_targets(["farm"]),
            instance_plugin("local_only", 1.0),
        ])),
        config,
    );
    let recorder = Recorder::attach(&mut engine);
    reset_and_collect(&mut engine);

    let ids: Vec<&str> = engine.plugins().iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, vec!["collect"]);
    assert_eq!(recorder.processed(), vec!["collect:-"]);
}
