//! End-to-end publishing scenarios over a collector, a validator and an extractor.

use crate::integration::test_utils::{
    collector, engine_with, failing_on, instance_plugin, reset_and_collect, Recorder,
};
use pubflow::engine::{run_until_idle, Engine, EngineState, Notification, RunSummary};
use pubflow::pipeline::{ProcessingState, RunUntil, Termination};
use pubflow::types::Order;

fn scenario() -> (Engine, Recorder) {
    engine_with(vec![
        collector("CollectA", 0.0, &[("X", true), ("Y", false)]),
        instance_plugin("ValidateA", 1.0),
        instance_plugin("ExtractA", 2.0),
    ])
}

fn finished(recorder: &Recorder) -> Vec<RunSummary> {
    recorder
        .all()
        .into_iter()
        .filter_map(|n| match n {
            Notification::Finished { summary } => Some(summary),
            _ => None,
        })
        .collect()
}

#[test]
fn collect_validate_publish_resume_one_cursor() {
    let (mut engine, recorder) = scenario();

    reset_and_collect(&mut engine);
    assert_eq!(recorder.processed(), vec!["CollectA:-"]);

    engine.validate().unwrap();
    run_until_idle(&mut engine);
    assert_eq!(recorder.processed(), vec!["CollectA:-", "ValidateA:X"]);

    engine.publish().unwrap();
    run_until_idle(&mut engine);
    assert_eq!(
        recorder.processed(),
        vec!["CollectA:-", "ValidateA:X", "ExtractA:X"]
    );

    assert!(engine.processing().orders_with_error.is_empty());
    assert_eq!(recorder.count("processed"), 3);
    // One finished per command.
    let summaries = finished(&recorder);
    assert_eq!(
        summaries.iter().map(|s| s.command).collect::<Vec<_>>(),
        vec![RunUntil::Collect, RunUntil::Validate, RunUntil::Publish]
    );
    assert_eq!(summaries[0].termination, Termination::Collected);
    assert_eq!(summaries[1].termination, Termination::Validated);
    assert_eq!(summaries[2].termination, Termination::Exhausted);
}

#[test]
fn reset_then_publish_finishes_twice() {
    let (mut engine, recorder) = scenario();

    reset_and_collect(&mut engine);
    engine.publish().unwrap();
    run_until_idle(&mut engine);

    assert_eq!(
        recorder.processed(),
        vec!["CollectA:-", "ValidateA:X", "ExtractA:X"]
    );
    assert_eq!(recorder.count("finished"), 2);
    assert!(engine.processing().orders_with_error.is_empty());
    assert_eq!(engine.state(), EngineState::Idle);
    assert!(engine.context().status().has_succeeded);

    assert_eq!(
        recorder.kinds(),
        vec![
            "reset_complete",
            "about_to_process",
            "processed",
            "stage_passed",
            "finished",
            "plugins_discovered",
            "about_to_process",
            "processed",
            "stage_passed",
            "about_to_process",
            "processed",
            "stage_passed",
            "finished",
        ]
    );
}

#[test]
fn halting_predicate_keeps_extraction_from_running() {
    let (mut engine, recorder) = engine_with(vec![
        collector("CollectA", 0.0, &[("X", true), ("Y", false)]),
        failing_on("ValidateA", 1.0, &["X"]),
        instance_plugin("ExtractA", 2.0),
    ]);
    engine.set_stop_predicate(|state: &ProcessingState| -> Option<String> {
        state.has_errors().then(|| "halt".to_string())
    });

    reset_and_collect(&mut engine);
    recorder.clear();
    engine.publish().unwrap();
    run_until_idle(&mut engine);

    assert_eq!(recorder.processed(), vec!["ValidateA:X"]);
    let validate = &recorder.results()[0];
    assert!(!validate.success);
    assert_eq!(
        validate.error.as_ref().map(|e| e.message.as_str()),
        Some("X is invalid")
    );

    let summaries = finished(&recorder);
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].termination, Termination::Aborted("halt".to_string()));
    assert!(summaries[0].fault.is_none());
    assert_eq!(summaries[0].orders_with_error, vec![Order::new(1.0)]);
    assert_eq!(recorder.count("stopped"), 1);
    assert!(engine.context().status().has_failed);
    assert_eq!(engine.state(), EngineState::Stopped);
}

#[test]
fn default_predicate_stops_after_failed_validation() {
    let (mut engine, recorder) = engine_with(vec![
        collector("CollectA", 0.0, &[("X", true)]),
        failing_on("ValidateA", 1.0, &["X"]),
        instance_plugin("ExtractA", 2.0),
    ]);

    reset_and_collect(&mut engine);
    engine.publish().unwrap();
    run_until_idle(&mut engine);

    assert!(!recorder.processed().iter().any(|p| p.starts_with("ExtractA")));
    let last = finished(&recorder).pop().unwrap();
    assert_eq!(
        last.termination,
        Termination::Aborted("failed validation".to_string())
    );
}

#[test]
fn unpublished_instances_are_never_paired() {
    let (mut engine, recorder) = scenario();
    reset_and_collect(&mut engine);
    engine.publish().unwrap();
    run_until_idle(&mut engine);

    assert!(recorder
        .results()
        .iter()
        .all(|r| r.instance.as_ref().map_or(true, |i| i.id != "Y")));
}
