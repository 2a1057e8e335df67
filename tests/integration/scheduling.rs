//! Driving the engine through host schedulers.

use crate::integration::test_utils::{collector, engine_with, instance_plugin, reset_and_collect};
use parking_lot::Mutex;
use pubflow::engine::{drive, schedule, EngineState, ManualScheduler, Notification, TokioScheduler};
use std::sync::Arc;
use std::time::Duration;

fn plugins() -> Vec<pubflow::PluginDescriptor> {
    vec![
        collector("collect", 0.0, &[("X", true), ("Z", true)]),
        instance_plugin("validate", 1.0),
        instance_plugin("extract", 2.0),
    ]
}

#[test]
fn host_can_stop_between_scheduled_steps() {
    let (mut engine, recorder) = engine_with(plugins());
    reset_and_collect(&mut engine);
    engine.publish().unwrap();

    let engine = Arc::new(Mutex::new(engine));
    let scheduler = Arc::new(ManualScheduler::new());
    schedule(Arc::clone(&engine), scheduler.clone());

    // announce validate:X, then run it
    scheduler.run_one();
    scheduler.run_one();
    engine.lock().stop();
    scheduler.run_pending();

    assert_eq!(scheduler.pending(), 0);
    assert_eq!(engine.lock().state(), EngineState::Stopped);
    assert_eq!(recorder.processed(), vec!["collect:-", "validate:X"]);

    engine.lock().publish().unwrap();
    schedule(Arc::clone(&engine), scheduler.clone());
    scheduler.run_pending();
    assert_eq!(
        recorder.processed(),
        vec!["collect:-", "validate:X", "validate:Z", "extract:X", "extract:Z"]
    );
}

#[test]
fn scheduling_an_idle_engine_is_a_single_step() {
    let (engine, _recorder) = engine_with(plugins());
    let engine = Arc::new(Mutex::new(engine));
    let scheduler = Arc::new(ManualScheduler::new());

    schedule(Arc::clone(&engine), scheduler.clone());
    assert_eq!(scheduler.run_pending(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn tokio_scheduler_runs_to_completion() {
    let (mut engine, _recorder) = engine_with(plugins());
    let receiver = engine.subscribe();
    engine.reset();

    let engine = Arc::new(Mutex::new(engine));
    schedule(Arc::clone(&engine), Arc::new(TokioScheduler::current()));

    let finished = tokio::task::spawn_blocking(move || {
        receiver
            .iter()
            .find(|n| matches!(n, Notification::Finished { .. }))
    });
    let finished = tokio::time::timeout(Duration::from_secs(5), finished)
        .await
        .expect("collect run should finish")
        .unwrap();
    assert!(finished.is_some());

    let engine = engine.lock();
    assert!(!engine.is_running());
    assert_eq!(engine.context().len(), 2);
}

#[tokio::test]
async fn drive_runs_each_command_to_idle() {
    let (mut engine, recorder) = engine_with(plugins());
    engine.reset();
    drive(&mut engine).await;
    engine.publish().unwrap();
    let steps = drive(&mut engine).await;

    assert!(steps >= 4);
    assert_eq!(recorder.count("finished"), 2);
}
