//! Ways to keep an engine stepping: a synchronous loop, an async loop for
//! tokio hosts, and deferred callbacks through a host `Scheduler`.

use crate::engine::machine::{Engine, Tick};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

/// Step until nothing is scheduled, ignoring the requested delays.
/// Returns the number of steps taken.
pub fn run_until_idle(engine: &mut Engine) -> usize {
    let mut steps = 1;
    while let Tick::Continue(_) = engine.step() {
        steps += 1;
    }
    steps
}

/// Step until idle, sleeping for the requested delay between steps.
pub async fn drive(engine: &mut Engine) -> usize {
    let mut steps = 0;
    loop {
        steps += 1;
        match engine.step() {
            Tick::Continue(delay) if delay.is_zero() => tokio::task::yield_now().await,
            Tick::Continue(delay) => tokio::time::sleep(delay).await,
            Tick::Idle => return steps,
        }
    }
}

pub type Deferred = Box<dyn FnOnce() + Send + 'static>;

/// Host primitive that runs a callback later without blocking the caller.
pub trait Scheduler: Send + Sync {
    fn defer(&self, delay: Duration, callback: Deferred);
}

/// Chain `step` calls through `scheduler` until the engine is idle.
///
/// Call again after issuing a command to an idle engine.
pub fn schedule(engine: Arc<Mutex<Engine>>, scheduler: Arc<dyn Scheduler>) {
    let next = Arc::clone(&scheduler);
    scheduler.defer(Duration::ZERO, Box::new(move || step_then_defer(engine, next)));
}

fn step_then_defer(engine: Arc<Mutex<Engine>>, scheduler: Arc<dyn Scheduler>) {
    let tick = engine.lock().step();
    if let Tick::Continue(delay) = tick {
        let next = Arc::clone(&scheduler);
        scheduler.defer(delay, Box::new(move || step_then_defer(engine, next)));
    }
}

/// Defers onto a tokio runtime.
pub struct TokioScheduler {
    handle: tokio::runtime::Handle,
}

impl TokioScheduler {
    pub fn new(handle: tokio::runtime::Handle) -> Self {
        Self { handle }
    }

    /// Scheduler for the runtime this is called from.
    pub fn current() -> Self {
        Self::new(tokio::runtime::Handle::current())
    }
}

impl Scheduler for TokioScheduler {
    fn defer(&self, delay: Duration, callback: Deferred) {
        self.handle.spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            callback();
        });
    }
}

/// Queues callbacks until `run_pending` is called. Deterministic, for tests and
/// hosts that pump their own loop.
#[derive(Default)]
pub struct ManualScheduler {
    queue: Mutex<VecDeque<(Duration, Deferred)>>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self) -> usize {
        self.queue.lock().len()
    }

    /// Run queued callbacks, including ones they queue, until none remain.
    /// Returns how many ran.
    pub fn run_pending(&self) -> usize {
        let mut ran = 0;
        loop {
            let next = self.queue.lock().pop_front();
            match next {
                Some((_, callback)) => {
                    callback();
                    ran += 1;
                }
                None => return ran,
            }
        }
    }

    /// Run only the oldest queued callback.
    pub fn run_one(&self) -> bool {
        let next = self.queue.lock().pop_front();
        match next {
            Some((_, callback)) => {
                callback();
                true
            }
            None => false,
        }
    }
}

impl Scheduler for ManualScheduler {
    fn defer(&self, delay: Duration, callback: Deferred) {
        self.queue.lock().push_back((delay, callback));
    }
}
