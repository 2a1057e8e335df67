//! Engine: the state machine that owns the context and drives the pipeline one
//! step at a time, plus the notifications it emits and helpers for driving it
//! from a host loop.

pub mod driver;
mod machine;
pub mod notification;

pub use driver::{drive, run_until_idle, schedule, ManualScheduler, Scheduler, TokioScheduler};
pub use machine::{Engine, EngineState, Tick};
pub use notification::{ChannelListener, Listener, Notification, RunSummary};
