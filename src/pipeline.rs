//! Pipeline core: stage partitioning, pair sequencing and single-pair execution.
//! The engine owns these pieces and drives them one step at a time.

pub mod action_runner;
pub mod executor;
pub mod order_groups;
pub mod result;
pub mod sequencer;
pub mod state;

pub use action_runner::ActionRunner;
pub use executor::Executor;
pub use order_groups::{OrderGroups, StageOrders};
pub use result::{InstanceRef, PublishResult};
pub use sequencer::{Pair, PairSequencer, RunUntil, SequencerCursor, SequencerInput, SequencerStep, Termination};
pub use state::{DefaultStopPredicate, NeverStop, ProcessingState, StopPredicate};
