//! Pubflow: ordered, step-driven publishing pipeline
//!
//! Plugins sorted by a numeric order run over a shared context and the instances
//! collected into it. Orders fall into collect, validate, extract and conform
//! stages; the engine sequences plugin/instance pairs one step at a time so the
//! host keeps control between every pair.

pub mod cli;
pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod logging;
pub mod manifest;
pub mod pipeline;
pub mod plugin;
pub mod report;
pub mod types;

pub use context::{Context, Instance};
pub use engine::{Engine, Notification, Tick};
pub use error::{EngineError, EngineFault, PluginError};
pub use plugin::{Invocation, PluginDescriptor, PluginRegistry, StaticRegistry};
pub use types::{Order, Stage};
