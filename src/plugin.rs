//! Plugins: descriptors, the logic they wrap, named actions and the registry
//! the engine discovers them from.

pub mod action;
pub mod descriptor;
pub mod invocation;
pub mod registry;

pub use action::{Action, ActionDescriptor, ActionKind, ActionTrigger};
pub use descriptor::{Plugin, PluginDescriptor, PluginRef, WILDCARD_FAMILY};
pub use invocation::{Invocation, LogLevel, LogRecord};
pub use registry::{prepare_plugins, PluginRegistry, StaticRegistry, DEFAULT_TARGET};
