//! CLI domain: parse, route and output only.
//! No pipeline orchestration; a single route table dispatches to the engine.

mod output;
mod parse;
mod route;

pub use output::{
    format_notification_text, format_plan_text, format_run_json, format_run_text, map_error,
    PlanView,
};
pub use parse::{Cli, Commands, UntilArg};
pub use route::{RunContext, RunOptions};
