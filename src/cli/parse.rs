//! CLI parse: clap types for pubflow. No behavior; definitions only.

use crate::pipeline::RunUntil;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Pubflow CLI - rehearse publishing pipelines described in a manifest
#[derive(Parser)]
#[command(name = "pubflow")]
#[command(about = "Ordered, step-driven publishing pipeline")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Workspace root directory (where pubflow.toml is looked up)
    #[arg(long, default_value = ".")]
    pub workspace: PathBuf,

    /// Configuration file path (overrides default config loading)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(long, default_value = "false")]
    pub verbose: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file)
    #[arg(long)]
    pub log_output: Option<String>,

    /// Log file path (if output is "file")
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show order groups, stages and plugins without running anything
    Plan {
        /// Plugin manifest (TOML)
        #[arg(long)]
        manifest: PathBuf,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Reset, collect, then run up to the requested stage
    Run {
        /// Plugin manifest (TOML)
        #[arg(long)]
        manifest: PathBuf,
        /// Last stage to run
        #[arg(long, value_enum, default_value = "publish")]
        until: UntilArg,
        /// Print notifications as JSON lines
        #[arg(long)]
        json: bool,
        /// Deactivate an optional plugin after collection (repeatable)
        #[arg(long = "disable")]
        disable: Vec<String>,
        /// Exclude an instance from publishing after collection (repeatable)
        #[arg(long = "skip-instance")]
        skip_instances: Vec<String>,
        /// Comment stored on the context
        #[arg(long)]
        comment: Option<String>,
        /// Intent stored on the context
        #[arg(long)]
        intent: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum UntilArg {
    Collect,
    Validate,
    Publish,
}

impl From<UntilArg> for RunUntil {
    fn from(arg: UntilArg) -> Self {
        match arg {
            UntilArg::Collect => RunUntil::Collect,
            UntilArg::Validate => RunUntil::Validate,
            UntilArg::Publish => RunUntil::Publish,
        }
    }
}
