//! Workspace config file source: <root>/pubflow.toml

use config::builder::DefaultState;
use config::ConfigBuilder;
use config::File;
use std::path::Path;

pub const WORKSPACE_CONFIG_FILE: &str = "pubflow.toml";

/// Add the workspace config file to builder when present.
pub fn add_to_builder(
    builder: ConfigBuilder<DefaultState>,
    workspace_root: &Path,
) -> ConfigBuilder<DefaultState> {
    let path = workspace_root.join(WORKSPACE_CONFIG_FILE);
    if path.exists() {
        builder.add_source(File::from(path).required(false))
    } else {
        builder
    }
}
