//! Config loader: builds a `PubflowConfig` from the layered sources.

use crate::config::merge::merge_policy;
use crate::config::sources::{global_file, workspace_file};
use crate::config::PubflowConfig;
use crate::error::ConfigError;
use config::File;
use std::path::Path;

pub struct ConfigLoader;

impl ConfigLoader {
    /// Defaults, then the global file, then `<root>/pubflow.toml`, then environment.
    pub fn load(workspace_root: &Path) -> Result<PubflowConfig, ConfigError> {
        let builder = merge_policy::builder_with_defaults()?;
        let builder = global_file::add_to_builder(builder);
        let builder = workspace_file::add_to_builder(builder, workspace_root);
        let builder = merge_policy::add_environment(builder);
        Self::finish(builder)
    }

    /// Defaults overlaid with a single explicit file. Environment still applies.
    pub fn load_from_file(path: &Path) -> Result<PubflowConfig, ConfigError> {
        let builder = merge_policy::builder_with_defaults()?
            .add_source(File::from(path).required(true));
        let builder = merge_policy::add_environment(builder);
        Self::finish(builder)
    }

    fn finish(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<PubflowConfig, ConfigError> {
        let config: PubflowConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }
}
