//! Merge rules: defaults first, then files, then environment.

use config::builder::DefaultState;
use config::Config;
use config::ConfigBuilder;
use config::ConfigError;
use config::Environment;

/// Create a Config builder with merge policy defaults applied.
pub fn builder_with_defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    Config::builder()
        .set_default("pipeline.targets", vec!["default"])?
        .set_default("pipeline.stage_orders.validation", 1.0)?
        .set_default("pipeline.stage_orders.extraction", 2.0)?
        .set_default("pipeline.stage_orders.conform", 3.0)?
        .set_default("pipeline.step_delay_ms", 10)?
        .set_default("pipeline.preserve_toggles", true)
}

/// Environment overrides take precedence over every file source.
/// `PUBFLOW__PIPELINE__STEP_DELAY_MS=0` sets `pipeline.step_delay_ms`.
pub fn add_environment(builder: ConfigBuilder<DefaultState>) -> ConfigBuilder<DefaultState> {
    builder.add_source(
        Environment::with_prefix("PUBFLOW")
            .prefix_separator("__")
            .separator("__")
            .try_parsing(true),
    )
}
