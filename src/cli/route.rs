//! CLI route: one dispatch table from parsed commands to the engine.

use crate::cli::output::{format_plan_text, format_run_json, format_run_text, PlanView};
use crate::cli::parse::{Commands, UntilArg};
use crate::config::{ConfigLoader, PubflowConfig};
use crate::engine::{drive, Engine, Notification};
use crate::error::CliError;
use crate::manifest::ManifestRegistry;
use crate::pipeline::{OrderGroups, RunUntil};
use crate::plugin::{prepare_plugins, PluginRegistry};
use crate::report::PublishReport;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

/// Options of `pubflow run` applied after collection.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub json: bool,
    pub disable: Vec<String>,
    pub skip_instances: Vec<String>,
    pub comment: Option<String>,
    pub intent: Option<String>,
}

pub struct RunContext {
    config: PubflowConfig,
    workspace_root: PathBuf,
}

impl RunContext {
    /// Create run context from workspace root and optional config path. Uses ConfigLoader only.
    pub fn new(workspace_root: PathBuf, config_path: Option<PathBuf>) -> Result<Self, CliError> {
        let config = if let Some(ref cfg_path) = config_path {
            ConfigLoader::load_from_file(cfg_path)?
        } else {
            ConfigLoader::load(&workspace_root)?
        };
        Ok(Self {
            config,
            workspace_root,
        })
    }

    pub fn from_config(config: PubflowConfig, workspace_root: PathBuf) -> Self {
        Self {
            config,
            workspace_root,
        }
    }

    pub fn config(&self) -> &PubflowConfig {
        &self.config
    }

    pub async fn execute(&self, command: &Commands) -> Result<String, CliError> {
        let started = Instant::now();
        let result = match command {
            Commands::Plan { manifest, format } => self.plan(manifest, format),
            Commands::Run {
                manifest,
                until,
                json,
                disable,
                skip_instances,
                comment,
                intent,
            } => {
                let options = RunOptions {
                    json: *json,
                    disable: disable.clone(),
                    skip_instances: skip_instances.clone(),
                    comment: comment.clone(),
                    intent: intent.clone(),
                };
                self.run(manifest, *until, &options).await
            }
        };
        info!(
            duration_ms = started.elapsed().as_millis() as u64,
            ok = result.is_ok(),
            "Command finished"
        );
        result
    }

    fn resolve(&self, manifest: &Path) -> PathBuf {
        if manifest.is_absolute() {
            manifest.to_path_buf()
        } else {
            self.workspace_root.join(manifest)
        }
    }

    fn plan(&self, manifest: &Path, format: &str) -> Result<String, CliError> {
        let registry = ManifestRegistry::open(self.resolve(manifest))?;
        let plugins = prepare_plugins(
            registry.discover().map_err(crate::error::EngineFault::from)?,
            &self.config.pipeline.targets,
        )?;
        let groups = OrderGroups::compute(&plugins, self.config.pipeline.stage_orders);
        let plan = PlanView::build(&plugins, &groups);
        if format == "json" {
            Ok(serde_json::to_string_pretty(&plan)?)
        } else {
            Ok(format_plan_text(&plan))
        }
    }

    async fn run(
        &self,
        manifest: &Path,
        until: UntilArg,
        options: &RunOptions,
    ) -> Result<String, CliError> {
        let registry = Arc::new(ManifestRegistry::open(self.resolve(manifest))?);
        let mut engine = Engine::new(registry, self.config.pipeline.clone());
        let receiver = engine.subscribe();
        let report = PublishReport::shared();
        engine.add_listener(report.clone());

        engine.reset();
        drive(&mut engine).await;

        for plugin_id in &options.disable {
            engine.set_plugin_active(plugin_id, false)?;
        }
        for instance_id in &options.skip_instances {
            engine.set_instance_publish(instance_id, false)?;
        }
        if let Some(comment) = &options.comment {
            engine.set_comment(comment.clone());
        }
        if options.intent.is_some() {
            engine.set_intent(options.intent.clone());
        }

        match RunUntil::from(until) {
            RunUntil::Collect => {}
            RunUntil::Validate => engine.validate()?,
            RunUntil::Publish => engine.publish()?,
        }
        drive(&mut engine).await;
        report.lock().sync(&engine);

        let notifications: Vec<Notification> = receiver.try_iter().collect();
        if options.json {
            format_run_json(&notifications)
        } else {
            Ok(format_run_text(&notifications, &report.lock()))
        }
    }
}
