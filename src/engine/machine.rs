//! Engine state machine.
//!
//! Commands only arrange work; `step()` performs it. Each step does at most one
//! of: run a queued action, fetch the next pair (announcing it), or execute the
//! announced pair. Control returns to the host after announcing a pair and after
//! executing one, and a stop request is honored at either point.

use crate::config::PipelineConfig;
use crate::context::{Context, ContextStatus};
use crate::engine::notification::{ChannelListener, Listener, Notification, RunSummary};
use crate::error::{EngineError, EngineFault};
use crate::pipeline::{
    ActionRunner, DefaultStopPredicate, Executor, InstanceRef, OrderGroups, Pair, PairSequencer,
    ProcessingState, PublishResult, RunUntil, SequencerCursor, SequencerInput, SequencerStep,
    StopPredicate, Termination,
};
use crate::plugin::{prepare_plugins, PluginDescriptor, PluginRegistry};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::mpsc::Receiver;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Idle,
    Running,
    /// Last run ended on a stop request, a predicate abort or a fault.
    Stopped,
}

/// What the host should do after a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// Call `step` again after the delay.
    Continue(Duration),
    /// Nothing scheduled until the next command.
    Idle,
}

#[derive(Debug)]
enum Phase {
    Fetch,
    /// Announced with `AboutToProcess`, not yet executed.
    Execute(Pair),
}

#[derive(Debug)]
struct Run {
    until: RunUntil,
    phase: Phase,
    processed: usize,
    failed: usize,
}

#[derive(Debug, Clone)]
struct ActionRequest {
    plugin_id: String,
    action_id: String,
}

pub struct Engine {
    registry: Arc<dyn PluginRegistry>,
    config: PipelineConfig,
    predicate: Box<dyn StopPredicate>,
    listeners: Vec<Box<dyn Listener>>,
    context: Context,
    plugins: Vec<PluginDescriptor>,
    groups: OrderGroups,
    processing: ProcessingState,
    /// `None` until the first reset.
    sequencer: Option<PairSequencer>,
    run: Option<Run>,
    state: EngineState,
    stop_requested: bool,
    pending_actions: VecDeque<ActionRequest>,
    results: Vec<PublishResult>,
    plugin_toggles: HashMap<String, bool>,
    instance_toggles: HashMap<String, bool>,
}

impl Engine {
    pub fn new(registry: Arc<dyn PluginRegistry>, config: PipelineConfig) -> Self {
        let predicate = DefaultStopPredicate::new(config.stage_orders.validation);
        let groups = OrderGroups::compute(&[], config.stage_orders);
        Self {
            registry,
            config,
            predicate: Box::new(predicate),
            listeners: Vec::new(),
            context: Context::new(),
            plugins: Vec::new(),
            groups,
            processing: ProcessingState::new(),
            sequencer: None,
            run: None,
            state: EngineState::Idle,
            stop_requested: false,
            pending_actions: VecDeque::new(),
            results: Vec::new(),
            plugin_toggles: HashMap::new(),
            instance_toggles: HashMap::new(),
        }
    }

    pub fn add_listener(&mut self, listener: impl Listener + 'static) {
        self.listeners.push(Box::new(listener));
    }

    /// Register a channel listener and hand back its receiving end.
    pub fn subscribe(&mut self) -> Receiver<Notification> {
        let (listener, receiver) = ChannelListener::new_pair();
        self.add_listener(listener);
        receiver
    }

    pub fn set_stop_predicate(&mut self, predicate: impl StopPredicate + 'static) {
        self.predicate = Box::new(predicate);
    }

    // Commands

    /// Rebuild everything and start collecting.
    ///
    /// A run still in flight is finished as stopped first. A registry failure
    /// ends the new collect run with a fault.
    pub fn reset(&mut self) {
        if self.run.is_some() {
            info!("Reset cancels the run in progress");
            self.finish(Termination::Stopped, None);
        }
        if !self.pending_actions.is_empty() {
            debug!(dropped = self.pending_actions.len(), "Reset drops queued actions");
            self.pending_actions.clear();
        }
        if !self.config.preserve_toggles {
            self.plugin_toggles.clear();
            self.instance_toggles.clear();
        }

        self.context = Context::new();
        self.processing = ProcessingState::new();
        self.sequencer = Some(PairSequencer::new());
        self.results.clear();
        self.stop_requested = false;

        let discovered = self.discover();
        let fault = match discovered {
            Ok(plugins) => {
                self.plugins = plugins;
                None
            }
            Err(fault) => {
                self.plugins = Vec::new();
                Some(fault)
            }
        };
        self.apply_plugin_toggles();
        self.groups = OrderGroups::compute(&self.plugins, self.config.stage_orders);

        info!(
            plugins = self.plugins.len(),
            groups = self.groups.len(),
            "Engine reset"
        );
        self.emit(Notification::ResetComplete {
            plugins: self.plugins.len(),
            groups: self.groups.orders().to_vec(),
        });

        self.start(RunUntil::Collect);
        if let Some(fault) = fault {
            self.finish(Termination::Stopped, Some(fault));
        }
    }

    pub fn collect(&mut self) -> Result<(), EngineError> {
        self.command(RunUntil::Collect)
    }

    /// Run through validation and stop before extraction.
    pub fn validate(&mut self) -> Result<(), EngineError> {
        self.command(RunUntil::Validate)
    }

    pub fn publish(&mut self) -> Result<(), EngineError> {
        self.command(RunUntil::Publish)
    }

    /// Ask the current run to stop at the next suspension point.
    pub fn stop(&mut self) {
        if self.run.is_some() {
            warn!("Stop requested");
            self.stop_requested = true;
        } else {
            debug!("Stop requested with no run in progress");
        }
    }

    /// Queue an action. It runs on a later step, never while a pair is in flight.
    pub fn act(&mut self, plugin_id: &str, action_id: &str) -> Result<(), EngineError> {
        let plugin = self.plugin(plugin_id)?;
        ActionRunner::resolve(plugin, action_id)?;
        self.pending_actions.push_back(ActionRequest {
            plugin_id: plugin_id.to_string(),
            action_id: action_id.to_string(),
        });
        Ok(())
    }

    /// Toggle an optional plugin between commands.
    pub fn set_plugin_active(&mut self, plugin_id: &str, active: bool) -> Result<(), EngineError> {
        self.ensure_not_running()?;
        let plugin = self
            .plugins
            .iter_mut()
            .find(|p| p.id == plugin_id)
            .ok_or_else(|| EngineError::UnknownPlugin(plugin_id.to_string()))?;
        if !plugin.optional {
            return Err(EngineError::NotOptional(plugin_id.to_string()));
        }
        plugin.active = active;
        self.plugin_toggles.insert(plugin_id.to_string(), active);
        self.groups = OrderGroups::compute(&self.plugins, self.config.stage_orders);
        Ok(())
    }

    /// Toggle whether an instance is published by the remaining plugins.
    pub fn set_instance_publish(&mut self, instance_id: &str, publish: bool) -> Result<(), EngineError> {
        self.ensure_not_running()?;
        let instance = self
            .context
            .instance_mut(instance_id)
            .ok_or_else(|| EngineError::UnknownInstance(instance_id.to_string()))?;
        instance.set_publish(publish);
        self.instance_toggles.insert(instance_id.to_string(), publish);
        Ok(())
    }

    pub fn set_comment(&mut self, comment: impl Into<String>) {
        self.context.set_comment(comment);
    }

    pub fn set_intent(&mut self, intent: Option<String>) {
        self.context.set_intent(intent);
    }

    // Stepping

    /// Perform one unit of work.
    pub fn step(&mut self) -> Tick {
        let between_pairs = self
            .run
            .as_ref()
            .map_or(true, |run| matches!(run.phase, Phase::Fetch));
        if between_pairs {
            if let Some(request) = self.pending_actions.pop_front() {
                self.run_action(request);
                return self.tick();
            }
        }

        let phase = match self.run.as_mut() {
            Some(run) => std::mem::replace(&mut run.phase, Phase::Fetch),
            None => return self.tick(),
        };
        match phase {
            Phase::Fetch => self.fetch(),
            Phase::Execute(pair) => self.execute(pair),
        }
        self.tick()
    }

    fn tick(&self) -> Tick {
        if self.run.is_some() || !self.pending_actions.is_empty() {
            Tick::Continue(self.config.step_delay())
        } else {
            Tick::Idle
        }
    }

    /// Pull until the sequencer yields a pair or ends the run.
    fn fetch(&mut self) {
        loop {
            let Some(until) = self.run.as_ref().map(|run| run.until) else {
                return;
            };
            let step = match self.sequencer.as_mut() {
                Some(sequencer) => sequencer.next_step(SequencerInput {
                    plugins: &self.plugins,
                    context: &self.context,
                    groups: &self.groups,
                    state: &mut self.processing,
                    predicate: self.predicate.as_ref(),
                    until,
                    stop_requested: self.stop_requested,
                }),
                None => return,
            };

            match step {
                SequencerStep::StagePassed { order, stage } => {
                    debug!(%order, %stage, "Stage passed");
                    self.emit(Notification::StagePassed { order, stage });
                }
                SequencerStep::Finished(termination) => {
                    self.finish(termination, None);
                    return;
                }
                SequencerStep::Pair(pair) => {
                    let Some(plugin) = self.plugins.get(pair.plugin_index) else {
                        let fault = EngineFault::MalformedPlugin {
                            plugin: pair.plugin_id.clone(),
                            reason: "pair points past the plugin list".to_string(),
                        };
                        self.finish(Termination::Stopped, Some(fault));
                        return;
                    };
                    let plugin_ref = plugin.to_ref();
                    let instance = pair
                        .instance_id
                        .as_deref()
                        .and_then(|id| self.context.instance(id))
                        .map(InstanceRef::from);
                    self.emit(Notification::AboutToProcess {
                        plugin: plugin_ref,
                        instance,
                    });
                    if let Some(run) = self.run.as_mut() {
                        run.phase = Phase::Execute(pair);
                    }
                    return;
                }
            }
        }
    }

    fn execute(&mut self, pair: Pair) {
        if self.stop_requested {
            if let Some(sequencer) = self.sequencer.as_mut() {
                sequencer.requeue(pair);
            }
            self.finish(Termination::Stopped, None);
            return;
        }

        let outcome = match self.plugins.get(pair.plugin_index) {
            Some(plugin) => {
                Executor::execute(plugin, &pair, &mut self.context, &mut self.processing)
            }
            None => Err(EngineFault::MalformedPlugin {
                plugin: pair.plugin_id.clone(),
                reason: "pair points past the plugin list".to_string(),
            }),
        };

        match outcome {
            Ok(result) => {
                if let Some(run) = self.run.as_mut() {
                    run.processed += 1;
                    if !result.success {
                        run.failed += 1;
                    }
                }
                self.results.push(result.clone());
                self.emit(Notification::Processed { result });
            }
            Err(fault) => {
                error!(plugin = %pair.plugin_id, fault = %fault, "Engine fault");
                self.finish(Termination::Stopped, Some(fault));
            }
        }
    }

    fn run_action(&mut self, request: ActionRequest) {
        let Some(plugin) = self.plugins.iter().find(|p| p.id == request.plugin_id) else {
            warn!(plugin = %request.plugin_id, "Queued action's plugin is gone");
            return;
        };
        match ActionRunner::run(plugin, &request.action_id, &mut self.context) {
            Ok(result) => {
                info!(
                    plugin = %request.plugin_id,
                    action = %request.action_id,
                    success = result.success,
                    "Action ran"
                );
                self.results.push(result.clone());
                self.emit(Notification::Acted { result });
            }
            Err(err) => warn!(error = %err, "Queued action could not run"),
        }
    }

    // Run lifecycle

    fn command(&mut self, until: RunUntil) -> Result<(), EngineError> {
        self.ensure_not_running()?;
        if self.sequencer.is_none() {
            return Err(EngineError::NotReset);
        }
        self.stop_requested = false;
        self.processing.stop_on_validation = until == RunUntil::Validate;
        self.start(until);
        Ok(())
    }

    fn start(&mut self, until: RunUntil) {
        info!(command = ?until, "Run started");
        self.state = EngineState::Running;
        self.context.status_mut().is_processing = true;
        self.run = Some(Run {
            until,
            phase: Phase::Fetch,
            processed: 0,
            failed: 0,
        });
    }

    /// End the current run: `Stopped` when applicable, then exactly one `Finished`.
    fn finish(&mut self, termination: Termination, fault: Option<EngineFault>) {
        let Some(run) = self.run.take() else {
            return;
        };
        self.stop_requested = false;

        let stopped = fault.is_some() || termination.is_stop();
        if stopped {
            let reason = match (&fault, &termination) {
                (Some(fault), _) => fault.to_string(),
                (None, Termination::Aborted(reason)) => reason.clone(),
                (None, other) => other.to_string(),
            };
            warn!(reason = %reason, "Run stopped");
            self.emit(Notification::Stopped { reason });
        }

        if run.until == RunUntil::Collect && !stopped {
            self.apply_instance_toggles();
        }

        let has_failed = fault.is_some() || self.processing.has_errors();
        *self.context.status_mut() = ContextStatus {
            is_processing: false,
            has_failed,
            has_succeeded: !has_failed && termination == Termination::Exhausted,
        };
        self.state = if stopped {
            EngineState::Stopped
        } else {
            EngineState::Idle
        };

        info!(
            command = ?run.until,
            termination = %termination,
            processed = run.processed,
            failed = run.failed,
            "Run finished"
        );
        let summary = RunSummary {
            command: run.until,
            termination,
            fault,
            orders_with_error: self.processing.orders_with_error.iter().copied().collect(),
            processed: run.processed,
            failed: run.failed,
        };
        self.emit(Notification::Finished { summary });

        if run.until == RunUntil::Collect && !stopped {
            self.rediscover();
        }
    }

    /// Re-query the registry after collection. Plugins already reached stay;
    /// the rest are replaced by whatever the registry now offers at or after
    /// the last kept order. Runs even when collection used up every plugin, so
    /// plugins registered during the run can still join later stages.
    fn rediscover(&mut self) {
        let Some(cursor) = self.sequencer.as_ref().map(PairSequencer::cursor) else {
            return;
        };
        let kept_len = cursor.plugin_index.min(self.plugins.len());

        let fresh = match self.discover() {
            Ok(fresh) => fresh,
            Err(fault) => {
                warn!(fault = %fault, "Re-discovery failed, keeping current plugins");
                return;
            }
        };

        let kept_ids: HashSet<String> = self.plugins[..kept_len]
            .iter()
            .map(|p| p.id.clone())
            .collect();
        let floor = kept_len
            .checked_sub(1)
            .map(|last| self.plugins[last].order);
        self.plugins.truncate(kept_len);
        self.plugins.extend(fresh.into_iter().filter(|p| {
            !kept_ids.contains(&p.id) && floor.map_or(true, |floor| p.order >= floor)
        }));
        self.apply_plugin_toggles();
        self.groups = OrderGroups::compute(&self.plugins, self.config.stage_orders);

        debug!(plugins = self.plugins.len(), "Plugins re-discovered");
        self.emit(Notification::PluginsDiscovered {
            plugins: self.plugins.len(),
        });
    }

    fn discover(&self) -> Result<Vec<PluginDescriptor>, EngineFault> {
        let discovered = self.registry.discover()?;
        prepare_plugins(discovered, &self.config.targets)
    }

    fn apply_plugin_toggles(&mut self) {
        for plugin in self.plugins.iter_mut().filter(|p| p.optional) {
            if let Some(active) = self.plugin_toggles.get(&plugin.id) {
                plugin.active = *active;
            }
        }
    }

    fn apply_instance_toggles(&mut self) {
        for (instance_id, publish) in &self.instance_toggles {
            if let Some(instance) = self.context.instance_mut(instance_id) {
                instance.set_publish(*publish);
            }
        }
    }

    fn emit(&mut self, notification: Notification) {
        for listener in &mut self.listeners {
            listener.on_notification(&notification);
        }
    }

    fn ensure_not_running(&self) -> Result<(), EngineError> {
        if self.run.is_some() {
            Err(EngineError::Busy)
        } else {
            Ok(())
        }
    }

    fn plugin(&self, plugin_id: &str) -> Result<&PluginDescriptor, EngineError> {
        self.plugins
            .iter()
            .find(|p| p.id == plugin_id)
            .ok_or_else(|| EngineError::UnknownPlugin(plugin_id.to_string()))
    }

    // Read-only views

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.run.is_some()
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn plugins(&self) -> &[PluginDescriptor] {
        &self.plugins
    }

    pub fn order_groups(&self) -> &OrderGroups {
        &self.groups
    }

    pub fn processing(&self) -> &ProcessingState {
        &self.processing
    }

    pub fn cursor(&self) -> Option<&SequencerCursor> {
        self.sequencer.as_ref().map(PairSequencer::cursor)
    }

    /// Results since the last reset, actions included.
    pub fn results(&self) -> &[PublishResult] {
        &self.results
    }
}
