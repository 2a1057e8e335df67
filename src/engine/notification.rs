//! Notifications emitted by the engine and the listeners that receive them.

use crate::error::EngineFault;
use crate::pipeline::{InstanceRef, PublishResult, RunUntil, Termination};
use crate::plugin::PluginRef;
use crate::types::{Order, Stage};
use serde::Serialize;
use std::sync::mpsc::{channel, Receiver, Sender};

/// Summary attached to the single `Finished` notification of every run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub command: RunUntil,
    pub termination: Termination,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fault: Option<EngineFault>,
    pub orders_with_error: Vec<Order>,
    pub processed: usize,
    pub failed: usize,
}

impl RunSummary {
    pub fn is_fault(&self) -> bool {
        self.fault.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    ResetComplete {
        plugins: usize,
        groups: Vec<Order>,
    },
    PluginsDiscovered {
        plugins: usize,
    },
    AboutToProcess {
        plugin: PluginRef,
        #[serde(skip_serializing_if = "Option::is_none")]
        instance: Option<InstanceRef>,
    },
    Processed {
        result: PublishResult,
    },
    StagePassed {
        order: Order,
        stage: Stage,
    },
    Stopped {
        reason: String,
    },
    Finished {
        summary: RunSummary,
    },
    Acted {
        result: PublishResult,
    },
}

impl Notification {
    pub fn kind(&self) -> &'static str {
        match self {
            Notification::ResetComplete { .. } => "reset_complete",
            Notification::PluginsDiscovered { .. } => "plugins_discovered",
            Notification::AboutToProcess { .. } => "about_to_process",
            Notification::Processed { .. } => "processed",
            Notification::StagePassed { .. } => "stage_passed",
            Notification::Stopped { .. } => "stopped",
            Notification::Finished { .. } => "finished",
            Notification::Acted { .. } => "acted",
        }
    }
}

/// Observer registered on the engine. Called synchronously, in emission order.
pub trait Listener: Send {
    fn on_notification(&mut self, notification: &Notification);
}

impl<F> Listener for F
where
    F: FnMut(&Notification) + Send,
{
    fn on_notification(&mut self, notification: &Notification) {
        self(notification)
    }
}

/// Forwards notifications into an mpsc channel. A dropped receiver is ignored.
pub struct ChannelListener {
    sender: Sender<Notification>,
}

impl ChannelListener {
    pub fn new_pair() -> (Self, Receiver<Notification>) {
        let (sender, receiver) = channel();
        (Self { sender }, receiver)
    }
}

impl Listener for ChannelListener {
    fn on_notification(&mut self, notification: &Notification) {
        let _ = self.sender.send(notification.clone());
    }
}
