use std::sync::mpsc;

use offload_core::Stage;

use crate::{EngineEvent, JobTicket};

/// Notification emitted while a job runs. Nothing is emitted once it settles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobEvent {
    /// The job entered a new non-terminal protocol step.
    StageChanged(Stage),
    /// Remote progress, in the order the service reported it.
    Progress(u8),
}

pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: JobEvent);
}

/// Discards every event.
impl ProgressSink for () {
    fn emit(&self, _event: JobEvent) {}
}

/// Forwards job events onto the engine's event channel, tagged with a ticket.
pub struct ChannelProgressSink {
    ticket: JobTicket,
    tx: mpsc::Sender<EngineEvent>,
}

impl ChannelProgressSink {
    pub fn new(ticket: JobTicket, tx: mpsc::Sender<EngineEvent>) -> Self {
        Self { ticket, tx }
    }
}

impl ProgressSink for ChannelProgressSink {
    fn emit(&self, event: JobEvent) {
        let ticket = self.ticket;
        let event = match event {
            JobEvent::StageChanged(stage) => EngineEvent::Stage { ticket, stage },
            JobEvent::Progress(percent) => EngineEvent::Progress { ticket, percent },
        };
        let _ = self.tx.send(event);
    }
}
