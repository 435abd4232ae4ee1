use offload_core::{JobError, ProcessedArtifact, Stage};

/// Caller-chosen handle for a job submitted to the engine.
pub type JobTicket = u64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    Stage {
        ticket: JobTicket,
        stage: Stage,
    },
    Progress {
        ticket: JobTicket,
        percent: u8,
    },
    /// Always the last event for a ticket.
    Completed {
        ticket: JobTicket,
        result: Result<ProcessedArtifact, JobError>,
    },
}

impl EngineEvent {
    pub fn ticket(&self) -> JobTicket {
        match self {
            EngineEvent::Stage { ticket, .. }
            | EngineEvent::Progress { ticket, .. }
            | EngineEvent::Completed { ticket, .. } => *ticket,
        }
    }
}
