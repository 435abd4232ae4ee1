use std::time::Duration;

use crate::error::JobError;
use crate::types::{ProcessedArtifact, UploadRequest};

/// Work the driver must perform, in order, after an `update`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    RequestGrant(UploadRequest),
    Upload {
        upload_url: String,
        content_type: String,
    },
    /// Send the caller's options to the submit endpoint.
    Submit { job_id: String },
    FetchStatus { job_id: String },
    /// Wait, then feed back `Msg::PollDue`.
    SchedulePoll { after: Duration },
    ReportProgress { percent: u8 },
    Download { result_url: String },
    /// Terminal: hand the artifact to the caller.
    Complete(ProcessedArtifact),
    /// Terminal: hand the error to the caller.
    Fail(JobError),
}

impl Effect {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Effect::Complete(_) | Effect::Fail(_))
    }
}
