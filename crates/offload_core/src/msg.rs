use bytes::Bytes;
use chrono::{DateTime, Utc};

use crate::types::{JobStatus, TransportError, UploadGrant};

/// Inputs to the job state machine: results of effects plus caller signals.
#[derive(Debug, Clone, PartialEq)]
pub enum Msg {
    /// Begin the protocol.
    Start,
    /// The grant endpoint answered; `now` is used for optional expiry checks.
    GrantIssued {
        grant: UploadGrant,
        now: DateTime<Utc>,
    },
    Uploaded,
    Submitted,
    StatusReceived(JobStatus),
    /// The poll interval elapsed.
    PollDue,
    Downloaded(Bytes),
    /// The network call for the current step failed.
    StepFailed(TransportError),
    CancelRequested,
    /// The wall-clock budget for the whole job ran out.
    DeadlineElapsed,
}

impl From<TransportError> for Msg {
    fn from(err: TransportError) -> Self {
        Msg::StepFailed(err)
    }
}
