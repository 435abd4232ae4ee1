use std::time::Duration;

use crate::error::{FailureKind, JobError};
use crate::types::{UploadGrant, UploadRequest};

/// Default pause between two status polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(2000);

/// What is being processed; fixed for the lifetime of one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSpec {
    pub tool: String,
    pub operation: String,
    pub file_name: String,
    pub file_size: u64,
    /// MIME type sent as `Content-Type` on upload.
    pub content_type: String,
}

impl JobSpec {
    pub fn upload_request(&self) -> UploadRequest {
        UploadRequest {
            tool: self.tool.clone(),
            operation: self.operation.clone(),
            file_size: self.file_size,
            file_name: self.file_name.clone(),
        }
    }

    pub fn validate(&self) -> Result<(), JobError> {
        let missing = [
            ("tool", self.tool.trim().is_empty()),
            ("operation", self.operation.trim().is_empty()),
            ("file name", self.file_name.trim().is_empty()),
        ];
        match missing.iter().find(|(_, empty)| *empty) {
            Some((field, _)) => Err(JobError::new(
                FailureKind::InvalidInput,
                format!("{field} must not be empty"),
            )),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    /// Non-terminal statuses tolerated before failing with `Timeout`; `None` polls forever.
    pub max_polls: Option<u32>,
    /// Refuse to upload once the grant's `expiresAt` has passed.
    pub enforce_grant_expiry: bool,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            max_polls: None,
            enforce_grant_expiry: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Stage {
    #[default]
    Idle,
    RequestingGrant,
    Uploading,
    Submitting,
    Polling,
    Downloading,
    Done,
    Failed,
}

impl Stage {
    pub fn is_terminal(self) -> bool {
        matches!(self, Stage::Done | Stage::Failed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Phase {
    Idle,
    RequestingGrant,
    Uploading {
        grant: UploadGrant,
    },
    Submitting {
        job_id: String,
    },
    Polling {
        job_id: String,
        polls: u32,
        /// A status request is outstanding; otherwise waiting for the next `PollDue`.
        in_flight: bool,
    },
    Downloading {
        job_id: String,
    },
    Done {
        job_id: String,
    },
    Failed(JobError),
}

/// One job's position in the grant → upload → submit → poll → download protocol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobMachine {
    spec: JobSpec,
    policy: PollPolicy,
    pub(crate) phase: Phase,
}

impl JobMachine {
    pub fn new(spec: JobSpec, policy: PollPolicy) -> Self {
        Self {
            spec,
            policy,
            phase: Phase::Idle,
        }
    }

    pub fn spec(&self) -> &JobSpec {
        &self.spec
    }

    pub fn policy(&self) -> &PollPolicy {
        &self.policy
    }

    pub fn stage(&self) -> Stage {
        match self.phase {
            Phase::Idle => Stage::Idle,
            Phase::RequestingGrant => Stage::RequestingGrant,
            Phase::Uploading { .. } => Stage::Uploading,
            Phase::Submitting { .. } => Stage::Submitting,
            Phase::Polling { .. } => Stage::Polling,
            Phase::Downloading { .. } => Stage::Downloading,
            Phase::Done { .. } => Stage::Done,
            Phase::Failed(_) => Stage::Failed,
        }
    }

    /// Remote correlation id, once granted.
    pub fn job_id(&self) -> Option<&str> {
        match &self.phase {
            Phase::Idle | Phase::RequestingGrant | Phase::Failed(_) => None,
            Phase::Uploading { grant } => Some(&grant.job_id),
            Phase::Submitting { job_id }
            | Phase::Polling { job_id, .. }
            | Phase::Downloading { job_id }
            | Phase::Done { job_id } => Some(job_id),
        }
    }

    /// Status responses received so far.
    pub fn polls(&self) -> u32 {
        match self.phase {
            Phase::Polling { polls, .. } => polls,
            _ => 0,
        }
    }

    pub fn error(&self) -> Option<&JobError> {
        match &self.phase {
            Phase::Failed(err) => Some(err),
            _ => None,
        }
    }

    pub fn is_settled(&self) -> bool {
        self.stage().is_terminal()
    }
}
