use std::fmt;

use crate::state::Stage;
use crate::types::TransportError;

/// Why a job did not produce an artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The signed-URL request returned a non-success response or failed in transit.
    GrantRequestFailed { status: Option<u16> },
    UploadFailed { status: Option<u16> },
    SubmitFailed { status: Option<u16> },
    /// The status request itself failed; distinct from the job reporting `failed`.
    PollingFailed { status: Option<u16> },
    /// The remote job reached terminal status `failed`.
    JobFailed,
    /// The service broke the protocol, e.g. `completed` without a usable result URL.
    ProtocolViolation,
    DownloadFailed { status: Option<u16> },
    Cancelled,
    /// Poll count or wall-clock budget exhausted.
    Timeout,
    /// Rejected before any network call.
    InvalidInput,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn with_status(f: &mut fmt::Formatter<'_>, what: &str, status: &Option<u16>) -> fmt::Result {
            match status {
                Some(code) => write!(f, "{what} (http status {code})"),
                None => write!(f, "{what}"),
            }
        }
        match self {
            FailureKind::GrantRequestFailed { status } => {
                with_status(f, "upload grant request failed", status)
            }
            FailureKind::UploadFailed { status } => with_status(f, "upload failed", status),
            FailureKind::SubmitFailed { status } => with_status(f, "job submission failed", status),
            FailureKind::PollingFailed { status } => with_status(f, "status polling failed", status),
            FailureKind::JobFailed => write!(f, "job failed"),
            FailureKind::ProtocolViolation => write!(f, "protocol violation"),
            FailureKind::DownloadFailed { status } => with_status(f, "download failed", status),
            FailureKind::Cancelled => write!(f, "cancelled"),
            FailureKind::Timeout => write!(f, "timed out"),
            FailureKind::InvalidInput => write!(f, "invalid input"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct JobError {
    pub kind: FailureKind,
    pub message: String,
}

impl JobError {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Map a transport failure onto the kind owned by the step that was running.
    ///
    /// Returns `None` for stages that perform no network call.
    pub fn from_transport(stage: Stage, err: TransportError) -> Option<Self> {
        let status = err.status;
        let kind = match stage {
            Stage::RequestingGrant => FailureKind::GrantRequestFailed { status },
            Stage::Uploading => FailureKind::UploadFailed { status },
            Stage::Submitting => FailureKind::SubmitFailed { status },
            Stage::Polling => FailureKind::PollingFailed { status },
            Stage::Downloading => FailureKind::DownloadFailed { status },
            Stage::Idle | Stage::Done | Stage::Failed => return None,
        };
        Some(Self::new(kind, err.message))
    }

    /// The protocol step this error belongs to, if it came from one.
    pub fn stage(&self) -> Option<Stage> {
        match self.kind {
            FailureKind::GrantRequestFailed { .. } => Some(Stage::RequestingGrant),
            FailureKind::UploadFailed { .. } => Some(Stage::Uploading),
            FailureKind::SubmitFailed { .. } => Some(Stage::Submitting),
            FailureKind::PollingFailed { .. }
            | FailureKind::JobFailed
            | FailureKind::ProtocolViolation => Some(Stage::Polling),
            FailureKind::DownloadFailed { .. } => Some(Stage::Downloading),
            FailureKind::Cancelled | FailureKind::Timeout | FailureKind::InvalidInput => None,
        }
    }
}
