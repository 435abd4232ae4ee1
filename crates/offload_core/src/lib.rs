//! Offload core: pure job protocol state machine, wire types and naming rules.
mod effect;
mod error;
mod filename;
mod msg;
mod state;
mod types;
mod update;

pub use effect::Effect;
pub use error::{FailureKind, JobError};
pub use filename::{derive_output_filename, extension_for, DEFAULT_EXTENSION};
pub use msg::Msg;
pub use state::{JobMachine, JobSpec, PollPolicy, Stage, DEFAULT_POLL_INTERVAL};
pub use types::{
    JobOptions, JobState, JobStatus, ProcessedArtifact, TransportError, UploadGrant,
    UploadRequest,
};
pub use update::update;
