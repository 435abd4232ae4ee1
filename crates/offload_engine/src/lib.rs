//! Offload engine: network transport and job execution for the offload protocol.
mod client;
mod config;
mod engine;
mod input;
mod persist;
mod progress;
mod transport;
mod types;

pub use client::{JobClient, JobRequest};
pub use config::{ConfigError, ServiceConfig, DEFAULT_BASE_URL};
pub use engine::{EngineCanceller, EngineError, EngineHandle};
pub use input::{FileInput, InputError};
pub use persist::{ensure_output_dir, AtomicFileWriter, PersistError};
pub use progress::{ChannelProgressSink, JobEvent, ProgressSink};
pub use transport::{ReqwestTransport, Transport};
pub use types::{EngineEvent, JobTicket};
