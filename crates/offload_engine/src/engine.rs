use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::{mpsc, Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use offload_core::{FailureKind, JobError};
use offload_logging::{offload_debug, offload_info, offload_warn};
use tokio_util::sync::CancellationToken;

use crate::client::{JobClient, JobRequest};
use crate::config::{ConfigError, ServiceConfig};
use crate::progress::ChannelProgressSink;
use crate::transport::{ReqwestTransport, Transport};
use crate::{EngineEvent, JobTicket};

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to start engine runtime: {0}")]
    Runtime(#[from] std::io::Error),
}

enum EngineCommand {
    Submit {
        ticket: JobTicket,
        request: JobRequest,
    },
    Cancel {
        ticket: JobTicket,
    },
    CancelAll,
}

type TokenRegistry = Arc<Mutex<HashMap<JobTicket, CancellationToken>>>;

/// Runs jobs on a background runtime and reports their events over a channel.
///
/// Each submitted job is independent: it owns its remote job id, its poll
/// timer and its cancellation token.
pub struct EngineHandle {
    cmd_tx: mpsc::Sender<EngineCommand>,
    event_rx: mpsc::Receiver<EngineEvent>,
}

/// Cloneable cancel-only view of an [`EngineHandle`], usable from other threads.
#[derive(Clone)]
pub struct EngineCanceller {
    cmd_tx: mpsc::Sender<EngineCommand>,
}

impl EngineCanceller {
    pub fn cancel(&self, ticket: JobTicket) {
        let _ = self.cmd_tx.send(EngineCommand::Cancel { ticket });
    }

    pub fn cancel_all(&self) {
        let _ = self.cmd_tx.send(EngineCommand::CancelAll);
    }
}

impl EngineHandle {
    pub fn new(config: &ServiceConfig) -> Result<Self, EngineError> {
        let client = JobClient::<ReqwestTransport>::from_config(config)?;
        Self::with_client(client)
    }

    pub fn with_client<T>(client: JobClient<T>) -> Result<Self, EngineError>
    where
        T: Transport + 'static,
    {
        let (cmd_tx, cmd_rx) = mpsc::channel();
        let (event_tx, event_rx) = mpsc::channel();
        let client = Arc::new(client);
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .thread_name("offload-job")
            .build()?;

        thread::Builder::new()
            .name("offload-engine".to_string())
            .spawn(move || {
                let tokens: TokenRegistry = Arc::default();
                while let Ok(command) = cmd_rx.recv() {
                    handle_command(&runtime, &client, &tokens, command, &event_tx);
                }
                offload_debug!("engine command channel closed; shutting down");
            })?;

        Ok(Self { cmd_tx, event_rx })
    }

    /// Start a job; its events carry `ticket`.
    ///
    /// A ticket still held by a running job is refused with an immediate
    /// `Completed` event carrying `FailureKind::InvalidInput`.
    pub fn submit(&self, ticket: JobTicket, request: JobRequest) {
        let _ = self.cmd_tx.send(EngineCommand::Submit { ticket, request });
    }

    pub fn cancel(&self, ticket: JobTicket) {
        let _ = self.cmd_tx.send(EngineCommand::Cancel { ticket });
    }

    pub fn canceller(&self) -> EngineCanceller {
        EngineCanceller {
            cmd_tx: self.cmd_tx.clone(),
        }
    }

    /// Block for the next event; `None` once the engine thread has stopped.
    pub fn recv(&self) -> Option<EngineEvent> {
        self.event_rx.recv().ok()
    }

    pub fn try_recv(&self) -> Option<EngineEvent> {
        self.event_rx.try_recv().ok()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<EngineEvent> {
        self.event_rx.recv_timeout(timeout).ok()
    }
}

fn handle_command<T>(
    runtime: &tokio::runtime::Runtime,
    client: &Arc<JobClient<T>>,
    tokens: &TokenRegistry,
    command: EngineCommand,
    event_tx: &mpsc::Sender<EngineEvent>,
) where
    T: Transport + 'static,
{
    match command {
        EngineCommand::Submit { ticket, request } => {
            let token = CancellationToken::new();
            let accepted = match tokens
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .entry(ticket)
            {
                Entry::Occupied(_) => false,
                Entry::Vacant(slot) => {
                    slot.insert(token.clone());
                    true
                }
            };
            if !accepted {
                // One live job per ticket; the running job keeps its token.
                offload_warn!("ticket {ticket}: rejected, a job with this ticket is still running");
                let error = JobError::new(
                    FailureKind::InvalidInput,
                    format!("ticket {ticket} is already in use by a running job"),
                );
                let _ = event_tx.send(EngineEvent::Completed {
                    ticket,
                    result: Err(error),
                });
                return;
            }
            let client = client.clone();
            let tokens = tokens.clone();
            let event_tx = event_tx.clone();
            offload_info!("ticket {ticket}: submitting {}", request.file.name);
            runtime.spawn(async move {
                let sink = ChannelProgressSink::new(ticket, event_tx.clone());
                let result = client.run_job(request, &sink, &token).await;
                if let Ok(mut registry) = tokens.lock() {
                    registry.remove(&ticket);
                }
                let _ = event_tx.send(EngineEvent::Completed { ticket, result });
            });
        }
        EngineCommand::Cancel { ticket } => {
            if let Some(token) = tokens.lock().ok().and_then(|r| r.get(&ticket).cloned()) {
                offload_info!("ticket {ticket}: cancelling");
                token.cancel();
            }
        }
        EngineCommand::CancelAll => {
            if let Ok(registry) = tokens.lock() {
                offload_info!("cancelling {} running jobs", registry.len());
                registry.values().for_each(CancellationToken::cancel);
            }
        }
    }
}
