use std::collections::VecDeque;
use std::future::Future;
use std::time::Duration;

use chrono::Utc;
use offload_core::{
    update, Effect, FailureKind, JobError, JobMachine, JobOptions, JobSpec, Msg, PollPolicy,
    ProcessedArtifact, Stage, TransportError,
};
use offload_logging::{offload_debug, offload_info, offload_warn};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::config::{ConfigError, ServiceConfig};
use crate::input::FileInput;
use crate::progress::{JobEvent, ProgressSink};
use crate::transport::{ReqwestTransport, Transport};

/// Everything needed to run one job.
#[derive(Debug, Clone)]
pub struct JobRequest {
    pub tool: String,
    pub operation: String,
    pub file: FileInput,
    pub options: JobOptions,
    /// Overrides the client's poll interval for this job only.
    pub poll_interval: Option<Duration>,
}

impl JobRequest {
    pub fn new(tool: impl Into<String>, operation: impl Into<String>, file: FileInput) -> Self {
        Self {
            tool: tool.into(),
            operation: operation.into(),
            file,
            options: JobOptions::new(),
            poll_interval: None,
        }
    }

    pub fn with_options(mut self, options: JobOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = Some(interval);
        self
    }

    fn spec(&self) -> JobSpec {
        JobSpec {
            tool: self.tool.clone(),
            operation: self.operation.clone(),
            file_name: self.file.name.clone(),
            file_size: self.file.size(),
            content_type: self.file.mime_type.clone(),
        }
    }
}

/// Runs the grant → upload → submit → poll → download protocol for single jobs.
///
/// Holds no per-job state, so one client can drive any number of jobs concurrently.
#[derive(Debug, Clone)]
pub struct JobClient<T = ReqwestTransport> {
    transport: T,
    poll: PollPolicy,
    max_wait: Option<Duration>,
}

impl JobClient<ReqwestTransport> {
    pub fn from_config(config: &ServiceConfig) -> Result<Self, ConfigError> {
        let transport = ReqwestTransport::new(config)?;
        Ok(Self::new(transport, config.poll, config.max_wait))
    }
}

impl<T: Transport> JobClient<T> {
    pub fn new(transport: T, poll: PollPolicy, max_wait: Option<Duration>) -> Self {
        Self {
            transport,
            poll,
            max_wait,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Drive one job to completion.
    ///
    /// Progress and stage changes go to `sink` while the job runs. Triggering
    /// `cancel` settles the job with `FailureKind::Cancelled` at the next
    /// suspension point; no request is started once it has fired.
    pub async fn run_job(
        &self,
        request: JobRequest,
        sink: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<ProcessedArtifact, JobError> {
        let deadline = self.max_wait.map(|budget| Instant::now() + budget);
        let spec = request.spec();
        let policy = PollPolicy {
            interval: request.poll_interval.unwrap_or(self.poll.interval),
            ..self.poll
        };
        let JobRequest { file, options, .. } = request;
        offload_info!(
            "starting job tool={} operation={} file={} size={}",
            spec.tool,
            spec.operation,
            spec.file_name,
            spec.file_size
        );

        let mut machine = JobMachine::new(spec, policy);
        let mut announced = machine.stage();
        let mut pending = VecDeque::new();
        let mut next_msg = Some(Msg::Start);
        let transport = &self.transport;

        loop {
            if let Some(msg) = next_msg.take() {
                let (next, effects) = update(machine, msg);
                machine = next;
                pending.extend(effects);
            }
            let Some(effect) = pending.pop_front() else {
                // Every non-terminal update yields a follow-up effect.
                return Err(JobError::new(
                    FailureKind::ProtocolViolation,
                    format!("job stalled in stage {:?}", machine.stage()),
                ));
            };

            match effect {
                Effect::Complete(artifact) => {
                    offload_info!(
                        job = job_label(&machine);
                        "completed: {} ({} bytes)",
                        artifact.filename,
                        artifact.blob.len()
                    );
                    return Ok(artifact);
                }
                Effect::Fail(error) => {
                    offload_warn!(job = job_label(&machine); "{error}");
                    return Err(error);
                }
                Effect::ReportProgress { percent } => {
                    offload_debug!(job = job_label(&machine); "progress {percent}%");
                    sink.emit(JobEvent::Progress(percent));
                    continue;
                }
                _ => announce(&machine, &mut announced, sink),
            }

            let msg = match effect {
                Effect::RequestGrant(request) => {
                    guarded(cancel, deadline, async {
                        transport
                            .request_grant(&request)
                            .await
                            .map(|grant| Msg::GrantIssued {
                                grant,
                                now: Utc::now(),
                            })
                    })
                    .await
                }
                Effect::Upload {
                    upload_url,
                    content_type,
                } => {
                    guarded(cancel, deadline, async {
                        transport
                            .upload(&upload_url, &content_type, file.bytes.clone())
                            .await
                            .map(|()| Msg::Uploaded)
                    })
                    .await
                }
                Effect::Submit { job_id } => {
                    guarded(cancel, deadline, async {
                        transport
                            .submit(&job_id, &options)
                            .await
                            .map(|()| Msg::Submitted)
                    })
                    .await
                }
                Effect::FetchStatus { job_id } => {
                    guarded(cancel, deadline, async {
                        transport
                            .fetch_status(&job_id)
                            .await
                            .map(Msg::StatusReceived)
                    })
                    .await
                }
                Effect::SchedulePoll { after } => {
                    guarded(cancel, deadline, async {
                        tokio::time::sleep(after).await;
                        Ok::<_, TransportError>(Msg::PollDue)
                    })
                    .await
                }
                Effect::Download { result_url } => {
                    guarded(cancel, deadline, async {
                        transport.download(&result_url).await.map(Msg::Downloaded)
                    })
                    .await
                }
                Effect::ReportProgress { .. } | Effect::Complete(_) | Effect::Fail(_) => continue,
            };
            next_msg = Some(msg);
        }
    }
}

fn announce(machine: &JobMachine, announced: &mut Stage, sink: &dyn ProgressSink) {
    let stage = machine.stage();
    if stage != *announced && !stage.is_terminal() {
        offload_debug!(job = job_label(machine); "entering {stage:?}");
        sink.emit(JobEvent::StageChanged(stage));
        *announced = stage;
    }
}

fn job_label(machine: &JobMachine) -> &str {
    machine
        .job_id()
        .unwrap_or_else(|| machine.spec().file_name.as_str())
}

/// Run one step unless the caller cancels or the job's deadline passes first.
async fn guarded<F>(cancel: &CancellationToken, deadline: Option<Instant>, step: F) -> Msg
where
    F: Future<Output = Result<Msg, TransportError>>,
{
    if cancel.is_cancelled() {
        return Msg::CancelRequested;
    }
    if deadline.is_some_and(|at| Instant::now() >= at) {
        return Msg::DeadlineElapsed;
    }
    let expiry = async {
        match deadline {
            Some(at) => tokio::time::sleep_until(at).await,
            None => std::future::pending::<()>().await,
        }
    };

    tokio::select! {
        biased;
        _ = cancel.cancelled() => Msg::CancelRequested,
        _ = expiry => Msg::DeadlineElapsed,
        result = step => result.unwrap_or_else(Msg::StepFailed),
    }
}
