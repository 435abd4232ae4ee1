use bytes::Bytes;
use chrono::{DateTime, Utc};

use crate::error::{FailureKind, JobError};
use crate::filename::derive_output_filename;
use crate::state::{JobMachine, Phase};
use crate::types::{JobState, JobStatus, ProcessedArtifact, UploadGrant};
use crate::{Effect, Msg};

/// Pure update function: applies a message to a job and returns the effects to run.
///
/// Messages that do not fit the current stage are ignored, and a settled job
/// never produces further effects.
pub fn update(mut machine: JobMachine, msg: Msg) -> (JobMachine, Vec<Effect>) {
    if machine.is_settled() {
        return (machine, Vec::new());
    }

    let effects = match msg {
        Msg::Start => start(&mut machine),
        Msg::GrantIssued { grant, now } => grant_issued(&mut machine, grant, now),
        Msg::Uploaded => uploaded(&mut machine),
        Msg::Submitted => submitted(&mut machine),
        Msg::StatusReceived(status) => status_received(&mut machine, status),
        Msg::PollDue => poll_due(&mut machine),
        Msg::Downloaded(body) => downloaded(&mut machine, body),
        Msg::StepFailed(err) => match JobError::from_transport(machine.stage(), err) {
            Some(error) => fail(&mut machine, error),
            None => Vec::new(),
        },
        Msg::CancelRequested => fail(
            &mut machine,
            JobError::new(FailureKind::Cancelled, "cancelled by caller"),
        ),
        Msg::DeadlineElapsed => fail(
            &mut machine,
            JobError::new(FailureKind::Timeout, "job exceeded its time budget"),
        ),
    };

    (machine, effects)
}

fn start(machine: &mut JobMachine) -> Vec<Effect> {
    if machine.phase != Phase::Idle {
        return Vec::new();
    }
    if let Err(err) = machine.spec().validate() {
        return fail(machine, err);
    }
    machine.phase = Phase::RequestingGrant;
    vec![Effect::RequestGrant(machine.spec().upload_request())]
}

fn grant_issued(machine: &mut JobMachine, grant: UploadGrant, now: DateTime<Utc>) -> Vec<Effect> {
    if machine.phase != Phase::RequestingGrant {
        return Vec::new();
    }
    if grant.job_id.trim().is_empty() {
        return fail(
            machine,
            JobError::new(
                FailureKind::GrantRequestFailed { status: None },
                "grant response carried an empty jobId",
            ),
        );
    }
    if !is_usable_url(&grant.upload_url) {
        return fail(
            machine,
            JobError::new(
                FailureKind::GrantRequestFailed { status: None },
                format!("grant response carried an unusable uploadUrl {:?}", grant.upload_url),
            ),
        );
    }
    if machine.policy().enforce_grant_expiry {
        if let Some(expires_at) = grant.expires_at.filter(|at| *at <= now) {
            return fail(
                machine,
                JobError::new(
                    FailureKind::UploadFailed { status: None },
                    format!("upload grant expired at {}", expires_at.to_rfc3339()),
                ),
            );
        }
    }

    let effect = Effect::Upload {
        upload_url: grant.upload_url.clone(),
        content_type: machine.spec().content_type.clone(),
    };
    machine.phase = Phase::Uploading { grant };
    vec![effect]
}

fn uploaded(machine: &mut JobMachine) -> Vec<Effect> {
    let Phase::Uploading { grant } = &machine.phase else {
        return Vec::new();
    };
    let job_id = grant.job_id.clone();
    machine.phase = Phase::Submitting {
        job_id: job_id.clone(),
    };
    vec![Effect::Submit { job_id }]
}

fn submitted(machine: &mut JobMachine) -> Vec<Effect> {
    let Phase::Submitting { job_id } = &machine.phase else {
        return Vec::new();
    };
    let job_id = job_id.clone();
    machine.phase = Phase::Polling {
        job_id: job_id.clone(),
        polls: 0,
        in_flight: true,
    };
    vec![Effect::FetchStatus { job_id }]
}

fn poll_due(machine: &mut JobMachine) -> Vec<Effect> {
    let Phase::Polling {
        job_id, in_flight, ..
    } = &mut machine.phase
    else {
        return Vec::new();
    };
    if *in_flight {
        return Vec::new();
    }
    *in_flight = true;
    vec![Effect::FetchStatus {
        job_id: job_id.clone(),
    }]
}

fn status_received(machine: &mut JobMachine, status: JobStatus) -> Vec<Effect> {
    let interval = machine.policy().interval;
    let max_polls = machine.policy().max_polls;
    let Phase::Polling {
        job_id,
        polls,
        in_flight,
    } = &mut machine.phase
    else {
        return Vec::new();
    };
    if !*in_flight {
        return Vec::new();
    }
    *in_flight = false;
    *polls += 1;
    let polls = *polls;
    let job_id = job_id.clone();

    if !status.job_id.is_empty() && status.job_id != job_id {
        return fail(
            machine,
            JobError::new(
                FailureKind::ProtocolViolation,
                format!("status for {} answered a poll for {job_id}", status.job_id),
            ),
        );
    }

    let mut effects = Vec::new();
    if let Some(percent) = status.percent() {
        effects.push(Effect::ReportProgress { percent });
    }

    match status.status {
        JobState::Completed => match status.result_url.filter(|url| is_usable_url(url)) {
            Some(result_url) => {
                machine.phase = Phase::Downloading { job_id };
                effects.push(Effect::Download { result_url });
            }
            None => effects.extend(fail(
                machine,
                JobError::new(
                    FailureKind::ProtocolViolation,
                    "job completed without a usable resultUrl",
                ),
            )),
        },
        JobState::Failed => {
            let message = status
                .error
                .filter(|msg| !msg.trim().is_empty())
                .unwrap_or_else(|| "remote job failed without an error message".to_string());
            effects.extend(fail(machine, JobError::new(FailureKind::JobFailed, message)));
        }
        JobState::Pending | JobState::Processing => match max_polls {
            Some(max) if polls >= max => effects.extend(fail(
                machine,
                JobError::new(
                    FailureKind::Timeout,
                    format!("job still running after {polls} status polls"),
                ),
            )),
            _ => effects.push(Effect::SchedulePoll { after: interval }),
        },
    }
    effects
}

fn downloaded(machine: &mut JobMachine, body: Bytes) -> Vec<Effect> {
    let Phase::Downloading { job_id } = &machine.phase else {
        return Vec::new();
    };
    let job_id = job_id.clone();
    if body.is_empty() {
        return fail(
            machine,
            JobError::new(
                FailureKind::DownloadFailed { status: None },
                "result download returned an empty body",
            ),
        );
    }
    let filename = derive_output_filename(&machine.spec().file_name, &machine.spec().operation);
    machine.phase = Phase::Done { job_id };
    vec![Effect::Complete(ProcessedArtifact {
        blob: body,
        filename,
    })]
}

fn fail(machine: &mut JobMachine, error: JobError) -> Vec<Effect> {
    machine.phase = Phase::Failed(error.clone());
    vec![Effect::Fail(error)]
}

fn is_usable_url(raw: &str) -> bool {
    url::Url::parse(raw)
        .map(|url| matches!(url.scheme(), "http" | "https"))
        .unwrap_or(false)
}
