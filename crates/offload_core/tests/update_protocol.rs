use std::time::Duration;

use bytes::Bytes;
use chrono::{TimeZone, Utc};
use offload_core::{
    update, Effect, FailureKind, JobMachine, JobSpec, JobState, JobStatus, Msg, PollPolicy,
    ProcessedArtifact, Stage, TransportError, UploadGrant,
};
use pretty_assertions::assert_eq;

fn init_logging() {
    offload_logging::initialize_for_tests();
}

fn photo_spec() -> JobSpec {
    JobSpec {
        tool: "images".to_string(),
        operation: "compress".to_string(),
        file_name: "photo.png".to_string(),
        file_size: 500_000,
        content_type: "image/png".to_string(),
    }
}

fn policy() -> PollPolicy {
    PollPolicy {
        interval: Duration::from_millis(2000),
        ..PollPolicy::default()
    }
}

fn grant() -> UploadGrant {
    UploadGrant {
        upload_url: "https://up.example/abc".to_string(),
        job_id: "job_1".to_string(),
        expires_at: Some(Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap()),
    }
}

fn status(state: JobState, progress: Option<f64>, result_url: Option<&str>) -> JobStatus {
    JobStatus {
        job_id: "job_1".to_string(),
        status: state,
        progress,
        result_url: result_url.map(str::to_string),
        error: None,
    }
}

/// Drive a fresh job to the point where the first status request is outstanding.
fn polling_machine(policy: PollPolicy) -> JobMachine {
    let machine = JobMachine::new(photo_spec(), policy);
    let (machine, _) = update(machine, Msg::Start);
    let (machine, _) = update(
        machine,
        Msg::GrantIssued {
            grant: grant(),
            now: Utc::now(),
        },
    );
    let (machine, _) = update(machine, Msg::Uploaded);
    let (machine, effects) = update(machine, Msg::Submitted);
    assert_eq!(
        effects,
        vec![Effect::FetchStatus {
            job_id: "job_1".to_string()
        }]
    );
    machine
}

#[test]
fn photo_compress_end_to_end() {
    init_logging();
    let machine = JobMachine::new(photo_spec(), policy());
    assert_eq!(machine.stage(), Stage::Idle);

    let (machine, effects) = update(machine, Msg::Start);
    assert_eq!(machine.stage(), Stage::RequestingGrant);
    assert_eq!(effects, vec![Effect::RequestGrant(photo_spec().upload_request())]);

    let (machine, effects) = update(
        machine,
        Msg::GrantIssued {
            grant: grant(),
            now: Utc::now(),
        },
    );
    assert_eq!(machine.stage(), Stage::Uploading);
    assert_eq!(machine.job_id(), Some("job_1"));
    assert_eq!(
        effects,
        vec![Effect::Upload {
            upload_url: "https://up.example/abc".to_string(),
            content_type: "image/png".to_string(),
        }]
    );

    let (machine, effects) = update(machine, Msg::Uploaded);
    assert_eq!(machine.stage(), Stage::Submitting);
    assert_eq!(
        effects,
        vec![Effect::Submit {
            job_id: "job_1".to_string()
        }]
    );

    let (machine, _) = update(machine, Msg::Submitted);
    assert_eq!(machine.stage(), Stage::Polling);

    let (machine, effects) = update(
        machine,
        Msg::StatusReceived(status(JobState::Processing, Some(40.0), None)),
    );
    assert_eq!(
        effects,
        vec![
            Effect::ReportProgress { percent: 40 },
            Effect::SchedulePoll {
                after: Duration::from_millis(2000)
            },
        ]
    );

    let (machine, effects) = update(machine, Msg::PollDue);
    assert_eq!(
        effects,
        vec![Effect::FetchStatus {
            job_id: "job_1".to_string()
        }]
    );

    let (machine, effects) = update(
        machine,
        Msg::StatusReceived(status(
            JobState::Completed,
            None,
            Some("https://dl.example/abc"),
        )),
    );
    assert_eq!(machine.stage(), Stage::Downloading);
    assert_eq!(
        effects,
        vec![Effect::Download {
            result_url: "https://dl.example/abc".to_string()
        }]
    );

    let (machine, effects) = update(machine, Msg::Downloaded(Bytes::from_static(b"%PDF-1.7")));
    assert_eq!(machine.stage(), Stage::Done);
    assert_eq!(
        effects,
        vec![Effect::Complete(ProcessedArtifact {
            blob: Bytes::from_static(b"%PDF-1.7"),
            filename: "photo-processed.pdf".to_string(),
        })]
    );
}

#[test]
fn completed_without_result_url_is_protocol_violation() {
    init_logging();
    let machine = polling_machine(policy());
    let (machine, effects) = update(
        machine,
        Msg::StatusReceived(status(JobState::Completed, Some(100.0), None)),
    );

    assert_eq!(machine.stage(), Stage::Failed);
    assert_eq!(effects.len(), 2);
    assert_eq!(effects[0], Effect::ReportProgress { percent: 100 });
    match &effects[1] {
        Effect::Fail(err) => assert_eq!(err.kind, FailureKind::ProtocolViolation),
        other => panic!("expected failure, got {other:?}"),
    }
    assert!(!effects
        .iter()
        .any(|effect| matches!(effect, Effect::Download { .. })));
}

#[test]
fn completed_with_relative_result_url_is_protocol_violation() {
    let machine = polling_machine(policy());
    let (machine, _) = update(
        machine,
        Msg::StatusReceived(status(JobState::Completed, None, Some("/files/abc"))),
    );
    assert_eq!(
        machine.error().map(|err| err.kind),
        Some(FailureKind::ProtocolViolation)
    );
}

#[test]
fn failed_status_surfaces_remote_message() {
    let machine = polling_machine(policy());
    let mut failed = status(JobState::Failed, None, None);
    failed.error = Some("unsupported codec".to_string());

    let (machine, effects) = update(machine, Msg::StatusReceived(failed));
    let err = machine.error().cloned().expect("failed job");
    assert_eq!(err.kind, FailureKind::JobFailed);
    assert_eq!(err.message, "unsupported codec");
    assert_eq!(effects, vec![Effect::Fail(err)]);
}

#[test]
fn failed_status_without_message_uses_generic_text() {
    let machine = polling_machine(policy());
    let (machine, _) = update(
        machine,
        Msg::StatusReceived(status(JobState::Failed, None, None)),
    );
    let err = machine.error().expect("failed job");
    assert_eq!(err.kind, FailureKind::JobFailed);
    assert!(err.message.contains("without an error message"));
}

#[test]
fn transport_failures_map_to_the_running_step() {
    let failure = || TransportError::http(503, "Service Unavailable");

    let (machine, _) = update(JobMachine::new(photo_spec(), policy()), Msg::Start);
    let (machine, _) = update(machine, Msg::StepFailed(failure()));
    assert_eq!(
        machine.error().map(|e| e.kind),
        Some(FailureKind::GrantRequestFailed { status: Some(503) })
    );

    let (machine, _) = update(JobMachine::new(photo_spec(), policy()), Msg::Start);
    let (machine, _) = update(
        machine,
        Msg::GrantIssued {
            grant: grant(),
            now: Utc::now(),
        },
    );
    let (machine, _) = update(machine, Msg::StepFailed(failure()));
    assert_eq!(
        machine.error().map(|e| e.kind),
        Some(FailureKind::UploadFailed { status: Some(503) })
    );

    let machine = polling_machine(policy());
    let (machine, _) = update(
        machine,
        Msg::StepFailed(TransportError::network("connection reset")),
    );
    let err = machine.error().expect("polling failure");
    assert_eq!(err.kind, FailureKind::PollingFailed { status: None });
    assert_eq!(err.message, "connection reset");
}

#[test]
fn submit_and_download_failures_are_distinct() {
    let (machine, _) = update(JobMachine::new(photo_spec(), policy()), Msg::Start);
    let (machine, _) = update(
        machine,
        Msg::GrantIssued {
            grant: grant(),
            now: Utc::now(),
        },
    );
    let (machine, _) = update(machine, Msg::Uploaded);
    let (machine, _) = update(machine, TransportError::http(400, "Bad Request").into());
    assert_eq!(
        machine.error().map(|e| e.kind),
        Some(FailureKind::SubmitFailed { status: Some(400) })
    );

    let machine = polling_machine(policy());
    let (machine, _) = update(
        machine,
        Msg::StatusReceived(status(
            JobState::Completed,
            None,
            Some("https://dl.example/abc"),
        )),
    );
    let (machine, _) = update(machine, TransportError::http(404, "Not Found").into());
    assert_eq!(
        machine.error().map(|e| e.kind),
        Some(FailureKind::DownloadFailed { status: Some(404) })
    );
}

#[test]
fn empty_download_is_a_download_failure() {
    let machine = polling_machine(policy());
    let (machine, _) = update(
        machine,
        Msg::StatusReceived(status(
            JobState::Completed,
            None,
            Some("https://dl.example/abc"),
        )),
    );
    let (machine, _) = update(machine, Msg::Downloaded(Bytes::new()));
    assert_eq!(
        machine.error().map(|e| e.kind),
        Some(FailureKind::DownloadFailed { status: None })
    );
}

#[test]
fn max_polls_resolves_to_timeout() {
    let machine = polling_machine(PollPolicy {
        max_polls: Some(2),
        ..policy()
    });
    let (machine, effects) = update(
        machine,
        Msg::StatusReceived(status(JobState::Pending, None, None)),
    );
    assert!(matches!(effects.as_slice(), [Effect::SchedulePoll { .. }]));
    assert_eq!(machine.polls(), 1);

    let (machine, _) = update(machine, Msg::PollDue);
    let (machine, effects) = update(
        machine,
        Msg::StatusReceived(status(JobState::Processing, Some(10.0), None)),
    );
    assert_eq!(effects[0], Effect::ReportProgress { percent: 10 });
    assert!(matches!(&effects[1], Effect::Fail(err) if err.kind == FailureKind::Timeout));
    assert_eq!(machine.stage(), Stage::Failed);
}

#[test]
fn foreign_job_status_is_protocol_violation() {
    let machine = polling_machine(policy());
    let mut foreign = status(JobState::Processing, Some(50.0), None);
    foreign.job_id = "job_2".to_string();

    let (machine, effects) = update(machine, Msg::StatusReceived(foreign));
    assert_eq!(
        machine.error().map(|e| e.kind),
        Some(FailureKind::ProtocolViolation)
    );
    assert!(!effects
        .iter()
        .any(|effect| matches!(effect, Effect::ReportProgress { .. })));
}

#[test]
fn status_without_job_id_is_accepted() {
    let machine = polling_machine(policy());
    let mut anonymous = status(JobState::Processing, Some(5.0), None);
    anonymous.job_id.clear();

    let (machine, effects) = update(machine, Msg::StatusReceived(anonymous));
    assert_eq!(machine.stage(), Stage::Polling);
    assert_eq!(effects[0], Effect::ReportProgress { percent: 5 });
}

#[test]
fn cancel_and_deadline_settle_any_running_stage() {
    let machine = polling_machine(policy());
    let (machine, effects) = update(machine, Msg::CancelRequested);
    assert!(matches!(effects.as_slice(), [Effect::Fail(err)] if err.kind == FailureKind::Cancelled));
    assert!(machine.is_settled());

    let (machine, _) = update(JobMachine::new(photo_spec(), policy()), Msg::Start);
    let (machine, effects) = update(machine, Msg::DeadlineElapsed);
    assert!(matches!(effects.as_slice(), [Effect::Fail(err)] if err.kind == FailureKind::Timeout));
    assert!(machine.is_settled());
}

#[test]
fn expired_grant_is_rejected_only_when_enforced() {
    let expired = UploadGrant {
        expires_at: Some(Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap()),
        ..grant()
    };
    let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();

    let (machine, _) = update(JobMachine::new(photo_spec(), policy()), Msg::Start);
    let (machine, _) = update(
        machine,
        Msg::GrantIssued {
            grant: expired.clone(),
            now,
        },
    );
    assert_eq!(machine.stage(), Stage::Uploading);

    let strict = PollPolicy {
        enforce_grant_expiry: true,
        ..policy()
    };
    let (machine, _) = update(JobMachine::new(photo_spec(), strict), Msg::Start);
    let (machine, effects) = update(
        machine,
        Msg::GrantIssued {
            grant: expired,
            now,
        },
    );
    assert_eq!(
        machine.error().map(|e| e.kind),
        Some(FailureKind::UploadFailed { status: None })
    );
    assert!(!effects
        .iter()
        .any(|effect| matches!(effect, Effect::Upload { .. })));
}

#[test]
fn grant_without_job_id_fails_grant_step() {
    let (machine, _) = update(JobMachine::new(photo_spec(), policy()), Msg::Start);
    let (machine, _) = update(
        machine,
        Msg::GrantIssued {
            grant: UploadGrant {
                job_id: String::new(),
                ..grant()
            },
            now: Utc::now(),
        },
    );
    assert_eq!(
        machine.error().map(|e| e.kind),
        Some(FailureKind::GrantRequestFailed { status: None })
    );
}

#[test]
fn empty_operation_is_rejected_before_any_request() {
    let spec = JobSpec {
        operation: "  ".to_string(),
        ..photo_spec()
    };
    let (machine, effects) = update(JobMachine::new(spec, policy()), Msg::Start);
    assert!(matches!(effects.as_slice(), [Effect::Fail(err)] if err.kind == FailureKind::InvalidInput));
    assert!(machine.error().unwrap().message.contains("operation"));
}
