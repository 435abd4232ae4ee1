#![allow(dead_code)]

use std::sync::Mutex;
use std::time::Duration;

use offload_core::{PollPolicy, Stage};
use offload_engine::{JobClient, JobEvent, ProgressSink, ReqwestTransport, ServiceConfig};
use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const FAST_POLL: Duration = Duration::from_millis(10);

pub fn init_logging() {
    offload_logging::initialize_for_tests();
}

/// Records every event in arrival order.
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<JobEvent>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<JobEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn progress(&self) -> Vec<u8> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                JobEvent::Progress(percent) => Some(percent),
                JobEvent::StageChanged(_) => None,
            })
            .collect()
    }

    pub fn stages(&self) -> Vec<Stage> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                JobEvent::StageChanged(stage) => Some(stage),
                JobEvent::Progress(_) => None,
            })
            .collect()
    }
}

impl ProgressSink for RecordingSink {
    fn emit(&self, event: JobEvent) {
        self.events.lock().unwrap().push(event);
    }
}

pub fn config_for(server: &MockServer) -> ServiceConfig {
    ServiceConfig {
        poll: PollPolicy {
            interval: FAST_POLL,
            ..PollPolicy::default()
        },
        ..ServiceConfig::with_base_url(server.uri()).expect("mock server uri")
    }
}

pub fn client_for(server: &MockServer) -> JobClient<ReqwestTransport> {
    JobClient::from_config(&config_for(server)).expect("client")
}

pub fn grant_body(server: &MockServer, job_id: &str) -> Value {
    json!({
        "uploadUrl": format!("{}/storage/{job_id}", server.uri()),
        "jobId": job_id,
        "expiresAt": "2099-01-01T00:00:00Z",
    })
}

/// Grant, upload and submit all succeed for `job_id`.
pub async fn mount_accepting_service(server: &MockServer, job_id: &str) {
    Mock::given(method("POST"))
        .and(path("/upload/signed-url"))
        .respond_with(ResponseTemplate::new(200).set_body_json(grant_body(server, job_id)))
        .mount(server)
        .await;
    Mock::given(method("PUT"))
        .and(path(format!("/storage/{job_id}")))
        .respond_with(ResponseTemplate::new(200))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("/jobs/{job_id}/submit")))
        .respond_with(ResponseTemplate::new(202))
        .mount(server)
        .await;
}

/// Answer exactly one status poll with `body`; mount in the order polls should see them.
pub async fn mount_status_once(server: &MockServer, job_id: &str, body: Value) {
    Mock::given(method("GET"))
        .and(path(format!("/jobs/{job_id}/status")))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .up_to_n_times(1)
        .mount(server)
        .await;
}

/// Answer every remaining status poll with `body`.
pub async fn mount_status_forever(server: &MockServer, job_id: &str, body: Value) {
    Mock::given(method("GET"))
        .and(path(format!("/jobs/{job_id}/status")))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}
