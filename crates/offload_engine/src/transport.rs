use bytes::Bytes;
use futures_util::StreamExt;
use offload_core::{JobOptions, JobStatus, TransportError, UploadGrant, UploadRequest};
use offload_logging::{offload_debug, offload_trace};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Response, StatusCode};
use url::Url;

use crate::config::{ConfigError, ServiceConfig};

const GRANT_PATH: [&str; 2] = ["upload", "signed-url"];
const MAX_ERROR_BODY_CHARS: usize = 200;

/// One network call per protocol step.
///
/// Implementations only report what happened on the wire; deciding which
/// step failed is left to the state machine.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// `POST {base}/upload/signed-url`
    async fn request_grant(&self, request: &UploadRequest) -> Result<UploadGrant, TransportError>;

    /// `PUT {upload_url}` with the raw file bytes.
    async fn upload(
        &self,
        upload_url: &str,
        content_type: &str,
        body: Bytes,
    ) -> Result<(), TransportError>;

    /// `POST {base}/jobs/{job_id}/submit`
    async fn submit(&self, job_id: &str, options: &JobOptions) -> Result<(), TransportError>;

    /// `GET {base}/jobs/{job_id}/status`
    async fn fetch_status(&self, job_id: &str) -> Result<JobStatus, TransportError>;

    /// `GET {result_url}`
    async fn download(&self, result_url: &str) -> Result<Bytes, TransportError>;
}

#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    base_url: Url,
    max_download_bytes: u64,
}

impl ReqwestTransport {
    pub fn new(config: &ServiceConfig) -> Result<Self, ConfigError> {
        let base_url = config.parsed_base_url()?;
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .build()
            .map_err(|err| ConfigError::HttpClient(err.to_string()))?;
        Ok(Self {
            client,
            base_url,
            max_download_bytes: config.max_download_bytes,
        })
    }

    fn endpoint<'a>(&self, segments: impl IntoIterator<Item = &'a str>) -> Url {
        let mut url = self.base_url.clone();
        // `parsed_base_url` rejects cannot-be-a-base urls, so this always succeeds.
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn parse_target(raw: &str) -> Result<Url, TransportError> {
        Url::parse(raw).map_err(|err| TransportError::network(format!("invalid url {raw:?}: {err}")))
    }
}

#[async_trait::async_trait]
impl Transport for ReqwestTransport {
    async fn request_grant(&self, request: &UploadRequest) -> Result<UploadGrant, TransportError> {
        let url = self.endpoint(GRANT_PATH);
        offload_debug!("POST {url} file={} size={}", request.file_name, request.file_size);
        let response = self
            .client
            .post(url)
            .json(request)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        let response = ensure_success(response).await?;
        response
            .json::<UploadGrant>()
            .await
            .map_err(|err| TransportError::network(format!("malformed upload grant: {err}")))
    }

    async fn upload(
        &self,
        upload_url: &str,
        content_type: &str,
        body: Bytes,
    ) -> Result<(), TransportError> {
        let url = Self::parse_target(upload_url)?;
        offload_debug!("PUT upload bytes={} content_type={content_type}", body.len());
        let response = self
            .client
            .put(url)
            .header(CONTENT_TYPE, content_type)
            .body(body)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        ensure_success(response).await.map(|_| ())
    }

    async fn submit(&self, job_id: &str, options: &JobOptions) -> Result<(), TransportError> {
        let url = self.endpoint(["jobs", job_id, "submit"]);
        offload_debug!(job = job_id; "POST {url} options={}", options.len());
        let response = self
            .client
            .post(url)
            .json(options)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        ensure_success(response).await.map(|_| ())
    }

    async fn fetch_status(&self, job_id: &str) -> Result<JobStatus, TransportError> {
        let url = self.endpoint(["jobs", job_id, "status"]);
        offload_trace!(job = job_id; "GET {url}");
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        let response = ensure_success(response).await?;
        response
            .json::<JobStatus>()
            .await
            .map_err(|err| TransportError::network(format!("malformed job status: {err}")))
    }

    async fn download(&self, result_url: &str) -> Result<Bytes, TransportError> {
        let url = Self::parse_target(result_url)?;
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        let response = ensure_success(response).await?;

        let max_bytes = self.max_download_bytes;
        let too_large = |actual: u64| {
            TransportError::network(format!(
                "result too large (max {max_bytes} bytes, got at least {actual})"
            ))
        };
        if let Some(content_len) = response.content_length() {
            if content_len > max_bytes {
                return Err(too_large(content_len));
            }
        }

        let mut bytes = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(map_reqwest_error)?;
            let next_len = bytes.len() as u64 + chunk.len() as u64;
            if next_len > max_bytes {
                return Err(too_large(next_len));
            }
            bytes.extend_from_slice(&chunk);
        }
        offload_debug!("downloaded {} bytes", bytes.len());
        Ok(Bytes::from(bytes))
    }
}

async fn ensure_success(response: Response) -> Result<Response, TransportError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(TransportError::http(
        status.as_u16(),
        error_message(status, &body),
    ))
}

/// Prefer the service's own `error`/`message` field, then the raw body, then the status text.
fn error_message(status: StatusCode, body: &str) -> String {
    let from_json = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| {
            ["error", "message"]
                .iter()
                .find_map(|key| value.get(*key)?.as_str().map(str::to_string))
        });
    if let Some(message) = from_json.filter(|m| !m.trim().is_empty()) {
        return message;
    }
    let trimmed = body.trim();
    if !trimmed.is_empty() {
        return trimmed.chars().take(MAX_ERROR_BODY_CHARS).collect();
    }
    status
        .canonical_reason()
        .map(str::to_string)
        .unwrap_or_else(|| status.to_string())
}

fn map_reqwest_error(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        return TransportError::network(format!("request timed out: {err}"));
    }
    if err.is_connect() {
        return TransportError::network(format!("connection failed: {err}"));
    }
    TransportError::network(format!("network error: {err}"))
}
