//! Remote backend over the optimizer's HTTP API.
//!
//! | Operation | Request |
//! |-----------|---------|
//! | `start`   | `POST {base}/api/start-optimization` with the [`JobRequest`] as JSON |
//! | `status`  | `GET {base}/api/get-optimization-status?job_id={handle}` |
//! | `stop`    | `POST {base}/api/stop-optimization` with `{"job_id": handle}` |
//!
//! A bearer credential is attached when the [`CredentialProvider`] has one.
//! Response parsing is lenient: only the job identifier (for `start`) and
//! the `state` (for `status`) are required, and malformed optional fields
//! are dropped instead of rejected.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::auth::CredentialProvider;
use crate::backend::JobBackend;
use crate::error::{JobError, JobResult};
use crate::job::{JobHandle, JobRequest, JobState};
use crate::result::{BestResult, JobStatusSnapshot, PpaMetrics};

/// Identifier keys accepted in a start response, in precedence order.
const ID_KEYS: [&str; 2] = ["task_id", "job_id"];

/// HTTP client for a remote optimizer service.
pub struct RemoteBackend {
    client: reqwest::Client,
    api_base: String,
    credentials: Arc<dyn CredentialProvider>,
}

impl RemoteBackend {
    /// Create a backend for `api_base`, e.g. `http://host:8000`.
    pub fn new(api_base: impl Into<String>, credentials: Arc<dyn CredentialProvider>) -> Self {
        Self::with_client(reqwest::Client::new(), api_base, credentials)
    }

    /// Create a backend reusing an existing [`reqwest::Client`].
    pub fn with_client(
        client: reqwest::Client,
        api_base: impl Into<String>,
        credentials: Arc<dyn CredentialProvider>,
    ) -> Self {
        Self {
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            credentials,
        }
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.api_base)
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.credentials.bearer_token() {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send(
        &self,
        builder: reqwest::RequestBuilder,
        handle: Option<&JobHandle>,
    ) -> JobResult<reqwest::Response> {
        let response = self
            .authorize(builder)
            .send()
            .await
            .map_err(|e| JobError::BackendUnavailable(format!("request failed: {e}")))?;
        ensure_success(response, handle).await
    }
}

#[async_trait]
impl JobBackend for RemoteBackend {
    fn name(&self) -> &str {
        "remote"
    }

    async fn start(&self, request: &JobRequest) -> JobResult<JobHandle> {
        request.validate()?;

        let builder = self
            .client
            .post(self.url("/api/start-optimization"))
            .json(request);
        let body = read_json(self.send(builder, None).await?).await?;
        let handle = parse_start_response(&body)?;

        tracing::info!(handle = %handle, top = %request.top, "Remote job started");
        Ok(handle)
    }

    async fn status(&self, handle: &JobHandle) -> JobResult<JobStatusSnapshot> {
        let builder = self
            .client
            .get(self.url("/api/get-optimization-status"))
            .query(&[("job_id", handle.as_str())]);
        let body = read_json(self.send(builder, Some(handle)).await?).await?;
        parse_status_response(&body)
    }

    async fn stop(&self, handle: &JobHandle) -> JobResult<()> {
        let builder = self
            .client
            .post(self.url("/api/stop-optimization"))
            .json(&serde_json::json!({ "job_id": handle }));
        self.send(builder, Some(handle)).await?;

        tracing::info!(handle = %handle, "Remote job stop requested");
        Ok(())
    }
}

/// Map non-success responses. 404 against a known handle means the backend
/// lost the job, 5xx is unavailability, and any other code is a rejection.
/// Both of the latter carry the status and body.
async fn ensure_success(
    response: reqwest::Response,
    handle: Option<&JobHandle>,
) -> JobResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<unreadable body>".to_string());
    tracing::warn!(status = status.as_u16(), body = %body, "Optimizer API returned an error");

    let detail = format!("{}: {body}", status.as_u16());
    match handle {
        Some(handle) if status == reqwest::StatusCode::NOT_FOUND => {
            Err(JobError::UnknownHandle(handle.0.clone()))
        }
        _ if status.is_server_error() => Err(JobError::BackendUnavailable(detail)),
        _ => Err(JobError::Rejected(detail)),
    }
}

async fn read_json(response: reqwest::Response) -> JobResult<Value> {
    let text = response
        .text()
        .await
        .map_err(|e| JobError::BackendUnavailable(format!("failed to read response: {e}")))?;
    serde_json::from_str(&text)
        .map_err(|e| JobError::Protocol(format!("response is not JSON: {e}")))
}

/// Extract the job handle from a start response (`task_id`, then `job_id`).
pub fn parse_start_response(body: &Value) -> JobResult<JobHandle> {
    ID_KEYS
        .iter()
        .find_map(|key| match body.get(*key)? {
            Value::String(s) if !s.trim().is_empty() => Some(JobHandle::new(s.trim())),
            Value::Number(n) => Some(JobHandle::new(n.to_string())),
            _ => None,
        })
        .ok_or_else(|| JobError::Protocol("start response carries no task_id or job_id".into()))
}

/// Translate a status payload (optionally wrapped as `{"job": {...}}`).
pub fn parse_status_response(body: &Value) -> JobResult<JobStatusSnapshot> {
    let job = match body.get("job") {
        Some(inner) if inner.is_object() && body.get("state").is_none() => inner,
        _ => body,
    };

    let state: JobState = job
        .get("state")
        .and_then(Value::as_str)
        .ok_or_else(|| JobError::Protocol("status response carries no state".into()))?
        .parse()?;

    let iteration = ["iteration", "iter"]
        .iter()
        .find_map(|key| job.get(*key).and_then(whole_number))
        .unwrap_or(0);

    Ok(JobStatusSnapshot {
        state,
        iteration,
        best_result: lenient::<BestResult>(job.get("best_result")),
        metrics: lenient::<PpaMetrics>(job.get("metrics")),
        candidate_rtl: job
            .get("candidate_rtl")
            .and_then(Value::as_str)
            .map(str::to_string),
        log_tail: log_tail(job),
        error: job.get("error").and_then(Value::as_str).map(str::to_string),
    })
}

/// A non-negative integer, also when sent as a float like `1.0`.
fn whole_number(value: &Value) -> Option<u32> {
    if let Some(n) = value.as_u64() {
        return u32::try_from(n).ok();
    }
    value
        .as_f64()
        .filter(|f| f.fract() == 0.0 && (0.0..=f64::from(u32::MAX)).contains(f))
        .map(|f| f as u32)
}

/// Decode an optional sub-object, dropping it when it is not an object.
/// Malformed fields inside it read as absent.
fn lenient<T: serde::de::DeserializeOwned>(value: Option<&Value>) -> Option<T> {
    let value = value.filter(|v| v.is_object())?;
    serde_json::from_value(value.clone()).ok()
}

fn log_tail(job: &Value) -> String {
    match job.get("log_tail").or_else(|| job.get("logs")) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Array(lines)) => lines
            .iter()
            .filter_map(Value::as_str)
            .collect::<Vec<_>>()
            .join("\n"),
        _ => String::new(),
    }
}
