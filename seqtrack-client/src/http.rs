//! `SampleStore` over the seqtrack-sm HTTP API
//!
//! Non-success responses are mapped onto `MutationError` by the service's
//! error code, falling back to the status code: 404 → `NotFound`,
//! 409 → `Conflict`, 400/422 → `Invalid`, anything else → `Server`.
//! Failures to reach the server or decode its response are `Transport`.

use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use seqtrack_common::models::{
    AssignRequest, BatchReport, BulkOperationRequest, CompleteStepRequest, NewSample,
    ProcessingStep, Sample, SampleFilter, SampleId, SamplePatch, SampleStatistics, SampleStatus,
    StartStepRequest, StatusUpdateRequest, StepId, StepNotesRequest, StepPatch,
};
use seqtrack_common::{Error, MutationError, Result, SampleStore, StoreResult};

/// Per-request timeout
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

/// Map a rejected response onto `MutationError`
///
/// The service's error code wins over the status code; responses without a
/// readable body (proxies, panics) fall back to the status.
fn classify(status: StatusCode, code: Option<&str>, message: String) -> MutationError {
    match code {
        Some("NOT_FOUND") => MutationError::NotFound(message),
        Some("CONFLICT" | "STATE_ERROR") => MutationError::Conflict(message),
        Some("VALIDATION_ERROR" | "BAD_REQUEST") => MutationError::Invalid(message),
        Some("INTERNAL_ERROR" | "COMMON_ERROR") => MutationError::Server(message),
        _ => match status {
            StatusCode::NOT_FOUND => MutationError::NotFound(message),
            StatusCode::CONFLICT => MutationError::Conflict(message),
            StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
                MutationError::Invalid(message)
            }
            _ => MutationError::Server(message),
        },
    }
}

/// HTTP client for a running seqtrack-sm service
#[derive(Debug, Clone)]
pub struct HttpSampleStore {
    http_client: reqwest::Client,
    base_url: String,
}

impl HttpSampleStore {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> StoreResult<Response> {
        let response = request
            .send()
            .await
            .map_err(|e| MutationError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let detail = response.json::<ErrorBody>().await.ok().map(|body| body.error);
        let (code, message) = match detail {
            Some(detail) => (Some(detail.code), detail.message),
            None => (None, status.to_string()),
        };
        debug!(
            status = status.as_u16(),
            code = code.as_deref().unwrap_or("-"),
            message = %message,
            "Request rejected"
        );

        Err(classify(status, code.as_deref(), message))
    }

    async fn fetch<T: DeserializeOwned>(&self, request: reqwest::RequestBuilder) -> StoreResult<T> {
        self.send(request)
            .await?
            .json()
            .await
            .map_err(|e| MutationError::Transport(format!("Failed to decode response: {}", e)))
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> StoreResult<T> {
        self.fetch(self.http_client.get(self.url(path))).await
    }

    async fn post<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> StoreResult<T> {
        self.fetch(self.http_client.post(self.url(path)).json(body))
            .await
    }

    async fn put<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> StoreResult<T> {
        self.fetch(self.http_client.put(self.url(path)).json(body)).await
    }
}

#[async_trait::async_trait]
impl SampleStore for HttpSampleStore {
    async fn create_sample(&self, fields: NewSample) -> StoreResult<Sample> {
        self.post("/samples", &fields).await
    }

    async fn get_sample(&self, id: SampleId) -> StoreResult<Sample> {
        self.get(&format!("/samples/{}", id)).await
    }

    async fn list_samples(&self, filter: &SampleFilter) -> StoreResult<Vec<Sample>> {
        self.fetch(self.http_client.get(self.url("/samples")).query(filter))
            .await
    }

    async fn update_sample(&self, id: SampleId, patch: &SamplePatch) -> StoreResult<Sample> {
        self.put(&format!("/samples/{}", id), patch).await
    }

    async fn assign_sample(
        &self,
        id: SampleId,
        assignment: &AssignRequest,
    ) -> StoreResult<Sample> {
        self.put(&format!("/samples/{}/assign", id), assignment)
            .await
    }

    async fn delete_sample(&self, id: SampleId) -> StoreResult<()> {
        self.send(self.http_client.delete(self.url(&format!("/samples/{}", id))))
            .await?;
        Ok(())
    }

    async fn update_sample_status(
        &self,
        id: SampleId,
        status: SampleStatus,
    ) -> StoreResult<Sample> {
        self.put(
            &format!("/samples/{}/status", id),
            &StatusUpdateRequest { status },
        )
        .await
    }

    async fn bulk_apply(&self, request: &BulkOperationRequest) -> Result<BatchReport> {
        match self.post("/samples/bulk", request).await {
            Ok(report) => Ok(report),
            Err(MutationError::Invalid(message)) => Err(Error::validation("request", message)),
            Err(e) => Err(Error::Mutation(e)),
        }
    }

    async fn create_default_steps(&self, sample_id: SampleId) -> StoreResult<Vec<ProcessingStep>> {
        self.fetch(
            self.http_client
                .post(self.url(&format!("/samples/{}/steps", sample_id))),
        )
        .await
    }

    async fn get_processing_steps(
        &self,
        sample_id: SampleId,
    ) -> StoreResult<Vec<ProcessingStep>> {
        self.get(&format!("/samples/{}/steps", sample_id)).await
    }

    async fn start_processing_step(
        &self,
        step_id: StepId,
        assigned_to: Option<String>,
    ) -> StoreResult<ProcessingStep> {
        self.post(
            &format!("/steps/{}/start", step_id),
            &StartStepRequest { assigned_to },
        )
        .await
    }

    async fn complete_processing_step(
        &self,
        step_id: StepId,
        notes: Option<String>,
        results_data: Option<serde_json::Value>,
    ) -> StoreResult<ProcessingStep> {
        self.post(
            &format!("/steps/{}/complete", step_id),
            &CompleteStepRequest {
                notes,
                results_data,
            },
        )
        .await
    }

    async fn fail_processing_step(
        &self,
        step_id: StepId,
        notes: Option<String>,
    ) -> StoreResult<ProcessingStep> {
        self.post(&format!("/steps/{}/fail", step_id), &StepNotesRequest { notes })
            .await
    }

    async fn skip_processing_step(
        &self,
        step_id: StepId,
        notes: Option<String>,
    ) -> StoreResult<ProcessingStep> {
        self.post(&format!("/steps/{}/skip", step_id), &StepNotesRequest { notes })
            .await
    }

    async fn update_processing_step(
        &self,
        step_id: StepId,
        patch: &StepPatch,
    ) -> StoreResult<ProcessingStep> {
        self.fetch(
            self.http_client
                .patch(self.url(&format!("/steps/{}", step_id)))
                .json(patch),
        )
        .await
    }

    async fn sample_statistics(&self) -> StoreResult<SampleStatistics> {
        self.get("/stats").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let store = HttpSampleStore::new("http://127.0.0.1:5730/").unwrap();
        assert_eq!(store.base_url(), "http://127.0.0.1:5730");
        assert_eq!(store.url("/health"), "http://127.0.0.1:5730/health");
    }

    #[test]
    fn test_service_code_takes_precedence_over_status() {
        let err = classify(StatusCode::BAD_REQUEST, Some("STATE_ERROR"), "started".into());
        assert_eq!(err, MutationError::Conflict("started".into()));

        let err = classify(StatusCode::INTERNAL_SERVER_ERROR, Some("NOT_FOUND"), "gone".into());
        assert_eq!(err.code(), "not_found");

        let err = classify(StatusCode::BAD_REQUEST, Some("VALIDATION_ERROR"), "lab_name".into());
        assert_eq!(err.code(), "invalid");
    }

    #[test]
    fn test_status_fallback_without_body() {
        assert_eq!(
            classify(StatusCode::UNPROCESSABLE_ENTITY, None, "bad".into()).code(),
            "invalid"
        );
        assert_eq!(
            classify(StatusCode::CONFLICT, Some("UNKNOWN"), "x".into()).code(),
            "conflict"
        );
        assert_eq!(
            classify(StatusCode::BAD_GATEWAY, None, "502".into()).code(),
            "server_error"
        );
    }

    #[tokio::test]
    async fn test_unreachable_server_is_transport_error() {
        // Port 9 (discard) is not served in test environments
        let store = HttpSampleStore::new("http://127.0.0.1:9").unwrap();
        let err = store.get_sample(uuid::Uuid::new_v4()).await.unwrap_err();
        assert_eq!(err.code(), "transport");
    }
}
