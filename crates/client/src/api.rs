//! REST client for the sync backend endpoints this layer consumes.
//!
//! Wraps the status snapshot, the live-state poll, and the fire-and-forget
//! trigger/cancel calls using [`reqwest`]. The effects of trigger and
//! cancel are observed through the snapshot and the live channels, not
//! through these return values.

use livesync_core::{DbId, JobId, LiveResponse, StatusSnapshot};
use serde::de::DeserializeOwned;
use serde::Deserialize;

/// HTTP client for one backend.
pub struct BackendApi {
    client: reqwest::Client,
    api_url: String,
}

/// Response of `POST /sync/{id}`.
#[derive(Debug, Deserialize)]
pub struct TriggerResponse {
    /// `started`, `already_running` or `blocked_by_move`.
    pub status: String,
    #[serde(default)]
    pub source_id: Option<DbId>,
}

/// Response of `POST /sync/all`.
#[derive(Debug, Deserialize)]
pub struct TriggerAllResponse {
    pub status: String,
    /// Number of sources that were started.
    pub count: u32,
}

/// Errors from the backend REST layer.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The HTTP request itself failed (network, DNS, TLS, decode).
    #[error("Backend request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The backend returned a non-2xx status code.
    #[error("Backend API error ({status}): {body}")]
    Status {
        status: u16,
        /// Response body, empty if it could not be read.
        body: String,
    },
}

impl BackendApi {
    /// Create a client for a backend.
    ///
    /// * `api_url` - Base HTTP URL including the API prefix, e.g.
    ///   `http://127.0.0.1:8000/api`.
    pub fn new(api_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), api_url)
    }

    /// Create a client reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, api_url: impl Into<String>) -> Self {
        Self {
            client,
            api_url: api_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// Coarse status of every source (`GET /sync/status`).
    pub async fn status_snapshot(&self) -> Result<StatusSnapshot, ApiError> {
        let request = self.client.get(self.url("/sync/status"));
        Self::read_json(request).await
    }

    /// Poll the live state of a job from `cursor` onward.
    pub async fn live(&self, job: JobId, cursor: u64) -> Result<LiveResponse, ApiError> {
        let request = self
            .client
            .get(self.url(&job.live_path()))
            .query(&[("cursor", cursor)]);
        Self::read_json(request).await
    }

    /// Ask the backend to start syncing one source.
    pub async fn trigger(&self, source_id: DbId) -> Result<TriggerResponse, ApiError> {
        let request = self.client.post(self.url(&format!("/sync/{source_id}")));
        Self::read_json(request).await
    }

    /// Ask the backend to sync every enabled source.
    pub async fn trigger_all(&self) -> Result<TriggerAllResponse, ApiError> {
        let request = self.client.post(self.url("/sync/all"));
        Self::read_json(request).await
    }

    /// Cancel a running sync.
    pub async fn cancel(&self, source_id: DbId) -> Result<(), ApiError> {
        let request = self.client.post(self.url(&format!("/sync/{source_id}/cancel")));
        Self::send(request).await.map(drop)
    }

    // ---- private helpers ----

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.api_url)
    }

    /// Send the request; a non-2xx answer becomes [`ApiError::Status`]
    /// carrying the body text.
    async fn send(request: reqwest::RequestBuilder) -> Result<reqwest::Response, ApiError> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(ApiError::Status {
            status: status.as_u16(),
            body,
        })
    }

    async fn read_json<T: DeserializeOwned>(
        request: reqwest::RequestBuilder,
    ) -> Result<T, ApiError> {
        Ok(Self::send(request).await?.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_slash_is_trimmed() {
        let api = BackendApi::new("http://127.0.0.1:8000/api/");
        assert_eq!(api.api_url(), "http://127.0.0.1:8000/api");
    }

    #[test]
    fn trigger_response_tolerates_missing_source_id() {
        let resp: TriggerResponse =
            serde_json::from_str(r#"{"status":"blocked_by_move"}"#).unwrap();
        assert_eq!(resp.status, "blocked_by_move");
        assert!(resp.source_id.is_none());
    }
}
