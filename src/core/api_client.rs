// src/core/api_client.rs
//! HTTP client for the MediKariyer photo endpoints.

use anyhow::{Context, Result};
use tracing::{error, info, trace};

use crate::types::{
    CancelResponse, PhotoStatusData, PhotoStatusResponse, SubmitPhotoRequest, SubmitPhotoResponse,
};

const PHOTO_STATUS_ENDPOINT: &str = "/doctor/profile/photo/status";
const PHOTO_SUBMIT_ENDPOINT: &str = "/doctor/profile/photo";
const PHOTO_CANCEL_ENDPOINT: &str = "/doctor/profile/photo/request";

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

pub struct PhotoApiClient {
    client: reqwest::Client,
    base_url: String,
    bearer_token: Option<String>,
}

impl PhotoApiClient {
    /// Create a new client for the given API base URL.
    pub fn new(
        base_url: String,
        bearer_token: Option<String>,
        timeout_seconds: u64,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_seconds))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url,
            bearer_token,
        })
    }

    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.bearer_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Fetch the authoritative request status plus server-side history.
    pub async fn fetch_status(&self) -> Result<PhotoStatusData> {
        let url = format!("{}{}", self.base_url, PHOTO_STATUS_ENDPOINT);

        trace!("Fetching photo request status: {}", url);

        let response = self
            .authorized(self.client.get(&url))
            .send()
            .await
            .context("Failed to fetch photo request status")?;

        let status = response.status();
        if status.is_success() {
            let envelope: PhotoStatusResponse = response
                .json()
                .await
                .context("Failed to parse photo status response")?;
            Ok(envelope.data)
        } else {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            error!("Photo status error response: {}", error_text);
            anyhow::bail!("Status fetch failed with status {}: {}", status, error_text)
        }
    }

    /// Submit a new photo as a base64 data URL, creating a pending request.
    pub async fn submit_photo(&self, file_url: &str) -> Result<SubmitPhotoResponse> {
        let url = format!("{}{}", self.base_url, PHOTO_SUBMIT_ENDPOINT);

        let payload = SubmitPhotoRequest {
            file_url: file_url.to_string(),
        };

        info!("Submitting photo change request: {}", url);

        let response = self
            .authorized(self.client.post(&url))
            .json(&payload)
            .send()
            .await
            .context("Failed to submit photo change request")?;

        let status = response.status();
        if status.is_success() {
            response
                .json::<SubmitPhotoResponse>()
                .await
                .context("Failed to parse photo submission response")
        } else {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            error!("Photo submission error response: {}", error_text);
            anyhow::bail!("Submission failed with status {}: {}", status, error_text)
        }
    }

    /// Cancel the current pending request.
    pub async fn cancel_request(&self) -> Result<CancelResponse> {
        let url = format!("{}{}", self.base_url, PHOTO_CANCEL_ENDPOINT);

        info!("Cancelling pending photo change request: {}", url);

        let response = self
            .authorized(self.client.delete(&url))
            .send()
            .await
            .context("Failed to cancel photo change request")?;

        let status = response.status();
        if status.is_success() {
            // Some deployments answer 204 with an empty body.
            let text = response.text().await.unwrap_or_default();
            if text.trim().is_empty() {
                return Ok(CancelResponse::default());
            }
            serde_json::from_str(&text).context("Failed to parse cancellation response")
        } else {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            error!("Photo cancellation error response: {}", error_text);
            anyhow::bail!("Cancellation failed with status {}: {}", status, error_text)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RequestStatus;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_fetch_status_parses_envelope() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/doctor/profile/photo/status"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": {
                    "status": {
                        "id": 7,
                        "status": "pending",
                        "file_url": "https://cdn/photo.png",
                        "created_at": "2026-08-01T10:00:00Z"
                    },
                    "history": [
                        { "id": 3, "status": "rejected", "reason": "blurry",
                          "created_at": "2026-07-01T10:00:00Z" }
                    ]
                }
            })))
            .mount(&server)
            .await;

        let client = PhotoApiClient::new(server.uri(), None, DEFAULT_TIMEOUT_SECS).unwrap();
        let data = client.fetch_status().await.unwrap();

        let active = data.status.unwrap();
        assert_eq!(active.id, Some(7));
        assert_eq!(active.status, RequestStatus::Pending);
        assert_eq!(data.history.len(), 1);
        assert_eq!(data.history[0].reason.as_deref(), Some("blurry"));
    }

    #[tokio::test]
    async fn test_fetch_status_tolerates_partial_payload() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/doctor/profile/photo/status"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .mount(&server)
            .await;

        let client = PhotoApiClient::new(server.uri(), None, DEFAULT_TIMEOUT_SECS).unwrap();
        let data = client.fetch_status().await.unwrap();
        assert!(data.status.is_none());
        assert!(data.history.is_empty());
    }

    #[tokio::test]
    async fn test_submit_sends_bearer_token_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/doctor/profile/photo"))
            .and(header("authorization", "Bearer secret-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": { "id": 11, "status": "pending",
                          "created_at": "2026-08-01T10:00:00Z" }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = PhotoApiClient::new(
            server.uri(),
            Some("secret-token".to_string()),
            DEFAULT_TIMEOUT_SECS,
        )
        .unwrap();
        let resp = client
            .submit_photo("data:image/png;base64,AAAA")
            .await
            .unwrap();
        assert_eq!(resp.data.unwrap().id, Some(11));
    }

    #[tokio::test]
    async fn test_submit_error_carries_server_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/doctor/profile/photo"))
            .respond_with(ResponseTemplate::new(409).set_body_string("already pending"))
            .mount(&server)
            .await;

        let client = PhotoApiClient::new(server.uri(), None, DEFAULT_TIMEOUT_SECS).unwrap();
        let err = client
            .submit_photo("data:image/png;base64,AAAA")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("already pending"));
    }

    #[tokio::test]
    async fn test_cancel_accepts_empty_body() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/doctor/profile/photo/request"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let client = PhotoApiClient::new(server.uri(), None, DEFAULT_TIMEOUT_SECS).unwrap();
        let resp = client.cancel_request().await.unwrap();
        assert!(resp.message.is_none());
    }
}
