//! The relay's HTTP contract and its reqwest implementation.
//!
//! Responsibilities:
//! - `ChatBackend`: everything the client asks of the relay
//! - `HttpBackend`: reqwest-based implementation of that contract
//! - Wire DTOs for acks, health, and session listings

use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use crate::error::{ClientError, map_transport_error};
use crate::message::Message;

/// Raw byte stream of an open `/chat/stream` response.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, ClientError>> + Send>>;

/// Backend health probe result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    /// Which upstream the relay forwards to, when it says.
    #[serde(default)]
    pub backend: Option<String>,
}

/// Session listing entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionInfo {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(default)]
    pub last_active: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(default)]
    pub message_count: usize,
}

/// Everything the client asks of the relay.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// `GET /history`
    async fn history(&self) -> Result<Vec<Message>, ClientError>;

    /// `POST /chat`. The response is only an ack; new content is obtained
    /// by a follow-up [`ChatBackend::history`] call.
    async fn send_chat(&self, text: &str) -> Result<(), ClientError>;

    /// `POST /chat/stream`, returning the raw SSE byte stream.
    async fn open_stream(&self, text: &str) -> Result<ByteStream, ClientError>;

    /// `DELETE /history/messages`, removing the last `count` messages.
    /// Returns the number the backend actually deleted.
    async fn delete_last(&self, count: usize) -> Result<usize, ClientError>;

    /// `PUT /history/messages/{index}`
    async fn update_message(&self, index: usize, content: &str) -> Result<(), ClientError>;

    /// `POST /reset`
    async fn reset(&self) -> Result<(), ClientError>;

    /// `GET /health`
    async fn health(&self) -> Result<HealthStatus, ClientError>;

    /// `GET /sessions`
    async fn sessions(&self) -> Result<Vec<SessionInfo>, ClientError>;

    /// `POST /sessions`
    async fn create_session(&self) -> Result<SessionInfo, ClientError>;

    /// `POST /sessions/{id}/activate`
    async fn activate_session(&self, id: &str) -> Result<(), ClientError>;

    /// `DELETE /sessions/{id}`
    async fn delete_session(&self, id: &str) -> Result<(), ClientError>;
}

/// Ack body for the delete endpoint.
#[derive(Debug, Deserialize)]
struct DeleteAck {
    deleted: Option<usize>,
}

/// Error body the relay uses for non-2xx responses.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: Option<String>,
}

/// reqwest-backed implementation of the relay contract.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
    stream_timeout: Duration,
}

impl HttpBackend {
    /// `request_timeout` caps plain requests; `stream_timeout` replaces it
    /// on the streaming endpoint, where the body arrives slowly on purpose.
    pub fn new(
        base_url: impl Into<String>,
        request_timeout: Duration,
        stream_timeout: Duration,
    ) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(map_transport_error)?;
        let base_url = base_url.into();
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            stream_timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Surface the relay's `{error}` body verbatim; fall back to the
    /// status line when the body is not in that shape.
    async fn check(response: reqwest::Response) -> Result<reqwest::Response, ClientError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response
            .json::<ErrorBody>()
            .await
            .ok()
            .and_then(|body| body.error)
            .unwrap_or_else(|| format!("HTTP {status}"));
        Err(ClientError::Api {
            message,
            status_code: Some(status.as_u16()),
        })
    }

    /// Session endpoints are optional; a 404 means the backend predates
    /// them rather than that a particular session is missing.
    async fn check_session(response: reqwest::Response) -> Result<reqwest::Response, ClientError> {
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(ClientError::SessionsUnavailable);
        }
        Self::check(response).await
    }
}

#[async_trait]
impl ChatBackend for HttpBackend {
    async fn history(&self) -> Result<Vec<Message>, ClientError> {
        let response = self
            .client
            .get(self.url("/history"))
            .send()
            .await
            .map_err(map_transport_error)?;
        let response = Self::check(response).await?;
        response
            .json::<Vec<Message>>()
            .await
            .map_err(map_transport_error)
    }

    async fn send_chat(&self, text: &str) -> Result<(), ClientError> {
        let response = self
            .client
            .post(self.url("/chat"))
            .json(&json!({ "text": text }))
            .send()
            .await
            .map_err(map_transport_error)?;
        Self::check(response).await?;
        Ok(())
    }

    async fn open_stream(&self, text: &str) -> Result<ByteStream, ClientError> {
        let response = self
            .client
            .post(self.url("/chat/stream"))
            .timeout(self.stream_timeout)
            .json(&json!({ "text": text }))
            .send()
            .await
            .map_err(map_transport_error)?;
        let response = Self::check(response).await?;
        debug!(status = %response.status(), "stream opened");
        Ok(Box::pin(
            response
                .bytes_stream()
                .map(|item| item.map_err(map_transport_error)),
        ))
    }

    async fn delete_last(&self, count: usize) -> Result<usize, ClientError> {
        let response = self
            .client
            .delete(self.url("/history/messages"))
            .json(&json!({ "count": count }))
            .send()
            .await
            .map_err(map_transport_error)?;
        let response = Self::check(response).await?;
        let ack = response
            .json::<DeleteAck>()
            .await
            .map_err(map_transport_error)?;
        Ok(ack.deleted.unwrap_or(count))
    }

    async fn update_message(&self, index: usize, content: &str) -> Result<(), ClientError> {
        let response = self
            .client
            .put(self.url(&format!("/history/messages/{index}")))
            .json(&json!({ "content": content }))
            .send()
            .await
            .map_err(map_transport_error)?;
        Self::check(response).await?;
        Ok(())
    }

    async fn reset(&self) -> Result<(), ClientError> {
        let response = self
            .client
            .post(self.url("/reset"))
            .send()
            .await
            .map_err(map_transport_error)?;
        Self::check(response).await?;
        Ok(())
    }

    async fn health(&self) -> Result<HealthStatus, ClientError> {
        let response = self
            .client
            .get(self.url("/health"))
            .send()
            .await
            .map_err(map_transport_error)?;
        let response = Self::check(response).await?;
        response
            .json::<HealthStatus>()
            .await
            .map_err(map_transport_error)
    }

    async fn sessions(&self) -> Result<Vec<SessionInfo>, ClientError> {
        let response = self
            .client
            .get(self.url("/sessions"))
            .send()
            .await
            .map_err(map_transport_error)?;
        let response = Self::check_session(response).await?;
        response
            .json::<Vec<SessionInfo>>()
            .await
            .map_err(map_transport_error)
    }

    async fn create_session(&self) -> Result<SessionInfo, ClientError> {
        let response = self
            .client
            .post(self.url("/sessions"))
            .send()
            .await
            .map_err(map_transport_error)?;
        let response = Self::check_session(response).await?;
        response
            .json::<SessionInfo>()
            .await
            .map_err(map_transport_error)
    }

    async fn activate_session(&self, id: &str) -> Result<(), ClientError> {
        let response = self
            .client
            .post(self.url(&format!("/sessions/{id}/activate")))
            .send()
            .await
            .map_err(map_transport_error)?;
        Self::check_session(response).await?;
        Ok(())
    }

    async fn delete_session(&self, id: &str) -> Result<(), ClientError> {
        let response = self
            .client
            .delete(self.url(&format!("/sessions/{id}")))
            .send()
            .await
            .map_err(map_transport_error)?;
        Self::check_session(response).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let backend = HttpBackend::new(
            "http://localhost:8080/",
            Duration::from_secs(5),
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(backend.url("/history"), "http://localhost:8080/history");
        assert_eq!(
            backend.url("/history/messages/3"),
            "http://localhost:8080/history/messages/3"
        );
    }

    #[test]
    fn test_session_info_tolerates_sparse_payload() {
        let info: SessionInfo = serde_json::from_str(r#"{"id":"abc123"}"#).unwrap();
        assert_eq!(info.id, "abc123");
        assert_eq!(info.name, "");
        assert_eq!(info.message_count, 0);
        assert!(info.created_at.is_none());

        let info: SessionInfo = serde_json::from_str(
            r#"{"id":"abc123","name":"work","message_count":7,"last_active":"2025-03-01T08:30:00Z"}"#,
        )
        .unwrap();
        assert_eq!(info.name, "work");
        assert_eq!(info.message_count, 7);
        assert!(info.last_active.is_some());
    }

    #[test]
    fn test_error_body_shape() {
        let body: ErrorBody = serde_json::from_str(r#"{"error":"message text required"}"#).unwrap();
        assert_eq!(body.error.as_deref(), Some("message text required"));

        let body: ErrorBody = serde_json::from_str(r#"{"detail":"other shape"}"#).unwrap();
        assert!(body.error.is_none());
    }
}
