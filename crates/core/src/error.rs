//! Client error taxonomy.
//!
//! Responsibilities:
//! - One error type covering transport, backend, stream, and usage failures
//! - Mapping reqwest transport errors into that taxonomy

use thiserror::Error;

/// Errors surfaced by the chat client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The backend answered with a non-success status.
    #[error("API error: {message}")]
    Api {
        message: String,
        status_code: Option<u16>,
    },

    /// The SSE stream reported or produced an error.
    #[error("Stream error: {message}")]
    Stream { message: String },

    /// The request never completed at the transport level.
    #[error("Network error: {source}")]
    Network { source: reqwest::Error },

    /// The whole-request ceiling elapsed.
    #[error("Request timed out")]
    Timeout,

    #[error("Invalid message index {index} (transcript has {len} messages)")]
    InvalidIndex { index: usize, len: usize },

    #[error("Message is empty")]
    EmptyMessage,

    /// A send is already in flight.
    #[error("A request is already in progress")]
    Busy,

    #[error("Nothing to continue: the transcript does not end with a user message")]
    NothingToContinue,

    #[error("No user message precedes index {index}")]
    NoPrecedingUser { index: usize },

    #[error("Regenerating from a user message is disabled")]
    RegenerateFromUserDisabled,

    /// The backend has no session endpoints.
    #[error("Sessions are not supported by this backend")]
    SessionsUnavailable,
}

impl ClientError {
    pub fn stream(message: impl Into<String>) -> Self {
        ClientError::Stream {
            message: message.into(),
        }
    }

    pub fn api(message: impl Into<String>, status_code: Option<u16>) -> Self {
        ClientError::Api {
            message: message.into(),
            status_code,
        }
    }

    /// Usage errors are rejected synchronously, before any network call.
    pub fn is_usage(&self) -> bool {
        matches!(
            self,
            ClientError::InvalidIndex { .. }
                | ClientError::EmptyMessage
                | ClientError::Busy
                | ClientError::NothingToContinue
                | ClientError::NoPrecedingUser { .. }
                | ClientError::RegenerateFromUserDisabled
        )
    }
}

/// Map a transport-level failure into the client taxonomy.
pub fn map_transport_error(error: reqwest::Error) -> ClientError {
    if error.is_timeout() {
        return ClientError::Timeout;
    }
    if let Some(status) = error.status() {
        return ClientError::Api {
            message: error.to_string(),
            status_code: Some(status.as_u16()),
        };
    }
    ClientError::Network { source: error }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_errors_classified() {
        assert!(ClientError::EmptyMessage.is_usage());
        assert!(ClientError::Busy.is_usage());
        assert!(ClientError::InvalidIndex { index: 9, len: 2 }.is_usage());
        assert!(!ClientError::Timeout.is_usage());
        assert!(!ClientError::api("boom", Some(500)).is_usage());
    }

    #[test]
    fn test_display_includes_index_and_len() {
        let error = ClientError::InvalidIndex { index: 5, len: 3 };
        let text = error.to_string();
        assert!(text.contains('5'));
        assert!(text.contains('3'));
    }
}
