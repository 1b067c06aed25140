//! Chat message model shared by the wire protocol and the transcript.

use chrono::{DateTime, Utc};
use serde::de::Deserializer;
use serde::{Deserialize, Serialize};

/// Message author role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "user")]
    User,
    #[serde(rename = "assistant")]
    Assistant,
}

impl Role {
    pub fn label(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// A single transcript message.
///
/// Assistant content is stored verbatim, including any `<think>` spans;
/// presentation layers split those out on render.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    #[serde(default, deserialize_with = "deserialize_content")]
    pub content: String,
    /// Assigned by the backend's history store; never sent by the client.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            timestamp: None,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            timestamp: None,
        }
    }
}

/// Some backends serialize an absent reply as `null` rather than `""`.
fn deserialize_content<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let content = Option::<String>::deserialize(deserializer)?;
    Ok(content.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Role::User).unwrap(), "\"user\"");
        assert_eq!(
            serde_json::to_string(&Role::Assistant).unwrap(),
            "\"assistant\""
        );
    }

    #[test]
    fn test_null_content_deserializes_empty() {
        let message: Message =
            serde_json::from_str(r#"{"role":"assistant","content":null}"#).unwrap();
        assert_eq!(message.role, Role::Assistant);
        assert_eq!(message.content, "");
    }

    #[test]
    fn test_timestamp_is_optional() {
        let bare: Message = serde_json::from_str(r#"{"role":"user","content":"hi"}"#).unwrap();
        assert!(bare.timestamp.is_none());

        let stamped: Message = serde_json::from_str(
            r#"{"role":"user","content":"hi","timestamp":"2025-03-01T12:00:00Z"}"#,
        )
        .unwrap();
        assert!(stamped.timestamp.is_some());

        // Client-built messages serialize without the field.
        let out = serde_json::to_string(&Message::user("hi")).unwrap();
        assert!(!out.contains("timestamp"));
    }
}
