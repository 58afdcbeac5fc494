//! Envelope and payload types.

use std::fmt;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{CodecError, PublishError};

// ── Envelope ────────────────────────────────────────────────────────

/// The canonical transport record.
///
/// Fields are private: an envelope is stamped once by [`Envelope::new`]
/// (or decoded from the wire) and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    id: String,
    #[serde(rename = "type")]
    kind: String,
    payload: serde_json::Value,
    timestamp: i64,
}

impl Envelope {
    /// Stamp a new envelope with a fresh UUID and the current time in ms.
    pub fn new(kind: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            kind: kind.into(),
            payload,
            timestamp: Utc::now().timestamp_millis(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// The `type` tag that drives dispatch.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn payload(&self) -> &serde_json::Value {
        &self.payload
    }

    /// Creation time, milliseconds since the Unix epoch.
    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    /// Check the invariants serde cannot express: non-empty `id` and
    /// `type`, non-negative `timestamp`.
    pub(crate) fn check(&self) -> Result<(), CodecError> {
        if self.id.is_empty() {
            return Err(CodecError::InvalidField {
                field: "id",
                reason: "must be a non-empty string".into(),
            });
        }
        if self.kind.is_empty() {
            return Err(CodecError::InvalidField {
                field: "type",
                reason: "must be a non-empty string".into(),
            });
        }
        if self.timestamp < 0 {
            return Err(CodecError::InvalidField {
                field: "timestamp",
                reason: format!("must be non-negative, got {}", self.timestamp),
            });
        }
        Ok(())
    }
}

// ── Message kinds ───────────────────────────────────────────────────

/// Message types this relay knows how to decode.
///
/// Adding a type means adding a variant here and a handler in
/// `dispatch`; every other tag is treated as unrecognized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    Notification,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Notification => "notification",
        }
    }

    /// Resolve a wire `type` tag. Matching is exact and case-sensitive.
    pub fn from_type(kind: &str) -> Option<Self> {
        match kind {
            "notification" => Some(Self::Notification),
            _ => None,
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Payloads ────────────────────────────────────────────────────────

/// Payload of a `notification` envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationPayload {
    /// Recipient chat identifier.
    #[serde(rename = "chatId")]
    pub chat_id: i64,
    pub text: String,
    /// Optional correlation identifier supplied by the producer.
    #[serde(rename = "messageId", default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
}

impl NotificationPayload {
    /// Decode the payload of an envelope as a notification.
    pub fn from_envelope(envelope: &Envelope) -> Result<Self, serde_json::Error> {
        Self::deserialize(envelope.payload())
    }
}

// ── Create-message operation ────────────────────────────────────────

/// Inbound request to create and publish a message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreationRequest {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl CreationRequest {
    pub fn new(kind: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            kind: kind.into(),
            payload,
        }
    }

    /// Both `type` and `payload` are required; `null` counts as absent.
    pub fn validate(&self) -> Result<(), PublishError> {
        if self.kind.is_empty() {
            return Err(PublishError::InvalidRequest("type is required".into()));
        }
        if self.payload.is_null() {
            return Err(PublishError::InvalidRequest("payload is required".into()));
        }
        Ok(())
    }
}

/// Result of a successful publish: the id assigned to the envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreationResult {
    pub id: String,
}
