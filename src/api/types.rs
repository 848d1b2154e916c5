//! API types: wire payloads for the `/v1` surface and the client error.
//!
//! Field names follow the server's snake_case JSON. Optional fields the
//! server sometimes omits carry `#[serde(default)]` so older deployments
//! still decode.

use serde::{Deserialize, Serialize};

// =============================================================================
// ERROR
// =============================================================================

/// Errors produced by remote API calls.
///
/// The `Display` text is what state containers surface to the user, so it
/// reads as a sentence rather than a diagnostic.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// No token is stored for an endpoint that needs one.
    #[error("Device token not found. Please sign in again.")]
    NoDeviceToken,

    /// The server rejected the stored token (HTTP 401).
    #[error("Authentication failed. Please sign in again.")]
    Unauthorized,

    /// The request never produced an HTTP response.
    #[error("Network error: {0}")]
    Network(String),

    /// The server answered with a non-success status.
    #[error("{message}")]
    Api { status: u16, message: String },

    /// The response body did not match the expected shape.
    #[error("Failed to parse server response")]
    Decode(String),

    /// A streamed reply stopped before its final chunk.
    #[error("The reply was cut off. Please try again.")]
    StreamInterrupted,

    /// The configured server URL cannot carry API paths.
    #[error("Invalid server URL: {0}")]
    InvalidBaseUrl(String),

    /// The underlying HTTP client could not be constructed.
    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),
}

impl ApiError {
    /// Whether the session is gone, so retrying another way would fail too.
    #[must_use]
    pub fn ends_session(&self) -> bool {
        matches!(self, Self::NoDeviceToken | Self::Unauthorized)
    }
}

// =============================================================================
// MESSAGES
// =============================================================================

/// Author of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
    /// Any role this client does not know about.
    #[serde(other)]
    Other,
}

/// A single message within a conversation. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub content: String,
    /// Epoch seconds.
    #[serde(default)]
    pub created_at: i64,
}

impl Message {
    /// Build a user-authored message stamped with a fresh id and the current time.
    #[must_use]
    pub fn local_user(content: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            role: Role::User,
            content: content.into(),
            created_at: time::OffsetDateTime::now_utc().unix_timestamp(),
        }
    }

    /// An assistant message built on the client, stamped with the current time.
    #[must_use]
    pub fn assistant(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role: Role::Assistant,
            content: content.into(),
            created_at: time::OffsetDateTime::now_utc().unix_timestamp(),
        }
    }
}

/// Assistant reply to a chat turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatReply {
    pub message_id: String,
    pub role: Role,
    pub content: String,
    #[serde(default)]
    pub conversation_id: Option<String>,
    #[serde(default)]
    pub created_at: i64,
}

impl From<ChatReply> for Message {
    fn from(reply: ChatReply) -> Self {
        Self { id: reply.message_id, role: reply.role, content: reply.content, created_at: reply.created_at }
    }
}

/// One `data:` event of a streamed chat turn.
///
/// Deltas append to the reply. The final chunk has `done` set and may carry
/// the stored message id and the full text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamChunk {
    #[serde(default)]
    pub delta: String,
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub message_id: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

// =============================================================================
// CONVERSATIONS
// =============================================================================

/// A freshly created conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub created_at: i64,
}

/// Read-only projection used for listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub created_at: i64,
    #[serde(default)]
    pub updated_at: Option<i64>,
    #[serde(default)]
    pub message_count: u32,
}

/// A conversation with its full ordered message list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationDetail {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub created_at: i64,
    #[serde(default)]
    pub messages: Vec<Message>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ConversationListResponse {
    pub conversations: Vec<ConversationSummary>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DeleteConversationResponse {
    pub deleted: bool,
}

// =============================================================================
// AUTH
// =============================================================================

/// Result of login, registration, social login, and token refresh.
///
/// `token` and `expires_at` (epoch seconds) are persisted; the rest is
/// profile data for the caller. Refresh responses carry no profile fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthPayload {
    pub token: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub tier: Option<String>,
    #[serde(default)]
    pub expires_at: Option<i64>,
}

#[cfg(test)]
#[path = "types_test.rs"]
mod tests;
