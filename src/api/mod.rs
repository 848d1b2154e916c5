//! Remote API: the server surface the state containers consume.
//!
//! DESIGN
//! ======
//! Containers depend on the [`RemoteApi`] trait, never on [`HttpApi`]
//! directly, so tests swap in a scripted mock. `HttpApi` is the only
//! production implementation.

pub mod http;
pub mod types;

pub use http::HttpApi;
pub use types::{
    ApiError, AuthPayload, ChatReply, Conversation, ConversationDetail, ConversationSummary, Message, Role,
    StreamChunk,
};

/// Provider-neutral async view of the ClawPhones server. Enables mocking in tests.
#[async_trait::async_trait]
pub trait RemoteApi: Send + Sync {
    /// Exchange email and password for a session token.
    ///
    /// # Errors
    ///
    /// Returns an [`ApiError`] if the request fails or credentials are rejected.
    async fn login(&self, email: &str, password: &str) -> Result<AuthPayload, ApiError>;

    /// Create an account and return its session token.
    ///
    /// # Errors
    ///
    /// Returns an [`ApiError`] if the request fails or the server refuses the account.
    async fn register(&self, email: &str, password: &str, name: Option<&str>) -> Result<AuthPayload, ApiError>;

    /// Exchange a Sign in with Apple identity token for a session token.
    ///
    /// # Errors
    ///
    /// Returns an [`ApiError`] if the request fails or the identity token is rejected.
    async fn login_with_apple(&self, identity_token: &str) -> Result<AuthPayload, ApiError>;

    /// Trade the stored session token for a fresh one.
    ///
    /// # Errors
    ///
    /// Returns an [`ApiError`] if no token is stored, the request fails, or
    /// the server no longer accepts the token.
    async fn refresh_token(&self) -> Result<AuthPayload, ApiError>;

    /// Create an empty conversation, optionally seeded with a system prompt.
    ///
    /// # Errors
    ///
    /// Returns an [`ApiError`] if the request fails.
    async fn create_conversation(&self, system_prompt: Option<&str>) -> Result<Conversation, ApiError>;

    /// Fetch a conversation with its full message list.
    ///
    /// # Errors
    ///
    /// Returns an [`ApiError`] if the request fails or the conversation is unknown.
    async fn get_conversation(&self, id: &str) -> Result<ConversationDetail, ApiError>;

    /// Fetch one page of conversation summaries.
    ///
    /// # Errors
    ///
    /// Returns an [`ApiError`] if the request fails.
    async fn list_conversations(&self, limit: u32, offset: u32) -> Result<Vec<ConversationSummary>, ApiError>;

    /// Delete a conversation. `Ok(false)` means the server declined.
    ///
    /// # Errors
    ///
    /// Returns an [`ApiError`] if the request fails.
    async fn delete_conversation(&self, id: &str) -> Result<bool, ApiError>;

    /// Send one user turn and return the assistant's reply.
    ///
    /// # Errors
    ///
    /// Returns an [`ApiError`] if the request fails.
    async fn chat(&self, conversation_id: &str, message: &str) -> Result<ChatReply, ApiError>;

    /// Send one user turn and stream the reply. `on_chunk` sees every chunk
    /// in arrival order; the call returns after the `done` chunk, the
    /// `[DONE]` sentinel, or the end of the body, whichever comes first.
    ///
    /// # Errors
    ///
    /// Returns an [`ApiError`] if the request fails, the server rejects it, or
    /// a chunk cannot be decoded. Chunks delivered before the error stand.
    async fn chat_stream(
        &self,
        conversation_id: &str,
        message: &str,
        on_chunk: &mut (dyn FnMut(StreamChunk) + Send),
    ) -> Result<(), ApiError>;
}
