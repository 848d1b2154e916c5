//! reqwest-backed [`RemoteApi`] for the ClawPhones `/v1` REST surface.
//!
//! ERROR HANDLING
//! ==============
//! Every failure becomes an [`ApiError`] whose `Display` is user-facing.
//! Non-2xx bodies are FastAPI-style `{"detail": ...}`; the detail text is
//! lifted out when present. A 401 on an authorized request means the stored
//! token is dead: it is cleared and the [`AuthSignal`] fires so auth state
//! refreshes everywhere.
//!
//! TOKEN LIFETIME
//! ==============
//! Before each authorized request the stored expiry is checked. A token with
//! no expiry is stamped with the default TTL. An expired token ends the
//! session without a round trip. Inside the refresh window the token is
//! traded for a fresh one first; if that fails for any reason other than a
//! rejected session, the current token is still used.

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::header::ACCEPT;
use reqwest::{Method, Url};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use super::RemoteApi;
use super::types::{
    ApiError, AuthPayload, ChatReply, Conversation, ConversationDetail, ConversationListResponse,
    ConversationSummary, DeleteConversationResponse, StreamChunk,
};
use crate::config::ClientConfig;
use crate::device::store::{is_expired, normalize_expiry, now_epoch};
use crate::device::{AuthChange, AuthSignal, DeviceStore};

const UNKNOWN_ERROR: &str = "Unknown error";
const LOG_BODY_LIMIT: usize = 512;

/// Tokens closer than this to expiry are refreshed before use.
pub const REFRESH_WINDOW_SECS: i64 = 7 * 24 * 60 * 60;

/// Streamed replies may run far longer than a plain request.
const STREAM_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Access {
    Public,
    /// Bearer token, refreshed first when it is close to expiry.
    Authorized,
    /// Bearer token as stored; used by the refresh call itself.
    Refresh,
}

pub struct HttpApi {
    http: reqwest::Client,
    base_url: String,
    root: Url,
    store: Arc<dyn DeviceStore>,
    signal: AuthSignal,
}

impl HttpApi {
    /// Build a client for `config.base_url` that reads its bearer token from `store`.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL cannot carry paths or the HTTP client
    /// cannot be constructed.
    pub fn new(config: &ClientConfig, store: Arc<dyn DeviceStore>, signal: AuthSignal) -> Result<Self, ApiError> {
        let base_url = config.base_url.trim_end_matches('/').to_string();
        let root = Url::parse(&base_url).map_err(|e| ApiError::InvalidBaseUrl(format!("{base_url}: {e}")))?;
        if root.cannot_be_a_base() {
            return Err(ApiError::InvalidBaseUrl(base_url));
        }
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeouts.request_secs))
            .connect_timeout(Duration::from_secs(config.timeouts.connect_secs))
            .build()
            .map_err(|e| ApiError::HttpClientBuild(e.to_string()))?;
        Ok(Self { http, base_url, root, store, signal })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, segments: &[&str]) -> Url {
        endpoint(&self.root, segments)
    }

    async fn request(&self, method: Method, url: Url, access: Access) -> Result<reqwest::RequestBuilder, ApiError> {
        let builder = self.http.request(method, url);
        match access {
            Access::Public => Ok(builder),
            Access::Authorized => Ok(builder.bearer_auth(self.session_token().await?)),
            Access::Refresh => {
                let token = self.store.token().ok_or(ApiError::NoDeviceToken)?;
                Ok(builder.bearer_auth(token))
            }
        }
    }

    /// The token to send on an authorized request, refreshed when it is
    /// inside [`REFRESH_WINDOW_SECS`] of expiry.
    async fn session_token(&self) -> Result<String, ApiError> {
        let token = self.store.token().ok_or(ApiError::NoDeviceToken)?;
        let now = now_epoch();
        let expires_at = match self.store.token_expires_at() {
            Some(at) => at,
            None => {
                let at = normalize_expiry(None, now);
                if let Err(e) = self.store.save_user_token(&token, Some(at)) {
                    tracing::warn!(error = %e, "failed to stamp token expiry");
                }
                at
            }
        };

        if is_expired(Some(expires_at), now) {
            self.expire_session();
            return Err(ApiError::Unauthorized);
        }
        if expires_at - now >= REFRESH_WINDOW_SECS {
            return Ok(token);
        }

        match self.refresh_token().await {
            Ok(payload) => {
                let expires_at = normalize_expiry(payload.expires_at, now);
                match self.store.save_user_token(&payload.token, Some(expires_at)) {
                    Ok(()) => {
                        let receivers = self.signal.notify(AuthChange::TokensChanged);
                        tracing::info!(receivers, expires_at, "session token refreshed");
                        Ok(payload.token.trim().to_owned())
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "refreshed token not stored; keeping current token");
                        Ok(token)
                    }
                }
            }
            Err(e) if e.ends_session() => Err(e),
            Err(e) => {
                tracing::warn!(error = %e, "token refresh failed; keeping current token");
                Ok(token)
            }
        }
    }

    async fn execute<T: DeserializeOwned>(&self, request: reqwest::RequestBuilder, access: Access) -> Result<T, ApiError> {
        let response = request
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(network_error)?;

        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;

        if !(200..300).contains(&status) {
            return Err(self.rejection(status, &text, access));
        }

        serde_json::from_str::<T>(&text).map_err(|e| {
            tracing::warn!(error = %e, body = %truncate(&text), "response decode failed");
            ApiError::Decode(e.to_string())
        })
    }

    fn rejection(&self, status: u16, body: &str, access: Access) -> ApiError {
        if status == 401 && access != Access::Public {
            self.expire_session();
            return ApiError::Unauthorized;
        }
        tracing::debug!(status, body = %truncate(body), "server returned error status");
        ApiError::Api { status, message: error_message(body) }
    }

    fn expire_session(&self) {
        if let Err(e) = self.store.clear_tokens() {
            tracing::warn!(error = %e, "failed to clear rejected session token");
        }
        let receivers = self.signal.notify(AuthChange::SessionExpired);
        tracing::info!(receivers, "session expired; stored token cleared");
    }
}

#[async_trait::async_trait]
impl RemoteApi for HttpApi {
    async fn login(&self, email: &str, password: &str) -> Result<AuthPayload, ApiError> {
        let request = self
            .request(Method::POST, self.url(&["v1", "auth", "login"]), Access::Public)
            .await?
            .json(&json!({ "email": email, "password": password }));
        self.execute(request, Access::Public).await
    }

    async fn register(&self, email: &str, password: &str, name: Option<&str>) -> Result<AuthPayload, ApiError> {
        let request = self
            .request(Method::POST, self.url(&["v1", "auth", "register"]), Access::Public)
            .await?
            .json(&json!({ "email": email, "password": password, "name": name }));
        self.execute(request, Access::Public).await
    }

    async fn login_with_apple(&self, identity_token: &str) -> Result<AuthPayload, ApiError> {
        let request = self
            .request(Method::POST, self.url(&["v1", "auth", "apple"]), Access::Public)
            .await?
            .json(&json!({ "identity_token": identity_token }));
        self.execute(request, Access::Public).await
    }

    async fn refresh_token(&self) -> Result<AuthPayload, ApiError> {
        let request = self
            .request(Method::POST, self.url(&["v1", "auth", "refresh"]), Access::Refresh)
            .await?
            .json(&json!({}));
        self.execute(request, Access::Refresh).await
    }

    async fn create_conversation(&self, system_prompt: Option<&str>) -> Result<Conversation, ApiError> {
        let body = match system_prompt.filter(|p| !p.is_empty()) {
            Some(prompt) => json!({ "system_prompt": prompt }),
            None => json!({}),
        };
        let request = self
            .request(Method::POST, self.url(&["v1", "conversations"]), Access::Authorized)
            .await?
            .json(&body);
        self.execute(request, Access::Authorized).await
    }

    async fn get_conversation(&self, id: &str) -> Result<ConversationDetail, ApiError> {
        let request = self
            .request(Method::GET, self.url(&["v1", "conversations", id]), Access::Authorized)
            .await?;
        self.execute(request, Access::Authorized).await
    }

    async fn list_conversations(&self, limit: u32, offset: u32) -> Result<Vec<ConversationSummary>, ApiError> {
        let mut url = self.url(&["v1", "conversations"]);
        url.query_pairs_mut()
            .append_pair("limit", &limit.to_string())
            .append_pair("offset", &offset.to_string());
        let request = self.request(Method::GET, url, Access::Authorized).await?;
        let payload: ConversationListResponse = self.execute(request, Access::Authorized).await?;
        Ok(payload.conversations)
    }

    async fn delete_conversation(&self, id: &str) -> Result<bool, ApiError> {
        let request = self
            .request(Method::DELETE, self.url(&["v1", "conversations", id]), Access::Authorized)
            .await?;
        let payload: DeleteConversationResponse = self.execute(request, Access::Authorized).await?;
        Ok(payload.deleted)
    }

    async fn chat(&self, conversation_id: &str, message: &str) -> Result<ChatReply, ApiError> {
        let url = self.url(&["v1", "conversations", conversation_id, "chat"]);
        let request = self
            .request(Method::POST, url, Access::Authorized)
            .await?
            .json(&json!({ "message": message }));
        self.execute(request, Access::Authorized).await
    }

    async fn chat_stream(
        &self,
        conversation_id: &str,
        message: &str,
        on_chunk: &mut (dyn FnMut(StreamChunk) + Send),
    ) -> Result<(), ApiError> {
        let url = self.url(&["v1", "conversations", conversation_id, "chat", "stream"]);
        let response = self
            .request(Method::POST, url, Access::Authorized)
            .await?
            .header(ACCEPT, "text/event-stream")
            .timeout(STREAM_TIMEOUT)
            .json(&json!({ "message": message }))
            .send()
            .await
            .map_err(network_error)?;

        let status = response.status().as_u16();
        if !(200..300).contains(&status) {
            let text = response
                .text()
                .await
                .map_err(|e| ApiError::Network(e.to_string()))?;
            return Err(self.rejection(status, &text, Access::Authorized));
        }

        let mut body = response.bytes_stream();
        let mut buffer: Vec<u8> = Vec::new();
        while let Some(bytes) = body.next().await {
            let bytes = bytes.map_err(|e| ApiError::Network(e.to_string()))?;
            buffer.extend_from_slice(&bytes);

            while let Some(end) = buffer.iter().position(|&b| b == b'\n') {
                let line: Vec<u8> = buffer.drain(..=end).collect();
                if deliver(&String::from_utf8_lossy(&line), on_chunk)? {
                    return Ok(());
                }
            }
        }
        if !buffer.is_empty() {
            deliver(&String::from_utf8_lossy(&buffer), on_chunk)?;
        }
        Ok(())
    }
}

// =============================================================================
// HELPERS
// =============================================================================

fn network_error(e: reqwest::Error) -> ApiError {
    tracing::warn!(error = %e, "request failed before a response");
    ApiError::Network(e.to_string())
}

/// `root` with `segments` appended, each percent-encoded as a single path
/// segment so ids can never add path levels or a query.
fn endpoint(root: &Url, segments: &[&str]) -> Url {
    let mut url = root.clone();
    if let Ok(mut path) = url.path_segments_mut() {
        path.pop_if_empty().extend(segments);
    }
    url
}

#[derive(Debug, PartialEq, Eq)]
enum SseLine {
    Skip,
    Done,
    Chunk(StreamChunk),
}

/// Classify one line of a `text/event-stream` body. Only `data:` lines count.
fn parse_sse_line(line: &str) -> Result<SseLine, ApiError> {
    let Some(data) = line.trim().strip_prefix("data:") else {
        return Ok(SseLine::Skip);
    };
    let data = data.strip_prefix(' ').unwrap_or(data);
    if data.is_empty() {
        return Ok(SseLine::Skip);
    }
    if data == "[DONE]" {
        return Ok(SseLine::Done);
    }
    serde_json::from_str(data).map(SseLine::Chunk).map_err(|e| {
        tracing::warn!(error = %e, line = %truncate(data), "stream chunk decode failed");
        ApiError::Decode(e.to_string())
    })
}

/// Hand one line to `on_chunk`. Returns `true` once the stream is complete.
fn deliver(line: &str, on_chunk: &mut (dyn FnMut(StreamChunk) + Send)) -> Result<bool, ApiError> {
    match parse_sse_line(line)? {
        SseLine::Skip => Ok(false),
        SseLine::Done => Ok(true),
        SseLine::Chunk(chunk) => {
            let done = chunk.done;
            on_chunk(chunk);
            Ok(done)
        }
    }
}

/// Pull a human-readable message out of an error body.
fn error_message(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<Value>(body) {
        match value.get("detail") {
            Some(Value::String(detail)) if !detail.trim().is_empty() => return detail.clone(),
            Some(Value::Array(items)) => {
                if let Some(msg) = items
                    .iter()
                    .find_map(|item| item.get("msg").and_then(Value::as_str))
                {
                    return msg.to_string();
                }
            }
            _ => {}
        }
    }
    let trimmed = body.trim();
    if trimmed.is_empty() { UNKNOWN_ERROR.to_string() } else { trimmed.to_string() }
}

fn truncate(body: &str) -> &str {
    match body.char_indices().nth(LOG_BODY_LIMIT) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}

#[cfg(test)]
#[path = "http_test.rs"]
mod tests;
