//! Scripted [`RemoteApi`] for container tests.
//!
//! Each operation pops the next queued result; an empty queue falls back to a
//! plausible success so tests only script the calls they care about. The one
//! exception is streaming: an unscripted stream fails as unavailable, so chat
//! turns take the plain `chat` path unless a test scripts chunks.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::api::{
    ApiError, AuthPayload, ChatReply, Conversation, ConversationDetail, ConversationSummary, Message, RemoteApi,
    Role, StreamChunk,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Login { email: String },
    Register { email: String, name: Option<String> },
    Apple { identity_token: String },
    Refresh,
    Create { system_prompt: Option<String> },
    Get { id: String },
    List { limit: u32, offset: u32 },
    Delete { id: String },
    Chat { conversation_id: String, message: String },
    ChatStream { conversation_id: String, message: String },
}

/// Chunks a scripted stream delivers, then how the stream ends.
type StreamScript = (Vec<StreamChunk>, Result<(), ApiError>);

#[derive(Default)]
pub struct MockApi {
    auth: Mutex<VecDeque<Result<AuthPayload, ApiError>>>,
    create: Mutex<VecDeque<Result<Conversation, ApiError>>>,
    get: Mutex<VecDeque<Result<ConversationDetail, ApiError>>>,
    list: Mutex<VecDeque<Result<Vec<ConversationSummary>, ApiError>>>,
    delete: Mutex<VecDeque<Result<bool, ApiError>>>,
    chat: Mutex<VecDeque<Result<ChatReply, ApiError>>>,
    stream: Mutex<VecDeque<StreamScript>>,
    hang_auth: AtomicBool,
    hang_list: AtomicBool,
    hang_chat: AtomicBool,
    hang_stream: AtomicBool,
    calls: Mutex<Vec<Call>>,
}

impl MockApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_auth(&self, result: Result<AuthPayload, ApiError>) {
        self.auth.lock().unwrap().push_back(result);
    }

    pub fn push_create(&self, result: Result<Conversation, ApiError>) {
        self.create.lock().unwrap().push_back(result);
    }

    pub fn push_get(&self, result: Result<ConversationDetail, ApiError>) {
        self.get.lock().unwrap().push_back(result);
    }

    pub fn push_list(&self, result: Result<Vec<ConversationSummary>, ApiError>) {
        self.list.lock().unwrap().push_back(result);
    }

    pub fn push_delete(&self, result: Result<bool, ApiError>) {
        self.delete.lock().unwrap().push_back(result);
    }

    pub fn push_chat(&self, result: Result<ChatReply, ApiError>) {
        self.chat.lock().unwrap().push_back(result);
    }

    pub fn push_stream(&self, chunks: Vec<StreamChunk>, end: Result<(), ApiError>) {
        self.stream.lock().unwrap().push_back((chunks, end));
    }

    /// Make every chat call wait forever, to exercise cancellation.
    pub fn hang_auth(&self) {
        self.hang_auth.store(true, Ordering::SeqCst);
    }

    pub fn hang_list(&self) {
        self.hang_list.store(true, Ordering::SeqCst);
    }

    pub fn hang_chat(&self) {
        self.hang_chat.store(true, Ordering::SeqCst);
    }

    /// Make every stream stall after delivering its scripted chunks.
    pub fn hang_stream(&self) {
        self.hang_stream.store(true, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    async fn next_auth(&self) -> Result<AuthPayload, ApiError> {
        hang_if(&self.hang_auth).await;
        self.auth.lock().unwrap().pop_front().unwrap_or_else(|| Ok(payload("tok-default")))
    }
}

async fn hang_if(flag: &AtomicBool) {
    if flag.load(Ordering::SeqCst) {
        std::future::pending::<()>().await;
    }
}

pub fn payload(token: &str) -> AuthPayload {
    AuthPayload { token: token.into(), user_id: Some("u-1".into()), name: None, tier: Some("free".into()), expires_at: None }
}

pub fn summary(id: &str, title: &str) -> ConversationSummary {
    ConversationSummary { id: id.into(), title: Some(title.into()), created_at: 1, updated_at: None, message_count: 0 }
}

pub fn message(id: &str, role: Role, content: &str) -> Message {
    Message { id: id.into(), role, content: content.into(), created_at: 1_700_000_000 }
}

pub fn reply(id: &str, content: &str) -> ChatReply {
    ChatReply {
        message_id: id.into(),
        role: Role::Assistant,
        content: content.into(),
        conversation_id: None,
        created_at: 1_700_000_100,
    }
}

pub fn delta(text: &str) -> StreamChunk {
    StreamChunk { delta: text.into(), ..StreamChunk::default() }
}

pub fn done(message_id: Option<&str>, content: Option<&str>) -> StreamChunk {
    StreamChunk {
        done: true,
        message_id: message_id.map(str::to_string),
        content: content.map(str::to_string),
        ..StreamChunk::default()
    }
}

pub fn server_error(message: &str) -> ApiError {
    ApiError::Api { status: 500, message: message.into() }
}

#[async_trait::async_trait]
impl RemoteApi for MockApi {
    async fn login(&self, email: &str, _password: &str) -> Result<AuthPayload, ApiError> {
        self.record(Call::Login { email: email.into() });
        self.next_auth().await
    }

    async fn register(&self, email: &str, _password: &str, name: Option<&str>) -> Result<AuthPayload, ApiError> {
        self.record(Call::Register { email: email.into(), name: name.map(str::to_string) });
        self.next_auth().await
    }

    async fn login_with_apple(&self, identity_token: &str) -> Result<AuthPayload, ApiError> {
        self.record(Call::Apple { identity_token: identity_token.into() });
        self.next_auth().await
    }

    async fn refresh_token(&self) -> Result<AuthPayload, ApiError> {
        self.record(Call::Refresh);
        self.next_auth().await
    }

    async fn create_conversation(&self, system_prompt: Option<&str>) -> Result<Conversation, ApiError> {
        self.record(Call::Create { system_prompt: system_prompt.map(str::to_string) });
        self.create
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(Conversation { id: "conv-1".into(), title: None, created_at: 1 }))
    }

    async fn get_conversation(&self, id: &str) -> Result<ConversationDetail, ApiError> {
        self.record(Call::Get { id: id.into() });
        self.get
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ApiError::Api { status: 404, message: "conversation not found".into() }))
    }

    async fn list_conversations(&self, limit: u32, offset: u32) -> Result<Vec<ConversationSummary>, ApiError> {
        self.record(Call::List { limit, offset });
        hang_if(&self.hang_list).await;
        self.list.lock().unwrap().pop_front().unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn delete_conversation(&self, id: &str) -> Result<bool, ApiError> {
        self.record(Call::Delete { id: id.into() });
        self.delete.lock().unwrap().pop_front().unwrap_or(Ok(true))
    }

    async fn chat(&self, conversation_id: &str, message: &str) -> Result<ChatReply, ApiError> {
        self.record(Call::Chat { conversation_id: conversation_id.into(), message: message.into() });
        hang_if(&self.hang_chat).await;
        self.chat
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(reply("reply-default", &format!("echo: {message}"))))
    }

    async fn chat_stream(
        &self,
        conversation_id: &str,
        message: &str,
        on_chunk: &mut (dyn FnMut(StreamChunk) + Send),
    ) -> Result<(), ApiError> {
        self.record(Call::ChatStream { conversation_id: conversation_id.into(), message: message.into() });
        let script = self.stream.lock().unwrap().pop_front();
        let (chunks, end) = script.unwrap_or_else(|| {
            (Vec::new(), Err(ApiError::Api { status: 404, message: "streaming not supported".into() }))
        });
        for chunk in chunks {
            on_chunk(chunk);
        }
        hang_if(&self.hang_stream).await;
        end
    }
}
