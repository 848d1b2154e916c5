//! Single-conversation chat state.
//!
//! DESIGN
//! ======
//! Two states: uninitialized (no conversation id) and active. The first send
//! on an uninitialized container creates the conversation. User messages are
//! appended optimistically before the network turn and are never rolled back;
//! a failed turn only leaves the reply missing and sets the error.
//!
//! A turn is streamed when the server supports it. The assistant message
//! appears with the first delta and grows in place. If the stream cannot be
//! opened, or closes without a single chunk, the turn falls back to the plain
//! chat endpoint. A stream that breaks after chunks arrived is not retried:
//! the server has already recorded the turn.

use std::sync::Arc;

use tokio::sync::watch;

use super::{Busy, BusyFlag};
use crate::api::{ApiError, Message, RemoteApi, Role, StreamChunk};

pub const DEFAULT_NEW_TITLE: &str = "New Chat";
pub const DEFAULT_LOADED_TITLE: &str = "Untitled";

/// Everything a chat screen renders, as last published.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChatSnapshot {
    pub conversation_id: Option<String>,
    pub conversation_title: Option<String>,
    pub messages: Vec<Message>,
    pub is_loading: bool,
    pub error_message: Option<String>,
}

impl Busy for ChatSnapshot {
    fn set_loading(&mut self, loading: bool) {
        self.is_loading = loading;
    }
}

/// State for one chat screen.
pub struct ChatState {
    api: Arc<dyn RemoteApi>,
    system_prompt: Option<String>,
    conversation_id: Option<String>,
    conversation_title: Option<String>,
    messages: Vec<Message>,
    is_loading: bool,
    error_message: Option<String>,
    published: watch::Sender<ChatSnapshot>,
}

impl ChatState {
    #[must_use]
    pub fn new(api: Arc<dyn RemoteApi>) -> Self {
        let (published, _) = watch::channel(ChatSnapshot::default());
        Self {
            api,
            system_prompt: None,
            conversation_id: None,
            conversation_title: None,
            messages: Vec::new(),
            is_loading: false,
            error_message: None,
            published,
        }
    }

    /// Like [`ChatState::new`], seeding every conversation it creates with `prompt`.
    #[must_use]
    pub fn with_system_prompt(api: Arc<dyn RemoteApi>, prompt: impl Into<String>) -> Self {
        let mut state = Self::new(api);
        state.system_prompt = Some(prompt.into());
        state
    }

    #[must_use]
    pub fn conversation_id(&self) -> Option<&str> {
        self.conversation_id.as_deref()
    }

    #[must_use]
    pub fn conversation_title(&self) -> Option<&str> {
        self.conversation_title.as_deref()
    }

    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    #[must_use]
    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    #[must_use]
    pub fn snapshot(&self) -> ChatSnapshot {
        ChatSnapshot {
            conversation_id: self.conversation_id.clone(),
            conversation_title: self.conversation_title.clone(),
            messages: self.messages.clone(),
            is_loading: self.is_loading,
            error_message: self.error_message.clone(),
        }
    }

    /// Follow the container's state while its operations are in flight.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ChatSnapshot> {
        self.published.subscribe()
    }

    fn publish(&self) {
        self.published.send_replace(self.snapshot());
    }

    /// Create a conversation remotely and make it the active one with an
    /// empty message list. Returns whether it succeeded.
    pub async fn start_new_conversation(&mut self) -> bool {
        self.error_message = None;
        self.publish();
        let busy = BusyFlag::raise(&mut self.is_loading, &self.published);
        let result = self
            .api
            .create_conversation(self.system_prompt.as_deref())
            .await;
        drop(busy);

        let created = match result {
            Ok(conversation) => {
                tracing::info!(conversation_id = %conversation.id, "conversation created");
                self.conversation_title = Some(conversation.title.unwrap_or_else(|| DEFAULT_NEW_TITLE.to_string()));
                self.conversation_id = Some(conversation.id);
                self.messages.clear();
                true
            }
            Err(e) => {
                tracing::debug!(error = %e, "conversation create failed");
                self.error_message = Some(e.to_string());
                false
            }
        };
        self.publish();
        created
    }

    /// Replace local state with the server's copy of conversation `id`.
    /// On failure nothing local changes.
    pub async fn load_conversation(&mut self, id: &str) {
        self.error_message = None;
        self.publish();
        let busy = BusyFlag::raise(&mut self.is_loading, &self.published);
        let result = self.api.get_conversation(id).await;
        drop(busy);

        match result {
            Ok(detail) => {
                tracing::debug!(conversation_id = %detail.id, messages = detail.messages.len(), "conversation loaded");
                self.conversation_title = Some(detail.title.unwrap_or_else(|| DEFAULT_LOADED_TITLE.to_string()));
                self.conversation_id = Some(detail.id);
                self.messages = detail.messages;
            }
            Err(e) => {
                tracing::debug!(conversation_id = %id, error = %e, "conversation load failed");
                self.error_message = Some(e.to_string());
            }
        }
        self.publish();
    }

    /// Send one user turn. Blank input is ignored without touching state.
    pub async fn send_message(&mut self, text: &str) {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return;
        }
        self.error_message = None;

        if self.conversation_id.is_none() && !self.start_new_conversation().await {
            return;
        }
        let Some(conversation_id) = self.conversation_id.clone() else {
            return;
        };

        self.messages.push(Message::local_user(trimmed));
        self.publish();

        let reply_id = uuid::Uuid::new_v4().to_string();
        self.run_turn(&conversation_id, trimmed, reply_id).await;
    }

    /// Ask again for assistant message `message_id`, replacing it in place
    /// with a reply to the nearest user message before it.
    ///
    /// Returns `false` without touching state when there is no active
    /// conversation, the id is not an assistant message, or no user message
    /// precedes it. A failed attempt removes the old reply and sets the error.
    pub async fn regenerate(&mut self, message_id: &str) -> bool {
        let Some(conversation_id) = self.conversation_id.clone() else {
            return false;
        };
        let Some(index) = self
            .messages
            .iter()
            .position(|m| m.id == message_id && m.role == Role::Assistant)
        else {
            return false;
        };
        let Some(prompt) = self.messages[..index]
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.clone())
        else {
            return false;
        };

        self.error_message = None;
        let reply_id = uuid::Uuid::new_v4().to_string();
        self.messages[index] = Message::assistant(reply_id.clone(), "");
        self.publish();

        tracing::debug!(conversation_id = %conversation_id, replaced = %message_id, "regenerating reply");
        self.run_turn(&conversation_id, &prompt, reply_id).await;
        true
    }

    async fn run_turn(&mut self, conversation_id: &str, prompt: &str, reply_id: String) {
        let busy = BusyFlag::raise(&mut self.is_loading, &self.published);
        let mut reply = PendingReply { id: reply_id, messages: &mut self.messages, published: &self.published };
        let outcome = stream_or_fallback(self.api.as_ref(), conversation_id, prompt, &mut reply).await;
        drop(busy);

        if let Err(e) = outcome {
            tracing::debug!(conversation_id = %conversation_id, error = %e, "chat turn failed");
            self.error_message = Some(e.to_string());
        }
        self.publish();
    }
}

/// The assistant reply of the current turn, written straight into the
/// message list and mirrored onto the snapshot channel.
struct PendingReply<'a> {
    id: String,
    messages: &'a mut Vec<Message>,
    published: &'a watch::Sender<ChatSnapshot>,
}

impl PendingReply<'_> {
    fn write(&mut self, content: &str) {
        match self.messages.iter_mut().find(|m| m.id == self.id) {
            Some(message) => content.clone_into(&mut message.content),
            None => self.messages.push(Message::assistant(self.id.clone(), content)),
        }
        self.mirror();
    }

    fn finish(&mut self, message: Message) {
        match self.messages.iter().position(|m| m.id == self.id) {
            Some(index) => self.messages[index] = message,
            None => self.messages.push(message),
        }
        self.mirror();
    }

    fn discard(&mut self) {
        let id = &self.id;
        self.messages.retain(|m| m.id != *id);
        self.mirror();
    }

    fn mirror(&self) {
        let messages = self.messages.as_slice();
        self.published.send_modify(|s| s.messages = messages.to_vec());
    }
}

async fn stream_or_fallback(
    api: &dyn RemoteApi,
    conversation_id: &str,
    prompt: &str,
    reply: &mut PendingReply<'_>,
) -> Result<(), ApiError> {
    let mut content = String::new();
    let mut received = 0usize;
    let mut last: Option<StreamChunk> = None;

    let streamed = api
        .chat_stream(conversation_id, prompt, &mut |chunk: StreamChunk| {
            received += 1;
            if chunk.done {
                last = Some(chunk);
            } else if !chunk.delta.is_empty() {
                content.push_str(&chunk.delta);
                reply.write(&content);
            }
        })
        .await;

    match (streamed, last) {
        (Ok(()), Some(done)) => {
            let id = done.message_id.unwrap_or_else(|| reply.id.clone());
            reply.finish(Message::assistant(id, done.content.unwrap_or(content)));
            return Ok(());
        }
        (Ok(()), None) if received > 0 => {
            reply.discard();
            return Err(ApiError::StreamInterrupted);
        }
        (Ok(()), None) => tracing::debug!(conversation_id = %conversation_id, "stream closed empty; using chat"),
        (Err(e), _) if received > 0 || e.ends_session() => {
            reply.discard();
            return Err(e);
        }
        (Err(e), _) => tracing::debug!(conversation_id = %conversation_id, error = %e, "stream unavailable; using chat"),
    }

    match api.chat(conversation_id, prompt).await {
        Ok(answer) => {
            reply.finish(answer.into());
            Ok(())
        }
        Err(e) => {
            reply.discard();
            Err(e)
        }
    }
}

#[cfg(test)]
#[path = "chat_test.rs"]
mod tests;
