//! Conversation-list state for the history screen.
//!
//! DESIGN
//! ======
//! Unlike chat sends, deletes are not optimistic: an entry leaves the local
//! list only after the server confirms it is gone.

use std::sync::Arc;

use tokio::sync::watch;

use super::{Busy, BusyFlag};
use crate::api::{ConversationSummary, RemoteApi};

/// Fixed page fetched by [`ConversationListState::load_conversations`].
pub const PAGE_LIMIT: u32 = 20;
pub const PAGE_OFFSET: u32 = 0;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversationListSnapshot {
    pub conversations: Vec<ConversationSummary>,
    pub is_loading: bool,
    pub error_message: Option<String>,
}

impl Busy for ConversationListSnapshot {
    fn set_loading(&mut self, loading: bool) {
        self.is_loading = loading;
    }
}

pub struct ConversationListState {
    api: Arc<dyn RemoteApi>,
    conversations: Vec<ConversationSummary>,
    is_loading: bool,
    error_message: Option<String>,
    published: watch::Sender<ConversationListSnapshot>,
}

impl ConversationListState {
    #[must_use]
    pub fn new(api: Arc<dyn RemoteApi>) -> Self {
        let (published, _) = watch::channel(ConversationListSnapshot::default());
        Self { api, conversations: Vec::new(), is_loading: false, error_message: None, published }
    }

    #[must_use]
    pub fn conversations(&self) -> &[ConversationSummary] {
        &self.conversations
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
    pub fn snapshot(&self) -> ConversationListSnapshot {
        ConversationListSnapshot {
            conversations: self.conversations.clone(),
            is_loading: self.is_loading,
            error_message: self.error_message.clone(),
        }
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ConversationListSnapshot> {
        self.published.subscribe()
    }

    fn publish(&self) {
        self.published.send_replace(self.snapshot());
    }

    /// Fetch the first page and replace the whole list.
    pub async fn load_conversations(&mut self) {
        self.error_message = None;
        self.publish();
        let busy = BusyFlag::raise(&mut self.is_loading, &self.published);
        let result = self.api.list_conversations(PAGE_LIMIT, PAGE_OFFSET).await;
        drop(busy);

        match result {
            Ok(conversations) => self.conversations = conversations,
            Err(e) => {
                tracing::debug!(error = %e, "conversation list load failed");
                self.error_message = Some(e.to_string());
            }
        }
        self.publish();
    }

    /// Delete remotely; drop the local entry only if the server reports success.
    pub async fn delete_conversation(&mut self, id: &str) {
        self.error_message = None;

        match self.api.delete_conversation(id).await {
            Ok(true) => self.conversations.retain(|c| c.id != id),
            Ok(false) => tracing::debug!(conversation_id = %id, "server declined delete"),
            Err(e) => {
                tracing::debug!(conversation_id = %id, error = %e, "conversation delete failed");
                self.error_message = Some(e.to_string());
            }
        }
        self.publish();
    }
}

#[cfg(test)]
#[path = "conversations_test.rs"]
mod tests;
