// src/chat/hub.rs
//! Per-conversation broadcast feeds for live subscribers.

use crate::models::chat::{ChatMessage, Participant};
use std::collections::HashMap;
use tokio::sync::{broadcast, RwLock};

/// Updates buffered per feed before a slow subscriber is reported as lagging.
pub const FEED_CAPACITY: usize = 256;

struct ConversationFeeds {
    messages: broadcast::Sender<ChatMessage>,
    participants: broadcast::Sender<Participant>,
}

impl ConversationFeeds {
    fn new() -> Self {
        let (messages, _) = broadcast::channel(FEED_CAPACITY);
        let (participants, _) = broadcast::channel(FEED_CAPACITY);
        Self { messages, participants }
    }

    fn has_subscribers(&self) -> bool {
        self.messages.receiver_count() > 0 || self.participants.receiver_count() > 0
    }
}

/// Routes message and participant updates to whoever is watching a conversation.
///
/// Feeds are created lazily on the first subscription and dropped on the next
/// publish after the last subscriber went away.
#[derive(Default)]
pub struct ChatHub {
    feeds: RwLock<HashMap<i64, ConversationFeeds>>,
}

impl ChatHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn subscribe(
        &self,
        conversation_id: i64,
    ) -> (broadcast::Receiver<ChatMessage>, broadcast::Receiver<Participant>) {
        let mut feeds = self.feeds.write().await;
        let entry = feeds.entry(conversation_id).or_insert_with(ConversationFeeds::new);
        tracing::debug!(conversation_id, "📡 subscriber attached");
        (entry.messages.subscribe(), entry.participants.subscribe())
    }

    pub async fn publish_message(&self, message: &ChatMessage) {
        let conversation_id = message.conversation_id;
        let delivered = {
            let feeds = self.feeds.read().await;
            match feeds.get(&conversation_id) {
                Some(entry) => entry.messages.send(message.clone()).ok(),
                None => return,
            }
        };

        match delivered {
            Some(receivers) => tracing::debug!(conversation_id, receivers, "📤 message published"),
            None => self.prune(conversation_id).await,
        }
    }

    pub async fn publish_participant(&self, participant: &Participant) {
        let conversation_id = participant.conversation_id;
        let delivered = {
            let feeds = self.feeds.read().await;
            match feeds.get(&conversation_id) {
                Some(entry) => entry.participants.send(participant.clone()).ok(),
                None => return,
            }
        };

        match delivered {
            Some(receivers) => tracing::debug!(conversation_id, receivers, "📤 participant published"),
            None => self.prune(conversation_id).await,
        }
    }

    /// Number of conversations that currently hold feeds.
    pub async fn active_conversations(&self) -> usize {
        self.feeds.read().await.len()
    }

    async fn prune(&self, conversation_id: i64) {
        let mut feeds = self.feeds.write().await;
        // A subscriber may have attached between the failed send and this lock
        if feeds.get(&conversation_id).map_or(false, |entry| !entry.has_subscribers()) {
            feeds.remove(&conversation_id);
            tracing::debug!(conversation_id, "🗑️ dropped feeds with no subscribers");
        }
    }
}
