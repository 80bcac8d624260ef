// src/chat/subscription.rs
use crate::models::chat::{ChatMessage, ConversationSnapshot, Participant};
use tokio::sync::broadcast::{self, error::RecvError};

/// Which feed changed on the last [`ConversationSubscription::next_update`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedUpdate {
    Messages,
    Participants,
}

enum FeedEvent {
    Message(Result<ChatMessage, RecvError>),
    Participant(Result<Participant, RecvError>),
}

/// Live view of one conversation: its ordered messages and its participants.
///
/// The two feeds are independent. An error on one (failed initial load, lagging
/// behind the broadcast buffer) is recorded in that feed's error slot and ends
/// that feed only; there is no retry, callers subscribe again. Dropping the
/// value releases both receivers.
pub struct ConversationSubscription {
    conversation_id: i64,
    messages: Vec<ChatMessage>,
    participants: Vec<Participant>,
    messages_rx: Option<broadcast::Receiver<ChatMessage>>,
    participants_rx: Option<broadcast::Receiver<Participant>>,
    messages_error: Option<String>,
    participants_error: Option<String>,
}

impl ConversationSubscription {
    pub(crate) fn new(
        conversation_id: i64,
        messages_rx: broadcast::Receiver<ChatMessage>,
        participants_rx: broadcast::Receiver<Participant>,
    ) -> Self {
        Self {
            conversation_id,
            messages: Vec::new(),
            participants: Vec::new(),
            messages_rx: Some(messages_rx),
            participants_rx: Some(participants_rx),
            messages_error: None,
            participants_error: None,
        }
    }

    pub(crate) fn load_messages<E: std::fmt::Display>(&mut self, initial: Result<Vec<ChatMessage>, E>) {
        match initial {
            Ok(messages) => {
                for message in messages {
                    self.apply_message(message);
                }
            }
            Err(e) => self.fail_messages(format!("Failed to load messages: {}", e)),
        }
    }

    pub(crate) fn load_participants<E: std::fmt::Display>(&mut self, initial: Result<Vec<Participant>, E>) {
        match initial {
            Ok(participants) => {
                for participant in participants {
                    self.apply_participant(participant);
                }
            }
            Err(e) => self.fail_participants(format!("Failed to load participants: {}", e)),
        }
    }

    pub fn conversation_id(&self) -> i64 {
        self.conversation_id
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn participants(&self) -> &[Participant] {
        &self.participants
    }

    pub fn messages_error(&self) -> Option<&str> {
        self.messages_error.as_deref()
    }

    pub fn participants_error(&self) -> Option<&str> {
        self.participants_error.as_deref()
    }

    /// True while at least one feed can still deliver updates.
    pub fn is_live(&self) -> bool {
        self.messages_rx.is_some() || self.participants_rx.is_some()
    }

    pub fn snapshot(&self) -> ConversationSnapshot {
        ConversationSnapshot {
            conversation_id: self.conversation_id,
            messages: self.messages.clone(),
            participants: self.participants.clone(),
            messages_error: self.messages_error.clone(),
            participants_error: self.participants_error.clone(),
        }
    }

    /// Waits for the next change on either feed and applies it.
    ///
    /// Returns `None` once both feeds have ended.
    pub async fn next_update(&mut self) -> Option<FeedUpdate> {
        loop {
            if !self.is_live() {
                return None;
            }

            let event = tokio::select! {
                received = recv_feed(&mut self.messages_rx) => FeedEvent::Message(received),
                received = recv_feed(&mut self.participants_rx) => FeedEvent::Participant(received),
            };

            match event {
                FeedEvent::Message(Ok(message)) => {
                    self.apply_message(message);
                    return Some(FeedUpdate::Messages);
                }
                FeedEvent::Message(Err(RecvError::Lagged(skipped))) => {
                    self.fail_messages(format!("Message feed fell behind by {} updates", skipped));
                    return Some(FeedUpdate::Messages);
                }
                FeedEvent::Message(Err(RecvError::Closed)) => {
                    self.messages_rx = None;
                }
                FeedEvent::Participant(Ok(participant)) => {
                    self.apply_participant(participant);
                    return Some(FeedUpdate::Participants);
                }
                FeedEvent::Participant(Err(RecvError::Lagged(skipped))) => {
                    self.fail_participants(format!("Participant feed fell behind by {} updates", skipped));
                    return Some(FeedUpdate::Participants);
                }
                FeedEvent::Participant(Err(RecvError::Closed)) => {
                    self.participants_rx = None;
                }
            }
        }
    }

    /// Inserts at the ordered position; a message already held is replaced.
    fn apply_message(&mut self, message: ChatMessage) {
        if let Some(existing) = self.messages.iter_mut().find(|m| m.id == message.id) {
            *existing = message;
            return;
        }
        let key = (message.timestamp, message.id);
        let position = self.messages.partition_point(|m| (m.timestamp, m.id) <= key);
        self.messages.insert(position, message);
    }

    fn apply_participant(&mut self, participant: Participant) {
        match self.participants.iter_mut().find(|p| p.user_id == participant.user_id) {
            Some(existing) => *existing = participant,
            None => self.participants.push(participant),
        }
    }

    fn fail_messages(&mut self, error: String) {
        tracing::warn!(conversation_id = self.conversation_id, error = %error, "message feed error");
        self.messages_error = Some(error);
        self.messages_rx = None;
    }

    fn fail_participants(&mut self, error: String) {
        tracing::warn!(conversation_id = self.conversation_id, error = %error, "participant feed error");
        self.participants_error = Some(error);
        self.participants_rx = None;
    }
}

async fn recv_feed<T: Clone>(rx: &mut Option<broadcast::Receiver<T>>) -> Result<T, RecvError> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::auth::UserType;
    use crate::models::chat::MessageType;
    use chrono::{DateTime, Duration, Utc};
    use serde_json::json;
    use tokio::time::timeout;

    fn message(id: i64, timestamp: DateTime<Utc>) -> ChatMessage {
        ChatMessage {
            id,
            conversation_id: 1,
            sender_id: "seller-1".to_string(),
            sender_name: "Seller".to_string(),
            sender_type: UserType::Seller,
            content: format!("message {}", id),
            message_type: MessageType::Chat,
            timestamp,
            is_read: false,
            metadata: json!({}),
        }
    }

    fn participant(user_id: &str, last_read_at: DateTime<Utc>) -> Participant {
        Participant {
            id: 1,
            conversation_id: 1,
            user_id: user_id.to_string(),
            user_type: UserType::Buyer,
            joined_at: last_read_at,
            last_read_at,
        }
    }

    fn channels() -> (
        broadcast::Sender<ChatMessage>,
        broadcast::Sender<Participant>,
        ConversationSubscription,
    ) {
        let (msg_tx, msg_rx) = broadcast::channel(4);
        let (part_tx, part_rx) = broadcast::channel(4);
        (msg_tx, part_tx, ConversationSubscription::new(1, msg_rx, part_rx))
    }

    #[tokio::test]
    async fn test_out_of_order_arrivals_stay_sorted() {
        let (msg_tx, _part_tx, mut sub) = channels();
        let t0 = Utc::now();
        sub.load_messages::<String>(Ok(vec![message(1, t0), message(2, t0 + Duration::seconds(20))]));

        msg_tx.send(message(3, t0 + Duration::seconds(10))).unwrap();
        assert_eq!(sub.next_update().await, Some(FeedUpdate::Messages));
        msg_tx.send(message(4, t0 - Duration::seconds(5))).unwrap();
        assert_eq!(sub.next_update().await, Some(FeedUpdate::Messages));

        let ids: Vec<i64> = sub.messages().iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![4, 1, 3, 2]);
        assert!(sub.messages().windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
    }

    #[tokio::test]
    async fn test_replayed_message_is_not_duplicated() {
        let (msg_tx, _part_tx, mut sub) = channels();
        let t0 = Utc::now();
        sub.load_messages::<String>(Ok(vec![message(1, t0)]));

        let mut read = message(1, t0);
        read.is_read = true;
        msg_tx.send(read).unwrap();
        sub.next_update().await;

        assert_eq!(sub.messages().len(), 1);
        assert!(sub.messages()[0].is_read);
    }

    #[tokio::test]
    async fn test_participant_update_replaces_by_user() {
        let (_msg_tx, part_tx, mut sub) = channels();
        let t0 = Utc::now();
        sub.load_participants::<String>(Ok(vec![participant("buyer-1", t0), participant("seller-1", t0)]));

        part_tx.send(participant("buyer-1", t0 + Duration::minutes(1))).unwrap();
        assert_eq!(sub.next_update().await, Some(FeedUpdate::Participants));

        assert_eq!(sub.participants().len(), 2);
        let buyer = sub.participants().iter().find(|p| p.user_id == "buyer-1").unwrap();
        assert_eq!(buyer.last_read_at, t0 + Duration::minutes(1));
    }

    #[tokio::test]
    async fn test_failed_initial_load_only_stops_that_feed() {
        let (msg_tx, part_tx, mut sub) = channels();
        sub.load_messages::<String>(Err("connection reset".to_string()));
        sub.load_participants::<String>(Ok(vec![]));

        assert!(sub.messages_error().unwrap().contains("connection reset"));
        assert!(sub.participants_error().is_none());

        // Messages are no longer delivered, participants still are
        msg_tx.send(message(9, Utc::now())).ok();
        part_tx.send(participant("expert-1", Utc::now())).unwrap();
        assert_eq!(sub.next_update().await, Some(FeedUpdate::Participants));
        assert!(sub.messages().is_empty());
    }

    #[tokio::test]
    async fn test_lagging_feed_records_error_without_retry() {
        let (msg_tx, _part_tx, mut sub) = channels();
        let t0 = Utc::now();
        for id in 0..10 {
            msg_tx.send(message(id, t0)).unwrap();
        }

        assert_eq!(sub.next_update().await, Some(FeedUpdate::Messages));
        assert!(sub.messages_error().unwrap().contains("fell behind"));

        // Nothing more arrives on the dead feed
        msg_tx.send(message(100, t0)).ok();
        assert!(timeout(std::time::Duration::from_millis(50), sub.next_update()).await.is_err());
    }

    #[tokio::test]
    async fn test_ends_when_both_feeds_close() {
        let (msg_tx, part_tx, mut sub) = channels();
        drop(msg_tx);
        drop(part_tx);
        assert_eq!(sub.next_update().await, None);
        assert!(!sub.is_live());
    }
}
