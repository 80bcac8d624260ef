// src/chat/service.rs
use super::hub::ChatHub;
use super::subscription::ConversationSubscription;
use crate::models::auth::{Claims, UserType};
use crate::models::chat::{
    AddParticipantRequest, ChatMessage, ConversationDetail, ConversationSummary, CreateConversationRequest,
    MessageType, NewConversation, NewMessage, NewParticipant, Participant, SendMessageRequest,
};
use crate::store::{ChatStore, StoreError};
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;

/// The authenticated user acting on a conversation.
#[derive(Debug, Clone)]
pub struct ChatUser {
    pub user_id: String,
    pub name: String,
    pub user_type: UserType,
}

impl From<&Claims> for ChatUser {
    fn from(claims: &Claims) -> Self {
        Self {
            user_id: claims.sub.clone(),
            name: claims.name.clone(),
            user_type: claims.user_type,
        }
    }
}

/// Conversation operations on top of a [`ChatStore`], fanning writes out to
/// live subscribers through the [`ChatHub`].
#[derive(Clone)]
pub struct ChatService {
    store: Arc<dyn ChatStore>,
    hub: Arc<ChatHub>,
}

impl ChatService {
    pub fn new(store: Arc<dyn ChatStore>, hub: Arc<ChatHub>) -> Self {
        Self { store, hub }
    }

    pub fn hub(&self) -> &ChatHub {
        &self.hub
    }

    pub async fn list_conversations(&self, user: &ChatUser) -> Result<Vec<ConversationSummary>, StoreError> {
        self.store.list_conversations(&user.user_id).await
    }

    pub async fn create_conversation(
        &self,
        creator: &ChatUser,
        request: CreateConversationRequest,
    ) -> Result<ConversationDetail, StoreError> {
        let mut participants = vec![NewParticipant {
            user_id: creator.user_id.clone(),
            user_type: creator.user_type,
        }];
        for p in request.participants {
            let user_id = p.user_id.trim().to_string();
            if user_id.is_empty() {
                return Err(StoreError::Validation("Participant userId must not be empty".to_string()));
            }
            if participants.iter().any(|existing| existing.user_id == user_id) {
                continue;
            }
            participants.push(NewParticipant {
                user_id,
                user_type: p.user_type,
            });
        }

        if participants.len() < 2 {
            return Err(StoreError::Validation(
                "A conversation needs at least two participants".to_string(),
            ));
        }

        let title = request
            .title
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| request.conversation_type.default_title().to_string());

        let metadata = match request.metadata {
            Some(value) if value.is_object() => value,
            Some(_) => return Err(StoreError::Validation("metadata must be a JSON object".to_string())),
            None => json!({}),
        };

        let detail = self
            .store
            .create_conversation(
                NewConversation {
                    title,
                    conversation_type: request.conversation_type,
                    metadata,
                    participants,
                },
                Utc::now(),
            )
            .await?;

        tracing::info!(
            conversation_id = detail.conversation.id,
            creator = %creator.user_id,
            "💬 conversation created"
        );
        Ok(detail)
    }

    /// Conversation with its participants, visible to participants only.
    pub async fn get_conversation(&self, user: &ChatUser, conversation_id: i64) -> Result<ConversationDetail, StoreError> {
        validate_conversation_id(conversation_id)?;
        let conversation = self.store.get_conversation(conversation_id).await?;
        let participants = self.store.list_participants(conversation_id).await?;
        ensure_member(&participants, &user.user_id, conversation_id)?;
        Ok(ConversationDetail {
            conversation,
            participants,
        })
    }

    pub async fn add_participant(
        &self,
        actor: &ChatUser,
        conversation_id: i64,
        request: AddParticipantRequest,
    ) -> Result<Participant, StoreError> {
        validate_conversation_id(conversation_id)?;
        let user_id = request.user_id.trim().to_string();
        if user_id.is_empty() {
            return Err(StoreError::Validation("userId is required".to_string()));
        }

        let current = self.store.list_participants(conversation_id).await?;
        ensure_member(&current, &actor.user_id, conversation_id)?;

        let now = Utc::now();
        let (participant, created) = self
            .store
            .add_participant(
                conversation_id,
                NewParticipant {
                    user_id: user_id.clone(),
                    user_type: request.user_type,
                },
                now,
            )
            .await?;

        if created {
            self.hub.publish_participant(&participant).await;

            let display_name = request
                .name
                .map(|n| n.trim().to_string())
                .filter(|n| !n.is_empty())
                .unwrap_or(user_id);
            let notice = self
                .store
                .insert_message(NewMessage {
                    conversation_id,
                    sender_id: participant.user_id.clone(),
                    sender_name: display_name.clone(),
                    sender_type: participant.user_type,
                    content: format!("{} joined the conversation", display_name),
                    message_type: MessageType::Join,
                    timestamp: now,
                    metadata: json!({ "addedBy": actor.user_id }),
                })
                .await?;
            self.hub.publish_message(&notice).await;
        }

        Ok(participant)
    }

    pub async fn send_message(&self, sender: &ChatUser, request: SendMessageRequest) -> Result<ChatMessage, StoreError> {
        validate_conversation_id(request.conversation_id)?;
        let content = request.content.trim();
        if content.is_empty() {
            return Err(StoreError::Validation("Message content must not be empty".to_string()));
        }
        // Join and system notices are posted by the service only
        if request.message_type != MessageType::Chat {
            return Err(StoreError::Validation(format!(
                "Message type '{}' cannot be sent by users",
                request.message_type.as_str()
            )));
        }

        let participants = self.store.list_participants(request.conversation_id).await?;
        ensure_member(&participants, &sender.user_id, request.conversation_id)?;

        let message = self
            .store
            .insert_message(NewMessage {
                conversation_id: request.conversation_id,
                sender_id: sender.user_id.clone(),
                sender_name: sender.name.clone(),
                sender_type: sender.user_type,
                content: content.to_string(),
                message_type: request.message_type,
                timestamp: Utc::now(),
                metadata: request.metadata.unwrap_or_else(|| json!({})),
            })
            .await?;

        self.hub.publish_message(&message).await;
        Ok(message)
    }

    pub async fn list_messages(&self, user: &ChatUser, conversation_id: i64) -> Result<Vec<ChatMessage>, StoreError> {
        validate_conversation_id(conversation_id)?;
        let participants = self.store.list_participants(conversation_id).await?;
        ensure_member(&participants, &user.user_id, conversation_id)?;
        self.store.list_messages(conversation_id).await
    }

    /// Moves the caller's read marker to now. Safe to repeat.
    pub async fn mark_read(&self, user: &ChatUser, conversation_id: i64) -> Result<Participant, StoreError> {
        validate_conversation_id(conversation_id)?;
        let participant = self.store.mark_read(conversation_id, &user.user_id, Utc::now()).await?;
        self.hub.publish_participant(&participant).await;
        Ok(participant)
    }

    /// Opens the live message and participant feeds for a conversation.
    ///
    /// Feeds are attached before the initial load, so updates racing the load
    /// are not lost (duplicates collapse by id).
    pub async fn subscribe(&self, user: &ChatUser, conversation_id: i64) -> Result<ConversationSubscription, StoreError> {
        validate_conversation_id(conversation_id)?;
        self.store.get_conversation(conversation_id).await?;

        let (messages_rx, participants_rx) = self.hub.subscribe(conversation_id).await;
        let mut subscription = ConversationSubscription::new(conversation_id, messages_rx, participants_rx);

        // Without a participant list membership cannot be checked, so nothing is streamed
        let participants = self.store.list_participants(conversation_id).await?;
        ensure_member(&participants, &user.user_id, conversation_id)?;
        subscription.load_participants::<StoreError>(Ok(participants));
        subscription.load_messages(self.store.list_messages(conversation_id).await);

        Ok(subscription)
    }
}

fn validate_conversation_id(conversation_id: i64) -> Result<(), StoreError> {
    if conversation_id <= 0 {
        return Err(StoreError::Validation("conversationId must be a positive integer".to_string()));
    }
    Ok(())
}

fn ensure_member(participants: &[Participant], user_id: &str, conversation_id: i64) -> Result<(), StoreError> {
    if participants.iter().any(|p| p.user_id == user_id) {
        Ok(())
    } else {
        tracing::warn!("User {} attempted to access conversation {} without joining it", user_id, conversation_id);
        Err(StoreError::Forbidden("you are not a participant in this conversation".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::subscription::FeedUpdate;
    use crate::models::chat::ConversationType;
    use crate::store::MemoryStore;
    use std::time::Duration;

    fn service() -> ChatService {
        ChatService::new(Arc::new(MemoryStore::new()), Arc::new(ChatHub::new()))
    }

    fn user(id: &str, user_type: UserType) -> ChatUser {
        ChatUser {
            user_id: id.to_string(),
            name: id.to_uppercase(),
            user_type,
        }
    }

    fn create_request(others: &[&str]) -> CreateConversationRequest {
        CreateConversationRequest {
            title: None,
            conversation_type: ConversationType::Property,
            metadata: Some(json!({ "propertyId": "prop-3" })),
            participants: others
                .iter()
                .map(|id| NewParticipant {
                    user_id: id.to_string(),
                    user_type: UserType::Seller,
                })
                .collect(),
        }
    }

    fn send(conversation_id: i64, content: &str) -> SendMessageRequest {
        SendMessageRequest {
            conversation_id,
            content: content.to_string(),
            message_type: MessageType::Chat,
            metadata: None,
        }
    }

    #[tokio::test]
    async fn test_create_requires_two_distinct_participants() {
        let chat = service();
        let buyer = user("buyer-1", UserType::Buyer);

        let err = chat.create_conversation(&buyer, create_request(&["buyer-1"])).await.unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));

        let detail = chat
            .create_conversation(&buyer, create_request(&["seller-1", "seller-1"]))
            .await
            .unwrap();
        assert_eq!(detail.participants.len(), 2);
        assert_eq!(detail.conversation.title, "Property inquiry");
    }

    #[tokio::test]
    async fn test_send_message_rejects_blank_and_outsiders() {
        let chat = service();
        let buyer = user("buyer-1", UserType::Buyer);
        let id = chat.create_conversation(&buyer, create_request(&["seller-1"])).await.unwrap().conversation.id;

        let blank = chat.send_message(&buyer, send(id, "   ")).await.unwrap_err();
        assert!(matches!(blank, StoreError::Validation(_)));

        let outsider = user("stranger", UserType::Buyer);
        let denied = chat.send_message(&outsider, send(id, "hi")).await.unwrap_err();
        assert!(matches!(denied, StoreError::Forbidden(_)));

        let missing = chat.send_message(&buyer, send(999, "hi")).await.unwrap_err();
        assert!(matches!(missing, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_users_cannot_post_service_notices() {
        let chat = service();
        let buyer = user("buyer-1", UserType::Buyer);
        let id = chat.create_conversation(&buyer, create_request(&["seller-1"])).await.unwrap().conversation.id;

        for message_type in [MessageType::System, MessageType::Join, MessageType::Leave] {
            let request = SendMessageRequest {
                message_type,
                ..send(id, "Support joined the conversation")
            };
            let err = chat.send_message(&buyer, request).await.unwrap_err();
            assert!(matches!(err, StoreError::Validation(_)));
        }
        assert!(chat.list_messages(&buyer, id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_subscribed_messages_are_in_timestamp_order() {
        let chat = service();
        let buyer = user("buyer-1", UserType::Buyer);
        let seller = user("seller-1", UserType::Seller);
        let id = chat.create_conversation(&buyer, create_request(&["seller-1"])).await.unwrap().conversation.id;

        chat.send_message(&buyer, send(id, "Is the house still available?")).await.unwrap();
        let mut sub = chat.subscribe(&buyer, id).await.unwrap();
        assert_eq!(sub.messages().len(), 1);

        chat.send_message(&seller, send(id, "Yes, open house on Saturday")).await.unwrap();
        chat.send_message(&buyer, send(id, "Great, see you then")).await.unwrap();

        for _ in 0..2 {
            assert_eq!(sub.next_update().await, Some(FeedUpdate::Messages));
        }
        assert_eq!(sub.messages().len(), 3);
        assert!(sub.messages().windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
    }

    #[tokio::test]
    async fn test_mark_read_sets_last_read_at_and_is_idempotent() {
        let chat = service();
        let buyer = user("buyer-1", UserType::Buyer);
        let seller = user("seller-1", UserType::Seller);
        let id = chat.create_conversation(&buyer, create_request(&["seller-1"])).await.unwrap().conversation.id;
        chat.send_message(&seller, send(id, "Offer received")).await.unwrap();

        let before = Utc::now();
        let first = chat.mark_read(&buyer, id).await.unwrap();
        let after = Utc::now();
        assert!(first.last_read_at >= before && first.last_read_at <= after);

        tokio::time::sleep(Duration::from_millis(5)).await;
        let second = chat.mark_read(&buyer, id).await.unwrap();
        assert!(second.last_read_at >= first.last_read_at);
        assert_eq!(second.id, first.id);

        let summaries = chat.list_conversations(&buyer).await.unwrap();
        assert_eq!(summaries[0].unread_count, 0);
        let messages = chat.list_messages(&buyer, id).await.unwrap();
        assert!(messages.iter().all(|m| m.is_read));
    }

    #[tokio::test]
    async fn test_mark_read_reaches_subscribers() {
        let chat = service();
        let buyer = user("buyer-1", UserType::Buyer);
        let seller = user("seller-1", UserType::Seller);
        let id = chat.create_conversation(&buyer, create_request(&["seller-1"])).await.unwrap().conversation.id;

        let mut sub = chat.subscribe(&seller, id).await.unwrap();
        let marked = chat.mark_read(&buyer, id).await.unwrap();

        assert_eq!(sub.next_update().await, Some(FeedUpdate::Participants));
        let seen = sub.participants().iter().find(|p| p.user_id == "buyer-1").unwrap();
        assert_eq!(seen.last_read_at, marked.last_read_at);
    }

    #[tokio::test]
    async fn test_add_participant_posts_join_message_once() {
        let chat = service();
        let buyer = user("buyer-1", UserType::Buyer);
        let id = chat.create_conversation(&buyer, create_request(&["seller-1"])).await.unwrap().conversation.id;

        let request = || AddParticipantRequest {
            user_id: "agent-9".to_string(),
            user_type: UserType::CustomerService,
            name: Some("Support".to_string()),
        };
        chat.add_participant(&buyer, id, request()).await.unwrap();
        chat.add_participant(&buyer, id, request()).await.unwrap();

        let messages = chat.list_messages(&buyer, id).await.unwrap();
        let joins: Vec<_> = messages.iter().filter(|m| m.message_type == MessageType::Join).collect();
        assert_eq!(joins.len(), 1);
        assert_eq!(joins[0].content, "Support joined the conversation");
    }

    #[tokio::test]
    async fn test_subscribe_rejects_invalid_and_foreign_conversations() {
        let chat = service();
        let buyer = user("buyer-1", UserType::Buyer);
        assert!(matches!(chat.subscribe(&buyer, 0).await, Err(StoreError::Validation(_))));
        assert!(matches!(chat.subscribe(&buyer, 77).await, Err(StoreError::NotFound(_))));

        let id = chat.create_conversation(&buyer, create_request(&["seller-1"])).await.unwrap().conversation.id;
        let outsider = user("stranger", UserType::Buyer);
        assert!(matches!(chat.subscribe(&outsider, id).await, Err(StoreError::Forbidden(_))));
    }

    /// Memory store whose participant lookups always fail.
    struct ParticipantsUnavailable(Arc<MemoryStore>);

    #[async_trait::async_trait]
    impl ChatStore for ParticipantsUnavailable {
        async fn list_conversations(&self, user_id: &str) -> Result<Vec<ConversationSummary>, StoreError> {
            self.0.list_conversations(user_id).await
        }

        async fn create_conversation(
            &self,
            new: NewConversation,
            now: chrono::DateTime<Utc>,
        ) -> Result<ConversationDetail, StoreError> {
            self.0.create_conversation(new, now).await
        }

        async fn get_conversation(&self, conversation_id: i64) -> Result<crate::models::chat::Conversation, StoreError> {
            self.0.get_conversation(conversation_id).await
        }

        async fn add_participant(
            &self,
            conversation_id: i64,
            participant: NewParticipant,
            now: chrono::DateTime<Utc>,
        ) -> Result<(Participant, bool), StoreError> {
            self.0.add_participant(conversation_id, participant, now).await
        }

        async fn insert_message(&self, new: NewMessage) -> Result<ChatMessage, StoreError> {
            self.0.insert_message(new).await
        }

        async fn list_messages(&self, conversation_id: i64) -> Result<Vec<ChatMessage>, StoreError> {
            self.0.list_messages(conversation_id).await
        }

        async fn list_participants(&self, _conversation_id: i64) -> Result<Vec<Participant>, StoreError> {
            Err(StoreError::Database(sqlx::Error::PoolTimedOut))
        }

        async fn mark_read(
            &self,
            conversation_id: i64,
            user_id: &str,
            at: chrono::DateTime<Utc>,
        ) -> Result<Participant, StoreError> {
            self.0.mark_read(conversation_id, user_id, at).await
        }
    }

    #[tokio::test]
    async fn test_subscribe_fails_when_membership_cannot_be_checked() {
        let store = Arc::new(MemoryStore::new());
        let hub = Arc::new(ChatHub::new());
        let healthy = ChatService::new(store.clone(), hub.clone());
        let buyer = user("buyer-1", UserType::Buyer);
        let id = healthy.create_conversation(&buyer, create_request(&["seller-1"])).await.unwrap().conversation.id;
        healthy.send_message(&buyer, send(id, "Our offer is attached")).await.unwrap();

        let degraded = ChatService::new(Arc::new(ParticipantsUnavailable(store)), hub);
        let outsider = user("stranger", UserType::Buyer);
        assert!(matches!(degraded.subscribe(&outsider, id).await, Err(StoreError::Database(_))));
    }
}
