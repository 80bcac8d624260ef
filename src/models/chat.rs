// src/models/chat.rs
use crate::models::auth::UserType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConversationType {
    #[default]
    Direct,
    Group,
    Property,
    Service,
}

impl ConversationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConversationType::Direct => "direct",
            ConversationType::Group => "group",
            ConversationType::Property => "property",
            ConversationType::Service => "service",
        }
    }

    pub fn from_db(value: &str) -> Self {
        match value {
            "group" => ConversationType::Group,
            "property" => ConversationType::Property,
            "service" => ConversationType::Service,
            _ => ConversationType::Direct,
        }
    }

    pub fn default_title(&self) -> &'static str {
        match self {
            ConversationType::Direct => "Direct message",
            ConversationType::Group => "Group conversation",
            ConversationType::Property => "Property inquiry",
            ConversationType::Service => "Service request",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    #[default]
    Chat,
    System,
    Join,
    Leave,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::Chat => "chat",
            MessageType::System => "system",
            MessageType::Join => "join",
            MessageType::Leave => "leave",
        }
    }

    pub fn from_db(value: &str) -> Self {
        match value {
            "system" => MessageType::System,
            "join" => MessageType::Join,
            "leave" => MessageType::Leave,
            _ => MessageType::Chat,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: i64,
    pub title: String,
    #[serde(rename = "type")]
    pub conversation_type: ConversationType,
    pub created_at: DateTime<Utc>,
    pub last_message_at: DateTime<Utc>,
    pub metadata: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub id: i64,
    pub conversation_id: i64,
    pub user_id: String,
    pub user_type: UserType,
    pub joined_at: DateTime<Utc>,
    pub last_read_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: i64,
    pub conversation_id: i64,
    pub sender_id: String,
    pub sender_name: String,
    pub sender_type: UserType,
    pub content: String,
    #[serde(rename = "type")]
    pub message_type: MessageType,
    pub timestamp: DateTime<Utc>,
    pub is_read: bool,
    pub metadata: Value,
}

/// Conversation as listed for one user.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSummary {
    #[serde(flatten)]
    pub conversation: Conversation,
    pub participants: Vec<Participant>,
    pub last_message: Option<ChatMessage>,
    pub unread_count: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationDetail {
    #[serde(flatten)]
    pub conversation: Conversation,
    pub participants: Vec<Participant>,
}

/// What a live subscriber currently holds for one conversation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSnapshot {
    pub conversation_id: i64,
    pub messages: Vec<ChatMessage>,
    pub participants: Vec<Participant>,
    pub messages_error: Option<String>,
    pub participants_error: Option<String>,
}

// Store-level inputs

#[derive(Debug, Clone)]
pub struct NewConversation {
    pub title: String,
    pub conversation_type: ConversationType,
    pub metadata: Value,
    pub participants: Vec<NewParticipant>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewParticipant {
    pub user_id: String,
    #[serde(default)]
    pub user_type: UserType,
}

#[derive(Debug, Clone)]
pub struct NewMessage {
    pub conversation_id: i64,
    pub sender_id: String,
    pub sender_name: String,
    pub sender_type: UserType,
    pub content: String,
    pub message_type: MessageType,
    pub timestamp: DateTime<Utc>,
    pub metadata: Value,
}

// Request bodies

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateConversationRequest {
    pub title: Option<String>,
    #[serde(rename = "type", default)]
    pub conversation_type: ConversationType,
    pub metadata: Option<Value>,
    #[serde(default)]
    pub participants: Vec<NewParticipant>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    pub conversation_id: i64,
    pub content: String,
    #[serde(rename = "type", default)]
    pub message_type: MessageType,
    pub metadata: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddParticipantRequest {
    pub user_id: String,
    #[serde(default)]
    pub user_type: UserType,
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagesQuery {
    pub conversation_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct SubscribeQuery {
    pub token: Option<String>,
}
