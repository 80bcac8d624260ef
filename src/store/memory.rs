// src/store/memory.rs
use super::{count_unread, AppointmentStore, ChatStore, StoreError};
use crate::models::appointment::{Appointment, AppointmentStatus, CreateAppointmentRequest};
use crate::models::chat::{
    ChatMessage, Conversation, ConversationDetail, ConversationSummary, NewConversation, NewMessage,
    NewParticipant, Participant,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

#[derive(Default)]
struct Tables {
    conversations: Vec<Conversation>,
    participants: Vec<Participant>,
    messages: Vec<ChatMessage>,
    appointments: Vec<Appointment>,
    next_id: i64,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn conversation(&self, id: i64) -> Result<&Conversation, StoreError> {
        self.conversations
            .iter()
            .find(|c| c.id == id)
            .ok_or_else(|| StoreError::NotFound(format!("Conversation {}", id)))
    }

    fn sorted_messages(&self, conversation_id: i64) -> Vec<ChatMessage> {
        let mut messages: Vec<ChatMessage> = self
            .messages
            .iter()
            .filter(|m| m.conversation_id == conversation_id)
            .cloned()
            .collect();
        messages.sort_by(|a, b| (a.timestamp, a.id).cmp(&(b.timestamp, b.id)));
        messages
    }

    fn participants_of(&self, conversation_id: i64) -> Vec<Participant> {
        self.participants
            .iter()
            .filter(|p| p.conversation_id == conversation_id)
            .cloned()
            .collect()
    }
}

/// In-process store. Nothing survives a restart.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ChatStore for MemoryStore {
    async fn list_conversations(&self, user_id: &str) -> Result<Vec<ConversationSummary>, StoreError> {
        let tables = self.tables.read().await;
        let mut summaries = Vec::new();

        for membership in tables.participants.iter().filter(|p| p.user_id == user_id) {
            let conversation = tables.conversation(membership.conversation_id)?.clone();
            let messages = tables.sorted_messages(conversation.id);
            summaries.push(ConversationSummary {
                unread_count: count_unread(&messages, user_id, membership.last_read_at),
                last_message: messages.last().cloned(),
                participants: tables.participants_of(conversation.id),
                conversation,
            });
        }

        summaries.sort_by(|a, b| b.conversation.last_message_at.cmp(&a.conversation.last_message_at));
        Ok(summaries)
    }

    async fn create_conversation(
        &self,
        new: NewConversation,
        now: DateTime<Utc>,
    ) -> Result<ConversationDetail, StoreError> {
        let mut tables = self.tables.write().await;

        let conversation = Conversation {
            id: tables.next_id(),
            title: new.title,
            conversation_type: new.conversation_type,
            created_at: now,
            last_message_at: now,
            metadata: new.metadata,
        };

        let mut participants = Vec::with_capacity(new.participants.len());
        for p in new.participants {
            participants.push(Participant {
                id: tables.next_id(),
                conversation_id: conversation.id,
                user_id: p.user_id,
                user_type: p.user_type,
                joined_at: now,
                last_read_at: now,
            });
        }

        tables.conversations.push(conversation.clone());
        tables.participants.extend(participants.iter().cloned());

        Ok(ConversationDetail {
            conversation,
            participants,
        })
    }

    async fn get_conversation(&self, conversation_id: i64) -> Result<Conversation, StoreError> {
        let tables = self.tables.read().await;
        tables.conversation(conversation_id).cloned()
    }

    async fn add_participant(
        &self,
        conversation_id: i64,
        participant: NewParticipant,
        now: DateTime<Utc>,
    ) -> Result<(Participant, bool), StoreError> {
        let mut tables = self.tables.write().await;
        tables.conversation(conversation_id)?;

        if let Some(existing) = tables
            .participants
            .iter()
            .find(|p| p.conversation_id == conversation_id && p.user_id == participant.user_id)
        {
            return Ok((existing.clone(), false));
        }

        let row = Participant {
            id: tables.next_id(),
            conversation_id,
            user_id: participant.user_id,
            user_type: participant.user_type,
            joined_at: now,
            last_read_at: now,
        };
        tables.participants.push(row.clone());
        Ok((row, true))
    }

    async fn insert_message(&self, new: NewMessage) -> Result<ChatMessage, StoreError> {
        let mut tables = self.tables.write().await;
        tables.conversation(new.conversation_id)?;

        let message = ChatMessage {
            id: tables.next_id(),
            conversation_id: new.conversation_id,
            sender_id: new.sender_id,
            sender_name: new.sender_name,
            sender_type: new.sender_type,
            content: new.content,
            message_type: new.message_type,
            timestamp: new.timestamp,
            is_read: false,
            metadata: new.metadata,
        };

        if let Some(conversation) = tables.conversations.iter_mut().find(|c| c.id == message.conversation_id) {
            if message.timestamp > conversation.last_message_at {
                conversation.last_message_at = message.timestamp;
            }
        }
        tables.messages.push(message.clone());

        Ok(message)
    }

    async fn list_messages(&self, conversation_id: i64) -> Result<Vec<ChatMessage>, StoreError> {
        let tables = self.tables.read().await;
        tables.conversation(conversation_id)?;
        Ok(tables.sorted_messages(conversation_id))
    }

    async fn list_participants(&self, conversation_id: i64) -> Result<Vec<Participant>, StoreError> {
        let tables = self.tables.read().await;
        tables.conversation(conversation_id)?;
        Ok(tables.participants_of(conversation_id))
    }

    async fn mark_read(
        &self,
        conversation_id: i64,
        user_id: &str,
        at: DateTime<Utc>,
    ) -> Result<Participant, StoreError> {
        let mut tables = self.tables.write().await;
        tables.conversation(conversation_id)?;

        let participant = tables
            .participants
            .iter_mut()
            .find(|p| p.conversation_id == conversation_id && p.user_id == user_id)
            .ok_or_else(|| StoreError::NotFound(format!("Participant {} in conversation {}", user_id, conversation_id)))?;
        participant.last_read_at = participant.last_read_at.max(at);
        let updated = participant.clone();

        for message in tables
            .messages
            .iter_mut()
            .filter(|m| m.conversation_id == conversation_id && m.sender_id != user_id && m.timestamp <= at)
        {
            message.is_read = true;
        }

        Ok(updated)
    }
}

#[async_trait]
impl AppointmentStore for MemoryStore {
    async fn create_appointment(
        &self,
        user_id: &str,
        request: CreateAppointmentRequest,
        now: DateTime<Utc>,
    ) -> Result<Appointment, StoreError> {
        let mut tables = self.tables.write().await;
        let appointment = Appointment {
            id: tables.next_id(),
            property_id: request.property_id,
            user_id: user_id.to_string(),
            expert_id: request.expert_id,
            appointment_type: request.appointment_type,
            sub_type: request.sub_type,
            status: AppointmentStatus::Pending,
            date: request.date,
            notes: request.notes,
            created_at: now,
            updated_at: now,
        };
        tables.appointments.push(appointment.clone());
        Ok(appointment)
    }

    async fn list_appointments(&self, user_id: &str) -> Result<Vec<Appointment>, StoreError> {
        let tables = self.tables.read().await;
        let mut appointments: Vec<Appointment> = tables
            .appointments
            .iter()
            .filter(|a| a.user_id == user_id || a.expert_id.as_deref() == Some(user_id))
            .cloned()
            .collect();
        appointments.sort_by_key(|a| a.date);
        Ok(appointments)
    }

    async fn get_appointment(&self, id: i64) -> Result<Appointment, StoreError> {
        let tables = self.tables.read().await;
        tables
            .appointments
            .iter()
            .find(|a| a.id == id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("Appointment {}", id)))
    }

    async fn set_status(
        &self,
        id: i64,
        from: AppointmentStatus,
        to: AppointmentStatus,
        now: DateTime<Utc>,
    ) -> Result<Appointment, StoreError> {
        let mut tables = self.tables.write().await;
        let appointment = tables
            .appointments
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(|| StoreError::NotFound(format!("Appointment {}", id)))?;
        if appointment.status != from || !from.can_transition_to(to) {
            return Err(StoreError::InvalidTransition {
                from: appointment.status.as_str().to_string(),
                to: to.as_str().to_string(),
            });
        }
        appointment.status = to;
        appointment.updated_at = now;
        Ok(appointment.clone())
    }
}
