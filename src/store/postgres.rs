// src/store/postgres.rs
use super::{AppointmentStore, ChatStore, StoreError};
use crate::models::appointment::{Appointment, AppointmentStatus, CreateAppointmentRequest};
use crate::models::auth::UserType;
use crate::models::chat::{
    ChatMessage, Conversation, ConversationDetail, ConversationSummary, ConversationType, MessageType,
    NewConversation, NewMessage, NewParticipant, Participant,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};

const CONVERSATION_COLUMNS: &str = "id, title, conversation_type, metadata, created_at, last_message_at";
const PARTICIPANT_COLUMNS: &str = "id, conversation_id, user_id, user_type, joined_at, last_read_at";
const MESSAGE_COLUMNS: &str =
    "id, conversation_id, sender_id, sender_name, sender_type, content, message_type, sent_at, is_read, metadata";
const APPOINTMENT_COLUMNS: &str = "id, property_id, user_id, expert_id, appointment_type, sub_type, status, \
     scheduled_for, notes, created_at, updated_at";

#[derive(FromRow)]
struct ConversationRow {
    id: i64,
    title: String,
    conversation_type: String,
    metadata: serde_json::Value,
    created_at: DateTime<Utc>,
    last_message_at: DateTime<Utc>,
}

impl From<ConversationRow> for Conversation {
    fn from(row: ConversationRow) -> Self {
        Conversation {
            id: row.id,
            title: row.title,
            conversation_type: ConversationType::from_db(&row.conversation_type),
            created_at: row.created_at,
            last_message_at: row.last_message_at,
            metadata: row.metadata,
        }
    }
}

#[derive(FromRow)]
struct ParticipantRow {
    id: i64,
    conversation_id: i64,
    user_id: String,
    user_type: String,
    joined_at: DateTime<Utc>,
    last_read_at: DateTime<Utc>,
}

impl From<ParticipantRow> for Participant {
    fn from(row: ParticipantRow) -> Self {
        Participant {
            id: row.id,
            conversation_id: row.conversation_id,
            user_id: row.user_id,
            user_type: UserType::from_db(&row.user_type),
            joined_at: row.joined_at,
            last_read_at: row.last_read_at,
        }
    }
}

#[derive(FromRow)]
struct MessageRow {
    id: i64,
    conversation_id: i64,
    sender_id: String,
    sender_name: String,
    sender_type: String,
    content: String,
    message_type: String,
    sent_at: DateTime<Utc>,
    is_read: bool,
    metadata: serde_json::Value,
}

impl From<MessageRow> for ChatMessage {
    fn from(row: MessageRow) -> Self {
        ChatMessage {
            id: row.id,
            conversation_id: row.conversation_id,
            sender_id: row.sender_id,
            sender_name: row.sender_name,
            sender_type: UserType::from_db(&row.sender_type),
            content: row.content,
            message_type: MessageType::from_db(&row.message_type),
            timestamp: row.sent_at,
            is_read: row.is_read,
            metadata: row.metadata,
        }
    }
}

#[derive(FromRow)]
struct AppointmentRow {
    id: i64,
    property_id: Option<String>,
    user_id: String,
    expert_id: Option<String>,
    appointment_type: String,
    sub_type: Option<String>,
    status: String,
    scheduled_for: DateTime<Utc>,
    notes: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<AppointmentRow> for Appointment {
    fn from(row: AppointmentRow) -> Self {
        Appointment {
            id: row.id,
            property_id: row.property_id,
            user_id: row.user_id,
            expert_id: row.expert_id,
            appointment_type: row.appointment_type,
            sub_type: row.sub_type,
            status: AppointmentStatus::from_db(&row.status),
            date: row.scheduled_for,
            notes: row.notes,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn ensure_conversation(&self, conversation_id: i64) -> Result<(), StoreError> {
        let exists = sqlx::query_scalar::<_, i64>("SELECT id FROM chat_conversations WHERE id = $1")
            .bind(conversation_id)
            .fetch_optional(&self.pool)
            .await?;
        match exists {
            Some(_) => Ok(()),
            None => Err(StoreError::NotFound(format!("Conversation {}", conversation_id))),
        }
    }
}

#[async_trait]
impl ChatStore for PgStore {
    async fn list_conversations(&self, user_id: &str) -> Result<Vec<ConversationSummary>, StoreError> {
        let rows = sqlx::query_as::<_, (i64, DateTime<Utc>)>(
            "SELECT conversation_id, last_read_at FROM chat_participants WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        let mut summaries = Vec::with_capacity(rows.len());
        for (conversation_id, last_read_at) in rows {
            let conversation = self.get_conversation(conversation_id).await?;
            let participants = self.list_participants(conversation_id).await?;

            let last_message = sqlx::query_as::<_, MessageRow>(&format!(
                "SELECT {} FROM chat_messages WHERE conversation_id = $1 ORDER BY sent_at DESC, id DESC LIMIT 1",
                MESSAGE_COLUMNS
            ))
            .bind(conversation_id)
            .fetch_optional(&self.pool)
            .await?
            .map(ChatMessage::from);

            let unread_count: (i64,) = sqlx::query_as(
                "SELECT COUNT(*) FROM chat_messages
                 WHERE conversation_id = $1 AND sender_id <> $2 AND sent_at > $3",
            )
            .bind(conversation_id)
            .bind(user_id)
            .bind(last_read_at)
            .fetch_one(&self.pool)
            .await?;

            summaries.push(ConversationSummary {
                conversation,
                participants,
                last_message,
                unread_count: unread_count.0,
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
        let mut tx = self.pool.begin().await?;

        let conversation: Conversation = sqlx::query_as::<_, ConversationRow>(&format!(
            "INSERT INTO chat_conversations (title, conversation_type, metadata, created_at, last_message_at)
             VALUES ($1, $2, $3, $4, $4)
             RETURNING {}",
            CONVERSATION_COLUMNS
        ))
        .bind(&new.title)
        .bind(new.conversation_type.as_str())
        .bind(&new.metadata)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?
        .into();

        let mut participants = Vec::with_capacity(new.participants.len());
        for p in &new.participants {
            let row = sqlx::query_as::<_, ParticipantRow>(&format!(
                "INSERT INTO chat_participants (conversation_id, user_id, user_type, joined_at, last_read_at)
                 VALUES ($1, $2, $3, $4, $4)
                 RETURNING {}",
                PARTICIPANT_COLUMNS
            ))
            .bind(conversation.id)
            .bind(&p.user_id)
            .bind(p.user_type.as_str())
            .bind(now)
            .fetch_one(&mut *tx)
            .await?;
            participants.push(Participant::from(row));
        }

        tx.commit().await?;

        tracing::info!(
            conversation_id = conversation.id,
            participants = participants.len(),
            "created conversation"
        );

        Ok(ConversationDetail {
            conversation,
            participants,
        })
    }

    async fn get_conversation(&self, conversation_id: i64) -> Result<Conversation, StoreError> {
        sqlx::query_as::<_, ConversationRow>(&format!(
            "SELECT {} FROM chat_conversations WHERE id = $1",
            CONVERSATION_COLUMNS
        ))
        .bind(conversation_id)
        .fetch_optional(&self.pool)
        .await?
        .map(Conversation::from)
        .ok_or_else(|| StoreError::NotFound(format!("Conversation {}", conversation_id)))
    }

    async fn add_participant(
        &self,
        conversation_id: i64,
        participant: NewParticipant,
        now: DateTime<Utc>,
    ) -> Result<(Participant, bool), StoreError> {
        self.ensure_conversation(conversation_id).await?;

        let inserted = sqlx::query_as::<_, ParticipantRow>(&format!(
            "INSERT INTO chat_participants (conversation_id, user_id, user_type, joined_at, last_read_at)
             VALUES ($1, $2, $3, $4, $4)
             ON CONFLICT (conversation_id, user_id) DO NOTHING
             RETURNING {}",
            PARTICIPANT_COLUMNS
        ))
        .bind(conversation_id)
        .bind(&participant.user_id)
        .bind(participant.user_type.as_str())
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = inserted {
            return Ok((row.into(), true));
        }

        let existing = sqlx::query_as::<_, ParticipantRow>(&format!(
            "SELECT {} FROM chat_participants WHERE conversation_id = $1 AND user_id = $2",
            PARTICIPANT_COLUMNS
        ))
        .bind(conversation_id)
        .bind(&participant.user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok((existing.into(), false))
    }

    async fn insert_message(&self, new: NewMessage) -> Result<ChatMessage, StoreError> {
        let mut tx = self.pool.begin().await?;

        // Also locks the conversation row so last_message_at only moves forward
        let touched = sqlx::query(
            "UPDATE chat_conversations SET last_message_at = GREATEST(last_message_at, $2) WHERE id = $1",
        )
        .bind(new.conversation_id)
        .bind(new.timestamp)
        .execute(&mut *tx)
        .await?;

        if touched.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("Conversation {}", new.conversation_id)));
        }

        let row = sqlx::query_as::<_, MessageRow>(&format!(
            "INSERT INTO chat_messages
                (conversation_id, sender_id, sender_name, sender_type, content, message_type, sent_at, is_read, metadata)
             VALUES ($1, $2, $3, $4, $5, $6, $7, false, $8)
             RETURNING {}",
            MESSAGE_COLUMNS
        ))
        .bind(new.conversation_id)
        .bind(&new.sender_id)
        .bind(&new.sender_name)
        .bind(new.sender_type.as_str())
        .bind(&new.content)
        .bind(new.message_type.as_str())
        .bind(new.timestamp)
        .bind(&new.metadata)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(row.into())
    }

    async fn list_messages(&self, conversation_id: i64) -> Result<Vec<ChatMessage>, StoreError> {
        self.ensure_conversation(conversation_id).await?;

        let rows = sqlx::query_as::<_, MessageRow>(&format!(
            "SELECT {} FROM chat_messages WHERE conversation_id = $1 ORDER BY sent_at ASC, id ASC",
            MESSAGE_COLUMNS
        ))
        .bind(conversation_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(ChatMessage::from).collect())
    }

    async fn list_participants(&self, conversation_id: i64) -> Result<Vec<Participant>, StoreError> {
        self.ensure_conversation(conversation_id).await?;

        let rows = sqlx::query_as::<_, ParticipantRow>(&format!(
            "SELECT {} FROM chat_participants WHERE conversation_id = $1 ORDER BY joined_at ASC, id ASC",
            PARTICIPANT_COLUMNS
        ))
        .bind(conversation_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Participant::from).collect())
    }

    async fn mark_read(
        &self,
        conversation_id: i64,
        user_id: &str,
        at: DateTime<Utc>,
    ) -> Result<Participant, StoreError> {
        self.ensure_conversation(conversation_id).await?;
        let mut tx = self.pool.begin().await?;

        let participant = sqlx::query_as::<_, ParticipantRow>(&format!(
            "UPDATE chat_participants SET last_read_at = GREATEST(last_read_at, $3)
             WHERE conversation_id = $1 AND user_id = $2
             RETURNING {}",
            PARTICIPANT_COLUMNS
        ))
        .bind(conversation_id)
        .bind(user_id)
        .bind(at)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| StoreError::NotFound(format!("Participant {} in conversation {}", user_id, conversation_id)))?;

        let flagged = sqlx::query(
            "UPDATE chat_messages SET is_read = true
             WHERE conversation_id = $1 AND sender_id <> $2 AND sent_at <= $3 AND is_read = false",
        )
        .bind(conversation_id)
        .bind(user_id)
        .bind(at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::debug!(
            conversation_id,
            user_id,
            flagged = flagged.rows_affected(),
            "marked conversation read"
        );

        Ok(participant.into())
    }
}

#[async_trait]
impl AppointmentStore for PgStore {
    async fn create_appointment(
        &self,
        user_id: &str,
        request: CreateAppointmentRequest,
        now: DateTime<Utc>,
    ) -> Result<Appointment, StoreError> {
        let row = sqlx::query_as::<_, AppointmentRow>(&format!(
            "INSERT INTO appointments
                (property_id, user_id, expert_id, appointment_type, sub_type, status, scheduled_for, notes, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $9)
             RETURNING {}",
            APPOINTMENT_COLUMNS
        ))
        .bind(&request.property_id)
        .bind(user_id)
        .bind(&request.expert_id)
        .bind(&request.appointment_type)
        .bind(&request.sub_type)
        .bind(AppointmentStatus::Pending.as_str())
        .bind(request.date)
        .bind(&request.notes)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into())
    }

    async fn list_appointments(&self, user_id: &str) -> Result<Vec<Appointment>, StoreError> {
        let rows = sqlx::query_as::<_, AppointmentRow>(&format!(
            "SELECT {} FROM appointments WHERE user_id = $1 OR expert_id = $1 ORDER BY scheduled_for ASC",
            APPOINTMENT_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Appointment::from).collect())
    }

    async fn get_appointment(&self, id: i64) -> Result<Appointment, StoreError> {
        sqlx::query_as::<_, AppointmentRow>(&format!(
            "SELECT {} FROM appointments WHERE id = $1",
            APPOINTMENT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .map(Appointment::from)
        .ok_or_else(|| StoreError::NotFound(format!("Appointment {}", id)))
    }

    async fn set_status(
        &self,
        id: i64,
        from: AppointmentStatus,
        to: AppointmentStatus,
        now: DateTime<Utc>,
    ) -> Result<Appointment, StoreError> {
        if !from.can_transition_to(to) {
            return Err(StoreError::InvalidTransition {
                from: from.as_str().to_string(),
                to: to.as_str().to_string(),
            });
        }

        let updated = sqlx::query_as::<_, AppointmentRow>(&format!(
            "UPDATE appointments SET status = $2, updated_at = $3 WHERE id = $1 AND status = $4 RETURNING {}",
            APPOINTMENT_COLUMNS
        ))
        .bind(id)
        .bind(to.as_str())
        .bind(now)
        .bind(from.as_str())
        .fetch_optional(&self.pool)
        .await?;

        match updated {
            Some(row) => Ok(Appointment::from(row)),
            // Either the row is gone or another request changed the status first
            None => {
                let current = self.get_appointment(id).await?;
                Err(StoreError::InvalidTransition {
                    from: current.status.as_str().to_string(),
                    to: to.as_str().to_string(),
                })
            }
        }
    }
}

