// src/store/mod.rs
//! Persistence for conversations, participants, messages and appointments.
//!
//! Two backends implement the same traits: Postgres (when `DATABASE_URL` is
//! configured) and an in-process store used for local runs and tests.

use crate::models::appointment::{Appointment, AppointmentStatus, CreateAppointmentRequest};
use crate::models::auth::ErrorResponse;
use crate::models::chat::{
    ChatMessage, Conversation, ConversationDetail, ConversationSummary, NewConversation, NewMessage,
    NewParticipant, Participant,
};
use async_trait::async_trait;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use chrono::{DateTime, Utc};
use thiserror::Error;

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(String),
    #[error("{0}")]
    Validation(String),
    #[error("Access denied: {0}")]
    Forbidden(String),
    #[error("Cannot change status from {from} to {to}")]
    InvalidTransition { from: String, to: String },
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            StoreError::NotFound(_) => StatusCode::NOT_FOUND,
            StoreError::Validation(_) => StatusCode::BAD_REQUEST,
            StoreError::Forbidden(_) => StatusCode::FORBIDDEN,
            StoreError::InvalidTransition { .. } => StatusCode::CONFLICT,
            StoreError::Database(_) | StoreError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for StoreError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "store operation failed");
            "Internal server error".to_string()
        } else {
            self.to_string()
        };
        (status, Json(ErrorResponse::new(message))).into_response()
    }
}

#[async_trait]
pub trait ChatStore: Send + Sync {
    /// Conversations the user participates in, most recently active first.
    async fn list_conversations(&self, user_id: &str) -> Result<Vec<ConversationSummary>, StoreError>;

    /// Participants must already be deduplicated by user id.
    async fn create_conversation(
        &self,
        new: NewConversation,
        now: DateTime<Utc>,
    ) -> Result<ConversationDetail, StoreError>;

    async fn get_conversation(&self, conversation_id: i64) -> Result<Conversation, StoreError>;

    /// Returns the existing row when the user already participates.
    async fn add_participant(
        &self,
        conversation_id: i64,
        participant: NewParticipant,
        now: DateTime<Utc>,
    ) -> Result<(Participant, bool), StoreError>;

    /// Fails with `NotFound` when the conversation does not exist. Advances
    /// `last_message_at` to the message timestamp when it is newer.
    async fn insert_message(&self, new: NewMessage) -> Result<ChatMessage, StoreError>;

    /// Ordered by timestamp ascending, ties by id.
    async fn list_messages(&self, conversation_id: i64) -> Result<Vec<ChatMessage>, StoreError>;

    async fn list_participants(&self, conversation_id: i64) -> Result<Vec<Participant>, StoreError>;

    /// Moves `last_read_at` forward to `at` (never back) and flags messages from
    /// other senders as read.
    async fn mark_read(
        &self,
        conversation_id: i64,
        user_id: &str,
        at: DateTime<Utc>,
    ) -> Result<Participant, StoreError>;
}

#[async_trait]
pub trait AppointmentStore: Send + Sync {
    async fn create_appointment(
        &self,
        user_id: &str,
        request: CreateAppointmentRequest,
        now: DateTime<Utc>,
    ) -> Result<Appointment, StoreError>;

    /// Appointments booked by or assigned to the user, by date.
    async fn list_appointments(&self, user_id: &str) -> Result<Vec<Appointment>, StoreError>;

    async fn get_appointment(&self, id: i64) -> Result<Appointment, StoreError>;

    /// Moves the appointment from `from` to `to`. Fails with `InvalidTransition`
    /// when the stored status is no longer `from`.
    async fn set_status(
        &self,
        id: i64,
        from: AppointmentStatus,
        to: AppointmentStatus,
        now: DateTime<Utc>,
    ) -> Result<Appointment, StoreError>;
}

/// Messages newer than `last_read_at` that the reader did not send.
pub(crate) fn count_unread(messages: &[ChatMessage], user_id: &str, last_read_at: DateTime<Utc>) -> i64 {
    messages
        .iter()
        .filter(|m| m.sender_id != user_id && m.timestamp > last_read_at)
        .count() as i64
}
