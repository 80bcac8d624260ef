// src/handlers/appointments.rs
use crate::middleware::auth::auth_middleware;
use crate::models::appointment::{Appointment, CreateAppointmentRequest, UpdateStatusRequest};
use crate::models::auth::Claims;
use crate::store::StoreError;
use crate::AppState;
use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::Json,
    routing::{get, patch},
    Router,
};
use chrono::Utc;
use std::sync::Arc;

pub fn appointment_routes() -> Router {
    Router::new()
        .route("/api/appointments", get(list_appointments).post(create_appointment))
        .route("/api/appointments/:id/status", patch(update_status))
        .route_layer(axum::middleware::from_fn(auth_middleware))
}

async fn list_appointments(
    Extension(state): Extension<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<Appointment>>, StoreError> {
    Ok(Json(state.appointments.list_appointments(&claims.sub).await?))
}

async fn create_appointment(
    Extension(state): Extension<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    Json(mut request): Json<CreateAppointmentRequest>,
) -> Result<(StatusCode, Json<Appointment>), StoreError> {
    let now = Utc::now();

    request.appointment_type = request.appointment_type.trim().to_string();
    if request.appointment_type.is_empty() {
        return Err(StoreError::Validation("Appointment type is required".to_string()));
    }
    if request.date <= now {
        return Err(StoreError::Validation("Appointment date must be in the future".to_string()));
    }
    if request.expert_id.as_deref() == Some(claims.sub.as_str()) {
        return Err(StoreError::Validation("You cannot book an appointment with yourself".to_string()));
    }

    let appointment = state.appointments.create_appointment(&claims.sub, request, now).await?;
    tracing::info!(
        "📅 User {} booked {} appointment {} for {}",
        claims.sub,
        appointment.appointment_type,
        appointment.id,
        appointment.date
    );
    Ok((StatusCode::CREATED, Json(appointment)))
}

async fn update_status(
    Path(id): Path<i64>,
    Extension(state): Extension<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    Json(request): Json<UpdateStatusRequest>,
) -> Result<Json<Appointment>, StoreError> {
    let appointment = state.appointments.get_appointment(id).await?;

    let is_owner = appointment.user_id == claims.sub;
    let is_expert = appointment.expert_id.as_deref() == Some(claims.sub.as_str());
    if !is_owner && !is_expert {
        tracing::warn!("User {} attempted to update appointment {} they are not part of", claims.sub, id);
        return Err(StoreError::Forbidden("you are not part of this appointment".to_string()));
    }

    if !appointment.status.can_transition_to(request.status) {
        return Err(StoreError::InvalidTransition {
            from: appointment.status.as_str().to_string(),
            to: request.status.as_str().to_string(),
        });
    }

    let updated = state
        .appointments
        .set_status(id, appointment.status, request.status, Utc::now())
        .await?;
    tracing::info!("📅 Appointment {} is now {}", id, updated.status.as_str());
    Ok(Json(updated))
}
