use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{NaiveDate, NaiveTime, Utc};
use serde::Deserialize;

use crate::api::AppState;
use crate::error::{AppError, Result};
use crate::models::class_session::{ClassSession, CreateSessionData};
use crate::services::booking::Occupancy;
use crate::services::schedule::{self, SessionAvailability};

#[derive(Debug, Deserialize)]
struct CreateSessionForm {
    category: String,
    coach: String,
    date: NaiveDate,
    start_time: NaiveTime,
    duration_min: i64,
    capacity: i64,
}

async fn create_session(
    State(state): State<AppState>,
    Json(form): Json<CreateSessionForm>,
) -> Result<(StatusCode, Json<ClassSession>)> {
    if form.capacity <= 0 {
        return Err(AppError::Validation("capacity must be positive".to_string()));
    }
    if form.duration_min <= 0 {
        return Err(AppError::Validation("duration must be positive".to_string()));
    }

    let created = ClassSession::create(
        &state.pool,
        CreateSessionData {
            category: form.category,
            coach: form.coach,
            date: form.date,
            start_time: form.start_time,
            duration_min: form.duration_min,
            capacity: form.capacity,
        },
    )
    .await?;

    tracing::info!(session_id = %created.id, date = %created.date, "session scheduled");
    Ok((StatusCode::CREATED, Json(created)))
}

async fn list_upcoming(State(state): State<AppState>) -> Result<Json<Vec<SessionAvailability>>> {
    let sessions = schedule::upcoming(&state.pool, Utc::now()).await?;

    Ok(Json(sessions))
}

async fn occupancy(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<Occupancy>> {
    let counts = state.gate.occupancy(&session_id).await?;

    Ok(Json(counts))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/sessions", get(list_upcoming).post(create_session))
        .route("/sessions/:id/occupancy", get(occupancy))
}
