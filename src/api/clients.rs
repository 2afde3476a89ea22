use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::api::AppState;
use crate::error::{AppError, Result};
use crate::models::client::{self, Client, CreateClientData};
use crate::services::membership::{self, MembershipState};

#[derive(Debug, Deserialize)]
struct RegisterClientForm {
    document: String,
    name: String,
    email: Option<String>,
    phone: Option<String>,
    eps: Option<String>,
    emergency_contact: Option<String>,
    medical_notes: Option<String>,
}

async fn register(
    State(state): State<AppState>,
    Json(form): Json<RegisterClientForm>,
) -> Result<(StatusCode, Json<Client>)> {
    if form.document.trim().is_empty() {
        return Err(AppError::Validation("document is required".to_string()));
    }
    if form.name.trim().is_empty() {
        return Err(AppError::Validation("name is required".to_string()));
    }

    let created = Client::create(
        &state.pool,
        CreateClientData {
            document: form.document.trim().to_string(),
            name: form.name.trim().to_string(),
            email: form.email,
            phone: form.phone,
            eps: form.eps,
            emergency_contact: form.emergency_contact,
            medical_notes: form.medical_notes,
        },
        Utc::now(),
    )
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(db) if db.message().contains("UNIQUE") => {
            AppError::Validation("client already registered".to_string())
        }
        other => AppError::Database(other),
    })?;

    tracing::info!(document = %created.document, "client registered");
    Ok((StatusCode::CREATED, Json(created)))
}

async fn profile(
    State(state): State<AppState>,
    Path(document): Path<String>,
) -> Result<Json<Client>> {
    let found = Client::find_by_document(&state.pool, &document)
        .await?
        .ok_or_else(|| AppError::ClientNotFound(document))?;

    Ok(Json(found))
}

#[derive(Debug, Deserialize)]
struct UpdateClientForm {
    name: Option<String>,
    email: Option<String>,
    phone: Option<String>,
    eps: Option<String>,
    emergency_contact: Option<String>,
    medical_notes: Option<String>,
}

async fn update_profile(
    State(state): State<AppState>,
    Path(document): Path<String>,
    Json(form): Json<UpdateClientForm>,
) -> Result<Json<Client>> {
    Client::find_by_document(&state.pool, &document)
        .await?
        .ok_or_else(|| AppError::ClientNotFound(document.clone()))?;

    Client::update_profile(
        &state.pool,
        &document,
        form.name,
        form.email,
        form.phone,
        form.eps,
        form.emergency_contact,
        form.medical_notes,
    )
    .await?;

    let updated = Client::find_by_document(&state.pool, &document)
        .await?
        .ok_or_else(|| AppError::ClientNotFound(document))?;

    Ok(Json(updated))
}

async fn deactivate(
    State(state): State<AppState>,
    Path(document): Path<String>,
) -> Result<Json<Client>> {
    let changed = Client::set_status(&state.pool, &document, client::STATUS_INACTIVE).await?;
    if changed == 0 {
        return Err(AppError::ClientNotFound(document));
    }

    let updated = Client::find_by_document(&state.pool, &document)
        .await?
        .ok_or_else(|| AppError::ClientNotFound(document.clone()))?;

    tracing::info!(document = %document, "client deactivated");
    Ok(Json(updated))
}

#[derive(Debug, Deserialize)]
struct MembershipQuery {
    /// Evaluation instant override, RFC 3339. Defaults to the current time.
    at: Option<DateTime<Utc>>,
}

async fn membership_state(
    State(state): State<AppState>,
    Path(document): Path<String>,
    Query(query): Query<MembershipQuery>,
) -> Result<Json<MembershipState>> {
    let now = query.at.unwrap_or_else(Utc::now);
    let derived = membership::membership_state(&state.pool, &document, now).await?;

    Ok(Json(derived))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/clients", post(register))
        .route("/clients/:document", get(profile).put(update_profile))
        .route("/clients/:document/deactivate", post(deactivate))
        .route("/clients/:document/membership", get(membership_state))
}
