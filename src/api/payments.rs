use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;

use crate::api::AppState;
use crate::error::{AppError, Result};
use crate::models::payment::{self, Payment, PaymentKind, SubmitPaymentData};
use crate::models::Client;

#[derive(Debug, Deserialize)]
struct SubmitPaymentForm {
    document: String,
    kind: String,
    amount: i64,
    receipt_url: Option<String>,
}

/// Records a payment as pending; an admin approves or rejects it later.
async fn submit(
    State(state): State<AppState>,
    Json(form): Json<SubmitPaymentForm>,
) -> Result<(StatusCode, Json<Payment>)> {
    let kind = PaymentKind::parse(&form.kind)
        .ok_or_else(|| AppError::UnknownPlanType(form.kind.clone()))?;
    if form.amount < 0 {
        return Err(AppError::Validation("amount must not be negative".to_string()));
    }
    Client::find_by_document(&state.pool, &form.document)
        .await?
        .ok_or_else(|| AppError::ClientNotFound(form.document.clone()))?;

    let submitted = Payment::submit(
        &state.pool,
        SubmitPaymentData {
            document: form.document,
            kind,
            amount: form.amount,
            receipt_url: form.receipt_url,
        },
        Utc::now(),
    )
    .await?;

    tracing::info!(payment_id = %submitted.id, kind = %submitted.kind, "payment submitted");
    Ok((StatusCode::CREATED, Json(submitted)))
}

/// Admin approval: one-way pending -> approved, stamping the approval time
/// and the expiration computed from the payment kind.
async fn approve(
    State(state): State<AppState>,
    Path(payment_id): Path<String>,
) -> Result<Json<Payment>> {
    let found = Payment::find_by_id(&state.pool, &payment_id)
        .await?
        .ok_or_else(|| AppError::PaymentNotFound(payment_id.clone()))?;
    if found.status != payment::STATUS_PENDING {
        return Err(AppError::Validation("payment already settled".to_string()));
    }
    let kind = found
        .payment_kind()
        .ok_or_else(|| AppError::UnknownPlanType(found.kind.clone()))?;

    let now = Utc::now();
    let expires_on = kind.expires_on(now.date_naive());
    let changed =
        Payment::settle(&state.pool, &payment_id, payment::STATUS_APPROVED, Some(now), Some(expires_on))
            .await?;
    if changed == 0 {
        // Lost a race with another admin decision.
        return Err(AppError::ConcurrencyConflict);
    }

    let updated = Payment::find_by_id(&state.pool, &payment_id)
        .await?
        .ok_or_else(|| AppError::PaymentNotFound(payment_id.clone()))?;

    tracing::info!(payment_id = %payment_id, expires_on = %expires_on, "payment approved");
    Ok(Json(updated))
}

async fn reject(
    State(state): State<AppState>,
    Path(payment_id): Path<String>,
) -> Result<Json<Payment>> {
    let found = Payment::find_by_id(&state.pool, &payment_id)
        .await?
        .ok_or_else(|| AppError::PaymentNotFound(payment_id.clone()))?;
    if found.status != payment::STATUS_PENDING {
        return Err(AppError::Validation("payment already settled".to_string()));
    }

    let changed =
        Payment::settle(&state.pool, &payment_id, payment::STATUS_REJECTED, None, None).await?;
    if changed == 0 {
        return Err(AppError::ConcurrencyConflict);
    }

    let updated = Payment::find_by_id(&state.pool, &payment_id)
        .await?
        .ok_or_else(|| AppError::PaymentNotFound(payment_id.clone()))?;

    tracing::info!(payment_id = %payment_id, "payment rejected");
    Ok(Json(updated))
}

async fn client_payments(
    State(state): State<AppState>,
    Path(document): Path<String>,
) -> Result<Json<Vec<Payment>>> {
    Client::find_by_document(&state.pool, &document)
        .await?
        .ok_or_else(|| AppError::ClientNotFound(document.clone()))?;

    let payments = Payment::list_for_client(&state.pool, &document).await?;
    Ok(Json(payments))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/payments", post(submit))
        .route("/payments/:id/approve", post(approve))
        .route("/payments/:id/reject", post(reject))
        .route("/clients/:document/payments", get(client_payments))
}
