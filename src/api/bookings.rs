use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use crate::api::AppState;
use crate::error::Result;
use crate::models::reservation::{Reservation, ReservationWithSession};

#[derive(Debug, Deserialize)]
struct BookForm {
    document: String,
    session_id: String,
}

async fn book(
    State(state): State<AppState>,
    Json(form): Json<BookForm>,
) -> Result<(StatusCode, Json<Reservation>)> {
    let reservation = state
        .gate
        .book(&form.document, &form.session_id, Utc::now())
        .await?;

    Ok((StatusCode::CREATED, Json(reservation)))
}

#[derive(Debug, Deserialize)]
struct CancelForm {
    document: String,
}

async fn cancel(
    State(state): State<AppState>,
    Path(reservation_id): Path<String>,
    Json(form): Json<CancelForm>,
) -> Result<Json<serde_json::Value>> {
    state
        .gate
        .cancel(&form.document, &reservation_id, Utc::now())
        .await?;

    Ok(Json(json!({ "cancelled": reservation_id })))
}

async fn client_reservations(
    State(state): State<AppState>,
    Path(document): Path<String>,
) -> Result<Json<Vec<ReservationWithSession>>> {
    let reservations = Reservation::active_with_sessions(&state.pool, &document).await?;

    Ok(Json(reservations))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/bookings", post(book))
        .route("/bookings/:id/cancel", post(cancel))
        .route("/clients/:document/reservations", get(client_reservations))
}
