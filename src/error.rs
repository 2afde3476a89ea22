use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Client not found: {0}")]
    ClientNotFound(String),

    #[error("Class session not found: {0}")]
    SessionNotFound(String),

    #[error("Reservation not found: {0}")]
    ReservationNotFound(String),

    #[error("Payment not found: {0}")]
    PaymentNotFound(String),

    #[error("Session has already started or finished")]
    SessionClosed,

    #[error("Session is full")]
    SessionFull,

    #[error("Client already has an active reservation for this session")]
    AlreadyBooked,

    #[error("Reservation is already cancelled")]
    AlreadyCancelled,

    #[error("No credits available")]
    NoCreditsAvailable,

    #[error("Monthly plan has expired")]
    MembershipExpired,

    #[error("Annual membership required before booking with a monthly plan")]
    NoMembership,

    #[error("Unknown plan type: {0}")]
    UnknownPlanType(String),

    #[error("Concurrent update conflict, retry the request")]
    ConcurrencyConflict,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Stable machine-readable code for API clients.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::ClientNotFound(_) => "client_not_found",
            AppError::SessionNotFound(_) => "session_not_found",
            AppError::ReservationNotFound(_) => "reservation_not_found",
            AppError::PaymentNotFound(_) => "payment_not_found",
            AppError::SessionClosed => "session_closed",
            AppError::SessionFull => "session_full",
            AppError::AlreadyBooked => "already_booked",
            AppError::AlreadyCancelled => "already_cancelled",
            AppError::NoCreditsAvailable => "no_credits_available",
            AppError::MembershipExpired => "membership_expired",
            AppError::NoMembership => "no_membership",
            AppError::UnknownPlanType(_) => "unknown_plan_type",
            AppError::ConcurrencyConflict => "concurrency_conflict",
            AppError::Validation(_) => "validation_error",
            AppError::Database(_) => "database_error",
            AppError::Internal(_) => "internal_error",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::ClientNotFound(_)
            | AppError::SessionNotFound(_)
            | AppError::ReservationNotFound(_)
            | AppError::PaymentNotFound(_) => StatusCode::NOT_FOUND,
            AppError::SessionClosed
            | AppError::SessionFull
            | AppError::AlreadyBooked
            | AppError::AlreadyCancelled
            | AppError::NoCreditsAvailable
            | AppError::MembershipExpired
            | AppError::NoMembership => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::UnknownPlanType(_) | AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::ConcurrencyConflict => StatusCode::CONFLICT,
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let message = match &self {
            AppError::Database(_) => "Database error".to_string(),
            AppError::Internal(_) => "Internal server error".to_string(),
            other => other.to_string(),
        };

        let body = Json(json!({
            "error": self.code(),
            "message": message,
        }));

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
