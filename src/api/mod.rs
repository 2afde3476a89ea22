// API module - HTTP endpoints

pub mod bookings;
pub mod clients;
pub mod payments;
pub mod schedule;

use std::sync::Arc;

use axum::extract::FromRef;
use sqlx::SqlitePool;

use crate::services::booking::BookingGate;

/// Shared application state: the ledger pool plus the one booking gate
/// instance whose lock registry serializes writes.
#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub gate: Arc<BookingGate>,
}

impl AppState {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            gate: Arc::new(BookingGate::new(pool.clone())),
            pool,
        }
    }
}

impl FromRef<AppState> for SqlitePool {
    fn from_ref(state: &AppState) -> SqlitePool {
        state.pool.clone()
    }
}
