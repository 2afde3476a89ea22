use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

pub const STATUS_ACTIVE: &str = "active";
pub const STATUS_CANCELLED: &str = "cancelled";

/// A seat claim on a class session. Created only by the booking gate;
/// transitions active -> cancelled and never back, never deleted.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Reservation {
    pub id: String,
    pub document: String,
    pub session_id: String,
    pub created_at: DateTime<Utc>,
    pub status: String,
}

/// Reservation joined with its session, for client-facing listings.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ReservationWithSession {
    pub id: String,
    pub session_id: String,
    pub category: String,
    pub coach: String,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub duration_min: i64,
}

impl Reservation {
    pub async fn insert(
        pool: &SqlitePool,
        document: &str,
        session_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Self, sqlx::Error> {
        let reservation = sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO reservations (id, document, session_id, created_at, status)
            VALUES (?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(document)
        .bind(session_id)
        .bind(now)
        .bind(STATUS_ACTIVE)
        .fetch_one(pool)
        .await?;

        Ok(reservation)
    }

    pub async fn find_by_id(pool: &SqlitePool, id: &str) -> Result<Option<Self>, sqlx::Error> {
        let reservation = sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM reservations WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(reservation)
    }

    pub async fn find_active(
        pool: &SqlitePool,
        document: &str,
        session_id: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        let reservation = sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM reservations
            WHERE document = ? AND session_id = ? AND status = ?
            "#,
        )
        .bind(document)
        .bind(session_id)
        .bind(STATUS_ACTIVE)
        .fetch_optional(pool)
        .await?;

        Ok(reservation)
    }

    /// One-way transition active -> cancelled. 0 rows changed means the
    /// reservation was already cancelled (or missing).
    pub async fn mark_cancelled(pool: &SqlitePool, id: &str) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE reservations SET status = ? WHERE id = ? AND status = ?
            "#,
        )
        .bind(STATUS_CANCELLED)
        .bind(id)
        .bind(STATUS_ACTIVE)
        .execute(pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Session dates of the client's active reservations. Credit usage is
    /// attributed by session date, not reservation creation time.
    pub async fn active_session_dates(
        pool: &SqlitePool,
        document: &str,
    ) -> Result<Vec<NaiveDate>, sqlx::Error> {
        let dates = sqlx::query_scalar::<_, NaiveDate>(
            r#"
            SELECT s.date
            FROM reservations r
            JOIN class_sessions s ON s.id = r.session_id
            WHERE r.document = ? AND r.status = ?
            "#,
        )
        .bind(document)
        .bind(STATUS_ACTIVE)
        .fetch_all(pool)
        .await?;

        Ok(dates)
    }

    pub async fn active_with_sessions(
        pool: &SqlitePool,
        document: &str,
    ) -> Result<Vec<ReservationWithSession>, sqlx::Error> {
        let reservations = sqlx::query_as::<_, ReservationWithSession>(
            r#"
            SELECT r.id, r.session_id, s.category, s.coach, s.date, s.start_time, s.duration_min
            FROM reservations r
            JOIN class_sessions s ON s.id = r.session_id
            WHERE r.document = ? AND r.status = ?
            ORDER BY s.date, s.start_time
            "#,
        )
        .bind(document)
        .bind(STATUS_ACTIVE)
        .fetch_all(pool)
        .await?;

        Ok(reservations)
    }
}
