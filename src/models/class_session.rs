use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

use crate::models::reservation;

/// A scheduled class. Occupied seats are never stored; they are derived by
/// counting active reservations.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ClassSession {
    pub id: String,
    pub category: String,
    pub coach: String,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub duration_min: i64,
    pub capacity: i64,
}

#[derive(Debug, Clone)]
pub struct CreateSessionData {
    pub category: String,
    pub coach: String,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub duration_min: i64,
    pub capacity: i64,
}

impl ClassSession {
    pub fn starts_at(&self) -> NaiveDateTime {
        self.date.and_time(self.start_time)
    }

    pub async fn create(
        pool: &SqlitePool,
        data: CreateSessionData,
    ) -> Result<Self, sqlx::Error> {
        let session = sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO class_sessions (id, category, coach, date, start_time, duration_min, capacity)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&data.category)
        .bind(&data.coach)
        .bind(data.date)
        .bind(data.start_time)
        .bind(data.duration_min)
        .bind(data.capacity)
        .fetch_one(pool)
        .await?;

        Ok(session)
    }

    pub async fn find_by_id(pool: &SqlitePool, id: &str) -> Result<Option<Self>, sqlx::Error> {
        let session = sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM class_sessions WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(session)
    }

    /// `occupied(session) = count(active reservations for it)`.
    pub async fn occupied(pool: &SqlitePool, id: &str) -> Result<i64, sqlx::Error> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM reservations WHERE session_id = ? AND status = ?
            "#,
        )
        .bind(id)
        .bind(reservation::STATUS_ACTIVE)
        .fetch_one(pool)
        .await?;

        Ok(count)
    }
}
