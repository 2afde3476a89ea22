use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, SqlitePool};

use crate::error::{AppError, Result};
use crate::models::{reservation, ClassSession};

/// A bookable session with its derived free-seat count.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct SessionAvailability {
    pub id: String,
    pub category: String,
    pub coach: String,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub duration_min: i64,
    pub capacity: i64,
    pub occupied: i64,
    #[sqlx(default)]
    pub free_seats: i64,
}

/// The timetable of sessions that have not started yet, with free seats.
pub async fn upcoming(pool: &SqlitePool, now: DateTime<Utc>) -> Result<Vec<SessionAvailability>> {
    let today = now.date_naive();
    let mut sessions = sqlx::query_as::<_, SessionAvailability>(
        r#"
        SELECT s.id, s.category, s.coach, s.date, s.start_time, s.duration_min, s.capacity,
               (SELECT COUNT(*) FROM reservations r
                WHERE r.session_id = s.id AND r.status = ?) AS occupied
        FROM class_sessions s
        WHERE s.date >= ?
        ORDER BY s.date, s.start_time
        "#,
    )
    .bind(reservation::STATUS_ACTIVE)
    .bind(today)
    .fetch_all(pool)
    .await?;

    // Today's already-started sessions are not bookable.
    sessions.retain(|s| s.date.and_time(s.start_time) > now.naive_utc());
    for session in &mut sessions {
        session.free_seats = (session.capacity - session.occupied).max(0);
    }

    Ok(sessions)
}

pub async fn capacity_of(pool: &SqlitePool, session_id: &str) -> Result<i64> {
    let session = ClassSession::find_by_id(pool, session_id)
        .await?
        .ok_or_else(|| AppError::SessionNotFound(session_id.to_string()))?;

    Ok(session.capacity)
}
