use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::SqlitePool;
use tokio::sync::Mutex;

use crate::error::{AppError, Result};
use crate::models::{reservation, ClassSession, Client, Reservation};
use crate::services::membership::{self, MembershipStatus};

/// Derived seat usage for one session.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Occupancy {
    pub occupied: i64,
    pub capacity: i64,
}

type LockMap = Mutex<HashMap<String, Arc<Mutex<()>>>>;

/// The booking gate: the only component that writes reservations.
///
/// Credit and capacity checks plus the insert run while holding the client
/// lock and then the session lock, always in that order, so concurrent
/// bookings can neither overbook a session nor overspend a client's credits.
/// The locked section covers only the check-then-write; reads elsewhere are
/// lock-free.
pub struct BookingGate {
    pool: SqlitePool,
    client_locks: LockMap,
    session_locks: LockMap,
}

impl BookingGate {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            client_locks: Mutex::new(HashMap::new()),
            session_locks: Mutex::new(HashMap::new()),
        }
    }

    async fn lock_entry(locks: &LockMap, key: &str) -> Arc<Mutex<()>> {
        let mut map = locks.lock().await;
        map.entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Admits the client into the session, or explains why not.
    ///
    /// Preconditions are evaluated in order, each short-circuiting: client
    /// and session exist, session not started, no duplicate booking, seat
    /// available, credit available. Occupancy is read under the session lock
    /// immediately before the insert.
    #[tracing::instrument(skip(self), fields(client = %document, session = %session_id))]
    pub async fn book(
        &self,
        document: &str,
        session_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Reservation> {
        Client::find_by_document(&self.pool, document)
            .await?
            .ok_or_else(|| AppError::ClientNotFound(document.to_string()))?;
        let session = ClassSession::find_by_id(&self.pool, session_id)
            .await?
            .ok_or_else(|| AppError::SessionNotFound(session_id.to_string()))?;

        // Client before session, always; the fixed order rules out deadlock.
        let client_lock = Self::lock_entry(&self.client_locks, document).await;
        let _client_guard = client_lock.lock().await;
        let session_lock = Self::lock_entry(&self.session_locks, session_id).await;
        let _session_guard = session_lock.lock().await;

        if session.starts_at() <= now.naive_utc() {
            return Err(AppError::SessionClosed);
        }

        if Reservation::find_active(&self.pool, document, session_id)
            .await?
            .is_some()
        {
            return Err(AppError::AlreadyBooked);
        }

        let occupied = ClassSession::occupied(&self.pool, session_id).await?;
        if occupied >= session.capacity {
            return Err(AppError::SessionFull);
        }

        let state = membership::membership_state(&self.pool, document, now).await?;
        match state.status {
            MembershipStatus::Expired => return Err(AppError::MembershipExpired),
            MembershipStatus::NoMembership => return Err(AppError::NoMembership),
            MembershipStatus::NoPlan => return Err(AppError::NoCreditsAvailable),
            MembershipStatus::Active => {}
        }

        // Credits come out of the cycle window the session falls in, not the
        // window containing `now`; booking ahead must fit that week's
        // allotment too.
        let available =
            membership::credits_available_on(&self.pool, document, now, session.date).await?;
        if available <= 0 {
            return Err(AppError::NoCreditsAvailable);
        }

        let booked = Reservation::insert(&self.pool, document, session_id, now)
            .await
            .map_err(map_write_error)?;

        tracing::info!(reservation_id = %booked.id, "reservation created");
        Ok(booked)
    }

    /// Cancels the owner's reservation. Cancelling twice reports
    /// `AlreadyCancelled` rather than silently succeeding. Seat and credit
    /// come back for free since both are derived by counting active
    /// reservations.
    #[tracing::instrument(skip(self), fields(client = %document, reservation = %reservation_id))]
    pub async fn cancel(
        &self,
        document: &str,
        reservation_id: &str,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let found = Reservation::find_by_id(&self.pool, reservation_id)
            .await?
            .ok_or_else(|| AppError::ReservationNotFound(reservation_id.to_string()))?;

        // Ownership failures look identical to a missing reservation.
        if found.document != document {
            return Err(AppError::ReservationNotFound(reservation_id.to_string()));
        }
        if found.status == reservation::STATUS_CANCELLED {
            return Err(AppError::AlreadyCancelled);
        }

        let client_lock = Self::lock_entry(&self.client_locks, document).await;
        let _client_guard = client_lock.lock().await;
        let session_lock = Self::lock_entry(&self.session_locks, &found.session_id).await;
        let _session_guard = session_lock.lock().await;

        let changed = Reservation::mark_cancelled(&self.pool, reservation_id)
            .await
            .map_err(map_write_error)?;
        if changed == 0 {
            // Lost a race with another cancel of the same reservation.
            return Err(AppError::AlreadyCancelled);
        }

        tracing::info!("reservation cancelled");
        Ok(())
    }

    pub async fn occupancy(&self, session_id: &str) -> Result<Occupancy> {
        let session = ClassSession::find_by_id(&self.pool, session_id)
            .await?
            .ok_or_else(|| AppError::SessionNotFound(session_id.to_string()))?;
        let occupied = ClassSession::occupied(&self.pool, session_id).await?;

        Ok(Occupancy {
            occupied,
            capacity: session.capacity,
        })
    }
}

fn map_write_error(err: sqlx::Error) -> AppError {
    match err {
        sqlx::Error::PoolTimedOut => AppError::ConcurrencyConflict,
        sqlx::Error::Database(db) if db.message().contains("UNIQUE") => AppError::AlreadyBooked,
        other => AppError::Database(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::models::payment::PaymentKind;
    use crate::services::plan_catalog::PlanType;
    use crate::services::testutil::{approved_payment, at, day, seed_client, session_on};

    const ANA: &str = "1001";
    const BRUNO: &str = "1002";

    async fn seed_member(pool: &SqlitePool, document: &str, plan: PlanType) {
        seed_client(pool, document).await;
        approved_payment(pool, document, PaymentKind::AnnualMembership, day(0)).await;
        approved_payment(pool, document, PaymentKind::MonthlyPlan(plan), day(0)).await;
    }

    #[tokio::test]
    async fn booking_creates_an_active_reservation() {
        let pool = db::memory_pool().await;
        let gate = BookingGate::new(pool.clone());
        seed_member(&pool, ANA, PlanType::ThreeDays).await;
        let session = session_on(&pool, day(2), 10).await;

        let booked = gate.book(ANA, &session.id, at(day(1), 10, 0)).await.unwrap();
        assert_eq!(booked.status, reservation::STATUS_ACTIVE);
        assert_eq!(booked.session_id, session.id);

        let occupancy = gate.occupancy(&session.id).await.unwrap();
        assert_eq!(occupancy.occupied, 1);
    }

    #[tokio::test]
    async fn unknown_client_and_session_are_rejected_in_order() {
        let pool = db::memory_pool().await;
        let gate = BookingGate::new(pool.clone());
        seed_member(&pool, ANA, PlanType::ThreeDays).await;
        let session = session_on(&pool, day(2), 10).await;

        let err = gate.book("9999", &session.id, at(day(1), 10, 0)).await.unwrap_err();
        assert!(matches!(err, AppError::ClientNotFound(_)));

        let err = gate.book(ANA, "missing", at(day(1), 10, 0)).await.unwrap_err();
        assert!(matches!(err, AppError::SessionNotFound(_)));
    }

    #[tokio::test]
    async fn started_session_is_closed() {
        let pool = db::memory_pool().await;
        let gate = BookingGate::new(pool.clone());
        seed_member(&pool, ANA, PlanType::ThreeDays).await;
        let session = session_on(&pool, day(1), 10).await;

        // Sessions start at 18:00; one minute past is already underway.
        let err = gate.book(ANA, &session.id, at(day(1), 18, 1)).await.unwrap_err();
        assert!(matches!(err, AppError::SessionClosed));
    }

    #[tokio::test]
    async fn double_booking_is_rejected() {
        let pool = db::memory_pool().await;
        let gate = BookingGate::new(pool.clone());
        seed_member(&pool, ANA, PlanType::ThreeDays).await;
        let session = session_on(&pool, day(2), 10).await;

        gate.book(ANA, &session.id, at(day(1), 10, 0)).await.unwrap();
        let err = gate.book(ANA, &session.id, at(day(1), 10, 5)).await.unwrap_err();
        assert!(matches!(err, AppError::AlreadyBooked));

        let occupancy = gate.occupancy(&session.id).await.unwrap();
        assert_eq!(occupancy.occupied, 1);
    }

    #[tokio::test]
    async fn full_session_is_rejected() {
        let pool = db::memory_pool().await;
        let gate = BookingGate::new(pool.clone());
        seed_member(&pool, ANA, PlanType::ThreeDays).await;
        seed_member(&pool, BRUNO, PlanType::ThreeDays).await;
        let session = session_on(&pool, day(2), 1).await;

        gate.book(ANA, &session.id, at(day(1), 10, 0)).await.unwrap();
        let err = gate.book(BRUNO, &session.id, at(day(1), 10, 5)).await.unwrap_err();
        assert!(matches!(err, AppError::SessionFull));
    }

    #[tokio::test]
    async fn cancel_frees_exactly_one_seat() {
        let pool = db::memory_pool().await;
        let gate = BookingGate::new(pool.clone());
        seed_member(&pool, ANA, PlanType::ThreeDays).await;
        seed_member(&pool, BRUNO, PlanType::ThreeDays).await;
        let session = session_on(&pool, day(2), 1).await;

        let booked = gate.book(ANA, &session.id, at(day(1), 10, 0)).await.unwrap();
        gate.cancel(ANA, &booked.id, at(day(1), 11, 0)).await.unwrap();

        assert_eq!(gate.occupancy(&session.id).await.unwrap().occupied, 0);
        gate.book(BRUNO, &session.id, at(day(1), 12, 0)).await.unwrap();

        let err = gate.book(ANA, &session.id, at(day(1), 12, 5)).await.unwrap_err();
        assert!(matches!(err, AppError::SessionFull));
    }

    #[tokio::test]
    async fn double_cancel_is_reported() {
        let pool = db::memory_pool().await;
        let gate = BookingGate::new(pool.clone());
        seed_member(&pool, ANA, PlanType::ThreeDays).await;
        let session = session_on(&pool, day(2), 10).await;

        let booked = gate.book(ANA, &session.id, at(day(1), 10, 0)).await.unwrap();
        gate.cancel(ANA, &booked.id, at(day(1), 11, 0)).await.unwrap();

        let err = gate.cancel(ANA, &booked.id, at(day(1), 11, 5)).await.unwrap_err();
        assert!(matches!(err, AppError::AlreadyCancelled));
    }

    #[tokio::test]
    async fn cancel_by_non_owner_looks_like_not_found() {
        let pool = db::memory_pool().await;
        let gate = BookingGate::new(pool.clone());
        seed_member(&pool, ANA, PlanType::ThreeDays).await;
        seed_member(&pool, BRUNO, PlanType::ThreeDays).await;
        let session = session_on(&pool, day(2), 10).await;

        let booked = gate.book(ANA, &session.id, at(day(1), 10, 0)).await.unwrap();
        let err = gate.cancel(BRUNO, &booked.id, at(day(1), 11, 0)).await.unwrap_err();
        assert!(matches!(err, AppError::ReservationNotFound(_)));
    }

    #[tokio::test]
    async fn exhausted_credits_are_rejected() {
        let pool = db::memory_pool().await;
        let gate = BookingGate::new(pool.clone());
        seed_member(&pool, ANA, PlanType::OneDay).await;
        let first = session_on(&pool, day(2), 10).await;
        let second = session_on(&pool, day(3), 10).await;

        gate.book(ANA, &first.id, at(day(1), 10, 0)).await.unwrap();
        let err = gate.book(ANA, &second.id, at(day(1), 10, 5)).await.unwrap_err();
        assert!(matches!(err, AppError::NoCreditsAvailable));
    }

    #[tokio::test]
    async fn advance_bookings_fit_the_target_weeks_allotment() {
        let pool = db::memory_pool().await;
        let gate = BookingGate::new(pool.clone());
        seed_member(&pool, ANA, PlanType::ThreeDays).await;

        let mut sessions = Vec::new();
        for offset in 8..13 {
            sessions.push(session_on(&pool, day(offset), 10).await);
        }

        // All five bookings happen today, for sessions in next week's cycle.
        let now = at(day(1), 10, 0);
        let mut booked = 0;
        let mut rejected = 0;
        for session in &sessions {
            match gate.book(ANA, &session.id, now).await {
                Ok(_) => booked += 1,
                Err(AppError::NoCreditsAvailable) => rejected += 1,
                Err(other) => panic!("unexpected error: {other}"),
            }
        }
        assert_eq!(booked, 3);
        assert_eq!(rejected, 2);

        // The current week's allotment is untouched by those bookings.
        let today_session = session_on(&pool, day(2), 10).await;
        gate.book(ANA, &today_session.id, now).await.unwrap();

        // When next week arrives the usage fits the plan.
        let state = membership::membership_state(&pool, ANA, at(day(8), 10, 0))
            .await
            .unwrap();
        assert_eq!(state.credits_used_this_cycle, 3);
        assert_eq!(state.credits_available, 0);
    }

    #[tokio::test]
    async fn plan_without_annual_is_gated() {
        let pool = db::memory_pool().await;
        let gate = BookingGate::new(pool.clone());
        seed_client(&pool, ANA).await;
        approved_payment(&pool, ANA, PaymentKind::MonthlyPlan(PlanType::TwoDays), day(0)).await;
        let session = session_on(&pool, day(2), 10).await;

        let err = gate.book(ANA, &session.id, at(day(1), 10, 0)).await.unwrap_err();
        assert!(matches!(err, AppError::NoMembership));
    }

    #[tokio::test]
    async fn concurrent_bookings_never_overbook() {
        let pool = db::memory_pool().await;
        let gate = BookingGate::new(pool.clone());
        seed_member(&pool, ANA, PlanType::ThreeDays).await;
        seed_member(&pool, BRUNO, PlanType::ThreeDays).await;
        let session = session_on(&pool, day(2), 1).await;

        let now = at(day(1), 10, 0);
        let (first, second) = tokio::join!(
            gate.book(ANA, &session.id, now),
            gate.book(BRUNO, &session.id, now),
        );

        assert_eq!(first.is_ok() as u8 + second.is_ok() as u8, 1);
        assert_eq!(gate.occupancy(&session.id).await.unwrap().occupied, 1);
    }

    #[tokio::test]
    async fn concurrent_bookings_never_overspend_credits() {
        let pool = db::memory_pool().await;
        let gate = BookingGate::new(pool.clone());
        seed_member(&pool, ANA, PlanType::OneDay).await;
        let first_session = session_on(&pool, day(2), 10).await;
        let second_session = session_on(&pool, day(3), 10).await;

        let now = at(day(1), 10, 0);
        let (first, second) = tokio::join!(
            gate.book(ANA, &first_session.id, now),
            gate.book(ANA, &second_session.id, now),
        );

        assert_eq!(first.is_ok() as u8 + second.is_ok() as u8, 1);
        let state = membership::membership_state(&pool, ANA, now).await.unwrap();
        assert_eq!(state.credits_used_this_cycle, 1);
    }
}
