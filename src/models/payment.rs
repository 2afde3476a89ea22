use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

use crate::services::plan_catalog::PlanType;

pub const STATUS_PENDING: &str = "pending";
pub const STATUS_APPROVED: &str = "approved";
pub const STATUS_REJECTED: &str = "rejected";

pub const KIND_ANNUAL: &str = "annual";
pub const KIND_SINGLE: &str = "single";

/// What a payment buys. Stored as a text code in the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentKind {
    AnnualMembership,
    MonthlyPlan(PlanType),
    SingleClass,
}

impl PaymentKind {
    pub fn code(&self) -> &'static str {
        match self {
            PaymentKind::AnnualMembership => KIND_ANNUAL,
            PaymentKind::MonthlyPlan(plan) => plan.code(),
            PaymentKind::SingleClass => KIND_SINGLE,
        }
    }

    pub fn parse(code: &str) -> Option<Self> {
        match code {
            KIND_ANNUAL => Some(PaymentKind::AnnualMembership),
            KIND_SINGLE => Some(PaymentKind::SingleClass),
            other => PlanType::from_code(other).map(PaymentKind::MonthlyPlan),
        }
    }

    pub fn validity_days(&self) -> i64 {
        match self {
            PaymentKind::AnnualMembership => 365,
            PaymentKind::MonthlyPlan(_) | PaymentKind::SingleClass => 30,
        }
    }

    /// Expiration date computed at approval time.
    pub fn expires_on(&self, approved_on: NaiveDate) -> NaiveDate {
        approved_on + Duration::days(self.validity_days())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Payment {
    pub id: String,
    pub document: String,
    pub kind: String,
    pub amount: i64,
    pub receipt_url: Option<String>,
    pub submitted_at: DateTime<Utc>,
    pub status: String,
    pub approved_at: Option<DateTime<Utc>>,
    pub expires_on: Option<NaiveDate>,
}

#[derive(Debug, Clone)]
pub struct SubmitPaymentData {
    pub document: String,
    pub kind: PaymentKind,
    pub amount: i64,
    pub receipt_url: Option<String>,
}

impl Payment {
    pub fn payment_kind(&self) -> Option<PaymentKind> {
        PaymentKind::parse(&self.kind)
    }

    /// Records a pending payment awaiting admin approval.
    pub async fn submit(
        pool: &SqlitePool,
        data: SubmitPaymentData,
        now: DateTime<Utc>,
    ) -> Result<Self, sqlx::Error> {
        let payment = sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO payments (id, document, kind, amount, receipt_url, submitted_at, status)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&data.document)
        .bind(data.kind.code())
        .bind(data.amount)
        .bind(&data.receipt_url)
        .bind(now)
        .bind(STATUS_PENDING)
        .fetch_one(pool)
        .await?;

        Ok(payment)
    }

    pub async fn find_by_id(pool: &SqlitePool, id: &str) -> Result<Option<Self>, sqlx::Error> {
        let payment = sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM payments WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(payment)
    }

    /// One-way transition pending -> approved/rejected. Returns the number of
    /// rows changed; 0 means the payment was already settled (or missing).
    pub async fn settle(
        pool: &SqlitePool,
        id: &str,
        status: &str,
        approved_at: Option<DateTime<Utc>>,
        expires_on: Option<NaiveDate>,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE payments
            SET status = ?, approved_at = ?, expires_on = ?
            WHERE id = ? AND status = ?
            "#,
        )
        .bind(status)
        .bind(approved_at)
        .bind(expires_on)
        .bind(id)
        .bind(STATUS_PENDING)
        .execute(pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Approved payments only, oldest first. The membership calculator reads
    /// nothing else.
    pub async fn list_approved(
        pool: &SqlitePool,
        document: &str,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let payments = sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM payments
            WHERE document = ? AND status = ?
            ORDER BY approved_at
            "#,
        )
        .bind(document)
        .bind(STATUS_APPROVED)
        .fetch_all(pool)
        .await?;

        Ok(payments)
    }

    pub async fn list_for_client(
        pool: &SqlitePool,
        document: &str,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let payments = sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM payments WHERE document = ? ORDER BY submitted_at DESC
            "#,
        )
        .bind(document)
        .fetch_all(pool)
        .await?;

        Ok(payments)
    }
}
