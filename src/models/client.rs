use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};

pub const STATUS_ACTIVE: &str = "active";
pub const STATUS_INACTIVE: &str = "inactive";

/// A gym client, keyed by document number. Never hard-deleted; deactivation
/// is a status change only.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Client {
    pub document: String,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub eps: Option<String>,
    pub emergency_contact: Option<String>,
    pub medical_notes: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateClientData {
    pub document: String,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub eps: Option<String>,
    pub emergency_contact: Option<String>,
    pub medical_notes: Option<String>,
}

impl Client {
    /// Registers a new client with status `active`.
    pub async fn create(
        pool: &SqlitePool,
        data: CreateClientData,
        now: DateTime<Utc>,
    ) -> Result<Self, sqlx::Error> {
        let client = sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO clients
                (document, name, email, phone, eps, emergency_contact, medical_notes, status, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(&data.document)
        .bind(&data.name)
        .bind(&data.email)
        .bind(&data.phone)
        .bind(&data.eps)
        .bind(&data.emergency_contact)
        .bind(&data.medical_notes)
        .bind(STATUS_ACTIVE)
        .bind(now)
        .fetch_one(pool)
        .await?;

        Ok(client)
    }

    pub async fn find_by_document(
        pool: &SqlitePool,
        document: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        let client = sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM clients WHERE document = ?
            "#,
        )
        .bind(document)
        .fetch_optional(pool)
        .await?;

        Ok(client)
    }

    /// Updates contact/medical metadata. Absent fields keep their value.
    pub async fn update_profile(
        pool: &SqlitePool,
        document: &str,
        name: Option<String>,
        email: Option<String>,
        phone: Option<String>,
        eps: Option<String>,
        emergency_contact: Option<String>,
        medical_notes: Option<String>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE clients
            SET
                name = COALESCE(?, name),
                email = COALESCE(?, email),
                phone = COALESCE(?, phone),
                eps = COALESCE(?, eps),
                emergency_contact = COALESCE(?, emergency_contact),
                medical_notes = COALESCE(?, medical_notes)
            WHERE document = ?
            "#,
        )
        .bind(name)
        .bind(email)
        .bind(phone)
        .bind(eps)
        .bind(emergency_contact)
        .bind(medical_notes)
        .bind(document)
        .execute(pool)
        .await?;

        Ok(())
    }

    pub async fn set_status(
        pool: &SqlitePool,
        document: &str,
        status: &str,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE clients SET status = ? WHERE document = ?
            "#,
        )
        .bind(status)
        .bind(document)
        .execute(pool)
        .await?;

        Ok(result.rows_affected())
    }
}
