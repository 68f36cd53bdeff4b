use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::common::IdentityId;

/// Soft lifecycle status. Identities are never hard-deleted.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "identity_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum IdentityStatus {
    Active,
    Suspended,
    Closed,
}

/// Identity - the account holder, keyed by a unique phone number.
///
/// `balance` is in minor units and is only ever written by the ledger.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Identity {
    pub id: IdentityId,
    pub phone_number: String,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    #[serde(skip_serializing)]
    pub transaction_pin_hash: Option<String>,
    pub phone_verified: bool,
    pub onboarding_complete: bool,
    pub balance: i64,
    pub status: IdentityStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Names and email, the parts of an identity its owner may edit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayFields {
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
}

/// Registration input (already normalized by the gateway)
#[derive(Debug, Clone)]
pub struct NewIdentity {
    pub phone_number: String,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
}

impl Identity {
    pub fn new(input: NewIdentity, now: DateTime<Utc>) -> Self {
        Self {
            id: IdentityId::new(),
            phone_number: input.phone_number,
            first_name: input.first_name,
            last_name: input.last_name,
            email: input.email,
            transaction_pin_hash: None,
            phone_verified: false,
            onboarding_complete: false,
            balance: 0,
            status: IdentityStatus::Active,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == IdentityStatus::Active
    }

    pub fn has_transaction_pin(&self) -> bool {
        self.transaction_pin_hash.is_some()
    }

    pub fn display_fields(&self) -> DisplayFields {
        DisplayFields {
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            email: self.email.clone(),
        }
    }
}

// =============================================================================
// SQL Queries - ALL queries must be in models/
// =============================================================================

impl Identity {
    /// Insert a new identity. Returns `None` when the phone number is taken.
    pub async fn insert(&self, pool: &PgPool) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO identities (
                id, phone_number, first_name, last_name, email,
                transaction_pin_hash, phone_verified, onboarding_complete,
                balance, status, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT (phone_number) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(self.id)
        .bind(&self.phone_number)
        .bind(&self.first_name)
        .bind(&self.last_name)
        .bind(&self.email)
        .bind(&self.transaction_pin_hash)
        .bind(self.phone_verified)
        .bind(self.onboarding_complete)
        .bind(self.balance)
        .bind(self.status)
        .bind(self.created_at)
        .bind(self.updated_at)
        .fetch_optional(pool)
        .await
        .map_err(Into::into)
    }

    pub async fn find_by_id(id: IdentityId, pool: &PgPool) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>("SELECT * FROM identities WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(Into::into)
    }

    pub async fn find_by_phone(phone_number: &str, pool: &PgPool) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>("SELECT * FROM identities WHERE phone_number = $1")
            .bind(phone_number)
            .fetch_optional(pool)
            .await
            .map_err(Into::into)
    }

    /// Mark the phone verified; onboarding completes if a PIN is already set.
    pub async fn mark_phone_verified(
        id: IdentityId,
        now: DateTime<Utc>,
        pool: &PgPool,
    ) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>(
            r#"
            UPDATE identities
            SET phone_verified = true,
                onboarding_complete = (transaction_pin_hash IS NOT NULL),
                updated_at = $2
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(now)
        .fetch_optional(pool)
        .await
        .map_err(Into::into)
    }

    pub async fn update_display_fields(
        id: IdentityId,
        fields: &DisplayFields,
        now: DateTime<Utc>,
        pool: &PgPool,
    ) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>(
            r#"
            UPDATE identities
            SET first_name = $2, last_name = $3, email = $4, updated_at = $5
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&fields.first_name)
        .bind(&fields.last_name)
        .bind(&fields.email)
        .bind(now)
        .fetch_optional(pool)
        .await
        .map_err(Into::into)
    }

    /// Store a new PIN digest; onboarding completes if the phone is verified.
    pub async fn set_transaction_pin(
        id: IdentityId,
        pin_hash: &str,
        now: DateTime<Utc>,
        pool: &PgPool,
    ) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>(
            r#"
            UPDATE identities
            SET transaction_pin_hash = $2,
                onboarding_complete = phone_verified,
                updated_at = $3
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(pin_hash)
        .bind(now)
        .fetch_optional(pool)
        .await
        .map_err(Into::into)
    }
}
