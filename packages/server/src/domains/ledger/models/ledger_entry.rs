use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::common::{Amount, IdentityId, LedgerEntryId};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "ledger_entry_kind", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Transfer,
    Deposit,
    Withdrawal,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "ledger_entry_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    Pending,
    Completed,
    Failed,
}

/// One monetary movement. Immutable once completed or failed.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct LedgerEntry {
    pub id: LedgerEntryId,
    /// Debited identity; `None` for deposits
    pub source_id: Option<IdentityId>,
    /// Credited identity; `None` for withdrawals
    pub destination_id: Option<IdentityId>,
    pub amount: i64,
    pub kind: EntryKind,
    pub status: EntryStatus,
    pub memo: Option<String>,
    pub reference: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    fn build(
        source_id: Option<IdentityId>,
        destination_id: Option<IdentityId>,
        amount: Amount,
        kind: EntryKind,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: LedgerEntryId::new(),
            source_id,
            destination_id,
            amount: amount.minor_units(),
            kind,
            status: EntryStatus::Completed,
            memo: None,
            reference: None,
            idempotency_key: None,
            created_at: now,
        }
    }

    pub fn transfer(
        source_id: IdentityId,
        destination_id: IdentityId,
        amount: Amount,
        now: DateTime<Utc>,
    ) -> Self {
        Self::build(Some(source_id), Some(destination_id), amount, EntryKind::Transfer, now)
    }

    pub fn deposit(destination_id: IdentityId, amount: Amount, now: DateTime<Utc>) -> Self {
        Self::build(None, Some(destination_id), amount, EntryKind::Deposit, now)
    }

    pub fn withdrawal(source_id: IdentityId, amount: Amount, now: DateTime<Utc>) -> Self {
        Self::build(Some(source_id), None, amount, EntryKind::Withdrawal, now)
    }

    pub fn with_status(mut self, status: EntryStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_memo(mut self, memo: Option<String>) -> Self {
        self.memo = memo;
        self
    }

    pub fn with_reference(mut self, reference: Option<String>) -> Self {
        self.reference = reference;
        self
    }

    pub fn with_idempotency_key(mut self, key: Option<String>) -> Self {
        self.idempotency_key = key;
        self
    }

    pub fn involves(&self, identity_id: IdentityId) -> bool {
        self.source_id == Some(identity_id) || self.destination_id == Some(identity_id)
    }

    /// Whether a retried transfer carries the same parameters as this entry.
    pub fn matches_transfer(&self, destination_id: IdentityId, amount: Amount) -> bool {
        self.kind == EntryKind::Transfer
            && self.destination_id == Some(destination_id)
            && self.amount == amount.minor_units()
    }
}

// =============================================================================
// SQL Queries - ALL queries must be in models/
// =============================================================================

impl LedgerEntry {
    /// Insert the entry. Returns `None` if `(source_id, idempotency_key)` is already taken.
    pub async fn insert(&self, conn: &mut PgConnection) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO ledger_entries (
                id, source_id, destination_id, amount, kind, status,
                memo, reference, idempotency_key, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (source_id, idempotency_key) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(self.id)
        .bind(self.source_id)
        .bind(self.destination_id)
        .bind(self.amount)
        .bind(self.kind)
        .bind(self.status)
        .bind(&self.memo)
        .bind(&self.reference)
        .bind(&self.idempotency_key)
        .bind(self.created_at)
        .fetch_optional(conn)
        .await
        .map_err(Into::into)
    }

    pub async fn find_by_idempotency_key(
        source_id: IdentityId,
        key: &str,
        pool: &PgPool,
    ) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>(
            "SELECT * FROM ledger_entries WHERE source_id = $1 AND idempotency_key = $2",
        )
        .bind(source_id)
        .bind(key)
        .fetch_optional(pool)
        .await
        .map_err(Into::into)
    }

    /// Entries where the identity is source or destination, newest first, strictly
    /// older than the `after` entry when given.
    pub async fn find_for_identity(
        identity_id: IdentityId,
        after: Option<Uuid>,
        limit: u32,
        pool: &PgPool,
    ) -> Result<Vec<Self>> {
        sqlx::query_as::<_, Self>(
            r#"
            SELECT e.* FROM ledger_entries e
            WHERE (e.source_id = $1 OR e.destination_id = $1)
              AND (
                $2::uuid IS NULL
                OR (e.created_at, e.id) < (
                    SELECT c.created_at, c.id FROM ledger_entries c WHERE c.id = $2
                )
              )
            ORDER BY e.created_at DESC, e.id DESC
            LIMIT $3
            "#,
        )
        .bind(identity_id)
        .bind(after)
        .bind(i64::from(limit))
        .fetch_all(pool)
        .await
        .map_err(Into::into)
    }
}
