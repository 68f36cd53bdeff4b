use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgExecutor, PgPool};

use super::ledger_entry::{EntryStatus, LedgerEntry};
use crate::common::IdentityId;

/// Result of applying an entry to the balances it touches.
#[derive(Debug, Clone)]
pub enum ApplyOutcome {
    Applied(LedgerEntry),
    InsufficientFunds,
    UnknownAccount,
    /// `(source_id, idempotency_key)` is already recorded
    DuplicateKey,
}

/// Balance column access on `identities`. Only the ledger uses these.
pub struct AccountBalance;

// =============================================================================
// SQL Queries - ALL queries must be in models/
// =============================================================================

impl AccountBalance {
    pub async fn find<'e>(id: IdentityId, executor: impl PgExecutor<'e>) -> Result<Option<i64>> {
        sqlx::query_scalar::<_, i64>("SELECT balance FROM identities WHERE id = $1")
            .bind(id)
            .fetch_optional(executor)
            .await
            .map_err(Into::into)
    }

    /// Debit the source, credit the destination and insert the entry in one
    /// transaction. Entries that are not completed are inserted without moving money.
    pub async fn apply(entry: &LedgerEntry, pool: &PgPool) -> Result<ApplyOutcome> {
        let mut tx = pool.begin().await?;

        if entry.status == EntryStatus::Completed {
            if let Some(source_id) = entry.source_id {
                if !Self::debit(source_id, entry.amount, entry.created_at, &mut tx).await? {
                    let outcome = match Self::find(source_id, &mut *tx).await? {
                        Some(_) => ApplyOutcome::InsufficientFunds,
                        None => ApplyOutcome::UnknownAccount,
                    };
                    tx.rollback().await?;
                    return Ok(outcome);
                }
            }

            if let Some(destination_id) = entry.destination_id {
                if !Self::credit(destination_id, entry.amount, entry.created_at, &mut tx).await? {
                    tx.rollback().await?;
                    return Ok(ApplyOutcome::UnknownAccount);
                }
            }
        }

        let Some(inserted) = entry.insert(&mut tx).await? else {
            tx.rollback().await?;
            return Ok(ApplyOutcome::DuplicateKey);
        };

        tx.commit().await?;
        Ok(ApplyOutcome::Applied(inserted))
    }

    /// Decrement only while `balance >= amount`. False when nothing was updated.
    async fn debit(
        id: IdentityId,
        amount: i64,
        now: DateTime<Utc>,
        conn: &mut PgConnection,
    ) -> Result<bool> {
        let updated = sqlx::query_scalar::<_, i64>(
            r#"
            UPDATE identities
            SET balance = balance - $2, updated_at = $3
            WHERE id = $1 AND balance >= $2
            RETURNING balance
            "#,
        )
        .bind(id)
        .bind(amount)
        .bind(now)
        .fetch_optional(conn)
        .await?;

        Ok(updated.is_some())
    }

    /// False for an unknown account.
    async fn credit(
        id: IdentityId,
        amount: i64,
        now: DateTime<Utc>,
        conn: &mut PgConnection,
    ) -> Result<bool> {
        let updated = sqlx::query_scalar::<_, i64>(
            r#"
            UPDATE identities
            SET balance = balance + $2, updated_at = $3
            WHERE id = $1
            RETURNING balance
            "#,
        )
        .bind(id)
        .bind(amount)
        .bind(now)
        .fetch_optional(conn)
        .await?;

        Ok(updated.is_some())
    }
}
