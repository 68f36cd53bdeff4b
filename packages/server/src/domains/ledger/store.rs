use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

use super::models::{ApplyOutcome, LedgerEntry};
use crate::common::IdentityId;

/// Balance mutation and entry persistence. Only `LedgerEngine` talks to it.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn account_balance(&self, id: IdentityId) -> Result<Option<i64>>;

    /// Debit `source_id` (guarded by `balance >= amount`), credit `destination_id` and
    /// record the entry, all or nothing. On any outcome other than `Applied`, and on
    /// error, no balance or entry has changed.
    ///
    /// Entries that are not completed are recorded without touching balances.
    async fn apply_entry(&self, entry: &LedgerEntry) -> Result<ApplyOutcome>;

    async fn find_entry_by_idempotency_key(
        &self,
        source_id: IdentityId,
        key: &str,
    ) -> Result<Option<LedgerEntry>>;

    /// Newest first; strictly older than `after` when given.
    async fn entries_for(
        &self,
        identity_id: IdentityId,
        after: Option<Uuid>,
        limit: u32,
    ) -> Result<Vec<LedgerEntry>>;
}
