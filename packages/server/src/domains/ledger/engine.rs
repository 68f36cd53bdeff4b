use std::sync::Arc;

use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use tracing::{error, info, warn};
use uuid::Uuid;

use super::locks::AccountLocks;
use super::models::{ApplyOutcome, EntryStatus, LedgerEntry};
use super::store::LedgerStore;
use crate::common::{trim_results, Amount, IdentityId, Page, PageRequest, MAX_PAGE_SIZE};
use crate::kernel::BaseClock;

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("cannot transfer to the same account")]
    SameAccount,
    #[error("account not found")]
    NotFound,
    #[error("insufficient funds")]
    InsufficientFunds,
    /// Idempotency key reused with different parameters
    #[error("conflicting request for idempotency key")]
    Conflict,
    /// The store rolled the transfer back; no money moved.
    #[error("transfer failed and was rolled back")]
    Failed,
    #[error("{0}")]
    InvalidPage(&'static str),
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

#[derive(Debug, Clone)]
pub struct TransferRequest {
    pub source_id: IdentityId,
    pub destination_id: IdentityId,
    pub amount: Amount,
    pub memo: Option<String>,
    pub idempotency_key: Option<String>,
}

#[derive(Debug, Clone)]
pub struct DepositRequest {
    pub destination_id: IdentityId,
    pub amount: Amount,
    /// Who the money came from, e.g. a funding channel
    pub source_label: String,
    pub reference: Option<String>,
}

#[derive(Debug, Clone)]
pub struct WithdrawalRequest {
    pub source_id: IdentityId,
    pub amount: Amount,
    pub memo: Option<String>,
}

/// Owns balance mutation and transaction history.
///
/// Every mutation runs under the per-account locks of the accounts it touches and
/// reaches the store as a single `apply_entry`, which moves the money and records the
/// entry as one unit. The store guards each debit, so balances never go negative even
/// with several processes sharing one database.
pub struct LedgerEngine {
    store: Arc<dyn LedgerStore>,
    clock: Arc<dyn BaseClock>,
    locks: AccountLocks,
}

impl LedgerEngine {
    pub fn new(store: Arc<dyn LedgerStore>, clock: Arc<dyn BaseClock>) -> Self {
        Self {
            store,
            clock,
            locks: AccountLocks::new(),
        }
    }

    pub async fn balance(&self, identity_id: IdentityId) -> Result<i64, LedgerError> {
        self.store
            .account_balance(identity_id)
            .await?
            .ok_or(LedgerError::NotFound)
    }

    /// Move `amount` from source to destination. Debit, credit and entry are all
    /// visible or none are.
    pub async fn transfer(&self, request: TransferRequest) -> Result<LedgerEntry, LedgerError> {
        let TransferRequest {
            source_id,
            destination_id,
            amount,
            memo,
            idempotency_key,
        } = request;

        if source_id == destination_id {
            return Err(LedgerError::SameAccount);
        }

        let _guard = self.locks.acquire(&[source_id, destination_id]).await?;

        if let Some(key) = idempotency_key.as_deref() {
            if let Some(existing) = self.store.find_entry_by_idempotency_key(source_id, key).await? {
                return replay(existing, destination_id, amount);
            }
        }

        if self.store.account_balance(destination_id).await?.is_none() {
            return Err(LedgerError::NotFound);
        }

        let entry = LedgerEntry::transfer(source_id, destination_id, amount, self.clock.now())
            .with_memo(memo)
            .with_idempotency_key(idempotency_key.clone());

        match self.store.apply_entry(&entry).await {
            Ok(ApplyOutcome::Applied(applied)) => {
                info!(
                    entry_id = %applied.id,
                    source_id = %source_id,
                    destination_id = %destination_id,
                    amount = applied.amount,
                    "transfer completed"
                );
                Ok(applied)
            }
            Ok(ApplyOutcome::InsufficientFunds) => Err(LedgerError::InsufficientFunds),
            Ok(ApplyOutcome::UnknownAccount) => Err(LedgerError::NotFound),
            Ok(ApplyOutcome::DuplicateKey) => {
                // Another process recorded this key first.
                let key = idempotency_key.unwrap_or_default();
                match self.store.find_entry_by_idempotency_key(source_id, &key).await? {
                    Some(existing) => replay(existing, destination_id, amount),
                    None => Err(LedgerError::Conflict),
                }
            }
            Err(e) => {
                warn!(error = %e, source_id = %source_id, destination_id = %destination_id, amount = entry.amount, "transfer rolled back");
                self.record_failed(entry).await;
                Err(LedgerError::Failed)
            }
        }
    }

    /// Credit the destination with money from outside the system.
    pub async fn deposit(&self, request: DepositRequest) -> Result<LedgerEntry, LedgerError> {
        let DepositRequest {
            destination_id,
            amount,
            source_label,
            reference,
        } = request;

        let _guard = self.locks.acquire(&[destination_id]).await?;

        let entry = LedgerEntry::deposit(destination_id, amount, self.clock.now())
            .with_memo(Some(format!("Received from {source_label}")))
            .with_reference(reference);

        match self.store.apply_entry(&entry).await? {
            ApplyOutcome::Applied(applied) => {
                info!(entry_id = %applied.id, destination_id = %destination_id, amount = applied.amount, "deposit completed");
                Ok(applied)
            }
            ApplyOutcome::UnknownAccount => Err(LedgerError::NotFound),
            ApplyOutcome::InsufficientFunds | ApplyOutcome::DuplicateKey => Err(LedgerError::Conflict),
        }
    }

    /// Pay money out of the system from the source's balance.
    pub async fn withdraw(&self, request: WithdrawalRequest) -> Result<LedgerEntry, LedgerError> {
        let WithdrawalRequest {
            source_id,
            amount,
            memo,
        } = request;

        let _guard = self.locks.acquire(&[source_id]).await?;

        let entry = LedgerEntry::withdrawal(source_id, amount, self.clock.now()).with_memo(memo);
        match self.store.apply_entry(&entry).await? {
            ApplyOutcome::Applied(applied) => {
                info!(entry_id = %applied.id, source_id = %source_id, amount = applied.amount, "withdrawal completed");
                Ok(applied)
            }
            ApplyOutcome::InsufficientFunds => Err(LedgerError::InsufficientFunds),
            ApplyOutcome::UnknownAccount => Err(LedgerError::NotFound),
            ApplyOutcome::DuplicateKey => Err(LedgerError::Conflict),
        }
    }

    /// One page of the identity's entries, newest first.
    pub async fn history(
        &self,
        identity_id: IdentityId,
        request: &PageRequest,
    ) -> Result<Page<LedgerEntry>, LedgerError> {
        let page = request.validate().map_err(LedgerError::InvalidPage)?;
        let rows = self
            .store
            .entries_for(identity_id, page.after, page.fetch_limit())
            .await?;
        Ok(Page::from_rows(rows, &page, |entry| entry.id.into_uuid()))
    }

    /// All of the identity's entries, newest first, fetched lazily `page_size` at a time.
    pub fn history_stream(
        &self,
        identity_id: IdentityId,
        page_size: u32,
    ) -> BoxStream<'_, Result<LedgerEntry, LedgerError>> {
        let limit = page_size.clamp(1, MAX_PAGE_SIZE);

        stream::try_unfold(Some(None::<Uuid>), move |cursor| async move {
            let after = match cursor {
                Some(after) => after,
                None => return Ok(None),
            };
            let rows = self.store.entries_for(identity_id, after, limit + 1).await?;
            let (items, has_more) = trim_results(rows, limit);
            let next = match items.last() {
                Some(last) if has_more => Some(Some(last.id.into_uuid())),
                _ => None,
            };
            let batch = stream::iter(items.into_iter().map(Ok::<_, LedgerError>));
            Ok::<_, LedgerError>(Some((batch, next)))
        })
        .try_flatten()
        .boxed()
    }

    /// Keep a record of a transfer the store rolled back. No money moves, and the
    /// idempotency key is dropped so a retry can still go through.
    async fn record_failed(&self, entry: LedgerEntry) {
        let failed = entry.with_status(EntryStatus::Failed).with_idempotency_key(None);
        match self.store.apply_entry(&failed).await {
            Ok(ApplyOutcome::Applied(_)) => {}
            Ok(outcome) => error!(entry_id = %failed.id, ?outcome, "failed transfer was not recorded"),
            Err(e) => error!(entry_id = %failed.id, error = %e, "failed to record failed transfer"),
        }
    }
}

fn replay(
    existing: LedgerEntry,
    destination_id: IdentityId,
    amount: Amount,
) -> Result<LedgerEntry, LedgerError> {
    if existing.matches_transfer(destination_id, amount) {
        info!(entry_id = %existing.id, "idempotent transfer replayed");
        Ok(existing)
    } else {
        Err(LedgerError::Conflict)
    }
}
