//! Ledger domain - balances and the movements between them
//!
//! Amounts are integer minor units. An entry and the balance changes it describes are
//! applied by the store as one unit, with every debit guarded by `balance >= amount`.

pub mod engine;
pub mod locks;
pub mod models;
pub mod store;

pub use engine::{DepositRequest, LedgerEngine, LedgerError, TransferRequest, WithdrawalRequest};
pub use models::{AccountBalance, ApplyOutcome, EntryKind, EntryStatus, LedgerEntry};
pub use store::LedgerStore;
