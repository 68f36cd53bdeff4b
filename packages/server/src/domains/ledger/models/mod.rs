pub mod account;
pub mod ledger_entry;

pub use account::{AccountBalance, ApplyOutcome};
pub use ledger_entry::{EntryKind, EntryStatus, LedgerEntry};
