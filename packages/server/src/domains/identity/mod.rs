//! Identity domain - account holders keyed by phone number
//!
//! Owns the identity record, its verification flags and the transaction PIN digest.
//! The balance column lives on the same row but is written only by the ledger.

pub mod models;
pub mod pin;
pub mod store;

pub use models::{DisplayFields, Identity, IdentityStatus, NewIdentity};
pub use pin::{hash_transaction_pin, is_valid_pin_format, verify_transaction_pin};
pub use store::IdentityStore;
