//! Transaction PIN hashing and comparison.
//!
//! PINs are stored as a SHA-256 digest salted with the identity id, so equal PINs on two
//! identities never share a digest. Comparison runs in constant time.

use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::common::IdentityId;

pub const MIN_PIN_LENGTH: usize = 4;
pub const MAX_PIN_LENGTH: usize = 6;

/// 4 to 6 ASCII digits.
pub fn is_valid_pin_format(pin: &str) -> bool {
    (MIN_PIN_LENGTH..=MAX_PIN_LENGTH).contains(&pin.len()) && pin.bytes().all(|b| b.is_ascii_digit())
}

pub fn hash_transaction_pin(identity_id: IdentityId, pin: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(identity_id.as_uuid().as_bytes());
    hasher.update(pin.as_bytes());
    hex::encode(hasher.finalize())
}

pub fn verify_transaction_pin(identity_id: IdentityId, pin: &str, stored_hash: &str) -> bool {
    let candidate = hash_transaction_pin(identity_id, pin);
    constant_time_eq(candidate.as_bytes(), stored_hash.as_bytes())
}

/// Constant-time byte comparison (length mismatch short-circuits; lengths are not secret).
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}
