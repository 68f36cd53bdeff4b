use std::net::IpAddr;

use sha2::{Digest, Sha256};

/// Longest device identifier we accept from a client.
pub const MAX_DEVICE_IDENTIFIER_LEN: usize = 128;

/// Stable identifier for clients that don't send one: SHA-256 of User-Agent and IP.
pub fn derive_device_identifier(user_agent: &str, client_ip: Option<IpAddr>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(user_agent.as_bytes());
    hasher.update(b"|");
    if let Some(ip) = client_ip {
        hasher.update(ip.to_string().as_bytes());
    }
    format!("fp_{}", hex::encode(hasher.finalize()))
}

/// Client-supplied identifiers: printable ASCII, no whitespace, bounded length.
pub fn is_valid_device_identifier(identifier: &str) -> bool {
    !identifier.is_empty()
        && identifier.len() <= MAX_DEVICE_IDENTIFIER_LEN
        && identifier.bytes().all(|b| b.is_ascii_graphic())
}
