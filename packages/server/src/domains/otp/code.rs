use rand::Rng;

/// Uniformly random numeric code of `length` digits (leading zeros allowed).
///
/// Collisions between identities are fine: codes are scoped per identity and short-lived.
pub fn generate_code(length: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..length)
        .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
        .collect()
}

/// Cheap shape check before touching the store.
pub fn looks_like_code(candidate: &str, length: usize) -> bool {
    candidate.len() == length && candidate.bytes().all(|b| b.is_ascii_digit())
}
