//! Auth domain - stateless session tokens minted after OTP verification

pub mod jwt;

pub use jwt::{Claims, Session, SessionError, SessionIssuer, DEFAULT_SESSION_TTL_DAYS};
