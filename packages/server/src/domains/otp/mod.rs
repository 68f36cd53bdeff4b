//! One-time codes sent by SMS to prove control of a phone number.

pub mod code;
pub mod models;
pub mod service;
pub mod store;

pub use models::{CodeStatus, OneTimeCode, OtpPurpose};
pub use service::{Delivery, IssuedCode, OtpError, OtpPolicy, OtpService};
pub use store::OtpStore;
