// PayFusion - API Core
//
// Phone-number identities with OTP login, device trust, and a ledger for
// moving money between identities.
//
// Domains live in domains/*; storage backends in stores/; the HTTP surface in server/.

pub mod common;
pub mod config;
pub mod domains;
pub mod kernel;
pub mod server;
pub mod stores;

pub use config::*;
