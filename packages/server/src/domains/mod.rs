// Business domains
pub mod auth;
pub mod devices;
pub mod gateway;
pub mod identity;
pub mod ledger;
pub mod otp;
