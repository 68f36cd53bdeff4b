//! Gateway - composes OTP, device trust, sessions and the ledger into use cases

pub mod error;
pub mod service;
pub mod types;

pub use error::GatewayError;
pub use service::IdentityGateway;
pub use types::{
    DepositInput, DeviceContext, DeviceStatus, OtpChallenge, ProfileUpdate, Receipt,
    RegisterInput, TransferInput, VerifiedLogin, WithdrawInput,
};
