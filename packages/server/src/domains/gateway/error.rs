use crate::domains::auth::SessionError;
use crate::domains::devices::DeviceError;
use crate::domains::ledger::LedgerError;
use crate::domains::otp::OtpError;

/// Every outcome the orchestration root can report to the boundary.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    NotFound(&'static str),
    #[error("phone number is already registered")]
    AlreadyRegistered,
    #[error("invalid or expired code")]
    InvalidOrExpired,
    #[error("device is bound to another account")]
    DeviceConflict,
    #[error("verification failed")]
    Rejected,
    #[error("this device is not trusted for money movement")]
    DeviceNotTrusted,
    #[error("transaction PIN has not been set")]
    PinNotSet,
    #[error("insufficient funds")]
    InsufficientFunds,
    #[error("request conflicts with an earlier one")]
    Conflict,
    #[error("transfer failed and was rolled back")]
    TransferFailed,
    #[error("unauthorized")]
    Unauthorized,
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

impl GatewayError {
    pub fn validation(message: impl Into<String>) -> Self {
        GatewayError::Validation(message.into())
    }
}

impl From<OtpError> for GatewayError {
    fn from(err: OtpError) -> Self {
        match err {
            OtpError::InvalidOrExpired => GatewayError::InvalidOrExpired,
            OtpError::Store(e) => GatewayError::Store(e),
        }
    }
}

impl From<DeviceError> for GatewayError {
    fn from(err: DeviceError) -> Self {
        match err {
            DeviceError::DeviceConflict => GatewayError::DeviceConflict,
            DeviceError::Rejected => GatewayError::Rejected,
            DeviceError::NotFound => GatewayError::NotFound("Device not found"),
            DeviceError::Store(e) => GatewayError::Store(e),
        }
    }
}

impl From<LedgerError> for GatewayError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::SameAccount => GatewayError::validation("Cannot send money to yourself"),
            LedgerError::NotFound => GatewayError::NotFound("Account not found"),
            LedgerError::InsufficientFunds => GatewayError::InsufficientFunds,
            LedgerError::Conflict => GatewayError::Conflict,
            LedgerError::Failed => GatewayError::TransferFailed,
            LedgerError::InvalidPage(message) => GatewayError::validation(message),
            LedgerError::Store(e) => GatewayError::Store(e),
        }
    }
}

impl From<SessionError> for GatewayError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::Invalid => GatewayError::Unauthorized,
            SessionError::Signing(e) => GatewayError::Store(e.into()),
        }
    }
}
