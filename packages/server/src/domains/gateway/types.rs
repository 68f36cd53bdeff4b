use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::common::IdentityId;
use crate::domains::auth::Session;
use crate::domains::devices::DeviceClass;
use crate::domains::identity::Identity;
use crate::domains::ledger::LedgerEntry;
use crate::domains::otp::Delivery;

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterInput {
    pub phone_number: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub transaction_pin: Option<String>,
}

/// Profile edit. Absent or blank fields keep their current value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileUpdate {
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

/// The device a request comes from, as derived by the boundary.
#[derive(Debug, Clone)]
pub struct DeviceContext {
    pub identifier: String,
    pub class: DeviceClass,
}

/// A code was issued; the code itself never leaves the server except by SMS.
#[derive(Debug, Clone, Serialize)]
pub struct OtpChallenge {
    pub identity_id: IdentityId,
    pub expires_at: DateTime<Utc>,
    pub delivery: Delivery,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeviceStatus {
    pub device_identifier: String,
    pub trusted: bool,
    pub newly_registered: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct VerifiedLogin {
    pub session: Session,
    pub identity: Identity,
    pub device: DeviceStatus,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransferInput {
    pub recipient_phone: String,
    pub amount: i64,
    pub transaction_pin: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub idempotency_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DepositInput {
    pub amount: i64,
    pub source: String,
    #[serde(default)]
    pub reference: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WithdrawInput {
    pub amount: i64,
    pub transaction_pin: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// A completed movement plus the caller's balance afterwards.
#[derive(Debug, Clone, Serialize)]
pub struct Receipt {
    pub transaction: LedgerEntry,
    pub balance: i64,
}
