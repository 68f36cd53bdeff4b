use std::sync::Arc;

use tracing::{info, warn};

use super::error::GatewayError;
use super::types::{
    DepositInput, DeviceContext, DeviceStatus, OtpChallenge, ProfileUpdate, Receipt,
    RegisterInput, TransferInput, VerifiedLogin, WithdrawInput,
};
use crate::common::{mask_phone_number, normalize_phone_number, Amount, IdentityId, Page, PageRequest};
use crate::domains::auth::SessionIssuer;
use crate::domains::devices::{
    is_valid_device_identifier, ChangeProof, Device, DeviceError, DeviceRegistry, Recognition,
};
use crate::domains::identity::{
    hash_transaction_pin, is_valid_pin_format, verify_transaction_pin, DisplayFields, Identity,
    IdentityStore, NewIdentity,
};
use crate::domains::ledger::{
    DepositRequest, LedgerEngine, LedgerEntry, TransferRequest, WithdrawalRequest,
};
use crate::domains::otp::{OtpPurpose, OtpService};
use crate::kernel::BaseClock;

const MAX_NAME_LEN: usize = 100;
const MAX_MEMO_LEN: usize = 140;
const MAX_LABEL_LEN: usize = 64;

/// Orchestration root: register, login, verify, device trust and money movement.
///
/// Owns no storage of its own; every mutation goes through the component that owns it.
pub struct IdentityGateway {
    identities: Arc<dyn IdentityStore>,
    otp: OtpService,
    devices: DeviceRegistry,
    sessions: SessionIssuer,
    ledger: LedgerEngine,
    clock: Arc<dyn BaseClock>,
}

impl IdentityGateway {
    pub fn new(
        identities: Arc<dyn IdentityStore>,
        otp: OtpService,
        devices: DeviceRegistry,
        sessions: SessionIssuer,
        ledger: LedgerEngine,
        clock: Arc<dyn BaseClock>,
    ) -> Self {
        Self {
            identities,
            otp,
            devices,
            sessions,
            ledger,
            clock,
        }
    }

    pub fn otp(&self) -> &OtpService {
        &self.otp
    }

    pub fn ledger(&self) -> &LedgerEngine {
        &self.ledger
    }

    // =========================================================================
    // Authentication
    // =========================================================================

    /// Create an identity and text it a verification code.
    pub async fn register(&self, input: RegisterInput) -> Result<OtpChallenge, GatewayError> {
        let phone_number = normalize_phone(&input.phone_number)?;
        let first_name = required_text(&input.first_name, "First name", MAX_NAME_LEN)?;
        let last_name = required_text(&input.last_name, "Last name", MAX_NAME_LEN)?;
        let email = optional_email(input.email.as_deref())?;
        if let Some(pin) = input.transaction_pin.as_deref() {
            if !is_valid_pin_format(pin) {
                return Err(GatewayError::validation("Transaction PIN must be 4 to 6 digits"));
            }
        }

        let mut identity = Identity::new(
            NewIdentity {
                phone_number,
                first_name,
                last_name,
                email,
            },
            self.clock.now(),
        );
        if let Some(pin) = input.transaction_pin.as_deref() {
            identity.transaction_pin_hash = Some(hash_transaction_pin(identity.id, pin));
        }

        let identity = self
            .identities
            .insert_identity(&identity)
            .await?
            .ok_or(GatewayError::AlreadyRegistered)?;
        info!(
            identity_id = %identity.id,
            phone = %mask_phone_number(&identity.phone_number),
            "identity registered"
        );

        self.challenge(&identity, OtpPurpose::Registration).await
    }

    /// Text a login code to an existing identity.
    pub async fn login(&self, phone_number: &str) -> Result<OtpChallenge, GatewayError> {
        let identity = self.active_identity_by_phone(phone_number).await?;
        self.challenge(&identity, OtpPurpose::Login).await
    }

    /// Replace the identity's outstanding code with a fresh one.
    pub async fn resend_otp(&self, phone_number: &str) -> Result<OtpChallenge, GatewayError> {
        let identity = self.active_identity_by_phone(phone_number).await?;
        let issued = self.otp.resend(&identity).await?;
        Ok(OtpChallenge {
            identity_id: identity.id,
            expires_at: issued.expires_at,
            delivery: issued.delivery,
        })
    }

    /// Consume the code, mint a session and recognize the presenting device.
    ///
    /// A device bound to another identity does not fail the login; it is reported as
    /// untrusted and cannot move money.
    pub async fn verify_otp(
        &self,
        phone_number: &str,
        code: &str,
        device: DeviceContext,
    ) -> Result<VerifiedLogin, GatewayError> {
        validate_device_identifier(&device.identifier)?;
        let phone_number = normalize_phone_number(phone_number).ok_or(GatewayError::InvalidOrExpired)?;
        let identity = self
            .identities
            .find_identity_by_phone(&phone_number)
            .await?
            .ok_or(GatewayError::InvalidOrExpired)?;

        self.otp.verify(identity.id, code).await?;

        let identity = self
            .identities
            .mark_phone_verified(identity.id, self.clock.now())
            .await?
            .ok_or(GatewayError::NotFound("Account not found"))?;
        let session = self.sessions.issue(identity.id)?;

        let recognition = self
            .devices
            .recognize(identity.id, &device.identifier, device.class)
            .await;
        let device = match recognition {
            Ok(Recognition::Trusted(d)) => device_status(&d, false),
            Ok(Recognition::Registered(d)) => device_status(&d, true),
            Err(DeviceError::DeviceConflict) => {
                warn!(identity_id = %identity.id, "login from a device bound to another account");
                DeviceStatus {
                    device_identifier: device.identifier,
                    trusted: false,
                    newly_registered: false,
                }
            }
            Err(e) => return Err(e.into()),
        };

        info!(identity_id = %identity.id, device_trusted = device.trusted, "login verified");
        Ok(VerifiedLogin {
            session,
            identity,
            device,
        })
    }

    /// Identity behind a session token.
    pub fn authenticate(&self, token: &str) -> Result<IdentityId, GatewayError> {
        Ok(self.sessions.validate(token)?)
    }

    // =========================================================================
    // Profile, PIN and devices
    // =========================================================================

    pub async fn profile(&self, identity_id: IdentityId) -> Result<Identity, GatewayError> {
        self.identities
            .find_identity(identity_id)
            .await?
            .ok_or(GatewayError::NotFound("Account not found"))
    }

    /// Change names and email. Fields left out keep their current value.
    pub async fn update_profile(
        &self,
        identity_id: IdentityId,
        update: ProfileUpdate,
    ) -> Result<Identity, GatewayError> {
        let first_name = optional_text(update.first_name.as_deref(), "First name", MAX_NAME_LEN)?;
        let last_name = optional_text(update.last_name.as_deref(), "Last name", MAX_NAME_LEN)?;
        let email = optional_email(update.email.as_deref())?;

        let identity = self.profile(identity_id).await?;
        let current = identity.display_fields();
        let fields = DisplayFields {
            first_name: first_name.unwrap_or_else(|| current.first_name.clone()),
            last_name: last_name.unwrap_or_else(|| current.last_name.clone()),
            email: email.or_else(|| current.email.clone()),
        };
        if fields == current {
            return Ok(identity);
        }

        let updated = self
            .identities
            .update_display_fields(identity.id, &fields, self.clock.now())
            .await?
            .ok_or(GatewayError::NotFound("Account not found"))?;
        info!(identity_id = %identity_id, "profile updated");
        Ok(updated)
    }

    /// Set the transaction PIN. Replacing an existing PIN requires the current one.
    pub async fn set_transaction_pin(
        &self,
        identity_id: IdentityId,
        pin: &str,
        current_pin: Option<&str>,
    ) -> Result<Identity, GatewayError> {
        if !is_valid_pin_format(pin) {
            return Err(GatewayError::validation("Transaction PIN must be 4 to 6 digits"));
        }

        let identity = self.profile(identity_id).await?;
        if let Some(stored) = identity.transaction_pin_hash.as_deref() {
            let confirmed = current_pin
                .is_some_and(|current| verify_transaction_pin(identity.id, current, stored));
            if !confirmed {
                return Err(GatewayError::Rejected);
            }
        }

        let updated = self
            .identities
            .set_transaction_pin(identity.id, &hash_transaction_pin(identity.id, pin), self.clock.now())
            .await?
            .ok_or(GatewayError::NotFound("Account not found"))?;
        info!(identity_id = %identity_id, "transaction PIN set");
        Ok(updated)
    }

    /// Trust a new device for the identity after account + PIN step-up.
    pub async fn request_device_change(
        &self,
        identity_id: IdentityId,
        device: DeviceContext,
        proof: ChangeProof,
    ) -> Result<Device, GatewayError> {
        validate_device_identifier(&device.identifier)?;
        Ok(self
            .devices
            .request_change(identity_id, &device.identifier, device.class, &proof)
            .await?)
    }

    pub async fn list_devices(&self, identity_id: IdentityId) -> Result<Vec<Device>, GatewayError> {
        Ok(self.devices.list(identity_id).await?)
    }

    pub async fn remove_device(
        &self,
        identity_id: IdentityId,
        device_identifier: &str,
    ) -> Result<(), GatewayError> {
        Ok(self.devices.remove(identity_id, device_identifier).await?)
    }

    // =========================================================================
    // Money movement
    // =========================================================================

    /// Send money to the identity registered under `recipient_phone`.
    ///
    /// Requires a device trusted for the sender and the sender's transaction PIN.
    pub async fn transfer(
        &self,
        identity_id: IdentityId,
        device_identifier: &str,
        input: TransferInput,
    ) -> Result<Receipt, GatewayError> {
        let amount = parse_amount(input.amount)?;
        let memo = optional_text(input.description.as_deref(), "Description", MAX_MEMO_LEN)?;
        let idempotency_key =
            optional_text(input.idempotency_key.as_deref(), "Idempotency key", MAX_LABEL_LEN)?;
        let recipient_phone = normalize_phone(&input.recipient_phone)?;

        let sender = self.authorize_debit(identity_id, device_identifier, &input.transaction_pin).await?;

        let recipient = self
            .identities
            .find_identity_by_phone(&recipient_phone)
            .await?
            .filter(Identity::is_active)
            .ok_or(GatewayError::NotFound("Recipient not found"))?;

        let entry = self
            .ledger
            .transfer(TransferRequest {
                source_id: sender.id,
                destination_id: recipient.id,
                amount,
                memo,
                idempotency_key,
            })
            .await?;
        self.receipt(sender.id, entry).await
    }

    /// Credit the caller's balance from an outside source.
    pub async fn deposit(
        &self,
        identity_id: IdentityId,
        input: DepositInput,
    ) -> Result<Receipt, GatewayError> {
        let amount = parse_amount(input.amount)?;
        let source_label = required_text(&input.source, "Source", MAX_LABEL_LEN)?;
        let reference = optional_text(input.reference.as_deref(), "Reference", MAX_LABEL_LEN)?;

        let entry = self
            .ledger
            .deposit(DepositRequest {
                destination_id: identity_id,
                amount,
                source_label,
                reference,
            })
            .await?;
        self.receipt(identity_id, entry).await
    }

    /// Pay out of the caller's balance. Same device and PIN checks as a transfer.
    pub async fn withdraw(
        &self,
        identity_id: IdentityId,
        device_identifier: &str,
        input: WithdrawInput,
    ) -> Result<Receipt, GatewayError> {
        let amount = parse_amount(input.amount)?;
        let memo = optional_text(input.description.as_deref(), "Description", MAX_MEMO_LEN)?;
        let source = self.authorize_debit(identity_id, device_identifier, &input.transaction_pin).await?;

        let entry = self
            .ledger
            .withdraw(WithdrawalRequest {
                source_id: source.id,
                amount,
                memo,
            })
            .await?;
        self.receipt(source.id, entry).await
    }

    pub async fn history(
        &self,
        identity_id: IdentityId,
        page: &PageRequest,
    ) -> Result<Page<LedgerEntry>, GatewayError> {
        Ok(self.ledger.history(identity_id, page).await?)
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    async fn challenge(
        &self,
        identity: &Identity,
        purpose: OtpPurpose,
    ) -> Result<OtpChallenge, GatewayError> {
        let issued = self.otp.issue(identity, purpose).await?;
        Ok(OtpChallenge {
            identity_id: identity.id,
            expires_at: issued.expires_at,
            delivery: issued.delivery,
        })
    }

    async fn active_identity_by_phone(&self, phone_number: &str) -> Result<Identity, GatewayError> {
        let phone_number = normalize_phone(phone_number)?;
        self.identities
            .find_identity_by_phone(&phone_number)
            .await?
            .filter(Identity::is_active)
            .ok_or(GatewayError::NotFound("Account not found"))
    }

    async fn authorize_debit(
        &self,
        identity_id: IdentityId,
        device_identifier: &str,
        pin: &str,
    ) -> Result<Identity, GatewayError> {
        let identity = self.profile(identity_id).await?;
        if !identity.is_active() {
            return Err(GatewayError::Unauthorized);
        }
        if !self.devices.is_trusted(identity.id, device_identifier).await? {
            warn!(identity_id = %identity.id, "money movement from untrusted device refused");
            return Err(GatewayError::DeviceNotTrusted);
        }
        let stored = identity
            .transaction_pin_hash
            .as_deref()
            .ok_or(GatewayError::PinNotSet)?;
        if !verify_transaction_pin(identity.id, pin, stored) {
            return Err(GatewayError::Rejected);
        }
        Ok(identity)
    }

    async fn receipt(&self, identity_id: IdentityId, entry: LedgerEntry) -> Result<Receipt, GatewayError> {
        let balance = self.ledger.balance(identity_id).await?;
        Ok(Receipt {
            transaction: entry,
            balance,
        })
    }
}

fn device_status(device: &Device, newly_registered: bool) -> DeviceStatus {
    DeviceStatus {
        device_identifier: device.device_identifier.clone(),
        trusted: device.trusted,
        newly_registered,
    }
}

fn normalize_phone(raw: &str) -> Result<String, GatewayError> {
    normalize_phone_number(raw).ok_or_else(|| GatewayError::validation("Phone number is invalid"))
}

fn parse_amount(minor_units: i64) -> Result<Amount, GatewayError> {
    Amount::new(minor_units).map_err(|e| GatewayError::validation(e.to_string()))
}

fn validate_device_identifier(identifier: &str) -> Result<(), GatewayError> {
    if is_valid_device_identifier(identifier) {
        Ok(())
    } else {
        Err(GatewayError::validation("Device identifier is invalid"))
    }
}

fn required_text(value: &str, field: &str, max_len: usize) -> Result<String, GatewayError> {
    match optional_text(Some(value), field, max_len)? {
        Some(text) => Ok(text),
        None => Err(GatewayError::validation(format!("{field} is required"))),
    }
}

fn optional_text(value: Option<&str>, field: &str, max_len: usize) -> Result<Option<String>, GatewayError> {
    let Some(text) = value.map(str::trim).filter(|v| !v.is_empty()) else {
        return Ok(None);
    };
    if text.chars().count() > max_len {
        return Err(GatewayError::validation(format!(
            "{field} must be at most {max_len} characters"
        )));
    }
    Ok(Some(text.to_string()))
}

fn optional_email(value: Option<&str>) -> Result<Option<String>, GatewayError> {
    match value.map(str::trim).filter(|e| !e.is_empty()) {
        Some(email) if is_plausible_email(email) => Ok(Some(email.to_string())),
        Some(_) => Err(GatewayError::validation("Email address is invalid")),
        None => Ok(None),
    }
}

fn is_plausible_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !domain.starts_with('.'),
        None => false,
    }
}
