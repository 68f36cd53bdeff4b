//! Test fixtures for creating test data.
//!
//! These go through the gateway, the same path a client takes.

use payfusion_core::common::IdentityId;
use payfusion_core::domains::devices::DeviceClass;
use payfusion_core::domains::gateway::{DepositInput, DeviceContext, RegisterInput, VerifiedLogin};

use super::TestHarness;

/// A registered, verified identity signed in from a trusted device.
#[derive(Debug, Clone)]
pub struct SignedIn {
    pub identity_id: IdentityId,
    pub phone_number: String,
    pub token: String,
    pub device_identifier: String,
}

pub fn device(identifier: &str) -> DeviceContext {
    DeviceContext {
        identifier: identifier.to_string(),
        class: DeviceClass::Mobile,
    }
}

pub fn register_input(phone_number: &str, pin: Option<&str>) -> RegisterInput {
    RegisterInput {
        phone_number: phone_number.to_string(),
        first_name: "Test".to_string(),
        last_name: "User".to_string(),
        email: None,
        transaction_pin: pin.map(str::to_string),
    }
}

impl TestHarness {
    /// Code most recently texted to `phone_number`.
    pub fn last_code(&self, phone_number: &str) -> String {
        self.notifier
            .last_code_for(phone_number)
            .expect("no code was sent to this number")
    }

    /// Register with a PIN, verify the code from `device_identifier`.
    pub async fn verified_identity(
        &self,
        phone_number: &str,
        pin: &str,
        device_identifier: &str,
    ) -> SignedIn {
        self.gateway()
            .register(register_input(phone_number, Some(pin)))
            .await
            .expect("register failed");
        let code = self.last_code(phone_number);
        let login = self.verify(phone_number, &code, device_identifier).await;

        SignedIn {
            identity_id: login.identity.id,
            phone_number: phone_number.to_string(),
            token: login.session.token,
            device_identifier: device_identifier.to_string(),
        }
    }

    pub async fn verify(&self, phone_number: &str, code: &str, device_identifier: &str) -> VerifiedLogin {
        self.gateway()
            .verify_otp(phone_number, code, device(device_identifier))
            .await
            .expect("verify failed")
    }

    /// Credit an identity from outside the system.
    pub async fn fund(&self, identity_id: IdentityId, amount: i64) {
        self.gateway()
            .deposit(
                identity_id,
                DepositInput {
                    amount,
                    source: "Test Bank".to_string(),
                    reference: None,
                },
            )
            .await
            .expect("deposit failed");
    }

    pub async fn balance(&self, identity_id: IdentityId) -> i64 {
        self.gateway()
            .ledger()
            .balance(identity_id)
            .await
            .expect("balance lookup failed")
    }
}
