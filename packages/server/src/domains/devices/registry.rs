use std::sync::Arc;

use tracing::{info, warn};

use super::models::{Device, DeviceClass};
use super::store::DeviceStore;
use crate::common::{normalize_phone_number, IdentityId};
use crate::domains::identity::{verify_transaction_pin, IdentityStore};
use crate::kernel::BaseClock;

#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    #[error("device is bound to another account")]
    DeviceConflict,
    /// Account or PIN did not match. Which one is not reported.
    #[error("device change rejected")]
    Rejected,
    #[error("device not found")]
    NotFound,
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

/// Outcome of presenting a device after a successful code verification.
#[derive(Debug, Clone)]
pub enum Recognition {
    /// Already bound to this identity; last-seen refreshed.
    Trusted(Device),
    /// First time seen; bound and trusted now.
    Registered(Device),
}

impl Recognition {
    pub fn device(&self) -> &Device {
        match self {
            Recognition::Trusted(device) | Recognition::Registered(device) => device,
        }
    }
}

/// Step-up proof for trusting a new device.
#[derive(Debug, Clone)]
pub struct ChangeProof {
    /// Identity id or phone number of the account
    pub account: String,
    pub transaction_pin: String,
}

/// Which device identifiers may act for which identity.
pub struct DeviceRegistry {
    devices: Arc<dyn DeviceStore>,
    identities: Arc<dyn IdentityStore>,
    clock: Arc<dyn BaseClock>,
}

impl DeviceRegistry {
    pub fn new(
        devices: Arc<dyn DeviceStore>,
        identities: Arc<dyn IdentityStore>,
        clock: Arc<dyn BaseClock>,
    ) -> Self {
        Self {
            devices,
            identities,
            clock,
        }
    }

    /// Refresh a known binding, bind an unknown identifier, or refuse one owned by
    /// another identity.
    pub async fn recognize(
        &self,
        identity_id: IdentityId,
        device_identifier: &str,
        device_class: DeviceClass,
    ) -> Result<Recognition, DeviceError> {
        let now = self.clock.now();

        if let Some(existing) = self.devices.find_device(device_identifier).await? {
            return self.refresh_owned(identity_id, existing).await.map(Recognition::Trusted);
        }

        let device = Device::trusted(identity_id, device_identifier.to_string(), device_class, now);
        match self.devices.insert_device(&device).await? {
            Some(inserted) => {
                info!(identity_id = %identity_id, device_class = %device_class, "device registered");
                Ok(Recognition::Registered(inserted))
            }
            // Lost an insert race; whoever won decides.
            None => match self.devices.find_device(device_identifier).await? {
                Some(existing) => self
                    .refresh_owned(identity_id, existing)
                    .await
                    .map(Recognition::Trusted),
                None => Err(anyhow::anyhow!("device binding vanished during insert").into()),
            },
        }
    }

    /// Trust a new device after checking the account and transaction PIN.
    ///
    /// No approval window: on a matching proof the device is trusted immediately.
    pub async fn request_change(
        &self,
        identity_id: IdentityId,
        device_identifier: &str,
        device_class: DeviceClass,
        proof: &ChangeProof,
    ) -> Result<Device, DeviceError> {
        let identity = self
            .identities
            .find_identity(identity_id)
            .await?
            .ok_or(DeviceError::Rejected)?;

        let account_matches = match IdentityId::parse(proof.account.trim()) {
            Ok(id) => id == identity.id,
            Err(_) => normalize_phone_number(&proof.account)
                .is_some_and(|phone| phone == identity.phone_number),
        };
        let pin_matches = identity
            .transaction_pin_hash
            .as_deref()
            .is_some_and(|stored| verify_transaction_pin(identity.id, &proof.transaction_pin, stored));

        if !(account_matches && pin_matches) {
            warn!(identity_id = %identity_id, "device change rejected");
            return Err(DeviceError::Rejected);
        }

        let recognition = self.recognize(identity_id, device_identifier, device_class).await?;
        info!(identity_id = %identity_id, "device trusted after step-up");
        Ok(recognition.device().clone())
    }

    /// Most recently seen first.
    pub async fn list(&self, identity_id: IdentityId) -> Result<Vec<Device>, DeviceError> {
        Ok(self.devices.list_devices(identity_id).await?)
    }

    pub async fn is_trusted(
        &self,
        identity_id: IdentityId,
        device_identifier: &str,
    ) -> Result<bool, DeviceError> {
        Ok(self
            .devices
            .find_device(device_identifier)
            .await?
            .is_some_and(|device| device.identity_id == identity_id && device.trusted))
    }

    pub async fn remove(
        &self,
        identity_id: IdentityId,
        device_identifier: &str,
    ) -> Result<(), DeviceError> {
        if self.devices.delete_device(identity_id, device_identifier).await? {
            info!(identity_id = %identity_id, "device removed");
            Ok(())
        } else {
            Err(DeviceError::NotFound)
        }
    }

    async fn refresh_owned(
        &self,
        identity_id: IdentityId,
        existing: Device,
    ) -> Result<Device, DeviceError> {
        if existing.identity_id != identity_id {
            warn!(identity_id = %identity_id, "device identifier bound to another identity");
            return Err(DeviceError::DeviceConflict);
        }
        self.devices
            .touch_device(existing.id, self.clock.now())
            .await?
            .ok_or(DeviceError::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    use crate::domains::identity::{hash_transaction_pin, Identity, NewIdentity};
    use crate::kernel::test_dependencies::ManualClock;
    use crate::stores::MemoryStore;

    struct Fixture {
        store: Arc<MemoryStore>,
        clock: Arc<ManualClock>,
        registry: DeviceRegistry,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::default());
        let registry = DeviceRegistry::new(store.clone(), store.clone(), clock.clone());
        Fixture {
            store,
            clock,
            registry,
        }
    }

    async fn identity_with_pin(f: &Fixture, phone: &str, pin: &str) -> Identity {
        let identity = Identity::new(
            NewIdentity {
                phone_number: phone.to_string(),
                first_name: "Test".to_string(),
                last_name: "User".to_string(),
                email: None,
            },
            f.clock.now(),
        );
        f.store.insert_identity(&identity).await.unwrap().unwrap();
        f.store
            .set_transaction_pin(identity.id, &hash_transaction_pin(identity.id, pin), f.clock.now())
            .await
            .unwrap()
            .unwrap()
    }

    #[tokio::test]
    async fn test_first_sight_registers_then_trusts() {
        let f = fixture();
        let identity = identity_with_pin(&f, "+15550000001", "1234").await;

        let first = f.registry.recognize(identity.id, "dev-a", DeviceClass::Ios).await.unwrap();
        assert!(matches!(first, Recognition::Registered(_)));

        f.clock.advance(Duration::minutes(5));
        let second = f.registry.recognize(identity.id, "dev-a", DeviceClass::Ios).await.unwrap();
        match second {
            Recognition::Trusted(device) => assert_eq!(device.last_seen_at, f.clock.now()),
            other => panic!("expected Trusted, got {other:?}"),
        }
        assert!(f.registry.is_trusted(identity.id, "dev-a").await.unwrap());
    }

    #[tokio::test]
    async fn test_identifier_of_another_identity_conflicts() {
        let f = fixture();
        let x = identity_with_pin(&f, "+15550000001", "1234").await;
        let y = identity_with_pin(&f, "+15550000002", "5678").await;

        f.registry.recognize(x.id, "shared", DeviceClass::Mobile).await.unwrap();
        let err = f.registry.recognize(y.id, "shared", DeviceClass::Mobile).await.unwrap_err();
        assert!(matches!(err, DeviceError::DeviceConflict));
        assert!(!f.registry.is_trusted(y.id, "shared").await.unwrap());
    }

    #[tokio::test]
    async fn test_request_change_wrong_pin_is_rejected() {
        let f = fixture();
        let identity = identity_with_pin(&f, "+15550000001", "1234").await;
        let proof = ChangeProof {
            account: "+1 555 000 0001".to_string(),
            transaction_pin: "9999".to_string(),
        };

        let err = f
            .registry
            .request_change(identity.id, "new-phone", DeviceClass::Android, &proof)
            .await
            .unwrap_err();
        assert!(matches!(err, DeviceError::Rejected));
        assert!(f.registry.list(identity.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_request_change_wrong_account_is_rejected() {
        let f = fixture();
        let identity = identity_with_pin(&f, "+15550000001", "1234").await;
        let proof = ChangeProof {
            account: "+15550000009".to_string(),
            transaction_pin: "1234".to_string(),
        };

        let err = f
            .registry
            .request_change(identity.id, "new-phone", DeviceClass::Android, &proof)
            .await
            .unwrap_err();
        assert!(matches!(err, DeviceError::Rejected));
    }

    #[tokio::test]
    async fn test_request_change_correct_pin_lists_new_device_first() {
        let f = fixture();
        let identity = identity_with_pin(&f, "+15550000001", "1234").await;
        f.registry.recognize(identity.id, "old-laptop", DeviceClass::Desktop).await.unwrap();

        f.clock.advance(Duration::hours(1));
        let proof = ChangeProof {
            account: identity.id.to_string(),
            transaction_pin: "1234".to_string(),
        };
        let device = f
            .registry
            .request_change(identity.id, "new-phone", DeviceClass::Android, &proof)
            .await
            .unwrap();
        assert!(device.trusted);

        let devices = f.registry.list(identity.id).await.unwrap();
        assert_eq!(devices.len(), 2);
        assert_eq!(devices[0].device_identifier, "new-phone");
    }

    #[tokio::test]
    async fn test_remove_only_own_devices() {
        let f = fixture();
        let x = identity_with_pin(&f, "+15550000001", "1234").await;
        let y = identity_with_pin(&f, "+15550000002", "5678").await;
        f.registry.recognize(x.id, "dev-x", DeviceClass::Ios).await.unwrap();

        assert!(matches!(
            f.registry.remove(y.id, "dev-x").await,
            Err(DeviceError::NotFound)
        ));
        f.registry.remove(x.id, "dev-x").await.unwrap();
        assert!(!f.registry.is_trusted(x.id, "dev-x").await.unwrap());
    }
}
