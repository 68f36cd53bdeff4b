//! In-memory storage implementation for tests and local development.
//!
//! Every method takes its table lock once, so each call is atomic with respect to
//! other calls. `apply_entry` holds the identities and entries locks together,
//! always in that order.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::common::{DeviceId, IdentityId};
use crate::domains::devices::{Device, DeviceStore};
use crate::domains::identity::{DisplayFields, Identity, IdentityStore};
use crate::domains::ledger::{ApplyOutcome, EntryStatus, LedgerEntry, LedgerStore};
use crate::domains::otp::{CodeStatus, OneTimeCode, OtpStore};

/// In-memory storage for identities, codes, devices and ledger entries.
///
/// Data is lost on restart.
pub struct MemoryStore {
    identities: RwLock<HashMap<IdentityId, Identity>>,
    codes: RwLock<Vec<OneTimeCode>>,
    devices: RwLock<HashMap<String, Device>>,
    /// Insertion order
    entries: RwLock<Vec<LedgerEntry>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn read<T>(lock: &RwLock<T>) -> Result<RwLockReadGuard<'_, T>> {
    lock.read().map_err(|_| anyhow!("memory store lock poisoned"))
}

fn write<T>(lock: &RwLock<T>) -> Result<RwLockWriteGuard<'_, T>> {
    lock.write().map_err(|_| anyhow!("memory store lock poisoned"))
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            identities: RwLock::new(HashMap::new()),
            codes: RwLock::new(Vec::new()),
            devices: RwLock::new(HashMap::new()),
            entries: RwLock::new(Vec::new()),
        }
    }

    /// Sum of all balances.
    pub fn total_balance(&self) -> Result<i64> {
        Ok(read(&self.identities)?.values().map(|i| i.balance).sum())
    }

    /// Codes stored for an identity, oldest first, whatever their status.
    pub fn codes_for(&self, identity_id: IdentityId) -> Result<Vec<OneTimeCode>> {
        Ok(read(&self.codes)?
            .iter()
            .filter(|c| c.identity_id == identity_id)
            .cloned()
            .collect())
    }

    pub fn entry_count(&self) -> Result<usize> {
        Ok(read(&self.entries)?.len())
    }
}

#[async_trait]
impl IdentityStore for MemoryStore {
    async fn insert_identity(&self, identity: &Identity) -> Result<Option<Identity>> {
        let mut identities = write(&self.identities)?;
        if identities
            .values()
            .any(|existing| existing.phone_number == identity.phone_number)
        {
            return Ok(None);
        }
        identities.insert(identity.id, identity.clone());
        Ok(Some(identity.clone()))
    }

    async fn find_identity(&self, id: IdentityId) -> Result<Option<Identity>> {
        Ok(read(&self.identities)?.get(&id).cloned())
    }

    async fn find_identity_by_phone(&self, phone_number: &str) -> Result<Option<Identity>> {
        Ok(read(&self.identities)?
            .values()
            .find(|identity| identity.phone_number == phone_number)
            .cloned())
    }

    async fn mark_phone_verified(
        &self,
        id: IdentityId,
        now: DateTime<Utc>,
    ) -> Result<Option<Identity>> {
        let mut identities = write(&self.identities)?;
        Ok(identities.get_mut(&id).map(|identity| {
            identity.phone_verified = true;
            identity.onboarding_complete = identity.transaction_pin_hash.is_some();
            identity.updated_at = now;
            identity.clone()
        }))
    }

    async fn update_display_fields(
        &self,
        id: IdentityId,
        fields: &DisplayFields,
        now: DateTime<Utc>,
    ) -> Result<Option<Identity>> {
        let mut identities = write(&self.identities)?;
        Ok(identities.get_mut(&id).map(|identity| {
            identity.first_name = fields.first_name.clone();
            identity.last_name = fields.last_name.clone();
            identity.email = fields.email.clone();
            identity.updated_at = now;
            identity.clone()
        }))
    }

    async fn set_transaction_pin(
        &self,
        id: IdentityId,
        pin_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Identity>> {
        let mut identities = write(&self.identities)?;
        Ok(identities.get_mut(&id).map(|identity| {
            identity.transaction_pin_hash = Some(pin_hash.to_string());
            identity.onboarding_complete = identity.phone_verified;
            identity.updated_at = now;
            identity.clone()
        }))
    }
}

#[async_trait]
impl OtpStore for MemoryStore {
    async fn replace_active_code(&self, code: &OneTimeCode) -> Result<()> {
        let mut codes = write(&self.codes)?;
        for existing in codes
            .iter_mut()
            .filter(|c| c.identity_id == code.identity_id && c.status == CodeStatus::Active)
        {
            existing.status = CodeStatus::Superseded;
        }
        codes.push(code.clone());
        Ok(())
    }

    async fn consume_code(
        &self,
        identity_id: IdentityId,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<OneTimeCode>> {
        let mut codes = write(&self.codes)?;
        Ok(codes
            .iter_mut()
            .find(|c| c.identity_id == identity_id && c.code == code && c.is_usable_at(now))
            .map(|c| {
                c.status = CodeStatus::Consumed;
                c.consumed_at = Some(now);
                c.clone()
            }))
    }

    async fn invalidate_codes(&self, identity_id: IdentityId) -> Result<u64> {
        let mut codes = write(&self.codes)?;
        let mut affected = 0;
        for code in codes
            .iter_mut()
            .filter(|c| c.identity_id == identity_id && c.status == CodeStatus::Active)
        {
            code.status = CodeStatus::Superseded;
            affected += 1;
        }
        Ok(affected)
    }

    async fn purge_expired_codes(&self, now: DateTime<Utc>) -> Result<u64> {
        let mut codes = write(&self.codes)?;
        let before = codes.len();
        codes.retain(|c| c.expires_at >= now && c.status == CodeStatus::Active);
        Ok((before - codes.len()) as u64)
    }
}

#[async_trait]
impl DeviceStore for MemoryStore {
    async fn find_device(&self, device_identifier: &str) -> Result<Option<Device>> {
        Ok(read(&self.devices)?.get(device_identifier).cloned())
    }

    async fn insert_device(&self, device: &Device) -> Result<Option<Device>> {
        let mut devices = write(&self.devices)?;
        if devices.contains_key(&device.device_identifier) {
            return Ok(None);
        }
        devices.insert(device.device_identifier.clone(), device.clone());
        Ok(Some(device.clone()))
    }

    async fn touch_device(&self, id: DeviceId, now: DateTime<Utc>) -> Result<Option<Device>> {
        let mut devices = write(&self.devices)?;
        Ok(devices.values_mut().find(|d| d.id == id).map(|device| {
            device.last_seen_at = now;
            device.trusted = true;
            device.clone()
        }))
    }

    async fn list_devices(&self, identity_id: IdentityId) -> Result<Vec<Device>> {
        let mut devices: Vec<Device> = read(&self.devices)?
            .values()
            .filter(|d| d.identity_id == identity_id)
            .cloned()
            .collect();
        devices.sort_by(|a, b| b.last_seen_at.cmp(&a.last_seen_at).then(b.id.cmp(&a.id)));
        Ok(devices)
    }

    async fn delete_device(&self, identity_id: IdentityId, device_identifier: &str) -> Result<bool> {
        let mut devices = write(&self.devices)?;
        match devices.get(device_identifier) {
            Some(device) if device.identity_id == identity_id => {
                devices.remove(device_identifier);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[async_trait]
impl LedgerStore for MemoryStore {
    async fn account_balance(&self, id: IdentityId) -> Result<Option<i64>> {
        Ok(read(&self.identities)?.get(&id).map(|i| i.balance))
    }

    async fn apply_entry(&self, entry: &LedgerEntry) -> Result<ApplyOutcome> {
        let mut identities = write(&self.identities)?;
        let mut entries = write(&self.entries)?;

        if let Some(key) = entry.idempotency_key.as_deref() {
            let taken = entries
                .iter()
                .any(|e| e.source_id == entry.source_id && e.idempotency_key.as_deref() == Some(key));
            if taken {
                return Ok(ApplyOutcome::DuplicateKey);
            }
        }

        if entry.status == EntryStatus::Completed {
            // Check both legs before touching either balance.
            if let Some(source_id) = entry.source_id {
                match identities.get(&source_id) {
                    None => return Ok(ApplyOutcome::UnknownAccount),
                    Some(source) if source.balance < entry.amount => {
                        return Ok(ApplyOutcome::InsufficientFunds);
                    }
                    Some(_) => {}
                }
            }
            if let Some(destination_id) = entry.destination_id {
                match identities.get(&destination_id) {
                    None => return Ok(ApplyOutcome::UnknownAccount),
                    Some(destination) if destination.balance.checked_add(entry.amount).is_none() => {
                        bail!("balance overflow");
                    }
                    Some(_) => {}
                }
            }

            if let Some(source_id) = entry.source_id {
                if let Some(source) = identities.get_mut(&source_id) {
                    source.balance -= entry.amount;
                    source.updated_at = entry.created_at;
                }
            }
            if let Some(destination_id) = entry.destination_id {
                if let Some(destination) = identities.get_mut(&destination_id) {
                    destination.balance += entry.amount;
                    destination.updated_at = entry.created_at;
                }
            }
        }

        entries.push(entry.clone());
        Ok(ApplyOutcome::Applied(entry.clone()))
    }

    async fn find_entry_by_idempotency_key(
        &self,
        source_id: IdentityId,
        key: &str,
    ) -> Result<Option<LedgerEntry>> {
        Ok(read(&self.entries)?
            .iter()
            .find(|e| e.source_id == Some(source_id) && e.idempotency_key.as_deref() == Some(key))
            .cloned())
    }

    async fn entries_for(
        &self,
        identity_id: IdentityId,
        after: Option<Uuid>,
        limit: u32,
    ) -> Result<Vec<LedgerEntry>> {
        let entries = read(&self.entries)?;
        // Newest first: reverse insertion order, stable-sorted by timestamp.
        let mut mine: Vec<&LedgerEntry> = entries.iter().rev().filter(|e| e.involves(identity_id)).collect();
        mine.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let start = match after {
            Some(cursor) => match mine.iter().position(|e| e.id.into_uuid() == cursor) {
                Some(index) => index + 1,
                None => return Ok(Vec::new()),
            },
            None => 0,
        };

        Ok(mine
            .into_iter()
            .skip(start)
            .take(limit as usize)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Amount;
    use crate::domains::identity::NewIdentity;
    use crate::domains::otp::OtpPurpose;
    use chrono::Duration;

    fn identity(phone: &str) -> Identity {
        Identity::new(
            NewIdentity {
                phone_number: phone.to_string(),
                first_name: "A".to_string(),
                last_name: "B".to_string(),
                email: None,
            },
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn test_phone_numbers_are_unique() {
        let store = MemoryStore::new();
        assert!(store.insert_identity(&identity("+15550000001")).await.unwrap().is_some());
        assert!(store.insert_identity(&identity("+15550000001")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_replace_leaves_one_active_code() {
        let store = MemoryStore::new();
        let id = IdentityId::new();
        let now = Utc::now();
        for code in ["111111", "222222", "333333"] {
            let c = OneTimeCode::new(id, code.into(), OtpPurpose::Login, now, now + Duration::minutes(10));
            store.replace_active_code(&c).await.unwrap();
        }

        let codes = store.codes_for(id).unwrap();
        let active: Vec<_> = codes.iter().filter(|c| c.status == CodeStatus::Active).collect();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].code, "333333");
    }

    #[tokio::test]
    async fn test_purge_keeps_usable_codes() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let old = OneTimeCode::new(IdentityId::new(), "1".into(), OtpPurpose::Login, now, now - Duration::seconds(1));
        let fresh = OneTimeCode::new(IdentityId::new(), "2".into(), OtpPurpose::Login, now, now + Duration::minutes(5));
        store.replace_active_code(&old).await.unwrap();
        store.replace_active_code(&fresh).await.unwrap();

        assert_eq!(store.purge_expired_codes(now).await.unwrap(), 1);
        assert_eq!(store.codes_for(fresh.identity_id).unwrap().len(), 1);
    }

    fn funded_entry(id: IdentityId, v: i64) -> LedgerEntry {
        LedgerEntry::deposit(id, Amount::new(v).unwrap(), Utc::now())
    }

    #[tokio::test]
    async fn test_apply_guards_the_debit() {
        let store = MemoryStore::new();
        let a = identity("+15550000001");
        let b = identity("+15550000002");
        store.insert_identity(&a).await.unwrap();
        store.insert_identity(&b).await.unwrap();
        store.apply_entry(&funded_entry(a.id, 100)).await.unwrap();

        let too_much = LedgerEntry::transfer(a.id, b.id, Amount::new(101).unwrap(), Utc::now());
        assert!(matches!(
            store.apply_entry(&too_much).await.unwrap(),
            ApplyOutcome::InsufficientFunds
        ));
        assert_eq!(store.entry_count().unwrap(), 1);

        let all = LedgerEntry::transfer(a.id, b.id, Amount::new(100).unwrap(), Utc::now());
        assert!(matches!(store.apply_entry(&all).await.unwrap(), ApplyOutcome::Applied(_)));
        assert_eq!(store.account_balance(a.id).await.unwrap(), Some(0));
        assert_eq!(store.account_balance(b.id).await.unwrap(), Some(100));
    }

    #[tokio::test]
    async fn test_unknown_destination_leaves_source_untouched() {
        let store = MemoryStore::new();
        let a = identity("+15550000001");
        store.insert_identity(&a).await.unwrap();
        store.apply_entry(&funded_entry(a.id, 100)).await.unwrap();

        let entry = LedgerEntry::transfer(a.id, IdentityId::new(), Amount::new(40).unwrap(), Utc::now());
        assert!(matches!(
            store.apply_entry(&entry).await.unwrap(),
            ApplyOutcome::UnknownAccount
        ));
        assert_eq!(store.account_balance(a.id).await.unwrap(), Some(100));
        assert_eq!(store.entry_count().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_failed_entries_do_not_move_money() {
        let store = MemoryStore::new();
        let a = identity("+15550000001");
        store.insert_identity(&a).await.unwrap();

        let failed = funded_entry(a.id, 50).with_status(EntryStatus::Failed);
        assert!(matches!(store.apply_entry(&failed).await.unwrap(), ApplyOutcome::Applied(_)));
        assert_eq!(store.account_balance(a.id).await.unwrap(), Some(0));
        assert_eq!(store.entry_count().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_idempotency_key_is_scoped_to_source() {
        let store = MemoryStore::new();
        let (a, b, c) = (identity("+15550000001"), identity("+15550000002"), identity("+15550000003"));
        for who in [&a, &b, &c] {
            store.insert_identity(who).await.unwrap();
            store.apply_entry(&funded_entry(who.id, 100)).await.unwrap();
        }
        let amount = Amount::new(5).unwrap();
        let key = Some("k".to_string());

        let first = LedgerEntry::transfer(a.id, b.id, amount, Utc::now()).with_idempotency_key(key.clone());
        let same_source = LedgerEntry::transfer(a.id, c.id, amount, Utc::now()).with_idempotency_key(key.clone());
        let other_source = LedgerEntry::transfer(c.id, b.id, amount, Utc::now()).with_idempotency_key(key);

        assert!(matches!(store.apply_entry(&first).await.unwrap(), ApplyOutcome::Applied(_)));
        assert!(matches!(
            store.apply_entry(&same_source).await.unwrap(),
            ApplyOutcome::DuplicateKey
        ));
        assert!(matches!(store.apply_entry(&other_source).await.unwrap(), ApplyOutcome::Applied(_)));
        assert_eq!(store.account_balance(a.id).await.unwrap(), Some(95));
        assert_eq!(store.account_balance(c.id).await.unwrap(), Some(100));
    }
}
