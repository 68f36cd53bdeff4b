//! PostgreSQL storage implementation.
//!
//! Thin delegation to the model queries. Ledger entries are applied in one database
//! transaction, and the guarded debit and the partial unique index on active codes
//! keep the invariants even across several server processes.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::common::{DeviceId, IdentityId};
use crate::domains::devices::{Device, DeviceStore};
use crate::domains::identity::{DisplayFields, Identity, IdentityStore};
use crate::domains::ledger::{AccountBalance, ApplyOutcome, LedgerEntry, LedgerStore};
use crate::domains::otp::{OneTimeCode, OtpStore};

#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Round-trip to the database.
    pub async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl IdentityStore for PostgresStore {
    async fn insert_identity(&self, identity: &Identity) -> Result<Option<Identity>> {
        identity.insert(&self.pool).await
    }

    async fn find_identity(&self, id: IdentityId) -> Result<Option<Identity>> {
        Identity::find_by_id(id, &self.pool).await
    }

    async fn find_identity_by_phone(&self, phone_number: &str) -> Result<Option<Identity>> {
        Identity::find_by_phone(phone_number, &self.pool).await
    }

    async fn mark_phone_verified(
        &self,
        id: IdentityId,
        now: DateTime<Utc>,
    ) -> Result<Option<Identity>> {
        Identity::mark_phone_verified(id, now, &self.pool).await
    }

    async fn update_display_fields(
        &self,
        id: IdentityId,
        fields: &DisplayFields,
        now: DateTime<Utc>,
    ) -> Result<Option<Identity>> {
        Identity::update_display_fields(id, fields, now, &self.pool).await
    }

    async fn set_transaction_pin(
        &self,
        id: IdentityId,
        pin_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Identity>> {
        Identity::set_transaction_pin(id, pin_hash, now, &self.pool).await
    }
}

#[async_trait]
impl OtpStore for PostgresStore {
    async fn replace_active_code(&self, code: &OneTimeCode) -> Result<()> {
        code.replace_active(&self.pool).await
    }

    async fn consume_code(
        &self,
        identity_id: IdentityId,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<OneTimeCode>> {
        OneTimeCode::consume(identity_id, code, now, &self.pool).await
    }

    async fn invalidate_codes(&self, identity_id: IdentityId) -> Result<u64> {
        OneTimeCode::invalidate_active(identity_id, &self.pool).await
    }

    async fn purge_expired_codes(&self, now: DateTime<Utc>) -> Result<u64> {
        OneTimeCode::purge_expired(now, &self.pool).await
    }
}

#[async_trait]
impl DeviceStore for PostgresStore {
    async fn find_device(&self, device_identifier: &str) -> Result<Option<Device>> {
        Device::find_by_identifier(device_identifier, &self.pool).await
    }

    async fn insert_device(&self, device: &Device) -> Result<Option<Device>> {
        device.insert(&self.pool).await
    }

    async fn touch_device(&self, id: DeviceId, now: DateTime<Utc>) -> Result<Option<Device>> {
        Device::touch(id, now, &self.pool).await
    }

    async fn list_devices(&self, identity_id: IdentityId) -> Result<Vec<Device>> {
        Device::find_for_identity(identity_id, &self.pool).await
    }

    async fn delete_device(&self, identity_id: IdentityId, device_identifier: &str) -> Result<bool> {
        Device::delete(identity_id, device_identifier, &self.pool).await
    }
}

#[async_trait]
impl LedgerStore for PostgresStore {
    async fn account_balance(&self, id: IdentityId) -> Result<Option<i64>> {
        AccountBalance::find(id, &self.pool).await
    }

    async fn apply_entry(&self, entry: &LedgerEntry) -> Result<ApplyOutcome> {
        AccountBalance::apply(entry, &self.pool).await
    }

    async fn find_entry_by_idempotency_key(
        &self,
        source_id: IdentityId,
        key: &str,
    ) -> Result<Option<LedgerEntry>> {
        LedgerEntry::find_by_idempotency_key(source_id, key, &self.pool).await
    }

    async fn entries_for(
        &self,
        identity_id: IdentityId,
        after: Option<Uuid>,
        limit: u32,
    ) -> Result<Vec<LedgerEntry>> {
        LedgerEntry::find_for_identity(identity_id, after, limit, &self.pool).await
    }
}
