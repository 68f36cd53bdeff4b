use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::models::{DisplayFields, Identity};
use crate::common::IdentityId;

/// Persistence for identity records (everything except the balance).
#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Insert a new identity. Returns `None` when the phone number is already registered.
    async fn insert_identity(&self, identity: &Identity) -> Result<Option<Identity>>;

    async fn find_identity(&self, id: IdentityId) -> Result<Option<Identity>>;

    async fn find_identity_by_phone(&self, phone_number: &str) -> Result<Option<Identity>>;

    async fn mark_phone_verified(
        &self,
        id: IdentityId,
        now: DateTime<Utc>,
    ) -> Result<Option<Identity>>;

    /// Replace names and email.
    async fn update_display_fields(
        &self,
        id: IdentityId,
        fields: &DisplayFields,
        now: DateTime<Utc>,
    ) -> Result<Option<Identity>>;

    async fn set_transaction_pin(
        &self,
        id: IdentityId,
        pin_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Identity>>;
}
