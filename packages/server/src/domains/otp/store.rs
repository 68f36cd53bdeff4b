use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::models::OneTimeCode;
use crate::common::IdentityId;

/// Persistence for one-time codes. Only `OtpService` talks to it.
///
/// Lookups are keyed by `(identity, active)`, never a scan over all codes.
#[async_trait]
pub trait OtpStore: Send + Sync {
    /// Supersede every active code of `code.identity_id` and persist `code`, atomically.
    async fn replace_active_code(&self, code: &OneTimeCode) -> Result<()>;

    /// Atomically consume the active code for `identity_id` equal to `code` with
    /// `expires_at >= now`. Returns `None` if there is no such code.
    async fn consume_code(
        &self,
        identity_id: IdentityId,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<OneTimeCode>>;

    /// Supersede every active code of the identity. Returns how many were affected.
    async fn invalidate_codes(&self, identity_id: IdentityId) -> Result<u64>;

    /// Delete codes that are past expiry or no longer active.
    async fn purge_expired_codes(&self, now: DateTime<Utc>) -> Result<u64>;
}
