use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::models::Device;
use crate::common::{DeviceId, IdentityId};

/// Persistence for device bindings. Only `DeviceRegistry` talks to it.
#[async_trait]
pub trait DeviceStore: Send + Sync {
    async fn find_device(&self, device_identifier: &str) -> Result<Option<Device>>;

    /// Returns `None` when the identifier is already bound (to any identity).
    async fn insert_device(&self, device: &Device) -> Result<Option<Device>>;

    /// Set last-seen to `now` and mark trusted.
    async fn touch_device(&self, id: DeviceId, now: DateTime<Utc>) -> Result<Option<Device>>;

    /// Most recently seen first.
    async fn list_devices(&self, identity_id: IdentityId) -> Result<Vec<Device>>;

    async fn delete_device(&self, identity_id: IdentityId, device_identifier: &str) -> Result<bool>;
}
