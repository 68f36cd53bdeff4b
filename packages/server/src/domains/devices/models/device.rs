use std::fmt;
use std::str::FromStr;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::common::{DeviceId, IdentityId};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "device_class", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum DeviceClass {
    Mobile,
    Tablet,
    Desktop,
    Android,
    Ios,
}

impl DeviceClass {
    /// Coarse guess from a User-Agent header.
    pub fn from_user_agent(user_agent: &str) -> Self {
        let ua = user_agent.to_ascii_lowercase();
        if ua.contains("ipad") || ua.contains("tablet") {
            DeviceClass::Tablet
        } else if ua.contains("android") || ua.contains("iphone") || ua.contains("mobile") {
            DeviceClass::Mobile
        } else {
            DeviceClass::Desktop
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DeviceClass::Mobile => "mobile",
            DeviceClass::Tablet => "tablet",
            DeviceClass::Desktop => "desktop",
            DeviceClass::Android => "android",
            DeviceClass::Ios => "ios",
        }
    }
}

impl fmt::Display for DeviceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeviceClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mobile" => Ok(DeviceClass::Mobile),
            "tablet" => Ok(DeviceClass::Tablet),
            "desktop" => Ok(DeviceClass::Desktop),
            "android" => Ok(DeviceClass::Android),
            "ios" => Ok(DeviceClass::Ios),
            other => Err(format!("unknown device class: {other}")),
        }
    }
}

/// A client device bound to one identity. `device_identifier` is unique system-wide.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Device {
    pub id: DeviceId,
    pub identity_id: IdentityId,
    pub device_identifier: String,
    pub device_class: DeviceClass,
    pub trusted: bool,
    pub last_seen_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Device {
    /// A new binding. Every binding the registry creates is trusted from the start.
    pub fn trusted(
        identity_id: IdentityId,
        device_identifier: String,
        device_class: DeviceClass,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: DeviceId::new(),
            identity_id,
            device_identifier,
            device_class,
            trusted: true,
            last_seen_at: now,
            created_at: now,
        }
    }
}

// =============================================================================
// SQL Queries - ALL queries must be in models/
// =============================================================================

impl Device {
    pub async fn find_by_identifier(device_identifier: &str, pool: &PgPool) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>("SELECT * FROM devices WHERE device_identifier = $1")
            .bind(device_identifier)
            .fetch_optional(pool)
            .await
            .map_err(Into::into)
    }

    /// Insert a binding. Returns `None` if the identifier is already bound to anyone.
    pub async fn insert(&self, pool: &PgPool) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO devices (
                id, identity_id, device_identifier, device_class, trusted, last_seen_at, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (device_identifier) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(self.id)
        .bind(self.identity_id)
        .bind(&self.device_identifier)
        .bind(self.device_class)
        .bind(self.trusted)
        .bind(self.last_seen_at)
        .bind(self.created_at)
        .fetch_optional(pool)
        .await
        .map_err(Into::into)
    }

    /// Refresh last-seen and (re)mark trusted.
    pub async fn touch(id: DeviceId, now: DateTime<Utc>, pool: &PgPool) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>(
            "UPDATE devices SET last_seen_at = $2, trusted = true WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(now)
        .fetch_optional(pool)
        .await
        .map_err(Into::into)
    }

    /// Most recently seen first.
    pub async fn find_for_identity(identity_id: IdentityId, pool: &PgPool) -> Result<Vec<Self>> {
        sqlx::query_as::<_, Self>(
            "SELECT * FROM devices WHERE identity_id = $1
             ORDER BY last_seen_at DESC, id DESC",
        )
        .bind(identity_id)
        .fetch_all(pool)
        .await
        .map_err(Into::into)
    }

    pub async fn delete(
        identity_id: IdentityId,
        device_identifier: &str,
        pool: &PgPool,
    ) -> Result<bool> {
        let result =
            sqlx::query("DELETE FROM devices WHERE identity_id = $1 AND device_identifier = $2")
                .bind(identity_id)
                .bind(device_identifier)
                .execute(pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_class_from_user_agent() {
        let iphone = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) Mobile/15E148";
        let ipad = "Mozilla/5.0 (iPad; CPU OS 16_6 like Mac OS X)";
        let pixel = "Mozilla/5.0 (Linux; Android 14; Pixel 8)";
        let mac = "Mozilla/5.0 (Macintosh; Intel Mac OS X 14_0) Safari/605.1.15";

        assert_eq!(DeviceClass::from_user_agent(iphone), DeviceClass::Mobile);
        assert_eq!(DeviceClass::from_user_agent(ipad), DeviceClass::Tablet);
        assert_eq!(DeviceClass::from_user_agent(pixel), DeviceClass::Mobile);
        assert_eq!(DeviceClass::from_user_agent(mac), DeviceClass::Desktop);
        assert_eq!(DeviceClass::from_user_agent(""), DeviceClass::Desktop);
    }

    #[test]
    fn test_class_parse() {
        assert_eq!("iOS".parse::<DeviceClass>(), Ok(DeviceClass::Ios));
        assert_eq!(" android ".parse::<DeviceClass>(), Ok(DeviceClass::Android));
        assert!("toaster".parse::<DeviceClass>().is_err());
    }

    #[test]
    fn test_new_binding_is_trusted() {
        let now = Utc::now();
        let device = Device::trusted(IdentityId::new(), "dev-1".into(), DeviceClass::Ios, now);
        assert!(device.trusted);
        assert_eq!(device.last_seen_at, now);
        assert_eq!(device.created_at, now);
    }
}
