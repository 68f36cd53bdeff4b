use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::common::{IdentityId, OneTimeCodeId};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "otp_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum CodeStatus {
    /// Issued and not yet used (may still be past its expiry)
    Active,
    /// Successfully verified once
    Consumed,
    /// Replaced by a newer code for the same identity
    Superseded,
}

/// Why a code was issued; decides the SMS wording.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "otp_purpose", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum OtpPurpose {
    Registration,
    Login,
    Resend,
}

impl OtpPurpose {
    pub fn message(self, code: &str, ttl_minutes: i64) -> String {
        let lead = match self {
            OtpPurpose::Login => "Your PayFusion login code is",
            OtpPurpose::Registration | OtpPurpose::Resend => "Your PayFusion verification code is",
        };
        format!("{lead}: {code}. It expires in {ttl_minutes} minutes.")
    }
}

/// A one-time code belonging to exactly one identity.
///
/// At most one `Active` code exists per identity; issuing a new one supersedes the rest.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct OneTimeCode {
    pub id: OneTimeCodeId,
    pub identity_id: IdentityId,
    #[serde(skip_serializing)]
    pub code: String,
    pub purpose: OtpPurpose,
    pub status: CodeStatus,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub consumed_at: Option<DateTime<Utc>>,
}

impl OneTimeCode {
    pub fn new(
        identity_id: IdentityId,
        code: String,
        purpose: OtpPurpose,
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: OneTimeCodeId::new(),
            identity_id,
            code,
            purpose,
            status: CodeStatus::Active,
            issued_at,
            expires_at,
            consumed_at: None,
        }
    }

    /// Accepted at any instant up to and including `expires_at`.
    pub fn is_usable_at(&self, now: DateTime<Utc>) -> bool {
        self.status == CodeStatus::Active && now <= self.expires_at
    }
}

// =============================================================================
// SQL Queries - ALL queries must be in models/
// =============================================================================

impl OneTimeCode {
    /// Supersede every active code for the identity and insert this one, atomically.
    pub async fn replace_active(&self, pool: &PgPool) -> Result<()> {
        let mut tx = pool.begin().await?;

        sqlx::query(
            "UPDATE one_time_codes SET status = 'superseded'
             WHERE identity_id = $1 AND status = 'active'",
        )
        .bind(self.identity_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO one_time_codes (
                id, identity_id, code, purpose, status, issued_at, expires_at, consumed_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(self.id)
        .bind(self.identity_id)
        .bind(&self.code)
        .bind(self.purpose)
        .bind(self.status)
        .bind(self.issued_at)
        .bind(self.expires_at)
        .bind(self.consumed_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Consume the active, unexpired code matching `code` exactly.
    ///
    /// Single statement, so two concurrent verifications of the same code cannot both win.
    pub async fn consume(
        identity_id: IdentityId,
        code: &str,
        now: DateTime<Utc>,
        pool: &PgPool,
    ) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>(
            r#"
            UPDATE one_time_codes
            SET status = 'consumed', consumed_at = $3
            WHERE identity_id = $1
              AND code = $2
              AND status = 'active'
              AND expires_at >= $3
            RETURNING *
            "#,
        )
        .bind(identity_id)
        .bind(code)
        .bind(now)
        .fetch_optional(pool)
        .await
        .map_err(Into::into)
    }

    pub async fn invalidate_active(identity_id: IdentityId, pool: &PgPool) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE one_time_codes SET status = 'superseded'
             WHERE identity_id = $1 AND status = 'active'",
        )
        .bind(identity_id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Delete every code whose expiry has passed, whatever its status.
    pub async fn purge_expired(now: DateTime<Utc>, pool: &PgPool) -> Result<u64> {
        let result = sqlx::query(
            "DELETE FROM one_time_codes WHERE expires_at < $1 OR status <> 'active'",
        )
        .bind(now)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }
}
