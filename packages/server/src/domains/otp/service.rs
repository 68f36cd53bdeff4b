use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use super::code::{generate_code, looks_like_code};
use super::models::{OneTimeCode, OtpPurpose};
use super::store::OtpStore;
use crate::common::{mask_phone_number, IdentityId};
use crate::domains::identity::Identity;
use crate::kernel::{BaseClock, BaseNotifier};

/// Code shape, lifetime and delivery behaviour.
#[derive(Debug, Clone)]
pub struct OtpPolicy {
    pub code_length: usize,
    pub ttl: Duration,
    /// Per-attempt bound on the notifier call
    pub delivery_timeout: StdDuration,
    /// Total send attempts (1 = no retry)
    pub delivery_attempts: u32,
}

impl Default for OtpPolicy {
    fn default() -> Self {
        Self {
            code_length: 6,
            ttl: Duration::seconds(600),
            delivery_timeout: StdDuration::from_secs(5),
            delivery_attempts: 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Delivery {
    Sent,
    /// The code is stored and stays valid; the user can ask for a resend.
    Failed { reason: String },
}

impl Delivery {
    pub fn is_sent(&self) -> bool {
        matches!(self, Delivery::Sent)
    }
}

/// Result of issuing a code. The caller never forwards `code` to the client.
#[derive(Debug, Clone)]
pub struct IssuedCode {
    pub code: String,
    pub expires_at: DateTime<Utc>,
    pub delivery: Delivery,
}

#[derive(Debug, thiserror::Error)]
pub enum OtpError {
    /// Wrong, expired, already used or superseded. Deliberately indistinguishable.
    #[error("invalid or expired code")]
    InvalidOrExpired,
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

/// Issues, delivers and verifies one-time codes.
pub struct OtpService {
    store: Arc<dyn OtpStore>,
    notifier: Arc<dyn BaseNotifier>,
    clock: Arc<dyn BaseClock>,
    policy: OtpPolicy,
}

impl OtpService {
    pub fn new(
        store: Arc<dyn OtpStore>,
        notifier: Arc<dyn BaseNotifier>,
        clock: Arc<dyn BaseClock>,
        policy: OtpPolicy,
    ) -> Self {
        Self {
            store,
            notifier,
            clock,
            policy,
        }
    }

    pub fn policy(&self) -> &OtpPolicy {
        &self.policy
    }

    /// Store a fresh code (superseding any active one), then text it to the identity.
    ///
    /// Delivery failure does not fail issuance: the stored code stays valid.
    pub async fn issue(&self, identity: &Identity, purpose: OtpPurpose) -> Result<IssuedCode, OtpError> {
        let now = self.clock.now();
        let code = OneTimeCode::new(
            identity.id,
            generate_code(self.policy.code_length),
            purpose,
            now,
            now + self.policy.ttl,
        );

        self.store.replace_active_code(&code).await?;
        debug!(identity_id = %identity.id, ?purpose, "one-time code stored");

        let message = purpose.message(&code.code, self.policy.ttl.num_minutes().max(1));
        let delivery = self.deliver(&identity.phone_number, &message).await;

        Ok(IssuedCode {
            code: code.code,
            expires_at: code.expires_at,
            delivery,
        })
    }

    /// Re-issue a code for the identity. Any previous code stops working.
    pub async fn resend(&self, identity: &Identity) -> Result<IssuedCode, OtpError> {
        self.issue(identity, OtpPurpose::Resend).await
    }

    /// Consume the identity's active code if `code` matches exactly and has not expired.
    pub async fn verify(&self, identity_id: IdentityId, code: &str) -> Result<OneTimeCode, OtpError> {
        if !looks_like_code(code, self.policy.code_length) {
            return Err(OtpError::InvalidOrExpired);
        }

        let now = self.clock.now();
        match self.store.consume_code(identity_id, code, now).await? {
            Some(consumed) => {
                info!(identity_id = %identity_id, "one-time code verified");
                Ok(consumed)
            }
            None => {
                debug!(identity_id = %identity_id, "one-time code rejected");
                Err(OtpError::InvalidOrExpired)
            }
        }
    }

    pub async fn invalidate(&self, identity_id: IdentityId) -> Result<u64, OtpError> {
        Ok(self.store.invalidate_codes(identity_id).await?)
    }

    /// Drop codes that can no longer be used.
    pub async fn purge_expired(&self) -> Result<u64, OtpError> {
        Ok(self.store.purge_expired_codes(self.clock.now()).await?)
    }

    async fn deliver(&self, phone_number: &str, message: &str) -> Delivery {
        let masked = mask_phone_number(phone_number);
        let attempts = self.policy.delivery_attempts.max(1);
        let mut reason = String::new();

        for attempt in 1..=attempts {
            let send = self.notifier.send(phone_number, message);
            match tokio::time::timeout(self.policy.delivery_timeout, send).await {
                Ok(Ok(())) => {
                    info!(phone = %masked, attempt, "one-time code delivered");
                    return Delivery::Sent;
                }
                Ok(Err(e)) => reason = e.to_string(),
                Err(_) => reason = format!("timed out after {:?}", self.policy.delivery_timeout),
            }
            warn!(phone = %masked, attempt, error = %reason, "one-time code delivery failed");
        }

        Delivery::Failed { reason }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::identity::NewIdentity;
    use crate::kernel::{ManualClock, MockNotifier};
    use crate::stores::MemoryStore;

    fn service(notifier: Arc<MockNotifier>, clock: Arc<ManualClock>) -> OtpService {
        OtpService::new(
            Arc::new(MemoryStore::new()),
            notifier,
            clock,
            OtpPolicy {
                delivery_timeout: StdDuration::from_millis(100),
                ..OtpPolicy::default()
            },
        )
    }

    fn identity(clock: &ManualClock) -> Identity {
        Identity::new(
            NewIdentity {
                phone_number: "+15550002222".to_string(),
                first_name: "Kemi".to_string(),
                last_name: "Ade".to_string(),
                email: None,
            },
            clock.now(),
        )
    }

    #[tokio::test]
    async fn test_issued_code_is_texted_and_verifies_once() {
        let notifier = Arc::new(MockNotifier::new());
        let clock = Arc::new(ManualClock::default());
        let otp = service(notifier.clone(), clock.clone());
        let who = identity(&clock);

        let issued = otp.issue(&who, OtpPurpose::Registration).await.unwrap();
        assert!(issued.delivery.is_sent());
        assert_eq!(issued.expires_at, clock.now() + Duration::seconds(600));
        assert_eq!(notifier.last_code_for(&who.phone_number), Some(issued.code.clone()));

        assert!(otp.verify(who.id, &issued.code).await.is_ok());
        assert!(matches!(
            otp.verify(who.id, &issued.code).await,
            Err(OtpError::InvalidOrExpired)
        ));
    }

    #[tokio::test]
    async fn test_malformed_code_rejected_without_lookup() {
        let notifier = Arc::new(MockNotifier::new());
        let clock = Arc::new(ManualClock::default());
        let otp = service(notifier, clock.clone());
        let who = identity(&clock);
        otp.issue(&who, OtpPurpose::Login).await.unwrap();

        assert!(matches!(otp.verify(who.id, "12ab").await, Err(OtpError::InvalidOrExpired)));
    }

    #[tokio::test]
    async fn test_delivery_failure_keeps_code_valid() {
        let notifier = Arc::new(MockNotifier::new());
        notifier.set_always_fail(true);
        let clock = Arc::new(ManualClock::default());
        let otp = service(notifier.clone(), clock.clone());
        let who = identity(&clock);

        let issued = otp.issue(&who, OtpPurpose::Login).await.unwrap();
        assert!(!issued.delivery.is_sent());
        assert_eq!(notifier.attempts(), 2);
        assert!(otp.verify(who.id, &issued.code).await.is_ok());
    }
}
