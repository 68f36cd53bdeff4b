// TestDependencies - mock implementations for testing
//
// Provides mock services that can be injected into ServerDeps for tests.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration as StdDuration;
use uuid::Uuid;

use super::{BaseClock, BaseNotifier, ServerDeps, Stores};
use crate::common::IdentityId;
use crate::domains::auth::SessionIssuer;
use crate::domains::ledger::{ApplyOutcome, EntryStatus, LedgerEntry, LedgerStore};
use crate::domains::otp::OtpPolicy;
use crate::stores::MemoryStore;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// =============================================================================
// Mock Notifier
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub phone_number: String,
    pub message: String,
}

/// Records every message; can be told to fail or stall.
#[derive(Default)]
pub struct MockNotifier {
    sent: Mutex<Vec<SentMessage>>,
    attempts: AtomicU32,
    failures_remaining: AtomicU32,
    always_fail: AtomicBool,
    delay: Mutex<Option<StdDuration>>,
}

impl MockNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `count` sends.
    pub fn fail_next(&self, count: u32) {
        self.failures_remaining.store(count, Ordering::SeqCst);
    }

    /// Fail every send until turned off.
    pub fn set_always_fail(&self, fail: bool) {
        self.always_fail.store(fail, Ordering::SeqCst);
    }

    /// Sleep this long before each send.
    pub fn set_delay(&self, delay: Option<StdDuration>) {
        *lock(&self.delay) = delay;
    }

    /// Successful sends, oldest first.
    pub fn sent(&self) -> Vec<SentMessage> {
        lock(&self.sent).clone()
    }

    /// Send attempts, including failed ones.
    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Code from the most recent message delivered to `phone_number`.
    pub fn last_code_for(&self, phone_number: &str) -> Option<String> {
        lock(&self.sent)
            .iter()
            .rev()
            .find(|m| m.phone_number == phone_number)
            .and_then(|m| extract_code(&m.message))
    }
}

/// Pull the numeric code out of "...: 123456. It expires...".
pub fn extract_code(message: &str) -> Option<String> {
    let (_, rest) = message.split_once(": ")?;
    let code: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    (!code.is_empty()).then_some(code)
}

#[async_trait]
impl BaseNotifier for MockNotifier {
    async fn send(&self, phone_number: &str, message: &str) -> Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);

        let delay = *lock(&self.delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.always_fail.load(Ordering::SeqCst) {
            return Err(anyhow!("SMS provider unavailable"));
        }
        let failing = self
            .failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(anyhow!("SMS provider unavailable"));
        }

        lock(&self.sent).push(SentMessage {
            phone_number: phone_number.to_string(),
            message: message.to_string(),
        });
        Ok(())
    }
}

// =============================================================================
// Manual Clock
// =============================================================================

/// Clock that only moves when told to.
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn at(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = lock(&self.now);
        *now += by;
    }

    pub fn set(&self, to: DateTime<Utc>) {
        *lock(&self.now) = to;
    }
}

impl Default for ManualClock {
    /// 2024-01-01T00:00:00Z
    fn default() -> Self {
        Self::at(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).single().unwrap_or_default())
    }
}

impl BaseClock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *lock(&self.now)
    }
}

// =============================================================================
// Flaky Ledger Store
// =============================================================================

/// Wraps a ledger store and fails or stalls `apply_entry` on demand.
///
/// An injected failure applies nothing, the way a rolled-back transaction would.
pub struct FlakyLedgerStore {
    inner: Arc<dyn LedgerStore>,
    fail_entries_touching: Mutex<Option<IdentityId>>,
    fail_all: AtomicBool,
    delay: Mutex<Option<StdDuration>>,
}

impl FlakyLedgerStore {
    pub fn new(inner: Arc<dyn LedgerStore>) -> Self {
        Self {
            inner,
            fail_entries_touching: Mutex::new(None),
            fail_all: AtomicBool::new(false),
            delay: Mutex::new(None),
        }
    }

    /// Completed entries involving `identity_id` error. Failed entries are still recorded.
    pub fn fail_entries_touching(&self, identity_id: Option<IdentityId>) {
        *lock(&self.fail_entries_touching) = identity_id;
    }

    /// Every `apply_entry` errors.
    pub fn set_fail_all(&self, fail: bool) {
        self.fail_all.store(fail, Ordering::SeqCst);
    }

    /// Sleep this long inside each `apply_entry`, before delegating.
    pub fn set_delay(&self, delay: Option<StdDuration>) {
        *lock(&self.delay) = delay;
    }
}

#[async_trait]
impl LedgerStore for FlakyLedgerStore {
    async fn account_balance(&self, id: IdentityId) -> Result<Option<i64>> {
        self.inner.account_balance(id).await
    }

    async fn apply_entry(&self, entry: &LedgerEntry) -> Result<ApplyOutcome> {
        let delay = *lock(&self.delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.fail_all.load(Ordering::SeqCst) {
            return Err(anyhow!("injected store failure"));
        }
        let touching = *lock(&self.fail_entries_touching);
        if let Some(id) = touching {
            if entry.status == EntryStatus::Completed && entry.involves(id) {
                return Err(anyhow!("injected store failure"));
            }
        }
        self.inner.apply_entry(entry).await
    }

    async fn find_entry_by_idempotency_key(
        &self,
        source_id: IdentityId,
        key: &str,
    ) -> Result<Option<LedgerEntry>> {
        self.inner.find_entry_by_idempotency_key(source_id, key).await
    }

    async fn entries_for(
        &self,
        identity_id: IdentityId,
        after: Option<Uuid>,
        limit: u32,
    ) -> Result<Vec<LedgerEntry>> {
        self.inner.entries_for(identity_id, after, limit).await
    }
}

// =============================================================================
// TestDependencies
// =============================================================================

pub const TEST_JWT_SECRET: &str = "test_secret_key";
pub const TEST_JWT_ISSUER: &str = "payfusion-test";

pub struct TestDependencies {
    pub store: Arc<MemoryStore>,
    pub notifier: Arc<MockNotifier>,
    pub clock: Arc<ManualClock>,
    pub ledger_store: Option<Arc<dyn LedgerStore>>,
    pub otp_policy: OtpPolicy,
}

impl TestDependencies {
    pub fn new() -> Self {
        Self {
            store: Arc::new(MemoryStore::new()),
            notifier: Arc::new(MockNotifier::new()),
            clock: Arc::new(ManualClock::default()),
            ledger_store: None,
            otp_policy: OtpPolicy {
                delivery_timeout: StdDuration::from_millis(200),
                ..OtpPolicy::default()
            },
        }
    }

    /// Route ledger calls through a different store (e.g. a `FlakyLedgerStore`).
    pub fn mock_ledger_store(mut self, store: Arc<dyn LedgerStore>) -> Self {
        self.ledger_store = Some(store);
        self
    }

    pub fn otp_policy(mut self, policy: OtpPolicy) -> Self {
        self.otp_policy = policy;
        self
    }

    pub fn sessions() -> SessionIssuer {
        SessionIssuer::new(TEST_JWT_SECRET, TEST_JWT_ISSUER.to_string(), Duration::days(30))
    }

    /// Convert into ServerDeps for testing
    pub fn into_server_deps(self) -> ServerDeps {
        let mut stores = Stores::shared(self.store);
        if let Some(ledger) = self.ledger_store {
            stores = stores.with_ledger(ledger);
        }
        ServerDeps::new(
            stores,
            self.notifier,
            self.clock,
            self.otp_policy,
            Self::sessions(),
        )
    }
}

impl Default for TestDependencies {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_code() {
        assert_eq!(
            extract_code("Your PayFusion login code is: 004321. It expires in 10 minutes."),
            Some("004321".to_string())
        );
        assert_eq!(extract_code("no code here"), None);
    }

    #[tokio::test]
    async fn test_mock_notifier_fails_then_recovers() {
        let notifier = MockNotifier::new();
        notifier.fail_next(1);

        assert!(notifier.send("+1555", "a").await.is_err());
        assert!(notifier.send("+1555", "b").await.is_ok());
        assert_eq!(notifier.attempts(), 2);
        assert_eq!(notifier.sent().len(), 1);
    }

    #[test]
    fn test_manual_clock_advances() {
        let clock = ManualClock::default();
        let start = clock.now();
        clock.advance(Duration::seconds(601));
        assert_eq!(clock.now() - start, Duration::seconds(601));
    }
}
