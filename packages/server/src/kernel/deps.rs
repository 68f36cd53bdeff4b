//! Server dependencies (using traits for testability)
//!
//! `ServerDeps` is the central container the HTTP layer and scheduled tasks use.
//! Storage, SMS delivery and time all come in behind traits so tests can swap them.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use twilio::TwilioService;

use crate::domains::auth::SessionIssuer;
use crate::domains::devices::{DeviceRegistry, DeviceStore};
use crate::domains::gateway::IdentityGateway;
use crate::domains::identity::IdentityStore;
use crate::domains::ledger::{LedgerEngine, LedgerStore};
use crate::domains::otp::{OtpPolicy, OtpService, OtpStore};
use crate::kernel::{BaseClock, BaseNotifier, BaseStoreHealth};
use crate::stores::{MemoryStore, PostgresStore};

// =============================================================================
// TwilioService Adapter (implements BaseNotifier trait)
// =============================================================================

/// Wrapper around TwilioService that implements BaseNotifier
pub struct TwilioAdapter(pub Arc<TwilioService>);

impl TwilioAdapter {
    pub fn new(service: Arc<TwilioService>) -> Self {
        Self(service)
    }
}

#[async_trait]
impl BaseNotifier for TwilioAdapter {
    async fn send(&self, phone_number: &str, message: &str) -> Result<()> {
        self.0
            .send_sms(phone_number, message)
            .await
            .map(|_| ())
            .map_err(|e| anyhow::anyhow!("{}", e))
    }
}

// =============================================================================
// Store health for both backends
// =============================================================================

#[async_trait]
impl BaseStoreHealth for PostgresStore {
    async fn ping(&self) -> Result<()> {
        PostgresStore::ping(self).await
    }

    fn backend(&self) -> &'static str {
        "postgres"
    }
}

#[async_trait]
impl BaseStoreHealth for MemoryStore {
    async fn ping(&self) -> Result<()> {
        self.total_balance().map(|_| ())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

// =============================================================================
// Stores
// =============================================================================

/// One handle per store concern. Usually all point at the same backend.
#[derive(Clone)]
pub struct Stores {
    pub identities: Arc<dyn IdentityStore>,
    pub codes: Arc<dyn OtpStore>,
    pub devices: Arc<dyn DeviceStore>,
    pub ledger: Arc<dyn LedgerStore>,
    pub health: Arc<dyn BaseStoreHealth>,
}

impl Stores {
    /// Every concern served by one backend.
    pub fn shared<S>(store: Arc<S>) -> Self
    where
        S: IdentityStore + OtpStore + DeviceStore + LedgerStore + BaseStoreHealth + 'static,
    {
        Self {
            identities: store.clone(),
            codes: store.clone(),
            devices: store.clone(),
            ledger: store.clone(),
            health: store,
        }
    }

    pub fn with_ledger(mut self, ledger: Arc<dyn LedgerStore>) -> Self {
        self.ledger = ledger;
        self
    }
}

// =============================================================================
// ServerDeps
// =============================================================================

/// Server dependencies accessible to routes and scheduled tasks
#[derive(Clone)]
pub struct ServerDeps {
    pub gateway: Arc<IdentityGateway>,
    pub health: Arc<dyn BaseStoreHealth>,
}

impl ServerDeps {
    /// Wire every component from its stores and infrastructure.
    pub fn new(
        stores: Stores,
        notifier: Arc<dyn BaseNotifier>,
        clock: Arc<dyn BaseClock>,
        otp_policy: OtpPolicy,
        sessions: SessionIssuer,
    ) -> Self {
        let otp = OtpService::new(stores.codes, notifier, clock.clone(), otp_policy);
        let devices = DeviceRegistry::new(stores.devices, stores.identities.clone(), clock.clone());
        let ledger = LedgerEngine::new(stores.ledger, clock.clone());
        let gateway = IdentityGateway::new(stores.identities, otp, devices, sessions, ledger, clock);

        Self {
            gateway: Arc::new(gateway),
            health: stores.health,
        }
    }
}
