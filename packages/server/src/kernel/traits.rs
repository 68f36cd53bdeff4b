// Trait definitions for dependency injection
//
// These are INFRASTRUCTURE traits only - no business logic.
// Domain store traits live next to their domain (domains/*/store.rs).
//
// Naming convention: Base* for trait names (e.g., BaseNotifier, BaseClock)

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

// =============================================================================
// Notification Trait (Infrastructure - SMS)
// =============================================================================

#[async_trait]
pub trait BaseNotifier: Send + Sync {
    /// Send a text message to a phone number. May fail transiently.
    async fn send(&self, phone_number: &str, message: &str) -> Result<()>;
}

// =============================================================================
// Clock Trait (Infrastructure)
// =============================================================================

pub trait BaseClock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl BaseClock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

// =============================================================================
// Store Health Trait (Infrastructure)
// =============================================================================

#[async_trait]
pub trait BaseStoreHealth: Send + Sync {
    /// Cheap connectivity check for the health endpoint.
    async fn ping(&self) -> Result<()>;

    fn backend(&self) -> &'static str;
}
