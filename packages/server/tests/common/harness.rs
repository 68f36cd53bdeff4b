//! Test harness for integration testing.
//!
//! Every test gets a fresh in-memory store, a recording SMS notifier and a clock that
//! only moves when the test says so. Postgres-backed tests live in
//! `postgres_store_tests.rs` and need Docker.

use std::sync::Arc;

use axum::Router;
use payfusion_core::domains::gateway::IdentityGateway;
use payfusion_core::kernel::{ManualClock, MockNotifier, ServerDeps, TestDependencies};
use payfusion_core::server::{build_app, AppOptions};
use payfusion_core::stores::MemoryStore;
use test_context::AsyncTestContext;

/// Test harness that manages test infrastructure.
///
/// # Example using test-context
///
/// ```ignore
/// use test_context::test_context;
///
/// #[test_context(TestHarness)]
/// #[tokio::test]
/// async fn my_test(ctx: &TestHarness) {
///     let alice = ctx.verified_identity("+15550001001", "1234", "alice-phone").await;
///     // ... test code
/// }
/// ```
pub struct TestHarness {
    pub deps: ServerDeps,
    pub store: Arc<MemoryStore>,
    pub notifier: Arc<MockNotifier>,
    pub clock: Arc<ManualClock>,
}

impl AsyncTestContext for TestHarness {
    async fn setup() -> Self {
        Self::new()
    }
}

impl TestHarness {
    pub fn new() -> Self {
        Self::from_dependencies(TestDependencies::new())
    }

    /// Build from customized dependencies (flaky ledger store, OTP policy...).
    pub fn from_dependencies(test_deps: TestDependencies) -> Self {
        // Run tests with: RUST_LOG=debug cargo test -- --nocapture
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();

        let store = test_deps.store.clone();
        let notifier = test_deps.notifier.clone();
        let clock = test_deps.clock.clone();

        Self {
            deps: test_deps.into_server_deps(),
            store,
            notifier,
            clock,
        }
    }

    pub fn gateway(&self) -> &IdentityGateway {
        &self.deps.gateway
    }

    /// HTTP router without the rate limiter (no peer address under `oneshot`).
    pub fn app(&self) -> Router {
        build_app(self.deps.clone(), AppOptions::default()).expect("Failed to build router")
    }
}
