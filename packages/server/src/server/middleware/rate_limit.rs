// Rate limiting using tower-governor
//
// Applied in app.rs to the /api/auth routes (OTP issue and verify), keyed by
// client IP taken from X-Forwarded-For / X-Real-IP / the peer address.

use anyhow::{Context, Result};
use axum::Router;
use std::sync::Arc;
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimit {
    pub per_second: u64,
    pub burst: u32,
}

impl Default for RateLimit {
    /// 10 requests per second with bursts up to 20
    fn default() -> Self {
        Self {
            per_second: 10,
            burst: 20,
        }
    }
}

/// Wrap every route of `router` in a per-IP limiter.
pub fn rate_limited(router: Router, limit: RateLimit) -> Result<Router> {
    let config = GovernorConfigBuilder::default()
        .per_second(limit.per_second)
        .burst_size(limit.burst)
        .use_headers() // Extract IP from X-Forwarded-For header
        .finish()
        .context("rate limit must have a positive period and burst size")?;

    Ok(router.layer(GovernorLayer {
        config: Arc::new(config),
    }))
}
