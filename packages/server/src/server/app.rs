//! Application setup and server configuration.

use anyhow::{Context, Result};
use axum::{
    extract::Extension,
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        HeaderName, HeaderValue, Method,
    },
    middleware,
    routing::{delete, get, post},
    Router,
};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::kernel::ServerDeps;
use crate::server::middleware::{
    extract_client_ip, jwt_auth_middleware, rate_limited, RateLimit, DEVICE_CLASS_HEADER,
    DEVICE_ID_HEADER,
};
use crate::server::routes::{
    change_device_handler, deposit_handler, health_handler, history_handler,
    list_devices_handler, login_handler, me_handler, register_handler, remove_device_handler,
    resend_otp_handler, set_pin_handler, transfer_handler, update_profile_handler,
    verify_otp_handler, withdraw_handler,
};

/// HTTP surface options resolved from configuration.
#[derive(Debug, Clone, Default)]
pub struct AppOptions {
    /// Empty means any origin
    pub allowed_origins: Vec<String>,
    /// `None` disables the per-IP limiter on the auth routes
    pub rate_limit: Option<RateLimit>,
}

/// Build the Axum application router
pub fn build_app(deps: ServerDeps, options: AppOptions) -> Result<Router> {
    let cors = cors_layer(&options.allowed_origins)?;
    let gateway_for_middleware = deps.gateway.clone();

    let auth_routes = Router::new()
        .route("/register", post(register_handler))
        .route("/login", post(login_handler))
        .route("/verify-otp", post(verify_otp_handler))
        .route("/resend-otp", post(resend_otp_handler));
    let auth_routes = match options.rate_limit {
        Some(limit) => {
            tracing::info!(
                per_second = limit.per_second,
                burst = limit.burst,
                "Rate limiting enabled on /api/auth"
            );
            rate_limited(auth_routes, limit)?
        }
        None => auth_routes,
    };

    let api = Router::new()
        .nest("/auth", auth_routes)
        .route("/me", get(me_handler).put(update_profile_handler))
        .route("/onboarding/pin", post(set_pin_handler))
        .route("/devices", get(list_devices_handler))
        .route("/devices/change", post(change_device_handler))
        .route("/devices/:device_identifier", delete(remove_device_handler))
        .route("/transactions/transfer", post(transfer_handler))
        .route("/transactions/deposit", post(deposit_handler))
        .route("/transactions/withdraw", post(withdraw_handler))
        .route("/transactions/history", get(history_handler));

    let app = Router::new()
        .nest("/api", api)
        // Health check (no auth, no rate limit)
        .route("/health", get(health_handler))
        // Middleware layers (applied in reverse order - last added runs first)
        .layer(middleware::from_fn(move |req, next| {
            jwt_auth_middleware(gateway_for_middleware.clone(), req, next)
        }))
        .layer(middleware::from_fn(extract_client_ip))
        .layer(Extension(deps))
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    Ok(app)
}

fn cors_layer(allowed_origins: &[String]) -> Result<CorsLayer> {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([
            AUTHORIZATION,
            CONTENT_TYPE,
            HeaderName::from_static(DEVICE_ID_HEADER),
            HeaderName::from_static(DEVICE_CLASS_HEADER),
        ]);

    if allowed_origins.is_empty() {
        return Ok(cors.allow_origin(Any));
    }

    let origins = allowed_origins
        .iter()
        .map(|origin| {
            HeaderValue::from_str(origin).with_context(|| format!("invalid CORS origin: {origin}"))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(cors.allow_origin(AllowOrigin::list(origins)))
}
