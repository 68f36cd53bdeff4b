// Main entry point for API server

use std::sync::Arc;

use anyhow::{Context, Result};
use payfusion_core::domains::auth::SessionIssuer;
use payfusion_core::kernel::{start_scheduler, ServerDeps, Stores, SystemClock, TwilioAdapter};
use payfusion_core::server::{build_app, middleware::RateLimit, AppOptions};
use payfusion_core::stores::PostgresStore;
use payfusion_core::Config;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use twilio::{TwilioOptions, TwilioService};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,payfusion_core=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting PayFusion API");

    // Load configuration
    let config = Config::from_env().context("Failed to load configuration")?;
    tracing::info!("Configuration loaded");

    // Connect to database
    tracing::info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    tracing::info!("Database connected");

    // Run migrations
    tracing::info!("Running database migrations...");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run migrations")?;
    tracing::info!("Migrations complete");

    // SMS delivery
    let twilio = Arc::new(TwilioService::new(TwilioOptions {
        account_sid: config.twilio_account_sid.clone(),
        auth_token: config.twilio_auth_token.clone(),
        from_number: config.twilio_from_number.clone(),
    }));

    let sessions = SessionIssuer::new(
        &config.jwt_secret,
        config.jwt_issuer.clone(),
        config.session_ttl(),
    );

    let deps = ServerDeps::new(
        Stores::shared(Arc::new(PostgresStore::new(pool))),
        Arc::new(TwilioAdapter::new(twilio)),
        Arc::new(SystemClock),
        config.otp_policy(),
        sessions,
    );

    // Background maintenance
    let _scheduler = start_scheduler(deps.clone(), &config.otp_purge_cron)
        .await
        .context("Failed to start scheduled tasks")?;

    // Build application
    let app = build_app(
        deps,
        AppOptions {
            allowed_origins: config.allowed_origins.clone(),
            rate_limit: Some(RateLimit {
                per_second: config.rate_limit_per_second,
                burst: config.rate_limit_burst,
            }),
        },
    )?;

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("Starting server on {}", addr);
    tracing::info!("Health check: http://localhost:{}/health", config.port);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await
    .context("Server error")?;

    Ok(())
}
