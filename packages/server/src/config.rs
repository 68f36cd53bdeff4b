use anyhow::{bail, Context, Result};
use dotenvy::dotenv;
use std::env;
use std::str::FromStr;
use std::time::Duration as StdDuration;

use crate::domains::auth::DEFAULT_SESSION_TTL_DAYS;
use crate::domains::otp::OtpPolicy;
use crate::kernel::DEFAULT_OTP_PURGE_CRON;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub jwt_secret: String,
    pub jwt_issuer: String,
    pub session_ttl_days: i64,
    pub otp_code_length: usize,
    pub otp_ttl_seconds: i64,
    pub otp_delivery_timeout_ms: u64,
    pub twilio_account_sid: String,
    pub twilio_auth_token: String,
    pub twilio_from_number: String,
    pub allowed_origins: Vec<String>,
    pub rate_limit_per_second: u64,
    pub rate_limit_burst: u32,
    pub otp_purge_cron: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        let config = Self {
            database_url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            port: parsed_or("PORT", 8080)?,
            jwt_secret: env::var("JWT_SECRET").context("JWT_SECRET must be set")?,
            jwt_issuer: env::var("JWT_ISSUER").unwrap_or_else(|_| "payfusion".to_string()),
            session_ttl_days: parsed_or("SESSION_TTL_DAYS", DEFAULT_SESSION_TTL_DAYS)?,
            otp_code_length: parsed_or("OTP_CODE_LENGTH", 6)?,
            otp_ttl_seconds: parsed_or("OTP_TTL_SECONDS", 600)?,
            otp_delivery_timeout_ms: parsed_or("OTP_DELIVERY_TIMEOUT_MS", 5000)?,
            twilio_account_sid: env::var("TWILIO_ACCOUNT_SID")
                .context("TWILIO_ACCOUNT_SID must be set")?,
            twilio_auth_token: env::var("TWILIO_AUTH_TOKEN")
                .context("TWILIO_AUTH_TOKEN must be set")?,
            twilio_from_number: env::var("TWILIO_FROM_NUMBER")
                .context("TWILIO_FROM_NUMBER must be set")?,
            allowed_origins: parse_origins(&env::var("ALLOWED_ORIGINS").unwrap_or_default()),
            rate_limit_per_second: parsed_or("RATE_LIMIT_PER_SECOND", 10)?,
            rate_limit_burst: parsed_or("RATE_LIMIT_BURST", 20)?,
            otp_purge_cron: env::var("OTP_PURGE_CRON")
                .unwrap_or_else(|_| DEFAULT_OTP_PURGE_CRON.to_string()),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.jwt_secret.len() < 16 {
            bail!("JWT_SECRET must be at least 16 characters");
        }
        if !(4..=10).contains(&self.otp_code_length) {
            bail!("OTP_CODE_LENGTH must be between 4 and 10");
        }
        if !(1..=600).contains(&self.otp_ttl_seconds) {
            bail!("OTP_TTL_SECONDS must be between 1 and 600");
        }
        if self.otp_delivery_timeout_ms == 0 {
            bail!("OTP_DELIVERY_TIMEOUT_MS must be positive");
        }
        if self.session_ttl_days <= 0 {
            bail!("SESSION_TTL_DAYS must be positive");
        }
        if self.rate_limit_per_second == 0 || self.rate_limit_burst == 0 {
            bail!("RATE_LIMIT_PER_SECOND and RATE_LIMIT_BURST must be positive");
        }
        Ok(())
    }

    pub fn otp_policy(&self) -> OtpPolicy {
        OtpPolicy {
            code_length: self.otp_code_length,
            ttl: chrono::Duration::seconds(self.otp_ttl_seconds),
            delivery_timeout: StdDuration::from_millis(self.otp_delivery_timeout_ms),
            ..OtpPolicy::default()
        }
    }

    pub fn session_ttl(&self) -> chrono::Duration {
        chrono::Duration::days(self.session_ttl_days)
    }
}

fn parsed_or<T: FromStr>(key: &str, default: T) -> Result<T> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .ok()
            .with_context(|| format!("{key} must be a valid number")),
        Err(_) => Ok(default),
    }
}

/// Comma separated, blanks dropped. Empty means any origin.
pub fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(str::to_string)
        .collect()
}
