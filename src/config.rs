use crate::error::{EngineError, Result};
use std::time::Duration;

pub const ENV_JWT_SECRET: &str = "SLOTPAY_JWT_SECRET";
pub const ENV_GATEWAY_SECRET: &str = "SLOTPAY_GATEWAY_SECRET";
pub const ENV_ACCESS_TTL_SECS: &str = "SLOTPAY_ACCESS_TTL_SECS";
pub const ENV_REFRESH_TTL_SECS: &str = "SLOTPAY_REFRESH_TTL_SECS";
pub const ENV_STORE_TIMEOUT_MS: &str = "SLOTPAY_STORE_TIMEOUT_MS";

/// Engine settings, handed to [`crate::application::Engine::new`].
#[derive(Clone)]
pub struct Config {
    pub jwt_secret: String,
    /// Keys both the checkout and the webhook signature.
    pub gateway_secret: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
    /// Upper bound on every store round trip, lock waits included.
    pub store_timeout: Duration,
    pub gateway_name: String,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .field("store_timeout", &self.store_timeout)
            .field("gateway_name", &self.gateway_name)
            .finish_non_exhaustive()
    }
}

impl Config {
    pub fn new(jwt_secret: impl Into<String>, gateway_secret: impl Into<String>) -> Self {
        Self {
            jwt_secret: jwt_secret.into(),
            gateway_secret: gateway_secret.into(),
            access_ttl: Duration::from_secs(15 * 60),
            refresh_ttl: Duration::from_secs(10 * 24 * 60 * 60),
            store_timeout: Duration::from_secs(5),
            gateway_name: "razorpay".to_string(),
        }
    }

    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let secret = |key: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| EngineError::Validation(format!("{key} must be set")))
        };
        let mut config = Self::new(secret(ENV_JWT_SECRET)?, secret(ENV_GATEWAY_SECRET)?);

        if let Some(secs) = parse_number(&lookup, ENV_ACCESS_TTL_SECS)? {
            config.access_ttl = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_number(&lookup, ENV_REFRESH_TTL_SECS)? {
            config.refresh_ttl = Duration::from_secs(secs);
        }
        if let Some(ms) = parse_number(&lookup, ENV_STORE_TIMEOUT_MS)? {
            config.store_timeout = Duration::from_millis(ms);
        }
        Ok(config)
    }
}

fn parse_number(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<u64>> {
    match lookup(key) {
        None => Ok(None),
        Some(raw) => match raw.trim().parse::<u64>() {
            Ok(0) | Err(_) => Err(EngineError::Validation(format!(
                "{key} must be a positive integer, got '{raw}'"
            ))),
            Ok(n) => Ok(Some(n)),
        },
    }
}
