use std::str::FromStr;
use std::time::Duration;

use crate::domain::types::{DEFAULT_MAX_ATTEMPTS, Provider};

/// One optional value per provider, read from `{PROVIDER}_{SUFFIX}`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProviderSettings {
    pub aeat: Option<String>,
    pub stripe: Option<String>,
    pub resend: Option<String>,
}

impl ProviderSettings {
    pub fn get(&self, provider: Provider) -> Option<&str> {
        match provider {
            Provider::Aeat => self.aeat.as_deref(),
            Provider::Stripe => self.stripe.as_deref(),
            Provider::Resend => self.resend.as_deref(),
        }
    }

    fn from_lookup(lookup: &impl Fn(&str) -> Option<String>, suffix: &str) -> Self {
        let read = |provider: Provider| non_empty(lookup(&format!("{provider}_{suffix}")));
        Self {
            aeat: read(Provider::Aeat),
            stripe: read(Provider::Stripe),
            resend: read(Provider::Resend),
        }
    }
}

/// Webhooks service configuration loaded from environment variables.
#[derive(Debug)]
pub struct WebhooksConfig {
    /// PostgreSQL connection URL.
    pub database_url: String,
    /// Redis connection URL. When set, rate limits are shared through Redis.
    pub redis_url: Option<String>,
    /// TCP port to listen on (default 3114). Env var: `WEBHOOKS_PORT`.
    pub webhooks_port: u16,
    /// Attempt ceiling per event (default 5). Env var: `MAX_ATTEMPTS`.
    pub max_attempts: u32,
    /// Bound on one side-effect run (default 30s). Env var: `PROCESSING_TIMEOUT_SECS`.
    pub processing_timeout: Duration,
    /// Admin retry budget per client (default 30 per 60s).
    pub retry_rate_limit: u32,
    pub retry_rate_window: Duration,
    /// Admin search budget per client (default 60 per 60s).
    pub search_rate_limit: u32,
    pub search_rate_window: Duration,
    /// Interval of the in-memory limiter sweep (default 60s).
    pub rate_limit_sweep: Duration,
    /// Accept admin requests without identity headers as the system actor.
    /// Development only. Env var: `ADMIN_LOCAL_BYPASS`.
    pub admin_local_bypass: bool,
    /// `{AEAT,STRIPE,RESEND}_WEBHOOK_SECRET`. Providers without one are
    /// accepted unsigned and stored with `signature_verified = false`.
    pub webhook_secrets: ProviderSettings,
    /// `{AEAT,STRIPE,RESEND}_PROCESSOR_URL`.
    pub processor_urls: ProviderSettings,
}

impl WebhooksConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let secs = |key: &str, default: u64| Duration::from_secs(parse_or(&lookup, key, default));
        Self {
            database_url: lookup("DATABASE_URL").expect("DATABASE_URL"),
            redis_url: non_empty(lookup("REDIS_URL")),
            webhooks_port: parse_or(&lookup, "WEBHOOKS_PORT", 3114),
            max_attempts: parse_or(&lookup, "MAX_ATTEMPTS", DEFAULT_MAX_ATTEMPTS).max(1),
            processing_timeout: secs("PROCESSING_TIMEOUT_SECS", 30),
            retry_rate_limit: parse_or(&lookup, "RETRY_RATE_LIMIT", 30),
            retry_rate_window: secs("RETRY_RATE_WINDOW_SECS", 60),
            search_rate_limit: parse_or(&lookup, "SEARCH_RATE_LIMIT", 60),
            search_rate_window: secs("SEARCH_RATE_WINDOW_SECS", 60),
            rate_limit_sweep: secs("RATE_LIMIT_SWEEP_SECS", 60),
            admin_local_bypass: lookup("ADMIN_LOCAL_BYPASS")
                .map(|v| parse_flag(&v))
                .unwrap_or(false),
            webhook_secrets: ProviderSettings::from_lookup(&lookup, "WEBHOOK_SECRET"),
            processor_urls: ProviderSettings::from_lookup(&lookup, "PROCESSOR_URL"),
        }
    }
}

fn parse_or<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
