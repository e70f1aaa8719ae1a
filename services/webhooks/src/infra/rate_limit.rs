//! Request budgets for the admin endpoints.
//!
//! [`InMemoryRateLimiter`] is the single-process default. [`RedisRateLimiter`]
//! keeps a fixed-window counter per key in Redis so that several instances
//! share one budget. Both produce the same [`RateLimitDecision`].

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use anyhow::Context as _;
use chrono::Utc;
use deadpool_redis::Pool;
use deadpool_redis::redis;

use crate::domain::repository::RateLimiter;
use crate::domain::types::RateLimitDecision;

/// Smallest window accepted; shorter ones are raised to this.
pub const MIN_WINDOW: Duration = Duration::from_millis(1);

fn decide(count: u32, limit: u32, until_reset: Duration) -> RateLimitDecision {
    let reset_at = Utc::now()
        + chrono::Duration::from_std(until_reset).unwrap_or_else(|_| chrono::Duration::zero());
    if count > limit {
        RateLimitDecision {
            allowed: false,
            limit,
            remaining: 0,
            reset_at,
            retry_after_secs: Some(retry_after_secs(until_reset)),
        }
    } else {
        RateLimitDecision {
            allowed: true,
            limit,
            remaining: limit - count,
            reset_at,
            retry_after_secs: None,
        }
    }
}

/// Whole seconds until reset, rounded up, at least 1.
fn retry_after_secs(until_reset: Duration) -> u64 {
    let millis = u64::try_from(until_reset.as_millis()).unwrap_or(u64::MAX);
    millis.div_ceil(1000).max(1)
}

// ── In-memory ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
struct RateLimitEntry {
    count: u32,
    reset_at: Instant,
}

/// Process-local counters. One lock covers the whole read-modify-write, so
/// concurrent requests on a key never lose an increment.
#[derive(Debug, Default)]
pub struct InMemoryRateLimiter {
    entries: Mutex<HashMap<String, RateLimitEntry>>,
}

impl InMemoryRateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// [`RateLimiter::check`] against an explicit clock.
    pub fn check_at(
        &self,
        key: &str,
        limit: u32,
        window: Duration,
        now: Instant,
    ) -> RateLimitDecision {
        let limit = limit.max(1);
        let window = window.max(MIN_WINDOW);
        let fresh = RateLimitEntry {
            count: 1,
            reset_at: now + window,
        };

        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let entry = entries
            .entry(key.to_owned())
            .and_modify(|entry| {
                if now >= entry.reset_at {
                    *entry = fresh;
                } else {
                    entry.count = entry.count.saturating_add(1);
                }
            })
            .or_insert(fresh);

        decide(entry.count, limit, entry.reset_at.saturating_duration_since(now))
    }

    /// Drop entries whose window has elapsed. Returns how many were removed.
    pub fn sweep_expired(&self) -> usize {
        self.sweep_expired_at(Instant::now())
    }

    pub fn sweep_expired_at(&self, now: Instant) -> usize {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let before = entries.len();
        entries.retain(|_, entry| now < entry.reset_at);
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl RateLimiter for InMemoryRateLimiter {
    async fn check(&self, key: &str, limit: u32, window: Duration) -> RateLimitDecision {
        self.check_at(key, limit, window, Instant::now())
    }
}

// ── Redis ─────────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct RedisRateLimiter {
    pub pool: Pool,
}

fn redis_key(key: &str) -> String {
    format!("rate_limit:{key}")
}

impl RedisRateLimiter {
    /// Increment the counter and return `(count, time until reset)`.
    async fn hit(&self, key: &str, window: Duration) -> anyhow::Result<(u32, Duration)> {
        let mut conn = self.pool.get().await.context("get redis connection")?;
        let key = redis_key(key);
        let window_ms = u64::try_from(window.as_millis()).unwrap_or(u64::MAX);

        let count: u64 = redis::cmd("INCR")
            .arg(&key)
            .query_async(&mut conn)
            .await
            .context("increment rate limit counter")?;
        if count == 1 {
            let _: i64 = redis::cmd("PEXPIRE")
                .arg(&key)
                .arg(window_ms)
                .query_async(&mut conn)
                .await
                .context("start rate limit window")?;
        }

        let ttl_ms: i64 = redis::cmd("PTTL")
            .arg(&key)
            .query_async(&mut conn)
            .await
            .context("read rate limit window")?;
        let until_reset = match u64::try_from(ttl_ms) {
            Ok(ms) => Duration::from_millis(ms),
            // -1: the expiry was lost between INCR and PEXPIRE; restart the window.
            Err(_) => {
                let _: i64 = redis::cmd("PEXPIRE")
                    .arg(&key)
                    .arg(window_ms)
                    .query_async(&mut conn)
                    .await
                    .context("restart rate limit window")?;
                window
            }
        };

        Ok((u32::try_from(count).unwrap_or(u32::MAX), until_reset))
    }
}

impl RateLimiter for RedisRateLimiter {
    async fn check(&self, key: &str, limit: u32, window: Duration) -> RateLimitDecision {
        let limit = limit.max(1);
        let window = window.max(MIN_WINDOW);
        match self.hit(key, window).await {
            Ok((count, until_reset)) => decide(count, limit, until_reset),
            Err(e) => {
                tracing::warn!(error = %e, key, "rate limiter unavailable, denying request");
                RateLimitDecision {
                    allowed: false,
                    limit,
                    remaining: 0,
                    reset_at: Utc::now() + chrono::Duration::seconds(1),
                    retry_after_secs: Some(1),
                }
            }
        }
    }
}

// ── Backend ───────────────────────────────────────────────────────────────────

/// The limiter wired into `AppState`, chosen at startup from `REDIS_URL`.
#[derive(Clone)]
pub enum RateLimiterBackend {
    InMemory(Arc<InMemoryRateLimiter>),
    Redis(RedisRateLimiter),
}

impl RateLimiter for RateLimiterBackend {
    async fn check(&self, key: &str, limit: u32, window: Duration) -> RateLimitDecision {
        match self {
            Self::InMemory(limiter) => limiter.check(key, limit, window).await,
            Self::Redis(limiter) => limiter.check(key, limit, window).await,
        }
    }
}
