//! Fixed-window rate limiting backed by Workers KV.
//!
//! The read-modify-write below is not atomic: two concurrent requests from
//! the same IP can both read the same count. KV offers no compare-and-swap,
//! so a burst may slip one or two requests past the limit.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use worker::kv::{KvError, KvStore};

/// Workers KV rejects `expirationTtl` values below this.
pub const KV_MIN_TTL_SECS: u64 = 60;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("rate limit store: {0}")]
pub struct StoreError(pub String);

/// Key-value store with per-entry expiry.
#[allow(async_fn_in_trait)]
pub trait RateLimitStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    async fn put(&self, key: &str, value: String, ttl_secs: u64) -> Result<(), StoreError>;
}

impl From<KvError> for StoreError {
    fn from(err: KvError) -> Self {
        StoreError(worker::Error::from(err).to_string())
    }
}

impl RateLimitStore for KvStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(KvStore::get(self, key).text().await?)
    }

    async fn put(&self, key: &str, value: String, ttl_secs: u64) -> Result<(), StoreError> {
        KvStore::put(self, key, value)?
            .expiration_ttl(ttl_secs.max(KV_MIN_TTL_SECS))
            .execute()
            .await?;
        Ok(())
    }
}

/// Persisted window state for one client key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitRecord {
    pub count: u32,
    /// Epoch milliseconds at which the window closes.
    #[serde(rename = "resetAt")]
    pub reset_at: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    pub limit: u32,
    pub window: Duration,
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self {
            limit: 5,
            window: Duration::from_secs(5 * 60),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub remaining: u32,
    /// Set when the store failed and the request was let through anyway.
    pub store_error: Option<StoreError>,
}

#[derive(Debug, Clone, Default)]
pub struct RateLimiter {
    policy: RateLimitPolicy,
}

impl RateLimiter {
    pub fn new(policy: RateLimitPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> RateLimitPolicy {
        self.policy
    }

    /// Counts one request for `client_key`. Store failures fail open.
    pub async fn check<S: RateLimitStore>(
        &self,
        store: &S,
        client_key: &str,
        now: DateTime<Utc>,
    ) -> RateLimitDecision {
        match self.try_check(store, client_key, now).await {
            Ok(decision) => decision,
            Err(err) => RateLimitDecision {
                allowed: true,
                remaining: self.policy.limit,
                store_error: Some(err),
            },
        }
    }

    async fn try_check<S: RateLimitStore>(
        &self,
        store: &S,
        client_key: &str,
        now: DateTime<Utc>,
    ) -> Result<RateLimitDecision, StoreError> {
        let key = storage_key(client_key);
        let now_ms = now.timestamp_millis();

        // An unreadable record is treated like an absent one and overwritten.
        let existing = store
            .get(&key)
            .await?
            .and_then(|raw| serde_json::from_str::<RateLimitRecord>(&raw).ok());

        let record = match existing {
            Some(record) if now_ms <= record.reset_at => record,
            _ => {
                let fresh = RateLimitRecord {
                    count: 1,
                    reset_at: now_ms + window_millis(self.policy.window),
                };
                store
                    .put(&key, encode(&fresh)?, self.policy.window.as_secs())
                    .await?;
                return Ok(self.allowed(fresh.count));
            }
        };

        if record.count >= self.policy.limit {
            return Ok(RateLimitDecision {
                allowed: false,
                remaining: 0,
                store_error: None,
            });
        }

        let updated = RateLimitRecord {
            count: record.count + 1,
            reset_at: record.reset_at,
        };
        let ttl_secs = u64::try_from((record.reset_at - now_ms + 999) / 1000).unwrap_or(0);
        store.put(&key, encode(&updated)?, ttl_secs).await?;

        Ok(self.allowed(updated.count))
    }

    fn allowed(&self, count: u32) -> RateLimitDecision {
        RateLimitDecision {
            allowed: true,
            remaining: self.policy.limit.saturating_sub(count),
            store_error: None,
        }
    }
}

pub fn storage_key(client_key: &str) -> String {
    format!("ratelimit:{client_key}")
}

fn window_millis(window: Duration) -> i64 {
    i64::try_from(window.as_millis()).unwrap_or(i64::MAX)
}

fn encode(record: &RateLimitRecord) -> Result<String, StoreError> {
    serde_json::to_string(record).map_err(|e| StoreError(e.to_string()))
}
