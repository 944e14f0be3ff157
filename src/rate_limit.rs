//! Per-client throttling of `POST /api/subscribe`.
//!
//! Each key owns a fixed bucket `{count, reset_at}`: the first hit (or the
//! first hit after `reset_at`) opens a new window with `count = 1`; further
//! hits increment `count` until it reaches the limit, after which they are
//! refused without incrementing.
//!
//! The state lives in process memory. It is only correct for a single
//! long-lived instance: replicas each count separately and a restart forgets
//! everything. Keys are never evicted; call `reset` (or restart) to reclaim
//! memory.

use std::time::Duration;
use std::time::Instant;

use actix_web::HttpRequest;
use dashmap::DashMap;

/// Shared bucket for requests with no identifiable client address.
pub const UNKNOWN_CLIENT: &str = "unknown";

#[derive(Debug, Clone, Copy)]
struct Bucket {
    count: u32,
    reset_at: Instant,
}

/// Process-wide rate limiter, created once in `startup` and shared through
/// `web::Data`.
pub struct RateLimiter {
    limit: u32,
    window: Duration,
    buckets: DashMap<String, Bucket>,
}

impl RateLimiter {
    pub fn new(
        limit: u32,
        window: Duration,
    ) -> Self {
        Self {
            limit,
            window,
            buckets: DashMap::new(),
        }
    }

    pub fn limit(&self) -> u32 { self.limit }

    /// `true` if `key` has already used up its allowance for the current
    /// window, using the configured limit.
    pub fn check(
        &self,
        key: &str,
    ) -> bool {
        self.is_rate_limited(key, self.limit)
    }

    pub fn is_rate_limited(
        &self,
        key: &str,
        limit: u32,
    ) -> bool {
        self.is_rate_limited_at(key, limit, Instant::now())
    }

    /// Same as `is_rate_limited`, with an explicit clock.
    pub fn is_rate_limited_at(
        &self,
        key: &str,
        limit: u32,
        now: Instant,
    ) -> bool {
        // the entry guard holds the shard lock, so read-modify-write is atomic
        // per key
        let mut bucket = self.buckets.entry(key.to_owned()).or_insert(Bucket {
            count: 0,
            reset_at: now,
        });

        if bucket.count == 0 || now >= bucket.reset_at {
            *bucket = Bucket {
                count: 1,
                reset_at: now + self.window,
            };
            return false;
        }

        if bucket.count >= limit {
            return true;
        }

        bucket.count += 1;
        false
    }

    /// Forget every bucket.
    pub fn reset(&self) { self.buckets.clear(); }

    pub fn tracked_keys(&self) -> usize { self.buckets.len() }
}

/// Derive the bucket key for a request: first entry of `X-Forwarded-For`,
/// else `X-Real-IP`, else `UNKNOWN_CLIENT`.
pub fn client_key(req: &HttpRequest) -> String {
    let header = |name: &str| {
        req.headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned)
    };

    if let Some(forwarded) = header("x-forwarded-for") {
        return forwarded
            .split(',')
            .next()
            .map(str::trim)
            .filter(|ip| !ip.is_empty())
            .unwrap_or(UNKNOWN_CLIENT)
            .to_owned();
    }

    header("x-real-ip").unwrap_or_else(|| UNKNOWN_CLIENT.to_owned())
}
