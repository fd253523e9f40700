//! Process-wide map of client buckets

use std::num::NonZeroUsize;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use lru::LruCache;

use crate::bucket::Bucket;
use crate::{Decision, RateLimitConfig, RateLimitError};

struct ClientState {
    bucket: Bucket,
    last_seen: Instant,
}

/// Shared per-client rate limiter.
///
/// All structural changes (insert, evict, recency update) happen under one
/// mutex; the critical section is a handful of map operations and never
/// awaits.
pub struct RateLimiter {
    config: RateLimitConfig,
    retention: Duration,
    clients: Mutex<LruCache<String, ClientState>>,
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("config", &self.config)
            .field("tracked_clients", &self.tracked_clients())
            .finish()
    }
}

impl RateLimiter {
    /// Create a rate limiter, rejecting zero capacities
    pub fn new(config: RateLimitConfig) -> Result<Self, RateLimitError> {
        config.validate()?;
        let capacity = NonZeroUsize::new(config.max_clients).ok_or_else(|| {
            RateLimitError::Configuration("RATE_LIMIT_MAX_CLIENTS must be at least 1".to_string())
        })?;

        Ok(Self {
            retention: config.effective_retention(),
            config,
            clients: Mutex::new(LruCache::new(capacity)),
        })
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Check the limit for `client_id` and record the request if admitted
    pub fn check_and_record(&self, client_id: &str) -> Decision {
        let mut clients = self.lock();
        // Read the clock under the lock so recorded instants stay ordered
        let now = Instant::now();
        self.check_and_record_locked(&mut clients, client_id, now)
    }

    /// Check + record with an explicit timestamp.
    ///
    /// Callers must not pass instants earlier than ones already recorded.
    pub fn check_and_record_at(&self, client_id: &str, now: Instant) -> Decision {
        let mut clients = self.lock();
        self.check_and_record_locked(&mut clients, client_id, now)
    }

    fn check_and_record_locked(
        &self,
        clients: &mut LruCache<String, ClientState>,
        client_id: &str,
        now: Instant,
    ) -> Decision {
        let purged = self.purge_idle_locked(clients, now);
        if purged > 0 {
            tracing::debug!(purged, "Dropped idle rate-limit buckets");
        }

        if let Some(state) = clients.get_mut(client_id) {
            state.last_seen = now;
            return state.bucket.admit(&self.config, now);
        }

        let mut bucket = Bucket::fresh();
        let decision = bucket.admit(&self.config, now);
        let state = ClientState {
            bucket,
            last_seen: now,
        };
        if let Some((evicted, old)) = clients.push(client_id.to_string(), state) {
            // Buckets idle past retention were already purged, so this one
            // may still hold live history
            tracing::warn!(
                client_id = %evicted,
                idle_ms = now.saturating_duration_since(old.last_seen).as_millis() as u64,
                "Rate-limit client capacity reached, evicting least recently seen bucket"
            );
        }
        decision
    }

    /// Drop buckets idle past the retention horizon; returns how many
    pub fn purge_idle_at(&self, now: Instant) -> usize {
        let mut clients = self.lock();
        self.purge_idle_locked(&mut clients, now)
    }

    /// Number of client buckets currently held
    pub fn tracked_clients(&self) -> usize {
        self.lock().len()
    }

    fn purge_idle_locked(&self, clients: &mut LruCache<String, ClientState>, now: Instant) -> usize {
        let mut purged = 0;
        // LRU order is last_seen order, so stop at the first live bucket
        while let Some((_, state)) = clients.peek_lru() {
            if now.saturating_duration_since(state.last_seen) < self.retention {
                break;
            }
            clients.pop_lru();
            purged += 1;
        }
        purged
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LruCache<String, ClientState>> {
        // Every mutation leaves the map consistent, so a poisoned lock is still usable
        self.clients.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
