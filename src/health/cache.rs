// Bounded TTL cache of probe results keyed by URL

use crate::health::HealthProbeResult;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone)]
struct CachedProbe {
    result: HealthProbeResult,
    stored_at: Instant,
}

/// Probe results that expire `ttl` after they were stored
#[derive(Debug)]
pub struct HealthCache {
    entries: HashMap<String, CachedProbe>,
    ttl: Duration,
    capacity: usize,
}

impl HealthCache {
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            ttl,
            capacity: capacity.max(1),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The cached result for `url` if it is younger than the TTL
    pub fn get_fresh(&self, url: &str, now: Instant) -> Option<HealthProbeResult> {
        self.entries
            .get(url)
            .filter(|entry| now.saturating_duration_since(entry.stored_at) < self.ttl)
            .map(|entry| entry.result.clone())
    }

    /// Store a result, replacing any previous entry for `url`.
    ///
    /// At capacity, expired entries are purged first, then the oldest goes.
    pub fn insert(&mut self, url: &str, result: HealthProbeResult, now: Instant) {
        if !self.entries.contains_key(url) && self.entries.len() >= self.capacity {
            self.purge_expired(now);

            if self.entries.len() >= self.capacity {
                let oldest = self
                    .entries
                    .iter()
                    .min_by_key(|(_, entry)| entry.stored_at)
                    .map(|(key, _)| key.clone());
                if let Some(key) = oldest {
                    tracing::debug!("Health cache full, evicting {}", key);
                    self.entries.remove(&key);
                }
            }
        }

        self.entries.insert(
            url.to_string(),
            CachedProbe {
                result,
                stored_at: now,
            },
        );
    }

    pub fn purge_expired(&mut self, now: Instant) {
        let ttl = self.ttl;
        self.entries
            .retain(|_, entry| now.saturating_duration_since(entry.stored_at) < ttl);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
