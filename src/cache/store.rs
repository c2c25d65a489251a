//! In-memory TTL cache implementation

use crate::clock::Clock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Freshness threshold: below this age a record displays as fresh
const FRESH_THRESHOLD: Duration = Duration::from_secs(15 * 60);
/// Freshness threshold: yellow up to here
const YELLOW_THRESHOLD: Duration = Duration::from_secs(30 * 60);
/// Freshness threshold: orange up to here, red beyond
const ORANGE_THRESHOLD: Duration = Duration::from_secs(60 * 60);

/// UI-facing age classification, independent of cache TTL
///
/// TTL decides whether a record is still trusted by the data layer; the freshness
/// tier only drives staleness coloring in the dashboard. The two use different
/// time constants on purpose.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FreshnessTier {
    Fresh,
    StaleYellow,
    StaleOrange,
    StaleRed,
}

/// One cached value with its fetch time and time-to-live
#[derive(Debug, Clone)]
struct CacheRecord<T> {
    value: T,
    fetched_at: i64,
    ttl: Duration,
}

/// In-memory cache from logical resource key to timestamped value
///
/// Expired records are treated as absent by `get`, which also purges them lazily.
/// The access layer's serve-stale fallbacks read through `peek_any`, which ignores
/// validity without evicting.
pub struct CacheStore<T: Clone> {
    records: HashMap<String, CacheRecord<T>>,
    clock: Arc<dyn Clock>,
}

impl<T: Clone> CacheStore<T> {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            records: HashMap::new(),
            clock,
        }
    }

    fn age_of(&self, record: &CacheRecord<T>) -> Duration {
        let age_ms = (self.clock.now_ms() - record.fetched_at).max(0);
        Duration::from_millis(age_ms as u64)
    }

    /// Get a valid record's value, evicting it if expired
    pub fn get(&mut self, key: &str) -> Option<T> {
        let expired = match self.records.get(key) {
            Some(record) => self.age_of(record) >= record.ttl,
            None => return None,
        };

        if expired {
            tracing::debug!(key, "Evicting expired cache record");
            self.records.remove(key);
            return None;
        }

        self.records.get(key).map(|r| r.value.clone())
    }

    /// Store a value, resetting its fetch time to now
    pub fn set(&mut self, key: impl Into<String>, value: T, ttl: Duration) {
        let key = key.into();
        tracing::debug!(key = %key, ttl_secs = ttl.as_secs(), "Caching value");
        self.records.insert(
            key,
            CacheRecord {
                value,
                fetched_at: self.clock.now_ms(),
                ttl,
            },
        );
    }

    /// Whether a record exists and its age is still below its TTL
    pub fn is_valid(&self, key: &str) -> bool {
        match self.records.get(key) {
            Some(record) => self.age_of(record) < record.ttl,
            None => false,
        }
    }

    /// Last stored value regardless of validity, without evicting
    ///
    /// Only meant for stale-on-throttle and stale-while-erroring fallbacks.
    pub fn peek_any(&self, key: &str) -> Option<T> {
        self.records.get(key).map(|r| r.value.clone())
    }

    /// Display freshness for a key; absent keys are stale-red
    pub fn freshness(&self, key: &str) -> FreshnessTier {
        let record = match self.records.get(key) {
            Some(record) => record,
            None => return FreshnessTier::StaleRed,
        };

        let age = self.age_of(record);
        if age < FRESH_THRESHOLD {
            FreshnessTier::Fresh
        } else if age < YELLOW_THRESHOLD {
            FreshnessTier::StaleYellow
        } else if age < ORANGE_THRESHOLD {
            FreshnessTier::StaleOrange
        } else {
            FreshnessTier::StaleRed
        }
    }

    /// Remove one entry, or all entries when no key is given
    pub fn clear(&mut self, key: Option<&str>) {
        match key {
            Some(key) => {
                self.records.remove(key);
            }
            None => self.records.clear(),
        }
    }

    /// Number of records currently held, expired ones included
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
