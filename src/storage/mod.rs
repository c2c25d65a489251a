//! Persistent user state
//!
//! Durable, quota-bounded key/value layer for user convenience data: saved
//! evacuation routes, the preparation checklist, the language preference, and the
//! last viewed cyclone. Persistence is best-effort: every failure is logged and
//! surfaces as an empty or default result, never as an error the UI has to
//! handle.

mod backend;

pub use backend::{KvBackend, MemoryBackend, SqliteBackend};

use crate::clock::Clock;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Key namespace for every record this store owns
const NAMESPACE: &str = "stormdeck:";
/// Route records live under this prefix, one record per source/destination pair
const ROUTE_PREFIX: &str = "stormdeck:route:";
const CHECKLIST_KEY: &str = "stormdeck:checklist";
const LAST_CYCLONE_KEY: &str = "stormdeck:last_cyclone";
/// The language preference never expires and is never evicted by quota
const LANGUAGE_KEY: &str = "stormdeck:language";

/// Total serialized size budget across all namespaced records
pub const DEFAULT_QUOTA_BYTES: u64 = 5 * 1024 * 1024;
/// Records older than this are invalid and purged on read
pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// A user-saved evacuation route
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedRoute {
    pub id: String,
    pub source: String,
    pub destination: String,
    /// Set by the store at write time (epoch ms)
    #[serde(default)]
    pub saved_at: i64,
}

/// One preparation checklist entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChecklistItem {
    pub id: String,
    pub done: bool,
}

/// The whole preparation checklist
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChecklistState {
    pub items: Vec<ChecklistItem>,
    /// Set by the store at write time (epoch ms)
    #[serde(default)]
    pub last_updated: i64,
}

/// Envelope wrapping every persisted payload with its write time
#[derive(Debug, Serialize, Deserialize)]
struct PersistedRecord<T> {
    payload: T,
    stored_at: i64,
}

/// UTF-16 byte size of a serialized value (2 bytes per code unit)
fn utf16_size(value: &str) -> u64 {
    value.encode_utf16().count() as u64 * 2
}

/// Normalized eviction/dedup key segment for a route pair
fn route_key(source: &str, destination: &str) -> String {
    format!(
        "{}{}|{}",
        ROUTE_PREFIX,
        source.trim().to_lowercase(),
        destination.trim().to_lowercase()
    )
}

/// Quota-bounded persistent store over an injected key/value backend
pub struct PersistentStore {
    backend: Box<dyn KvBackend>,
    clock: Arc<dyn Clock>,
    quota_bytes: u64,
    max_age: Duration,
}

impl PersistentStore {
    pub fn new(backend: Box<dyn KvBackend>, clock: Arc<dyn Clock>) -> Self {
        Self::with_limits(backend, clock, DEFAULT_QUOTA_BYTES, DEFAULT_MAX_AGE)
    }

    pub fn with_limits(
        backend: Box<dyn KvBackend>,
        clock: Arc<dyn Clock>,
        quota_bytes: u64,
        max_age: Duration,
    ) -> Self {
        Self {
            backend,
            clock,
            quota_bytes,
            max_age,
        }
    }

    // ---- generic record plumbing ----

    fn write_record<T: Serialize>(&self, key: &str, payload: &T) {
        let record = PersistedRecord {
            payload,
            stored_at: self.clock.now_ms(),
        };
        let serialized = match serde_json::to_string(&record) {
            Ok(s) => s,
            Err(e) => {
                tracing::error!(operation = "write_record", key, error = %e, "Serialization failed");
                return;
            }
        };
        if let Err(e) = self.backend.set(key, &serialized) {
            tracing::error!(operation = "write_record", key, error = %e, "Backend write failed");
        }
    }

    /// Read a record, purging it when corrupt or (for non-exempt keys) too old
    fn read_record<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = match self.backend.get(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                tracing::error!(operation = "read_record", key, error = %e, "Backend read failed");
                return None;
            }
        };

        let record: PersistedRecord<T> = match serde_json::from_str(&raw) {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(operation = "read_record", key, error = %e, "Deleting corrupt record");
                self.remove_quiet(key);
                return None;
            }
        };

        if key != LANGUAGE_KEY {
            let age_ms = self.clock.now_ms() - record.stored_at;
            if age_ms > self.max_age.as_millis() as i64 {
                tracing::debug!(key, age_ms, "Purging aged-out record");
                self.remove_quiet(key);
                return None;
            }
        }

        Some(record.payload)
    }

    fn remove_quiet(&self, key: &str) {
        if let Err(e) = self.backend.remove(key) {
            tracing::error!(operation = "remove", key, error = %e, "Backend delete failed");
        }
    }

    fn namespaced_keys(&self) -> Vec<String> {
        match self.backend.keys() {
            Ok(keys) => keys
                .into_iter()
                .filter(|k| k.starts_with(NAMESPACE))
                .collect(),
            Err(e) => {
                tracing::error!(operation = "keys", error = %e, "Backend key listing failed");
                Vec::new()
            }
        }
    }

    // ---- routes ----

    /// Save a route, replacing any existing route for the same source/destination
    /// pair (the new id and timestamp win)
    pub fn save_route(&self, mut route: SavedRoute) {
        route.saved_at = self.clock.now_ms();
        let key = route_key(&route.source, &route.destination);
        self.write_record(&key, &route);
        self.enforce_quota();
    }

    /// All saved routes still within the age budget, oldest first
    pub fn saved_routes(&self) -> Vec<SavedRoute> {
        let mut routes: Vec<SavedRoute> = self
            .namespaced_keys()
            .into_iter()
            .filter(|k| k.starts_with(ROUTE_PREFIX))
            .filter_map(|k| self.read_record(&k))
            .collect();
        routes.sort_by_key(|r| r.saved_at);
        routes
    }

    pub fn delete_route(&self, source: &str, destination: &str) {
        self.remove_quiet(&route_key(source, destination));
    }

    // ---- checklist ----

    pub fn save_checklist(&self, mut state: ChecklistState) {
        state.last_updated = self.clock.now_ms();
        self.write_record(CHECKLIST_KEY, &state);
        self.enforce_quota();
    }

    pub fn checklist(&self) -> Option<ChecklistState> {
        self.read_record(CHECKLIST_KEY)
    }

    // ---- language preference (exempt from expiry and eviction) ----

    pub fn set_language(&self, language: &str) {
        self.write_record(LANGUAGE_KEY, &language.to_string());
    }

    pub fn language(&self) -> Option<String> {
        self.read_record(LANGUAGE_KEY)
    }

    // ---- last viewed cyclone ----

    pub fn set_last_cyclone(&self, cyclone_id: &str) {
        self.write_record(LAST_CYCLONE_KEY, &cyclone_id.to_string());
    }

    pub fn last_cyclone(&self) -> Option<String> {
        self.read_record(LAST_CYCLONE_KEY)
    }

    // ---- maintenance ----

    /// Delete every non-exempt record older than the given age; corrupt records
    /// are deleted outright
    pub fn clear_older_than(&self, max_age: Duration) {
        let cutoff = self.clock.now_ms() - max_age.as_millis() as i64;

        for key in self.namespaced_keys() {
            if key == LANGUAGE_KEY {
                continue;
            }
            let raw = match self.backend.get(&key) {
                Ok(Some(raw)) => raw,
                Ok(None) => continue,
                Err(e) => {
                    tracing::error!(operation = "clear_older_than", key, error = %e, "Backend read failed");
                    continue;
                }
            };
            match serde_json::from_str::<PersistedRecord<serde_json::Value>>(&raw) {
                Ok(record) if record.stored_at < cutoff => {
                    tracing::debug!(key, "Sweeping aged-out record");
                    self.remove_quiet(&key);
                }
                Ok(_) => {}
                Err(_) => {
                    tracing::warn!(key, "Sweeping corrupt record");
                    self.remove_quiet(&key);
                }
            }
        }
    }

    /// Delete every namespaced record, exempt ones included
    pub fn clear_all(&self) {
        for key in self.namespaced_keys() {
            self.remove_quiet(&key);
        }
    }

    /// Total UTF-16 byte size of all namespaced serialized values
    pub fn total_size(&self) -> u64 {
        self.namespaced_keys()
            .into_iter()
            .filter_map(|k| self.backend.get(&k).ok().flatten())
            .map(|v| utf16_size(&v))
            .sum()
    }

    /// Evict oldest non-exempt records one at a time until under quota
    ///
    /// Eviction is by age, not size or access frequency; simplicity over
    /// optimality is a deliberate tradeoff for convenience data.
    fn enforce_quota(&self) {
        while self.total_size() > self.quota_bytes {
            let mut evictable: Vec<(String, i64)> = Vec::new();

            for key in self.namespaced_keys() {
                if key == LANGUAGE_KEY {
                    continue;
                }
                let raw = match self.backend.get(&key) {
                    Ok(Some(raw)) => raw,
                    _ => continue,
                };
                match serde_json::from_str::<PersistedRecord<serde_json::Value>>(&raw) {
                    Ok(record) => evictable.push((key, record.stored_at)),
                    Err(_) => {
                        // Corrupt entries count against quota; reclaim them first
                        self.remove_quiet(&key);
                    }
                }
            }

            let oldest = evictable.into_iter().min_by_key(|(_, stored_at)| *stored_at);
            match oldest {
                Some((key, _)) => {
                    tracing::info!(key = %key, "Evicting oldest record to stay under quota");
                    self.remove_quiet(&key);
                }
                // Nothing left to evict; exempt records alone exceed the quota
                None => break,
            }
        }
    }
}
