//! Resource access layer
//!
//! Composes the TTL cache, the sliding-window rate limiter, and the retrying
//! transport into a single `fetch` entry point with the serve-stale policy:
//!
//! 1. a valid cache hit short-circuits (no network, no limiter charge);
//! 2. a limiter denial transparently resolves to the last cached value, valid or
//!    not, or `None` when nothing was ever cached;
//! 3. otherwise the transport call runs under the retry budget; success is
//!    recorded against the limiter and cached;
//! 4. a final failure falls back to any cached value (stale-while-erroring) and
//!    only propagates when the cache holds nothing for the key.

pub mod retry;
pub mod transport;

pub use retry::{with_retry, RetryConfig, RetryDecision, RetryableError};
pub use transport::{Endpoint, HttpTransport, Transport, TransportResponse};

use crate::cache::{CacheStore, FreshnessTier};
use crate::clock::Clock;
use crate::ratelimit::SlidingWindowLimiter;
use crate::{Result, StormdeckError};
use serde_json::Value;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Validate a response payload before it enters the cache
///
/// The provider speaks JSON objects and arrays; null or scalar bodies signal a
/// malformed response and are rejected before being trusted as data.
fn validate_payload(body: &Value) -> Result<()> {
    match body {
        Value::Object(_) | Value::Array(_) => Ok(()),
        Value::Null => Err(StormdeckError::Validation(
            "null response payload".to_string(),
        )),
        other => Err(StormdeckError::Validation(format!(
            "expected object or array, got {}",
            other
        ))),
    }
}

/// Cache-and-limit-aware fetch layer over an injected transport
///
/// The cache and limiter sit behind mutexes so that independent resources can be
/// fetched concurrently; locks are only held for map lookups, never across an
/// await point.
pub struct AccessLayer {
    cache: Mutex<CacheStore<Value>>,
    limiter: Mutex<SlidingWindowLimiter>,
    transport: Arc<dyn Transport>,
    retry: RetryConfig,
}

impl AccessLayer {
    pub fn new(transport: Arc<dyn Transport>, clock: Arc<dyn Clock>) -> Self {
        Self::with_parts(
            transport,
            CacheStore::new(clock.clone()),
            SlidingWindowLimiter::new(clock),
            RetryConfig::default(),
        )
    }

    /// Assemble from explicitly constructed parts (dependency injection seam)
    pub fn with_parts(
        transport: Arc<dyn Transport>,
        cache: CacheStore<Value>,
        limiter: SlidingWindowLimiter,
        retry: RetryConfig,
    ) -> Self {
        Self {
            cache: Mutex::new(cache),
            limiter: Mutex::new(limiter),
            transport,
            retry,
        }
    }

    /// Fetch a logical resource, caching the result with the given TTL
    ///
    /// `Ok(None)` means the request was locally rate limited and no cached value
    /// exists; rate limiting is never surfaced as an error.
    pub async fn fetch(&self, endpoint: &Endpoint, ttl: Duration) -> Result<Option<Value>> {
        let key = endpoint.key();

        // Valid cache hit: no network, no limiter charge
        {
            let mut cache = self.cache.lock().expect("cache lock poisoned");
            if cache.is_valid(&key) {
                tracing::debug!(key = %key, "Serving valid cached value");
                return Ok(cache.get(&key));
            }
        }

        // Locally throttled: serve whatever we have, valid or not
        {
            let mut limiter = self.limiter.lock().expect("limiter lock poisoned");
            if !limiter.can_make_request(&key) {
                let wait = limiter.time_until_next_request(&key);
                drop(limiter);
                tracing::debug!(
                    key = %key,
                    wait_secs = wait.as_secs(),
                    "Rate limited, serving stale cached value"
                );
                let cache = self.cache.lock().expect("cache lock poisoned");
                return Ok(cache.peek_any(&key));
            }
        }

        let path = endpoint.path();
        let outcome = with_retry(&self.retry, &key, || self.request_once(&path)).await;

        match outcome {
            Ok(value) => {
                self.limiter
                    .lock()
                    .expect("limiter lock poisoned")
                    .record_request(&key);
                self.cache
                    .lock()
                    .expect("cache lock poisoned")
                    .set(key, value.clone(), ttl);
                Ok(Some(value))
            }
            Err(e) => {
                let stale = self
                    .cache
                    .lock()
                    .expect("cache lock poisoned")
                    .peek_any(&key);
                match stale {
                    Some(value) => {
                        tracing::warn!(
                            key = %key,
                            error = %e,
                            "Fetch failed, serving stale cached value"
                        );
                        Ok(Some(value))
                    }
                    None => {
                        tracing::error!(key = %key, error = %e, "Fetch failed with no fallback");
                        Err(e)
                    }
                }
            }
        }
    }

    /// One transport round-trip with status interpretation and shape validation
    async fn request_once(&self, path: &str) -> Result<Value> {
        let response = self.transport.request(path).await?;

        match response.status {
            200..=299 => {
                validate_payload(&response.body)?;
                Ok(response.body)
            }
            status @ 500..=599 => Err(StormdeckError::Upstream {
                status,
                message: format!("server error on {}", path),
            }),
            status => Err(StormdeckError::Upstream {
                status,
                message: format!("request to {} rejected", path),
            }),
        }
    }

    /// Display freshness of a resource's cached value
    pub fn freshness(&self, endpoint: &Endpoint) -> FreshnessTier {
        self.cache
            .lock()
            .expect("cache lock poisoned")
            .freshness(&endpoint.key())
    }

    /// Remaining request budget for a resource in the current window
    pub fn remaining_requests(&self, endpoint: &Endpoint) -> u32 {
        self.limiter
            .lock()
            .expect("limiter lock poisoned")
            .remaining_requests(&endpoint.key())
    }

    /// Drop cached state for one resource, or everything
    pub fn invalidate(&self, endpoint: Option<&Endpoint>) {
        let mut cache = self.cache.lock().expect("cache lock poisoned");
        match endpoint {
            Some(endpoint) => cache.clear(Some(&endpoint.key())),
            None => cache.clear(None),
        }
    }

    /// Direct transport probe, bypassing cache, limiter, and retries
    pub(crate) async fn probe(&self, endpoint: &Endpoint) -> Result<TransportResponse> {
        self.transport.request(&endpoint.path()).await
    }
}
