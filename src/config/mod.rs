//! Configuration system
//!
//! Loads ~/.config/stormdeck/config.yaml with sections for:
//! - Upstream API location and request timeout
//! - Cache TTL
//! - Rate limiting
//! - Retry/backoff budget
//! - Persistent storage path, quota, and max age
//! - Auto-refresh interval

mod stormdeck_config;

pub use stormdeck_config::{
    ApiConfig, CacheConfig, RateLimitConfig, RetrySettings, StorageConfig, StormdeckConfig,
};
