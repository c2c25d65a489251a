//! Cache layer for fetched hazard resources
//!
//! Provides an in-memory TTL store keyed by logical resource name, with
//! age-based freshness tiers for the presentation layer.

mod store;

pub use store::{CacheStore, FreshnessTier};
