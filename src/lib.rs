//! Stormdeck - Data-Freshness and Access-Control Engine for Hazard Dashboards
//!
//! Stormdeck is the client-side core of a cyclone hazard dashboard. It decides
//! when hazard data is fetched, cached, throttled, retried, or served stale, and
//! it keeps user convenience state (saved routes, checklist, language) in a
//! quota-bounded persistent store. Presentation concerns (maps, layout,
//! translations) live in the consuming host.
//!
//! # Architecture
//!
//! - **severity**: pure hazard measurement scoring (no dependencies)
//! - **cache**: in-memory TTL store with UI freshness tiers
//! - **ratelimit**: sliding-window per-endpoint request limiter
//! - **storage**: durable quota-bounded key/value store for user state
//! - **access**: retrying fetch layer composing cache + limiter + transport
//! - **orchestrator**: concurrent refresh coordination, health map, auto-refresh
//! - **config**: YAML configuration for all of the above

// Core modules
pub mod access;
pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod logging;
pub mod orchestrator;
pub mod ratelimit;
pub mod severity;
pub mod storage;

// Re-exports
pub use error::{Result, StormdeckError};
