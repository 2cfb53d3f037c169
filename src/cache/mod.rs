//! Cache Module
//!
//! Bounded in-process cache with TTL expiration and TinyLFU-style admission.

mod entry;
mod lru;
mod sketch;
mod stats;
mod store;

#[cfg(test)]
mod property_tests;

// Re-export public types
pub use stats::CacheStats;
pub(crate) use stats::StatsRecorder;
pub use store::{LocalCache, LocalCacheConfig};
