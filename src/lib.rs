//! Tiered Cache - a two-tier read-through cache
//!
//! A bounded in-process TinyLFU tier in front of an optional shared remote
//! store, with single-flight computation of missing values.
//!
//! The crate also ships the cache node: a small HTTP key/value server that
//! [`HttpRemote`] talks to.

pub mod api;
pub mod cache;
pub mod codec;
pub mod config;
pub mod error;
pub mod models;
pub mod remote;
pub mod tasks;
pub mod tiered;

pub use api::AppState;
pub use cache::{CacheStats, LocalCache, LocalCacheConfig};
pub use codec::{CacheValue, Serde};
pub use config::Config;
pub use error::{CacheError, CodecError, StoreError};
pub use remote::{HttpRemote, MemoryRemote, RemoteStore, SetCondition};
pub use tasks::spawn_cleanup_task;
pub use tiered::{ComputeScope, Item, TierStats, TieredCache, TieredCacheBuilder, Ttl};
