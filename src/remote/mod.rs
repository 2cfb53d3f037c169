//! Remote Store Module
//!
//! The contract the shared second tier must satisfy, plus two backends:
//! an in-process map and an HTTP client for the cache node.

mod http;
mod memory;

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

pub use http::HttpRemote;
pub use memory::MemoryRemote;

// == Set Condition ==
/// When a remote write should take effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SetCondition {
    /// Always write
    #[default]
    #[serde(rename = "always")]
    Always,
    /// Write only if the key is absent (NX)
    #[serde(rename = "nx")]
    IfAbsent,
    /// Write only if the key is present (XX)
    #[serde(rename = "xx")]
    IfPresent,
}

impl SetCondition {
    pub fn as_str(&self) -> &'static str {
        match self {
            SetCondition::Always => "always",
            SetCondition::IfAbsent => "nx",
            SetCondition::IfPresent => "xx",
        }
    }

    /// Decides whether a write proceeds given whether the key currently exists.
    pub fn allows(&self, exists: bool) -> bool {
        match self {
            SetCondition::Always => true,
            SetCondition::IfAbsent => !exists,
            SetCondition::IfPresent => exists,
        }
    }
}

// == Remote Store ==
/// Shared key/value backend used as the second cache tier.
///
/// Implementations synchronize internally; the cache calls them from many
/// tasks at once. A missing key is `Ok(None)` / `Ok(false)`, never an error.
#[async_trait]
pub trait RemoteStore: Send + Sync + 'static {
    /// Fetches the payload stored under `key`.
    async fn get(&self, key: &str) -> Result<Option<Bytes>, StoreError>;

    /// Stores `payload` under `key` for `ttl` (`Duration::ZERO` = no expiry).
    ///
    /// Returns whether the write happened; a failed `condition` is `Ok(false)`.
    async fn set(
        &self,
        key: &str,
        payload: Bytes,
        ttl: Duration,
        condition: SetCondition,
    ) -> Result<bool, StoreError>;

    /// Removes `key`. Returns whether it existed.
    async fn delete(&self, key: &str) -> Result<bool, StoreError>;

    /// Lightweight existence probe.
    async fn exists(&self, key: &str) -> Result<bool, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_condition_allows() {
        assert!(SetCondition::Always.allows(true));
        assert!(SetCondition::Always.allows(false));
        assert!(SetCondition::IfAbsent.allows(false));
        assert!(!SetCondition::IfAbsent.allows(true));
        assert!(SetCondition::IfPresent.allows(true));
        assert!(!SetCondition::IfPresent.allows(false));
    }

    #[test]
    fn test_condition_serde_matches_as_str() {
        for condition in [SetCondition::Always, SetCondition::IfAbsent, SetCondition::IfPresent] {
            let json = serde_json::to_string(&condition).unwrap();
            assert_eq!(json, format!("\"{}\"", condition.as_str()));
            let back: SetCondition = serde_json::from_str(&json).unwrap();
            assert_eq!(back, condition);
        }
    }
}
