//! Request DTOs for the cache node API
//!
//! Defines the query parameters accepted alongside raw payload bodies.

use std::time::Duration;

use serde::Deserialize;

use crate::remote::SetCondition;

/// Maximum allowed key length in bytes
pub const MAX_KEY_LENGTH: usize = 1024;

/// Maximum allowed payload size in bytes
pub const MAX_VALUE_SIZE: usize = 1024 * 1024; // 1 MB

/// Query parameters for `PUT /keys/:key`
///
/// # Fields
/// - `ttl_ms`: Optional TTL in milliseconds (absent or 0 = no expiry)
/// - `condition`: `always` (default), `nx` or `xx`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SetParams {
    /// Optional TTL in milliseconds
    #[serde(default)]
    pub ttl_ms: Option<u64>,
    /// Write condition
    #[serde(default)]
    pub condition: SetCondition,
}

impl SetParams {
    /// TTL to hand to the store.
    pub fn ttl(&self) -> Duration {
        Duration::from_millis(self.ttl_ms.unwrap_or(0))
    }

    /// Validates a write of `payload_len` bytes under `key`.
    ///
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self, key: &str, payload_len: usize) -> Option<String> {
        if key.is_empty() {
            return Some("Key cannot be empty".to_string());
        }
        if key.len() > MAX_KEY_LENGTH {
            return Some(format!(
                "Key exceeds maximum length of {} bytes",
                MAX_KEY_LENGTH
            ));
        }
        if payload_len > MAX_VALUE_SIZE {
            return Some(format!(
                "Value exceeds maximum size of {} bytes",
                MAX_VALUE_SIZE
            ));
        }
        None
    }
}
