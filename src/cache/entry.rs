//! Cache Entry Module
//!
//! Defines the reusable storage slot backing each local cache entry.

use std::time::{Duration, Instant};

use crate::cache::lru::{Link, Linked};

// == Queue ==
/// Which eviction queue a slot currently sits in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Queue {
    /// Slot is vacant
    None,
    /// Admission window for new entries
    Window,
    /// Main region, not yet proven hot
    Probation,
    /// Main region, accessed at least once since admission
    Protected,
}

// == Slot Ref ==
/// Index entry pointing at a slot occupied by a particular tenant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SlotRef {
    pub slot: usize,
    pub generation: u64,
}

// == Cache Entry ==
/// A physical storage slot.
///
/// Slots are recycled through the shard free list and keep their payload
/// allocation across tenants. `generation` changes on every write into the
/// slot and every time it is vacated, so a `SlotRef` taken earlier no longer
/// matches once the bytes it described are gone.
#[derive(Debug)]
pub(crate) struct CacheEntry {
    pub key: String,
    pub hash: u64,
    pub payload: Vec<u8>,
    pub expires_at: Instant,
    pub generation: u64,
    pub queue: Queue,
    link: Link,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates a vacant slot.
    pub fn vacant(now: Instant) -> Self {
        Self {
            key: String::new(),
            hash: 0,
            payload: Vec::new(),
            expires_at: now,
            generation: 0,
            queue: Queue::None,
            link: Link::default(),
        }
    }

    pub fn is_occupied(&self) -> bool {
        self.queue != Queue::None
    }

    /// Writes a tenant into the slot, reusing the payload buffer.
    ///
    /// Returns the new generation.
    pub fn occupy(&mut self, key: &str, hash: u64, payload: &[u8], expires_at: Instant) -> u64 {
        self.key.clear();
        self.key.push_str(key);
        self.hash = hash;
        self.overwrite(payload, expires_at)
    }

    /// Replaces the payload of the current tenant and returns the new generation.
    pub fn overwrite(&mut self, payload: &[u8], expires_at: Instant) -> u64 {
        self.generation = self.generation.wrapping_add(1);
        self.payload.clear();
        self.payload.extend_from_slice(payload);
        self.expires_at = expires_at;
        self.generation
    }

    /// Marks the slot vacant. The payload allocation is kept for the next tenant.
    pub fn vacate(&mut self) {
        self.generation = self.generation.wrapping_add(1);
        self.payload.clear();
        self.key.clear();
        self.queue = Queue::None;
    }

    /// Returns true when the slot still holds the tenant `slot_ref` was taken for.
    pub fn matches(&self, slot_ref: SlotRef) -> bool {
        self.is_occupied() && self.generation == slot_ref.generation
    }

    // == Is Expired ==
    /// An entry is expired once `now` reaches its expiration instant.
    pub fn is_expired_at(&self, now: Instant) -> bool {
        now >= self.expires_at
    }

    // == Time To Live ==
    /// Remaining lifetime, zero once expired.
    pub fn ttl_remaining(&self, now: Instant) -> Duration {
        self.expires_at.saturating_duration_since(now)
    }
}

impl Linked for CacheEntry {
    fn link(&self) -> &Link {
        &self.link
    }

    fn link_mut(&mut self) -> &mut Link {
        &mut self.link
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    fn slot_ref(generation: u64) -> SlotRef {
        SlotRef {
            slot: 0,
            generation,
        }
    }

    #[test]
    fn test_occupy_and_expire() {
        let now = Instant::now();
        let mut entry = CacheEntry::vacant(now);
        entry.queue = Queue::Window;
        let generation = entry.occupy("key1", 7, b"value1", now + Duration::from_secs(10));

        assert_eq!(entry.key, "key1");
        assert_eq!(entry.payload, b"value1");
        assert!(entry.matches(slot_ref(generation)));
        assert!(!entry.is_expired_at(now));
        assert!(entry.is_expired_at(now + Duration::from_secs(10)));
    }

    #[test]
    fn test_expiration_boundary_condition() {
        let now = Instant::now();
        let mut entry = CacheEntry::vacant(now);
        entry.occupy("k", 0, b"v", now);
        assert!(entry.is_expired_at(now), "Entry should be expired at boundary");
        assert_eq!(entry.ttl_remaining(now), Duration::ZERO);
    }

    #[test]
    fn test_ttl_remaining() {
        let now = Instant::now();
        let mut entry = CacheEntry::vacant(now);
        entry.occupy("k", 0, b"v", now + Duration::from_secs(10));
        assert_eq!(entry.ttl_remaining(now), Duration::from_secs(10));
        assert_eq!(
            entry.ttl_remaining(now + Duration::from_secs(4)),
            Duration::from_secs(6)
        );
    }

    #[test]
    fn test_reuse_changes_generation() {
        let now = Instant::now();
        let mut entry = CacheEntry::vacant(now);
        entry.queue = Queue::Window;
        let first = slot_ref(entry.occupy("old", 1, b"old-bytes", now + Duration::from_secs(1)));

        entry.vacate();
        assert!(!entry.matches(first));
        assert!(entry.payload.is_empty());

        entry.queue = Queue::Window;
        let second = slot_ref(entry.occupy("new", 2, b"new", now + Duration::from_secs(1)));
        assert!(!entry.matches(first), "previous tenant must not match reused slot");
        assert!(entry.matches(second));
        assert_eq!(entry.payload, b"new");
    }

    #[test]
    fn test_overwrite_invalidates_previous_ref() {
        let now = Instant::now();
        let mut entry = CacheEntry::vacant(now);
        entry.queue = Queue::Probation;
        let first = slot_ref(entry.occupy("k", 1, b"v1", now + Duration::from_secs(1)));
        let second = slot_ref(entry.overwrite(b"v2", now + Duration::from_secs(2)));
        assert!(!entry.matches(first));
        assert!(entry.matches(second));
    }
}
