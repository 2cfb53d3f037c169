//! Cache Store Module
//!
//! Bounded local cache: sharded slot slabs with W-TinyLFU admission and lazy
//! TTL expiration.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use bytes::Bytes;
use parking_lot::Mutex;
use tracing::debug;
use twox_hash::XxHash64;

use crate::cache::entry::{CacheEntry, Queue, SlotRef};
use crate::cache::lru::LruQueue;
use crate::cache::sketch::FrequencySketch;
use crate::cache::stats::{CacheStats, StatsRecorder};
use crate::remote::SetCondition;
use crate::tasks::Sweep;

/// Used when `now + ttl` does not fit in an `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(60 * 60 * 24 * 365 * 30);

// == Local Cache Config ==
/// Sizing and policy knobs for [`LocalCache`].
#[derive(Debug, Clone)]
pub struct LocalCacheConfig {
    /// Maximum number of entries across all shards
    pub capacity: usize,
    /// Number of independently locked shards
    pub shards: usize,
    /// TTL applied when a caller passes `Duration::ZERO`
    pub default_ttl: Duration,
    /// Share of each shard reserved for the admission window, in (0, 1)
    pub window_ratio: f64,
    /// Share of the main region reserved for protected entries, in (0, 1)
    pub protected_ratio: f64,
    /// Error bound of the frequency sketch
    pub sketch_eps: f64,
    /// Confidence of the frequency sketch
    pub sketch_confidence: f64,
    /// Recorded events between counter halvings, 0 for the sketch width
    pub decay_after: usize,
}

impl Default for LocalCacheConfig {
    fn default() -> Self {
        Self {
            capacity: 10_000,
            shards: 16,
            default_ttl: Duration::from_secs(60),
            window_ratio: 0.1,
            protected_ratio: 0.8,
            sketch_eps: 0.001,
            sketch_confidence: 0.9,
            decay_after: 0,
        }
    }
}

impl LocalCacheConfig {
    pub fn new(capacity: usize, default_ttl: Duration) -> Self {
        Self {
            capacity,
            default_ttl,
            ..Self::default()
        }
    }
}

// == Reclaimed ==
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct Reclaimed {
    evicted: usize,
    expired: usize,
}

enum Lookup {
    Hit(Bytes),
    Expired,
    Missing,
}

// == Shard ==
#[derive(Debug)]
struct Shard {
    slots: Vec<CacheEntry>,
    free: Vec<usize>,
    index: HashMap<String, SlotRef>,

    window: LruQueue,
    probation: LruQueue,
    protected: LruQueue,

    window_capacity: usize,
    main_capacity: usize,
    protected_capacity: usize,

    frequencies: FrequencySketch,
}

impl Shard {
    fn new(capacity: usize, config: &LocalCacheConfig) -> Self {
        let window_capacity = ((capacity as f64 * config.window_ratio) as usize).clamp(1, capacity.max(1));
        let main_capacity = capacity.saturating_sub(window_capacity);
        let protected_capacity = ((main_capacity as f64 * config.protected_ratio) as usize).min(main_capacity);

        Self {
            slots: Vec::with_capacity(capacity),
            free: Vec::new(),
            index: HashMap::with_capacity(capacity),
            window: LruQueue::new(),
            probation: LruQueue::new(),
            protected: LruQueue::new(),
            window_capacity,
            main_capacity,
            protected_capacity,
            frequencies: FrequencySketch::new(config.sketch_eps, config.sketch_confidence)
                .with_decay_after(config.decay_after),
        }
    }

    /// Index lookup validated against the slot generation.
    fn live_ref(&mut self, key: &str) -> Option<SlotRef> {
        let slot_ref = *self.index.get(key)?;
        if self.slots[slot_ref.slot].matches(slot_ref) {
            Some(slot_ref)
        } else {
            // The slot moved on to another tenant.
            self.index.remove(key);
            None
        }
    }

    fn get(&mut self, key: &str, hash: u64, now: Instant) -> Lookup {
        let Some(slot_ref) = self.live_ref(key) else {
            return Lookup::Missing;
        };
        if self.slots[slot_ref.slot].is_expired_at(now) {
            self.remove_slot(slot_ref.slot);
            return Lookup::Expired;
        }

        let payload = Bytes::copy_from_slice(&self.slots[slot_ref.slot].payload);
        self.frequencies.record(hash);
        self.on_access(slot_ref.slot);
        Lookup::Hit(payload)
    }

    /// Inserts unless `condition` rejects the current liveness of `key`.
    fn insert_if(
        &mut self,
        key: &str,
        hash: u64,
        payload: &[u8],
        expires_at: Instant,
        now: Instant,
        condition: SetCondition,
    ) -> Option<Reclaimed> {
        if condition != SetCondition::Always {
            let live = self
                .live_ref(key)
                .is_some_and(|slot_ref| !self.slots[slot_ref.slot].is_expired_at(now));
            if !condition.allows(live) {
                return None;
            }
        }
        Some(self.insert(key, hash, payload, expires_at, now))
    }

    fn insert(&mut self, key: &str, hash: u64, payload: &[u8], expires_at: Instant, now: Instant) -> Reclaimed {
        self.frequencies.record(hash);

        if let Some(slot_ref) = self.live_ref(key) {
            let generation = self.slots[slot_ref.slot].overwrite(payload, expires_at);
            if let Some(index_ref) = self.index.get_mut(key) {
                index_ref.generation = generation;
            }
            self.on_access(slot_ref.slot);
            return Reclaimed::default();
        }

        let idx = match self.free.pop() {
            Some(idx) => idx,
            None => {
                self.slots.push(CacheEntry::vacant(now));
                self.slots.len() - 1
            }
        };
        let generation = self.slots[idx].occupy(key, hash, payload, expires_at);
        self.slots[idx].queue = Queue::Window;
        self.window.push_back(&mut self.slots, idx);
        self.index.insert(key.to_owned(), SlotRef { slot: idx, generation });

        self.balance(now)
    }

    /// Moves window overflow into the main region, deciding admission by
    /// estimated frequency once the main region is full.
    fn balance(&mut self, now: Instant) -> Reclaimed {
        let mut reclaimed = Reclaimed::default();

        while self.window.len() > self.window_capacity {
            let Some(candidate) = self.window.pop_front(&mut self.slots) else {
                break;
            };

            if self.probation.len() + self.protected.len() < self.main_capacity {
                self.admit(candidate);
                continue;
            }

            let Some(victim) = self.probation.front().or_else(|| self.protected.front()) else {
                self.release(candidate);
                reclaimed.evicted += 1;
                continue;
            };

            if self.slots[candidate].is_expired_at(now) {
                self.release(candidate);
                reclaimed.expired += 1;
            } else if self.slots[victim].is_expired_at(now) {
                self.remove_slot(victim);
                self.admit(candidate);
                reclaimed.expired += 1;
            } else if self.frequencies.estimate(self.slots[candidate].hash)
                > self.frequencies.estimate(self.slots[victim].hash)
            {
                self.remove_slot(victim);
                self.admit(candidate);
                reclaimed.evicted += 1;
            } else {
                self.release(candidate);
                reclaimed.evicted += 1;
            }
        }

        reclaimed
    }

    fn admit(&mut self, idx: usize) {
        self.slots[idx].queue = Queue::Probation;
        self.probation.push_back(&mut self.slots, idx);
    }

    fn on_access(&mut self, idx: usize) {
        match self.slots[idx].queue {
            Queue::None => {}
            Queue::Window => self.window.touch(&mut self.slots, idx),
            Queue::Probation => {
                self.probation.remove(&mut self.slots, idx);
                self.slots[idx].queue = Queue::Protected;
                self.protected.push_back(&mut self.slots, idx);
                while self.protected.len() > self.protected_capacity {
                    let Some(demoted) = self.protected.pop_front(&mut self.slots) else {
                        break;
                    };
                    self.admit(demoted);
                }
            }
            Queue::Protected => self.protected.touch(&mut self.slots, idx),
        }
    }

    /// Unlinks the slot from its queue and releases it.
    fn remove_slot(&mut self, idx: usize) {
        match self.slots[idx].queue {
            Queue::None => return,
            Queue::Window => self.window.remove(&mut self.slots, idx),
            Queue::Probation => self.probation.remove(&mut self.slots, idx),
            Queue::Protected => self.protected.remove(&mut self.slots, idx),
        }
        self.release(idx);
    }

    /// Drops the index entry and recycles an already unlinked slot.
    fn release(&mut self, idx: usize) {
        self.index.remove(self.slots[idx].key.as_str());
        self.slots[idx].vacate();
        self.free.push(idx);
    }

    fn delete(&mut self, key: &str, now: Instant) -> bool {
        let Some(slot_ref) = self.live_ref(key) else {
            return false;
        };
        let live = !self.slots[slot_ref.slot].is_expired_at(now);
        self.remove_slot(slot_ref.slot);
        live
    }

    fn ttl(&mut self, key: &str, now: Instant) -> Option<Duration> {
        let slot_ref = self.live_ref(key)?;
        let entry = &self.slots[slot_ref.slot];
        (!entry.is_expired_at(now)).then(|| entry.ttl_remaining(now))
    }

    fn collect_expired(&self, now: Instant) -> Vec<SlotRef> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, entry)| entry.is_occupied() && entry.is_expired_at(now))
            .map(|(slot, entry)| SlotRef {
                slot,
                generation: entry.generation,
            })
            .collect()
    }

    /// Reclaims slots found by `collect_expired`, skipping any that were
    /// rewritten in between.
    fn reclaim_expired(&mut self, expired: &[SlotRef], now: Instant) -> usize {
        let mut count = 0;
        for &slot_ref in expired {
            let entry = &self.slots[slot_ref.slot];
            if entry.matches(slot_ref) && entry.is_expired_at(now) {
                self.remove_slot(slot_ref.slot);
                count += 1;
            }
        }
        count
    }

    fn len(&self) -> usize {
        self.index.len()
    }
}

// == Local Cache ==
/// Fixed-capacity, TTL-aware byte cache used as the first lookup tier.
///
/// Keys are spread over shards by xxHash64; each shard is guarded by its own
/// mutex. Payloads are copied out under the shard lock, so a reader gets the
/// exact bytes of one live entry or nothing.
#[derive(Debug)]
pub struct LocalCache {
    shards: Box<[Mutex<Shard>]>,
    capacity: usize,
    default_ttl: Duration,
    stats: StatsRecorder,
}

impl LocalCache {
    // == Constructor ==
    /// Creates a cache from `config`.
    ///
    /// # Panics
    /// If the window or protected ratio is outside (0, 1).
    pub fn new(config: LocalCacheConfig) -> Self {
        assert!(
            config.window_ratio > 0.0 && config.window_ratio < 1.0,
            "window_ratio must be in (0, 1), given: {}",
            config.window_ratio
        );
        assert!(
            config.protected_ratio > 0.0 && config.protected_ratio < 1.0,
            "protected_ratio must be in (0, 1), given: {}",
            config.protected_ratio
        );

        let capacity = config.capacity.max(1);
        let shard_count = config.shards.clamp(1, capacity);
        let base = capacity / shard_count;
        let extra = capacity % shard_count;

        let shards = (0..shard_count)
            .map(|i| Mutex::new(Shard::new(base + usize::from(i < extra), &config)))
            .collect();

        debug!(capacity, shards = shard_count, "local cache created");

        Self {
            shards,
            capacity,
            default_ttl: config.default_ttl,
            stats: StatsRecorder::default(),
        }
    }

    /// Creates a cache with default policy settings.
    pub fn with_capacity(capacity: usize, default_ttl: Duration) -> Self {
        Self::new(LocalCacheConfig::new(capacity, default_ttl))
    }

    fn hash(key: &str) -> u64 {
        XxHash64::oneshot(0, key.as_bytes())
    }

    fn shard(&self, hash: u64) -> &Mutex<Shard> {
        &self.shards[(hash % self.shards.len() as u64) as usize]
    }

    fn expiry(&self, now: Instant, ttl: Duration) -> Instant {
        let ttl = if ttl.is_zero() { self.default_ttl } else { ttl };
        now.checked_add(ttl).unwrap_or(now + FAR_FUTURE)
    }

    // == Set ==
    /// Stores `payload` under `key`, overwriting any previous entry.
    ///
    /// `Duration::ZERO` means the default TTL. When the shard is full the
    /// admission policy picks what to drop, which may be the new entry itself.
    pub fn set(&self, key: &str, payload: &[u8], ttl: Duration) {
        self.set_if(key, payload, ttl, SetCondition::Always);
    }

    /// Stores `payload` only if `condition` holds for the current entry.
    ///
    /// The check and the write happen under one shard lock. Returns whether
    /// the write happened.
    pub fn set_if(&self, key: &str, payload: &[u8], ttl: Duration, condition: SetCondition) -> bool {
        let hash = Self::hash(key);
        let now = Instant::now();
        let expires_at = self.expiry(now, ttl);

        let reclaimed = self
            .shard(hash)
            .lock()
            .insert_if(key, hash, payload, expires_at, now, condition);
        match reclaimed {
            Some(reclaimed) => {
                self.stats.record_evictions(reclaimed.evicted);
                self.stats.record_expirations(reclaimed.expired);
                true
            }
            None => false,
        }
    }

    // == Get ==
    /// Returns a copy of the payload if `key` is present and not expired.
    pub fn get(&self, key: &str) -> Option<Bytes> {
        let hash = Self::hash(key);
        let lookup = self.shard(hash).lock().get(key, hash, Instant::now());

        match lookup {
            Lookup::Hit(payload) => {
                self.stats.record_hit();
                Some(payload)
            }
            Lookup::Expired => {
                self.stats.record_expirations(1);
                self.stats.record_miss();
                None
            }
            Lookup::Missing => {
                self.stats.record_miss();
                None
            }
        }
    }

    // == Delete ==
    /// Removes `key`. Returns true if a live entry was removed.
    pub fn delete(&self, key: &str) -> bool {
        let hash = Self::hash(key);
        self.shard(hash).lock().delete(key, Instant::now())
    }

    /// Returns true if `key` has a live entry. Does not count as an access.
    pub fn contains(&self, key: &str) -> bool {
        self.ttl(key).is_some()
    }

    /// Remaining lifetime of a live entry.
    pub fn ttl(&self, key: &str) -> Option<Duration> {
        let hash = Self::hash(key);
        self.shard(hash).lock().ttl(key, Instant::now())
    }

    // == Purge Expired ==
    /// Reclaims every expired slot. Returns the number of entries removed.
    ///
    /// Each shard is scanned and reclaimed under two short lock holds; entries
    /// rewritten in between are left alone.
    pub fn purge_expired(&self) -> usize {
        let mut removed = 0;
        for shard in self.shards.iter() {
            let expired = shard.lock().collect_expired(Instant::now());
            if !expired.is_empty() {
                removed += shard.lock().reclaim_expired(&expired, Instant::now());
            }
        }
        self.stats.record_expirations(removed);
        removed
    }

    // == Length ==
    /// Number of occupied slots, including expired ones not yet reclaimed.
    pub fn len(&self) -> usize {
        self.shards.iter().map(|shard| shard.lock().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    // == Stats ==
    /// Returns current cache statistics.
    pub fn stats(&self) -> CacheStats {
        self.stats.snapshot(self.len())
    }
}

impl Sweep for LocalCache {
    fn purge_expired(&self) -> usize {
        LocalCache::purge_expired(self)
    }
}
