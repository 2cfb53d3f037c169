//! Property-Based Tests for Cache Module
//!
//! Uses proptest to check the local cache against a model of its behavior.

use proptest::prelude::*;
use std::collections::HashMap;
use std::thread::sleep;
use std::time::Duration;

use bytes::Bytes;

use crate::cache::{LocalCache, LocalCacheConfig};

// == Test Configuration ==
const TEST_CAPACITY: usize = 100;
const TEST_DEFAULT_TTL: Duration = Duration::from_secs(300);

// == Strategies ==
/// Generates valid cache keys (non-empty)
fn valid_key_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9_]{1,64}".prop_map(|s| s)
}

/// Generates arbitrary payloads, including empty ones
fn payload_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..256)
}

#[derive(Debug, Clone)]
enum CacheOp {
    Set { key: String, payload: Vec<u8> },
    Get { key: String },
    Delete { key: String },
}

fn cache_op_strategy() -> impl Strategy<Value = CacheOp> {
    // Small key space so operations collide.
    let key = "k[0-9]{1,2}";
    prop_oneof![
        (key, payload_strategy()).prop_map(|(key, payload)| CacheOp::Set { key, payload }),
        key.prop_map(|key| CacheOp::Get { key }),
        key.prop_map(|key| CacheOp::Delete { key }),
    ]
}

fn new_store(capacity: usize) -> LocalCache {
    LocalCache::new(LocalCacheConfig {
        capacity,
        shards: 4,
        default_ttl: TEST_DEFAULT_TTL,
        ..LocalCacheConfig::default()
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // With room for every key, the cache behaves exactly like a map and
    // the hit/miss counters match what callers observed.
    #[test]
    fn prop_matches_map_model(ops in prop::collection::vec(cache_op_strategy(), 1..80)) {
        let store = new_store(TEST_CAPACITY * 4);
        let mut model: HashMap<String, Vec<u8>> = HashMap::new();
        let mut expected_hits: u64 = 0;
        let mut expected_misses: u64 = 0;

        for op in ops {
            match op {
                CacheOp::Set { key, payload } => {
                    store.set(&key, &payload, Duration::ZERO);
                    model.insert(key, payload);
                }
                CacheOp::Get { key } => {
                    let got = store.get(&key);
                    prop_assert_eq!(got.as_deref(), model.get(&key).map(Vec::as_slice));
                    match got {
                        Some(_) => expected_hits += 1,
                        None => expected_misses += 1,
                    }
                }
                CacheOp::Delete { key } => {
                    prop_assert_eq!(store.delete(&key), model.remove(&key).is_some());
                }
            }
        }

        let stats = store.stats();
        prop_assert_eq!(stats.hits, expected_hits, "Hits mismatch");
        prop_assert_eq!(stats.misses, expected_misses, "Misses mismatch");
        prop_assert_eq!(stats.total_entries, model.len(), "Total entries mismatch");
    }

    // Storing a payload and reading it back returns the exact bytes.
    #[test]
    fn prop_roundtrip_storage(key in valid_key_strategy(), payload in payload_strategy()) {
        let store = new_store(TEST_CAPACITY);
        store.set(&key, &payload, Duration::ZERO);
        prop_assert_eq!(store.get(&key), Some(Bytes::from(payload)));
    }

    // Storing V1 then V2 under the same key reads back V2.
    #[test]
    fn prop_overwrite_semantics(
        key in valid_key_strategy(),
        first in payload_strategy(),
        second in payload_strategy()
    ) {
        let store = new_store(TEST_CAPACITY);
        store.set(&key, &first, Duration::ZERO);
        store.set(&key, &second, Duration::ZERO);

        prop_assert_eq!(store.get(&key), Some(Bytes::from(second)));
        prop_assert_eq!(store.len(), 1, "Should have exactly one entry after overwrite");
    }

    // The number of entries never exceeds the configured capacity, and
    // whatever survives still holds the last bytes written for its key.
    #[test]
    fn prop_capacity_enforcement(
        entries in prop::collection::vec((valid_key_strategy(), payload_strategy()), 1..300)
    ) {
        let capacity = 50;
        let store = new_store(capacity);
        let mut last: HashMap<String, Vec<u8>> = HashMap::new();

        for (key, payload) in entries {
            store.set(&key, &payload, Duration::ZERO);
            last.insert(key, payload);
            prop_assert!(
                store.len() <= capacity,
                "Cache size {} exceeds max {}",
                store.len(),
                capacity
            );
        }

        for (key, payload) in &last {
            if let Some(bytes) = store.get(key) {
                prop_assert_eq!(&bytes[..], &payload[..]);
            }
        }
    }

    // A key read repeatedly is not displaced by a stream of fresh keys.
    #[test]
    fn prop_hot_key_survives_new_arrivals(
        hot in valid_key_strategy(),
        arrivals in prop::collection::hash_set(valid_key_strategy(), 20..60)
    ) {
        prop_assume!(!arrivals.contains(&hot));
        let store = LocalCache::new(LocalCacheConfig {
            capacity: 10,
            shards: 1,
            default_ttl: TEST_DEFAULT_TTL,
            ..LocalCacheConfig::default()
        });

        store.set(&hot, b"hot", Duration::ZERO);
        for key in arrivals.iter().take(9) {
            store.set(key, b"filler", Duration::ZERO);
        }
        for _ in 0..8 {
            prop_assert!(store.get(&hot).is_some());
        }
        for key in arrivals.iter().skip(9) {
            store.set(key, b"cold", Duration::ZERO);
        }

        prop_assert!(store.get(&hot).is_some(), "hot key was evicted");
    }
}

// Separate proptest block with fewer cases for time-sensitive TTL tests
proptest! {
    #![proptest_config(ProptestConfig::with_cases(5))]

    // After its TTL has elapsed an entry is reported missing, whether or not
    // the sweep has reclaimed it yet.
    #[test]
    fn prop_ttl_expiration_behavior(key in valid_key_strategy(), payload in payload_strategy()) {
        let store = new_store(TEST_CAPACITY);
        store.set(&key, &payload, Duration::from_millis(30));

        prop_assert_eq!(store.get(&key), Some(Bytes::from(payload)));

        sleep(Duration::from_millis(50));

        prop_assert!(store.get(&key).is_none(), "Entry should not be found after TTL expires");
        prop_assert!(!store.contains(&key));
    }
}
