//! Tiered Cache Module
//!
//! Read-through orchestrator over a bounded local tier and an optional shared
//! remote tier, with per-key call collapsing for computed values.
//!
//! Lookups go local first, then remote; a remote hit is copied into the local
//! tier. Writes go to the remote first and reach the local tier only once the
//! remote accepted them. Either tier may be absent.

mod flight;
mod item;
mod stats;

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tracing::{debug, info, warn};

use crate::cache::{LocalCache, LocalCacheConfig};
use crate::codec::CacheValue;
use crate::config::Config;
use crate::error::{BoxError, CacheError, Result};
use crate::remote::{HttpRemote, RemoteStore};
use crate::tasks::Sweep;

use flight::{FlightGroup, FlightGuard, FlightResult, Join};
use stats::TierCounters;

pub use item::{ComputeScope, Item, Ttl};
pub use stats::TierStats;

/// Retention for items without their own TTL.
pub const DEFAULT_TTL: Duration = Duration::from_secs(60 * 60);

const DEFAULT_FLIGHT_SHARDS: usize = 16;

fn check_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(CacheError::InvalidKey);
    }
    Ok(())
}

// == Inner ==
struct Inner {
    local: Option<LocalCache>,
    remote: Option<Arc<dyn RemoteStore>>,
    default_ttl: Duration,
    flights: FlightGroup,
    counters: Option<TierCounters>,
}

impl Inner {
    fn local_for(&self, skip_local: bool) -> Option<&LocalCache> {
        if skip_local {
            None
        } else {
            self.local.as_ref()
        }
    }

    fn record(&self, count: impl FnOnce(&TierCounters)) {
        if let Some(counters) = &self.counters {
            count(counters);
        }
    }

    /// Local, then remote. A remote hit is copied into the local tier with the
    /// local default TTL.
    async fn lookup(&self, key: &str, skip_local: bool) -> Result<Bytes> {
        let local = self.local_for(skip_local);
        if let Some(local) = local {
            if let Some(payload) = local.get(key) {
                self.record(TierCounters::local_hit);
                return Ok(payload);
            }
            self.record(TierCounters::local_miss);
        }

        let Some(remote) = &self.remote else {
            return Err(CacheError::Miss);
        };

        match remote.get(key).await? {
            Some(payload) => {
                self.record(TierCounters::remote_hit);
                if let Some(local) = local {
                    local.set(key, &payload, Duration::ZERO);
                }
                Ok(payload)
            }
            None => {
                self.record(TierCounters::remote_miss);
                Err(CacheError::Miss)
            }
        }
    }

    /// Writes `payload` for `ttl`, honoring the item's condition.
    async fn write(&self, item: &Item, payload: Bytes, ttl: Duration) -> Result<bool> {
        let key = item.key();
        let condition = item.write_condition();
        let local = self.local_for(item.skips_local());

        let Some(remote) = &self.remote else {
            let Some(local) = local else {
                return Ok(false);
            };
            return Ok(local.set_if(key, &payload, ttl, condition));
        };

        let stored = remote.set(key, payload.clone(), ttl, condition).await?;
        if stored {
            if let Some(local) = local {
                // The local copy never outlives its own retention.
                local.set(key, &payload, ttl.min(local.default_ttl()));
            }
        }
        Ok(stored)
    }

    /// Body of a flight: look again, compute on a miss, store unless skipped.
    async fn fill<V, F, Fut, E>(&self, item: &Item, compute: F) -> FlightResult
    where
        V: CacheValue + Send + 'static,
        F: FnOnce(ComputeScope) -> Fut + Send + 'static,
        Fut: Future<Output = std::result::Result<V, E>> + Send + 'static,
        E: Into<BoxError> + Send + 'static,
    {
        let key = item.key();
        match self.lookup(key, item.skips_local()).await {
            Ok(payload) => return Ok(payload),
            Err(CacheError::Miss) => {}
            Err(err) => warn!(key, error = %err, "Lookup failed before compute, treating as miss"),
        }

        let scope = ComputeScope::new(key, item.ttl_policy());
        self.record(TierCounters::compute);
        debug!(key, "Computing value");

        let encoded = match compute(scope.clone()).await {
            Ok(value) => value.encode().map_err(CacheError::encode),
            Err(err) => Err(CacheError::compute(err)),
        };
        let payload = encoded?;

        match scope.ttl().resolve(self.default_ttl) {
            Some(ttl) => {
                if let Err(err) = self.write(item, payload.clone(), ttl).await {
                    warn!(key, error = %err, "Failed to store computed value");
                }
            }
            None => debug!(key, "Computed value not stored"),
        }

        Ok(payload)
    }
}

// == Tiered Cache ==
/// Two-tier read-through cache.
///
/// Cheap to clone; clones share the same tiers and in-flight table.
///
/// ```no_run
/// use std::time::Duration;
/// use tiered_cache::{Item, TieredCache};
///
/// # async fn run() -> tiered_cache::error::Result<()> {
/// let cache = TieredCache::builder().build();
///
/// let profile: String = cache
///     .once(Item::new("profile:7").ttl(Duration::from_secs(30)), |_scope| async {
///         Ok::<_, std::io::Error>("loaded".to_string())
///     })
///     .await?;
/// assert_eq!(profile, "loaded");
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct TieredCache {
    inner: Arc<Inner>,
}

impl TieredCache {
    pub fn builder() -> TieredCacheBuilder {
        TieredCacheBuilder::default()
    }

    /// Builds a cache from loaded configuration.
    ///
    /// Connects the HTTP remote when `remote_url` is set, otherwise runs
    /// local-only.
    pub fn from_config(config: &Config) -> Result<Self> {
        let local = LocalCache::new(LocalCacheConfig {
            capacity: config.local_capacity,
            shards: config.shards,
            default_ttl: config.local_ttl,
            ..LocalCacheConfig::default()
        });

        let mut builder = Self::builder()
            .local(local)
            .default_ttl(config.default_ttl)
            .stats(config.stats_enabled)
            .flight_shards(config.shards);

        if let Some(url) = &config.remote_url {
            builder = builder.remote(Arc::new(HttpRemote::new(url)?));
        }

        Ok(builder.build())
    }

    // == Get ==
    /// Reads and decodes the value stored for `item`.
    ///
    /// Returns [`CacheError::Miss`] when no tier has the key. A payload that
    /// does not decode into `V` is [`CacheError::Decode`], never a miss.
    pub async fn get<V: CacheValue>(&self, item: impl Into<Item>) -> Result<V> {
        let item = item.into();
        check_key(item.key())?;

        let payload = self.inner.lookup(item.key(), item.skips_local()).await?;
        V::decode(payload).map_err(CacheError::decode)
    }

    // == Set ==
    /// Encodes `value` and writes it to every configured tier.
    ///
    /// Returns whether the value was written. It is not when the item's
    /// condition fails, when the TTL is [`Ttl::Skip`], or when no tier
    /// accepts writes for the item.
    pub async fn set<V: CacheValue>(&self, item: impl Into<Item>, value: &V) -> Result<bool> {
        let item = item.into();
        check_key(item.key())?;

        let Some(ttl) = item.ttl_policy().resolve(self.inner.default_ttl) else {
            return Ok(false);
        };
        let payload = value.encode().map_err(CacheError::encode)?;
        self.inner.write(&item, payload, ttl).await
    }

    // == Delete ==
    /// Removes `key` from every tier. Returns whether any tier held it.
    pub async fn delete(&self, key: &str) -> Result<bool> {
        check_key(key)?;

        // Remote first, so a concurrent read cannot refill the local tier
        // from a copy that is about to go.
        let mut deleted = match &self.inner.remote {
            Some(remote) => remote.delete(key).await?,
            None => false,
        };
        deleted |= self.delete_local(key);
        Ok(deleted)
    }

    /// Drops only the local copy of `key`.
    pub fn delete_local(&self, key: &str) -> bool {
        self.inner.local.as_ref().is_some_and(|local| local.delete(key))
    }

    // == Exists ==
    pub async fn exists(&self, item: impl Into<Item>) -> Result<bool> {
        let item = item.into();
        check_key(item.key())?;

        if let Some(local) = self.inner.local_for(item.skips_local()) {
            if local.contains(item.key()) {
                return Ok(true);
            }
        }
        match &self.inner.remote {
            Some(remote) => Ok(remote.exists(item.key()).await?),
            None => Ok(false),
        }
    }

    // == Once ==
    /// Returns the cached value for `item`, computing it on a miss.
    ///
    /// Concurrent calls for the same key share one compute: the first caller
    /// starts it and everyone else waits for its result. The compute runs on
    /// its own task, so dropping any caller's future (the first one included)
    /// does not stop it or starve the others.
    ///
    /// A failed compute is returned to every waiter as
    /// [`CacheError::Compute`] and nothing is stored. A computed value whose
    /// write fails is still returned. This never returns [`CacheError::Miss`].
    pub async fn once<V, F, Fut, E>(&self, item: impl Into<Item>, compute: F) -> Result<V>
    where
        V: CacheValue + Send + 'static,
        F: FnOnce(ComputeScope) -> Fut + Send + 'static,
        Fut: Future<Output = std::result::Result<V, E>> + Send + 'static,
        E: Into<BoxError> + Send + 'static,
    {
        let item = item.into();
        check_key(item.key())?;

        // Misses are counted by the flight's own lookup.
        if let Some(local) = self.inner.local_for(item.skips_local()) {
            if let Some(payload) = local.get(item.key()) {
                self.inner.record(TierCounters::local_hit);
                return V::decode(payload).map_err(CacheError::decode);
            }
        }

        let rx = match self.inner.flights.join(item.key()) {
            Join::Leader(rx) => {
                self.spawn_flight(item, compute);
                rx
            }
            Join::Waiter(rx) => {
                self.inner.record(TierCounters::coalesce);
                rx
            }
        };

        match rx.await {
            Ok(Ok(payload)) => V::decode(payload).map_err(CacheError::decode),
            Ok(Err(err)) => Err(err),
            Err(_) => Err(CacheError::Canceled),
        }
    }

    fn spawn_flight<V, F, Fut, E>(&self, item: Item, compute: F)
    where
        V: CacheValue + Send + 'static,
        F: FnOnce(ComputeScope) -> Fut + Send + 'static,
        Fut: Future<Output = std::result::Result<V, E>> + Send + 'static,
        E: Into<BoxError> + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            let guard = FlightGuard::new(&inner.flights, item.key());
            let result = inner.fill(&item, compute).await;
            let notified = guard.finish(result);
            debug!(key = item.key(), notified, "Flight completed");
        });
    }

    // == Introspection ==
    /// Counter snapshot, or `None` when statistics are disabled.
    pub fn stats(&self) -> Option<TierStats> {
        self.inner.counters.as_ref().map(TierCounters::snapshot)
    }

    pub fn local(&self) -> Option<&LocalCache> {
        self.inner.local.as_ref()
    }

    pub fn has_remote(&self) -> bool {
        self.inner.remote.is_some()
    }

    pub fn default_ttl(&self) -> Duration {
        self.inner.default_ttl
    }

    /// Number of keys with a compute currently running.
    pub fn in_flight(&self) -> usize {
        self.inner.flights.in_flight()
    }
}

impl fmt::Debug for TieredCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TieredCache")
            .field("local", &self.inner.local)
            .field("remote", &self.inner.remote.is_some())
            .field("default_ttl", &self.inner.default_ttl)
            .field("in_flight", &self.in_flight())
            .finish()
    }
}

impl Sweep for TieredCache {
    fn purge_expired(&self) -> usize {
        self.inner.local.as_ref().map_or(0, LocalCache::purge_expired)
    }
}

// == Builder ==
/// Configures a [`TieredCache`].
///
/// Starts with a default-sized local tier, no remote, a one hour default
/// TTL and statistics enabled.
pub struct TieredCacheBuilder {
    local: Option<LocalCache>,
    remote: Option<Arc<dyn RemoteStore>>,
    default_ttl: Duration,
    stats_enabled: bool,
    flight_shards: usize,
}

impl Default for TieredCacheBuilder {
    fn default() -> Self {
        Self {
            local: Some(LocalCache::new(LocalCacheConfig::default())),
            remote: None,
            default_ttl: DEFAULT_TTL,
            stats_enabled: true,
            flight_shards: DEFAULT_FLIGHT_SHARDS,
        }
    }
}

impl TieredCacheBuilder {
    pub fn local(mut self, local: LocalCache) -> Self {
        self.local = Some(local);
        self
    }

    /// Runs without a local tier; every read goes to the remote.
    pub fn without_local(mut self) -> Self {
        self.local = None;
        self
    }

    pub fn remote<R: RemoteStore>(mut self, remote: Arc<R>) -> Self {
        self.remote = Some(remote);
        self
    }

    /// Retention for items using [`Ttl::Default`].
    pub fn default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    pub fn stats(mut self, enabled: bool) -> Self {
        self.stats_enabled = enabled;
        self
    }

    pub fn flight_shards(mut self, shards: usize) -> Self {
        self.flight_shards = shards;
        self
    }

    pub fn build(self) -> TieredCache {
        info!(
            local = self.local.is_some(),
            remote = self.remote.is_some(),
            default_ttl_secs = self.default_ttl.as_secs(),
            "Tiered cache ready"
        );

        TieredCache {
            inner: Arc::new(Inner {
                local: self.local,
                remote: self.remote,
                default_ttl: self.default_ttl,
                flights: FlightGroup::new(self.flight_shards),
                counters: self.stats_enabled.then(TierCounters::default),
            }),
        }
    }
}
