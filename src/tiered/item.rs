//! Item descriptors and the compute scope.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::remote::SetCondition;

// == Ttl ==
/// How long a written value is retained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Ttl {
    /// Use the cache's default retention
    #[default]
    Default,
    /// Retain for this long; `Duration::ZERO` behaves like `Default`
    For(Duration),
    /// Hand the value to callers but never write it to any tier
    Skip,
}

impl Ttl {
    /// Retention to write with, or `None` when the write is skipped.
    pub fn resolve(self, default: Duration) -> Option<Duration> {
        match self {
            Ttl::Default => Some(default),
            Ttl::For(ttl) if ttl.is_zero() => Some(default),
            Ttl::For(ttl) => Some(ttl),
            Ttl::Skip => None,
        }
    }

    pub fn is_skip(&self) -> bool {
        matches!(self, Ttl::Skip)
    }
}

impl From<Duration> for Ttl {
    fn from(ttl: Duration) -> Self {
        if ttl.is_zero() {
            Ttl::Default
        } else {
            Ttl::For(ttl)
        }
    }
}

// == Item ==
/// A request against the cache: a key plus per-call options.
///
/// Anything that converts into a key converts into an `Item` with default
/// options, so `cache.get::<String>("user:1")` works as is.
///
/// ```
/// use std::time::Duration;
/// use tiered_cache::{Item, SetCondition, Ttl};
///
/// let item = Item::new("session:9")
///     .ttl(Duration::from_secs(30))
///     .condition(SetCondition::IfAbsent)
///     .skip_local();
/// assert_eq!(item.key(), "session:9");
/// assert_eq!(item.ttl_policy(), Ttl::For(Duration::from_secs(30)));
/// assert!(item.skips_local());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    key: String,
    ttl: Ttl,
    skip_local: bool,
    condition: SetCondition,
}

impl Item {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ttl: Ttl::Default,
            skip_local: false,
            condition: SetCondition::Always,
        }
    }

    /// Sets the retention policy. Accepts a [`Ttl`] or a `Duration`.
    pub fn ttl(mut self, ttl: impl Into<Ttl>) -> Self {
        self.ttl = ttl.into();
        self
    }

    /// Bypasses the local tier for both reads and writes.
    pub fn skip_local(mut self) -> Self {
        self.skip_local = true;
        self
    }

    /// Makes the write conditional on the key's presence.
    pub fn condition(mut self, condition: SetCondition) -> Self {
        self.condition = condition;
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn ttl_policy(&self) -> Ttl {
        self.ttl
    }

    pub fn skips_local(&self) -> bool {
        self.skip_local
    }

    pub fn write_condition(&self) -> SetCondition {
        self.condition
    }
}

impl From<&str> for Item {
    fn from(key: &str) -> Self {
        Item::new(key)
    }
}

impl From<String> for Item {
    fn from(key: String) -> Self {
        Item::new(key)
    }
}

impl From<&String> for Item {
    fn from(key: &String) -> Self {
        Item::new(key.as_str())
    }
}

// == Compute Scope ==
/// Handle passed to a compute function.
///
/// Lets the function see which key it is computing and change how the
/// result is retained. The TTL is read once the function returns.
#[derive(Debug, Clone)]
pub struct ComputeScope {
    key: Arc<str>,
    ttl: Arc<Mutex<Ttl>>,
}

impl ComputeScope {
    pub(crate) fn new(key: &str, ttl: Ttl) -> Self {
        Self {
            key: Arc::from(key),
            ttl: Arc::new(Mutex::new(ttl)),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Current retention policy for the computed value.
    pub fn ttl(&self) -> Ttl {
        *self.ttl.lock()
    }

    pub fn set_ttl(&self, ttl: impl Into<Ttl>) {
        *self.ttl.lock() = ttl.into();
    }

    /// Delivers the result to callers without storing it in either tier.
    pub fn skip_store(&self) {
        self.set_ttl(Ttl::Skip);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ttl_resolve() {
        let default = Duration::from_secs(3600);
        assert_eq!(Ttl::Default.resolve(default), Some(default));
        assert_eq!(Ttl::For(Duration::ZERO).resolve(default), Some(default));
        assert_eq!(
            Ttl::For(Duration::from_secs(5)).resolve(default),
            Some(Duration::from_secs(5))
        );
        assert_eq!(Ttl::Skip.resolve(default), None);
    }

    #[test]
    fn test_ttl_from_duration() {
        assert_eq!(Ttl::from(Duration::ZERO), Ttl::Default);
        assert_eq!(Ttl::from(Duration::from_millis(10)), Ttl::For(Duration::from_millis(10)));
    }

    #[test]
    fn test_item_defaults() {
        let item: Item = "k".into();
        assert_eq!(item.key(), "k");
        assert_eq!(item.ttl_policy(), Ttl::Default);
        assert!(!item.skips_local());
        assert_eq!(item.write_condition(), SetCondition::Always);
    }

    #[test]
    fn test_scope_ttl_is_shared_between_clones() {
        let scope = ComputeScope::new("k", Ttl::Default);
        let clone = scope.clone();
        clone.skip_store();
        assert!(scope.ttl().is_skip());
        assert_eq!(scope.key(), "k");

        scope.set_ttl(Duration::from_secs(1));
        assert_eq!(clone.ttl(), Ttl::For(Duration::from_secs(1)));
    }
}
