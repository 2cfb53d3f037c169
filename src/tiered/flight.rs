//! Per-key call collapsing.
//!
//! The first caller for a key becomes the leader and starts the compute;
//! later callers for the same key wait on the leader's result. A record lives
//! only while its compute runs and is removed before the result is sent.

use std::collections::HashMap;

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::oneshot;
use twox_hash::XxHash64;

use crate::error::CacheError;

pub(crate) type FlightResult = Result<Bytes, CacheError>;

type Notifier = oneshot::Sender<FlightResult>;
type Receiver = oneshot::Receiver<FlightResult>;

/// Outcome of [`FlightGroup::join`].
pub(crate) enum Join {
    /// No compute was running; the caller must start one
    Leader(Receiver),
    /// A compute is already running; wait for its result
    Waiter(Receiver),
}

#[derive(Debug)]
pub(crate) struct FlightGroup {
    shards: Box<[Mutex<HashMap<String, Vec<Notifier>>>]>,
}

impl FlightGroup {
    pub fn new(shards: usize) -> Self {
        let shards = (0..shards.max(1)).map(|_| Mutex::new(HashMap::new())).collect();
        Self { shards }
    }

    fn shard(&self, key: &str) -> &Mutex<HashMap<String, Vec<Notifier>>> {
        let hash = XxHash64::oneshot(0, key.as_bytes());
        &self.shards[(hash % self.shards.len() as u64) as usize]
    }

    /// Registers interest in `key`'s result.
    ///
    /// The leader's own receiver sits in the record next to the waiters', so
    /// every participant is notified the same way.
    pub fn join(&self, key: &str) -> Join {
        let (tx, rx) = oneshot::channel();
        let mut flights = self.shard(key).lock();

        if let Some(notifiers) = flights.get_mut(key) {
            notifiers.push(tx);
            return Join::Waiter(rx);
        }

        flights.insert(key.to_owned(), vec![tx]);
        Join::Leader(rx)
    }

    /// Removes `key`'s record and sends `result` to everyone attached to it.
    ///
    /// Sending happens under the shard lock, so a caller arriving afterwards
    /// starts a new flight instead of joining a finished one.
    pub fn complete(&self, key: &str, result: FlightResult) -> usize {
        let mut flights = self.shard(key).lock();
        let notifiers = flights.remove(key).unwrap_or_default();
        let count = notifiers.len();
        for notifier in notifiers {
            // Receiver gone means that caller stopped waiting.
            let _ = notifier.send(result.clone());
        }
        count
    }

    /// Number of keys with a compute in flight.
    pub fn in_flight(&self) -> usize {
        self.shards.iter().map(|shard| shard.lock().len()).sum()
    }
}

// == Flight Guard ==
/// Completes a flight when dropped without a result.
///
/// Held by the task running the compute; a panic or an aborted task still
/// releases the waiters with [`CacheError::Canceled`].
pub(crate) struct FlightGuard<'a> {
    group: &'a FlightGroup,
    key: &'a str,
    finished: bool,
}

impl<'a> FlightGuard<'a> {
    pub fn new(group: &'a FlightGroup, key: &'a str) -> Self {
        Self {
            group,
            key,
            finished: false,
        }
    }

    pub fn finish(mut self, result: FlightResult) -> usize {
        self.finished = true;
        self.group.complete(self.key, result)
    }
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.group.complete(self.key, Err(CacheError::Canceled));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_first_join_leads_rest_wait() {
        let group = FlightGroup::new(4);
        let leader = match group.join("k") {
            Join::Leader(rx) => rx,
            Join::Waiter(_) => panic!("first caller must lead"),
        };
        let waiter = match group.join("k") {
            Join::Waiter(rx) => rx,
            Join::Leader(_) => panic!("second caller must wait"),
        };
        assert_eq!(group.in_flight(), 1);

        let notified = group.complete("k", Ok(Bytes::from_static(b"v")));
        assert_eq!(notified, 2);
        assert_eq!(group.in_flight(), 0);

        assert_eq!(leader.await.unwrap().unwrap(), Bytes::from_static(b"v"));
        assert_eq!(waiter.await.unwrap().unwrap(), Bytes::from_static(b"v"));
    }

    #[tokio::test]
    async fn test_keys_are_independent() {
        let group = FlightGroup::new(1);
        assert!(matches!(group.join("a"), Join::Leader(_)));
        assert!(matches!(group.join("b"), Join::Leader(_)));
        assert_eq!(group.in_flight(), 2);
    }

    #[tokio::test]
    async fn test_join_after_complete_starts_new_flight() {
        let group = FlightGroup::new(2);
        let _first = group.join("k");
        group.complete("k", Err(CacheError::Miss));
        assert!(matches!(group.join("k"), Join::Leader(_)));
    }

    #[tokio::test]
    async fn test_dropped_guard_cancels_waiters() {
        let group = FlightGroup::new(2);
        let rx = match group.join("k") {
            Join::Leader(rx) => rx,
            Join::Waiter(_) => panic!("first caller must lead"),
        };

        drop(FlightGuard::new(&group, "k"));

        assert!(matches!(rx.await.unwrap(), Err(CacheError::Canceled)));
        assert_eq!(group.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_finished_guard_delivers_result() {
        let group = FlightGroup::new(2);
        let rx = match group.join("k") {
            Join::Leader(rx) => rx,
            Join::Waiter(_) => panic!("first caller must lead"),
        };

        let guard = FlightGuard::new(&group, "k");
        assert_eq!(guard.finish(Ok(Bytes::new())), 1);

        assert_eq!(rx.await.unwrap().unwrap(), Bytes::new());
    }
}
