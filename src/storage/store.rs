//! TTL-Aware Store
//!
//! [`TtlStore`] wraps a [`Treap`] with per-key expiration and a read-write
//! lock. Expiration is lazy: there is no background task. Every operation
//! first sweeps away whatever has already expired, then does its own work.
//!
//! ## TTL Index
//!
//! Next to the treap the store keeps a `BTreeSet` of `(expiration, key)`
//! pairs. Its minimum is the next entry due to expire, so a sweep only ever
//! looks at entries that are actually due.
//!
//! Overwriting a key adds a new pair and leaves the old one in place. Such
//! stale pairs are dropped when they reach the front of the index: a pair
//! only counts if the treap still holds that key with exactly that
//! expiration. The exception is an old `Never` pair, which can never reach
//! the front and is dropped on overwrite. Removing a key drops its pair
//! right away, since the removed entry carries its expiration.
//!
//! ## Locking
//!
//! ```text
//!   get / get_many_sorted / len          set / remove / remove_one_expired_entry
//!   ─────────────────────────────        ───────────────────────────────────────
//!   read lock                            write lock
//!     index minimum due? ── no ──┐         sweep
//!     yes: drop, write lock      │         mutate
//!          sweep, downgrade      │       unlock
//!     read ◄─────────────────────┘
//!   unlock
//! ```
//!
//! The treap and the index sit behind the same lock and are never locked
//! separately.

use crate::config::StoreConfig;
use crate::storage::clock::{Clock, MonotonicClock};
use crate::storage::entry::{Entry, Expiration};
use crate::storage::treap::Treap;
use bytes::Bytes;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, trace};

/// State guarded by the store lock.
#[derive(Debug)]
struct Inner {
    map: Treap,
    /// Ordered by expiration, then key. May contain stale finite pairs.
    ttl_index: BTreeSet<(Expiration, Bytes)>,
}

impl Inner {
    fn new(config: &StoreConfig) -> Self {
        Self {
            map: Treap::with_config(config),
            ttl_index: BTreeSet::new(),
        }
    }

    fn set(&mut self, key: Bytes, value: Bytes, expires_at: Expiration) -> bool {
        // A stale `Never` pair sorts behind every live pair and is never popped.
        let previous = self.map.find(&key).map(|entry| entry.expires_at);
        if previous == Some(Expiration::Never) && expires_at != Expiration::Never {
            self.ttl_index.remove(&(Expiration::Never, key.clone()));
        }

        self.ttl_index.insert((expires_at, key.clone()));
        self.map.set(key, value, expires_at)
    }

    fn remove(&mut self, key: &[u8]) -> bool {
        match self.map.take(key) {
            Some(entry) => {
                self.ttl_index.remove(&(entry.expires_at, entry.key));
                true
            }
            None => false,
        }
    }

    /// Checks if the index minimum is due. A stale minimum may report `true`
    /// even though no live entry is due; the sweep sorts that out.
    #[inline]
    fn has_due(&self, now: u64) -> bool {
        self.ttl_index
            .first()
            .is_some_and(|(expires_at, _)| expires_at.is_due(now))
    }

    /// Pops stale pairs off the front of the index and returns the first
    /// pair that matches a live entry.
    fn earliest_live(&mut self) -> Option<(Expiration, Bytes)> {
        let mut stale = 0usize;
        loop {
            let (expires_at, key) = self.ttl_index.first()?;
            let live = self
                .map
                .find(key)
                .is_some_and(|entry| entry.expires_at == *expires_at);
            if live {
                if stale > 0 {
                    trace!(stale = stale, "Discarded stale TTL index entries");
                }
                return Some((*expires_at, key.clone()));
            }
            self.ttl_index.pop_first();
            stale += 1;
        }
    }

    fn remove_one_expired(&mut self, now: u64) -> Option<Entry> {
        let (_, key) = self.earliest_live()?;
        if !self.map.find(&key).is_some_and(|entry| entry.is_expired(now)) {
            return None;
        }
        self.ttl_index.pop_first();
        self.map.take(&key)
    }

    fn purge_expired(&mut self, now: u64) -> usize {
        let mut expired = 0;
        while self.remove_one_expired(now).is_some() {
            expired += 1;
        }
        expired
    }

    fn clear(&mut self) {
        self.map.clear();
        self.ttl_index.clear();
    }
}

/// A concurrent key-value store with per-key time-to-live.
///
/// # Thread Safety
///
/// All operations take `&self`. Wrap the store in an `Arc` to share it
/// between threads.
///
/// # Example
///
/// ```
/// use treapkv::{ManualClock, TtlStore};
/// use bytes::Bytes;
///
/// let clock = ManualClock::new(0);
/// let store = TtlStore::with_clock(clock.clone());
///
/// store.set("a", "1", 0);  // never expires
/// store.set("b", "2", 10); // expires after 10 seconds
/// assert_eq!(
///     store.get_many_sorted("a", 2),
///     vec![(Bytes::from("a"), Bytes::from("1")), (Bytes::from("b"), Bytes::from("2"))]
/// );
///
/// clock.advance(10);
/// assert_eq!(store.get("b"), None);
/// assert_eq!(store.len(), 1);
/// ```
pub struct TtlStore<C = MonotonicClock> {
    inner: RwLock<Inner>,
    clock: C,

    /// Statistics: total GET operations
    get_count: AtomicU64,

    /// Statistics: total SET operations
    set_count: AtomicU64,

    /// Statistics: total DEL operations
    del_count: AtomicU64,

    /// Statistics: number of expired keys cleaned up
    expired_count: AtomicU64,
}

impl<C> std::fmt::Debug for TtlStore<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TtlStore")
            .field("keys", &self.inner.read().map.len())
            .field("get_count", &self.get_count.load(Ordering::Relaxed))
            .field("set_count", &self.set_count.load(Ordering::Relaxed))
            .field("expired_count", &self.expired_count.load(Ordering::Relaxed))
            .finish()
    }
}

impl Default for TtlStore<MonotonicClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl TtlStore<MonotonicClock> {
    /// Creates an empty store on the default monotonic clock.
    pub fn new() -> Self {
        Self::with_clock(MonotonicClock::new())
    }
}

impl<C: Clock> TtlStore<C> {
    /// Creates an empty store that reads time from `clock`.
    pub fn with_clock(clock: C) -> Self {
        Self::with_config(StoreConfig::default(), clock)
    }

    /// Creates an empty store with explicit configuration.
    pub fn with_config(config: StoreConfig, clock: C) -> Self {
        Self {
            inner: RwLock::new(Inner::new(&config)),
            clock,
            get_count: AtomicU64::new(0),
            set_count: AtomicU64::new(0),
            del_count: AtomicU64::new(0),
            expired_count: AtomicU64::new(0),
        }
    }

    /// Creates a store from `(key, value, ttl)` triples.
    ///
    /// Triples are applied in order exactly as repeated [`set`](Self::set)
    /// calls would be, so a later triple for the same key wins.
    pub fn from_entries<I, K, V>(entries: I, clock: C) -> Self
    where
        I: IntoIterator<Item = (K, V, u64)>,
        K: Into<Bytes>,
        V: Into<Bytes>,
    {
        let mut store = Self::with_clock(clock);
        store.extend(entries);
        debug!(
            keys = store.inner.read().map.len(),
            "Store initialized from entries"
        );
        store
    }

    /// Sets a key-value pair with a TTL in seconds.
    ///
    /// A `ttl` of `0` means the key never expires. An existing key always
    /// gets both the new value and the new TTL.
    ///
    /// # Returns
    ///
    /// Returns `true` if a new key was created, `false` if an existing key was updated.
    pub fn set(&self, key: impl Into<Bytes>, value: impl Into<Bytes>, ttl: u64) -> bool {
        self.set_count.fetch_add(1, Ordering::Relaxed);
        let (key, value) = (key.into(), value.into());

        let mut inner = self.inner.write();
        let now = self.clock.now();
        self.sweep(&mut inner, now);

        inner.set(key, value, Expiration::after(now, ttl))
    }

    /// Deletes a key.
    ///
    /// # Returns
    ///
    /// Returns `true` if the key was deleted, `false` if it didn't exist.
    pub fn remove(&self, key: impl AsRef<[u8]>) -> bool {
        self.del_count.fetch_add(1, Ordering::Relaxed);

        let mut inner = self.inner.write();
        let now = self.clock.now();
        self.sweep(&mut inner, now);

        inner.remove(key.as_ref())
    }

    /// Gets the value for a key.
    ///
    /// Returns `None` if the key doesn't exist or has expired.
    pub fn get(&self, key: impl AsRef<[u8]>) -> Option<Bytes> {
        self.get_count.fetch_add(1, Ordering::Relaxed);

        let (inner, _) = self.read_swept();
        inner.map.find(key.as_ref()).map(|entry| entry.value.clone())
    }

    /// Returns up to `count` pairs whose keys are `>= key`, in ascending
    /// key order.
    pub fn get_many_sorted(&self, key: impl AsRef<[u8]>, count: usize) -> Vec<(Bytes, Bytes)> {
        self.get_count.fetch_add(1, Ordering::Relaxed);

        let (inner, _) = self.read_swept();
        inner.map.range(key.as_ref(), count)
    }

    /// Checks if a key exists (and is not expired).
    pub fn contains_key(&self, key: impl AsRef<[u8]>) -> bool {
        let (inner, _) = self.read_swept();
        inner.map.find(key.as_ref()).is_some()
    }

    /// Gets the absolute expiration of a key.
    pub fn expiration(&self, key: impl AsRef<[u8]>) -> Option<Expiration> {
        let (inner, _) = self.read_swept();
        inner.map.find(key.as_ref()).map(|entry| entry.expires_at)
    }

    /// Gets the remaining TTL for a key in seconds.
    ///
    /// # Returns
    ///
    /// - `Some(Some(seconds))` if the key exists and has an expiry
    /// - `Some(None)` if the key exists but never expires
    /// - `None` if the key doesn't exist
    pub fn ttl(&self, key: impl AsRef<[u8]>) -> Option<Option<u64>> {
        let (inner, now) = self.read_swept();
        inner
            .map
            .find(key.as_ref())
            .map(|entry| entry.expires_at.remaining(now))
    }

    /// Removes one entry whose expiration has passed and returns it.
    ///
    /// If several entries are due, any one of them may be picked. Returns
    /// `None`, without touching anything, if nothing is due.
    pub fn remove_one_expired_entry(&self) -> Option<(Bytes, Bytes)> {
        let mut inner = self.inner.write();
        let now = self.clock.now();

        let entry = inner.remove_one_expired(now)?;
        self.expired_count.fetch_add(1, Ordering::Relaxed);
        Some((entry.key, entry.value))
    }

    /// Removes every entry that has expired.
    ///
    /// # Returns
    ///
    /// Returns the number of keys that were cleaned up.
    pub fn purge_expired(&self) -> usize {
        let mut inner = self.inner.write();
        let now = self.clock.now();
        self.sweep(&mut inner, now)
    }

    /// Returns the number of live keys.
    pub fn len(&self) -> usize {
        let (inner, _) = self.read_swept();
        inner.map.len()
    }

    /// Returns true if the store holds no live keys.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Clears all data from the store.
    pub fn clear(&self) {
        self.inner.write().clear();
    }

    /// Returns store statistics.
    pub fn stats(&self) -> StoreStats {
        StoreStats {
            keys: self.inner.read().map.len() as u64,
            get_ops: self.get_count.load(Ordering::Relaxed),
            set_ops: self.set_count.load(Ordering::Relaxed),
            del_ops: self.del_count.load(Ordering::Relaxed),
            expired: self.expired_count.load(Ordering::Relaxed),
        }
    }

    /// Takes the read lock with nothing expired left in the store.
    ///
    /// If the index says something is due, the write lock is taken for the
    /// sweep and then downgraded, so no writer can slip in before the read.
    fn read_swept(&self) -> (RwLockReadGuard<'_, Inner>, u64) {
        let now = self.clock.now();

        let inner = self.inner.read();
        if !inner.has_due(now) {
            return (inner, now);
        }
        drop(inner);

        let mut inner = self.inner.write();
        self.sweep(&mut inner, now);
        (RwLockWriteGuard::downgrade(inner), now)
    }

    fn sweep(&self, inner: &mut Inner, now: u64) -> usize {
        let expired = inner.purge_expired(now);
        if expired > 0 {
            self.expired_count
                .fetch_add(expired as u64, Ordering::Relaxed);
            debug!(
                expired = expired,
                keys_remaining = inner.map.len(),
                "Expired keys cleaned up"
            );
        }
        expired
    }
}

impl<C: Clock, K: Into<Bytes>, V: Into<Bytes>> Extend<(K, V, u64)> for TtlStore<C> {
    fn extend<I: IntoIterator<Item = (K, V, u64)>>(&mut self, entries: I) {
        for (key, value, ttl) in entries {
            self.set(key, value, ttl);
        }
    }
}

impl<K: Into<Bytes>, V: Into<Bytes>> FromIterator<(K, V, u64)> for TtlStore<MonotonicClock> {
    fn from_iter<I: IntoIterator<Item = (K, V, u64)>>(entries: I) -> Self {
        Self::from_entries(entries, MonotonicClock::new())
    }
}

/// Store statistics.
#[derive(Debug, Clone, Copy)]
pub struct StoreStats {
    /// Number of keys currently stored, including expired ones not yet swept
    pub keys: u64,
    /// Total read operations
    pub get_ops: u64,
    /// Total SET operations
    pub set_ops: u64,
    /// Total DEL operations
    pub del_ops: u64,
    /// Total expired keys cleaned up
    pub expired: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::clock::ManualClock;
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::thread;

    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }

    fn store_at(start: u64) -> (TtlStore<ManualClock>, ManualClock) {
        init_tracing();
        let clock = ManualClock::new(start);
        (TtlStore::with_clock(clock.clone()), clock)
    }

    fn pairs(items: &[(&str, &str)]) -> Vec<(Bytes, Bytes)> {
        items
            .iter()
            .map(|(k, v)| (Bytes::from(k.to_string()), Bytes::from(v.to_string())))
            .collect()
    }

    #[test]
    fn test_set_and_get() {
        let (store, _) = store_at(0);

        assert!(store.set("key", "value", 0));
        assert_eq!(store.get("key"), Some(Bytes::from("value")));
    }

    #[test]
    fn test_get_nonexistent() {
        let (store, _) = store_at(0);
        assert_eq!(store.get("nonexistent"), None);
    }

    #[test]
    fn test_remove() {
        let (store, _) = store_at(0);

        assert!(!store.remove("key"));
        assert_eq!(store.len(), 0);

        store.set("key", "value", 0);
        assert!(store.remove("key"));
        assert_eq!(store.get("key"), None);
        assert!(!store.remove("key")); // Already deleted
    }

    #[test]
    fn test_base_scenario() {
        let (store, _) = store_at(0);

        store.set("a", "1", 0);
        store.set("b", "2", 0);
        assert_eq!(store.get_many_sorted("a", 2), pairs(&[("a", "1"), ("b", "2")]));

        assert_eq!(store.remove_one_expired_entry(), None);

        store.set("c", "3", 0);
        assert_eq!(
            store.get_many_sorted("a", 3),
            pairs(&[("a", "1"), ("b", "2"), ("c", "3")])
        );
    }

    #[test]
    fn test_expiry() {
        let (store, clock) = store_at(100);

        store.set("a", "1", 2);
        assert_eq!(store.get("a"), Some(Bytes::from("1")));

        clock.advance(5);
        assert_eq!(store.get("a"), None);
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn test_expiry_boundary() {
        let (store, clock) = store_at(0);

        store.set("a", "1", 3);
        clock.advance(2);
        assert_eq!(store.get("a"), Some(Bytes::from("1")));

        clock.advance(1);
        assert_eq!(store.get("a"), None);
    }

    #[test]
    fn test_finite_ttl_overrides_infinite() {
        let (store, clock) = store_at(0);

        store.set("a", "1", 0);
        assert_eq!(store.get("a"), Some(Bytes::from("1")));

        store.set("a", "1", 1);
        assert_eq!(store.get("a"), Some(Bytes::from("1")));

        clock.advance(2);
        assert_eq!(store.get("a"), None);
    }

    #[test]
    fn test_infinite_ttl_overrides_finite() {
        let (store, clock) = store_at(0);

        store.set("a", "1", 1);
        store.set("a", "2", 0);

        clock.advance(1_000);
        assert_eq!(store.get("a"), Some(Bytes::from("2")));
        assert_eq!(store.remove_one_expired_entry(), None);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_overwrite_resets_ttl() {
        let (store, clock) = store_at(0);

        store.set("a", "1", 5);
        clock.advance(4);
        assert!(!store.set("a", "2", 5));

        clock.advance(4);
        assert_eq!(store.get("a"), Some(Bytes::from("2")));

        clock.advance(1);
        assert_eq!(store.get("a"), None);
    }

    #[test]
    fn test_shorter_ttl_replaces_longer() {
        let (store, clock) = store_at(0);

        store.set("a", "1", 100);
        store.set("a", "1", 3);

        clock.advance(3);
        assert_eq!(store.get("a"), None);
    }

    #[test]
    fn test_stale_index_entry_ignored() {
        let (store, clock) = store_at(0);

        store.set("a", "1", 5);
        store.set("a", "2", 100);

        clock.advance(10);
        assert_eq!(store.remove_one_expired_entry(), None);
        assert_eq!(store.get("a"), Some(Bytes::from("2")));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_remove_then_set_persistent() {
        let (store, clock) = store_at(0);

        store.set("a", "1", 5);
        store.remove("a");
        store.set("a", "2", 0);

        clock.advance(10);
        assert_eq!(store.get("a"), Some(Bytes::from("2")));
        assert_eq!(store.stats().expired, 0);
    }

    #[test]
    fn test_remove_one_expired_entry() {
        let (store, clock) = store_at(0);

        store.set("a", "1", 1);
        store.set("b", "2", 1);
        store.set("c", "3", 0);

        assert_eq!(store.remove_one_expired_entry(), None);

        clock.advance(5);
        let mut removed = HashSet::new();
        removed.insert(store.remove_one_expired_entry().unwrap());
        removed.insert(store.remove_one_expired_entry().unwrap());
        assert_eq!(store.remove_one_expired_entry(), None);

        let expected: HashSet<_> = pairs(&[("a", "1"), ("b", "2")]).into_iter().collect();
        assert_eq!(removed, expected);
        assert_eq!(store.get_many_sorted("", 10), pairs(&[("c", "3")]));
    }

    #[test]
    fn test_len_reflects_expiry() {
        let (store, clock) = store_at(0);

        store.set("a", "1", 1);
        store.set("b", "2", 2);
        store.set("c", "3", 0);
        assert_eq!(store.len(), 3);

        clock.advance(1);
        assert_eq!(store.len(), 2);

        clock.advance(1);
        assert_eq!(store.len(), 1);
        assert!(!store.is_empty());
    }

    #[test]
    fn test_get_many_sorted_skips_expired() {
        let (store, clock) = store_at(0);

        store.set("a", "1", 0);
        store.set("b", "2", 1);
        store.set("c", "3", 0);
        store.set("d", "4", 1);

        clock.advance(1);
        assert_eq!(store.get_many_sorted("a", 4), pairs(&[("a", "1"), ("c", "3")]));
        assert_eq!(store.get_many_sorted("b", 1), pairs(&[("c", "3")]));
        assert_eq!(store.get_many_sorted("z", 1), pairs(&[]));
    }

    #[test]
    fn test_ttl_and_expiration() {
        let (store, clock) = store_at(50);

        assert_eq!(store.ttl("missing"), None);

        store.set("persistent", "v", 0);
        assert_eq!(store.ttl("persistent"), Some(None));
        assert_eq!(store.expiration("persistent"), Some(Expiration::Never));

        store.set("expiring", "v", 100);
        assert_eq!(store.ttl("expiring"), Some(Some(100)));
        assert_eq!(store.expiration("expiring"), Some(Expiration::At(150)));

        clock.advance(40);
        assert_eq!(store.ttl("expiring"), Some(Some(60)));
        assert!(store.contains_key("expiring"));

        clock.advance(60);
        assert!(!store.contains_key("expiring"));
    }

    #[test]
    fn test_purge_expired() {
        let (store, clock) = store_at(0);

        store.set("key1", "value1", 1);
        store.set("key2", "value2", 1);
        store.set("key3", "value3", 0); // No expiry

        clock.advance(2);

        assert_eq!(store.purge_expired(), 2);
        assert_eq!(store.purge_expired(), 0);
        assert_eq!(store.len(), 1);
        assert!(store.contains_key("key3"));
    }

    #[test]
    fn test_from_entries_later_wins() {
        init_tracing();
        let clock = ManualClock::new(0);
        let store = TtlStore::from_entries(
            vec![("b", "1", 0), ("a", "1", 5), ("b", "2", 0), ("a", "2", 0)],
            clock.clone(),
        );

        clock.advance(10);
        assert_eq!(store.len(), 2);
        assert_eq!(store.get_many_sorted("a", 2), pairs(&[("a", "2"), ("b", "2")]));
    }

    #[test]
    fn test_from_iterator() {
        let store: TtlStore = vec![
            (String::from("x"), String::from("1"), 0u64),
            (String::from("y"), String::from("2"), 0u64),
        ]
        .into_iter()
        .collect();

        assert_eq!(store.len(), 2);
        assert_eq!(store.get("y"), Some(Bytes::from("2")));
    }

    /// Checks that every live key has its pair and only finite pairs are stale.
    fn check_ttl_index(store: &TtlStore<ManualClock>) {
        let inner = store.inner.read();
        for entry in inner.map.iter() {
            assert!(inner
                .ttl_index
                .contains(&(entry.expires_at, entry.key.clone())));
        }

        let never_live = inner
            .map
            .iter()
            .filter(|entry| entry.expires_at == Expiration::Never)
            .count();
        let never_indexed = inner
            .ttl_index
            .iter()
            .filter(|(expires_at, _)| *expires_at == Expiration::Never)
            .count();
        assert_eq!(never_indexed, never_live);
    }

    #[test]
    fn test_remove_churn_keeps_index_small() {
        let (store, clock) = store_at(0);

        store.set("0", "live", 0);
        for i in 0..10_000 {
            let key = format!("k{}", i);
            store.set(key.clone(), "v", 0);
            assert!(store.remove(&key));
        }
        for i in 0..1_000 {
            let key = format!("t{}", i);
            store.set(key.clone(), "v", 50);
            assert!(store.remove(&key));
        }
        assert_eq!(store.inner.read().ttl_index.len(), 1);

        clock.advance(1_000_000);
        store.set("z", "live", 0);
        store.purge_expired();

        assert_eq!(store.len(), 2);
        assert_eq!(store.inner.read().ttl_index.len(), 2);
    }

    #[test]
    fn test_overwrite_of_persistent_key_drops_old_pair() {
        let (store, clock) = store_at(0);

        store.set("0", "live", 0);
        for _ in 0..100 {
            store.set("a", "1", 0);
            store.set("a", "2", 5);
        }
        check_ttl_index(&store);

        clock.advance(5);
        assert_eq!(store.get("a"), None);
        assert_eq!(store.inner.read().ttl_index.len(), 1);
    }

    #[test]
    fn test_random_workload_matches_model() {
        use rand::rngs::StdRng;
        use rand::{Rng, SeedableRng};
        use std::collections::BTreeMap;

        let (store, clock) = store_at(0);
        let mut model: BTreeMap<String, (String, Expiration)> = BTreeMap::new();
        let mut rng = StdRng::seed_from_u64(21);

        for step in 0..3_000 {
            let now = clock.now();
            model.retain(|_, (_, expires_at)| !expires_at.is_due(now));

            let key = format!("k{:02}", rng.gen_range(0..60));
            match rng.gen_range(0..10) {
                0..=5 => {
                    let value = format!("v{}", step);
                    let ttl = if rng.gen_bool(0.4) { 0 } else { rng.gen_range(1..6) };
                    let created = store.set(key.clone(), value.clone(), ttl);
                    let previous = model.insert(key, (value, Expiration::after(now, ttl)));
                    assert_eq!(created, previous.is_none());
                }
                6..=8 => {
                    assert_eq!(store.remove(&key), model.remove(&key).is_some());
                }
                _ => clock.advance(rng.gen_range(1..4)),
            }

            let now = clock.now();
            model.retain(|_, (_, expires_at)| !expires_at.is_due(now));

            let expected: Vec<_> = model
                .iter()
                .map(|(k, (v, _))| (Bytes::from(k.clone()), Bytes::from(v.clone())))
                .collect();
            assert_eq!(store.get_many_sorted("", usize::MAX), expected);
            assert_eq!(store.len(), model.len());
            check_ttl_index(&store);
        }

        clock.advance(10);
        store.purge_expired();
        let inner = store.inner.read();
        assert_eq!(inner.ttl_index.len(), inner.map.len());
    }

    #[test]
    fn test_clear() {
        let (store, _) = store_at(0);

        store.set("key1", "value1", 0);
        store.set("key2", "value2", 3);
        assert_eq!(store.len(), 2);

        store.clear();
        assert_eq!(store.len(), 0);
        assert!(store.is_empty());
        assert_eq!(store.remove_one_expired_entry(), None);
    }

    #[test]
    fn test_stats() {
        let (store, clock) = store_at(0);

        store.set("a", "1", 1);
        store.set("b", "2", 0);
        store.get("a");
        store.get_many_sorted("a", 2);
        store.remove("b");

        clock.advance(1);
        store.get("a");

        let stats = store.stats();
        assert_eq!(stats.keys, 0);
        assert_eq!(stats.set_ops, 2);
        assert_eq!(stats.get_ops, 3);
        assert_eq!(stats.del_ops, 1);
        assert_eq!(stats.expired, 1);
    }

    #[test]
    fn test_with_config() {
        init_tracing();
        let config = StoreConfig::default().with_seed(3).with_capacity(8);
        let store = TtlStore::with_config(config, ManualClock::new(0));

        for key in ["d", "b", "a", "c"] {
            store.set(key, key, 0);
        }
        let keys: Vec<_> = store
            .get_many_sorted("", 10)
            .into_iter()
            .map(|(k, _)| k)
            .collect();
        assert_eq!(keys, vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn test_concurrent_readers() {
        let (store, _) = store_at(0);
        store.set("a", "2", 0);
        let store = Arc::new(store);

        let handles: Vec<_> = (0..5)
            .map(|_| {
                let store = Arc::clone(&store);
                thread::spawn(move || store.get("a") == Some(Bytes::from("2")))
            })
            .collect();

        for handle in handles {
            assert!(handle.join().unwrap());
        }
    }

    #[test]
    fn test_concurrent_writers() {
        let (store, _) = store_at(0);
        let store = Arc::new(store);
        let keys = ["a", "b", "c", "d", "e"];

        let handles: Vec<_> = keys
            .iter()
            .map(|&key| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    store.set(key, "1", 0);
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.len(), 5);
        assert_eq!(
            store.get_many_sorted("a", 5),
            pairs(&[("a", "1"), ("b", "1"), ("c", "1"), ("d", "1"), ("e", "1")])
        );
    }

    #[test]
    fn test_concurrent_access_with_expiry() {
        let (store, clock) = store_at(0);
        let store = Arc::new(store);
        let mut handles = vec![];

        // Spawn multiple writers
        for i in 0..8 {
            let store = Arc::clone(&store);
            handles.push(thread::spawn(move || {
                for j in 0..200 {
                    let key = format!("key-{}-{:03}", i, j);
                    let ttl = if j % 2 == 0 { 0 } else { 1 };
                    store.set(key.clone(), "value", ttl);
                    store.get(&key);
                    store.get_many_sorted(&key, 3);
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.len(), 1600);

        clock.advance(1);
        assert_eq!(store.len(), 800);

        let entries = store.get_many_sorted("", 2000);
        assert_eq!(entries.len(), 800);
        assert!(entries.windows(2).all(|w| w[0].0 < w[1].0));
    }

    #[test]
    fn test_readers_sweep_while_writers_run() {
        let (store, clock) = store_at(0);
        let store = Arc::new(store);

        for i in 0..500 {
            store.set(format!("old-{:03}", i), "v", 1);
        }
        clock.advance(1);

        let handles: Vec<_> = (0..4)
            .map(|t| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    for i in 0..100 {
                        if t % 2 == 0 {
                            store.set(format!("new-{}-{:03}", t, i), "v", 0);
                        } else {
                            assert!(store.get(format!("old-{:03}", i)).is_none());
                        }
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.len(), 200);
        assert_eq!(store.stats().expired, 500);
    }
}
