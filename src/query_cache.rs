//! # Query Cache
//!
//! Keyed cache of pending and resolved chain reads, shared by every data source
//! of a session.
//!
//! ## Guarantees
//!
//! - **Collapsing**: while a read for a key is in flight, further requests for
//!   the same key join it instead of issuing another read.
//! - **No poisoning**: a failed read is propagated to everyone awaiting it and
//!   the key is cleared, so the next request starts over.
//! - **Invalidation wins**: each entry carries a generation. Invalidating an
//!   entry moves it to a new generation, and a read that started under an older
//!   generation never marks the entry fresh when it completes.
//! - **Abandonment**: every read is driven to completion on the runtime even if
//!   all callers stop awaiting it.
//!
//! Values are stored type-erased; reading a key back as a different type than
//! it was produced with yields [`CouncilError::CacheTypeMismatch`].

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use ethers::types::Address;
use futures::future::{BoxFuture, FutureExt, Shared};
use log::debug;
use std::any::Any;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;

use crate::error::{CouncilError, SharedError};
use crate::metrics;
use crate::types::CallArg;

type CachedValue = Arc<dyn Any + Send + Sync>;
type SharedRead = Shared<BoxFuture<'static, Result<CachedValue, SharedError>>>;

/// Identifies one cached read: (source contract, method, arguments).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey {
    source: Address,
    method: String,
    args: Vec<CallArg>,
}

impl CacheKey {
    pub fn new(source: Address, method: impl Into<String>, args: Vec<CallArg>) -> Self {
        Self {
            source,
            method: method.into(),
            args,
        }
    }

    pub fn source(&self) -> Address {
        self.source
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn args(&self) -> &[CallArg] {
        &self.args
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}.{}(", self.source, self.method)?;
        for (i, arg) in self.args.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", arg)?;
        }
        write!(f, ")")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheEventKind {
    Resolved,
    Invalidated,
    Failed,
}

/// Published on every entry transition; consumers re-read on `Invalidated`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEvent {
    pub key: CacheKey,
    pub kind: CacheEventKind,
}

enum EntryState {
    Pending {
        read: SharedRead,
        /// Last resolved value, still available to `peek` while refetching.
        previous: Option<CachedValue>,
    },
    Resolved {
        value: CachedValue,
        resolved_at: Instant,
        fresh: bool,
    },
}

struct CacheEntry {
    generation: u64,
    state: EntryState,
}

#[derive(Default)]
struct CacheCounters {
    hits: AtomicU64,
    joins: AtomicU64,
    misses: AtomicU64,
    invalidations: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStatsSnapshot {
    pub hits: u64,
    /// Requests that joined a read already in flight.
    pub joins: u64,
    pub misses: u64,
    pub invalidations: u64,
    pub entries: usize,
}

pub struct QueryCache {
    entries: Arc<DashMap<CacheKey, CacheEntry>>,
    next_generation: Arc<AtomicU64>,
    max_age: Option<Duration>,
    events: broadcast::Sender<CacheEvent>,
    counters: CacheCounters,
}

impl QueryCache {
    /// `max_age`: resolved values older than this are refetched even if never
    /// invalidated. `None` keeps them fresh until invalidated.
    pub fn new(max_age: Option<Duration>, event_capacity: usize) -> Self {
        let (events, _) = broadcast::channel(event_capacity.max(1));
        Self {
            entries: Arc::new(DashMap::new()),
            next_generation: Arc::new(AtomicU64::new(0)),
            max_age,
            events,
            counters: CacheCounters::default(),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CacheEvent> {
        self.events.subscribe()
    }

    /// Returns the fresh value under `key`, or joins/starts the read `fetch`.
    ///
    /// `fetch` is only polled when no fresh value and no in-flight read exist.
    pub async fn get_or_fetch<T, Fut>(&self, key: CacheKey, fetch: Fut) -> Result<T, SharedError>
    where
        T: Clone + Send + Sync + 'static,
        Fut: Future<Output = Result<T, CouncilError>> + Send + 'static,
    {
        let (read, started) = {
            match self.entries.entry(key.clone()) {
                Entry::Occupied(mut occupied) => {
                    let entry = occupied.get_mut();
                    let current = match &entry.state {
                        EntryState::Resolved {
                            value,
                            resolved_at,
                            fresh: true,
                        } if !self.is_expired(*resolved_at) => Lookup::Hit(Arc::clone(value)),
                        EntryState::Resolved { value, .. } => Lookup::Stale(Some(Arc::clone(value))),
                        EntryState::Pending { read, .. } => Lookup::InFlight(read.clone()),
                    };
                    match current {
                        Lookup::Hit(value) => {
                            self.counters.hits.fetch_add(1, Ordering::Relaxed);
                            metrics::increment_cache_hit(key.method());
                            return downcast(&key, &value).map_err(Arc::new);
                        }
                        Lookup::InFlight(read) => {
                            self.counters.joins.fetch_add(1, Ordering::Relaxed);
                            metrics::increment_cache_hit(key.method());
                            (read, false)
                        }
                        Lookup::Stale(previous) => {
                            let (generation, read) = self.start(key.clone(), fetch);
                            *entry = CacheEntry {
                                generation,
                                state: EntryState::Pending {
                                    read: read.clone(),
                                    previous,
                                },
                            };
                            (read, true)
                        }
                    }
                }
                Entry::Vacant(vacant) => {
                    let (generation, read) = self.start(key.clone(), fetch);
                    vacant.insert(CacheEntry {
                        generation,
                        state: EntryState::Pending {
                            read: read.clone(),
                            previous: None,
                        },
                    });
                    (read, true)
                }
            }
        };

        if started {
            self.counters.misses.fetch_add(1, Ordering::Relaxed);
            metrics::increment_cache_miss(key.method());
            debug!("QueryCache: fetching {}", key);
            let driver = read.clone();
            tokio::spawn(async move {
                let _ = driver.await;
            });
        }

        let value = read.await?;
        downcast(&key, &value).map_err(Arc::new)
    }

    /// Marks `key` stale. The next `get_or_fetch` refetches; a read in flight
    /// for it will not be stored as fresh. Absent keys are ignored.
    pub fn invalidate(&self, key: &CacheKey) -> bool {
        let generation = self.next_generation();
        let mut remove = false;
        {
            let Some(mut entry) = self.entries.get_mut(key) else {
                return false;
            };
            let next = match &entry.state {
                EntryState::Resolved {
                    value, resolved_at, ..
                } => Some(EntryState::Resolved {
                    value: Arc::clone(value),
                    resolved_at: *resolved_at,
                    fresh: false,
                }),
                EntryState::Pending {
                    previous: Some(value),
                    ..
                } => Some(EntryState::Resolved {
                    value: Arc::clone(value),
                    resolved_at: Instant::now(),
                    fresh: false,
                }),
                EntryState::Pending { previous: None, .. } => None,
            };
            entry.generation = generation;
            match next {
                Some(state) => entry.state = state,
                None => remove = true,
            }
        }
        if remove {
            self.entries.remove_if(key, |_, e| e.generation == generation);
        }

        self.counters.invalidations.fetch_add(1, Ordering::Relaxed);
        metrics::increment_cache_invalidation(key.method());
        debug!("QueryCache: invalidated {}", key);
        let _ = self.events.send(CacheEvent {
            key: key.clone(),
            kind: CacheEventKind::Invalidated,
        });
        true
    }

    /// Invalidates every key of `source`, optionally narrowed to one method,
    /// regardless of arguments. Returns how many entries were invalidated.
    pub fn invalidate_matching(&self, source: Address, method: Option<&str>) -> usize {
        let keys: Vec<CacheKey> = self
            .entries
            .iter()
            .filter(|e| e.key().source == source && method.map_or(true, |m| e.key().method == m))
            .map(|e| e.key().clone())
            .collect();
        keys.iter().filter(|k| self.invalidate(k)).count()
    }

    /// Last resolved value for `key`, fresh or not, without fetching.
    pub fn peek<T: Clone + 'static>(&self, key: &CacheKey) -> Option<T> {
        let entry = self.entries.get(key)?;
        let value = match &entry.state {
            EntryState::Resolved { value, .. } => value,
            EntryState::Pending {
                previous: Some(value),
                ..
            } => value,
            EntryState::Pending { previous: None, .. } => return None,
        };
        value.downcast_ref::<T>().cloned()
    }

    /// Whether `key` holds a value that would be served without a read.
    pub fn is_fresh(&self, key: &CacheKey) -> bool {
        match self.entries.get(key) {
            Some(entry) => matches!(
                entry.state,
                EntryState::Resolved { fresh: true, resolved_at, .. } if !self.is_expired(resolved_at)
            ),
            None => false,
        }
    }

    /// Drops every entry (session teardown). Reads in flight complete but are
    /// not stored.
    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStatsSnapshot {
        CacheStatsSnapshot {
            hits: self.counters.hits.load(Ordering::Relaxed),
            joins: self.counters.joins.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            invalidations: self.counters.invalidations.load(Ordering::Relaxed),
            entries: self.entries.len(),
        }
    }

    fn is_expired(&self, resolved_at: Instant) -> bool {
        self.max_age.map_or(false, |age| resolved_at.elapsed() >= age)
    }

    fn next_generation(&self) -> u64 {
        self.next_generation.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn start<T, Fut>(&self, key: CacheKey, fetch: Fut) -> (u64, SharedRead)
    where
        T: Send + Sync + 'static,
        Fut: Future<Output = Result<T, CouncilError>> + Send + 'static,
    {
        let generation = self.next_generation();
        let entries = Arc::clone(&self.entries);
        let events = self.events.clone();
        let read = async move {
            let outcome = fetch
                .await
                .map(|value| Arc::new(value) as CachedValue)
                .map_err(Arc::new);
            settle(&entries, &events, &key, generation, &outcome);
            outcome
        }
        .boxed()
        .shared();
        (generation, read)
    }
}

enum Lookup {
    Hit(CachedValue),
    InFlight(SharedRead),
    Stale(Option<CachedValue>),
}

/// Stores the outcome of the read started under `generation`, unless the entry
/// moved to another generation in the meantime.
fn settle(
    entries: &DashMap<CacheKey, CacheEntry>,
    events: &broadcast::Sender<CacheEvent>,
    key: &CacheKey,
    generation: u64,
    outcome: &Result<CachedValue, SharedError>,
) {
    let mut drop_entry = false;
    let stored = match entries.get_mut(key) {
        Some(mut entry) if entry.generation == generation => {
            match outcome {
                Ok(value) => {
                    entry.state = EntryState::Resolved {
                        value: Arc::clone(value),
                        resolved_at: Instant::now(),
                        fresh: true,
                    };
                }
                Err(_) => {
                    let previous = match &entry.state {
                        EntryState::Pending { previous, .. } => previous.clone(),
                        EntryState::Resolved { .. } => None,
                    };
                    match previous {
                        Some(value) => {
                            entry.state = EntryState::Resolved {
                                value,
                                resolved_at: Instant::now(),
                                fresh: false,
                            }
                        }
                        None => drop_entry = true,
                    }
                }
            }
            true
        }
        _ => false,
    };
    if drop_entry {
        entries.remove_if(key, |_, e| e.generation == generation);
    }

    let kind = match outcome {
        Ok(_) if stored => CacheEventKind::Resolved,
        Ok(_) => {
            debug!("QueryCache: discarding superseded result for {}", key);
            return;
        }
        Err(e) => {
            debug!("QueryCache: read for {} failed: {}", key, e);
            CacheEventKind::Failed
        }
    };
    let _ = events.send(CacheEvent {
        key: key.clone(),
        kind,
    });
}

fn downcast<T: Clone + 'static>(key: &CacheKey, value: &CachedValue) -> Result<T, CouncilError> {
    value
        .downcast_ref::<T>()
        .cloned()
        .ok_or_else(|| CouncilError::CacheTypeMismatch(key.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(method: &str, args: Vec<CallArg>) -> CacheKey {
        CacheKey::new(Address::repeat_byte(0x11), method, args)
    }

    #[test]
    fn keys_compare_deeply() {
        let a = key("votes", vec![CallArg::from(Address::zero()), CallArg::from(7u64)]);
        let b = key("votes", vec![CallArg::from(Address::zero()), CallArg::from(7u64)]);
        let c = key("votes", vec![CallArg::from(7u64), CallArg::from(Address::zero())]);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(
            a.to_string(),
            "0x1111111111111111111111111111111111111111.votes(0x0000000000000000000000000000000000000000, 7)"
        );
    }

    #[test]
    fn invalidating_absent_key_is_a_no_op() {
        let cache = QueryCache::new(None, 16);
        assert!(!cache.invalidate(&key("decimals", vec![])));
        assert_eq!(cache.stats().invalidations, 0);
    }

    #[tokio::test]
    async fn resolved_value_is_served_until_invalidated() {
        let cache = QueryCache::new(None, 16);
        let k = key("decimals", vec![]);

        let first: u8 = cache.get_or_fetch(k.clone(), async { Ok::<_, CouncilError>(18u8) }).await.unwrap();
        let second: u8 = cache
            .get_or_fetch(k.clone(), async { Ok::<u8, CouncilError>(6) })
            .await
            .unwrap();
        assert_eq!((first, second), (18, 18));
        assert!(cache.is_fresh(&k));

        assert!(cache.invalidate(&k));
        assert!(!cache.is_fresh(&k));
        assert_eq!(cache.peek::<u8>(&k), Some(18));

        let third: u8 = cache.get_or_fetch(k.clone(), async { Ok::<_, CouncilError>(6u8) }).await.unwrap();
        assert_eq!(third, 6);
    }

    #[tokio::test]
    async fn max_age_expires_entries() {
        let cache = QueryCache::new(Some(Duration::from_millis(0)), 16);
        let k = key("term", vec![]);
        let _: u8 = cache.get_or_fetch(k.clone(), async { Ok::<_, CouncilError>(1u8) }).await.unwrap();
        assert!(!cache.is_fresh(&k));
        let again: u8 = cache.get_or_fetch(k.clone(), async { Ok::<_, CouncilError>(2u8) }).await.unwrap();
        assert_eq!(again, 2);
    }

    #[tokio::test]
    async fn reading_back_with_another_type_is_an_error() {
        let cache = QueryCache::new(None, 16);
        let k = key("symbol", vec![CallArg::from(1u64)]);
        let _: String = cache
            .get_or_fetch(k.clone(), async { Ok::<_, CouncilError>("ELF-1".to_string()) })
            .await
            .unwrap();
        let err = cache
            .get_or_fetch::<u8, _>(k, async { Ok::<_, CouncilError>(0u8) })
            .await
            .unwrap_err();
        assert!(matches!(*err, CouncilError::CacheTypeMismatch(_)));
    }
}
