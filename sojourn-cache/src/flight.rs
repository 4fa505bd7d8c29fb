//! Keyed TTL cache with single-flight deduplication.
//!
//! One [`FlightCache`] instance is one cache namespace (auth, user-id,
//! cart). A read before expiry returns the cached value without side
//! effects; a read after expiry, or on a missing key, joins the in-flight
//! fetch for that key if one exists and starts exactly one otherwise.
//!
//! The check-then-register sequence runs entirely under one `DashMap` entry
//! guard, so two callers racing for the same key cannot both register a
//! fetch: whoever wins the entry lock registers, the other observes the
//! pending slot and joins it.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures_util::future::{BoxFuture, FutureExt, Shared};
use tokio::time::Instant;

use sojourn_core::ClientResult;

type SharedFetch<V> = Shared<BoxFuture<'static, ClientResult<V>>>;

enum Slot<V> {
    Ready { value: V, cached_at: Instant },
    Pending { fetch: SharedFetch<V>, generation: u64 },
}

/// One cache namespace: keyed values with a per-read TTL and at most one
/// underlying fetch in flight per key.
pub struct FlightCache<V> {
    name: &'static str,
    slots: Arc<DashMap<String, Slot<V>>>,
    generation: Arc<AtomicU64>,
}

impl<V> Clone for FlightCache<V> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            slots: Arc::clone(&self.slots),
            generation: Arc::clone(&self.generation),
        }
    }
}

impl<V> FlightCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Create a namespace. `name` only labels trace output.
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            slots: Arc::new(DashMap::new()),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Serve `key` from cache when fresh, join the in-flight fetch when one
    /// exists, otherwise run `fetch` exactly once and cache its result.
    ///
    /// A `ttl` of zero disables serving from cache entirely, leaving pure
    /// deduplication of concurrent fetches.
    ///
    /// All concurrent callers for a key observe the same outcome, success or
    /// failure. Failures are not cached: the next call re-fetches.
    pub async fn get_or_fetch<F, Fut>(&self, key: &str, ttl: Duration, fetch: F) -> ClientResult<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ClientResult<V>> + Send + 'static,
    {
        let fetch_handle = match self.slots.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                let joined = match occupied.get() {
                    Slot::Ready { value, cached_at } if cached_at.elapsed() < ttl => {
                        return Ok(value.clone());
                    }
                    Slot::Pending { fetch: pending, .. } => Some(pending.clone()),
                    Slot::Ready { .. } => None,
                };
                match joined {
                    Some(shared) => shared,
                    None => {
                        tracing::debug!(cache = self.name, key, "entry expired, refreshing");
                        let (shared, generation) = self.settling_fetch(key, fetch());
                        occupied.insert(Slot::Pending {
                            fetch: shared.clone(),
                            generation,
                        });
                        shared
                    }
                }
            }
            Entry::Vacant(vacant) => {
                let (shared, generation) = self.settling_fetch(key, fetch());
                vacant.insert(Slot::Pending {
                    fetch: shared.clone(),
                    generation,
                });
                shared
            }
        };
        fetch_handle.await
    }

    /// Wrap a fetch so that settling it updates the slot exactly once:
    /// success writes the value back, failure clears the registration. The
    /// generation check keeps a stale settle from resurrecting a slot that
    /// was invalidated (or re-registered) while the fetch was in flight.
    fn settling_fetch<Fut>(&self, key: &str, fetch: Fut) -> (SharedFetch<V>, u64)
    where
        Fut: Future<Output = ClientResult<V>> + Send + 'static,
    {
        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        let slots = Arc::clone(&self.slots);
        let key = key.to_string();
        let shared = async move {
            let result = fetch.await;
            if let Entry::Occupied(mut occupied) = slots.entry(key) {
                let owns_slot = matches!(
                    occupied.get(),
                    Slot::Pending { generation: current, .. } if *current == generation
                );
                if owns_slot {
                    match &result {
                        Ok(value) => {
                            occupied.insert(Slot::Ready {
                                value: value.clone(),
                                cached_at: Instant::now(),
                            });
                        }
                        Err(_) => {
                            occupied.remove();
                        }
                    }
                }
            }
            result
        }
        .boxed()
        .shared();
        (shared, generation)
    }

    /// Drop the cache entry and any pending registration for `key`; the next
    /// `get_or_fetch` re-fetches. Callers already awaiting the in-flight
    /// fetch still observe its outcome.
    pub fn invalidate(&self, key: &str) {
        self.slots.remove(key);
    }

    /// Drop every entry and pending registration in this namespace.
    pub fn clear(&self) {
        self.slots.clear();
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
