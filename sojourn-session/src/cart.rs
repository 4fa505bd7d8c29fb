//! Per-user cart cache.
//!
//! The cart itself lives server-side; the REST wrapper that fetches it is
//! injected behind [`CartFetcher`] and normalizes the response into
//! [`CartSnapshot`] once, at the boundary. This cache bounds how often that
//! fetch runs and collapses concurrent fetches for the same user.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use sojourn_cache::FlightCache;
use sojourn_core::ClientResult;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub product_id: i64,
    pub name: String,
    pub quantity: u32,
    pub unit_price_cents: i64,
}

/// A normalized cart as fetched for one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartSnapshot {
    pub user_id: i64,
    pub items: Vec<CartItem>,
    pub subtotal_cents: i64,
    pub fetched_at: DateTime<Utc>,
}

impl CartSnapshot {
    pub fn item_count(&self) -> u32 {
        self.items.iter().map(|item| item.quantity).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// The out-of-scope REST call that retrieves a user's cart.
#[async_trait]
pub trait CartFetcher: Send + Sync {
    async fn fetch_cart(&self, user_id: i64) -> ClientResult<CartSnapshot>;
}

/// TTL cache over [`CartFetcher`], one entry per user.
pub struct CartCache {
    fetcher: Arc<dyn CartFetcher>,
    flights: FlightCache<CartSnapshot>,
    ttl: Duration,
}

impl CartCache {
    pub fn new(fetcher: Arc<dyn CartFetcher>, ttl: Duration) -> Self {
        Self {
            fetcher,
            flights: FlightCache::new("cart"),
            ttl,
        }
    }

    fn key(user_id: i64) -> String {
        format!("cart:{user_id}")
    }

    /// The user's cart, served from cache until the TTL elapses. Concurrent
    /// callers for the same user share one underlying fetch.
    pub async fn cart_for(&self, user_id: i64) -> ClientResult<CartSnapshot> {
        let fetcher = Arc::clone(&self.fetcher);
        self.flights
            .get_or_fetch(&Self::key(user_id), self.ttl, move || async move {
                fetcher.fetch_cart(user_id).await
            })
            .await
    }

    /// Force the next read for this user to re-fetch (e.g. after a local
    /// cart mutation went through the REST layer).
    pub fn invalidate_user(&self, user_id: i64) {
        self.flights.invalidate(&Self::key(user_id));
    }

    /// Drop every cached cart; the logout path.
    pub fn clear(&self) {
        self.flights.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingFetcher {
        calls: AtomicUsize,
    }

    impl CountingFetcher {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl CartFetcher for CountingFetcher {
        async fn fetch_cart(&self, user_id: i64) -> ClientResult<CartSnapshot> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            Ok(CartSnapshot {
                user_id,
                items: vec![CartItem {
                    product_id: 31,
                    name: "Harbor View Suite, 2 nights".to_string(),
                    quantity: 1,
                    unit_price_cents: 45_800,
                }],
                subtotal_cents: 45_800,
                fetched_at: Utc::now(),
            })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_readers_share_one_fetch_per_user() {
        let fetcher = Arc::new(CountingFetcher::new());
        let cache = CartCache::new(
            Arc::clone(&fetcher) as Arc<dyn CartFetcher>,
            Duration::from_secs(60),
        );

        let (a, b, other_user) =
            tokio::join!(cache.cart_for(7), cache.cart_for(7), cache.cart_for(9));
        assert_eq!(a.unwrap(), b.unwrap());
        assert_eq!(other_user.unwrap().user_id, 9);
        assert_eq!(fetcher.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn cached_cart_served_until_ttl_elapses() {
        let fetcher = Arc::new(CountingFetcher::new());
        let cache = CartCache::new(
            Arc::clone(&fetcher) as Arc<dyn CartFetcher>,
            Duration::from_secs(60),
        );

        cache.cart_for(7).await.unwrap();
        cache.cart_for(7).await.unwrap();
        assert_eq!(fetcher.calls(), 1);

        tokio::time::advance(Duration::from_secs(61)).await;
        cache.cart_for(7).await.unwrap();
        assert_eq!(fetcher.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn invalidation_forces_a_refetch() {
        let fetcher = Arc::new(CountingFetcher::new());
        let cache = CartCache::new(
            Arc::clone(&fetcher) as Arc<dyn CartFetcher>,
            Duration::from_secs(60),
        );

        cache.cart_for(7).await.unwrap();
        cache.invalidate_user(7);
        cache.cart_for(7).await.unwrap();
        assert_eq!(fetcher.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn clear_drops_every_user() {
        let fetcher = Arc::new(CountingFetcher::new());
        let cache = CartCache::new(
            Arc::clone(&fetcher) as Arc<dyn CartFetcher>,
            Duration::from_secs(60),
        );

        cache.cart_for(7).await.unwrap();
        cache.cart_for(9).await.unwrap();
        cache.clear();
        cache.cart_for(7).await.unwrap();
        cache.cart_for(9).await.unwrap();
        assert_eq!(fetcher.calls(), 4);
    }

    #[test]
    fn item_count_sums_quantities() {
        let snapshot = CartSnapshot {
            user_id: 7,
            items: vec![
                CartItem {
                    product_id: 1,
                    name: "City Loft, 1 night".to_string(),
                    quantity: 2,
                    unit_price_cents: 12_000,
                },
                CartItem {
                    product_id: 2,
                    name: "Airport transfer".to_string(),
                    quantity: 1,
                    unit_price_cents: 3_500,
                },
            ],
            subtotal_cents: 27_500,
            fetched_at: Utc::now(),
        };
        assert_eq!(snapshot.item_count(), 3);
        assert!(!snapshot.is_empty());
    }
}
