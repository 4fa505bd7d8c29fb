//! Property tests for claims handling plus an end-to-end login/logout flow
//! across the credential store and the cart cache.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use jsonwebtoken::{encode, EncodingKey, Header};
use proptest::prelude::*;

use sojourn_core::token::test_clocks;
use sojourn_core::{decode_claims, Claims, FixedClock, MemoryStore};
use sojourn_session::{CartCache, CartFetcher, CartItem, CartSnapshot, CredentialStore};

fn issue_token(claims: &Claims) -> String {
    encode(
        &Header::default(),
        claims,
        &EncodingKey::from_secret(b"test-secret"),
    )
    .expect("encode test token")
}

proptest! {
    #[test]
    fn decoded_claims_match_what_was_issued(
        user_id in 1i64..1_000_000,
        iat in 0i64..2_000_000_000,
        lifetime in 1i64..1_000_000,
    ) {
        let claims = Claims {
            sub: format!("traveler-{user_id}"),
            iat,
            exp: iat + lifetime,
            user_id: Some(user_id),
        };
        let decoded = decode_claims(&issue_token(&claims)).unwrap();
        prop_assert_eq!(decoded, claims);
    }

    #[test]
    fn expiry_is_a_strict_comparison_against_the_clock(
        exp in 0i64..2_000_000_000,
        now in 0i64..2_000_000_000,
    ) {
        let claims = Claims {
            sub: "traveler".to_string(),
            iat: 0,
            exp,
            user_id: None,
        };
        prop_assert_eq!(claims.is_expired(&FixedClock(now)), exp < now);
    }

    #[test]
    fn numeric_subjects_yield_an_identity(sub_id in 0i64..i64::MAX) {
        let claims = Claims {
            sub: sub_id.to_string(),
            iat: 0,
            exp: 0,
            user_id: None,
        };
        prop_assert_eq!(claims.user_id(), Some(sub_id));
    }

    #[test]
    fn non_numeric_subjects_yield_no_identity(sub in "[a-z][a-z-]{0,20}") {
        let claims = Claims {
            sub,
            iat: 0,
            exp: 0,
            user_id: None,
        };
        prop_assert_eq!(claims.user_id(), None);
    }
}

// ============================================================================
// LOGIN / LOGOUT FLOW
// ============================================================================

struct CountingFetcher {
    calls: AtomicUsize,
}

#[async_trait]
impl CartFetcher for CountingFetcher {
    async fn fetch_cart(&self, user_id: i64) -> sojourn_core::ClientResult<CartSnapshot> {
        self.calls.fetch_add(1, Ordering::SeqCst);
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

#[tokio::test]
async fn login_fetch_logout_clears_every_namespace() {
    let storage = Arc::new(MemoryStore::new());
    let credentials = CredentialStore::new(
        Arc::clone(&storage) as Arc<dyn sojourn_core::KeyValueStore>,
        Arc::new(test_clocks::valid()),
        Duration::from_secs(300),
    );
    let fetcher = Arc::new(CountingFetcher {
        calls: AtomicUsize::new(0),
    });
    let carts = CartCache::new(
        Arc::clone(&fetcher) as Arc<dyn CartFetcher>,
        Duration::from_secs(60),
    );

    // Login.
    let claims = Claims {
        sub: "1208".to_string(),
        iat: 1704067200,
        exp: 1704070800,
        user_id: Some(1208),
    };
    credentials.set_token(&issue_token(&claims)).await.unwrap();
    assert!(credentials.check_auth_status().await.unwrap());

    // Screen mount: several components race for identity and cart.
    let user_id = credentials.user_id().await.unwrap().expect("identity");
    let (cart_a, cart_b) = tokio::join!(carts.cart_for(user_id), carts.cart_for(user_id));
    assert_eq!(cart_a.unwrap(), cart_b.unwrap());
    assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);

    // Logout: the token, derived identity, and cart namespace all go.
    credentials.remove_token().await.unwrap();
    carts.clear();

    assert!(!credentials.is_authenticated());
    assert!(!credentials.check_auth_status().await.unwrap());
    assert_eq!(credentials.user_id().await.unwrap(), None);

    // A fresh login sees fresh data, not a stale cart.
    credentials.set_token(&issue_token(&claims)).await.unwrap();
    carts.cart_for(1208).await.unwrap();
    assert_eq!(fetcher.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn token_persists_across_store_instances() {
    let storage = Arc::new(MemoryStore::new());
    let claims = Claims {
        sub: "1208".to_string(),
        iat: 1704067200,
        exp: 1704070800,
        user_id: Some(1208),
    };

    let first = CredentialStore::new(
        Arc::clone(&storage) as Arc<dyn sojourn_core::KeyValueStore>,
        Arc::new(test_clocks::valid()),
        Duration::from_secs(300),
    );
    first.set_token(&issue_token(&claims)).await.unwrap();

    // A new process: fresh store over the same durable storage.
    let second = CredentialStore::new(
        Arc::clone(&storage) as Arc<dyn sojourn_core::KeyValueStore>,
        Arc::new(test_clocks::valid()),
        Duration::from_secs(300),
    );
    assert!(second.check_auth_status().await.unwrap());
    assert_eq!(second.user_id().await.unwrap(), Some(1208));
}
