//! Credential store: the single source of truth for the session token.
//!
//! The store keeps the raw token and its decoded claims in memory for the
//! lifetime of the process, so authentication-state queries never touch
//! persistent storage after the first load. Concurrent first loads collapse
//! into one storage read through the flight cache.
//!
//! Construct one store per process and share it; it clones cheaply, all
//! clones observe the same state.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use sojourn_cache::FlightCache;
use sojourn_core::{ClientResult, Clock, KeyValueStore, SessionToken, SystemClock};

const TOKEN_STORAGE_KEY: &str = "session.token";
const USER_ID_KEY: &str = "session.user_id";

const DEFAULT_USER_ID_TTL: Duration = Duration::from_secs(300);

#[derive(Default)]
struct MemoryState {
    /// Whether storage has been consulted at least once. `session == None`
    /// with `loaded == false` means "unknown", not "logged out".
    loaded: bool,
    session: Option<SessionToken>,
}

/// Process-wide session credential store.
#[derive(Clone)]
pub struct CredentialStore {
    storage: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    memory: Arc<RwLock<MemoryState>>,
    token_loads: FlightCache<Option<SessionToken>>,
    user_ids: FlightCache<Option<i64>>,
    user_id_ttl: Duration,
}

impl CredentialStore {
    pub fn new(
        storage: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
        user_id_ttl: Duration,
    ) -> Self {
        Self {
            storage,
            clock,
            memory: Arc::new(RwLock::new(MemoryState::default())),
            token_loads: FlightCache::new("auth.token"),
            user_ids: FlightCache::new("auth.user_id"),
            user_id_ttl,
        }
    }

    /// System clock and default derived-identity TTL.
    pub fn with_defaults(storage: Arc<dyn KeyValueStore>) -> Self {
        Self::new(storage, Arc::new(SystemClock), DEFAULT_USER_ID_TTL)
    }

    /// Current session token, `None` when logged out.
    ///
    /// Served from memory when the state is known; otherwise one storage
    /// read is performed, shared across all concurrent callers, and the
    /// result (token decoded once) is installed into memory.
    pub async fn get_token(&self) -> ClientResult<Option<SessionToken>> {
        {
            let memory = self.memory.read().expect("credential state lock");
            if memory.loaded {
                return Ok(memory.session.clone());
            }
        }

        let storage = Arc::clone(&self.storage);
        let memory = Arc::clone(&self.memory);
        self.token_loads
            .get_or_fetch(TOKEN_STORAGE_KEY, Duration::ZERO, move || async move {
                let raw = storage.get(TOKEN_STORAGE_KEY).await?;
                let session = raw.as_deref().map(SessionToken::from_raw);

                let mut state = memory.write().expect("credential state lock");
                if state.loaded {
                    // A set/remove won the race while the read was in
                    // flight; their state is newer than what storage gave us.
                    Ok(state.session.clone())
                } else {
                    state.loaded = true;
                    state.session = session.clone();
                    Ok(session)
                }
            })
            .await
    }

    /// Persist a new token and update the in-memory state.
    ///
    /// The storage write happens first: when it fails, memory is left
    /// untouched so memory and storage never diverge.
    pub async fn set_token(&self, raw: &str) -> ClientResult<()> {
        self.storage.set(TOKEN_STORAGE_KEY, raw).await?;

        let session = SessionToken::from_raw(raw);
        {
            let mut state = self.memory.write().expect("credential state lock");
            state.loaded = true;
            state.session = Some(session);
        }
        self.token_loads.invalidate(TOKEN_STORAGE_KEY);
        self.user_ids.clear();
        tracing::debug!("session token replaced, derived caches invalidated");
        Ok(())
    }

    /// Clear the token from storage and every derived cache. Idempotent:
    /// removing an absent token is a no-op.
    pub async fn remove_token(&self) -> ClientResult<()> {
        self.storage.remove(TOKEN_STORAGE_KEY).await?;

        {
            let mut state = self.memory.write().expect("credential state lock");
            state.loaded = true;
            state.session = None;
        }
        self.token_loads.invalidate(TOKEN_STORAGE_KEY);
        self.user_ids.clear();
        tracing::debug!("session token removed");
        Ok(())
    }

    /// Derived numeric identity, lazily computed from cached claims and held
    /// with a TTL. `None` when logged out or when claims carry no usable id.
    pub async fn user_id(&self) -> ClientResult<Option<i64>> {
        let store = self.clone();
        self.user_ids
            .get_or_fetch(USER_ID_KEY, self.user_id_ttl, move || async move {
                let token = store.get_token().await?;
                Ok(token.and_then(|token| token.user_id()))
            })
            .await
    }

    /// Synchronous, cache-only: `false` when the state has not been loaded
    /// yet. Callers needing certainty await [`get_token`](Self::get_token)
    /// or [`check_auth_status`](Self::check_auth_status) first.
    pub fn is_authenticated(&self) -> bool {
        let memory = self.memory.read().expect("credential state lock");
        memory.loaded && memory.session.is_some()
    }

    /// Synchronous expiry check, failing closed: unknown state, missing
    /// token, or undecodable claims all count as expired.
    pub fn is_token_expired(&self) -> bool {
        let memory = self.memory.read().expect("credential state lock");
        match &memory.session {
            Some(session) => session.is_expired(self.clock.as_ref()),
            None => true,
        }
    }

    /// Authoritative authentication check: loads the token if needed and
    /// reports whether a current, unexpired session exists.
    pub async fn check_auth_status(&self) -> ClientResult<bool> {
        let token = self.get_token().await?;
        Ok(match token {
            Some(token) => !token.is_expired(self.clock.as_ref()),
            None => false,
        })
    }
}
