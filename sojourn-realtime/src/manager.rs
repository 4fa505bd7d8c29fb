//! Realtime connection manager.
//!
//! One [`RealtimeClient`] owns the logical connection to one hub endpoint:
//! it authenticates through the credential store at every connect (so a
//! refreshed token is picked up on reconnect), supervises the transport with
//! exponential-backoff reconnection, and dispatches inbound events to the
//! listener registry. Chat and notifications are two configured instances
//! of this one component.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::{mpsc, oneshot, watch, Mutex, Notify};
use tokio::task::JoinHandle;

use sojourn_core::{ClientConfig, ClientResult, ReconnectConfig, SessionToken};
use sojourn_session::CredentialStore;

use crate::backoff::BackoffPolicy;
use crate::error::RealtimeError;
use crate::events::{ChannelEvent, ChatEvent, NotificationEvent};
use crate::listeners::{Listener, ListenerRegistry};
use crate::transport::{RealtimeTransport, TransportSession};
use crate::ws::WsTransport;

/// Logical connection state, published on a watch channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

/// Token refresh seam: the REST layer exchange that produces a fresh raw
/// token when the current one has expired.
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    async fn refresh_token(&self) -> ClientResult<String>;
}

struct OutboundCommand {
    text: String,
    ack: oneshot::Sender<Result<(), RealtimeError>>,
}

struct SupervisorHandle {
    handle: JoinHandle<()>,
    shutdown: Arc<Notify>,
}

enum PumpExit {
    Shutdown,
    ConnectionLost,
}

struct Inner<E: ChannelEvent> {
    label: &'static str,
    endpoint: String,
    transport: Arc<dyn RealtimeTransport>,
    credentials: CredentialStore,
    refresher: Option<Arc<dyn TokenRefresher>>,
    backoff: BackoffPolicy,
    request_timeout: Duration,
    listeners: ListenerRegistry<E>,
    state_tx: watch::Sender<ConnectionState>,
    attempt: AtomicU32,
    supervisor: Mutex<Option<SupervisorHandle>>,
    outbound: std::sync::Mutex<Option<mpsc::Sender<OutboundCommand>>>,
    /// Skips a pending backoff sleep (foreground resume).
    wake: Notify,
}

/// Client for one realtime hub. Clones share the same connection.
pub struct RealtimeClient<E: ChannelEvent> {
    inner: Arc<Inner<E>>,
}

impl<E: ChannelEvent> Clone for RealtimeClient<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// The chat hub connection.
pub type ChatClient = RealtimeClient<ChatEvent>;

/// The notification hub connection.
pub type NotificationClient = RealtimeClient<NotificationEvent>;

/// Chat hub client over WebSocket, wired from the client configuration.
pub fn chat_client(
    config: &ClientConfig,
    credentials: CredentialStore,
    refresher: Option<Arc<dyn TokenRefresher>>,
) -> ChatClient {
    RealtimeClient::new(
        "chat",
        config.chat_endpoint.clone(),
        Arc::new(WsTransport),
        credentials,
        refresher,
        &config.reconnect,
        Duration::from_millis(config.request_timeout_ms),
    )
}

/// Notification hub client over WebSocket, wired from the client
/// configuration.
pub fn notification_client(
    config: &ClientConfig,
    credentials: CredentialStore,
    refresher: Option<Arc<dyn TokenRefresher>>,
) -> NotificationClient {
    RealtimeClient::new(
        "notifications",
        config.notification_endpoint.clone(),
        Arc::new(WsTransport),
        credentials,
        refresher,
        &config.reconnect,
        Duration::from_millis(config.request_timeout_ms),
    )
}

impl<E: ChannelEvent> RealtimeClient<E> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        label: &'static str,
        endpoint: String,
        transport: Arc<dyn RealtimeTransport>,
        credentials: CredentialStore,
        refresher: Option<Arc<dyn TokenRefresher>>,
        reconnect: &ReconnectConfig,
        request_timeout: Duration,
    ) -> Self {
        let (state_tx, _state_rx) = watch::channel(ConnectionState::Disconnected);
        Self {
            inner: Arc::new(Inner {
                label,
                endpoint,
                transport,
                credentials,
                refresher,
                backoff: BackoffPolicy::from(reconnect),
                request_timeout,
                listeners: ListenerRegistry::new(),
                state_tx,
                attempt: AtomicU32::new(0),
                supervisor: Mutex::new(None),
                outbound: std::sync::Mutex::new(None),
                wake: Notify::new(),
            }),
        }
    }

    /// Begin connecting. A no-op when already connected or connecting.
    ///
    /// Fails with [`RealtimeError::AuthenticationUnavailable`] when no
    /// usable token exists (and cannot be refreshed); in that case no
    /// reconnect loop is started.
    pub async fn start(&self) -> Result<(), RealtimeError> {
        if matches!(
            self.current_state(),
            ConnectionState::Connected | ConnectionState::Connecting
        ) {
            return Ok(());
        }

        let mut supervisor = self.inner.supervisor.lock().await;
        if let Some(existing) = supervisor.as_ref() {
            if !existing.handle.is_finished() {
                // A live supervisor is either connected or already
                // scheduling its own retries.
                return Ok(());
            }
        }

        // Preflight so an unauthenticated client fails fast instead of
        // spawning a doomed retry loop.
        self.inner.usable_token().await?;

        self.inner.attempt.store(0, Ordering::SeqCst);
        let shutdown = Arc::new(Notify::new());
        let handle = tokio::spawn(Inner::run_supervisor(
            Arc::clone(&self.inner),
            Arc::clone(&shutdown),
        ));
        *supervisor = Some(SupervisorHandle { handle, shutdown });
        Ok(())
    }

    /// Disconnect and cancel any pending reconnect. A new
    /// [`start`](Self::start) is required to resume.
    pub async fn stop(&self) {
        let mut supervisor = self.inner.supervisor.lock().await;
        if let Some(existing) = supervisor.take() {
            existing.shutdown.notify_waiters();
            existing.handle.abort();
        }
        self.inner.clear_outbound();
        self.inner.publish(ConnectionState::Disconnected);
        tracing::info!(channel = self.inner.label, "realtime channel stopped");
    }

    /// Send a payload to the hub.
    ///
    /// When not connected, one connect-and-retry cycle runs first (the usual
    /// cause is stale state after an app resume); if that also fails, the
    /// error surfaces to the caller.
    pub async fn send<P: Serialize>(&self, payload: &P) -> Result<(), RealtimeError> {
        let text =
            serde_json::to_string(payload).map_err(|err| RealtimeError::Serialization {
                reason: err.to_string(),
            })?;

        if let Some(result) = self.try_send(&text).await {
            return result;
        }

        tracing::debug!(
            channel = self.inner.label,
            "send while disconnected, running one connect cycle"
        );
        self.start().await?;
        // An explicit send is a user action: skip any pending backoff sleep.
        self.inner.wake.notify_one();
        self.await_connected().await?;
        match self.try_send(&text).await {
            Some(result) => result,
            None => Err(RealtimeError::ConnectionUnavailable {
                reason: "connection lost before send".to_string(),
            }),
        }
    }

    /// Register a listener for one event kind. Idempotent per callback
    /// reference; registrations survive reconnects.
    pub fn subscribe(&self, kind: E::Kind, listener: Listener<E>) {
        self.inner.listeners.subscribe(kind, listener);
    }

    /// Remove a listener by reference equality.
    pub fn unsubscribe(&self, kind: E::Kind, listener: &Listener<E>) {
        self.inner.listeners.unsubscribe(kind, listener);
    }

    /// Watch connection-state transitions.
    pub fn state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state_tx.subscribe()
    }

    pub fn current_state(&self) -> ConnectionState {
        *self.inner.state_tx.borrow()
    }

    /// Reset the backoff schedule and skip any pending reconnect sleep.
    pub(crate) fn wake_reconnect(&self) {
        self.inner.attempt.store(0, Ordering::SeqCst);
        self.inner.wake.notify_one();
    }

    pub(crate) fn channel_label(&self) -> &'static str {
        self.inner.label
    }

    /// Send through the live connection, if there is one. `None` means not
    /// connected.
    async fn try_send(&self, text: &str) -> Option<Result<(), RealtimeError>> {
        let sender = self
            .inner
            .outbound
            .lock()
            .expect("outbound slot lock")
            .clone()?;
        let (ack_tx, ack_rx) = oneshot::channel();
        let command = OutboundCommand {
            text: text.to_string(),
            ack: ack_tx,
        };
        if sender.send(command).await.is_err() {
            return None;
        }
        // A dropped ack means the pump died mid-send.
        ack_rx.await.ok()
    }

    /// Wait for the in-flight connect cycle to resolve, bounded by the
    /// request timeout. Observing `Disconnected` after an attempt counts as
    /// the cycle failing.
    async fn await_connected(&self) -> Result<(), RealtimeError> {
        let mut states = self.inner.state_tx.subscribe();
        let wait = async {
            let mut saw_attempt = false;
            loop {
                match *states.borrow_and_update() {
                    ConnectionState::Connected => return Ok(()),
                    ConnectionState::Connecting | ConnectionState::Reconnecting => {
                        saw_attempt = true;
                    }
                    ConnectionState::Disconnected if saw_attempt => {
                        return Err(RealtimeError::ConnectionUnavailable {
                            reason: "connect attempt failed".to_string(),
                        });
                    }
                    ConnectionState::Disconnected => {}
                }
                if states.changed().await.is_err() {
                    return Err(RealtimeError::ConnectionUnavailable {
                        reason: "connection manager gone".to_string(),
                    });
                }
            }
        };
        match tokio::time::timeout(self.inner.request_timeout, wait).await {
            Ok(result) => result,
            Err(_) => Err(RealtimeError::ConnectionUnavailable {
                reason: "timed out waiting for connection".to_string(),
            }),
        }
    }
}

impl<E: ChannelEvent> Inner<E> {
    fn publish(&self, state: ConnectionState) {
        self.state_tx.send_replace(state);
    }

    fn clear_outbound(&self) {
        self.outbound.lock().expect("outbound slot lock").take();
    }

    /// A token fit to connect with: present and unexpired, refreshing
    /// through the injected refresher when possible.
    async fn usable_token(&self) -> Result<SessionToken, RealtimeError> {
        let token = self.credentials.get_token().await?;
        let Some(token) = token else {
            return Err(RealtimeError::AuthenticationUnavailable);
        };
        if !self.credentials.is_token_expired() {
            return Ok(token);
        }

        let Some(refresher) = &self.refresher else {
            tracing::warn!(
                channel = self.label,
                "session token expired and no refresher configured"
            );
            return Err(RealtimeError::AuthenticationUnavailable);
        };
        tracing::debug!(channel = self.label, "refreshing expired session token");
        let raw = match refresher.refresh_token().await {
            Ok(raw) => raw,
            Err(err) => {
                tracing::warn!(channel = self.label, error = %err, "token refresh failed");
                return Err(RealtimeError::AuthenticationUnavailable);
            }
        };
        self.credentials.set_token(&raw).await?;
        self.credentials
            .get_token()
            .await?
            .ok_or(RealtimeError::AuthenticationUnavailable)
    }

    async fn connect_once(&self) -> Result<Box<dyn TransportSession>, RealtimeError> {
        let token = self.usable_token().await?;
        self.transport
            .connect(&self.endpoint, &token.authorization_value())
            .await
    }

    async fn run_supervisor(inner: Arc<Self>, shutdown: Arc<Notify>) {
        loop {
            let attempt = inner.attempt.load(Ordering::SeqCst);
            inner.publish(if attempt == 0 {
                ConnectionState::Connecting
            } else {
                ConnectionState::Reconnecting
            });

            match inner.connect_once().await {
                Ok(session) => {
                    inner.attempt.store(0, Ordering::SeqCst);
                    inner.publish(ConnectionState::Connected);
                    tracing::info!(channel = inner.label, "realtime channel connected");

                    let exit = inner.pump(session, &shutdown).await;
                    inner.clear_outbound();
                    inner.publish(ConnectionState::Disconnected);
                    if matches!(exit, PumpExit::Shutdown) {
                        return;
                    }
                }
                Err(RealtimeError::AuthenticationUnavailable) => {
                    tracing::warn!(
                        channel = inner.label,
                        "credentials unavailable, abandoning reconnect"
                    );
                    inner.publish(ConnectionState::Disconnected);
                    return;
                }
                Err(err) => {
                    tracing::warn!(channel = inner.label, error = %err, "connect failed");
                    inner.publish(ConnectionState::Disconnected);
                }
            }

            let attempt = inner.attempt.load(Ordering::SeqCst);
            if inner.backoff.attempts_exhausted(attempt) {
                tracing::warn!(
                    channel = inner.label,
                    attempts = attempt,
                    "reconnect budget exhausted, waiting for an external start"
                );
                return;
            }
            let delay = inner.backoff.delay_for(attempt);
            inner.attempt.store(attempt + 1, Ordering::SeqCst);
            tracing::debug!(
                channel = inner.label,
                attempt,
                delay_ms = delay.as_millis() as u64,
                "scheduling reconnect"
            );
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = inner.wake.notified() => {
                    tracing::debug!(channel = inner.label, "backoff skipped by wake signal");
                }
                _ = shutdown.notified() => return,
            }
        }
    }

    /// Drive one established connection: outbound commands, inbound
    /// dispatch, shutdown.
    async fn pump(
        &self,
        mut session: Box<dyn TransportSession>,
        shutdown: &Notify,
    ) -> PumpExit {
        enum Step {
            Shutdown,
            Outbound(Option<OutboundCommand>),
            Inbound(Option<Result<String, RealtimeError>>),
        }

        let (outbound_tx, mut outbound_rx) = mpsc::channel::<OutboundCommand>(16);
        *self.outbound.lock().expect("outbound slot lock") = Some(outbound_tx);

        let exit = loop {
            let step = tokio::select! {
                _ = shutdown.notified() => Step::Shutdown,
                command = outbound_rx.recv() => Step::Outbound(command),
                inbound = session.recv() => Step::Inbound(inbound),
            };
            match step {
                Step::Shutdown => break PumpExit::Shutdown,
                Step::Outbound(Some(command)) => {
                    let result = session.send(&command.text).await;
                    let failed = result.is_err();
                    let _ = command.ack.send(result);
                    if failed {
                        tracing::warn!(channel = self.label, "send failed, dropping connection");
                        break PumpExit::ConnectionLost;
                    }
                }
                Step::Outbound(None) => break PumpExit::ConnectionLost,
                Step::Inbound(Some(Ok(text))) => self.dispatch_text(&text),
                Step::Inbound(Some(Err(err))) => {
                    tracing::warn!(channel = self.label, error = %err, "connection error");
                    break PumpExit::ConnectionLost;
                }
                Step::Inbound(None) => {
                    tracing::info!(channel = self.label, "connection closed by server");
                    break PumpExit::ConnectionLost;
                }
            }
        };
        session.close().await;
        exit
    }

    fn dispatch_text(&self, text: &str) {
        match serde_json::from_str::<E>(text) {
            Ok(event) => self.listeners.dispatch(&event),
            Err(err) => {
                tracing::warn!(channel = self.label, error = %err, "undecodable inbound event");
            }
        }
    }
}
