//! Application lifecycle wiring.
//!
//! The host app publishes foreground/background transitions on a watch
//! channel; each hub connection subscribes. A foreground resume is a strong
//! signal that connectivity is back, so it reconnects immediately, bypassing
//! any backoff delay. Background transitions take no action (the OS is free
//! to suspend the transport).

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::events::ChannelEvent;
use crate::manager::{ConnectionState, RealtimeClient};

/// Host application foreground/background state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    Foreground,
    Background,
}

/// Channel for the platform lifecycle signal. The app starts foregrounded.
pub fn lifecycle_channel() -> (watch::Sender<AppState>, watch::Receiver<AppState>) {
    watch::channel(AppState::Foreground)
}

impl<E: ChannelEvent> RealtimeClient<E> {
    /// Follow the app lifecycle: reconnect immediately on foreground-resume
    /// while not connected. The returned task ends when the sender side of
    /// the lifecycle channel is dropped.
    pub fn attach_lifecycle(&self, mut states: watch::Receiver<AppState>) -> JoinHandle<()> {
        let client = self.clone();
        tokio::spawn(async move {
            while states.changed().await.is_ok() {
                let state = *states.borrow_and_update();
                if state == AppState::Foreground {
                    client.on_foreground().await;
                }
            }
        })
    }

    async fn on_foreground(&self) {
        if self.current_state() == ConnectionState::Connected {
            return;
        }
        tracing::debug!(
            channel = self.channel_label(),
            "foreground resume, reconnecting immediately"
        );
        self.wake_reconnect();
        if let Err(err) = self.start().await {
            tracing::warn!(
                channel = self.channel_label(),
                error = %err,
                "foreground reconnect not started"
            );
        }
    }
}
