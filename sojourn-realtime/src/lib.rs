//! Resilient realtime hub connections for the Sojourn client.

pub mod backoff;
pub mod error;
pub mod events;
pub mod lifecycle;
pub mod listeners;
pub mod manager;
pub mod transport;
pub mod ws;

pub use backoff::BackoffPolicy;
pub use error::RealtimeError;
pub use events::{
    BookingStatus, ChannelEvent, ChatEvent, ChatEventKind, ChatMessage, Notification,
    NotificationEvent, NotificationEventKind,
};
pub use lifecycle::{lifecycle_channel, AppState};
pub use listeners::{Listener, ListenerRegistry};
pub use manager::{
    chat_client, notification_client, ChatClient, ConnectionState, NotificationClient,
    RealtimeClient, TokenRefresher,
};
pub use transport::{RealtimeTransport, TransportSession};
pub use ws::WsTransport;
