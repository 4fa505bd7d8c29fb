//! Hub event types.
//!
//! Each hub speaks a tagged JSON event stream. The payload mapping for a hub
//! is captured by [`ChannelEvent`], so one connection manager serves every
//! hub; chat and notifications below are its two configured instances.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::Hash;

/// Event-name-to-payload mapping for one hub.
pub trait ChannelEvent: DeserializeOwned + Clone + Send + Sync + 'static {
    /// The event-name half of the mapping, used to key listener
    /// registrations.
    type Kind: Copy + Eq + Hash + fmt::Debug + Send + Sync + 'static;

    fn kind(&self) -> Self::Kind;
}

// ============================================================================
// CHAT HUB
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub message_id: i64,
    pub conversation_id: i64,
    pub sender_id: i64,
    pub body: String,
    pub sent_at: DateTime<Utc>,
}

/// Events broadcast by the chat hub.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ChatEvent {
    /// A new message arrived in one of the user's conversations.
    MessageReceived { message: ChatMessage },

    /// A previously sent message was read.
    MessageRead {
        conversation_id: i64,
        message_id: i64,
        reader_id: i64,
    },

    TypingStarted { conversation_id: i64, user_id: i64 },

    TypingStopped { conversation_id: i64, user_id: i64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChatEventKind {
    MessageReceived,
    MessageRead,
    TypingStarted,
    TypingStopped,
}

impl ChannelEvent for ChatEvent {
    type Kind = ChatEventKind;

    fn kind(&self) -> ChatEventKind {
        match self {
            ChatEvent::MessageReceived { .. } => ChatEventKind::MessageReceived,
            ChatEvent::MessageRead { .. } => ChatEventKind::MessageRead,
            ChatEvent::TypingStarted { .. } => ChatEventKind::TypingStarted,
            ChatEvent::TypingStopped { .. } => ChatEventKind::TypingStopped,
        }
    }
}

// ============================================================================
// NOTIFICATION HUB
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub notification_id: i64,
    pub title: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

/// Events broadcast by the notification hub.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum NotificationEvent {
    NotificationReceived { notification: Notification },

    /// One of the user's bookings changed state server-side.
    BookingStatusChanged {
        booking_id: i64,
        status: BookingStatus,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationEventKind {
    NotificationReceived,
    BookingStatusChanged,
}

impl ChannelEvent for NotificationEvent {
    type Kind = NotificationEventKind;

    fn kind(&self) -> NotificationEventKind {
        match self {
            NotificationEvent::NotificationReceived { .. } => {
                NotificationEventKind::NotificationReceived
            }
            NotificationEvent::BookingStatusChanged { .. } => {
                NotificationEventKind::BookingStatusChanged
            }
        }
    }
}
