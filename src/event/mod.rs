/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 14/10/26
******************************************************************************/

//! Event records and their wire representation.
//!
//! An [`Event`] is created once by the codec when a producer line is decoded
//! and is never mutated afterwards. It keeps the original line verbatim so
//! subscribers receive exactly what the producer sent.

pub mod codec;
pub mod reader;

pub use codec::{LINE_DELIMITER, decode_event, decode_registration, encode};
pub use reader::{Frame, LineReader};

use std::fmt;

/// Identifier of a user, on either the producer or the subscriber side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UserId(pub u64);

impl UserId {
    /// Wraps a raw numeric id.
    #[inline]
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw numeric id.
    #[inline]
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl From<u64> for UserId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// The closed set of event types, with the user ids each type carries.
///
/// # Examples
///
/// ```
/// use follower_relay::{EventKind, UserId};
///
/// let kind = EventKind::Follow { from: UserId(1), to: UserId(2) };
/// assert_eq!(kind.code(), 'F');
/// assert_eq!(kind.to_string(), "F|1|2");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// `from` starts following `to`.
    Follow {
        /// The new follower.
        from: UserId,
        /// The user being followed.
        to: UserId,
    },

    /// `from` stops following `to`.
    Unfollow {
        /// The former follower.
        from: UserId,
        /// The user being unfollowed.
        to: UserId,
    },

    /// Announcement to every connected subscriber.
    Broadcast,

    /// Direct message from `from` to `to`.
    PrivateMessage {
        /// The sender.
        from: UserId,
        /// The recipient.
        to: UserId,
    },

    /// `from` posted an update for its followers.
    StatusUpdate {
        /// The posting user.
        from: UserId,
    },
}

impl EventKind {
    /// Returns the single-character wire code of this type.
    #[must_use]
    pub const fn code(&self) -> char {
        match self {
            Self::Follow { .. } => 'F',
            Self::Unfollow { .. } => 'U',
            Self::Broadcast => 'B',
            Self::PrivateMessage { .. } => 'P',
            Self::StatusUpdate { .. } => 'S',
        }
    }

    /// Returns the originating user, if this type has one.
    #[must_use]
    pub const fn from_user(&self) -> Option<UserId> {
        match self {
            Self::Follow { from, .. }
            | Self::Unfollow { from, .. }
            | Self::PrivateMessage { from, .. }
            | Self::StatusUpdate { from } => Some(*from),
            Self::Broadcast => None,
        }
    }

    /// Returns the target user, if this type has one.
    #[must_use]
    pub const fn to_user(&self) -> Option<UserId> {
        match self {
            Self::Follow { to, .. } | Self::Unfollow { to, .. } | Self::PrivateMessage { to, .. } => {
                Some(*to)
            }
            Self::Broadcast | Self::StatusUpdate { .. } => None,
        }
    }
}

/// Formats the type code and ids, i.e. everything after `sequence|`.
impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Follow { from, to }
            | Self::Unfollow { from, to }
            | Self::PrivateMessage { from, to } => write!(f, "{}|{from}|{to}", self.code()),
            Self::StatusUpdate { from } => write!(f, "{}|{from}", self.code()),
            Self::Broadcast => write!(f, "{}", self.code()),
        }
    }
}

/// An immutable, sequence-numbered event.
///
/// # Examples
///
/// ```
/// use follower_relay::{Event, EventKind, UserId};
///
/// let event = Event::new(7, EventKind::StatusUpdate { from: UserId(3) });
/// assert_eq!(event.sequence(), 7);
/// assert_eq!(event.payload(), "7|S|3");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    sequence: u64,
    kind: EventKind,
    payload: String,
}

impl Event {
    /// Builds an event with its canonical wire text as payload.
    #[must_use]
    pub fn new(sequence: u64, kind: EventKind) -> Self {
        Self {
            sequence,
            kind,
            payload: format!("{sequence}|{kind}"),
        }
    }

    /// Builds an event that retransmits `payload` verbatim.
    #[must_use]
    pub fn with_payload(sequence: u64, kind: EventKind, payload: impl Into<String>) -> Self {
        Self {
            sequence,
            kind,
            payload: payload.into(),
        }
    }

    /// The global sequence number.
    #[inline]
    #[must_use]
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// The event type and its user ids.
    #[inline]
    #[must_use]
    pub fn kind(&self) -> &EventKind {
        &self.kind
    }

    /// The wire text, without the line terminator.
    #[inline]
    #[must_use]
    pub fn payload(&self) -> &str {
        &self.payload
    }
}
