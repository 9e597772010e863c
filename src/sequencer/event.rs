/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 14/10/26
******************************************************************************/

//! Dispatch event types.
//!
//! This module defines the record handed to listeners after each event is
//! released and routed.

use crate::event::{EventKind, UserId};

/// Emitted after routing a released event.
///
/// Listeners see these in strict sequence order, which makes them suitable
/// for auditing and for checking delivery decisions in tests.
///
/// # Examples
///
/// ```
/// use follower_relay::sequencer::DispatchEvent;
/// use follower_relay::{EventKind, UserId};
///
/// let event = DispatchEvent::new(1, 0, EventKind::Broadcast, vec![UserId(3)]);
/// assert!(event.was_delivered_to(UserId(3)));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchEvent {
    /// Sequence number of the released event.
    pub sequence_num: u64,

    /// Nanosecond timestamp when the event was routed.
    pub timestamp_ns: u64,

    /// The event type and its user ids.
    pub kind: EventKind,

    /// Subscribers whose queue accepted the event, in no particular order.
    pub recipients: Vec<UserId>,
}

impl DispatchEvent {
    /// Creates a new dispatch event.
    #[must_use]
    pub fn new(
        sequence_num: u64,
        timestamp_ns: u64,
        kind: EventKind,
        recipients: Vec<UserId>,
    ) -> Self {
        Self {
            sequence_num,
            timestamp_ns,
            kind,
            recipients,
        }
    }

    /// Returns `true` if `user`'s queue accepted the event.
    #[must_use]
    pub fn was_delivered_to(&self, user: UserId) -> bool {
        self.recipients.contains(&user)
    }
}
