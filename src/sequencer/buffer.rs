/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 14/10/26
******************************************************************************/

//! Reorder buffer and sequence cursor.

use crate::event::Event;
use std::collections::HashMap;

/// Result of offering an event to the [`PendingBuffer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// The event is buffered.
    Accepted,
    /// The same sequence is already buffered; the new event was not stored.
    Duplicate,
    /// The sequence is below the cursor; the event was not stored.
    Stale,
}

/// Events received ahead of the cursor, keyed by sequence number.
///
/// The cursor only moves through [`pop_ready`](Self::pop_ready), by exactly
/// one per released event. Once a drain loop has run, every buffered entry
/// is strictly ahead of the cursor.
///
/// # Examples
///
/// ```
/// use follower_relay::sequencer::buffer::{Admission, PendingBuffer};
/// use follower_relay::{Event, EventKind};
///
/// let mut buffer = PendingBuffer::new(1);
/// assert_eq!(buffer.insert(Event::new(2, EventKind::Broadcast)), Admission::Accepted);
/// assert!(buffer.pop_ready().is_none());
///
/// buffer.insert(Event::new(1, EventKind::Broadcast));
/// assert_eq!(buffer.pop_ready().map(|e| e.sequence()), Some(1));
/// assert_eq!(buffer.pop_ready().map(|e| e.sequence()), Some(2));
/// assert_eq!(buffer.cursor(), 3);
/// ```
#[derive(Debug, Clone)]
pub struct PendingBuffer {
    cursor: u64,
    // Set once `u64::MAX` has been released; nothing can follow it.
    exhausted: bool,
    pending: HashMap<u64, Event>,
}

impl PendingBuffer {
    /// Creates an empty buffer whose cursor starts at `initial_sequence`.
    #[must_use]
    pub fn new(initial_sequence: u64) -> Self {
        Self {
            cursor: initial_sequence,
            exhausted: false,
            pending: HashMap::new(),
        }
    }

    /// Next sequence number eligible for release.
    #[inline]
    #[must_use]
    pub fn cursor(&self) -> u64 {
        self.cursor
    }

    /// Returns `true` once the last representable sequence was released.
    #[inline]
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Number of buffered events.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Returns `true` if nothing is buffered.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Buffers `event` at its sequence number.
    ///
    /// The first arrival for a sequence wins; later ones are reported as
    /// [`Admission::Duplicate`]. After `u64::MAX` is released every
    /// arrival is [`Admission::Stale`].
    pub fn insert(&mut self, event: Event) -> Admission {
        let sequence = event.sequence();
        if self.exhausted || sequence < self.cursor {
            return Admission::Stale;
        }
        match self.pending.entry(sequence) {
            std::collections::hash_map::Entry::Occupied(_) => Admission::Duplicate,
            std::collections::hash_map::Entry::Vacant(slot) => {
                slot.insert(event);
                Admission::Accepted
            }
        }
    }

    /// Removes and returns the event at the cursor, advancing the cursor.
    pub fn pop_ready(&mut self) -> Option<Event> {
        if self.exhausted {
            return None;
        }
        let event = self.pending.remove(&self.cursor)?;
        match self.cursor.checked_add(1) {
            Some(next) => self.cursor = next,
            None => self.exhausted = true,
        }
        Some(event)
    }
}
