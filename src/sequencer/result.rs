/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 14/10/26
******************************************************************************/

//! Sequencer result types.
//!
//! This module defines what happened to an event handed to the Sequencer.

/// Outcome of ingesting one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    /// The event closed a gap; `count` events (it included) were routed.
    Released {
        /// Number of events released by this arrival.
        count: usize,
    },

    /// The event is ahead of the cursor and waits in the pending buffer.
    Buffered,

    /// An event with the same sequence is already buffered; this one was
    /// discarded.
    Duplicate,

    /// The sequence is below the cursor, so it was already released; this one
    /// was discarded.
    Stale,
}

impl IngestOutcome {
    /// Returns `true` if the event was kept.
    #[inline]
    #[must_use]
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Released { .. } | Self::Buffered)
    }

    /// Returns `true` if the event was discarded as a protocol violation.
    #[inline]
    #[must_use]
    pub fn is_rejected(&self) -> bool {
        !self.is_accepted()
    }

    /// Number of events routed as a result of this arrival.
    #[inline]
    #[must_use]
    pub fn released(&self) -> usize {
        match self {
            Self::Released { count } => *count,
            _ => 0,
        }
    }
}
