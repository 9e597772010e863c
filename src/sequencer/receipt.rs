/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 14/10/26
******************************************************************************/

//! Sequencer receipt types.
//!
//! This module defines what the Sequencer sends back to callers.

use super::result::IngestOutcome;

/// Receipt returned after submitting an event to the Sequencer.
///
/// # Examples
///
/// ```
/// use follower_relay::sequencer::{IngestOutcome, SequencerReceipt};
///
/// let receipt = SequencerReceipt::new(42, IngestOutcome::Buffered);
/// assert_eq!(receipt.sequence_num, 42);
/// assert!(receipt.is_accepted());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequencerReceipt {
    /// The sequence number carried by the submitted event.
    pub sequence_num: u64,

    /// What the Sequencer did with it.
    pub outcome: IngestOutcome,
}

impl SequencerReceipt {
    /// Creates a new receipt.
    #[must_use]
    pub fn new(sequence_num: u64, outcome: IngestOutcome) -> Self {
        Self {
            sequence_num,
            outcome,
        }
    }

    /// Returns `true` if the event was kept.
    #[inline]
    #[must_use]
    pub fn is_accepted(&self) -> bool {
        self.outcome.is_accepted()
    }
}

/// Point-in-time view of the Sequencer's state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SequencerStatus {
    /// Next sequence number eligible for release.
    pub cursor: u64,
    /// Events waiting for an earlier sequence.
    pub pending: usize,
    /// Registered subscribers.
    pub subscribers: usize,
    /// Users with at least one follower.
    pub followed_users: usize,
    /// Events routed since start.
    pub dispatched: u64,
}
