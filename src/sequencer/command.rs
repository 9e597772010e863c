/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 14/10/26
******************************************************************************/

//! Sequencer command types.
//!
//! This module defines the work items other tasks hand to the Sequencer.
//! Commands are executed one at a time, in arrival order across all senders.

use super::receipt::{SequencerReceipt, SequencerStatus};
use crate::event::{Event, UserId};
use crate::mailbox::{Mailbox, MailboxId};
use tokio::sync::oneshot;

/// Commands that can be submitted to the Sequencer.
#[derive(Debug)]
pub enum SequencerCommand {
    /// Buffer an event and release everything that became contiguous.
    Ingest {
        /// The decoded event.
        event: Event,
        /// Where to send the receipt, if the caller wants one.
        reply: Option<oneshot::Sender<SequencerReceipt>>,
    },

    /// Attach a mailbox, replacing any earlier one for the same user.
    Register {
        /// The subscriber's mailbox.
        mailbox: Mailbox,
    },

    /// Detach a mailbox if it is still the one registered for `user`.
    Deregister {
        /// The subscriber.
        user: UserId,
        /// The mailbox that went away.
        mailbox: MailboxId,
    },

    /// Report the current cursor and table sizes.
    Status {
        /// Where to send the snapshot.
        reply: oneshot::Sender<SequencerStatus>,
    },
}
