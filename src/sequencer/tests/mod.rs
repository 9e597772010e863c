/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 14/10/26
******************************************************************************/

//! Tests for the Sequencer module.

pub mod error_handling;

use crate::mailbox::{Delivery, Mailbox, OverflowPolicy};
use crate::{Event, EventKind, UserId};
use tokio::sync::mpsc;

/// Builds a channel-backed mailbox with room for 1024 frames.
pub(crate) fn mailbox(user: u64) -> (Mailbox, mpsc::Receiver<Delivery>) {
    Mailbox::channel(UserId(user), 1024, OverflowPolicy::DropNewest)
}

/// Collects every frame currently queued, without terminators.
pub(crate) fn drain(rx: &mut mpsc::Receiver<Delivery>) -> Vec<String> {
    let mut lines = Vec::new();
    while let Ok(delivery) = rx.try_recv() {
        let text = String::from_utf8_lossy(&delivery.frame);
        lines.push(text.trim_end_matches("\r\n").to_owned());
    }
    lines
}

pub(crate) fn follow(sequence: u64, from: u64, to: u64) -> Event {
    Event::new(
        sequence,
        EventKind::Follow {
            from: UserId(from),
            to: UserId(to),
        },
    )
}

pub(crate) fn unfollow(sequence: u64, from: u64, to: u64) -> Event {
    Event::new(
        sequence,
        EventKind::Unfollow {
            from: UserId(from),
            to: UserId(to),
        },
    )
}

pub(crate) fn broadcast(sequence: u64) -> Event {
    Event::new(sequence, EventKind::Broadcast)
}

pub(crate) fn private_message(sequence: u64, from: u64, to: u64) -> Event {
    Event::new(
        sequence,
        EventKind::PrivateMessage {
            from: UserId(from),
            to: UserId(to),
        },
    )
}

pub(crate) fn status_update(sequence: u64, from: u64) -> Event {
    Event::new(sequence, EventKind::StatusUpdate { from: UserId(from) })
}
