/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 14/10/26
******************************************************************************/

//! Sequencer module for total ordering of event delivery.
//!
//! This module provides a single-task Sequencer that buffers out-of-order
//! events, releases them in strict sequence order, applies them to the
//! follower graph and routes them to subscriber mailboxes. This follows the
//! LMAX Disruptor pattern: one writer owns all mutable state.
//!
//! # Architecture
//!
//! - Commands are submitted via a bounded async channel
//! - A single event loop applies commands in arrival order
//! - Each ingest drains every event that became contiguous before the loop
//!   takes the next command
//! - Receipts and status snapshots are returned via oneshot channels
//! - Dispatch records are emitted to registered listeners in sequence order
//! - Frames are handed to mailboxes with a non-blocking send
//!
//! # Examples
//!
//! ```no_run
//! use follower_relay::sequencer::Sequencer;
//! use follower_relay::{Event, EventKind, UserId};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut sequencer = Sequencer::new(1);
//!
//! // Register a dispatch listener
//! sequencer.add_listener(|event| {
//!     println!("Event {}: {} recipient(s)", event.sequence_num, event.recipients.len());
//! });
//!
//! let sender = sequencer.sender();
//! let handle = sequencer.spawn();
//!
//! // Submit events (from any task)
//! let follow = EventKind::Follow { from: UserId(1), to: UserId(2) };
//! sender.submit(Event::new(1, follow)).await?;
//!
//! // Dropping the last sender stops the loop
//! drop(sender);
//! handle.wait().await?;
//! # Ok(())
//! # }
//! ```

pub mod buffer;
pub mod command;
pub mod core;
pub mod dispatch;
pub mod event;
pub mod receipt;
pub mod result;
pub mod routing;

#[cfg(test)]
mod tests;

// Re-export main types
pub use command::SequencerCommand;
pub use self::core::{Sequencer, SequencerHandle, SequencerSender, WeakSequencerSender};
pub use dispatch::Dispatcher;
pub use event::DispatchEvent;
pub use receipt::{SequencerReceipt, SequencerStatus};
pub use result::IngestOutcome;
