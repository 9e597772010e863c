/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 14/10/26
******************************************************************************/

//! # follower-relay
//!
//! An event sequencer and publish/subscribe fan-out server.
//!
//! A producer connection streams sequence-numbered events that may arrive out
//! of order. The [`Sequencer`] buffers them until they are contiguous, applies
//! follow and unfollow events to a [`FollowerGraph`], and routes every released
//! event to the [`Mailbox`]es of the subscribers that should see it. Each
//! mailbox owns its subscriber socket and writes frames in sequence order.
//!
//! ```text
//!  producer ──► codec ──► Sequencer ──► route ──► Mailbox ──► subscriber
//!                           │  ▲
//!                 PendingBuffer │ FollowerGraph
//! ```
//!
//! All shared mutable state (pending buffer, cursor, follower graph, subscriber
//! map) is owned by the single sequencer task. Everything else talks to it over
//! a channel.
//!
//! # Examples
//!
//! ```no_run
//! use follower_relay::{Server, ServerConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ServerConfig::default();
//! let mut server = Server::start(&config).await?;
//! println!("events on {}, subscribers on {}", server.event_addr(), server.subscriber_addr());
//! server.shutdown().await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod event;
pub mod graph;
pub mod logging;
pub mod mailbox;
pub mod sequencer;
pub mod server;
pub mod signals;

pub use config::{LogLevel, ServerConfig};
pub use error::{CodecError, ConfigError, FrameError, SequencerError, ServerError};
pub use event::{Event, EventKind, UserId};
pub use graph::FollowerGraph;
pub use mailbox::{Delivery, Mailbox, MailboxId, OverflowPolicy};
pub use sequencer::{
    DispatchEvent, Dispatcher, IngestOutcome, Sequencer, SequencerHandle, SequencerReceipt,
    SequencerSender, SequencerStatus,
};
pub use server::{Server, ServerState};
