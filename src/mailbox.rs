/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 14/10/26
******************************************************************************/

//! Per-subscriber delivery mailboxes.
//!
//! A [`Mailbox`] is the sequencer's handle to one subscriber: a bounded queue
//! of encoded frames plus a dedicated task that owns the subscriber socket and
//! writes those frames in the order they were queued. The sequencer is the
//! only producer into the queue and never waits on it; see [`OverflowPolicy`]
//! for what happens when a subscriber cannot keep up.

use crate::event::UserId;
use crate::sequencer::core::WeakSequencerSender;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Unique id of one mailbox instance.
///
/// A user that reconnects gets a new mailbox with a new id, which lets the
/// sequencer ignore late deregistrations from the connection it replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MailboxId(Uuid);

impl MailboxId {
    /// Generates a fresh random id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for MailboxId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MailboxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// What to do with a frame when the subscriber's queue is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Discard the new frame for this subscriber only.
    #[default]
    DropNewest,

    /// Close the subscriber's connection and remove it.
    Disconnect,
}

impl std::str::FromStr for OverflowPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "drop_newest" => Ok(Self::DropNewest),
            "disconnect" => Ok(Self::Disconnect),
            other => Err(format!("unknown overflow policy {other:?}")),
        }
    }
}

/// An encoded frame waiting to be written to a subscriber.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// Sequence number of the event the frame encodes.
    pub sequence: u64,
    /// Payload plus line delimiter.
    pub frame: Bytes,
}

/// Result of offering a frame to a mailbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Offer {
    /// The frame is queued.
    Enqueued,
    /// The queue was full and the frame was discarded.
    Dropped,
    /// The queue was full and the mailbox has been closed.
    Overflowed,
    /// The delivery task is gone.
    Closed,
}

impl Offer {
    /// Returns `true` if the mailbox should be removed from the subscriber map.
    #[inline]
    #[must_use]
    pub fn is_dead(self) -> bool {
        matches!(self, Self::Overflowed | Self::Closed)
    }
}

/// Queue sizing and overflow behaviour shared by every mailbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MailboxSettings {
    /// Maximum number of queued frames per subscriber.
    pub capacity: usize,
    /// Behaviour when the queue is full.
    pub policy: OverflowPolicy,
}

impl Default for MailboxSettings {
    fn default() -> Self {
        Self {
            capacity: 1024,
            policy: OverflowPolicy::default(),
        }
    }
}

/// Everything a delivery task needs besides its socket.
#[derive(Debug, Clone)]
pub struct MailboxContext {
    /// Queue sizing and overflow behaviour.
    pub settings: MailboxSettings,
    /// Server-wide shutdown signal; each mailbox listens on a child token.
    pub shutdown: CancellationToken,
    /// Used to deregister when the socket fails.
    pub sequencer: WeakSequencerSender,
    /// Tracks delivery tasks so shutdown can wait for them.
    pub tracker: TaskTracker,
}

/// Why a delivery task ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryExit {
    /// Closed by shutdown, replacement, or the overflow policy.
    Cancelled,
    /// The sequencer dropped its handle to the queue.
    Drained,
    /// The subscriber went away and a write reported it.
    PeerClosed,
    /// Reading from or writing to the socket failed.
    Failed,
}

/// The sequencer's handle to one subscriber.
#[derive(Debug, Clone)]
pub struct Mailbox {
    id: MailboxId,
    user: UserId,
    tx: mpsc::Sender<Delivery>,
    cancel: CancellationToken,
    policy: OverflowPolicy,
}

impl Mailbox {
    /// Creates a mailbox whose queue is drained by the caller.
    ///
    /// Useful for in-process subscribers and tests.
    ///
    /// # Examples
    ///
    /// ```
    /// use follower_relay::mailbox::{Delivery, Mailbox, Offer, OverflowPolicy};
    /// use follower_relay::UserId;
    ///
    /// let (mailbox, mut rx) = Mailbox::channel(UserId(5), 1, OverflowPolicy::DropNewest);
    /// let delivery = Delivery { sequence: 1, frame: "1|B\r\n".into() };
    /// assert_eq!(mailbox.offer(delivery.clone()), Offer::Enqueued);
    /// assert_eq!(mailbox.offer(delivery.clone()), Offer::Dropped);
    /// assert_eq!(rx.try_recv().ok(), Some(delivery));
    /// ```
    #[must_use]
    pub fn channel(
        user: UserId,
        capacity: usize,
        policy: OverflowPolicy,
    ) -> (Self, mpsc::Receiver<Delivery>) {
        Self::with_token(user, capacity, policy, CancellationToken::new())
    }

    fn with_token(
        user: UserId,
        capacity: usize,
        policy: OverflowPolicy,
        cancel: CancellationToken,
    ) -> (Self, mpsc::Receiver<Delivery>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let mailbox = Self {
            id: MailboxId::new(),
            user,
            tx,
            cancel,
            policy,
        };
        (mailbox, rx)
    }

    /// Creates a mailbox whose delivery task owns `stream`.
    ///
    /// The task writes every queued frame to the stream. It stops when the
    /// mailbox is closed, the server shuts down, or a read or write fails.
    /// A subscriber that only closes its write half keeps receiving. On a
    /// failure the task asks the sequencer to forget this mailbox.
    pub fn spawn<S>(user: UserId, stream: S, ctx: &MailboxContext) -> (Self, JoinHandle<DeliveryExit>)
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (mailbox, rx) = Self::with_token(
            user,
            ctx.settings.capacity,
            ctx.settings.policy,
            ctx.shutdown.child_token(),
        );
        let task = deliver(
            user,
            mailbox.id,
            stream,
            rx,
            mailbox.cancel.clone(),
            ctx.sequencer.clone(),
        );
        let handle = ctx.tracker.spawn(task);
        (mailbox, handle)
    }

    /// This mailbox's unique id.
    #[inline]
    #[must_use]
    pub fn id(&self) -> MailboxId {
        self.id
    }

    /// The subscriber this mailbox delivers to.
    #[inline]
    #[must_use]
    pub fn user(&self) -> UserId {
        self.user
    }

    /// Queues a frame without waiting.
    ///
    /// When the queue is full the mailbox's [`OverflowPolicy`] decides
    /// between dropping the frame and closing the mailbox.
    pub fn offer(&self, delivery: Delivery) -> Offer {
        if self.cancel.is_cancelled() {
            return Offer::Closed;
        }
        match self.tx.try_send(delivery) {
            Ok(()) => Offer::Enqueued,
            Err(TrySendError::Full(delivery)) => match self.policy {
                OverflowPolicy::DropNewest => {
                    warn!(user = %self.user, sequence = delivery.sequence, "subscriber queue full, dropping event");
                    Offer::Dropped
                }
                OverflowPolicy::Disconnect => {
                    warn!(user = %self.user, sequence = delivery.sequence, "subscriber queue full, disconnecting");
                    self.close();
                    Offer::Overflowed
                }
            },
            Err(TrySendError::Closed(_)) => Offer::Closed,
        }
    }

    /// Stops the delivery task. Frames still queued are discarded.
    pub fn close(&self) {
        self.cancel.cancel();
    }

    /// Returns `true` once the mailbox can no longer deliver.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled() || self.tx.is_closed()
    }
}

async fn deliver<S>(
    user: UserId,
    id: MailboxId,
    stream: S,
    mut rx: mpsc::Receiver<Delivery>,
    cancel: CancellationToken,
    sequencer: WeakSequencerSender,
) -> DeliveryExit
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let (mut reader, mut writer) = tokio::io::split(stream);
    let mut scratch = [0u8; 256];
    // A half-closed subscriber still receives events.
    let mut read_open = true;

    let exit = loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break DeliveryExit::Cancelled,
            next = rx.recv() => {
                let Some(delivery) = next else {
                    break DeliveryExit::Drained;
                };
                let written = tokio::select! {
                    biased;
                    () = cancel.cancelled() => None,
                    written = writer.write_all(&delivery.frame) => Some(written),
                };
                match written {
                    None => break DeliveryExit::Cancelled,
                    Some(Ok(())) => {}
                    Some(Err(error)) if is_peer_gone(&error) => {
                        debug!(%user, sequence = delivery.sequence, %error, "subscriber disconnected");
                        break DeliveryExit::PeerClosed;
                    }
                    Some(Err(error)) => {
                        warn!(%user, sequence = delivery.sequence, %error, "subscriber write failed");
                        break DeliveryExit::Failed;
                    }
                }
            }
            read = reader.read(&mut scratch), if read_open => match read {
                Ok(0) => {
                    debug!(%user, "subscriber closed its write half");
                    read_open = false;
                }
                // Subscribers only ever send their registration line.
                Ok(_) => {}
                Err(error) => {
                    debug!(%user, %error, "subscriber read failed");
                    break DeliveryExit::Failed;
                }
            },
        }
    };

    if let Err(error) = writer.shutdown().await {
        debug!(%user, %error, "subscriber socket did not shut down cleanly");
    }

    if matches!(exit, DeliveryExit::PeerClosed | DeliveryExit::Failed) {
        if let Some(sequencer) = sequencer.upgrade() {
            // The sequencer may already be gone during shutdown.
            let _ = sequencer.deregister(user, id).await;
        }
    }

    info!(%user, mailbox = %id, ?exit, "subscriber delivery stopped");
    exit
}

fn is_peer_gone(error: &std::io::Error) -> bool {
    matches!(
        error.kind(),
        std::io::ErrorKind::BrokenPipe
            | std::io::ErrorKind::ConnectionReset
            | std::io::ErrorKind::ConnectionAborted
    )
}
