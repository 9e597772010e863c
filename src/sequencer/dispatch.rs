/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 14/10/26
******************************************************************************/

//! The Sequencer's state machine.
//!
//! [`Dispatcher`] owns the pending buffer, the cursor, the follower graph and
//! the subscriber map. It is fully synchronous: the task in
//! [`core`](super::core) feeds it commands, and tests can drive it directly.

use super::buffer::{Admission, PendingBuffer};
use super::event::DispatchEvent;
use super::receipt::SequencerStatus;
use super::result::IngestOutcome;
use super::routing::{self, Route};
use crate::event::{Event, UserId, codec};
use crate::graph::FollowerGraph;
use crate::mailbox::{Delivery, Mailbox, MailboxId, Offer};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

/// Type alias for dispatch listener functions.
pub(crate) type DispatchListener = Arc<dyn Fn(&DispatchEvent) + Send + Sync>;

/// Owns all mutable sequencing state and applies commands to it in order.
///
/// # Examples
///
/// ```
/// use follower_relay::sequencer::{Dispatcher, IngestOutcome};
/// use follower_relay::mailbox::{Mailbox, OverflowPolicy};
/// use follower_relay::{Event, EventKind, UserId};
///
/// let mut dispatcher = Dispatcher::new(1);
/// let (mailbox, mut rx) = Mailbox::channel(UserId(5), 16, OverflowPolicy::DropNewest);
/// dispatcher.register(mailbox);
///
/// let dm = EventKind::PrivateMessage { from: UserId(9), to: UserId(5) };
/// assert_eq!(dispatcher.ingest(Event::new(2, EventKind::Broadcast)), IngestOutcome::Buffered);
/// assert_eq!(dispatcher.ingest(Event::new(1, dm)), IngestOutcome::Released { count: 2 });
///
/// assert_eq!(&rx.try_recv().unwrap().frame[..], b"1|P|9|5\r\n");
/// assert_eq!(&rx.try_recv().unwrap().frame[..], b"2|B\r\n");
/// ```
pub struct Dispatcher {
    buffer: PendingBuffer,
    graph: FollowerGraph,
    subscribers: HashMap<UserId, Mailbox>,
    listeners: Vec<DispatchListener>,
    dispatched: u64,
}

impl Dispatcher {
    /// Creates a dispatcher whose cursor starts at `initial_sequence`.
    #[must_use]
    pub fn new(initial_sequence: u64) -> Self {
        Self {
            buffer: PendingBuffer::new(initial_sequence),
            graph: FollowerGraph::new(),
            subscribers: HashMap::new(),
            listeners: Vec::new(),
            dispatched: 0,
        }
    }

    /// Registers a listener called synchronously, in sequence order, after
    /// every routed event.
    pub fn add_listener<F>(&mut self, listener: F)
    where
        F: Fn(&DispatchEvent) + Send + Sync + 'static,
    {
        self.listeners.push(Arc::new(listener));
    }

    /// Buffers `event` and routes every event that became contiguous.
    ///
    /// The whole backlog is drained before returning, so a single late
    /// arrival can release an arbitrarily long run.
    pub fn ingest(&mut self, event: Event) -> IngestOutcome {
        let sequence = event.sequence();
        match self.buffer.insert(event) {
            Admission::Accepted => {}
            Admission::Duplicate => {
                warn!(sequence, "discarding event with an already buffered sequence");
                return IngestOutcome::Duplicate;
            }
            Admission::Stale => {
                warn!(
                    sequence,
                    cursor = self.buffer.cursor(),
                    "discarding event below the cursor"
                );
                return IngestOutcome::Stale;
            }
        }

        let mut count = 0;
        while let Some(ready) = self.buffer.pop_ready() {
            self.dispatch(&ready);
            count += 1;
        }

        if count == 0 {
            trace!(sequence, cursor = self.buffer.cursor(), "event buffered");
            IngestOutcome::Buffered
        } else {
            IngestOutcome::Released { count }
        }
    }

    /// Attaches `mailbox` to its user.
    ///
    /// A mailbox already registered for that user is closed and replaced.
    /// Returns `true` if a previous mailbox was replaced.
    pub fn register(&mut self, mailbox: Mailbox) -> bool {
        let user = mailbox.user();
        let id = mailbox.id();
        match self.subscribers.insert(user, mailbox) {
            Some(previous) => {
                info!(%user, old = %previous.id(), new = %id, "subscriber re-registered, closing previous connection");
                previous.close();
                true
            }
            None => {
                debug!(%user, mailbox = %id, "subscriber registered");
                false
            }
        }
    }

    /// Detaches the mailbox for `user` if it is still `mailbox`.
    ///
    /// Returns `true` if a mapping was removed.
    pub fn deregister(&mut self, user: UserId, mailbox: MailboxId) -> bool {
        if self.subscribers.get(&user).is_some_and(|m| m.id() == mailbox) {
            self.subscribers.remove(&user);
            debug!(%user, %mailbox, "subscriber deregistered");
            true
        } else {
            false
        }
    }

    /// Closes and forgets every registered mailbox.
    pub fn close_all(&mut self) {
        for (_, mailbox) in self.subscribers.drain() {
            mailbox.close();
        }
    }

    /// Next sequence number eligible for release.
    #[must_use]
    pub fn cursor(&self) -> u64 {
        self.buffer.cursor()
    }

    /// Read access to the follower graph.
    #[must_use]
    pub fn graph(&self) -> &FollowerGraph {
        &self.graph
    }

    /// Returns `true` if `user` has a registered mailbox.
    #[must_use]
    pub fn is_registered(&self, user: UserId) -> bool {
        self.subscribers.contains_key(&user)
    }

    /// Snapshot of the cursor and table sizes.
    #[must_use]
    pub fn status(&self) -> SequencerStatus {
        SequencerStatus {
            cursor: self.buffer.cursor(),
            pending: self.buffer.len(),
            subscribers: self.subscribers.len(),
            followed_users: self.graph.len(),
            dispatched: self.dispatched,
        }
    }

    /// Applies one released event to the graph and delivers it.
    fn dispatch(&mut self, event: &Event) {
        let route = routing::apply(event.kind(), &mut self.graph);
        let delivery = Delivery {
            sequence: event.sequence(),
            frame: codec::encode(event),
        };

        let mut recipients = Vec::new();
        let mut dead = Vec::new();
        let mut offer = |user: UserId| {
            if let Some(mailbox) = self.subscribers.get(&user) {
                let result = mailbox.offer(delivery.clone());
                if result.is_dead() {
                    dead.push(user);
                } else if result == Offer::Enqueued {
                    recipients.push(user);
                }
            }
        };

        match route {
            Route::Nobody => {}
            Route::User(user) => offer(user),
            Route::Everyone => self.subscribers.keys().copied().for_each(&mut offer),
            Route::FollowersOf(user) => self.graph.followers_of(user).for_each(&mut offer),
        }

        for user in dead {
            self.subscribers.remove(&user);
            debug!(%user, "removed closed subscriber");
        }

        self.dispatched += 1;
        trace!(
            sequence = event.sequence(),
            kind = %event.kind().code(),
            recipients = recipients.len(),
            "event dispatched"
        );

        if !self.listeners.is_empty() {
            let record = DispatchEvent::new(
                event.sequence(),
                nanos_since_epoch(),
                *event.kind(),
                recipients,
            );
            for listener in &self.listeners {
                listener(&record);
            }
        }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("status", &self.status())
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

/// Returns the current time in nanoseconds since the Unix epoch.
#[inline]
fn nanos_since_epoch() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}
