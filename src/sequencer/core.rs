/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 14/10/26
******************************************************************************/

//! Core Sequencer implementation.
//!
//! This module provides the task that owns the [`Dispatcher`] and the handles
//! other tasks use to reach it.

use super::command::SequencerCommand;
use super::dispatch::Dispatcher;
use super::event::DispatchEvent;
use super::receipt::{SequencerReceipt, SequencerStatus};
use crate::error::SequencerError;
use crate::event::{Event, UserId};
use crate::mailbox::{Mailbox, MailboxId};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Default size of the command channel.
pub const DEFAULT_COMMAND_CAPACITY: usize = 65536;

/// A single-task sequencer that releases events in strict sequence order.
///
/// The Sequencer owns the pending buffer, the cursor, the follower graph and
/// the subscriber map. This follows the LMAX Disruptor pattern: a single
/// writer task processes every command in arrival order, so none of that
/// state needs a lock.
///
/// Take every [`SequencerSender`] you need before calling
/// [`spawn`](Self::spawn); the loop ends once all senders are dropped.
///
/// # Examples
///
/// ```
/// use follower_relay::sequencer::{IngestOutcome, Sequencer};
/// use follower_relay::{Event, EventKind};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let sequencer = Sequencer::new(1);
/// let sender = sequencer.sender();
/// let handle = sequencer.spawn();
///
/// let receipt = sender.submit(Event::new(2, EventKind::Broadcast)).await?;
/// assert_eq!(receipt.outcome, IngestOutcome::Buffered);
/// let receipt = sender.submit(Event::new(1, EventKind::Broadcast)).await?;
/// assert_eq!(receipt.outcome, IngestOutcome::Released { count: 2 });
///
/// drop(sender);
/// assert_eq!(handle.wait().await?.cursor, 3);
/// # Ok(())
/// # }
/// ```
pub struct Sequencer {
    /// The state machine driven by the event loop.
    dispatcher: Dispatcher,

    /// Channel for submitting commands.
    command_tx: mpsc::Sender<SequencerCommand>,

    /// Channel for receiving commands (used by event loop).
    command_rx: mpsc::Receiver<SequencerCommand>,

    /// Stops the loop without waiting for senders to go away.
    shutdown: CancellationToken,
}

impl Sequencer {
    /// Creates a new Sequencer whose cursor starts at `initial_sequence`.
    #[must_use]
    pub fn new(initial_sequence: u64) -> Self {
        Self::with_capacity(initial_sequence, DEFAULT_COMMAND_CAPACITY)
    }

    /// Creates a new Sequencer with a specific channel capacity.
    ///
    /// # Arguments
    ///
    /// * `initial_sequence` - The first sequence number to release
    /// * `capacity` - Channel buffer size (backpressure when full)
    #[must_use]
    pub fn with_capacity(initial_sequence: u64, capacity: usize) -> Self {
        let (command_tx, command_rx) = mpsc::channel(capacity.max(1));

        Self {
            dispatcher: Dispatcher::new(initial_sequence),
            command_tx,
            command_rx,
            shutdown: CancellationToken::new(),
        }
    }

    /// Stops the loop when `token` is cancelled.
    #[must_use]
    pub fn with_shutdown(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }

    /// Registers a dispatch listener.
    ///
    /// Listeners are called synchronously in sequence order for each
    /// released event.
    pub fn add_listener<F>(&mut self, listener: F)
    where
        F: Fn(&DispatchEvent) + Send + Sync + 'static,
    {
        self.dispatcher.add_listener(listener);
    }

    /// Returns a new handle for submitting commands.
    #[must_use]
    pub fn sender(&self) -> SequencerSender {
        SequencerSender {
            tx: self.command_tx.clone(),
        }
    }

    /// Spawns the sequencer event loop on a new task.
    ///
    /// Returns a handle that resolves to the final status once the loop
    /// stops.
    #[must_use]
    pub fn spawn(self) -> SequencerHandle {
        let Self {
            dispatcher,
            command_tx,
            command_rx,
            shutdown,
        } = self;
        // Only external senders keep the loop alive.
        drop(command_tx);

        let handle = tokio::spawn(run_loop(dispatcher, command_rx, shutdown));

        SequencerHandle { handle }
    }
}

impl std::fmt::Debug for Sequencer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sequencer")
            .field("dispatcher", &self.dispatcher)
            .finish_non_exhaustive()
    }
}

/// Runs the main event loop (single task).
///
/// Receives commands and applies each one to the dispatcher before taking
/// the next. On exit every mailbox is closed.
async fn run_loop(
    mut dispatcher: Dispatcher,
    mut command_rx: mpsc::Receiver<SequencerCommand>,
    shutdown: CancellationToken,
) -> SequencerStatus {
    loop {
        let command = tokio::select! {
            biased;
            () = shutdown.cancelled() => {
                debug!("sequencer shutdown requested");
                break;
            }
            command = command_rx.recv() => match command {
                Some(command) => command,
                None => {
                    debug!("all sequencer senders dropped");
                    break;
                }
            },
        };
        execute_command(&mut dispatcher, command);
    }

    command_rx.close();
    dispatcher.close_all();
    let status = dispatcher.status();
    info!(
        cursor = status.cursor,
        pending = status.pending,
        dispatched = status.dispatched,
        "sequencer stopped"
    );
    status
}

/// Applies one command to the dispatcher.
fn execute_command(dispatcher: &mut Dispatcher, command: SequencerCommand) {
    match command {
        SequencerCommand::Ingest { event, reply } => {
            let sequence = event.sequence();
            let outcome = dispatcher.ingest(event);
            if let Some(reply) = reply {
                let _ = reply.send(SequencerReceipt::new(sequence, outcome));
            }
        }
        SequencerCommand::Register { mailbox } => {
            dispatcher.register(mailbox);
        }
        SequencerCommand::Deregister { user, mailbox } => {
            dispatcher.deregister(user, mailbox);
        }
        SequencerCommand::Status { reply } => {
            let _ = reply.send(dispatcher.status());
        }
    }
}

/// Handle to a spawned sequencer task.
#[derive(Debug)]
pub struct SequencerHandle {
    handle: tokio::task::JoinHandle<SequencerStatus>,
}

impl SequencerHandle {
    /// Waits for the sequencer to shut down and returns its final status.
    pub async fn wait(self) -> Result<SequencerStatus, tokio::task::JoinError> {
        self.handle.await
    }

    /// Returns `true` once the loop has exited.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Aborts the sequencer task.
    pub fn abort(&self) {
        self.handle.abort();
    }

    pub(crate) fn into_inner(self) -> tokio::task::JoinHandle<SequencerStatus> {
        self.handle
    }
}

/// Cloneable handle for submitting commands to a running sequencer.
#[derive(Debug, Clone)]
pub struct SequencerSender {
    tx: mpsc::Sender<SequencerCommand>,
}

impl SequencerSender {
    /// Submits an event and waits for its receipt.
    ///
    /// # Errors
    ///
    /// Returns [`SequencerError::Shutdown`] if the sequencer has stopped.
    pub async fn submit(&self, event: Event) -> Result<SequencerReceipt, SequencerError> {
        let (reply, rx) = oneshot::channel();
        self.send(SequencerCommand::Ingest {
            event,
            reply: Some(reply),
        })
        .await?;
        rx.await.map_err(|_| SequencerError::Shutdown)
    }

    /// Submits an event without waiting for it to be processed.
    ///
    /// # Errors
    ///
    /// Returns [`SequencerError::Shutdown`] if the sequencer has stopped.
    pub async fn send_event(&self, event: Event) -> Result<(), SequencerError> {
        self.send(SequencerCommand::Ingest { event, reply: None })
            .await
    }

    /// Attaches a mailbox to its user.
    ///
    /// If the sequencer has stopped the mailbox is closed before returning.
    ///
    /// # Errors
    ///
    /// Returns [`SequencerError::Shutdown`] if the sequencer has stopped.
    pub async fn register(&self, mailbox: Mailbox) -> Result<(), SequencerError> {
        self.tx
            .send(SequencerCommand::Register { mailbox })
            .await
            .map_err(|rejected| {
                if let SequencerCommand::Register { mailbox } = rejected.0 {
                    mailbox.close();
                }
                SequencerError::Shutdown
            })
    }

    /// Detaches `mailbox` if it is still the one registered for `user`.
    ///
    /// # Errors
    ///
    /// Returns [`SequencerError::Shutdown`] if the sequencer has stopped.
    pub async fn deregister(&self, user: UserId, mailbox: MailboxId) -> Result<(), SequencerError> {
        self.send(SequencerCommand::Deregister { user, mailbox })
            .await
    }

    /// Returns a snapshot of the sequencer's state.
    ///
    /// The snapshot reflects every command sent through this handle before
    /// the call.
    ///
    /// # Errors
    ///
    /// Returns [`SequencerError::Shutdown`] if the sequencer has stopped.
    pub async fn status(&self) -> Result<SequencerStatus, SequencerError> {
        let (reply, rx) = oneshot::channel();
        self.send(SequencerCommand::Status { reply }).await?;
        rx.await.map_err(|_| SequencerError::Shutdown)
    }

    /// Returns a handle that does not keep the sequencer alive.
    #[must_use]
    pub fn downgrade(&self) -> WeakSequencerSender {
        WeakSequencerSender {
            tx: self.tx.downgrade(),
        }
    }

    /// Returns `true` once the sequencer has stopped accepting commands.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    async fn send(&self, command: SequencerCommand) -> Result<(), SequencerError> {
        self.tx
            .send(command)
            .await
            .map_err(|_| SequencerError::Shutdown)
    }
}

/// A [`SequencerSender`] that does not keep the command channel open.
///
/// Mailbox tasks hold one of these so the sequencer can stop once the
/// server drops its own senders.
#[derive(Debug, Clone)]
pub struct WeakSequencerSender {
    tx: mpsc::WeakSender<SequencerCommand>,
}

impl WeakSequencerSender {
    /// Returns a strong sender if the sequencer is still reachable.
    #[must_use]
    pub fn upgrade(&self) -> Option<SequencerSender> {
        self.tx.upgrade().map(|tx| SequencerSender { tx })
    }
}
