/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 14/10/26
******************************************************************************/

//! The TCP server: two listeners, the sequencer task and every connection
//! task, tied to one shutdown token.
//!
//! # Architecture
//!
//! - The event listener spawns one producer session per connection; each
//!   decodes lines and forwards events to the sequencer
//! - The subscriber listener spawns one session per connection; each reads a
//!   registration line and turns the socket over to a [`Mailbox`]
//! - Cancelling the shutdown token stops the accept loops, the sequencer and
//!   every session and mailbox task
//!
//! [`Mailbox`]: crate::Mailbox

mod acceptor;
mod lifecycle;

pub use lifecycle::ServerState;

use crate::config::ServerConfig;
use crate::error::{SequencerError, ServerError};
use crate::mailbox::MailboxContext;
use crate::sequencer::{Sequencer, SequencerHandle, SequencerSender, SequencerStatus};
use acceptor::{ProducerContext, SubscriberContext};
use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{error, info};

/// A running relay server.
///
/// Dropping the server cancels every task without waiting for them; call
/// [`shutdown`](Self::shutdown) to join them.
#[derive(Debug)]
pub struct Server {
    state: ServerState,
    event_addr: SocketAddr,
    subscriber_addr: SocketAddr,
    shutdown: CancellationToken,
    sequencer: Option<SequencerSender>,
    sequencer_task: Option<SequencerHandle>,
    acceptors: Vec<(&'static str, JoinHandle<()>)>,
    tracker: TaskTracker,
    grace: Duration,
}

impl Server {
    /// Binds both listeners and starts every task.
    ///
    /// Port `0` picks an ephemeral port; see [`event_addr`](Self::event_addr)
    /// and [`subscriber_addr`](Self::subscriber_addr) for the bound addresses.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Bind`] if either listener cannot be opened.
    pub async fn start(config: &ServerConfig) -> Result<Self, ServerError> {
        info!(state = %ServerState::Starting, "starting server");

        let event_listener = bind("event", config.event_addr()).await?;
        let subscriber_listener = bind("subscriber", config.subscriber_addr()).await?;
        let event_addr = local_addr("event", &event_listener, config.event_addr())?;
        let subscriber_addr =
            local_addr("subscriber", &subscriber_listener, config.subscriber_addr())?;

        let shutdown = CancellationToken::new();
        let tracker = TaskTracker::new();

        let sequencer = Sequencer::with_capacity(config.initial_sequence, config.command_capacity)
            .with_shutdown(shutdown.clone());
        let sender = sequencer.sender();
        let sequencer_task = sequencer.spawn();

        let producers = ProducerContext {
            sequencer: sender.clone(),
            max_line_length: config.max_line_length,
            shutdown: shutdown.clone(),
        };
        let subscribers = SubscriberContext {
            sequencer: sender.clone(),
            mailbox: MailboxContext {
                settings: config.mailbox_settings(),
                shutdown: shutdown.clone(),
                sequencer: sender.downgrade(),
                tracker: tracker.clone(),
            },
            max_line_length: config.max_line_length,
            registration_timeout: config.registration_timeout(),
        };

        let event_loop = tokio::spawn(acceptor::accept_loop(
            "event",
            event_listener,
            shutdown.clone(),
            tracker.clone(),
            move |stream, peer| acceptor::producer_session(stream, peer, producers.clone()),
        ));
        let subscriber_loop = tokio::spawn(acceptor::accept_loop(
            "subscriber",
            subscriber_listener,
            shutdown.clone(),
            tracker.clone(),
            move |stream, peer| acceptor::subscriber_session(stream, peer, subscribers.clone()),
        ));

        info!(
            state = %ServerState::Running,
            %event_addr,
            %subscriber_addr,
            initial_sequence = config.initial_sequence,
            "server running"
        );

        Ok(Self {
            state: ServerState::Running,
            event_addr,
            subscriber_addr,
            shutdown,
            sequencer: Some(sender),
            sequencer_task: Some(sequencer_task),
            acceptors: vec![("event listener", event_loop), ("subscriber listener", subscriber_loop)],
            tracker,
            grace: config.shutdown_grace(),
        })
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ServerState {
        self.state
    }

    /// Bound address of the producer listener.
    #[must_use]
    pub fn event_addr(&self) -> SocketAddr {
        self.event_addr
    }

    /// Bound address of the subscriber listener.
    #[must_use]
    pub fn subscriber_addr(&self) -> SocketAddr {
        self.subscriber_addr
    }

    /// A clone of the token that stops the server when cancelled.
    #[must_use]
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// A handle to the sequencer, until shutdown starts.
    #[must_use]
    pub fn sender(&self) -> Option<SequencerSender> {
        self.sequencer.clone()
    }

    /// Snapshot of the sequencer's state.
    ///
    /// # Errors
    ///
    /// Returns [`SequencerError::Shutdown`] once shutdown has started.
    pub async fn status(&self) -> Result<SequencerStatus, SequencerError> {
        self.sequencer
            .as_ref()
            .ok_or(SequencerError::Shutdown)?
            .status()
            .await
    }

    /// Runs until `signal` completes or the shutdown token is cancelled, then
    /// shuts down.
    ///
    /// # Errors
    ///
    /// See [`shutdown`](Self::shutdown).
    pub async fn run_until<F>(mut self, signal: F) -> Result<(), ServerError>
    where
        F: Future,
    {
        tokio::select! {
            _ = signal => info!("shutdown requested"),
            () = self.shutdown.cancelled() => info!("shutdown token cancelled"),
        }
        self.shutdown().await
    }

    /// Stops every task and waits for them, up to the configured grace period.
    ///
    /// Queued events are not flushed. Calling this more than once is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Shutdown`] listing every task that panicked or
    /// outlived the grace period. The server is `Stopped` either way.
    pub async fn shutdown(&mut self) -> Result<(), ServerError> {
        if self.state.is_terminating() {
            return Ok(());
        }
        self.state = ServerState::ShuttingDown;
        info!(state = %self.state, grace = ?self.grace, "shutting down");

        self.shutdown.cancel();
        self.sequencer = None;
        let deadline = Instant::now() + self.grace;
        let mut failures = Vec::new();

        for (name, handle) in self.acceptors.drain(..) {
            lifecycle::join_until(name, handle, deadline, &mut failures).await;
        }

        if let Some(task) = self.sequencer_task.take() {
            if let Some(status) =
                lifecycle::join_until("sequencer", task.into_inner(), deadline, &mut failures).await
            {
                info!(
                    cursor = status.cursor,
                    pending = status.pending,
                    dispatched = status.dispatched,
                    "sequencer joined"
                );
            }
        }

        self.tracker.close();
        if tokio::time::timeout_at(deadline, self.tracker.wait()).await.is_err() {
            failures.push(format!(
                "{} connection task(s) did not stop in time",
                self.tracker.len()
            ));
        }

        self.state = ServerState::Stopped;
        if failures.is_empty() {
            info!(state = %self.state, "server stopped");
            Ok(())
        } else {
            for failure in &failures {
                error!(%failure, "shutdown failure");
            }
            Err(ServerError::Shutdown { failures })
        }
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn bind(role: &'static str, addr: SocketAddr) -> Result<TcpListener, ServerError> {
    TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind { role, addr, source })
}

fn local_addr(
    role: &'static str,
    listener: &TcpListener,
    requested: SocketAddr,
) -> Result<SocketAddr, ServerError> {
    listener.local_addr().map_err(|source| ServerError::Bind {
        role,
        addr: requested,
        source,
    })
}
