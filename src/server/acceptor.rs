/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 14/10/26
******************************************************************************/

//! Accept loops and per-connection sessions.

use crate::error::ServerError;
use crate::event::{LineReader, codec};
use crate::mailbox::{Mailbox, MailboxContext};
use crate::sequencer::SequencerSender;
use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::BufReader;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

/// Pause after a failed accept so a persistent error does not spin.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Accepts connections until `shutdown` fires, running `session` for each one
/// on `tracker`. The listener is dropped on return.
pub(crate) async fn accept_loop<F, Fut>(
    role: &'static str,
    listener: TcpListener,
    shutdown: CancellationToken,
    tracker: TaskTracker,
    session: F,
) where
    F: Fn(TcpStream, SocketAddr) -> Fut,
    Fut: Future<Output = ()> + Send + 'static,
{
    loop {
        tokio::select! {
            biased;
            () = shutdown.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    debug!(role, %peer, "connection accepted");
                    tracker.spawn(session(stream, peer));
                }
                Err(error) => {
                    warn!(role, %error, "accept failed");
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                }
            },
        }
    }
    drop(listener);
    info!(role, "listener closed");
}

/// Shared by every producer connection.
#[derive(Debug, Clone)]
pub(crate) struct ProducerContext {
    pub sequencer: SequencerSender,
    pub max_line_length: usize,
    pub shutdown: CancellationToken,
}

/// Reads events from one producer until it disconnects.
pub(crate) async fn producer_session(stream: TcpStream, peer: SocketAddr, ctx: ProducerContext) {
    info!(%peer, "producer connected");
    match read_events(stream, peer, &ctx).await {
        Ok(count) => info!(%peer, events = count, "producer disconnected"),
        Err(error) => warn!(%error, "producer connection ended"),
    }
}

async fn read_events(
    stream: TcpStream,
    peer: SocketAddr,
    ctx: &ProducerContext,
) -> Result<u64, ServerError> {
    let mut lines = LineReader::new(BufReader::new(stream), ctx.max_line_length);
    let mut count = 0;

    loop {
        let next = tokio::select! {
            biased;
            () = ctx.shutdown.cancelled() => break,
            next = lines.next_line() => next.map_err(|source| ServerError::Connection { peer, source })?,
        };
        let Some(frame) = next else {
            break;
        };

        let line = match frame {
            Ok(line) => line,
            Err(error) => {
                warn!(%peer, %error, "discarding unreadable line");
                continue;
            }
        };

        match codec::decode_event(&line) {
            Ok(event) => {
                if ctx.sequencer.send_event(event).await.is_err() {
                    debug!(%peer, "sequencer stopped, dropping producer");
                    break;
                }
                count += 1;
            }
            Err(error) => warn!(%peer, %error, "discarding malformed event"),
        }
    }
    Ok(count)
}

/// Shared by every subscriber connection.
#[derive(Debug, Clone)]
pub(crate) struct SubscriberContext {
    pub sequencer: SequencerSender,
    pub mailbox: MailboxContext,
    pub max_line_length: usize,
    pub registration_timeout: Duration,
}

/// Reads the registration line and hands the socket to a new mailbox.
///
/// Any failure before registration drops the socket, closing the connection.
pub(crate) async fn subscriber_session(stream: TcpStream, peer: SocketAddr, ctx: SubscriberContext) {
    let mut reader = LineReader::new(BufReader::new(stream), ctx.max_line_length);

    let registration = tokio::select! {
        biased;
        () = ctx.mailbox.shutdown.cancelled() => return,
        read = tokio::time::timeout(ctx.registration_timeout, reader.next_line()) => read,
    };

    let line = match registration {
        Err(_) => {
            warn!(%peer, timeout = ?ctx.registration_timeout, "subscriber did not register in time");
            return;
        }
        Ok(Err(source)) => {
            let error = ServerError::Connection { peer, source };
            warn!(%error, "subscriber connection ended before registering");
            return;
        }
        Ok(Ok(None)) => {
            debug!(%peer, "subscriber disconnected before registering");
            return;
        }
        Ok(Ok(Some(Err(error)))) => {
            warn!(%peer, %error, "unreadable registration, closing connection");
            return;
        }
        Ok(Ok(Some(Ok(line)))) => line,
    };

    let user = match codec::decode_registration(&line) {
        Ok(user) => user,
        Err(error) => {
            warn!(%peer, %error, "closing connection");
            return;
        }
    };

    // Anything the subscriber sent after its registration line is ignored.
    let stream = reader.into_inner().into_inner();
    let (mailbox, _delivery) = Mailbox::spawn(user, stream, &ctx.mailbox);
    info!(%peer, %user, mailbox = %mailbox.id(), "subscriber connected");

    if ctx.sequencer.register(mailbox).await.is_err() {
        debug!(%peer, %user, "sequencer stopped before registration");
    }
}
