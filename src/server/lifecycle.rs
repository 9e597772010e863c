/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 14/10/26
******************************************************************************/

//! Server lifecycle states and bounded task joins.

use std::fmt;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Where the server is in its lifecycle.
///
/// States only move forward:
/// `Starting → Running → ShuttingDown → Stopped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ServerState {
    /// Binding listeners and spawning tasks.
    Starting,
    /// Accepting connections and relaying events.
    Running,
    /// Shutdown has been requested and tasks are being joined.
    ShuttingDown,
    /// Every task has been joined or abandoned.
    Stopped,
}

impl ServerState {
    /// Returns `true` once shutdown has begun.
    #[must_use]
    pub fn is_terminating(self) -> bool {
        self >= Self::ShuttingDown
    }
}

impl fmt::Display for ServerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Starting => "starting",
            Self::Running => "running",
            Self::ShuttingDown => "shutting down",
            Self::Stopped => "stopped",
        })
    }
}

/// Waits for `handle` until `deadline`.
///
/// A task that panicked, or is still running at the deadline, is recorded in
/// `failures`. A late task is aborted.
pub(crate) async fn join_until<T>(
    name: &str,
    mut handle: JoinHandle<T>,
    deadline: Instant,
    failures: &mut Vec<String>,
) -> Option<T> {
    match tokio::time::timeout_at(deadline, &mut handle).await {
        Ok(Ok(value)) => Some(value),
        Ok(Err(error)) => {
            failures.push(format!("{name} task failed: {error}"));
            None
        }
        Err(_) => {
            handle.abort();
            failures.push(format!("{name} task did not stop in time"));
            None
        }
    }
}
