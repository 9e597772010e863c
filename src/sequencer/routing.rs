/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 14/10/26
******************************************************************************/

//! Per-type routing rules.
//!
//! | Type | Graph | Delivered to |
//! |---|---|---|
//! | Follow | add `from` to followers of `to` | `to` |
//! | Unfollow | remove `from` from followers of `to` | nobody |
//! | Broadcast | - | every subscriber |
//! | Private message | - | `to` |
//! | Status update | - | every follower of `from` |

use crate::event::{EventKind, UserId};
use crate::graph::FollowerGraph;

/// The audience of a released event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// No delivery.
    Nobody,
    /// A single user, if connected.
    User(UserId),
    /// Every registered subscriber.
    Everyone,
    /// Every connected follower of the given user.
    FollowersOf(UserId),
}

/// Applies `kind` to the follower graph and returns who should receive it.
///
/// Must be called exactly once per event, in sequence order.
///
/// # Examples
///
/// ```
/// use follower_relay::sequencer::routing::{Route, apply};
/// use follower_relay::{EventKind, FollowerGraph, UserId};
///
/// let mut graph = FollowerGraph::new();
/// let route = apply(&EventKind::Follow { from: UserId(1), to: UserId(2) }, &mut graph);
/// assert_eq!(route, Route::User(UserId(2)));
/// assert!(graph.is_following(UserId(1), UserId(2)));
/// ```
pub fn apply(kind: &EventKind, graph: &mut FollowerGraph) -> Route {
    match *kind {
        EventKind::Follow { from, to } => {
            graph.add_follower(to, from);
            Route::User(to)
        }
        EventKind::Unfollow { from, to } => {
            graph.remove_follower(to, from);
            Route::Nobody
        }
        EventKind::Broadcast => Route::Everyone,
        EventKind::PrivateMessage { to, .. } => Route::User(to),
        EventKind::StatusUpdate { from } => Route::FollowersOf(from),
    }
}
