/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 14/10/26
******************************************************************************/

//! Follower graph: who follows whom.

use crate::event::UserId;
use std::collections::{HashMap, HashSet};

/// Directed follower relation, `user → followers of user`.
///
/// Membership is idempotent. Users that nobody follows are not stored, so
/// [`len`](Self::len) counts users with at least one follower.
///
/// # Examples
///
/// ```
/// use follower_relay::{FollowerGraph, UserId};
///
/// let mut graph = FollowerGraph::new();
/// graph.add_follower(UserId(7), UserId(3));
/// graph.add_follower(UserId(7), UserId(3));
/// assert_eq!(graph.follower_count(UserId(7)), 1);
/// assert!(graph.is_following(UserId(3), UserId(7)));
/// ```
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FollowerGraph {
    followers: HashMap<UserId, HashSet<UserId>>,
}

impl FollowerGraph {
    /// Creates an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that `follower` follows `of`.
    ///
    /// Returns `true` if the edge is new.
    pub fn add_follower(&mut self, of: UserId, follower: UserId) -> bool {
        self.followers.entry(of).or_default().insert(follower)
    }

    /// Removes `follower` from the followers of `of`.
    ///
    /// Returns `true` if the edge existed.
    pub fn remove_follower(&mut self, of: UserId, follower: UserId) -> bool {
        let Some(set) = self.followers.get_mut(&of) else {
            return false;
        };
        let removed = set.remove(&follower);
        if set.is_empty() {
            self.followers.remove(&of);
        }
        removed
    }

    /// Iterates over the current followers of `user`. Unknown users have none.
    pub fn followers_of(&self, user: UserId) -> impl Iterator<Item = UserId> + '_ {
        self.followers.get(&user).into_iter().flatten().copied()
    }

    /// Returns `true` if `follower` currently follows `of`.
    #[must_use]
    pub fn is_following(&self, follower: UserId, of: UserId) -> bool {
        self.followers
            .get(&of)
            .is_some_and(|set| set.contains(&follower))
    }

    /// Number of followers of `user`.
    #[must_use]
    pub fn follower_count(&self, user: UserId) -> usize {
        self.followers.get(&user).map_or(0, HashSet::len)
    }

    /// Number of users with at least one follower.
    #[must_use]
    pub fn len(&self) -> usize {
        self.followers.len()
    }

    /// Returns `true` if nobody follows anybody.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.followers.is_empty()
    }
}
