//! FollowGraph: follower/following edges between users
//!
//! Each edge is materialized twice, in `users:{followee}:followers` and
//! `users:{follower}:following`. Both sets are written by one script so the
//! graph is symmetric at every point in time:
//!
//! ```text
//! A ∈ followers(B)  ⟺  B ∈ following(A)
//! ```

use oddjobz_core::{
    keys, KeyValueStore, MarketError, MarketResult, Script, ScriptContext, ScriptExt, UserId,
};
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

/// Edge state after a toggle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowState {
    /// The follower now follows the followee
    Following,
    /// The edge no longer exists
    NotFollowing,
}

impl FollowState {
    /// Whether the edge exists
    pub fn is_following(self) -> bool {
        self == FollowState::Following
    }
}

/// Number of followers and followed users
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FollowCounts {
    /// Users following this user
    pub followers: usize,
    /// Users this user follows
    pub following: usize,
}

fn edge_keys(follower: &UserId, followee: &UserId) -> (String, String) {
    (keys::followers(followee), keys::following(follower))
}

fn link(ctx: &mut dyn ScriptContext, follower: &UserId, followee: &UserId) -> MarketResult<bool> {
    let (followers_key, following_key) = edge_keys(follower, followee);
    let added = ctx.sadd(&followers_key, follower.as_str())?;
    ctx.sadd(&following_key, followee.as_str())?;
    Ok(added)
}

fn unlink(ctx: &mut dyn ScriptContext, follower: &UserId, followee: &UserId) -> MarketResult<bool> {
    let (followers_key, following_key) = edge_keys(follower, followee);
    let removed = ctx.srem(&followers_key, follower.as_str())?;
    ctx.srem(&following_key, followee.as_str())?;
    Ok(removed)
}

#[derive(Clone, Copy)]
enum EdgeChange {
    Follow,
    Unfollow,
    Toggle,
}

struct EdgeScript<'a> {
    follower: &'a UserId,
    followee: &'a UserId,
    change: EdgeChange,
}

impl Script for EdgeScript<'_> {
    /// (resulting state, whether the store changed)
    type Output = (FollowState, bool);

    fn name(&self) -> &'static str {
        match self.change {
            EdgeChange::Follow => "follow",
            EdgeChange::Unfollow => "unfollow",
            EdgeChange::Toggle => "follow_toggle",
        }
    }

    fn keys(&self) -> Vec<String> {
        let (followers_key, following_key) = edge_keys(self.follower, self.followee);
        vec![followers_key, following_key]
    }

    fn run(&self, ctx: &mut dyn ScriptContext) -> MarketResult<Self::Output> {
        let follow = match self.change {
            EdgeChange::Follow => true,
            EdgeChange::Unfollow => false,
            EdgeChange::Toggle => {
                !ctx.sismember(&keys::followers(self.followee), self.follower.as_str())?
            }
        };
        if follow {
            Ok((FollowState::Following, link(ctx, self.follower, self.followee)?))
        } else {
            Ok((
                FollowState::NotFollowing,
                unlink(ctx, self.follower, self.followee)?,
            ))
        }
    }
}

struct CountsScript<'a> {
    user: &'a UserId,
}

impl Script for CountsScript<'_> {
    type Output = FollowCounts;

    fn name(&self) -> &'static str {
        "follow_counts"
    }

    fn keys(&self) -> Vec<String> {
        vec![keys::followers(self.user), keys::following(self.user)]
    }

    fn run(&self, ctx: &mut dyn ScriptContext) -> MarketResult<FollowCounts> {
        Ok(FollowCounts {
            followers: ctx.scard(&keys::followers(self.user))?,
            following: ctx.scard(&keys::following(self.user))?,
        })
    }
}

/// Social follow graph
#[derive(Clone)]
pub struct FollowGraph {
    store: Arc<dyn KeyValueStore>,
}

impl FollowGraph {
    /// Create a graph over `store`
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    fn apply(
        &self,
        follower: &UserId,
        followee: &UserId,
        change: EdgeChange,
    ) -> MarketResult<FollowState> {
        if follower == followee {
            return Err(MarketError::SelfFollow(follower.clone()));
        }
        let script = EdgeScript {
            follower,
            followee,
            change,
        };
        let (state, changed) = self.store.run_script(&script)?;
        tracing::debug!(
            target: "oddjobz::follow",
            follower = %follower,
            followee = %followee,
            op = script.name(),
            following = state.is_following(),
            changed,
            "Follow edge updated"
        );
        Ok(state)
    }

    /// Make `follower` follow `followee`. Following twice is a no-op.
    ///
    /// # Errors
    ///
    /// `SelfFollow` when both ids are equal.
    pub fn follow(&self, follower: &UserId, followee: &UserId) -> MarketResult<()> {
        self.apply(follower, followee, EdgeChange::Follow).map(|_| ())
    }

    /// Remove the edge. Removing a missing edge is a no-op.
    pub fn unfollow(&self, follower: &UserId, followee: &UserId) -> MarketResult<()> {
        self.apply(follower, followee, EdgeChange::Unfollow).map(|_| ())
    }

    /// Follow if not following, unfollow otherwise, decided atomically
    pub fn toggle(&self, follower: &UserId, followee: &UserId) -> MarketResult<FollowState> {
        self.apply(follower, followee, EdgeChange::Toggle)
    }

    /// Users currently following `user`
    pub fn followers(&self, user: &UserId) -> MarketResult<BTreeSet<UserId>> {
        self.read_set(&keys::followers(user))
    }

    /// Users `user` currently follows
    pub fn following(&self, user: &UserId) -> MarketResult<BTreeSet<UserId>> {
        self.read_set(&keys::following(user))
    }

    /// Whether `follower` follows `followee`
    pub fn is_following(&self, follower: &UserId, followee: &UserId) -> MarketResult<bool> {
        self.store
            .sismember(&keys::followers(followee), follower.as_str())
    }

    /// Follower and following counts, read together
    pub fn counts(&self, user: &UserId) -> MarketResult<FollowCounts> {
        self.store.run_script(&CountsScript { user })
    }

    /// For each candidate, whether `viewer` follows them
    ///
    /// Used to annotate user listings; positions match `candidates`.
    pub fn followed_flags(
        &self,
        viewer: &UserId,
        candidates: &[UserId],
    ) -> MarketResult<Vec<bool>> {
        let followed: HashSet<String> = self
            .store
            .smembers(&keys::following(viewer))?
            .into_iter()
            .collect();
        Ok(candidates
            .iter()
            .map(|c| followed.contains(c.as_str()))
            .collect())
    }

    fn read_set(&self, key: &str) -> MarketResult<BTreeSet<UserId>> {
        self.store
            .smembers(key)?
            .into_iter()
            .map(UserId::new)
            .collect()
    }
}
