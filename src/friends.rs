//! Friendship graph engine.
//! An undirected `friends` relation plus a directed pending-request
//! relation, maintained across per-identity records. The store offers no
//! multi-record transactions, so the symmetric mutations (accept, remove)
//! are two independent single-record writes, self side first; a crash
//! between them leaves a one-sided edge, which `reconcile` repairs by
//! unioning the pair. That degraded state is recoverable by construction,
//! never silent.

use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::storage::{IdentityStore, PublicUser, UserRecord};

pub struct FriendshipService {
    store: Arc<dyn IdentityStore>,
    /// When true, accepting requires a pending request from the requester.
    /// The lax default mirrors the legacy behavior: accept succeeds
    /// unconditionally.
    strict_accept: bool,
}

impl FriendshipService {
    pub fn new(store: Arc<dyn IdentityStore>, strict_accept: bool) -> Self {
        Self { store, strict_accept }
    }

    /// Record a pending request from `from` on `to`'s record. A duplicate
    /// send fails rather than duplicating the entry.
    pub fn send_request(&self, from: Uuid, to: Uuid) -> AppResult<()> {
        if from == to {
            return Err(AppError::validation(
                "self_request",
                "cannot send a friend request to yourself",
            ));
        }
        let _sender = self.load(from)?;
        let mut target = self.load(to)?;

        if target.friends.contains(&from) {
            return Err(AppError::conflict("already_friends", "user is already your friend"));
        }
        if target.friend_requests.contains(&from) {
            return Err(AppError::conflict("already_requested", "friend request already sent"));
        }
        target.friend_requests.push(from);
        self.store.save(&target).map_err(AppError::from)?;
        info!(%from, %to, "friend request sent");
        Ok(())
    }

    /// Establish the mutual friendship and consume the pending request.
    /// Both endpoints are updated to preserve symmetry: self is written
    /// first, then the requester.
    pub fn accept_request(&self, self_id: Uuid, requester_id: Uuid) -> AppResult<()> {
        if self_id == requester_id {
            return Err(AppError::validation("self_request", "cannot befriend yourself"));
        }
        let mut me = self.load(self_id)?;
        let mut requester = self.load(requester_id)?;

        if self.strict_accept && !me.friend_requests.contains(&requester_id) {
            return Err(AppError::not_found(
                "request_not_found",
                "no pending request from that user",
            ));
        }

        me.friends.insert(requester_id);
        me.friend_requests.retain(|id| *id != requester_id);
        requester.friends.insert(self_id);
        // A crossed request from the other direction would now violate the
        // friends/requests disjointness, so consume it too.
        requester.friend_requests.retain(|id| *id != self_id);

        self.store.save(&me).map_err(AppError::from)?;
        self.store.save(&requester).map_err(AppError::from)?;
        info!(user = %self_id, friend = %requester_id, "friend request accepted");
        Ok(())
    }

    /// Drop a pending request. No-op when none is pending; `friends` is
    /// never touched.
    pub fn decline_request(&self, self_id: Uuid, requester_id: Uuid) -> AppResult<()> {
        let mut me = self.load(self_id)?;
        let before = me.friend_requests.len();
        me.friend_requests.retain(|id| *id != requester_id);
        if me.friend_requests.len() != before {
            self.store.save(&me).map_err(AppError::from)?;
            info!(user = %self_id, requester = %requester_id, "friend request declined");
        }
        Ok(())
    }

    /// Remove the edge from both endpoints. No-op when not friends; pending
    /// requests are unaffected. Each side is cleaned independently so a
    /// previously degraded one-sided edge also gets removed.
    pub fn remove_friend(&self, self_id: Uuid, other_id: Uuid) -> AppResult<()> {
        let mut me = self.load(self_id)?;
        let mut other = self.load(other_id)?;

        let removed_mine = me.friends.remove(&other_id);
        let removed_theirs = other.friends.remove(&self_id);
        if removed_mine {
            self.store.save(&me).map_err(AppError::from)?;
        }
        if removed_theirs {
            self.store.save(&other).map_err(AppError::from)?;
        }
        if removed_mine || removed_theirs {
            info!(user = %self_id, friend = %other_id, "friend removed");
        }
        Ok(())
    }

    /// Project the friends list as id/username/email. Dangling ids (the
    /// other record has vanished) are skipped.
    pub fn list_friends(&self, self_id: Uuid) -> AppResult<Vec<PublicUser>> {
        let me = self.load(self_id)?;
        self.project(me.friends.iter().copied())
    }

    /// Pending inbound requests, in insertion order.
    pub fn list_requests(&self, self_id: Uuid) -> AppResult<Vec<PublicUser>> {
        let me = self.load(self_id)?;
        self.project(me.friend_requests.iter().copied())
    }

    fn project(&self, ids: impl Iterator<Item = Uuid>) -> AppResult<Vec<PublicUser>> {
        let mut out = Vec::new();
        for id in ids {
            if let Some(user) = self.store.find_by_id(id).map_err(AppError::from)? {
                out.push(user.public());
            }
        }
        Ok(out)
    }

    fn load(&self, id: Uuid) -> AppResult<UserRecord> {
        self.store
            .find_by_id(id)
            .map_err(AppError::from)?
            .ok_or_else(|| AppError::not_found("user_not_found", "user not found"))
    }
}

/// Idempotent repair pass for the symmetric-friendship invariant: every
/// one-sided edge left by a crash between the two writes of an accept or
/// remove is completed by unioning the pair. Returns the number of records
/// repaired. Intended to run out-of-band, periodically or on demand.
pub fn reconcile(store: &dyn IdentityStore) -> AppResult<usize> {
    let users = store.list_all().map_err(AppError::from)?;
    let mut repaired = 0usize;
    for user in &users {
        for friend_id in &user.friends {
            let Some(mut friend) = store.find_by_id(*friend_id).map_err(AppError::from)? else {
                continue;
            };
            if friend.friends.insert(user.id) {
                friend.friend_requests.retain(|id| *id != user.id);
                store.save(&friend).map_err(AppError::from)?;
                info!(a = %user.id, b = %friend_id, "repaired asymmetric friendship");
                repaired += 1;
            }
        }
    }
    Ok(repaired)
}
