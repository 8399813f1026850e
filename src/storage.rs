//!
//! cohort storage module
//! ---------------------
//! Identity persistence seam. The deployed store is an external collaborator
//! offering find-by-field, create, and save-by-id, with no multi-record
//! transaction API; this module captures that contract as the
//! `IdentityStore` trait and ships an in-memory implementation for tests and
//! embedding.
//!
//! Two operations are deliberately *conditional single-record updates* rather
//! than find-then-save pairs: claiming a verification token and claiming a
//! reset token. Concurrent redemption of the same single-use token must
//! yield exactly one success, and a lookup followed by a separate save cannot
//! guarantee that. A real backend maps these to a conditional update (the
//! token match lives in the update filter); `MemoryStore` performs them under
//! a single write lock.

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::sync::Arc;

use anyhow::{Result, anyhow};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A registered identity record.
///
/// `friends` is symmetric by invariant (id A in B.friends iff B in
/// A.friends); `friend_requests` holds pending inbound requests in insertion
/// order with no duplicates, and an id never appears in both collections for
/// the same pair. The reset fields are both present or both absent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: Uuid,
    pub username: String,
    /// Stored lowercased; uniqueness is case-insensitive.
    pub email: String,
    /// Argon2 PHC string. Never exposed by projections.
    pub password_hash: String,
    pub email_verified: bool,
    /// Present only while `email_verified` is false; cleared on verification
    /// and never reissued implicitly.
    pub email_verification_token: Option<String>,
    pub reset_password_token_hash: Option<String>,
    pub reset_password_expires_at: Option<DateTime<Utc>>,
    pub friends: BTreeSet<Uuid>,
    pub friend_requests: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserRecord {
    pub fn new(
        username: String,
        email: String,
        password_hash: String,
        verification_token: String,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            username,
            email,
            password_hash,
            email_verified: false,
            email_verification_token: Some(verification_token),
            reset_password_token_hash: None,
            reset_password_expires_at: None,
            friends: BTreeSet::new(),
            friend_requests: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn public(&self) -> PublicUser {
        PublicUser {
            id: self.id,
            username: self.username.clone(),
            email: self.email.clone(),
        }
    }
}

/// Projection safe to hand to callers: no hashes, no tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicUser {
    pub id: Uuid,
    pub username: String,
    pub email: String,
}

/// Persistence contract the deployed store must satisfy.
pub trait IdentityStore: Send + Sync {
    fn create(&self, record: UserRecord) -> Result<()>;
    /// Update an existing record by id.
    fn save(&self, record: &UserRecord) -> Result<()>;
    fn find_by_id(&self, id: Uuid) -> Result<Option<UserRecord>>;
    fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>>;
    /// Case-insensitive email lookup.
    fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>>;
    fn list_all(&self) -> Result<Vec<UserRecord>>;

    /// Atomically find the record holding `token` as its plaintext
    /// verification token, mark it verified, clear the token, and return the
    /// updated record. At most one concurrent caller gets `Some`.
    fn claim_verification_token(&self, token: &str) -> Result<Option<UserRecord>>;

    /// Atomically find the record whose stored reset digest equals
    /// `token_hash` with an expiry strictly after `now`, clear both reset
    /// fields, and return the updated record. At most one concurrent caller
    /// gets `Some`.
    fn claim_reset_token(&self, token_hash: &str, now: DateTime<Utc>)
        -> Result<Option<UserRecord>>;
}

/// In-memory store used by tests and single-process embeddings.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<BTreeMap<Uuid, UserRecord>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl IdentityStore for MemoryStore {
    fn create(&self, record: UserRecord) -> Result<()> {
        let mut map = self.inner.write();
        if map.contains_key(&record.id) {
            return Err(anyhow!("duplicate id {}", record.id));
        }
        // Backstop for the race between a service-level uniqueness check and
        // this insert. A deployed store enforces this with unique indexes.
        let email_lc = record.email.to_lowercase();
        if map
            .values()
            .any(|u| u.username == record.username || u.email.to_lowercase() == email_lc)
        {
            return Err(anyhow!("unique constraint violation"));
        }
        map.insert(record.id, record);
        Ok(())
    }

    fn save(&self, record: &UserRecord) -> Result<()> {
        let mut map = self.inner.write();
        match map.get_mut(&record.id) {
            Some(slot) => {
                *slot = record.clone();
                Ok(())
            }
            None => Err(anyhow!("no record with id {}", record.id)),
        }
    }

    fn find_by_id(&self, id: Uuid) -> Result<Option<UserRecord>> {
        Ok(self.inner.read().get(&id).cloned())
    }

    fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>> {
        Ok(self
            .inner
            .read()
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>> {
        let email_lc = email.to_lowercase();
        Ok(self
            .inner
            .read()
            .values()
            .find(|u| u.email.to_lowercase() == email_lc)
            .cloned())
    }

    fn list_all(&self) -> Result<Vec<UserRecord>> {
        Ok(self.inner.read().values().cloned().collect())
    }

    fn claim_verification_token(&self, token: &str) -> Result<Option<UserRecord>> {
        let mut map = self.inner.write();
        let hit = map
            .values_mut()
            .find(|u| u.email_verification_token.as_deref() == Some(token));
        Ok(hit.map(|u| {
            u.email_verified = true;
            u.email_verification_token = None;
            u.updated_at = Utc::now();
            u.clone()
        }))
    }

    fn claim_reset_token(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<UserRecord>> {
        let mut map = self.inner.write();
        let hit = map.values_mut().find(|u| {
            u.reset_password_token_hash.as_deref() == Some(token_hash)
                && u.reset_password_expires_at.map(|t| t > now).unwrap_or(false)
        });
        Ok(hit.map(|u| {
            u.reset_password_token_hash = None;
            u.reset_password_expires_at = None;
            u.updated_at = now;
            u.clone()
        }))
    }
}
