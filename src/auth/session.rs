//! Session tokens.
//!
//! # Responsibilities
//! - Issue random session tokens at login
//! - Store only a keyed hash of each token
//! - Resolve a presented token to a user while the session is live
//! - Revoke at logout; purge dead sessions periodically
//!
//! # Design Decisions
//! - A leaked session table yields hashes, not usable tokens
//! - Sessions are immutable apart from revocation

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use dashmap::DashMap;
use rand::RngCore;
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// A stored session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub token_hash: String,
    pub user_id: Uuid,
    pub expires_at: SystemTime,
    pub revoked_at: Option<SystemTime>,
}

impl Session {
    /// Unrevoked and not yet expired.
    pub fn is_valid_at(&self, now: SystemTime) -> bool {
        self.revoked_at.is_none() && self.expires_at > now
    }
}

/// Session storage keyed by token hash.
pub trait SessionStore: Send + Sync {
    fn insert(&self, session: Session);
    fn find(&self, token_hash: &str) -> Option<Session>;
    /// Mark an unrevoked session revoked. Returns whether one was.
    fn revoke(&self, token_hash: &str, at: SystemTime) -> bool;
    /// Drop sessions that can no longer become valid.
    fn purge(&self, now: SystemTime) -> usize;
}

/// Process-local session table.
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: DashMap<String, Session>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl SessionStore for MemorySessionStore {
    fn insert(&self, session: Session) {
        self.sessions.insert(session.token_hash.clone(), session);
    }

    fn find(&self, token_hash: &str) -> Option<Session> {
        self.sessions.get(token_hash).map(|s| s.value().clone())
    }

    fn revoke(&self, token_hash: &str, at: SystemTime) -> bool {
        match self.sessions.get_mut(token_hash) {
            Some(mut session) if session.revoked_at.is_none() => {
                session.revoked_at = Some(at);
                true
            }
            _ => false,
        }
    }

    fn purge(&self, now: SystemTime) -> usize {
        let before = self.sessions.len();
        self.sessions.retain(|_, session| session.is_valid_at(now));
        before.saturating_sub(self.sessions.len())
    }
}

/// Issues and resolves session tokens against a store.
pub struct SessionManager {
    secret: String,
    max_age: Duration,
    store: Arc<dyn SessionStore>,
}

impl SessionManager {
    pub fn new(secret: impl Into<String>, max_age: Duration, store: Arc<dyn SessionStore>) -> Self {
        Self {
            secret: secret.into(),
            max_age,
            store,
        }
    }

    pub fn max_age(&self) -> Duration {
        self.max_age
    }

    /// Keyed hash stored in place of the raw token.
    pub fn hash_token(&self, raw_token: &str) -> String {
        let digest = Sha256::digest(format!("{}:{}", self.secret, raw_token).as_bytes());
        format!("{digest:x}")
    }

    /// Start a session and return the raw token for the client.
    pub fn create(&self, user_id: Uuid) -> String {
        self.create_at(user_id, SystemTime::now())
    }

    pub fn create_at(&self, user_id: Uuid, now: SystemTime) -> String {
        let raw_token = generate_token();
        self.store.insert(Session {
            token_hash: self.hash_token(&raw_token),
            user_id,
            expires_at: now + self.max_age,
            revoked_at: None,
        });
        raw_token
    }

    /// User id behind a live session.
    pub fn resolve(&self, raw_token: &str) -> Option<Uuid> {
        self.resolve_at(raw_token, SystemTime::now())
    }

    pub fn resolve_at(&self, raw_token: &str, now: SystemTime) -> Option<Uuid> {
        if raw_token.is_empty() {
            return None;
        }
        self.store
            .find(&self.hash_token(raw_token))
            .filter(|session| session.is_valid_at(now))
            .map(|session| session.user_id)
    }

    pub fn revoke(&self, raw_token: &str) -> bool {
        self.store.revoke(&self.hash_token(raw_token), SystemTime::now())
    }

    pub fn purge_expired(&self) -> usize {
        self.store.purge(SystemTime::now())
    }
}

/// 32 random bytes as 64 lowercase hex characters.
fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}
