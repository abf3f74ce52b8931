// Session store and lifecycle management
//
// A session scopes the bidirectional alias map to one user's conversation.
// The manager keeps two indices: sessionID -> Session and userID -> sessionID,
// with at most one live session per user. Expired sessions are invisible to
// readers even before the periodic sweep removes them.
//
// Locking discipline: the manager holds one exclusive lock over both indices;
// each Session is additionally wrapped in its own Mutex so sanitize passes on
// different users never contend with each other.

use crate::model::SessionStatus;
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// A session handle shared between the store and in-flight requests
pub type SharedSession = Arc<Mutex<Session>>;

// ─────────────────────────────────────────────────────────────────────────────
// Session
// ─────────────────────────────────────────────────────────────────────────────

/// Per-user scope holding the alias mappings and counters
///
/// Invariant: `mappings` and `reverse_mappings` are mutual inverses at all
/// times; both are only mutated through `add_mapping`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub session_id: String,
    pub user_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub department: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub last_accessed_at: DateTime<Utc>,
    pub status: SessionStatus,
    /// Original -> alias
    pub mappings: HashMap<String, String>,
    /// Alias -> original
    pub reverse_mappings: HashMap<String, String>,
    pub request_count: u64,
    /// Per-prefix alias counters (SERVER -> 3 means SERVER_3 is next)
    pub counters: HashMap<String, u64>,
}

impl Session {
    /// Create a fresh session expiring `ttl` from now
    pub fn new(session_id: impl Into<String>, user_id: impl Into<String>, department: impl Into<String>, ttl: Duration) -> Self {
        let now = Utc::now();
        Self {
            session_id: session_id.into(),
            user_id: user_id.into(),
            department: department.into(),
            created_at: now,
            expires_at: now + ttl,
            last_accessed_at: now,
            status: SessionStatus::Active,
            mappings: HashMap::new(),
            reverse_mappings: HashMap::new(),
            request_count: 0,
            counters: HashMap::new(),
        }
    }

    /// A session is live only while active and before its TTL
    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at || self.status != SessionStatus::Active
    }

    /// Record a mapping and its inverse
    pub fn add_mapping(&mut self, original: impl Into<String>, alias: impl Into<String>) {
        let original = original.into();
        let alias = alias.into();
        self.mappings.insert(original.clone(), alias.clone());
        self.reverse_mappings.insert(alias, original);
    }

    /// Look up the alias for an original value
    pub fn alias_for(&self, original: &str) -> Option<&str> {
        self.mappings.get(original).map(String::as_str)
    }

    /// Look up the original value for an alias
    pub fn original_for(&self, alias: &str) -> Option<&str> {
        self.reverse_mappings.get(alias).map(String::as_str)
    }

    /// Return the current counter for a prefix, then advance it
    ///
    /// The first call for any prefix yields 0. Callers must hold the
    /// session's lock, which makes the read-and-increment atomic.
    pub fn next_counter(&mut self, prefix: &str) -> u64 {
        let counter = self.counters.entry(prefix.to_string()).or_insert(0);
        let current = *counter;
        *counter += 1;
        current
    }

    /// Update access time and bump the request counter
    pub fn touch(&mut self) {
        self.last_accessed_at = Utc::now();
        self.request_count += 1;
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Manager
// ─────────────────────────────────────────────────────────────────────────────

/// Aggregate numbers for the stats surface
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStats {
    pub total_sessions: usize,
    pub active_sessions: usize,
    pub expired_sessions: usize,
    pub total_mappings: usize,
}

#[derive(Default)]
struct StoreInner {
    sessions: HashMap<String, SharedSession>,
    /// userID -> sessionID; never dangles while the lock is held
    user_index: HashMap<String, String>,
}

/// Owns every live session and both lookup indices
pub struct SessionManager {
    inner: Mutex<StoreInner>,
    default_ttl: Duration,
}

impl SessionManager {
    pub fn new(default_ttl: std::time::Duration) -> Self {
        Self {
            inner: Mutex::new(StoreInner::default()),
            default_ttl: Duration::from_std(default_ttl).unwrap_or_else(|_| Duration::hours(8)),
        }
    }

    /// Resolve the session for a request, minting one when none is live
    ///
    /// Resolution order: the supplied sessionID (if live and owned by this
    /// user), then the user index, then a new session. Returns the session
    /// and whether it was freshly created.
    pub fn get_or_create(
        &self,
        user_id: &str,
        department: &str,
        session_id: Option<&str>,
    ) -> (SharedSession, bool) {
        let mut inner = self.inner.lock().unwrap();

        if let Some(sid) = session_id {
            if let Some(shared) = inner.sessions.get(sid).cloned() {
                let mut session = shared.lock().unwrap();
                if !session.is_expired() && session.user_id == user_id {
                    session.touch();
                    drop(session);
                    return (shared, false);
                }
            }
        }

        if let Some(sid) = inner.user_index.get(user_id).cloned() {
            if let Some(shared) = inner.sessions.get(&sid).cloned() {
                let mut session = shared.lock().unwrap();
                if !session.is_expired() {
                    session.touch();
                    drop(session);
                    return (shared, false);
                }
            }
        }

        let new_id = generate_session_id();
        let session = Session::new(new_id.clone(), user_id, department, self.default_ttl);
        let shared: SharedSession = Arc::new(Mutex::new(session));

        // Evict any prior session for this user so the index never dangles
        if let Some(old_id) = inner.user_index.insert(user_id.to_string(), new_id.clone()) {
            inner.sessions.remove(&old_id);
        }
        inner.sessions.insert(new_id, Arc::clone(&shared));

        (shared, true)
    }

    /// Get a session by ID, filtering out expired ones
    pub fn get(&self, session_id: &str) -> Option<SharedSession> {
        let inner = self.inner.lock().unwrap();
        let shared = inner.sessions.get(session_id)?;
        if shared.lock().unwrap().is_expired() {
            return None;
        }
        Some(Arc::clone(shared))
    }

    /// Snapshot a live session (for diagnostics and at-rest export)
    pub fn export(&self, session_id: &str) -> Option<Session> {
        self.get(session_id)
            .map(|shared| shared.lock().unwrap().clone())
    }

    /// Drop the session for a user, if any
    pub fn clear(&self, user_id: &str) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(sid) = inner.user_index.remove(user_id) {
            inner.sessions.remove(&sid);
        }
    }

    /// Sweep sessions past their TTL; returns how many were removed
    pub fn cleanup_expired(&self) -> usize {
        let mut inner = self.inner.lock().unwrap();
        let now = Utc::now();
        let expired: Vec<(String, String)> = inner
            .sessions
            .iter()
            .filter_map(|(sid, shared)| {
                let session = shared.lock().unwrap();
                (now > session.expires_at).then(|| (sid.clone(), session.user_id.clone()))
            })
            .collect();

        for (sid, uid) in &expired {
            inner.sessions.remove(sid);
            // Only drop the index entry if it still points at the swept session
            if inner.user_index.get(uid) == Some(sid) {
                inner.user_index.remove(uid);
            }
        }
        expired.len()
    }

    pub fn stats(&self) -> SessionStats {
        let inner = self.inner.lock().unwrap();
        let now = Utc::now();
        let mut stats = SessionStats {
            total_sessions: inner.sessions.len(),
            ..Default::default()
        };
        for shared in inner.sessions.values() {
            let session = shared.lock().unwrap();
            if now < session.expires_at && session.status == SessionStatus::Active {
                stats.active_sessions += 1;
            } else {
                stats.expired_sessions += 1;
            }
            stats.total_mappings += session.mappings.len();
        }
        stats
    }
}

/// Session IDs look like "sess_3fa2b91c04de" (12 random hex chars)
fn generate_session_id() -> String {
    let suffix: u64 = rand::thread_rng().gen();
    format!("sess_{:012x}", suffix & 0xFFFF_FFFF_FFFF)
}
