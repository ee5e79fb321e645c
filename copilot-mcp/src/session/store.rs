//! In-memory session store with TTL expiry and capacity eviction.
//!
//! The store is injectable (trait object) so tests can drive it with a fake
//! clock and a persistent backing store could be swapped in later without
//! touching callers. Compound operations take the internal lock once, so
//! concurrent tool invocations cannot observe a half-applied mutation.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use super::{workspace_id, HistoryEntry, Role, Session, SessionStats, MAX_SESSIONS, SESSION_TTL_HOURS};

/// Time source, injectable for tests.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Storage interface for sessions.
///
/// Implementations hand out owned snapshots; mutation goes through the store
/// so activity timestamps and eviction stay consistent.
pub trait SessionStore: Send + Sync {
    /// Lookup priority: explicit ID if live, then any live session for the
    /// directory's workspace fingerprint, else create a fresh session.
    fn get_or_create(
        &self,
        working_dir: &Path,
        session_id: Option<&str>,
        model: Option<&str>,
    ) -> Session;

    /// Write back a (possibly externally mutated) session, refreshing activity.
    fn save(&self, session: Session);

    /// Append a transcript entry and refresh activity. Unknown IDs are a no-op.
    fn add_to_history(&self, session_id: &str, role: Role, content: &str);

    /// Fetch a live session by ID.
    fn get(&self, session_id: &str) -> Option<Session>;

    /// All live (non-expired) sessions.
    fn all(&self) -> Vec<Session>;

    /// Delete one session. Returns whether it existed.
    fn delete(&self, session_id: &str) -> bool;

    /// Drop everything. Returns how many sessions were removed.
    fn clear(&self) -> usize;

    /// Record the CLI's continuation token on a session.
    fn set_conversation_id(&self, session_id: &str, conversation_id: &str);

    /// Aggregate statistics.
    fn stats(&self) -> SessionStats;

    /// Whether the store is at 90% of capacity or more.
    fn is_near_capacity(&self) -> bool;
}

/// Process-lifetime, memory-resident store.
pub struct InMemorySessionStore {
    sessions: Mutex<HashMap<String, Session>>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    max_sessions: usize,
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Construct with a custom time source.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            clock,
            ttl: Duration::hours(SESSION_TTL_HOURS),
            max_sessions: MAX_SESSIONS,
        }
    }

    /// Override the capacity limit (tests).
    pub fn with_max_sessions(mut self, max_sessions: usize) -> Self {
        self.max_sessions = max_sessions;
        self
    }

    fn generate_session_id() -> String {
        // UUIDv7 is time-ordered, which keeps IDs unique and roughly sortable.
        format!("sess_{}", Uuid::now_v7().simple())
    }

    fn is_expired(&self, session: &Session, now: DateTime<Utc>) -> bool {
        now - session.last_activity_at > self.ttl
    }

    /// Drop expired sessions, then evict oldest-activity sessions beyond the
    /// capacity limit. Called lazily around every access.
    fn cleanup(&self, sessions: &mut HashMap<String, Session>) {
        let now = self.clock.now();
        sessions.retain(|id, session| {
            let keep = now - session.last_activity_at <= self.ttl;
            if !keep {
                tracing::debug!(session_id = %id, "removed expired session");
            }
            keep
        });

        if sessions.len() > self.max_sessions {
            let mut by_activity: Vec<(String, DateTime<Utc>)> = sessions
                .iter()
                .map(|(id, s)| (id.clone(), s.last_activity_at))
                .collect();
            by_activity.sort_by_key(|(_, at)| *at);
            let excess = sessions.len() - self.max_sessions;
            for (id, _) in by_activity.into_iter().take(excess) {
                sessions.remove(&id);
                tracing::debug!(session_id = %id, "evicted oldest session over capacity");
            }
        }
    }
}

impl SessionStore for InMemorySessionStore {
    fn get_or_create(
        &self,
        working_dir: &Path,
        session_id: Option<&str>,
        model: Option<&str>,
    ) -> Session {
        let mut sessions = self.sessions.lock().expect("session store poisoned");
        self.cleanup(&mut sessions);
        let now = self.clock.now();

        if let Some(id) = session_id {
            if let Some(session) = sessions.get_mut(id) {
                session.last_activity_at = now;
                tracing::debug!(session_id = %id, "resumed session by explicit id");
                return session.clone();
            }
            tracing::debug!(session_id = %id, "explicit session id unknown or expired, creating new");
        }

        let fingerprint = workspace_id(working_dir, None);
        if let Some(session) = sessions
            .values_mut()
            .find(|s| s.workspace_id == fingerprint)
        {
            session.last_activity_at = now;
            tracing::debug!(session_id = %session.id, workspace = %fingerprint, "found session by workspace");
            return session.clone();
        }

        let session = Session {
            id: Self::generate_session_id(),
            workspace_id: fingerprint.clone(),
            working_dir: working_dir.to_path_buf(),
            model: model.map(ToString::to_string),
            conversation_id: None,
            history: Vec::new(),
            created_at: now,
            last_activity_at: now,
        };
        tracing::debug!(session_id = %session.id, workspace = %fingerprint, "created session");
        sessions.insert(session.id.clone(), session.clone());
        self.cleanup(&mut sessions);
        session
    }

    fn save(&self, mut session: Session) {
        let mut sessions = self.sessions.lock().expect("session store poisoned");
        session.last_activity_at = self.clock.now();
        sessions.insert(session.id.clone(), session);
        self.cleanup(&mut sessions);
    }

    fn add_to_history(&self, session_id: &str, role: Role, content: &str) {
        let mut sessions = self.sessions.lock().expect("session store poisoned");
        let now = self.clock.now();
        if let Some(session) = sessions.get_mut(session_id) {
            session.history.push(HistoryEntry {
                role,
                content: content.to_string(),
                timestamp: now,
            });
            session.last_activity_at = now;
        }
    }

    fn get(&self, session_id: &str) -> Option<Session> {
        let sessions = self.sessions.lock().expect("session store poisoned");
        let now = self.clock.now();
        sessions
            .get(session_id)
            .filter(|s| !self.is_expired(s, now))
            .cloned()
    }

    fn all(&self) -> Vec<Session> {
        let mut sessions = self.sessions.lock().expect("session store poisoned");
        self.cleanup(&mut sessions);
        let mut live: Vec<Session> = sessions.values().cloned().collect();
        live.sort_by_key(|s| s.created_at);
        live
    }

    fn delete(&self, session_id: &str) -> bool {
        let mut sessions = self.sessions.lock().expect("session store poisoned");
        sessions.remove(session_id).is_some()
    }

    fn clear(&self) -> usize {
        let mut sessions = self.sessions.lock().expect("session store poisoned");
        let count = sessions.len();
        sessions.clear();
        tracing::debug!(count, "cleared all sessions");
        count
    }

    fn set_conversation_id(&self, session_id: &str, conversation_id: &str) {
        let mut sessions = self.sessions.lock().expect("session store poisoned");
        if let Some(session) = sessions.get_mut(session_id) {
            session.conversation_id = Some(conversation_id.to_string());
            session.last_activity_at = self.clock.now();
            tracing::debug!(session_id = %session_id, conversation_id = %conversation_id, "recorded conversation id");
        }
    }

    fn stats(&self) -> SessionStats {
        let live = self.all();
        SessionStats {
            active_count: live.len(),
            max_sessions: self.max_sessions,
            ttl_hours: self.ttl.num_hours(),
            sessions_with_resume: live.iter().filter(|s| s.conversation_id.is_some()).count(),
        }
    }

    fn is_near_capacity(&self) -> bool {
        let sessions = self.sessions.lock().expect("session store poisoned");
        sessions.len() * 10 >= self.max_sessions * 9
    }
}
