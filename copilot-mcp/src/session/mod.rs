//! Workspace-scoped multi-turn session tracking.
//!
//! Sessions let the stateless Copilot CLI behave like a conversation partner:
//! each workspace (working directory fingerprint) maps to at most one live
//! session holding the transcript and, when the CLI surfaces one, a
//! conversation token usable for resume. State is in-memory and
//! process-lifetime only; there is deliberately no on-disk format.

mod resume;
mod store;

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};

pub use resume::{default_matchers, parse_conversation_id, parse_conversation_id_with};
pub use store::{Clock, InMemorySessionStore, SessionStore, SystemClock};

/// Fixed length of a workspace fingerprint.
pub const WORKSPACE_ID_LENGTH: usize = 12;

/// Session TTL: inactive sessions older than this are expired lazily.
pub const SESSION_TTL_HOURS: i64 = 24;

/// Hard cap on live sessions; oldest-activity sessions are evicted beyond it.
pub const MAX_SESSIONS: usize = 50;

/// Speaker of a history entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One transcript entry. Appended in strict call order.
#[derive(Debug, Clone, Serialize)]
pub struct HistoryEntry {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

/// Server-side record of a multi-turn conversation scoped to a workspace.
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    /// Opaque unique identifier, never reused.
    pub id: String,
    /// Fingerprint of the working directory, used for implicit lookup.
    pub workspace_id: String,
    /// Absolute path associated with the session.
    pub working_dir: PathBuf,
    /// Model in effect for this session, if pinned.
    pub model: Option<String>,
    /// Continuation token extracted from CLI output, enabling resume.
    pub conversation_id: Option<String>,
    /// Chronological transcript.
    pub history: Vec<HistoryEntry>,
    pub created_at: DateTime<Utc>,
    /// Refreshed on every read or write touch.
    pub last_activity_at: DateTime<Utc>,
}

/// Aggregate statistics over the store.
#[derive(Debug, Clone, Serialize)]
pub struct SessionStats {
    pub active_count: usize,
    pub max_sessions: usize,
    pub ttl_hours: i64,
    pub sessions_with_resume: usize,
}

/// Fingerprint a working directory (optionally pinned to a repository head)
/// into a fixed-length hex string.
///
/// Deterministic: the same inputs always produce the same fingerprint.
pub fn workspace_id(working_dir: &Path, git_head: Option<&str>) -> String {
    let input = git_head.map_or_else(
        || working_dir.display().to_string(),
        |head| format!("{}:{head}", working_dir.display()),
    );
    let digest = Sha256::digest(input.as_bytes());
    let hex = format!("{digest:x}");
    hex[..WORKSPACE_ID_LENGTH].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workspace_id_is_stable_and_fixed_length() {
        let a = workspace_id(Path::new("/home/user/project"), None);
        let b = workspace_id(Path::new("/home/user/project"), None);
        assert_eq!(a, b);
        assert_eq!(a.len(), WORKSPACE_ID_LENGTH);
    }

    #[test]
    fn distinct_directories_get_distinct_fingerprints() {
        let a = workspace_id(Path::new("/home/user/project-a"), None);
        let b = workspace_id(Path::new("/home/user/project-b"), None);
        assert_ne!(a, b);
    }

    #[test]
    fn git_head_distinguishes_checkouts_of_the_same_path() {
        let plain = workspace_id(Path::new("/repo"), None);
        let rev_a = workspace_id(Path::new("/repo"), Some("abc123"));
        let rev_b = workspace_id(Path::new("/repo"), Some("def456"));
        assert_ne!(plain, rev_a);
        assert_ne!(rev_a, rev_b);
    }
}
