//! Structured classification of Copilot CLI failures.
//!
//! Raw failures (stderr text, spawn errors) are mapped onto a closed taxonomy
//! of categories, each carrying a user-facing title, description, and
//! remediation suggestion plus a retry policy. Classification happens once, at
//! the point where a failure is about to become caller-visible; the process
//! runner itself never classifies.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::Serialize;
use serde_json::Value;

/// Closed taxonomy of failure categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    CliNotFound,
    Authentication,
    RateLimit,
    Timeout,
    Sandbox,
    Network,
    Session,
    Unknown,
}

impl ErrorCategory {
    /// Short user-facing title.
    pub const fn title(self) -> &'static str {
        match self {
            Self::CliNotFound => "CLI Not Found",
            Self::Authentication => "Authentication Error",
            Self::RateLimit => "Rate Limit Exceeded",
            Self::Timeout => "Operation Timeout",
            Self::Sandbox => "Sandbox Violation",
            Self::Network => "Network Error",
            Self::Session => "Session Error",
            Self::Unknown => "Unknown Error",
        }
    }

    /// One-sentence explanation of the failure.
    pub const fn description(self) -> &'static str {
        match self {
            Self::CliNotFound => "GitHub Copilot CLI is not installed or not in PATH.",
            Self::Authentication => "Authentication failed or credentials are invalid.",
            Self::RateLimit => "Too many requests have been made in a short period.",
            Self::Timeout => "The operation took too long to complete.",
            Self::Sandbox => "The operation was blocked by sandbox or permission restrictions.",
            Self::Network => "A network error occurred while communicating with the service.",
            Self::Session => "Session management error occurred.",
            Self::Unknown => "An unexpected error occurred.",
        }
    }

    /// Suggested remediation.
    pub const fn suggestion(self) -> &'static str {
        match self {
            Self::CliNotFound => "Install with: npm install -g @github/copilot-cli",
            Self::Authentication => {
                "Run \"copilot\" to login interactively, or check your GitHub credentials."
            }
            Self::RateLimit => "Wait a few minutes before trying again.",
            Self::Timeout => "Try again with a shorter prompt or smaller file set.",
            Self::Sandbox => "Use allowTool or allowAllTools to grant necessary permissions.",
            Self::Network => "Check your internet connection and try again.",
            Self::Session => "Try creating a new session or clearing existing sessions.",
            Self::Unknown => "Check the error details and try again.",
        }
    }

    /// Transient categories worth retrying automatically.
    pub const fn is_retryable(self) -> bool {
        matches!(self, Self::RateLimit | Self::Timeout | Self::Network)
    }

    const fn base_retry_delay(self) -> Duration {
        match self {
            Self::RateLimit => Duration::from_secs(60),
            Self::Network => Duration::from_secs(10),
            _ => Duration::from_secs(5),
        }
    }
}

/// Classify raw error text into a category.
///
/// Pure function of the message: case-insensitive keyword matching, first
/// matching category in declaration order wins.
pub fn classify(message: &str) -> ErrorCategory {
    let m = message.to_lowercase();
    let contains_any = |needles: &[&str]| needles.iter().any(|n| m.contains(n));

    if contains_any(&["command not found", "not found", "enoent", "is not recognized"]) {
        ErrorCategory::CliNotFound
    } else if contains_any(&[
        "authentication",
        "unauthorized",
        "401",
        "login",
        "credentials",
        "token",
    ]) {
        ErrorCategory::Authentication
    } else if contains_any(&["rate limit", "quota", "429", "too many requests"]) {
        ErrorCategory::RateLimit
    } else if contains_any(&["timeout", "timed out", "etimedout", "took too long"]) {
        ErrorCategory::Timeout
    } else if contains_any(&["sandbox", "permission", "denied", "not allowed", "blocked"]) {
        ErrorCategory::Sandbox
    } else if contains_any(&[
        "network",
        "econnrefused",
        "econnreset",
        "enotfound",
        "socket",
        "connection",
    ]) {
        ErrorCategory::Network
    } else if contains_any(&["session", "resume", "conversation"]) {
        ErrorCategory::Session
    } else {
        ErrorCategory::Unknown
    }
}

/// A classified failure with diagnostic context, ready for user display.
#[derive(Debug, Clone, thiserror::Error, Serialize)]
#[error("{}: {message}", category.title())]
pub struct ClassifiedError {
    pub category: ErrorCategory,
    pub message: String,
    pub context: BTreeMap<String, Value>,
    pub timestamp: DateTime<Utc>,
}

impl ClassifiedError {
    /// Classify `message` and wrap it.
    pub fn new(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            category: classify(&message),
            message,
            context: BTreeMap::new(),
            timestamp: Utc::now(),
        }
    }

    /// Wrap with an explicitly chosen category.
    pub fn with_category(message: impl Into<String>, category: ErrorCategory) -> Self {
        Self {
            category,
            message: message.into(),
            context: BTreeMap::new(),
            timestamp: Utc::now(),
        }
    }

    /// Attach one context entry. New keys win on conflict.
    pub fn context(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Merge a batch of context entries. New keys win on conflict.
    pub fn merge_context(mut self, extra: BTreeMap<String, Value>) -> Self {
        self.context.extend(extra);
        self
    }

    /// Markdown block for user-facing rendering.
    pub fn to_markdown(&self) -> String {
        let mut md = format!("## {}\n\n", self.category.title());
        md.push_str(&format!("**Error:** {}\n\n", self.message));
        md.push_str(&format!("**Description:** {}\n\n", self.category.description()));
        md.push_str(&format!("**Suggestion:** {}\n\n", self.category.suggestion()));
        if !self.context.is_empty() {
            md.push_str("**Context:**\n");
            for (key, value) in &self.context {
                md.push_str(&format!("- {key}: {value}\n"));
            }
            md.push('\n');
        }
        md
    }
}

/// Build a [`ClassifiedError`] from an arbitrary error, merging new context.
///
/// An error that is already classified keeps its category; the new context is
/// additive with new keys winning.
pub fn create_error(error: anyhow::Error, context: BTreeMap<String, Value>) -> ClassifiedError {
    match error.downcast::<ClassifiedError>() {
        Ok(classified) => classified.merge_context(context),
        Err(other) => ClassifiedError::new(other.to_string()).merge_context(context),
    }
}

/// Retry delay cap (5 minutes).
const MAX_RETRY_DELAY: Duration = Duration::from_secs(300);

/// Delay before retry `attempt` (1-based) of a failure in `category`.
///
/// Per-category base, scaled `2^(attempt-1)`, jittered by up to ±20% so
/// concurrent callers don't retry in lockstep, capped at 5 minutes.
pub fn retry_delay(category: ErrorCategory, attempt: u32) -> Duration {
    let base = category.base_retry_delay().as_millis() as u64;
    let exponential = base.saturating_mul(1u64 << attempt.saturating_sub(1).min(20));
    let jitter_factor: f64 = rand::rng().random_range(-0.2..=0.2);
    let jittered = (exponential as f64 * (1.0 + jitter_factor)) as u64;
    Duration::from_millis(jittered).min(MAX_RETRY_DELAY)
}
