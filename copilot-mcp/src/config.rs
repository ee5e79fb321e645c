//! Process-wide configuration.
//!
//! Everything here is read once at startup from the environment (plus CLI
//! overrides) and passed down by value. No config files are involved.

use std::time::Duration;

/// Environment variable holding the default model for all invocations.
pub const MODEL_ENV: &str = "COPILOT_MODEL";

/// Default per-invocation timeout (10 minutes).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(600);

/// Default cap on accumulated stdout (50 MiB).
pub const DEFAULT_MAX_OUTPUT_BYTES: usize = 50 * 1024 * 1024;

/// Grace window between SIGTERM and SIGKILL when terminating a child.
pub const TERMINATION_GRACE: Duration = Duration::from_secs(5);

/// Minimum number of captured bytes worth salvaging from a failed run.
pub const SALVAGE_THRESHOLD_BYTES: usize = 1000;

/// Runtime configuration for the bridge.
#[derive(Debug, Clone)]
pub struct Config {
    /// Name or path of the Copilot CLI binary.
    pub binary: String,
    /// Timeout applied when a tool call does not specify one.
    pub timeout: Duration,
    /// Output cap applied when a tool call does not specify one.
    pub max_output_bytes: usize,
    /// Default model (from `COPILOT_MODEL`) applied when a tool call does not
    /// name one.
    pub default_model: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            binary: "copilot".to_string(),
            timeout: DEFAULT_TIMEOUT,
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
            default_model: None,
        }
    }
}

impl Config {
    /// Build a configuration from the environment.
    pub fn from_env() -> Self {
        Self {
            default_model: std::env::var(MODEL_ENV).ok().filter(|m| !m.is_empty()),
            ..Self::default()
        }
    }

    /// Override the CLI binary path.
    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }
}
