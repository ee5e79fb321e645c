//! Structured options and their translation into Copilot CLI flags.
//!
//! `build_args` is a pure function from an options record to the ordered flag
//! vector the CLI expects, ending with `-p <prompt>`.

use std::collections::BTreeSet;
use std::path::Path;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A field that accepts either one value or a list of values.
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T: Clone> OneOrMany<T> {
    /// Flatten into a vector.
    pub fn to_vec(&self) -> Vec<T> {
        match self {
            Self::One(value) => vec![value.clone()],
            Self::Many(values) => values.clone(),
        }
    }
}

/// Log levels understood by the Copilot CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warning,
    Info,
    Debug,
    All,
    Default,
    None,
}

impl LogLevel {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::All => "all",
            Self::Default => "default",
            Self::None => "none",
        }
    }
}

/// Options accepted by the execution pipeline.
///
/// Field names mirror the tool-facing JSON schema (camelCase).
#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct CopilotOptions {
    /// AI model to use. Falls back to the `COPILOT_MODEL` environment default,
    /// else the CLI picks its own.
    pub model: Option<String>,
    /// Directories to add to the allowed list for file access.
    pub add_dir: Option<OneOrMany<String>>,
    /// Allow all tools to run automatically (required for non-interactive
    /// use). Defaults to true; when true, specific allow lists are omitted.
    pub allow_all_tools: Option<bool>,
    /// Allow specific tools, e.g. `shell(npm run test:*)`.
    pub allow_tool: Option<OneOrMany<String>>,
    /// Deny specific tools (takes precedence over allowTool in the CLI).
    pub deny_tool: Option<OneOrMany<String>>,
    /// Disable specific MCP servers inside the CLI.
    pub disable_mcp_server: Option<OneOrMany<String>>,
    /// Log file directory for the CLI.
    pub log_dir: Option<String>,
    /// CLI log level.
    pub log_level: Option<LogLevel>,
    /// Disable color output.
    pub no_color: Option<bool>,
    /// Screen reader optimizations.
    pub screen_reader: Option<bool>,
    /// Show the animated banner.
    pub banner: Option<bool>,
    /// Resume the most recent CLI session.
    pub resume: Option<bool>,
    /// Resume the most recent session (alias the CLI also accepts).
    #[serde(rename = "continue")]
    pub continue_latest: Option<bool>,
    /// Working directory for the invocation. Falls back to the
    /// `COPILOT_MCP_CWD` environment variable or path hints in the prompt.
    pub working_dir: Option<String>,
    /// Explicit session ID for multi-turn bookkeeping.
    pub session_id: Option<String>,
    /// Track this invocation in the session store. Defaults to true.
    pub enable_session_tracking: Option<bool>,
    /// Maximum execution time in milliseconds.
    pub timeout: Option<u64>,
    /// Cap on accumulated output bytes.
    pub max_output_bytes: Option<usize>,
}

impl CopilotOptions {
    pub fn session_tracking_enabled(&self) -> bool {
        self.enable_session_tracking.unwrap_or(true)
    }
}

/// Build the ordered argument vector for one CLI invocation.
///
/// `resume_latest` asks the CLI to continue its most recent conversation. It
/// is always a bare flag: no session ID is passed on the command line, the
/// CLI applies its own "most recent" semantics.
pub fn build_args(
    prompt: &str,
    options: &CopilotOptions,
    working_dir: &Path,
    default_model: Option<&str>,
    resume_latest: bool,
) -> Vec<String> {
    let mut args = Vec::new();

    // Directory grants, deduplicated; the resolved working directory is always
    // granted so the CLI can read files under it.
    let mut dirs: BTreeSet<String> = options
        .add_dir
        .as_ref()
        .map(OneOrMany::to_vec)
        .unwrap_or_default()
        .into_iter()
        .collect();
    dirs.insert(working_dir.display().to_string());
    for dir in dirs {
        args.push("--add-dir".to_string());
        args.push(dir);
    }

    // Allow-all wins over any specific allow list.
    if options.allow_all_tools.unwrap_or(true) {
        args.push("--allow-all-tools".to_string());
    } else if let Some(tools) = &options.allow_tool {
        for tool in tools.to_vec() {
            args.push("--allow-tool".to_string());
            args.push(tool);
        }
    }

    if let Some(tools) = &options.deny_tool {
        for tool in tools.to_vec() {
            args.push("--deny-tool".to_string());
            args.push(tool);
        }
    }

    if let Some(servers) = &options.disable_mcp_server {
        for server in servers.to_vec() {
            args.push("--disable-mcp-server".to_string());
            args.push(server);
        }
    }

    if let Some(dir) = &options.log_dir {
        args.push("--log-dir".to_string());
        args.push(dir.clone());
    }
    if let Some(level) = options.log_level {
        args.push("--log-level".to_string());
        args.push(level.as_str().to_string());
    }
    if options.no_color == Some(true) {
        args.push("--no-color".to_string());
    }
    if options.screen_reader == Some(true) {
        args.push("--screen-reader".to_string());
    }
    if options.banner == Some(true) {
        args.push("--banner".to_string());
    }

    if resume_latest || options.resume == Some(true) {
        args.push("--resume".to_string());
    }
    if options.continue_latest == Some(true) {
        args.push("--continue".to_string());
    }

    // Explicit model first, then the process-wide default, else let the CLI
    // choose.
    if let Some(model) = options.model.as_deref().or(default_model) {
        args.push("--model".to_string());
        args.push(model.to_string());
    }

    args.push("-p".to_string());
    args.push(prompt.to_string());

    args
}
