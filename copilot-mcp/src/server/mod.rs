//! MCP tool surface over the execution pipeline.
//!
//! The tools are thin: they validate input, shape a prompt, and delegate to
//! [`Executor`]. All policy (timeouts, retries, session bookkeeping, error
//! classification) lives below this layer.

// The rmcp `#[tool(aggr)]` macro requires ownership of input structs,
// making pass-by-value necessary for all tool handler functions.
#![allow(clippy::needless_pass_by_value)]

mod templates;

use std::sync::Arc;

use rmcp::model::{
    CallToolResult, Content, Implementation, ProtocolVersion, ServerCapabilities, ServerInfo,
};
use rmcp::tool;
use rmcp::Error as McpError;
use schemars::JsonSchema;
use serde::Deserialize;

use crate::config::Config;
use crate::copilot::{CopilotOptions, ExecuteOutcome, Executor, OneOrMany};
use crate::progress::{ProgressSink, DEFAULT_CAPACITY};
use crate::session::{InMemorySessionStore, Session, SessionStore};

pub use templates::{Methodology, ReviewType, Severity};

/// Instructions shown to agents connecting to this server.
const INSTRUCTIONS: &str = "Bridge to the GitHub Copilot CLI. Use `ask` for one-shot or \
multi-turn prompts (sessions are tracked per workspace automatically), `batch` to run \
several prompts sequentially, `review` for read-only code review presets, and \
`brainstorm` for structured idea generation. Reference files in prompts with @path \
syntax; the working directory is inferred from those references when not given \
explicitly. Session management: `list_sessions`, `session_stats`, `clear_sessions`.";

/// Static usage text for the `help` tool.
const HELP_TEXT: &str = "**Copilot MCP Tools**\n\n\
**Primary:**\n\
- `ask` - run a prompt through the Copilot CLI with the full option set \
(model, addDir, allow/deny tools, resume, timeout)\n\
- `batch` - run several prompts sequentially against one option set\n\
- `review` - code-review preset; read-only tool policy, focus and severity filters\n\
- `brainstorm` - structured idea generation with selectable methodology\n\n\
**Utility:**\n\
- `ping` - echo liveness check\n\
- `help` - this text\n\
- `list_sessions` - show tracked workspace sessions\n\
- `session_stats` - store statistics\n\
- `clear_sessions` - delete one session or all of them\n\n\
**Setup:** requires the GitHub Copilot CLI on PATH \
(`npm install -g @github/copilot-cli`, verify with `copilot --version`). \
Default model comes from the `COPILOT_MODEL` environment variable.";

/// MCP server bridging tools to the Copilot CLI.
#[derive(Clone)]
pub struct CopilotServer {
    executor: Arc<Executor>,
}

impl CopilotServer {
    /// Create a server with a fresh in-memory session store.
    pub fn new(config: Config) -> Self {
        let store: Arc<dyn SessionStore> = Arc::new(InMemorySessionStore::new());
        Self {
            executor: Arc::new(Executor::new(config, store)),
        }
    }

    fn store(&self) -> Arc<dyn SessionStore> {
        self.executor.store()
    }

    /// Progress relay: partial CLI output is surfaced as log events. Delivery
    /// is best effort; the drain task simply ends when the run does.
    fn relay(tool: &'static str) -> ProgressSink {
        let (sink, mut rx) = ProgressSink::channel(DEFAULT_CAPACITY);
        tokio::spawn(async move {
            while let Some(chunk) = rx.recv().await {
                tracing::debug!(tool, bytes = chunk.len(), "partial output");
            }
        });
        sink
    }

    async fn run_prompt(
        &self,
        tool: &'static str,
        prompt: &str,
        options: &CopilotOptions,
    ) -> Result<CallToolResult, McpError> {
        let progress = Self::relay(tool);
        match self.executor.execute(prompt, options, &progress).await {
            Ok(outcome) => Ok(CallToolResult::success(vec![Content::text(
                format_outcome(&outcome),
            )])),
            Err(err) => {
                tracing::warn!(tool, category = err.category.title(), "tool call failed");
                Ok(CallToolResult::error(vec![Content::text(
                    err.to_markdown(),
                )]))
            }
        }
    }
}

// Tool input schemas

/// Input for the `ask` tool.
#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AskInput {
    /// The prompt to send to the Copilot CLI. Reference files with @path.
    pub prompt: String,
    #[serde(flatten)]
    pub options: CopilotOptions,
}

/// Input for the `batch` tool.
#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BatchInput {
    /// Prompts to run sequentially, in order.
    pub prompts: Vec<String>,
    #[serde(flatten)]
    pub options: CopilotOptions,
}

/// Input for the `review` tool.
#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReviewInput {
    /// Target files or directories to review.
    pub target: String,
    /// Type of review to perform. Defaults to comprehensive.
    #[serde(default)]
    pub review_type: ReviewType,
    /// Minimum severity level to report.
    pub severity: Option<Severity>,
    /// File patterns to exclude.
    #[serde(default)]
    pub exclude_patterns: Vec<String>,
    /// Maximum number of issues to report.
    #[serde(default = "default_max_issues")]
    pub max_issues: usize,
    /// Include specific fix suggestions. Defaults to true.
    #[serde(default = "default_true")]
    pub include_fix_suggestions: bool,
    /// Include priority ranking for issues. Defaults to true.
    #[serde(default = "default_true")]
    pub include_priority_ranking: bool,
    #[serde(flatten)]
    pub options: CopilotOptions,
}

const fn default_max_issues() -> usize {
    20
}

const fn default_true() -> bool {
    true
}

/// Input for the `brainstorm` tool.
#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BrainstormInput {
    /// Brainstorming challenge or question.
    pub prompt: String,
    /// Framework to apply. Defaults to auto.
    #[serde(default)]
    pub methodology: Methodology,
    /// Domain: software, business, creative, research, product, etc.
    pub domain: Option<String>,
    /// Limitations: budget, time, technical, legal, etc.
    pub constraints: Option<String>,
    /// Background info or previous attempts.
    pub existing_context: Option<String>,
    /// Number of ideas to generate. Defaults to 12.
    #[serde(default = "default_idea_count")]
    pub idea_count: usize,
    /// Include feasibility/impact analysis. Defaults to true.
    #[serde(default = "default_true")]
    pub include_analysis: bool,
    #[serde(flatten)]
    pub options: CopilotOptions,
}

const fn default_idea_count() -> usize {
    12
}

/// Input for the `ping` tool.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct PingInput {
    /// Message to echo. Defaults to "Pong!".
    pub message: Option<String>,
}

/// Input for the `clear_sessions` tool.
#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClearSessionsInput {
    /// Delete only this session. Omit to clear all sessions.
    pub session_id: Option<String>,
}

// Output formatting

/// Render an execution outcome as the tool's text payload.
fn format_outcome(outcome: &ExecuteOutcome) -> String {
    let mut text = String::new();
    if outcome.salvaged {
        text.push_str(
            "**Note:** the run did not complete cleanly; this is partial output.\n\n",
        );
    }
    text.push_str(&outcome.output);
    if let Some(session) = &outcome.session {
        let resume = if session.conversation_id.is_some() {
            "resumable"
        } else {
            "no conversation ID yet"
        };
        text.push_str(&format!("\n\n---\n*Session: {} ({resume})*", session.id));
    }
    text
}

/// Render the session list as a markdown table, most recent activity first.
fn format_session_table(mut sessions: Vec<Session>, stats: &crate::session::SessionStats) -> String {
    sessions.sort_by(|a, b| b.last_activity_at.cmp(&a.last_activity_at));

    let mut out = String::from("# Active Sessions\n\n");
    out.push_str(&format!(
        "**Total:** {} / {} | **TTL:** {}h | **With Resume:** {}\n\n",
        stats.active_count, stats.max_sessions, stats.ttl_hours, stats.sessions_with_resume
    ));

    if sessions.is_empty() {
        out.push_str("*No active sessions*\n");
        return out;
    }

    out.push_str("| Session ID | Workspace | Last Activity | Resume |\n");
    out.push_str("|------------|-----------|---------------|--------|\n");
    for session in &sessions {
        let resume = if session.conversation_id.is_some() {
            "yes"
        } else {
            "no"
        };
        out.push_str(&format!(
            "| {} | {} | {} | {} |\n",
            session.id,
            session.workspace_id,
            session.last_activity_at.format("%Y-%m-%d %H:%M:%S"),
            resume
        ));
    }
    out
}

/// Force a read-only tool policy for review runs: no allow-all, and the CLI's
/// mutating tools denied outright.
fn read_only(mut options: CopilotOptions) -> CopilotOptions {
    options.allow_all_tools = Some(false);
    let mut denies = options
        .deny_tool
        .as_ref()
        .map(OneOrMany::to_vec)
        .unwrap_or_default();
    for tool in ["write", "shell"] {
        if !denies.iter().any(|d| d == tool) {
            denies.push(tool.to_string());
        }
    }
    options.deny_tool = Some(OneOrMany::Many(denies));
    options
}

// Tool implementations

#[tool(tool_box)]
impl CopilotServer {
    /// Run a prompt through the Copilot CLI.
    #[tool(
        description = "Execute a prompt with the GitHub Copilot CLI. Supports @path file references, workspace session tracking, model selection, and tool permission control."
    )]
    async fn ask(&self, #[tool(aggr)] input: AskInput) -> Result<CallToolResult, McpError> {
        self.run_prompt("ask", &input.prompt, &input.options).await
    }

    /// Run several prompts sequentially.
    #[tool(
        description = "Run multiple prompts sequentially through the Copilot CLI, each with the same options and session. Returns one combined report."
    )]
    async fn batch(&self, #[tool(aggr)] input: BatchInput) -> Result<CallToolResult, McpError> {
        if input.prompts.is_empty() {
            return Ok(CallToolResult::error(vec![Content::text(
                "No prompts provided for batch execution",
            )]));
        }

        let progress = Self::relay("batch");
        let total = input.prompts.len();
        let mut sections = Vec::with_capacity(total);
        let mut failures = 0usize;

        // Sequential on purpose: later prompts may depend on session state
        // built up by earlier ones.
        for (index, prompt) in input.prompts.iter().enumerate() {
            let heading = format!("## Prompt {} of {total}", index + 1);
            match self.executor.execute(prompt, &input.options, &progress).await {
                Ok(outcome) => sections.push(format!("{heading}\n\n{}", format_outcome(&outcome))),
                Err(err) => {
                    failures += 1;
                    sections.push(format!("{heading}\n\n{}", err.to_markdown()));
                }
            }
        }

        let report = sections.join("\n\n---\n\n");
        if failures == total {
            Ok(CallToolResult::error(vec![Content::text(report)]))
        } else {
            Ok(CallToolResult::success(vec![Content::text(report)]))
        }
    }

    /// Review code with a read-only tool policy.
    #[tool(
        description = "Code review via the Copilot CLI with a focus preset (security, performance, quality, ...). Runs with a read-only tool policy."
    )]
    async fn review(&self, #[tool(aggr)] input: ReviewInput) -> Result<CallToolResult, McpError> {
        if input.target.trim().is_empty() {
            return Ok(CallToolResult::error(vec![Content::text(
                "Please provide target files or directories to review",
            )]));
        }

        let prompt = templates::review_prompt(
            &input.target,
            input.review_type,
            input.severity,
            &input.exclude_patterns,
            input.max_issues,
            input.include_fix_suggestions,
            input.include_priority_ranking,
        );
        let options = read_only(input.options);
        self.run_prompt("review", &prompt, &options).await
    }

    /// Structured brainstorming.
    #[tool(
        description = "Generate ideas with a structured brainstorming framework (divergent, convergent, SCAMPER, design-thinking, lateral, or auto)."
    )]
    async fn brainstorm(
        &self,
        #[tool(aggr)] input: BrainstormInput,
    ) -> Result<CallToolResult, McpError> {
        if input.prompt.trim().is_empty() {
            return Ok(CallToolResult::error(vec![Content::text(
                "Please provide a brainstorming challenge or question",
            )]));
        }

        let prompt = templates::brainstorm_prompt(
            input.prompt.trim(),
            input.methodology,
            input.domain.as_deref(),
            input.constraints.as_deref(),
            input.existing_context.as_deref(),
            input.idea_count,
            input.include_analysis,
        );
        self.run_prompt("brainstorm", &prompt, &input.options).await
    }

    /// Echo liveness check.
    #[tool(description = "Echo a message back. Liveness check, no CLI involvement.")]
    fn ping(&self, #[tool(aggr)] input: PingInput) -> Result<CallToolResult, McpError> {
        let message = input.message.filter(|m| !m.is_empty());
        Ok(CallToolResult::success(vec![Content::text(
            message.unwrap_or_else(|| "Pong!".to_string()),
        )]))
    }

    /// Static usage documentation.
    #[tool(description = "Show usage information for the available tools.")]
    fn help(&self) -> Result<CallToolResult, McpError> {
        Ok(CallToolResult::success(vec![Content::text(HELP_TEXT)]))
    }

    /// List tracked sessions.
    #[tool(description = "List tracked workspace sessions with activity and resume status.")]
    fn list_sessions(&self) -> Result<CallToolResult, McpError> {
        let store = self.store();
        let table = format_session_table(store.all(), &store.stats());
        Ok(CallToolResult::success(vec![Content::text(table)]))
    }

    /// Session store statistics.
    #[tool(description = "Session store statistics: counts, capacity, TTL.")]
    fn session_stats(&self) -> Result<CallToolResult, McpError> {
        let store = self.store();
        let stats = store.stats();
        let mut text = serde_json::to_string_pretty(&stats)
            .map_err(|e| McpError::internal_error(e.to_string(), None))?;
        if store.is_near_capacity() {
            text.push_str("\n\nWarning: session store is near capacity; oldest sessions will be evicted.");
        }
        Ok(CallToolResult::success(vec![Content::text(text)]))
    }

    /// Delete one session or clear them all.
    #[tool(description = "Delete a session by ID, or clear all sessions when no ID is given.")]
    fn clear_sessions(
        &self,
        #[tool(aggr)] input: ClearSessionsInput,
    ) -> Result<CallToolResult, McpError> {
        let store = self.store();
        match input.session_id {
            Some(id) => {
                if store.delete(&id) {
                    Ok(CallToolResult::success(vec![Content::text(format!(
                        "Deleted session: {id}"
                    ))]))
                } else {
                    Ok(CallToolResult::error(vec![Content::text(format!(
                        "Session not found: {id}"
                    ))]))
                }
            }
            None => {
                let count = store.clear();
                Ok(CallToolResult::success(vec![Content::text(format!(
                    "Cleared {count} session(s)"
                ))]))
            }
        }
    }
}

#[rmcp::tool(tool_box)]
impl rmcp::ServerHandler for CopilotServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "copilot-mcp".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
            instructions: Some(INSTRUCTIONS.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::copilot::LogLevel;

    fn server_with(binary: &str) -> CopilotServer {
        CopilotServer::new(Config {
            binary: binary.to_string(),
            default_model: None,
            ..Config::default()
        })
    }

    #[test]
    fn ping_echoes_or_pongs() {
        let server = server_with("echo");
        let result = server.ping(PingInput { message: None }).unwrap();
        assert_ne!(result.is_error, Some(true));
        let result = server
            .ping(PingInput {
                message: Some("hi".to_string()),
            })
            .unwrap();
        assert_ne!(result.is_error, Some(true));
    }

    #[test]
    fn read_only_policy_denies_mutating_tools() {
        let options = read_only(CopilotOptions {
            allow_all_tools: Some(true),
            deny_tool: Some(OneOrMany::One("web".to_string())),
            log_level: Some(LogLevel::Debug),
            ..CopilotOptions::default()
        });
        assert_eq!(options.allow_all_tools, Some(false));
        let denies = options.deny_tool.unwrap().to_vec();
        assert!(denies.contains(&"web".to_string()));
        assert!(denies.contains(&"write".to_string()));
        assert!(denies.contains(&"shell".to_string()));
        // Unrelated options pass through untouched.
        assert_eq!(options.log_level, Some(LogLevel::Debug));
    }

    #[test]
    fn session_table_lists_most_recent_first() {
        let server = server_with("echo");
        let store = server.store();
        let dir = tempfile::tempdir().unwrap();
        let older = store.get_or_create(dir.path(), None, None);
        let newer = store.get_or_create(&dir.path().join(".."), None, None);

        let table = format_session_table(store.all(), &store.stats());
        assert!(table.contains("# Active Sessions"));
        let older_pos = table.find(&older.id).unwrap();
        let newer_pos = table.find(&newer.id).unwrap();
        assert!(newer_pos < older_pos);
    }

    #[test]
    fn empty_store_renders_placeholder() {
        let server = server_with("echo");
        let store = server.store();
        let table = format_session_table(store.all(), &store.stats());
        assert!(table.contains("*No active sessions*"));
    }

    #[test]
    fn clear_sessions_reports_missing_id() {
        let server = server_with("echo");
        let result = server
            .clear_sessions(ClearSessionsInput {
                session_id: Some("sess_nope".to_string()),
            })
            .unwrap();
        assert_eq!(result.is_error, Some(true));
    }

    #[tokio::test]
    async fn ask_surfaces_classified_errors_as_tool_errors() {
        let server = server_with("definitely_not_installed_cli_tool");
        let dir = tempfile::tempdir().unwrap();
        let result = server
            .ask(AskInput {
                prompt: "hello".to_string(),
                options: CopilotOptions {
                    working_dir: Some(dir.path().display().to_string()),
                    ..CopilotOptions::default()
                },
            })
            .await
            .unwrap();
        assert_eq!(result.is_error, Some(true));
    }

    #[tokio::test]
    async fn batch_runs_all_prompts_and_reports_sections() {
        let server = server_with("echo");
        let dir = tempfile::tempdir().unwrap();
        let result = server
            .batch(BatchInput {
                prompts: vec!["alpha".to_string(), "beta".to_string()],
                options: CopilotOptions {
                    working_dir: Some(dir.path().display().to_string()),
                    ..CopilotOptions::default()
                },
            })
            .await
            .unwrap();
        assert_ne!(result.is_error, Some(true));
    }

    #[tokio::test]
    async fn batch_rejects_empty_prompt_list() {
        let server = server_with("echo");
        let result = server
            .batch(BatchInput {
                prompts: vec![],
                options: CopilotOptions::default(),
            })
            .await
            .unwrap();
        assert_eq!(result.is_error, Some(true));
    }

    #[test]
    fn salvaged_outcome_is_flagged_in_output() {
        let outcome = ExecuteOutcome {
            output: "partial answer".to_string(),
            session: None,
            working_dir: std::path::PathBuf::from("/tmp"),
            salvaged: true,
        };
        let text = format_outcome(&outcome);
        assert!(text.contains("partial output"));
        assert!(text.contains("partial answer"));
    }
}
