//! copilot-mcp - MCP server bridging tools to the GitHub Copilot CLI.
//!
//! Exposes `ask`, `batch`, `review`, and `brainstorm` tools (plus session
//! management utilities) over the Model Context Protocol. Every prompt-running
//! tool funnels through one pipeline:
//!
//! - `workdir` resolves the effective working directory (explicit argument,
//!   environment, `@path` references in the prompt, process default)
//! - `session` tracks one conversation per workspace fingerprint, including
//!   the continuation token needed for `--resume`
//! - `copilot` turns structured options into the CLI flag vector and drives
//!   the run
//! - `process` owns subprocess execution: streaming, timeout with graceful
//!   termination, output caps, and optional retry with backoff
//! - `error` classifies failures into actionable categories with suggestions

pub mod config;
pub mod copilot;
pub mod error;
pub mod process;
pub mod progress;
pub mod server;
pub mod session;
pub mod workdir;

pub use config::Config;
pub use copilot::{CopilotOptions, ExecuteOutcome, Executor};
pub use error::{ClassifiedError, ErrorCategory};
pub use server::CopilotServer;
