//! Binary entry point: stdio MCP transport plus logging setup.
//!
//! stdout carries the MCP protocol, so all diagnostics go to stderr.

use anyhow::Result;
use clap::Parser;
use rmcp::{transport::stdio, ServiceExt};
use tracing_subscriber::EnvFilter;

use copilot_mcp::{Config, CopilotServer};

/// MCP server bridging tools to the GitHub Copilot CLI
#[derive(Parser, Debug)]
#[command(name = "copilot-mcp")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the Copilot CLI binary
    #[arg(long, default_value = "copilot")]
    copilot_path: String,

    /// Log filter when RUST_LOG is not set (e.g. "info", "copilot_mcp=debug")
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = Config::from_env().with_binary(cli.copilot_path);
    tracing::info!(
        binary = %config.binary,
        timeout = ?config.timeout,
        "starting copilot-mcp server on stdio"
    );

    let service = CopilotServer::new(config).serve(stdio()).await?;
    service.waiting().await?;
    Ok(())
}
