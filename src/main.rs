mod client;
mod config;
mod dav;
mod error;
mod mcp;
mod provider;

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use client::ClientSet;
use config::Config;
use mcp::ToolRegistry;

#[derive(Parser)]
#[command(
    name = "dav-mcp-server",
    version,
    about = "MCP server exposing CalDAV, CardDAV and WebDAV tools for Fastmail and iCloud"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve MCP over stdin/stdout (default)
    Serve,

    /// Print the tool catalog for the configured provider
    Tools,

    /// Authenticate every configured client once and report the result
    Check,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    // stdout carries the protocol, so logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Commands::Serve);

    let config = Config::from_env().inspect_err(|e| {
        tracing::error!(error = %e, "invalid configuration");
    })?;
    tracing::info!(
        provider = %config.provider.provider,
        file_protocol = config.provider.supports_file_protocol(),
        "configuration loaded"
    );

    let clients = ClientSet::connect(&config.provider, config.credentials.clone())?;
    let registry = ToolRegistry::build(config.provider.clone(), clients);

    match command {
        Commands::Serve => {
            mcp::serve_stdio(&registry).await?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Tools => cmd_tools(&registry),
        Commands::Check => Ok(cmd_check(&registry).await),
    }
}

/// Print the catalog as `tools/list` would return it.
fn cmd_tools(registry: &ToolRegistry) -> anyhow::Result<ExitCode> {
    let catalog = serde_json::json!({ "tools": registry.catalog_json() });
    println!("{}", serde_json::to_string_pretty(&catalog)?);
    Ok(ExitCode::SUCCESS)
}

/// Authenticate each client handle and print one line per protocol.
async fn cmd_check(registry: &ToolRegistry) -> ExitCode {
    let mut failed = false;
    for handle in registry.clients().iter() {
        match handle.authenticate().await {
            Ok(()) => println!("{:<8} ok      {}", handle.protocol(), handle.base_url()),
            Err(e) => {
                failed = true;
                println!("{:<8} FAILED  {}: {e}", handle.protocol(), handle.base_url());
            }
        }
    }

    if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
