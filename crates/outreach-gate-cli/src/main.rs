// crates/outreach-gate-cli/src/main.rs
// ============================================================================
// Module: Outreach Gate Binary
// Description: Process entry point for the outreach gateway.
// Purpose: Resolve environment settings and run the HTTP service.
// Dependencies: clap, outreach-gate-config, outreach-gate-server, tokio
// ============================================================================

//! ## Overview
//! The gateway is a long-running HTTP process. Configuration is resolved
//! entirely from the environment; the only command is `serve`. The process
//! exits non-zero only when configuration prevents startup.

// ============================================================================
// SECTION: Imports
// ============================================================================

use clap::Parser;
use clap::Subcommand;
use outreach_gate_config::GatewaySettings;
use outreach_gate_server::GatewayServer;
use outreach_gate_server::GatewayServerError;

// ============================================================================
// SECTION: CLI Definition
// ============================================================================

/// Outreach Gate: multi-tenant outreach-orchestration gateway.
#[derive(Debug, Parser)]
#[command(name = "outreach-gate", version, about)]
struct Cli {
    /// Command to run.
    #[command(subcommand)]
    command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
enum Command {
    /// Serve the gateway over HTTP until stopped.
    Serve,
}

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// Resolves settings and runs the requested command.
///
/// # Errors
///
/// Returns [`GatewayServerError`] when configuration or startup fails.
#[tokio::main]
async fn main() -> Result<(), GatewayServerError> {
    let cli = Cli::parse();
    match cli.command {
        Command::Serve => {
            let settings = GatewaySettings::from_env()
                .map_err(|err| GatewayServerError::Config(err.to_string()))?;
            let server = GatewayServer::from_settings(settings)?;
            server.serve().await
        }
    }
}
