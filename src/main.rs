//! Azure SQL MCP Server entry point.
//!
//! Serves MCP over stdio for an agent host. With `--check` it instead runs a
//! one-shot connectivity test and exits.

use anyhow::{bail, Result};
use azure_sql_mcp_server::constants::DEFAULT_LOG_FILTER;
use azure_sql_mcp_server::database::{AzureSqlConnector, ConnectionManager};
use azure_sql_mcp_server::diagnostics::check_connection;
use azure_sql_mcp_server::shutdown::{install_signal_handlers, new_shutdown_controller};
use azure_sql_mcp_server::{AzureSqlMcpServer, Config};
use clap::Parser;
use rmcp::ServiceExt;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// MCP server exposing Azure SQL Database tools over stdio.
#[derive(Debug, Parser)]
#[command(name = "azure-sql-mcp-server", version, about)]
struct Cli {
    /// Test the database connection and exit instead of serving.
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging to stderr (stdout is reserved for JSON-RPC)
    init_logging();

    let version = env!("CARGO_PKG_VERSION");
    eprintln!("Azure SQL MCP Server v{version} starting...");

    // Load configuration from environment (and .env, if present)
    let config = Config::from_env()?;
    let connector = AzureSqlConnector::new(&config);
    eprintln!(
        "Configuration loaded (credential: {})",
        connector.credential_source().kind()
    );
    if let Err(e) = config.database.target() {
        eprintln!("Warning: {e}. Tool calls will fail until this is fixed.");
    }

    let connection = Arc::new(ConnectionManager::new(connector));

    if cli.check {
        return run_check(&connection).await;
    }

    let shutdown_controller = new_shutdown_controller();
    install_signal_handlers(shutdown_controller.clone()).await;

    let server = AzureSqlMcpServer::new(config, connection.clone());
    eprintln!("Transport: stdio. Ready to accept requests...");

    let service = server.serve(rmcp::transport::stdio()).await?;

    let mut shutdown_signal = shutdown_controller.signal();

    tokio::select! {
        quit_reason = service.waiting() => {
            match quit_reason {
                Ok(reason) => eprintln!("Service stopped: {reason:?}"),
                Err(e) => eprintln!("Service error: {e}"),
            }
        }
        _ = shutdown_signal.recv() => {
            eprintln!("Shutdown signal received");
        }
    }

    shutdown_controller.graceful_shutdown(&*connection).await;
    eprintln!("Server shutdown complete");

    Ok(())
}

async fn run_check(connection: &ConnectionManager<AzureSqlConnector>) -> Result<()> {
    let outcome = check_connection(connection).await;
    connection.close().await;

    match outcome {
        Ok(report) => {
            eprintln!("{report}");
            Ok(())
        }
        Err(e) => {
            if let Some(hint) = e.suggestion() {
                eprintln!("Suggestion: {hint}");
            }
            bail!("Connection check failed: {e}")
        }
    }
}

/// Initialize tracing subscriber with stderr output.
///
/// Logs MUST go to stderr because stdout is used for JSON-RPC communication.
fn init_logging() {
    let filter = std::env::var("RUST_LOG")
        .map(EnvFilter::new)
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}
