//! Centralized constants for the Azure SQL MCP Server.
//!
//! This module contains all magic numbers and default values used throughout
//! the codebase, making them easy to find, understand, and modify.

use std::time::Duration;

// =============================================================================
// Identity Constants
// =============================================================================

/// Server name advertised to MCP clients.
pub const SERVER_NAME: &str = "azure-sql-mcp-server";

/// Application name sent to SQL Server in the login packet.
pub const APPLICATION_NAME: &str = "azure-sql-mcp-server";

/// OAuth scope for Azure SQL Database tokens.
pub const AZURE_SQL_SCOPE: &str = "https://database.windows.net/.default";

/// Authority host used by the service-principal credential.
pub const AZURE_AUTHORITY_HOST: &str = "https://login.microsoftonline.com";

// =============================================================================
// Connection Constants
// =============================================================================

/// Default SQL Server TCP port.
pub const DEFAULT_PORT: u16 = 1433;

/// Default connection timeout in seconds.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default request (statement) timeout in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Default connection timeout as Duration.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS);

/// Default request timeout as Duration.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS);

// =============================================================================
// Shutdown Constants
// =============================================================================

/// Upper bound on how long shutdown waits for the connection to close.
pub const DEFAULT_CLOSE_TIMEOUT: Duration = Duration::from_secs(10);

// =============================================================================
// Logging Constants
// =============================================================================

/// Maximum SQL length written to debug logs.
pub const LOG_SQL_PREVIEW_LEN: usize = 200;

/// Default tracing filter when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "warn,azure_sql_mcp_server=info";
