//! Error types for the Azure SQL MCP Server.
//!
//! Every failure a tool call can hit is one of these variants. The dispatcher
//! converts them into error results, so none of them ever reaches the MCP
//! transport as a protocol-level error.

use thiserror::Error;

/// Domain-specific errors for the Azure SQL MCP Server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// No credential source produced an access token
    #[error("Credential error: {0}")]
    Credential(String),

    /// Connection error
    #[error("Connection error: {message}")]
    Connection { message: String },

    /// Query execution error
    #[error("{message}")]
    Query {
        message: String,
        sql_error_code: Option<i32>,
    },

    /// Connect or request timeout
    #[error("Timeout: operation exceeded {timeout_seconds} seconds")]
    Timeout { timeout_seconds: u64 },

    /// Missing or malformed tool arguments
    #[error("Invalid arguments: {0}")]
    Validation(String),

    /// Tool name not in the catalog
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServerError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a credential error.
    pub fn credential(msg: impl Into<String>) -> Self {
        Self::Credential(msg.into())
    }

    /// Create a connection error.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection {
            message: msg.into(),
        }
    }

    /// Create a query execution error.
    pub fn query_error(msg: impl Into<String>) -> Self {
        Self::Query {
            message: msg.into(),
            sql_error_code: None,
        }
    }

    /// Create a query execution error with the SQL Server error number.
    pub fn query_error_with_code(msg: impl Into<String>, code: i32) -> Self {
        Self::Query {
            message: msg.into(),
            sql_error_code: Some(code),
        }
    }

    /// Create a timeout error.
    pub fn timeout(seconds: u64) -> Self {
        Self::Timeout {
            timeout_seconds: seconds,
        }
    }

    /// Create a validation error.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create an unknown tool error.
    pub fn unknown_tool(name: impl Into<String>) -> Self {
        Self::UnknownTool(name.into())
    }

    /// Create an internal error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// SQL Server error number, if the database reported one.
    pub fn sql_error_code(&self) -> Option<i32> {
        match self {
            Self::Query { sql_error_code, .. } => *sql_error_code,
            _ => None,
        }
    }

    /// Get a user-friendly suggestion for how to fix this error.
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            Self::Config(_) => Some("Check AZURE_SQL_SERVER and AZURE_SQL_DATABASE"),
            Self::Credential(_) => Some(
                "Set AZURE_TENANT_ID, AZURE_CLIENT_ID and AZURE_CLIENT_SECRET, \
                 or sign in with `az login` / run under a managed identity",
            ),
            Self::Connection { .. } => {
                Some("Check the server name, firewall rules and network connectivity")
            }
            Self::Timeout { .. } => Some("Try a simpler query or check server load"),
            _ => None,
        }
    }
}

/// Map a SQL Server error number and message to a `ServerError`.
///
/// The engine's message is kept verbatim so callers see exactly what the
/// server reported.
pub fn from_sql_error(code: i32, message: &str) -> ServerError {
    match code {
        // Login failures arrive as server errors during the handshake
        18456 | 18452 => ServerError::connection(format!("Login failed: {}", message)),

        // Timeout / broken connection reported by the server
        -2 => ServerError::timeout(0),
        -1 => ServerError::connection(format!("Connection broken: {}", message)),

        _ => ServerError::query_error_with_code(message, code),
    }
}

/// Whether a driver error means the connection itself can no longer be used.
///
/// Server-side statement errors leave the session intact; transport failures
/// do not.
pub fn is_transport_error(e: &tiberius::error::Error) -> bool {
    use tiberius::error::Error;

    matches!(
        e,
        Error::Io { .. } | Error::Tls(_) | Error::Protocol(_) | Error::Routing { .. }
    )
}

impl From<tiberius::error::Error> for ServerError {
    fn from(e: tiberius::error::Error) -> Self {
        use tiberius::error::Error;

        match &e {
            Error::Server(token) => from_sql_error(token.code() as i32, token.message()),
            Error::Io { .. } => ServerError::connection(format!("IO error: {}", e)),
            Error::Tls(_) => ServerError::connection(format!("TLS error: {}", e)),
            Error::Protocol(_) => ServerError::connection(format!("Protocol error: {}", e)),
            Error::Routing { host, port } => {
                ServerError::connection(format!("Unexpected redirect to {}:{}", host, port))
            }
            Error::Conversion(_) | Error::Utf8 | Error::Utf16 | Error::ParseInt(_) => {
                ServerError::query_error(format!("Type conversion error: {}", e))
            }
            _ => ServerError::query_error(e.to_string()),
        }
    }
}
