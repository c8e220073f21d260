//! Configuration management for the Azure SQL MCP Server.
//!
//! Configuration is loaded from environment variables following the 12-factor app pattern.
//! A `.env` file in the working directory (or a parent) supplies variables the
//! environment leaves unset. Everything is read once at startup; the server
//! never re-reads the environment.

use crate::constants::{
    APPLICATION_NAME, DEFAULT_CONNECT_TIMEOUT, DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_PORT,
    DEFAULT_REQUEST_TIMEOUT, DEFAULT_REQUEST_TIMEOUT_SECS,
};
use crate::error::ServerError;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::time::Duration;

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Database connection configuration
    pub database: DatabaseConfig,

    /// Service-principal credential settings
    pub credentials: CredentialConfig,
}

/// Database connection configuration.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Azure SQL server host name (e.g. `myserver.database.windows.net`)
    pub server: Option<String>,

    /// SQL Server port (default: 1433)
    pub port: u16,

    /// Database name
    pub database: Option<String>,

    /// Skip server certificate validation (local testing only)
    pub trust_server_certificate: bool,

    /// TCP connect plus TDS handshake timeout
    pub connect_timeout: Duration,

    /// Per-statement timeout
    pub request_timeout: Duration,

    /// Application name sent to SQL Server
    pub application_name: String,
}

/// Service-principal credential fields.
///
/// All three must be present for service-principal authentication; otherwise
/// the default Azure credential chain is used.
#[derive(Clone, Default)]
pub struct CredentialConfig {
    /// Azure AD tenant ID
    pub tenant_id: Option<String>,

    /// Application (client) ID
    pub client_id: Option<String>,

    /// Client secret
    pub client_secret: Option<String>,
}

impl fmt::Debug for CredentialConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialConfig")
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id)
            .field(
                "client_secret",
                &self.client_secret.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// ## Required for any query
    /// - `AZURE_SQL_SERVER`: Azure SQL server host name
    /// - `AZURE_SQL_DATABASE`: Database name
    ///
    /// ## Optional
    /// - `AZURE_TENANT_ID`, `AZURE_CLIENT_ID`, `AZURE_CLIENT_SECRET`: service principal
    /// - `AZURE_SQL_PORT`: Port number (default: 1433)
    /// - `AZURE_SQL_CONNECT_TIMEOUT`: Connection timeout in seconds (default: 30)
    /// - `AZURE_SQL_REQUEST_TIMEOUT`: Statement timeout in seconds (default: 30)
    /// - `AZURE_SQL_TRUST_SERVER_CERTIFICATE`: Skip certificate validation (default: false)
    ///
    /// Variables set in the process environment win over the `.env` file.
    ///
    /// A missing server or database does not fail here; it fails each
    /// query-issuing tool call instead.
    pub fn from_env() -> Result<Self, ServerError> {
        let dotenv = match dotenvy::dotenv_iter() {
            Ok(iter) => collect_dotenv(iter)?,
            Err(e) if e.not_found() => HashMap::new(),
            Err(e) => return Err(ServerError::config(format!("Failed to read .env: {}", e))),
        };
        Self::from_lookup(|key| std::env::var(key).ok().or_else(|| dotenv.get(key).cloned()))
    }

    /// Load configuration from a dotenv file, with `lookup` taking precedence.
    pub fn from_dotenv_file<F>(path: &Path, lookup: F) -> Result<Self, ServerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let iter = dotenvy::from_path_iter(path).map_err(|e| {
            ServerError::config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let dotenv = collect_dotenv(iter)?;
        Self::from_lookup(|key| lookup(key).or_else(|| dotenv.get(key).cloned()))
    }

    /// Load configuration through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ServerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let port = match get("AZURE_SQL_PORT") {
            Some(p) => p.parse().map_err(|_| {
                ServerError::config(format!("AZURE_SQL_PORT must be a port number, got '{}'", p))
            })?,
            None => DEFAULT_PORT,
        };

        let connect_timeout_secs = parse_secs(
            "AZURE_SQL_CONNECT_TIMEOUT",
            get("AZURE_SQL_CONNECT_TIMEOUT"),
            DEFAULT_CONNECT_TIMEOUT_SECS,
        )?;
        let request_timeout_secs = parse_secs(
            "AZURE_SQL_REQUEST_TIMEOUT",
            get("AZURE_SQL_REQUEST_TIMEOUT"),
            DEFAULT_REQUEST_TIMEOUT_SECS,
        )?;

        let trust_server_certificate = get("AZURE_SQL_TRUST_SERVER_CERTIFICATE")
            .map(|v| v.to_lowercase() == "true" || v == "1")
            .unwrap_or(false);

        Ok(Config {
            database: DatabaseConfig {
                server: get("AZURE_SQL_SERVER"),
                port,
                database: get("AZURE_SQL_DATABASE"),
                trust_server_certificate,
                connect_timeout: Duration::from_secs(connect_timeout_secs),
                request_timeout: Duration::from_secs(request_timeout_secs),
                application_name: APPLICATION_NAME.to_string(),
            },
            credentials: CredentialConfig {
                tenant_id: get("AZURE_TENANT_ID"),
                client_id: get("AZURE_CLIENT_ID"),
                client_secret: get("AZURE_CLIENT_SECRET"),
            },
        })
    }
}

impl DatabaseConfig {
    /// Server and database names, or a configuration error naming what is missing.
    pub fn target(&self) -> Result<(&str, &str), ServerError> {
        match (self.server.as_deref(), self.database.as_deref()) {
            (Some(server), Some(database)) => Ok((server, database)),
            (server, database) => {
                let missing: Vec<&str> = [
                    server.is_none().then_some("AZURE_SQL_SERVER"),
                    database.is_none().then_some("AZURE_SQL_DATABASE"),
                ]
                .into_iter()
                .flatten()
                .collect();
                Err(ServerError::config(format!(
                    "{} must be set",
                    missing.join(" and ")
                )))
            }
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            server: None,
            port: DEFAULT_PORT,
            database: None,
            trust_server_certificate: false,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            application_name: APPLICATION_NAME.to_string(),
        }
    }
}

fn collect_dotenv<I>(iter: I) -> Result<HashMap<String, String>, ServerError>
where
    I: Iterator<Item = Result<(String, String), dotenvy::Error>>,
{
    iter.collect::<Result<_, _>>()
        .map_err(|e| ServerError::config(format!("Invalid .env file: {}", e)))
}

fn parse_secs(key: &str, value: Option<String>, default: u64) -> Result<u64, ServerError> {
    match value {
        Some(v) => match v.parse::<u64>() {
            Ok(secs) if secs > 0 => Ok(secs),
            _ => Err(ServerError::config(format!(
                "{} must be a positive number of seconds, got '{}'",
                key, v
            ))),
        },
        None => Ok(default),
    }
}
