//! The single cached database connection.
//!
//! [`ConnectionManager`] owns at most one live handle. The first query opens
//! it (token, then TDS login); later queries reuse it while it still reports
//! itself connected. A handle that has seen a transport failure or a request
//! timeout is discarded and replaced on the next call.

use super::auth::{acquire_token, create_token_config, resolve_credential, truncate_for_log, CredentialSource};
use super::params::{ParameterizedStatement, SqlParam};
use super::types::{ResultRow, TypeMapper};
use crate::config::{Config, DatabaseConfig};
use crate::constants::LOG_SQL_PREVIEW_LEN;
use crate::error::{is_transport_error, ServerError};
use async_trait::async_trait;
use std::time::{Duration, Instant};
use tiberius::Client;
use tokio::net::TcpStream;
use tokio::sync::{MappedMutexGuard, Mutex, MutexGuard};
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use tracing::{debug, info, warn};

/// Type alias for a raw tiberius connection.
pub type RawConnection = Client<Compat<TcpStream>>;

/// A live database session.
#[async_trait]
pub trait DbConnection: Send {
    /// Whether the handle can still carry statements.
    fn is_connected(&self) -> bool;

    /// Run one batch and return the rows of its first result set.
    async fn query(&mut self, sql: &str, params: &[SqlParam]) -> Result<Vec<ResultRow>, ServerError>;

    /// Close the session.
    async fn close(&mut self) -> Result<(), ServerError>;
}

/// Opens new connections.
#[async_trait]
pub trait Connector: Send + Sync {
    type Connection: DbConnection + 'static;

    /// Acquire a bearer token for the next login.
    async fn access_token(&self) -> Result<String, ServerError>;

    /// Open a connection authenticated with `token`.
    async fn open(&self, token: String) -> Result<Self::Connection, ServerError>;
}

/// Executes SQL on behalf of the tool dispatcher.
#[async_trait]
pub trait SqlExecutor: Send + Sync {
    /// Run a statement with `@paramN` placeholders bound positionally.
    async fn execute_query(&self, sql: &str, params: &[SqlParam]) -> Result<Vec<ResultRow>, ServerError>;

    /// Run each statement as its own batch, in order, returning the rows of the last one.
    async fn execute_batch(&self, statements: &[String]) -> Result<Vec<ResultRow>, ServerError>;
}

// =============================================================================
// Azure SQL
// =============================================================================

/// Connector for Azure SQL Database using Azure AD tokens.
#[derive(Debug, Clone)]
pub struct AzureSqlConnector {
    database: DatabaseConfig,
    credential: CredentialSource,
}

impl AzureSqlConnector {
    /// Create a connector from the server configuration.
    pub fn new(config: &Config) -> Self {
        Self {
            database: config.database.clone(),
            credential: resolve_credential(&config.credentials),
        }
    }

    /// The credential source tokens are requested from.
    pub fn credential_source(&self) -> &CredentialSource {
        &self.credential
    }
}

#[async_trait]
impl Connector for AzureSqlConnector {
    type Connection = TdsConnection;

    async fn access_token(&self) -> Result<String, ServerError> {
        // No point asking for a token when there is nowhere to use it
        self.database.target()?;
        acquire_token(&self.credential).await
    }

    async fn open(&self, token: String) -> Result<Self::Connection, ServerError> {
        let config = create_token_config(&self.database, token)?;
        let timeout = self.database.connect_timeout;

        info!("Connecting to {}", config.get_addr());

        let client = tokio::time::timeout(timeout, connect_tds(config))
            .await
            .map_err(|_| ServerError::timeout(timeout.as_secs()))??;

        info!("Connected to Azure SQL Database");
        Ok(TdsConnection::new(client, self.database.request_timeout))
    }
}

/// TCP connect plus TDS login, following one Azure gateway redirect.
async fn connect_tds(config: tiberius::Config) -> Result<RawConnection, ServerError> {
    use tiberius::error::Error;

    match connect_once(config.clone()).await {
        Ok(client) => Ok(client),
        Err(Error::Routing { host, port }) => {
            debug!("Redirected to {}:{}", host, port);
            let mut config = config;
            config.host(&host);
            config.port(port);
            connect_once(config).await.map_err(|e| {
                ServerError::connection(format!("Failed to connect after redirect: {}", e))
            })
        }
        // Login failures carry the server's error number
        Err(e @ Error::Server(_)) => Err(e.into()),
        Err(e) => Err(ServerError::connection(format!(
            "Failed to connect to SQL Server: {}",
            e
        ))),
    }
}

async fn connect_once(config: tiberius::Config) -> tiberius::Result<RawConnection> {
    let tcp = TcpStream::connect(config.get_addr()).await?;
    tcp.set_nodelay(true)?;
    Client::connect(config, tcp.compat_write()).await
}

/// A tiberius client with a per-statement timeout.
pub struct TdsConnection {
    client: Option<RawConnection>,
    connected: bool,
    request_timeout: Duration,
}

impl TdsConnection {
    /// Wrap an already logged-in client.
    pub fn new(client: RawConnection, request_timeout: Duration) -> Self {
        Self {
            client: Some(client),
            connected: true,
            request_timeout,
        }
    }
}

#[async_trait]
impl DbConnection for TdsConnection {
    fn is_connected(&self) -> bool {
        self.connected && self.client.is_some()
    }

    async fn query(&mut self, sql: &str, params: &[SqlParam]) -> Result<Vec<ResultRow>, ServerError> {
        let client = self
            .client
            .as_mut()
            .ok_or_else(|| ServerError::connection("Connection is closed"))?;

        let outcome = tokio::time::timeout(self.request_timeout, run_statement(client, sql, params)).await;

        match outcome {
            Ok(Ok(rows)) => Ok(rows),
            Ok(Err(e)) => {
                if is_transport_error(&e) {
                    warn!("Connection lost: {}", e);
                    self.connected = false;
                }
                Err(e.into())
            }
            Err(_) => {
                // The response is only partly read; the session cannot be reused
                self.connected = false;
                Err(ServerError::timeout(self.request_timeout.as_secs()))
            }
        }
    }

    async fn close(&mut self) -> Result<(), ServerError> {
        self.connected = false;
        if let Some(client) = self.client.take() {
            client.close().await?;
        }
        Ok(())
    }
}

async fn run_statement(
    client: &mut RawConnection,
    sql: &str,
    params: &[SqlParam],
) -> tiberius::Result<Vec<ResultRow>> {
    let results = if params.is_empty() {
        client.simple_query(sql).await?.into_results().await?
    } else {
        let stmt = ParameterizedStatement::new(sql, params);
        client
            .query(stmt.call(), &stmt.arguments())
            .await?
            .into_results()
            .await?
    };

    // Later result sets are read off the wire but not returned
    Ok(results
        .first()
        .map(|rows| rows.iter().map(TypeMapper::row_to_json).collect())
        .unwrap_or_default())
}

// =============================================================================
// Connection Manager
// =============================================================================

/// Owns the single lazily-opened connection.
pub struct ConnectionManager<C: Connector> {
    connector: C,
    slot: Mutex<Option<C::Connection>>,
}

impl<C: Connector> ConnectionManager<C> {
    /// Create a manager with nothing connected yet.
    pub fn new(connector: C) -> Self {
        Self {
            connector,
            slot: Mutex::new(None),
        }
    }

    /// The connector used to open new handles.
    pub fn connector(&self) -> &C {
        &self.connector
    }

    /// Return the live handle, opening one if needed.
    ///
    /// A cached handle that still reports connected is returned as is, with
    /// no token request and no handshake. The guard keeps other callers
    /// waiting until it is dropped.
    pub async fn connect(&self) -> Result<MappedMutexGuard<'_, C::Connection>, ServerError> {
        let mut slot = self.slot.lock().await;

        if !slot.as_ref().is_some_and(|conn| conn.is_connected()) {
            if slot.take().is_some() {
                debug!("Discarding disconnected handle");
            }

            let token = self.connector.access_token().await?;
            let conn = self.connector.open(token).await?;
            *slot = Some(conn);
        }

        MutexGuard::try_map(slot, Option::as_mut)
            .map_err(|_| ServerError::internal("Connection slot empty after connect"))
    }

    /// Whether a live handle is cached.
    pub async fn is_connected(&self) -> bool {
        self.slot
            .lock()
            .await
            .as_ref()
            .is_some_and(|conn| conn.is_connected())
    }

    /// Close and forget the cached handle. Errors are logged.
    pub async fn close(&self) {
        let mut slot = self.slot.lock().await;
        match slot.take() {
            Some(mut conn) => match conn.close().await {
                Ok(()) => info!("Database connection closed"),
                Err(e) => warn!("Error closing database connection: {}", e),
            },
            None => debug!("No database connection to close"),
        }
    }
}

#[async_trait]
impl<C: Connector> SqlExecutor for ConnectionManager<C> {
    async fn execute_query(&self, sql: &str, params: &[SqlParam]) -> Result<Vec<ResultRow>, ServerError> {
        let start = Instant::now();
        debug!(
            params = params.len(),
            "Executing query: {}",
            truncate_for_log(sql, LOG_SQL_PREVIEW_LEN)
        );

        let mut conn = self.connect().await?;
        let rows = conn.query(sql, params).await?;

        debug!(
            "Query returned {} rows in {} ms",
            rows.len(),
            start.elapsed().as_millis()
        );
        Ok(rows)
    }

    async fn execute_batch(&self, statements: &[String]) -> Result<Vec<ResultRow>, ServerError> {
        let mut conn = self.connect().await?;

        let mut rows = Vec::new();
        for statement in statements {
            debug!(
                "Executing batch: {}",
                truncate_for_log(statement, LOG_SQL_PREVIEW_LEN)
            );
            rows = conn.query(statement, &[]).await?;
        }
        Ok(rows)
    }
}
