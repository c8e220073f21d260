//! Database connectivity and query execution.

pub mod auth;
mod connection;
mod params;
pub mod types;

pub use auth::{acquire_token, resolve_credential, CredentialSource};
pub use connection::{
    AzureSqlConnector, ConnectionManager, Connector, DbConnection, RawConnection, SqlExecutor,
    TdsConnection,
};
pub use params::{ParameterizedStatement, SqlParam};
pub use types::{ResultRow, SqlValue, TypeMapper};
