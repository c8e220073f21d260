//! One-shot connectivity self-check (`--check`).
//!
//! Opens the connection the same way a tool call would, then reports the
//! engine version, database identity, base-table count and round-trip latency.

use crate::database::{ResultRow, SqlExecutor};
use crate::error::ServerError;
use serde_json::Value;
use std::fmt;
use std::time::{Duration, Instant};
use tracing::info;

const VERSION_SQL: &str = "SELECT @@VERSION AS version";
const IDENTITY_SQL: &str = "SELECT DB_NAME() AS database_name, @@SERVERNAME AS server_name";
const TABLE_COUNT_SQL: &str =
    "SELECT COUNT(*) AS table_count FROM INFORMATION_SCHEMA.TABLES WHERE TABLE_TYPE = 'BASE TABLE'";
const PING_SQL: &str = "SELECT 1 as test";

/// Result of a successful self-check.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionReport {
    pub version: String,
    pub database_name: String,
    pub server_name: String,
    pub table_count: i64,
    pub round_trip: Duration,
}

impl fmt::Display for ConnectionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // @@VERSION spans several lines; the first one names the engine
        let engine = self.version.lines().next().unwrap_or_default().trim();
        writeln!(f, "Connection OK")?;
        writeln!(f, "  Engine:      {}", engine)?;
        writeln!(f, "  Server:      {}", self.server_name)?;
        writeln!(f, "  Database:    {}", self.database_name)?;
        writeln!(f, "  Base tables: {}", self.table_count)?;
        write!(f, "  Round trip:  {} ms", self.round_trip.as_millis())
    }
}

/// Run the self-check through `executor`.
pub async fn check_connection(executor: &dyn SqlExecutor) -> Result<ConnectionReport, ServerError> {
    let version = first_row(executor.execute_query(VERSION_SQL, &[]).await?)?;
    let identity = first_row(executor.execute_query(IDENTITY_SQL, &[]).await?)?;
    let tables = first_row(executor.execute_query(TABLE_COUNT_SQL, &[]).await?)?;

    let start = Instant::now();
    let ping = first_row(executor.execute_query(PING_SQL, &[]).await?)?;
    let round_trip = start.elapsed();

    if ping.get("test").and_then(Value::as_i64) != Some(1) {
        return Err(ServerError::internal("Unexpected answer to SELECT 1"));
    }

    let report = ConnectionReport {
        version: text(&version, "version"),
        database_name: text(&identity, "database_name"),
        server_name: text(&identity, "server_name"),
        table_count: tables.get("table_count").and_then(Value::as_i64).unwrap_or(0),
        round_trip,
    };

    info!(
        database = %report.database_name,
        tables = report.table_count,
        "Connectivity check passed"
    );
    Ok(report)
}

fn first_row(rows: Vec<ResultRow>) -> Result<ResultRow, ServerError> {
    rows.into_iter()
        .next()
        .ok_or_else(|| ServerError::internal("Query returned no rows"))
}

fn text(row: &ResultRow, column: &str) -> String {
    row.get(column)
        .and_then(Value::as_str)
        .unwrap_or("unknown")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::SqlParam;
    use async_trait::async_trait;
    use serde_json::json;

    struct CannedExecutor;

    #[async_trait]
    impl SqlExecutor for CannedExecutor {
        async fn execute_query(&self, sql: &str, _params: &[SqlParam]) -> Result<Vec<ResultRow>, ServerError> {
            let row = match sql {
                VERSION_SQL => json!({"version": "Microsoft SQL Azure (RTM) - 12.0.2000.8\n\tCopyright"}),
                IDENTITY_SQL => json!({"database_name": "sales", "server_name": "contoso"}),
                TABLE_COUNT_SQL => json!({"table_count": 12}),
                PING_SQL => json!({"test": 1}),
                _ => return Err(ServerError::query_error("unexpected statement")),
            };
            Ok(vec![row.as_object().cloned().unwrap_or_default()])
        }

        async fn execute_batch(&self, _statements: &[String]) -> Result<Vec<ResultRow>, ServerError> {
            Ok(Vec::new())
        }
    }

    struct FailingExecutor;

    #[async_trait]
    impl SqlExecutor for FailingExecutor {
        async fn execute_query(&self, _sql: &str, _params: &[SqlParam]) -> Result<Vec<ResultRow>, ServerError> {
            Err(ServerError::credential("no identity available"))
        }

        async fn execute_batch(&self, _statements: &[String]) -> Result<Vec<ResultRow>, ServerError> {
            Err(ServerError::credential("no identity available"))
        }
    }

    #[tokio::test]
    async fn test_report_collects_fields() {
        let report = check_connection(&CannedExecutor).await.unwrap();
        assert_eq!(report.database_name, "sales");
        assert_eq!(report.server_name, "contoso");
        assert_eq!(report.table_count, 12);

        let rendered = report.to_string();
        assert!(rendered.contains("Microsoft SQL Azure (RTM) - 12.0.2000.8"));
        assert!(!rendered.contains("Copyright"));
    }

    #[tokio::test]
    async fn test_failure_propagates() {
        let err = check_connection(&FailingExecutor).await.unwrap_err();
        assert!(matches!(err, ServerError::Credential(_)));
    }
}
