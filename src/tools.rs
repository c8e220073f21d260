//! MCP tools for Azure SQL Database.
//!
//! - `execute_sql_query`: run caller SQL with positional parameters
//! - `get_table_schema`: column metadata for one table
//! - `list_tables`: base tables in the database
//! - `get_database_info`: engine version, database, server and clock
//! - `create_view`: create (or replace) a view
//! - `create_stored_procedure`: create (or replace) a stored procedure
//! - `list_views`: views with their definitions
//! - `list_stored_procedures`: stored procedures with timestamps
//!
//! Every failure is returned as an error result. Nothing raised here reaches
//! the MCP transport.

mod inputs;

pub use inputs::*;

use crate::database::{ResultRow, SqlExecutor, SqlParam};
use crate::error::ServerError;
use crate::security::sanitized_object_name;
use rmcp::model::{CallToolResult, Content, JsonObject, Tool};
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info, warn};

// =========================================================================
// Statements
// =========================================================================

const TABLE_SCHEMA_SQL: &str = "\
SELECT
    COLUMN_NAME,
    DATA_TYPE,
    IS_NULLABLE,
    COLUMN_DEFAULT,
    CHARACTER_MAXIMUM_LENGTH,
    NUMERIC_PRECISION,
    NUMERIC_SCALE
FROM INFORMATION_SCHEMA.COLUMNS
WHERE TABLE_NAME = @param0
ORDER BY ORDINAL_POSITION";

const LIST_TABLES_SQL: &str = "\
SELECT
    TABLE_NAME,
    TABLE_TYPE,
    TABLE_SCHEMA
FROM INFORMATION_SCHEMA.TABLES
WHERE TABLE_TYPE = 'BASE TABLE'
ORDER BY TABLE_SCHEMA, TABLE_NAME";

const DATABASE_INFO_SQL: &str = "\
SELECT
    @@VERSION AS sql_version,
    DB_NAME() AS database_name,
    @@SERVERNAME AS server_name,
    GETDATE() AS current_datetime";

const LIST_VIEWS_SQL: &str = "\
SELECT
    TABLE_NAME AS view_name,
    TABLE_SCHEMA AS schema_name,
    VIEW_DEFINITION AS definition
FROM INFORMATION_SCHEMA.VIEWS
ORDER BY TABLE_SCHEMA, TABLE_NAME";

const LIST_PROCEDURES_SQL: &str = "\
SELECT
    ROUTINE_NAME AS procedure_name,
    ROUTINE_SCHEMA AS schema_name,
    CREATED AS created_date,
    LAST_ALTERED AS last_modified
FROM INFORMATION_SCHEMA.ROUTINES
WHERE ROUTINE_TYPE = 'PROCEDURE'
ORDER BY ROUTINE_SCHEMA, ROUTINE_NAME";

/// Batches that create a view. `name` must already be sanitized.
///
/// `CREATE VIEW` has to start its own batch, so the conditional drop is a
/// separate statement.
pub fn create_view_statements(name: &str, query: &str, replace_if_exists: bool) -> Vec<String> {
    let mut statements = Vec::with_capacity(2);
    if replace_if_exists {
        statements.push(format!(
            "IF OBJECT_ID('{name}', 'V') IS NOT NULL DROP VIEW {name}"
        ));
    }
    statements.push(format!("CREATE VIEW {name} AS {query}"));
    statements
}

/// Batches that create a stored procedure. `name` must already be sanitized.
pub fn create_procedure_statements(
    name: &str,
    parameters: Option<&str>,
    body: &str,
    replace_if_exists: bool,
) -> Vec<String> {
    let mut statements = Vec::with_capacity(2);
    if replace_if_exists {
        statements.push(format!(
            "IF OBJECT_ID('{name}', 'P') IS NOT NULL DROP PROCEDURE {name}"
        ));
    }

    let mut create = format!("CREATE PROCEDURE {name}\n");
    if let Some(parameters) = parameters.map(str::trim).filter(|p| !p.is_empty()) {
        create.push_str(parameters);
        create.push('\n');
    }
    create.push_str("AS\nBEGIN\n");
    create.push_str(body);
    create.push_str("\nEND");
    statements.push(create);

    statements
}

// =========================================================================
// Catalog
// =========================================================================

/// The tools this server offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolName {
    ExecuteSqlQuery,
    GetTableSchema,
    ListTables,
    GetDatabaseInfo,
    CreateView,
    CreateStoredProcedure,
    ListViews,
    ListStoredProcedures,
}

impl ToolName {
    /// Every tool, in catalog order.
    pub const ALL: [ToolName; 8] = [
        ToolName::ExecuteSqlQuery,
        ToolName::GetTableSchema,
        ToolName::ListTables,
        ToolName::GetDatabaseInfo,
        ToolName::CreateView,
        ToolName::CreateStoredProcedure,
        ToolName::ListViews,
        ToolName::ListStoredProcedures,
    ];

    /// Wire name of the tool.
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolName::ExecuteSqlQuery => "execute_sql_query",
            ToolName::GetTableSchema => "get_table_schema",
            ToolName::ListTables => "list_tables",
            ToolName::GetDatabaseInfo => "get_database_info",
            ToolName::CreateView => "create_view",
            ToolName::CreateStoredProcedure => "create_stored_procedure",
            ToolName::ListViews => "list_views",
            ToolName::ListStoredProcedures => "list_stored_procedures",
        }
    }

    /// Human-readable description shown to the agent.
    pub fn description(&self) -> &'static str {
        match self {
            ToolName::ExecuteSqlQuery => {
                "Execute a SQL query on Azure SQL Database and return the rows as JSON. \
                 Use @param0, @param1, ... placeholders with the optional parameters list."
            }
            ToolName::GetTableSchema => "Get the column definitions of a table",
            ToolName::ListTables => "List the base tables in the database",
            ToolName::GetDatabaseInfo => {
                "Get the SQL Server version, database name, server name and current server time"
            }
            ToolName::CreateView => {
                "Create a view. The view name is sanitized; the query is sent verbatim \
                 and must come from a trusted source."
            }
            ToolName::CreateStoredProcedure => {
                "Create a stored procedure. The procedure name is sanitized; the parameter \
                 declarations and body are sent verbatim and must come from a trusted source."
            }
            ToolName::ListViews => "List the views in the database with their definitions",
            ToolName::ListStoredProcedures => "List the stored procedures in the database",
        }
    }

    fn input_schema(&self) -> JsonObject {
        match self {
            ToolName::ExecuteSqlQuery => schema_object::<ExecuteSqlQueryInput>(),
            ToolName::GetTableSchema => schema_object::<GetTableSchemaInput>(),
            ToolName::CreateView => schema_object::<CreateViewInput>(),
            ToolName::CreateStoredProcedure => schema_object::<CreateStoredProcedureInput>(),
            ToolName::ListTables
            | ToolName::GetDatabaseInfo
            | ToolName::ListViews
            | ToolName::ListStoredProcedures => schema_object::<NoArguments>(),
        }
    }

    /// Protocol-level tool definition.
    pub fn to_tool(&self) -> Tool {
        Tool::new(self.as_str(), self.description(), Arc::new(self.input_schema()))
    }
}

impl fmt::Display for ToolName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ToolName {
    type Err = ServerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ToolName::ALL
            .into_iter()
            .find(|tool| tool.as_str() == s)
            .ok_or_else(|| ServerError::unknown_tool(s))
    }
}

fn schema_object<T: JsonSchema>() -> JsonObject {
    match serde_json::to_value(schemars::schema_for!(T)) {
        Ok(Value::Object(mut map)) => {
            map.remove("$schema");
            map
        }
        _ => JsonObject::new(),
    }
}

// =========================================================================
// Results
// =========================================================================

/// Outcome of one tool call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolResult {
    pub text: String,
    pub is_error: bool,
}

impl ToolResult {
    pub fn success(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_error: false,
        }
    }

    /// `Error: <message>`, followed by a hint when one is known.
    pub fn error(err: &ServerError) -> Self {
        let text = match err.suggestion() {
            Some(hint) => format!("Error: {}\n\nSuggestion: {}", err, hint),
            None => format!("Error: {}", err),
        };
        Self {
            text,
            is_error: true,
        }
    }

    pub fn into_call_result(self) -> CallToolResult {
        let content = vec![Content::text(self.text)];
        if self.is_error {
            CallToolResult::error(content)
        } else {
            CallToolResult::success(content)
        }
    }
}

// =========================================================================
// Dispatcher
// =========================================================================

/// Maps tool calls onto SQL and formats the outcome.
#[derive(Clone)]
pub struct ToolDispatcher {
    executor: Arc<dyn SqlExecutor>,
}

impl ToolDispatcher {
    pub fn new(executor: Arc<dyn SqlExecutor>) -> Self {
        Self { executor }
    }

    /// Definitions of every tool, with generated input schemas.
    pub fn catalog(&self) -> Vec<Tool> {
        ToolName::ALL.iter().map(ToolName::to_tool).collect()
    }

    /// Run a tool. Never fails; errors become error results.
    pub async fn invoke(&self, name: &str, arguments: Option<JsonObject>) -> ToolResult {
        match self.dispatch(name, arguments).await {
            Ok(text) => ToolResult::success(text),
            Err(e) => {
                warn!(tool = name, "Tool call failed: {}", e);
                ToolResult::error(&e)
            }
        }
    }

    async fn dispatch(&self, name: &str, arguments: Option<JsonObject>) -> Result<String, ServerError> {
        let tool: ToolName = name.parse()?;
        info!(tool = tool.as_str(), "Tool call");

        match tool {
            ToolName::ExecuteSqlQuery => {
                let input: ExecuteSqlQueryInput = parse_arguments(arguments)?;
                let params = input.parameters.unwrap_or_default();
                let rows = self.executor.execute_query(&input.query, &params).await?;
                format_rows(&rows)
            }

            ToolName::GetTableSchema => {
                let input: GetTableSchemaInput = parse_arguments(arguments)?;
                let rows = self
                    .executor
                    .execute_query(TABLE_SCHEMA_SQL, &[SqlParam::Text(input.table_name)])
                    .await?;
                format_rows(&rows)
            }

            ToolName::ListTables => self.read_only(LIST_TABLES_SQL).await,
            ToolName::GetDatabaseInfo => self.read_only(DATABASE_INFO_SQL).await,
            ToolName::ListViews => self.read_only(LIST_VIEWS_SQL).await,
            ToolName::ListStoredProcedures => self.read_only(LIST_PROCEDURES_SQL).await,

            ToolName::CreateView => {
                let input: CreateViewInput = parse_arguments(arguments)?;
                let name = sanitized_object_name("view_name", &input.view_name)?;
                let statements =
                    create_view_statements(&name, &input.query, input.replace_if_exists);
                self.executor.execute_batch(&statements).await?;
                info!("Created view {}", name);
                Ok(format!("View '{}' created successfully.", name))
            }

            ToolName::CreateStoredProcedure => {
                let input: CreateStoredProcedureInput = parse_arguments(arguments)?;
                let name = sanitized_object_name("procedure_name", &input.procedure_name)?;
                let statements = create_procedure_statements(
                    &name,
                    input.parameters.as_deref(),
                    &input.body,
                    input.replace_if_exists,
                );
                self.executor.execute_batch(&statements).await?;
                info!("Created stored procedure {}", name);
                Ok(format!("Stored procedure '{}' created successfully.", name))
            }
        }
    }

    async fn read_only(&self, sql: &str) -> Result<String, ServerError> {
        let rows = self.executor.execute_query(sql, &[]).await?;
        format_rows(&rows)
    }
}

fn parse_arguments<T: DeserializeOwned>(arguments: Option<JsonObject>) -> Result<T, ServerError> {
    let value = Value::Object(arguments.unwrap_or_default());
    serde_json::from_value(value).map_err(|e| ServerError::validation(e.to_string()))
}

fn format_rows(rows: &[ResultRow]) -> Result<String, ServerError> {
    debug!("Formatting {} rows", rows.len());
    serde_json::to_string_pretty(rows)
        .map_err(|e| ServerError::internal(format!("Failed to serialize rows: {}", e)))
}
