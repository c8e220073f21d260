//! Tool input types with JSON Schema generation.

use crate::database::SqlParam;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

// =========================================================================
// Query Inputs
// =========================================================================

/// Input for the `execute_sql_query` tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ExecuteSqlQueryInput {
    /// The SQL query to execute.
    #[schemars(description = "SQL query to execute. Reference parameters as @param0, @param1, ...")]
    pub query: String,

    /// Positional parameter values.
    #[serde(default)]
    #[schemars(
        description = "Optional ordered parameter values (strings, numbers, booleans or null) bound to @param0, @param1, ..."
    )]
    pub parameters: Option<Vec<SqlParam>>,
}

/// Input for the `get_table_schema` tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GetTableSchemaInput {
    /// Name of the table to describe.
    #[schemars(description = "Name of the table whose columns to return")]
    pub table_name: String,
}

/// Input for tools that take no arguments.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct NoArguments {}

// =========================================================================
// DDL Inputs
// =========================================================================

/// Input for the `create_view` tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CreateViewInput {
    /// Name of the view to create.
    #[schemars(description = "Name of the view (only letters, digits and underscores are kept)")]
    pub view_name: String,

    /// SELECT statement the view is defined by.
    #[schemars(description = "SELECT statement defining the view. Sent to the server verbatim")]
    pub query: String,

    /// Drop an existing view of the same name first.
    #[serde(default)]
    #[schemars(description = "Replace the view if it already exists (default: false)")]
    pub replace_if_exists: bool,
}

/// Input for the `create_stored_procedure` tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CreateStoredProcedureInput {
    /// Name of the procedure to create.
    #[schemars(
        description = "Name of the stored procedure (only letters, digits and underscores are kept)"
    )]
    pub procedure_name: String,

    /// Parameter declarations, e.g. `@id INT, @name NVARCHAR(50)`.
    #[serde(default)]
    #[schemars(
        description = "Optional parameter declarations, e.g. '@param1 INT, @param2 VARCHAR(50)'. Sent verbatim"
    )]
    pub parameters: Option<String>,

    /// Procedure body placed between BEGIN and END.
    #[schemars(description = "Body of the stored procedure (SQL statements). Sent verbatim")]
    pub body: String,

    /// Drop an existing procedure of the same name first.
    #[serde(default)]
    #[schemars(description = "Replace the procedure if it already exists (default: false)")]
    pub replace_if_exists: bool,
}
