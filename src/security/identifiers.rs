//! Object-name sanitization for DDL statements.
//!
//! `CREATE VIEW` and `CREATE PROCEDURE` cannot bind their object name as a
//! parameter, so the name is spliced into the statement text. Only ASCII
//! letters, digits and underscores survive.
//!
//! This protects the name slot only. View queries, procedure parameter lists
//! and procedure bodies are sent verbatim and must come from a trusted caller.

use crate::error::ServerError;

/// Maximum length for SQL Server identifiers.
pub const MAX_IDENTIFIER_LENGTH: usize = 128;

/// Strip every character that is not `[A-Za-z0-9_]`.
///
/// # Examples
///
/// ```
/// use azure_sql_mcp_server::security::sanitize_identifier;
///
/// assert_eq!(sanitize_identifier("vw_Sales2024"), "vw_Sales2024");
/// assert_eq!(sanitize_identifier("my view; DROP TABLE x"), "myviewDROPTABLEx");
/// ```
pub fn sanitize_identifier(identifier: &str) -> String {
    identifier
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect()
}

/// Sanitize an object name and reject results SQL Server cannot accept.
///
/// `kind` names the argument in the error message (e.g. `view_name`).
pub fn sanitized_object_name(kind: &str, identifier: &str) -> Result<String, ServerError> {
    let clean = sanitize_identifier(identifier);

    if clean.is_empty() {
        return Err(ServerError::validation(format!(
            "{} '{}' contains no usable characters (allowed: A-Z, a-z, 0-9, _)",
            kind, identifier
        )));
    }

    if clean.len() > MAX_IDENTIFIER_LENGTH {
        return Err(ServerError::validation(format!(
            "{} exceeds maximum length of {} characters",
            kind, MAX_IDENTIFIER_LENGTH
        )));
    }

    Ok(clean)
}
