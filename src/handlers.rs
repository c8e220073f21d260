//! ServerHandler implementation for the Azure SQL MCP Server.
//!
//! Tool routing is done by hand rather than with the rmcp tool router, so an
//! unknown tool name comes back as an error result instead of a protocol
//! error.

use crate::constants::SERVER_NAME;
use crate::server::AzureSqlMcpServer;
use rmcp::handler::server::ServerHandler;
use rmcp::model::{
    CallToolRequestParam, CallToolResult, Implementation, ListToolsResult, PaginatedRequestParam,
    ProtocolVersion, ServerCapabilities, ServerInfo,
};
use rmcp::service::{RequestContext, RoleServer};
use rmcp::ErrorData;
use tracing::{debug, info};

impl ServerHandler for AzureSqlMcpServer {
    /// Server identification - called during initialization handshake.
    fn get_info(&self) -> ServerInfo {
        info!("MCP client requesting server info");

        ServerInfo {
            protocol_version: ProtocolVersion::LATEST,

            capabilities: ServerCapabilities::builder().enable_tools().build(),

            server_info: Implementation {
                name: SERVER_NAME.to_string(),
                title: Some("Azure SQL MCP Server".to_string()),
                version: env!("CARGO_PKG_VERSION").to_string(),
                icons: None,
                website_url: None,
            },

            instructions: Some(build_instructions(self)),
        }
    }

    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, ErrorData> {
        let tools = self.dispatcher.catalog();
        debug!("Listing {} tools", tools.len());
        Ok(ListToolsResult::with_all_items(tools))
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, ErrorData> {
        let result = self
            .dispatcher
            .invoke(&request.name, request.arguments)
            .await;
        Ok(result.into_call_result())
    }
}

/// Build server instructions based on configuration.
fn build_instructions(server: &AzureSqlMcpServer) -> String {
    let mut instructions = String::new();

    instructions.push_str("# Azure SQL MCP Server\n\n");
    instructions.push_str("This server runs SQL against an Azure SQL Database.\n\n");

    match server.current_database() {
        Some(db) if server.is_configured() => {
            instructions.push_str(&format!("**Database:** `{}`\n\n", db));
        }
        _ => {
            instructions.push_str(
                "**Not configured:** set AZURE_SQL_SERVER and AZURE_SQL_DATABASE. \
                 Every tool call will fail until then.\n\n",
            );
        }
    }

    instructions.push_str("### Tools\n");
    instructions.push_str("- Explore with `list_tables`, `list_views`, `list_stored_procedures` and `get_table_schema`\n");
    instructions.push_str("- Run SQL with `execute_sql_query`; pass values as `parameters` and reference them as `@param0`, `@param1`, ...\n");
    instructions.push_str("- `create_view` and `create_stored_procedure` send the query or body verbatim\n");

    instructions
}
