//! End-to-end dispatch tests without a database.
//!
//! The real `ConnectionManager` and `ToolDispatcher` are wired to a scripted
//! connector that records every statement, counts token requests and
//! handshakes, and can simulate server errors and dropped links.

use async_trait::async_trait;
use azure_sql_mcp_server::database::{
    ConnectionManager, Connector, DbConnection, ResultRow, SqlParam,
};
use azure_sql_mcp_server::tools::ToolDispatcher;
use azure_sql_mcp_server::ServerError;
use serde_json::{json, Map, Value};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct Script {
    statements: Mutex<Vec<(String, Vec<SqlParam>)>>,
    tokens: AtomicUsize,
    opens: AtomicUsize,
    fail_token: AtomicBool,
    link: Mutex<Option<Arc<AtomicBool>>>,
}

impl Script {
    fn statements(&self) -> Vec<(String, Vec<SqlParam>)> {
        self.statements.lock().unwrap().clone()
    }

    fn tokens(&self) -> usize {
        self.tokens.load(Ordering::SeqCst)
    }

    fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    fn drop_link(&self) {
        if let Some(link) = self.link.lock().unwrap().as_ref() {
            link.store(false, Ordering::SeqCst);
        }
    }
}

struct ScriptedConnector {
    script: Arc<Script>,
}

struct ScriptedConnection {
    script: Arc<Script>,
    link: Arc<AtomicBool>,
}

#[async_trait]
impl DbConnection for ScriptedConnection {
    fn is_connected(&self) -> bool {
        self.link.load(Ordering::SeqCst)
    }

    async fn query(&mut self, sql: &str, params: &[SqlParam]) -> Result<Vec<ResultRow>, ServerError> {
        self.script
            .statements
            .lock()
            .unwrap()
            .push((sql.to_string(), params.to_vec()));

        if sql.contains("NoSuchTable") {
            return Err(ServerError::query_error_with_code(
                "Invalid object name 'NoSuchTable'.",
                208,
            ));
        }

        let row = if sql.trim() == "SELECT 1 as test" {
            json!({"test": 1})
        } else {
            json!({"ok": true})
        };
        Ok(vec![row.as_object().cloned().unwrap_or_default()])
    }

    async fn close(&mut self) -> Result<(), ServerError> {
        self.link.store(false, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl Connector for ScriptedConnector {
    type Connection = ScriptedConnection;

    async fn access_token(&self) -> Result<String, ServerError> {
        self.script.tokens.fetch_add(1, Ordering::SeqCst);
        if self.script.fail_token.load(Ordering::SeqCst) {
            return Err(ServerError::credential("DefaultAzureCredential found no identity"));
        }
        Ok("token".to_string())
    }

    async fn open(&self, token: String) -> Result<ScriptedConnection, ServerError> {
        assert_eq!(token, "token");
        self.script.opens.fetch_add(1, Ordering::SeqCst);
        let link = Arc::new(AtomicBool::new(true));
        *self.script.link.lock().unwrap() = Some(link.clone());
        Ok(ScriptedConnection {
            script: self.script.clone(),
            link,
        })
    }
}

fn setup() -> (ToolDispatcher, Arc<Script>) {
    let script = Arc::new(Script::default());
    let manager = ConnectionManager::new(ScriptedConnector {
        script: script.clone(),
    });
    (ToolDispatcher::new(Arc::new(manager)), script)
}

fn args(value: Value) -> Option<Map<String, Value>> {
    value.as_object().cloned()
}

// =============================================================================
// Connection lifecycle through the dispatcher
// =============================================================================

#[tokio::test]
async fn test_first_query_acquires_one_token_then_reuses() {
    let (dispatcher, script) = setup();

    let result = dispatcher
        .invoke("execute_sql_query", args(json!({"query": "SELECT 1 as test"})))
        .await;
    assert!(!result.is_error);
    assert_eq!(serde_json::from_str::<Value>(&result.text).unwrap(), json!([{"test": 1}]));
    assert_eq!((script.tokens(), script.opens()), (1, 1));

    dispatcher.invoke("list_tables", None).await;
    assert_eq!((script.tokens(), script.opens()), (1, 1));
}

#[tokio::test]
async fn test_dropped_link_triggers_fresh_token_and_connection() {
    let (dispatcher, script) = setup();

    dispatcher.invoke("list_views", None).await;
    script.drop_link();
    dispatcher.invoke("list_views", None).await;

    assert_eq!((script.tokens(), script.opens()), (2, 2));
}

#[tokio::test]
async fn test_server_error_is_result_and_connection_survives() {
    let (dispatcher, script) = setup();

    let result = dispatcher
        .invoke("execute_sql_query", args(json!({"query": "SELECT * FROM NoSuchTable"})))
        .await;
    assert!(result.is_error);
    assert_eq!(result.text, "Error: Invalid object name 'NoSuchTable'.");

    let result = dispatcher
        .invoke("execute_sql_query", args(json!({"query": "SELECT 1 as test"})))
        .await;
    assert!(!result.is_error);
    assert_eq!(script.opens(), 1);
}

#[tokio::test]
async fn test_credential_failure_is_result() {
    let (dispatcher, script) = setup();
    script.fail_token.store(true, Ordering::SeqCst);

    let result = dispatcher.invoke("get_database_info", None).await;
    assert!(result.is_error);
    assert!(result.text.starts_with("Error: Credential error:"));
    assert_eq!(script.opens(), 0);

    // Nothing was cached, so the next call tries again from scratch
    script.fail_token.store(false, Ordering::SeqCst);
    let result = dispatcher.invoke("get_database_info", None).await;
    assert!(!result.is_error);
    assert_eq!(script.tokens(), 2);
}

// =============================================================================
// Tool contract
// =============================================================================

#[tokio::test]
async fn test_get_table_schema_binds_table_name() {
    let (dispatcher, script) = setup();

    let result = dispatcher
        .invoke("get_table_schema", args(json!({"table_name": "TestEmployees"})))
        .await;
    assert!(!result.is_error);

    let statements = script.statements();
    assert_eq!(statements.len(), 1);
    let (sql, params) = &statements[0];
    assert!(sql.contains("INFORMATION_SCHEMA.COLUMNS"));
    assert!(sql.contains("WHERE TABLE_NAME = @param0"));
    assert!(sql.trim_end().ends_with("ORDER BY ORDINAL_POSITION"));
    assert!(!sql.contains("TestEmployees"));
    assert_eq!(params, &vec![SqlParam::Text("TestEmployees".to_string())]);
}

#[tokio::test]
async fn test_no_argument_tools_accept_empty_object() {
    let (dispatcher, script) = setup();

    for name in ["list_tables", "get_database_info", "list_views", "list_stored_procedures"] {
        let result = dispatcher.invoke(name, args(json!({}))).await;
        assert!(!result.is_error, "{}: {}", name, result.text);
    }

    let statements = script.statements();
    assert!(statements[0].0.contains("TABLE_TYPE = 'BASE TABLE'"));
    assert!(statements[1].0.contains("@@VERSION AS sql_version"));
    assert!(statements[2].0.contains("INFORMATION_SCHEMA.VIEWS"));
    assert!(statements[3].0.contains("ROUTINE_TYPE = 'PROCEDURE'"));
    assert!(statements.iter().all(|(_, params)| params.is_empty()));
}

#[tokio::test]
async fn test_view_name_is_sanitized() {
    let (dispatcher, script) = setup();

    let result = dispatcher
        .invoke(
            "create_view",
            args(json!({"view_name": "my view; DROP TABLE x", "query": "SELECT 1 AS one"})),
        )
        .await;
    assert_eq!(result.text, "View 'myviewDROPTABLEx' created successfully.");

    let statements = script.statements();
    assert_eq!(statements.len(), 1);
    assert_eq!(statements[0].0, "CREATE VIEW myviewDROPTABLEx AS SELECT 1 AS one");
}

#[tokio::test]
async fn test_create_view_replace_drops_first() {
    let (dispatcher, script) = setup();

    let result = dispatcher
        .invoke(
            "create_view",
            args(json!({
                "view_name": "vw_Sales",
                "query": "SELECT 1 AS one",
                "replace_if_exists": true
            })),
        )
        .await;
    assert!(!result.is_error);

    let sql: Vec<String> = script.statements().into_iter().map(|(s, _)| s).collect();
    assert_eq!(
        sql,
        vec![
            "IF OBJECT_ID('vw_Sales', 'V') IS NOT NULL DROP VIEW vw_Sales".to_string(),
            "CREATE VIEW vw_Sales AS SELECT 1 AS one".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_create_stored_procedure() {
    let (dispatcher, script) = setup();

    let result = dispatcher
        .invoke(
            "create_stored_procedure",
            args(json!({
                "procedure_name": "sp-Report!",
                "parameters": "@Year INT",
                "body": "SELECT @Year AS year",
                "replace_if_exists": true
            })),
        )
        .await;
    assert_eq!(result.text, "Stored procedure 'spReport' created successfully.");

    let sql: Vec<String> = script.statements().into_iter().map(|(s, _)| s).collect();
    assert_eq!(sql[0], "IF OBJECT_ID('spReport', 'P') IS NOT NULL DROP PROCEDURE spReport");
    assert_eq!(
        sql[1],
        "CREATE PROCEDURE spReport\n@Year INT\nAS\nBEGIN\nSELECT @Year AS year\nEND"
    );
}

#[tokio::test]
async fn test_unknown_tool_names_tool() {
    let (dispatcher, script) = setup();

    let result = dispatcher.invoke("truncate_everything", None).await;
    assert!(result.is_error);
    assert_eq!(result.text, "Error: Unknown tool: truncate_everything");
    assert_eq!(script.tokens(), 0);
}

#[tokio::test]
async fn test_invalid_arguments_never_reach_database() {
    let (dispatcher, script) = setup();

    let cases = [
        ("execute_sql_query", json!({})),
        ("execute_sql_query", json!({"query": "SELECT 1", "parameters": [[1, 2]]})),
        ("get_table_schema", json!({"table_name": 42})),
        ("create_view", json!({"view_name": "v"})),
        ("create_view", json!({"view_name": "!!!", "query": "SELECT 1"})),
        ("create_stored_procedure", json!({"procedure_name": "p"})),
    ];

    for (name, arguments) in cases {
        let result = dispatcher.invoke(name, args(arguments.clone())).await;
        assert!(result.is_error, "{} accepted {}", name, arguments);
        assert!(result.text.starts_with("Error: Invalid arguments:"), "{}", result.text);
    }

    assert_eq!(script.tokens(), 0);
    assert!(script.statements().is_empty());
}

#[tokio::test]
async fn test_catalog_matches_dispatch() {
    let (dispatcher, _script) = setup();

    for tool in dispatcher.catalog() {
        assert!(tool.description.is_some());
        let result = dispatcher.invoke(&tool.name, None).await;
        assert!(
            !result.text.starts_with("Error: Unknown tool"),
            "{} listed but not dispatched",
            tool.name
        );
    }
}
