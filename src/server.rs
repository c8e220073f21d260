//! MCP server struct definition and initialization.

use crate::config::Config;
use crate::database::SqlExecutor;
use crate::tools::ToolDispatcher;
use std::sync::Arc;

/// The Azure SQL MCP Server instance.
///
/// Cheap to clone; the dispatcher and configuration are shared via Arc.
#[derive(Clone)]
pub struct AzureSqlMcpServer {
    /// Tool dispatcher backed by the connection manager.
    pub(crate) dispatcher: Arc<ToolDispatcher>,

    /// Configuration.
    pub(crate) config: Arc<Config>,
}

impl AzureSqlMcpServer {
    /// Create a server that runs its SQL through `executor`.
    pub fn new(config: Config, executor: Arc<dyn SqlExecutor>) -> Self {
        Self {
            dispatcher: Arc::new(ToolDispatcher::new(executor)),
            config: Arc::new(config),
        }
    }

    /// Get a reference to the configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get a reference to the tool dispatcher.
    pub fn dispatcher(&self) -> &ToolDispatcher {
        &self.dispatcher
    }

    /// Configured database name, if any.
    pub fn current_database(&self) -> Option<&str> {
        self.config.database.database.as_deref()
    }

    /// Whether both server and database are configured.
    pub fn is_configured(&self) -> bool {
        self.config.database.target().is_ok()
    }
}
