//! # Azure SQL MCP Server
//!
//! A Model Context Protocol (MCP) server that gives AI agents access to an
//! Azure SQL Database.
//!
//! This crate provides eight tools: run a query, describe a table, list
//! tables, views and stored procedures, report database info, and create
//! views and stored procedures.
//!
//! ## Architecture
//!
//! - [`database::ConnectionManager`] owns the credential flow and the single
//!   cached connection
//! - [`tools::ToolDispatcher`] maps tool calls onto SQL through the
//!   [`database::SqlExecutor`] trait
//! - [`AzureSqlMcpServer`] adapts the dispatcher to the MCP protocol

pub mod config;
pub mod constants;
pub mod database;
pub mod diagnostics;
pub mod error;
pub mod handlers;
pub mod security;
pub mod server;
pub mod shutdown;
pub mod tools;

pub use config::Config;
pub use error::ServerError;
pub use server::AzureSqlMcpServer;
