//! Model Context Protocol server configuration.
//!
//! Servers are declared per project in `.mcp.json` and passed through to the
//! external agent, which starts and talks to them itself.

mod config;

pub use config::{McpConfig, McpConfigError, McpServerEntry, MCP_CONFIG_FILE};
