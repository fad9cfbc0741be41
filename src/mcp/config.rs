//! MCP configuration file handling.
//!
//! Loads the project-level `.mcp.json` file and hands it to the external
//! agent through `--mcp-config`:
//!
//! ```json
//! {
//!   "mcpServers": {
//!     "github": {
//!       "command": "npx",
//!       "args": ["-y", "@modelcontextprotocol/server-github"],
//!       "env": {"GITHUB_PERSONAL_ACCESS_TOKEN": "${GITHUB_TOKEN}"}
//!     },
//!     "docs": {
//!       "type": "http",
//!       "url": "https://example.com/mcp",
//!       "headers": {"Authorization": "Bearer ${DOCS_TOKEN}"}
//!     }
//!   }
//! }
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use thiserror::Error;

/// File name looked up in the working directory.
pub const MCP_CONFIG_FILE: &str = ".mcp.json";

static ENV_VAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([^}]+)\}").expect("valid env var pattern"));

/// Error type for MCP configuration operations.
#[derive(Debug, Error)]
pub enum McpConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] serde_json::Error),

    #[error("Config file not found: {0}")]
    NotFound(PathBuf),
}

/// MCP server entry in the configuration file.
///
/// Stdio servers use `command`/`args`/`env`; remote servers use
/// `type`/`url`/`headers`. Unknown keys are carried through untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct McpServerEntry {
    /// Transport (`stdio`, `http`, `sse`).
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub transport: Option<String>,

    /// Command to run the MCP server.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,

    /// Arguments to pass to the command.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,

    /// Environment variables to set.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// HTTP headers for remote servers.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl McpServerEntry {
    /// Expand environment variables in the config.
    ///
    /// Replaces `${VAR_NAME}` patterns in `args`, `env` values and `headers`
    /// values with the current environment; unset variables become empty.
    pub fn expand_env_vars(&mut self) {
        for arg in &mut self.args {
            *arg = expand_env_var(arg);
        }
        for value in self.env.values_mut() {
            *value = expand_env_var(value);
        }
        for value in self.headers.values_mut() {
            *value = expand_env_var(value);
        }
    }
}

/// Expand environment variables in a string.
///
/// Supports `${VAR_NAME}` syntax.
fn expand_env_var(s: &str) -> String {
    if !s.contains("${") {
        return s.to_string();
    }
    ENV_VAR
        .replace_all(s, |caps: &Captures| std::env::var(&caps[1]).unwrap_or_default())
        .into_owned()
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct McpConfig {
    /// Map of server name to configuration.
    #[serde(rename = "mcpServers", default)]
    pub servers: BTreeMap<String, McpServerEntry>,
}

impl McpConfig {
    /// Create a new empty configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load `.mcp.json` from `dir`, or `None` when the project has none.
    pub fn load_from_dir(dir: &Path) -> Result<Option<Self>, McpConfigError> {
        match Self::load_from_path(&dir.join(MCP_CONFIG_FILE)) {
            Ok(config) => Ok(Some(config)),
            Err(McpConfigError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Load configuration from a specific path.
    pub fn load_from_path(path: &Path) -> Result<Self, McpConfigError> {
        if !path.exists() {
            return Err(McpConfigError::NotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        let mut config: McpConfig = serde_json::from_str(&content)?;

        // Expand environment variables in all entries
        for entry in config.servers.values_mut() {
            entry.expand_env_vars();
        }

        Ok(config)
    }

    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }

    /// The value passed to `--mcp-config`.
    pub fn to_cli_value(&self) -> Value {
        json!({ "mcpServers": self.servers })
    }
}

/// Entries are read from `.mcp.json`; these builders only set up fixtures.
#[cfg(test)]
impl McpServerEntry {
    fn new(command: impl Into<String>) -> Self {
        Self {
            command: Some(command.into()),
            ..Default::default()
        }
    }

    fn remote(transport: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            transport: Some(transport.into()),
            url: Some(url.into()),
            ..Default::default()
        }
    }

    fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    // =========================================================================
    // McpServerEntry Tests
    // =========================================================================

    #[test]
    fn test_server_entry_new() {
        let entry = McpServerEntry::new("npx");

        assert_eq!(entry.command.as_deref(), Some("npx"));
        assert!(entry.args.is_empty());
        assert!(entry.env.is_empty());
        assert!(entry.url.is_none());
    }

    #[test]
    fn test_server_entry_builder_chain() {
        let entry = McpServerEntry::new("npx")
            .with_args(vec!["-y".to_string(), "server".to_string()])
            .with_env("KEY", "value");

        assert_eq!(entry.args.len(), 2);
        assert_eq!(entry.env.get("KEY"), Some(&"value".to_string()));
    }

    #[test]
    fn test_remote_entry_serialization_skips_empty_fields() {
        let entry = McpServerEntry::remote("http", "https://example.com/mcp")
            .with_header("Authorization", "Bearer x");

        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "http",
                "url": "https://example.com/mcp",
                "headers": {"Authorization": "Bearer x"}
            })
        );
    }

    // =========================================================================
    // expand_env_var Tests
    // =========================================================================

    #[test]
    fn test_expand_env_var_simple() {
        std::env::set_var("CODE_AGENT_TEST_VAR_SIMPLE", "test_value");

        let result = expand_env_var("${CODE_AGENT_TEST_VAR_SIMPLE}");
        assert_eq!(result, "test_value");
    }

    #[test]
    fn test_expand_env_var_with_prefix_suffix() {
        std::env::set_var("CODE_AGENT_TEST_VAR_PS", "middle");

        let result = expand_env_var("prefix_${CODE_AGENT_TEST_VAR_PS}_suffix");
        assert_eq!(result, "prefix_middle_suffix");
    }

    #[test]
    fn test_expand_env_var_multiple() {
        std::env::set_var("CODE_AGENT_VAR_A", "aaa");
        std::env::set_var("CODE_AGENT_VAR_B", "bbb");

        let result = expand_env_var("${CODE_AGENT_VAR_A}/${CODE_AGENT_VAR_B}");
        assert_eq!(result, "aaa/bbb");
    }

    #[test]
    fn test_expand_env_var_nonexistent() {
        let result = expand_env_var("${NONEXISTENT_VAR_12345}");
        assert_eq!(result, "");
    }

    #[test]
    fn test_expand_env_var_no_vars() {
        assert_eq!(expand_env_var("no_variables_here"), "no_variables_here");
        assert_eq!(expand_env_var("$HOME"), "$HOME");
    }

    #[test]
    fn test_expand_env_var_unclosed_brace() {
        let result = expand_env_var("${UNCLOSED");
        assert_eq!(result, "${UNCLOSED");
    }

    #[test]
    fn test_expand_env_var_empty_var_name_untouched() {
        assert_eq!(expand_env_var("${}"), "${}");
    }

    #[test]
    fn test_server_entry_expand_env_vars() {
        std::env::set_var("CODE_AGENT_MCP_TOKEN", "secret123");

        let mut entry = McpServerEntry::new("cmd")
            .with_args(vec!["--token=${CODE_AGENT_MCP_TOKEN}".to_string()])
            .with_env("AUTH", "${CODE_AGENT_MCP_TOKEN}")
            .with_header("Authorization", "Bearer ${CODE_AGENT_MCP_TOKEN}");

        entry.expand_env_vars();

        assert_eq!(entry.args[0], "--token=secret123");
        assert_eq!(entry.env.get("AUTH"), Some(&"secret123".to_string()));
        assert_eq!(
            entry.headers.get("Authorization"),
            Some(&"Bearer secret123".to_string())
        );
    }

    // =========================================================================
    // McpConfig Tests
    // =========================================================================

    #[test]
    fn test_config_new_empty() {
        let config = McpConfig::new();
        assert!(config.is_empty());
    }

    #[test]
    fn test_load_from_path_not_found() {
        let result = McpConfig::load_from_path(Path::new("/nonexistent/.mcp.json"));
        assert!(matches!(result, Err(McpConfigError::NotFound(_))));
    }

    #[test]
    fn test_load_from_dir_without_file() {
        let temp = TempDir::new().unwrap();
        assert!(McpConfig::load_from_dir(temp.path()).unwrap().is_none());
    }

    #[test]
    fn test_load_from_dir_expands_and_keeps_unknown_keys() {
        std::env::set_var("CODE_AGENT_GH_TOKEN", "ghp_abc");
        let temp = TempDir::new().unwrap();
        fs::write(
            temp.path().join(MCP_CONFIG_FILE),
            r#"{
                "mcpServers": {
                    "github": {
                        "command": "npx",
                        "args": ["-y", "@modelcontextprotocol/server-github"],
                        "env": {"GITHUB_PERSONAL_ACCESS_TOKEN": "${CODE_AGENT_GH_TOKEN}"},
                        "timeout": 30
                    }
                },
                "otherTopLevel": true
            }"#,
        )
        .unwrap();

        let config = McpConfig::load_from_dir(temp.path()).unwrap().unwrap();
        let github = config.servers.get("github").unwrap();
        assert_eq!(
            github.env.get("GITHUB_PERSONAL_ACCESS_TOKEN"),
            Some(&"ghp_abc".to_string())
        );
        assert_eq!(github.extra.get("timeout"), Some(&json!(30)));

        let cli = config.to_cli_value();
        assert_eq!(cli["mcpServers"]["github"]["command"], "npx");
        assert_eq!(cli["mcpServers"]["github"]["timeout"], 30);
        assert!(cli.get("otherTopLevel").is_none());
    }

    #[test]
    fn test_load_invalid_json() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(MCP_CONFIG_FILE);
        fs::write(&path, "{ not json").unwrap();

        let result = McpConfig::load_from_path(&path);
        assert!(matches!(result, Err(McpConfigError::ParseError(_))));
        assert!(McpConfig::load_from_dir(temp.path()).is_err());
    }
}
