//! Agent system for code-agent.
//!
//! This module provides:
//! - [`PhaseAgent`] trait describing the agent behind each pipeline phase
//! - Built-in agents (Researcher, Planner, Detail Planner, Coder)
//! - [`AgentRunner`] and the `claude` CLI runner that executes them

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

mod base;
mod builtin;
mod executor;

pub use base::{BoxedAgent, PhaseAgent};
pub use builtin::*;
pub use executor::{
    AgentRunner, ClaudeCliRunner, ExecutorError, RawStreamReceiver, RunRequest,
    DEFAULT_CLAUDE_BIN,
};

/// How the external agent handles tool permission prompts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PermissionMode {
    /// Ask for anything not explicitly allowed
    Default,
    /// Accept file edits without asking
    AcceptEdits,
    /// Never ask
    #[default]
    BypassPermissions,
    /// Plan only, no changes
    Plan,
}

impl PermissionMode {
    /// The value passed to `--permission-mode`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::AcceptEdits => "acceptEdits",
            Self::BypassPermissions => "bypassPermissions",
            Self::Plan => "plan",
        }
    }
}

impl fmt::Display for PermissionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PermissionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(['-', '_'], "");
        match normalized.as_str() {
            "default" => Ok(Self::Default),
            "acceptedits" => Ok(Self::AcceptEdits),
            "bypasspermissions" | "bypass" => Ok(Self::BypassPermissions),
            "plan" => Ok(Self::Plan),
            _ => Err(format!("invalid permission mode: {s}")),
        }
    }
}
