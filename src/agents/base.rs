//! Base agent trait.

use std::path::Path;

use super::PermissionMode;

/// Trait for the agents that run one pipeline phase each.
pub trait PhaseAgent: Send + Sync {
    /// Unique identifier for the agent (e.g., "researcher", "coder").
    fn name(&self) -> &str;

    /// Human-readable display name (e.g., "Coder Agent").
    fn display_name(&self) -> &str;

    /// Brief description of what this agent does.
    fn description(&self) -> &str;

    /// System prompt appended to the external agent's own.
    fn system_prompt(&self) -> String;

    /// Tools the external agent may use without asking.
    fn allowed_tools(&self) -> Vec<&str>;

    fn permission_mode(&self) -> PermissionMode {
        PermissionMode::BypassPermissions
    }

    /// Where the agent's final output is saved, relative to the working directory.
    fn artifact(&self) -> &str;

    /// The user prompt for one run.
    fn task_prompt(&self, task: &str, working_dir: &Path) -> String;

    /// Optional model override (if agent requires a specific model).
    fn model_override(&self) -> Option<&str> {
        None
    }
}

/// Boxed agent for dynamic dispatch.
pub type BoxedAgent = Box<dyn PhaseAgent>;
