//! Coder Agent - Implements the detailed plans.

use std::path::Path;

use crate::agents::{PermissionMode, PhaseAgent};

/// Coder Agent - Writes the code, part by part 💻
pub struct CoderAgent;

impl PhaseAgent for CoderAgent {
    fn name(&self) -> &str {
        "coder"
    }

    fn display_name(&self) -> &str {
        "Coder Agent 💻"
    }

    fn description(&self) -> &str {
        "Expert software engineer that implements code based on plans"
    }

    fn system_prompt(&self) -> String {
        include_str!("prompts/coder.md").to_string()
    }

    fn allowed_tools(&self) -> Vec<&str> {
        vec!["Read", "Write", "Edit", "Glob", "Grep", "Bash", "Task"]
    }

    fn permission_mode(&self) -> PermissionMode {
        PermissionMode::AcceptEdits
    }

    fn artifact(&self) -> &str {
        "implementation/summary.md"
    }

    fn task_prompt(&self, task: &str, working_dir: &Path) -> String {
        format!(
            "Implement this coding task by following the detailed plans.\n\n\
             Task: {}\n\n\
             Working directory: {}\n\n\
             IMPORTANT: First, read the detailed plans:\n\
             1. Read \"detail_plans/TODO.md\" for the ordered checklist\n\
             2. Read each part file in \"detail_plans/\" as you reach it\n\n\
             If detail_plans/ is missing, follow \"plans/plan.md\" instead.\n\
             Implement every part, run the tests, and finish with the JSON report \
             described in your instructions.",
            task,
            working_dir.display()
        )
    }
}
