//! Planner Agent - Strategic task breakdown.

use std::path::Path;

use crate::agents::PhaseAgent;

/// Planner Agent - Turns research into an implementation plan 📋
pub struct PlannerAgent;

impl PhaseAgent for PlannerAgent {
    fn name(&self) -> &str {
        "planner"
    }

    fn display_name(&self) -> &str {
        "Planner Agent 📋"
    }

    fn description(&self) -> &str {
        "Expert software architect that analyzes requirements and creates detailed implementation plans"
    }

    fn system_prompt(&self) -> String {
        include_str!("prompts/planner.md").to_string()
    }

    fn allowed_tools(&self) -> Vec<&str> {
        vec!["Read", "Glob", "Grep", "Task"]
    }

    fn artifact(&self) -> &str {
        "plans/plan.md"
    }

    fn task_prompt(&self, task: &str, working_dir: &Path) -> String {
        format!(
            "Create a detailed implementation plan for this coding task.\n\n\
             Task: {}\n\n\
             Working directory: {}\n\n\
             IMPORTANT: First, read the research materials:\n\
             1. Read \"research/research.md\" for research findings\n\n\
             The research contains:\n\
             - Original requirements\n\
             - Requirements analysis\n\
             - Technical context about the existing codebase\n\
             - Recommendations from the researcher\n\n\
             Based on the research findings, create a comprehensive implementation plan.\n\
             If additional exploration is needed, use the available tools.\n\
             Output your plan in markdown format.",
            task,
            working_dir.display()
        )
    }
}
