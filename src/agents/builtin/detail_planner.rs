//! Detail Planner Agent - Splits a plan into small TDD parts.

use std::path::Path;

use crate::agents::PhaseAgent;

/// Detail Planner Agent - Writes one reviewable part per file 🧩
pub struct DetailPlannerAgent;

impl PhaseAgent for DetailPlannerAgent {
    fn name(&self) -> &str {
        "detail_planner"
    }

    fn display_name(&self) -> &str {
        "Detail Planner Agent 🧩"
    }

    fn description(&self) -> &str {
        "Breaks an implementation plan into small, self-contained parts with a TDD checklist"
    }

    fn system_prompt(&self) -> String {
        include_str!("prompts/detail_planner.md").to_string()
    }

    fn allowed_tools(&self) -> Vec<&str> {
        vec!["Read", "Write", "Glob", "Grep", "Task"]
    }

    fn artifact(&self) -> &str {
        "detail_plans/detail_plan.md"
    }

    fn task_prompt(&self, task: &str, working_dir: &Path) -> String {
        format!(
            "Break the implementation plan into small, self-contained parts.\n\n\
             Task: {}\n\n\
             Working directory: {}\n\n\
             IMPORTANT: First, read the plan:\n\
             1. Read \"plans/plan.md\"\n\n\
             Then explore the codebase as needed and produce the detailed parts.\n\
             Write each part as a separate markdown file in the detail_plans/ directory.\n\
             Also write a TODO.md checklist file in the same directory.",
            task,
            working_dir.display()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detail_planner_basics() {
        let agent = DetailPlannerAgent;
        assert_eq!(agent.name(), "detail_planner");
        assert_eq!(agent.artifact(), "detail_plans/detail_plan.md");
    }

    #[test]
    fn test_detail_planner_writes_parts() {
        assert!(DetailPlannerAgent.allowed_tools().contains(&"Write"));
        let prompt = DetailPlannerAgent.task_prompt("task", Path::new("."));
        assert!(prompt.contains("plans/plan.md"));
        assert!(prompt.contains("TODO.md"));
        assert!(DetailPlannerAgent.system_prompt().contains("01_<slug>.md"));
    }
}
