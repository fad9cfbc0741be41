//! Researcher Agent - Requirements analysis and technical research.

use std::path::Path;

use crate::agents::PhaseAgent;

/// Researcher Agent - Understands the task before anything is planned 🔍
pub struct ResearcherAgent;

impl PhaseAgent for ResearcherAgent {
    fn name(&self) -> &str {
        "researcher"
    }

    fn display_name(&self) -> &str {
        "Researcher Agent 🔍"
    }

    fn description(&self) -> &str {
        "Expert requirements analyst that researches and understands requirements before planning"
    }

    fn system_prompt(&self) -> String {
        include_str!("prompts/researcher.md").to_string()
    }

    fn allowed_tools(&self) -> Vec<&str> {
        vec!["Read", "Glob", "Grep", "Task", "WebFetch", "WebSearch"]
    }

    fn artifact(&self) -> &str {
        "research/research.md"
    }

    fn task_prompt(&self, task: &str, working_dir: &Path) -> String {
        format!(
            "Research and analyze the requirements for this coding task.\n\n\
             Task: {}\n\n\
             Working directory: {}\n\n\
             Follow these steps:\n\
             1. Analyze and break down all requirements step by step\n\
             2. Create a research agenda\n\
             3. Research the codebase and gather technical context\n\
             4. Use web search for unfamiliar technologies or APIs\n\
             5. Synthesize findings and provide recommendations\n\n\
             Output your research in markdown format.",
            task,
            working_dir.display()
        )
    }

    fn model_override(&self) -> Option<&str> {
        Some("opus")
    }
}
