//! Built-in agents, one per pipeline phase.

mod coder;
mod detail_planner;
mod planner;
mod researcher;

pub use coder::CoderAgent;
pub use detail_planner::DetailPlannerAgent;
pub use planner::PlannerAgent;
pub use researcher::ResearcherAgent;

use super::BoxedAgent;
use crate::messaging::Phase;

/// The agent that runs `phase`.
pub fn agent_for(phase: Phase) -> BoxedAgent {
    match phase {
        Phase::Research => Box::new(ResearcherAgent),
        Phase::Planning => Box::new(PlannerAgent),
        Phase::DetailPlanning => Box::new(DetailPlannerAgent),
        Phase::Implementation => Box::new(CoderAgent),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_agent_for_matches_phase_agent_name() {
        for phase in Phase::ALL {
            assert_eq!(agent_for(phase).name(), phase.agent_name());
        }
    }

    #[test]
    fn test_artifacts_are_distinct() {
        let artifacts: HashSet<String> = Phase::ALL
            .iter()
            .map(|p| agent_for(*p).artifact().to_string())
            .collect();
        assert_eq!(artifacts.len(), Phase::ALL.len());
    }
}
