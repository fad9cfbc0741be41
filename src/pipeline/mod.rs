//! The research → planning → detail planning → implementation pipeline.
//!
//! ```text
//! TaskInput ──► Orchestrator ──► AgentRunner (one run per phase)
//!                    │                 │
//!                    │           RawStreamReceiver
//!                    │                 ▼
//!                    └──────── MessageProcessor ──► StreamHandler ──► subscribers
//! ```
//!
//! Each phase's final text is saved under the working directory for the
//! next phase to read.

mod cancel;
mod code_result;
mod orchestrator;
mod task;

pub use cancel::CancelToken;
pub use code_result::CodeResult;
pub use orchestrator::{Orchestrator, PhaseOutcome, PipelineError, TaskResult, PIPELINE_AGENT};
pub use task::{GithubIssue, TaskInput, TaskInputError};
