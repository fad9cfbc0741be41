//! Agent executor - runs agents as external processes.
//!
//! The pipeline never talks to a model directly. It hands a [`RunRequest`]
//! to an [`AgentRunner`] and reads back the agent's raw `stream-json`
//! messages through a [`RawStreamReceiver`].
//!
//! ## Submodules
//! - `claude`: Runner backed by the `claude` CLI
//! - `types`: Requests, the stream receiver and errors

mod claude;
mod types;

pub use claude::{ClaudeCliRunner, DEFAULT_CLAUDE_BIN};
pub use types::{ExecutorError, RawStreamReceiver, RunRequest};

use async_trait::async_trait;

/// Starts agent runs.
///
/// Implementations spawn the run and return immediately; messages arrive on
/// the receiver until the run ends. Dropping the receiver must stop the run.
#[async_trait]
pub trait AgentRunner: Send + Sync {
    async fn start(&self, request: RunRequest) -> Result<RawStreamReceiver, ExecutorError>;
}
