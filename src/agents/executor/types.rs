//! Request, stream and error types for agent execution.
//!
//! Contains:
//! - `RunRequest`: Everything needed to start one agent run
//! - `RawStreamReceiver`: Wrapper for receiving raw agent messages
//! - `ExecutorError`: Error types for executor operations

use std::path::PathBuf;

use serde_json::Value;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::agents::{PermissionMode, PhaseAgent};
use crate::sdk::RawMessage;

/// One agent run.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub agent_name: String,
    /// The user prompt.
    pub prompt: String,
    pub system_prompt: String,
    pub allowed_tools: Vec<String>,
    pub permission_mode: PermissionMode,
    pub model: Option<String>,
    pub working_dir: PathBuf,
    pub session_id: String,
    /// Ask for partial `stream_event` messages.
    pub include_partial: bool,
    /// Contents for `--mcp-config`.
    pub mcp_config: Option<Value>,
}

impl RunRequest {
    /// Build a request from an agent definition.
    pub fn for_agent(
        agent: &dyn PhaseAgent,
        task: &str,
        working_dir: impl Into<PathBuf>,
        session_id: impl Into<String>,
    ) -> Self {
        let working_dir = working_dir.into();
        Self {
            agent_name: agent.name().to_string(),
            prompt: agent.task_prompt(task, &working_dir),
            system_prompt: agent.system_prompt(),
            allowed_tools: agent.allowed_tools().into_iter().map(String::from).collect(),
            permission_mode: agent.permission_mode(),
            model: agent.model_override().map(String::from),
            working_dir,
            session_id: session_id.into(),
            include_partial: false,
            mcp_config: None,
        }
    }

    pub fn with_model(mut self, model: Option<String>) -> Self {
        if model.is_some() {
            self.model = model;
        }
        self
    }

    pub fn with_partial_messages(mut self, include: bool) -> Self {
        self.include_partial = include;
        self
    }

    pub fn with_mcp_config(mut self, config: Option<Value>) -> Self {
        self.mcp_config = config;
        self
    }
}

/// Receiver for raw messages from a running agent.
///
/// This wraps an mpsc receiver and provides a convenient interface
/// for consuming the agent's output. Dropping it stops the run.
pub struct RawStreamReceiver {
    rx: mpsc::Receiver<Result<RawMessage, ExecutorError>>,
}

impl RawStreamReceiver {
    /// Create a new stream receiver from a channel.
    pub fn new(rx: mpsc::Receiver<Result<RawMessage, ExecutorError>>) -> Self {
        Self { rx }
    }

    /// Receive the next message from the stream.
    ///
    /// Returns `None` when the stream is complete.
    pub async fn recv(&mut self) -> Option<Result<RawMessage, ExecutorError>> {
        self.rx.recv().await
    }
}

/// Errors that can occur during agent execution.
#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("Agent binary not found: {0}")]
    BinaryNotFound(String),
    #[error("Spawn error: {0}")]
    Spawn(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Process error: {0}")]
    Process(String),
    #[error("Configuration error: {0}")]
    Config(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::CoderAgent;

    #[test]
    fn executor_error_display_binary() {
        let err = ExecutorError::BinaryNotFound("claude".into());
        assert_eq!(err.to_string(), "Agent binary not found: claude");
    }

    #[test]
    fn executor_error_display_process() {
        let err = ExecutorError::Process("exited with status 1".into());
        assert_eq!(err.to_string(), "Process error: exited with status 1");
    }

    #[test]
    fn executor_error_display_config() {
        let err = ExecutorError::Config("bad mcp config".into());
        assert_eq!(err.to_string(), "Configuration error: bad mcp config");
    }

    #[test]
    fn run_request_for_agent() {
        let request = RunRequest::for_agent(&CoderAgent, "Fix the bug", "/repo", "sess-1");

        assert_eq!(request.agent_name, "coder");
        assert_eq!(request.session_id, "sess-1");
        assert_eq!(request.working_dir, PathBuf::from("/repo"));
        assert_eq!(request.permission_mode, PermissionMode::AcceptEdits);
        assert!(request.prompt.contains("Fix the bug"));
        assert!(request.allowed_tools.contains(&"Edit".to_string()));
        assert!(!request.include_partial);
        assert!(request.model.is_none());
    }

    #[test]
    fn run_request_model_override_kept_without_cli_model() {
        let request = RunRequest::for_agent(&crate::agents::ResearcherAgent, "t", ".", "s")
            .with_model(None);
        assert_eq!(request.model.as_deref(), Some("opus"));

        let request = request.with_model(Some("sonnet".into()));
        assert_eq!(request.model.as_deref(), Some("sonnet"));
    }

    #[tokio::test]
    async fn receiver_ends_when_sender_dropped() {
        let (tx, rx) = mpsc::channel(4);
        let mut receiver = RawStreamReceiver::new(rx);

        tx.send(Ok(RawMessage::Unknown)).await.unwrap();
        drop(tx);

        assert!(matches!(receiver.recv().await, Some(Ok(RawMessage::Unknown))));
        assert!(receiver.recv().await.is_none());
    }
}
