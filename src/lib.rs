//! Code Agent Library
//!
//! Runs a coding task through four agents (researcher, planner, detail
//! planner, coder) and streams what they do as typed events.
//!
//! ## Main Components
//!
//! - [`messaging`] - Event model, processor, dispatcher, renderer, JSON lines
//! - [`sdk`] - Raw message schema of the external agent's stream
//! - [`agents`] - Phase agents and the external agent runner
//! - [`pipeline`] - Orchestrator, task input, code result parsing
//! - [`config`] - Run settings
//! - [`mcp`] - `.mcp.json` loading
//! - [`cli`] - Single-task and interactive runners
//!
//! ## Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use code_agent::{CancelToken, ClaudeCliRunner, Orchestrator, PipelineSettings, StreamHandler, TaskInput, TerminalRenderer};
//!
//! let handler = StreamHandler::new();
//! handler.attach(Arc::new(TerminalRenderer::new()));
//! let settings = PipelineSettings::new(".")?;
//! let orchestrator = Orchestrator::new(settings, Arc::new(ClaudeCliRunner::new()), handler);
//! let result = orchestrator
//!     .run_task(&TaskInput::text("Add a --json flag")?, &CancelToken::new())
//!     .await;
//! ```

pub mod agents;
pub mod cli;
pub mod config;
pub mod mcp;
pub mod messaging;
pub mod pipeline;
pub mod sdk;

// Re-export commonly used types
pub use agents::{
    agent_for, AgentRunner, BoxedAgent, ClaudeCliRunner, ExecutorError, PermissionMode,
    PhaseAgent, RawStreamReceiver, RunRequest,
};
pub use config::{PipelineSettings, SettingsError, StreamSettings};
pub use mcp::{McpConfig, McpConfigError, McpServerEntry};
pub use messaging::{
    Event, EventKind, EventPayload, EventSubscriber, JsonLinesEmitter, MessageProcessor, Phase,
    StreamHandler, SubscriberError, TerminalRenderer,
};
pub use pipeline::{
    CancelToken, CodeResult, GithubIssue, Orchestrator, PhaseOutcome, PipelineError, TaskInput,
    TaskResult,
};
pub use sdk::RawMessage;
