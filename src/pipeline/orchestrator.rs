//! Runs the phases in order and turns each agent run into events.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{CancelToken, CodeResult, TaskInput};
use crate::agents::{agent_for, AgentRunner, RunRequest};
use crate::config::PipelineSettings;
use crate::mcp::McpConfig;
use crate::messaging::{Event, EventPayload, MessageProcessor, Phase, StreamHandler};

/// Agent name on phase and pipeline progress events.
pub const PIPELINE_AGENT: &str = "orchestrator";

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("{agent} agent failed: {reason}")]
    PhaseFailed { agent: String, reason: String },
    #[error("Cancelled during {0}")]
    Cancelled(Phase),
    #[error("Artifact error: {0}")]
    Artifact(#[from] std::io::Error),
}

/// How one phase went.
#[derive(Debug, Clone)]
pub struct PhaseOutcome {
    pub phase: Phase,
    pub agent_name: String,
    pub session_id: String,
    pub success: bool,
    pub cancelled: bool,
    /// The agent's final text.
    pub output: String,
    /// Where the output was saved, when the phase succeeded.
    pub artifact: Option<PathBuf>,
    pub error: Option<String>,
    pub total_cost_usd: Option<f64>,
}

/// Result of a whole task.
#[derive(Debug, Clone)]
pub struct TaskResult {
    /// The description the agents were given.
    pub task: String,
    pub phases: Vec<PhaseOutcome>,
    pub code_result: Option<CodeResult>,
    pub success: bool,
    pub error: Option<String>,
}

impl TaskResult {
    pub fn phase(&self, phase: Phase) -> Option<&PhaseOutcome> {
        self.phases.iter().find(|p| p.phase == phase)
    }

    pub fn total_cost_usd(&self) -> f64 {
        self.phases.iter().filter_map(|p| p.total_cost_usd).sum()
    }
}

/// What the orchestrator needs to remember from a phase's events.
#[derive(Default)]
struct PhaseTranscript {
    text: String,
    complete: Option<(bool, bool, Option<String>, Option<f64>)>,
    first_at: Option<Instant>,
    last_at: Option<Instant>,
}

impl PhaseTranscript {
    fn observe(&mut self, event: &Event) {
        self.first_at.get_or_insert(event.captured_at());
        self.last_at = Some(event.captured_at());
        match event.payload() {
            EventPayload::TextDelta(delta) => self.text.push_str(&delta.text),
            EventPayload::SessionComplete(done) => {
                self.complete = Some((
                    done.success,
                    done.cancelled,
                    done.result.clone(),
                    done.total_cost_usd,
                ));
            }
            _ => {}
        }
    }

    /// Time from the session's first event to its last.
    fn elapsed(&self) -> Option<Duration> {
        Some(self.last_at?.saturating_duration_since(self.first_at?))
    }
}

/// Sequences research, planning, detail planning and implementation.
///
/// Every event goes through the shared [`StreamHandler`]. Each phase's agent
/// gets its own [`MessageProcessor`] and session id; phase boundaries and
/// saved-artifact notes come from a separate run-level processor named
/// [`PIPELINE_AGENT`], so they never fall inside an agent session.
pub struct Orchestrator {
    settings: PipelineSettings,
    runner: Arc<dyn AgentRunner>,
    handler: StreamHandler,
    mcp_config: Option<Value>,
}

impl Orchestrator {
    pub fn new(
        settings: PipelineSettings,
        runner: Arc<dyn AgentRunner>,
        handler: StreamHandler,
    ) -> Self {
        let mcp_config = if settings.use_mcp {
            load_mcp(&settings)
        } else {
            None
        };
        Self {
            settings,
            runner,
            handler,
            mcp_config,
        }
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    pub fn handler(&self) -> &StreamHandler {
        &self.handler
    }

    fn emit(&self, events: Vec<Event>, transcript: &mut PhaseTranscript) {
        for event in events {
            transcript.observe(&event);
            self.handler.emit(&event);
        }
    }

    fn publish(&self, events: impl IntoIterator<Item = Event>) {
        for event in events {
            self.handler.emit(&event);
        }
    }

    /// Run every configured phase for `task`.
    ///
    /// Stops at the first phase that fails or is cancelled.
    pub async fn run_task(&self, task: &TaskInput, cancel: &CancelToken) -> TaskResult {
        let description = task.description();
        let mut pipeline = MessageProcessor::new(PIPELINE_AGENT, Uuid::new_v4().to_string());
        info!(
            task = %description,
            run = %pipeline.session_id(),
            dir = %self.settings.working_dir.display(),
            "Starting task"
        );

        let mut result = TaskResult {
            task: description.clone(),
            phases: Vec::new(),
            code_result: None,
            success: false,
            error: None,
        };

        for phase in self.settings.phases() {
            if cancel.is_cancelled() {
                result.error = Some(PipelineError::Cancelled(phase).to_string());
                return result;
            }

            self.publish(pipeline.begin_phase(phase));
            let outcome = self.run_phase(phase, &description, cancel).await;
            if let Some(path) = &outcome.artifact {
                self.publish([pipeline.progress(format!("Saved {}", path.display()))]);
            }
            self.publish(pipeline.end_phase());

            let failure = if outcome.cancelled {
                Some(PipelineError::Cancelled(phase))
            } else if !outcome.success {
                Some(PipelineError::PhaseFailed {
                    agent: outcome.agent_name.clone(),
                    reason: outcome
                        .error
                        .clone()
                        .unwrap_or_else(|| "no result".to_string()),
                })
            } else {
                None
            };

            if phase == Phase::Implementation && outcome.success {
                result.code_result = Some(CodeResult::parse(&outcome.output));
            }
            result.phases.push(outcome);

            if let Some(err) = failure {
                warn!(phase = %phase, "{}", err);
                result.error = Some(err.to_string());
                return result;
            }
        }

        // Without an implementation phase there is no code result to judge.
        result.success = match &result.code_result {
            Some(code) => code.success,
            None => !result.phases.is_empty(),
        };
        if !result.success && result.error.is_none() {
            result.error = Some("Implementation reported failure".to_string());
        }
        result
    }

    /// Run one agent session for `phase` and save its artifact.
    ///
    /// Emits only that session's events; phase boundaries are left to the
    /// caller.
    pub async fn run_phase(
        &self,
        phase: Phase,
        description: &str,
        cancel: &CancelToken,
    ) -> PhaseOutcome {
        let agent = agent_for(phase);
        let session_id = Uuid::new_v4().to_string();
        let mut processor = MessageProcessor::new(agent.name(), &session_id);
        let mut transcript = PhaseTranscript::default();

        let request = RunRequest::for_agent(
            agent.as_ref(),
            description,
            &self.settings.working_dir,
            &session_id,
        )
        .with_model(self.settings.model.clone())
        .with_partial_messages(self.settings.stream_partial)
        .with_mcp_config(self.mcp_config.clone());

        debug!(agent = %agent.name(), session = %session_id, "Starting agent");

        match self.runner.start(request).await {
            Err(e) => self.emit(processor.fail(&e.to_string()), &mut transcript),
            Ok(mut stream) => loop {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        self.emit(processor.cancel("Cancelled by user"), &mut transcript);
                        break;
                    }
                    next = stream.recv() => match next {
                        Some(Ok(message)) => {
                            self.emit(processor.process(message), &mut transcript);
                        }
                        Some(Err(e)) => {
                            self.emit(processor.fail(&e.to_string()), &mut transcript);
                            break;
                        }
                        None => {
                            if !processor.is_complete() {
                                self.emit(
                                    processor.fail("Agent exited without a result"),
                                    &mut transcript,
                                );
                            }
                            break;
                        }
                    }
                }
            },
        }

        if let Some(elapsed) = transcript.elapsed() {
            debug!(
                agent = %agent.name(),
                elapsed_ms = elapsed.as_millis() as u64,
                "Agent session finished"
            );
        }

        let (success, cancelled, result_text, total_cost_usd) = transcript
            .complete
            .clone()
            .unwrap_or((false, false, None, None));

        let output = match result_text {
            Some(text) if success && !text.trim().is_empty() => text,
            _ => transcript.text.clone(),
        };

        let mut outcome = PhaseOutcome {
            phase,
            agent_name: agent.name().to_string(),
            session_id,
            success,
            cancelled,
            output,
            artifact: None,
            error: None,
            total_cost_usd,
        };

        if !success {
            outcome.error = Some(
                transcript
                    .complete
                    .and_then(|(_, _, reason, _)| reason)
                    .filter(|r| !r.trim().is_empty())
                    .unwrap_or_else(|| "session did not succeed".to_string()),
            );
            return outcome;
        }

        let contents = if phase == Phase::Implementation {
            CodeResult::parse(&outcome.output).to_markdown()
        } else {
            outcome.output.clone()
        };
        match self.save_artifact(agent.artifact(), &contents).await {
            Ok(path) => outcome.artifact = Some(path),
            Err(e) => {
                let err = PipelineError::from(e);
                warn!(phase = %phase, "{}", err);
                outcome.success = false;
                outcome.error = Some(err.to_string());
            }
        }
        outcome
    }

    async fn save_artifact(&self, relative: &str, contents: &str) -> std::io::Result<PathBuf> {
        let path = self.settings.working_dir.join(relative);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, contents).await?;
        debug!(path = %path.display(), "Saved artifact");
        Ok(path)
    }
}

fn load_mcp(settings: &PipelineSettings) -> Option<Value> {
    match McpConfig::load_from_dir(&settings.working_dir) {
        Ok(Some(config)) if !config.is_empty() => {
            info!(servers = config.servers.len(), "Loaded MCP servers");
            Some(config.to_cli_value())
        }
        Ok(_) => None,
        Err(e) => {
            warn!("Could not load MCP config: {}", e);
            None
        }
    }
}
