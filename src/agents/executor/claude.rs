//! Runs agents through the `claude` CLI in `stream-json` mode.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdout, Command};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::{AgentRunner, ExecutorError, RawStreamReceiver, RunRequest};
use crate::sdk::RawMessage;

/// Default executable name looked up on `PATH`.
pub const DEFAULT_CLAUDE_BIN: &str = "claude";

/// Lines of stderr kept for error reports.
const STDERR_TAIL_LINES: usize = 20;

const CHANNEL_CAPACITY: usize = 256;

/// Spawns one `claude -p` process per run and streams its stdout.
#[derive(Debug, Clone)]
pub struct ClaudeCliRunner {
    binary: PathBuf,
    /// Arguments placed before the generated ones, for wrappers such as
    /// `npx @anthropic-ai/claude-code`.
    leading_args: Vec<String>,
}

impl ClaudeCliRunner {
    pub fn new() -> Self {
        Self::with_binary(DEFAULT_CLAUDE_BIN)
    }

    /// Use a specific executable, either a bare name or a path.
    pub fn with_binary(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            leading_args: Vec::new(),
        }
    }

    pub fn with_leading_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.leading_args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Resolve the executable: paths are used as-is, bare names via `PATH`.
    pub fn resolve_binary(&self) -> Result<PathBuf, ExecutorError> {
        if self.binary.components().count() > 1 {
            if self.binary.exists() {
                return Ok(self.binary.clone());
            }
            return Err(ExecutorError::BinaryNotFound(
                self.binary.display().to_string(),
            ));
        }
        which::which(&self.binary)
            .map_err(|_| ExecutorError::BinaryNotFound(self.binary.display().to_string()))
    }

    /// Command-line arguments for one run.
    pub fn build_args(request: &RunRequest) -> Result<Vec<String>, ExecutorError> {
        let mut args = vec![
            "-p".to_string(),
            request.prompt.clone(),
            "--output-format".to_string(),
            "stream-json".to_string(),
            "--verbose".to_string(),
            "--session-id".to_string(),
            request.session_id.clone(),
        ];

        if !request.system_prompt.is_empty() {
            args.push("--append-system-prompt".to_string());
            args.push(request.system_prompt.clone());
        }
        if !request.allowed_tools.is_empty() {
            args.push("--allowedTools".to_string());
            args.push(request.allowed_tools.join(","));
        }
        args.push("--permission-mode".to_string());
        args.push(request.permission_mode.as_str().to_string());

        if request.include_partial {
            args.push("--include-partial-messages".to_string());
        }
        if let Some(ref model) = request.model {
            args.push("--model".to_string());
            args.push(model.clone());
        }
        if let Some(ref config) = request.mcp_config {
            let json = serde_json::to_string(config)
                .map_err(|e| ExecutorError::Config(format!("MCP config: {}", e)))?;
            args.push("--mcp-config".to_string());
            args.push(json);
        }

        Ok(args)
    }
}

impl Default for ClaudeCliRunner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AgentRunner for ClaudeCliRunner {
    async fn start(&self, request: RunRequest) -> Result<RawStreamReceiver, ExecutorError> {
        let binary = self.resolve_binary()?;
        let args = Self::build_args(&request)?;

        info!(
            agent = %request.agent_name,
            session = %request.session_id,
            binary = %binary.display(),
            "Starting agent"
        );

        let mut cmd = Command::new(&binary);
        cmd.args(&self.leading_args)
            .args(&args)
            .current_dir(&request.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .map_err(|e| ExecutorError::Spawn(format!("{}: {}", binary.display(), e)))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ExecutorError::Spawn("missing stdout".to_string()))?;
        let stderr = child.stderr.take();

        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        tokio::spawn(pump_output(child, stdout, stderr, tx, program_name(&binary)));

        Ok(RawStreamReceiver::new(rx))
    }
}

fn program_name(binary: &Path) -> String {
    binary
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| binary.display().to_string())
}

/// Forward decoded stdout lines until EOF, then report abnormal exits.
async fn pump_output(
    mut child: Child,
    stdout: ChildStdout,
    stderr: Option<ChildStderr>,
    tx: mpsc::Sender<Result<RawMessage, ExecutorError>>,
    program: String,
) {
    let stderr_task = stderr.map(|stderr| tokio::spawn(collect_stderr(stderr)));

    let mut lines = BufReader::new(stdout).lines();
    let mut saw_result = false;

    loop {
        tokio::select! {
            _ = tx.closed() => {
                debug!(program = %program, "Receiver dropped; stopping agent");
                if let Err(e) = child.kill().await {
                    warn!(program = %program, error = %e, "Failed to kill agent");
                }
                return;
            }
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    let message = RawMessage::from_line(&line);
                    saw_result |= message.is_result();
                    if tx.send(Ok(message)).await.is_err() {
                        let _ = child.kill().await;
                        return;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    let _ = tx.send(Err(ExecutorError::Io(e))).await;
                    break;
                }
            }
        }
    }

    let status = child.wait().await;
    let stderr_tail = match stderr_task {
        Some(task) => task.await.unwrap_or_default(),
        None => String::new(),
    };

    match status {
        Ok(status) if !status.success() && !saw_result => {
            let mut message = format!("{} exited with {}", program, status);
            if !stderr_tail.is_empty() {
                message.push_str(": ");
                message.push_str(&stderr_tail);
            }
            let _ = tx.send(Err(ExecutorError::Process(message))).await;
        }
        Ok(status) => debug!(program = %program, %status, "Agent exited"),
        Err(e) => {
            let _ = tx.send(Err(ExecutorError::Io(e))).await;
        }
    }
}

/// Log stderr as it arrives and keep the last few lines.
async fn collect_stderr(stderr: ChildStderr) -> String {
    let mut lines = BufReader::new(stderr).lines();
    let mut tail = VecDeque::with_capacity(STDERR_TAIL_LINES);
    while let Ok(Some(line)) = lines.next_line().await {
        debug!(target: "code_agent::agent_stderr", "{}", line);
        if tail.len() == STDERR_TAIL_LINES {
            tail.pop_front();
        }
        tail.push_back(line);
    }
    Vec::from(tail).join("\n").trim().to_string()
}
