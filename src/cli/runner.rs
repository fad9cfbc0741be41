//! CLI runner for single-task and interactive modes.

use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::task::JoinHandle;

use crate::config::StreamSettings;
use crate::messaging::{JsonLinesEmitter, StreamHandler, TerminalRenderer};
use crate::pipeline::{CancelToken, Orchestrator, TaskInput, TaskResult};

const RULE_WIDTH: usize = 60;

/// Build the event handler with the subscribers `stream` asks for.
///
/// JSON lines replace the terminal renderer on stdout.
pub fn build_handler(stream: &StreamSettings) -> StreamHandler {
    let handler = StreamHandler::new();
    if stream.json_events {
        handler.attach(Arc::new(JsonLinesEmitter::new()));
    } else if stream.renders_terminal() {
        let renderer = TerminalRenderer::new()
            .with_color(stream.color)
            .show_tools(stream.show_tools)
            .show_thinking(stream.show_thinking);
        handler.attach(Arc::new(renderer));
    }
    handler
}

/// Cancel `token` on Ctrl-C until the returned handle is aborted.
pub fn cancel_on_ctrl_c(token: CancelToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received, cancelling");
            token.cancel();
        }
    })
}

/// Run one task to completion and print the outcome banner.
pub async fn run_single_task(
    orchestrator: &Orchestrator,
    input: &TaskInput,
    stream: &StreamSettings,
) -> TaskResult {
    if stream.renders_terminal() {
        for line in header_lines(orchestrator, input) {
            println!("{}", line);
        }
    }

    let cancel = CancelToken::new();
    let watcher = cancel_on_ctrl_c(cancel.clone());
    let result = orchestrator.run_task(input, &cancel).await;
    watcher.abort();

    print_lines(&outcome_lines(&result), stream);
    result
}

/// What the user typed at the `Task> ` prompt.
#[derive(Debug, PartialEq, Eq)]
pub enum PromptLine {
    Empty,
    Exit,
    Task(String),
}

impl PromptLine {
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            PromptLine::Empty
        } else if matches!(line.to_lowercase().as_str(), "exit" | "quit" | "q") {
            PromptLine::Exit
        } else {
            PromptLine::Task(line.to_string())
        }
    }
}

/// Read tasks from `input` until `exit` or end of input.
///
/// Ctrl-C while a task runs cancels that task only.
pub async fn run_interactive<R>(orchestrator: &Orchestrator, input: R) -> anyhow::Result<()>
where
    R: AsyncBufRead + Unpin,
{
    for line in interactive_banner_lines(orchestrator) {
        println!("{}", line);
    }
    let mut lines = input.lines();

    loop {
        print!("Task> ");
        std::io::Write::flush(&mut std::io::stdout())?;

        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => {
                println!("\n[Interrupted]");
                continue;
            }
        };

        let Some(line) = line else {
            println!("\nGoodbye!");
            return Ok(());
        };

        let task = match PromptLine::parse(&line) {
            PromptLine::Empty => continue,
            PromptLine::Exit => {
                println!("Goodbye!");
                return Ok(());
            }
            PromptLine::Task(task) => task,
        };

        let input = match TaskInput::text(&task) {
            Ok(input) => input,
            Err(e) => {
                println!("[{}]", e);
                continue;
            }
        };

        let cancel = CancelToken::new();
        let watcher = cancel_on_ctrl_c(cancel.clone());
        let result = orchestrator.run_task(&input, &cancel).await;
        watcher.abort();

        if result.success {
            println!("\n[Task completed]\n");
        } else {
            println!(
                "\n[Task failed: {}]\n",
                result.error.as_deref().unwrap_or("Unknown error")
            );
        }
    }
}

/// Lines printed when the `Task> ` loop starts.
pub fn interactive_banner_lines(orchestrator: &Orchestrator) -> Vec<String> {
    let rule = "=".repeat(RULE_WIDTH);
    vec![
        rule.clone(),
        format!("AI Coding Agents v{} - Interactive Mode", get_version()),
        rule,
        format!(
            "Working directory: {}",
            orchestrator.settings().working_dir.display()
        ),
        "Enter coding tasks (Ctrl+D or 'exit' to quit)\n".to_string(),
    ]
}

/// Lines printed before a single task starts.
pub fn header_lines(orchestrator: &Orchestrator, input: &TaskInput) -> Vec<String> {
    let rule = "=".repeat(RULE_WIDTH);
    let mut lines = vec![rule.clone()];
    if let Some(issue) = input.issue() {
        lines.push(format!("Issue: {} ({})", issue, issue.url));
    }
    if let Some(task) = input.task() {
        lines.push(format!("Task: {}", task));
    }
    lines.push(format!(
        "Working directory: {}",
        orchestrator.settings().working_dir.display()
    ));
    lines.push(rule);
    lines
}

/// The closing banner for a finished task.
pub fn outcome_lines(result: &TaskResult) -> Vec<String> {
    let rule = "=".repeat(RULE_WIDTH);
    let mut lines = vec![String::new(), rule.clone()];
    if result.success {
        lines.push("Task completed successfully!".to_string());
        if let Some(code) = &result.code_result {
            if !code.files_created.is_empty() {
                lines.push(format!("Created: {}", code.files_created.join(", ")));
            }
            if !code.files_modified.is_empty() {
                lines.push(format!("Modified: {}", code.files_modified.join(", ")));
            }
        }
    } else {
        lines.push(format!(
            "Task failed: {}",
            result.error.as_deref().unwrap_or("Unknown error")
        ));
    }
    lines.push(rule);
    lines
}

/// Outcome text goes to stderr when stdout carries JSON lines.
fn print_lines(lines: &[String], stream: &StreamSettings) {
    for line in lines {
        if stream.json_events {
            eprintln!("{}", line);
        } else {
            println!("{}", line);
        }
    }
}

/// Get the application version string.
fn get_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
