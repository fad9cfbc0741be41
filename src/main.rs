//! Code Agent - research, plan, and implement coding tasks with Claude.

use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{CommandFactory, Parser};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use code_agent::cli::{build_handler, run_interactive, run_single_task};
use code_agent::{
    ClaudeCliRunner, Orchestrator, Phase, PipelineSettings, StreamSettings, TaskInput,
};

/// AI Coding Agents - plan and implement code using Claude
#[derive(Parser, Debug)]
#[command(name = "code-agent")]
#[command(version, about, long_about = None)]
#[command(after_help = "Examples:
  code-agent \"Create a fibonacci function\"
  code-agent --issue https://github.com/o/r/issues/1
  code-agent --issue URL \"Additional context\"
  code-agent -C ./project \"Refactor module\"")]
struct Args {
    /// The coding task to complete
    #[arg(env = "CODE_AGENT_TASK")]
    task: Option<String>,

    /// GitHub issue URL to research and implement
    #[arg(short = 'I', long, env = "CODE_AGENT_ISSUE")]
    issue: Option<String>,

    /// Working directory (like git -C)
    #[arg(
        short = 'C',
        long,
        visible_alias = "directory",
        default_value = ".",
        env = "CODE_AGENT_DIR"
    )]
    dir: PathBuf,

    /// Suppress progress output
    #[arg(short, long, env = "CODE_AGENT_QUIET")]
    quiet: bool,

    /// Read tasks from a prompt until exit
    #[arg(short, long)]
    interactive: bool,

    /// Stream text as it is generated (partial messages)
    #[arg(short, long, env = "CODE_AGENT_STREAM")]
    stream: bool,

    /// Display thinking/reasoning blocks
    #[arg(long, env = "CODE_AGENT_SHOW_THINKING")]
    show_thinking: bool,

    /// Show tool execution details
    #[arg(long, env = "CODE_AGENT_SHOW_TOOLS")]
    show_tools: bool,

    /// Output events as JSON lines on stdout
    #[arg(long, env = "CODE_AGENT_JSON_EVENTS")]
    json_events: bool,

    /// Run a single phase (research, planning, detail_planning, implementation)
    #[arg(long, env = "CODE_AGENT_PHASE")]
    phase: Option<Phase>,

    /// Model to use for every agent
    #[arg(short, long, env = "CODE_AGENT_MODEL")]
    model: Option<String>,

    /// Path or name of the claude binary
    #[arg(long, default_value = "claude", env = "CODE_AGENT_CLAUDE_BIN")]
    claude_bin: PathBuf,

    /// Do not pass .mcp.json servers to the agents
    #[arg(long, env = "CODE_AGENT_NO_MCP")]
    no_mcp: bool,

    /// Disable coloured output
    #[arg(long, env = "NO_COLOR")]
    no_color: bool,

    /// Enable debug logging (equivalent to RUST_LOG=debug)
    #[arg(short = 'd', long)]
    debug: bool,

    /// Enable verbose logging (equivalent to RUST_LOG=trace)
    #[arg(short = 'v', long)]
    verbose: bool,
}

impl Args {
    fn stream_settings(&self) -> StreamSettings {
        StreamSettings {
            show_thinking: self.show_thinking,
            show_tools: self.show_tools,
            json_events: self.json_events,
            quiet: self.quiet,
            color: !self.no_color && std::io::stdout().is_terminal(),
        }
    }

    fn pipeline_settings(&self) -> anyhow::Result<PipelineSettings> {
        let mut settings = PipelineSettings::new(&self.dir)?;
        settings.model = self.model.clone();
        settings.claude_bin = self.claude_bin.clone();
        settings.stream_partial = self.stream;
        settings.only_phase = self.phase;
        settings.use_mcp = !self.no_mcp;
        Ok(settings)
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Determine log level from args or env
    let default_filter = if args.verbose {
        "trace"
    } else if args.debug {
        "debug"
    } else {
        "warn"
    };

    // Initialize tracing with stderr output so stdout stays for events
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_thread_ids(false)
                .with_writer(std::io::stderr),
        )
        .init();

    if args.debug || args.verbose {
        tracing::info!("Debug logging enabled");
    }

    let runtime = tokio::runtime::Runtime::new()?;
    let code = runtime.block_on(run(args))?;
    drop(runtime);
    std::process::exit(code);
}

async fn run(args: Args) -> anyhow::Result<i32> {
    if !args.interactive && args.task.is_none() && args.issue.is_none() {
        Args::command().print_help()?;
        return Ok(1);
    }

    let input = if args.interactive {
        None
    } else {
        match TaskInput::new(args.task.as_deref(), args.issue.as_deref()) {
            Ok(input) => Some(input),
            Err(e) => {
                eprintln!("Error: {}", e);
                return Ok(1);
            }
        }
    };

    let settings = args.pipeline_settings()?;
    let stream = args.stream_settings();

    let runner = ClaudeCliRunner::with_binary(settings.claude_bin.clone());
    runner
        .resolve_binary()
        .context("The claude CLI is required; install it or pass --claude-bin")?;

    let orchestrator = Orchestrator::new(settings, Arc::new(runner), build_handler(&stream));

    match input {
        None => {
            let stdin = tokio::io::BufReader::new(tokio::io::stdin());
            run_interactive(&orchestrator, stdin).await?;
            Ok(0)
        }
        Some(input) => {
            let result = run_single_task(&orchestrator, &input, &stream).await;
            Ok(if result.success { 0 } else { 1 })
        }
    }
}
