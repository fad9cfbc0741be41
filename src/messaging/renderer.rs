//! Human-readable terminal output for events.

use std::io::{self, IsTerminal, Write};

use crossterm::{
    style::{Attribute, Color, Print, ResetColor, SetAttribute, SetForegroundColor},
    QueueableCommand,
};
use parking_lot::Mutex;
use serde_json::Value;

use super::{
    Event, EventPayload, EventSubscriber, Phase, SessionCompleteMessage, SubscriberResult,
    ToolResultMessage, ToolStartMessage,
};

/// Maximum characters of tool output shown in a result line.
const RESULT_SNIPPET_CHARS: usize = 120;
/// Maximum characters of tool arguments shown in a tool line.
const ARGS_SUMMARY_CHARS: usize = 80;

/// Keys that usually identify what a tool is acting on.
const PRIMARY_ARG_KEYS: &[&str] = &[
    "file_path",
    "path",
    "command",
    "pattern",
    "url",
    "query",
    "description",
];

/// Render style configuration.
#[derive(Debug, Clone)]
pub struct RenderStyle {
    pub phase_color: Color,
    pub tool_color: Color,
    pub result_color: Color,
    pub thinking_color: Color,
    pub success_color: Color,
    pub error_color: Color,
    pub progress_color: Color,
}

impl Default for RenderStyle {
    fn default() -> Self {
        Self {
            phase_color: Color::Magenta,
            tool_color: Color::Cyan,
            result_color: Color::DarkGrey,
            thinking_color: Color::DarkGrey,
            success_color: Color::Green,
            error_color: Color::Red,
            progress_color: Color::DarkGrey,
        }
    }
}

struct RenderState {
    out: Box<dyn Write + Send>,
    /// The last write did not end with a newline.
    mid_line: bool,
    /// Inside a run of thinking deltas.
    in_thinking: bool,
}

/// Prints events as they arrive.
///
/// Text deltas are written verbatim so the agent's prose reads naturally;
/// everything else is a structural line that always starts at column zero.
pub struct TerminalRenderer {
    style: RenderStyle,
    show_tools: bool,
    show_thinking: bool,
    color: bool,
    state: Mutex<RenderState>,
}

impl TerminalRenderer {
    /// Create a renderer writing to stdout, coloured when stdout is a terminal.
    pub fn new() -> Self {
        let color = io::stdout().is_terminal();
        Self::with_writer(io::stdout()).with_color(color)
    }

    /// Create a renderer writing to an arbitrary sink, without colour.
    pub fn with_writer<W>(writer: W) -> Self
    where
        W: Write + Send + 'static,
    {
        Self {
            style: RenderStyle::default(),
            show_tools: false,
            show_thinking: false,
            color: false,
            state: Mutex::new(RenderState {
                out: Box::new(writer),
                mid_line: false,
                in_thinking: false,
            }),
        }
    }

    /// Use a custom style.
    pub fn with_style(mut self, style: RenderStyle) -> Self {
        self.style = style;
        self
    }

    pub fn with_color(mut self, color: bool) -> Self {
        self.color = color;
        self
    }

    pub fn show_tools(mut self, show: bool) -> Self {
        self.show_tools = show;
        self
    }

    pub fn show_thinking(mut self, show: bool) -> Self {
        self.show_thinking = show;
        self
    }

    /// Render a single event.
    pub fn render(&self, event: &Event) -> io::Result<()> {
        let mut state = self.state.lock();

        if state.in_thinking && !matches!(event.payload(), EventPayload::ThinkingDelta(_)) {
            state.in_thinking = false;
            self.break_line(&mut state)?;
        }

        match event.payload() {
            EventPayload::TextDelta(delta) => self.render_text(&mut state, &delta.text)?,
            EventPayload::ThinkingDelta(delta) => {
                if self.show_thinking {
                    self.render_thinking(&mut state, &delta.text)?;
                }
            }
            EventPayload::ToolStart(tool) => {
                if self.show_tools {
                    self.render_tool_start(&mut state, tool)?;
                }
            }
            EventPayload::ToolResult(result) => {
                if self.show_tools {
                    self.render_tool_result(&mut state, result)?;
                }
            }
            EventPayload::PhaseStart(p) => self.render_phase(&mut state, p.phase, false)?,
            EventPayload::PhaseEnd(p) => self.render_phase(&mut state, p.phase, true)?,
            EventPayload::SessionInit(_) => {}
            EventPayload::SessionComplete(done) => self.render_complete(&mut state, done)?,
            EventPayload::Progress(progress) => {
                let color = self.style.progress_color;
                self.line(&mut state, color, &format!("• {}", progress.message))?;
            }
        }

        state.out.flush()
    }

    fn render_text(&self, state: &mut RenderState, text: &str) -> io::Result<()> {
        if text.is_empty() {
            return Ok(());
        }
        state.out.write_all(text.as_bytes())?;
        state.mid_line = !text.ends_with('\n');
        Ok(())
    }

    fn render_thinking(&self, state: &mut RenderState, text: &str) -> io::Result<()> {
        if text.is_empty() {
            return Ok(());
        }
        if !state.in_thinking {
            self.break_line(state)?;
            state.in_thinking = true;
            self.paint(state, self.style.thinking_color, true, "[Thinking] ")?;
        }
        self.paint(state, self.style.thinking_color, true, text)?;
        state.mid_line = !text.ends_with('\n');
        Ok(())
    }

    fn render_tool_start(&self, state: &mut RenderState, tool: &ToolStartMessage) -> io::Result<()> {
        let name = if tool.tool_name.is_empty() {
            "unknown"
        } else {
            tool.tool_name.as_str()
        };
        let summary = args_summary(&tool.tool_input);
        let line = if summary.is_empty() {
            format!("[Tool: {}]", name)
        } else {
            format!("[Tool: {}] {}", name, summary)
        };
        self.line(state, self.style.tool_color, &line)
    }

    fn render_tool_result(
        &self,
        state: &mut RenderState,
        result: &ToolResultMessage,
    ) -> io::Result<()> {
        let label = if result.is_error { "Error" } else { "Result" };
        let mut line = format!("[{}: {}]", label, snippet(&result.output, RESULT_SNIPPET_CHARS));
        if result.unmatched {
            line.push_str(" (unmatched)");
        }
        let color = if result.is_error {
            self.style.error_color
        } else {
            self.style.result_color
        };
        self.line(state, color, &line)
    }

    fn render_phase(&self, state: &mut RenderState, phase: Phase, done: bool) -> io::Result<()> {
        let header = if done {
            format!("== {} done ==", phase)
        } else {
            format!("== {} ==", phase)
        };
        self.break_line(state)?;
        if !done {
            state.out.write_all(b"\n")?;
        }
        if self.color {
            state
                .out
                .queue(SetForegroundColor(self.style.phase_color))?
                .queue(SetAttribute(Attribute::Bold))?
                .queue(Print(&header))?
                .queue(SetAttribute(Attribute::Reset))?
                .queue(ResetColor)?;
        } else {
            state.out.write_all(header.as_bytes())?;
        }
        state.out.write_all(b"\n")?;
        state.mid_line = false;
        Ok(())
    }

    fn render_complete(
        &self,
        state: &mut RenderState,
        done: &SessionCompleteMessage,
    ) -> io::Result<()> {
        if done.success {
            return self.line(state, self.style.success_color, "✓ Session complete");
        }
        let line = if done.cancelled {
            "✗ Session cancelled".to_string()
        } else {
            let reason = done
                .result
                .as_deref()
                .filter(|r| !r.is_empty())
                .unwrap_or(&done.subtype);
            format!("✗ Session failed: {}", reason)
        };
        self.line(state, self.style.error_color, &line)
    }

    /// Write a full structural line starting at column zero.
    fn line(&self, state: &mut RenderState, color: Color, text: &str) -> io::Result<()> {
        self.break_line(state)?;
        self.paint(state, color, false, text)?;
        state.out.write_all(b"\n")?;
        state.mid_line = false;
        Ok(())
    }

    fn break_line(&self, state: &mut RenderState) -> io::Result<()> {
        if state.mid_line {
            state.out.write_all(b"\n")?;
            state.mid_line = false;
        }
        Ok(())
    }

    fn paint(&self, state: &mut RenderState, color: Color, dim: bool, text: &str) -> io::Result<()> {
        if !self.color {
            return state.out.write_all(text.as_bytes());
        }
        state.out.queue(SetForegroundColor(color))?;
        if dim {
            state.out.queue(SetAttribute(Attribute::Dim))?;
        }
        state.out.queue(Print(text))?;
        if dim {
            state.out.queue(SetAttribute(Attribute::Reset))?;
        }
        state.out.queue(ResetColor)?;
        Ok(())
    }
}

impl Default for TerminalRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSubscriber for TerminalRenderer {
    fn on_event(&self, event: &Event) -> SubscriberResult {
        self.render(event)?;
        Ok(())
    }
}

/// One-line summary of tool arguments.
fn args_summary(input: &Value) -> String {
    match input {
        Value::Object(map) if map.is_empty() => String::new(),
        Value::Object(map) => {
            let primary = PRIMARY_ARG_KEYS
                .iter()
                .find_map(|key| map.get(*key).and_then(Value::as_str));
            match primary {
                Some(value) => snippet(value, ARGS_SUMMARY_CHARS),
                None => snippet(&input.to_string(), ARGS_SUMMARY_CHARS),
            }
        }
        Value::Null => String::new(),
        other => snippet(&other.to_string(), ARGS_SUMMARY_CHARS),
    }
}

/// First `max` characters on a single line, with `...` when cut.
fn snippet(text: &str, max: usize) -> String {
    let flat: String = text
        .trim()
        .chars()
        .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
        .collect();
    if flat.chars().count() <= max {
        flat
    } else {
        let cut: String = flat.chars().take(max).collect();
        format!("{}...", cut)
    }
}
