//! Event types for agent-UI communication.

use std::fmt;
use std::str::FromStr;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Discriminant of an [`Event`], used as the subscription key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    PhaseStart,
    PhaseEnd,
    TextDelta,
    ToolStart,
    ToolResult,
    ThinkingDelta,
    SessionInit,
    SessionComplete,
    Progress,
}

impl EventKind {
    pub const ALL: [EventKind; 9] = [
        EventKind::PhaseStart,
        EventKind::PhaseEnd,
        EventKind::TextDelta,
        EventKind::ToolStart,
        EventKind::ToolResult,
        EventKind::ThinkingDelta,
        EventKind::SessionInit,
        EventKind::SessionComplete,
        EventKind::Progress,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::PhaseStart => "phase_start",
            EventKind::PhaseEnd => "phase_end",
            EventKind::TextDelta => "text_delta",
            EventKind::ToolStart => "tool_start",
            EventKind::ToolResult => "tool_result",
            EventKind::ThinkingDelta => "thinking_delta",
            EventKind::SessionInit => "session_init",
            EventKind::SessionComplete => "session_complete",
            EventKind::Progress => "progress",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pipeline stage names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Research,
    Planning,
    DetailPlanning,
    Implementation,
}

impl Phase {
    /// All phases in pipeline order.
    pub const ALL: [Phase; 4] = [
        Phase::Research,
        Phase::Planning,
        Phase::DetailPlanning,
        Phase::Implementation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Research => "research",
            Phase::Planning => "planning",
            Phase::DetailPlanning => "detail_planning",
            Phase::Implementation => "implementation",
        }
    }

    /// Human-readable name for headers.
    pub fn display_name(&self) -> &'static str {
        match self {
            Phase::Research => "Research",
            Phase::Planning => "Planning",
            Phase::DetailPlanning => "Detail Planning",
            Phase::Implementation => "Implementation",
        }
    }

    /// Name of the agent that runs this phase.
    pub fn agent_name(&self) -> &'static str {
        match self {
            Phase::Research => "researcher",
            Phase::Planning => "planner",
            Phase::DetailPlanning => "detail_planner",
            Phase::Implementation => "coder",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for Phase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "research" | "researcher" => Ok(Phase::Research),
            "plan" | "planning" | "planner" => Ok(Phase::Planning),
            "detail_plan" | "detail_planning" | "detail_planner" => Ok(Phase::DetailPlanning),
            "code" | "coder" | "implementation" | "implement" => Ok(Phase::Implementation),
            other => Err(format!("Unknown phase: {}", other)),
        }
    }
}

/// Phase transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseMessage {
    pub phase: Phase,
}

/// Incremental assistant text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextDeltaMessage {
    pub text: String,
}

/// Incremental thinking text. Kept apart from [`TextDeltaMessage`] so the two
/// channels can be subscribed to independently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThinkingDeltaMessage {
    pub text: String,
}

/// A tool invocation with its complete input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolStartMessage {
    pub tool_name: String,
    pub tool_use_id: String,
    pub tool_input: Value,
}

/// The outcome of a tool invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResultMessage {
    pub tool_use_id: String,
    pub is_error: bool,
    pub output: String,
    /// No `ToolStart` with this id was seen earlier in the session.
    #[serde(default)]
    pub unmatched: bool,
}

/// Session start details reported by the external agent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionInitMessage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cwd: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<String>,
}

/// Session outcome.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionCompleteMessage {
    pub success: bool,
    #[serde(default)]
    pub cancelled: bool,
    pub subtype: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_turns: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_cost_usd: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<Value>,
}

/// Free-form progress note.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressMessage {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Kind-specific event data.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum EventPayload {
    PhaseStart(PhaseMessage),
    PhaseEnd(PhaseMessage),
    TextDelta(TextDeltaMessage),
    ToolStart(ToolStartMessage),
    ToolResult(ToolResultMessage),
    ThinkingDelta(ThinkingDeltaMessage),
    SessionInit(SessionInitMessage),
    SessionComplete(SessionCompleteMessage),
    Progress(ProgressMessage),
}

impl EventPayload {
    pub fn kind(&self) -> EventKind {
        match self {
            EventPayload::PhaseStart(_) => EventKind::PhaseStart,
            EventPayload::PhaseEnd(_) => EventKind::PhaseEnd,
            EventPayload::TextDelta(_) => EventKind::TextDelta,
            EventPayload::ToolStart(_) => EventKind::ToolStart,
            EventPayload::ToolResult(_) => EventKind::ToolResult,
            EventPayload::ThinkingDelta(_) => EventKind::ThinkingDelta,
            EventPayload::SessionInit(_) => EventKind::SessionInit,
            EventPayload::SessionComplete(_) => EventKind::SessionComplete,
            EventPayload::Progress(_) => EventKind::Progress,
        }
    }

    /// Create a phase start payload.
    pub fn phase_start(phase: Phase) -> Self {
        Self::PhaseStart(PhaseMessage { phase })
    }

    /// Create a phase end payload.
    pub fn phase_end(phase: Phase) -> Self {
        Self::PhaseEnd(PhaseMessage { phase })
    }

    /// Create a text delta payload.
    pub fn text_delta(text: impl Into<String>) -> Self {
        Self::TextDelta(TextDeltaMessage { text: text.into() })
    }

    /// Create a thinking delta payload.
    pub fn thinking_delta(text: impl Into<String>) -> Self {
        Self::ThinkingDelta(ThinkingDeltaMessage { text: text.into() })
    }

    /// Create a tool start payload.
    pub fn tool_start(tool_name: &str, tool_use_id: &str, tool_input: Value) -> Self {
        Self::ToolStart(ToolStartMessage {
            tool_name: tool_name.to_string(),
            tool_use_id: tool_use_id.to_string(),
            tool_input,
        })
    }

    /// Create a tool result payload.
    pub fn tool_result(tool_use_id: &str, output: impl Into<String>, is_error: bool) -> Self {
        Self::ToolResult(ToolResultMessage {
            tool_use_id: tool_use_id.to_string(),
            is_error,
            output: output.into(),
            unmatched: false,
        })
    }

    /// Create a successful session complete payload.
    pub fn session_success() -> Self {
        Self::SessionComplete(SessionCompleteMessage {
            success: true,
            subtype: "success".to_string(),
            ..Default::default()
        })
    }

    /// Create a progress payload.
    pub fn progress(message: impl Into<String>) -> Self {
        Self::Progress(ProgressMessage {
            message: message.into(),
            data: None,
        })
    }
}

/// One observable occurrence during an agent run.
///
/// Fields are private: an event cannot be changed once constructed, so a
/// single value can be handed to any number of subscribers by reference.
///
/// Two clocks are read at construction. `captured_at` is monotonic and is
/// what ordering and durations use; `timestamp` is wall-clock UTC and only
/// labels serialized output, so it may step backwards with the system clock.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Event {
    #[serde(skip)]
    captured_at: Instant,
    timestamp: DateTime<Utc>,
    session_id: String,
    agent_name: String,
    #[serde(flatten)]
    payload: EventPayload,
}

impl Event {
    /// Create an event stamped with the current time on both clocks.
    pub fn new(
        agent_name: impl Into<String>,
        session_id: impl Into<String>,
        payload: EventPayload,
    ) -> Self {
        Self {
            captured_at: Instant::now(),
            timestamp: Utc::now(),
            session_id: session_id.into(),
            agent_name: agent_name.into(),
            payload,
        }
    }

    pub fn kind(&self) -> EventKind {
        self.payload.kind()
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Monotonic capture time.
    pub fn captured_at(&self) -> Instant {
        self.captured_at
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn agent_name(&self) -> &str {
        &self.agent_name
    }

    pub fn payload(&self) -> &EventPayload {
        &self.payload
    }

    /// Text carried by a text or thinking delta.
    pub fn delta_text(&self) -> Option<&str> {
        match &self.payload {
            EventPayload::TextDelta(d) => Some(&d.text),
            EventPayload::ThinkingDelta(d) => Some(&d.text),
            _ => None,
        }
    }
}
