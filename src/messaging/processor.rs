//! Translation from raw agent output into typed [`Event`]s.
//!
//! The processor is a pure step: it never publishes anything itself. The
//! caller feeds every event it returns to a [`StreamHandler`], in order.
//!
//! [`StreamHandler`]: super::StreamHandler

use std::collections::{BTreeMap, HashSet};

use serde_json::{json, Value};
use tracing::{debug, warn};

use super::{
    Event, EventPayload, Phase, SessionCompleteMessage, SessionInitMessage, ToolResultMessage,
};
use crate::sdk::{
    BlockDelta, ContentBlock, ConversationMessage, PartialMessage, RawMessage, ResultMessage,
    StreamDelta, SystemMessage,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Channel {
    Text,
    Thinking,
    Tool,
}

/// A content block seen through `content_block_start` or a first delta.
struct OpenBlock {
    channel: Channel,
    /// Deltas held back while another block of the same channel is active.
    queued: Vec<String>,
    /// `content_block_stop` arrived while the block was still queued.
    stopped: bool,
    tool: Option<ToolAccumulator>,
}

impl OpenBlock {
    fn new(channel: Channel) -> Self {
        Self {
            channel,
            queued: Vec::new(),
            stopped: false,
            tool: None,
        }
    }
}

/// Tool input arriving as `input_json_delta` fragments.
struct ToolAccumulator {
    id: String,
    name: String,
    initial_input: Value,
    args_buffer: String,
}

impl ToolAccumulator {
    fn finish(self) -> (String, String, Value) {
        let input = if self.args_buffer.trim().is_empty() {
            normalize_input(self.initial_input)
        } else {
            match serde_json::from_str(&self.args_buffer) {
                Ok(value) => normalize_input(value),
                Err(e) => {
                    debug!(tool = %self.name, error = %e, "Tool input is not valid JSON");
                    json!({ "_raw": self.args_buffer })
                }
            }
        };
        (self.id, self.name, input)
    }
}

/// Converts one agent run's raw messages into events.
///
/// Guarantees for the events it returns:
/// - `SessionInit` comes first and at most once (synthesized if the agent
///   sends content before its init notice);
/// - `SessionComplete` comes last and at most once;
/// - deltas of one block are in order and never interleaved with deltas of
///   another block on the same channel;
/// - every `ToolResult` either pairs with an earlier `ToolStart` or is
///   flagged `unmatched`.
pub struct MessageProcessor {
    agent_name: String,
    session_id: String,
    initialized: bool,
    completed: bool,
    /// Partial stream events have been seen, so full assistant messages
    /// repeat content that was already emitted.
    streaming: bool,
    blocks: BTreeMap<u64, OpenBlock>,
    active_text: Option<u64>,
    active_thinking: Option<u64>,
    started_tools: HashSet<String>,
    open_tools: HashSet<String>,
    current_phase: Option<Phase>,
    finished_phases: HashSet<Phase>,
}

impl MessageProcessor {
    /// Create a processor for one run.
    pub fn new(agent_name: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self {
            agent_name: agent_name.into(),
            session_id: session_id.into(),
            initialized: false,
            completed: false,
            streaming: false,
            blocks: BTreeMap::new(),
            active_text: None,
            active_thinking: None,
            started_tools: HashSet::new(),
            open_tools: HashSet::new(),
            current_phase: None,
            finished_phases: HashSet::new(),
        }
    }

    pub fn agent_name(&self) -> &str {
        &self.agent_name
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Whether `SessionComplete` has been emitted.
    pub fn is_complete(&self) -> bool {
        self.completed
    }

    /// Tool invocations that have started but not yet reported a result.
    pub fn open_tool_count(&self) -> usize {
        self.open_tools.len()
    }

    fn event(&self, payload: EventPayload) -> Event {
        Event::new(&self.agent_name, &self.session_id, payload)
    }

    /// Process one raw message.
    ///
    /// This is the main entry point - call it for each message from the stream.
    pub fn process(&mut self, message: RawMessage) -> Vec<Event> {
        if self.completed {
            debug!(agent = %self.agent_name, "Ignoring message after session completed");
            return Vec::new();
        }

        let mut events = match message {
            RawMessage::System(system) => self.process_system(system),
            RawMessage::Assistant(conversation) => self.process_assistant(conversation),
            RawMessage::User(conversation) => self.process_user(conversation),
            RawMessage::StreamEvent(partial) => self.process_partial(partial),
            RawMessage::Result(result) => self.process_result(result),
            RawMessage::Unknown => Vec::new(),
        };

        if !events.is_empty() && !self.initialized {
            self.initialized = true;
            events.insert(
                0,
                self.event(EventPayload::SessionInit(SessionInitMessage::default())),
            );
        }
        events
    }

    fn process_system(&mut self, system: SystemMessage) -> Vec<Event> {
        if system.is_init() {
            if self.initialized {
                debug!(agent = %self.agent_name, "Duplicate session init ignored");
                return Vec::new();
            }
            if let Some(ref remote) = system.session_id {
                if remote != &self.session_id {
                    debug!(local = %self.session_id, remote = %remote, "Agent reported a different session id");
                }
            }
            self.initialized = true;
            return vec![self.event(EventPayload::SessionInit(SessionInitMessage {
                model: system.model,
                cwd: system.cwd,
                tools: system.tools,
            }))];
        }

        let data = if system.extra.is_empty() {
            None
        } else {
            Some(Value::Object(system.extra))
        };
        vec![self.event(EventPayload::Progress(super::ProgressMessage {
            message: system.subtype,
            data,
        }))]
    }

    fn process_assistant(&mut self, conversation: ConversationMessage) -> Vec<Event> {
        // Sub-agent turns are not streamed as partials, so only top-level
        // turns repeat already-emitted content.
        let repeats_stream = self.streaming && conversation.parent_tool_use_id.is_none();
        let mut events = Vec::new();

        for block in conversation.message.content.into_blocks() {
            match block {
                ContentBlock::Text { text } => {
                    if !repeats_stream && !text.is_empty() {
                        events.push(self.event(EventPayload::text_delta(text)));
                    }
                }
                ContentBlock::Thinking { thinking } => {
                    if !repeats_stream && !thinking.is_empty() {
                        events.push(self.event(EventPayload::thinking_delta(thinking)));
                    }
                }
                ContentBlock::ToolUse { id, name, input } => {
                    if self.already_started(&id) {
                        continue;
                    }
                    events.push(self.tool_start(id, name, normalize_input(input)));
                }
                ContentBlock::ToolResult {
                    tool_use_id,
                    content,
                    is_error,
                } => {
                    let output = content.map(|c| c.to_text()).unwrap_or_default();
                    events.push(self.tool_result(tool_use_id, output, is_error.unwrap_or(false)));
                }
                ContentBlock::Unknown => {}
            }
        }
        events
    }

    fn process_user(&mut self, conversation: ConversationMessage) -> Vec<Event> {
        let mut events = Vec::new();
        for block in conversation.message.content.into_blocks() {
            // Plain user text is the prompt echo; only tool results matter.
            if let ContentBlock::ToolResult {
                tool_use_id,
                content,
                is_error,
            } = block
            {
                let output = content.map(|c| c.to_text()).unwrap_or_default();
                events.push(self.tool_result(tool_use_id, output, is_error.unwrap_or(false)));
            }
        }
        events
    }

    fn process_partial(&mut self, partial: PartialMessage) -> Vec<Event> {
        match partial.event {
            StreamDelta::ContentBlockStart {
                index,
                content_block,
            } => {
                self.streaming = true;
                self.start_block(index, content_block)
            }
            StreamDelta::ContentBlockDelta { index, delta } => {
                self.streaming = true;
                match delta {
                    BlockDelta::TextDelta { text } => self.push_delta(index, Channel::Text, text),
                    BlockDelta::ThinkingDelta { thinking } => {
                        self.push_delta(index, Channel::Thinking, thinking)
                    }
                    BlockDelta::InputJsonDelta { partial_json } => {
                        if let Some(tool) = self
                            .blocks
                            .get_mut(&index)
                            .and_then(|block| block.tool.as_mut())
                        {
                            tool.args_buffer.push_str(&partial_json);
                        }
                        Vec::new()
                    }
                    BlockDelta::Other => Vec::new(),
                }
            }
            StreamDelta::ContentBlockStop { index } => self.stop_block(index),
            StreamDelta::Other => Vec::new(),
        }
    }

    fn process_result(&mut self, result: ResultMessage) -> Vec<Event> {
        let mut events = self.drain_queued();
        if !self.open_tools.is_empty() {
            debug!(open = self.open_tools.len(), "Session ended with tools still open");
        }
        self.completed = true;
        events.push(self.event(EventPayload::SessionComplete(SessionCompleteMessage {
            success: result.is_success(),
            cancelled: false,
            subtype: result.subtype,
            result: result.result,
            duration_ms: result.duration_ms,
            num_turns: result.num_turns,
            total_cost_usd: result.total_cost_usd,
            usage: result.usage,
        })));
        events
    }

    // =========================================================================
    // Block bookkeeping
    // =========================================================================

    fn active(&self, channel: Channel) -> Option<u64> {
        match channel {
            Channel::Text => self.active_text,
            Channel::Thinking => self.active_thinking,
            Channel::Tool => None,
        }
    }

    fn set_active(&mut self, channel: Channel, index: Option<u64>) {
        match channel {
            Channel::Text => self.active_text = index,
            Channel::Thinking => self.active_thinking = index,
            Channel::Tool => {}
        }
    }

    fn delta_payload(channel: Channel, text: String) -> EventPayload {
        match channel {
            Channel::Thinking => EventPayload::thinking_delta(text),
            _ => EventPayload::text_delta(text),
        }
    }

    fn start_block(&mut self, index: u64, block: ContentBlock) -> Vec<Event> {
        match block {
            ContentBlock::Text { text } => {
                self.blocks.insert(index, OpenBlock::new(Channel::Text));
                self.push_delta(index, Channel::Text, text)
            }
            ContentBlock::Thinking { thinking } => {
                self.blocks.insert(index, OpenBlock::new(Channel::Thinking));
                self.push_delta(index, Channel::Thinking, thinking)
            }
            ContentBlock::ToolUse { id, name, input } => {
                let mut open = OpenBlock::new(Channel::Tool);
                open.tool = Some(ToolAccumulator {
                    id,
                    name,
                    initial_input: input,
                    args_buffer: String::new(),
                });
                self.blocks.insert(index, open);
                Vec::new()
            }
            ContentBlock::ToolResult { .. } | ContentBlock::Unknown => Vec::new(),
        }
    }

    /// Emit a delta now if its block owns the channel, otherwise queue it.
    fn push_delta(&mut self, index: u64, channel: Channel, text: String) -> Vec<Event> {
        if text.is_empty() {
            return Vec::new();
        }

        let block = self
            .blocks
            .entry(index)
            .or_insert_with(|| OpenBlock::new(channel));
        if block.channel != channel {
            debug!(index, "Delta does not match the block's channel; ignoring");
            return Vec::new();
        }

        match self.active(channel) {
            None => {
                self.set_active(channel, Some(index));
                vec![self.event(Self::delta_payload(channel, text))]
            }
            Some(current) if current == index => {
                vec![self.event(Self::delta_payload(channel, text))]
            }
            Some(_) => {
                if let Some(block) = self.blocks.get_mut(&index) {
                    block.queued.push(text);
                }
                Vec::new()
            }
        }
    }

    fn stop_block(&mut self, index: u64) -> Vec<Event> {
        let Some(channel) = self.blocks.get(&index).map(|b| b.channel) else {
            return Vec::new();
        };

        if channel == Channel::Tool {
            let tool = self.blocks.remove(&index).and_then(|b| b.tool);
            return match tool {
                Some(tool) if !self.already_started(&tool.id) => {
                    let (id, name, input) = tool.finish();
                    vec![self.tool_start(id, name, input)]
                }
                _ => Vec::new(),
            };
        }

        if self.active(channel) != Some(index) {
            // Its deltas are still waiting for the channel.
            if let Some(block) = self.blocks.get_mut(&index) {
                block.stopped = true;
            }
            return Vec::new();
        }

        self.blocks.remove(&index);
        self.set_active(channel, None);
        self.promote_next(channel)
    }

    /// Hand the channel to the lowest-index waiting block and flush it.
    fn promote_next(&mut self, channel: Channel) -> Vec<Event> {
        let mut events = Vec::new();
        loop {
            let next = self
                .blocks
                .iter()
                .find(|(_, block)| block.channel == channel)
                .map(|(index, _)| *index);
            let Some(index) = next else {
                break;
            };

            let (queued, stopped) = match self.blocks.get_mut(&index) {
                Some(block) => (std::mem::take(&mut block.queued), block.stopped),
                None => break,
            };
            for text in queued {
                events.push(self.event(Self::delta_payload(channel, text)));
            }

            if stopped {
                self.blocks.remove(&index);
                continue;
            }
            self.set_active(channel, Some(index));
            break;
        }
        events
    }

    /// Flush everything still queued, in block order.
    ///
    /// Tool blocks that never saw their stop are started with whatever input
    /// arrived so far.
    fn drain_queued(&mut self) -> Vec<Event> {
        let blocks = std::mem::take(&mut self.blocks);
        self.active_text = None;
        self.active_thinking = None;

        let mut events = Vec::new();
        for (_, block) in blocks {
            if let Some(tool) = block.tool {
                if !self.already_started(&tool.id) {
                    debug!(tool_use_id = %tool.id, "Tool block never stopped");
                    let (id, name, input) = tool.finish();
                    events.push(self.tool_start(id, name, input));
                }
                continue;
            }
            for text in block.queued {
                events.push(self.event(Self::delta_payload(block.channel, text)));
            }
        }
        events
    }

    // =========================================================================
    // Tools
    // =========================================================================

    /// Ids are only trusted for de-duplication when present.
    fn already_started(&self, id: &str) -> bool {
        !id.is_empty() && self.started_tools.contains(id)
    }

    fn tool_start(&mut self, id: String, name: String, input: Value) -> Event {
        if name.is_empty() {
            debug!(tool_use_id = %id, "Tool use without a name");
        }
        self.started_tools.insert(id.clone());
        self.open_tools.insert(id.clone());
        self.event(EventPayload::tool_start(&name, &id, input))
    }

    fn tool_result(&mut self, tool_use_id: String, output: String, is_error: bool) -> Event {
        let unmatched = !self.started_tools.contains(&tool_use_id);
        if unmatched {
            warn!(
                agent = %self.agent_name,
                tool_use_id = %tool_use_id,
                "Tool result without a matching tool start"
            );
        }
        self.open_tools.remove(&tool_use_id);
        self.event(EventPayload::ToolResult(ToolResultMessage {
            tool_use_id,
            is_error,
            output,
            unmatched,
        }))
    }

    // =========================================================================
    // Phases and lifecycle
    // =========================================================================

    /// Open `phase`, closing the currently open phase first.
    ///
    /// A phase runs START→END at most once per processor; reopening a
    /// finished phase yields nothing.
    pub fn begin_phase(&mut self, phase: Phase) -> Vec<Event> {
        if self.finished_phases.contains(&phase) {
            warn!(phase = %phase, "Phase already completed; not reopening");
            return Vec::new();
        }
        if self.current_phase == Some(phase) {
            return Vec::new();
        }

        let mut events = Vec::new();
        if let Some(open) = self.end_phase() {
            events.push(open);
        }
        self.current_phase = Some(phase);
        events.push(self.event(EventPayload::phase_start(phase)));
        events
    }

    /// Close the open phase, if any.
    pub fn end_phase(&mut self) -> Option<Event> {
        let phase = self.current_phase.take()?;
        self.finished_phases.insert(phase);
        Some(self.event(EventPayload::phase_end(phase)))
    }

    /// The phase currently open.
    pub fn current_phase(&self) -> Option<Phase> {
        self.current_phase
    }

    /// End the session because the run was cancelled.
    pub fn cancel(&mut self, reason: &str) -> Vec<Event> {
        self.abort("cancelled", reason, true)
    }

    /// End the session because the run failed without a result message.
    pub fn fail(&mut self, reason: &str) -> Vec<Event> {
        self.abort("error", reason, false)
    }

    fn abort(&mut self, subtype: &str, reason: &str, cancelled: bool) -> Vec<Event> {
        if self.completed {
            return Vec::new();
        }
        let mut events = Vec::new();
        if !self.initialized {
            self.initialized = true;
            events.push(self.event(EventPayload::SessionInit(SessionInitMessage::default())));
        }
        // Queued fragments are dropped: a cancelled block is incomplete anyway.
        self.blocks.clear();
        self.active_text = None;
        self.active_thinking = None;
        self.completed = true;
        events.push(self.event(EventPayload::SessionComplete(SessionCompleteMessage {
            success: false,
            cancelled,
            subtype: subtype.to_string(),
            result: Some(reason.to_string()),
            ..Default::default()
        })));
        events
    }

    /// A progress note attributed to this processor's agent and session.
    pub fn progress(&self, message: impl Into<String>) -> Event {
        self.event(EventPayload::progress(message))
    }
}

/// Tool input must be a mapping; anything else is wrapped.
fn normalize_input(input: Value) -> Value {
    match input {
        Value::Object(_) => input,
        Value::Null => json!({}),
        other => json!({ "value": other }),
    }
}
