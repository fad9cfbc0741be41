//! Raw message shapes emitted by the external agent.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

/// One unit from the external agent's output stream.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RawMessage {
    /// Session lifecycle notices (`init`, `compact_boundary`, ...).
    System(SystemMessage),
    /// A complete assistant turn with its content blocks.
    Assistant(ConversationMessage),
    /// A user turn; in practice this carries tool results.
    User(ConversationMessage),
    /// An incremental streaming unit (only with `--include-partial-messages`).
    StreamEvent(PartialMessage),
    /// Final summary of the run.
    Result(ResultMessage),
    /// Anything else.
    #[serde(other)]
    Unknown,
}

impl RawMessage {
    /// Decode one line of `stream-json` output.
    ///
    /// Lines that are not valid JSON, or whose shape cannot be decoded, map to
    /// [`RawMessage::Unknown`].
    pub fn from_line(line: &str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return Self::Unknown;
        }
        match serde_json::from_str(line) {
            Ok(message) => message,
            Err(e) => {
                debug!(error = %e, "Ignoring undecodable stream line");
                Self::Unknown
            }
        }
    }

    /// Whether this is the terminal result message.
    pub fn is_result(&self) -> bool {
        matches!(self, Self::Result(_))
    }
}

/// `{"type": "system", ...}`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SystemMessage {
    pub subtype: String,
    pub session_id: Option<String>,
    pub model: Option<String>,
    pub cwd: Option<String>,
    pub tools: Vec<String>,
    /// Fields this crate does not interpret, kept for progress payloads.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SystemMessage {
    pub fn is_init(&self) -> bool {
        self.subtype == "init"
    }
}

/// `{"type": "assistant" | "user", "message": {...}}`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ConversationMessage {
    pub message: MessageBody,
    pub parent_tool_use_id: Option<String>,
    pub session_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MessageBody {
    pub id: Option<String>,
    pub model: Option<String>,
    pub content: MessageContent,
}

/// Message content is either a bare string or a list of blocks.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

impl Default for MessageContent {
    fn default() -> Self {
        Self::Blocks(Vec::new())
    }
}

impl MessageContent {
    /// View the content as blocks; a bare string becomes one text block.
    pub fn into_blocks(self) -> Vec<ContentBlock> {
        match self {
            Self::Text(text) => vec![ContentBlock::Text { text }],
            Self::Blocks(blocks) => blocks,
        }
    }
}

/// A content block inside a message, or the `content_block` of a
/// `content_block_start` stream event.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        #[serde(default)]
        text: String,
    },
    Thinking {
        #[serde(default)]
        thinking: String,
    },
    ToolUse {
        #[serde(default)]
        id: String,
        #[serde(default)]
        name: String,
        #[serde(default)]
        input: Value,
    },
    ToolResult {
        #[serde(default)]
        tool_use_id: String,
        #[serde(default)]
        content: Option<ToolResultContent>,
        #[serde(default)]
        is_error: Option<bool>,
    },
    #[serde(other)]
    Unknown,
}

impl Default for ContentBlock {
    fn default() -> Self {
        Self::Unknown
    }
}

/// Tool output: a string, or a list of typed parts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ToolResultContent {
    Text(String),
    Parts(Vec<Value>),
}

impl ToolResultContent {
    /// Flatten to text, joining the `text` of each part with newlines.
    pub fn to_text(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Parts(parts) => parts
                .iter()
                .filter_map(|part| part.get("text").and_then(Value::as_str))
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

/// `{"type": "stream_event", "event": {...}}`
#[derive(Debug, Clone, Deserialize)]
pub struct PartialMessage {
    pub event: StreamDelta,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub parent_tool_use_id: Option<String>,
}

/// The inner event of a partial message.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamDelta {
    ContentBlockStart {
        #[serde(default)]
        index: u64,
        #[serde(default)]
        content_block: ContentBlock,
    },
    ContentBlockDelta {
        #[serde(default)]
        index: u64,
        delta: BlockDelta,
    },
    ContentBlockStop {
        #[serde(default)]
        index: u64,
    },
    /// `message_start`, `message_delta`, `message_stop`, `ping`, ...
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BlockDelta {
    TextDelta {
        #[serde(default)]
        text: String,
    },
    ThinkingDelta {
        #[serde(default)]
        thinking: String,
    },
    InputJsonDelta {
        #[serde(default)]
        partial_json: String,
    },
    /// `signature_delta`, `citations_delta`, ...
    #[serde(other)]
    Other,
}

/// `{"type": "result", ...}`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ResultMessage {
    pub subtype: String,
    pub is_error: bool,
    pub result: Option<String>,
    pub duration_ms: Option<u64>,
    pub num_turns: Option<u32>,
    pub total_cost_usd: Option<f64>,
    pub usage: Option<Value>,
    pub session_id: Option<String>,
}

impl ResultMessage {
    pub fn is_success(&self) -> bool {
        self.subtype == "success" && !self.is_error
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_system_init() {
        let msg = RawMessage::from_line(
            r#"{"type":"system","subtype":"init","session_id":"abc","model":"claude-sonnet","cwd":"/tmp","tools":["Read","Bash"],"permissionMode":"default"}"#,
        );
        match msg {
            RawMessage::System(sys) => {
                assert!(sys.is_init());
                assert_eq!(sys.session_id.as_deref(), Some("abc"));
                assert_eq!(sys.tools, vec!["Read", "Bash"]);
                assert_eq!(sys.extra.get("permissionMode"), Some(&json!("default")));
            }
            other => panic!("Expected System message, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_assistant_blocks() {
        let msg = RawMessage::from_line(
            r#"{"type":"assistant","message":{"id":"msg_1","content":[
                {"type":"text","text":"Looking"},
                {"type":"tool_use","id":"toolu_1","name":"Read","input":{"file_path":"a.rs"}},
                {"type":"thinking","thinking":"hmm","signature":"x"}
            ]}}"#,
        );
        let RawMessage::Assistant(conv) = msg else {
            panic!("Expected Assistant message");
        };
        let blocks = conv.message.content.into_blocks();
        assert_eq!(blocks.len(), 3);
        assert!(matches!(&blocks[0], ContentBlock::Text { text } if text == "Looking"));
        assert!(matches!(&blocks[1], ContentBlock::ToolUse { name, .. } if name == "Read"));
        assert!(matches!(&blocks[2], ContentBlock::Thinking { thinking } if thinking == "hmm"));
    }

    #[test]
    fn test_parse_user_tool_result_parts() {
        let msg = RawMessage::from_line(
            r#"{"type":"user","message":{"role":"user","content":[
                {"type":"tool_result","tool_use_id":"toolu_1","content":[{"type":"text","text":"line 1"},{"type":"text","text":"line 2"}]}
            ]}}"#,
        );
        let RawMessage::User(conv) = msg else {
            panic!("Expected User message");
        };
        let blocks = conv.message.content.into_blocks();
        match &blocks[0] {
            ContentBlock::ToolResult {
                tool_use_id,
                content,
                is_error,
            } => {
                assert_eq!(tool_use_id, "toolu_1");
                assert_eq!(content.as_ref().unwrap().to_text(), "line 1\nline 2");
                assert!(is_error.is_none());
            }
            other => panic!("Expected ToolResult, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_string_content_becomes_text_block() {
        let msg = RawMessage::from_line(r#"{"type":"user","message":{"content":"do the thing"}}"#);
        let RawMessage::User(conv) = msg else {
            panic!("Expected User message");
        };
        let blocks = conv.message.content.into_blocks();
        assert!(matches!(&blocks[0], ContentBlock::Text { text } if text == "do the thing"));
    }

    #[test]
    fn test_parse_stream_deltas() {
        let text = RawMessage::from_line(
            r#"{"type":"stream_event","event":{"type":"content_block_delta","index":2,"delta":{"type":"text_delta","text":"Hel"}}}"#,
        );
        match text {
            RawMessage::StreamEvent(PartialMessage {
                event: StreamDelta::ContentBlockDelta { index, delta },
                ..
            }) => {
                assert_eq!(index, 2);
                assert!(matches!(delta, BlockDelta::TextDelta { text } if text == "Hel"));
            }
            other => panic!("Expected content_block_delta, got {:?}", other),
        }

        let signature = RawMessage::from_line(
            r#"{"type":"stream_event","event":{"type":"content_block_delta","index":0,"delta":{"type":"signature_delta","signature":"zz"}}}"#,
        );
        assert!(matches!(
            signature,
            RawMessage::StreamEvent(PartialMessage {
                event: StreamDelta::ContentBlockDelta {
                    delta: BlockDelta::Other,
                    ..
                },
                ..
            })
        ));

        let stop = RawMessage::from_line(
            r#"{"type":"stream_event","event":{"type":"message_stop"}}"#,
        );
        assert!(matches!(
            stop,
            RawMessage::StreamEvent(PartialMessage {
                event: StreamDelta::Other,
                ..
            })
        ));
    }

    #[test]
    fn test_parse_result() {
        let msg = RawMessage::from_line(
            r#"{"type":"result","subtype":"success","is_error":false,"result":"done","num_turns":3,"total_cost_usd":0.12,"usage":{"input_tokens":10}}"#,
        );
        let RawMessage::Result(result) = msg else {
            panic!("Expected Result message");
        };
        assert!(result.is_success());
        assert_eq!(result.result.as_deref(), Some("done"));
        assert_eq!(result.num_turns, Some(3));
        assert_eq!(result.total_cost_usd, Some(0.12));
    }

    #[test]
    fn test_is_result() {
        assert!(
            RawMessage::from_line(r#"{"type":"result","subtype":"error_max_turns","is_error":true}"#)
                .is_result()
        );
        assert!(!RawMessage::from_line(r#"{"type":"system","subtype":"init"}"#).is_result());
    }

    #[test]
    fn test_error_result_is_not_success() {
        let msg = RawMessage::from_line(
            r#"{"type":"result","subtype":"error_during_execution","is_error":true}"#,
        );
        let RawMessage::Result(result) = msg else {
            panic!("Expected Result message");
        };
        assert!(!result.is_success());
    }

    #[test]
    fn test_unknown_shapes_decode_to_unknown() {
        assert!(matches!(
            RawMessage::from_line(r#"{"type":"telemetry","x":1}"#),
            RawMessage::Unknown
        ));
        assert!(matches!(RawMessage::from_line("not json"), RawMessage::Unknown));
        assert!(matches!(RawMessage::from_line(""), RawMessage::Unknown));
        assert!(matches!(RawMessage::from_line("[1,2,3]"), RawMessage::Unknown));
    }

    #[test]
    fn test_tool_use_missing_fields_defaults() {
        let msg = RawMessage::from_line(
            r#"{"type":"assistant","message":{"content":[{"type":"tool_use","id":"toolu_9"}]}}"#,
        );
        let RawMessage::Assistant(conv) = msg else {
            panic!("Expected Assistant message");
        };
        match &conv.message.content.into_blocks()[0] {
            ContentBlock::ToolUse { id, name, input } => {
                assert_eq!(id, "toolu_9");
                assert!(name.is_empty());
                assert!(input.is_null());
            }
            other => panic!("Expected ToolUse, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_block_type_is_tolerated() {
        let msg = RawMessage::from_line(
            r#"{"type":"assistant","message":{"content":[{"type":"server_tool_use","id":"s1"},{"type":"text","text":"ok"}]}}"#,
        );
        let RawMessage::Assistant(conv) = msg else {
            panic!("Expected Assistant message");
        };
        let blocks = conv.message.content.into_blocks();
        assert!(matches!(blocks[0], ContentBlock::Unknown));
        assert!(matches!(&blocks[1], ContentBlock::Text { text } if text == "ok"));
    }
}
