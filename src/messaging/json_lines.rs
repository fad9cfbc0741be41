//! Machine-readable event output.
//!
//! One JSON object per line, suitable for piping into another tool:
//!
//! ```json
//! {"timestamp":"2025-01-01T12:00:00Z","session_id":"...","agent_name":"coder","kind":"text_delta","data":{"text":"Hello"}}
//! {"timestamp":"2025-01-01T12:00:01Z","session_id":"...","agent_name":"coder","kind":"session_complete","data":{"success":true,"subtype":"success"}}
//! ```

use std::io::{self, Write};

use parking_lot::Mutex;

use super::{Event, EventSubscriber, SubscriberResult};

/// Writes every event as a single NDJSON line.
pub struct JsonLinesEmitter {
    out: Mutex<Box<dyn Write + Send>>,
}

impl JsonLinesEmitter {
    /// Emit to stdout.
    pub fn new() -> Self {
        Self::with_writer(io::stdout())
    }

    pub fn with_writer<W>(writer: W) -> Self
    where
        W: Write + Send + 'static,
    {
        Self {
            out: Mutex::new(Box::new(writer)),
        }
    }

    /// Serialize and write one event.
    pub fn write_event(&self, event: &Event) -> SubscriberResult {
        let line = serde_json::to_string(event)?;
        let mut out = self.out.lock();
        writeln!(out, "{}", line)?;
        out.flush()?;
        Ok(())
    }
}

impl Default for JsonLinesEmitter {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSubscriber for JsonLinesEmitter {
    fn on_event(&self, event: &Event) -> SubscriberResult {
        self.write_event(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messaging::{EventPayload, MessageProcessor, StreamHandler};
    use crate::sdk::RawMessage;
    use serde_json::Value;
    use std::sync::Arc;

    #[derive(Clone, Default)]
    struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn parse_lines(buffer: &SharedBuffer) -> Vec<Value> {
        let bytes = buffer.0.lock().clone();
        String::from_utf8(bytes)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).expect("each line is valid JSON"))
            .collect()
    }

    #[test]
    fn test_session_as_json_lines() {
        let buffer = SharedBuffer::default();
        let handler = StreamHandler::new();
        handler.attach(Arc::new(JsonLinesEmitter::with_writer(buffer.clone())));

        let mut processor = MessageProcessor::new("coder", "s-1");
        let lines = [
            r#"{"type":"system","subtype":"init","model":"claude-test"}"#,
            r#"{"type":"stream_event","event":{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"Hello"}}}"#,
            r#"{"type":"stream_event","event":{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":" world"}}}"#,
            r#"{"type":"stream_event","event":{"type":"content_block_stop","index":0}}"#,
            r#"{"type":"assistant","message":{"content":[{"type":"tool_use","id":"t1","name":"read_file","input":{"file_path":"src/lib.rs"}}]}}"#,
            r#"{"type":"user","message":{"content":[{"type":"tool_result","tool_use_id":"t1","content":"pub mod a;"}]}}"#,
            r#"{"type":"result","subtype":"success","is_error":false}"#,
        ];
        for line in lines {
            for event in processor.process(RawMessage::from_line(line)) {
                handler.emit(&event);
            }
        }

        let records = parse_lines(&buffer);
        let kinds: Vec<&str> = records
            .iter()
            .map(|r| r["kind"].as_str().unwrap())
            .collect();
        assert_eq!(
            kinds,
            vec![
                "session_init",
                "text_delta",
                "text_delta",
                "tool_start",
                "tool_result",
                "session_complete",
            ]
        );

        for record in &records {
            assert_eq!(record["session_id"], "s-1");
            assert_eq!(record["agent_name"], "coder");
            assert!(record["timestamp"].as_str().unwrap().ends_with('Z'));
        }
        assert_eq!(records[1]["data"]["text"], "Hello");
        assert_eq!(records[3]["data"]["tool_name"], "read_file");
        assert_eq!(records[3]["data"]["tool_input"]["file_path"], "src/lib.rs");
        assert_eq!(records[5]["data"]["success"], true);
    }

    #[test]
    fn test_one_line_per_event() {
        let buffer = SharedBuffer::default();
        let emitter = JsonLinesEmitter::with_writer(buffer.clone());

        let multiline = Event::new("coder", "s-1", EventPayload::text_delta("a\nb\n"));
        emitter.write_event(&multiline).unwrap();
        emitter
            .write_event(&Event::new("coder", "s-1", EventPayload::progress("p")))
            .unwrap();

        let records = parse_lines(&buffer);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["data"]["text"], "a\nb\n");
        assert_eq!(records[1]["kind"], "progress");
    }

    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_write_failure_is_returned() {
        let emitter = JsonLinesEmitter::with_writer(BrokenPipe);
        let err = emitter
            .on_event(&Event::new("coder", "s-1", EventPayload::session_success()))
            .unwrap_err();
        assert!(err.to_string().contains("closed"));
    }
}
