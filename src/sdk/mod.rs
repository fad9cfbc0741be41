//! Wire types for the external agent's `stream-json` output.
//!
//! The `claude` CLI writes one JSON object per line when run with
//! `--output-format stream-json`. Each line is one of a handful of shapes,
//! discriminated by its `type` field:
//!
//! ```json
//! {"type": "system", "subtype": "init", "session_id": "...", "model": "..."}
//! {"type": "assistant", "message": {"content": [{"type": "text", "text": "..."}]}}
//! {"type": "user", "message": {"content": [{"type": "tool_result", "tool_use_id": "..."}]}}
//! {"type": "stream_event", "event": {"type": "content_block_delta", "index": 0, "delta": {...}}}
//! {"type": "result", "subtype": "success", "is_error": false, "result": "..."}
//! ```
//!
//! Every field is defaulted so that a line with missing or unexpected content
//! still decodes into something usable, and every tagged enum carries a
//! catch-all arm so that shapes added upstream decode to `Unknown`/`Other`
//! instead of failing.

mod messages;

pub use messages::*;
