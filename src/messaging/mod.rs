//! Messaging system for code-agent.
//!
//! Raw agent output is translated into typed events and fanned out to any
//! number of independent consumers:
//!
//! - The [`MessageProcessor`] turns each raw message into zero or more [`Event`]s
//! - The [`StreamHandler`] delivers every event to its subscribers, in order
//! - **Subscribers** (terminal, JSON lines, tests) render or record events
//!
//! ## Architecture
//!
//! ```text
//!     ┌────────────────────────────┐
//!     │        AgentRunner         │
//!     │  (claude CLI stream-json)  │
//!     └────────────┬───────────────┘
//!                  │ RawMessage
//!     ┌────────────┴───────────────┐
//!     │     MessageProcessor       │
//!     │   (RawMessage → Event)     │
//!     └────────────┬───────────────┘
//!                  │ emit
//!           ┌──────┴───────┐
//!           │ StreamHandler│
//!           └──────┬───────┘
//!                  │ kind subscribers, then wildcard
//!           ┌──────┴──────────────┐
//!           ▼                     ▼
//!     ┌──────────┐         ┌────────────┐
//!     │ Terminal │         │ JSON lines │
//!     │ Renderer │         │  (NDJSON)  │
//!     └──────────┘         └────────────┘
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! use code_agent::messaging::{MessageProcessor, StreamHandler, TerminalRenderer};
//!
//! let handler = StreamHandler::new();
//! handler.attach(Arc::new(TerminalRenderer::new().show_tools(true)));
//!
//! let mut processor = MessageProcessor::new("coder", session_id);
//! while let Some(raw) = stream.recv().await {
//!     for event in processor.process(raw?) {
//!         handler.emit(&event);
//!     }
//! }
//! ```
//!
//! Delivery is synchronous: `emit` returns once every subscriber has seen the
//! event, so subscribers observe events in exactly the order they were emitted.

mod bus;
mod json_lines;
mod processor;
mod renderer;
mod types;

pub use bus::{
    DispatchError, EventSubscriber, StreamHandler, SubscriberError, SubscriberFailure,
    SubscriberResult, SubscriptionId,
};
pub use json_lines::JsonLinesEmitter;
pub use processor::MessageProcessor;
pub use renderer::{RenderStyle, TerminalRenderer};
pub use types::*;
