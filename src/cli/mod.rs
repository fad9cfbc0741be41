//! CLI components.

pub mod runner;

pub use runner::{
    build_handler, cancel_on_ctrl_c, run_interactive, run_single_task, PromptLine,
};
