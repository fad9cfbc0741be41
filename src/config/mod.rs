//! Configuration management.

mod settings;

pub use settings::{PipelineSettings, SettingsError, StreamSettings};
