//! Run settings built from the command line.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::agents::DEFAULT_CLAUDE_BIN;
use crate::messaging::Phase;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Working directory does not exist: {0}")]
    MissingWorkingDir(PathBuf),
    #[error("Working directory is not a directory: {0}")]
    NotADirectory(PathBuf),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// What the event subscribers show.
///
/// The toggles are independent; the binary registers the JSON-lines emitter
/// instead of the terminal renderer when `json_events` is set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamSettings {
    pub show_thinking: bool,
    pub show_tools: bool,
    pub json_events: bool,
    /// No human-readable output at all.
    pub quiet: bool,
    /// Colour the terminal renderer.
    pub color: bool,
}

impl StreamSettings {
    /// Whether the terminal renderer should be attached.
    pub fn renders_terminal(&self) -> bool {
        !self.quiet && !self.json_events
    }
}

/// How the pipeline runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineSettings {
    /// Absolute working directory for the agents and their artifacts.
    pub working_dir: PathBuf,
    /// Model override for every agent.
    pub model: Option<String>,
    pub claude_bin: PathBuf,
    /// Request partial messages so text arrives as it is generated.
    pub stream_partial: bool,
    /// Run only this phase.
    pub only_phase: Option<Phase>,
    /// Pass `.mcp.json` servers to the agents.
    pub use_mcp: bool,
}

impl PipelineSettings {
    /// Settings for `working_dir`, which must exist.
    pub fn new(working_dir: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let dir = working_dir.as_ref();
        if !dir.exists() {
            return Err(SettingsError::MissingWorkingDir(dir.to_path_buf()));
        }
        if !dir.is_dir() {
            return Err(SettingsError::NotADirectory(dir.to_path_buf()));
        }
        Ok(Self {
            working_dir: dir.canonicalize()?,
            model: None,
            claude_bin: PathBuf::from(DEFAULT_CLAUDE_BIN),
            stream_partial: false,
            only_phase: None,
            use_mcp: true,
        })
    }

    /// Phases to run, in order.
    pub fn phases(&self) -> Vec<Phase> {
        match self.only_phase {
            Some(phase) => vec![phase],
            None => Phase::ALL.to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_pipeline_settings_defaults() {
        let temp = TempDir::new().unwrap();
        let settings = PipelineSettings::new(temp.path()).unwrap();

        assert!(settings.working_dir.is_absolute());
        assert_eq!(settings.claude_bin, PathBuf::from("claude"));
        assert!(settings.model.is_none());
        assert!(!settings.stream_partial);
        assert!(settings.use_mcp);
        assert_eq!(settings.phases(), Phase::ALL.to_vec());
    }

    #[test]
    fn test_single_phase() {
        let temp = TempDir::new().unwrap();
        let mut settings = PipelineSettings::new(temp.path()).unwrap();
        settings.only_phase = Some(Phase::Planning);
        assert_eq!(settings.phases(), vec![Phase::Planning]);
    }

    #[test]
    fn test_missing_working_dir() {
        let err = PipelineSettings::new("/definitely/not/here").unwrap_err();
        assert!(matches!(err, SettingsError::MissingWorkingDir(_)));
        assert!(err.to_string().contains("/definitely/not/here"));
    }

    #[test]
    fn test_working_dir_must_be_directory() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("file.txt");
        std::fs::write(&file, "x").unwrap();

        let err = PipelineSettings::new(&file).unwrap_err();
        assert!(matches!(err, SettingsError::NotADirectory(_)));
    }

    #[test]
    fn test_stream_settings_terminal_selection() {
        let mut stream = StreamSettings::default();
        assert!(stream.renders_terminal());

        stream.json_events = true;
        assert!(!stream.renders_terminal());

        stream.json_events = false;
        stream.quiet = true;
        assert!(!stream.renders_terminal());
    }
}
