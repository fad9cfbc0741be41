//! What the pipeline is asked to do.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

static ISSUE_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https?://github\.com/([^/]+)/([^/]+)/issues/(\d+)").expect("valid issue pattern")
});

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TaskInputError {
    #[error("No task or issue URL provided")]
    Empty,
    #[error("Invalid GitHub issue URL: {0} (expected https://github.com/owner/repo/issues/123)")]
    InvalidIssueUrl(String),
}

/// A GitHub issue reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GithubIssue {
    pub owner: String,
    pub repo: String,
    pub number: u64,
    pub url: String,
}

impl GithubIssue {
    /// Parse `https://github.com/<owner>/<repo>/issues/<n>`.
    pub fn parse(url: &str) -> Result<Self, TaskInputError> {
        let url = url.trim();
        let caps = ISSUE_URL
            .captures(url)
            .ok_or_else(|| TaskInputError::InvalidIssueUrl(url.to_string()))?;
        let number = caps[3]
            .parse()
            .map_err(|_| TaskInputError::InvalidIssueUrl(url.to_string()))?;
        Ok(Self {
            owner: caps[1].to_string(),
            repo: caps[2].to_string(),
            number,
            url: url.to_string(),
        })
    }
}

impl fmt::Display for GithubIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}#{}", self.owner, self.repo, self.number)
    }
}

/// A coding task: free text, a GitHub issue, or both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskInput {
    task: Option<String>,
    issue: Option<GithubIssue>,
}

impl TaskInput {
    pub fn new(task: Option<&str>, issue_url: Option<&str>) -> Result<Self, TaskInputError> {
        let task = task
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(String::from);
        let issue = issue_url.map(GithubIssue::parse).transpose()?;
        if task.is_none() && issue.is_none() {
            return Err(TaskInputError::Empty);
        }
        Ok(Self { task, issue })
    }

    /// A plain text task.
    pub fn text(task: &str) -> Result<Self, TaskInputError> {
        Self::new(Some(task), None)
    }

    pub fn task(&self) -> Option<&str> {
        self.task.as_deref()
    }

    pub fn issue(&self) -> Option<&GithubIssue> {
        self.issue.as_ref()
    }

    /// The description handed to every agent.
    pub fn description(&self) -> String {
        match (&self.issue, &self.task) {
            (Some(issue), Some(task)) => format!(
                "Implement GitHub issue: {}\n\nAdditional context: {}",
                issue.url, task
            ),
            (Some(issue), None) => format!("Implement GitHub issue: {}", issue.url),
            (None, Some(task)) => task.clone(),
            (None, None) => String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_issue_url() {
        let issue = GithubIssue::parse("https://github.com/acme/widgets/issues/42").unwrap();
        assert_eq!(issue.owner, "acme");
        assert_eq!(issue.repo, "widgets");
        assert_eq!(issue.number, 42);
        assert_eq!(issue.to_string(), "acme/widgets#42");
    }

    #[test]
    fn test_parse_issue_url_accepts_http_and_suffix() {
        let issue = GithubIssue::parse("http://github.com/a/b/issues/7#issuecomment-1").unwrap();
        assert_eq!(issue.number, 7);
    }

    #[test]
    fn test_parse_invalid_issue_urls() {
        for url in [
            "https://github.com/acme/widgets/pull/42",
            "https://gitlab.com/acme/widgets/issues/42",
            "github.com/acme/widgets/issues/42",
            "https://github.com/acme/widgets/issues/abc",
        ] {
            assert!(
                matches!(GithubIssue::parse(url), Err(TaskInputError::InvalidIssueUrl(_))),
                "{} should be rejected",
                url
            );
        }
    }

    #[test]
    fn test_task_description_variants() {
        let url = "https://github.com/acme/widgets/issues/42";

        let both = TaskInput::new(Some("use tokio"), Some(url)).unwrap();
        assert_eq!(
            both.description(),
            "Implement GitHub issue: https://github.com/acme/widgets/issues/42\n\nAdditional context: use tokio"
        );

        let issue_only = TaskInput::new(None, Some(url)).unwrap();
        assert_eq!(
            issue_only.description(),
            "Implement GitHub issue: https://github.com/acme/widgets/issues/42"
        );

        let text = TaskInput::text("  Add a --json flag  ").unwrap();
        assert_eq!(text.description(), "Add a --json flag");
        assert!(text.issue().is_none());
    }

    #[test]
    fn test_empty_task_rejected() {
        assert_eq!(TaskInput::new(None, None), Err(TaskInputError::Empty));
        assert_eq!(TaskInput::new(Some("   "), None), Err(TaskInputError::Empty));
    }

    #[test]
    fn test_invalid_issue_rejected_even_with_task() {
        let err = TaskInput::new(Some("task"), Some("not a url")).unwrap_err();
        assert_eq!(err, TaskInputError::InvalidIssueUrl("not a url".to_string()));
    }
}
