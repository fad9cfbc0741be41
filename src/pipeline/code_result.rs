//! Parsing the coder's final report.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

static JSON_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```json\s*(.*?)\s*```").expect("valid json block pattern"));
static CREATED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[Cc]reated:\s*`([^`]+)`").expect("valid created pattern"));
static MODIFIED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[Mm]odified:\s*`([^`]+)`").expect("valid modified pattern"));
static ERROR_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\berrors?\b").expect("valid error pattern"));
static SUCCESS_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bsuccess\b").expect("valid success pattern"));

/// Characters of free text kept as the summary when there is no JSON report.
const SUMMARY_CHARS: usize = 1000;

/// What the coder says it did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodeResult {
    pub files_created: Vec<String>,
    pub files_modified: Vec<String>,
    pub summary: String,
    pub success: bool,
    pub errors: Vec<String>,
}

impl Default for CodeResult {
    fn default() -> Self {
        Self {
            files_created: Vec::new(),
            files_modified: Vec::new(),
            summary: String::new(),
            success: true,
            errors: Vec::new(),
        }
    }
}

impl CodeResult {
    /// Parse the coder's final text.
    ///
    /// A fenced ```json block wins; otherwise file lists are scraped from
    /// ``Created: `path` `` and ``Modified: `path` `` lines and success is
    /// guessed from the wording.
    pub fn parse(response: &str) -> Self {
        if let Some(caps) = JSON_BLOCK.captures(response) {
            match serde_json::from_str::<CodeResult>(&caps[1]) {
                Ok(result) => return result,
                Err(e) => debug!(error = %e, "Coder JSON report did not parse; scraping text"),
            }
        }

        let files_created = CREATED
            .captures_iter(response)
            .map(|c| c[1].to_string())
            .collect();
        let files_modified = MODIFIED
            .captures_iter(response)
            .map(|c| c[1].to_string())
            .collect();
        let success = !ERROR_WORD.is_match(response) || SUCCESS_WORD.is_match(response);

        Self {
            files_created,
            files_modified,
            summary: response.chars().take(SUMMARY_CHARS).collect(),
            success,
            errors: Vec::new(),
        }
    }

    /// Markdown summary saved as the implementation artifact.
    pub fn to_markdown(&self) -> String {
        let mut out = String::from("# Implementation Summary\n\n");
        out.push_str(&format!(
            "**Status:** {}\n\n",
            if self.success { "success" } else { "failed" }
        ));
        if !self.summary.is_empty() {
            out.push_str(self.summary.trim());
            out.push_str("\n\n");
        }
        push_list(&mut out, "Files created", &self.files_created);
        push_list(&mut out, "Files modified", &self.files_modified);
        push_list(&mut out, "Errors", &self.errors);
        out
    }
}

fn push_list(out: &mut String, title: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    out.push_str(&format!("## {}\n\n", title));
    for item in items {
        out.push_str(&format!("- `{}`\n", item));
    }
    out.push('\n');
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_json_report() {
        let response = r#"All parts are done.

```json
{
  "files_created": ["src/cli.rs"],
  "files_modified": ["src/main.rs", "Cargo.toml"],
  "summary": "Added a --json flag",
  "success": true,
  "errors": []
}
```"#;
        let result = CodeResult::parse(response);
        assert_eq!(result.files_created, vec!["src/cli.rs"]);
        assert_eq!(result.files_modified, vec!["src/main.rs", "Cargo.toml"]);
        assert_eq!(result.summary, "Added a --json flag");
        assert!(result.success);
    }

    #[test]
    fn test_parse_partial_json_uses_defaults() {
        let result = CodeResult::parse("```json\n{\"summary\": \"only this\"}\n```");
        assert_eq!(result.summary, "only this");
        assert!(result.success);
        assert!(result.files_created.is_empty());
    }

    #[test]
    fn test_parse_json_reporting_failure() {
        let result =
            CodeResult::parse("```json\n{\"success\": false, \"errors\": [\"tests fail\"]}\n```");
        assert!(!result.success);
        assert_eq!(result.errors, vec!["tests fail"]);
    }

    #[test]
    fn test_parse_text_fallback() {
        let response = "Created: `src/a.rs`\nmodified: `src/lib.rs`\nCreated: `tests/a.rs`";
        let result = CodeResult::parse(response);
        assert_eq!(result.files_created, vec!["src/a.rs", "tests/a.rs"]);
        assert_eq!(result.files_modified, vec!["src/lib.rs"]);
        assert!(result.success);
        assert_eq!(result.summary, response);
    }

    #[test]
    fn test_parse_broken_json_falls_back_to_text() {
        let response = "```json\n{ nope\n```\nCreated: `x.rs`";
        let result = CodeResult::parse(response);
        assert_eq!(result.files_created, vec!["x.rs"]);
    }

    #[test]
    fn test_success_guess_from_wording() {
        assert!(!CodeResult::parse("There were errors compiling").success);
        assert!(CodeResult::parse("Fixed two errors, build is a success").success);
        assert!(CodeResult::parse("Done").success);
    }

    #[test]
    fn test_summary_truncated() {
        let long = "x".repeat(5000);
        assert_eq!(CodeResult::parse(&long).summary.len(), 1000);
    }

    #[test]
    fn test_to_markdown() {
        let result = CodeResult {
            files_created: vec!["a.rs".into()],
            summary: "Did it".into(),
            ..Default::default()
        };
        let md = result.to_markdown();
        assert!(md.contains("**Status:** success"));
        assert!(md.contains("## Files created\n\n- `a.rs`"));
        assert!(!md.contains("Files modified"));
    }
}
