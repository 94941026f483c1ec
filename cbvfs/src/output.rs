//! Command results, printed as plain lines or as one pretty JSON document.
//!
//! Every JSON document is a [`Report`]: `success` and `result_code` first,
//! then the command's own fields.

use anyhow::Result;
use serde::Serialize;
use std::io::{self, Write};

/// Prints command results in the format picked on the command line.
#[derive(Debug, Clone, Copy)]
pub struct OutputWriter {
    json: bool,
}

impl OutputWriter {
    pub fn new(json: bool) -> Self {
        Self { json }
    }

    /// Print `report` as JSON, or the lines produced by `lines` as text.
    ///
    /// `lines` only runs in text mode.
    pub fn write<T: Serialize>(
        &self,
        report: &Report<T>,
        lines: impl FnOnce() -> Vec<String>,
    ) -> Result<()> {
        let mut stdout = io::stdout().lock();
        if self.json {
            serde_json::to_writer_pretty(&mut stdout, report)?;
            writeln!(stdout)?;
        } else {
            for line in lines() {
                writeln!(stdout, "{}", line)?;
            }
        }
        Ok(())
    }

    /// Report a failed command on stderr.
    pub fn write_error(&self, error: &anyhow::Error, result_code: u8) {
        let message = error_chain(error);
        let mut stderr = io::stderr().lock();
        if self.json {
            let report = Report::new(result_code, ErrorOutput { error: message });
            if let Ok(json) = serde_json::to_string_pretty(&report) {
                let _ = writeln!(stderr, "{}", json);
            }
        } else {
            let _ = writeln!(stderr, "Error: {}", message);
        }
    }
}

/// `error` followed by its context chain, outermost first, on one line.
pub fn error_chain(error: &anyhow::Error) -> String {
    format!("{:#}", error)
}

/// JSON envelope shared by every command.
#[derive(Debug, Serialize)]
pub struct Report<T> {
    pub success: bool,
    pub result_code: u8,
    #[serde(flatten)]
    pub data: T,
}

impl<T> Report<T> {
    /// A report whose success follows from `result_code`.
    pub fn new(result_code: u8, data: T) -> Self {
        Self {
            success: result_code == 0,
            result_code,
            data,
        }
    }

    pub fn ok(data: T) -> Self {
        Self::new(0, data)
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorOutput {
    pub error: String,
}

/// One versioned cookbook listed by `ls`.
#[derive(Debug, Clone, Serialize)]
pub struct CookbookInfo {
    pub name: String,
    pub cookbook: String,
    pub version: String,
    pub path: String,
}

#[derive(Debug, Serialize)]
pub struct LsOutput {
    pub repo: String,
    pub cookbooks: Vec<CookbookInfo>,
}

/// One path listed by `tree`, relative to the cookbook.
#[derive(Debug, Clone, Serialize)]
pub struct TreeEntryInfo {
    pub path: String,
    pub entry_type: String,
}

#[derive(Debug, Serialize)]
pub struct TreeOutput {
    pub cookbook: String,
    pub entries: Vec<TreeEntryInfo>,
}

/// One name split by `parse`; the parts are absent when it does not match.
#[derive(Debug, Clone, Serialize)]
pub struct ParsedName {
    pub input: String,
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cookbook: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ParseOutput {
    pub names: Vec<ParsedName>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_parsed_name_skips_missing_parts() {
        let parsed = ParsedName {
            input: "apache2".to_string(),
            valid: false,
            cookbook: None,
            version: None,
        };
        let json = serde_json::to_value(&parsed).unwrap();
        assert_eq!(json, serde_json::json!({"input": "apache2", "valid": false}));
    }

    #[test]
    fn test_report_flattens_payload() {
        let report = Report::ok(LsOutput {
            repo: "/repo".to_string(),
            cookbooks: vec![CookbookInfo {
                name: "apache2-1.0.0".to_string(),
                cookbook: "apache2".to_string(),
                version: "1.0.0".to_string(),
                path: "/cookbooks/apache2-1.0.0".to_string(),
            }],
        });
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["result_code"], 0);
        assert_eq!(json["repo"], "/repo");
        assert_eq!(json["cookbooks"][0]["cookbook"], "apache2");
    }

    #[test]
    fn test_report_success_follows_code() {
        let report = Report::new(2, ParseOutput { names: Vec::new() });
        assert!(!report.success);
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json, serde_json::json!({"success": false, "result_code": 2, "names": []}));
    }

    #[test]
    fn test_error_chain_includes_context() {
        let error = Err::<(), _>(std::io::Error::other("disk on fire"))
            .context("Failed to list cookbooks in /repo")
            .unwrap_err();
        assert_eq!(
            error_chain(&error),
            "Failed to list cookbooks in /repo: disk on fire"
        );
    }
}
