//! Verdict parsing: turn the raw model response into a typed verdict.
//!
//! Two-step policy, never more:
//! 1. Trim the raw text and attempt a direct JSON parse.
//! 2. On failure, extract the first ```-fenced block (optional `json` tag,
//!    non-greedy) and parse its trimmed contents.
//! Anything else is a parse error; the caller records it and fails the audit.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

use crate::state::{AuditStatus, ComplianceIssue};

/// Report text used when the model omits `final_report`.
pub const FALLBACK_REPORT: &str = "No report generated.";

static FENCE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)```(?:json)?\s*(.*?)```").expect("fence regex is valid")
});

#[derive(Debug, thiserror::Error)]
pub enum VerdictError {
    #[error("response is not valid JSON and contains no parsable fenced block: {0}")]
    Unparsable(String),
}

/// Parsed judgment output. Field defaults follow the response contract:
/// missing `compliance_results` is an empty list, missing `status` is FAIL,
/// missing `final_report` is [`FALLBACK_REPORT`].
#[derive(Debug, Clone)]
pub struct AuditVerdict {
    pub compliance_results: Vec<ComplianceIssue>,
    pub status: AuditStatus,
    pub final_report: String,
}

// Wire shape: every field optional so partial responses still land.
#[derive(Deserialize)]
struct RawVerdict {
    #[serde(default)]
    compliance_results: Option<Vec<RawIssue>>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    final_report: Option<String>,
}

#[derive(Deserialize)]
struct RawIssue {
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    severity: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

/// Parse the raw model response into a verdict. Pure function: same input,
/// same output, no hidden state.
pub fn parse_verdict(raw: &str) -> Result<AuditVerdict, VerdictError> {
    let trimmed = raw.trim();

    // Step 1: the response may already be bare JSON.
    let direct_err = match serde_json::from_str::<RawVerdict>(trimmed) {
        Ok(parsed) => return Ok(finish(parsed)),
        Err(e) => e,
    };

    // Step 2: first fenced block, if any.
    if let Some(captures) = FENCE_RE.captures(trimmed) {
        let inner = captures.get(1).map(|m| m.as_str().trim()).unwrap_or("");
        match serde_json::from_str::<RawVerdict>(inner) {
            Ok(parsed) => return Ok(finish(parsed)),
            Err(fence_err) => {
                return Err(VerdictError::Unparsable(format!(
                    "direct parse: {}; fenced block parse: {}",
                    direct_err, fence_err
                )));
            }
        }
    }

    Err(VerdictError::Unparsable(format!(
        "direct parse: {}; no fenced block found",
        direct_err
    )))
}

fn finish(raw: RawVerdict) -> AuditVerdict {
    let compliance_results = raw
        .compliance_results
        .unwrap_or_default()
        .into_iter()
        .map(|issue| ComplianceIssue {
            category: issue.category.unwrap_or_default(),
            severity: issue.severity.unwrap_or_default(),
            description: issue.description.unwrap_or_default(),
        })
        .collect();
    let status = raw
        .status
        .map(|s| AuditStatus::from_model_str(&s))
        .unwrap_or(AuditStatus::Fail);
    let final_report = raw
        .final_report
        .unwrap_or_else(|| FALLBACK_REPORT.to_string());
    AuditVerdict {
        compliance_results,
        status,
        final_report,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_fenced_pass_response() {
        let raw = "```json\n{\"status\":\"PASS\",\"compliance_results\":[],\"final_report\":\"Clean\"}\n```";
        let verdict = parse_verdict(raw).expect("parse");
        assert_eq!(verdict.status, AuditStatus::Pass);
        assert!(verdict.compliance_results.is_empty());
        assert_eq!(verdict.final_report, "Clean");
    }

    #[test]
    fn parses_bare_fail_response() {
        let raw = r#"{"status":"FAIL","compliance_results":[{"category":"Claims","severity":"CRITICAL","description":"X"}],"final_report":"Bad"}"#;
        let verdict = parse_verdict(raw).expect("parse");
        assert_eq!(verdict.status, AuditStatus::Fail);
        assert_eq!(verdict.compliance_results.len(), 1);
        assert_eq!(verdict.compliance_results[0].severity, "CRITICAL");
        assert_eq!(verdict.final_report, "Bad");
    }

    #[test]
    fn fence_without_json_tag_still_parses() {
        let raw = "Here is the verdict:\n```\n{\"status\":\"PASS\",\"final_report\":\"ok\"}\n```\nThanks!";
        let verdict = parse_verdict(raw).expect("parse");
        assert_eq!(verdict.status, AuditStatus::Pass);
        assert_eq!(verdict.final_report, "ok");
    }

    #[test]
    fn first_fence_wins() {
        let raw = "```json\n{\"status\":\"PASS\",\"final_report\":\"first\"}\n```\n```json\n{\"status\":\"FAIL\"}\n```";
        let verdict = parse_verdict(raw).expect("parse");
        assert_eq!(verdict.final_report, "first");
    }

    #[test]
    fn missing_fields_take_contract_defaults() {
        let verdict = parse_verdict("{}").expect("parse");
        assert!(verdict.compliance_results.is_empty());
        assert_eq!(verdict.status, AuditStatus::Fail);
        assert_eq!(verdict.final_report, FALLBACK_REPORT);
    }

    #[test]
    fn prose_response_is_an_error() {
        let err = parse_verdict("The video looks fine to me.").expect_err("must fail");
        assert!(err.to_string().contains("no fenced block"));
    }

    #[test]
    fn fenced_garbage_is_an_error() {
        let err = parse_verdict("```json\nnot json at all\n```").expect_err("must fail");
        assert!(err.to_string().contains("fenced block parse"));
    }

    #[test]
    fn parser_is_idempotent() {
        let raw = "```json\n{\"status\":\"PASS\",\"compliance_results\":[],\"final_report\":\"Clean\"}\n```";
        let first = parse_verdict(raw).expect("parse");
        let second = parse_verdict(raw).expect("parse");
        assert_eq!(first.status, second.status);
        assert_eq!(first.final_report, second.final_report);
        assert_eq!(first.compliance_results.len(), second.compliance_results.len());
    }
}
