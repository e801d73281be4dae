//! Shared audit-session state threaded through the pipeline stages.
//!
//! Stages never mutate [`AuditState`] directly: each returns an immutable
//! [`StageUpdate`] that the driver merges with [`AuditState::apply`]. Merges
//! only ever add data; nothing is rolled back.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Terminal outcome of an audit session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AuditStatus {
    Pass,
    Fail,
}

impl fmt::Display for AuditStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuditStatus::Pass => write!(f, "PASS"),
            AuditStatus::Fail => write!(f, "FAIL"),
        }
    }
}

impl AuditStatus {
    /// Maps a model-reported status string onto the enum. Anything other than
    /// an exact `"PASS"` is FAIL (fail-closed).
    pub fn from_model_str(s: &str) -> Self {
        if s.trim() == "PASS" {
            AuditStatus::Pass
        } else {
            AuditStatus::Fail
        }
    }
}

/// One violation reported by the judgment model. Identity is positional;
/// issues are immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplianceIssue {
    /// Rule category (e.g. "Claim Validation").
    pub category: String,
    /// Open severity string as reported by the model (e.g. CRITICAL, WARNING).
    pub severity: String,
    /// Human-readable explanation of the violation.
    pub description: String,
}

/// State record for one audit session.
///
/// `video_url` and `video_id` are set at session start and never change.
/// Everything else is filled in by stage updates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditState {
    pub video_url: String,
    pub video_id: String,
    /// Full spoken transcript; empty until extraction succeeds.
    #[serde(default)]
    pub transcript: String,
    /// On-screen text lines in appearance order; empty until extraction succeeds.
    #[serde(default)]
    pub ocr_text: Vec<String>,
    /// Metadata reported by the media-indexing service (duration, name, ...).
    #[serde(default)]
    pub video_metadata: serde_json::Map<String, serde_json::Value>,
    /// Violations in the order the model returned them.
    #[serde(default)]
    pub compliance_results: Vec<ComplianceIssue>,
    /// Unset until a terminal stage decides.
    #[serde(default)]
    pub final_status: Option<AuditStatus>,
    /// Natural-language summary produced by judgment.
    #[serde(default)]
    pub final_report: Option<String>,
    /// Append-only accumulator of failure messages across all stages.
    #[serde(default)]
    pub errors: Vec<String>,
}

impl AuditState {
    /// Fresh session state: identifiers set, everything else empty.
    pub fn new(video_url: impl Into<String>, video_id: impl Into<String>) -> Self {
        Self {
            video_url: video_url.into(),
            video_id: video_id.into(),
            transcript: String::new(),
            ocr_text: Vec::new(),
            video_metadata: serde_json::Map::new(),
            compliance_results: Vec::new(),
            final_status: None,
            final_report: None,
            errors: Vec::new(),
        }
    }

    /// Merges a stage update into the session. Error entries append, set
    /// fields overwrite, absent fields leave the state untouched. After the
    /// merge, any recorded error forces `final_status` to FAIL: a stage can
    /// never report PASS past an earlier failure.
    pub fn apply(&mut self, update: StageUpdate) {
        if let Some(transcript) = update.transcript {
            self.transcript = transcript;
        }
        if let Some(ocr) = update.ocr_text {
            self.ocr_text = ocr;
        }
        if let Some(meta) = update.video_metadata {
            self.video_metadata = meta;
        }
        if let Some(results) = update.compliance_results {
            self.compliance_results = results;
        }
        if let Some(status) = update.final_status {
            self.final_status = Some(status);
        }
        if let Some(report) = update.final_report {
            self.final_report = Some(report);
        }
        self.errors.extend(update.errors);
        if !self.errors.is_empty() {
            self.final_status = Some(AuditStatus::Fail);
        }
    }
}

/// Immutable per-stage result merged by the pipeline driver.
///
/// A failed stage is still a value: [`StageUpdate::failure`] records the
/// reason and a FAIL status instead of raising, so the pipeline always runs
/// to completion and the operator always gets a report.
#[derive(Debug, Clone, Default)]
pub struct StageUpdate {
    pub transcript: Option<String>,
    pub ocr_text: Option<Vec<String>>,
    pub video_metadata: Option<serde_json::Map<String, serde_json::Value>>,
    pub compliance_results: Option<Vec<ComplianceIssue>>,
    pub final_status: Option<AuditStatus>,
    pub final_report: Option<String>,
    pub errors: Vec<String>,
}

impl StageUpdate {
    /// Failure outcome: one recorded error and a FAIL status.
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            errors: vec![message.into()],
            final_status: Some(AuditStatus::Fail),
            ..Self::default()
        }
    }

    /// Extraction-stage failure: records the error and pins the extraction
    /// fields to their empty contract values so judgment sees a definitive
    /// "no transcript" signal.
    pub fn extraction_failure(message: impl Into<String>) -> Self {
        Self {
            transcript: Some(String::new()),
            ocr_text: Some(Vec::new()),
            ..Self::failure(message)
        }
    }
}
