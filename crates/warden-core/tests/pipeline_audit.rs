//! Pipeline integration tests: full audit flows against mock collaborators.
//!
//! Run with: `cargo test --test pipeline_audit`

use async_trait::async_trait;
use serde_json::{json, Value};
use std::path::Path;
use tempfile::TempPath;

use warden_core::{
    extract_insights, run_audit, AuditStatus, ChatJudge, IndexerError, MediaIndexer,
    RetrievalError, RuleDocument, RuleStore, NO_TRANSCRIPT_REPORT,
};

const VIDEO_URL: &str = "https://youtu.be/dT7S75eYhcQ";
const VIDEO_ID: &str = "vid_test0001";

/// Media indexer double: either a canned successful extraction or a
/// simulated outage at the download step.
struct MockIndexer {
    fail_download: bool,
}

#[async_trait]
impl MediaIndexer for MockIndexer {
    async fn download(&self, _video_url: &str) -> Result<TempPath, IndexerError> {
        if self.fail_download {
            return Err(IndexerError::Download("simulated network outage".to_string()));
        }
        Ok(tempfile::NamedTempFile::new()?.into_temp_path())
    }

    async fn upload(&self, _local_path: &Path, _name: &str) -> Result<String, IndexerError> {
        Ok("remote-video-1".to_string())
    }

    async fn wait_for_processing(&self, _remote_id: &str) -> Result<Value, IndexerError> {
        Ok(json!({
            "name": "promo_clip",
            "state": "Processed",
            "videos": [{
                "durationInSeconds": 30,
                "insights": {
                    "transcript": [
                        {"text": "Our supplement cures everything,"},
                        {"text": "guaranteed or your money back."}
                    ],
                    "ocr": [
                        {"text": "100% GUARANTEED"}
                    ]
                }
            }]
        }))
    }

    fn extract_data(&self, raw_insights: &Value) -> Result<warden_core::ExtractedMedia, IndexerError> {
        extract_insights(raw_insights)
    }
}

/// Rule store double returning a fixed top-k rule set.
struct MockRuleStore;

#[async_trait]
impl RuleStore for MockRuleStore {
    async fn similarity_search(
        &self,
        _query_text: &str,
        k: usize,
    ) -> Result<Vec<RuleDocument>, RetrievalError> {
        let rules = vec![
            "Health products may not claim to cure all conditions.",
            "Absolute guarantees require documented substantiation.",
            "Money-back claims must state terms on screen.",
        ];
        Ok(rules
            .into_iter()
            .take(k)
            .map(|content| RuleDocument {
                content: content.to_string(),
                metadata: json!({"source": "advertising_code.pdf"}),
            })
            .collect())
    }

    async fn add_documents(&self, documents: &[RuleDocument]) -> Result<usize, RetrievalError> {
        Ok(documents.len())
    }
}

/// Rule store double that must never be reached (e.g. when extraction
/// produced no transcript).
struct UnreachableRuleStore;

#[async_trait]
impl RuleStore for UnreachableRuleStore {
    async fn similarity_search(
        &self,
        _query_text: &str,
        _k: usize,
    ) -> Result<Vec<RuleDocument>, RetrievalError> {
        panic!("similarity_search must not be called when the transcript is empty");
    }

    async fn add_documents(&self, _documents: &[RuleDocument]) -> Result<usize, RetrievalError> {
        panic!("add_documents must not be called by the runtime pipeline");
    }
}

/// Rule store double simulating a vector-store outage.
struct FailingRuleStore;

#[async_trait]
impl RuleStore for FailingRuleStore {
    async fn similarity_search(
        &self,
        _query_text: &str,
        _k: usize,
    ) -> Result<Vec<RuleDocument>, RetrievalError> {
        Err(RetrievalError::Search("index unavailable (HTTP 503)".to_string()))
    }

    async fn add_documents(&self, _documents: &[RuleDocument]) -> Result<usize, RetrievalError> {
        Err(RetrievalError::Upload("index unavailable (HTTP 503)".to_string()))
    }
}

#[tokio::test]
async fn clean_video_passes_end_to_end() {
    let indexer = MockIndexer { fail_download: false };
    let judge = ChatJudge::mock(
        "```json\n{\"status\":\"PASS\",\"compliance_results\":[],\"final_report\":\"Clean\"}\n```",
    );

    let state = run_audit(&indexer, &MockRuleStore, &judge, VIDEO_URL, VIDEO_ID).await;

    assert!(state.errors.is_empty(), "no errors expected: {:?}", state.errors);
    assert_eq!(state.final_status, Some(AuditStatus::Pass));
    assert!(state.compliance_results.is_empty());
    assert_eq!(state.final_report.as_deref(), Some("Clean"));
    assert_eq!(
        state.transcript,
        "Our supplement cures everything, guaranteed or your money back."
    );
    assert_eq!(state.ocr_text, vec!["100% GUARANTEED".to_string()]);
}

#[tokio::test]
async fn violation_verdict_is_recorded_in_model_order() {
    let indexer = MockIndexer { fail_download: false };
    let judge = ChatJudge::mock(
        r#"{"status":"FAIL","compliance_results":[{"category":"Claims","severity":"CRITICAL","description":"Absolute guarantee detected"},{"category":"Disclosure","severity":"WARNING","description":"Terms not shown"}],"final_report":"Two violations found."}"#,
    );

    let state = run_audit(&indexer, &MockRuleStore, &judge, VIDEO_URL, VIDEO_ID).await;

    assert_eq!(state.final_status, Some(AuditStatus::Fail));
    assert_eq!(state.compliance_results.len(), 2);
    assert_eq!(state.compliance_results[0].severity, "CRITICAL");
    assert_eq!(state.compliance_results[0].category, "Claims");
    assert_eq!(state.compliance_results[1].severity, "WARNING");
    assert_eq!(state.final_report.as_deref(), Some("Two violations found."));
    assert!(state.errors.is_empty());
}

#[tokio::test]
async fn extraction_failure_is_recovered_and_judgment_skipped() {
    let indexer = MockIndexer { fail_download: true };
    // A PASS verdict is armed; if judgment ran, the status below would flip.
    let judge = ChatJudge::mock("{\"status\":\"PASS\",\"final_report\":\"should not appear\"}");

    let state = run_audit(&indexer, &UnreachableRuleStore, &judge, VIDEO_URL, VIDEO_ID).await;

    assert!(!state.errors.is_empty());
    assert!(state.errors[0].contains("simulated network outage"));
    assert_eq!(state.final_status, Some(AuditStatus::Fail));
    assert_eq!(state.transcript, "");
    assert!(state.ocr_text.is_empty());
    assert_eq!(state.final_report.as_deref(), Some(NO_TRANSCRIPT_REPORT));
}

#[tokio::test]
async fn unparsable_model_response_records_one_error() {
    let indexer = MockIndexer { fail_download: false };
    let judge = ChatJudge::mock("The video looks fine to me, nothing to report.");

    let state = run_audit(&indexer, &MockRuleStore, &judge, VIDEO_URL, VIDEO_ID).await;

    assert_eq!(state.errors.len(), 1, "exactly one error: {:?}", state.errors);
    assert_eq!(state.final_status, Some(AuditStatus::Fail));
    // Parse failure leaves results and report untouched.
    assert!(state.compliance_results.is_empty());
    assert!(state.final_report.is_none());
}

#[tokio::test]
async fn retrieval_outage_surfaces_as_judgment_failure() {
    let indexer = MockIndexer { fail_download: false };
    let judge = ChatJudge::mock("{\"status\":\"PASS\",\"final_report\":\"unreached\"}");

    let state = run_audit(&indexer, &FailingRuleStore, &judge, VIDEO_URL, VIDEO_ID).await;

    assert_eq!(state.errors.len(), 1);
    assert!(state.errors[0].contains("index unavailable"));
    assert_eq!(state.final_status, Some(AuditStatus::Fail));
    assert!(state.final_report.is_none());
}
