//! Pipeline driver: extraction → judgment, merging each stage's update into
//! the session state.
//!
//! Stage failure is state, not control flow: a failed stage records its
//! reason and the driver still runs every remaining stage, so the operator
//! always receives a report even on partial failure.

use tracing::{error, info, warn};

use crate::judge::ChatJudge;
use crate::media_indexer::{ExtractedMedia, IndexerError, MediaIndexer};
use crate::prompts::{auditor_system_prompt, auditor_user_prompt};
use crate::rule_store::RuleStore;
use crate::state::{AuditState, AuditStatus, StageUpdate};
use crate::verdict::parse_verdict;

/// How many rule documents the judgment prompt is grounded on.
pub const RULE_TOP_K: usize = 3;

/// Report text when extraction left no transcript to audit.
pub const NO_TRANSCRIPT_REPORT: &str =
    "Audit skipped because video processing failed (No Transcript).";

/// Runs one full audit session and returns the merged final state.
pub async fn run_audit(
    indexer: &dyn MediaIndexer,
    rules: &dyn RuleStore,
    judge: &ChatJudge,
    video_url: &str,
    video_id: &str,
) -> AuditState {
    let mut state = AuditState::new(video_url, video_id);
    info!(video_url, video_id, "audit session started");

    let update = extraction_stage(indexer, &state).await;
    state.apply(update);

    let update = judgment_stage(rules, judge, &state).await;
    state.apply(update);

    info!(
        video_id,
        status = %state.final_status.map(|s| s.to_string()).unwrap_or_else(|| "UNSET".to_string()),
        violations = state.compliance_results.len(),
        errors = state.errors.len(),
        "audit session finished"
    );
    state
}

/// Download → upload → wait → extract. Any failure downgrades to a recorded
/// error with the extraction fields pinned empty.
pub async fn extraction_stage(indexer: &dyn MediaIndexer, state: &AuditState) -> StageUpdate {
    info!(video_url = %state.video_url, "extraction stage: processing video");
    match run_extraction(indexer, state).await {
        Ok(media) => {
            info!(
                transcript_len = media.transcript.len(),
                ocr_lines = media.ocr_text.len(),
                "extraction complete"
            );
            StageUpdate {
                transcript: Some(media.transcript),
                ocr_text: Some(media.ocr_text),
                video_metadata: Some(media.video_metadata),
                ..StageUpdate::default()
            }
        }
        Err(e) => {
            error!(error = %e, "extraction stage failed");
            StageUpdate::extraction_failure(e.to_string())
        }
    }
}

async fn run_extraction(
    indexer: &dyn MediaIndexer,
    state: &AuditState,
) -> Result<ExtractedMedia, IndexerError> {
    let scratch = indexer.download(&state.video_url).await?;
    let remote_id = indexer.upload(&scratch, &state.video_id).await?;
    // Scratch data is no longer needed once the service has the bytes; the
    // owned handle also removes the file on each early-return above.
    drop(scratch);

    let raw_insights = indexer.wait_for_processing(&remote_id).await?;
    indexer.extract_data(&raw_insights)
}

/// Retrieval-augmented judgment: query the rule store, prompt the model,
/// parse the verdict. Retrieval, invocation, and parse failures all
/// downgrade to a recorded error plus FAIL.
pub async fn judgment_stage(
    rules: &dyn RuleStore,
    judge: &ChatJudge,
    state: &AuditState,
) -> StageUpdate {
    if state.transcript.is_empty() {
        warn!("no transcript available; skipping judgment");
        return StageUpdate {
            final_status: Some(AuditStatus::Fail),
            final_report: Some(NO_TRANSCRIPT_REPORT.to_string()),
            ..StageUpdate::default()
        };
    }

    info!("judgment stage: querying rule store and model");

    let query_text = build_rule_query(&state.transcript, &state.ocr_text);
    let documents = match rules.similarity_search(&query_text, RULE_TOP_K).await {
        Ok(docs) => docs,
        Err(e) => {
            error!(error = %e, "rule retrieval failed");
            return StageUpdate::failure(e.to_string());
        }
    };

    let retrieved_rules = documents
        .iter()
        .map(|d| d.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");

    let system_prompt = auditor_system_prompt(&retrieved_rules);
    let metadata = serde_json::Value::Object(state.video_metadata.clone()).to_string();
    let ocr = serde_json::json!(state.ocr_text).to_string();
    let user_message = auditor_user_prompt(&metadata, &state.transcript, &ocr);

    let raw_response = match judge.invoke(&system_prompt, &user_message).await {
        Ok(text) => text,
        Err(e) => {
            error!(error = %e, "model invocation failed");
            return StageUpdate::failure(e.to_string());
        }
    };

    match parse_verdict(&raw_response) {
        Ok(verdict) => StageUpdate {
            compliance_results: Some(verdict.compliance_results),
            final_status: Some(verdict.status),
            final_report: Some(verdict.final_report),
            ..StageUpdate::default()
        },
        Err(e) => {
            // Keep the raw text in the log for postmortem diagnosis.
            error!(error = %e, raw_response = %raw_response, "judgment response could not be parsed");
            StageUpdate::failure(e.to_string())
        }
    }
}

/// Retrieval query: transcript first, then the OCR lines space-joined.
pub fn build_rule_query(transcript: &str, ocr_text: &[String]) -> String {
    format!("{} {}", transcript, ocr_text.join(" "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rule_query_orders_transcript_before_ocr() {
        let query = build_rule_query(
            "miracle cure guaranteed",
            &["100% EFFECTIVE".to_string(), "NO RISK".to_string()],
        );
        assert_eq!(query, "miracle cure guaranteed 100% EFFECTIVE NO RISK");
    }

    #[test]
    fn rule_query_with_no_ocr_keeps_transcript() {
        let query = build_rule_query("plain talk", &[]);
        assert!(query.starts_with("plain talk"));
    }
}
