//! Compliance audit runner: audits one video end-to-end and prints the
//! final report.
//!
//! Usage: `warden-runner <video-url> [video-id]`
//! The video id defaults to `vid_` plus the first 8 characters of the
//! session id.

use std::process::ExitCode;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;
use warden_core::{run_audit, AzureSearchStore, AzureVideoIndexer, ChatJudge};

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env file if present (before any env::var calls)
    if let Err(e) = dotenvy::dotenv() {
        eprintln!("[warden-runner] .env not loaded: {} (using system environment)", e);
    }

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            // Re-raise after logging so the operator sees the full diagnostic.
            tracing::error!(error = %e, "audit run failed");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut args = std::env::args().skip(1);
    let video_url = args
        .next()
        .ok_or("usage: warden-runner <video-url> [video-id]")?;

    let session_id = Uuid::new_v4().to_string();
    let video_id = args
        .next()
        .unwrap_or_else(|| format!("vid_{}", &session_id[..8]));

    tracing::info!(session_id = %session_id, "starting audit session");

    let payload = serde_json::json!({
        "video_url": video_url,
        "video_id": video_id,
        "compliance_results": [],
        "errors": [],
    });
    println!("\n--- INITIALIZING WORKFLOW ---");
    println!("{}", serde_json::to_string_pretty(&payload)?);

    let indexer = AzureVideoIndexer::new();
    let rules = AzureSearchStore::new();
    let judge = ChatJudge::live();

    let state = run_audit(&indexer, &rules, &judge, &video_url, &video_id).await;

    println!("\n=== COMPLIANCE AUDIT REPORT ===");
    println!("Video ID:    {}", state.video_id);
    println!(
        "Status:      {}",
        state
            .final_status
            .map(|s| s.to_string())
            .unwrap_or_else(|| "UNSET".to_string())
    );

    println!("\n[ VIOLATIONS DETECTED ]");
    if state.compliance_results.is_empty() {
        println!("No violations found.");
    } else {
        for issue in &state.compliance_results {
            println!("- [{}] {}: {}", issue.severity, issue.category, issue.description);
        }
    }

    println!("\n[ FINAL SUMMARY ]");
    println!(
        "{}",
        state.final_report.as_deref().unwrap_or("(no report generated)")
    );

    if !state.errors.is_empty() {
        println!("\n[ ERRORS ]");
        for error in &state.errors {
            println!("- {}", error);
        }
    }

    Ok(())
}
