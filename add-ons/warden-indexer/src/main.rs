//! Offline rule-corpus indexer.
//!
//! Reads compliance documents from a directory, splits each into
//! overlapping chunks tagged with their source filename, and bulk-uploads
//! chunk+embedding pairs to the rule index. Administrative utility, not
//! part of the runtime audit pipeline.
//!
//! Usage: `warden-indexer [documents-dir]` (default: `data`)

use std::path::Path;
use std::process::ExitCode;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use walkdir::WalkDir;
use warden_core::{
    chunk_document, missing_vars, AzureSearchStore, RuleDocument, RuleStore,
    ENV_OPENAI_API_KEY, ENV_OPENAI_ENDPOINT, ENV_SEARCH_API_KEY, ENV_SEARCH_ENDPOINT,
    ENV_SEARCH_INDEX_NAME,
};

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(e) = dotenvy::dotenv() {
        eprintln!("[warden-indexer] .env not loaded: {} (using system environment)", e);
    }

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Configuration is a hard stop here: indexing with a partial setup would
    // silently build an unusable corpus.
    let missing = missing_vars(&[
        ENV_OPENAI_ENDPOINT,
        ENV_OPENAI_API_KEY,
        ENV_SEARCH_ENDPOINT,
        ENV_SEARCH_API_KEY,
        ENV_SEARCH_INDEX_NAME,
    ]);
    if !missing.is_empty() {
        tracing::error!(missing = ?missing, "missing required environment variables");
        tracing::error!("check your .env file and ensure all variables are set");
        return ExitCode::FAILURE;
    }

    let data_dir = std::env::args().nth(1).unwrap_or_else(|| "data".to_string());
    match index_documents(&data_dir).await {
        Ok(total) => {
            tracing::info!(total_chunks = total, "indexing complete; the rule corpus is ready");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "indexing failed");
            ExitCode::FAILURE
        }
    }
}

async fn index_documents(data_dir: &str) -> Result<usize, Box<dyn std::error::Error + Send + Sync>> {
    let mut all_chunks: Vec<RuleDocument> = Vec::new();
    let mut files_seen = 0usize;

    for entry in WalkDir::new(data_dir).into_iter().filter_map(Result::ok) {
        let path = entry.path();
        if !path.is_file() || !is_supported_document(path) {
            continue;
        }
        files_seen += 1;
        let source = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());

        // A single unreadable file is logged and skipped, not fatal.
        let text = match load_text(path) {
            Ok(text) => text,
            Err(e) => {
                tracing::error!(file = %path.display(), error = %e, "failed to load document");
                continue;
            }
        };
        if text.trim().is_empty() {
            tracing::warn!(file = %source, "document has no extractable text; skipping");
            continue;
        }

        let chunks = chunk_document(&text, &source);
        tracing::info!(file = %source, chunks = chunks.len(), "document chunked");
        all_chunks.extend(chunks);
    }

    if files_seen == 0 {
        tracing::warn!(dir = data_dir, "no documents found; add .pdf/.txt/.md files and rerun");
        return Ok(0);
    }
    if all_chunks.is_empty() {
        tracing::warn!("no chunks produced; nothing to upload");
        return Ok(0);
    }

    tracing::info!(chunks = all_chunks.len(), "uploading chunks to the rule index");
    let store = AzureSearchStore::new();
    let uploaded = store.add_documents(&all_chunks).await?;
    Ok(uploaded)
}

fn is_supported_document(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("pdf") | Some("txt") | Some("md")
    )
}

fn load_text(path: &Path) -> Result<String, Box<dyn std::error::Error + Send + Sync>> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("pdf") => pdf_extract::extract_text(path)
            .map_err(|e| format!("pdf text extraction: {}", e).into()),
        _ => Ok(std::fs::read_to_string(path)?),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_filter_accepts_known_extensions() {
        assert!(is_supported_document(Path::new("rules/fda.pdf")));
        assert!(is_supported_document(Path::new("rules/code.txt")));
        assert!(is_supported_document(Path::new("rules/policy.md")));
        assert!(!is_supported_document(Path::new("rules/logo.png")));
        assert!(!is_supported_document(Path::new("rules/archive.zip")));
    }
}
