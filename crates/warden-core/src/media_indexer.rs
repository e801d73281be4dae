//! Media extraction client: download, upload, poll, extract.
//!
//! Wraps the external media-indexing service (Azure Video Indexer) behind the
//! [`MediaIndexer`] trait so the pipeline can run against a test double. The
//! four-call contract is download → upload → wait-for-processing → extract.
//!
//! The download lands in an owned [`tempfile::TempPath`]: the scratch file is
//! removed when the handle drops, on success and failure paths alike.

use async_trait::async_trait;
use serde_json::Value;
use std::path::Path;
use std::time::Duration;
use tempfile::{Builder as TempFileBuilder, TempPath};
use tracing::{info, warn};

use crate::config::{ConfigError, VideoIndexerConfig};

const VI_API_BASE: &str = "https://api.videoindexer.ai";
/// Processing poll: capped exponential backoff under an overall deadline.
const POLL_INITIAL_DELAY_SECS: u64 = 2;
const POLL_MAX_DELAY_SECS: u64 = 30;
const POLL_TIMEOUT_SECS: u64 = 600;
/// Upload can carry a full video file; allow a generous request window.
const UPLOAD_TIMEOUT_SECS: u64 = 300;
const REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, thiserror::Error)]
pub enum IndexerError {
    #[error("unsupported video URL (expected a YouTube link): {0}")]
    UnsupportedUrl(String),

    #[error("video download failed: {0}")]
    Download(String),

    #[error("video upload failed: {0}")]
    Upload(String),

    #[error("media indexing did not finish within {0} seconds")]
    Timeout(u64),

    #[error("media indexing reported failure: {0}")]
    ProcessingFailed(String),

    #[error("unexpected insights payload: {0}")]
    Malformed(String),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Clean extraction output consumed by the judgment stage.
#[derive(Debug, Clone, Default)]
pub struct ExtractedMedia {
    pub transcript: String,
    pub ocr_text: Vec<String>,
    pub video_metadata: serde_json::Map<String, Value>,
}

/// Four-call contract against the external media-indexing service.
#[async_trait]
pub trait MediaIndexer: Send + Sync {
    /// Downloads the video to a local scratch file. The returned handle owns
    /// the file; dropping it deletes the scratch data.
    async fn download(&self, video_url: &str) -> Result<TempPath, IndexerError>;

    /// Uploads the local file under the given name; returns the remote id.
    async fn upload(&self, local_path: &Path, name: &str) -> Result<String, IndexerError>;

    /// Blocks (bounded) until the service reports the asset as processed;
    /// returns the raw insights document.
    async fn wait_for_processing(&self, remote_id: &str) -> Result<Value, IndexerError>;

    /// Transforms raw insights into transcript, OCR lines, and metadata.
    fn extract_data(&self, raw_insights: &Value) -> Result<ExtractedMedia, IndexerError>;
}

/// Live Azure Video Indexer client. Credentials are read from the
/// environment at call time, so a missing key surfaces as a stage failure
/// in the audit state instead of failing construction.
pub struct AzureVideoIndexer {
    client: reqwest::Client,
    upload_client: reqwest::Client,
}

impl AzureVideoIndexer {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        let upload_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(UPLOAD_TIMEOUT_SECS))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { client, upload_client }
    }

    /// Short-lived account access token; required on every data-plane call.
    async fn access_token(&self, config: &VideoIndexerConfig) -> Result<String, IndexerError> {
        let url = format!(
            "{}/Auth/{}/Accounts/{}/AccessToken?allowEdit=true",
            VI_API_BASE, config.location, config.account_id
        );
        let response = self
            .client
            .get(&url)
            .header("Ocp-Apim-Subscription-Key", &config.subscription_key)
            .send()
            .await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(IndexerError::Upload(format!(
                "access token request failed ({}): {}",
                status, body
            )));
        }
        // The endpoint returns the token as a JSON string literal.
        let token: String = response.json().await?;
        Ok(token)
    }
}

impl Default for AzureVideoIndexer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MediaIndexer for AzureVideoIndexer {
    async fn download(&self, video_url: &str) -> Result<TempPath, IndexerError> {
        if !is_supported_video_url(video_url) {
            return Err(IndexerError::UnsupportedUrl(video_url.to_string()));
        }

        let scratch = TempFileBuilder::new()
            .prefix("warden_audit_")
            .suffix(".mp4")
            .tempfile()?
            .into_temp_path();

        info!(url = video_url, path = %scratch.display(), "downloading video to scratch file");

        let output = tokio::process::Command::new("yt-dlp")
            .arg("--quiet")
            .arg("--force-overwrites")
            .arg("-f")
            .arg("mp4")
            .arg("-o")
            .arg(scratch.as_os_str())
            .arg(video_url)
            .output()
            .await
            .map_err(|e| IndexerError::Download(format!("failed to spawn yt-dlp: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(IndexerError::Download(format!(
                "yt-dlp exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        let size = std::fs::metadata(&scratch)?.len();
        if size == 0 {
            return Err(IndexerError::Download("downloaded file is empty".to_string()));
        }
        info!(bytes = size, "download complete");
        Ok(scratch)
    }

    async fn upload(&self, local_path: &Path, name: &str) -> Result<String, IndexerError> {
        let config = VideoIndexerConfig::from_env()?;
        let token = self.access_token(&config).await?;

        let bytes = tokio::fs::read(local_path).await?;
        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(format!("{}.mp4", name))
            .mime_str("video/mp4")
            .map_err(|e| IndexerError::Upload(e.to_string()))?;
        let form = reqwest::multipart::Form::new().part("file", part);

        let url = format!(
            "{}/{}/Accounts/{}/Videos?accessToken={}&name={}&privacy=Private",
            VI_API_BASE, config.location, config.account_id, token, name
        );

        let response = self.upload_client.post(&url).multipart(form).send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(IndexerError::Upload(format!("HTTP {}: {}", status, body)));
        }

        let payload: Value = response.json().await?;
        let remote_id = payload
            .get("id")
            .and_then(|v| v.as_str())
            .ok_or_else(|| IndexerError::Malformed("upload response missing video id".to_string()))?
            .to_string();
        info!(remote_id = %remote_id, "upload accepted");
        Ok(remote_id)
    }

    async fn wait_for_processing(&self, remote_id: &str) -> Result<Value, IndexerError> {
        let config = VideoIndexerConfig::from_env()?;
        let token = self.access_token(&config).await?;
        let url = format!(
            "{}/{}/Accounts/{}/Videos/{}/Index?accessToken={}",
            VI_API_BASE, config.location, config.account_id, remote_id, token
        );

        let started = std::time::Instant::now();
        let deadline = Duration::from_secs(POLL_TIMEOUT_SECS);
        let mut delay = Duration::from_secs(POLL_INITIAL_DELAY_SECS);
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            let response = self.client.get(&url).send().await?;
            if !response.status().is_success() {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                return Err(IndexerError::ProcessingFailed(format!(
                    "index poll failed (HTTP {}): {}",
                    status, body
                )));
            }
            let index: Value = response.json().await?;
            match index.get("state").and_then(|v| v.as_str()) {
                Some("Processed") => {
                    info!(remote_id, attempts = attempt, "media indexing complete");
                    return Ok(index);
                }
                Some("Failed") => {
                    let reason = index
                        .pointer("/videos/0/failureMessage")
                        .and_then(|v| v.as_str())
                        .unwrap_or("no failure message");
                    return Err(IndexerError::ProcessingFailed(reason.to_string()));
                }
                state => {
                    info!(remote_id, attempt, state = state.unwrap_or("unknown"), "still processing");
                }
            }
            if started.elapsed() + delay > deadline {
                warn!(remote_id, "media indexing poll exhausted");
                return Err(IndexerError::Timeout(POLL_TIMEOUT_SECS));
            }
            tokio::time::sleep(delay).await;
            delay = (delay * 2).min(Duration::from_secs(POLL_MAX_DELAY_SECS));
        }
    }

    fn extract_data(&self, raw_insights: &Value) -> Result<ExtractedMedia, IndexerError> {
        extract_insights(raw_insights)
    }
}

/// Only recognized video-hosting URLs are accepted for download.
pub fn is_supported_video_url(url: &str) -> bool {
    url.contains("youtube.com") || url.contains("youtu.be")
}

/// Pure transformation of a Video Indexer index document into the clean
/// extraction output. Transcript lines are joined with spaces; OCR entries
/// keep their appearance order.
pub fn extract_insights(raw: &Value) -> Result<ExtractedMedia, IndexerError> {
    let insights = raw
        .pointer("/videos/0/insights")
        .ok_or_else(|| IndexerError::Malformed("missing videos[0].insights".to_string()))?;

    let transcript = insights
        .get("transcript")
        .and_then(|v| v.as_array())
        .map(|lines| {
            lines
                .iter()
                .filter_map(|l| l.get("text").and_then(|t| t.as_str()))
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .collect::<Vec<_>>()
                .join(" ")
        })
        .unwrap_or_default();

    let ocr_text = insights
        .get("ocr")
        .and_then(|v| v.as_array())
        .map(|entries| {
            entries
                .iter()
                .filter_map(|e| e.get("text").and_then(|t| t.as_str()))
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect()
        })
        .unwrap_or_default();

    let mut video_metadata = serde_json::Map::new();
    if let Some(name) = raw.get("name").and_then(|v| v.as_str()) {
        video_metadata.insert("name".to_string(), Value::String(name.to_string()));
    }
    if let Some(duration) = raw.pointer("/videos/0/durationInSeconds") {
        video_metadata.insert("duration_in_seconds".to_string(), duration.clone());
    }
    if let Some(language) = insights.get("sourceLanguage") {
        video_metadata.insert("source_language".to_string(), language.clone());
    }

    Ok(ExtractedMedia {
        transcript,
        ocr_text,
        video_metadata,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn url_validation_accepts_known_hosts() {
        assert!(is_supported_video_url("https://www.youtube.com/watch?v=abc123"));
        assert!(is_supported_video_url("https://youtu.be/abc123"));
        assert!(!is_supported_video_url("https://vimeo.com/12345"));
        assert!(!is_supported_video_url("file:///tmp/video.mp4"));
    }

    #[test]
    fn extract_insights_joins_transcript_and_collects_ocr() {
        let raw = json!({
            "name": "promo_clip",
            "videos": [{
                "durationInSeconds": 42,
                "insights": {
                    "sourceLanguage": "en-US",
                    "transcript": [
                        {"text": "Buy now "},
                        {"text": "and save big."},
                        {"text": "   "}
                    ],
                    "ocr": [
                        {"text": "100% GUARANTEED"},
                        {"text": "LIMITED OFFER"}
                    ]
                }
            }]
        });
        let media = extract_insights(&raw).expect("extract");
        assert_eq!(media.transcript, "Buy now and save big.");
        assert_eq!(media.ocr_text, vec!["100% GUARANTEED", "LIMITED OFFER"]);
        assert_eq!(media.video_metadata["name"], json!("promo_clip"));
        assert_eq!(media.video_metadata["duration_in_seconds"], json!(42));
    }

    #[test]
    fn extract_insights_tolerates_missing_sections() {
        let raw = json!({"videos": [{"insights": {}}]});
        let media = extract_insights(&raw).expect("extract");
        assert_eq!(media.transcript, "");
        assert!(media.ocr_text.is_empty());
    }

    #[test]
    fn extract_insights_rejects_empty_document() {
        let raw = json!({});
        assert!(matches!(
            extract_insights(&raw),
            Err(IndexerError::Malformed(_))
        ));
    }
}
