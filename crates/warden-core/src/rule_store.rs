//! Rule retrieval against the external vector store.
//!
//! The [`RuleStore`] trait is the seam the judgment stage depends on: given
//! query text, return the top-k most similar rule documents. The live
//! implementation embeds the query through the Azure OpenAI embeddings
//! deployment and runs a vector query against an Azure AI Search index.
//! `add_documents` is only used by the offline indexing utility.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

use crate::config::{ConfigError, OpenAiConfig, SearchConfig};

const SEARCH_API_VERSION: &str = "2023-11-01";
const REQUEST_TIMEOUT_SECS: u64 = 30;
/// Search index field holding the chunk embedding.
const VECTOR_FIELD: &str = "content_vector";

#[derive(Debug, thiserror::Error)]
pub enum RetrievalError {
    #[error("embedding request failed: {0}")]
    Embedding(String),

    #[error("similarity search failed: {0}")]
    Search(String),

    #[error("document upload failed: {0}")]
    Upload(String),

    #[error("unexpected response shape: {0}")]
    Malformed(String),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// One rule chunk stored in (or retrieved from) the vector index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleDocument {
    pub content: String,
    /// Source tagging and any auxiliary fields (e.g. `{"source": "fda_rules.pdf"}`).
    #[serde(default)]
    pub metadata: Value,
}

/// Seam between the judgment stage and the external vector store.
#[async_trait]
pub trait RuleStore: Send + Sync {
    /// Plain similarity query: no caching, no dedup; ranking is the store's.
    async fn similarity_search(
        &self,
        query_text: &str,
        k: usize,
    ) -> Result<Vec<RuleDocument>, RetrievalError>;

    /// Bulk upload of chunk+embedding pairs (offline indexing only).
    /// Returns the number of documents accepted.
    async fn add_documents(&self, documents: &[RuleDocument]) -> Result<usize, RetrievalError>;
}

// Azure OpenAI embeddings request/response.
#[derive(Serialize)]
struct EmbeddingsRequest<'a> {
    input: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingsData>,
}

#[derive(Deserialize)]
struct EmbeddingsData {
    embedding: Vec<f32>,
}

/// Live Azure AI Search rule store. Configuration is read from the
/// environment at call time so a missing credential surfaces as a stage
/// failure instead of a construction panic.
pub struct AzureSearchStore {
    client: reqwest::Client,
}

impl AzureSearchStore {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { client }
    }

    /// Embeds one text through the configured embeddings deployment.
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>, RetrievalError> {
        let config = OpenAiConfig::from_env()?;
        let url = format!(
            "{}/openai/deployments/{}/embeddings?api-version={}",
            config.endpoint.trim_end_matches('/'),
            config.embedding_deployment,
            config.api_version
        );
        let response = self
            .client
            .post(&url)
            .header("api-key", &config.api_key)
            .json(&EmbeddingsRequest { input: text })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(RetrievalError::Embedding(format!("HTTP {}: {}", status, body)));
        }

        let parsed: EmbeddingsResponse = response.json().await?;
        parsed
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| RetrievalError::Malformed("embeddings response has no data".to_string()))
    }
}

impl Default for AzureSearchStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RuleStore for AzureSearchStore {
    async fn similarity_search(
        &self,
        query_text: &str,
        k: usize,
    ) -> Result<Vec<RuleDocument>, RetrievalError> {
        let config = SearchConfig::from_env()?;
        let vector = self.embed(query_text).await?;

        let url = format!(
            "{}/indexes/{}/docs/search?api-version={}",
            config.endpoint.trim_end_matches('/'),
            config.index_name,
            SEARCH_API_VERSION
        );
        let body = json!({
            "select": "content, metadata",
            "top": k,
            "vectorQueries": [{
                "kind": "vector",
                "vector": vector,
                "fields": VECTOR_FIELD,
                "k": k,
            }],
        });

        let response = self
            .client
            .post(&url)
            .header("api-key", &config.api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(RetrievalError::Search(format!("HTTP {}: {}", status, text)));
        }

        let payload: Value = response.json().await?;
        let hits = payload
            .get("value")
            .and_then(|v| v.as_array())
            .ok_or_else(|| RetrievalError::Malformed("search response missing value array".to_string()))?;

        let documents = hits
            .iter()
            .map(|hit| RuleDocument {
                content: hit
                    .get("content")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string(),
                metadata: hit.get("metadata").cloned().unwrap_or(Value::Null),
            })
            .collect::<Vec<_>>();

        info!(k, hits = documents.len(), "similarity search complete");
        Ok(documents)
    }

    async fn add_documents(&self, documents: &[RuleDocument]) -> Result<usize, RetrievalError> {
        if documents.is_empty() {
            return Ok(0);
        }
        let config = SearchConfig::from_env()?;
        let url = format!(
            "{}/indexes/{}/docs/index?api-version={}",
            config.endpoint.trim_end_matches('/'),
            config.index_name,
            SEARCH_API_VERSION
        );

        let mut actions = Vec::with_capacity(documents.len());
        for doc in documents {
            let vector = self.embed(&doc.content).await?;
            actions.push(json!({
                "@search.action": "upload",
                "id": Uuid::new_v4().to_string(),
                "content": doc.content,
                "metadata": doc.metadata.to_string(),
                "content_vector": vector,
            }));
        }

        let response = self
            .client
            .post(&url)
            .header("api-key", &config.api_key)
            .json(&json!({ "value": actions }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(RetrievalError::Upload(format!("HTTP {}: {}", status, text)));
        }

        info!(count = documents.len(), index = %config.index_name, "documents uploaded");
        Ok(documents.len())
    }
}
