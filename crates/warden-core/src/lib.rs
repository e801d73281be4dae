//! warden-core: compliance audit core (audit state, pipeline driver,
//! media/rule/model clients, verdict parsing, chunking).
//!
//! The runner and indexer binaries depend on this crate; everything they
//! need is re-exported here.

mod chunker;
mod config;
mod judge;
mod media_indexer;
mod pipeline;
mod prompts;
mod rule_store;
mod state;
mod verdict;

// Session state threaded through the stages.
pub use state::{AuditState, AuditStatus, ComplianceIssue, StageUpdate};

// Configuration (environment-driven; clients read it at call time).
pub use config::{
    missing_vars, ConfigError, OpenAiConfig, SearchConfig, VideoIndexerConfig,
    ENV_OPENAI_API_KEY, ENV_OPENAI_API_VERSION, ENV_OPENAI_CHAT_DEPLOYMENT,
    ENV_OPENAI_EMBEDDING_DEPLOYMENT, ENV_OPENAI_ENDPOINT, ENV_SEARCH_API_KEY,
    ENV_SEARCH_ENDPOINT, ENV_SEARCH_INDEX_NAME, ENV_VI_ACCOUNT_ID, ENV_VI_LOCATION,
    ENV_VI_SUBSCRIPTION_KEY,
};

// Media extraction collaborator.
pub use media_indexer::{
    extract_insights, is_supported_video_url, AzureVideoIndexer, ExtractedMedia, IndexerError,
    MediaIndexer,
};

// Rule retrieval collaborator.
pub use rule_store::{AzureSearchStore, RetrievalError, RuleDocument, RuleStore};

// Judgment model client + prompts + verdict parsing.
pub use judge::{ChatJudge, JudgeError, JudgeMode};
pub use prompts::{
    auditor_system_prompt, auditor_user_prompt, AUDITOR_SYSTEM_TEMPLATE, AUDITOR_USER_TEMPLATE,
};
pub use verdict::{parse_verdict, AuditVerdict, VerdictError, FALLBACK_REPORT};

// Pipeline driver.
pub use pipeline::{
    build_rule_query, extraction_stage, judgment_stage, run_audit, NO_TRANSCRIPT_REPORT,
    RULE_TOP_K,
};

// Offline indexing chunker.
pub use chunker::{chunk_document, split_text, CHUNK_OVERLAP, CHUNK_SIZE};
