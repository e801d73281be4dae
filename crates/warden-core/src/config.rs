//! Service configuration loaded from the environment.
//!
//! All external collaborators are configured through environment variables
//! (loaded from `.env` by the binaries before anything else runs). Clients
//! read their configuration at call time, so a missing credential surfaces
//! as a stage failure in the audit state rather than aborting the process;
//! only the offline indexer treats missing values as fatal.

use thiserror::Error;

pub const ENV_OPENAI_ENDPOINT: &str = "AZURE_OPENAI_ENDPOINT";
pub const ENV_OPENAI_API_KEY: &str = "AZURE_OPENAI_API_KEY";
pub const ENV_OPENAI_API_VERSION: &str = "AZURE_OPENAI_API_VERSION";
pub const ENV_OPENAI_CHAT_DEPLOYMENT: &str = "AZURE_OPENAI_CHAT_DEPLOYMENT";
pub const ENV_OPENAI_EMBEDDING_DEPLOYMENT: &str = "AZURE_OPENAI_EMBEDDING_DEPLOYMENT";
pub const ENV_SEARCH_ENDPOINT: &str = "AZURE_SEARCH_ENDPOINT";
pub const ENV_SEARCH_API_KEY: &str = "AZURE_SEARCH_API_KEY";
pub const ENV_SEARCH_INDEX_NAME: &str = "AZURE_SEARCH_INDEX_NAME";
pub const ENV_VI_LOCATION: &str = "AZURE_VI_LOCATION";
pub const ENV_VI_ACCOUNT_ID: &str = "AZURE_VI_ACCOUNT_ID";
pub const ENV_VI_SUBSCRIPTION_KEY: &str = "AZURE_VI_SUBSCRIPTION_KEY";

const DEFAULT_API_VERSION: &str = "2024-02-01";
const DEFAULT_EMBEDDING_DEPLOYMENT: &str = "text-embedding-3-small";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variables: {}", .0.join(", "))]
    MissingVars(Vec<String>),
}

/// Azure OpenAI connection settings (chat + embeddings share one resource).
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub endpoint: String,
    pub api_key: String,
    pub api_version: String,
    pub chat_deployment: String,
    pub embedding_deployment: String,
}

impl OpenAiConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let missing = missing_vars(&[
            ENV_OPENAI_ENDPOINT,
            ENV_OPENAI_API_KEY,
            ENV_OPENAI_CHAT_DEPLOYMENT,
        ]);
        if !missing.is_empty() {
            return Err(ConfigError::MissingVars(missing));
        }
        Ok(Self {
            endpoint: env_trimmed(ENV_OPENAI_ENDPOINT).unwrap_or_default(),
            api_key: env_trimmed(ENV_OPENAI_API_KEY).unwrap_or_default(),
            api_version: env_trimmed(ENV_OPENAI_API_VERSION)
                .unwrap_or_else(|| DEFAULT_API_VERSION.to_string()),
            chat_deployment: env_trimmed(ENV_OPENAI_CHAT_DEPLOYMENT).unwrap_or_default(),
            embedding_deployment: env_trimmed(ENV_OPENAI_EMBEDDING_DEPLOYMENT)
                .unwrap_or_else(|| DEFAULT_EMBEDDING_DEPLOYMENT.to_string()),
        })
    }
}

/// Azure AI Search connection settings for the rule index.
#[derive(Debug, Clone)]
pub struct SearchConfig {
    pub endpoint: String,
    pub api_key: String,
    pub index_name: String,
}

impl SearchConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let missing = missing_vars(&[
            ENV_SEARCH_ENDPOINT,
            ENV_SEARCH_API_KEY,
            ENV_SEARCH_INDEX_NAME,
        ]);
        if !missing.is_empty() {
            return Err(ConfigError::MissingVars(missing));
        }
        Ok(Self {
            endpoint: env_trimmed(ENV_SEARCH_ENDPOINT).unwrap_or_default(),
            api_key: env_trimmed(ENV_SEARCH_API_KEY).unwrap_or_default(),
            index_name: env_trimmed(ENV_SEARCH_INDEX_NAME).unwrap_or_default(),
        })
    }
}

/// Azure Video Indexer account settings.
#[derive(Debug, Clone)]
pub struct VideoIndexerConfig {
    pub location: String,
    pub account_id: String,
    pub subscription_key: String,
}

impl VideoIndexerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let missing = missing_vars(&[ENV_VI_LOCATION, ENV_VI_ACCOUNT_ID, ENV_VI_SUBSCRIPTION_KEY]);
        if !missing.is_empty() {
            return Err(ConfigError::MissingVars(missing));
        }
        Ok(Self {
            location: env_trimmed(ENV_VI_LOCATION).unwrap_or_default(),
            account_id: env_trimmed(ENV_VI_ACCOUNT_ID).unwrap_or_default(),
            subscription_key: env_trimmed(ENV_VI_SUBSCRIPTION_KEY).unwrap_or_default(),
        })
    }
}

/// Names from `required` that are unset or blank in the environment.
/// The offline indexer hard-stops on a non-empty result; runtime clients
/// convert it into a recorded stage failure.
pub fn missing_vars(required: &[&str]) -> Vec<String> {
    required
        .iter()
        .filter(|name| env_trimmed(name).is_none())
        .map(|name| name.to_string())
        .collect()
}

fn env_trimmed(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_vars_reports_blank_and_unset() {
        // Var names chosen to not collide with anything real.
        std::env::set_var("WARDEN_TEST_SET", "value");
        std::env::set_var("WARDEN_TEST_BLANK", "   ");
        std::env::remove_var("WARDEN_TEST_UNSET");

        let missing = missing_vars(&["WARDEN_TEST_SET", "WARDEN_TEST_BLANK", "WARDEN_TEST_UNSET"]);
        assert_eq!(
            missing,
            vec!["WARDEN_TEST_BLANK".to_string(), "WARDEN_TEST_UNSET".to_string()]
        );
    }

    #[test]
    fn config_error_enumerates_names() {
        let err = ConfigError::MissingVars(vec![
            "AZURE_SEARCH_ENDPOINT".to_string(),
            "AZURE_SEARCH_API_KEY".to_string(),
        ]);
        let msg = err.to_string();
        assert!(msg.contains("AZURE_SEARCH_ENDPOINT"));
        assert!(msg.contains("AZURE_SEARCH_API_KEY"));
    }
}
