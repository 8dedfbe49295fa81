use anyhow::Result;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub session: SessionTimingConfig,
    pub retry: RetryConfig,
    pub models: ModelsConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
}

/// Liveness timing for live sessions
#[derive(Debug, Deserialize)]
pub struct SessionTimingConfig {
    /// Seconds between liveness checks
    pub liveness_check_secs: u64,
    /// Idle seconds before the candidate is re-engaged
    pub idle_timeout_secs: u64,
}

/// Bounded-retry settings for remote model calls
#[derive(Debug, Deserialize)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    /// Seconds before a single model call attempt is abandoned
    pub attempt_timeout_secs: u64,
}

#[derive(Debug, Deserialize)]
pub struct ModelsConfig {
    /// Base URL of an OpenAI-compatible endpoint
    pub base_url: String,
    /// Model used for live conversational turns
    pub chat_model: String,
    /// Model used by the post-session scoring engine
    pub scoring_model: String,
    /// Name of the environment variable holding the API key
    pub api_key_env: String,
}

#[derive(Debug, Deserialize)]
pub struct StorageConfig {
    /// Directory where finalized transcripts are written
    pub transcripts_path: String,
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}
