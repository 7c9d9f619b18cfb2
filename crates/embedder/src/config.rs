use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Named embedding backend variants. Selection is a configuration value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EmbedderProvider {
    /// Deterministic hash-projection model, fully offline
    #[default]
    Local,
    /// OpenAI-style `/v1/embeddings` HTTP API
    OpenAi,
    /// Ollama-style `/api/embed` HTTP API
    Ollama,
}

impl EmbedderProvider {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::OpenAi => "openai",
            Self::Ollama => "ollama",
        }
    }
}

/// Embedder configuration shared by all backends.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EmbedderConfig {
    pub provider: EmbedderProvider,

    /// Model identifier; part of the embedder fingerprint
    pub model: String,

    /// Vector dimension the store will be built with
    pub dimension: usize,

    /// Base URL for remote providers
    pub base_url: Option<String>,

    /// Environment variable holding the API key for remote providers
    pub api_key_env: Option<String>,

    /// Maximum inputs per backend call
    pub batch_size: usize,

    /// Inputs are truncated to this many tokens before embedding
    pub max_length: usize,

    /// Retries per batch on transient failure
    pub max_retries: usize,

    /// Base backoff between retries, doubled per attempt
    pub retry_backoff_ms: u64,

    /// Per-batch deadline, independent of overall process lifetime
    pub request_timeout_ms: u64,
}

impl Default for EmbedderConfig {
    fn default() -> Self {
        Self {
            provider: EmbedderProvider::Local,
            model: "hash-v1".to_string(),
            dimension: 256,
            base_url: None,
            api_key_env: None,
            batch_size: 32,
            max_length: 512,
            max_retries: 3,
            retry_backoff_ms: 200,
            request_timeout_ms: 30_000,
        }
    }
}

impl EmbedderConfig {
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn validate(&self) -> crate::Result<()> {
        if self.dimension == 0 {
            return Err(crate::EmbedderError::InvalidConfig(
                "dimension must be > 0".to_string(),
            ));
        }
        if self.batch_size == 0 {
            return Err(crate::EmbedderError::InvalidConfig(
                "batch_size must be > 0".to_string(),
            ));
        }
        if self.max_length == 0 {
            return Err(crate::EmbedderError::InvalidConfig(
                "max_length must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}
