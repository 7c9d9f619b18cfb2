use crate::error::{RagError, Result};
use revctx_embedder::EmbedderConfig;
use revctx_processor::ProcessorConfig;
use revctx_splitter::SplitterConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Retrieval-side knobs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetrieverConfig {
    /// Maximum results per query
    pub top_k: usize,

    /// Minimum cosine score a result must reach
    pub similarity_threshold: f32,

    /// Character budget when rendering results into a context string
    pub max_context_chars: usize,
}

impl Default for RetrieverConfig {
    fn default() -> Self {
        Self {
            top_k: 10,
            similarity_threshold: 0.7,
            max_context_chars: 2000,
        }
    }
}

impl RetrieverConfig {
    pub fn validate(&self) -> Result<()> {
        if self.top_k == 0 {
            return Err(RagError::Config("top_k must be > 0".to_string()));
        }
        if !(-1.0..=1.0).contains(&self.similarity_threshold) {
            return Err(RagError::Config(format!(
                "similarity_threshold ({}) must be within [-1, 1]",
                self.similarity_threshold
            )));
        }
        Ok(())
    }
}

/// Top-level engine configuration, one section per stage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RagConfig {
    /// Root directory for per-(repository, branch) cache slots
    pub cache_dir: PathBuf,

    /// Bounded wait on a contended slot lock before giving up
    pub lock_wait_ms: u64,

    pub processor: ProcessorConfig,
    pub splitter: SplitterConfig,
    pub embedder: EmbedderConfig,
    pub retriever: RetrieverConfig,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            cache_dir: PathBuf::from(".revctx/cache"),
            lock_wait_ms: 5_000,
            processor: ProcessorConfig::default(),
            splitter: SplitterConfig::default(),
            embedder: EmbedderConfig::default(),
            retriever: RetrieverConfig::default(),
        }
    }
}

impl RagConfig {
    /// Defaults rooted at `cache_dir`.
    #[must_use]
    pub fn with_cache_dir(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            ..Self::default()
        }
    }

    /// Load a TOML config file. Missing sections fall back to defaults.
    pub async fn from_toml_path(path: &Path) -> Result<Self> {
        let raw = tokio::fs::read_to_string(path).await?;
        let config: Self = toml::from_str(&raw)
            .map_err(|err| RagError::Config(format!("{}: {err}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.cache_dir.as_os_str().is_empty() {
            return Err(RagError::Config("cache_dir must be set".to_string()));
        }
        self.splitter.validate()?;
        self.embedder.validate()?;
        self.retriever.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use revctx_embedder::EmbedderProvider;
    use tempfile::tempdir;

    #[test]
    fn defaults_match_documented_values() {
        let config = RagConfig::default();
        assert_eq!(config.splitter.chunk_size, 500);
        assert_eq!(config.splitter.chunk_overlap, 100);
        assert_eq!(config.retriever.top_k, 10);
        assert!((config.retriever.similarity_threshold - 0.7).abs() < 1e-6);
        assert_eq!(config.retriever.max_context_chars, 2000);
        assert_eq!(config.embedder.batch_size, 32);
        assert_eq!(config.embedder.max_length, 512);
        assert_eq!(config.processor.max_files, 1000);
    }

    #[test]
    fn threshold_outside_score_range_is_rejected() {
        let config = RetrieverConfig {
            similarity_threshold: 1.5,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[tokio::test]
    async fn partial_toml_fills_in_defaults() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("revctx.toml");
        tokio::fs::write(
            &path,
            r#"
cache_dir = "/tmp/revctx-cache"

[splitter]
chunk_size = 200
chunk_overlap = 40

[embedder]
provider = "local"
model = "hash-v1"

[retriever]
top_k = 5
"#,
        )
        .await
        .unwrap();

        let config = RagConfig::from_toml_path(&path).await.unwrap();
        assert_eq!(config.splitter.chunk_size, 200);
        assert_eq!(config.splitter.chunk_overlap, 40);
        assert_eq!(config.retriever.top_k, 5);
        // Untouched sections keep their defaults.
        assert!((config.retriever.similarity_threshold - 0.7).abs() < 1e-6);
        assert_eq!(config.embedder.provider, EmbedderProvider::Local);
        assert_eq!(config.embedder.dimension, 256);
    }

    #[tokio::test]
    async fn invalid_toml_is_a_config_error() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("revctx.toml");
        tokio::fs::write(&path, "cache_dir = [broken").await.unwrap();
        let err = RagConfig::from_toml_path(&path).await.unwrap_err();
        assert!(matches!(err, RagError::Config(_)));
    }
}
