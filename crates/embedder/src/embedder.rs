use crate::backend::{EmbeddingBackend, LocalHashBackend};
use crate::config::{EmbedderConfig, EmbedderProvider};
use crate::error::{EmbedderError, Result};
use crate::remote::{OllamaBackend, OpenAiBackend};
use revctx_splitter::Chunk;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use unicode_segmentation::UnicodeSegmentation;

/// A chunk the embedder could not produce a vector for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbedFailure {
    pub chunk_id: String,
    pub reason: String,
}

/// Per-chunk outcome of embedding a batch sequence. A permanent failure in
/// one batch never discards vectors already obtained in earlier batches.
#[derive(Debug, Default)]
pub struct EmbedOutcome {
    pub embedded: Vec<(String, Vec<f32>)>,
    pub failures: Vec<EmbedFailure>,
}

impl EmbedOutcome {
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Wraps a backend with truncation, batching, per-batch timeout, and retry
/// with exponential backoff.
pub struct Embedder {
    backend: Arc<dyn EmbeddingBackend>,
    config: EmbedderConfig,
}

impl Embedder {
    /// Build the configured backend variant.
    pub fn from_config(config: EmbedderConfig) -> Result<Self> {
        config.validate()?;
        let backend: Arc<dyn EmbeddingBackend> = match config.provider {
            EmbedderProvider::Local => {
                Arc::new(LocalHashBackend::new(config.model.clone(), config.dimension))
            }
            EmbedderProvider::OpenAi => Arc::new(OpenAiBackend::from_config(&config)?),
            EmbedderProvider::Ollama => Arc::new(OllamaBackend::from_config(&config)?),
        };
        Ok(Self { backend, config })
    }

    /// Wrap an externally supplied backend (tests, custom providers).
    pub fn with_backend(backend: Arc<dyn EmbeddingBackend>, config: EmbedderConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { backend, config })
    }

    #[must_use]
    pub fn dimension(&self) -> usize {
        self.backend.dimension()
    }

    /// Fingerprint of the embedding configuration: backend identity,
    /// dimension, and the chunking parameters. A manifest is valid only
    /// while its fingerprint matches this value.
    #[must_use]
    pub fn fingerprint(&self, chunking: &str) -> String {
        format!(
            "{};dim={};{}",
            self.backend.id(),
            self.backend.dimension(),
            chunking
        )
    }

    /// Embed a query string.
    pub async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        let truncated = truncate_units(text, self.config.max_length).to_string();
        let mut vectors = self.embed_batch_with_retry(&[truncated]).await?;
        vectors.pop().ok_or_else(|| {
            EmbedderError::Permanent("backend returned no vector for query".to_string())
        })
    }

    /// Embed chunks in batches of at most `batch_size`, preserving order.
    ///
    /// Transient batch failures are retried with backoff; a permanent
    /// failure stops the run and reports the failing batch's chunk ids plus
    /// every chunk that was not attempted.
    pub async fn embed_chunks(&self, chunks: &[Chunk]) -> EmbedOutcome {
        let mut outcome = EmbedOutcome::default();
        let batches: Vec<&[Chunk]> = chunks.chunks(self.config.batch_size).collect();

        for (batch_no, batch) in batches.iter().enumerate() {
            let texts: Vec<String> = batch
                .iter()
                .map(|chunk| truncate_units(&chunk.text, self.config.max_length).to_string())
                .collect();

            match self.embed_batch_with_retry(&texts).await {
                Ok(vectors) => {
                    for (chunk, vector) in batch.iter().zip(vectors) {
                        outcome.embedded.push((chunk.id.clone(), vector));
                    }
                }
                Err(err) => {
                    log::error!(
                        "Embedding batch {}/{} failed permanently: {err}",
                        batch_no + 1,
                        batches.len()
                    );
                    for chunk in *batch {
                        outcome.failures.push(EmbedFailure {
                            chunk_id: chunk.id.clone(),
                            reason: err.to_string(),
                        });
                    }
                    for later in &batches[batch_no + 1..] {
                        for chunk in *later {
                            outcome.failures.push(EmbedFailure {
                                chunk_id: chunk.id.clone(),
                                reason: "not attempted: embedding run aborted".to_string(),
                            });
                        }
                    }
                    break;
                }
            }
        }
        outcome
    }

    async fn embed_batch_with_retry(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut attempt = 0usize;
        loop {
            let call = self.backend.embed(texts);
            let err = match timeout(self.config.request_timeout(), call).await {
                Ok(Ok(vectors)) => {
                    self.validate_batch(texts.len(), &vectors)?;
                    return Ok(vectors);
                }
                Ok(Err(err)) => err,
                Err(_) => EmbedderError::Transient(format!(
                    "embedding batch timed out after {}ms",
                    self.config.request_timeout_ms
                )),
            };

            if !err.is_transient() || attempt >= self.config.max_retries {
                return Err(err);
            }
            let backoff = Duration::from_millis(
                self.config.retry_backoff_ms.saturating_mul(1 << attempt.min(16)),
            );
            log::warn!(
                "Transient embedding failure (attempt {}/{}), retrying in {:?}: {err}",
                attempt + 1,
                self.config.max_retries,
                backoff
            );
            sleep(backoff).await;
            attempt += 1;
        }
    }

    fn validate_batch(&self, expected: usize, vectors: &[Vec<f32>]) -> Result<()> {
        if vectors.len() != expected {
            return Err(EmbedderError::Permanent(format!(
                "backend returned {} vectors for {expected} inputs",
                vectors.len()
            )));
        }
        for vector in vectors {
            if vector.len() != self.backend.dimension() {
                return Err(EmbedderError::Permanent(format!(
                    "backend returned dimension {} (expected {})",
                    vector.len(),
                    self.backend.dimension()
                )));
            }
        }
        Ok(())
    }
}

/// Cut text after `max_units` word-bound segments. Never splits inside a
/// token.
fn truncate_units(text: &str, max_units: usize) -> &str {
    match text.split_word_bound_indices().nth(max_units) {
        Some((offset, _)) => &text[..offset],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Scripted backend: pops one canned response per call.
    struct ScriptedBackend {
        dimension: usize,
        calls: AtomicUsize,
        script: Mutex<Vec<ScriptStep>>,
        batch_sizes: Mutex<Vec<usize>>,
    }

    enum ScriptStep {
        Ok,
        TransientError,
        PermanentError,
    }

    impl ScriptedBackend {
        fn new(dimension: usize, script: Vec<ScriptStep>) -> Self {
            Self {
                dimension,
                calls: AtomicUsize::new(0),
                script: Mutex::new(script),
                batch_sizes: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl EmbeddingBackend for ScriptedBackend {
        fn id(&self) -> String {
            "scripted:test".to_string()
        }

        fn dimension(&self) -> usize {
            self.dimension
        }

        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.batch_sizes.lock().unwrap().push(texts.len());
            let step = {
                let mut script = self.script.lock().unwrap();
                if script.is_empty() {
                    ScriptStep::Ok
                } else {
                    script.remove(0)
                }
            };
            match step {
                ScriptStep::Ok => Ok(texts
                    .iter()
                    .enumerate()
                    .map(|(i, _)| {
                        let mut v = vec![0.0; self.dimension];
                        v[i % self.dimension] = 1.0;
                        v
                    })
                    .collect()),
                ScriptStep::TransientError => {
                    Err(EmbedderError::Transient("simulated blip".to_string()))
                }
                ScriptStep::PermanentError => {
                    Err(EmbedderError::Permanent("simulated rejection".to_string()))
                }
            }
        }
    }

    fn fast_config(batch_size: usize, max_retries: usize) -> EmbedderConfig {
        EmbedderConfig {
            batch_size,
            max_retries,
            retry_backoff_ms: 1,
            dimension: 4,
            ..Default::default()
        }
    }

    fn chunk(n: usize) -> Chunk {
        Chunk::new(format!("file{n}.rs"), 1, 2, format!("chunk body {n}"))
    }

    #[tokio::test]
    async fn batches_respect_batch_size_and_preserve_order() {
        let backend = Arc::new(ScriptedBackend::new(4, vec![]));
        let embedder = Embedder::with_backend(backend.clone(), fast_config(2, 0)).unwrap();

        let chunks: Vec<Chunk> = (0..5).map(chunk).collect();
        let outcome = embedder.embed_chunks(&chunks).await;

        assert!(outcome.is_complete());
        assert_eq!(outcome.embedded.len(), 5);
        let ids: Vec<&str> = outcome.embedded.iter().map(|(id, _)| id.as_str()).collect();
        let expected: Vec<String> = chunks.iter().map(|c| c.id.clone()).collect();
        assert_eq!(ids, expected.iter().map(String::as_str).collect::<Vec<_>>());
        assert_eq!(*backend.batch_sizes.lock().unwrap(), vec![2, 2, 1]);
    }

    #[tokio::test]
    async fn transient_failures_are_retried() {
        let backend = Arc::new(ScriptedBackend::new(
            4,
            vec![ScriptStep::TransientError, ScriptStep::TransientError],
        ));
        let embedder = Embedder::with_backend(backend.clone(), fast_config(8, 3)).unwrap();

        let chunks: Vec<Chunk> = (0..3).map(chunk).collect();
        let outcome = embedder.embed_chunks(&chunks).await;

        assert!(outcome.is_complete());
        assert_eq!(backend.calls(), 3);
    }

    #[tokio::test]
    async fn permanent_failure_reports_chunk_ids_and_keeps_prior_batches() {
        let backend = Arc::new(ScriptedBackend::new(
            4,
            vec![ScriptStep::Ok, ScriptStep::PermanentError],
        ));
        let embedder = Embedder::with_backend(backend, fast_config(2, 3)).unwrap();

        let chunks: Vec<Chunk> = (0..5).map(chunk).collect();
        let outcome = embedder.embed_chunks(&chunks).await;

        // First batch of two survived.
        assert_eq!(outcome.embedded.len(), 2);
        assert_eq!(outcome.embedded[0].0, chunks[0].id);
        // The failing batch and the never-attempted remainder are reported.
        assert_eq!(outcome.failures.len(), 3);
        assert_eq!(outcome.failures[0].chunk_id, chunks[2].id);
        assert!(outcome.failures[2].reason.contains("not attempted"));
    }

    #[tokio::test]
    async fn retries_are_bounded() {
        let backend = Arc::new(ScriptedBackend::new(
            4,
            vec![
                ScriptStep::TransientError,
                ScriptStep::TransientError,
                ScriptStep::TransientError,
            ],
        ));
        let embedder = Embedder::with_backend(backend.clone(), fast_config(8, 2)).unwrap();

        let outcome = embedder.embed_chunks(&[chunk(0)]).await;
        assert!(!outcome.is_complete());
        assert_eq!(backend.calls(), 3); // initial + 2 retries
    }

    #[tokio::test]
    async fn query_embedding_returns_single_vector() {
        let backend = Arc::new(ScriptedBackend::new(4, vec![]));
        let embedder = Embedder::with_backend(backend, fast_config(8, 0)).unwrap();
        let vector = embedder.embed_query("where is auth handled?").await.unwrap();
        assert_eq!(vector.len(), 4);
    }

    #[test]
    fn truncation_respects_token_bounds() {
        let text = "one two three four five";
        let cut = truncate_units(text, 5);
        // 5 word-bound segments: "one", " ", "two", " ", "three"
        assert_eq!(cut, "one two three");
        assert_eq!(truncate_units("short", 100), "short");
    }

    #[test]
    fn fingerprint_combines_backend_and_chunking() {
        let embedder = Embedder::from_config(EmbedderConfig::default()).unwrap();
        let fp = embedder.fingerprint("unit=token;size=500;overlap=100");
        assert_eq!(fp, "local:hash-v1;dim=256;unit=token;size=500;overlap=100");
    }
}
