//! # Review Context Embedder
//!
//! Capability interface for turning chunk and query text into fixed-dimension
//! vectors, plus the machinery around any backend: batching, truncation,
//! per-batch timeouts, retry with backoff, and per-chunk failure reporting.
//!
//! Backends are named configuration variants, not runtime type inspection:
//! a deterministic local hash-projection model (offline, useful for tests and
//! air-gapped runs) and two remote HTTP providers (OpenAI- and Ollama-style
//! embedding APIs). All backends produce unit-normalized vectors, so cosine
//! scoring downstream equals the dot product.

mod backend;
mod config;
mod embedder;
mod error;
mod remote;

pub use backend::{EmbeddingBackend, LocalHashBackend};
pub use config::{EmbedderConfig, EmbedderProvider};
pub use embedder::{EmbedFailure, EmbedOutcome, Embedder};
pub use error::{EmbedderError, Result};
pub use remote::{OllamaBackend, OpenAiBackend};
