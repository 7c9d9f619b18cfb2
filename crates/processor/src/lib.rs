//! # Review Context Repository Processor
//!
//! Walks a snapshot of repository files and emits an ordered sequence of
//! `(path, content)` pairs for indexing. Filtering (globs, binary detection,
//! size caps, extension allowlist) is policy, not error: skipped files are
//! counted, never fatal. Output order is lexicographic by relative path so
//! that the `max_files` cap drops the excess deterministically.

mod config;
mod error;
mod processor;
mod stats;

pub use config::ProcessorConfig;
pub use error::{ProcessorError, Result};
pub use processor::{RepoProcessor, SourceFile};
pub use stats::ProcessStats;
