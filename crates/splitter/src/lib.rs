//! # Review Context Text Splitter
//!
//! Converts file contents into overlapping chunks with provenance metadata.
//!
//! Splitting is windowed: the content is segmented into units (graphemes,
//! word-bound tokens, or sentences), then a window of `chunk_size` units
//! slides with a stride of `chunk_size - chunk_overlap`. Segments are
//! contiguous byte ranges of the input, so every chunk is an exact slice of
//! the original file and adjacent chunks overlap by exactly `chunk_overlap`
//! units.

mod config;
mod error;
mod splitter;
mod types;

pub use config::{SplitUnit, SplitterConfig};
pub use error::{Result, SplitterError};
pub use splitter::TextSplitter;
pub use types::{content_hash, Chunk};
