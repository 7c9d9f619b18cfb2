use crate::config::{SplitUnit, SplitterConfig};
use crate::error::Result;
use crate::types::Chunk;
use unicode_segmentation::UnicodeSegmentation;

/// Windowed text splitter producing chunks with exact overlap.
pub struct TextSplitter {
    config: SplitterConfig,
}

impl TextSplitter {
    pub fn new(config: SplitterConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    #[must_use]
    pub const fn config(&self) -> &SplitterConfig {
        &self.config
    }

    /// Split file content into chunks covering it end to end.
    ///
    /// Adjacent chunks overlap by exactly `chunk_overlap` units; the final
    /// chunk may be shorter. Content shorter than `chunk_size` units yields
    /// exactly one chunk; empty content yields none. The same input and
    /// config always produce the same chunk set.
    #[must_use]
    pub fn split(&self, file_path: &str, content: &str) -> Vec<Chunk> {
        let segments = segment(content, self.config.unit);
        if segments.is_empty() {
            return Vec::new();
        }

        let size = self.config.chunk_size;
        let stride = self.config.stride();

        let mut chunks = Vec::new();
        let mut cursor = LineCursor::new(content);
        let mut start = 0usize;
        loop {
            let end = (start + size).min(segments.len());
            let byte_start = segments[start].0;
            let byte_end = segments[end - 1].1;
            let text = &content[byte_start..byte_end];

            let start_line = cursor.line_at(byte_start);
            let end_line = start_line + count_newlines(text);
            chunks.push(Chunk::new(file_path, start_line, end_line, text));

            if end == segments.len() {
                break;
            }
            start += stride;
        }

        log::debug!(
            "Split {file_path} into {} chunks ({} {} units)",
            chunks.len(),
            segments.len(),
            self.config.unit.as_str()
        );
        chunks
    }
}

/// Contiguous byte ranges of `content`, one per unit. The ranges tile the
/// whole input, which is what makes chunk coverage structural.
fn segment(content: &str, unit: SplitUnit) -> Vec<(usize, usize)> {
    let bounds: Box<dyn Iterator<Item = (usize, &str)>> = match unit {
        SplitUnit::Character => Box::new(content.grapheme_indices(true)),
        SplitUnit::Token => Box::new(content.split_word_bound_indices()),
        SplitUnit::Sentence => Box::new(content.split_sentence_bound_indices()),
    };
    bounds
        .map(|(offset, piece)| (offset, offset + piece.len()))
        .collect()
}

fn count_newlines(text: &str) -> usize {
    text.bytes().filter(|b| *b == b'\n').count()
}

/// Forward-only line number lookup. Chunk starts are non-decreasing, so the
/// cursor never rescans earlier bytes.
struct LineCursor<'a> {
    bytes: &'a [u8],
    pos: usize,
    line: usize,
}

impl<'a> LineCursor<'a> {
    fn new(content: &'a str) -> Self {
        Self {
            bytes: content.as_bytes(),
            pos: 0,
            line: 1,
        }
    }

    fn line_at(&mut self, byte_offset: usize) -> usize {
        debug_assert!(byte_offset >= self.pos);
        while self.pos < byte_offset {
            if self.bytes[self.pos] == b'\n' {
                self.line += 1;
            }
            self.pos += 1;
        }
        self.line
    }
}
