use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A bounded span of a source file with provenance and a content hash.
///
/// Identity is `(file_path, start_line, end_line, content_hash)`. Chunks are
/// immutable: when the source content changes, new chunks supersede the old
/// ones instead of mutating them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Chunk {
    /// Deterministic identifier derived from the identity tuple
    pub id: String,

    /// Source file path, relative to the repository root
    pub file_path: String,

    /// Start line in the original file (1-indexed)
    pub start_line: usize,

    /// End line in the original file (1-indexed, inclusive)
    pub end_line: usize,

    /// The chunk text, an exact slice of the original file
    pub text: String,

    /// SHA-256 hex digest of `text`
    pub content_hash: String,
}

impl Chunk {
    #[must_use]
    pub fn new(
        file_path: impl Into<String>,
        start_line: usize,
        end_line: usize,
        text: impl Into<String>,
    ) -> Self {
        let file_path = file_path.into();
        let text = text.into();
        let content_hash = content_hash(&text);
        let id = format!(
            "{file_path}:{start_line}-{end_line}:{}",
            &content_hash[..12]
        );
        Self {
            id,
            file_path,
            start_line,
            end_line,
            text,
            content_hash,
        }
    }

    /// Number of lines this chunk spans
    #[must_use]
    pub const fn line_count(&self) -> usize {
        self.end_line.saturating_sub(self.start_line) + 1
    }
}

/// SHA-256 hex digest of a text, as used for chunk and file hashes.
#[must_use]
pub fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(64);
    for byte in digest {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}
