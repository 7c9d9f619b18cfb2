use crate::config::RetrieverConfig;
use crate::error::Result;
use revctx_vector_store::VectorIndex;
use serde::{Deserialize, Serialize};

/// One retrieved chunk with provenance and its similarity score.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContextSnippet {
    pub chunk_id: String,
    pub text: String,
    pub file_path: String,
    pub start_line: usize,
    pub end_line: usize,
    pub score: f32,
}

/// Scores a query vector against an index and renders results into a
/// bounded context string.
#[derive(Debug, Clone)]
pub struct Retriever {
    config: RetrieverConfig,
}

impl Retriever {
    pub fn new(config: RetrieverConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    #[must_use]
    pub const fn config(&self) -> &RetrieverConfig {
        &self.config
    }

    /// Top-k retrieval over `index`.
    ///
    /// Results below `similarity_threshold` are dropped; what remains is
    /// sorted by descending score with ties broken by file path, then start
    /// line. An empty index or nothing above the threshold yields an empty
    /// vec, never an error.
    pub fn retrieve(
        &self,
        index: &VectorIndex,
        query_vector: &[f32],
        top_k_override: Option<usize>,
    ) -> Result<Vec<ContextSnippet>> {
        let k = top_k_override.unwrap_or(self.config.top_k);
        let hits = index.query(query_vector, k)?;

        let mut snippets: Vec<ContextSnippet> = hits
            .into_iter()
            .filter(|hit| hit.score >= self.config.similarity_threshold)
            .filter_map(|hit| {
                index.get(&hit.chunk_id).map(|(_, meta)| ContextSnippet {
                    chunk_id: hit.chunk_id,
                    text: meta.text.clone(),
                    file_path: meta.file_path.clone(),
                    start_line: meta.start_line,
                    end_line: meta.end_line,
                    score: hit.score,
                })
            })
            .collect();

        snippets.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.file_path.cmp(&b.file_path))
                .then_with(|| a.start_line.cmp(&b.start_line))
        });
        snippets.truncate(k);
        Ok(snippets)
    }

    /// Render snippets into a single context string.
    ///
    /// Blocks are `File: {path} (lines a-b)` headers followed by the chunk
    /// text, joined by blank lines. The `max_context_chars` budget cuts on
    /// whole-snippet boundaries, never mid-snippet.
    #[must_use]
    pub fn render_context(&self, snippets: &[ContextSnippet]) -> String {
        let mut out = String::new();
        for snippet in snippets {
            let block = format!(
                "File: {} (lines {}-{})\n{}",
                snippet.file_path, snippet.start_line, snippet.end_line, snippet.text
            );
            let separator = if out.is_empty() { 0 } else { 2 };
            if out.chars().count() + separator + block.chars().count()
                > self.config.max_context_chars
            {
                break;
            }
            if !out.is_empty() {
                out.push_str("\n\n");
            }
            out.push_str(&block);
        }
        out
    }
}
