use crate::error::{ProcessorError, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};

/// Configuration for repository file selection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ProcessorConfig {
    /// Glob patterns a file must match to be indexed (empty = everything)
    pub include_patterns: Vec<String>,

    /// Glob patterns that exclude a file, matched against the relative path
    /// and the bare file name
    pub exclude_patterns: Vec<String>,

    /// Cap on the number of emitted files; excess is dropped in sort order
    pub max_files: usize,

    /// Per-file byte limit
    pub max_file_bytes: u64,

    /// Per-file line limit
    pub max_file_lines: usize,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            include_patterns: Vec::new(),
            exclude_patterns: vec![
                "*.min.js".to_string(),
                "*.lock".to_string(),
                "package-lock.json".to_string(),
            ],
            max_files: 1000,
            max_file_bytes: 1_048_576, // 1 MB
            max_file_lines: 20_000,
        }
    }
}

impl ProcessorConfig {
    pub(crate) fn build_globs(&self) -> Result<(Option<GlobSet>, GlobSet)> {
        let include = if self.include_patterns.is_empty() {
            None
        } else {
            Some(compile_set(&self.include_patterns)?)
        };
        let exclude = compile_set(&self.exclude_patterns)?;
        Ok((include, exclude))
    }
}

fn compile_set(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|err| ProcessorError::InvalidPattern {
            pattern: pattern.clone(),
            reason: err.to_string(),
        })?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|err| ProcessorError::InvalidPattern {
            pattern: patterns.join(","),
            reason: err.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_compiles() {
        assert!(ProcessorConfig::default().build_globs().is_ok());
    }

    #[test]
    fn invalid_pattern_is_rejected() {
        let config = ProcessorConfig {
            exclude_patterns: vec!["a{".to_string()],
            ..Default::default()
        };
        assert!(config.build_globs().is_err());
    }
}
