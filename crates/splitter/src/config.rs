use crate::error::{Result, SplitterError};
use serde::{Deserialize, Serialize};

/// Unit in which `chunk_size` and `chunk_overlap` are counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SplitUnit {
    /// Grapheme clusters
    Character,
    /// Word-bound segments; a token is never split internally
    #[default]
    Token,
    /// Sentence boundaries
    Sentence,
}

impl SplitUnit {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Character => "character",
            Self::Token => "token",
            Self::Sentence => "sentence",
        }
    }
}

/// Configuration for windowed text splitting
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SplitterConfig {
    /// Window size in units
    pub chunk_size: usize,

    /// Overlap between adjacent windows in units (must be < chunk_size)
    pub chunk_overlap: usize,

    /// Unit the window is counted in
    pub unit: SplitUnit,
}

impl Default for SplitterConfig {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            chunk_overlap: 100,
            unit: SplitUnit::Token,
        }
    }
}

impl SplitterConfig {
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(SplitterError::InvalidConfig(
                "chunk_size must be > 0".to_string(),
            ));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(SplitterError::InvalidConfig(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        Ok(())
    }

    /// Stride between adjacent window starts, in units.
    #[must_use]
    pub const fn stride(&self) -> usize {
        self.chunk_size - self.chunk_overlap
    }

    /// Stable description of the chunking parameters, used in the
    /// embedder fingerprint recorded by the cache manifest.
    #[must_use]
    pub fn fingerprint_component(&self) -> String {
        format!(
            "unit={};size={};overlap={}",
            self.unit.as_str(),
            self.chunk_size,
            self.chunk_overlap
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_valid() {
        assert!(SplitterConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_zero_chunk_size() {
        let config = SplitterConfig {
            chunk_size: 0,
            chunk_overlap: 0,
            unit: SplitUnit::Character,
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_overlap_not_smaller_than_size() {
        let config = SplitterConfig {
            chunk_size: 100,
            chunk_overlap: 100,
            unit: SplitUnit::Character,
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn fingerprint_component_is_stable() {
        let config = SplitterConfig {
            chunk_size: 500,
            chunk_overlap: 100,
            unit: SplitUnit::Character,
        };
        assert_eq!(
            config.fingerprint_component(),
            "unit=character;size=500;overlap=100"
        );
    }
}
