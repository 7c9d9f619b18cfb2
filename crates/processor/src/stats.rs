use serde::{Deserialize, Serialize};

/// Counters for one processing pass over a repository snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProcessStats {
    /// Files emitted for chunking
    pub emitted: usize,

    /// Files skipped by exclude patterns or a non-matching include set
    pub skipped_excluded: usize,

    /// Files skipped because the content looks binary
    pub skipped_binary: usize,

    /// Files skipped for exceeding the byte or line limits
    pub skipped_too_large: usize,

    /// Files skipped for an unsupported extension
    pub skipped_unsupported: usize,

    /// Files that could not be read (permissions, races with deletion)
    pub skipped_unreadable: usize,

    /// Files dropped by the `max_files` cap (after sorting)
    pub dropped_over_cap: usize,
}

impl ProcessStats {
    #[must_use]
    pub const fn total_skipped(&self) -> usize {
        self.skipped_excluded
            + self.skipped_binary
            + self.skipped_too_large
            + self.skipped_unsupported
            + self.skipped_unreadable
            + self.dropped_over_cap
    }
}
