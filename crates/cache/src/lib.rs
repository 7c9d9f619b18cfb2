//! # Review Context Cache Manager
//!
//! Owns the on-disk cache: one slot per (repository, branch), each holding a
//! manifest describing what was indexed and under which configuration, plus
//! the vector store snapshot. The manager decides hit vs. rebuild and
//! guarantees atomic, crash-safe persistence.
//!
//! Slot layout under the cache directory:
//!
//! ```text
//! <cache_dir>/<slot-id>/
//!   manifest.json   # written last, atomically; its presence marks Valid
//!   index.json      # vector store snapshot, written before the manifest
//!   slot.lock       # fs2 advisory lock serializing builds
//! ```
//!
//! A crash mid-build leaves either the previous manifest (prior Valid state
//! preserved) or none (Absent), never a torn slot.

mod error;
mod manifest;
mod slot;
mod state;

pub use error::{CacheError, Result};
pub use manifest::{unix_now_ms, Manifest, MANIFEST_SCHEMA_VERSION};
pub use slot::{BuildLock, CacheManager, CacheSlot, RebuildPlan};
pub use state::{assess_staleness, BuildInputs, SlotState, StaleAssessment, StaleReason};
