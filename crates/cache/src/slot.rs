use crate::error::{CacheError, Result};
use crate::manifest::Manifest;
use fs2::FileExt;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

const MANIFEST_FILE_NAME: &str = "manifest.json";
const INDEX_FILE_NAME: &str = "index.json";
const LOCK_FILE_NAME: &str = "slot.lock";
const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Scoped cache root handing out per-(repository, branch) slots. Constructed
/// by the orchestrator; there is no process-wide singleton.
#[derive(Debug, Clone)]
pub struct CacheManager {
    cache_dir: PathBuf,
}

impl CacheManager {
    #[must_use]
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
        }
    }

    #[must_use]
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Stable slot identifier for a (repository, branch) pair.
    #[must_use]
    pub fn slot_id(repository: &str, branch: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(repository.as_bytes());
        hasher.update(b"\n");
        hasher.update(branch.as_bytes());
        let digest = hasher.finalize();
        let mut out = String::with_capacity(16);
        for byte in &digest[..8] {
            out.push_str(&format!("{byte:02x}"));
        }
        out
    }

    #[must_use]
    pub fn slot(&self, repository: &str, branch: &str) -> CacheSlot {
        let id = Self::slot_id(repository, branch);
        CacheSlot {
            id: id.clone(),
            dir: self.cache_dir.join(id),
        }
    }

    /// List the slot ids currently present on disk.
    pub async fn slots(&self) -> Result<Vec<String>> {
        if !self.cache_dir.exists() {
            return Ok(Vec::new());
        }
        let mut ids = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.cache_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                ids.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        ids.sort();
        Ok(ids)
    }

    /// Delete every slot. Returns the ids that were removed.
    pub async fn clear_all(&self) -> Result<Vec<String>> {
        let ids = self.slots().await?;
        for id in &ids {
            tokio::fs::remove_dir_all(self.cache_dir.join(id)).await?;
        }
        log::info!("Cleared {} cache slots", ids.len());
        Ok(ids)
    }
}

/// One (repository, branch) cache slot on disk.
#[derive(Debug, Clone)]
pub struct CacheSlot {
    id: String,
    dir: PathBuf,
}

impl CacheSlot {
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn manifest_path(&self) -> PathBuf {
        self.dir.join(MANIFEST_FILE_NAME)
    }

    #[must_use]
    pub fn index_path(&self) -> PathBuf {
        self.dir.join(INDEX_FILE_NAME)
    }

    fn lock_path(&self) -> PathBuf {
        self.dir.join(LOCK_FILE_NAME)
    }

    /// Read the stored manifest. `Ok(None)` when absent; an unreadable
    /// manifest is an explicit error so callers can treat the slot as stale
    /// instead of silently loading it.
    pub async fn load_manifest(&self) -> Result<Option<Manifest>> {
        let path = self.manifest_path();
        if !path.exists() {
            return Ok(None);
        }
        let bytes = tokio::fs::read(&path).await?;
        match serde_json::from_slice::<Manifest>(&bytes) {
            Ok(manifest) => Ok(Some(manifest)),
            Err(err) => Err(CacheError::ManifestCorrupt {
                path: path.display().to_string(),
                reason: err.to_string(),
            }),
        }
    }

    /// Atomically replace the manifest. Called last in a build commit, after
    /// the index snapshot is already in place.
    pub async fn write_manifest(&self, manifest: &Manifest) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.manifest_path();
        let bytes = serde_json::to_vec_pretty(manifest)?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;
        log::debug!(
            "Wrote manifest for slot {} ({} files, {} chunks)",
            self.id,
            manifest.file_hashes.len(),
            manifest.chunk_count
        );
        Ok(())
    }

    /// Acquire exclusive build access to this slot, waiting up to `wait`.
    ///
    /// Exactly one build may hold the lock; a second concurrent build for
    /// the same slot waits, then fails with `CacheLock`. Reads never take
    /// the lock: atomic renames guarantee they see the old or new files.
    pub async fn begin_build(&self, wait: Duration) -> Result<BuildLock> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.lock_path();
        let slot = self.id.clone();

        let lock = tokio::task::spawn_blocking(move || -> Result<BuildLock> {
            use std::fs::OpenOptions;

            let file = OpenOptions::new()
                .create(true)
                .read(true)
                .write(true)
                .truncate(false)
                .open(&path)?;

            let start = Instant::now();
            let deadline = start + wait;
            loop {
                match file.try_lock_exclusive() {
                    Ok(()) => return Ok(BuildLock { file }),
                    Err(_) if Instant::now() < deadline => {
                        std::thread::sleep(LOCK_POLL_INTERVAL.min(wait));
                    }
                    Err(_) => {
                        return Err(CacheError::CacheLock {
                            slot,
                            waited_ms: start.elapsed().as_millis() as u64,
                        })
                    }
                }
            }
        })
        .await
        .map_err(|err| CacheError::Other(format!("join lock task: {err}")))??;

        Ok(lock)
    }

    /// Delete the slot's persisted files; the slot becomes Absent.
    pub async fn clear(&self) -> Result<bool> {
        if !self.dir.exists() {
            return Ok(false);
        }
        tokio::fs::remove_dir_all(&self.dir).await?;
        log::info!("Cleared cache slot {}", self.id);
        Ok(true)
    }
}

/// Exclusive build access to a slot; unlocks on drop.
#[derive(Debug)]
pub struct BuildLock {
    file: std::fs::File,
}

impl Drop for BuildLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

/// Per-file delta between a stored manifest and the current snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RebuildPlan {
    /// Files that are new or whose content hash moved
    pub changed: Vec<String>,

    /// Files present in the manifest but gone from the snapshot
    pub removed: Vec<String>,

    /// Files whose chunks can be kept as-is
    pub unchanged: usize,
}

impl RebuildPlan {
    #[must_use]
    pub fn between(
        stored: &BTreeMap<String, String>,
        current: &BTreeMap<String, String>,
    ) -> Self {
        let mut plan = Self::default();
        for (path, hash) in current {
            match stored.get(path) {
                Some(old) if old == hash => plan.unchanged += 1,
                _ => plan.changed.push(path.clone()),
            }
        }
        for path in stored.keys() {
            if !current.contains_key(path) {
                plan.removed.push(path.clone());
            }
        }
        plan
    }

    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.changed.is_empty() && self.removed.is_empty()
    }
}
