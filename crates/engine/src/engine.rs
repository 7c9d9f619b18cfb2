use crate::config::RagConfig;
use crate::error::{RagError, Result};
use crate::retriever::{ContextSnippet, Retriever};
use revctx_cache::{
    assess_staleness, BuildInputs, CacheError, CacheManager, CacheSlot, Manifest, RebuildPlan,
    SlotState, StaleAssessment, StaleReason,
};
use revctx_embedder::Embedder;
use revctx_processor::{ProcessStats, RepoProcessor, SourceFile};
use revctx_splitter::{Chunk, TextSplitter};
use revctx_vector_store::{ChunkMeta, VectorIndex};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// A resolved repository snapshot, supplied by the caller. The engine never
/// fetches: `root` must already contain the checked-out content and
/// `content_hash` identify it (commit hash or equivalent).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoSnapshot {
    pub repository: String,
    pub branch: String,
    pub content_hash: String,
    pub root: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexOutcome {
    /// False when the call was a cache hit
    pub built: bool,
    pub chunk_count: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RetrievedContext {
    pub snippets: Vec<ContextSnippet>,
    /// False when no usable index exists for the snapshot
    pub index_ready: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClearOutcome {
    /// Slot ids that were actually removed
    pub cleared: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotStatus {
    pub indexed: bool,
    pub chunk_count: usize,
    pub last_build_unix_ms: Option<u64>,
}

/// Drives the full pipeline: processor, splitter, embedder, vector store,
/// cache manager. One engine serves many snapshots; per-snapshot state lives
/// in cache slots.
pub struct RagEngine {
    config: RagConfig,
    processor: Arc<RepoProcessor>,
    splitter: TextSplitter,
    embedder: Embedder,
    retriever: Retriever,
    cache: CacheManager,
}

/// Point-in-time reading of a slot's persisted state against the current
/// build inputs.
struct SlotView {
    manifest: Option<Manifest>,
    manifest_corrupt: bool,
    index_exists: bool,
    assessment: StaleAssessment,
}

impl RagEngine {
    pub fn new(config: RagConfig) -> Result<Self> {
        let embedder = Embedder::from_config(config.embedder.clone())?;
        Self::with_embedder(config, embedder)
    }

    /// Build an engine around an externally supplied embedder (custom
    /// backends, instrumented backends in tests).
    pub fn with_embedder(config: RagConfig, embedder: Embedder) -> Result<Self> {
        config.validate()?;
        let processor = Arc::new(RepoProcessor::new(config.processor.clone())?);
        let splitter = TextSplitter::new(config.splitter.clone())?;
        let retriever = Retriever::new(config.retriever.clone())?;
        let cache = CacheManager::new(&config.cache_dir);
        Ok(Self {
            config,
            processor,
            splitter,
            embedder,
            retriever,
            cache,
        })
    }

    /// Identity of the embedding + chunking configuration. Manifests built
    /// under a different fingerprint are stale.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        self.embedder
            .fingerprint(&self.splitter.config().fingerprint_component())
    }

    /// Build or refresh the index for a snapshot.
    ///
    /// A valid cache short-circuits unless `force`. Otherwise the build
    /// holds the slot lock, re-embeds only changed files when the prior
    /// snapshot is usable, and commits index-then-manifest atomically. A
    /// failed build leaves the prior slot contents untouched.
    pub async fn index(&self, snapshot: &RepoSnapshot, force: bool) -> Result<IndexOutcome> {
        let slot = self.cache.slot(&snapshot.repository, &snapshot.branch);
        let fingerprint = self.fingerprint();

        let (files, stats) = self.collect_snapshot(snapshot).await?;
        log::info!(
            "Processed {} for indexing: {} files emitted, {} skipped",
            snapshot.repository,
            stats.emitted,
            stats.total_skipped()
        );
        let file_hashes: BTreeMap<String, String> = files
            .iter()
            .map(|file| (file.path.clone(), file.content_hash.clone()))
            .collect();

        let view = self
            .view_slot(&slot, &fingerprint, snapshot, &file_hashes)
            .await?;
        if !force && view.assessment.state == SlotState::Valid {
            let chunk_count = view.manifest.map_or(0, |m| m.chunk_count);
            log::info!("Cache hit for slot {} ({chunk_count} chunks)", slot.id());
            return Ok(IndexOutcome {
                built: false,
                chunk_count,
            });
        }
        log::info!(
            "Building slot {} (state {:?}, reasons {:?})",
            slot.id(),
            view.assessment.state,
            view.assessment.reasons
        );

        let _lock = slot
            .begin_build(Duration::from_millis(self.config.lock_wait_ms))
            .await?;

        // A concurrent build may have committed while this one waited on
        // the lock; the pre-lock view is no longer authoritative.
        let view = self
            .view_slot(&slot, &fingerprint, snapshot, &file_hashes)
            .await?;
        if !force && view.assessment.state == SlotState::Valid {
            let chunk_count = view.manifest.map_or(0, |m| m.chunk_count);
            log::info!(
                "Slot {} became valid while waiting for the lock ({chunk_count} chunks)",
                slot.id()
            );
            return Ok(IndexOutcome {
                built: false,
                chunk_count,
            });
        }

        // Delta builds need a loadable prior snapshot built under the same
        // fingerprint; anything else falls back to a full rebuild.
        let delta_eligible = !force
            && view.index_exists
            && !view.manifest_corrupt
            && view.manifest.is_some()
            && !view
                .assessment
                .reasons
                .iter()
                .any(|r| matches!(r, StaleReason::FingerprintMismatch));

        let (mut index, plan) = if delta_eligible {
            match VectorIndex::load(&slot.index_path()).await {
                Ok(prior) if prior.dimension() == self.embedder.dimension() => {
                    let stored = view
                        .manifest
                        .as_ref()
                        .map(|m| m.file_hashes.clone())
                        .unwrap_or_default();
                    let plan = RebuildPlan::between(&stored, &file_hashes);
                    log::info!(
                        "Delta build: {} changed, {} removed, {} unchanged",
                        plan.changed.len(),
                        plan.removed.len(),
                        plan.unchanged
                    );
                    (prior, plan)
                }
                Ok(prior) => {
                    log::warn!(
                        "Prior index dimension {} does not match embedder dimension {}; full rebuild",
                        prior.dimension(),
                        self.embedder.dimension()
                    );
                    self.full_plan(&file_hashes)
                }
                Err(err) => {
                    log::warn!("Prior index unusable ({err}); full rebuild");
                    self.full_plan(&file_hashes)
                }
            }
        } else {
            self.full_plan(&file_hashes)
        };

        for path in plan.changed.iter().chain(plan.removed.iter()) {
            index.delete_file(path);
        }

        let chunks = self.chunk_files(&files, &plan);
        let outcome = self.embedder.embed_chunks(&chunks).await;
        if !outcome.is_complete() {
            return Err(RagError::from_failures(&outcome.failures));
        }

        let by_id: BTreeMap<&str, &Chunk> =
            chunks.iter().map(|chunk| (chunk.id.as_str(), chunk)).collect();
        for (chunk_id, vector) in outcome.embedded {
            let chunk = by_id.get(chunk_id.as_str()).ok_or_else(|| {
                RagError::Embedding {
                    reason: format!("backend returned vector for unknown chunk {chunk_id}"),
                    chunk_ids: vec![chunk_id.clone()],
                }
            })?;
            index.upsert(
                chunk_id,
                vector,
                ChunkMeta {
                    file_path: chunk.file_path.clone(),
                    start_line: chunk.start_line,
                    end_line: chunk.end_line,
                    content_hash: chunk.content_hash.clone(),
                    text: chunk.text.clone(),
                },
            )?;
        }

        // Commit order matters: snapshot first, manifest last.
        index.persist(&slot.index_path()).await?;
        let manifest = Manifest::new(
            snapshot.repository.clone(),
            snapshot.branch.clone(),
            snapshot.content_hash.clone(),
            fingerprint,
            file_hashes,
            index.len(),
        );
        slot.write_manifest(&manifest).await?;

        log::info!(
            "Built slot {}: {} chunks from {} files",
            slot.id(),
            index.len(),
            files.len()
        );
        Ok(IndexOutcome {
            built: true,
            chunk_count: index.len(),
        })
    }

    /// Retrieve review context for a query.
    ///
    /// An absent slot triggers a non-forced `index` first. No usable context
    /// is an empty result with `index_ready` reporting whether an index was
    /// available at all.
    pub async fn retrieve_context(
        &self,
        snapshot: &RepoSnapshot,
        query: &str,
        top_k_override: Option<usize>,
    ) -> Result<RetrievedContext> {
        let slot = self.cache.slot(&snapshot.repository, &snapshot.branch);
        let manifest_ok = matches!(slot.load_manifest().await, Ok(Some(_)));
        if !manifest_ok || !slot.index_path().exists() {
            self.index(snapshot, false).await?;
        }

        let index = match VectorIndex::load(&slot.index_path()).await {
            Ok(index) => index,
            Err(err) if err.is_corruption() => {
                log::warn!("Index for slot {} corrupt ({err}); rebuilding", slot.id());
                self.index(snapshot, true).await?;
                VectorIndex::load(&slot.index_path()).await?
            }
            Err(err) => return Err(err.into()),
        };

        if index.is_empty() {
            return Ok(RetrievedContext {
                snippets: Vec::new(),
                index_ready: true,
            });
        }

        let query_vector = self.embedder.embed_query(query).await?;
        let snippets = self.retriever.retrieve(&index, &query_vector, top_k_override)?;
        log::debug!(
            "Retrieved {} snippets for query on slot {}",
            snippets.len(),
            slot.id()
        );
        Ok(RetrievedContext {
            snippets,
            index_ready: true,
        })
    }

    /// Render retrieved snippets into a bounded context string.
    #[must_use]
    pub fn render_context(&self, snippets: &[ContextSnippet]) -> String {
        self.retriever.render_context(snippets)
    }

    /// Drop the cache for one snapshot, or every slot when `None`.
    pub async fn clear_cache(&self, snapshot: Option<&RepoSnapshot>) -> Result<ClearOutcome> {
        let cleared = match snapshot {
            Some(snapshot) => {
                let slot = self.cache.slot(&snapshot.repository, &snapshot.branch);
                if slot.clear().await? {
                    vec![slot.id().to_string()]
                } else {
                    Vec::new()
                }
            }
            None => self.cache.clear_all().await?,
        };
        Ok(ClearOutcome { cleared })
    }

    /// Report whether a snapshot has a usable index and how fresh it is.
    pub async fn status(&self, snapshot: &RepoSnapshot) -> Result<SlotStatus> {
        let slot = self.cache.slot(&snapshot.repository, &snapshot.branch);
        let manifest = match slot.load_manifest().await {
            Ok(manifest) => manifest,
            Err(CacheError::ManifestCorrupt { .. }) => None,
            Err(err) => return Err(err.into()),
        };
        match manifest {
            Some(manifest) if slot.index_path().exists() => Ok(SlotStatus {
                indexed: true,
                chunk_count: manifest.chunk_count,
                last_build_unix_ms: Some(manifest.built_at_unix_ms),
            }),
            _ => Ok(SlotStatus {
                indexed: false,
                chunk_count: 0,
                last_build_unix_ms: None,
            }),
        }
    }

    /// Run the filesystem walk on the blocking pool.
    async fn collect_snapshot(
        &self,
        snapshot: &RepoSnapshot,
    ) -> Result<(Vec<SourceFile>, ProcessStats)> {
        let processor = Arc::clone(&self.processor);
        let root = snapshot.root.clone();
        tokio::task::spawn_blocking(move || processor.collect(&root))
            .await
            .map_err(|err| RagError::RepositoryAccess(format!("join processing task: {err}")))?
            .map_err(Into::into)
    }

    async fn view_slot(
        &self,
        slot: &CacheSlot,
        fingerprint: &str,
        snapshot: &RepoSnapshot,
        file_hashes: &BTreeMap<String, String>,
    ) -> Result<SlotView> {
        let (manifest, manifest_corrupt) = match slot.load_manifest().await {
            Ok(manifest) => (manifest, false),
            Err(CacheError::ManifestCorrupt { path, reason }) => {
                log::warn!("Ignoring corrupt manifest at {path}: {reason}");
                (None, true)
            }
            Err(err) => return Err(err.into()),
        };
        let index_exists = slot.index_path().exists();
        let assessment = assess_staleness(
            manifest.as_ref(),
            manifest_corrupt,
            index_exists,
            &BuildInputs {
                content_hash: &snapshot.content_hash,
                embedder_fingerprint: fingerprint,
                file_hashes,
            },
        );
        Ok(SlotView {
            manifest,
            manifest_corrupt,
            index_exists,
            assessment,
        })
    }

    fn full_plan(&self, file_hashes: &BTreeMap<String, String>) -> (VectorIndex, RebuildPlan) {
        let plan = RebuildPlan {
            changed: file_hashes.keys().cloned().collect(),
            removed: Vec::new(),
            unchanged: 0,
        };
        (VectorIndex::new(self.embedder.dimension()), plan)
    }

    fn chunk_files(&self, files: &[SourceFile], plan: &RebuildPlan) -> Vec<Chunk> {
        let changed: BTreeSet<&str> = plan.changed.iter().map(String::as_str).collect();
        let mut chunks = Vec::new();
        for file in files {
            if changed.contains(file.path.as_str()) {
                chunks.extend(self.splitter.split(&file.path, &file.content));
            }
        }
        chunks
    }
}
