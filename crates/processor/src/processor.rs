use crate::config::ProcessorConfig;
use crate::error::{ProcessorError, Result};
use crate::stats::ProcessStats;
use globset::GlobSet;
use ignore::WalkBuilder;
use revctx_splitter::content_hash;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One readable file from the repository snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceFile {
    /// Path relative to the snapshot root, `/`-separated
    pub path: String,

    /// Decoded file content
    pub content: String,

    /// SHA-256 hex digest of `content`
    pub content_hash: String,
}

/// Walks a repository snapshot and emits filtered, ordered file contents.
pub struct RepoProcessor {
    config: ProcessorConfig,
    include: Option<GlobSet>,
    exclude: GlobSet,
}

impl RepoProcessor {
    pub fn new(config: ProcessorConfig) -> Result<Self> {
        let (include, exclude) = config.build_globs()?;
        Ok(Self {
            config,
            include,
            exclude,
        })
    }

    /// Collect `(path, content)` pairs from the snapshot rooted at `root`.
    ///
    /// The sequence is ordered lexicographically by relative path and capped
    /// at `max_files`; the cap drops the tail of the sorted sequence, not an
    /// arbitrary subset. The source tree is never mutated.
    pub fn collect(&self, root: &Path) -> Result<(Vec<SourceFile>, ProcessStats)> {
        if !root.is_dir() {
            return Err(ProcessorError::RepositoryAccess(format!(
                "snapshot root is not a directory: {}",
                root.display()
            )));
        }

        let mut stats = ProcessStats::default();
        let mut files = Vec::new();

        let walker = WalkBuilder::new(root)
            .hidden(true)
            .git_ignore(true)
            .git_global(false)
            .git_exclude(true)
            .build();

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    log::warn!("Failed to read entry: {err}");
                    continue;
                }
            };
            if !entry.file_type().is_some_and(|t| t.is_file()) {
                continue;
            }

            let path = entry.path();
            let Ok(relative) = path.strip_prefix(root) else {
                continue;
            };
            let rel_path = relative.to_string_lossy().replace('\\', "/");

            if self.is_excluded(&rel_path) {
                stats.skipped_excluded += 1;
                continue;
            }
            if !is_readable_kind(path) {
                stats.skipped_unsupported += 1;
                continue;
            }
            if let Ok(meta) = entry.metadata() {
                if meta.len() > self.config.max_file_bytes {
                    log::debug!(
                        "Skipping large file {rel_path} ({} bytes > {})",
                        meta.len(),
                        self.config.max_file_bytes
                    );
                    stats.skipped_too_large += 1;
                    continue;
                }
            }

            // A file that cannot be read is a skip, not a failed walk.
            match self.read_text(path) {
                Ok(ReadOutcome::Text(content)) => {
                    if content.lines().count() > self.config.max_file_lines {
                        stats.skipped_too_large += 1;
                        continue;
                    }
                    let content_hash = content_hash(&content);
                    files.push(SourceFile {
                        path: rel_path,
                        content,
                        content_hash,
                    });
                }
                Ok(ReadOutcome::Binary) => {
                    stats.skipped_binary += 1;
                }
                Err(err) => {
                    log::warn!("Skipping unreadable file {rel_path}: {err}");
                    stats.skipped_unreadable += 1;
                }
            }
        }

        files.sort_by(|a, b| a.path.cmp(&b.path));
        if files.len() > self.config.max_files {
            stats.dropped_over_cap = files.len() - self.config.max_files;
            files.truncate(self.config.max_files);
        }
        stats.emitted = files.len();

        log::info!(
            "Processed snapshot at {}: {} files emitted, {} skipped",
            root.display(),
            stats.emitted,
            stats.total_skipped()
        );
        Ok((files, stats))
    }

    fn is_excluded(&self, rel_path: &str) -> bool {
        let file_name = rel_path.rsplit('/').next().unwrap_or(rel_path);
        if self.exclude.is_match(rel_path) || self.exclude.is_match(file_name) {
            return true;
        }
        if let Some(include) = &self.include {
            if !include.is_match(rel_path) {
                return true;
            }
        }
        false
    }

    /// Read a file as text, falling back to lossy decoding for stray
    /// non-UTF-8 bytes. Content with a NUL byte in its head is binary.
    fn read_text(&self, path: &Path) -> Result<ReadOutcome> {
        let bytes = std::fs::read(path)?;
        let head = &bytes[..bytes.len().min(BINARY_SNIFF_BYTES)];
        if head.contains(&0) {
            return Ok(ReadOutcome::Binary);
        }
        let content = match String::from_utf8(bytes) {
            Ok(text) => text,
            Err(err) => String::from_utf8_lossy(err.as_bytes()).into_owned(),
        };
        Ok(ReadOutcome::Text(content))
    }
}

enum ReadOutcome {
    Text(String),
    Binary,
}

const BINARY_SNIFF_BYTES: usize = 8_192;

/// File kinds worth indexing: code, docs, config, build files.
fn is_readable_kind(path: &Path) -> bool {
    if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
        if READABLE_FILE_NAMES
            .iter()
            .any(|candidate| name.eq_ignore_ascii_case(candidate))
        {
            return true;
        }
    }
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        let ext = ext.to_lowercase();
        return READABLE_EXTENSIONS.iter().any(|c| c == &ext);
    }
    false
}

const READABLE_FILE_NAMES: &[&str] = &[
    "Dockerfile",
    "docker-compose.yml",
    "docker-compose.yaml",
    "Makefile",
    "Justfile",
    "Gemfile",
    "requirements.txt",
    "package.json",
    "pom.xml",
    "build.gradle",
    "Cargo.toml",
    "go.mod",
    "composer.json",
    "pubspec.yaml",
];

const READABLE_EXTENSIONS: &[&str] = &[
    // Code
    "rs", "py", "js", "ts", "jsx", "tsx", "java", "cpp", "c", "h", "hpp", "cs", "php", "rb", "go",
    "swift", "kt", "scala", "clj", "ex", "exs", "lua", "zig",
    // Web
    "html", "css", "scss", "sass", "xml", "json", "yaml", "yml",
    // Docs
    "md", "mdx", "txt", "rst", "adoc", "tex",
    // Config
    "toml", "ini", "cfg", "conf", "properties",
    // Scripts
    "sh", "bash", "zsh", "fish", "ps1", "bat",
    // Data
    "csv", "sql", "proto",
];

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::tempdir;

    fn processor(config: ProcessorConfig) -> RepoProcessor {
        RepoProcessor::new(config).unwrap()
    }

    #[test]
    fn emits_files_in_lexicographic_order() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("zeta.rs"), "fn z() {}").unwrap();
        fs::write(temp.path().join("alpha.rs"), "fn a() {}").unwrap();
        fs::create_dir(temp.path().join("src")).unwrap();
        fs::write(temp.path().join("src/lib.rs"), "pub fn l() {}").unwrap();

        let (files, stats) = processor(ProcessorConfig::default())
            .collect(temp.path())
            .unwrap();

        let paths: Vec<&str> = files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["alpha.rs", "src/lib.rs", "zeta.rs"]);
        assert_eq!(stats.emitted, 3);
    }

    #[test]
    fn exclude_patterns_match_path_and_file_name() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("keep.py"), "x = 1").unwrap();
        fs::write(temp.path().join("skip.min.js"), "var x=1").unwrap();
        fs::create_dir(temp.path().join("gen")).unwrap();
        fs::write(temp.path().join("gen/out.py"), "y = 2").unwrap();

        let config = ProcessorConfig {
            exclude_patterns: vec!["*.min.js".to_string(), "gen/**".to_string()],
            ..Default::default()
        };
        let (files, stats) = processor(config).collect(temp.path()).unwrap();

        assert_eq!(files.len(), 1);
        assert_eq!(files[0].path, "keep.py");
        assert_eq!(stats.skipped_excluded, 2);
    }

    #[test]
    fn include_patterns_narrow_the_selection() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("a.rs"), "fn a() {}").unwrap();
        fs::write(temp.path().join("b.py"), "pass").unwrap();

        let config = ProcessorConfig {
            include_patterns: vec!["*.rs".to_string()],
            exclude_patterns: Vec::new(),
            ..Default::default()
        };
        let (files, _) = processor(config).collect(temp.path()).unwrap();

        assert_eq!(files.len(), 1);
        assert_eq!(files[0].path, "a.rs");
    }

    #[test]
    fn binary_looking_content_is_skipped_not_fatal() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("blob.txt"), b"text\x00with nul").unwrap();
        fs::write(temp.path().join("plain.txt"), "just text").unwrap();

        let (files, stats) = processor(ProcessorConfig::default())
            .collect(temp.path())
            .unwrap();

        assert_eq!(files.len(), 1);
        assert_eq!(files[0].path, "plain.txt");
        assert_eq!(stats.skipped_binary, 1);
    }

    #[test]
    fn oversized_files_are_skipped() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("big.txt"), "x".repeat(256)).unwrap();
        fs::write(temp.path().join("ok.txt"), "small").unwrap();

        let config = ProcessorConfig {
            max_file_bytes: 128,
            exclude_patterns: Vec::new(),
            ..Default::default()
        };
        let (files, stats) = processor(config).collect(temp.path()).unwrap();

        assert_eq!(files.len(), 1);
        assert_eq!(files[0].path, "ok.txt");
        assert_eq!(stats.skipped_too_large, 1);
    }

    #[test]
    fn max_files_cap_drops_the_sorted_tail() {
        let temp = tempdir().unwrap();
        for name in ["a.md", "b.md", "c.md", "d.md"] {
            fs::write(temp.path().join(name), "content").unwrap();
        }

        let config = ProcessorConfig {
            max_files: 2,
            exclude_patterns: Vec::new(),
            ..Default::default()
        };
        let (files, stats) = processor(config).collect(temp.path()).unwrap();

        let paths: Vec<&str> = files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["a.md", "b.md"]);
        assert_eq!(stats.dropped_over_cap, 2);
    }

    #[test]
    fn unsupported_extensions_are_counted() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("image.png"), [0x89, 0x50, 0x4e, 0x47]).unwrap();
        fs::write(temp.path().join("notes.md"), "# notes").unwrap();

        let (files, stats) = processor(ProcessorConfig::default())
            .collect(temp.path())
            .unwrap();

        assert_eq!(files.len(), 1);
        assert_eq!(stats.skipped_unsupported, 1);
    }

    #[cfg(unix)]
    #[test]
    fn unreadable_files_are_skipped_not_fatal() {
        use std::os::unix::fs::PermissionsExt;

        let temp = tempdir().unwrap();
        fs::write(temp.path().join("ok.rs"), "fn ok() {}").unwrap();
        let locked = temp.path().join("locked.rs");
        fs::write(&locked, "fn hidden() {}").unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

        // Privileged runs can read the file anyway; either way the walk
        // finishes and the readable file comes through.
        let (files, stats) = processor(ProcessorConfig::default())
            .collect(temp.path())
            .unwrap();

        assert!(files.iter().any(|f| f.path == "ok.rs"));
        assert_eq!(files.len() + stats.skipped_unreadable, 2);

        fs::set_permissions(&locked, fs::Permissions::from_mode(0o644)).unwrap();
    }

    #[test]
    fn missing_root_is_a_repository_access_error() {
        let temp = tempdir().unwrap();
        let missing = temp.path().join("nope");
        let result = processor(ProcessorConfig::default()).collect(&missing);
        assert!(matches!(result, Err(ProcessorError::RepositoryAccess(_))));
    }
}
