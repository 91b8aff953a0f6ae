use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use crate::error::{IndexError, Result};
use crate::store::DATA_DIR;

use super::DEFAULT_MAX_FILE_SIZE;
use super::splitter::TextSplitter;
use super::types::DocumentChunk;

#[derive(Debug, Clone)]
pub struct LoaderConfig {
    /// File extensions to load, without the leading dot.
    pub extensions: Vec<String>,
    /// Directory names pruned from the walk wherever they occur.
    pub exclude_dirs: Vec<String>,
    pub max_file_size: u64,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            extensions: vec!["py".into()],
            exclude_dirs: vec![".venv".into()],
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedFile {
    pub path: String,
    pub reason: String,
}

/// Outcome of walking a project tree.
#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    /// Files whose extension matched.
    pub files_scanned: usize,
    /// Files read and chunked successfully.
    pub files_loaded: usize,
    pub chunks_created: usize,
    pub skipped: Vec<SkippedFile>,
}

/// Walks a project directory and turns matching source files into chunks.
pub struct SourceLoader {
    config: LoaderConfig,
    splitter: TextSplitter,
}

impl SourceLoader {
    #[must_use]
    pub fn new(config: LoaderConfig, splitter: TextSplitter) -> Self {
        let extensions = config
            .extensions
            .iter()
            .map(|e| e.trim_start_matches('.').to_owned())
            .collect();
        Self {
            config: LoaderConfig {
                extensions,
                ..config
            },
            splitter,
        }
    }

    /// Discover source files under `root` in file-name order.
    ///
    /// Hidden files are included and ignore files are not honored; only
    /// `exclude_dirs` and the CheatCode data directory are pruned.
    #[must_use]
    pub fn discover(&self, root: &Path) -> Vec<PathBuf> {
        let exclude = self.config.exclude_dirs.clone();
        let mut files = Vec::new();

        let walker = ignore::WalkBuilder::new(root)
            .hidden(false)
            .ignore(false)
            .git_ignore(false)
            .git_global(false)
            .git_exclude(false)
            .parents(false)
            .sort_by_file_name(|a, b| a.cmp(b))
            .filter_entry(move |entry| {
                let is_dir = entry.file_type().is_some_and(|ft| ft.is_dir());
                !(is_dir
                    && entry.depth() > 0
                    && entry
                        .file_name()
                        .to_str()
                        .is_some_and(|name| name == DATA_DIR || exclude.iter().any(|x| x == name)))
            })
            .build();

        for entry in walker {
            match entry {
                Ok(entry) => {
                    if entry.file_type().is_some_and(|ft| ft.is_file())
                        && self.is_source(entry.path())
                    {
                        files.push(entry.into_path());
                    }
                }
                Err(e) => tracing::warn!("skipping unreadable entry: {e}"),
            }
        }

        files
    }

    fn is_source(&self, path: &Path) -> bool {
        path.extension()
            .and_then(OsStr::to_str)
            .is_some_and(|ext| self.config.extensions.iter().any(|e| e == ext))
    }

    /// Load and chunk every source file under `root`.
    ///
    /// Files that are oversized, unreadable or not valid UTF-8 are skipped
    /// and recorded in the report.
    ///
    /// # Errors
    ///
    /// Returns an error if `root` is missing or is not a directory.
    pub async fn load(&self, root: &Path) -> Result<(Vec<DocumentChunk>, LoadReport)> {
        let meta = tokio::fs::metadata(root).await?;
        if !meta.is_dir() {
            return Err(IndexError::Load {
                path: root.to_path_buf(),
                reason: "not a directory".into(),
            });
        }

        let files = self.discover(root);
        let mut report = LoadReport {
            files_scanned: files.len(),
            ..LoadReport::default()
        };
        let mut chunks = Vec::new();

        for path in files {
            let rel = relative_path(root, &path);
            match self.read_source(&path).await {
                Ok(text) => {
                    let file_chunks = self.splitter.split_document(&rel, &text);
                    tracing::debug!(path = %rel, chunks = file_chunks.len(), "loaded");
                    report.files_loaded += 1;
                    report.chunks_created += file_chunks.len();
                    chunks.extend(file_chunks);
                }
                Err(reason) => {
                    tracing::warn!(path = %rel, "skipping file: {reason}");
                    report.skipped.push(SkippedFile { path: rel, reason });
                }
            }
        }

        Ok((chunks, report))
    }

    async fn read_source(&self, path: &Path) -> std::result::Result<String, String> {
        let meta = tokio::fs::metadata(path).await.map_err(|e| e.to_string())?;
        if meta.len() > self.config.max_file_size {
            return Err(format!(
                "file too large ({} bytes, limit {})",
                meta.len(),
                self.config.max_file_size
            ));
        }
        let bytes = tokio::fs::read(path).await.map_err(|e| e.to_string())?;
        String::from_utf8(bytes).map_err(|_| "not valid UTF-8".to_owned())
    }
}

fn relative_path(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}
