use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use walkdir::{DirEntry, WalkDir};

use crate::domain::{ports::DocumentSource, Document, DomainError, LoadedDocument};

/// Reads every UTF-8 file of a directory as one document.
///
/// Hidden entries are skipped. Subdirectories are only walked when
/// `recursive` is set.
pub struct DirectoryDocumentSource {
    root: PathBuf,
    recursive: bool,
}

impl DirectoryDocumentSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            recursive: false,
        }
    }

    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    fn read_all(root: &Path, recursive: bool) -> Result<Vec<LoadedDocument>, DomainError> {
        if !root.is_dir() {
            return Err(DomainError::validation(format!(
                "documents directory {} does not exist",
                root.display()
            )));
        }

        let max_depth = if recursive { usize::MAX } else { 1 };
        let mut paths: Vec<PathBuf> = WalkDir::new(root)
            .max_depth(max_depth)
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_hidden(e))
            .filter_map(|e| match e {
                Ok(entry) => Some(entry),
                Err(err) => {
                    warn!(error = %err, "skipping unreadable entry");
                    None
                }
            })
            .filter(|e| e.file_type().is_file())
            .map(DirEntry::into_path)
            .collect();
        paths.sort();

        let mut documents = Vec::with_capacity(paths.len());
        for path in paths {
            let bytes = std::fs::read(&path)?;
            let text = match String::from_utf8(bytes) {
                Ok(text) => text,
                Err(_) => {
                    warn!(path = %path.display(), "skipping non-UTF-8 file");
                    continue;
                }
            };
            if text.trim().is_empty() {
                warn!(path = %path.display(), "skipping empty file");
                continue;
            }

            let name = path
                .strip_prefix(root)
                .unwrap_or(&path)
                .to_string_lossy()
                .into_owned();
            let document = Document::new(&name)
                .with_content_type(content_type(&path))
                .with_metadata(serde_json::json!({
                    "path": path.display().to_string(),
                    "size_bytes": text.len(),
                }));

            documents.push(LoadedDocument::new(document, text));
        }

        Ok(documents)
    }
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .map(|name| name.starts_with('.'))
        .unwrap_or(false)
}

fn content_type(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("md" | "markdown") => "text/markdown",
        Some("html" | "htm") => "text/html",
        Some("csv") => "text/csv",
        Some("json") => "application/json",
        _ => "text/plain",
    }
}

#[async_trait]
impl DocumentSource for DirectoryDocumentSource {
    async fn load_documents(&self) -> Result<Vec<LoadedDocument>, DomainError> {
        let root = self.root.clone();
        let recursive = self.recursive;

        let documents = tokio::task::spawn_blocking(move || Self::read_all(&root, recursive))
            .await
            .map_err(|e| DomainError::internal(e.to_string()))??;

        info!(root = %self.root.display(), count = documents.len(), "documents loaded");
        Ok(documents)
    }

    fn describe(&self) -> String {
        self.root.display().to_string()
    }
}
