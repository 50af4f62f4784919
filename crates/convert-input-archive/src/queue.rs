//! Work queue of archives to convert.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use convert_utils::mime::has_extension;
use convert_utils::natural::sort_paths;

/// Recursively find archives under `folder`, in natural order.
pub fn find_archives_in_folder<S: AsRef<str>>(folder: &Path, extensions: &[S]) -> Vec<PathBuf> {
    let mut items: Vec<PathBuf> = WalkDir::new(folder)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && has_extension(e.path(), extensions))
        .map(|e| e.into_path())
        .collect();
    sort_paths(&mut items);
    items
}

/// De-duplicated, naturally sorted list of archive paths.
///
/// Identity is the resolved path, so the same archive reached through
/// different relative paths is queued once.
#[derive(Debug, Clone, Default)]
pub struct WorkQueue {
    items: Vec<PathBuf>,
    extensions: Vec<String>,
}

impl WorkQueue {
    pub fn new(extensions: &[String]) -> Self {
        Self {
            items: Vec::new(),
            extensions: extensions.iter().map(|e| e.to_lowercase()).collect(),
        }
    }

    /// Add files and folders. Folders are searched recursively; files with
    /// unsupported extensions and duplicates are skipped. Returns how many
    /// archives were added.
    pub fn add_paths<P: AsRef<Path>>(&mut self, paths: &[P]) -> usize {
        let mut added = 0;
        for path in paths {
            let path = path.as_ref();
            if path.is_dir() {
                for archive in find_archives_in_folder(path, &self.extensions) {
                    if self.push(&archive) {
                        added += 1;
                    }
                }
            } else if has_extension(path, &self.extensions) {
                if self.push(path) {
                    added += 1;
                }
            } else {
                log::debug!("Skipping unsupported input {}", path.display());
            }
        }
        sort_paths(&mut self.items);
        added
    }

    fn push(&mut self, path: &Path) -> bool {
        let resolved = resolve(path);
        if self.items.contains(&resolved) {
            return false;
        }
        self.items.push(resolved);
        true
    }

    /// Remove an archive; returns whether it was queued.
    pub fn remove(&mut self, path: &Path) -> bool {
        let resolved = resolve(path);
        let before = self.items.len();
        self.items.retain(|p| *p != resolved);
        self.items.len() != before
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn items(&self) -> &[PathBuf] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn into_items(self) -> Vec<PathBuf> {
        self.items
    }
}

fn resolve(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}
