//! Page image collection from an extracted archive tree.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use convert_utils::mime::has_extension;
use convert_utils::natural::sort_paths;

use crate::error::{ConvertError, Result};

/// A page in reading order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageImage {
    pub source: PathBuf,
    /// 1-based position in reading order.
    pub index: usize,
}

impl PageImage {
    /// Name of the normalized JPEG for this page, e.g. `00007.jpg`.
    pub fn output_name(&self) -> String {
        sequence_file_name(self.index, "jpg")
    }

    pub fn file_name(&self) -> String {
        self.source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// `00001.jpg`-style name for a 1-based sequence number.
pub fn sequence_file_name(index: usize, ext: &str) -> String {
    format!("{:05}.{}", index, ext)
}

/// Recursively collect every file under `root` whose extension is in
/// `extensions`, in natural file-name order.
pub fn collect_images<S: AsRef<str>>(root: &Path, extensions: &[S]) -> Result<Vec<PageImage>> {
    let mut paths = Vec::new();
    for entry in WalkDir::new(root) {
        let entry = entry.map_err(|e| ConvertError::Io(e.into()))?;
        if entry.file_type().is_file() && has_extension(entry.path(), extensions) {
            paths.push(entry.into_path());
        }
    }

    if paths.is_empty() {
        return Err(ConvertError::EmptyImageSet(root.to_path_buf()));
    }

    sort_paths(&mut paths);
    log::debug!("Collected {} images under {}", paths.len(), root.display());

    Ok(paths
        .into_iter()
        .enumerate()
        .map(|(i, source)| PageImage {
            source,
            index: i + 1,
        })
        .collect())
}
