//! Filesystem helpers for output artifacts.

use std::io::{self, Write};
use std::path::Path;

use tempfile::NamedTempFile;

/// Write `data` to `path` so that the path either holds the complete
/// content or does not exist at all.
pub fn write_atomic(path: &Path, data: &[u8]) -> io::Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(data)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// File stem as an owned string, with a fallback for odd paths.
pub fn display_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "Untitled".to_string())
}
