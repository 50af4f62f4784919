//! In-process extraction of ZIP-based archives (CBZ).

use std::path::Path;

use convert_core::error::{ConvertError, Result};
use convert_core::plugin::Extractor;
use convert_utils::archive::extract_zip;

/// Extracts ZIP-format archives without an external tool.
/// RAR-based archives (CBR) fail with an extraction error.
pub struct ZipExtractor;

impl Extractor for ZipExtractor {
    fn name(&self) -> &str {
        "ZIP"
    }

    fn extract(&self, archive: &Path, dest: &Path) -> Result<()> {
        let files = extract_zip(archive, dest).map_err(|e| ConvertError::Extraction {
            archive: archive.to_path_buf(),
            diagnostics: e.to_string(),
        })?;
        log::debug!("Extracted {} files from {}", files.len(), archive.display());
        Ok(())
    }
}
