//! Plugin traits for the extraction, normalization and output stages.

use std::path::{Path, PathBuf};

use crate::collect::PageImage;
use crate::error::Result;
use crate::options::{ConversionOptions, OutputFormat};

/// Unpacks an archive into a directory.
pub trait Extractor: Send + Sync {
    /// Human-readable name of this extractor.
    fn name(&self) -> &str;

    /// Fails when the extractor cannot run at all (e.g. tool missing).
    /// Checked once before a batch starts.
    fn check_available(&self) -> Result<()> {
        Ok(())
    }

    /// Populate `dest` (an existing, empty directory) with the full
    /// contents of `archive`, preserving directory structure.
    fn extract(&self, archive: &Path, dest: &Path) -> Result<()>;
}

/// Progress of a normalizer through its page list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageStep<'a> {
    pub current: usize,
    pub total: usize,
    pub name: &'a str,
}

/// Converts collected page images to a uniform JPEG sequence.
pub trait Normalizer: Send + Sync {
    fn name(&self) -> &str;

    /// Write one JPEG per page into `out_dir`, named by
    /// [`PageImage::output_name`], and return their paths in page order.
    ///
    /// `progress` is called with `current = index - 1` before and
    /// `current = index` after each page.
    fn normalize(
        &self,
        pages: &[PageImage],
        out_dir: &Path,
        quality: u8,
        progress: &dyn Fn(ImageStep<'_>),
    ) -> Result<Vec<PathBuf>>;
}

/// Output format plugin: assembles an ordered JPEG sequence into a document.
pub trait OutputPlugin: Send + Sync {
    /// Human-readable name of this plugin.
    fn name(&self) -> &str;

    /// The output format this plugin produces.
    fn output_format(&self) -> OutputFormat;

    /// Build the document at `output_path` from `jpegs`.
    fn convert(
        &self,
        jpegs: &[PathBuf],
        output_path: &Path,
        title: &str,
        options: &ConversionOptions,
    ) -> Result<()>;
}
