//! EPUB output plugin: packs a JPEG page sequence into a fixed-image EPUB 3.

mod writer;

use std::path::{Path, PathBuf};

use convert_core::error::Result;
use convert_core::options::{ConversionOptions, OutputFormat};
use convert_core::plugin::OutputPlugin;

pub use writer::{plan_book, write_epub, EpubPlan, ItemData, ManifestItem};

pub struct EpubOutputPlugin;

impl OutputPlugin for EpubOutputPlugin {
    fn name(&self) -> &str {
        "EPUB Output"
    }

    fn output_format(&self) -> OutputFormat {
        OutputFormat::Epub
    }

    fn convert(
        &self,
        jpegs: &[PathBuf],
        output_path: &Path,
        title: &str,
        options: &ConversionOptions,
    ) -> Result<()> {
        log::debug!("Writing EPUB: {}", output_path.display());
        let plan = plan_book(jpegs, title, options.epub_cover, options.skip_cover_page())?;
        write_epub(&plan, output_path)
    }
}
