//! Archive input: extraction backends and work-queue discovery.

mod cbz;
mod queue;
mod seven_zip;

use convert_core::options::{ConversionOptions, ExtractorKind};
use convert_core::plugin::Extractor;

pub use crate::cbz::ZipExtractor;
pub use crate::queue::{find_archives_in_folder, WorkQueue};
pub use crate::seven_zip::SevenZipExtractor;

/// Build the extractor selected in `options`.
pub fn extractor_for(options: &ConversionOptions) -> Box<dyn Extractor> {
    match options.extractor {
        ExtractorKind::SevenZip => {
            Box::new(SevenZipExtractor::locate(options.seven_zip_path.as_deref()))
        }
        ExtractorKind::Zip => Box::new(ZipExtractor),
    }
}
