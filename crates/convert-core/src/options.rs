//! Conversion options shared across the pipeline.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use convert_utils::mime::{DEFAULT_ARCHIVE_EXTENSIONS, DEFAULT_IMAGE_EXTENSIONS};

use crate::error::{ConvertError, Result};

/// Lowest JPEG quality accepted for normalized pages.
pub const MIN_JPEG_QUALITY: u8 = 40;
/// Highest JPEG quality accepted for normalized pages.
pub const MAX_JPEG_QUALITY: u8 = 100;

/// All options controlling a batch run. Fixed for the duration of the run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversionOptions {
    // -- Image --
    /// JPEG quality for normalized pages (40-100).
    pub jpeg_quality: u8,
    /// Extensions (lowercase, no dot) treated as page images.
    pub image_extensions: Vec<String>,

    // -- Output --
    pub export_pdf: bool,
    pub export_epub: bool,
    /// Use the first page as the EPUB cover image.
    pub epub_cover: bool,
    /// Leave the cover image out of the page sequence.
    /// Has no effect unless `epub_cover` is set.
    pub epub_skip_cover_page: bool,

    // -- Input --
    /// Extensions (lowercase, no dot) picked up when scanning folders.
    pub archive_extensions: Vec<String>,
    pub extractor: ExtractorKind,
    /// Explicit path to the 7-Zip executable. Searched on PATH when unset.
    pub seven_zip_path: Option<PathBuf>,
}

impl Default for ConversionOptions {
    fn default() -> Self {
        Self {
            jpeg_quality: 85,
            image_extensions: DEFAULT_IMAGE_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
            export_pdf: true,
            export_epub: false,
            epub_cover: true,
            epub_skip_cover_page: true,
            archive_extensions: DEFAULT_ARCHIVE_EXTENSIONS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            extractor: ExtractorKind::default(),
            seven_zip_path: None,
        }
    }
}

impl ConversionOptions {
    /// Whether the cover page is left out of the EPUB page sequence.
    pub fn skip_cover_page(&self) -> bool {
        self.epub_cover && self.epub_skip_cover_page
    }

    /// Output formats selected for this run, in assembly order.
    pub fn output_formats(&self) -> Vec<OutputFormat> {
        let mut formats = Vec::new();
        if self.export_pdf {
            formats.push(OutputFormat::Pdf);
        }
        if self.export_epub {
            formats.push(OutputFormat::Epub);
        }
        formats
    }

    /// Check batch-level preconditions.
    pub fn validate(&self) -> Result<()> {
        if !(MIN_JPEG_QUALITY..=MAX_JPEG_QUALITY).contains(&self.jpeg_quality) {
            return Err(ConvertError::Config(format!(
                "JPEG quality must be between {} and {}, got {}",
                MIN_JPEG_QUALITY, MAX_JPEG_QUALITY, self.jpeg_quality
            )));
        }
        if !self.export_pdf && !self.export_epub {
            return Err(ConvertError::Config(
                "Select PDF and/or EPUB export".to_string(),
            ));
        }
        if self.image_extensions.is_empty() {
            return Err(ConvertError::Config(
                "No image extensions configured".to_string(),
            ));
        }
        Ok(())
    }
}

/// Which extraction capability unpacks archives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExtractorKind {
    /// External 7-Zip command line tool (handles CBZ and CBR).
    #[default]
    SevenZip,
    /// In-process ZIP reader (CBZ/ZIP only).
    Zip,
}

/// Document formats produced per archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputFormat {
    Pdf,
    Epub,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Pdf => "pdf",
            OutputFormat::Epub => "epub",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Pdf => write!(f, "PDF"),
            OutputFormat::Epub => write!(f, "EPUB"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let opts = ConversionOptions::default();
        assert_eq!(opts.jpeg_quality, 85);
        assert!(opts.export_pdf);
        assert!(!opts.export_epub);
        assert!(opts.skip_cover_page());
        assert_eq!(opts.extractor, ExtractorKind::SevenZip);
        assert!(opts.image_extensions.contains(&"webp".to_string()));
        assert!(opts.validate().is_ok());
    }

    #[test]
    fn test_skip_cover_requires_cover() {
        let mut opts = ConversionOptions::default();
        opts.epub_cover = false;
        opts.epub_skip_cover_page = true;
        assert!(!opts.skip_cover_page());
    }

    #[test]
    fn test_validate_quality_range() {
        let mut opts = ConversionOptions::default();
        opts.jpeg_quality = 39;
        assert!(matches!(opts.validate(), Err(ConvertError::Config(_))));
        opts.jpeg_quality = 40;
        assert!(opts.validate().is_ok());
        opts.jpeg_quality = 101;
        assert!(opts.validate().is_err());
    }

    #[test]
    fn test_validate_needs_output() {
        let mut opts = ConversionOptions::default();
        opts.export_pdf = false;
        opts.export_epub = false;
        assert!(opts.validate().is_err());
        opts.export_epub = true;
        assert_eq!(opts.output_formats(), vec![OutputFormat::Epub]);
    }

    #[test]
    fn test_toml_round_trip() {
        let mut opts = ConversionOptions::default();
        opts.jpeg_quality = 95;
        opts.export_epub = true;
        opts.epub_skip_cover_page = false;
        opts.extractor = ExtractorKind::Zip;
        opts.seven_zip_path = Some(PathBuf::from("/opt/7zip/7zz"));

        let toml_str = toml::to_string_pretty(&opts).unwrap();
        let parsed: ConversionOptions = toml::from_str(&toml_str).unwrap();

        assert_eq!(parsed.jpeg_quality, 95);
        assert!(parsed.export_epub);
        assert!(!parsed.epub_skip_cover_page);
        assert_eq!(parsed.extractor, ExtractorKind::Zip);
        assert_eq!(parsed.seven_zip_path, Some(PathBuf::from("/opt/7zip/7zz")));
    }

    #[test]
    fn test_toml_partial_config() {
        let toml_str = r#"
jpeg_quality = 70
export_epub = true
extractor = "seven-zip"
image_extensions = ["jpg", "png"]
"#;
        let opts: ConversionOptions = toml::from_str(toml_str).unwrap();
        assert_eq!(opts.jpeg_quality, 70);
        assert!(opts.export_epub);
        assert_eq!(opts.image_extensions, vec!["jpg", "png"]);
        // Defaults filled in
        assert!(opts.export_pdf);
        assert!(opts.epub_cover);
        assert_eq!(opts.archive_extensions.len(), 4);
    }

    #[test]
    fn test_output_format_display() {
        assert_eq!(OutputFormat::Pdf.to_string(), "PDF");
        assert_eq!(OutputFormat::Epub.extension(), "epub");
    }
}
