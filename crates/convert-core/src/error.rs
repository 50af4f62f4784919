use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConvertError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Extraction failed for {}\n\n{diagnostics}", .archive.display())]
    Extraction {
        archive: PathBuf,
        diagnostics: String,
    },

    #[error("No images found after extraction in {}", .0.display())]
    EmptyImageSet(PathBuf),

    #[error("Failed to decode image {}: {message}", .path.display())]
    ImageDecode { path: PathBuf, message: String },

    #[error("Failed to encode image {}: {message}", .path.display())]
    ImageEncode { path: PathBuf, message: String },

    #[error("PDF error: {0}")]
    Pdf(String),

    #[error("EPUB error: {0}")]
    Epub(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Pipeline error: {0}")]
    Pipeline(String),
}

pub type Result<T> = std::result::Result<T, ConvertError>;
