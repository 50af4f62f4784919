//! Media type mapping for the page image formats handled by the converter.

use std::path::Path;

/// Image extensions accepted from extracted archives by default.
pub const DEFAULT_IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "bmp", "tif", "tiff"];

/// Archive extensions picked up when scanning folders by default.
pub const DEFAULT_ARCHIVE_EXTENSIONS: &[&str] = &["cbz", "cbr", "zip", "rar"];

/// Media type of the XHTML content documents.
pub const XHTML: &str = "application/xhtml+xml";

/// Detect MIME type from a file extension.
pub fn mime_from_extension(ext: &str) -> &'static str {
    match ext.to_lowercase().as_str() {
        "xhtml" | "xhtm" => XHTML,
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        "tif" | "tiff" => "image/tiff",
        "opf" => "application/oebps-package+xml",
        "pdf" => "application/pdf",
        _ => "application/octet-stream",
    }
}

/// Detect MIME type from a file path.
pub fn mime_from_path(path: &Path) -> &'static str {
    path.extension()
        .and_then(|e| e.to_str())
        .map(mime_from_extension)
        .unwrap_or("application/octet-stream")
}

/// Case-insensitive check of a path's extension against a set of
/// lowercase extensions (without the leading dot).
pub fn has_extension<S: AsRef<str>>(path: &Path, extensions: &[S]) -> bool {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => {
            let ext = ext.to_lowercase();
            extensions.iter().any(|e| e.as_ref() == ext)
        }
        None => false,
    }
}
