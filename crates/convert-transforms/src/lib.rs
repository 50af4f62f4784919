//! Page image transforms applied between extraction and document assembly.

pub mod jpeg_normalize;

pub use jpeg_normalize::JpegNormalizer;
