//! JpegNormalize transform: re-encodes every page as a baseline RGB JPEG
//! with optimized Huffman tables.
//!
//! Pages with an alpha channel (or a transparency marker, which the decoder
//! expands to alpha) are composited over opaque white first. Output files are
//! named by page sequence number, so the source names never leak through.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use image::{DynamicImage, ImageReader, Rgb, RgbImage};

use jpeg_encoder::{ColorType, Encoder};

use convert_core::collect::PageImage;
use convert_core::error::{ConvertError, Result};
use convert_core::plugin::{ImageStep, Normalizer};

/// Converts collected pages to sequentially numbered JPEG files.
pub struct JpegNormalizer;

impl Normalizer for JpegNormalizer {
    fn name(&self) -> &str {
        "JpegNormalize"
    }

    fn normalize(
        &self,
        pages: &[PageImage],
        out_dir: &Path,
        quality: u8,
        progress: &dyn Fn(ImageStep<'_>),
    ) -> Result<Vec<PathBuf>> {
        let total = pages.len();
        let mut written = Vec::with_capacity(total);

        log::debug!("Normalizing {} pages to JPEG (q={})", total, quality);

        for (i, page) in pages.iter().enumerate() {
            let name = page.file_name();
            progress(ImageStep {
                current: i,
                total,
                name: &name,
            });

            let target = out_dir.join(page.output_name());
            normalize_page(&page.source, &target, quality)?;
            written.push(target);

            progress(ImageStep {
                current: i + 1,
                total,
                name: &name,
            });
        }

        Ok(written)
    }
}

/// Decode `source`, flatten it to RGB and write it to `target` as JPEG.
pub fn normalize_page(source: &Path, target: &Path, quality: u8) -> Result<()> {
    let decode_err = |message: String| ConvertError::ImageDecode {
        path: source.to_path_buf(),
        message,
    };

    let img = ImageReader::open(source)
        .and_then(|r| r.with_guessed_format())
        .map_err(|e| decode_err(e.to_string()))?
        .decode()
        .map_err(|e| decode_err(e.to_string()))?;

    let (w, h) = (img.width(), img.height());
    let had_alpha = img.color().has_alpha();
    let rgb = flatten_to_rgb(img);

    let mut writer = BufWriter::new(File::create(target)?);
    encode_jpeg(&rgb, &mut writer, quality, true).map_err(|message| {
        ConvertError::ImageEncode {
            path: target.to_path_buf(),
            message,
        }
    })?;
    writer.flush()?;

    log::debug!(
        "{} ({}x{}{}) -> {}",
        source.display(),
        w,
        h,
        if had_alpha { ", flattened" } else { "" },
        target.display()
    );
    Ok(())
}

/// Encode an RGB image as JPEG. `optimize` computes per-image Huffman
/// tables instead of the standard ones.
fn encode_jpeg<W: Write>(
    rgb: &RgbImage,
    writer: W,
    quality: u8,
    optimize: bool,
) -> std::result::Result<(), String> {
    let (w, h) = rgb.dimensions();
    let too_large = || format!("{}x{} exceeds the JPEG size limit", w, h);
    let width = u16::try_from(w).map_err(|_| too_large())?;
    let height = u16::try_from(h).map_err(|_| too_large())?;

    let mut encoder = Encoder::new(writer, quality);
    encoder.set_optimized_huffman_tables(optimize);
    encoder
        .encode(rgb.as_raw(), width, height, ColorType::Rgb)
        .map_err(|e| e.to_string())
}

/// Drop alpha by compositing over white; plain conversion otherwise.
fn flatten_to_rgb(img: DynamicImage) -> RgbImage {
    if !img.color().has_alpha() {
        return img.into_rgb8();
    }

    let rgba = img.into_rgba8();
    RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let [r, g, b, a] = rgba.get_pixel(x, y).0;
        Rgb([over_white(r, a), over_white(g, a), over_white(b, a)])
    })
}

fn over_white(channel: u8, alpha: u8) -> u8 {
    let c = channel as u32;
    let a = alpha as u32;
    ((c * a + 255 * (255 - a) + 127) / 255) as u8
}
