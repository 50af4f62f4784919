//! PDF output plugin: one page per JPEG, sized to the image.
//!
//! JPEG streams are embedded unchanged with the DCTDecode filter, so pages
//! carry exactly the bytes the normalizer produced. Page size maps pixels to
//! points at 96 dpi. The document is assembled in memory and written
//! atomically, so a failed build never leaves a partial file behind.

use std::io::Cursor;
use std::path::{Path, PathBuf};

use image::codecs::jpeg::JpegDecoder;
use image::{ExtendedColorType, ImageDecoder};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, ObjectId, Stream, StringFormat};

use convert_core::error::{ConvertError, Result};
use convert_core::options::{ConversionOptions, OutputFormat};
use convert_core::plugin::OutputPlugin;
use convert_utils::fs::write_atomic;

/// Pixels per inch assumed when sizing pages.
pub const PAGE_DPI: f32 = 96.0;

const POINTS_PER_INCH: f32 = 72.0;

/// Resource name of the page image inside each page.
const IMAGE_NAME: &str = "Im0";

pub struct PdfOutputPlugin;

impl OutputPlugin for PdfOutputPlugin {
    fn name(&self) -> &str {
        "PDF Output"
    }

    fn output_format(&self) -> OutputFormat {
        OutputFormat::Pdf
    }

    fn convert(
        &self,
        jpegs: &[PathBuf],
        output_path: &Path,
        title: &str,
        _options: &ConversionOptions,
    ) -> Result<()> {
        log::debug!("Writing PDF: {}", output_path.display());
        let bytes = build_pdf(jpegs, title)?;
        write_atomic(output_path, &bytes).map_err(|e| {
            ConvertError::Pdf(format!("Failed to write {}: {}", output_path.display(), e))
        })?;
        log::debug!("PDF written: {} pages, {} bytes", jpegs.len(), bytes.len());
        Ok(())
    }
}

/// Header facts needed to embed a JPEG without decoding it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct JpegInfo {
    width: u32,
    height: u32,
    color_space: &'static str,
}

fn probe_jpeg(data: &[u8]) -> std::result::Result<JpegInfo, String> {
    let decoder = JpegDecoder::new(Cursor::new(data)).map_err(|e| e.to_string())?;
    let (width, height) = decoder.dimensions();
    let color_space = match decoder.original_color_type() {
        ExtendedColorType::L8 => "DeviceGray",
        ExtendedColorType::Rgb8 => "DeviceRGB",
        other => return Err(format!("unsupported JPEG color model {:?}", other)),
    };
    Ok(JpegInfo {
        width,
        height,
        color_space,
    })
}

/// PDF text string: literal for ASCII, UTF-16BE with a byte order mark
/// otherwise.
fn text_string(text: &str) -> Object {
    if text.is_ascii() {
        return Object::string_literal(text);
    }
    let mut bytes = vec![0xFE, 0xFF];
    for unit in text.encode_utf16() {
        bytes.extend_from_slice(&unit.to_be_bytes());
    }
    Object::String(bytes, StringFormat::Hexadecimal)
}

fn px_to_pt(px: u32) -> f32 {
    px as f32 * POINTS_PER_INCH / PAGE_DPI
}

/// Assemble the PDF bytes for `jpegs`, one page each, in order.
pub fn build_pdf(jpegs: &[PathBuf], title: &str) -> Result<Vec<u8>> {
    if jpegs.is_empty() {
        return Err(ConvertError::Pdf("No pages to write".to_string()));
    }

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let mut kids: Vec<Object> = Vec::with_capacity(jpegs.len());

    for path in jpegs {
        let data = std::fs::read(path)
            .map_err(|e| ConvertError::Pdf(format!("Failed to read {}: {}", path.display(), e)))?;
        let info = probe_jpeg(&data)
            .map_err(|e| ConvertError::Pdf(format!("{}: {}", path.display(), e)))?;
        let page_id = add_page(&mut doc, pages_id, data, info)?;
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    let info_id = doc.add_object(dictionary! {
        "Title" => text_string(title),
    });
    doc.trailer.set("Root", catalog_id);
    doc.trailer.set("Info", info_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes)
        .map_err(|e| ConvertError::Pdf(format!("Failed to serialize PDF: {}", e)))?;
    Ok(bytes)
}

fn add_page(doc: &mut Document, pages_id: ObjectId, data: Vec<u8>, info: JpegInfo) -> Result<ObjectId> {
    let image = Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => info.width as i64,
            "Height" => info.height as i64,
            "ColorSpace" => info.color_space,
            "BitsPerComponent" => 8,
            "Filter" => "DCTDecode",
        },
        data,
    )
    .with_compression(false);
    let image_id = doc.add_object(image);

    let (w, h) = (px_to_pt(info.width), px_to_pt(info.height));
    let content = Content {
        operations: vec![
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![w.into(), 0.into(), 0.into(), h.into(), 0.into(), 0.into()],
            ),
            Operation::new("Do", vec![Object::Name(IMAGE_NAME.as_bytes().to_vec())]),
            Operation::new("Q", vec![]),
        ],
    };
    let encoded = content
        .encode()
        .map_err(|e| ConvertError::Pdf(format!("Failed to encode page content: {}", e)))?;
    let content_id = doc.add_object(Stream::new(dictionary! {}, encoded));

    Ok(doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => vec![0.into(), 0.into(), w.into(), h.into()],
        "Contents" => content_id,
        "Resources" => dictionary! {
            "XObject" => dictionary! {
                IMAGE_NAME => image_id,
            },
        },
    }))
}
