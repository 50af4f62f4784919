//! EPUB writer: lays out the package and streams it into a ZIP container.

use std::path::{Path, PathBuf};

use rayon::prelude::*;

use convert_core::collect::sequence_file_name;
use convert_core::error::{ConvertError, Result};
use convert_utils::archive::ZipBuilder;
use convert_utils::mime::{mime_from_path, XHTML};
use convert_utils::xml::{escape_xml_attr, xhtml_document, XmlBuilder};

const LANGUAGE: &str = "en";
const PAGE_CSS: &str = "body { margin:0; padding:0; } img { width:100%; height:auto; display:block; }";

const COVER_IMAGE_ID: &str = "coverimg";
const COVER_PAGE_ID: &str = "coverpage";
const COVER_PAGE_HREF: &str = "cover.xhtml";

/// Content of one manifest entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemData {
    /// Generated document, already serialized.
    Xhtml(String),
    /// Image copied from disk when the container is written.
    Lazy(PathBuf),
}

/// An entry of the OPF manifest, stored under `OEBPS/<href>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestItem {
    pub id: String,
    pub href: String,
    pub media_type: &'static str,
    pub properties: Option<&'static str>,
    pub data: ItemData,
}

impl ManifestItem {
    fn xhtml(id: impl Into<String>, href: impl Into<String>, content: String) -> Self {
        Self {
            id: id.into(),
            href: href.into(),
            media_type: XHTML,
            properties: None,
            data: ItemData::Xhtml(content),
        }
    }

    fn image(id: impl Into<String>, href: impl Into<String>, source: &Path) -> Self {
        let href = href.into();
        Self {
            id: id.into(),
            media_type: mime_from_path(Path::new(&href)),
            href,
            properties: None,
            data: ItemData::Lazy(source.to_path_buf()),
        }
    }
}

/// Everything needed to write the container, before any I/O happens.
#[derive(Debug, Clone)]
pub struct EpubPlan {
    pub title: String,
    pub manifest: Vec<ManifestItem>,
    /// Manifest ids in reading order.
    pub spine: Vec<String>,
    pub cover_image_id: Option<&'static str>,
    /// Target of the single table-of-contents entry.
    pub start_href: String,
}

impl EpubPlan {
    /// Number of regular pages (the cover page is not counted).
    pub fn page_count(&self) -> usize {
        self.spine.iter().filter(|id| *id != COVER_PAGE_ID).count()
    }
}

/// Lay out the book for `jpegs`.
///
/// With `use_cover` the first image also becomes `images/cover.jpg` and a
/// cover page leading the spine. With `skip_cover_page` (only honored when
/// `use_cover` is set) the first image is left out of the numbered pages.
pub fn plan_book(
    jpegs: &[PathBuf],
    title: &str,
    use_cover: bool,
    skip_cover_page: bool,
) -> Result<EpubPlan> {
    if jpegs.is_empty() {
        return Err(ConvertError::Epub("No images provided".to_string()));
    }

    let mut manifest = Vec::with_capacity(jpegs.len() * 2 + 3);
    let mut spine = Vec::with_capacity(jpegs.len() + 1);

    if use_cover {
        let mut cover = ManifestItem::image(COVER_IMAGE_ID, "images/cover.jpg", &jpegs[0]);
        cover.properties = Some("cover-image");
        manifest.push(cover);

        let page = image_page(&format!("{} - Cover", title), "images/cover.jpg", "cover");
        manifest.push(ManifestItem::xhtml(COVER_PAGE_ID, COVER_PAGE_HREF, page));
        spine.push(COVER_PAGE_ID.to_string());
    }

    let skip = if use_cover && skip_cover_page { 1 } else { 0 };
    for (i, source) in jpegs.iter().skip(skip).enumerate() {
        let n = i + 1;
        let img_href = format!("images/{}", sequence_file_name(n, "jpg"));
        let page_href = format!("page_{}", sequence_file_name(n, "xhtml"));
        let page_id = format!("page{}", n);

        manifest.push(ManifestItem::image(format!("img{}", n), img_href.as_str(), source));
        let page = image_page(title, &img_href, &format!("page {}", n));
        manifest.push(ManifestItem::xhtml(page_id.as_str(), page_href, page));
        spine.push(page_id);
    }

    let start_href = if use_cover {
        COVER_PAGE_HREF.to_string()
    } else {
        format!("page_{}", sequence_file_name(1, "xhtml"))
    };

    let mut nav = ManifestItem::xhtml("nav", "nav.xhtml", generate_nav(&start_href));
    nav.properties = Some("nav");
    manifest.insert(0, nav);

    Ok(EpubPlan {
        title: title.to_string(),
        manifest,
        spine,
        cover_image_id: use_cover.then_some(COVER_IMAGE_ID),
        start_href,
    })
}

/// Write `plan` as an EPUB file with a fresh `urn:uuid:` identifier.
pub fn write_epub(plan: &EpubPlan, output_path: &Path) -> Result<()> {
    let uid = format!("urn:uuid:{}", uuid::Uuid::new_v4());
    write_epub_with_id(plan, output_path, &uid)
}

fn write_epub_with_id(plan: &EpubPlan, output_path: &Path, uid: &str) -> Result<()> {
    let epub_err = |what: &str, e: std::io::Error| ConvertError::Epub(format!("{}: {}", what, e));

    // Read images in parallel; entries are still written in manifest order.
    let contents: Vec<Vec<u8>> = plan
        .manifest
        .par_iter()
        .map(|item| match &item.data {
            ItemData::Xhtml(s) => Ok(s.as_bytes().to_vec()),
            ItemData::Lazy(path) => std::fs::read(path)
                .map_err(|e| epub_err(&format!("Failed to read {}", path.display()), e)),
        })
        .collect::<Result<_>>()?;

    let mut zip = ZipBuilder::new(output_path).map_err(|e| epub_err("Failed to create EPUB", e))?;

    // mimetype must be first and stored uncompressed
    zip.add_stored("mimetype", b"application/epub+zip")
        .map_err(|e| epub_err("Failed to write mimetype", e))?;
    zip.add_file("META-INF/container.xml", generate_container_xml().as_bytes())
        .map_err(|e| epub_err("Failed to write container.xml", e))?;

    for (item, data) in plan.manifest.iter().zip(&contents) {
        let path = format!("OEBPS/{}", item.href);
        zip.add_file(&path, data)
            .map_err(|e| epub_err(&format!("Failed to write {}", path), e))?;
    }

    zip.add_file("OEBPS/content.opf", generate_opf(plan, uid).as_bytes())
        .map_err(|e| epub_err("Failed to write content.opf", e))?;

    zip.finish().map_err(|e| epub_err("Failed to finalize EPUB", e))?;

    log::debug!(
        "EPUB written: {} ({} pages, cover={})",
        output_path.display(),
        plan.page_count(),
        plan.cover_image_id.is_some()
    );
    Ok(())
}

fn image_page(title: &str, src: &str, alt: &str) -> String {
    let body = format!(
        "  <img src=\"{}\" alt=\"{}\"/>",
        escape_xml_attr(src),
        escape_xml_attr(alt)
    );
    xhtml_document(title, LANGUAGE, Some(PAGE_CSS), &body)
}

fn generate_nav(start_href: &str) -> String {
    let mut body = XmlBuilder::fragment();
    body.open_tag("nav", &[("epub:type", "toc"), ("id", "toc")])
        .open_tag("ol", &[])
        .open_tag("li", &[])
        .text_element("a", "Start", &[("href", start_href)])
        .close_tag("li")
        .close_tag("ol")
        .close_tag("nav");
    xhtml_document("Navigation", LANGUAGE, None, body.build().trim_end())
}

fn generate_container_xml() -> String {
    let mut xml = XmlBuilder::new();
    xml.open_tag(
        "container",
        &[
            ("version", "1.0"),
            ("xmlns", "urn:oasis:names:tc:opendocument:xmlns:container"),
        ],
    )
    .open_tag("rootfiles", &[])
    .empty_tag(
        "rootfile",
        &[
            ("full-path", "OEBPS/content.opf"),
            ("media-type", "application/oebps-package+xml"),
        ],
    )
    .close_tag("rootfiles")
    .close_tag("container");
    xml.build()
}

fn generate_opf(plan: &EpubPlan, uid: &str) -> String {
    let mut xml = XmlBuilder::new();
    xml.open_tag(
        "package",
        &[
            ("xmlns", "http://www.idpf.org/2007/opf"),
            ("unique-identifier", "uid"),
            ("version", "3.0"),
        ],
    );

    xml.open_tag("metadata", &[("xmlns:dc", "http://purl.org/dc/elements/1.1/")]);
    xml.text_element("dc:title", &plan.title, &[]);
    xml.text_element("dc:language", LANGUAGE, &[]);
    xml.text_element("dc:identifier", uid, &[("id", "uid")]);
    if let Some(cover) = plan.cover_image_id {
        xml.empty_tag("meta", &[("name", "cover"), ("content", cover)]);
    }
    xml.close_tag("metadata");

    xml.open_tag("manifest", &[]);
    for item in &plan.manifest {
        let mut attrs = vec![
            ("id", item.id.as_str()),
            ("href", item.href.as_str()),
            ("media-type", item.media_type),
        ];
        if let Some(props) = item.properties {
            attrs.push(("properties", props));
        }
        xml.empty_tag("item", &attrs);
    }
    xml.close_tag("manifest");

    xml.open_tag("spine", &[]);
    for idref in &plan.spine {
        xml.empty_tag("itemref", &[("idref", idref.as_str())]);
    }
    xml.close_tag("spine");

    xml.close_tag("package");
    xml.build()
}
