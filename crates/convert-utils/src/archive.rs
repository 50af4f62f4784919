//! ZIP archive utilities for reading comic archives and writing EPUB files.

use std::fs::File;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use zip::read::ZipArchive;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipWriter};

/// Extract all files from a ZIP archive to a directory.
///
/// Entries whose names would land outside `output_dir` are rejected.
pub fn extract_zip(zip_path: &Path, output_dir: &Path) -> io::Result<Vec<PathBuf>> {
    let file = File::open(zip_path)?;
    let mut archive = ZipArchive::new(file)?;
    let mut extracted = Vec::new();

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        let relative = entry.enclosed_name().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("unsafe entry name in archive: {}", entry.name()),
            )
        })?;
        let out_path = output_dir.join(relative);

        if entry.is_dir() {
            std::fs::create_dir_all(&out_path)?;
            continue;
        }

        if let Some(parent) = out_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut outfile = File::create(&out_path)?;
        io::copy(&mut entry, &mut outfile)?;
        extracted.push(out_path);
    }

    Ok(extracted)
}

/// Read a single file from inside a ZIP archive.
pub fn read_zip_entry(zip_path: &Path, entry_name: &str) -> io::Result<Vec<u8>> {
    let file = File::open(zip_path)?;
    let mut archive = ZipArchive::new(file)?;
    let mut entry = archive.by_name(entry_name)?;
    let mut buf = Vec::new();
    entry.read_to_end(&mut buf)?;
    Ok(buf)
}

/// List all entries in a ZIP archive, in central directory order.
pub fn list_zip_entries(zip_path: &Path) -> io::Result<Vec<String>> {
    let file = File::open(zip_path)?;
    let archive = ZipArchive::new(file)?;
    let entries = (0..archive.len())
        .filter_map(|i| archive.name_for_index(i).map(|s| s.to_string()))
        .collect();
    Ok(entries)
}

/// Compression method of a named entry.
pub fn entry_compression(zip_path: &Path, entry_name: &str) -> io::Result<CompressionMethod> {
    let file = File::open(zip_path)?;
    let mut archive = ZipArchive::new(file)?;
    let entry = archive.by_name(entry_name)?;
    Ok(entry.compression())
}

/// Builder for creating ZIP archives (used for EPUB output).
///
/// Entries are written to a temporary file next to the target; the target
/// path only appears once [`ZipBuilder::finish`] succeeds. All entries carry
/// the same fixed timestamp so identical input yields identical bytes.
pub struct ZipBuilder {
    writer: ZipWriter<NamedTempFile>,
    target: PathBuf,
}

impl ZipBuilder {
    /// Start a new ZIP file that will be placed at the given path.
    pub fn new(path: &Path) -> io::Result<Self> {
        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let file = NamedTempFile::new_in(dir)?;
        Ok(Self {
            writer: ZipWriter::new(file),
            target: path.to_path_buf(),
        })
    }

    /// Add a deflate-compressed file entry with the given content.
    pub fn add_file(&mut self, name: &str, content: &[u8]) -> io::Result<()> {
        self.add_entry(name, content, CompressionMethod::Deflated)
    }

    /// Add a file entry stored without compression (used for mimetype in EPUB).
    pub fn add_stored(&mut self, name: &str, content: &[u8]) -> io::Result<()> {
        self.add_entry(name, content, CompressionMethod::Stored)
    }

    fn add_entry(&mut self, name: &str, content: &[u8], method: CompressionMethod) -> io::Result<()> {
        let options = SimpleFileOptions::default()
            .compression_method(method)
            .last_modified_time(DateTime::default());
        self.writer.start_file(name, options)?;
        self.writer.write_all(content)?;
        Ok(())
    }

    /// Finish writing the ZIP archive and move it to its final path.
    pub fn finish(self) -> io::Result<()> {
        let file = self.writer.finish()?;
        file.persist(&self.target).map_err(|e| e.error)?;
        Ok(())
    }
}
