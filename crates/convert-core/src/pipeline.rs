//! Batch pipeline: runs every queued archive through the conversion stages.
//!
//! Per archive: extract → collect pages → normalize to JPEG → assemble each
//! selected output format. Archives are processed one after another; a
//! failure in any stage marks that archive failed and the batch moves on.
//! Each archive gets its own scratch directory which is removed on every
//! exit path.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use log::{debug, warn};

use convert_utils::fs::display_stem;

use crate::collect::collect_images;
use crate::error::{ConvertError, Result};
use crate::event::{BatchEvent, BatchSummary, EventReporter};
use crate::options::ConversionOptions;
use crate::plugin::{Extractor, ImageStep, Normalizer, OutputPlugin};

/// Prefix of the per-archive scratch directory.
const SCRATCH_PREFIX: &str = "comic2export_";

/// The batch conversion pipeline.
pub struct Pipeline {
    extractor: Box<dyn Extractor>,
    normalizer: Box<dyn Normalizer>,
    outputs: Vec<Box<dyn OutputPlugin>>,
    reporter: Option<EventReporter>,
}

impl Pipeline {
    /// Convert every archive in `items`, writing documents into `output_dir`.
    ///
    /// Returns `Err` only when the batch cannot start; per-archive failures
    /// are collected in the returned summary. The last event emitted is
    /// always [`BatchEvent::Finished`].
    pub fn run(
        &self,
        items: &[PathBuf],
        output_dir: &Path,
        options: &ConversionOptions,
    ) -> Result<BatchSummary> {
        self.preflight(output_dir, options)?;

        let total = items.len();
        let rule = "=".repeat(60);
        self.log(&rule);
        self.log(&format!("Output: {}", output_dir.display()));
        self.log(&format!("Quality: {}", options.jpeg_quality));
        self.log(&format!(
            "Export: PDF={} EPUB={} (cover={}, skip-cover-page={})",
            options.export_pdf,
            options.export_epub,
            options.epub_cover,
            options.skip_cover_page()
        ));
        self.log(&format!("Items: {}", total));
        self.log(&rule);

        self.emit(BatchEvent::SubProgress {
            current: 0,
            total: 0,
        });
        self.status("Starting…");

        let mut summary = BatchSummary::new(output_dir.to_path_buf());
        // Lowercased output stems already written by this batch.
        let mut claimed = HashSet::new();

        for (i, archive) in items.iter().enumerate() {
            let idx = i + 1;
            let name = archive
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| archive.display().to_string());

            self.emit(BatchEvent::Progress {
                current: idx - 1,
                total,
            });

            let stem = unique_stem(&display_stem(archive), &claimed);
            match self.process_item(idx, total, archive, &name, &stem, output_dir, options) {
                Ok(()) => {
                    claimed.insert(stem.to_lowercase());
                    self.status(&format!("[{}/{}] Done.", idx, total));
                    self.log("  OK");
                    summary.record_ok();
                }
                Err(e) => {
                    let reason = e.to_string();
                    self.status(&format!("[{}/{}] Failed.", idx, total));
                    self.log(&format!("  FAIL: {}", reason));
                    warn!("{} failed: {}", name, reason);
                    summary.record_failure(name, reason);
                    self.emit(BatchEvent::SubProgress {
                        current: 0,
                        total: 0,
                    });
                }
            }

            self.emit(BatchEvent::Progress {
                current: idx,
                total,
            });
        }

        let rule = "-".repeat(60);
        self.log(&rule);
        for line in summary.report_lines() {
            self.log(&line);
        }
        self.log(&rule);

        self.status("Ready.");
        self.emit(BatchEvent::SubProgress {
            current: 0,
            total: 0,
        });
        self.emit(BatchEvent::Finished(summary.clone()));

        Ok(summary)
    }

    /// Batch-level preconditions. Nothing is emitted when these fail.
    fn preflight(&self, output_dir: &Path, options: &ConversionOptions) -> Result<()> {
        options.validate()?;
        self.extractor.check_available()?;

        for format in options.output_formats() {
            if !self.outputs.iter().any(|o| o.output_format() == format) {
                return Err(ConvertError::Config(format!(
                    "No output plugin registered for {}",
                    format
                )));
            }
        }

        std::fs::create_dir_all(output_dir).map_err(|e| {
            ConvertError::Config(format!(
                "Cannot create output directory {}: {}",
                output_dir.display(),
                e
            ))
        })?;
        Ok(())
    }

    fn process_item(
        &self,
        idx: usize,
        total: usize,
        archive: &Path,
        name: &str,
        stem: &str,
        output_dir: &Path,
        options: &ConversionOptions,
    ) -> Result<()> {
        self.status(&format!("[{}/{}] Extracting…", idx, total));
        self.log(&format!("[{}/{}] Extract: {}", idx, total, name));

        let workspace = tempfile::Builder::new()
            .prefix(SCRATCH_PREFIX)
            .tempdir()?;
        let extract_dir = workspace.path().join("extracted");
        let jpeg_dir = workspace.path().join("jpegs");
        std::fs::create_dir_all(&extract_dir)?;
        std::fs::create_dir_all(&jpeg_dir)?;
        debug!("Scratch workspace for {}: {}", name, workspace.path().display());

        self.extractor.extract(archive, &extract_dir)?;

        // Report the archive, not the scratch directory.
        let pages = collect_images(&extract_dir, &options.image_extensions).map_err(|e| match e {
            ConvertError::EmptyImageSet(_) => ConvertError::EmptyImageSet(archive.to_path_buf()),
            other => other,
        })?;
        let page_count = pages.len();

        self.log(&format!(
            "  Images: {} → JPEG (q={})",
            page_count, options.jpeg_quality
        ));
        self.status(&format!("[{}/{}] Converting images to JPEG…", idx, total));
        self.emit(BatchEvent::SubProgress {
            current: 0,
            total: page_count,
        });

        let on_step = |step: ImageStep<'_>| {
            self.emit(BatchEvent::SubProgress {
                current: step.current,
                total: step.total,
            });
            self.status(&format!(
                "[{}/{}] JPEG {}/{}: {}",
                idx, total, step.current, step.total, step.name
            ));
        };
        let jpegs = self
            .normalizer
            .normalize(&pages, &jpeg_dir, options.jpeg_quality, &on_step)?;
        drop(pages);

        self.emit(BatchEvent::SubProgress {
            current: 0,
            total: 0,
        });

        let title = display_stem(archive);
        if stem != title {
            self.log(&format!(
                "  Output name '{}' already used in this batch; writing '{}'",
                title, stem
            ));
        }
        for format in options.output_formats() {
            let plugin = self
                .outputs
                .iter()
                .find(|o| o.output_format() == format)
                .ok_or_else(|| {
                    ConvertError::Pipeline(format!("No output plugin for {}", format))
                })?;

            let file_name = format!("{}.{}", stem, format.extension());
            let out_path = output_dir.join(&file_name);
            self.status(&format!("[{}/{}] Building {}…", idx, total, format));
            self.log(&format!("  Build {}: {}", format, file_name));
            debug!("Running {} for {}", plugin.name(), name);

            plugin.convert(&jpegs, &out_path, &title, options)?;
        }

        if let Err(e) = workspace.close() {
            warn!("Failed to remove scratch directory for {}: {}", name, e);
        }
        Ok(())
    }

    fn emit(&self, event: BatchEvent) {
        if let Some(ref reporter) = self.reporter {
            reporter(event);
        }
    }

    fn log(&self, line: &str) {
        self.emit(BatchEvent::Log(line.to_string()));
    }

    fn status(&self, text: &str) {
        self.emit(BatchEvent::Status(text.to_string()));
    }
}

/// First of `base`, `base (2)`, `base (3)`... not yet in `claimed`.
/// Comparison ignores case.
fn unique_stem(base: &str, claimed: &HashSet<String>) -> String {
    if !claimed.contains(&base.to_lowercase()) {
        return base.to_string();
    }
    (2..)
        .map(|n| format!("{} ({})", base, n))
        .find(|candidate| !claimed.contains(&candidate.to_lowercase()))
        .unwrap_or_else(|| base.to_string())
}

/// Builder for constructing a pipeline.
pub struct PipelineBuilder {
    extractor: Option<Box<dyn Extractor>>,
    normalizer: Option<Box<dyn Normalizer>>,
    outputs: Vec<Box<dyn OutputPlugin>>,
    reporter: Option<EventReporter>,
}

impl PipelineBuilder {
    pub fn new() -> Self {
        Self {
            extractor: None,
            normalizer: None,
            outputs: Vec::new(),
            reporter: None,
        }
    }

    pub fn extractor(mut self, extractor: Box<dyn Extractor>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    pub fn normalizer(mut self, normalizer: Box<dyn Normalizer>) -> Self {
        self.normalizer = Some(normalizer);
        self
    }

    /// Register an output plugin. Which ones run is decided per batch by
    /// the export flags in [`ConversionOptions`].
    pub fn output(mut self, plugin: Box<dyn OutputPlugin>) -> Self {
        self.outputs.push(plugin);
        self
    }

    pub fn reporter(mut self, reporter: EventReporter) -> Self {
        self.reporter = Some(reporter);
        self
    }

    pub fn build(self) -> Result<Pipeline> {
        let extractor = self.extractor.ok_or_else(|| {
            ConvertError::Config("No archive extraction capability available".to_string())
        })?;
        let normalizer = self
            .normalizer
            .ok_or_else(|| ConvertError::Pipeline("No image normalizer specified".to_string()))?;

        Ok(Pipeline {
            extractor,
            normalizer,
            outputs: self.outputs,
            reporter: self.reporter,
        })
    }
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collect::PageImage;
    use crate::options::OutputFormat;
    use std::sync::{Arc, Mutex};

    /// Writes two pages for `ok*` archives, a non-image for `empty*`
    /// and fails for anything else.
    struct TestExtractor {
        seen_dirs: Arc<Mutex<Vec<PathBuf>>>,
    }

    impl Extractor for TestExtractor {
        fn name(&self) -> &str {
            "Test Extractor"
        }

        fn extract(&self, archive: &Path, dest: &Path) -> Result<()> {
            self.seen_dirs.lock().unwrap().push(dest.to_path_buf());
            let stem = display_stem(archive);
            if stem.starts_with("ok") {
                std::fs::write(dest.join("p10.png"), b"b")?;
                std::fs::write(dest.join("p2.png"), b"a")?;
                Ok(())
            } else if stem.starts_with("empty") {
                std::fs::write(dest.join("ComicInfo.xml"), b"<x/>")?;
                Ok(())
            } else {
                Err(ConvertError::Extraction {
                    archive: archive.to_path_buf(),
                    diagnostics: format!("cannot open {}", stem),
                })
            }
        }
    }

    struct MissingExtractor;

    impl Extractor for MissingExtractor {
        fn name(&self) -> &str {
            "Missing"
        }

        fn check_available(&self) -> Result<()> {
            Err(ConvertError::Config("7z not found".to_string()))
        }

        fn extract(&self, _archive: &Path, _dest: &Path) -> Result<()> {
            unreachable!("extract must not run when unavailable")
        }
    }

    /// Copies sources byte-for-byte under their sequence names.
    struct CopyNormalizer;

    impl Normalizer for CopyNormalizer {
        fn name(&self) -> &str {
            "Copy"
        }

        fn normalize(
            &self,
            pages: &[PageImage],
            out_dir: &Path,
            _quality: u8,
            progress: &dyn Fn(ImageStep<'_>),
        ) -> Result<Vec<PathBuf>> {
            let total = pages.len();
            let mut out = Vec::new();
            for page in pages {
                let name = page.file_name();
                progress(ImageStep {
                    current: page.index - 1,
                    total,
                    name: &name,
                });
                let target = out_dir.join(page.output_name());
                std::fs::copy(&page.source, &target)?;
                out.push(target);
                progress(ImageStep {
                    current: page.index,
                    total,
                    name: &name,
                });
            }
            Ok(out)
        }
    }

    /// Writes the concatenated page bytes.
    struct ConcatOutput(OutputFormat);

    impl OutputPlugin for ConcatOutput {
        fn name(&self) -> &str {
            "Concat"
        }

        fn output_format(&self) -> OutputFormat {
            self.0
        }

        fn convert(
            &self,
            jpegs: &[PathBuf],
            output_path: &Path,
            title: &str,
            _options: &ConversionOptions,
        ) -> Result<()> {
            let mut data = format!("{}:", title).into_bytes();
            for jpeg in jpegs {
                data.extend(std::fs::read(jpeg)?);
            }
            std::fs::write(output_path, data)?;
            Ok(())
        }
    }

    fn make_pipeline(events: Arc<Mutex<Vec<BatchEvent>>>) -> (Pipeline, Arc<Mutex<Vec<PathBuf>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let pipeline = PipelineBuilder::new()
            .extractor(Box::new(TestExtractor {
                seen_dirs: seen.clone(),
            }))
            .normalizer(Box::new(CopyNormalizer))
            .output(Box::new(ConcatOutput(OutputFormat::Pdf)))
            .output(Box::new(ConcatOutput(OutputFormat::Epub)))
            .reporter(Box::new(move |e| events.lock().unwrap().push(e)))
            .build()
            .unwrap();
        (pipeline, seen)
    }

    fn both_formats() -> ConversionOptions {
        let mut opts = ConversionOptions::default();
        opts.export_epub = true;
        opts
    }

    #[test]
    fn test_builder_requires_extractor() {
        let result = PipelineBuilder::new()
            .normalizer(Box::new(CopyNormalizer))
            .build();
        assert!(matches!(result, Err(ConvertError::Config(_))));
    }

    #[test]
    fn test_successful_item_writes_outputs_in_page_order() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let (pipeline, _) = make_pipeline(events.clone());
        let out = tempfile::tempdir().unwrap();

        let summary = pipeline
            .run(&[PathBuf::from("/in/ok one.cbz")], out.path(), &both_formats())
            .unwrap();

        assert_eq!(summary.ok, 1);
        assert_eq!(summary.failed, 0);
        // p2 sorts before p10
        assert_eq!(std::fs::read(out.path().join("ok one.pdf")).unwrap(), b"ok one:ab");
        assert_eq!(std::fs::read(out.path().join("ok one.epub")).unwrap(), b"ok one:ab");
    }

    #[test]
    fn test_failures_are_aggregated_and_batch_continues() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let (pipeline, _) = make_pipeline(events.clone());
        let out = tempfile::tempdir().unwrap();

        let mut items = Vec::new();
        for i in 0..11 {
            items.push(PathBuf::from(format!("/in/bad{:02}.cbr", i)));
        }
        items.push(PathBuf::from("/in/ok_a.cbz"));
        items.push(PathBuf::from("/in/ok_b.cbz"));

        let summary = pipeline.run(&items, out.path(), &both_formats()).unwrap();
        assert_eq!(summary.ok, 2);
        assert_eq!(summary.failed, 11);
        assert_eq!(summary.failures.len(), 11);
        assert_eq!(summary.failures[0].name, "bad00.cbr");
        assert!(summary.failures[0].reason.contains("cannot open bad00"));

        let events = events.lock().unwrap();
        let logs: Vec<&str> = events
            .iter()
            .filter_map(|e| match e {
                BatchEvent::Log(l) => Some(l.as_str()),
                _ => None,
            })
            .collect();
        assert!(logs.contains(&"Done. OK=2, FAIL=11"));
        assert!(logs.contains(&"  ... and 1 more failure(s)"));
        assert!(!logs.iter().any(|l| l.starts_with("  - bad10.cbr")));
    }

    #[test]
    fn test_empty_image_set_fails_item() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let (pipeline, _) = make_pipeline(events);
        let out = tempfile::tempdir().unwrap();

        let items = vec![PathBuf::from("/in/empty.cbz"), PathBuf::from("/in/ok.cbz")];
        let summary = pipeline.run(&items, out.path(), &both_formats()).unwrap();

        assert_eq!(summary.ok, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(
            summary.failures[0].reason,
            "No images found after extraction in /in/empty.cbz"
        );
        assert!(!summary.failures[0].reason.contains(SCRATCH_PREFIX));
        assert!(!out.path().join("empty.pdf").exists());
    }

    #[test]
    fn test_same_stem_archives_get_distinct_outputs() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let (pipeline, _) = make_pipeline(events.clone());
        let out = tempfile::tempdir().unwrap();

        let items = vec![PathBuf::from("/in/a/ok.cbz"), PathBuf::from("/in/b/ok.cbz")];
        let summary = pipeline.run(&items, out.path(), &both_formats()).unwrap();

        assert_eq!(summary.ok, 2);
        for file in ["ok.pdf", "ok.epub", "ok (2).pdf", "ok (2).epub"] {
            // Title stays the archive name.
            assert_eq!(std::fs::read(out.path().join(file)).unwrap(), b"ok:ab", "{}", file);
        }
        let events = events.lock().unwrap();
        assert!(events.contains(&BatchEvent::Log(
            "  Output name 'ok' already used in this batch; writing 'ok (2)'".to_string()
        )));
    }

    #[test]
    fn test_unique_stem() {
        let mut claimed = HashSet::new();
        assert_eq!(unique_stem("Vol 1", &claimed), "Vol 1");
        claimed.insert("vol 1".to_string());
        assert_eq!(unique_stem("VOL 1", &claimed), "VOL 1 (2)");
        claimed.insert("vol 1 (2)".to_string());
        assert_eq!(unique_stem("Vol 1", &claimed), "Vol 1 (3)");
        assert_eq!(unique_stem("Vol 2", &claimed), "Vol 2");
    }

    #[test]
    fn test_scratch_workspace_removed_on_every_path() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let (pipeline, seen) = make_pipeline(events);
        let out = tempfile::tempdir().unwrap();

        let items = vec![
            PathBuf::from("/in/ok.cbz"),
            PathBuf::from("/in/bad.cbz"),
            PathBuf::from("/in/empty.cbz"),
        ];
        pipeline.run(&items, out.path(), &both_formats()).unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 3);
        for dir in seen.iter() {
            let workspace = dir.parent().unwrap();
            assert!(!workspace.exists(), "{} left behind", workspace.display());
        }
        assert_ne!(seen[0], seen[1]);
    }

    #[test]
    fn test_progress_is_monotonic_and_finished_is_last() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let (pipeline, _) = make_pipeline(events.clone());
        let out = tempfile::tempdir().unwrap();

        let items = vec![PathBuf::from("/in/ok.cbz"), PathBuf::from("/in/bad.cbz")];
        pipeline.run(&items, out.path(), &both_formats()).unwrap();

        let events = events.lock().unwrap();
        let progress: Vec<(usize, usize)> = events
            .iter()
            .filter_map(|e| match e {
                BatchEvent::Progress { current, total } => Some((*current, *total)),
                _ => None,
            })
            .collect();
        assert_eq!(progress, vec![(0, 2), (1, 2), (1, 2), (2, 2)]);

        let sub: Vec<(usize, usize)> = events
            .iter()
            .filter_map(|e| match e {
                BatchEvent::SubProgress { current, total } if *total > 0 => {
                    Some((*current, *total))
                }
                _ => None,
            })
            .collect();
        assert_eq!(sub, vec![(0, 2), (0, 2), (1, 2), (1, 2), (2, 2)]);

        let statuses: Vec<&str> = events
            .iter()
            .filter_map(|e| match e {
                BatchEvent::Status(text) => Some(text.as_str()),
                _ => None,
            })
            .collect();
        assert!(statuses.contains(&"[1/2] JPEG 1/2: p2.png"));
        assert!(statuses.iter().all(|s| s.is_ascii() || s.ends_with('…')));

        match events.last() {
            Some(BatchEvent::Finished(summary)) => {
                assert_eq!(summary.ok, 1);
                assert_eq!(summary.failed, 1);
                assert_eq!(summary.output_dir, out.path());
            }
            other => panic!("expected Finished, got {:?}", other),
        }
        let finished = events
            .iter()
            .filter(|e| matches!(e, BatchEvent::Finished(_)))
            .count();
        assert_eq!(finished, 1);
    }

    #[test]
    fn test_refuses_to_start_without_extractor_tool() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let pipeline = PipelineBuilder::new()
            .extractor(Box::new(MissingExtractor))
            .normalizer(Box::new(CopyNormalizer))
            .output(Box::new(ConcatOutput(OutputFormat::Pdf)))
            .reporter(Box::new(move |e| sink.lock().unwrap().push(e)))
            .build()
            .unwrap();
        let out = tempfile::tempdir().unwrap();

        let result = pipeline.run(
            &[PathBuf::from("/in/ok.cbz")],
            out.path(),
            &ConversionOptions::default(),
        );
        assert!(matches!(result, Err(ConvertError::Config(_))));
        assert!(events.lock().unwrap().is_empty());
    }

    #[test]
    fn test_refuses_missing_output_plugin() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let pipeline = PipelineBuilder::new()
            .extractor(Box::new(TestExtractor {
                seen_dirs: Arc::new(Mutex::new(Vec::new())),
            }))
            .normalizer(Box::new(CopyNormalizer))
            .output(Box::new(ConcatOutput(OutputFormat::Pdf)))
            .reporter(Box::new(move |e| events.lock().unwrap().push(e)))
            .build()
            .unwrap();
        let out = tempfile::tempdir().unwrap();

        let result = pipeline.run(&[PathBuf::from("/in/ok.cbz")], out.path(), &both_formats());
        assert!(matches!(result, Err(ConvertError::Config(_))));
    }

    #[test]
    fn test_empty_batch_still_finishes() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let (pipeline, _) = make_pipeline(events.clone());
        let out = tempfile::tempdir().unwrap();

        let summary = pipeline.run(&[], out.path(), &both_formats()).unwrap();
        assert_eq!(summary.ok + summary.failed, 0);
        assert!(matches!(
            events.lock().unwrap().last(),
            Some(BatchEvent::Finished(_))
        ));
    }
}
