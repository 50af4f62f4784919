//! comic-convert: batch converter from CBZ/CBR comic archives to PDF and EPUB.
//!
//! `comic-convert [OPTIONS] <INPUTS>... -o <OUTPUT_DIR>`
//!
//! Inputs are archive files or folders; folders are searched recursively for
//! the configured archive extensions. Options come from the global config
//! file, then `./.comic-convert.toml`, then the command line.

use std::path::{Path, PathBuf};
use std::process;
use std::sync::mpsc;
use std::thread;

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};

use convert_core::event::{channel_reporter, BatchEvent};
use convert_core::options::{ConversionOptions, ExtractorKind};
use convert_core::pipeline::PipelineBuilder;
use convert_input_archive::{extractor_for, WorkQueue};
use convert_output_epub::EpubOutputPlugin;
use convert_output_pdf::PdfOutputPlugin;
use convert_transforms::JpegNormalizer;

const APP_NAME: &str = "comic-convert";
const LOCAL_CONFIG: &str = ".comic-convert.toml";

#[derive(Parser, Debug)]
#[command(
    name = "comic-convert",
    version,
    about = "Convert CBZ/CBR comic archives to PDF and EPUB"
)]
struct Cli {
    /// Archive files or folders containing archives
    #[arg(required_unless_present = "dump_config")]
    inputs: Vec<PathBuf>,

    /// Output directory
    #[arg(short, long, required_unless_present = "dump_config")]
    output: Option<PathBuf>,

    /// Verbosity level (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// JPEG quality for normalized pages (40-100)
    #[arg(long)]
    quality: Option<u8>,

    /// Build a PDF per archive
    #[arg(long, overrides_with = "no_pdf")]
    pdf: bool,
    #[arg(long, hide = true)]
    no_pdf: bool,

    /// Build an EPUB per archive
    #[arg(long, overrides_with = "no_epub")]
    epub: bool,
    #[arg(long, hide = true)]
    no_epub: bool,

    /// EPUB: use the first image as cover
    #[arg(long, overrides_with = "no_cover")]
    cover: bool,
    #[arg(long, hide = true)]
    no_cover: bool,

    /// EPUB: do not repeat the cover as page 1
    #[arg(long, overrides_with = "no_skip_cover_page")]
    skip_cover_page: bool,
    #[arg(long, hide = true)]
    no_skip_cover_page: bool,

    /// Archive extraction backend
    #[arg(long, value_enum)]
    extractor: Option<ExtractorArg>,

    /// Path to the 7-Zip executable
    #[arg(long, value_name = "PATH")]
    seven_zip: Option<PathBuf>,

    /// Dump effective merged config as TOML and exit
    #[arg(long)]
    dump_config: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ExtractorArg {
    SevenZip,
    Zip,
}

impl From<ExtractorArg> for ExtractorKind {
    fn from(arg: ExtractorArg) -> Self {
        match arg {
            ExtractorArg::SevenZip => ExtractorKind::SevenZip,
            ExtractorArg::Zip => ExtractorKind::Zip,
        }
    }
}

/// `Some(true)` for `--x`, `Some(false)` for `--no-x`, `None` when absent.
fn flag_pair(yes: bool, no: bool) -> Option<bool> {
    match (yes, no) {
        (true, _) => Some(true),
        (_, true) => Some(false),
        _ => None,
    }
}

/// Config file locations, lowest priority first.
fn config_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Some(config_dir) = dirs::config_dir() {
        paths.push(config_dir.join(APP_NAME).join("config.toml"));
    }
    paths.push(PathBuf::from(LOCAL_CONFIG));
    paths
}

/// Load options from the given TOML files. Later files override earlier
/// ones key by key; missing files are skipped.
fn load_config(paths: &[PathBuf]) -> Result<ConversionOptions> {
    let mut merged = toml::Table::new();

    for path in paths {
        let contents = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read {}", path.display()))
            }
        };
        let layer: toml::Table = contents
            .parse()
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        log::debug!("Loaded config layer {}", path.display());
        merge_tables(&mut merged, layer);
    }

    toml::Value::Table(merged)
        .try_into()
        .context("Invalid configuration")
}

fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(existing)), toml::Value::Table(nested)) => {
                merge_tables(existing, nested);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

/// Apply CLI flags on top of config-loaded options.
/// Only overrides when the flag was given.
fn apply_cli_overrides(opts: &mut ConversionOptions, cli: &Cli) {
    if let Some(quality) = cli.quality {
        opts.jpeg_quality = quality;
    }
    if let Some(v) = flag_pair(cli.pdf, cli.no_pdf) {
        opts.export_pdf = v;
    }
    if let Some(v) = flag_pair(cli.epub, cli.no_epub) {
        opts.export_epub = v;
    }
    if let Some(v) = flag_pair(cli.cover, cli.no_cover) {
        opts.epub_cover = v;
    }
    if let Some(v) = flag_pair(cli.skip_cover_page, cli.no_skip_cover_page) {
        opts.epub_skip_cover_page = v;
    }
    if let Some(kind) = cli.extractor {
        opts.extractor = kind.into();
    }
    if cli.seven_zip.is_some() {
        opts.seven_zip_path = cli.seven_zip.clone();
    }
}

fn init_logger(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_target(false)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logger(cli.verbose);

    match run(&cli) {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            process::exit(1);
        }
    }
}

/// Returns whether every archive converted successfully.
fn run(cli: &Cli) -> Result<bool> {
    let mut options = load_config(&config_paths())?;
    apply_cli_overrides(&mut options, cli);

    if cli.dump_config {
        let s = toml::to_string_pretty(&options).context("Error serializing config")?;
        println!("{}", s);
        return Ok(true);
    }

    let output_dir = cli.output.clone().context("--output is required")?;

    for input in &cli.inputs {
        if !input.exists() {
            log::warn!("Input not found: {}", input.display());
        }
    }

    let mut queue = WorkQueue::new(&options.archive_extensions);
    queue.add_paths(&cli.inputs);
    if queue.is_empty() {
        bail!(
            "No archives found (looked for: {})",
            options.archive_extensions.join(", ")
        );
    }
    log::debug!("Queued {} archive(s)", queue.len());

    run_batch(queue.into_items(), &output_dir, options)
}

/// Run the batch on a worker thread and render its events here.
fn run_batch(items: Vec<PathBuf>, output_dir: &Path, options: ConversionOptions) -> Result<bool> {
    let (tx, rx) = mpsc::channel();

    let pipeline = PipelineBuilder::new()
        .extractor(extractor_for(&options))
        .normalizer(Box::new(JpegNormalizer))
        .output(Box::new(PdfOutputPlugin))
        .output(Box::new(EpubOutputPlugin))
        .reporter(channel_reporter(tx))
        .build()
        .context("Failed to build pipeline")?;

    let output_dir = output_dir.to_path_buf();
    let worker = thread::Builder::new()
        .name("batch".to_string())
        .spawn(move || pipeline.run(&items, &output_dir, &options))
        .context("Failed to start worker thread")?;

    // The channel closes when the worker drops the pipeline.
    for event in rx {
        render_event(&event);
    }

    let summary = worker
        .join()
        .map_err(|_| anyhow::anyhow!("Worker thread panicked"))?
        .context("Batch could not start")?;
    Ok(summary.is_success())
}

fn render_event(event: &BatchEvent) {
    match event {
        BatchEvent::Log(line) => log::info!("{}", line),
        BatchEvent::Status(text) => log::debug!("{}", text),
        BatchEvent::Progress { current, total } => {
            log::debug!("Progress: {}/{}", current, total)
        }
        BatchEvent::SubProgress { current, total } if *total > 0 => {
            log::trace!("Images: {}/{}", current, total)
        }
        BatchEvent::SubProgress { .. } => {}
        BatchEvent::Finished(summary) => {
            log::debug!("Outputs in {}", summary.output_dir.display())
        }
    }
}
