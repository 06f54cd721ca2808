use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use futures::future::try_join_all;
use log::{debug, info, warn};
use memmap2::MmapOptions;
use rayon::prelude::*;
use tokio::fs;
use tokio::sync::Semaphore;
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio::task::{JoinHandle, spawn_blocking};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::archive::{self, ArchiveKind, compression_error, prepare_destination, sample_filter};
use crate::clamp::{ClampStrategy, DEFAULT_SIZE_THRESHOLD, MIN_PIXEL_THRESHOLD};
use crate::error::{Error, Result};
use crate::sort::natural_cmp_paths;
use crate::types::{ArchiveSurvey, ChapterResult, PageImage, ProgressEvent, RunMode, RunReport};
use crate::worker::{ChapterWorker, chapter_stem};

/// The main Bunkatsu run configuration, built declaratively using the builder
/// pattern.
///
/// One configuration drives any of the four operations:
///
/// - [`clamp_from_source`](BunkatsuConfig::clamp_from_source): enforce the
///   pixel budget across every archive under the source directory
/// - [`convert_from_source`](BunkatsuConfig::convert_from_source): convert
///   every archive to one target container format
/// - [`survey_source`](BunkatsuConfig::survey_source): probe page resolutions
///   without writing anything
/// - [`pack_from_boundaries`](BunkatsuConfig::pack_from_boundaries): pack a
///   flat page list into per-chapter archives
///
/// ## Builder Pattern
///
/// Use [`BunkatsuConfig::builder()`](BunkatsuConfig::builder) to create a new
/// configuration:
///
/// ```rust,no_run
/// # use bunkatsu::prelude::*;
/// # use std::path::PathBuf;
/// # #[tokio::main]
/// # async fn main() -> bunkatsu::error::Result<()> {
/// let config = BunkatsuConfig::builder()
///     .source_path(PathBuf::from("./chapters"))
///     .output_path(PathBuf::from("./normalized"))
///     .threshold(4_000_000u64)
///     .build()?;
///
/// let report = config.clamp_from_source().await?;
/// println!("{} chapters completed", report.completed());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, derive_builder::Builder)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[builder(setter(into, strip_option), build_fn(validate = "Self::validate"))]
pub struct BunkatsuConfig {
    /// Directory whose entries are the work items. Every supported archive
    /// or chapter directory directly inside it is processed; hidden entries
    /// and unsupported files are skipped at enumeration.
    #[builder(default)]
    pub source_path: PathBuf,

    /// Directory where output chapters and archives are written. Must not be
    /// the same location as `source_path`; created if missing.
    #[builder(default)]
    pub output_path: PathBuf,

    /// Maximum pixel area (`width * height`) allowed for any output page.
    ///
    /// Values at or below 500,000 are rejected by
    /// [`preflight_check`](BunkatsuConfig::preflight_check) before any work
    /// starts.
    #[builder(default = "DEFAULT_SIZE_THRESHOLD")]
    pub threshold: u64,

    /// How pages over the threshold are brought under it.
    ///
    /// - [`ClampStrategy::Split`]: lossless vertical halving, page count grows
    /// - [`ClampStrategy::Resize`]: proportional downscale, page count stable
    #[builder(default = "ClampStrategy::Split")]
    pub strategy: ClampStrategy,

    /// Upper bound on chapters processed concurrently.
    #[builder(default = "num_cpus::get()")]
    pub workers: usize,

    /// Replace destination archives that already exist (conversion and
    /// packing; clamp output directories are always rebuilt).
    #[builder(default = "false")]
    pub overwrite: bool,

    /// Optional sink receiving a copy of every [`ProgressEvent`].
    ///
    /// Events for one chapter arrive in order; different chapters interleave.
    /// The run itself only logs; driving a progress UI is the sink's job.
    #[builder(default)]
    #[cfg_attr(feature = "serde", serde(skip))]
    pub event_sink: Option<UnboundedSender<ProgressEvent>>,
}

impl BunkatsuConfig {
    /// Creates a new builder for configuring `BunkatsuConfig`.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// # use bunkatsu::prelude::*;
    /// # use std::path::PathBuf;
    /// let config = BunkatsuConfig::builder()
    ///     .source_path(PathBuf::from("./source"))
    ///     .output_path(PathBuf::from("./output"))
    ///     .build()
    ///     .expect("Invalid configuration");
    /// ```
    pub fn builder() -> BunkatsuConfigBuilder {
        BunkatsuConfigBuilder::default()
    }

    /// Performs validation checks on the configuration for a specific run
    /// mode, without touching any archive.
    ///
    /// All run methods call this automatically; manual invocation is optional
    /// but useful for early error detection.
    ///
    /// # Arguments
    ///
    /// * `mode` - The intended operation, which determines the checks:
    ///   - [`RunMode::Clamp`]: threshold floor, source directory, distinct output
    ///   - [`RunMode::Convert`]: source directory, distinct output
    ///   - [`RunMode::Survey`]: source directory only
    ///   - [`RunMode::Pack`]: output path only
    ///
    /// # Returns
    ///
    /// * `Ok(&self)` - Configuration is valid for the specified mode
    /// * `Err(Error)` - Configuration has validation errors
    pub fn preflight_check(&self, mode: RunMode) -> Result<&Self> {
        if self.workers == 0 {
            return Err(Error::Configuration(
                "At least one worker is required.".to_string(),
            ));
        }

        match mode {
            RunMode::Clamp => {
                if self.threshold <= MIN_PIXEL_THRESHOLD {
                    return Err(Error::Configuration(format!(
                        "Cannot make images smaller than {} pixels",
                        MIN_PIXEL_THRESHOLD
                    )));
                }
                self.check_source_dir()?;
                self.check_output_distinct()?;
            }
            RunMode::Convert => {
                self.check_source_dir()?;
                self.check_output_distinct()?;
            }
            RunMode::Survey => {
                self.check_source_dir()?;
            }
            RunMode::Pack => {
                if self.output_path.as_os_str().is_empty() {
                    return Err(Error::Configuration(
                        "`output_path` must be set.".to_string(),
                    ));
                }
            }
        }

        Ok(self)
    }

    fn check_source_dir(&self) -> Result<()> {
        if self.source_path.as_os_str().is_empty() {
            return Err(Error::Configuration(
                "`source_path` must be set.".to_string(),
            ));
        }
        if !self.source_path.exists() {
            return Err(Error::NotFound(format!(
                "Source path does not exist: {:?}",
                self.source_path
            )));
        }
        if !self.source_path.is_dir() {
            return Err(Error::InvalidPath(
                self.source_path.clone(),
                "Source path is not a directory.".to_string(),
            ));
        }
        Ok(())
    }

    /// Rejects runs that would write into the directory they read from.
    fn check_output_distinct(&self) -> Result<()> {
        if self.output_path.as_os_str().is_empty() {
            return Err(Error::Configuration(
                "`output_path` must be set.".to_string(),
            ));
        }

        // The output usually does not exist yet; fall back to lexical
        // absolutization when it cannot be canonicalized.
        let source = self.source_path.canonicalize()?;
        let output = self
            .output_path
            .canonicalize()
            .or_else(|_| std::path::absolute(&self.output_path))?;

        if source == output {
            return Err(Error::Configuration(
                "Cannot write into the same directory the run reads from".to_string(),
            ));
        }
        Ok(())
    }

    /// Lists the work items under the source directory: every supported
    /// archive or chapter directory, hidden entries skipped, natural order.
    async fn enumerate_inputs(&self) -> Result<Vec<PathBuf>> {
        let mut entries = fs::read_dir(&self.source_path).await?;
        let mut inputs = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let hidden = path
                .file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.starts_with('.'))
                .unwrap_or(false);
            if hidden {
                continue;
            }
            if archive::is_supported(&path) {
                inputs.push(path);
            }
        }

        inputs.par_sort_by(|a, b| natural_cmp_paths(a, b));
        Ok(inputs)
    }

    /// Opens the run's progress channel and spawns the single consumer task
    /// that traces every event and forwards it to the configured sink.
    fn progress_channel(&self) -> (UnboundedSender<ProgressEvent>, JoinHandle<()>) {
        let (sender, mut receiver) = mpsc::unbounded_channel();
        let sink = self.event_sink.clone();

        let consumer = tokio::spawn(async move {
            while let Some(event) = receiver.recv().await {
                match &event {
                    ProgressEvent::ImageSaved {
                        chapter, filename, ..
                    } => debug!("[{}] saved {}", chapter, filename),
                    ProgressEvent::ChapterDone {
                        chapter,
                        total_images,
                    } => debug!("[{}] complete with {} images", chapter, total_images),
                    ProgressEvent::Error { chapter, message } => {
                        debug!("[{}] error: {}", chapter, message)
                    }
                }
                if let Some(sink) = sink.as_ref() {
                    let _ = sink.send(event);
                }
            }
        });

        (sender, consumer)
    }

    // --- Run entry points ---

    /// Enforces the pixel budget across every archive under the source
    /// directory.
    ///
    /// Each work item becomes one output subdirectory (named after the item's
    /// stem) under `output_path`. Chapters whose largest page is already
    /// under the threshold are extracted verbatim, bytes untouched; all
    /// others are rewritten as sequentially numbered JPEGs (`001.jpg`, ...)
    /// after applying the configured [`ClampStrategy`].
    ///
    /// Failures are isolated: a corrupt archive yields one `Failed` result
    /// and one `Error` event while its siblings keep running. The returned
    /// report covers every enumerated item in submission order.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// # use bunkatsu::prelude::*;
    /// # use std::path::PathBuf;
    /// # #[tokio::main]
    /// # async fn main() -> bunkatsu::error::Result<()> {
    /// let report = BunkatsuConfig::builder()
    ///     .source_path(PathBuf::from("./downloads"))
    ///     .output_path(PathBuf::from("./reader-ready"))
    ///     .build()?
    ///     .clamp_from_source()
    ///     .await?;
    ///
    /// assert!(report.is_success());
    /// # Ok(())
    /// # }
    /// ```
    pub async fn clamp_from_source(&self) -> Result<RunReport> {
        self.preflight_check(RunMode::Clamp)?;
        let started_at = Utc::now();

        let inputs = self.enumerate_inputs().await?;
        if inputs.is_empty() {
            return Err(Error::NotFound(format!(
                "No supported archives found in {:?}",
                self.source_path
            )));
        }
        info!(
            "clamping {} chapters from {:?} (threshold {}, {:?})",
            inputs.len(),
            self.source_path,
            self.threshold,
            self.strategy
        );

        fs::create_dir_all(&self.output_path).await?;

        let (sender, consumer) = self.progress_channel();
        let semaphore = Arc::new(Semaphore::new(self.workers));
        let mut tasks = Vec::new();

        for source in inputs {
            let semaphore_clone = Arc::clone(&semaphore);
            let worker = ChapterWorker {
                source: source.clone(),
                output_root: self.output_path.clone(),
                threshold: self.threshold,
                strategy: self.strategy,
                events: sender.clone(),
            };
            let output_dir = self.output_path.join(chapter_stem(&source));

            let task = tokio::spawn(async move {
                let _permit = semaphore_clone.acquire().await?;
                Result::Ok(worker.run().await)
            });
            tasks.push((source, output_dir, task));
        }

        drop(sender);
        let results = drain_workers(tasks).await;
        consumer.await?;

        let report = RunReport {
            results,
            started_at,
            finished_at: Utc::now(),
        };
        info!(
            "clamp run finished: {} completed, {} skipped, {} failed",
            report.completed(),
            report.skipped(),
            report.failed()
        );
        Ok(report)
    }

    /// Converts every archive under the source directory to the container
    /// format registered for `target_ext` (case-insensitive, leading dot
    /// tolerated).
    ///
    /// Items already stored in the target variant complete as `Skipped`
    /// without any I/O; extension aliases count (`.cbz` to `.zip` is a
    /// no-op). Existing destinations are skipped unless `overwrite` is set.
    /// Everything else is extracted into a scratch directory and repacked
    /// into `output_path`; the source tree is never modified.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// # use bunkatsu::prelude::*;
    /// # use std::path::PathBuf;
    /// # #[tokio::main]
    /// # async fn main() -> bunkatsu::error::Result<()> {
    /// let report = BunkatsuConfig::builder()
    ///     .source_path(PathBuf::from("./mixed"))
    ///     .output_path(PathBuf::from("./as-cbz"))
    ///     .build()?
    ///     .convert_from_source("cbz")
    ///     .await?;
    ///
    /// println!("{} converted, {} skipped", report.completed(), report.skipped());
    /// # Ok(())
    /// # }
    /// ```
    pub async fn convert_from_source(&self, target_ext: &str) -> Result<RunReport> {
        self.preflight_check(RunMode::Convert)?;
        let started_at = Utc::now();

        let extension = target_ext.trim_start_matches('.').to_ascii_lowercase();
        let target_kind = archive::kind_for_extension(&extension)
            .ok_or_else(|| Error::UnsupportedFormat(PathBuf::from(target_ext)))?;

        let inputs = self.enumerate_inputs().await?;
        if inputs.is_empty() {
            return Err(Error::NotFound(format!(
                "No supported archives found in {:?}",
                self.source_path
            )));
        }
        info!("converting {} archives to .{}", inputs.len(), extension);

        fs::create_dir_all(&self.output_path).await?;

        let (sender, consumer) = self.progress_channel();
        let semaphore = Arc::new(Semaphore::new(self.workers));
        let mut tasks = Vec::new();

        for source in inputs {
            let semaphore_clone = Arc::clone(&semaphore);
            let events = sender.clone();
            let overwrite = self.overwrite;

            let destination = self
                .output_path
                .join(format!("{}.{}", chapter_stem(&source), extension));

            let source_clone = source.clone();
            let destination_clone = destination.clone();
            let task = tokio::spawn(async move {
                let _permit = semaphore_clone.acquire().await?;
                Result::Ok(
                    convert_one(source_clone, destination_clone, target_kind, overwrite, events)
                        .await,
                )
            });
            tasks.push((source, destination, task));
        }

        drop(sender);
        let results = drain_workers(tasks).await;
        consumer.await?;

        let report = RunReport {
            results,
            started_at,
            finished_at: Utc::now(),
        };
        info!(
            "conversion finished: {} completed, {} skipped, {} failed",
            report.completed(),
            report.skipped(),
            report.failed()
        );
        Ok(report)
    }

    /// Probes the page resolutions of every archive under the source
    /// directory without writing anything.
    ///
    /// With `sample`, only the first `sample` pages (in reading order) of
    /// each archive are decoded, which makes surveying large collections
    /// cheap. The result is one [`ArchiveSurvey`] per input, in natural
    /// order; use the maximum areas to pick a clamp threshold.
    pub async fn survey_source(&self, sample: Option<usize>) -> Result<Vec<ArchiveSurvey>> {
        self.preflight_check(RunMode::Survey)?;

        let inputs = self.enumerate_inputs().await?;
        if inputs.is_empty() {
            return Err(Error::NotFound(format!(
                "No supported archives found in {:?}",
                self.source_path
            )));
        }
        info!("surveying {} archives in {:?}", inputs.len(), self.source_path);

        let semaphore = Arc::new(Semaphore::new(self.workers));
        let mut handles = Vec::new();

        for source in inputs {
            let semaphore_clone = Arc::clone(&semaphore);
            handles.push(tokio::spawn(async move {
                let _permit = semaphore_clone.acquire().await?;

                let handler = archive::resolve(&source)?;
                let pages = handler.list_images(sample.map(sample_filter)).await?;

                Result::Ok(ArchiveSurvey {
                    source,
                    images: pages.len(),
                    max_width: pages.iter().map(PageImage::width).max().unwrap_or(0),
                    max_height: pages.iter().map(PageImage::height).max().unwrap_or(0),
                    max_area: pages.iter().map(PageImage::area).max().unwrap_or(0),
                })
            }));
        }

        let surveys = try_join_all(handles).await?;
        surveys.into_iter().collect()
    }

    /// Packs a flat, pre-detected page list into per-chapter archives.
    ///
    /// This is the consumer side of an external chapter-break detector:
    /// `boundaries` holds the indices (into the natural-sorted page list)
    /// where new chapters begin. Index 0 is implied; out-of-range and
    /// duplicate indices are dropped. Each slice becomes
    /// `Chapter NNN.cbz` under `output_path`, members stored uncompressed
    /// under their original file names.
    ///
    /// # Arguments
    ///
    /// * `pages` - Page image files; sorted into natural order internally
    /// * `boundaries` - Chapter start indices produced by the detector
    pub async fn pack_from_boundaries(
        &self,
        pages: Vec<PathBuf>,
        boundaries: Vec<usize>,
    ) -> Result<RunReport> {
        self.preflight_check(RunMode::Pack)?;
        let started_at = Utc::now();

        if pages.is_empty() {
            return Err(Error::NotFound("No pages to pack".to_string()));
        }

        let mut pages = pages;
        pages.par_sort_by(|a, b| natural_cmp_paths(a, b));

        // Normalize the boundary list: implicit first chapter, in range,
        // ascending, unique.
        let mut starts: Vec<usize> = boundaries.into_iter().filter(|&b| b < pages.len()).collect();
        if !starts.contains(&0) {
            starts.insert(0, 0);
        }
        starts.par_sort_unstable();
        starts.dedup();

        let mut chapters: Vec<Vec<PathBuf>> = Vec::with_capacity(starts.len());
        for (i, &start) in starts.iter().enumerate() {
            let end = starts.get(i + 1).copied().unwrap_or(pages.len());
            chapters.push(pages[start..end].to_vec());
        }
        info!(
            "packing {} pages into {} chapters under {:?}",
            pages.len(),
            chapters.len(),
            self.output_path
        );

        fs::create_dir_all(&self.output_path).await?;

        let (sender, consumer) = self.progress_channel();
        let semaphore = Arc::new(Semaphore::new(self.workers));
        let mut tasks = Vec::new();

        for (index, chapter_pages) in chapters.into_iter().enumerate() {
            let semaphore_clone = Arc::clone(&semaphore);
            let events = sender.clone();
            let overwrite = self.overwrite;

            let chapter_name = format!("Chapter {:03}", index + 1);
            let destination = self.output_path.join(format!("{}.cbz", chapter_name));
            let first_page = chapter_pages.first().cloned().unwrap_or_default();

            let destination_clone = destination.clone();
            let task = tokio::spawn(async move {
                let _permit = semaphore_clone.acquire().await?;
                Result::Ok(
                    pack_one(chapter_name, chapter_pages, destination_clone, overwrite, events)
                        .await,
                )
            });
            tasks.push((first_page, destination, task));
        }

        drop(sender);
        let results = drain_workers(tasks).await;
        consumer.await?;

        let report = RunReport {
            results,
            started_at,
            finished_at: Utc::now(),
        };
        info!(
            "packing finished: {} completed, {} failed",
            report.completed(),
            report.failed()
        );
        Ok(report)
    }
}

impl BunkatsuConfigBuilder {
    fn validate(&self) -> std::result::Result<(), String> {
        if let Some(workers) = self.workers {
            if workers == 0 {
                return Err("At least one worker is required.".to_string());
            }
        }
        Ok(())
    }
}

/// Joins every spawned worker in submission order. A worker that panicked or
/// errored before producing a result is recorded as `Failed`; the drain
/// itself never aborts.
async fn drain_workers(
    tasks: Vec<(PathBuf, PathBuf, JoinHandle<Result<ChapterResult>>)>,
) -> Vec<ChapterResult> {
    let mut results = Vec::with_capacity(tasks.len());
    for (source, output, task) in tasks {
        match task.await {
            Ok(Ok(result)) => results.push(result),
            Ok(Err(e)) => {
                warn!("worker for {:?} errored: {}", source, e);
                results.push(ChapterResult::failed(source, output, e.to_string()));
            }
            Err(e) => {
                warn!("worker for {:?} did not finish: {}", source, e);
                results.push(ChapterResult::failed(
                    source,
                    output,
                    format!("worker task failed: {e}"),
                ));
            }
        }
    }
    results
}

/// Converts one archive end to end; always returns a terminal result.
async fn convert_one(
    source: PathBuf,
    destination: PathBuf,
    target_kind: ArchiveKind,
    overwrite: bool,
    events: UnboundedSender<ProgressEvent>,
) -> ChapterResult {
    let chapter = chapter_stem(&source);

    match try_convert_one(&source, &destination, target_kind, overwrite, &events, &chapter).await {
        Ok(result) => result,
        Err(e) => {
            let message = e.to_string();
            warn!("conversion of '{}' failed: {}", chapter, message);
            let _ = events.send(ProgressEvent::Error {
                chapter,
                message: message.clone(),
            });
            ChapterResult::failed(source, destination, message)
        }
    }
}

async fn try_convert_one(
    source: &Path,
    destination: &Path,
    target_kind: ArchiveKind,
    overwrite: bool,
    events: &UnboundedSender<ProgressEvent>,
    chapter: &str,
) -> Result<ChapterResult> {
    let handler = archive::resolve(source)?;

    if handler.kind() == target_kind {
        let reason = match target_kind.extension() {
            Some(ext) => format!("already a {} archive", ext),
            None => "already in the target format".to_string(),
        };
        info!("skipping '{}': {}", chapter, reason);
        return Ok(ChapterResult::skipped(
            source.to_path_buf(),
            destination.to_path_buf(),
            reason,
        ));
    }

    if destination.exists() && !overwrite {
        info!("skipping '{}': {:?} already exists", chapter, destination);
        return Ok(ChapterResult::skipped(
            source.to_path_buf(),
            destination.to_path_buf(),
            format!(
                "destination {:?} already exists",
                destination.file_name().unwrap_or(destination.as_os_str())
            ),
        ));
    }

    let staging = tempfile::tempdir()?;
    let work_dir = staging.path().join("work");

    handler.extract(&work_dir).await?;
    archive::handler_for(target_kind, destination)
        .compress(&work_dir, overwrite)
        .await?;

    // Report how many pages moved, mirroring what a clamp run would say.
    let work_dir_clone = work_dir.clone();
    let total_images = spawn_blocking(move || -> Result<usize> {
        Ok(archive::walk_relative(&work_dir_clone)?
            .iter()
            .filter(|(_, member)| archive::is_image_name(member))
            .count())
    })
    .await??;

    info!("converted '{}' into {:?}", chapter, destination);
    let _ = events.send(ProgressEvent::ChapterDone {
        chapter: chapter.to_string(),
        total_images,
    });

    Ok(ChapterResult::completed(
        source.to_path_buf(),
        destination.to_path_buf(),
        total_images,
    ))
}

/// Packs one chapter slice into a stored-only zip; always returns a terminal
/// result.
async fn pack_one(
    chapter: String,
    pages: Vec<PathBuf>,
    destination: PathBuf,
    overwrite: bool,
    events: UnboundedSender<ProgressEvent>,
) -> ChapterResult {
    let source = pages.first().cloned().unwrap_or_default();

    match try_pack_one(&chapter, pages, &destination, overwrite, &events).await {
        Ok(total) => {
            let _ = events.send(ProgressEvent::ChapterDone {
                chapter,
                total_images: total,
            });
            ChapterResult::completed(source, destination, total)
        }
        Err(e) => {
            let message = e.to_string();
            warn!("packing '{}' failed: {}", chapter, message);
            let _ = events.send(ProgressEvent::Error {
                chapter,
                message: message.clone(),
            });
            ChapterResult::failed(source, destination, message)
        }
    }
}

async fn try_pack_one(
    chapter: &str,
    pages: Vec<PathBuf>,
    destination: &Path,
    overwrite: bool,
    events: &UnboundedSender<ProgressEvent>,
) -> Result<usize> {
    let chapter = chapter.to_string();
    let destination = destination.to_path_buf();
    let events = events.clone();

    spawn_blocking(move || {
        prepare_destination(&destination, overwrite)?;

        let file = File::create(&destination).map_err(|e| compression_error(&destination, e))?;
        let mut zip = ZipWriter::new(file);
        // The pages are already-compressed rasters; deflating them again
        // buys nothing.
        let options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Stored)
            .unix_permissions(0o755);

        let total = pages.len();
        for page in &pages {
            let member = page
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .ok_or_else(|| {
                    Error::InvalidPath(page.clone(), "page has no file name".to_string())
                })?;

            let file = File::open(page).map_err(|e| compression_error(&destination, e))?;
            let len = file
                .metadata()
                .map_err(|e| compression_error(&destination, e))?
                .len();

            zip.start_file(member.clone(), options)
                .map_err(|e| compression_error(&destination, e))?;
            if len > 0 {
                let mmap = unsafe { MmapOptions::new().map(&file) }
                    .map_err(|e| compression_error(&destination, e))?;
                zip.write_all(&mmap[..])
                    .map_err(|e| compression_error(&destination, e))?;
            }

            let _ = events.send(ProgressEvent::ImageSaved {
                chapter: chapter.clone(),
                filename: member,
                total_for_chapter: total,
            });
        }

        zip.finish()
            .map_err(|e| compression_error(&destination, e))?;
        Ok(total)
    })
    .await?
}
