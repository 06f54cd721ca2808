//! Per-chapter processing: one worker takes one archive from source to
//! terminal state.
//!
//! A worker resolves its source, lists the pages, and then either extracts
//! verbatim (every page already under the threshold) or rewrites the chapter
//! as clamped, sequentially numbered JPEGs. Failures never escape: they are
//! converted into one `Error` event plus a `Failed` result so sibling
//! workers keep running.

use std::path::{Path, PathBuf};

use image::codecs::jpeg::JpegEncoder;
use log::{debug, info, warn};
use tokio::fs;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::spawn_blocking;

use crate::archive;
use crate::clamp::{self, ClampStrategy, OUTPUT_JPEG_QUALITY};
use crate::error::Result;
use crate::types::{ChapterResult, PageImage, ProgressEvent};

pub(crate) struct ChapterWorker {
    pub source: PathBuf,
    pub output_root: PathBuf,
    pub threshold: u64,
    pub strategy: ClampStrategy,
    pub events: UnboundedSender<ProgressEvent>,
}

/// Stem of a work item's source path: the chapter display name and the name
/// of its output subdirectory or destination archive. Every path derived for
/// a chapter goes through here so reporting and writing cannot drift apart.
pub(crate) fn chapter_stem(source: &Path) -> String {
    source
        .file_stem()
        .unwrap_or(source.as_os_str())
        .to_string_lossy()
        .into_owned()
}

impl ChapterWorker {
    /// Display name used for events, logs and the output subdirectory.
    fn chapter_name(&self) -> String {
        chapter_stem(&self.source)
    }

    /// Runs the chapter to completion. Never fails the caller: errors become
    /// one `Error` event and a `Failed` result.
    pub(crate) async fn run(self) -> ChapterResult {
        let chapter = self.chapter_name();
        let output_dir = self.output_root.join(&chapter);

        match self.process(&chapter, &output_dir).await {
            Ok(pages) => {
                info!("chapter '{}' finished with {} images", chapter, pages);
                let _ = self.events.send(ProgressEvent::ChapterDone {
                    chapter,
                    total_images: pages,
                });
                ChapterResult::completed(self.source, output_dir, pages)
            }
            Err(e) => {
                let message = e.to_string();
                warn!("chapter '{}' failed: {}", chapter, message);
                let _ = self.events.send(ProgressEvent::Error {
                    chapter,
                    message: message.clone(),
                });
                ChapterResult::failed(self.source, output_dir, message)
            }
        }
    }

    async fn process(&self, chapter: &str, output_dir: &Path) -> Result<usize> {
        let handler = archive::resolve(&self.source)?;
        debug!("resolved {:?} as {:?}", handler.path(), handler.kind());

        let pages = handler.list_images(None).await?;
        let max_area = pages.iter().map(PageImage::area).max().unwrap_or(0);

        // Stale output from a previous run is removed, never merged into.
        if output_dir.exists() {
            fs::remove_dir_all(output_dir).await?;
        }

        if max_area < self.threshold {
            debug!(
                "chapter '{}' is under the threshold (max area {}), extracting verbatim",
                chapter, max_area
            );
            handler.extract(output_dir).await?;
            return Ok(pages.len());
        }

        fs::create_dir_all(output_dir).await?;

        // Clamp and encode on the blocking pool; a single task per chapter
        // keeps this chapter's ImageSaved events in page order.
        let threshold = self.threshold;
        let strategy = self.strategy;
        let events = self.events.clone();
        let chapter = chapter.to_string();
        let output_dir = output_dir.to_path_buf();

        spawn_blocking(move || {
            let clamped = clamp::clamp_pages(pages, threshold, strategy);
            let total = clamped.len();

            for (index, page) in clamped.into_iter().enumerate() {
                let filename = format!("{:03}.jpg", index + 1);

                let mut bytes = Vec::new();
                let mut encoder = JpegEncoder::new_with_quality(&mut bytes, OUTPUT_JPEG_QUALITY);
                encoder.encode_image(&page.image.to_rgb8())?;
                std::fs::write(output_dir.join(&filename), &bytes)?;

                debug!("chapter '{}' wrote {}", chapter, filename);
                let _ = events.send(ProgressEvent::ImageSaved {
                    chapter: chapter.clone(),
                    filename,
                    total_for_chapter: total,
                });
            }
            Ok(total)
        })
        .await?
    }
}
