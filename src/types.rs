//! Core data types, enums, and reports for the Bunkatsu archive library.
//!
//! This module defines the fundamental data structures used throughout Bunkatsu:
//! - In-flight page data (`PageImage`)
//! - Per-chapter outcomes (`ChapterStatus`, `ChapterResult`)
//! - Progress reporting (`ProgressEvent`)
//! - Run aggregation (`RunReport`)
//! - Resolution probing (`ArchiveSurvey`)
//! - Execution modes (`RunMode`)

use chrono::{DateTime, Utc};
use image::DynamicImage;
use std::fmt;
use std::path::PathBuf;

/// A single decoded page held in memory while a chapter is being transformed.
///
/// The `origin` is the member name inside the source archive (or the file name
/// inside a source directory). It only matters for ordering and error
/// messages; output files are renumbered sequentially.
#[derive(Clone)]
pub struct PageImage {
    pub image: DynamicImage,
    pub origin: String,
}

impl PageImage {
    pub fn new(image: DynamicImage, origin: impl Into<String>) -> Self {
        Self {
            image,
            origin: origin.into(),
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Pixel area (`width * height`) as `u64`, safe for 4-gigapixel scans.
    pub fn area(&self) -> u64 {
        u64::from(self.width()) * u64::from(self.height())
    }
}

// Manual Debug: the derived form would dump the raw pixel buffer.
impl fmt::Debug for PageImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PageImage")
            .field("origin", &self.origin)
            .field("width", &self.width())
            .field("height", &self.height())
            .finish()
    }
}

/// Terminal state of one processed chapter.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ChapterStatus {
    Completed,
    Skipped(String), // Reason, e.g. "already a cbz archive"
    Failed(String),  // Error message, also mirrored as a `ProgressEvent::Error`
}

impl fmt::Display for ChapterStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChapterStatus::Completed => write!(f, "completed"),
            ChapterStatus::Skipped(reason) => write!(f, "skipped ({reason})"),
            ChapterStatus::Failed(reason) => write!(f, "failed ({reason})"),
        }
    }
}

/// Outcome record for a single work item (one archive or directory).
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ChapterResult {
    pub source: PathBuf,
    pub output: PathBuf,
    pub pages: usize,
    pub status: ChapterStatus,
}

impl ChapterResult {
    pub fn completed(source: PathBuf, output: PathBuf, pages: usize) -> Self {
        Self {
            source,
            output,
            pages,
            status: ChapterStatus::Completed,
        }
    }

    pub fn skipped(source: PathBuf, output: PathBuf, reason: impl Into<String>) -> Self {
        Self {
            source,
            output,
            pages: 0,
            status: ChapterStatus::Skipped(reason.into()),
        }
    }

    pub fn failed(source: PathBuf, output: PathBuf, reason: impl Into<String>) -> Self {
        Self {
            source,
            output,
            pages: 0,
            status: ChapterStatus::Failed(reason.into()),
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == ChapterStatus::Completed
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.status, ChapterStatus::Failed(_))
    }
}

/// Fine-grained progress emitted by workers while a run is in flight.
///
/// Events for one chapter arrive in order (`ImageSaved`s followed by exactly
/// one `ChapterDone`, or one `Error`); events of different chapters may
/// interleave arbitrarily.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ProgressEvent {
    /// One output page was written (or packed into an archive).
    ImageSaved {
        chapter: String,
        filename: String,
        total_for_chapter: usize,
    },
    /// A chapter finished and its output is fully written.
    ChapterDone { chapter: String, total_images: usize },
    /// A chapter failed; the run continues with its siblings.
    Error { chapter: String, message: String },
}

/// Aggregated outcome of one run, in submission order.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RunReport {
    pub results: Vec<ChapterResult>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunReport {
    pub fn completed(&self) -> usize {
        self.results.iter().filter(|r| r.is_completed()).count()
    }

    pub fn skipped(&self) -> usize {
        self.results
            .iter()
            .filter(|r| matches!(r.status, ChapterStatus::Skipped(_)))
            .count()
    }

    pub fn failed(&self) -> usize {
        self.results.iter().filter(|r| r.is_failed()).count()
    }

    pub fn total_pages(&self) -> usize {
        self.results.iter().map(|r| r.pages).sum()
    }

    /// True when no chapter failed (skips are not failures).
    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }
}

/// Resolution summary for one archive, as reported by a survey run.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ArchiveSurvey {
    pub source: PathBuf,
    /// Number of images inspected (the whole archive, or the sample prefix).
    pub images: usize,
    pub max_width: u32,
    pub max_height: u32,
    pub max_area: u64,
}

/// Specifies which operation a configuration is about to run.
/// Used by `BunkatsuConfig::preflight_check` to tailor validation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RunMode {
    /// Clamp oversized pages across all archives under the source directory.
    Clamp,
    /// Convert all archives under the source directory to one target format.
    Convert,
    /// Probe image resolutions without writing anything.
    Survey,
    /// Pack an explicit page list into chapter archives.
    Pack,
}
