//! Bunkatsu - Comic Archive Normalization Library
//!
//! This crate provides a high-performance, asynchronous, and declarative API
//! for normalizing comic archives (CBZ, CBR, CB7, CBT and plain directories):
//! clamping page sizes to a pixel budget, converting between container
//! formats, surveying page resolutions and packing detected chapters.
//!
//! # Getting Started
//!
//! Configure a run through the [`BunkatsuConfig`] builder, then execute one
//! of its operations.
//!
//! ```rust,no_run
//! use bunkatsu::prelude::*;
//! use std::path::PathBuf;
//!
//! #[tokio::main]
//! async fn main() -> bunkatsu::error::Result<()> {
//!     let source_dir = PathBuf::from("./downloads/series_a");
//!     let output_dir = PathBuf::from("./reader_ready/series_a");
//!
//!     // 1. Configure the run using the builder
//!     let config = BunkatsuConfig::builder()
//!         .source_path(source_dir.clone())
//!         .output_path(output_dir.clone())
//!         .threshold(4_000_000u64)
//!         .strategy(ClampStrategy::Split)
//!         .workers(4usize)
//!         .build()?;
//!
//!     // Optional: run the pre-flight checks early for better error messages
//!     config.preflight_check(RunMode::Clamp)?;
//!
//!     // 2. Clamp every chapter under the source directory
//!     let report = config.clamp_from_source().await?;
//!     println!(
//!         "{} completed, {} skipped, {} failed ({} pages written)",
//!         report.completed(),
//!         report.skipped(),
//!         report.failed(),
//!         report.total_pages()
//!     );
//!
//!     Ok(())
//! }
//! ```
//!
//! For format conversion, resolution surveying and chapter packing, refer to
//! the [`BunkatsuConfig`] method documentation.

pub mod archive;
pub mod bunkatsu;
pub mod clamp;
pub mod error;
pub mod sort;
pub mod types;

mod worker;

// Publicly expose the main `BunkatsuConfig` struct and its builder
pub use bunkatsu::BunkatsuConfig;
pub use bunkatsu::BunkatsuConfigBuilder;

// Re-export error and core types for direct access
pub use archive::{ArchiveHandler, ArchiveKind, MemberFilter};
pub use clamp::ClampStrategy;
pub use types::{
    ArchiveSurvey, ChapterResult, ChapterStatus, PageImage, ProgressEvent, RunMode, RunReport,
};

/// Prelude module for convenient imports.
///
/// This module re-exports the most commonly used types and traits, allowing you to
/// import everything you need with a single `use bunkatsu::prelude::*;` statement.
pub mod prelude {
    pub use super::{
        ArchiveKind, ArchiveSurvey, BunkatsuConfig, BunkatsuConfigBuilder, ChapterResult,
        ChapterStatus, ClampStrategy, PageImage, ProgressEvent, RunMode, RunReport, archive, clamp,
        error, sort, types,
    };
    pub use crate::archive::{ArchiveHandler, MemberFilter};
    pub use crate::clamp::{DEFAULT_SIZE_THRESHOLD, MIN_PIXEL_THRESHOLD};
    pub use crate::sort::{NaturalSortKey, natural_cmp};
    pub use std::cmp::Ordering;
    pub use std::path::{Path, PathBuf};
    pub use std::sync::Arc;
}
