//! Unit tests for core Bunkatsu functionality.
//!
//! Tests individual components in isolation without full pipeline execution.

use bunkatsu::error::{Error, Result};
use bunkatsu::prelude::*;
use chrono::Utc;

mod common;
use common::{create_cbz, setup_test_dirs};

#[tokio::test]
async fn test_config_builder_validation() -> Result<()> {
    // Zero workers - should fail in our custom validate() function
    let result = BunkatsuConfig::builder()
        .source_path(PathBuf::from("/tmp/in"))
        .output_path(PathBuf::from("/tmp/out"))
        .workers(0usize)
        .build();
    assert!(result.is_err());
    assert!(
        result
            .unwrap_err()
            .to_string()
            .contains("At least one worker")
    );

    Ok(())
}

#[tokio::test]
async fn test_config_builder_defaults() -> Result<()> {
    let config = BunkatsuConfig::builder().build()?;

    assert_eq!(config.threshold, 5_000_000);
    assert_eq!(config.strategy, ClampStrategy::Split);
    assert!(config.workers >= 1);
    assert!(!config.overwrite);
    assert!(config.event_sink.is_none());
    Ok(())
}

#[tokio::test]
async fn test_preflight_check_threshold_floor() -> Result<()> {
    let test_dirs = setup_test_dirs("preflight_threshold").await;

    // Rejected before any archive is touched
    let config = BunkatsuConfig::builder()
        .source_path(test_dirs.source_dir.clone())
        .output_path(test_dirs.target_dir.clone())
        .threshold(400_000u64)
        .build()?;
    let result = config.preflight_check(RunMode::Clamp);
    assert!(result.is_err());
    assert!(matches!(result.unwrap_err(), Error::Configuration(_)));

    // The floor itself is rejected too; one pixel above passes
    let config = BunkatsuConfig::builder()
        .source_path(test_dirs.source_dir.clone())
        .output_path(test_dirs.target_dir.clone())
        .threshold(500_000u64)
        .build()?;
    assert!(config.preflight_check(RunMode::Clamp).is_err());

    let config = BunkatsuConfig::builder()
        .source_path(test_dirs.source_dir.clone())
        .output_path(test_dirs.target_dir.clone())
        .threshold(500_001u64)
        .build()?;
    assert!(config.preflight_check(RunMode::Clamp).is_ok());

    // Conversion does not decode pages, so the threshold is not checked
    let config = BunkatsuConfig::builder()
        .source_path(test_dirs.source_dir.clone())
        .output_path(test_dirs.target_dir.clone())
        .threshold(400_000u64)
        .build()?;
    assert!(config.preflight_check(RunMode::Convert).is_ok());
    Ok(())
}

#[tokio::test]
async fn test_preflight_check_source_and_output() -> Result<()> {
    let test_dirs = setup_test_dirs("preflight_paths").await;

    // Missing source
    let config = BunkatsuConfig::builder()
        .source_path(test_dirs.source_dir.join("nonexistent"))
        .output_path(test_dirs.target_dir.clone())
        .build()?;
    let result = config.preflight_check(RunMode::Clamp);
    assert!(result.is_err());
    assert!(matches!(result.unwrap_err(), Error::NotFound(_)));

    // Source is a file, not a directory
    let file_path = test_dirs.test_dir.join("file.cbz");
    tokio::fs::write(&file_path, b"x").await?;
    let config = BunkatsuConfig::builder()
        .source_path(file_path)
        .output_path(test_dirs.target_dir.clone())
        .build()?;
    assert!(matches!(
        config.preflight_check(RunMode::Clamp).unwrap_err(),
        Error::InvalidPath(..)
    ));

    // Writing into the directory being read is rejected
    let config = BunkatsuConfig::builder()
        .source_path(test_dirs.source_dir.clone())
        .output_path(test_dirs.source_dir.clone())
        .build()?;
    let result = config.preflight_check(RunMode::Clamp);
    assert!(result.is_err());
    assert!(result.unwrap_err().to_string().contains("same directory"));

    // Surveys read only, so no output path is required
    let config = BunkatsuConfig::builder()
        .source_path(test_dirs.source_dir.clone())
        .build()?;
    assert!(config.preflight_check(RunMode::Survey).is_ok());
    Ok(())
}

#[tokio::test]
async fn test_tool_not_found_carries_the_tool_name() {
    let err = Error::ToolNotFound("rar".to_string());

    // Callers match on the tool name; the display carries the guidance
    assert!(matches!(&err, Error::ToolNotFound(tool) if tool == "rar"));
    assert!(err.to_string().contains("'rar'"));
    assert!(err.to_string().contains("PATH"));
}

#[tokio::test]
async fn test_chapter_status_display() {
    assert_eq!(ChapterStatus::Completed.to_string(), "completed");
    assert_eq!(
        ChapterStatus::Skipped("already a zip archive".to_string()).to_string(),
        "skipped (already a zip archive)"
    );
    assert_eq!(
        ChapterStatus::Failed("boom".to_string()).to_string(),
        "failed (boom)"
    );
}

#[tokio::test]
async fn test_run_report_accounting() {
    let now = Utc::now();
    let report = RunReport {
        results: vec![
            ChapterResult::completed(PathBuf::from("a.cbz"), PathBuf::from("out/a"), 10),
            ChapterResult::skipped(
                PathBuf::from("b.cbz"),
                PathBuf::from("out/b.cbz"),
                "already a zip archive",
            ),
            ChapterResult::failed(PathBuf::from("c.cbz"), PathBuf::from("out/c"), "corrupt"),
        ],
        started_at: now,
        finished_at: now,
    };

    assert_eq!(report.completed(), 1);
    assert_eq!(report.skipped(), 1);
    assert_eq!(report.failed(), 1);
    assert_eq!(report.total_pages(), 10);
    assert!(!report.is_success());
}

#[tokio::test]
async fn test_error_on_empty_source() -> Result<()> {
    let test_dirs = setup_test_dirs("empty_source").await;

    let config = BunkatsuConfig::builder()
        .source_path(test_dirs.source_dir.clone())
        .output_path(test_dirs.target_dir.clone())
        .build()?;

    let result = config.clamp_from_source().await;
    assert!(result.is_err());
    assert!(matches!(result.unwrap_err(), Error::NotFound(_)));
    Ok(())
}

#[tokio::test]
async fn test_convert_rejects_unknown_target() -> Result<()> {
    let test_dirs = setup_test_dirs("convert_unknown_target").await;
    create_cbz(
        &test_dirs.source_dir.join("ch1.cbz"),
        &[("001.jpg", 50, 50)],
    )
    .await?;

    let config = BunkatsuConfig::builder()
        .source_path(test_dirs.source_dir.clone())
        .output_path(test_dirs.target_dir.clone())
        .build()?;

    let result = config.convert_from_source("pdf").await;
    assert!(result.is_err());
    assert!(matches!(result.unwrap_err(), Error::UnsupportedFormat(_)));
    Ok(())
}
