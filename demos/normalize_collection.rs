//! Example walking through a full collection run: survey the source first,
//! then clamp every chapter while streaming progress events.
//!
//! Usage:
//!   cargo run --example normalize_collection -- <source_dir> <output_dir> [threshold]
//!
//! The source directory is scanned for supported archives (zip/cbz, rar/cbr,
//! 7z/cb7, tar/cbt) and loose chapter directories. Nothing is written until
//! the clamp pass in step 2.

use bunkatsu::prelude::*;
use tokio::sync::mpsc;

#[tokio::main]
async fn main() {
    let mut args = std::env::args().skip(1);
    let (source, output) = match (args.next(), args.next()) {
        (Some(source), Some(output)) => (PathBuf::from(source), PathBuf::from(output)),
        _ => {
            eprintln!("usage: normalize_collection <source_dir> <output_dir> [threshold]");
            std::process::exit(2);
        }
    };
    let threshold: u64 = match args.next() {
        Some(raw) => match raw.parse() {
            Ok(value) => value,
            Err(_) => {
                eprintln!("threshold must be a pixel count, got {raw:?}");
                std::process::exit(2);
            }
        },
        None => DEFAULT_SIZE_THRESHOLD,
    };

    println!("=== Bunkatsu Collection Normalization Demo ===\n");

    // Events from every worker arrive on one channel; print them as they come.
    let (sender, mut receiver) = mpsc::unbounded_channel();
    let printer = tokio::spawn(async move {
        while let Some(event) = receiver.recv().await {
            match event {
                ProgressEvent::ImageSaved {
                    chapter,
                    filename,
                    total_for_chapter,
                } => println!("   [{chapter}] {filename} ({total_for_chapter} so far)"),
                ProgressEvent::ChapterDone {
                    chapter,
                    total_images,
                } => println!("   [{chapter}] done, {total_images} images"),
                ProgressEvent::Error { chapter, message } => {
                    println!("   [{chapter}] ✗ {message}")
                }
            }
        }
    });

    let config = match BunkatsuConfig::builder()
        .source_path(source)
        .output_path(output)
        .threshold(threshold)
        .strategy(ClampStrategy::Split)
        .event_sink(sender)
        .build()
    {
        Ok(config) => config,
        Err(e) => {
            eprintln!("invalid configuration: {e}");
            std::process::exit(1);
        }
    };

    println!("1. Surveying the source (first 4 pages of each archive):");
    match config.survey_source(Some(4)).await {
        Ok(surveys) => {
            for survey in &surveys {
                let flag = if survey.max_area >= threshold { "⚠" } else { "✓" };
                println!(
                    "   {} {:?}: {} images, largest {}x{} ({} px)",
                    flag,
                    survey.source.file_name().unwrap_or(survey.source.as_os_str()),
                    survey.images,
                    survey.max_width,
                    survey.max_height,
                    survey.max_area
                );
            }
        }
        Err(e) => {
            eprintln!("survey failed: {e}");
            std::process::exit(1);
        }
    }

    println!("\n2. Clamping every chapter over {threshold} pixels:");
    let report = match config.clamp_from_source().await {
        Ok(report) => report,
        Err(e) => {
            eprintln!("run failed: {e}");
            std::process::exit(1);
        }
    };
    // The config owns the last sender; drop it so the printer can drain and stop.
    drop(config);
    printer.await.ok();

    println!("\n3. Report:");
    for result in &report.results {
        println!(
            "   {:?} -> {:?}: {} ({} pages)",
            result.source.file_name().unwrap_or(result.source.as_os_str()),
            result.output.file_name().unwrap_or(result.output.as_os_str()),
            result.status,
            result.pages
        );
    }
    println!(
        "\n   {} completed, {} skipped, {} failed in {}s",
        report.completed(),
        report.skipped(),
        report.failed(),
        (report.finished_at - report.started_at).num_seconds()
    );

    if !report.is_success() {
        std::process::exit(1);
    }
}
