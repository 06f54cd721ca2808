//! Common test utilities and constants for the Bunkatsu crate.
//!
//! Provides functions for setting up and tearing down test directories,
//! creating dummy pages and archives, and shared test constants.

use bunkatsu::error::{Error, Result};
use image::codecs::jpeg::JpegEncoder;
use image::{Rgb, RgbImage};
use rand::{Rng, distributions::Alphanumeric};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

#[allow(dead_code)]
pub const TEST_TMP_DIR: &str = "tests/tmp";
#[allow(dead_code)]
pub const TEST_TIMEOUT: Duration = Duration::from_secs(30);
#[allow(dead_code)]
pub const LONG_TEST_TIMEOUT: Duration = Duration::from_secs(120); // For full runs if they are slow

/// Paths of one test's scratch area.
#[allow(dead_code)]
pub struct TestDirs {
    pub test_dir: PathBuf,
    pub source_dir: PathBuf,
    pub target_dir: PathBuf,
}

/// Helper function to create a clean test directory with source and target
/// subdirectories. Ensures the base directory is empty before a test runs.
#[allow(dead_code)]
pub async fn setup_test_dirs(sub_path: &str) -> TestDirs {
    let rand_string: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(8)
        .map(char::from)
        .collect();
    let unique_sub_path = format!("{}-{}", sub_path, rand_string);
    let test_dir = PathBuf::from(TEST_TMP_DIR).join(unique_sub_path);
    if test_dir.exists() {
        fs::remove_dir_all(&test_dir).await.unwrap();
    }
    let source_dir = test_dir.join("source");
    let target_dir = test_dir.join("target");

    fs::create_dir_all(&source_dir).await.unwrap();
    fs::create_dir_all(&target_dir).await.unwrap();

    TestDirs {
        test_dir,
        source_dir,
        target_dir,
    }
}

/// Helper function to clean up the entire test temporary directory.
#[allow(dead_code)]
pub async fn cleanup_all_test_dirs() {
    let test_dir = PathBuf::from(TEST_TMP_DIR);
    if test_dir.exists() {
        let _ = fs::remove_dir_all(&test_dir).await;
    }
}

/// Builds a solid-color page of the given dimensions.
#[allow(dead_code)]
pub fn solid_page(width: u32, height: u32, color: Rgb<u8>) -> RgbImage {
    let mut img = RgbImage::new(width, height);
    for pixel in img.pixels_mut() {
        *pixel = color;
    }
    img
}

/// Encodes one solid-color page to an in-memory JPEG. Deterministic, so two
/// calls with the same dimensions produce identical bytes.
#[allow(dead_code)]
pub fn encode_jpeg(width: u32, height: u32) -> Vec<u8> {
    let img = solid_page(width, height, Rgb([200, 60, 60]));
    let mut bytes = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut bytes, 85);
    encoder.encode_image(&img).unwrap();
    bytes
}

/// Creates a dummy JPEG page of the given dimensions at the given path.
#[allow(dead_code)]
pub async fn create_page(path: &Path, width: u32, height: u32) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    let img = solid_page(width, height, Rgb([200, 60, 60]));
    let path_clone = path.to_path_buf();
    tokio::task::spawn_blocking(move || img.save_with_format(path_clone, image::ImageFormat::Jpeg))
        .await
        .map_err(Error::Join)?
        .map_err(Error::Image)?;
    Ok(())
}

/// Creates a default-sized (100x100) dummy page at the given path.
#[allow(dead_code)]
pub async fn create_dummy_image(path: &Path) -> Result<()> {
    create_page(path, 100, 100).await
}

/// Creates a CBZ archive at `path` whose members are JPEG pages with the
/// given names and dimensions.
#[allow(dead_code)]
pub async fn create_cbz(path: &Path, pages: &[(&str, u32, u32)]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    let path_clone = path.to_path_buf();
    let pages: Vec<(String, u32, u32)> = pages
        .iter()
        .map(|(name, width, height)| (name.to_string(), *width, *height))
        .collect();

    tokio::task::spawn_blocking(move || -> Result<()> {
        let file = std::fs::File::create(&path_clone)?;
        let mut zip = ZipWriter::new(file);
        let options = SimpleFileOptions::default();
        for (name, width, height) in pages {
            zip.start_file(name, options)?;
            zip.write_all(&encode_jpeg(width, height))?;
        }
        zip.finish()?;
        Ok(())
    })
    .await
    .map_err(Error::Join)??;
    Ok(())
}

/// Creates a CBZ archive at `path` whose members are raw byte blobs, so a
/// single member can be made deliberately undecodable while the archive
/// itself stays valid.
#[allow(dead_code)]
pub async fn create_cbz_raw(path: &Path, members: &[(&str, Vec<u8>)]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    let path_clone = path.to_path_buf();
    let members: Vec<(String, Vec<u8>)> = members
        .iter()
        .map(|(name, bytes)| (name.to_string(), bytes.clone()))
        .collect();

    tokio::task::spawn_blocking(move || -> Result<()> {
        let file = std::fs::File::create(&path_clone)?;
        let mut zip = ZipWriter::new(file);
        let options = SimpleFileOptions::default();
        for (name, bytes) in members {
            zip.start_file(name, options)?;
            zip.write_all(&bytes)?;
        }
        zip.finish()?;
        Ok(())
    })
    .await
    .map_err(Error::Join)??;
    Ok(())
}

/// Creates a file with a CBZ extension whose bytes are not a valid archive.
#[allow(dead_code)]
pub async fn create_corrupt_cbz(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    fs::write(path, b"this is not a zip archive").await?;
    Ok(())
}

/// Checks that a ZIP file (CBZ) exists and contains at least one entry.
#[allow(dead_code)]
pub async fn assert_valid_zip_file(path: &Path) {
    assert!(path.exists(), "Output ZIP file does not exist: {:?}", path);
    assert!(path.is_file(), "Output ZIP path is not a file: {:?}", path);

    let file = fs::File::open(path).await.unwrap();
    let file_std = file.into_std().await;
    let zip = zip::ZipArchive::new(file_std).unwrap();
    assert!(zip.len() > 0, "Output ZIP file is empty: {:?}", path);
}

/// Returns the member names of a ZIP archive in archive order.
#[allow(dead_code)]
pub async fn zip_member_names(path: &Path) -> Vec<String> {
    let file = fs::File::open(path).await.unwrap();
    let file_std = file.into_std().await;
    let zip = zip::ZipArchive::new(file_std).unwrap();
    zip.file_names().map(str::to_string).collect()
}

/// Returns the sorted file names directly inside a directory.
#[allow(dead_code)]
pub async fn dir_file_names(dir: &Path) -> Vec<String> {
    let mut names = Vec::new();
    let mut entries = fs::read_dir(dir).await.unwrap();
    while let Some(entry) = entries.next_entry().await.unwrap() {
        names.push(entry.file_name().to_string_lossy().into_owned());
    }
    names.sort();
    names
}
