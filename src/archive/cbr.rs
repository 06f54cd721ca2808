//! RAR-backed archives (`.rar`, `.cbr`).
//!
//! Reading goes through the `unrar` bindings. Compression is the odd one out:
//! RAR is a proprietary format with no free encoder, so creating an archive
//! shells out to the external `rar` tool and fails with
//! [`Error::ToolNotFound`](crate::error::Error::ToolNotFound) when it is not
//! installed.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Command;

use async_trait::async_trait;
use tokio::task::spawn_blocking;
use unrar::Archive;

use crate::archive::{
    ArchiveHandler, ArchiveKind, MemberFilter, compression_error, decode_image, extraction_error,
    ordered_image_names, prepare_destination,
};
use crate::error::{Error, Result};
use crate::types::PageImage;

/// Handler for RAR-backed comic archives.
pub struct CbrHandler {
    path: PathBuf,
}

impl CbrHandler {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ArchiveHandler for CbrHandler {
    fn kind(&self) -> ArchiveKind {
        ArchiveKind::Rar
    }

    fn path(&self) -> &Path {
        &self.path
    }

    async fn extract(&self, destination: &Path) -> Result<()> {
        let archive_path = self.path.clone();
        let destination = destination.to_path_buf();

        spawn_blocking(move || {
            let mut archive = Archive::new(&archive_path)
                .open_for_processing()
                .map_err(|e| extraction_error(&archive_path, e))?;

            while let Some(header) = archive
                .read_header()
                .map_err(|e| extraction_error(&archive_path, e))?
            {
                archive = if header.entry().is_file() {
                    header
                        .extract_with_base(&destination)
                        .map_err(|e| extraction_error(&archive_path, e))?
                } else {
                    header
                        .skip()
                        .map_err(|e| extraction_error(&archive_path, e))?
                };
            }
            Ok(())
        })
        .await?
    }

    async fn compress(&self, source_dir: &Path, overwrite: bool) -> Result<()> {
        let archive_path = self.path.clone();
        let source_dir = source_dir.to_path_buf();

        spawn_blocking(move || {
            let rar =
                which::which("rar").map_err(|_| Error::ToolNotFound("rar".to_string()))?;

            prepare_destination(&archive_path, overwrite)?;
            // The tool runs from inside `source_dir`, so the destination must
            // stay valid after the directory change.
            let destination = std::path::absolute(&archive_path)?;

            // `a -idq -ep1`: add quietly, member names relative to the base
            // directory.
            let mut command = Command::new(rar);
            command
                .arg("a")
                .arg("-idq")
                .arg("-ep1")
                .arg(&destination)
                .current_dir(&source_dir);
            for entry in std::fs::read_dir(&source_dir)? {
                command.arg(entry?.file_name());
            }

            let output = command
                .output()
                .map_err(|e| compression_error(&archive_path, e))?;
            if !output.status.success() {
                return Err(compression_error(
                    &archive_path,
                    String::from_utf8_lossy(&output.stderr).trim(),
                ));
            }
            Ok(())
        })
        .await?
    }

    async fn list_images(&self, filter: Option<MemberFilter>) -> Result<Vec<PageImage>> {
        let archive_path = self.path.clone();

        spawn_blocking(move || {
            // Pass 1: member names only.
            let listing = Archive::new(&archive_path)
                .open_for_listing()
                .map_err(|e| extraction_error(&archive_path, e))?;

            let mut names = Vec::new();
            for entry in listing {
                let entry = entry.map_err(|e| extraction_error(&archive_path, e))?;
                if entry.is_file() {
                    names.push(entry.filename.to_string_lossy().into_owned());
                }
            }

            let selected = ordered_image_names(names, filter.as_ref());
            let wanted: Vec<&str> = selected.iter().map(String::as_str).collect();

            // Pass 2: read only the selected members, skip the rest.
            let mut contents: HashMap<String, Vec<u8>> = HashMap::new();
            let mut archive = Archive::new(&archive_path)
                .open_for_processing()
                .map_err(|e| extraction_error(&archive_path, e))?;

            while let Some(header) = archive
                .read_header()
                .map_err(|e| extraction_error(&archive_path, e))?
            {
                let name = header.entry().filename.to_string_lossy().into_owned();
                archive = if wanted.contains(&name.as_str()) {
                    let (bytes, rest) = header
                        .read()
                        .map_err(|e| extraction_error(&archive_path, e))?;
                    contents.insert(name, bytes);
                    rest
                } else {
                    header
                        .skip()
                        .map_err(|e| extraction_error(&archive_path, e))?
                };
            }

            let mut pages = Vec::with_capacity(selected.len());
            for member in selected {
                let bytes = contents.remove(&member).ok_or_else(|| {
                    extraction_error(
                        &archive_path,
                        format!("member '{member}' vanished between listing and read"),
                    )
                })?;
                pages.push(decode_image(&member, &bytes)?);
            }
            Ok(pages)
        })
        .await?
    }
}
