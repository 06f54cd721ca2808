//! 7z-backed archives (`.7z`, `.cb7`).

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use sevenz_rust::{Password, SevenZReader};
use tokio::task::spawn_blocking;

use crate::archive::{
    ArchiveHandler, ArchiveKind, MemberFilter, compression_error, decode_image, extraction_error,
    ordered_image_names, prepare_destination,
};
use crate::error::Result;
use crate::types::PageImage;

/// Handler for 7z-backed comic archives.
pub struct Cb7Handler {
    path: PathBuf,
}

impl Cb7Handler {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ArchiveHandler for Cb7Handler {
    fn kind(&self) -> ArchiveKind {
        ArchiveKind::SevenZ
    }

    fn path(&self) -> &Path {
        &self.path
    }

    async fn extract(&self, destination: &Path) -> Result<()> {
        let archive_path = self.path.clone();
        let destination = destination.to_path_buf();

        spawn_blocking(move || {
            sevenz_rust::decompress_file(&archive_path, &destination)
                .map_err(|e| extraction_error(&archive_path, e))
        })
        .await?
    }

    async fn compress(&self, source_dir: &Path, overwrite: bool) -> Result<()> {
        let archive_path = self.path.clone();
        let source_dir = source_dir.to_path_buf();

        spawn_blocking(move || {
            prepare_destination(&archive_path, overwrite)?;
            sevenz_rust::compress_to_path(&source_dir, &archive_path)
                .map_err(|e| compression_error(&archive_path, e))
        })
        .await?
    }

    async fn list_images(&self, filter: Option<MemberFilter>) -> Result<Vec<PageImage>> {
        let archive_path = self.path.clone();

        spawn_blocking(move || {
            let mut reader = SevenZReader::open(&archive_path, Password::empty())
                .map_err(|e| extraction_error(&archive_path, e))?;

            let names: Vec<String> = reader
                .archive()
                .files
                .iter()
                .filter(|entry| !entry.is_directory())
                .map(|entry| entry.name().to_string())
                .collect();
            let selected = ordered_image_names(names, filter.as_ref());
            let wanted: Vec<&str> = selected.iter().map(String::as_str).collect();

            // Entries decode in archive order; wanted members are buffered
            // and reassembled in reading order below.
            let mut contents: HashMap<String, Vec<u8>> = HashMap::new();
            reader
                .for_each_entries(|entry, reader| {
                    if !entry.is_directory() && wanted.contains(&entry.name()) {
                        let mut bytes = Vec::with_capacity(entry.size() as usize);
                        reader.read_to_end(&mut bytes)?;
                        contents.insert(entry.name().to_string(), bytes);
                    }
                    Ok(true)
                })
                .map_err(|e| extraction_error(&archive_path, e))?;

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
