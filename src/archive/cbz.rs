//! ZIP-backed archives (`.zip`, `.cbz`).

use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use memmap2::MmapOptions;
use tokio::task::spawn_blocking;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::archive::{
    ArchiveHandler, ArchiveKind, MemberFilter, compression_error, decode_image, extraction_error,
    ordered_image_names, prepare_destination, walk_relative,
};
use crate::error::Result;
use crate::types::PageImage;

/// Handler for ZIP-backed comic archives.
pub struct CbzHandler {
    path: PathBuf,
}

impl CbzHandler {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ArchiveHandler for CbzHandler {
    fn kind(&self) -> ArchiveKind {
        ArchiveKind::Zip
    }

    fn path(&self) -> &Path {
        &self.path
    }

    async fn extract(&self, destination: &Path) -> Result<()> {
        let archive_path = self.path.clone();
        let destination = destination.to_path_buf();

        spawn_blocking(move || {
            let file = File::open(&archive_path).map_err(|e| extraction_error(&archive_path, e))?;
            let mut archive =
                ZipArchive::new(file).map_err(|e| extraction_error(&archive_path, e))?;
            archive
                .extract(&destination)
                .map_err(|e| extraction_error(&archive_path, e))
        })
        .await?
    }

    async fn compress(&self, source_dir: &Path, overwrite: bool) -> Result<()> {
        let archive_path = self.path.clone();
        let source_dir = source_dir.to_path_buf();

        spawn_blocking(move || {
            prepare_destination(&archive_path, overwrite)?;

            let options = SimpleFileOptions::default()
                .compression_method(CompressionMethod::Deflated)
                .unix_permissions(0o755);

            let file = File::create(&archive_path).map_err(|e| compression_error(&archive_path, e))?;
            let mut zip = ZipWriter::new(file);

            for (path, member) in walk_relative(&source_dir)? {
                let file = File::open(&path).map_err(|e| compression_error(&archive_path, e))?;
                let len = file
                    .metadata()
                    .map_err(|e| compression_error(&archive_path, e))?
                    .len();

                zip.start_file(member, options)
                    .map_err(|e| compression_error(&archive_path, e))?;
                if len == 0 {
                    // An empty file cannot be memory-mapped; the entry
                    // header alone is the whole member.
                    continue;
                }

                let mmap = unsafe { MmapOptions::new().map(&file) }
                    .map_err(|e| compression_error(&archive_path, e))?;
                zip.write_all(&mmap[..])
                    .map_err(|e| compression_error(&archive_path, e))?;
            }

            zip.finish()
                .map_err(|e| compression_error(&archive_path, e))?;
            Ok(())
        })
        .await?
    }

    async fn list_images(&self, filter: Option<MemberFilter>) -> Result<Vec<PageImage>> {
        let archive_path = self.path.clone();

        spawn_blocking(move || {
            let file = File::open(&archive_path).map_err(|e| extraction_error(&archive_path, e))?;
            let mut archive =
                ZipArchive::new(file).map_err(|e| extraction_error(&archive_path, e))?;

            let names: Vec<String> = archive.file_names().map(str::to_string).collect();
            let selected = ordered_image_names(names, filter.as_ref());

            let mut pages = Vec::with_capacity(selected.len());
            for member in selected {
                let mut entry = archive
                    .by_name(&member)
                    .map_err(|e| extraction_error(&archive_path, e))?;
                let mut bytes = Vec::with_capacity(entry.size() as usize);
                entry
                    .read_to_end(&mut bytes)
                    .map_err(|e| extraction_error(&archive_path, e))?;
                pages.push(decode_image(&member, &bytes)?);
            }
            Ok(pages)
        })
        .await?
    }
}
