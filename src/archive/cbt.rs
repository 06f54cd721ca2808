//! Tar-backed archives (`.tar`, `.cbt`).

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::task::spawn_blocking;

use crate::archive::{
    ArchiveHandler, ArchiveKind, MemberFilter, compression_error, decode_image, extraction_error,
    is_image_name, ordered_image_names, prepare_destination, walk_relative,
};
use crate::error::Result;
use crate::types::PageImage;

/// Handler for tar-backed comic archives.
pub struct CbtHandler {
    path: PathBuf,
}

impl CbtHandler {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ArchiveHandler for CbtHandler {
    fn kind(&self) -> ArchiveKind {
        ArchiveKind::Tar
    }

    fn path(&self) -> &Path {
        &self.path
    }

    async fn extract(&self, destination: &Path) -> Result<()> {
        let archive_path = self.path.clone();
        let destination = destination.to_path_buf();

        spawn_blocking(move || {
            let file = File::open(&archive_path).map_err(|e| extraction_error(&archive_path, e))?;
            let mut archive = tar::Archive::new(file);
            archive
                .unpack(&destination)
                .map_err(|e| extraction_error(&archive_path, e))
        })
        .await?
    }

    async fn compress(&self, source_dir: &Path, overwrite: bool) -> Result<()> {
        let archive_path = self.path.clone();
        let source_dir = source_dir.to_path_buf();

        spawn_blocking(move || {
            prepare_destination(&archive_path, overwrite)?;

            let file = File::create(&archive_path).map_err(|e| compression_error(&archive_path, e))?;
            let mut builder = tar::Builder::new(file);

            for (path, member) in walk_relative(&source_dir)? {
                builder
                    .append_path_with_name(&path, &member)
                    .map_err(|e| compression_error(&archive_path, e))?;
            }

            builder
                .into_inner()
                .map_err(|e| compression_error(&archive_path, e))?;
            Ok(())
        })
        .await?
    }

    async fn list_images(&self, filter: Option<MemberFilter>) -> Result<Vec<PageImage>> {
        let archive_path = self.path.clone();

        spawn_blocking(move || {
            // Tar is a stream format, so image members are buffered in one
            // pass and reassembled into reading order afterwards.
            let file = File::open(&archive_path).map_err(|e| extraction_error(&archive_path, e))?;
            let mut archive = tar::Archive::new(file);

            let mut contents: HashMap<String, Vec<u8>> = HashMap::new();
            for entry in archive
                .entries()
                .map_err(|e| extraction_error(&archive_path, e))?
            {
                let mut entry = entry.map_err(|e| extraction_error(&archive_path, e))?;
                if !entry.header().entry_type().is_file() {
                    continue;
                }

                let member = entry
                    .path()
                    .map_err(|e| extraction_error(&archive_path, e))?
                    .to_string_lossy()
                    .into_owned();
                if !is_image_name(&member) {
                    continue;
                }

                let mut bytes = Vec::with_capacity(entry.size() as usize);
                entry
                    .read_to_end(&mut bytes)
                    .map_err(|e| extraction_error(&archive_path, e))?;
                contents.insert(member, bytes);
            }

            let names: Vec<String> = contents.keys().cloned().collect();
            let selected = ordered_image_names(names, filter.as_ref());

            let mut pages = Vec::with_capacity(selected.len());
            for member in selected {
                let bytes = contents.remove(&member).ok_or_else(|| {
                    extraction_error(&archive_path, format!("member '{member}' was not read"))
                })?;
                pages.push(decode_image(&member, &bytes)?);
            }
            Ok(pages)
        })
        .await?
    }
}
