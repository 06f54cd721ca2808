//! Plain directories treated as already-extracted archives.
//!
//! "Extracting" a directory copies its tree into the destination;
//! "compressing" into one copies the source tree over. Page listing is flat:
//! only files directly inside the directory count, subdirectories are the
//! concern of whoever enumerated this directory as a chapter.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::task::spawn_blocking;
use walkdir::WalkDir;

use crate::archive::{
    ArchiveHandler, ArchiveKind, MemberFilter, compression_error, decode_image,
    ordered_image_names,
};
use crate::error::{Error, Result};
use crate::types::PageImage;

/// Handler for bare chapter directories.
pub struct DirHandler {
    path: PathBuf,
}

impl DirHandler {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

/// Recursively copies `source` into `destination`, creating directories as
/// needed and replacing files that already exist.
fn copy_tree(source: &Path, destination: &Path) -> Result<()> {
    for entry in WalkDir::new(source).sort_by_file_name() {
        let entry = entry.map_err(|e| Error::Io(e.into()))?;
        let relative = entry
            .path()
            .strip_prefix(source)
            .map_err(|e| Error::InvalidPath(entry.path().to_path_buf(), e.to_string()))?;
        let target = destination.join(relative);

        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target)?;
        } else {
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

#[async_trait]
impl ArchiveHandler for DirHandler {
    fn kind(&self) -> ArchiveKind {
        ArchiveKind::Directory
    }

    fn path(&self) -> &Path {
        &self.path
    }

    async fn extract(&self, destination: &Path) -> Result<()> {
        let source = self.path.clone();
        let destination = destination.to_path_buf();

        spawn_blocking(move || copy_tree(&source, &destination)).await?
    }

    async fn compress(&self, source_dir: &Path, overwrite: bool) -> Result<()> {
        let target = self.path.clone();
        let source_dir = source_dir.to_path_buf();

        spawn_blocking(move || {
            if target.exists() && !overwrite {
                return Err(compression_error(
                    &target,
                    "destination already exists (set overwrite to replace it)",
                ));
            }
            copy_tree(&source_dir, &target)
        })
        .await?
    }

    async fn list_images(&self, filter: Option<MemberFilter>) -> Result<Vec<PageImage>> {
        let dir_path = self.path.clone();

        spawn_blocking(move || {
            let mut names = Vec::new();
            for entry in std::fs::read_dir(&dir_path)? {
                let entry = entry?;
                if entry.file_type()?.is_file() {
                    names.push(entry.file_name().to_string_lossy().into_owned());
                }
            }

            let selected = ordered_image_names(names, filter.as_ref());

            let mut pages = Vec::with_capacity(selected.len());
            for member in selected {
                let bytes = std::fs::read(dir_path.join(&member))?;
                pages.push(decode_image(&member, &bytes)?);
            }
            Ok(pages)
        })
        .await?
    }
}
