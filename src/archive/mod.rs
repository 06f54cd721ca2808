//! Archive format abstraction and registry.
//!
//! Every supported container format implements [`ArchiveHandler`], a single
//! polymorphic interface over extraction, compression and page enumeration,
//! so the rest of the crate never special-cases a format. The registry maps
//! file extensions (and bare directories) to handlers:
//!
//! | Extensions        | Variant     | Module  |
//! |-------------------|-------------|---------|
//! | `.zip` / `.cbz`   | `Zip`       | [`cbz`] |
//! | `.rar` / `.cbr`   | `Rar`       | [`cbr`] |
//! | `.7z` / `.cb7`    | `SevenZ`    | [`cb7`] |
//! | `.tar` / `.cbt`   | `Tar`       | [`cbt`] |
//! | (directory)       | `Directory` | [`dir`] |
//!
//! Aliased extensions resolve to the same variant, which is how a
//! `.cbz` -> `.zip` conversion is detected as a no-op.

use std::collections::HashMap;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

use async_trait::async_trait;
use lazy_static::lazy_static;
use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::sort::NaturalSortKey;
use crate::types::PageImage;

pub mod cb7;
pub mod cbr;
pub mod cbt;
pub mod cbz;
pub mod dir;

/// Raster extensions recognized as pages, lowercase without the dot.
pub const IMAGE_EXTENSIONS: [&str; 11] = [
    "jpg", "jpeg", "png", "tiff", "tif", "bmp", "webp", "heif", "heic", "jxl", "avif",
];

/// The container format variants the registry knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ArchiveKind {
    Zip,
    Rar,
    SevenZ,
    Tar,
    Directory,
}

impl ArchiveKind {
    /// Canonical comic-book extension for this kind; `None` for directories.
    pub fn extension(&self) -> Option<&'static str> {
        match self {
            ArchiveKind::Zip => Some("cbz"),
            ArchiveKind::Rar => Some("cbr"),
            ArchiveKind::SevenZ => Some("cb7"),
            ArchiveKind::Tar => Some("cbt"),
            ArchiveKind::Directory => None,
        }
    }
}

lazy_static! {
    /// Static extension table (lowercase, no dot). Built once; there is no
    /// runtime registration.
    pub static ref EXTENSION_TABLE: HashMap<&'static str, ArchiveKind> = {
        let mut table = HashMap::new();
        table.insert("zip", ArchiveKind::Zip);
        table.insert("cbz", ArchiveKind::Zip);
        table.insert("rar", ArchiveKind::Rar);
        table.insert("cbr", ArchiveKind::Rar);
        table.insert("7z", ArchiveKind::SevenZ);
        table.insert("cb7", ArchiveKind::SevenZ);
        table.insert("tar", ArchiveKind::Tar);
        table.insert("cbt", ArchiveKind::Tar);
        table
    };
}

/// Shared predicate over member names, applied after natural ordering.
/// A counting predicate therefore selects a reading-order prefix.
pub type MemberFilter = Arc<dyn Fn(&str) -> bool + Send + Sync + 'static>;

/// Builds a filter that passes only the first `limit` names offered to it.
pub fn sample_filter(limit: usize) -> MemberFilter {
    let seen = AtomicUsize::new(0);
    Arc::new(move |_| seen.fetch_add(1, AtomicOrdering::Relaxed) < limit)
}

/// Common interface over every supported container format.
///
/// Handlers are cheap, stateless wrappers around a path; all blocking codec
/// work runs on the blocking thread pool internally, so the async methods are
/// safe to call from any runtime context.
#[async_trait]
pub trait ArchiveHandler: Send + Sync {
    /// Format variant this handler implements.
    fn kind(&self) -> ArchiveKind;

    /// The archive (or directory) path this handler was resolved for.
    fn path(&self) -> &Path;

    /// Unpacks every member into `destination`, preserving relative paths.
    async fn extract(&self, destination: &Path) -> Result<()>;

    /// Packs every file under `source_dir` (recursively, relative member
    /// names) into a new archive at the handler's own path. Refuses to
    /// replace an existing archive unless `overwrite` is set.
    async fn compress(&self, source_dir: &Path, overwrite: bool) -> Result<()>;

    /// Decodes every member with a recognized raster extension, ordered by
    /// natural sort of the member name. The optional `filter` runs after
    /// ordering. A member that fails to decode fails the whole call with
    /// [`Error::Decode`]; skipping it silently would renumber the pages.
    async fn list_images(&self, filter: Option<MemberFilter>) -> Result<Vec<PageImage>>;
}

impl std::fmt::Debug for dyn ArchiveHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArchiveHandler")
            .field("kind", &self.kind())
            .field("path", &self.path())
            .finish()
    }
}

/// Resolves a path to the handler responsible for its format.
///
/// Directories resolve to the directory handler; files resolve through the
/// extension table (case-insensitive). Anything else is
/// [`Error::UnsupportedFormat`].
pub fn resolve(path: &Path) -> Result<Box<dyn ArchiveHandler>> {
    match kind_of_path(path) {
        Some(kind) => Ok(handler_for(kind, path)),
        None => Err(Error::UnsupportedFormat(path.to_path_buf())),
    }
}

/// Constructs a handler of a known kind for `path`. The path does not have to
/// exist yet; compression targets are resolved this way.
pub fn handler_for(kind: ArchiveKind, path: &Path) -> Box<dyn ArchiveHandler> {
    let path = path.to_path_buf();
    match kind {
        ArchiveKind::Zip => Box::new(cbz::CbzHandler::new(path)),
        ArchiveKind::Rar => Box::new(cbr::CbrHandler::new(path)),
        ArchiveKind::SevenZ => Box::new(cb7::Cb7Handler::new(path)),
        ArchiveKind::Tar => Box::new(cbt::CbtHandler::new(path)),
        ArchiveKind::Directory => Box::new(dir::DirHandler::new(path)),
    }
}

/// Looks up the kind registered for an extension. Case-insensitive; a leading
/// dot is tolerated.
pub fn kind_for_extension(ext: &str) -> Option<ArchiveKind> {
    let ext = ext.trim_start_matches('.').to_ascii_lowercase();
    EXTENSION_TABLE.get(ext.as_str()).copied()
}

/// Determines the kind `path` would resolve to.
pub fn kind_of_path(path: &Path) -> Option<ArchiveKind> {
    if path.is_dir() {
        return Some(ArchiveKind::Directory);
    }
    path.extension()
        .and_then(OsStr::to_str)
        .and_then(kind_for_extension)
}

/// True when `path` is a directory or carries a registered archive extension.
pub fn is_supported(path: &Path) -> bool {
    kind_of_path(path).is_some()
}

/// True when `name` has a recognized raster extension (case-insensitive).
pub fn is_image_name(name: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(OsStr::to_str)
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Filters member names down to recognized images in reading order, applying
/// the optional member filter after the sort.
pub(crate) fn ordered_image_names(names: Vec<String>, filter: Option<&MemberFilter>) -> Vec<String> {
    let mut names: Vec<String> = names.into_iter().filter(|n| is_image_name(n)).collect();
    names.sort_by_cached_key(|n| NaturalSortKey::new(n));

    match filter {
        Some(filter) => {
            let keep = filter.as_ref();
            names.retain(|n| keep(n.as_str()));
            names
        }
        None => names,
    }
}

/// Decodes one member's bytes, tagging failures with the member name.
pub(crate) fn decode_image(member: &str, bytes: &[u8]) -> Result<PageImage> {
    let image = image::load_from_memory(bytes).map_err(|e| Error::Decode {
        member: member.to_string(),
        detail: e.to_string(),
    })?;
    Ok(PageImage::new(image, member))
}

/// Collects every file under `root` (name-sorted, depth-first) together with
/// its forward-slash relative member name.
pub(crate) fn walk_relative(root: &Path) -> Result<Vec<(PathBuf, String)>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(|e| Error::Io(e.into()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(root)
            .map_err(|e| Error::InvalidPath(entry.path().to_path_buf(), e.to_string()))?;
        let member = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        files.push((entry.path().to_path_buf(), member));
    }
    Ok(files)
}

/// Prepares an archive destination: refuses to clobber an existing file
/// unless `overwrite` is set, and makes sure the parent directory exists.
pub(crate) fn prepare_destination(path: &Path, overwrite: bool) -> Result<()> {
    if path.exists() {
        if !overwrite {
            return Err(compression_error(
                path,
                "destination already exists (set overwrite to replace it)",
            ));
        }
        std::fs::remove_file(path)?;
    }
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

pub(crate) fn extraction_error(archive: &Path, detail: impl ToString) -> Error {
    Error::Extraction {
        archive: archive.to_path_buf(),
        detail: detail.to_string(),
    }
}

pub(crate) fn compression_error(archive: &Path, detail: impl ToString) -> Error {
    Error::Compression {
        archive: archive.to_path_buf(),
        detail: detail.to_string(),
    }
}
