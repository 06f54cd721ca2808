//! Custom error types and result handling for Bunkatsu operations.
//!
//! This module defines the error handling system used throughout Bunkatsu.
//! All operations return a [`Result<T>`] which is a type alias for `std::result::Result<T, Error>`.
//!
use std::path::PathBuf;

/// Type alias for Results with Bunkatsu errors.
pub type Result<T> = std::result::Result<T, Error>;

/// Comprehensive error type for all Bunkatsu operations.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// I/O errors from the standard library
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// Image decoding and encoding errors
    #[error(transparent)]
    Image(#[from] image::ImageError),
    /// ZIP file operation errors
    #[error(transparent)]
    Zip(#[from] zip::result::ZipError),
    /// Async task join errors
    #[error(transparent)]
    Join(#[from] tokio::task::JoinError),
    #[error(transparent)]
    Semaphore(#[from] tokio::sync::AcquireError),
    #[error(transparent)]
    ConfigBuilder(#[from] crate::bunkatsu::BunkatsuConfigBuilderError),
    /// Error for paths whose extension maps to no registered archive format
    #[error("Unsupported archive format: '{0:?}'")]
    UnsupportedFormat(PathBuf),
    /// Error while unpacking an archive (corrupt source, unwritable destination)
    #[error("Failed to extract '{archive:?}': {detail}")]
    Extraction { archive: PathBuf, detail: String },
    /// Error while creating an archive
    #[error("Failed to compress into '{archive:?}': {detail}")]
    Compression { archive: PathBuf, detail: String },
    /// Error for a single image member that could not be decoded
    #[error("Failed to decode image '{member}': {detail}")]
    Decode { member: String, detail: String },
    /// Error for a required external command-line tool that is not installed.
    /// Carries the tool name so callers can match on it.
    #[error("The '{0}' command-line tool is not installed or not in PATH")]
    ToolNotFound(String),
    /// Error for invalid run configuration, rejected before any work starts
    #[error("Invalid configuration: {0}")]
    Configuration(String),
    /// Error for invalid file or directory paths
    #[error("The given path '{0:?}' is invalid: {1}")]
    InvalidPath(PathBuf, String),
    /// Error for resources that couldn't be found (e.g., source directory, image file)
    #[error("Not found: {0}")]
    NotFound(String),
    /// Other errors that don't fit into specific categories
    #[error("Other error: {0}")]
    Other(String),
}

// Basic From<String> conversion for convenience
impl From<String> for Error {
    fn from(error: String) -> Self {
        Error::Other(error)
    }
}

impl From<&str> for Error {
    fn from(error: &str) -> Self {
        Error::Other(error.to_string())
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for Error {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.to_string().as_ref())
    }
}
