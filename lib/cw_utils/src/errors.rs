//! Utilities errors definitions.

use std::io;
use thiserror::Error;
use zip::result::ZipError;

/// An alias for result that can be a [`UtilsError`].
pub type UtilsResult<T> = Result<T, UtilsError>;

/// The utilities error type.
#[derive(Debug, Error)]
pub enum UtilsError {
    /// Error that can be returned when doing [std::io](I/O) operations.
    #[error("IO error: {0}")]
    IO(#[from] io::Error),

    /// Error that can be returned when reading a jar (zip) archive.
    #[error("zip error: {0}")]
    Zip(#[from] ZipError),

    /// Error that can be returned when failing to open a file as a jar archive.
    #[error("Unable to open '{0}' as jar archive")]
    Open(String),

    /// Error that can be returned when a shared archive lock was poisoned by a panicking reader.
    #[error("poisoned lock on '{0}'")]
    Lock(String),
}
