//! File and stream plumbing shared by the paired-FASTQ reader and SAM writer
//! stages of the pipeline.
//!
//! This mirrors the teacher's `io` layer (gzip-or-plain readers/writers picked
//! by file extension, a dedicated decode thread for large gzipped inputs) but
//! drops the general-purpose `InputOptions`/`OutputOptions` CLI-argument
//! builder, since the mapping pipeline only ever opens exactly one or two
//! FASTQ inputs and one SAM output.

pub(crate) mod readers;
pub(crate) mod writers;

use std::{error::Error, path::Path};
use zoe::data::err::GetCode;

pub(crate) use readers::{GzipReaderPiped, ReadFileZipPipe, RecordReaders};
pub(crate) use writers::WriteFileZipStdout;

/// Returns true if `path` has a `.gz` extension.
#[inline]
pub(crate) fn is_gz(path: impl AsRef<Path>) -> bool {
    path.as_ref().extension().is_some_and(|ext| ext == "gz")
}

/// A type constructible from a file path, choosing its representation (plain,
/// gzip, ...) based on the path's extension.
pub(crate) trait FromFilename: Sized {
    /// Opens `path`, selecting a concrete representation based on its extension.
    ///
    /// ## Errors
    ///
    /// Any IO error while opening `path` is propagated.
    fn from_filename<P: AsRef<Path>>(path: P) -> std::io::Result<Self>;

    /// As [`from_filename`], but falls back to [`Default::default`] when `path`
    /// is `None`.
    ///
    /// ## Errors
    ///
    /// Any IO error while opening `path` is propagated.
    ///
    /// [`from_filename`]: FromFilename::from_filename
    fn from_optional_filename<P: AsRef<Path>>(path: Option<P>) -> std::io::Result<Self>
    where
        Self: Default, {
        match path {
            Some(path) => Self::from_filename(path),
            None => Ok(Self::default()),
        }
    }
}

impl FromFilename for ReadFileZipPipe {
    #[inline]
    fn from_filename<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        ReadFileZipPipe::open(path)
    }
}

/// A wrapper around [`std::io::Error`] used to indicate whether an error
/// occurred with the first file or second file specified.
#[non_exhaustive]
#[derive(Debug)]
pub(crate) enum OpenFastqError {
    File1(std::io::Error),
    File2(std::io::Error),
}

impl std::fmt::Display for OpenFastqError {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            OpenFastqError::File1(error) => write!(f, "{error}"),
            OpenFastqError::File2(error) => write!(f, "{error}"),
        }
    }
}

impl Error for OpenFastqError {}
impl GetCode for OpenFastqError {}

pub(crate) trait MapFailedOpenExt<T> {
    fn map_failed_open(self, path1: &Path, path2: Option<&Path>) -> std::io::Result<T>;
}

impl<T> MapFailedOpenExt<T> for Result<T, OpenFastqError> {
    fn map_failed_open(self, path1: &Path, path2: Option<&Path>) -> std::io::Result<T> {
        self.map_err(|e| match e {
            OpenFastqError::File1(error) => {
                std::io::Error::other(format!("Failed to read the data in file {path1:#?} due to the error:\n{error}"))
            }
            OpenFastqError::File2(error) => std::io::Error::other(format!(
                "Failed to read the data in file {path:#?} due to the error:\n{error}",
                path = path2.unwrap()
            )),
        })
    }
}

pub(crate) trait MapFailedWriteExt<T> {
    fn map_failed_write(self, path: &Path) -> std::io::Result<T>;
}

impl<T> MapFailedWriteExt<T> for std::io::Result<T> {
    fn map_failed_write(self, path: &Path) -> std::io::Result<T> {
        self.map_err(|e| std::io::Error::other(format!("Failed to open {path:#?} for writing due to the error:\n{e}")))
    }
}

/// Opens a single FASTQ file (plain or gzip, eagerly decoded on a dedicated
/// thread for gzip inputs), matching [`ReadFileZipPipe`]'s dispatch rule.
///
/// ## Errors
///
/// `path` must exist and contain readable data; if gzipped, pipe creation must
/// succeed.
#[inline]
pub(crate) fn open_fastq_file(path: impl AsRef<Path>) -> std::io::Result<ReadFileZipPipe> {
    ReadFileZipPipe::open(path)
}

/// Opens one or two FASTQ files via [`open_fastq_file`].
///
/// ## Errors
///
/// Both paths (when `path2` is `Some`) must exist and be readable.
#[inline]
pub(crate) fn open_fastq_files(
    path1: impl AsRef<Path>, path2: Option<impl AsRef<Path>>,
) -> Result<RecordReaders<ReadFileZipPipe>, OpenFastqError> {
    let reader1 = open_fastq_file(&path1).map_err(OpenFastqError::File1)?;
    let reader2 = path2.map(open_fastq_file).transpose().map_err(OpenFastqError::File2)?;
    Ok(RecordReaders { reader1, reader2 })
}

/// Creates a [`WriteFileZipStdout`], using `path` to determine whether a
/// regular file, zipped file, or stdout should be used.
///
/// ## Errors
///
/// Creation of `path` must be successful, if a path is specified.
#[inline]
pub(crate) fn create_writer(path: Option<impl AsRef<Path>>) -> std::io::Result<WriteFileZipStdout> {
    WriteFileZipStdout::from_optional_filename(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gz_extension_is_detected() {
        assert!(is_gz("reads.fastq.gz"));
        assert!(!is_gz("reads.fastq"));
    }
}
