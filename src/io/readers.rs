use crate::io::is_gz;
use flate2::read::MultiGzDecoder;
use std::{
    fs::File,
    io::{PipeReader, Read},
    path::Path,
    thread::{self, JoinHandle},
};
use zoe::{data::err::ResultWithErrorContext, define_whichever};

/// Eagerly decodes a [gzip](https://www.rfc-editor.org/rfc/rfc1952#page-5)
/// stream on a dedicated thread, handing the plain bytes back through an
/// anonymous pipe.
///
/// Used for the FASTQ inputs to the mapping pipeline: decoding happens off
/// the thread driving the pipeline's read stage, so a gzipped input doesn't
/// serialize decompression behind mapping/aligning.
///
/// ## Limitations
///
/// Designed for the file being read in its entirety. Pipe failures surface
/// only at EOF; dropping this reader early may leave the thread running.
pub struct GzipReaderPiped {
    reader: PipeReader,
    thread: Option<JoinHandle<std::io::Result<()>>>,
}

impl GzipReaderPiped {
    /// Creates a new [`GzipReaderPiped`] from a type implementing [`Read`].
    ///
    /// `readable` should contain
    /// [gzip](https://www.rfc-editor.org/rfc/rfc1952#page-5) encoded data.
    ///
    /// ## Errors
    ///
    /// Any IO errors occurring when forming the pipe are propagated with
    /// context. Errors occurring during decoding appear when reading from the
    /// [`GzipReaderPiped`].
    pub fn from_readable<R>(readable: R) -> std::io::Result<Self>
    where
        R: Read + Send + 'static, {
        let (reader, mut writer) =
            std::io::pipe().with_context("failed to initialize the pipe for decoding gzipped FASTQ input")?;

        let mut decoder = MultiGzDecoder::new(readable);

        let thread = thread::spawn(move || -> std::io::Result<_> {
            // May see a broken-pipe error if the reader is dropped early; the
            // thread is then never joined either.
            std::io::copy(&mut decoder, &mut writer)?;
            Ok(())
        });

        Ok(Self {
            reader,
            thread: Some(thread),
        })
    }

    /// Opens a new [`GzipReaderPiped`] from a path.
    ///
    /// ## Errors
    ///
    /// Any IO errors occurring when opening the file or forming the pipe are
    /// propagated.
    #[inline]
    pub fn open<P>(path: P) -> std::io::Result<Self>
    where
        P: AsRef<Path>, {
        File::open(&path).and_then(Self::from_readable)
    }
}

impl Read for GzipReaderPiped {
    #[inline]
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let bytes_read = self.reader.read(buf)?;

        if bytes_read == 0
            && !buf.is_empty()
            && let Some(thread) = std::mem::take(&mut self.thread)
        {
            thread.join().unwrap()?;
        }

        Ok(bytes_read)
    }
}

define_whichever! {
    /// A FASTQ input source: a plain file or an eagerly-decoded gzip stream,
    /// chosen by [`ReadFileZipPipe::open`] from the path's extension.
    pub(crate) enum ReadFileZipPipe {
        /// A regular uncompressed file.
        File(File),
        /// A gzip compressed file, decoded eagerly on a dedicated thread.
        Zipped(GzipReaderPiped),
    }

    impl Read for ReadFileZipPipe {}
}

impl ReadFileZipPipe {
    /// Opens a [`ReadFileZipPipe`] from a path, choosing the gzip variant if
    /// the path ends in `.gz`.
    ///
    /// ## Errors
    ///
    /// Any IO errors when opening the file or forming the decode pipe are
    /// propagated.
    pub fn open(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let file = File::open(&path)?;

        if is_gz(&path) {
            Ok(ReadFileZipPipe::Zipped(GzipReaderPiped::from_readable(file)?))
        } else {
            Ok(ReadFileZipPipe::File(file))
        }
    }
}

/// Readers for one or both mates of a read pair.
pub struct RecordReaders<R> {
    /// The reader for read 1 (or the single-end input).
    pub reader1: R,
    /// The reader for read 2, when the input is paired-end.
    pub reader2: Option<R>,
}
