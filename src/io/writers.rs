use crate::io::{FromFilename, MapFailedWriteExt, is_gz};
use flate2::{Compression, write::GzEncoder};
use std::{
    fs::File,
    io::{BufWriter, Stdout, Write, stdout},
    path::Path,
};
use zoe::define_whichever;

define_whichever! {
    /// The SAM output sink: a plain file, a gzip-compressed file, or stdout,
    /// chosen by [`WriteFileZipStdout::from_filename`]/[`Self::default`]
    /// (the `--output` flag's absence means stdout).
    #[derive(Debug)]
    pub(crate) enum WriteFileZipStdout {
        /// A writer for a regular uncompressed file.
        File(BufWriter<File>),
        /// A writer for a gzip compressed file.
        Zipped(GzEncoder<BufWriter<File>>),
        /// A writer for uncompressed data to stdout.
        Stdout(BufWriter<Stdout>),
    }

    impl Write for WriteFileZipStdout {}
}

impl FromFilename for WriteFileZipStdout {
    fn from_filename<P>(path: P) -> std::io::Result<Self>
    where
        P: AsRef<Path>, {
        let file = File::create(&path).map_failed_write(path.as_ref())?;
        let bufwriter = BufWriter::new(file);

        let writer = if is_gz(path) {
            Self::Zipped(GzEncoder::new(bufwriter, Compression::default()))
        } else {
            Self::File(bufwriter)
        };

        Ok(writer)
    }
}

impl Default for WriteFileZipStdout {
    #[inline]
    fn default() -> Self {
        Self::Stdout(BufWriter::new(stdout()))
    }
}
