//! Extension-driven compression for Maestro files.
//!
//! The suffixes `.maegz` and `.mae.gz` select transparent gzip on both the
//! read and the write path; any other suffix is treated as raw text. Gzip
//! support comes from flate2 behind the default-on `compression` feature.
//! Without the feature, opening a compressed path fails with an error that
//! names the file and the missing capability.

use crate::error::Result;
use std::fs::File;
use std::io::{self, BufWriter, Read, Write};
use std::path::Path;

#[cfg(feature = "compression")]
use flate2::read::MultiGzDecoder;
#[cfg(feature = "compression")]
use flate2::write::GzEncoder;
#[cfg(feature = "compression")]
use flate2::Compression;

/// True when the path carries a gzip suffix (`.maegz` or `.mae.gz`).
pub(crate) fn is_compressed_path(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    name.ends_with(".maegz") || name.ends_with(".mae.gz")
}

/// Opens a file for reading, decompressing transparently based on its
/// suffix.
pub(crate) fn open_input(path: &Path) -> Result<Box<dyn Read>> {
    if is_compressed_path(path) {
        #[cfg(feature = "compression")]
        {
            let file = File::open(path)?;
            return Ok(Box::new(MultiGzDecoder::new(file)));
        }
        #[cfg(not(feature = "compression"))]
        {
            return Err(crate::error::MaeError::Compression(format!(
                "Unable to open {} for reading: maestream was built without \
                 gzip support (enable the \"compression\" feature)",
                path.display()
            )));
        }
    }
    let file = File::open(path)?;
    Ok(Box::new(file))
}

/// A file sink that compresses transparently based on its suffix.
///
/// Call [`CompressedWriter::finish`] to flush buffers and write the gzip
/// trailer; dropping the writer finalizes best-effort.
pub enum CompressedWriter {
    Plain(BufWriter<File>),
    #[cfg(feature = "compression")]
    Gzip(GzEncoder<BufWriter<File>>),
}

impl CompressedWriter {
    /// Creates the file at `path`, choosing compression from the suffix.
    pub fn create(path: &Path) -> Result<Self> {
        if is_compressed_path(path) {
            #[cfg(feature = "compression")]
            {
                let file = File::create(path)?;
                return Ok(CompressedWriter::Gzip(GzEncoder::new(
                    BufWriter::new(file),
                    Compression::default(),
                )));
            }
            #[cfg(not(feature = "compression"))]
            {
                return Err(crate::error::MaeError::Compression(format!(
                    "Unable to open {} for writing: maestream was built without \
                     gzip support (enable the \"compression\" feature)",
                    path.display()
                )));
            }
        }
        let file = File::create(path)?;
        Ok(CompressedWriter::Plain(BufWriter::new(file)))
    }

    /// Flushes all buffers and finalizes the compression stream.
    pub fn finish(self) -> Result<()> {
        match self {
            CompressedWriter::Plain(mut sink) => sink.flush()?,
            #[cfg(feature = "compression")]
            CompressedWriter::Gzip(encoder) => encoder.finish()?.flush()?,
        }
        Ok(())
    }
}

impl Write for CompressedWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            CompressedWriter::Plain(sink) => sink.write(buf),
            #[cfg(feature = "compression")]
            CompressedWriter::Gzip(encoder) => encoder.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            CompressedWriter::Plain(sink) => sink.flush(),
            #[cfg(feature = "compression")]
            CompressedWriter::Gzip(encoder) => encoder.flush(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compressed_path_detection() {
        assert!(is_compressed_path(Path::new("structures.maegz")));
        assert!(is_compressed_path(Path::new("structures.mae.gz")));
        assert!(is_compressed_path(Path::new("dir/structures.mae.gz")));
        assert!(!is_compressed_path(Path::new("structures.mae")));
        assert!(!is_compressed_path(Path::new("structures.gz")));
        assert!(!is_compressed_path(Path::new("structures.txt")));
    }

    #[cfg(feature = "compression")]
    #[test]
    fn test_gzip_write_read_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.maegz");

        let mut writer = CompressedWriter::create(&path).unwrap();
        writer.write_all(b"hello maestro\n").unwrap();
        writer.finish().unwrap();

        let mut text = String::new();
        open_input(&path).unwrap().read_to_string(&mut text).unwrap();
        assert_eq!(text, "hello maestro\n");
    }

    #[test]
    fn test_plain_write_read_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.mae");

        let mut writer = CompressedWriter::create(&path).unwrap();
        writer.write_all(b"plain text\n").unwrap();
        writer.finish().unwrap();

        let mut text = String::new();
        open_input(&path).unwrap().read_to_string(&mut text).unwrap();
        assert_eq!(text, "plain text\n");
    }
}
