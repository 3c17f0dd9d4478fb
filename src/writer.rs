//! Streaming writer for Maestro files.
//!
//! A [`Writer`] emits the anonymous header block carrying
//! `s_m_m2io_version` when it is constructed, then appends one serialized
//! block per [`Writer::write`] call. Output created through
//! [`Writer::create`] is compressed transparently when the path ends in
//! `.maegz` or `.mae.gz`.
//!
//! Dropping a writer flushes best-effort; call [`Writer::finish`] on
//! file-backed writers to flush buffers and finalize the gzip trailer
//! explicitly.
//!
//! # Examples
//!
//! ```
//! use maestream::{Block, Reader, Writer};
//!
//! # fn main() -> maestream::Result<()> {
//! let mut block = Block::new("f_m_ct");
//! block.set_string_property("s_m_title", "water");
//!
//! let mut out = Vec::new();
//! {
//!     let mut writer = Writer::new(&mut out)?;
//!     writer.write(&block)?;
//! }
//!
//! let mut reader = Reader::new(out.as_slice());
//! let header = reader.read_block()?.unwrap();
//! assert_eq!(header.get_string_property("s_m_m2io_version")?, "2.0.0");
//! let read_back = reader.read_block()?.unwrap();
//! assert_eq!(read_back, block);
//! # Ok(())
//! # }
//! ```

use crate::block::Block;
use crate::compression::CompressedWriter;
use crate::constants::{MAE_FORMAT_VERSION, MAE_FORMAT_VERSION_VALUE};
use crate::error::Result;
use std::io::Write as IoWrite;
use std::path::Path;

/// Streaming Maestro writer.
pub struct Writer<W: IoWrite> {
    sink: Option<W>,
    blocks_written: usize,
}

impl Writer<CompressedWriter> {
    /// Creates a Maestro file, compressing when the suffix asks for it,
    /// and writes the header block.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use maestream::{Block, Writer};
    ///
    /// # fn main() -> maestream::Result<()> {
    /// let mut writer = Writer::create("out.maegz")?;
    /// let mut block = Block::new("f_m_ct");
    /// block.set_string_property("s_m_title", "water");
    /// writer.write(&block)?;
    /// writer.finish()?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::new(CompressedWriter::create(path.as_ref())?)
    }

    /// Flushes all buffers and finalizes the compression stream.
    pub fn finish(mut self) -> Result<()> {
        match self.sink.take() {
            Some(sink) => sink.finish(),
            None => Ok(()),
        }
    }
}

impl<W: IoWrite> Writer<W> {
    /// Wraps an output sink and writes the header block.
    pub fn new(sink: W) -> Result<Self> {
        let mut writer = Writer {
            sink: Some(sink),
            blocks_written: 0,
        };
        let mut header = Block::new("");
        header.set_string_property(MAE_FORMAT_VERSION, MAE_FORMAT_VERSION_VALUE);
        writer.write_to_sink(&header)?;
        Ok(writer)
    }

    /// Appends one serialized block.
    pub fn write(&mut self, block: &Block) -> Result<()> {
        self.write_to_sink(block)?;
        self.blocks_written += 1;
        Ok(())
    }

    /// Number of blocks written, not counting the header block.
    pub fn blocks_written(&self) -> usize {
        self.blocks_written
    }

    /// Flushes buffered output.
    pub fn flush(&mut self) -> Result<()> {
        if let Some(sink) = self.sink.as_mut() {
            sink.flush()?;
        }
        Ok(())
    }

    fn write_to_sink(&mut self, block: &Block) -> Result<()> {
        match self.sink.as_mut() {
            Some(sink) => block.write_to(sink),
            None => Ok(()),
        }
    }
}

impl<W: IoWrite> Drop for Writer<W> {
    fn drop(&mut self) {
        if let Some(sink) = self.sink.as_mut() {
            let _ = sink.flush();
        }
    }
}
