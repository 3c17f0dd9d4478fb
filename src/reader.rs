//! Streaming reader over a Maestro file.
//!
//! [`Reader`] wraps a [`MaeParser`] and hands out outer blocks one at a
//! time, in file order, with constant memory. [`Reader::next_block`]
//! filters by outer block name the way consumers usually iterate structure
//! files (`f_m_ct` blocks), skipping the anonymous header block and any
//! other non-matching blocks.
//!
//! # Examples
//!
//! ```
//! use maestream::Reader;
//!
//! # fn main() -> maestream::Result<()> {
//! let data = "{\n  s_m_m2io_version\n  :::\n  2.0.0 \n}\n\nf_m_ct {\n  s_m_title\n  :::\n  water\n}\n";
//! let mut reader = Reader::new(data.as_bytes());
//!
//! let ct = reader.next_block("f_m_ct")?.unwrap();
//! assert_eq!(ct.get_string_property("s_m_title")?, "water");
//! assert!(reader.next_block("f_m_ct")?.is_none());
//! # Ok(())
//! # }
//! ```

use crate::block::Block;
use crate::compression;
use crate::error::Result;
use crate::parser::MaeParser;
use std::io::Read;
use std::path::Path;

/// Streaming Maestro reader.
///
/// Implements `Iterator` over all outer blocks (header blocks included);
/// use [`Reader::next_block`] to filter by name.
pub struct Reader<R: Read> {
    parser: MaeParser<R>,
}

impl<R: Read> Reader<R> {
    /// Creates a reader over a byte stream.
    pub fn new(reader: R) -> Self {
        Reader {
            parser: MaeParser::new(reader),
        }
    }

    /// Creates a reader with an explicit parser buffer size.
    pub fn with_buffer_size(reader: R, buffer_size: usize) -> Self {
        Reader {
            parser: MaeParser::with_buffer_size(reader, buffer_size),
        }
    }

    /// Creates a reader that decodes indexed blocks eagerly instead of on
    /// first access.
    pub fn direct(reader: R) -> Self {
        Reader {
            parser: MaeParser::direct(reader),
        }
    }

    /// Wraps an explicitly configured parser.
    pub fn from_parser(parser: MaeParser<R>) -> Self {
        Reader { parser }
    }

    /// Reads the next outer block in file order, or `None` at end of
    /// input.
    pub fn read_block(&mut self) -> Result<Option<Block>> {
        self.parser.skip_whitespace()?;
        self.parser.outer_block()
    }

    /// Reads the next outer block with the given name, skipping blocks
    /// whose name does not match. File order is preserved among matches.
    pub fn next_block(&mut self, name: &str) -> Result<Option<Block>> {
        loop {
            match self.read_block()? {
                None => return Ok(None),
                Some(block) if block.name() == name => return Ok(Some(block)),
                Some(_) => {}
            }
        }
    }
}

impl Reader<Box<dyn Read>> {
    /// Opens a Maestro file, decompressing `.maegz` / `.mae.gz`
    /// transparently.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use maestream::constants::CT_BLOCK;
    /// use maestream::Reader;
    ///
    /// # fn main() -> maestream::Result<()> {
    /// let mut reader = Reader::from_path("structures.maegz")?;
    /// while let Some(block) = reader.next_block(CT_BLOCK)? {
    ///     let atoms = block.get_indexed_block("m_atom")?;
    ///     println!("{} atoms", atoms.row_count());
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let input = compression::open_input(path.as_ref())?;
        Ok(Reader::new(input))
    }
}

impl<R: Read> Iterator for Reader<R> {
    type Item = Result<Block>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_block().transpose()
    }
}
