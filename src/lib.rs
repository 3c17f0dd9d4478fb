//! maestream - streaming reader/writer for Maestro (`.mae`) chemistry files
//!
//! The Maestro format stores molecular structures as a sequence of nested,
//! typed property blocks: scalar properties (boolean, integer, real,
//! string; the kind is encoded in the `b_`/`i_`/`r_`/`s_` name prefix),
//! plain sub-blocks, and indexed blocks holding columnar per-atom/per-bond
//! tables with `<>` undefined markers.
//!
//! # Features
//!
//! - Streaming, constant-memory parsing over any `Read` source
//! - Lazy indexed blocks: column values decode on first access, so columns
//!   nobody touches are never decoded
//! - Round-trip serialization (parse → write → parse yields equal blocks)
//! - Transparent gzip for `.maegz` / `.mae.gz` paths (`compression`
//!   feature, on by default)
//! - Line/column diagnostics on malformed input
//!
//! # Example
//!
//! ```
//! use maestream::{Block, Reader, Writer};
//!
//! # fn main() -> maestream::Result<()> {
//! let data = "f_m_ct {\n  s_m_title\n  :::\n  benzene\n  m_atom[2] {\n    i_m_atomic_number r_m_x_coord\n    :::\n    1 6 0.0 \n    2 6 1.39 \n    :::\n  }\n}\n";
//!
//! let mut reader = Reader::new(data.as_bytes());
//! let block = reader.next_block("f_m_ct")?.unwrap();
//! assert_eq!(block.get_string_property("s_m_title")?, "benzene");
//!
//! let atoms = block.get_indexed_block("m_atom")?;
//! let numbers = atoms.get_int_property("i_m_atomic_number")?;
//! assert_eq!(numbers.values(), &[6, 6]);
//!
//! // Write it back out, header block included.
//! let mut out = Vec::new();
//! let mut writer = Writer::new(&mut out)?;
//! writer.write(&block)?;
//! # Ok(())
//! # }
//! ```

pub mod block;
pub mod buffer;
pub mod compression;
pub mod constants;
pub mod error;
pub mod parser;
pub mod reader;
pub mod writer;

// Re-export the main types at the crate root
pub use block::{Block, IndexedBlock, IndexedBlockMap, IndexedProperty, REAL_TOLERANCE};
pub use compression::CompressedWriter;
pub use error::{MaeError, Result};
pub use parser::{IndexedStrategy, MaeParser};
pub use reader::Reader;
pub use writer::Writer;
