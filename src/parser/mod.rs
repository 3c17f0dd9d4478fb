//! Recursive-descent parser for the Maestro block grammar.
//!
//! [`MaeParser`] reads one outer block at a time from a streaming input:
//!
//! ```text
//! outer_block   := outer_name? '{' scalar_section block_body '}'
//! scalar_section := property_key* ':::' value*
//! block_body    := ( sub_block )*
//! sub_block     := block_name ('[' integer ']')? '{' ... '}'
//! ```
//!
//! Scalar values are dispatched on the kind prefix of their property key
//! (`b_`/`i_`/`r_`/`s_`). Sub-blocks with a `[N]` row count are handed to
//! the configured indexed-block strategy; plain sub-blocks recurse.
//!
//! Errors carry the line and column where the grammar broke; no partial
//! block is ever returned.

pub(crate) mod indexed;
pub(crate) mod lex;
pub(crate) mod values;

use crate::block::Block;
use crate::buffer::{Buffer, DEFAULT_BUFFER_SIZE};
use crate::error::Result;
use std::io::Read;

/// How indexed blocks are parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexedStrategy {
    /// Record token offsets during the parse and decode columns on first
    /// access (the default).
    Buffered,
    /// Decode every cell while parsing.
    Direct,
}

/// Streaming parser producing one outer [`Block`] per call.
///
/// # Examples
///
/// ```
/// use maestream::{IndexedStrategy, MaeParser};
///
/// # fn main() -> maestream::Result<()> {
/// let data = "f_m_ct {\n  s_m_title\n  :::\n  benzene\n}\n";
/// let mut parser = MaeParser::new(data.as_bytes());
///
/// let block = parser.outer_block()?.unwrap();
/// assert_eq!(block.name(), "f_m_ct");
/// assert_eq!(block.get_string_property("s_m_title")?, "benzene");
/// assert!(parser.outer_block()?.is_none());
/// # Ok(())
/// # }
/// ```
pub struct MaeParser<R: Read> {
    buffer: Buffer<R>,
    strategy: IndexedStrategy,
}

impl<R: Read> MaeParser<R> {
    /// Creates a parser with the default window size and the buffered
    /// indexed-block strategy.
    pub fn new(reader: R) -> Self {
        Self::with_options(reader, DEFAULT_BUFFER_SIZE, IndexedStrategy::Buffered)
    }

    /// Creates a parser with an explicit buffer window size.
    pub fn with_buffer_size(reader: R, buffer_size: usize) -> Self {
        Self::with_options(reader, buffer_size, IndexedStrategy::Buffered)
    }

    /// Creates a parser that decodes indexed blocks eagerly.
    pub fn direct(reader: R) -> Self {
        Self::with_options(reader, DEFAULT_BUFFER_SIZE, IndexedStrategy::Direct)
    }

    /// Creates a parser with explicit window size and strategy.
    pub fn with_options(reader: R, buffer_size: usize, strategy: IndexedStrategy) -> Self {
        MaeParser {
            buffer: Buffer::with_buffer_size(reader, buffer_size),
            strategy,
        }
    }

    /// The active indexed-block strategy.
    pub fn strategy(&self) -> IndexedStrategy {
        self.strategy
    }

    /// Skips whitespace and comments.
    pub(crate) fn skip_whitespace(&mut self) -> Result<()> {
        lex::whitespace(&mut self.buffer)
    }

    /// Parses the next outer block, or returns `None` at end of input.
    ///
    /// The cursor must sit on the block start; interleaving whitespace is
    /// the caller's concern (see [`Reader`](crate::Reader)).
    pub fn outer_block(&mut self) -> Result<Option<Block>> {
        if !self.buffer.load()? {
            return Ok(None);
        }
        let name = lex::outer_block_beginning(&mut self.buffer)?;
        self.block_body(name).map(Some)
    }

    /// Parses a block body (scalar section plus sub-blocks) up to and
    /// including the closing `}`.
    pub(crate) fn block_body(&mut self, name: String) -> Result<Block> {
        let mut block = Block::new(name);

        lex::whitespace(&mut self.buffer)?;
        let mut keys = Vec::new();
        while let Some(key) = lex::property_key(&mut self.buffer)? {
            keys.push(key);
            lex::whitespace(&mut self.buffer)?;
        }
        lex::triple_colon(&mut self.buffer)?;

        for key in keys {
            lex::whitespace(&mut self.buffer)?;
            match key.as_bytes()[0] {
                b'b' => {
                    let value = values::parse_bool(&mut self.buffer)?;
                    block.set_bool_property(key, value);
                }
                b'i' => {
                    let value = values::parse_int(&mut self.buffer)?;
                    block.set_int_property(key, value);
                }
                b'r' => {
                    let value = values::parse_real(&mut self.buffer)?;
                    block.set_real_property(key, value);
                }
                b's' => {
                    let value = values::parse_string(&mut self.buffer)?;
                    block.set_string_property(key, value);
                }
                _ => unreachable!("property keys always carry a kind prefix"),
            }
        }

        lex::whitespace(&mut self.buffer)?;
        loop {
            if !self.buffer.load()? {
                return Err(self.buffer.syntax_error("Missing '}' for block."));
            }
            if self.buffer.byte() == b'}' {
                self.buffer.advance();
                break;
            }

            let (sub_name, rows) = self.block_beginning()?;
            if rows > 0 {
                let rows = rows as usize;
                match self.strategy {
                    IndexedStrategy::Buffered => {
                        let buffered =
                            indexed::parse_buffered(&sub_name, rows, &mut self.buffer)?;
                        block
                            .indexed_block_map_mut()
                            .insert_buffer(sub_name, buffered);
                    }
                    IndexedStrategy::Direct => {
                        let parsed = indexed::parse_direct(&sub_name, rows, &mut self.buffer)?;
                        block.indexed_block_map_mut().insert_block(sub_name, parsed);
                    }
                }
            } else {
                let sub_block = self.block_body(sub_name)?;
                block.add_block(sub_block);
            }
            lex::whitespace(&mut self.buffer)?;
        }

        Ok(block)
    }

    /// Reads a sub-block header: `<author>_<name>` with an optional
    /// `[ rows ]` index, through the opening `{`. Returns zero rows for a
    /// plain block.
    fn block_beginning(&mut self) -> Result<(String, i64)> {
        let save = self.buffer.pos();
        let save = match lex::author_name(&mut self.buffer, save)? {
            Some(save) => save,
            None => {
                return Err(self
                    .buffer
                    .syntax_error("Bad format for block name; must be <author>_<name>."));
            }
        };
        let name =
            String::from_utf8_lossy(self.buffer.slice(save, self.buffer.pos())).into_owned();

        lex::whitespace(&mut self.buffer)?;

        let mut rows = 0i64;
        if lex::character(b'[', &mut self.buffer)? {
            lex::whitespace(&mut self.buffer)?;
            rows = values::parse_int(&mut self.buffer)?;
            lex::whitespace(&mut self.buffer)?;
            if !lex::character(b']', &mut self.buffer)? {
                return Err(self.buffer.syntax_error("Bad block index; missing ']'."));
            }
            lex::whitespace(&mut self.buffer)?;
        }

        if lex::character(b'{', &mut self.buffer)? {
            Ok((name, rows))
        } else {
            Err(self.buffer.syntax_error("Missing '{' for block."))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parser(text: &str) -> MaeParser<&[u8]> {
        MaeParser::new(text.as_bytes())
    }

    #[test]
    fn test_block_beginning_plain() {
        let mut p = parser("m_something {");
        assert_eq!(p.block_beginning().unwrap(), ("m_something".to_string(), 0));

        let mut p = parser("mmmm_block{");
        assert_eq!(p.block_beginning().unwrap(), ("mmmm_block".to_string(), 0));
    }

    #[test]
    fn test_block_beginning_indexed() {
        let mut p = parser("m_whatev[23]{");
        assert_eq!(p.block_beginning().unwrap(), ("m_whatev".to_string(), 23));

        // Whitespace inside the brackets is allowed.
        let mut p = parser("m_atom[ 123 ] {");
        assert_eq!(p.block_beginning().unwrap(), ("m_atom".to_string(), 123));
    }

    #[test]
    fn test_block_beginning_errors() {
        let mut p = parser("");
        let err = p.block_beginning().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Line 1, column 1: Bad format for block name; must be <author>_<name>."
        );

        let mut p = parser("m_block[integer]");
        let err = p.block_beginning().unwrap_err();
        assert_eq!(err.to_string(), "Line 1, column 9: Unexpected character.");

        let mut p = parser("m_block[33  ");
        let err = p.block_beginning().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Line 1, column 13: Bad block index; missing ']'."
        );

        let mut p = parser("m_block[33]  s_m_foo");
        let err = p.block_beginning().unwrap_err();
        assert_eq!(err.to_string(), "Line 1, column 14: Missing '{' for block.");

        let mut p = parser("'bad_block");
        let err = p.block_beginning().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Line 1, column 1: Bad format for block name; must be <author>_<name>."
        );

        let mut p = parser("mmmm_ ");
        let err = p.block_beginning().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Line 1, column 6: Bad format for block name; must be <author>_<name>."
        );
    }

    #[test]
    fn test_block_body_scalars() {
        let mut p = parser("b_m_foo b_m_bar ::: 1 0 }");
        let block = p.block_body("f_m_ct".to_string()).unwrap();
        assert!(block.get_bool_property("b_m_foo").unwrap());
        assert!(!block.get_bool_property("b_m_bar").unwrap());
    }

    #[test]
    fn test_block_body_mixed_kinds() {
        let mut p = parser(
            " b_m_foo b_m_bar s_m_foo r_m_foo i_m_foo ::: \
             1       0       svalue  3.1415  22 }",
        );
        let block = p.block_body("f_m_ct".to_string()).unwrap();
        assert!(block.get_bool_property("b_m_foo").unwrap());
        assert!(!block.get_bool_property("b_m_bar").unwrap());
        assert_eq!(block.get_string_property("s_m_foo").unwrap(), "svalue");
        assert_eq!(block.get_real_property("r_m_foo").unwrap(), 3.1415);
        assert_eq!(block.get_int_property("i_m_foo").unwrap(), 22);
    }

    #[test]
    fn test_block_body_missing_close() {
        let mut p = parser(" b_m_foo\n s_m_foo\n r_m_foo\n i_m_foo\n :::\n 1\n svalue\n 3.1415\n 22\n ");
        let err = p.block_body("f_m_ct".to_string()).unwrap_err();
        assert_eq!(err.to_string(), "Line 10, column 2: Missing '}' for block.");
    }

    #[test]
    fn test_outer_block_eof() {
        let mut p = parser("");
        assert!(p.outer_block().unwrap().is_none());
    }

    #[test]
    fn test_outer_block_with_nested_sub_block() {
        let text = "f_m_ct {\n  s_m_prop\n  :::\n  1.1.0 \n  m_nested {\n    s_m_prop\n    :::\n    1.1.0 \n  }\n}\n";
        let mut p = parser(text);
        let block = p.outer_block().unwrap().unwrap();
        assert_eq!(block.name(), "f_m_ct");
        assert_eq!(block.get_string_property("s_m_prop").unwrap(), "1.1.0");
        assert!(block.has_block("m_nested"));
        assert_eq!(
            block
                .get_block("m_nested")
                .unwrap()
                .get_string_property("s_m_prop")
                .unwrap(),
            "1.1.0"
        );
    }

    #[test]
    fn test_outer_block_with_indexed_blocks() {
        let text = "f_m_ct {\n  s_m_prop\n  :::\n  1.1.0 \n  m_nested[2] {\n    s_m_prop\n    :::\n    1 1.1.0 \n    2 1.1.0 \n    :::\n  }\n}\n";

        for strategy in [IndexedStrategy::Buffered, IndexedStrategy::Direct] {
            let mut p =
                MaeParser::with_options(text.as_bytes(), DEFAULT_BUFFER_SIZE, strategy);
            let block = p.outer_block().unwrap().unwrap();
            let nested = block.get_indexed_block("m_nested").unwrap();
            let prop = nested.get_string_property("s_m_prop").unwrap();
            assert_eq!(prop.get(0).unwrap(), "1.1.0");
            assert_eq!(prop.get(1).unwrap(), "1.1.0");
        }
    }

    #[test]
    fn test_buffered_block_fetch_is_cached() {
        let text = "f_m_ct {\n  s_m_prop\n  :::\n  x \n  m_atom[1] {\n    i_m_num\n    :::\n    1 6 \n    :::\n  }\n}\n";
        let mut p = parser(text);
        let block = p.outer_block().unwrap().unwrap();

        let first = block.get_indexed_block("m_atom").unwrap();
        let second = block.get_indexed_block("m_atom").unwrap();
        assert!(std::rc::Rc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_duplicate_sub_block_replaces_earlier() {
        let text = "f_m_ct {\n  s_m_p\n  :::\n  v \n  m_sub {\n    i_m_x\n    :::\n    1 \n  }\n  m_sub {\n    i_m_x\n    :::\n    2 \n  }\n}\n";
        let mut p = parser(text);
        let block = p.outer_block().unwrap().unwrap();
        assert_eq!(block.block_names(), vec!["m_sub"]);
        assert_eq!(
            block
                .get_block("m_sub")
                .unwrap()
                .get_int_property("i_m_x")
                .unwrap(),
            2
        );
    }

    #[test]
    fn test_colon_bearing_property_key_parses_as_string() {
        let text = "f_m_ct {\n  s_m_prop:name::with:::many::::colons\n  :::\n  1.1.0 \n}\n";
        let mut p = parser(text);
        let block = p.outer_block().unwrap().unwrap();
        assert_eq!(
            block
                .get_string_property("s_m_prop:name::with:::many::::colons")
                .unwrap(),
            "1.1.0"
        );
    }

    #[test]
    fn test_small_windows_parse_identically() {
        let text = "f_m_ct {\n  s_m_title r_m_energy\n  :::\n  \"a title\" -1.5 \n  m_atom[2] {\n    i_m_num r_m_x\n    :::\n    1 6 0.5 \n    2 8 <> \n    :::\n  }\n}\n";

        let mut reference = MaeParser::new(text.as_bytes());
        let expected = reference.outer_block().unwrap().unwrap();

        for window in [5, 16, 64] {
            let mut p = MaeParser::with_buffer_size(text.as_bytes(), window);
            let block = p.outer_block().unwrap().unwrap();
            assert_eq!(block, expected, "window size {}", window);
        }
    }
}
