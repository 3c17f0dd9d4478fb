//! Indexed-block parsing strategies.
//!
//! An indexed block declares its row count in the block header
//! (`m_atom[42] {`), then lists column names, `:::`, the data rows, a
//! closing `:::`, and `}`. Each row leads with a 1-based row index that is
//! consumed and discarded. The two-byte token `<>` marks an undefined cell.
//!
//! Two strategies produce identical blocks:
//!
//! - **Direct**: every cell is decoded while parsing. Right when the caller
//!   will touch every column anyway.
//! - **Buffered** (default): only token byte offsets are recorded during
//!   the parse; columns are decoded when the block is first fetched from
//!   its [`IndexedBlockMap`](crate::IndexedBlockMap). Columns nobody asks
//!   for are never decoded, which is the main latency win on large files.

use crate::block::{IndexedBlock, IndexedProperty};
use crate::buffer::{Buffer, TokenSpans};
use crate::error::{MaeError, Result};
use crate::parser::{lex, values};
use std::fmt;
use std::io::Read;

const MISSING_CLOSE: &str = "Missing closing '}' for indexed block.";

/// Consumes a `<>` undefined marker if one is next.
///
/// A lone `<` starting an ordinary token is pushed back and parsed
/// normally.
fn scan_undefined<R: Read>(buffer: &mut Buffer<R>) -> Result<bool> {
    if !buffer.load()? {
        return Err(buffer.syntax_error("Unexpected EOF."));
    }
    if buffer.byte() != b'<' {
        return Ok(false);
    }
    let save = buffer.pos();
    buffer.advance();
    if buffer.exhausted() && buffer.load_from(save)?.is_none() {
        return Err(buffer.syntax_error("Unexpected EOF."));
    }
    if buffer.byte() == b'>' {
        buffer.advance();
        Ok(true)
    } else {
        buffer.retreat();
        Ok(false)
    }
}

/// Cells collected for one column during a direct parse.
struct Cells<T> {
    name: String,
    rows: usize,
    values: Vec<T>,
    undefined: Option<Vec<bool>>,
}

impl<T> Cells<T> {
    fn new(name: String, rows: usize) -> Self {
        Cells {
            name,
            rows,
            values: Vec::with_capacity(rows),
            undefined: None,
        }
    }

    fn push(&mut self, value: T) {
        self.values.push(value);
    }

    fn push_undefined(&mut self, placeholder: T) {
        let rows = self.rows;
        let row = self.values.len();
        self.undefined.get_or_insert_with(|| vec![false; rows])[row] = true;
        self.values.push(placeholder);
    }

    fn into_property(self) -> (String, IndexedProperty<T>) {
        (
            self.name,
            IndexedProperty::with_undefined(self.values, self.undefined),
        )
    }
}

/// Per-column parser used by the direct strategy. The `RowIndex` variant
/// consumes and discards the leading integer of each row.
enum ColumnCollector {
    RowIndex,
    Bool(Cells<bool>),
    Int(Cells<i64>),
    Real(Cells<f64>),
    Str(Cells<String>),
}

impl ColumnCollector {
    fn for_key(key: &str, rows: usize) -> Self {
        match key.as_bytes()[0] {
            b'b' => ColumnCollector::Bool(Cells::new(key.to_string(), rows)),
            b'i' => ColumnCollector::Int(Cells::new(key.to_string(), rows)),
            b'r' => ColumnCollector::Real(Cells::new(key.to_string(), rows)),
            _ => ColumnCollector::Str(Cells::new(key.to_string(), rows)),
        }
    }

    fn parse_cell<R: Read>(&mut self, buffer: &mut Buffer<R>) -> Result<()> {
        match self {
            ColumnCollector::RowIndex => {
                if !scan_undefined(buffer)? {
                    values::parse_int(buffer)?;
                }
            }
            ColumnCollector::Bool(cells) => {
                if scan_undefined(buffer)? {
                    cells.push_undefined(false);
                } else {
                    let value = values::parse_bool(buffer)?;
                    cells.push(value);
                }
            }
            ColumnCollector::Int(cells) => {
                if scan_undefined(buffer)? {
                    cells.push_undefined(0);
                } else {
                    let value = values::parse_int(buffer)?;
                    cells.push(value);
                }
            }
            ColumnCollector::Real(cells) => {
                if scan_undefined(buffer)? {
                    cells.push_undefined(0.0);
                } else {
                    let value = values::parse_real(buffer)?;
                    cells.push(value);
                }
            }
            ColumnCollector::Str(cells) => {
                if scan_undefined(buffer)? {
                    cells.push_undefined(String::new());
                } else {
                    let value = values::parse_string(buffer)?;
                    cells.push(value);
                }
            }
        }
        Ok(())
    }

    fn transfer(self, block: &mut IndexedBlock) {
        match self {
            ColumnCollector::RowIndex => {}
            ColumnCollector::Bool(cells) => {
                let (name, column) = cells.into_property();
                block.set_bool_property(name, column);
            }
            ColumnCollector::Int(cells) => {
                let (name, column) = cells.into_property();
                block.set_int_property(name, column);
            }
            ColumnCollector::Real(cells) => {
                let (name, column) = cells.into_property();
                block.set_real_property(name, column);
            }
            ColumnCollector::Str(cells) => {
                let (name, column) = cells.into_property();
                block.set_string_property(name, column);
            }
        }
    }
}

/// Parses an indexed block eagerly into columns.
pub(crate) fn parse_direct<R: Read>(
    name: &str,
    rows: usize,
    buffer: &mut Buffer<R>,
) -> Result<IndexedBlock> {
    lex::whitespace(buffer)?;
    let mut keys = Vec::new();
    while let Some(key) = lex::property_key(buffer)? {
        keys.push(key);
        lex::whitespace(buffer)?;
    }
    lex::triple_colon(buffer)?;

    let mut collectors = Vec::with_capacity(keys.len() + 1);
    collectors.push(ColumnCollector::RowIndex);
    for key in &keys {
        collectors.push(ColumnCollector::for_key(key, rows));
    }

    for _ in 0..rows {
        for collector in collectors.iter_mut() {
            lex::whitespace(buffer)?;
            collector.parse_cell(buffer)?;
        }
    }

    lex::whitespace(buffer)?;
    lex::triple_colon(buffer)?;
    lex::whitespace(buffer)?;
    if !lex::character(b'}', buffer)? {
        return Err(buffer.syntax_error(MISSING_CLOSE));
    }

    let mut block = IndexedBlock::new(name);
    for collector in collectors {
        collector.transfer(&mut block);
    }
    Ok(block)
}

/// Parses an indexed block into an [`IndexedBlockBuffer`] holding raw token
/// spans.
pub(crate) fn parse_buffered<R: Read>(
    name: &str,
    rows: usize,
    buffer: &mut Buffer<R>,
) -> Result<IndexedBlockBuffer> {
    let mut block_buffer = IndexedBlockBuffer::new(name, rows);
    lex::whitespace(buffer)?;
    while let Some(key) = lex::property_key(buffer)? {
        block_buffer.add_property_name(key);
        lex::whitespace(buffer)?;
    }
    lex::triple_colon(buffer)?;
    block_buffer.parse(buffer)?;
    lex::triple_colon(buffer)?;
    lex::whitespace(buffer)?;
    if !lex::character(b'}', buffer)? {
        return Err(buffer.syntax_error(MISSING_CLOSE));
    }
    Ok(block_buffer)
}

/// The undecoded form of an indexed block: column names, declared row
/// count, and the byte span of every data token in row-major order
/// (including the leading row index of each row).
pub struct IndexedBlockBuffer {
    name: String,
    rows: usize,
    property_names: Vec<String>,
    spans: TokenSpans,
}

impl fmt::Debug for IndexedBlockBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexedBlockBuffer")
            .field("name", &self.name)
            .field("rows", &self.rows)
            .field("property_names", &self.property_names)
            .field("tokens", &self.spans.len())
            .finish()
    }
}

impl IndexedBlockBuffer {
    pub(crate) fn new(name: impl Into<String>, rows: usize) -> Self {
        IndexedBlockBuffer {
            name: name.into(),
            rows,
            property_names: Vec::new(),
            spans: TokenSpans::new(),
        }
    }

    pub(crate) fn add_property_name(&mut self, name: String) {
        self.property_names.push(name);
    }

    /// Scans all data rows, recording token spans without decoding them.
    pub(crate) fn parse<R: Read>(&mut self, buffer: &mut Buffer<R>) -> Result<()> {
        let tokens = self.rows * (self.property_names.len() + 1);
        self.spans.reserve(tokens);
        for _ in 0..tokens {
            lex::whitespace(buffer)?;
            self.scan_value(buffer)?;
        }
        lex::whitespace(buffer)?;
        Ok(())
    }

    /// Records the span of one whitespace-delimited (or quoted) token.
    fn scan_value<R: Read>(&mut self, buffer: &mut Buffer<R>) -> Result<()> {
        if !buffer.load()? {
            return Err(buffer.syntax_error("Unexpected EOF in indexed block values."));
        }

        let mut save = buffer.pos();
        if buffer.byte() != b'"' {
            loop {
                if buffer.exhausted() {
                    match buffer.load_from(save)? {
                        Some(s) => save = s,
                        None => break,
                    }
                }
                match buffer.byte() {
                    b' ' | b'\t' | b'\r' | b'\n' => break,
                    _ => buffer.advance(),
                }
            }
            self.spans.record(buffer, save, buffer.pos());
            Ok(())
        } else {
            buffer.advance();
            loop {
                if buffer.exhausted() {
                    match buffer.load_from(save)? {
                        Some(s) => save = s,
                        None => {
                            return Err(
                                buffer.syntax_error("Unterminated quoted string at EOF.")
                            );
                        }
                    }
                }
                match buffer.byte() {
                    b'"' => {
                        buffer.advance();
                        self.spans.record(buffer, save, buffer.pos());
                        return Ok(());
                    }
                    b'\\' => {
                        buffer.advance();
                        if buffer.exhausted() && buffer.load_from(save)?.is_none() {
                            return Err(
                                buffer.syntax_error("Unterminated quoted string at EOF.")
                            );
                        }
                        buffer.advance();
                    }
                    _ => buffer.advance(),
                }
            }
        }
    }

    #[cfg(test)]
    fn token(&self, index: usize) -> &[u8] {
        self.spans.get(index)
    }

    /// Decodes the recorded spans into columns.
    ///
    /// Column `c` occupies spans `{c, c + step, c + 2*step, ...}` where
    /// `step` counts the declared properties plus the skipped row-index
    /// column.
    pub(crate) fn to_indexed_block(&self) -> Result<IndexedBlock> {
        let step = self.property_names.len() + 1;
        let mut block = IndexedBlock::new(self.name.clone());

        for (property_ix, key) in self.property_names.iter().enumerate() {
            let first = property_ix + 1;
            match key.as_bytes()[0] {
                b'b' => {
                    let (values, undefined) =
                        self.collect_column(first, step, false, decode_bool)?;
                    block.set_bool_property(
                        key.clone(),
                        IndexedProperty::with_undefined(values, undefined),
                    );
                }
                b'i' => {
                    let (values, undefined) = self.collect_column(first, step, 0, decode_int)?;
                    block.set_int_property(
                        key.clone(),
                        IndexedProperty::with_undefined(values, undefined),
                    );
                }
                b'r' => {
                    let (values, undefined) =
                        self.collect_column(first, step, 0.0, decode_real)?;
                    block.set_real_property(
                        key.clone(),
                        IndexedProperty::with_undefined(values, undefined),
                    );
                }
                _ => {
                    let (values, undefined) =
                        self.collect_column(first, step, String::new(), decode_string)?;
                    block.set_string_property(
                        key.clone(),
                        IndexedProperty::with_undefined(values, undefined),
                    );
                }
            }
        }
        Ok(block)
    }

    fn collect_column<T: Clone>(
        &self,
        first: usize,
        step: usize,
        placeholder: T,
        decode: impl Fn(&[u8]) -> Result<T>,
    ) -> Result<(Vec<T>, Option<Vec<bool>>)> {
        let total = self.rows * step;
        let mut values = Vec::with_capacity(self.rows);
        let mut undefined: Option<Vec<bool>> = None;

        let mut ix = first;
        while ix < total {
            let token = self.spans.get(ix);
            if token.len() >= 2 && token[0] == b'<' && token[1] == b'>' {
                let rows = self.rows;
                let row = values.len();
                undefined.get_or_insert_with(|| vec![false; rows])[row] = true;
                values.push(placeholder.clone());
            } else {
                values.push(decode(token)?);
            }
            ix += step;
        }
        Ok((values, undefined))
    }
}

fn invalid_value(message: &str) -> MaeError {
    MaeError::InvalidValue {
        message: message.to_string(),
    }
}

fn decode_bool(token: &[u8]) -> Result<bool> {
    match token.first() {
        Some(b'1') => Ok(true),
        Some(b'0') => Ok(false),
        _ => Err(invalid_value("Bad boolean value in indexed block.")),
    }
}

/// Decimal integer decode without base prefixes or stray signs. Measurably
/// faster than a general-purpose conversion on row-index columns.
fn decode_int(token: &[u8]) -> Result<i64> {
    let mut value: i64 = 0;
    let mut sign: i64 = 1;
    for &byte in token {
        match byte {
            b'0'..=b'9' => {
                value = value.wrapping_mul(10).wrapping_add(i64::from(byte - b'0'));
            }
            b'-' => {
                if sign == -1 || value != 0 {
                    return Err(invalid_value("Unexpected '-' in integer."));
                }
                sign = -1;
            }
            _ => return Err(invalid_value("Unexpected character in integer.")),
        }
    }
    Ok(value * sign)
}

fn decode_real(token: &[u8]) -> Result<f64> {
    values::decode_real(token)
        .map_err(|_| invalid_value("Bad floating point representation."))
}

fn decode_string(token: &[u8]) -> Result<String> {
    if token.len() >= 2 && token[0] == b'"' {
        // The scanner records quoted tokens with both quotes present.
        Ok(values::remove_escapes(&token[1..token.len() - 1]))
    } else {
        Ok(String::from_utf8_lossy(token).into_owned())
    }
}
