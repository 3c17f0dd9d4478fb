//! In-memory model for Maestro blocks.
//!
//! A Maestro file is a sequence of outer [`Block`]s. Each block carries
//! scalar properties in four kinds (boolean, integer, real, string; the
//! kind is encoded by the `b_`/`i_`/`r_`/`s_` prefix of the property name),
//! nested plain sub-blocks, and named [`IndexedBlock`]s holding columnar
//! tables with optional per-cell undefined markers.
//!
//! Blocks compare structurally: scalars by value with a `1e-5` tolerance on
//! reals, sub-blocks pairwise by name, and indexed blocks column-for-column
//! (materializing lazily parsed tables as needed). Serialization via
//! [`Block::write_to`] emits the exact textual grammar the parser accepts,
//! so `parse(serialize(b))` reproduces an equal block.

use crate::error::{MaeError, Result};
use crate::parser::indexed::IndexedBlockBuffer;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::io::Write;
use std::rc::Rc;

/// Tolerance used when comparing real properties.
pub const REAL_TOLERANCE: f64 = 1e-5;

pub(crate) fn reals_equal(a: f64, b: f64) -> bool {
    (a - b).abs() <= REAL_TOLERANCE
}

/// One column of an indexed block: a dense value vector plus an optional
/// undefined mask (absent means every cell is defined).
///
/// Rows are 0-based here; the serialized form numbers rows from 1.
///
/// # Examples
///
/// ```
/// use maestream::IndexedProperty;
///
/// let mut column = IndexedProperty::new(vec![1.5, 0.0, 3.5]);
/// column.undefine(1);
///
/// assert!(column.is_defined(0));
/// assert!(!column.is_defined(1));
/// assert!(column.get(1).is_err());
/// assert_eq!(*column.get_or(1, &99.0), 99.0);
/// assert_eq!(*column.get(2).unwrap(), 3.5);
/// ```
#[derive(Debug, Clone)]
pub struct IndexedProperty<T> {
    values: Vec<T>,
    undefined: Option<Vec<bool>>,
}

impl<T> IndexedProperty<T> {
    /// Creates a fully defined column from a value vector.
    pub fn new(values: Vec<T>) -> Self {
        IndexedProperty {
            values,
            undefined: None,
        }
    }

    /// Creates a column with an optional undefined mask.
    ///
    /// A `Some` mask must be the same length as `values`.
    pub fn with_undefined(values: Vec<T>, undefined: Option<Vec<bool>>) -> Self {
        debug_assert!(undefined
            .as_ref()
            .map_or(true, |mask| mask.len() == values.len()));
        IndexedProperty { values, undefined }
    }

    /// Number of rows in the column.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True when the column has no rows.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// True when the cell at `row` holds a defined value.
    pub fn is_defined(&self, row: usize) -> bool {
        match &self.undefined {
            Some(mask) => !mask[row],
            None => {
                debug_assert!(row < self.values.len());
                true
            }
        }
    }

    /// True when any cell is undefined.
    pub fn has_undefined_values(&self) -> bool {
        self.undefined
            .as_ref()
            .map_or(false, |mask| mask.iter().any(|&u| u))
    }

    /// Strict accessor: fails with [`MaeError::UndefinedValue`] on an
    /// undefined cell.
    pub fn get(&self, row: usize) -> Result<&T> {
        if !self.is_defined(row) {
            return Err(MaeError::UndefinedValue { row });
        }
        Ok(&self.values[row])
    }

    /// Returns the cell value, or `default` when the cell is undefined.
    pub fn get_or<'a>(&'a self, row: usize, default: &'a T) -> &'a T {
        if self.is_defined(row) {
            &self.values[row]
        } else {
            default
        }
    }

    /// Sets the cell at `row`, marking it defined.
    pub fn set(&mut self, row: usize, value: T) {
        self.values[row] = value;
        if let Some(mask) = &mut self.undefined {
            mask[row] = false;
        }
    }

    /// Marks the cell at `row` undefined. The mask is allocated lazily on
    /// the first call.
    pub fn undefine(&mut self, row: usize) {
        let len = self.values.len();
        self.undefined.get_or_insert_with(|| vec![false; len])[row] = true;
    }

    /// The raw value vector, including placeholder values of undefined
    /// cells.
    pub fn values(&self) -> &[T] {
        &self.values
    }

    /// Equality under a caller-supplied cell comparison: lengths and
    /// undefined masks must match, and every defined cell must satisfy
    /// `eq`.
    pub(crate) fn eq_by(&self, other: &Self, eq: impl Fn(&T, &T) -> bool) -> bool {
        if self.values.len() != other.values.len() {
            return false;
        }
        (0..self.values.len()).all(|row| {
            let defined = self.is_defined(row);
            defined == other.is_defined(row)
                && (!defined || eq(&self.values[row], &other.values[row]))
        })
    }
}

impl<T: PartialEq> PartialEq for IndexedProperty<T> {
    fn eq(&self, other: &Self) -> bool {
        self.eq_by(other, |a, b| a == b)
    }
}

/// A named columnar table inside a block.
///
/// Columns are grouped by kind, like scalar properties. All columns of one
/// indexed block have the same length, which equals the declared row count.
#[derive(Debug, Default)]
pub struct IndexedBlock {
    name: String,
    bools: BTreeMap<String, IndexedProperty<bool>>,
    reals: BTreeMap<String, IndexedProperty<f64>>,
    ints: BTreeMap<String, IndexedProperty<i64>>,
    strings: BTreeMap<String, IndexedProperty<String>>,
}

impl IndexedBlock {
    /// Creates an empty indexed block.
    pub fn new(name: impl Into<String>) -> Self {
        IndexedBlock {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Block name, e.g. `m_atom`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Logical row count: the length of the longest column.
    pub fn row_count(&self) -> usize {
        let lengths = self
            .bools
            .values()
            .map(IndexedProperty::len)
            .chain(self.reals.values().map(IndexedProperty::len))
            .chain(self.ints.values().map(IndexedProperty::len))
            .chain(self.strings.values().map(IndexedProperty::len));
        lengths.max().unwrap_or(0)
    }

    pub fn has_bool_property(&self, name: &str) -> bool {
        self.bools.contains_key(name)
    }

    pub fn get_bool_property(&self, name: &str) -> Result<&IndexedProperty<bool>> {
        self.bools.get(name).ok_or_else(|| not_found(name))
    }

    pub fn set_bool_property(&mut self, name: impl Into<String>, column: IndexedProperty<bool>) {
        self.bools.insert(name.into(), column);
    }

    pub fn has_int_property(&self, name: &str) -> bool {
        self.ints.contains_key(name)
    }

    pub fn get_int_property(&self, name: &str) -> Result<&IndexedProperty<i64>> {
        self.ints.get(name).ok_or_else(|| not_found(name))
    }

    pub fn set_int_property(&mut self, name: impl Into<String>, column: IndexedProperty<i64>) {
        self.ints.insert(name.into(), column);
    }

    pub fn has_real_property(&self, name: &str) -> bool {
        self.reals.contains_key(name)
    }

    pub fn get_real_property(&self, name: &str) -> Result<&IndexedProperty<f64>> {
        self.reals.get(name).ok_or_else(|| not_found(name))
    }

    pub fn set_real_property(&mut self, name: impl Into<String>, column: IndexedProperty<f64>) {
        self.reals.insert(name.into(), column);
    }

    pub fn has_string_property(&self, name: &str) -> bool {
        self.strings.contains_key(name)
    }

    pub fn get_string_property(&self, name: &str) -> Result<&IndexedProperty<String>> {
        self.strings.get(name).ok_or_else(|| not_found(name))
    }

    pub fn set_string_property(&mut self, name: impl Into<String>, column: IndexedProperty<String>) {
        self.strings.insert(name.into(), column);
    }

    /// All column names, in the serializer's kind-then-name order.
    pub fn property_names(&self) -> Vec<&str> {
        self.bools
            .keys()
            .chain(self.reals.keys())
            .chain(self.ints.keys())
            .chain(self.strings.keys())
            .map(String::as_str)
            .collect()
    }

    fn column_count(&self) -> usize {
        self.bools.len() + self.reals.len() + self.ints.len() + self.strings.len()
    }

    fn write_block<W: Write>(&self, out: &mut W, indent: usize) -> Result<()> {
        let pad = " ".repeat(indent);
        let inner = " ".repeat(indent + 2);
        let rows = self.row_count();

        writeln!(out, "{}{}[{}] {{", pad, self.name, rows)?;
        if self.column_count() > 0 {
            writeln!(out, "{}# First column is Index #", inner)?;
        }
        for name in self.property_names() {
            writeln!(out, "{}{}", inner, name)?;
        }
        writeln!(out, "{}:::", inner)?;

        for row in 0..rows {
            write!(out, "{}{}", inner, row + 1)?;
            for column in self.bools.values() {
                write_cell(out, column, row, |v| (if *v { "1" } else { "0" }).to_string())?;
            }
            for column in self.reals.values() {
                write_cell(out, column, row, |v| v.to_string())?;
            }
            for column in self.ints.values() {
                write_cell(out, column, row, |v| v.to_string())?;
            }
            for column in self.strings.values() {
                write_cell(out, column, row, |v| escape_string(v))?;
            }
            writeln!(out)?;
        }

        writeln!(out, "{}:::", inner)?;
        writeln!(out, "{}}}", pad)?;
        Ok(())
    }
}

fn write_cell<W: Write, T>(
    out: &mut W,
    column: &IndexedProperty<T>,
    row: usize,
    format: impl Fn(&T) -> String,
) -> Result<()> {
    if row >= column.len() || !column.is_defined(row) {
        write!(out, " <>")?;
    } else {
        write!(out, " {}", format(&column.values()[row]))?;
    }
    Ok(())
}

impl PartialEq for IndexedBlock {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.bools == other.bools
            && self.ints == other.ints
            && self.strings == other.strings
            && self.reals.len() == other.reals.len()
            && self.reals.iter().all(|(name, column)| {
                other
                    .reals
                    .get(name)
                    .map_or(false, |o| column.eq_by(o, |a, b| reals_equal(*a, *b)))
            })
    }
}

#[derive(Debug)]
enum IndexedEntry {
    Block(Rc<IndexedBlock>),
    Buffered(IndexedBlockBuffer),
}

/// Named indexed blocks of one parent block, in insertion order.
///
/// Two realizations live behind this one type: eagerly parsed blocks, and
/// buffered entries holding undecoded token spans. A buffered entry is
/// materialized (and the result cached) the first time it is fetched; the
/// span buffer is consumed by that transition.
#[derive(Debug, Default)]
pub struct IndexedBlockMap {
    entries: RefCell<Vec<(String, IndexedEntry)>>,
}

impl IndexedBlockMap {
    pub(crate) fn insert_block(&mut self, name: String, block: IndexedBlock) {
        self.insert(name, IndexedEntry::Block(Rc::new(block)));
    }

    pub(crate) fn insert_buffer(&mut self, name: String, buffer: IndexedBlockBuffer) {
        self.insert(name, IndexedEntry::Buffered(buffer));
    }

    fn insert(&mut self, name: String, entry: IndexedEntry) {
        let entries = self.entries.get_mut();
        match entries.iter_mut().find(|(n, _)| *n == name) {
            Some(existing) => existing.1 = entry,
            None => entries.push((name, entry)),
        }
    }

    /// True when an indexed block of this name exists (materialized or
    /// not).
    pub fn has_block(&self, name: &str) -> bool {
        self.entries.borrow().iter().any(|(n, _)| n == name)
    }

    /// Fetches an indexed block by name, materializing a buffered entry on
    /// first access.
    pub fn get(&self, name: &str) -> Result<Rc<IndexedBlock>> {
        let mut entries = self.entries.borrow_mut();
        for (entry_name, entry) in entries.iter_mut() {
            if entry_name != name {
                continue;
            }
            return match entry {
                IndexedEntry::Block(block) => Ok(Rc::clone(block)),
                IndexedEntry::Buffered(buffer) => {
                    let block = Rc::new(buffer.to_indexed_block()?);
                    *entry = IndexedEntry::Block(Rc::clone(&block));
                    Ok(block)
                }
            };
        }
        Err(not_found(name))
    }

    /// Block names in insertion order.
    pub fn names(&self) -> Vec<String> {
        self.entries
            .borrow()
            .iter()
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Number of indexed blocks.
    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    /// True when there are no indexed blocks.
    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}

impl PartialEq for IndexedBlockMap {
    fn eq(&self, other: &Self) -> bool {
        let mut names = self.names();
        let mut other_names = other.names();
        names.sort_unstable();
        other_names.sort_unstable();
        if names != other_names {
            return false;
        }
        names.iter().all(|name| {
            matches!((self.get(name), other.get(name)), (Ok(a), Ok(b)) if a == b)
        })
    }
}

/// One Maestro block: scalar properties, nested sub-blocks, and indexed
/// blocks.
///
/// # Examples
///
/// ```
/// use maestream::Block;
///
/// # fn main() -> maestream::Result<()> {
/// let mut block = Block::new("f_m_ct");
/// block.set_string_property("s_m_title", "benzene");
/// block.set_int_property("i_m_count", 6);
/// block.set_real_property("r_m_energy", -12.5);
/// block.set_bool_property("b_m_minimized", true);
///
/// assert_eq!(block.get_string_property("s_m_title")?, "benzene");
/// assert_eq!(block.get_int_property("i_m_count")?, 6);
/// assert!(block.get_bool_property("b_m_minimized")?);
/// assert!(block.get_real_property("r_m_missing").is_err());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct Block {
    name: String,
    bools: BTreeMap<String, bool>,
    reals: BTreeMap<String, f64>,
    ints: BTreeMap<String, i64>,
    strings: BTreeMap<String, String>,
    sub_blocks: Vec<Block>,
    indexed: IndexedBlockMap,
}

impl Block {
    /// Creates an empty block. The name may be empty for the anonymous
    /// header block.
    pub fn new(name: impl Into<String>) -> Self {
        Block {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Block name, e.g. `f_m_ct`; empty for the anonymous header block.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn has_bool_property(&self, name: &str) -> bool {
        self.bools.contains_key(name)
    }

    pub fn get_bool_property(&self, name: &str) -> Result<bool> {
        self.bools.get(name).copied().ok_or_else(|| not_found(name))
    }

    pub fn set_bool_property(&mut self, name: impl Into<String>, value: bool) {
        self.bools.insert(name.into(), value);
    }

    pub fn has_int_property(&self, name: &str) -> bool {
        self.ints.contains_key(name)
    }

    pub fn get_int_property(&self, name: &str) -> Result<i64> {
        self.ints.get(name).copied().ok_or_else(|| not_found(name))
    }

    pub fn set_int_property(&mut self, name: impl Into<String>, value: i64) {
        self.ints.insert(name.into(), value);
    }

    pub fn has_real_property(&self, name: &str) -> bool {
        self.reals.contains_key(name)
    }

    pub fn get_real_property(&self, name: &str) -> Result<f64> {
        self.reals.get(name).copied().ok_or_else(|| not_found(name))
    }

    pub fn set_real_property(&mut self, name: impl Into<String>, value: f64) {
        self.reals.insert(name.into(), value);
    }

    pub fn has_string_property(&self, name: &str) -> bool {
        self.strings.contains_key(name)
    }

    pub fn get_string_property(&self, name: &str) -> Result<&str> {
        self.strings
            .get(name)
            .map(String::as_str)
            .ok_or_else(|| not_found(name))
    }

    pub fn set_string_property(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.strings.insert(name.into(), value.into());
    }

    /// Attaches a sub-block. A sub-block with the same name is replaced in
    /// place, keeping its position in the insertion order.
    pub fn add_block(&mut self, block: Block) {
        match self.sub_blocks.iter_mut().find(|b| b.name == block.name) {
            Some(existing) => *existing = block,
            None => self.sub_blocks.push(block),
        }
    }

    /// True when a plain sub-block of this name exists.
    pub fn has_block(&self, name: &str) -> bool {
        self.sub_blocks.iter().any(|b| b.name == name)
    }

    /// Fetches a plain sub-block by name.
    pub fn get_block(&self, name: &str) -> Result<&Block> {
        self.sub_blocks
            .iter()
            .find(|b| b.name == name)
            .ok_or_else(|| not_found(name))
    }

    /// Sub-block names in insertion order.
    pub fn block_names(&self) -> Vec<&str> {
        self.sub_blocks.iter().map(|b| b.name.as_str()).collect()
    }

    /// Attaches an indexed block under its own name, replacing any
    /// existing one with that name.
    pub fn add_indexed_block(&mut self, block: IndexedBlock) {
        let name = block.name().to_string();
        self.indexed.insert_block(name, block);
    }

    /// True when an indexed block of this name exists.
    pub fn has_indexed_block(&self, name: &str) -> bool {
        self.indexed.has_block(name)
    }

    /// Fetches an indexed block by name. With the buffered parsing
    /// strategy, the first fetch decodes the block's columns and caches
    /// the result.
    pub fn get_indexed_block(&self, name: &str) -> Result<Rc<IndexedBlock>> {
        self.indexed.get(name)
    }

    /// The indexed blocks of this block.
    pub fn indexed_block_map(&self) -> &IndexedBlockMap {
        &self.indexed
    }

    pub(crate) fn indexed_block_map_mut(&mut self) -> &mut IndexedBlockMap {
        &mut self.indexed
    }

    fn scalar_count(&self) -> usize {
        self.bools.len() + self.reals.len() + self.ints.len() + self.strings.len()
    }

    /// Serializes this block as an outer block, including the trailing
    /// blank line.
    ///
    /// The output round-trips: parsing it yields a block equal to `self`.
    ///
    /// # Examples
    ///
    /// ```
    /// use maestream::Block;
    ///
    /// # fn main() -> maestream::Result<()> {
    /// let mut block = Block::new("f_m_ct");
    /// block.set_string_property("s_m_title", "benzene");
    ///
    /// let mut out = Vec::new();
    /// block.write_to(&mut out)?;
    /// let text = String::from_utf8(out).unwrap();
    /// assert_eq!(text, "f_m_ct {\n  s_m_title\n  :::\n  benzene\n}\n\n");
    /// # Ok(())
    /// # }
    /// ```
    pub fn write_to<W: Write>(&self, out: &mut W) -> Result<()> {
        self.write_block(out, 0)?;
        writeln!(out)?;
        Ok(())
    }

    fn write_block<W: Write>(&self, out: &mut W, indent: usize) -> Result<()> {
        let pad = " ".repeat(indent);
        let inner = " ".repeat(indent + 2);

        if self.name.is_empty() {
            writeln!(out, "{}{{", pad)?;
        } else {
            writeln!(out, "{}{} {{", pad, self.name)?;
        }

        if self.scalar_count() > 0 {
            for name in self.bools.keys() {
                writeln!(out, "{}{}", inner, name)?;
            }
            for name in self.reals.keys() {
                writeln!(out, "{}{}", inner, name)?;
            }
            for name in self.ints.keys() {
                writeln!(out, "{}{}", inner, name)?;
            }
            for name in self.strings.keys() {
                writeln!(out, "{}{}", inner, name)?;
            }
            writeln!(out, "{}:::", inner)?;
            for value in self.bools.values() {
                writeln!(out, "{}{}", inner, if *value { 1 } else { 0 })?;
            }
            for value in self.reals.values() {
                writeln!(out, "{}{}", inner, value)?;
            }
            for value in self.ints.values() {
                writeln!(out, "{}{}", inner, value)?;
            }
            for value in self.strings.values() {
                writeln!(out, "{}{}", inner, escape_string(value))?;
            }
        }

        for name in self.indexed.names() {
            let block = self.indexed.get(&name)?;
            block.write_block(out, indent + 2)?;
        }

        for sub_block in &self.sub_blocks {
            sub_block.write_block(out, indent + 2)?;
        }

        writeln!(out, "{}}}", pad)?;
        Ok(())
    }
}

impl PartialEq for Block {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.bools == other.bools
            && self.ints == other.ints
            && self.strings == other.strings
            && self.reals.len() == other.reals.len()
            && self
                .reals
                .iter()
                .all(|(name, value)| {
                    other
                        .reals
                        .get(name)
                        .map_or(false, |o| reals_equal(*value, *o))
                })
            && self.sub_blocks.len() == other.sub_blocks.len()
            && self
                .sub_blocks
                .iter()
                .all(|sub| other.get_block(&sub.name).map_or(false, |o| sub == o))
            && self.indexed == other.indexed
    }
}

fn not_found(name: &str) -> MaeError {
    MaeError::NotFound {
        name: name.to_string(),
    }
}

/// Applies the Maestro string quoting rule: `""` for the empty string,
/// verbatim when no quoting is needed, otherwise quoted with `"` and `\`
/// escaped.
pub(crate) fn escape_string(value: &str) -> String {
    if value.is_empty() {
        return "\"\"".to_string();
    }
    let needs_quoting = value
        .bytes()
        .any(|b| matches!(b, b'"' | b'\\' | b' ' | b'\t' | b'\r' | b'\n'));
    if !needs_quoting {
        return value.to_string();
    }
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}
