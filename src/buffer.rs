//! Refillable byte buffer over a streaming input.
//!
//! The tokenizer works directly on a window of bytes loaded from the input
//! stream. When the window is exhausted, [`Buffer::load`] replaces it with a
//! freshly read one; [`Buffer::load_from`] additionally relocates the bytes
//! from a caller-designated save point to the front of the new window, so a
//! token that straddles a window boundary stays contiguous.
//!
//! Every routine that holds a byte index while it may trigger a reload MUST
//! route that index through [`Buffer::load_from`] and adopt the returned,
//! possibly relocated index. Violations show up as corrupted tokens near
//! window boundaries, which is why the parser tests run with windows as
//! small as 5 bytes.
//!
//! Windows are reference counted: [`TokenSpans`] keeps retired windows alive
//! so that recorded token offsets stay valid after further reloads. This is
//! what lets the buffered indexed-block parser postpone value decoding until
//! a column is actually requested.

use crate::error::{MaeError, Result};
use std::io::Read;
use std::rc::Rc;

/// Default window size in bytes.
pub const DEFAULT_BUFFER_SIZE: usize = 131072;

/// A sliding window over a byte stream with line/column bookkeeping.
///
/// The cursor is advanced byte-by-byte by the tokenizer; `line_number` is
/// bumped by the whitespace/comment scanner when it consumes a newline.
///
/// # Examples
///
/// ```
/// use maestream::buffer::Buffer;
///
/// # fn main() -> maestream::Result<()> {
/// let mut buffer = Buffer::with_buffer_size("abc".as_bytes(), 2);
/// let mut seen = Vec::new();
/// while buffer.load()? {
///     seen.push(buffer.byte());
///     buffer.advance();
/// }
/// assert_eq!(seen, b"abc");
/// # Ok(())
/// # }
/// ```
pub struct Buffer<R> {
    window: Rc<Vec<u8>>,
    pos: usize,
    source: R,
    window_size: usize,
    generation: u64,
    line_number: usize,
    starting_column: usize,
}

impl<R: Read> Buffer<R> {
    /// Creates a buffer with the default window size.
    pub fn new(source: R) -> Self {
        Self::with_buffer_size(source, DEFAULT_BUFFER_SIZE)
    }

    /// Creates a buffer with an explicit window size.
    ///
    /// Small sizes force frequent reloads and are useful for exercising the
    /// save-point logic in tests. A size of zero falls back to
    /// [`DEFAULT_BUFFER_SIZE`].
    pub fn with_buffer_size(source: R, window_size: usize) -> Self {
        let window_size = if window_size == 0 {
            DEFAULT_BUFFER_SIZE
        } else {
            window_size
        };
        Buffer {
            window: Rc::new(Vec::new()),
            pos: 0,
            source,
            window_size,
            generation: 0,
            line_number: 1,
            starting_column: 1,
        }
    }

    /// Ensures at least one unread byte is available.
    ///
    /// Returns `false` at end of input. Nothing from the current window is
    /// preserved across the reload; callers holding byte indices must use
    /// [`Buffer::load_from`] instead.
    pub fn load(&mut self) -> Result<bool> {
        if self.pos < self.window.len() {
            return Ok(true);
        }
        self.reload(None)
    }

    /// Ensures at least one unread byte is available while keeping the byte
    /// range `[save, pos)` valid.
    ///
    /// On a reload the saved bytes are copied to the front of the new window
    /// and the relocated save index is returned; without a reload the index
    /// comes back unchanged. Returns `None` at end of input (the current
    /// window is left untouched, so `save` remains usable for slicing).
    pub fn load_from(&mut self, save: usize) -> Result<Option<usize>> {
        if self.pos < self.window.len() {
            return Ok(Some(save));
        }
        if self.reload(Some(save))? {
            Ok(Some(0))
        } else {
            Ok(None)
        }
    }

    fn reload(&mut self, save: Option<usize>) -> Result<bool> {
        let saved = match save {
            Some(s) => self.window.len() - s,
            None => 0,
        };
        let mut new_size = self.window_size;
        if saved > new_size / 2 {
            new_size = saved * 2;
        }

        let mut data = vec![0u8; new_size];
        if let Some(s) = save {
            data[..saved].copy_from_slice(&self.window[s..]);
        }

        let mut filled = saved;
        while filled < data.len() {
            let n = self.source.read(&mut data[filled..]).map_err(MaeError::Io)?;
            if n == 0 {
                break;
            }
            filled += n;
        }

        if filled == saved {
            // Nothing new arrived; leave the window unchanged.
            return Ok(false);
        }

        self.starting_column = self.column_of(self.pos);
        data.truncate(filled);
        self.window = Rc::new(data);
        self.pos = saved;
        self.generation += 1;
        Ok(true)
    }

    /// Returns the byte under the cursor.
    ///
    /// Callers must have established availability via [`Buffer::load`] or
    /// [`Buffer::load_from`].
    #[inline]
    pub fn byte(&self) -> u8 {
        self.window[self.pos]
    }

    /// Advances the cursor by one byte.
    #[inline]
    pub fn advance(&mut self) {
        self.pos += 1;
    }

    #[inline]
    pub(crate) fn retreat(&mut self) {
        self.pos -= 1;
    }

    /// Current cursor index into the window.
    #[inline]
    pub fn pos(&self) -> usize {
        self.pos
    }

    /// Logical length of the current window.
    #[inline]
    pub fn window_len(&self) -> usize {
        self.window.len()
    }

    /// True when the cursor has consumed the whole window.
    #[inline]
    pub fn exhausted(&self) -> bool {
        self.pos >= self.window.len()
    }

    /// Bytes in `[start, end)` of the current window.
    pub fn slice(&self, start: usize, end: usize) -> &[u8] {
        &self.window[start..end]
    }

    /// Current line number (1-based, advanced on `\n` by the tokenizer).
    pub fn line_number(&self) -> usize {
        self.line_number
    }

    pub(crate) fn bump_line(&mut self) {
        self.line_number += 1;
    }

    /// Column of the cursor (1-based).
    pub fn column(&self) -> usize {
        self.column_of(self.pos)
    }

    /// Column of an arbitrary window index (1-based).
    ///
    /// Scans back to the previous newline in the window; positions before
    /// the first newline use the column carried over from before the last
    /// reload.
    pub fn column_of(&self, pos: usize) -> usize {
        let mut p = pos;
        while p > 0 {
            p -= 1;
            if self.window[p] == b'\n' {
                return pos - p;
            }
        }
        pos + self.starting_column
    }

    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }

    pub(crate) fn window(&self) -> Rc<Vec<u8>> {
        Rc::clone(&self.window)
    }

    pub(crate) fn syntax_error(&self, message: &str) -> MaeError {
        MaeError::Syntax {
            line: self.line_number,
            column: self.column(),
            message: message.to_string(),
        }
    }

    pub(crate) fn syntax_error_at(&self, pos: usize, message: &str) -> MaeError {
        MaeError::Syntax {
            line: self.line_number,
            column: self.column_of(pos),
            message: message.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Span {
    chunk: usize,
    start: usize,
    end: usize,
}

/// Token offsets recorded against reference-counted buffer windows.
///
/// Used by the buffered indexed-block parser: tokens are located during the
/// parse but decoded only when a column is materialized. A span never
/// crosses windows because reloads relocate the in-flight token into the
/// new window before recording completes.
pub(crate) struct TokenSpans {
    chunks: Vec<Rc<Vec<u8>>>,
    spans: Vec<Span>,
    last_generation: Option<u64>,
}

impl TokenSpans {
    pub(crate) fn new() -> Self {
        TokenSpans {
            chunks: Vec::new(),
            spans: Vec::new(),
            last_generation: None,
        }
    }

    pub(crate) fn reserve(&mut self, tokens: usize) {
        self.spans.reserve(tokens);
    }

    /// Records the span `[start, end)` of the buffer's current window.
    pub(crate) fn record<R: Read>(&mut self, buffer: &Buffer<R>, start: usize, end: usize) {
        let generation = buffer.generation();
        if self.last_generation != Some(generation) {
            self.chunks.push(buffer.window());
            self.last_generation = Some(generation);
        }
        self.spans.push(Span {
            chunk: self.chunks.len() - 1,
            start,
            end,
        });
    }

    /// Returns the bytes of the `index`-th recorded token.
    pub(crate) fn get(&self, index: usize) -> &[u8] {
        let span = &self.spans[index];
        &self.chunks[span.chunk][span.start..span.end]
    }

    pub(crate) fn len(&self) -> usize {
        self.spans.len()
    }
}
