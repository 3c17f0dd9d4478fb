//! Token-level scanning for the Maestro grammar.
//!
//! These free functions advance a [`Buffer`] over the lexical elements the
//! block parser is built from: whitespace with embedded `# ... #` comments,
//! single characters, the `:::` separator, property keys of the form
//! `(b|i|r|s)_<author>_<name>`, and outer block names of the form
//! `(f|p)_<author>_<name>`.
//!
//! Scanners that hold the start of an in-flight token thread it through
//! [`Buffer::load_from`] so a window reload cannot invalidate it.

use crate::buffer::Buffer;
use crate::error::Result;
use std::io::Read;

const BAD_PROPERTY: &str = "Bad format for property; must be (b|i|r|s)_<author>_<name>.";
const BAD_OUTER_NAME: &str = "Bad format for outer block name; must be (f|p)_<author>_<name>.";

/// Consumes a `# ... #` comment, leaving the cursor on the closing `#`.
///
/// Newlines inside comments are permitted and advance the line counter.
fn comment<R: Read>(buffer: &mut Buffer<R>) -> Result<()> {
    buffer.advance(); // opening '#'
    loop {
        if buffer.exhausted() && !buffer.load()? {
            return Err(buffer.syntax_error("Unterminated comment."));
        }
        match buffer.byte() {
            b'#' => return Ok(()),
            b'\n' => buffer.bump_line(),
            _ => {}
        }
        buffer.advance();
    }
}

/// Skips whitespace (` `, `\t`, `\r`, `\n`) and embedded comments.
pub(crate) fn whitespace<R: Read>(buffer: &mut Buffer<R>) -> Result<()> {
    loop {
        if buffer.exhausted() && !buffer.load()? {
            return Ok(());
        }
        match buffer.byte() {
            b'\n' => buffer.bump_line(),
            b'\r' | b' ' | b'\t' => {}
            b'#' => comment(buffer)?,
            _ => return Ok(()),
        }
        buffer.advance();
    }
}

/// Consumes `c` if it is the current byte. EOF counts as a non-match.
pub(crate) fn character<R: Read>(c: u8, buffer: &mut Buffer<R>) -> Result<bool> {
    if buffer.exhausted() && !buffer.load()? {
        return Ok(false);
    }
    if buffer.byte() != c {
        return Ok(false);
    }
    buffer.advance();
    Ok(true)
}

/// Like [`character`], but keeps the byte range from `save` alive across a
/// reload. Returns the match result and the (possibly relocated) save index.
pub(crate) fn character_from<R: Read>(
    c: u8,
    buffer: &mut Buffer<R>,
    save: usize,
) -> Result<(bool, usize)> {
    let save = if buffer.exhausted() {
        match buffer.load_from(save)? {
            Some(s) => s,
            None => return Ok((false, save)),
        }
    } else {
        save
    };
    if buffer.byte() != c {
        return Ok((false, save));
    }
    buffer.advance();
    Ok((true, save))
}

/// Consumes the `:::` separator between name lists and value lists.
pub(crate) fn triple_colon<R: Read>(buffer: &mut Buffer<R>) -> Result<()> {
    for _ in 0..3 {
        if !character(b':', buffer)? {
            return Err(buffer.syntax_error("Bad ':::' token."));
        }
    }
    Ok(())
}

/// Scans the `<author>_<name>` tail shared by property keys and block names.
///
/// The author segment is ASCII letters terminated by `_`; the name segment
/// is the longest non-empty run of bytes outside the token-boundary set
/// (whitespace, `{`, `[`). Returns the relocated save index on success,
/// `None` on any grammar violation (including EOF inside the name).
pub(crate) fn author_name<R: Read>(
    buffer: &mut Buffer<R>,
    mut save: usize,
) -> Result<Option<usize>> {
    loop {
        if buffer.exhausted() {
            match buffer.load_from(save)? {
                Some(s) => save = s,
                None => return Ok(None),
            }
        }
        match buffer.byte() {
            b'_' => {
                buffer.advance();
                break;
            }
            c if c.is_ascii_alphabetic() => buffer.advance(),
            _ => return Ok(None),
        }
    }

    // The name offset stays fixed relative to the save point even when a
    // reload relocates both.
    let name_offset = buffer.pos() - save;
    loop {
        if buffer.exhausted() {
            match buffer.load_from(save)? {
                Some(s) => save = s,
                None => return Ok(None),
            }
        }
        match buffer.byte() {
            b' ' | b'\t' | b'\r' | b'\n' | b'{' | b'[' => {
                if buffer.pos() == save + name_offset {
                    return Ok(None);
                }
                return Ok(Some(save));
            }
            _ => buffer.advance(),
        }
    }
}

/// Reads a `(b|i|r|s)_<author>_<name>` property key.
///
/// Returns `None` when the current byte is `:`, signaling the start of the
/// `:::` terminator of a key list. Property names may themselves contain
/// `:` characters; only the first byte of a key position is special.
pub(crate) fn property_key<R: Read>(buffer: &mut Buffer<R>) -> Result<Option<String>> {
    if !buffer.load()? {
        return Err(buffer.syntax_error("Missing property key."));
    }

    let save = buffer.pos();
    match buffer.byte() {
        b'b' | b'i' | b'r' | b's' => {}
        b':' => return Ok(None),
        _ => return Err(buffer.syntax_error(BAD_PROPERTY)),
    }
    buffer.advance();

    let save = if buffer.exhausted() {
        match buffer.load_from(save)? {
            Some(s) => s,
            None => return Err(buffer.syntax_error(BAD_PROPERTY)),
        }
    } else {
        save
    };
    if buffer.byte() != b'_' {
        return Err(buffer.syntax_error(BAD_PROPERTY));
    }
    buffer.advance();

    match author_name(buffer, save)? {
        Some(save) => Ok(Some(
            String::from_utf8_lossy(buffer.slice(save, buffer.pos())).into_owned(),
        )),
        None => Err(buffer.syntax_error(BAD_PROPERTY)),
    }
}

/// Reads an outer block name: `(f|p)_<author>_<name>`, or the empty string
/// when the block is anonymous (the `{` is left unconsumed).
fn outer_block_name<R: Read>(buffer: &mut Buffer<R>) -> Result<String> {
    if !buffer.load()? {
        return Err(buffer.syntax_error(BAD_OUTER_NAME));
    }

    let save = buffer.pos();
    match buffer.byte() {
        b'{' => return Ok(String::new()),
        b'f' | b'p' => {}
        _ => return Err(buffer.syntax_error(BAD_OUTER_NAME)),
    }
    buffer.advance();

    let (matched, save) = character_from(b'_', buffer, save)?;
    if !matched {
        return Err(buffer.syntax_error(BAD_OUTER_NAME));
    }

    match author_name(buffer, save)? {
        Some(save) => Ok(String::from_utf8_lossy(buffer.slice(save, buffer.pos())).into_owned()),
        None => Err(buffer.syntax_error(BAD_OUTER_NAME)),
    }
}

/// Reads through the opening `{` of a named or anonymous outer block and
/// returns the block name (empty if anonymous).
pub(crate) fn outer_block_beginning<R: Read>(buffer: &mut Buffer<R>) -> Result<String> {
    let name = outer_block_name(buffer)?;
    whitespace(buffer)?;
    if !character(b'{', buffer)? {
        return Err(buffer.syntax_error("Missing '{' for outer block."));
    }
    Ok(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffer(text: &str) -> Buffer<&[u8]> {
        Buffer::new(text.as_bytes())
    }

    fn small_buffer(text: &str, size: usize) -> Buffer<&[u8]> {
        Buffer::with_buffer_size(text.as_bytes(), size)
    }

    #[test]
    fn test_outer_block_beginning_anonymous() {
        let mut b = buffer("{");
        assert_eq!(outer_block_beginning(&mut b).unwrap(), "");
    }

    #[test]
    fn test_outer_block_beginning_named() {
        let mut b = buffer("f_m_ct {");
        assert_eq!(outer_block_beginning(&mut b).unwrap(), "f_m_ct");

        let mut b = buffer("f_m_ct{");
        assert_eq!(outer_block_beginning(&mut b).unwrap(), "f_m_ct");

        // Underscores are allowed in the name segment.
        let mut b = buffer("f_m_ct_block{");
        assert_eq!(outer_block_beginning(&mut b).unwrap(), "f_m_ct_block");
    }

    #[test]
    fn test_outer_block_name_errors() {
        let mut b = buffer("b_m_ct {");
        let err = outer_block_beginning(&mut b).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Line 1, column 1: Bad format for outer block name; \
             must be (f|p)_<author>_<name>."
        );

        let mut b = buffer("f_m {");
        let err = outer_block_beginning(&mut b).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Line 1, column 4: Bad format for outer block name; \
             must be (f|p)_<author>_<name>."
        );

        let mut b = buffer("full_m_ct {");
        let err = outer_block_beginning(&mut b).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Line 1, column 2: Bad format for outer block name; \
             must be (f|p)_<author>_<name>."
        );

        let mut b = buffer("f_m_ct   b_m_foo");
        let err = outer_block_beginning(&mut b).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Line 1, column 10: Missing '{' for outer block."
        );
    }

    #[test]
    fn test_property_key_basic() {
        for key in ["b_m_foo", "r_m_bar", "b_st_1_2_3_4_R_5", "s_author_name"] {
            let s = format!("{} ", key);
            let mut b = buffer(&s);
            assert_eq!(property_key(&mut b).unwrap().as_deref(), Some(key));
        }
    }

    #[test]
    fn test_property_key_separator_sentinel() {
        let mut b = buffer(":::");
        assert_eq!(property_key(&mut b).unwrap(), None);
    }

    #[test]
    fn test_property_key_with_colons() {
        // ':' only matters as the first byte of a key position; inside a
        // name it is an ordinary byte.
        let mut b = buffer("s_m_prop:name::with:::many::::colons ");
        assert_eq!(
            property_key(&mut b).unwrap().as_deref(),
            Some("s_m_prop:name::with:::many::::colons")
        );
    }

    #[test]
    fn test_property_key_across_window_boundary() {
        // Window size chosen to split the second key inside its name.
        let mut b = small_buffer("b_m_foo s_j_bar :::", 14);
        let mut keys = Vec::new();
        loop {
            match property_key(&mut b).unwrap() {
                Some(k) => keys.push(k),
                None => break,
            }
            whitespace(&mut b).unwrap();
        }
        assert_eq!(keys, vec!["b_m_foo", "s_j_bar"]);
    }

    #[test]
    fn test_property_key_errors() {
        let mut b = buffer("bo_m_foo ");
        let err = property_key(&mut b).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Line 1, column 2: Bad format for property; \
             must be (b|i|r|s)_<author>_<name>."
        );

        let mut b = buffer("x_m_foo ");
        let err = property_key(&mut b).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Line 1, column 1: Bad format for property; \
             must be (b|i|r|s)_<author>_<name>."
        );

        // Name segment missing, both at EOF and before whitespace.
        let mut b = buffer("s_m_");
        let err = property_key(&mut b).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Line 1, column 5: Bad format for property; \
             must be (b|i|r|s)_<author>_<name>."
        );

        let mut b = buffer("s_m_ ");
        let err = property_key(&mut b).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Line 1, column 5: Bad format for property; \
             must be (b|i|r|s)_<author>_<name>."
        );
    }

    #[test]
    fn test_triple_colon() {
        let mut b = buffer("::: x");
        triple_colon(&mut b).unwrap();
        assert_eq!(b.pos(), 3);

        let mut b = buffer(":: x");
        let err = triple_colon(&mut b).unwrap_err();
        assert_eq!(err.to_string(), "Line 1, column 3: Bad ':::' token.");
    }

    #[test]
    fn test_whitespace_skips_comments() {
        let mut b = buffer("  # a comment # \t x");
        whitespace(&mut b).unwrap();
        assert_eq!(b.byte(), b'x');
    }

    #[test]
    fn test_whitespace_comment_with_newline() {
        let mut b = buffer("# line one\nline two #\nx");
        whitespace(&mut b).unwrap();
        assert_eq!(b.byte(), b'x');
        assert_eq!(b.line_number(), 3);
    }

    #[test]
    fn test_whitespace_counts_lines() {
        let mut b = buffer("\n\n\t\r\n x");
        whitespace(&mut b).unwrap();
        assert_eq!(b.byte(), b'x');
        assert_eq!(b.line_number(), 4);
    }

    #[test]
    fn test_unterminated_comment() {
        let mut b = buffer("# never closed");
        let err = whitespace(&mut b).unwrap_err();
        assert_eq!(err.to_string(), "Line 1, column 15: Unterminated comment.");
    }

    #[test]
    fn test_character_match() {
        let mut b = buffer("ab");
        assert!(character(b'a', &mut b).unwrap());
        assert!(!character(b'x', &mut b).unwrap());
        assert!(character(b'b', &mut b).unwrap());
        assert!(!character(b'c', &mut b).unwrap()); // EOF
    }
}
