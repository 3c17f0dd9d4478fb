//! Typed value parsers for scalar and indexed-block cells.
//!
//! All value parsers terminate on whitespace; the integer parser also stops
//! at `]` so it can read block-index expressions like `m_atom[123]`. The
//! `<>` undefined marker is not handled here; only the indexed-block cell
//! scanners recognize it.

use crate::buffer::Buffer;
use crate::error::Result;
use std::io::Read;

/// Reads a decimal integer with an optional single leading `-`.
///
/// The value is accumulated digit-by-digit, so no save point is needed
/// across window reloads.
pub(crate) fn parse_int<R: Read>(buffer: &mut Buffer<R>) -> Result<i64> {
    let mut value: i64 = 0;
    let mut sign: i64 = 1;
    let mut seen = false;

    loop {
        if buffer.exhausted() && !buffer.load()? {
            break;
        }
        match buffer.byte() {
            b']' | b' ' | b'\t' | b'\r' | b'\n' => {
                if !seen {
                    return Err(buffer.syntax_error("Missing integer."));
                }
                return Ok(value * sign);
            }
            c @ b'0'..=b'9' => {
                value = value.wrapping_mul(10).wrapping_add(i64::from(c - b'0'));
                seen = true;
            }
            b'-' => {
                if sign == -1 || value != 0 {
                    return Err(buffer.syntax_error("Unexpected '-'."));
                }
                sign = -1;
                seen = true;
            }
            _ => return Err(buffer.syntax_error("Unexpected character.")),
        }
        buffer.advance();
    }

    if !seen {
        return Err(buffer.syntax_error("Missing integer."));
    }
    Ok(value * sign)
}

/// Reads a real number: the longest prefix of `[-.0-9eE]` terminated by
/// whitespace or EOF, decoded with the platform's strict double parser.
pub(crate) fn parse_real<R: Read>(buffer: &mut Buffer<R>) -> Result<f64> {
    let mut save = buffer.pos();
    loop {
        if buffer.exhausted() {
            match buffer.load_from(save)? {
                Some(s) => save = s,
                None => break,
            }
        }
        match buffer.byte() {
            b'-' | b'.' | b'0'..=b'9' | b'e' | b'E' => buffer.advance(),
            b' ' | b'\t' | b'\r' | b'\n' => break,
            _ => return Err(buffer.syntax_error("Unexpected character in real number.")),
        }
    }

    if save == buffer.pos() {
        return Err(buffer.syntax_error("Missing real."));
    }

    let start = save;
    let token = buffer.slice(save, buffer.pos());
    match decode_real(token) {
        Ok(value) => Ok(value),
        Err(offset) => Err(buffer.syntax_error_at(start + offset, "Bad real number.")),
    }
}

/// Decodes a real-number token, or reports the byte offset of the first
/// structurally invalid byte.
pub(crate) fn decode_real(token: &[u8]) -> std::result::Result<f64, usize> {
    // The scanner only admits ASCII bytes, so UTF-8 conversion cannot fail.
    if let Ok(text) = std::str::from_utf8(token) {
        if let Ok(value) = text.parse::<f64>() {
            return Ok(value);
        }
    }
    Err(first_bad_real_byte(token))
}

/// Locates the first byte violating `[-]digits[.digits][(e|E)[-]digits]`.
fn first_bad_real_byte(token: &[u8]) -> usize {
    let n = token.len();
    let mut i = 0;
    if i < n && token[i] == b'-' {
        i += 1;
    }
    let mut digits = 0;
    while i < n && token[i].is_ascii_digit() {
        i += 1;
        digits += 1;
    }
    if i < n && token[i] == b'.' {
        i += 1;
        while i < n && token[i].is_ascii_digit() {
            i += 1;
            digits += 1;
        }
    }
    if digits == 0 {
        return i.min(n.saturating_sub(1));
    }
    if i < n && (token[i] == b'e' || token[i] == b'E') {
        let marker = i;
        i += 1;
        if i < n && (token[i] == b'-' || token[i] == b'+') {
            i += 1;
        }
        let exponent_digits = i;
        while i < n && token[i].is_ascii_digit() {
            i += 1;
        }
        if i == exponent_digits {
            return marker;
        }
    }
    if i < n {
        return i;
    }
    0
}

/// Reads a boolean: exactly `0` or `1` followed by whitespace or EOF.
pub(crate) fn parse_bool<R: Read>(buffer: &mut Buffer<R>) -> Result<bool> {
    const BAD_BOOL: &str = "Unexpected character for boolean value.";

    if !buffer.load()? {
        return Err(buffer.syntax_error(BAD_BOOL));
    }
    let value = match buffer.byte() {
        b'1' => true,
        b'0' => false,
        _ => return Err(buffer.syntax_error(BAD_BOOL)),
    };
    buffer.advance();

    if buffer.exhausted() && !buffer.load()? {
        return Ok(value);
    }
    match buffer.byte() {
        b' ' | b'\t' | b'\r' | b'\n' => Ok(value),
        _ => Err(buffer.syntax_error(BAD_BOOL)),
    }
}

/// Reads a string value.
///
/// Unquoted strings run to the next whitespace (or EOF) and are taken
/// verbatim. Quoted strings run to the next unescaped `"`; the stored value
/// has the quotes stripped and `\` escapes collapsed.
pub(crate) fn parse_string<R: Read>(buffer: &mut Buffer<R>) -> Result<String> {
    if buffer.exhausted() && !buffer.load()? {
        return Ok(String::new());
    }

    if buffer.byte() != b'"' {
        let mut save = buffer.pos();
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
        return Ok(String::from_utf8_lossy(buffer.slice(save, buffer.pos())).into_owned());
    }

    buffer.advance();
    let mut save = buffer.pos();
    loop {
        if buffer.exhausted() {
            match buffer.load_from(save)? {
                Some(s) => save = s,
                None => {
                    return Err(buffer.syntax_error("Unterminated quoted string at EOF."));
                }
            }
        }
        match buffer.byte() {
            b'"' => {
                let raw = buffer.slice(save, buffer.pos()).to_vec();
                buffer.advance();
                return Ok(remove_escapes(&raw));
            }
            b'\\' => {
                buffer.advance();
                if buffer.exhausted() {
                    match buffer.load_from(save)? {
                        Some(s) => save = s,
                        None => {
                            return Err(buffer.syntax_error("Unterminated quoted string at EOF."));
                        }
                    }
                }
                buffer.advance();
            }
            _ => buffer.advance(),
        }
    }
}

/// Collapses `\x` escape pairs to `x`.
pub(crate) fn remove_escapes(raw: &[u8]) -> String {
    let mut out = Vec::with_capacity(raw.len());
    let mut i = 0;
    while i < raw.len() {
        if raw[i] == b'\\' {
            i += 1;
            if i >= raw.len() {
                break;
            }
        }
        out.push(raw[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}
