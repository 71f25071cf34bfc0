//! Escape decoding for string and bytes literals.
//!
//! Error positions follow the reference compiler exactly: text literals are
//! decoded by the `unicodeescape` codec over a buffer in which every
//! non-ASCII character has already been rewritten as a ten-byte `\UXXXXXXXX`
//! escape, so offsets are measured in that buffer rather than in UTF-8.

use crate::grammar::Grammar;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LiteralPrefix {
    pub bytes: bool,
    pub raw: bool,
    pub formatted: bool,
}

/// A string token split into its prefix flags and the body between quotes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Literal<'src> {
    pub prefix: LiteralPrefix,
    pub body: &'src str,
}

impl<'src> Literal<'src> {
    /// Returns `None` for text that is not a complete, well-delimited literal.
    pub fn split(text: &'src str) -> Option<Self> {
        let quote_at = text.find(['"', '\''])?;
        let (prefix_text, quoted) = text.split_at(quote_at);

        let mut prefix = LiteralPrefix::default();
        for c in prefix_text.chars() {
            match c.to_ascii_lowercase() {
                'b' => prefix.bytes = true,
                'r' => prefix.raw = true,
                'f' => prefix.formatted = true,
                'u' => {}
                _ => return None,
            }
        }

        let quote = quoted.as_bytes()[0];
        let triple = quoted.len() >= 6 && quoted.as_bytes()[..3].iter().all(|&b| b == quote);
        let delimiter = if triple { 3 } else { 1 };
        let body = quoted.get(delimiter..quoted.len().checked_sub(delimiter)?)?;
        Some(Self { prefix, body })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    Text(String),
    Bytes(Vec<u8>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The `unicodeescape` codec rejected bytes `start..=end`.
    UnicodeEscape {
        start: usize,
        end: usize,
        reason: &'static str,
    },
    /// A bytes literal `\x` escape without two hex digits.
    InvalidByteEscape { position: Option<usize> },
    NonAsciiBytes,
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::UnicodeEscape { start, end, reason } if start == end => write!(
                f,
                "(unicode error) 'unicodeescape' codec can't decode byte 0x5c in position {start}: {reason}"
            ),
            DecodeError::UnicodeEscape { start, end, reason } => write!(
                f,
                "(unicode error) 'unicodeescape' codec can't decode bytes in position {start}-{end}: {reason}"
            ),
            DecodeError::InvalidByteEscape { position: Some(p) } => {
                write!(f, "(value error) invalid \\x escape at position {p}")
            }
            DecodeError::InvalidByteEscape { position: None } => {
                write!(f, "(value error) invalid \\x escape")
            }
            DecodeError::NonAsciiBytes => {
                write!(f, "bytes can only contain ASCII literal characters.")
            }
        }
    }
}

impl std::error::Error for DecodeError {}

/// Decode a literal body. Raw literals and f-strings are returned verbatim.
pub fn decode(literal: &Literal<'_>, grammar: &Grammar) -> Result<Decoded, DecodeError> {
    let Literal { prefix, body } = *literal;
    if prefix.bytes {
        if !body.is_ascii() {
            return Err(DecodeError::NonAsciiBytes);
        }
        if prefix.raw {
            return Ok(Decoded::Bytes(body.as_bytes().to_vec()));
        }
        return decode_bytes(body.as_bytes(), grammar.features.bytes_escape_positions)
            .map(Decoded::Bytes);
    }
    if prefix.raw || prefix.formatted {
        return Ok(Decoded::Text(body.to_string()));
    }
    decode_text(body, grammar.phrasing.legacy_escape_errors).map(Decoded::Text)
}

// ── Text ──────────────────────────────────────────────────────────────────────

/// Rewrite non-ASCII characters as `\UXXXXXXXX`; a backslash that precedes
/// one (or ends the body) becomes an escaped backslash.
fn escape_non_ascii(body: &str) -> Vec<u8> {
    let mut buf = Vec::with_capacity(body.len());
    let mut chars = body.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' {
            buf.push(b'\\');
            if chars.peek().is_none_or(|next| !next.is_ascii()) {
                buf.extend_from_slice(b"u005c");
                continue;
            }
            if let Some(next) = chars.next() {
                buf.push(next as u8);
            }
        } else if c.is_ascii() {
            buf.push(c as u8);
        } else {
            buf.extend_from_slice(format!("\\U{:08x}", c as u32).as_bytes());
        }
    }
    buf
}

fn codec_error(start: usize, end_exclusive: usize, reason: &'static str) -> DecodeError {
    DecodeError::UnicodeEscape {
        start,
        end: end_exclusive.saturating_sub(1),
        reason,
    }
}

fn decode_text(body: &str, legacy: bool) -> Result<String, DecodeError> {
    let buf = escape_non_ascii(body);
    let end = buf.len();
    let mut out = String::with_capacity(body.len());
    let mut s = 0;

    while s < end {
        if buf[s] != b'\\' {
            out.push(buf[s] as char);
            s += 1;
            continue;
        }
        let start = s;
        s += 1;
        let Some(&escape) = buf.get(s) else {
            return Err(codec_error(start, s, "\\ at end of string"));
        };
        s += 1;

        match escape {
            b'\n' => {}
            b'\\' | b'\'' | b'"' => out.push(escape as char),
            b'a' => out.push('\u{7}'),
            b'b' => out.push('\u{8}'),
            b'f' => out.push('\u{c}'),
            b'n' => out.push('\n'),
            b'r' => out.push('\r'),
            b't' => out.push('\t'),
            b'v' => out.push('\u{b}'),
            b'0'..=b'7' => {
                let mut value = u32::from(escape - b'0');
                for _ in 0..2 {
                    match buf.get(s) {
                        Some(&d @ b'0'..=b'7') => {
                            value = value * 8 + u32::from(d - b'0');
                            s += 1;
                        }
                        _ => break,
                    }
                }
                out.push(char::from_u32(value).unwrap_or(char::REPLACEMENT_CHARACTER));
            }
            b'x' | b'u' | b'U' => {
                let (count, reason) = match escape {
                    b'x' => (2, "truncated \\xXX escape"),
                    b'u' => (4, "truncated \\uXXXX escape"),
                    _ => (8, "truncated \\UXXXXXXXX escape"),
                };
                if legacy && end - s < count {
                    return Err(codec_error(start, end, "end of string in escape sequence"));
                }
                let mut value: u32 = 0;
                let mut remaining = count;
                while remaining > 0 {
                    let Some(digit) = buf.get(s).and_then(|&b| char::from(b).to_digit(16)) else {
                        break;
                    };
                    value = (value << 4) | digit;
                    s += 1;
                    remaining -= 1;
                }
                if remaining > 0 {
                    return Err(codec_error(start, s, reason));
                }
                if value > 0x10FFFF {
                    return Err(codec_error(start, s, "illegal Unicode character"));
                }
                // Lone surrogates are legal in the reference runtime but not in a Rust `String`.
                out.push(char::from_u32(value).unwrap_or(char::REPLACEMENT_CHARACTER));
            }
            b'N' => {
                if buf.get(s) == Some(&b'{') {
                    s += 1;
                    let name_start = s;
                    while s < end && buf[s] != b'}' {
                        s += 1;
                    }
                    if s > name_start && s < end {
                        let name = String::from_utf8_lossy(&buf[name_start..s]);
                        s += 1;
                        match unicode_names2::character(&name.to_ascii_uppercase()) {
                            Some(c) => {
                                out.push(c);
                                continue;
                            }
                            None => {
                                return Err(codec_error(start, s, "unknown Unicode character name"));
                            }
                        }
                    }
                }
                return Err(codec_error(start, s, "malformed \\N character escape"));
            }
            other => {
                out.push('\\');
                out.push(other as char);
            }
        }
    }

    Ok(out)
}

// ── Bytes ─────────────────────────────────────────────────────────────────────

fn decode_bytes(body: &[u8], with_positions: bool) -> Result<Vec<u8>, DecodeError> {
    let mut out = Vec::with_capacity(body.len());
    let mut s = 0;

    while s < body.len() {
        if body[s] != b'\\' {
            out.push(body[s]);
            s += 1;
            continue;
        }
        let start = s;
        s += 1;
        let Some(&escape) = body.get(s) else {
            out.push(b'\\');
            break;
        };
        s += 1;

        match escape {
            b'\n' => {}
            b'\\' | b'\'' | b'"' => out.push(escape),
            b'a' => out.push(0x07),
            b'b' => out.push(0x08),
            b'f' => out.push(0x0c),
            b'n' => out.push(b'\n'),
            b'r' => out.push(b'\r'),
            b't' => out.push(b'\t'),
            b'v' => out.push(0x0b),
            b'0'..=b'7' => {
                let mut value = u32::from(escape - b'0');
                for _ in 0..2 {
                    match body.get(s) {
                        Some(&d @ b'0'..=b'7') => {
                            value = value * 8 + u32::from(d - b'0');
                            s += 1;
                        }
                        _ => break,
                    }
                }
                out.push((value & 0xff) as u8);
            }
            b'x' => {
                let hex = |i: usize| body.get(i).and_then(|&b| char::from(b).to_digit(16));
                match (hex(s), hex(s + 1)) {
                    (Some(hi), Some(lo)) => {
                        out.push((hi * 16 + lo) as u8);
                        s += 2;
                    }
                    _ => {
                        return Err(DecodeError::InvalidByteEscape {
                            position: with_positions.then_some(start),
                        });
                    }
                }
            }
            other => {
                out.push(b'\\');
                out.push(other);
            }
        }
    }

    Ok(out)
}
