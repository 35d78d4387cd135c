//! Value parser.
//!
//! [`parse_object`] turns bytes into one [`Object`]; [`read_value`] wraps it
//! and yields [`Object::Undefined`] on malformed input. Indirect objects in a
//! byte source are read in two steps: [`read_indirect_at`] parses the header
//! and value, and when the value is a stream dictionary the caller resolves
//! `Length` (which may itself be an indirect reference) and hands it to
//! [`resolve_stream`].

use crate::config::OpenOptions;
use crate::error::{Error, Result};
use crate::lexer::{Token, skip_ws, token};
use crate::object::{Dictionary, Object, ObjectRef, Stream, StreamData};
use crate::source::ByteSource;
use nom::IResult;

/// Nesting limit used by [`parse_object`].
pub const DEFAULT_MAX_NESTING: usize = 100;

/// Decode escape sequences in a literal string.
///
/// Handles `\n \r \t \b \f \( \) \\`, octal `\ddd`, line continuations and
/// end-of-line normalisation (CR and CRLF become LF). A backslash before any
/// other byte is dropped.
pub fn decode_literal_string_escapes(raw: &[u8]) -> Vec<u8> {
    let mut result = Vec::with_capacity(raw.len());
    let mut i = 0;

    while i < raw.len() {
        match raw[i] {
            b'\\' if i + 1 < raw.len() => {
                let next = raw[i + 1];
                i += 2;
                match next {
                    b'n' => result.push(b'\n'),
                    b'r' => result.push(b'\r'),
                    b't' => result.push(b'\t'),
                    b'b' => result.push(0x08),
                    b'f' => result.push(0x0C),
                    b'\n' => {},
                    b'\r' => {
                        if raw.get(i) == Some(&b'\n') {
                            i += 1;
                        }
                    },
                    b'0'..=b'7' => {
                        let mut octal = (next - b'0') as u32;
                        let mut digits = 1;
                        while digits < 3 {
                            match raw.get(i) {
                                Some(&d @ b'0'..=b'7') => {
                                    octal = octal * 8 + (d - b'0') as u32;
                                    i += 1;
                                    digits += 1;
                                },
                                _ => break,
                            }
                        }
                        result.push((octal & 0xFF) as u8);
                    },
                    other => result.push(other),
                }
            },
            b'\r' => {
                result.push(b'\n');
                i += 1;
                if raw.get(i) == Some(&b'\n') {
                    i += 1;
                }
            },
            b => {
                result.push(b);
                i += 1;
            },
        }
    }

    result
}

/// Decode the digits of a hex string. Whitespace is skipped and an odd
/// trailing digit is padded with `0`.
pub fn decode_hex(hex_bytes: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(hex_bytes.len() / 2);
    let mut high: Option<u8> = None;

    for (i, &c) in hex_bytes.iter().enumerate() {
        if crate::lexer::is_whitespace(c) || c.is_ascii_whitespace() {
            continue;
        }
        let nibble = (c as char)
            .to_digit(16)
            .ok_or_else(|| Error::malformed(i as u64, format!("invalid hex digit '{}'", c as char)))?
            as u8;
        match high.take() {
            Some(h) => out.push((h << 4) | nibble),
            None => high = Some(nibble),
        }
    }
    if let Some(h) = high {
        out.push(h << 4);
    }

    Ok(out)
}

fn fail(input: &[u8]) -> nom::Err<nom::error::Error<&[u8]>> {
    nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Verify))
}

/// Parse one value with the default nesting limit.
///
/// A leading integer is speculatively read as `N G R`; when the reference
/// does not materialize the input position after the integer is returned.
pub fn parse_object(input: &[u8]) -> IResult<&[u8], Object> {
    parse_object_nested(input, DEFAULT_MAX_NESTING)
}

/// Parse one value, allowing at most `depth` levels of array/dictionary nesting.
pub fn parse_object_nested(input: &[u8], depth: usize) -> IResult<&[u8], Object> {
    let (rest, tok) = token(input)?;

    match tok {
        Token::Integer(n) => match try_reference(n, rest) {
            Some((after, reference)) => Ok((after, Object::Reference(reference))),
            None => Ok((rest, Object::from_i64(n))),
        },
        Token::Real(r) => Ok((rest, Object::Real(r))),
        Token::LiteralString(raw) => Ok((rest, Object::String(decode_literal_string_escapes(raw)))),
        Token::HexString(digits) => match decode_hex(digits) {
            Ok(bytes) => Ok((rest, Object::String(bytes))),
            Err(_) => Err(fail(input)),
        },
        Token::Name(name) => Ok((rest, Object::Name(name))),
        Token::True => Ok((rest, Object::Boolean(true))),
        Token::False => Ok((rest, Object::Boolean(false))),
        Token::Null => Ok((rest, Object::Null)),
        Token::ArrayStart if depth > 0 => parse_array(rest, depth - 1),
        Token::DictStart if depth > 0 => parse_dictionary(rest, depth - 1),
        _ => Err(fail(input)),
    }
}

/// Try to read `G R` after an object number.
fn try_reference(id: i64, input: &[u8]) -> Option<(&[u8], ObjectRef)> {
    let id = u32::try_from(id).ok()?;
    let (rest, Token::Integer(gen)) = token(input).ok()? else {
        return None;
    };
    let gen = u32::try_from(gen).ok()?;
    let (rest, Token::R) = token(rest).ok()? else {
        return None;
    };
    Some((rest, ObjectRef::new(id, gen)))
}

fn parse_array(input: &[u8], depth: usize) -> IResult<&[u8], Object> {
    let mut items = Vec::new();
    let mut remaining = input;

    loop {
        let (rest, _) = skip_ws(remaining)?;
        if let Some(after) = rest.strip_prefix(b"]") {
            return Ok((after, Object::Array(items)));
        }
        if rest.is_empty() {
            return Err(fail(input));
        }
        let (rest, item) = parse_object_nested(rest, depth)?;
        items.push(item);
        remaining = rest;
    }
}

fn parse_dictionary(input: &[u8], depth: usize) -> IResult<&[u8], Object> {
    let mut dict = Dictionary::new();
    let mut remaining = input;

    loop {
        let (rest, _) = skip_ws(remaining)?;
        if let Some(after) = rest.strip_prefix(b">>") {
            return Ok((after, Object::Dictionary(dict)));
        }
        let (rest, key) = match token(rest)? {
            (rest, Token::Name(key)) => (rest, key),
            _ => return Err(fail(rest)),
        };
        let (rest, value) = parse_object_nested(rest, depth)?;
        dict.insert(key, value);
        remaining = rest;
    }
}

/// Parse one value, producing [`Object::Undefined`] on malformed input.
pub fn read_value(input: &[u8]) -> Object {
    match parse_object(input) {
        Ok((_, obj)) => obj,
        Err(_) => Object::Undefined,
    }
}

/// Parse the `N G obj` header of an indirect object.
pub fn parse_indirect_header(input: &[u8]) -> IResult<&[u8], ObjectRef> {
    let (rest, id) = match token(input)? {
        (rest, Token::Integer(id)) => (rest, id),
        _ => return Err(fail(input)),
    };
    let (rest, gen) = match token(rest)? {
        (rest, Token::Integer(gen)) => (rest, gen),
        _ => return Err(fail(input)),
    };
    let (rest, _) = match token(rest)? {
        (rest, Token::ObjStart) => (rest, ()),
        _ => return Err(fail(input)),
    };
    let id = u32::try_from(id).map_err(|_| fail(input))?;
    let gen = u32::try_from(gen).map_err(|_| fail(input))?;
    Ok((rest, ObjectRef::new(id, gen)))
}

/// Result of reading an indirect object's header and value.
#[derive(Debug, Clone, PartialEq)]
pub struct RawIndirect {
    /// Reference stated in the `N G obj` header
    pub reference: ObjectRef,
    /// Parsed value (a stream's dictionary when `stream_start` is set)
    pub object: Object,
    /// Absolute offset of the first payload byte, when the value is a stream
    pub stream_start: Option<u64>,
}

enum BodyError {
    Incomplete,
    Malformed(&'static str),
}

fn parse_indirect_body(buf: &[u8], at_end: bool, nesting: usize) -> std::result::Result<(ObjectRef, Object, Option<usize>), BodyError> {
    let retry = |reason| if at_end { BodyError::Malformed(reason) } else { BodyError::Incomplete };

    let (rest, reference) = parse_indirect_header(buf).map_err(|_| retry("bad object header"))?;
    let (rest, object) = parse_object_nested(rest, nesting).map_err(|_| retry("bad object value"))?;

    match token(rest) {
        // A keyword cut by the window (`stre`, `endob`) or a `stream` whose
        // end-of-line is not yet visible needs more bytes
        Ok((after, Token::StreamStart)) if !at_end && after.len() < 2 => Err(BodyError::Incomplete),
        Ok((after, _)) if !at_end && after.is_empty() => Err(BodyError::Incomplete),
        Ok((after, Token::StreamStart)) if matches!(object, Object::Dictionary(_)) => {
            let after = if after.starts_with(b"\r\n") {
                &after[2..]
            } else if after.starts_with(b"\n") || after.starts_with(b"\r") {
                &after[1..]
            } else {
                after
            };
            Ok((reference, object, Some(buf.len() - after.len())))
        },
        Ok(_) => Ok((reference, object, None)),
        Err(_) if !at_end => Err(BodyError::Incomplete),
        Err(_) => Ok((reference, object, None)),
    }
}

/// Read the indirect object whose header starts at `offset`.
///
/// The read window starts at `options.read_window` and doubles until the
/// value parses or the end of the source is reached.
pub fn read_indirect_at(source: &mut dyn ByteSource, offset: u64, options: &OpenOptions) -> Result<RawIndirect> {
    let total = source.len();
    if offset >= total {
        return Err(Error::malformed(offset, "object offset beyond end of file"));
    }

    let mut window = options.read_window.max(256);
    loop {
        let buf = source.read_range(offset, window)?;
        let at_end = offset + buf.len() as u64 >= total;

        match parse_indirect_body(&buf, at_end, options.max_nesting) {
            Ok((reference, object, stream_at)) => {
                return Ok(RawIndirect {
                    reference,
                    object,
                    stream_start: stream_at.map(|p| offset + p as u64),
                });
            },
            Err(BodyError::Incomplete) => window = window.saturating_mul(2),
            Err(BodyError::Malformed(reason)) => return Err(Error::malformed(offset, reason)),
        }
    }
}

/// Build the stream value for a dictionary whose payload starts at `start`.
///
/// With a declared `length`, the bytes after the payload must begin (after
/// whitespace) with `endstream`. Otherwise, when
/// `options.allow_malformed_streams` is set, the payload extends to the next
/// `endstream` keyword.
pub fn resolve_stream(
    source: &mut dyn ByteSource,
    dict: Dictionary,
    start: u64,
    length: Option<u64>,
    options: &OpenOptions,
) -> Result<Stream> {
    if let Some(len) = length {
        let tail = source.read_range(start.saturating_add(len), 64)?;
        let (tail, _) = skip_ws(&tail).unwrap_or((&tail[..], ()));
        if tail.starts_with(b"endstream") {
            return Ok(Stream {
                dict,
                data: StreamData::Deferred {
                    offset: start,
                    length: len as usize,
                },
            });
        }
        log::warn!("Stream at byte {}: Length {} does not end at endstream", start, len);
    }

    if !options.allow_malformed_streams {
        return Err(Error::malformed(start, "stream Length missing or wrong"));
    }

    let len = find_endstream(source, start)?.ok_or_else(|| Error::malformed(start, "endstream not found"))?;
    log::debug!("Recovered stream at byte {} with length {}", start, len);
    Ok(Stream {
        dict,
        data: StreamData::Deferred {
            offset: start,
            length: len as usize,
        },
    })
}

/// Find the payload length of a stream starting at `start` by locating the
/// next `endstream`, dropping the end-of-line that precedes it.
fn find_endstream(source: &mut dyn ByteSource, start: u64) -> Result<Option<u64>> {
    const CHUNK: usize = 64 * 1024;
    const KEYWORD: &[u8] = b"endstream";

    let mut pos = start;
    while pos < source.len() {
        let chunk = source.read_range(pos, CHUNK + KEYWORD.len())?;
        if let Some(idx) = chunk.windows(KEYWORD.len()).position(|w| w == KEYWORD) {
            let mut end = pos + idx as u64;
            let before = source.read_range(end.saturating_sub(2).max(start), 2)?;
            if before.ends_with(b"\r\n") && end >= start + 2 {
                end -= 2;
            } else if (before.ends_with(b"\n") || before.ends_with(b"\r")) && end > start {
                end -= 1;
            }
            return Ok(Some(end - start));
        }
        if chunk.len() <= KEYWORD.len() {
            break;
        }
        pos += CHUNK as u64;
    }

    Ok(None)
}

/// Replace every string inside `obj` with `decrypt(string)`.
pub fn decrypt_strings(obj: &mut Object, decrypt: &dyn Fn(&[u8]) -> Option<Vec<u8>>) {
    match obj {
        Object::String(bytes) => {
            if let Some(plain) = decrypt(bytes) {
                *bytes = plain;
            }
        },
        Object::Array(items) => items.iter_mut().for_each(|item| decrypt_strings(item, decrypt)),
        Object::Dictionary(dict) => dict.values_mut().for_each(|v| decrypt_strings(v, decrypt)),
        Object::Stream(stream) => stream.dict.values_mut().for_each(|v| decrypt_strings(v, decrypt)),
        _ => {},
    }
}
