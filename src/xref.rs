//! Cross-reference resolver.
//!
//! Loads the classic `xref` table and/or compressed cross-reference streams,
//! following `/Prev` from the newest section to the oldest, into one dense
//! [`XRefTable`] indexed by object number.
//!
//! Sections are installed newest first and an entry is only written to a slot
//! no earlier section has claimed, so the most recent incremental update wins.
//! The same first-wins rule applies to overlapping `/Index` ranges inside one
//! stream.

use crate::config::OpenOptions;
use crate::decoders::{DecodeLimits, decode_stream};
use crate::error::{Error, Result};
use crate::lexer::{Token, token};
use crate::object::{Dictionary, DictionaryExt, Object};
use crate::parser::{parse_object, read_indirect_at, resolve_stream};
use crate::source::ByteSource;
use byteorder::{BigEndian, ReadBytesExt};
use lazy_static::lazy_static;
use std::collections::HashSet;
use std::io::Cursor;

lazy_static! {
    static ref RE_HEADER: regex::bytes::Regex =
        regex::bytes::Regex::new(r"%PDF-([0-9])\.([0-9])").expect("static regex");
}

/// Bytes from the start of the file searched for the `%PDF-M.m` header.
pub const HEADER_SEARCH_WINDOW: usize = 1024;

/// Bytes from the end of the file searched for `startxref`.
pub const STARTXREF_SEARCH_WINDOW: usize = 4096;

/// Highest object number a PDF file may use.
pub const MAX_OBJECT_NUMBER: u32 = 8_388_607;

/// Trailer keys filled from older trailers when the newest one lacks them.
const INHERITED_TRAILER_KEYS: [&str; 4] = ["Root", "Info", "ID", "Encrypt"];

/// One slot of the cross-reference table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XRefEntry {
    /// Unused object number
    Free {
        /// Next free object number in the free list
        next: u32,
        /// Generation to use when the number is reused
        gen: u32,
    },
    /// Object stored at a byte offset
    Normal {
        /// Offset of the `N G obj` header (0 for objects that exist only in memory)
        offset: u64,
        /// Generation number
        gen: u32,
    },
    /// Object stored inside an object stream
    Compressed {
        /// Object number of the containing object stream
        stream: u32,
        /// Index of the object within the stream
        index: u32,
    },
}

impl XRefEntry {
    /// Generation number of the entry (always 0 for compressed objects).
    pub fn generation(&self) -> u32 {
        match *self {
            XRefEntry::Free { gen, .. } | XRefEntry::Normal { gen, .. } => gen,
            XRefEntry::Compressed { .. } => 0,
        }
    }

    /// True for free entries.
    pub fn is_free(&self) -> bool {
        matches!(self, XRefEntry::Free { .. })
    }
}

impl Default for XRefEntry {
    fn default() -> Self {
        XRefEntry::Free { next: 0, gen: 0 }
    }
}

/// Dense table with one entry per object number in `[0, len)`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct XRefTable {
    entries: Vec<XRefEntry>,
    claimed: Vec<bool>,
}

impl XRefTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of slots (highest object number + 1).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when the table has no slots.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Highest object number covered by the table.
    pub fn max_object_number(&self) -> u32 {
        self.entries.len().saturating_sub(1) as u32
    }

    /// Grow the table to at least `len` slots; new slots are free.
    ///
    /// Never grows past [`MAX_OBJECT_NUMBER`].
    pub fn ensure_len(&mut self, len: usize) {
        let len = len.min(MAX_OBJECT_NUMBER as usize + 1);
        if self.entries.len() < len {
            self.entries.resize(len, XRefEntry::default());
            self.claimed.resize(len, false);
        }
    }

    /// Entry for an object number, `None` beyond the table.
    pub fn get(&self, number: u32) -> Option<&XRefEntry> {
        self.entries.get(number as usize)
    }

    /// Install an entry unless an earlier (newer) section already claimed the slot.
    ///
    /// Returns true when the entry was written. Numbers above
    /// [`MAX_OBJECT_NUMBER`] are refused.
    pub fn install(&mut self, number: u32, entry: XRefEntry) -> bool {
        if number > MAX_OBJECT_NUMBER {
            log::warn!("Ignoring cross-reference entry for object {} (above the object limit)", number);
            return false;
        }
        self.ensure_len(number as usize + 1);
        let slot = number as usize;
        if self.claimed[slot] {
            return false;
        }
        self.entries[slot] = entry;
        self.claimed[slot] = true;
        true
    }

    /// Overwrite an entry unconditionally. Numbers above
    /// [`MAX_OBJECT_NUMBER`] are ignored.
    pub fn set(&mut self, number: u32, entry: XRefEntry) {
        if number > MAX_OBJECT_NUMBER {
            log::warn!("Ignoring object {} (above the object limit)", number);
            return;
        }
        self.ensure_len(number as usize + 1);
        self.entries[number as usize] = entry;
        self.claimed[number as usize] = true;
    }

    /// Iterate `(object number, entry)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &XRefEntry)> + '_ {
        self.entries.iter().enumerate().map(|(n, e)| (n as u32, e))
    }

    /// Object numbers of in-use entries.
    pub fn in_use(&self) -> impl Iterator<Item = u32> + '_ {
        self.iter().filter(|(_, e)| !e.is_free()).map(|(n, _)| n)
    }
}

/// Result of loading every section reachable from `startxref`.
#[derive(Debug, Clone, PartialEq)]
pub struct XRefLoad {
    /// Merged entry table
    pub table: XRefTable,
    /// Newest trailer, with inherited keys filled in and `Prev`/`XRefStm` removed
    pub trailer: Dictionary,
    /// Number of sections read (table and stream sections both count)
    pub sections: usize,
}

/// Locate the `%PDF-M.m` header within the first [`HEADER_SEARCH_WINDOW`] bytes.
///
/// Returns `(major, minor, offset)`.
pub fn find_header(source: &mut dyn ByteSource) -> Result<(u8, u8, u64)> {
    let head = source.read_range(0, HEADER_SEARCH_WINDOW + 8)?;
    let caps = RE_HEADER
        .captures(&head)
        .ok_or_else(|| Error::InvalidHeader("no %PDF- marker in the first 1024 bytes".into()))?;
    let whole = caps.get(0).map(|m| m.start()).unwrap_or(0);
    if whole >= HEADER_SEARCH_WINDOW {
        return Err(Error::InvalidHeader("%PDF- marker too far into the file".into()));
    }
    let digit = |i: usize| caps.get(i).map(|m| m.as_bytes()[0] - b'0').unwrap_or(0);
    if whole > 0 {
        log::warn!("PDF header found at byte {} (leading junk ignored)", whole);
    }
    Ok((digit(1), digit(2), whole as u64))
}

/// Find the offset named by the last `startxref` keyword in the file tail.
pub fn find_startxref(source: &mut dyn ByteSource) -> Result<u64> {
    let len = source.len();
    let window = (STARTXREF_SEARCH_WINDOW as u64).min(len);
    let tail_start = len - window;
    let tail = source.read_range(tail_start, window as usize)?;

    const KEYWORD: &[u8] = b"startxref";
    let pos = tail
        .windows(KEYWORD.len())
        .rposition(|w| w == KEYWORD)
        .ok_or_else(|| Error::malformed(tail_start, "startxref not found"))?;

    let after = &tail[pos + KEYWORD.len()..];
    match token(after) {
        Ok((_, Token::Integer(offset))) if offset >= 0 => Ok(offset as u64),
        _ => Err(Error::malformed(tail_start + pos as u64, "startxref is not followed by an offset")),
    }
}

/// Load the cross-reference chain starting at the file's `startxref`.
pub fn load(source: &mut dyn ByteSource, options: &OpenOptions) -> Result<XRefLoad> {
    let start = find_startxref(source)?;
    load_from(source, start, options)
}

/// Load the cross-reference chain starting at `offset`.
pub fn load_from(source: &mut dyn ByteSource, offset: u64, options: &OpenOptions) -> Result<XRefLoad> {
    let mut table = XRefTable::new();
    let mut trailer: Option<Dictionary> = None;
    let mut visited = HashSet::new();
    let mut next = Some(offset);
    let mut sections = 0;

    while let Some(offset) = next.take() {
        if !visited.insert(offset) {
            log::warn!("Cross-reference /Prev chain loops back to byte {}; stopping", offset);
            break;
        }

        let section = match read_section(source, offset, &mut table, options) {
            Ok(section) => section,
            // A broken older section still leaves the newer ones usable
            Err(e) if sections > 0 && !options.strict => {
                log::warn!("Ignoring unreadable cross-reference section at byte {}: {}", offset, e);
                break;
            },
            Err(e) => return Err(e),
        };
        sections += section.count;

        next = section.trailer.get_int("Prev").filter(|&p| p >= 0).map(|p| p as u64);
        merge_trailer(&mut trailer, section.trailer);
    }

    let mut trailer = trailer.unwrap_or_default();
    trailer.shift_remove("Prev");
    trailer.shift_remove("XRefStm");
    if let Some(size) = trailer.get_int("Size") {
        // Every slot below /Size costs at least one byte of cross-reference data
        let backed = source.len().min(MAX_OBJECT_NUMBER as u64 + 1) as i64;
        if size > backed {
            log::warn!("Trailer /Size {} exceeds what the file can hold; using {}", size, backed);
        }
        table.ensure_len(size.clamp(0, backed) as usize);
    }

    log::debug!("Loaded {} cross-reference section(s), {} slots", sections, table.len());
    Ok(XRefLoad { table, trailer, sections })
}

/// First trailer seen is the newest; older ones only contribute missing keys.
pub(crate) fn merge_trailer(current: &mut Option<Dictionary>, older: Dictionary) {
    match current {
        None => *current = Some(older),
        Some(newest) => {
            for key in INHERITED_TRAILER_KEYS {
                if !newest.contains_key(key) {
                    if let Some(value) = older.get(key) {
                        newest.insert(key.to_string(), value.clone());
                    }
                }
            }
            if let (Some(a), Some(b)) = (newest.get_int("Size"), older.get_int("Size")) {
                if b > a {
                    newest.insert("Size".into(), Object::from_i64(b));
                }
            }
        },
    }
}

struct Section {
    trailer: Dictionary,
    count: usize,
}

fn read_section(source: &mut dyn ByteSource, offset: u64, table: &mut XRefTable, options: &OpenOptions) -> Result<Section> {
    let peek = source.read_range(offset, 32)?;
    let starts_with_xref = matches!(token(&peek), Ok((_, Token::Keyword(b"xref"))));

    if starts_with_xref {
        let (entries, trailer) = read_classic_table(source, offset, options)?;
        let mut count = 1;

        // Hybrid file: the referenced stream belongs to this revision and takes precedence
        if let Some(stm) = trailer.get_int("XRefStm").filter(|&o| o >= 0) {
            match read_stream_section(source, stm as u64, table, options) {
                Ok(_) => count += 1,
                Err(e) => log::warn!("Ignoring /XRefStm at byte {}: {}", stm, e),
            }
        }
        for (number, entry) in entries {
            table.install(number, entry);
        }
        Ok(Section { trailer, count })
    } else {
        let trailer = read_stream_section(source, offset, table, options)?;
        Ok(Section { trailer, count: 1 })
    }
}

enum TableError {
    Incomplete,
    Malformed(u64, &'static str),
}

/// Read a classic `xref` section and its trailer.
///
/// Entries are returned in file order rather than installed, so a hybrid
/// file's `/XRefStm` can be installed first.
pub fn read_classic_table(
    source: &mut dyn ByteSource,
    offset: u64,
    options: &OpenOptions,
) -> Result<(Vec<(u32, XRefEntry)>, Dictionary)> {
    let total = source.len();
    let mut window = options.read_window.max(1024);
    loop {
        let buf = source.read_range(offset, window)?;
        let at_end = offset + buf.len() as u64 >= total;
        match parse_classic_table(&buf, at_end) {
            Ok(parsed) => return Ok(parsed),
            Err(TableError::Incomplete) => window = window.saturating_mul(2),
            Err(TableError::Malformed(at, reason)) => return Err(Error::malformed(offset + at, reason)),
        }
    }
}

fn parse_classic_table(buf: &[u8], at_end: bool) -> std::result::Result<(Vec<(u32, XRefEntry)>, Dictionary), TableError> {
    let pos = |rest: &[u8]| (buf.len() - rest.len()) as u64;
    let fail = |rest: &[u8], reason| {
        if at_end {
            TableError::Malformed(pos(rest), reason)
        } else {
            TableError::Incomplete
        }
    };

    let mut rest = match token(buf) {
        Ok((rest, Token::Keyword(b"xref"))) => rest,
        _ => return Err(TableError::Malformed(0, "expected xref keyword")),
    };
    let mut entries = Vec::new();

    loop {
        match token(rest) {
            Ok((after, Token::Keyword(b"trailer"))) => {
                let (_, trailer) = parse_object(after).map_err(|_| fail(after, "unreadable trailer dictionary"))?;
                return match trailer {
                    Object::Dictionary(d) => Ok((entries, d)),
                    _ => Err(TableError::Malformed(pos(after), "trailer is not a dictionary")),
                };
            },
            Ok((after, Token::Integer(first))) => {
                let (after, count) = match token(after) {
                    Ok((a, Token::Integer(c))) if c >= 0 => (a, c as u64),
                    _ => return Err(fail(after, "bad subsection header")),
                };
                if first < 0 || first as u64 + count > MAX_OBJECT_NUMBER as u64 + 1 {
                    return Err(TableError::Malformed(pos(rest), "subsection out of range"));
                }
                rest = after;
                for i in 0..count {
                    let (after, entry) = parse_table_line(rest).ok_or_else(|| fail(rest, "bad xref entry"))?;
                    entries.push((first as u32 + i as u32, entry));
                    rest = after;
                }
            },
            _ => return Err(fail(rest, "expected subsection or trailer")),
        }
    }
}

/// One `oooooooooo ggggg n|f` line.
fn parse_table_line(input: &[u8]) -> Option<(&[u8], XRefEntry)> {
    let (rest, Token::Integer(field1)) = token(input).ok()? else {
        return None;
    };
    let (rest, Token::Integer(gen)) = token(rest).ok()? else {
        return None;
    };
    let (rest, Token::Keyword(kind)) = token(rest).ok()? else {
        return None;
    };
    let gen = u32::try_from(gen).ok()?;
    let entry = match kind {
        b"n" => XRefEntry::Normal {
            offset: u64::try_from(field1).ok()?,
            gen,
        },
        b"f" => XRefEntry::Free {
            next: u32::try_from(field1).unwrap_or(0),
            gen,
        },
        _ => return None,
    };
    Some((rest, entry))
}

/// Read a cross-reference stream at `offset`, installing its entries.
///
/// Returns the stream dictionary, which doubles as the section's trailer.
pub fn read_stream_section(
    source: &mut dyn ByteSource,
    offset: u64,
    table: &mut XRefTable,
    options: &OpenOptions,
) -> Result<Dictionary> {
    let raw = read_indirect_at(source, offset, options)?;
    let (dict, start) = match (raw.object, raw.stream_start) {
        (Object::Dictionary(d), Some(start)) => (d, start),
        _ => return Err(Error::malformed(offset, "cross-reference section is neither a table nor a stream")),
    };
    if dict.get_name("Type").is_some_and(|t| t != "XRef") {
        return Err(Error::malformed(offset, "stream is not /Type /XRef"));
    }

    let length = dict.get_int("Length").filter(|&l| l >= 0).map(|l| l as u64);
    let stream = resolve_stream(source, dict, start, length, options)?;
    let (data_offset, data_len) = match stream.data {
        crate::object::StreamData::Deferred { offset, length } => (offset, length),
        crate::object::StreamData::Loaded(_) => (start, 0),
    };
    let raw_bytes = source.read_range(data_offset, data_len)?;
    let decoded = decode_stream(&raw_bytes, &stream.dict, &DecodeLimits::from(options))?.data;

    install_stream_entries(&stream.dict, &decoded, table)?;
    Ok(stream.dict)
}

/// Field widths and subsections of a cross-reference stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamLayout {
    /// Byte widths of the type, second and third fields
    pub widths: [usize; 3],
    /// `(first object, count)` subsections
    pub ranges: Vec<(u32, u32)>,
}

impl StreamLayout {
    /// Read `/W`, `/Index` and `/Size`.
    pub fn from_dict(dict: &Dictionary) -> Result<Self> {
        let w = dict
            .get("W")
            .and_then(Object::as_array)
            .filter(|w| w.len() == 3)
            .ok_or_else(|| Error::StructuralInvariantViolation("xref stream /W must hold three widths".into()))?;
        let mut widths = [0usize; 3];
        for (slot, value) in widths.iter_mut().zip(w) {
            let width = value.as_integer().filter(|&v| (0..=8).contains(&v)).ok_or_else(|| {
                Error::StructuralInvariantViolation("xref stream /W width outside 0..=8".into())
            })?;
            *slot = width as usize;
        }

        if widths.iter().all(|&w| w == 0) {
            return Err(Error::StructuralInvariantViolation("xref stream records have zero width".into()));
        }

        let size = dict.get_int("Size").unwrap_or(0).max(0) as u32;
        let ranges: Vec<(u32, u32)> = match dict.get("Index").and_then(Object::as_array) {
            Some(index) => index
                .chunks_exact(2)
                .filter_map(|pair| {
                    let first = u32::try_from(pair[0].as_integer()?).ok()?;
                    let count = u32::try_from(pair[1].as_integer()?).ok()?;
                    Some((first, count))
                })
                .collect(),
            None => vec![(0, size)],
        };
        if ranges
            .iter()
            .any(|&(first, count)| first as u64 + count as u64 > MAX_OBJECT_NUMBER as u64 + 1)
        {
            return Err(Error::StructuralInvariantViolation(
                "xref stream /Index range exceeds the object limit".into(),
            ));
        }
        Ok(Self { widths, ranges })
    }

    /// Bytes per record.
    pub fn record_len(&self) -> usize {
        self.widths.iter().sum()
    }
}

fn read_field(cursor: &mut Cursor<&[u8]>, width: usize, default: u64) -> Result<u64> {
    if width == 0 {
        return Ok(default);
    }
    cursor
        .read_uint::<BigEndian>(width)
        .map_err(|_| Error::filter("XRef", "truncated cross-reference stream record"))
}

fn install_stream_entries(dict: &Dictionary, data: &[u8], table: &mut XRefTable) -> Result<()> {
    let layout = StreamLayout::from_dict(dict)?;
    let mut cursor = Cursor::new(data);
    let [w0, w1, w2] = layout.widths;

    for &(first, count) in &layout.ranges {
        for i in 0..count {
            if (cursor.position() as usize) + layout.record_len() > data.len() {
                log::warn!("Cross-reference stream ends after {} records", cursor.position() as usize / layout.record_len().max(1));
                return Ok(());
            }
            let kind = read_field(&mut cursor, w0, 1)?;
            let field2 = read_field(&mut cursor, w1, 0)?;
            let field3 = read_field(&mut cursor, w2, 0)?;

            let entry = match kind {
                0 => XRefEntry::Free {
                    next: field2 as u32,
                    gen: field3 as u32,
                },
                1 => XRefEntry::Normal {
                    offset: field2,
                    gen: field3 as u32,
                },
                2 => XRefEntry::Compressed {
                    stream: field2 as u32,
                    index: field3 as u32,
                },
                // Unknown types are treated as null references
                _ => continue,
            };
            table.install(first.saturating_add(i), entry);
        }
    }
    Ok(())
}
