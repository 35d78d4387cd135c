//! Cross-reference recovery for damaged files.
//!
//! When `startxref` is missing or the chain it leads to has no usable
//! catalog, the whole file is scanned for `N G obj` headers. Later
//! definitions of the same object number replace earlier ones, matching the
//! order incremental updates are appended in. Cross-reference streams found
//! by the scan contribute their compressed entries, since objects packed in
//! object streams have no header of their own.

use crate::config::OpenOptions;
use crate::error::{Error, Result};
use crate::lexer::{CharClass, char_class};
use crate::object::{Dictionary, DictionaryExt, Object, ObjectRef};
use crate::parser::{parse_object, read_indirect_at};
use crate::source::ByteSource;
use crate::xref::{XRefEntry, XRefLoad, XRefTable, merge_trailer, read_stream_section};
use lazy_static::lazy_static;
use regex::bytes::Regex;

lazy_static! {
    static ref RE_OBJ_HEADER: Regex =
        Regex::new(r"([0-9]{1,10})[\x00\t\n\x0C\r ]+([0-9]{1,5})[\x00\t\n\x0C\r ]+obj").expect("static regex");
    static ref RE_TRAILER: Regex = Regex::new(r"trailer[\x00\t\n\x0C\r ]*<<").expect("static regex");
    static ref RE_TYPE_XREF: Regex = Regex::new(r"/Type[\x00\t\n\x0C\r ]*/XRef(?-u:\b)").expect("static regex");
    static ref RE_TYPE_CATALOG: Regex = Regex::new(r"/Type[\x00\t\n\x0C\r ]*/Catalog(?-u:\b)").expect("static regex");
}

/// Object header found by the scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Header {
    offset: u64,
    reference: ObjectRef,
}

/// Rebuild the cross-reference table and trailer by scanning every byte.
pub fn reconstruct(source: &mut dyn ByteSource, options: &OpenOptions) -> Result<XRefLoad> {
    log::info!("Reconstructing cross-reference table by scanning {} bytes", source.len());
    let contents = source.read_range(0, source.len() as usize)?;

    let headers = scan_headers(&contents);
    if headers.is_empty() {
        return Err(Error::StructuralInvariantViolation("no objects found while scanning file".into()));
    }

    let mut table = XRefTable::new();
    for header in &headers {
        table.set(
            header.reference.id,
            XRefEntry::Normal {
                offset: header.offset,
                gen: header.reference.gen,
            },
        );
    }
    log::debug!("Scan found {} object headers", headers.len());

    // Objects packed in object streams are only listed by xref streams
    for offset in owning_headers(&headers, &contents, &RE_TYPE_XREF) {
        let mut packed = XRefTable::new();
        match read_stream_section(source, offset, &mut packed, options) {
            Ok(_) => {
                for (number, entry) in packed.iter() {
                    if let XRefEntry::Compressed { .. } = entry {
                        if table.get(number).map_or(true, XRefEntry::is_free) {
                            table.set(number, *entry);
                        }
                    }
                }
            },
            Err(e) => log::debug!("Skipping damaged xref stream at byte {}: {}", offset, e),
        }
    }

    let mut trailer = scan_trailers(&contents).unwrap_or_default();
    let root_ok = trailer
        .get_ref("Root")
        .is_some_and(|r| table.get(r.id).is_some_and(|e| !e.is_free()));
    if !root_ok {
        let catalog = owning_headers(&headers, &contents, &RE_TYPE_CATALOG)
            .into_iter()
            .rev()
            .find_map(|offset| {
                let raw = read_indirect_at(source, offset, options).ok()?;
                raw.object.as_dict().filter(|d| d.is_type("Catalog")).map(|_| raw.reference)
            })
            .ok_or_else(|| Error::StructuralInvariantViolation("no document catalog found while scanning".into()))?;
        log::warn!("Using catalog {} found by scanning", catalog);
        trailer.insert("Root".into(), Object::Reference(catalog));
    }

    trailer.shift_remove("Prev");
    trailer.shift_remove("XRefStm");
    trailer.insert("Size".into(), Object::from_i64(table.len() as i64));

    Ok(XRefLoad {
        table,
        trailer,
        sections: 0,
    })
}

fn scan_headers(contents: &[u8]) -> Vec<Header> {
    let mut headers = Vec::new();
    for caps in RE_OBJ_HEADER.captures_iter(contents) {
        let (Some(whole), Some(id), Some(gen)) = (caps.get(0), caps.get(1), caps.get(2)) else {
            continue;
        };
        // Reject matches glued to a preceding number or word
        if whole.start() > 0 && char_class(contents[whole.start() - 1]) != CharClass::Whitespace {
            continue;
        }
        // `obj` must not continue into a longer keyword such as `objx`
        if contents
            .get(whole.end())
            .is_some_and(|&b| matches!(char_class(b), CharClass::Regular | CharClass::Numeric))
        {
            continue;
        }
        let parse = |bytes: &[u8]| std::str::from_utf8(bytes).ok()?.parse::<u32>().ok();
        if let (Some(id), Some(gen)) = (parse(id.as_bytes()), parse(gen.as_bytes())) {
            headers.push(Header {
                offset: whole.start() as u64,
                reference: ObjectRef::new(id, gen),
            });
        }
    }
    headers
}

/// Offsets of the object headers that contain each match of `pattern`.
fn owning_headers(headers: &[Header], contents: &[u8], pattern: &Regex) -> Vec<u64> {
    let mut offsets: Vec<u64> = pattern
        .find_iter(contents)
        .filter_map(|m| {
            let idx = headers.partition_point(|h| h.offset <= m.start() as u64);
            idx.checked_sub(1).map(|i| headers[i].offset)
        })
        .collect();
    offsets.dedup();
    offsets
}

/// Merge every `trailer` dictionary, newest (last in the file) first.
fn scan_trailers(contents: &[u8]) -> Option<Dictionary> {
    let mut merged = None;
    let found: Vec<Dictionary> = RE_TRAILER
        .find_iter(contents)
        .filter_map(|m| {
            let dict_start = m.end() - 2;
            match parse_object(&contents[dict_start..]) {
                Ok((_, Object::Dictionary(d))) => Some(d),
                _ => None,
            }
        })
        .collect();
    for trailer in found.into_iter().rev() {
        merge_trailer(&mut merged, trailer);
    }
    merged
}
