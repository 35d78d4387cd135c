//! Full-document save.
//!
//! Every live object is written once as a plain indirect object, followed by
//! a classic cross-reference table and a fresh trailer. Object streams and
//! cross-reference streams are not reproduced; their contents are written
//! out individually. Output is never encrypted.

use std::io::Write;

use super::object_serializer::ObjectSerializer;
use crate::config::SaveOptions;
use crate::decoders::encode_flate;
use crate::error::{Error, Result};
use crate::object::{Dictionary, DictionaryExt, Object, ObjectRef, Stream};
use crate::store::ObjectStore;

/// Generation of the head of the free list.
const MAX_GENERATION: u32 = 65535;

/// Trailer keys carried over from the loaded trailer.
const KEPT_TRAILER_KEYS: [&str; 2] = ["Root", "Info"];

/// One written object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct XRefRecord {
    number: u32,
    gen: u32,
    offset: u64,
}

/// Serialize the whole document held by `store` into `out`.
///
/// Fails with [`Error::AuthenticationFailure`] when the document is
/// encrypted and no password has been accepted, since payloads could not be
/// decrypted.
pub fn write_document<W: Write>(
    store: &mut ObjectStore,
    version: (u8, u8),
    options: &SaveOptions,
    out: &mut W,
) -> Result<()> {
    if store.security().is_some_and(|h| !h.is_authenticated()) {
        return Err(Error::AuthenticationFailure);
    }
    let serializer = ObjectSerializer::new();
    let encrypt_ref = store.encrypt_ref();

    let mut buf = format!("%PDF-{}.{}\n", version.0, version.1).into_bytes();
    // Binary marker so transfer tools treat the file as binary
    buf.extend_from_slice(b"%\xE2\xE3\xCF\xD3\n");

    let numbers: Vec<u32> = store.xref().in_use().collect();
    let mut records = Vec::with_capacity(numbers.len());
    for number in numbers {
        let Some(entry) = store.entry(number) else { continue };
        let reference = ObjectRef::new(number, entry.generation());
        if Some(reference) == encrypt_ref {
            continue;
        }
        let obj = match store.get_object(reference) {
            Object::Undefined => {
                log::debug!("Object {} could not be loaded; leaving it out", reference);
                continue;
            },
            Object::Stream(stream) if stream.dict.is_type("ObjStm") || stream.dict.is_type("XRef") => continue,
            Object::Stream(stream) => Object::Stream(prepare_stream(store, stream, reference, options)?),
            other => other,
        };
        records.push(XRefRecord {
            number,
            gen: reference.gen,
            offset: buf.len() as u64,
        });
        buf.extend_from_slice(&serializer.serialize_indirect(number, reference.gen, &obj));
    }

    // Trailing free slots keep their generations across a save
    let size = records
        .iter()
        .map(|r| r.number + 1)
        .max()
        .unwrap_or(1)
        .max(store.max_object_number() + 1);
    let free_gens: Vec<u32> = (0..size)
        .map(|n| match n {
            0 => MAX_GENERATION,
            n => store.entry(n).map_or(0, |e| e.generation()),
        })
        .collect();
    let xref_offset = buf.len();
    write_xref_table(&mut buf, &records, &free_gens);

    let trailer = build_trailer(store.trailer(), &records, size);
    buf.extend_from_slice(b"trailer\n");
    buf.extend_from_slice(&serializer.serialize(&Object::Dictionary(trailer)));
    buf.extend_from_slice(format!("\nstartxref\n{}\n%%EOF\n", xref_offset).as_bytes());

    out.write_all(&buf)?;
    out.flush()?;
    log::info!("Saved {} objects ({} bytes)", records.len(), buf.len());
    Ok(())
}

/// Load the payload, decrypting it, and optionally Flate-encode it.
fn prepare_stream(store: &mut ObjectStore, stream: Stream, owner: ObjectRef, options: &SaveOptions) -> Result<Stream> {
    let data = store.stream_bytes(&stream, owner)?;
    let mut dict = stream.dict;
    if options.compress_streams && !dict.contains_key("Filter") && !data.is_empty() {
        let encoded = encode_flate(&data)?;
        dict.insert("Filter".to_string(), Object::name("FlateDecode"));
        dict.shift_remove("DecodeParms");
        return Ok(Stream::new(dict, encoded));
    }
    Ok(Stream::new(dict, data))
}

/// `xref` keyword and a table spanning `0..size`. Numbers with no
/// written object become free entries chained through their offset field,
/// and each run of free or in-use entries gets its own subsection.
fn write_xref_table(buf: &mut Vec<u8>, records: &[XRefRecord], free_gens: &[u32]) {
    let size = free_gens.len();
    let mut slots: Vec<Option<&XRefRecord>> = vec![None; size];
    for record in records {
        slots[record.number as usize] = Some(record);
    }
    let free: Vec<usize> = (0..size).filter(|&n| slots[n].is_none()).collect();

    let lines: Vec<(bool, String)> = (0..size)
        .map(|n| match slots[n] {
            Some(r) => (true, format!("{:010} {:05} n\r\n", r.offset, r.gen)),
            None => {
                let next = free.iter().find(|&&f| f > n).copied().unwrap_or(0);
                (false, format!("{:010} {:05} f\r\n", next, free_gens[n]))
            },
        })
        .collect();

    buf.extend_from_slice(b"xref\n");
    let mut start = 0;
    while start < size {
        let mut end = start + 1;
        while end < size && lines[end].0 == lines[start].0 {
            end += 1;
        }
        buf.extend_from_slice(format!("{} {}\n", start, end - start).as_bytes());
        for (_, line) in &lines[start..end] {
            buf.extend_from_slice(line.as_bytes());
        }
        start = end;
    }
}

/// New trailer: `Size`, surviving `Root`/`Info`, and the original `ID`
/// (a fresh one when the document has none). `Prev`, `XRefStm` and
/// `Encrypt` never survive.
fn build_trailer(old: &Dictionary, records: &[XRefRecord], size: u32) -> Dictionary {
    let written = |r: &ObjectRef| records.iter().any(|rec| rec.number == r.id && rec.gen == r.gen);

    let mut trailer = Dictionary::new();
    trailer.insert("Size".to_string(), Object::from_i64(size as i64));
    for key in KEPT_TRAILER_KEYS {
        match old.get(key) {
            Some(Object::Reference(r)) if written(r) => {
                trailer.insert(key.to_string(), Object::Reference(*r));
            },
            Some(Object::Reference(r)) => log::warn!("Trailer /{} points at missing object {}", key, r),
            Some(direct) => {
                trailer.insert(key.to_string(), direct.clone());
            },
            None => {},
        }
    }

    let id = match old.get("ID").and_then(Object::as_array) {
        Some(ids) if ids.len() == 2 && ids.iter().all(|id| id.as_string().is_some()) => ids.clone(),
        _ => {
            let fresh = Object::String(uuid::Uuid::new_v4().as_bytes().to_vec());
            vec![fresh.clone(), fresh]
        },
    };
    trailer.insert("ID".to_string(), Object::Array(id));
    trailer
}
