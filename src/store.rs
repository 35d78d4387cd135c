//! Object store.
//!
//! Resolves object numbers to values. Lookups consult, in order, the
//! pending-update map (uncommitted in-memory writes), the age-based object
//! cache, and finally the byte source through the cross-reference table.
//! Every mutation is staged in memory; the byte source is never written.
//!
//! Resolution never fails loudly: a missing entry, a generation mismatch or
//! a malformed object all come back as [`Object::Undefined`].

use crate::cache::ExpiringCache;
use crate::config::OpenOptions;
use crate::decoders::{self, DecodeLimits, DecodedStream};
use crate::encryption::{PayloadKind, SecurityHandler};
use crate::error::{Error, Result};
use crate::object::{Dictionary, DictionaryExt, Object, ObjectRef, Stream, StreamData};
use crate::objstm::{self, ObjectStream};
use crate::parser::{decrypt_strings, read_indirect_at, resolve_stream};
use crate::source::{ByteSource, MemorySource};
use crate::xref::{XRefEntry, XRefLoad, XRefTable};
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::Arc;

/// Generation at which an object number is retired for good.
const MAX_GENERATION: u32 = 65535;

/// Object store for one document.
pub struct ObjectStore {
    source: Box<dyn ByteSource>,
    options: OpenOptions,
    xref: XRefTable,
    trailer: Dictionary,
    cache: ExpiringCache<ObjectRef, Object>,
    stream_cache: ExpiringCache<u32, Arc<ObjectStream>>,
    pending: HashMap<u32, Object>,
    security: Option<SecurityHandler>,
    encrypt_ref: Option<ObjectRef>,
}

impl std::fmt::Debug for ObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectStore")
            .field("slots", &self.xref.len())
            .field("pending", &self.pending.len())
            .field("encrypted", &self.security.is_some())
            .finish()
    }
}

impl ObjectStore {
    /// Store over a byte source and its loaded cross-reference data.
    pub fn new(source: Box<dyn ByteSource>, options: OpenOptions, load: XRefLoad) -> Self {
        let mut xref = load.table;
        xref.ensure_len(1);
        Self {
            source,
            cache: ExpiringCache::new(options.object_cache_ttl),
            stream_cache: ExpiringCache::new(options.object_stream_cache_ttl),
            options,
            xref,
            trailer: load.trailer,
            pending: HashMap::new(),
            security: None,
            encrypt_ref: None,
        }
    }

    /// Empty store for a document built in memory.
    pub fn empty(options: OpenOptions) -> Self {
        let mut xref = XRefTable::new();
        xref.set(
            0,
            XRefEntry::Free {
                next: 0,
                gen: MAX_GENERATION,
            },
        );
        let load = XRefLoad {
            table: xref,
            trailer: Dictionary::new(),
            sections: 0,
        };
        Self::new(Box::new(MemorySource::new(Vec::new())), options, load)
    }

    /// Give the byte source back, dropping everything staged.
    pub fn into_source(self) -> Box<dyn ByteSource> {
        self.source
    }

    /// Options the store was opened with.
    pub fn options(&self) -> &OpenOptions {
        &self.options
    }

    /// Current trailer.
    pub fn trailer(&self) -> &Dictionary {
        &self.trailer
    }

    /// Mutable trailer.
    pub fn trailer_mut(&mut self) -> &mut Dictionary {
        &mut self.trailer
    }

    /// Cross-reference table, including in-memory mutations.
    pub fn xref(&self) -> &XRefTable {
        &self.xref
    }

    /// Entry for an object number.
    pub fn entry(&self, number: u32) -> Option<XRefEntry> {
        self.xref.get(number).copied()
    }

    /// Highest object number in use or reserved.
    pub fn max_object_number(&self) -> u32 {
        self.xref.max_object_number()
    }

    /// Number of in-use objects.
    pub fn object_count(&self) -> usize {
        self.xref.in_use().count()
    }

    /// Install the security handler; `encrypt_ref` is the `/Encrypt` object,
    /// whose own strings are never decrypted.
    pub fn set_security(&mut self, handler: SecurityHandler, encrypt_ref: Option<ObjectRef>) {
        self.security = Some(handler);
        self.encrypt_ref = encrypt_ref;
        self.clear_caches();
    }

    /// Security handler, when the document is encrypted.
    pub fn security(&self) -> Option<&SecurityHandler> {
        self.security.as_ref()
    }

    /// Reference of the `/Encrypt` dictionary, when it is indirect.
    pub fn encrypt_ref(&self) -> Option<ObjectRef> {
        self.encrypt_ref
    }

    /// Try a password against the security handler.
    ///
    /// Cached values hold whatever decryption state was active when they
    /// were read, so a successful authentication drops them.
    pub fn authenticate(&mut self, password: &[u8]) -> bool {
        let ok = self.security.as_mut().is_some_and(|h| h.authenticate(password));
        if ok {
            self.clear_caches();
        }
        ok
    }

    /// True when content can be read as plaintext.
    pub fn is_decryptable(&self) -> bool {
        self.security.as_ref().map_or(true, SecurityHandler::is_authenticated)
    }

    /// Drop every cached object and object stream.
    pub fn clear_caches(&mut self) {
        self.cache.clear();
        self.stream_cache.clear();
    }

    /// Evict expired cache entries; returns how many were dropped.
    pub fn purge_caches(&mut self) -> usize {
        self.cache.purge_expired() + self.stream_cache.purge_expired()
    }

    /// True when an uncommitted write exists for `number`.
    pub fn is_pending(&self, number: u32) -> bool {
        self.pending.contains_key(&number)
    }

    /// Object numbers with uncommitted writes.
    pub fn pending_numbers(&self) -> Vec<u32> {
        let mut numbers: Vec<u32> = self.pending.keys().copied().collect();
        numbers.sort_unstable();
        numbers
    }

    // ------------------------------------------------------------------
    // Resolution
    // ------------------------------------------------------------------

    /// Object `number` at whatever generation the table holds.
    pub fn get(&mut self, number: u32) -> Object {
        match self.entry(number) {
            Some(entry) if !entry.is_free() => self.get_object(ObjectRef::new(number, entry.generation())),
            _ => Object::Undefined,
        }
    }

    /// Resolve a reference. Absent, free, mismatched or malformed objects are
    /// [`Object::Undefined`].
    pub fn get_object(&mut self, reference: ObjectRef) -> Object {
        self.load(reference, 0)
    }

    /// Follow references until a direct value is reached.
    pub fn resolve(&mut self, obj: &Object) -> Object {
        let mut current = obj.clone();
        for _ in 0..self.options.max_recursion_depth {
            match current {
                Object::Reference(r) => current = self.get_object(r),
                other => return other,
            }
        }
        log::warn!("Reference chain from {:?} exceeds the recursion limit", obj.as_reference());
        Object::Undefined
    }

    /// Resolve `obj` and return it when it is a dictionary (or a stream's dictionary).
    pub fn resolve_dict(&mut self, obj: &Object) -> Option<Dictionary> {
        match self.resolve(obj) {
            Object::Dictionary(d) => Some(d),
            Object::Stream(s) => Some(s.dict),
            _ => None,
        }
    }

    fn load(&mut self, reference: ObjectRef, depth: u32) -> Object {
        if reference.is_none() || depth > self.options.max_recursion_depth {
            return Object::Undefined;
        }
        let entry = match self.entry(reference.id) {
            Some(entry) if !entry.is_free() && entry.generation() == reference.gen => entry,
            _ => return Object::Undefined,
        };

        if let Some(obj) = self.pending.get(&reference.id) {
            return obj.clone();
        }
        if let Some(obj) = self.cache.get(&reference) {
            return obj;
        }

        let obj = match entry {
            XRefEntry::Normal { offset: 0, .. } => Object::Undefined,
            XRefEntry::Normal { offset, .. } => self.read_normal(reference, offset, depth),
            XRefEntry::Compressed { stream, index } => self.read_compressed(reference.id, stream, index, depth),
            XRefEntry::Free { .. } => Object::Undefined,
        };

        if !obj.is_undefined() {
            self.cache.insert(reference, obj.clone());
        }
        obj
    }

    fn read_normal(&mut self, reference: ObjectRef, offset: u64, depth: u32) -> Object {
        let raw = match read_indirect_at(self.source.as_mut(), offset, &self.options) {
            Ok(raw) => raw,
            Err(e) => {
                log::debug!("Object {} at byte {} is unreadable: {}", reference, offset, e);
                return Object::Undefined;
            },
        };
        if raw.reference != reference {
            log::warn!("Cross-reference entry for {} points at {}", reference, raw.reference);
            return Object::Undefined;
        }

        let mut obj = match (raw.object, raw.stream_start) {
            (Object::Dictionary(dict), Some(start)) => {
                let length = match dict.get("Length") {
                    Some(Object::Reference(r)) => self.load(*r, depth + 1).as_integer(),
                    Some(other) => other.as_integer(),
                    None => None,
                }
                .filter(|&l| l >= 0)
                .map(|l| l as u64);
                match resolve_stream(self.source.as_mut(), dict, start, length, &self.options) {
                    Ok(stream) => Object::Stream(stream),
                    Err(e) => {
                        log::debug!("Stream {} could not be delimited: {}", reference, e);
                        return Object::Undefined;
                    },
                }
            },
            (obj, _) => obj,
        };

        if self.decrypts_strings_of(reference, &obj) {
            if let Some(handler) = &self.security {
                decrypt_strings(&mut obj, &|bytes| handler.decrypt(bytes, reference, PayloadKind::String).ok());
            }
        }
        obj
    }

    fn decrypts_strings_of(&self, reference: ObjectRef, obj: &Object) -> bool {
        let authenticated = self.security.as_ref().is_some_and(SecurityHandler::is_authenticated);
        authenticated
            && self.encrypt_ref != Some(reference)
            && !obj.as_dict().is_some_and(|d| d.is_type("XRef"))
    }

    fn read_compressed(&mut self, id: u32, stream: u32, index: u32, depth: u32) -> Object {
        let max_depth = self.options.max_recursion_depth;
        match objstm::lookup(stream, id, index, max_depth, |n| self.object_stream(n, depth + 1)) {
            Ok(Some(obj)) => obj,
            Ok(None) => {
                log::debug!("Object {} not found in object stream {}", id, stream);
                Object::Undefined
            },
            Err(e) => {
                log::warn!("Object {} in object stream {}: {}", id, stream, e);
                Object::Undefined
            },
        }
    }

    fn object_stream(&mut self, number: u32, depth: u32) -> Result<Arc<ObjectStream>> {
        if let Some(stream) = self.stream_cache.get(&number) {
            return Ok(stream);
        }
        let reference = match self.entry(number) {
            Some(XRefEntry::Normal { gen, .. }) => ObjectRef::new(number, gen),
            _ => return Err(Error::UnresolvedReference(ObjectRef::new(number, 0))),
        };
        let obj = self.load(reference, depth);
        let stream = obj.as_stream().ok_or(Error::UnresolvedReference(reference))?;
        let decoded = self.decode_stream(stream, reference)?;
        let parsed = Arc::new(ObjectStream::parse(number, &stream.dict, &decoded.data, self.options.max_nesting)?);
        self.stream_cache.insert(number, Arc::clone(&parsed));
        Ok(parsed)
    }

    // ------------------------------------------------------------------
    // Stream payloads
    // ------------------------------------------------------------------

    /// Raw (still filtered) payload of a stream owned by `owner`, decrypted
    /// when the document is encrypted and authenticated.
    ///
    /// Payloads already in memory were produced by this process and are
    /// plaintext.
    pub fn stream_bytes(&mut self, stream: &Stream, owner: ObjectRef) -> Result<Bytes> {
        let (offset, length) = match &stream.data {
            StreamData::Loaded(bytes) => return Ok(bytes.clone()),
            StreamData::Deferred { offset, length } => (*offset, *length),
        };
        let raw = self.source.read_range(offset, length)?;
        if raw.len() < length {
            return Err(Error::malformed(offset, format!("stream {} is truncated", owner)));
        }

        let Some(handler) = self.security.as_ref().filter(|h| h.is_authenticated()) else {
            return Ok(Bytes::from(raw));
        };
        let skip = stream.dict.is_type("XRef")
            || (stream.dict.is_type("Metadata") && !handler.dict().encrypt_metadata)
            || self.encrypt_ref == Some(owner);
        if skip {
            return Ok(Bytes::from(raw));
        }
        Ok(Bytes::from(handler.decrypt(&raw, owner, PayloadKind::Stream)?))
    }

    /// Decode a stream's payload through its filter chain.
    ///
    /// `Filter` and `DecodeParms` entries given as references are resolved first.
    pub fn decode_stream(&mut self, stream: &Stream, owner: ObjectRef) -> Result<DecodedStream> {
        let data = self.stream_bytes(stream, owner)?;
        let mut dict = stream.dict.clone();
        for key in ["Filter", "DecodeParms"] {
            if let Some(value) = dict.get(key).cloned() {
                let resolved = match self.resolve(&value) {
                    Object::Array(items) => Object::Array(items.iter().map(|item| self.resolve(item)).collect()),
                    other => other,
                };
                dict.insert(key.to_string(), resolved);
            }
        }
        decoders::decode_stream(&data, &dict, &DecodeLimits::from(&self.options))
    }

    /// Resolve `owner` and decode it when it is a stream.
    pub fn decode_object_stream(&mut self, owner: ObjectRef) -> Result<DecodedStream> {
        let obj = self.get_object(owner);
        let stream = obj.as_stream().ok_or(Error::UnresolvedReference(owner))?;
        self.decode_stream(stream, owner)
    }

    // ------------------------------------------------------------------
    // Mutation
    // ------------------------------------------------------------------

    /// Stage a new value for an existing object.
    pub fn set_object(&mut self, reference: ObjectRef, obj: Object) -> Result<()> {
        match self.entry(reference.id) {
            Some(entry) if reference.id != 0 && !entry.is_free() && entry.generation() == reference.gen => {
                self.cache.remove(&reference);
                self.stream_cache.remove(&reference.id);
                self.pending.insert(reference.id, obj);
                Ok(())
            },
            _ => Err(Error::UnresolvedReference(reference)),
        }
    }

    /// Add an object, reusing the lowest free object number first.
    ///
    /// A reused slot keeps the generation recorded when it was freed.
    pub fn add_object(&mut self, obj: Object) -> ObjectRef {
        let reusable = (1..self.xref.len() as u32).find(|&n| {
            matches!(self.xref.get(n), Some(XRefEntry::Free { gen, .. }) if *gen < MAX_GENERATION)
        });
        let number = reusable.unwrap_or(self.xref.len().max(1) as u32);
        let gen = match reusable {
            Some(n) => self.xref.get(n).map(XRefEntry::generation).unwrap_or(0),
            None => 0,
        };

        self.xref.set(number, XRefEntry::Normal { offset: 0, gen });
        let reference = ObjectRef::new(number, gen);
        self.cache.remove(&reference);
        self.pending.insert(number, obj);
        reference
    }

    /// Free an object: its slot becomes free with the generation bumped by
    /// one, and any cached value or pending write is dropped.
    pub fn delete_object(&mut self, reference: ObjectRef) -> Result<()> {
        match self.entry(reference.id) {
            Some(entry) if reference.id != 0 && !entry.is_free() && entry.generation() == reference.gen => {
                self.xref.set(
                    reference.id,
                    XRefEntry::Free {
                        next: 0,
                        gen: (reference.gen + 1).min(MAX_GENERATION),
                    },
                );
                self.cache.remove(&reference);
                self.stream_cache.remove(&reference.id);
                self.pending.remove(&reference.id);
                Ok(())
            },
            _ => Err(Error::UnresolvedReference(reference)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoders::encode_flate;
    use crate::xref;

    /// Lay out numbered object bodies with a classic xref table.
    fn build_pdf(objects: &[(u32, &[u8])], trailer_extra: &str) -> Vec<u8> {
        let mut pdf = b"%PDF-1.7\n".to_vec();
        let max = objects.iter().map(|(n, _)| *n).max().unwrap_or(0);
        let mut offsets = vec![None; max as usize + 1];
        for (n, body) in objects {
            offsets[*n as usize] = Some(pdf.len());
            pdf.extend_from_slice(format!("{} 0 obj\n", n).as_bytes());
            pdf.extend_from_slice(body);
            pdf.extend_from_slice(b"\nendobj\n");
        }
        let xref_at = pdf.len();
        pdf.extend_from_slice(format!("xref\n0 {}\n", max + 1).as_bytes());
        for slot in &offsets {
            match slot {
                Some(off) => pdf.extend_from_slice(format!("{:010} 00000 n\r\n", off).as_bytes()),
                None => pdf.extend_from_slice(b"0000000000 65535 f\r\n"),
            }
        }
        pdf.extend_from_slice(
            format!("trailer\n<< /Size {} {} >>\nstartxref\n{}\n%%EOF\n", max + 1, trailer_extra, xref_at).as_bytes(),
        );
        pdf
    }

    fn open(pdf: Vec<u8>) -> ObjectStore {
        let mut source = MemorySource::new(pdf);
        let load = xref::load(&mut source, &OpenOptions::default()).unwrap();
        ObjectStore::new(Box::new(source), OpenOptions::default(), load)
    }

    #[test]
    fn test_get_object_and_generation_mismatch() {
        let mut store = open(build_pdf(&[(1, b"<< /A 1 >>"), (2, b"(two)")], "/Root 1 0 R"));
        assert_eq!(
            store.get_object(ObjectRef::new(1, 0)).as_dict().and_then(|d| d.get_int("A")),
            Some(1)
        );
        assert_eq!(store.get(2), Object::String(b"two".to_vec()));
        assert!(store.get_object(ObjectRef::new(2, 1)).is_undefined());
        assert!(store.get_object(ObjectRef::new(9, 0)).is_undefined());
        assert!(store.get_object(ObjectRef::NONE).is_undefined());
    }

    #[test]
    fn test_indirect_length() {
        let mut store = open(build_pdf(
            &[(1, b"<< /Length 2 0 R >>\nstream\nhello\nendstream"), (2, b"5")],
            "",
        ));
        let obj = store.get_object(ObjectRef::new(1, 0));
        let stream = obj.as_stream().unwrap();
        assert_eq!(&store.stream_bytes(stream, ObjectRef::new(1, 0)).unwrap()[..], b"hello");
    }

    #[test]
    fn test_pending_update_wins_and_delete_bumps_generation() {
        let mut store = open(build_pdf(&[(1, b"(file)")], ""));
        let r = ObjectRef::new(1, 0);
        store.set_object(r, Object::String(b"memory".to_vec())).unwrap();
        assert_eq!(store.get_object(r), Object::String(b"memory".to_vec()));
        assert!(store.is_pending(1));

        store.delete_object(r).unwrap();
        assert_eq!(store.entry(1), Some(XRefEntry::Free { next: 0, gen: 1 }));
        assert!(store.get_object(r).is_undefined());
        assert!(!store.is_pending(1));
        assert!(store.delete_object(r).is_err());
    }

    #[test]
    fn test_add_object_reuses_lowest_free_number() {
        let mut store = open(build_pdf(&[(1, b"1"), (3, b"3")], ""));
        // Slot 2 is free in the file with generation 65535 (retired)
        let first = store.add_object(Object::Integer(10));
        assert_eq!(first, ObjectRef::new(4, 0));

        store.delete_object(ObjectRef::new(1, 0)).unwrap();
        let reused = store.add_object(Object::Integer(11));
        assert_eq!(reused, ObjectRef::new(1, 1));
        assert_eq!(store.get_object(reused), Object::Integer(11));
        assert!(store.get_object(ObjectRef::new(1, 0)).is_undefined());
    }

    #[test]
    fn test_set_object_requires_existing_entry() {
        let mut store = open(build_pdf(&[(1, b"1")], ""));
        assert!(store.set_object(ObjectRef::new(5, 0), Object::Null).is_err());
        assert!(store.set_object(ObjectRef::new(1, 2), Object::Null).is_err());
    }

    #[test]
    fn test_compressed_objects() {
        let payload = b"5 0 6 4 (a) (b)";
        let compressed = encode_flate(payload).unwrap();
        let mut body = format!(
            "<< /Type /ObjStm /N 2 /First 8 /Filter /FlateDecode /Length {} >>\nstream\n",
            compressed.len()
        )
        .into_bytes();
        body.extend_from_slice(&compressed);
        body.extend_from_slice(b"\nendstream");

        let mut store = open(build_pdf(&[(1, b"<< >>"), (4, &body)], ""));
        store.xref.set(5, XRefEntry::Compressed { stream: 4, index: 0 });
        store.xref.set(6, XRefEntry::Compressed { stream: 4, index: 1 });

        assert_eq!(store.get(5), Object::String(b"a".to_vec()));
        assert_eq!(store.get(6), Object::String(b"b".to_vec()));
        assert!(store.get_object(ObjectRef::new(6, 1)).is_undefined());
    }

    fn object_stream_body(header: &str, extends: Option<u32>) -> Vec<u8> {
        let first = header.find('|').unwrap_or(0);
        let payload = header.replace('|', " ");
        let extends = extends.map(|n| format!("/Extends {} 0 R ", n)).unwrap_or_default();
        format!(
            "<< /Type /ObjStm /N 1 /First {} {}/Length {} >>\nstream\n{}\nendstream",
            first + 1,
            extends,
            payload.len(),
            payload
        )
        .into_bytes()
    }

    #[test]
    fn test_compressed_lookup_follows_extends() {
        let newer = object_stream_body("5 0|(newer)", Some(7));
        let base = object_stream_body("8 0|(base)", None);
        let mut store = open(build_pdf(&[(1, b"<< >>"), (4, &newer), (7, &base)], ""));
        store.xref.set(5, XRefEntry::Compressed { stream: 4, index: 0 });
        // Listed against the newer stream but only present in its base
        store.xref.set(8, XRefEntry::Compressed { stream: 4, index: 1 });

        assert_eq!(store.get(5), Object::String(b"newer".to_vec()));
        assert_eq!(store.get(8), Object::String(b"base".to_vec()));
    }

    #[test]
    fn test_self_extending_object_stream_is_undefined() {
        let looping = object_stream_body("5 0|(kept)", Some(4));
        let mut store = open(build_pdf(&[(1, b"<< >>"), (4, &looping)], ""));
        store.xref.set(5, XRefEntry::Compressed { stream: 4, index: 0 });
        store.xref.set(6, XRefEntry::Compressed { stream: 4, index: 1 });

        assert_eq!(store.get(5), Object::String(b"kept".to_vec()));
        assert!(store.get(6).is_undefined());
    }

    #[test]
    fn test_resolve_follows_chains() {
        let mut store = open(build_pdf(&[(1, b"2 0 R"), (2, b"42")], ""));
        assert_eq!(store.resolve(&Object::Reference(ObjectRef::new(1, 0))), Object::Integer(42));
        assert_eq!(store.resolve(&Object::Integer(7)), Object::Integer(7));
    }

    #[test]
    fn test_self_reference_is_undefined() {
        let mut store = open(build_pdf(&[(1, b"1 0 R")], ""));
        assert!(store.resolve(&Object::Reference(ObjectRef::new(1, 0))).is_undefined());
    }

    #[test]
    fn test_empty_store() {
        let mut store = ObjectStore::empty(OpenOptions::default());
        let r = store.add_object(Object::Boolean(true));
        assert_eq!(r, ObjectRef::new(1, 0));
        assert_eq!(store.object_count(), 1);
        assert!(store.is_decryptable());
    }
}
