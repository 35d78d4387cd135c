//! Hand-assembled PDF fixtures shared by the integration tests.

#![allow(dead_code)]

use pdf_engine::encryption::{
    compute_encryption_key, compute_owner_hash, compute_user_hash, object_key, rc4_crypt, KeyParams,
};
use pdf_engine::object::{Dictionary, Object, ObjectRef};
use pdf_engine::Document;

/// Route `log` output through the test harness; safe to call repeatedly.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Builds a file body object by object, then lays out the cross-reference
/// data with correct offsets.
#[derive(Debug, Clone, Default)]
pub struct PdfBuilder {
    prefix: Vec<u8>,
    version: String,
    objects: Vec<(u32, Vec<u8>)>,
    packed: Vec<(u32, String)>,
    trailer: String,
}

impl PdfBuilder {
    pub fn new() -> Self {
        Self {
            version: "1.7".into(),
            ..Self::default()
        }
    }

    pub fn version(mut self, version: &str) -> Self {
        self.version = version.into();
        self
    }

    /// Bytes written before the `%PDF-` header. Offsets still count from
    /// the first byte of the file.
    pub fn prefix(mut self, junk: &[u8]) -> Self {
        self.prefix = junk.to_vec();
        self
    }

    /// Plain indirect object with the given body text.
    pub fn object(mut self, number: u32, body: &str) -> Self {
        self.objects.push((number, body.as_bytes().to_vec()));
        self
    }

    /// Stream object; `/Length` is filled in.
    pub fn stream(mut self, number: u32, extra_dict: &str, data: &[u8]) -> Self {
        let mut body = format!("<< /Length {} {} >>\nstream\n", data.len(), extra_dict).into_bytes();
        body.extend_from_slice(data);
        body.extend_from_slice(b"\nendstream");
        self.objects.push((number, body));
        self
    }

    /// Object stored inside the object stream written by
    /// [`PdfBuilder::build_with_xref_stream`].
    pub fn packed(mut self, number: u32, body: &str) -> Self {
        self.packed.push((number, body.into()));
        self
    }

    /// Extra trailer entries, e.g. `/Root 1 0 R`.
    pub fn trailer(mut self, entries: &str) -> Self {
        self.trailer = entries.into();
        self
    }

    fn header(&self) -> Vec<u8> {
        let mut out = self.prefix.clone();
        out.extend_from_slice(format!("%PDF-{}\n%\u{e2}\u{e3}\n", self.version).as_bytes());
        out
    }

    fn write_objects(&self, out: &mut Vec<u8>) -> Vec<(u32, usize)> {
        let mut offsets = Vec::new();
        for (number, body) in &self.objects {
            offsets.push((*number, out.len()));
            out.extend_from_slice(format!("{} 0 obj\n", number).as_bytes());
            out.extend_from_slice(body);
            out.extend_from_slice(b"\nendobj\n");
        }
        offsets
    }

    /// File with a classic cross-reference table.
    pub fn build(&self) -> Vec<u8> {
        let mut out = self.header();
        let offsets = self.write_objects(&mut out);
        let size = offsets.iter().map(|(n, _)| n + 1).max().unwrap_or(1);

        let xref = out.len();
        out.extend_from_slice(format!("xref\n0 {}\n", size).as_bytes());
        for n in 0..size {
            match offsets.iter().find(|(num, _)| *num == n) {
                Some((_, offset)) => out.extend_from_slice(format!("{:010} 00000 n\r\n", offset).as_bytes()),
                None => out.extend_from_slice(b"0000000000 65535 f\r\n"),
            }
        }
        out.extend_from_slice(
            format!("trailer\n<< /Size {} {} >>\nstartxref\n{}\n%%EOF\n", size, self.trailer, xref).as_bytes(),
        );
        out
    }

    /// File whose cross-reference data is a stream, with every
    /// [`PdfBuilder::packed`] object inside one object stream.
    pub fn build_with_xref_stream(&self) -> Vec<u8> {
        let mut out = self.header();
        let mut offsets = self.write_objects(&mut out);
        let highest = offsets
            .iter()
            .map(|(n, _)| *n)
            .chain(self.packed.iter().map(|(n, _)| *n))
            .max()
            .unwrap_or(0);

        let objstm_number = highest + 1;
        let mut pairs = String::new();
        let mut bodies = String::new();
        for (number, body) in &self.packed {
            pairs.push_str(&format!("{} {} ", number, bodies.len()));
            bodies.push_str(body);
            bodies.push(' ');
        }
        offsets.push((objstm_number, out.len()));
        out.extend_from_slice(
            format!(
                "{} 0 obj\n<< /Type /ObjStm /N {} /First {} /Length {} >>\nstream\n{}{}\nendstream\nendobj\n",
                objstm_number,
                self.packed.len(),
                pairs.len(),
                pairs.len() + bodies.len(),
                pairs,
                bodies
            )
            .as_bytes(),
        );

        let xref_number = objstm_number + 1;
        let xref_offset = out.len();
        offsets.push((xref_number, xref_offset));
        let size = xref_number + 1;

        // W [1 4 2]
        let mut records = Vec::new();
        for n in 0..size {
            let (kind, field2, field3): (u8, u32, u16) = if let Some((_, offset)) = offsets.iter().find(|(num, _)| *num == n) {
                (1, *offset as u32, 0)
            } else if let Some(index) = self.packed.iter().position(|(num, _)| *num == n) {
                (2, objstm_number, index as u16)
            } else {
                (0, 0, if n == 0 { 0xFFFF } else { 0 })
            };
            records.push(kind);
            records.extend_from_slice(&field2.to_be_bytes());
            records.extend_from_slice(&field3.to_be_bytes());
        }

        out.extend_from_slice(
            format!(
                "{} 0 obj\n<< /Type /XRef /Size {} /W [1 4 2] /Length {} {} >>\nstream\n",
                xref_number,
                size,
                records.len(),
                self.trailer
            )
            .as_bytes(),
        );
        out.extend_from_slice(&records);
        out.extend_from_slice(format!("\nendstream\nendobj\nstartxref\n{}\n%%EOF\n", xref_offset).as_bytes());
        out
    }
}

/// Append an incremental update that replaces or adds `objects` and links
/// back to the previous cross-reference section through `/Prev`.
pub fn append_update(base: &[u8], objects: &[(u32, &str)], trailer: &str) -> Vec<u8> {
    let tail = &base[base.len().saturating_sub(64)..];
    let text = String::from_utf8_lossy(tail);
    let prev: usize = text
        .rsplit("startxref")
        .next()
        .and_then(|rest| rest.split_whitespace().next())
        .and_then(|n| n.parse().ok())
        .unwrap();

    let mut out = base.to_vec();
    let mut offsets = Vec::new();
    for (number, body) in objects {
        offsets.push((*number, out.len()));
        out.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", number, body).as_bytes());
    }
    let size = objects.iter().map(|(n, _)| n + 1).max().unwrap_or(1);
    let xref = out.len();
    out.extend_from_slice(b"xref\n0 1\n0000000000 65535 f\r\n");
    for (number, offset) in offsets {
        out.extend_from_slice(format!("{} 1\n{:010} 00000 n\r\n", number, offset).as_bytes());
    }
    out.extend_from_slice(
        format!(
            "trailer\n<< /Size {} /Prev {} {} >>\nstartxref\n{}\n%%EOF\n",
            size, prev, trailer, xref
        )
        .as_bytes(),
    );
    out
}

/// Catalog (1), page tree (2), `pages` pages from 3 onward, each with its
/// own content stream, plus an Info dictionary.
pub fn simple_pdf(pages: u32) -> Vec<u8> {
    let page_numbers: Vec<u32> = (0..pages).map(|i| 3 + i * 2).collect();
    let kids: Vec<String> = page_numbers.iter().map(|n| format!("{} 0 R", n)).collect();
    let info = 3 + pages * 2;

    let mut builder = PdfBuilder::new()
        .object(1, "<< /Type /Catalog /Pages 2 0 R >>")
        .object(
            2,
            &format!(
                "<< /Type /Pages /Kids [{}] /Count {} /MediaBox [0 0 612 792] >>",
                kids.join(" "),
                pages
            ),
        );
    for (i, &n) in page_numbers.iter().enumerate() {
        builder = builder
            .object(n, &format!("<< /Type /Page /Parent 2 0 R /Contents {} 0 R /Resources << >> >>", n + 1))
            .stream(n + 1, "", format!("0 0 1 rg {} 0 10 10 re f", i * 10).as_bytes());
    }
    builder
        .object(info, "<< /Title (Fixture) /Producer (tests) >>")
        .trailer(&format!("/Root 1 0 R /Info {} 0 R", info))
        .build()
}

/// Small RGB JPEG.
pub fn jpeg(width: u32, height: u32) -> Vec<u8> {
    let pixels: Vec<u8> = (0..width * height).flat_map(|i| [(i * 7 % 256) as u8, 128, 64]).collect();
    let mut out = Vec::new();
    image::codecs::jpeg::JpegEncoder::new(&mut out)
        .encode(&pixels, width, height, image::ColorType::Rgb8)
        .unwrap();
    out
}

pub const FILE_ID: &[u8] = b"0123456789abcdef";

fn hex(data: &[u8]) -> String {
    data.iter().map(|b| format!("{:02X}", b)).collect()
}

/// RC4 128-bit (V2 R3) file. Object 4 holds `/Secret (secret)` encrypted
/// under the user password; the catalog carries no strings.
pub fn encrypted_pdf(user: &[u8], owner: &[u8], secret: &[u8]) -> Vec<u8> {
    let owner_hash = compute_owner_hash(owner, user, 3, 16);
    let params = KeyParams {
        owner_hash: &owner_hash,
        permissions: -4,
        file_id: FILE_ID,
        revision: 3,
        key_length: 16,
        encrypt_metadata: true,
    };
    let key = compute_encryption_key(user, &params);
    let user_hash = compute_user_hash(&key, &params);
    let ciphertext = rc4_crypt(&object_key(&key, 4, 0, false), secret);

    PdfBuilder::new()
        .version("1.4")
        .object(1, "<< /Type /Catalog /Pages 2 0 R >>")
        .object(2, "<< /Type /Pages /Kids [3 0 R] /Count 1 >>")
        .object(3, "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 100 100] >>")
        .object(4, &format!("<< /Secret <{}> >>", hex(&ciphertext)))
        .object(
            5,
            &format!(
                "<< /Filter /Standard /V 2 /R 3 /Length 128 /P -4 /O <{}> /U <{}> >>",
                hex(&owner_hash),
                hex(&user_hash)
            ),
        )
        .trailer(&format!("/Root 1 0 R /Encrypt 5 0 R /ID [<{0}> <{0}>]", hex(FILE_ID)))
        .build()
}

/// Resolve `obj` recursively into a reference-free value. `Parent` links are
/// dropped and streams become dictionaries carrying their decoded bytes under
/// `_data` in place of their encoding keys, so two documents can be compared
/// structurally.
pub fn deep_resolve(doc: &Document, obj: &Object, depth: u32) -> Object {
    if depth > 32 {
        return Object::Null;
    }
    match obj {
        Object::Reference(r) => resolve_reference(doc, *r, depth),
        Object::Array(items) => Object::Array(items.iter().map(|o| deep_resolve(doc, o, depth + 1)).collect()),
        Object::Dictionary(dict) => Object::Dictionary(resolve_dict(doc, dict, depth)),
        other => other.clone(),
    }
}

fn resolve_reference(doc: &Document, r: ObjectRef, depth: u32) -> Object {
    match doc.get_object(r) {
        Object::Stream(stream) => {
            let mut dict = resolve_dict(doc, &stream.dict, depth);
            for key in ["Length", "Filter", "DecodeParms"] {
                dict.shift_remove(key);
            }
            let data = doc.decode_stream(r).map(|d| d.data).unwrap_or_default();
            dict.insert("_data".into(), Object::String(data));
            Object::Dictionary(dict)
        },
        other => deep_resolve(doc, &other, depth + 1),
    }
}

fn resolve_dict(doc: &Document, dict: &Dictionary, depth: u32) -> Dictionary {
    dict.iter()
        .filter(|(k, _)| k.as_str() != "Parent")
        .map(|(k, v)| (k.clone(), deep_resolve(doc, v, depth + 1)))
        .collect()
}
