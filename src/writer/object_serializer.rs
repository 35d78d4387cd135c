//! Object serialization.
//!
//! Turns [`Object`] values back into file syntax. Writing goes straight into
//! a `Vec<u8>`, so nothing here can fail.

use crate::lexer::is_regular;
use crate::object::{Dictionary, Object, Stream, StreamData};

/// Serializer for objects.
#[derive(Debug, Clone, Default)]
pub struct ObjectSerializer {
    /// Whether to use compact formatting (no newlines inside dictionaries)
    compact: bool,
}

impl ObjectSerializer {
    /// Serializer that puts each dictionary entry on its own line.
    pub fn new() -> Self {
        Self::default()
    }

    /// Serializer with minimal whitespace.
    pub fn compact() -> Self {
        Self { compact: true }
    }

    /// Serialize an object to bytes.
    pub fn serialize(&self, obj: &Object) -> Vec<u8> {
        let mut buf = Vec::new();
        self.write_object(&mut buf, obj);
        buf
    }

    /// Serialize an object to a string (for debugging).
    pub fn serialize_to_string(&self, obj: &Object) -> String {
        String::from_utf8_lossy(&self.serialize(obj)).into_owned()
    }

    /// Serialize an indirect object definition:
    /// `{id} {gen} obj\n{object}\nendobj\n`.
    pub fn serialize_indirect(&self, id: u32, gen: u32, obj: &Object) -> Vec<u8> {
        let mut buf = format!("{} {} obj\n", id, gen).into_bytes();
        self.write_object(&mut buf, obj);
        buf.extend_from_slice(b"\nendobj\n");
        buf
    }

    /// Append `obj` to `buf`.
    pub fn write_object(&self, buf: &mut Vec<u8>, obj: &Object) {
        match obj {
            Object::Null | Object::Undefined | Object::Image(_) | Object::Form(_) => buf.extend_from_slice(b"null"),
            Object::Boolean(b) => buf.extend_from_slice(if *b { b"true" } else { b"false" }),
            Object::Integer(i) => buf.extend_from_slice(i.to_string().as_bytes()),
            Object::Unsigned(u) => buf.extend_from_slice(u.to_string().as_bytes()),
            Object::Real(r) => write_real(buf, *r),
            Object::String(s) => write_string(buf, s),
            Object::Name(n) => write_name(buf, n),
            Object::Array(arr) => {
                buf.push(b'[');
                for (i, item) in arr.iter().enumerate() {
                    if i > 0 {
                        buf.push(b' ');
                    }
                    self.write_object(buf, item);
                }
                buf.push(b']');
            },
            Object::Dictionary(dict) => self.write_dictionary(buf, dict),
            Object::Stream(stream) => self.write_stream(buf, stream),
            Object::Reference(r) => buf.extend_from_slice(format!("{} {} R", r.id, r.gen).as_bytes()),
        }
    }

    /// Write a dictionary in insertion order.
    fn write_dictionary(&self, buf: &mut Vec<u8>, dict: &Dictionary) {
        buf.extend_from_slice(b"<<");
        for (key, value) in dict {
            buf.extend_from_slice(if self.compact { b" " } else { b"\n  " });
            write_name(buf, key);
            buf.push(b' ');
            self.write_object(buf, value);
        }
        buf.extend_from_slice(if self.compact || dict.is_empty() { b" >>" } else { b"\n>>" });
    }

    /// Write a stream whose payload is in memory. `Length` always matches
    /// the bytes written.
    fn write_stream(&self, buf: &mut Vec<u8>, stream: &Stream) {
        let data: &[u8] = match &stream.data {
            StreamData::Loaded(bytes) => bytes,
            StreamData::Deferred { offset, .. } => {
                log::warn!("Stream at byte {} was not loaded before writing; writing it empty", offset);
                &[]
            },
        };
        let mut dict = stream.dict.clone();
        dict.insert("Length".to_string(), Object::from_i64(data.len() as i64));
        self.write_dictionary(buf, &dict);
        buf.extend_from_slice(b"\nstream\n");
        buf.extend_from_slice(data);
        buf.extend_from_slice(b"\nendstream");
    }
}

/// Reals with at most five decimals and no trailing zeros.
fn write_real(buf: &mut Vec<u8>, value: f32) {
    if !value.is_finite() {
        buf.push(b'0');
    } else if value.fract() == 0.0 && value.abs() < 1e9 {
        buf.extend_from_slice((value as i64).to_string().as_bytes());
    } else {
        let formatted = format!("{:.5}", value);
        let trimmed = formatted.trim_end_matches('0').trim_end_matches('.');
        buf.extend_from_slice(if trimmed == "-0" { "0" } else { trimmed }.as_bytes());
    }
}

/// Literal `(...)` for printable text, hex `<...>` otherwise.
fn write_string(buf: &mut Vec<u8>, data: &[u8]) {
    let printable = data
        .iter()
        .all(|&b| b == b'\n' || b == b'\r' || b == b'\t' || (0x20..=0x7E).contains(&b));

    if printable {
        buf.push(b'(');
        for &byte in data {
            match byte {
                b'(' => buf.extend_from_slice(b"\\("),
                b')' => buf.extend_from_slice(b"\\)"),
                b'\\' => buf.extend_from_slice(b"\\\\"),
                b'\n' => buf.extend_from_slice(b"\\n"),
                b'\r' => buf.extend_from_slice(b"\\r"),
                b'\t' => buf.extend_from_slice(b"\\t"),
                _ => buf.push(byte),
            }
        }
        buf.push(b')');
    } else {
        buf.push(b'<');
        for byte in data {
            buf.extend_from_slice(format!("{:02X}", byte).as_bytes());
        }
        buf.push(b'>');
    }
}

/// `/Name` with `#xx` escapes for `#`, delimiters, whitespace and non-ASCII.
fn write_name(buf: &mut Vec<u8>, name: &str) {
    buf.push(b'/');
    for byte in name.bytes() {
        if byte != b'#' && (0x21..=0x7E).contains(&byte) && is_regular(byte) {
            buf.push(byte);
        } else {
            buf.extend_from_slice(format!("#{:02X}", byte).as_bytes());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dict;
    use crate::object::ObjectRef;

    #[test]
    fn test_serialize_scalars() {
        let s = ObjectSerializer::new();
        assert_eq!(s.serialize_to_string(&Object::Null), "null");
        assert_eq!(s.serialize_to_string(&Object::Undefined), "null");
        assert_eq!(s.serialize_to_string(&Object::Boolean(true)), "true");
        assert_eq!(s.serialize_to_string(&Object::Integer(-123)), "-123");
        assert_eq!(s.serialize_to_string(&Object::Unsigned(4_000_000_000)), "4000000000");
    }

    #[test]
    fn test_serialize_real() {
        let s = ObjectSerializer::new();
        assert_eq!(s.serialize_to_string(&Object::Real(1.0)), "1");
        assert_eq!(s.serialize_to_string(&Object::Real(0.5)), "0.5");
        assert_eq!(s.serialize_to_string(&Object::Real(-2.25)), "-2.25");
        assert_eq!(s.serialize_to_string(&Object::Real(f32::NAN)), "0");
    }

    #[test]
    fn test_serialize_string() {
        let s = ObjectSerializer::new();
        assert_eq!(s.serialize_to_string(&Object::String(b"Hello".to_vec())), "(Hello)");
        assert_eq!(
            s.serialize_to_string(&Object::String(b"Test (parens)\\".to_vec())),
            "(Test \\(parens\\)\\\\)"
        );
        assert_eq!(s.serialize_to_string(&Object::String(vec![0x00, 0xFF, 0x80])), "<00FF80>");
    }

    #[test]
    fn test_serialize_name_escapes() {
        let s = ObjectSerializer::new();
        assert_eq!(s.serialize_to_string(&Object::name("Type")), "/Type");
        assert_eq!(s.serialize_to_string(&Object::name("A B")), "/A#20B");
        assert_eq!(s.serialize_to_string(&Object::name("a#(b)")), "/a#23#28b#29");
    }

    #[test]
    fn test_serialize_dictionary_keeps_order() {
        let s = ObjectSerializer::compact();
        let dict = Object::Dictionary(dict! {
            "Type" => Object::name("Page"),
            "Count" => Object::Integer(1),
            "Kids" => Object::Array(vec![Object::Reference(ObjectRef::new(3, 0)), Object::Integer(2)]),
        });
        assert_eq!(s.serialize_to_string(&dict), "<< /Type /Page /Count 1 /Kids [3 0 R 2] >>");
        assert_eq!(s.serialize_to_string(&Object::Dictionary(Dictionary::new())), "<< >>");
    }

    #[test]
    fn test_serialize_indirect_stream() {
        let s = ObjectSerializer::compact();
        let stream = Object::Stream(Stream::new(
            dict! { "Length" => Object::Reference(ObjectRef::new(9, 0)) },
            b"stream data".to_vec(),
        ));
        let text = String::from_utf8_lossy(&s.serialize_indirect(4, 1, &stream)).into_owned();
        assert!(text.starts_with("4 1 obj\n<< /Length 11 >>\nstream\nstream data\nendstream"));
        assert!(text.ends_with("\nendobj\n"));
    }

    #[test]
    fn test_serialized_value_parses_back() {
        let original = Object::Dictionary(dict! {
            "Name" => Object::name("With Space"),
            "Text" => Object::String(b"a)b".to_vec()),
            "Real" => Object::Real(0.25),
        });
        let bytes = ObjectSerializer::new().serialize(&original);
        let (_, parsed) = crate::parser::parse_object(&bytes).unwrap();
        assert_eq!(parsed, original);
    }
}
