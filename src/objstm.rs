//! Object streams (`/Type /ObjStm`).
//!
//! ```text
//! 12 0 obj
//! << /Type /ObjStm /N 2 /First 9 /Extends 8 0 R /Filter /FlateDecode >>
//! stream
//! 10 0 11 15
//! << /A 1 >>     % object 10, offset 0 from /First
//! [1 2 3]        % object 11, offset 15
//! endstream
//! ```
//!
//! A stream may name a base stream through `/Extends`; lookups that miss in
//! one stream continue along that chain.

use crate::error::{Error, Result};
use crate::lexer::{Token, token};
use crate::object::{Dictionary, DictionaryExt, Object, ObjectRef};
use crate::parser::parse_object_nested;
use std::collections::HashSet;
use std::sync::Arc;

/// Decoded object stream.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectStream {
    /// Object number of the stream itself
    pub number: u32,
    /// `(inner object number, value)` in stream order
    entries: Vec<(u32, Object)>,
    /// Base stream from `/Extends`
    pub extends: Option<ObjectRef>,
}

impl ObjectStream {
    /// Parse the decoded payload of object stream `number`.
    ///
    /// Values that fail to parse are kept as [`Object::Undefined`] so indices
    /// stay aligned with the header.
    pub fn parse(number: u32, dict: &Dictionary, data: &[u8], max_nesting: usize) -> Result<Self> {
        if dict.get_name("Type").is_some_and(|t| t != "ObjStm") {
            return Err(Error::InvalidObjectType {
                expected: "ObjStm".into(),
                found: dict.get_name("Type").unwrap_or_default().into(),
            });
        }
        let count = dict
            .get_int("N")
            .filter(|&n| n >= 0)
            .ok_or_else(|| Error::StructuralInvariantViolation(format!("object stream {} has no /N", number)))?
            as usize;
        let first = dict
            .get_int("First")
            .filter(|&f| f >= 0 && (f as usize) <= data.len())
            .ok_or_else(|| {
                Error::StructuralInvariantViolation(format!("object stream {} has a bad /First", number))
            })? as usize;

        let pairs = parse_pairs(&data[..first], count)
            .ok_or_else(|| Error::malformed(0, format!("object stream {} header is truncated", number)))?;

        let body = &data[first..];
        let entries = pairs
            .into_iter()
            .map(|(id, offset)| {
                let value = body
                    .get(offset..)
                    .and_then(|slice| parse_object_nested(slice, max_nesting).ok())
                    .map(|(_, obj)| obj)
                    .unwrap_or(Object::Undefined);
                (id, value)
            })
            .collect();

        Ok(Self {
            number,
            entries,
            extends: dict.get_ref("Extends"),
        })
    }

    /// Number of objects in the stream.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when the stream holds no objects.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Object at `index`, if its number is `id`; otherwise the first entry
    /// numbered `id`.
    pub fn get(&self, id: u32, index: u32) -> Option<&Object> {
        match self.entries.get(index as usize) {
            Some((n, obj)) if *n == id => Some(obj),
            _ => self.entries.iter().find(|(n, _)| *n == id).map(|(_, obj)| obj),
        }
    }

    /// Iterate `(object number, value)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &Object)> + '_ {
        self.entries.iter().map(|(n, obj)| (*n, obj))
    }
}

fn parse_pairs(header: &[u8], count: usize) -> Option<Vec<(u32, usize)>> {
    let mut pairs = Vec::with_capacity(count.min(header.len() / 4 + 1));
    let mut rest = header;
    for _ in 0..count {
        let (after, Token::Integer(id)) = token(rest).ok()? else {
            return None;
        };
        let (after, Token::Integer(offset)) = token(after).ok()? else {
            return None;
        };
        pairs.push((u32::try_from(id).ok()?, usize::try_from(offset).ok()?));
        rest = after;
    }
    Some(pairs)
}

/// Find object `id` starting at stream `start`, following `/Extends`.
///
/// `load` materializes a stream by object number. A chain that revisits a
/// stream or exceeds `max_depth` fails with
/// [`Error::StructuralInvariantViolation`]; a miss along a well-formed chain
/// yields `Ok(None)`.
pub fn lookup<F>(start: u32, id: u32, index: u32, max_depth: u32, mut load: F) -> Result<Option<Object>>
where
    F: FnMut(u32) -> Result<Arc<ObjectStream>>,
{
    let mut seen = HashSet::new();
    let mut current = Some(start);

    while let Some(number) = current {
        if !seen.insert(number) {
            return Err(Error::StructuralInvariantViolation(format!(
                "object stream /Extends chain loops at {}",
                number
            )));
        }
        if seen.len() as u32 > max_depth {
            return Err(Error::RecursionLimitExceeded(max_depth));
        }

        let stream = load(number)?;
        // The index only applies to the stream the xref entry names
        let hit = if number == start {
            stream.get(id, index)
        } else {
            stream.get(id, u32::MAX)
        };
        if let Some(obj) = hit {
            return Ok(Some(obj.clone()));
        }
        current = stream.extends.map(|r| r.id);
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dict;
    use std::collections::HashMap;

    fn stream_dict(n: i32, first: i32) -> Dictionary {
        dict! {
            "Type" => Object::name("ObjStm"),
            "N" => Object::Integer(n),
            "First" => Object::Integer(first),
        }
    }

    #[test]
    fn test_parse_object_stream() {
        let data = b"10 0 11 11 << /A 1 >> [1 2 3]";
        let stm = ObjectStream::parse(5, &stream_dict(2, 11), data, 100).unwrap();
        assert_eq!(stm.len(), 2);
        assert_eq!(stm.get(10, 0).and_then(Object::as_dict).and_then(|d| d.get_int("A")), Some(1));
        assert_eq!(stm.get(11, 1), Some(&Object::Array(vec![1.into(), 2.into(), 3.into()])));
    }

    #[test]
    fn test_index_mismatch_falls_back_to_search() {
        let data = b"10 0 11 2 1 2";
        let stm = ObjectStream::parse(5, &stream_dict(2, 10), data, 100).unwrap();
        assert_eq!(stm.get(11, 0), Some(&Object::Integer(2)));
        assert_eq!(stm.get(12, 0), None);
    }

    #[test]
    fn test_references_inside_stream() {
        let data = b"3 0 7 0 R";
        let stm = ObjectStream::parse(1, &stream_dict(1, 4), data, 100).unwrap();
        assert_eq!(stm.get(3, 0), Some(&Object::Reference(ObjectRef::new(7, 0))));
    }

    #[test]
    fn test_truncated_header() {
        let data = b"10 0 11";
        assert!(ObjectStream::parse(5, &stream_dict(2, 7), data, 100).is_err());
    }

    #[test]
    fn test_bad_first() {
        assert!(ObjectStream::parse(5, &stream_dict(1, 99), b"1 0 x", 100).is_err());
    }

    fn library() -> HashMap<u32, Arc<ObjectStream>> {
        let mut base = stream_dict(1, 4);
        base.insert("Extends".into(), Object::Reference(ObjectRef::new(30, 0)));
        let mut newer = stream_dict(1, 4);
        newer.insert("Extends".into(), Object::Reference(ObjectRef::new(20, 0)));
        let mut looping = stream_dict(1, 4);
        looping.insert("Extends".into(), Object::Reference(ObjectRef::new(10, 0)));

        let mut map = HashMap::new();
        map.insert(10, Arc::new(ObjectStream::parse(10, &newer, b"1 0 (new)", 100).unwrap()));
        map.insert(20, Arc::new(ObjectStream::parse(20, &base, b"2 0 (base)", 100).unwrap()));
        map.insert(30, Arc::new(ObjectStream::parse(30, &looping, b"3 0 (loop)", 100).unwrap()));
        map
    }

    #[test]
    fn test_lookup_follows_extends() {
        let streams = library();
        let load = |n: u32| streams.get(&n).cloned().ok_or(Error::UnresolvedReference(ObjectRef::new(n, 0)));
        assert_eq!(lookup(10, 1, 0, 10, load).unwrap(), Some(Object::String(b"new".to_vec())));
        assert_eq!(lookup(10, 2, 0, 10, load).unwrap(), Some(Object::String(b"base".to_vec())));
    }

    #[test]
    fn test_lookup_detects_cycle() {
        let streams = library();
        let load = |n: u32| streams.get(&n).cloned().ok_or(Error::UnresolvedReference(ObjectRef::new(n, 0)));
        let err = lookup(10, 99, 0, 10, load).unwrap_err();
        assert!(matches!(err, Error::StructuralInvariantViolation(_)));
    }

    #[test]
    fn test_lookup_detects_self_extends() {
        let mut dict = stream_dict(1, 4);
        dict.insert("Extends".into(), Object::Reference(ObjectRef::new(7, 0)));
        let stream = Arc::new(ObjectStream::parse(7, &dict, b"1 0 (one)", 100).unwrap());
        let load = |_: u32| Ok(Arc::clone(&stream));
        assert_eq!(lookup(7, 1, 0, 10, load).unwrap(), Some(Object::String(b"one".to_vec())));
        let err = lookup(7, 2, 0, 10, load).unwrap_err();
        assert!(matches!(err, Error::StructuralInvariantViolation(_)));
    }

    #[test]
    fn test_lookup_depth_limit() {
        let streams = library();
        let load = |n: u32| streams.get(&n).cloned().ok_or(Error::UnresolvedReference(ObjectRef::new(n, 0)));
        assert!(matches!(lookup(10, 99, 0, 2, load), Err(Error::RecursionLimitExceeded(2))));
    }
}
