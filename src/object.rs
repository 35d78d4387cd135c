//! PDF value model.
//!
//! [`Object`] is the tagged union every other component produces or consumes.
//! Values never point back at their document: nested indirect references are
//! plain [`ObjectRef`] handles that the object store resolves on demand.

use bytes::Bytes;
use indexmap::IndexMap;

/// Insertion-ordered mapping of names to values. Keys are unique.
pub type Dictionary = IndexMap<String, Object>;

/// PDF object representation.
#[derive(Debug, Clone, PartialEq)]
pub enum Object {
    /// Null object
    Null,
    /// Boolean value
    Boolean(bool),
    /// Integer that fits in 32 signed bits
    Integer(i32),
    /// Non-negative integer above `i32::MAX`
    Unsigned(u32),
    /// Real (floating-point) value
    Real(f32),
    /// String (byte sequence, not necessarily UTF-8)
    String(Vec<u8>),
    /// Name (without the leading `/`)
    Name(String),
    /// Array of objects
    Array(Vec<Object>),
    /// Dictionary (ordered key-value pairs)
    Dictionary(Dictionary),
    /// Stream (dictionary + lazily materialized payload)
    Stream(Stream),
    /// Indirect object reference
    Reference(ObjectRef),
    /// Decoded image XObject held by a resource cache
    Image(XObjectHandle),
    /// Form XObject held by a resource cache
    Form(XObjectHandle),
    /// Sentinel for absent or malformed input
    Undefined,
}

/// Reference to an indirect object.
///
/// The pair `(0, 0)` denotes "no reference".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectRef {
    /// Object number
    pub id: u32,
    /// Generation number
    pub gen: u32,
}

impl ObjectRef {
    /// The "no reference" value.
    pub const NONE: ObjectRef = ObjectRef { id: 0, gen: 0 };

    /// Create a new object reference.
    pub fn new(id: u32, gen: u32) -> Self {
        Self { id, gen }
    }

    /// True for the `(0, 0)` "no reference" pair.
    pub fn is_none(&self) -> bool {
        self.id == 0 && self.gen == 0
    }
}

impl std::fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} R", self.id, self.gen)
    }
}

/// Stream object: a property dictionary plus its payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Stream {
    /// Stream dictionary
    pub dict: Dictionary,
    /// Raw (still filtered, possibly encrypted) payload
    pub data: StreamData,
}

impl Stream {
    /// Create a stream whose payload is already in memory.
    ///
    /// `Length` is set to the payload size.
    pub fn new(mut dict: Dictionary, data: impl Into<Bytes>) -> Self {
        let data = data.into();
        dict.insert("Length".to_string(), Object::from_i64(data.len() as i64));
        Self {
            dict,
            data: StreamData::Loaded(data),
        }
    }

    /// Payload bytes, if they are already materialized.
    pub fn loaded_data(&self) -> Option<&Bytes> {
        match &self.data {
            StreamData::Loaded(bytes) => Some(bytes),
            StreamData::Deferred { .. } => None,
        }
    }
}

/// Payload of a stream object.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamData {
    /// Bytes held in memory
    Loaded(Bytes),
    /// Bytes still in the byte source, read on first use
    Deferred {
        /// Absolute offset of the first payload byte
        offset: u64,
        /// Payload length in bytes
        length: usize,
    },
}

/// Handle to a decoded XObject stored in a resource cache arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct XObjectHandle {
    /// Index into the owning arena
    pub slot: u32,
    /// Object the handle was decoded from
    pub source: ObjectRef,
}

impl Object {
    /// Build the narrowest numeric variant holding `value`.
    ///
    /// Values outside both 32-bit integer ranges degrade to [`Object::Real`].
    pub fn from_i64(value: i64) -> Object {
        if let Ok(v) = i32::try_from(value) {
            Object::Integer(v)
        } else if let Ok(v) = u32::try_from(value) {
            Object::Unsigned(v)
        } else {
            Object::Real(value as f32)
        }
    }

    /// Build a name object.
    pub fn name(name: impl Into<String>) -> Object {
        Object::Name(name.into())
    }

    /// Get the type name of this object.
    pub fn type_name(&self) -> &'static str {
        match self {
            Object::Null => "Null",
            Object::Boolean(_) => "Boolean",
            Object::Integer(_) => "Integer",
            Object::Unsigned(_) => "Unsigned",
            Object::Real(_) => "Real",
            Object::String(_) => "String",
            Object::Name(_) => "Name",
            Object::Array(_) => "Array",
            Object::Dictionary(_) => "Dictionary",
            Object::Stream(_) => "Stream",
            Object::Reference(_) => "Reference",
            Object::Image(_) => "Image",
            Object::Form(_) => "Form",
            Object::Undefined => "Undefined",
        }
    }

    /// Integer value of an `Integer` or `Unsigned` object.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Object::Integer(i) => Some(*i as i64),
            Object::Unsigned(u) => Some(*u as i64),
            _ => None,
        }
    }

    /// Numeric value of any number object.
    pub fn as_number(&self) -> Option<f32> {
        match self {
            Object::Integer(i) => Some(*i as f32),
            Object::Unsigned(u) => Some(*u as f32),
            Object::Real(r) => Some(*r),
            _ => None,
        }
    }

    /// Try to get name value.
    pub fn as_name(&self) -> Option<&str> {
        match self {
            Object::Name(n) => Some(n),
            _ => None,
        }
    }

    /// Try to get dictionary (also returns a stream's dictionary).
    pub fn as_dict(&self) -> Option<&Dictionary> {
        match self {
            Object::Dictionary(d) => Some(d),
            Object::Stream(s) => Some(&s.dict),
            _ => None,
        }
    }

    /// Mutable access to a dictionary or a stream's dictionary.
    pub fn as_dict_mut(&mut self) -> Option<&mut Dictionary> {
        match self {
            Object::Dictionary(d) => Some(d),
            Object::Stream(s) => Some(&mut s.dict),
            _ => None,
        }
    }

    /// Try to get stream.
    pub fn as_stream(&self) -> Option<&Stream> {
        match self {
            Object::Stream(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get array.
    pub fn as_array(&self) -> Option<&Vec<Object>> {
        match self {
            Object::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Try to get reference.
    pub fn as_reference(&self) -> Option<ObjectRef> {
        match self {
            Object::Reference(r) => Some(*r),
            _ => None,
        }
    }

    /// Try to get boolean value.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Object::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Try to get string bytes.
    pub fn as_string(&self) -> Option<&[u8]> {
        match self {
            Object::String(s) => Some(s),
            _ => None,
        }
    }

    /// Check if object is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Object::Null)
    }

    /// Check if object is the Undefined sentinel.
    pub fn is_undefined(&self) -> bool {
        matches!(self, Object::Undefined)
    }

    /// Null and Undefined both mean "nothing here".
    pub fn is_absent(&self) -> bool {
        matches!(self, Object::Null | Object::Undefined)
    }

    /// Numbers from an array of numeric objects. Non-numeric entries fail the whole call.
    pub fn as_number_array(&self) -> Option<Vec<f32>> {
        self.as_array()?.iter().map(Object::as_number).collect()
    }
}

impl From<ObjectRef> for Object {
    fn from(r: ObjectRef) -> Self {
        Object::Reference(r)
    }
}

impl From<bool> for Object {
    fn from(b: bool) -> Self {
        Object::Boolean(b)
    }
}

impl From<i32> for Object {
    fn from(i: i32) -> Self {
        Object::Integer(i)
    }
}

impl From<f32> for Object {
    fn from(r: f32) -> Self {
        Object::Real(r)
    }
}

impl From<Dictionary> for Object {
    fn from(d: Dictionary) -> Self {
        Object::Dictionary(d)
    }
}

impl From<Vec<Object>> for Object {
    fn from(a: Vec<Object>) -> Self {
        Object::Array(a)
    }
}

/// Typed lookups on dictionaries.
pub trait DictionaryExt {
    /// Name stored under `key`.
    fn get_name(&self, key: &str) -> Option<&str>;
    /// Integer stored under `key`.
    fn get_int(&self, key: &str) -> Option<i64>;
    /// Number stored under `key`.
    fn get_number(&self, key: &str) -> Option<f32>;
    /// Boolean stored under `key`.
    fn get_bool(&self, key: &str) -> Option<bool>;
    /// Reference stored under `key`.
    fn get_ref(&self, key: &str) -> Option<ObjectRef>;
    /// True when `/Type` equals `ty`.
    fn is_type(&self, ty: &str) -> bool;
}

impl DictionaryExt for Dictionary {
    fn get_name(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Object::as_name)
    }

    fn get_int(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(Object::as_integer)
    }

    fn get_number(&self, key: &str) -> Option<f32> {
        self.get(key).and_then(Object::as_number)
    }

    fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(Object::as_bool)
    }

    fn get_ref(&self, key: &str) -> Option<ObjectRef> {
        self.get(key).and_then(Object::as_reference)
    }

    fn is_type(&self, ty: &str) -> bool {
        self.get_name("Type") == Some(ty)
    }
}

/// Build a [`Dictionary`] from `key => value` pairs.
///
/// ```
/// use pdf_engine::dict;
/// use pdf_engine::object::Object;
///
/// let d = dict! { "Type" => Object::name("Page"), "Rotate" => Object::Integer(90) };
/// assert_eq!(d.len(), 2);
/// ```
#[macro_export]
macro_rules! dict {
    () => { $crate::object::Dictionary::new() };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut d = $crate::object::Dictionary::new();
        $( d.insert($key.to_string(), $value); )+
        d
    }};
}
