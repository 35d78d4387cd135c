//! Writing documents back out.
//!
//! ```text
//! ObjectStore (committed + pending objects)
//!     ↓
//! [write_document] (object order, stream preparation, xref, trailer)
//!     ↓
//! [ObjectSerializer] (value syntax)
//!     ↓
//! bytes
//! ```

mod document_writer;
mod object_serializer;

pub use document_writer::write_document;
pub use object_serializer::ObjectSerializer;
