//! Content stream parsing and execution.
//!
//! [`parse_content_stream`] turns bytes into [`Operator`]s, and the
//! [`Interpreter`] runs them against a graphics state stack, driving a
//! [`Device`].

pub mod device;
pub mod graphics_state;
pub mod interpreter;
pub mod operators;
pub mod parser;

pub use device::{Brush, Device, DrawCommand, Glyph, Paint, Path, PathSegment, Pen, RecordingDevice};
pub use graphics_state::{ColorState, GraphicsState, GraphicsStateStack, TextState};
pub use interpreter::{page_content, page_transform, render_page, Interpreter};
pub use operators::{FillRule, Operator, TextElement};
pub use parser::parse_content_stream;
