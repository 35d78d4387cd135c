//! Page resources: color spaces, functions, shadings, images and fonts.
//!
//! Everything here turns a resource dictionary entry into a value the
//! content interpreter can use directly.

pub mod colorspace;
pub mod font;
pub mod function;
pub mod image;
pub mod shading;

pub use colorspace::{ColorFamily, ColorSpace};
pub use font::{Font, FontKind, FontRegistry};
pub use function::Function;
pub use image::{decode_image, ImageData};
pub use shading::{Gradient, GradientKind, GradientStop};

use crate::object::{Dictionary, Object};
use crate::store::ObjectStore;

/// Look up `name` in one category (`Font`, `XObject`, `ColorSpace`, ...) of
/// a resource dictionary. The returned object is not itself resolved, so
/// indirect references are preserved for caching.
pub fn lookup(store: &mut ObjectStore, resources: &Dictionary, category: &str, name: &str) -> Option<Object> {
    let table = store.resolve_dict(resources.get(category)?)?;
    table.get(name).cloned()
}

/// MSB-first bit reader over packed samples.
pub(crate) struct SampleReader<'a> {
    data: &'a [u8],
    bit: usize,
}

impl<'a> SampleReader<'a> {
    pub(crate) fn new(data: &'a [u8]) -> Self {
        Self { data, bit: 0 }
    }

    /// Read `bits` (1..=32) bits, `None` once the data runs out.
    pub(crate) fn read(&mut self, bits: u32) -> Option<u32> {
        if bits == 0 || bits > 32 || self.bit + bits as usize > self.data.len() * 8 {
            return None;
        }
        let mut value: u64 = 0;
        for _ in 0..bits {
            let byte = self.data[self.bit / 8];
            let shift = 7 - (self.bit % 8);
            value = (value << 1) | ((byte >> shift) & 1) as u64;
            self.bit += 1;
        }
        Some(value as u32)
    }

    /// Skip to the next byte boundary.
    pub(crate) fn align(&mut self) {
        self.bit = self.bit.div_ceil(8) * 8;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OpenOptions;
    use crate::dict;

    #[test]
    fn test_sample_reader_widths() {
        let mut r = SampleReader::new(&[0b1010_0011, 0xFF, 0x12, 0x34]);
        assert_eq!(r.read(1), Some(1));
        assert_eq!(r.read(3), Some(0b010));
        assert_eq!(r.read(4), Some(0b0011));
        assert_eq!(r.read(8), Some(0xFF));
        assert_eq!(r.read(16), Some(0x1234));
        assert_eq!(r.read(1), None);
    }

    #[test]
    fn test_sample_reader_align() {
        let mut r = SampleReader::new(&[0xF0, 0x0F]);
        assert_eq!(r.read(2), Some(0b11));
        r.align();
        assert_eq!(r.read(8), Some(0x0F));
    }

    #[test]
    fn test_lookup_through_reference() {
        let mut store = ObjectStore::empty(OpenOptions::default());
        let fonts = store.add_object(Object::Dictionary(dict! { "F1" => Object::Integer(7) }));
        let resources = dict! { "Font" => Object::Reference(fonts) };
        assert_eq!(lookup(&mut store, &resources, "Font", "F1"), Some(Object::Integer(7)));
        assert_eq!(lookup(&mut store, &resources, "Font", "F2"), None);
        assert_eq!(lookup(&mut store, &resources, "XObject", "F1"), None);
    }
}
