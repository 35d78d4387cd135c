//! Color spaces.
//!
//! Every PDF color space is normalized to one of five families: gray, RGB,
//! CMYK, Lab or indexed. ICC-based spaces collapse onto the device space
//! with the same component count, calibrated spaces onto their device
//! counterpart, and Separation/DeviceN keep their tint transform in front of
//! the alternate space.

use crate::error::{Error, Result};
use crate::object::{Dictionary, DictionaryExt, Object, ObjectRef};
use crate::resources::function::Function;
use crate::store::ObjectStore;

/// Normalized color space family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorFamily {
    /// One gray component
    Gray,
    /// Red, green, blue
    Rgb,
    /// Cyan, magenta, yellow, black
    Cmyk,
    /// CIE L*a*b*
    Lab,
    /// Palette lookup
    Indexed,
}

/// A resolved color space.
#[derive(Debug, Clone, PartialEq)]
pub enum ColorSpace {
    /// DeviceGray, CalGray, one-component ICC
    Gray,
    /// DeviceRGB, CalRGB, three-component ICC
    Rgb,
    /// DeviceCMYK, four-component ICC
    Cmyk,
    /// CIE-based Lab
    Lab {
        /// Diffuse white point (X, Y, Z)
        white_point: [f32; 3],
        /// a* and b* ranges
        range: [f32; 4],
    },
    /// Palette over a base space
    Indexed {
        /// Space the palette entries are in
        base: Box<ColorSpace>,
        /// Highest valid index
        hival: u8,
        /// `(hival + 1) * base.components()` bytes
        palette: Vec<u8>,
    },
    /// Separation or DeviceN
    Tint {
        /// Number of colorants
        components: usize,
        /// Space the tint transform produces
        alternate: Box<ColorSpace>,
        /// Colorants to alternate-space components
        transform: Function,
    },
    /// Pattern space, with the space of uncolored pattern components
    Pattern(Option<Box<ColorSpace>>),
}

impl ColorSpace {
    /// Resolve a color space operand or `/ColorSpace` entry.
    ///
    /// Names that are not device spaces are looked up in the `ColorSpace`
    /// category of `resources`.
    pub fn resolve(obj: &Object, resources: &Dictionary, store: &mut ObjectStore) -> Result<Self> {
        Self::resolve_nested(obj, resources, store, 0)
    }

    fn resolve_nested(obj: &Object, resources: &Dictionary, store: &mut ObjectStore, depth: u32) -> Result<Self> {
        let limit = store.options().max_recursion_depth;
        if depth > limit {
            return Err(Error::RecursionLimitExceeded(limit));
        }
        match store.resolve(obj) {
            Object::Name(name) => {
                if let Some(cs) = Self::from_device_name(&name) {
                    return Ok(cs);
                }
                let named = resources
                    .get("ColorSpace")
                    .and_then(|c| store.resolve_dict(c))
                    .and_then(|c| c.get(&name).cloned())
                    .ok_or_else(|| Error::StructuralInvariantViolation(format!("unknown color space /{}", name)))?;
                Self::resolve_nested(&named, resources, store, depth + 1)
            },
            Object::Array(items) => Self::from_array(&items, resources, store, depth),
            other => Err(Error::InvalidObjectType {
                expected: "Name or Array".into(),
                found: other.type_name().into(),
            }),
        }
    }

    /// Device and calibrated spaces that need no parameters.
    pub fn from_device_name(name: &str) -> Option<Self> {
        match name {
            "DeviceGray" | "G" | "CalGray" => Some(ColorSpace::Gray),
            "DeviceRGB" | "RGB" | "CalRGB" => Some(ColorSpace::Rgb),
            "DeviceCMYK" | "CMYK" | "CalCMYK" => Some(ColorSpace::Cmyk),
            "Pattern" => Some(ColorSpace::Pattern(None)),
            _ => None,
        }
    }

    fn from_array(items: &[Object], resources: &Dictionary, store: &mut ObjectStore, depth: u32) -> Result<Self> {
        let family = items
            .first()
            .and_then(Object::as_name)
            .ok_or_else(|| Error::StructuralInvariantViolation("color space array has no family name".into()))?;
        let arg = |i: usize| items.get(i).cloned().unwrap_or(Object::Null);

        match family {
            "ICCBased" => {
                let dict = store
                    .resolve_dict(&arg(1))
                    .ok_or_else(|| Error::StructuralInvariantViolation("ICCBased without a profile stream".into()))?;
                match dict.get_int("N") {
                    Some(1) => Ok(ColorSpace::Gray),
                    Some(3) => Ok(ColorSpace::Rgb),
                    Some(4) => Ok(ColorSpace::Cmyk),
                    _ => match dict.get("Alternate") {
                        Some(alt) => Self::resolve_nested(alt, resources, store, depth + 1),
                        None => Err(Error::StructuralInvariantViolation("ICCBased with unusable /N".into())),
                    },
                }
            },
            "Lab" => {
                let dict = store.resolve_dict(&arg(1)).unwrap_or_default();
                let white_point = triple(dict.get("WhitePoint")).unwrap_or([0.9505, 1.0, 1.089]);
                let range = dict
                    .get("Range")
                    .and_then(Object::as_number_array)
                    .and_then(|r| <[f32; 4]>::try_from(r).ok())
                    .unwrap_or([-100.0, 100.0, -100.0, 100.0]);
                Ok(ColorSpace::Lab { white_point, range })
            },
            "Indexed" | "I" => {
                let base = Self::resolve_nested(&arg(1), resources, store, depth + 1)?;
                let hival = store.resolve(&arg(2)).as_integer().unwrap_or(0).clamp(0, 255) as u8;
                let lookup_ref = arg(3).as_reference().unwrap_or(ObjectRef::NONE);
                let mut palette = match store.resolve(&arg(3)) {
                    Object::String(bytes) => bytes,
                    Object::Stream(stream) => store.decode_stream(&stream, lookup_ref)?.data,
                    other => {
                        return Err(Error::InvalidObjectType {
                            expected: "String or Stream".into(),
                            found: other.type_name().into(),
                        });
                    },
                };
                let expected = (hival as usize + 1) * base.components();
                if palette.len() < expected {
                    log::warn!("Indexed palette has {} of {} bytes; padding", palette.len(), expected);
                }
                palette.resize(expected, 0);
                Ok(ColorSpace::Indexed {
                    base: Box::new(base),
                    hival,
                    palette,
                })
            },
            "Separation" | "DeviceN" => {
                let components = if family == "Separation" {
                    1
                } else {
                    store.resolve(&arg(1)).as_array().map_or(1, Vec::len)
                };
                let alternate = Self::resolve_nested(&arg(2), resources, store, depth + 1)?;
                let transform = Function::load(&arg(3), store)?;
                Ok(ColorSpace::Tint {
                    components,
                    alternate: Box::new(alternate),
                    transform,
                })
            },
            "Pattern" => {
                let underlying = match items.get(1) {
                    Some(base) => Some(Box::new(Self::resolve_nested(base, resources, store, depth + 1)?)),
                    None => None,
                };
                Ok(ColorSpace::Pattern(underlying))
            },
            other => Self::from_device_name(other)
                .ok_or_else(|| Error::StructuralInvariantViolation(format!("unsupported color space /{}", other))),
        }
    }

    /// Normalized family.
    pub fn family(&self) -> ColorFamily {
        match self {
            ColorSpace::Gray => ColorFamily::Gray,
            ColorSpace::Rgb => ColorFamily::Rgb,
            ColorSpace::Cmyk => ColorFamily::Cmyk,
            ColorSpace::Lab { .. } => ColorFamily::Lab,
            ColorSpace::Indexed { .. } => ColorFamily::Indexed,
            ColorSpace::Tint { alternate, .. } => alternate.family(),
            ColorSpace::Pattern(base) => base.as_ref().map_or(ColorFamily::Rgb, |b| b.family()),
        }
    }

    /// Number of color components an operand list carries.
    pub fn components(&self) -> usize {
        match self {
            ColorSpace::Gray | ColorSpace::Indexed { .. } => 1,
            ColorSpace::Rgb | ColorSpace::Lab { .. } => 3,
            ColorSpace::Cmyk => 4,
            ColorSpace::Tint { components, .. } => *components,
            ColorSpace::Pattern(base) => base.as_ref().map_or(0, |b| b.components()),
        }
    }

    /// Color a space starts with after `cs`/`CS`.
    pub fn initial_color(&self) -> Vec<f32> {
        match self {
            ColorSpace::Cmyk => vec![0.0, 0.0, 0.0, 1.0],
            ColorSpace::Tint { components, .. } => vec![1.0; *components],
            other => vec![0.0; other.components()],
        }
    }

    /// Default image `/Decode` array for `bpc` bits per component.
    pub fn default_decode(&self, bpc: u32) -> Vec<(f32, f32)> {
        match self {
            ColorSpace::Indexed { .. } => vec![(0.0, ((1u32 << bpc.min(16)) - 1) as f32)],
            ColorSpace::Lab { range, .. } => vec![(0.0, 100.0), (range[0], range[1]), (range[2], range[3])],
            other => vec![(0.0, 1.0); other.components()],
        }
    }

    /// Convert components to RGB in `0.0..=1.0`.
    pub fn to_rgb(&self, c: &[f32]) -> [f32; 3] {
        let at = |i: usize| c.get(i).copied().unwrap_or(0.0).clamp(0.0, 1.0);
        match self {
            ColorSpace::Gray => [at(0); 3],
            ColorSpace::Rgb => [at(0), at(1), at(2)],
            ColorSpace::Cmyk => {
                let k = at(3);
                [(1.0 - at(0)) * (1.0 - k), (1.0 - at(1)) * (1.0 - k), (1.0 - at(2)) * (1.0 - k)]
            },
            ColorSpace::Lab { white_point, range } => {
                let l = c.first().copied().unwrap_or(0.0).clamp(0.0, 100.0);
                let a = c.get(1).copied().unwrap_or(0.0).clamp(range[0], range[1]);
                let b = c.get(2).copied().unwrap_or(0.0).clamp(range[2], range[3]);
                lab_to_rgb(l, a, b, white_point)
            },
            ColorSpace::Indexed { base, hival, palette } => {
                let index = (c.first().copied().unwrap_or(0.0).round().max(0.0) as usize).min(*hival as usize);
                let n = base.components();
                let entry: Vec<f32> = palette[index * n..(index + 1) * n].iter().map(|&v| v as f32 / 255.0).collect();
                base.to_rgb(&entry)
            },
            ColorSpace::Tint { alternate, transform, .. } => alternate.to_rgb(&transform.eval(c)),
            ColorSpace::Pattern(Some(base)) => base.to_rgb(c),
            ColorSpace::Pattern(None) => [0.0; 3],
        }
    }

    /// Convert components to 8-bit RGB.
    pub fn to_rgb8(&self, c: &[f32]) -> [u8; 3] {
        self.to_rgb(c).map(|v| (v * 255.0).round().clamp(0.0, 255.0) as u8)
    }
}

fn triple(obj: Option<&Object>) -> Option<[f32; 3]> {
    obj?.as_number_array().and_then(|v| <[f32; 3]>::try_from(v).ok())
}

/// CIE L*a*b* to sRGB, relative to `white`.
fn lab_to_rgb(l: f32, a: f32, b: f32, white: &[f32; 3]) -> [f32; 3] {
    let fy = (l + 16.0) / 116.0;
    let fx = fy + a / 500.0;
    let fz = fy - b / 200.0;
    let g = |t: f32| {
        if t > 6.0 / 29.0 {
            t * t * t
        } else {
            108.0 / 841.0 * (t - 4.0 / 29.0)
        }
    };
    let (x, y, z) = (white[0] * g(fx), white[1] * g(fy), white[2] * g(fz));

    let linear = [
        3.2406 * x - 1.5372 * y - 0.4986 * z,
        -0.9689 * x + 1.8758 * y + 0.0415 * z,
        0.0557 * x - 0.2040 * y + 1.0570 * z,
    ];
    linear.map(|v| {
        let v = v.clamp(0.0, 1.0);
        if v <= 0.003_130_8 {
            12.92 * v
        } else {
            1.055 * v.powf(1.0 / 2.4) - 0.055
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OpenOptions;
    use crate::dict;
    use crate::object::Stream;

    fn resolve(obj: Object) -> Result<ColorSpace> {
        let mut store = ObjectStore::empty(OpenOptions::default());
        ColorSpace::resolve(&obj, &Dictionary::new(), &mut store)
    }

    #[test]
    fn test_device_names() {
        assert_eq!(resolve(Object::name("DeviceRGB")).unwrap(), ColorSpace::Rgb);
        assert_eq!(resolve(Object::name("G")).unwrap(), ColorSpace::Gray);
        assert_eq!(resolve(Object::name("DeviceCMYK")).unwrap().components(), 4);
        assert!(resolve(Object::name("Nonsense")).is_err());
    }

    #[test]
    fn test_named_resource_lookup() {
        let mut store = ObjectStore::empty(OpenOptions::default());
        let resources = dict! {
            "ColorSpace" => Object::Dictionary(dict! {
                "CS0" => Object::Array(vec![Object::name("CalRGB"), Object::Dictionary(Dictionary::new())]),
            }),
        };
        let cs = ColorSpace::resolve(&Object::name("CS0"), &resources, &mut store).unwrap();
        assert_eq!(cs, ColorSpace::Rgb);
    }

    #[test]
    fn test_icc_based_by_component_count() {
        let mut store = ObjectStore::empty(OpenOptions::default());
        let profile = store.add_object(Object::Stream(Stream::new(dict! { "N" => Object::Integer(4) }, vec![0u8; 8])));
        let cs = ColorSpace::resolve(
            &Object::Array(vec![Object::name("ICCBased"), Object::Reference(profile)]),
            &Dictionary::new(),
            &mut store,
        )
        .unwrap();
        assert_eq!(cs.family(), ColorFamily::Cmyk);
    }

    #[test]
    fn test_indexed_palette() {
        let cs = resolve(Object::Array(vec![
            Object::name("Indexed"),
            Object::name("DeviceRGB"),
            Object::Integer(1),
            Object::String(vec![255, 0, 0, 0, 0, 255]),
        ]))
        .unwrap();
        assert_eq!(cs.family(), ColorFamily::Indexed);
        assert_eq!(cs.to_rgb8(&[0.0]), [255, 0, 0]);
        assert_eq!(cs.to_rgb8(&[1.0]), [0, 0, 255]);
        // Out-of-range indices clamp to hival
        assert_eq!(cs.to_rgb8(&[7.0]), [0, 0, 255]);
        assert_eq!(cs.default_decode(4), vec![(0.0, 15.0)]);
    }

    #[test]
    fn test_short_palette_is_padded() {
        let cs = resolve(Object::Array(vec![
            Object::name("Indexed"),
            Object::name("DeviceGray"),
            Object::Integer(3),
            Object::String(vec![255]),
        ]))
        .unwrap();
        assert_eq!(cs.to_rgb8(&[3.0]), [0, 0, 0]);
    }

    #[test]
    fn test_separation_uses_tint_transform() {
        let tint = Object::Dictionary(dict! {
            "FunctionType" => Object::Integer(2),
            "Domain" => Object::Array(vec![0.into(), 1.into()]),
            "C0" => Object::Array(vec![0.into(), 0.into(), 0.into(), 0.into()]),
            "C1" => Object::Array(vec![1.into(), 0.into(), 0.into(), 0.into()]),
            "N" => Object::Integer(1),
        });
        let cs = resolve(Object::Array(vec![
            Object::name("Separation"),
            Object::name("Spot"),
            Object::name("DeviceCMYK"),
            tint,
        ]))
        .unwrap();
        assert_eq!(cs.family(), ColorFamily::Cmyk);
        assert_eq!(cs.initial_color(), vec![1.0]);
        // Full cyan
        assert_eq!(cs.to_rgb8(&[1.0]), [0, 255, 255]);
    }

    #[test]
    fn test_cmyk_and_lab_conversion() {
        assert_eq!(ColorSpace::Cmyk.to_rgb8(&[0.0, 0.0, 0.0, 1.0]), [0, 0, 0]);
        assert_eq!(ColorSpace::Cmyk.to_rgb8(&[0.0, 1.0, 1.0, 0.0]), [255, 0, 0]);

        let lab = ColorSpace::Lab {
            white_point: [0.9505, 1.0, 1.089],
            range: [-100.0, 100.0, -100.0, 100.0],
        };
        let white = lab.to_rgb(&[100.0, 0.0, 0.0]);
        assert!(white.iter().all(|&v| v > 0.97));
        assert_eq!(lab.to_rgb8(&[0.0, 0.0, 0.0]), [0, 0, 0]);
    }

    #[test]
    fn test_pattern_with_underlying_space() {
        let cs = resolve(Object::Array(vec![Object::name("Pattern"), Object::name("DeviceRGB")])).unwrap();
        assert_eq!(cs.components(), 3);
        assert_eq!(resolve(Object::name("Pattern")).unwrap(), ColorSpace::Pattern(None));
    }
}
