//! Axial and radial shadings, flattened into gradient stops.

use crate::error::{Error, Result};
use crate::geometry::Rect;
use crate::object::{Dictionary, DictionaryExt, Object};
use crate::resources::colorspace::ColorSpace;
use crate::resources::function::Function;
use crate::store::ObjectStore;

/// Evenly spaced samples taken across the domain.
const SAMPLES: usize = 16;

/// Geometry of a gradient.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GradientKind {
    /// Type 2: from `start` to `end`
    Axial {
        /// Start point
        start: (f32, f32),
        /// End point
        end: (f32, f32),
    },
    /// Type 3: between two circles
    Radial {
        /// First circle center
        start: (f32, f32),
        /// First circle radius
        start_radius: f32,
        /// Second circle center
        end: (f32, f32),
        /// Second circle radius
        end_radius: f32,
    },
}

/// One color stop, `offset` in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GradientStop {
    /// Position along the gradient
    pub offset: f32,
    /// Color at that position
    pub color: [u8; 3],
}

/// A gradient brush ready for a drawing surface.
#[derive(Debug, Clone, PartialEq)]
pub struct Gradient {
    /// Axial or radial geometry, in shading space
    pub kind: GradientKind,
    /// Stops sorted by offset
    pub stops: Vec<GradientStop>,
    /// Extend past the start and end
    pub extend: [bool; 2],
    /// Optional clipping box in shading space
    pub bbox: Option<Rect>,
    /// Color used outside the gradient when painted with a pattern
    pub background: Option<[u8; 3]>,
}

enum ColorFunction {
    Single(Function),
    PerChannel(Vec<Function>),
}

impl ColorFunction {
    fn eval(&self, t: f32) -> Vec<f32> {
        match self {
            ColorFunction::Single(f) => f.eval(&[t]),
            ColorFunction::PerChannel(fs) => fs.iter().map(|f| f.eval(&[t]).first().copied().unwrap_or(0.0)).collect(),
        }
    }

    fn breakpoints(&self) -> Vec<f32> {
        match self {
            ColorFunction::Single(f) => f.breakpoints().to_vec(),
            ColorFunction::PerChannel(fs) => fs.iter().flat_map(|f| f.breakpoints().iter().copied()).collect(),
        }
    }
}

impl Gradient {
    /// Load a shading dictionary (or stream), resolving its color space
    /// against `resources`.
    pub fn load(obj: &Object, resources: &Dictionary, store: &mut ObjectStore) -> Result<Self> {
        let dict = store.resolve_dict(obj).ok_or_else(|| Error::InvalidObjectType {
            expected: "Dictionary".into(),
            found: obj.type_name().into(),
        })?;

        let shading_type = dict.get_int("ShadingType").unwrap_or(0);
        if !matches!(shading_type, 2 | 3) {
            return Err(Error::NotImplemented(format!("shading type {}", shading_type)));
        }

        let color_space = ColorSpace::resolve(
            dict.get("ColorSpace")
                .ok_or_else(|| Error::StructuralInvariantViolation("shading has no /ColorSpace".into()))?,
            resources,
            store,
        )?;

        let coords = dict.get("Coords").and_then(Object::as_number_array).unwrap_or_default();
        let kind = match (shading_type, coords.as_slice()) {
            (2, [x0, y0, x1, y1]) => GradientKind::Axial {
                start: (*x0, *y0),
                end: (*x1, *y1),
            },
            (3, [x0, y0, r0, x1, y1, r1]) => GradientKind::Radial {
                start: (*x0, *y0),
                start_radius: *r0,
                end: (*x1, *y1),
                end_radius: *r1,
            },
            _ => {
                return Err(Error::StructuralInvariantViolation(format!(
                    "shading type {} with {} coordinates",
                    shading_type,
                    coords.len()
                )));
            },
        };

        let domain = match dict.get("Domain").and_then(Object::as_number_array).as_deref() {
            Some([d0, d1]) => (*d0, *d1),
            _ => (0.0, 1.0),
        };
        let extend = match dict.get("Extend").map(|e| store.resolve(e)) {
            Some(Object::Array(flags)) => [
                flags.first().and_then(Object::as_bool).unwrap_or(false),
                flags.get(1).and_then(Object::as_bool).unwrap_or(false),
            ],
            _ => [false, false],
        };

        let function = match dict.get("Function").map(|f| store.resolve(f)) {
            Some(Object::Array(parts)) => ColorFunction::PerChannel(
                parts
                    .iter()
                    .map(|f| Function::load(f, store))
                    .collect::<Result<Vec<_>>>()?,
            ),
            Some(_) => ColorFunction::Single(Function::load(
                dict.get("Function").unwrap_or(&Object::Null),
                store,
            )?),
            None => return Err(Error::StructuralInvariantViolation("shading has no /Function".into())),
        };

        let background = dict
            .get("Background")
            .and_then(Object::as_number_array)
            .map(|c| color_space.to_rgb8(&c));

        Ok(Gradient {
            kind,
            stops: build_stops(&function, &color_space, domain),
            extend,
            bbox: dict.get("BBox").and_then(Rect::from_object),
            background,
        })
    }

    /// Color at `offset`, linearly interpolated between stops.
    pub fn color_at(&self, offset: f32) -> [u8; 3] {
        let (first, last) = match (self.stops.first(), self.stops.last()) {
            (Some(f), Some(l)) => (f, l),
            _ => return [0; 3],
        };
        if offset <= first.offset {
            return first.color;
        }
        for pair in self.stops.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            if offset <= b.offset {
                let span = b.offset - a.offset;
                let t = if span > 0.0 { (offset - a.offset) / span } else { 1.0 };
                let mut out = [0u8; 3];
                for (i, slot) in out.iter_mut().enumerate() {
                    *slot = (a.color[i] as f32 + (b.color[i] as f32 - a.color[i] as f32) * t).round() as u8;
                }
                return out;
            }
        }
        last.color
    }
}

/// Sample the color function at evenly spaced offsets plus every stitching
/// breakpoint, so hard color changes land exactly on a stop.
fn build_stops(function: &ColorFunction, color_space: &ColorSpace, (d0, d1): (f32, f32)) -> Vec<GradientStop> {
    let span = d1 - d0;
    let mut offsets: Vec<f32> = (0..=SAMPLES).map(|i| i as f32 / SAMPLES as f32).collect();
    if span != 0.0 {
        offsets.extend(
            function
                .breakpoints()
                .into_iter()
                .map(|b| (b - d0) / span)
                .filter(|o| *o > 0.0 && *o < 1.0),
        );
    }
    offsets.sort_by(|a, b| a.total_cmp(b));
    offsets.dedup_by(|a, b| (*a - *b).abs() < 1e-6);

    offsets
        .into_iter()
        .map(|offset| GradientStop {
            offset,
            color: color_space.to_rgb8(&function.eval(d0 + offset * span)),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OpenOptions;
    use crate::dict;

    fn exponential(c0: f32, c1: f32) -> Object {
        Object::Dictionary(dict! {
            "FunctionType" => Object::Integer(2),
            "Domain" => Object::Array(vec![0.into(), 1.into()]),
            "C0" => Object::Array(vec![Object::Real(c0)]),
            "C1" => Object::Array(vec![Object::Real(c1)]),
            "N" => Object::Integer(1),
        })
    }

    fn load(shading: Dictionary) -> Result<Gradient> {
        let mut store = ObjectStore::empty(OpenOptions::default());
        Gradient::load(&Object::Dictionary(shading), &Dictionary::new(), &mut store)
    }

    // ========================================================================
    // Axial
    // ========================================================================

    #[test]
    fn test_axial_gray_ramp() {
        let g = load(dict! {
            "ShadingType" => Object::Integer(2),
            "ColorSpace" => Object::name("DeviceGray"),
            "Coords" => Object::Array(vec![0.into(), 0.into(), 100.into(), 0.into()]),
            "Function" => exponential(0.0, 1.0),
            "Extend" => Object::Array(vec![Object::Boolean(true), Object::Boolean(false)]),
        })
        .unwrap();

        assert_eq!(
            g.kind,
            GradientKind::Axial {
                start: (0.0, 0.0),
                end: (100.0, 0.0)
            }
        );
        assert_eq!(g.stops.len(), SAMPLES + 1);
        assert_eq!(g.stops[0].color, [0, 0, 0]);
        assert_eq!(g.stops[SAMPLES].color, [255, 255, 255]);
        assert_eq!(g.extend, [true, false]);
        assert_eq!(g.color_at(0.5), [128, 128, 128]);
    }

    #[test]
    fn test_per_channel_functions() {
        let g = load(dict! {
            "ShadingType" => Object::Integer(2),
            "ColorSpace" => Object::name("DeviceRGB"),
            "Coords" => Object::Array(vec![0.into(), 0.into(), 1.into(), 0.into()]),
            "Function" => Object::Array(vec![exponential(1.0, 0.0), exponential(0.0, 0.0), exponential(0.0, 1.0)]),
        })
        .unwrap();
        assert_eq!(g.stops.first().map(|s| s.color), Some([255, 0, 0]));
        assert_eq!(g.stops.last().map(|s| s.color), Some([0, 0, 255]));
    }

    #[test]
    fn test_stitching_breakpoint_becomes_stop() {
        let stitched = Object::Dictionary(dict! {
            "FunctionType" => Object::Integer(3),
            "Domain" => Object::Array(vec![0.into(), 1.into()]),
            "Functions" => Object::Array(vec![exponential(0.0, 0.0), exponential(1.0, 1.0)]),
            "Bounds" => Object::Array(vec![Object::Real(0.3)]),
            "Encode" => Object::Array(vec![0.into(), 1.into(), 0.into(), 1.into()]),
        });
        let g = load(dict! {
            "ShadingType" => Object::Integer(2),
            "ColorSpace" => Object::name("DeviceGray"),
            "Coords" => Object::Array(vec![0.into(), 0.into(), 1.into(), 0.into()]),
            "Function" => stitched,
        })
        .unwrap();

        let stop = g.stops.iter().find(|s| (s.offset - 0.3).abs() < 1e-6).unwrap();
        assert_eq!(stop.color, [255, 255, 255]);
        assert!(g.stops.windows(2).all(|w| w[0].offset < w[1].offset));
    }

    // ========================================================================
    // Radial and unsupported
    // ========================================================================

    #[test]
    fn test_radial_coords_and_background() {
        let g = load(dict! {
            "ShadingType" => Object::Integer(3),
            "ColorSpace" => Object::name("DeviceGray"),
            "Coords" => Object::Array(vec![5.into(), 5.into(), 0.into(), 5.into(), 5.into(), 10.into()]),
            "Function" => exponential(1.0, 0.0),
            "Background" => Object::Array(vec![Object::Real(0.5)]),
            "BBox" => Object::Array(vec![0.into(), 0.into(), 10.into(), 10.into()]),
        })
        .unwrap();
        assert!(matches!(g.kind, GradientKind::Radial { end_radius, .. } if end_radius == 10.0));
        assert_eq!(g.background, Some([128, 128, 128]));
        assert_eq!(g.bbox, Some(Rect::new(0.0, 0.0, 10.0, 10.0)));
    }

    #[test]
    fn test_mesh_shadings_not_implemented() {
        let err = load(dict! {
            "ShadingType" => Object::Integer(4),
            "ColorSpace" => Object::name("DeviceRGB"),
        })
        .unwrap_err();
        assert!(matches!(err, Error::NotImplemented(_)));
    }

    #[test]
    fn test_wrong_coordinate_count() {
        let err = load(dict! {
            "ShadingType" => Object::Integer(3),
            "ColorSpace" => Object::name("DeviceRGB"),
            "Coords" => Object::Array(vec![0.into(), 0.into(), 1.into(), 1.into()]),
            "Function" => exponential(0.0, 1.0),
        })
        .unwrap_err();
        assert!(matches!(err, Error::StructuralInvariantViolation(_)));
    }
}
