//! PDF functions (sampled, exponential, stitching).
//!
//! PostScript calculator functions (type 4) are recognised and rejected with
//! [`Error::NotImplemented`].

use crate::error::{Error, Result};
use crate::object::{Dictionary, DictionaryExt, Object, ObjectRef};
use crate::resources::SampleReader;
use crate::store::ObjectStore;

/// Linear map of `x` from `[xmin, xmax]` onto `[ymin, ymax]`.
pub fn interpolate(x: f32, xmin: f32, xmax: f32, ymin: f32, ymax: f32) -> f32 {
    if xmax == xmin {
        return ymin;
    }
    ymin + (x - xmin) * (ymax - ymin) / (xmax - xmin)
}

fn pairs(obj: Option<&Object>) -> Option<Vec<(f32, f32)>> {
    let values = obj?.as_number_array()?;
    if values.len() % 2 != 0 {
        return None;
    }
    Some(values.chunks_exact(2).map(|c| (c[0], c[1])).collect())
}

fn clamp_to(value: f32, (lo, hi): (f32, f32)) -> f32 {
    value.max(lo.min(hi)).min(hi.max(lo))
}

fn bad_function(reason: impl Into<String>) -> Error {
    Error::StructuralInvariantViolation(format!("function: {}", reason.into()))
}

/// Type 0.
#[derive(Debug, Clone, PartialEq)]
pub struct Sampled {
    domain: Vec<(f32, f32)>,
    range: Vec<(f32, f32)>,
    size: Vec<usize>,
    bits_per_sample: u32,
    encode: Vec<(f32, f32)>,
    decode: Vec<(f32, f32)>,
    samples: Vec<u32>,
}

/// Type 2.
#[derive(Debug, Clone, PartialEq)]
pub struct Exponential {
    domain: (f32, f32),
    range: Option<Vec<(f32, f32)>>,
    c0: Vec<f32>,
    c1: Vec<f32>,
    exponent: f32,
}

/// Type 3.
#[derive(Debug, Clone, PartialEq)]
pub struct Stitching {
    domain: (f32, f32),
    range: Option<Vec<(f32, f32)>>,
    functions: Vec<Function>,
    bounds: Vec<f32>,
    encode: Vec<(f32, f32)>,
}

/// A loaded function.
#[derive(Debug, Clone, PartialEq)]
pub enum Function {
    /// Sampled (type 0)
    Sampled(Sampled),
    /// Exponential interpolation (type 2)
    Exponential(Exponential),
    /// Stitching (type 3)
    Stitching(Stitching),
}

impl Function {
    /// Load a function from a dictionary, a stream or a reference to either.
    pub fn load(obj: &Object, store: &mut ObjectStore) -> Result<Self> {
        Self::load_nested(obj, store, 0)
    }

    fn load_nested(obj: &Object, store: &mut ObjectStore, depth: u32) -> Result<Self> {
        let limit = store.options().max_recursion_depth;
        if depth > limit {
            return Err(Error::RecursionLimitExceeded(limit));
        }
        let owner = obj.as_reference().unwrap_or(ObjectRef::NONE);
        let resolved = store.resolve(obj);
        let dict = match &resolved {
            Object::Dictionary(d) => d,
            Object::Stream(s) => &s.dict,
            other => {
                return Err(Error::InvalidObjectType {
                    expected: "Dictionary".into(),
                    found: other.type_name().into(),
                });
            },
        };

        match dict.get_int("FunctionType") {
            Some(0) => {
                let stream = resolved
                    .as_stream()
                    .ok_or_else(|| bad_function("sampled function is not a stream"))?;
                let data = store.decode_stream(stream, owner)?.data;
                Ok(Function::Sampled(Sampled::new(dict, &data)?))
            },
            Some(2) => Ok(Function::Exponential(Exponential::new(dict)?)),
            Some(3) => {
                let parts = match dict.get("Functions").map(|f| store.resolve(f)) {
                    Some(Object::Array(items)) => items,
                    _ => return Err(bad_function("stitching function has no /Functions")),
                };
                let functions = parts
                    .iter()
                    .map(|f| Self::load_nested(f, store, depth + 1))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Function::Stitching(Stitching::new(dict, functions)?))
            },
            Some(4) => Err(Error::NotImplemented("PostScript calculator functions (type 4)".into())),
            other => Err(bad_function(format!("unknown FunctionType {:?}", other))),
        }
    }

    /// Number of inputs.
    pub fn input_count(&self) -> usize {
        match self {
            Function::Sampled(f) => f.domain.len(),
            Function::Exponential(_) | Function::Stitching(_) => 1,
        }
    }

    /// Number of outputs.
    pub fn output_count(&self) -> usize {
        match self {
            Function::Sampled(f) => f.range.len(),
            Function::Exponential(f) => f.c0.len(),
            Function::Stitching(f) => f.functions.first().map_or(0, Function::output_count),
        }
    }

    /// Evaluate into `output`; extra output slots are left untouched.
    pub fn call(&self, input: &[f32], output: &mut [f32]) {
        let values = self.eval(input);
        for (slot, value) in output.iter_mut().zip(values) {
            *slot = value;
        }
    }

    /// Evaluate and return the outputs.
    pub fn eval(&self, input: &[f32]) -> Vec<f32> {
        match self {
            Function::Sampled(f) => f.eval(input),
            Function::Exponential(f) => f.eval(input.first().copied().unwrap_or(0.0)),
            Function::Stitching(f) => f.eval(input.first().copied().unwrap_or(0.0)),
        }
    }

    /// Interior points where a stitching function switches sub-function.
    pub fn breakpoints(&self) -> &[f32] {
        match self {
            Function::Stitching(f) => &f.bounds,
            _ => &[],
        }
    }
}

impl Sampled {
    fn new(dict: &Dictionary, data: &[u8]) -> Result<Self> {
        let domain = pairs(dict.get("Domain")).ok_or_else(|| bad_function("missing /Domain"))?;
        let range = pairs(dict.get("Range")).ok_or_else(|| bad_function("sampled function has no /Range"))?;
        let size: Vec<usize> = dict
            .get("Size")
            .and_then(Object::as_number_array)
            .map(|s| s.into_iter().map(|v| v.max(1.0) as usize).collect())
            .ok_or_else(|| bad_function("sampled function has no /Size"))?;
        if size.len() != domain.len() || range.is_empty() {
            return Err(bad_function("/Size does not match /Domain"));
        }
        let bits_per_sample = dict.get_int("BitsPerSample").unwrap_or(0) as u32;
        if !matches!(bits_per_sample, 1 | 2 | 4 | 8 | 12 | 16 | 24 | 32) {
            return Err(bad_function(format!("invalid BitsPerSample {}", bits_per_sample)));
        }
        let encode = pairs(dict.get("Encode"))
            .filter(|e| e.len() == size.len())
            .unwrap_or_else(|| size.iter().map(|&s| (0.0, (s - 1) as f32)).collect());
        let decode = pairs(dict.get("Decode"))
            .filter(|d| d.len() == range.len())
            .unwrap_or_else(|| range.clone());

        let expected = size.iter().product::<usize>() * range.len();
        let mut reader = SampleReader::new(data);
        let mut samples: Vec<u32> = (0..expected).map_while(|_| reader.read(bits_per_sample)).collect();
        if samples.len() < expected {
            log::warn!("Sampled function has {} of {} samples", samples.len(), expected);
            samples.resize(expected, 0);
        }

        Ok(Self {
            domain,
            range,
            size,
            bits_per_sample,
            encode,
            decode,
            samples,
        })
    }

    fn eval(&self, input: &[f32]) -> Vec<f32> {
        let m = self.domain.len();
        let n = self.range.len();

        // Position of the input in sample space, split into cell and fraction
        let mut cell = Vec::with_capacity(m);
        let mut frac = Vec::with_capacity(m);
        for d in 0..m {
            let x = clamp_to(input.get(d).copied().unwrap_or(0.0), self.domain[d]);
            let (lo, hi) = self.domain[d];
            let (e0, e1) = self.encode[d];
            let e = interpolate(x, lo, hi, e0, e1).clamp(0.0, (self.size[d] - 1) as f32);
            let base = (e.floor() as usize).min(self.size[d].saturating_sub(2));
            cell.push(base);
            frac.push(if self.size[d] == 1 { 0.0 } else { e - base as f32 });
        }

        let mut strides = vec![1usize; m];
        for d in 1..m {
            strides[d] = strides[d - 1] * self.size[d - 1];
        }

        let mut out = vec![0.0f32; n];
        for corner in 0..(1usize << m) {
            let mut weight = 1.0;
            let mut index = 0;
            for d in 0..m {
                let upper = corner & (1 << d) != 0;
                if upper && self.size[d] == 1 {
                    weight = 0.0;
                    break;
                }
                weight *= if upper { frac[d] } else { 1.0 - frac[d] };
                index += (cell[d] + upper as usize) * strides[d];
            }
            if weight == 0.0 {
                continue;
            }
            for (j, slot) in out.iter_mut().enumerate() {
                *slot += weight * self.samples.get(index * n + j).copied().unwrap_or(0) as f32;
            }
        }

        let max_sample = ((1u64 << self.bits_per_sample) - 1) as f32;
        out.iter()
            .enumerate()
            .map(|(j, &v)| {
                let (d0, d1) = self.decode[j];
                clamp_to(interpolate(v, 0.0, max_sample, d0, d1), self.range[j])
            })
            .collect()
    }
}

impl Exponential {
    fn new(dict: &Dictionary) -> Result<Self> {
        let domain = pairs(dict.get("Domain"))
            .and_then(|d| d.first().copied())
            .ok_or_else(|| bad_function("missing /Domain"))?;
        let c0 = dict.get("C0").and_then(Object::as_number_array).unwrap_or_else(|| vec![0.0]);
        let c1 = dict.get("C1").and_then(Object::as_number_array).unwrap_or_else(|| vec![1.0]);
        if c0.len() != c1.len() {
            return Err(bad_function("/C0 and /C1 differ in length"));
        }
        let exponent = dict.get_number("N").ok_or_else(|| bad_function("exponential function has no /N"))?;
        Ok(Self {
            domain,
            range: pairs(dict.get("Range")),
            c0,
            c1,
            exponent,
        })
    }

    fn eval(&self, x: f32) -> Vec<f32> {
        let x = clamp_to(x, self.domain);
        let xn = x.powf(self.exponent);
        self.c0
            .iter()
            .zip(&self.c1)
            .enumerate()
            .map(|(j, (c0, c1))| {
                let y = c0 + xn * (c1 - c0);
                match self.range.as_ref().and_then(|r| r.get(j)) {
                    Some(&range) => clamp_to(y, range),
                    None => y,
                }
            })
            .collect()
    }
}

impl Stitching {
    fn new(dict: &Dictionary, functions: Vec<Function>) -> Result<Self> {
        let k = functions.len();
        if k == 0 {
            return Err(bad_function("stitching function has no sub-functions"));
        }
        let domain = pairs(dict.get("Domain"))
            .and_then(|d| d.first().copied())
            .ok_or_else(|| bad_function("missing /Domain"))?;
        let bounds = dict.get("Bounds").and_then(Object::as_number_array).unwrap_or_default();
        let encode = pairs(dict.get("Encode")).unwrap_or_default();
        if bounds.len() != k - 1 || encode.len() != k {
            return Err(bad_function(format!(
                "{} sub-functions need {} bounds and {} encode pairs",
                k,
                k - 1,
                k
            )));
        }
        Ok(Self {
            domain,
            range: pairs(dict.get("Range")),
            functions,
            bounds,
            encode,
        })
    }

    /// Sub-function for `x` and its sub-domain. `x` equal to a bound belongs
    /// to the interval starting there.
    fn select(&self, x: f32) -> (usize, f32, f32) {
        let i = self.bounds.iter().position(|&b| x < b).unwrap_or(self.bounds.len());
        let low = if i == 0 { self.domain.0 } else { self.bounds[i - 1] };
        let high = if i == self.bounds.len() { self.domain.1 } else { self.bounds[i] };
        (i, low, high)
    }

    fn eval(&self, x: f32) -> Vec<f32> {
        let x = clamp_to(x, self.domain);
        let (i, low, high) = self.select(x);
        let (e0, e1) = self.encode[i];
        let mut out = self.functions[i].eval(&[interpolate(x, low, high, e0, e1)]);
        if let Some(range) = &self.range {
            for (value, &r) in out.iter_mut().zip(range) {
                *value = clamp_to(*value, r);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OpenOptions;
    use crate::dict;
    use crate::object::Stream;

    fn store() -> ObjectStore {
        ObjectStore::empty(OpenOptions::default())
    }

    fn nums(values: &[f32]) -> Object {
        Object::Array(values.iter().map(|&v| Object::Real(v)).collect())
    }

    fn linear(c0: f32, c1: f32) -> Object {
        Object::Dictionary(dict! {
            "FunctionType" => Object::Integer(2),
            "Domain" => nums(&[0.0, 1.0]),
            "C0" => nums(&[c0]),
            "C1" => nums(&[c1]),
            "N" => Object::Integer(1),
        })
    }

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-4
    }

    #[test]
    fn test_exponential() {
        let mut s = store();
        let f = Function::load(
            &Object::Dictionary(dict! {
                "FunctionType" => Object::Integer(2),
                "Domain" => nums(&[0.0, 1.0]),
                "C0" => nums(&[0.0, 1.0]),
                "C1" => nums(&[1.0, 0.0]),
                "N" => Object::Integer(2),
            }),
            &mut s,
        )
        .unwrap();
        assert_eq!(f.output_count(), 2);
        let out = f.eval(&[0.5]);
        assert!(approx(out[0], 0.25) && approx(out[1], 0.75));
        // Clamped to the domain
        assert_eq!(f.eval(&[2.0]), vec![1.0, 0.0]);
    }

    // ========================================================================
    // Stitching
    // ========================================================================

    fn stitched(s: &mut ObjectStore) -> Function {
        Function::load(
            &Object::Dictionary(dict! {
                "FunctionType" => Object::Integer(3),
                "Domain" => nums(&[0.0, 1.0]),
                "Functions" => Object::Array(vec![linear(0.0, 1.0), linear(10.0, 20.0)]),
                "Bounds" => nums(&[0.5]),
                "Encode" => nums(&[0.0, 1.0, 0.0, 1.0]),
            }),
            s,
        )
        .unwrap()
    }

    #[test]
    fn test_stitching_below_bound_reencodes_into_first() {
        let mut s = store();
        let f = stitched(&mut s);
        // 0.25 is halfway through [0, 0.5]
        assert!(approx(f.eval(&[0.25])[0], 0.5));
    }

    #[test]
    fn test_stitching_at_bound_uses_next_function() {
        let mut s = store();
        let f = stitched(&mut s);
        assert!(approx(f.eval(&[0.5])[0], 10.0));
        assert!(approx(f.eval(&[0.499])[0], 0.998));
        assert!(approx(f.eval(&[1.0])[0], 20.0));
        assert_eq!(f.breakpoints(), &[0.5]);
    }

    #[test]
    fn test_stitching_shape_is_checked() {
        let mut s = store();
        let err = Function::load(
            &Object::Dictionary(dict! {
                "FunctionType" => Object::Integer(3),
                "Domain" => nums(&[0.0, 1.0]),
                "Functions" => Object::Array(vec![linear(0.0, 1.0), linear(1.0, 0.0)]),
                "Bounds" => nums(&[]),
                "Encode" => nums(&[0.0, 1.0, 0.0, 1.0]),
            }),
            &mut s,
        );
        assert!(err.is_err());
    }

    // ========================================================================
    // Sampled
    // ========================================================================

    #[test]
    fn test_sampled_interpolates() {
        let mut s = store();
        let stream = Stream::new(
            dict! {
                "FunctionType" => Object::Integer(0),
                "Domain" => nums(&[0.0, 1.0]),
                "Range" => nums(&[0.0, 1.0]),
                "Size" => Object::Array(vec![3.into()]),
                "BitsPerSample" => Object::Integer(8),
            },
            vec![0u8, 255, 0],
        );
        let r = s.add_object(Object::Stream(stream));
        let f = Function::load(&Object::Reference(r), &mut s).unwrap();
        assert!(approx(f.eval(&[0.0])[0], 0.0));
        assert!(approx(f.eval(&[0.5])[0], 1.0));
        assert!(approx(f.eval(&[0.25])[0], 0.5));
        assert!(approx(f.eval(&[1.0])[0], 0.0));
    }

    #[test]
    fn test_sampled_two_inputs() {
        let mut s = store();
        // 2x2 grid: f(x, y) = x + y scaled to 0..255 / 2
        let stream = Stream::new(
            dict! {
                "FunctionType" => Object::Integer(0),
                "Domain" => nums(&[0.0, 1.0, 0.0, 1.0]),
                "Range" => nums(&[0.0, 2.0]),
                "Size" => Object::Array(vec![2.into(), 2.into()]),
                "BitsPerSample" => Object::Integer(8),
            },
            vec![0u8, 128, 128, 255],
        );
        let f = Function::load(&Object::Stream(stream), &mut s).unwrap();
        assert!(approx(f.eval(&[1.0, 1.0])[0], 2.0));
        let mid = f.eval(&[0.5, 0.5])[0];
        assert!((mid - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_postscript_not_implemented() {
        let mut s = store();
        let stream = Stream::new(
            dict! {
                "FunctionType" => Object::Integer(4),
                "Domain" => nums(&[0.0, 1.0]),
                "Range" => nums(&[0.0, 1.0]),
            },
            b"{ dup }".to_vec(),
        );
        assert!(matches!(
            Function::load(&Object::Stream(stream), &mut s),
            Err(Error::NotImplemented(_))
        ));
    }

    #[test]
    fn test_call_fills_output_slice() {
        let mut s = store();
        let f = Function::load(&linear(0.0, 2.0), &mut s).unwrap();
        let mut out = [9.0f32; 2];
        f.call(&[0.5], &mut out);
        assert_eq!(out, [1.0, 9.0]);
    }
}
