//! Font width tables.
//!
//! Only metrics are handled here: the interpreter needs glyph advances to
//! position text, while glyph outlines are left to the drawing surface.
//! Fonts without a usable `/Widths` table fall back to metrics registered in
//! a [`FontRegistry`], which callers construct and pass in explicitly.

use std::collections::{BTreeMap, HashMap};

use phf::phf_map;
use ttf_parser::Face;

use crate::error::{Error, Result};
use crate::geometry::Matrix;
use crate::object::{DictionaryExt, Object};
use crate::store::ObjectStore;

/// Width used when nothing better is known, in 1000ths of an em.
const DEFAULT_WIDTH: f32 = 500.0;
/// Width of every glyph in a fixed-pitch font without metrics.
const FIXED_PITCH_WIDTH: f32 = 600.0;
/// Default `/DW` of a CIDFont.
const DEFAULT_CID_WIDTH: f32 = 1000.0;

/// Common names for the standard base fonts.
static BASE_FONT_ALIASES: phf::Map<&'static str, &'static str> = phf_map! {
    "Arial" => "Helvetica",
    "ArialMT" => "Helvetica",
    "Arial,Bold" => "Helvetica-Bold",
    "Arial-BoldMT" => "Helvetica-Bold",
    "Arial,Italic" => "Helvetica-Oblique",
    "Arial-ItalicMT" => "Helvetica-Oblique",
    "TimesNewRoman" => "Times-Roman",
    "TimesNewRomanPSMT" => "Times-Roman",
    "TimesNewRoman,Bold" => "Times-Bold",
    "TimesNewRomanPS-BoldMT" => "Times-Bold",
    "TimesNewRoman,Italic" => "Times-Italic",
    "CourierNew" => "Courier",
    "CourierNewPSMT" => "Courier",
    "CourierNew,Bold" => "Courier-Bold",
    "Symbol,Bold" => "Symbol",
};

/// Advance widths keyed by Unicode scalar, in 1000ths of an em.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FontMetrics {
    widths: HashMap<u32, f32>,
    /// Width of characters missing from the table
    pub default_width: f32,
}

impl FontMetrics {
    /// Metrics where every character has the same advance.
    pub fn fixed(width: f32) -> Self {
        Self {
            widths: HashMap::new(),
            default_width: width,
        }
    }

    /// Advance of `ch`.
    pub fn width(&self, ch: u32) -> f32 {
        self.widths.get(&ch).copied().unwrap_or(self.default_width)
    }
}

/// Metrics for fonts that are referenced by name but not embedded.
///
/// The registry is plain owned data: build one at startup, register whatever
/// system fonts are available, and hand it to `Document::open_with`.
#[derive(Debug, Clone, Default)]
pub struct FontRegistry {
    fonts: HashMap<String, FontMetrics>,
}

impl FontRegistry {
    /// Empty registry; the Courier family still resolves to fixed widths.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register metrics under a base font name.
    pub fn register(&mut self, name: impl Into<String>, metrics: FontMetrics) {
        self.fonts.insert(name.into(), metrics);
    }

    /// Read advance widths from a TrueType/OpenType program.
    pub fn register_truetype(&mut self, name: impl Into<String>, data: &[u8]) -> Result<()> {
        let face = Face::parse(data, 0).map_err(|e| Error::StructuralInvariantViolation(format!("font: {}", e)))?;
        let units = face.units_per_em() as f32;
        let scale = if units > 0.0 { 1000.0 / units } else { 1.0 };

        let mut widths = HashMap::new();
        for ch in (0x20u32..0x7F).chain(0xA0..0x100) {
            let advance = char::from_u32(ch)
                .and_then(|c| face.glyph_index(c))
                .and_then(|gid| face.glyph_hor_advance(gid));
            if let Some(advance) = advance {
                widths.insert(ch, advance as f32 * scale);
            }
        }
        let default_width = widths.get(&0x20).copied().unwrap_or(DEFAULT_WIDTH);
        log::debug!("registered {} widths for font", widths.len());
        self.register(name, FontMetrics { widths, default_width });
        Ok(())
    }

    /// Find metrics for a `/BaseFont` name, ignoring any subset tag.
    pub fn lookup(&self, base_font: &str) -> Option<&FontMetrics> {
        let name = strip_subset_tag(base_font);
        if let Some(found) = self.fonts.get(name) {
            return Some(found);
        }
        BASE_FONT_ALIASES.get(name).and_then(|canonical| self.fonts.get(*canonical))
    }

    /// Canonical standard-font name for `base_font`.
    pub fn canonical_name(base_font: &str) -> &str {
        let name = strip_subset_tag(base_font);
        BASE_FONT_ALIASES.get(name).copied().unwrap_or(name)
    }
}

/// `ABCDEF+Name` becomes `Name`.
fn strip_subset_tag(name: &str) -> &str {
    match name.split_once('+') {
        Some((tag, rest)) if tag.len() == 6 && tag.bytes().all(|b| b.is_ascii_uppercase()) => rest,
        _ => name,
    }
}

/// Width table layout.
#[derive(Debug, Clone, PartialEq)]
pub enum FontKind {
    /// Type1, TrueType, MMType1: one-byte codes
    Simple {
        /// First code covered by `widths`
        first_char: u32,
        /// Widths from `FirstChar` on
        widths: Vec<f32>,
        /// Width for codes outside the table
        missing_width: f32,
        /// Registry metrics used when `widths` is empty
        fallback: Option<FontMetrics>,
    },
    /// Type0 with a CIDFont descendant: two-byte codes
    Composite {
        /// `/DW`
        default_width: f32,
        /// Explicit `/W` entries
        widths: BTreeMap<u32, f32>,
    },
    /// Glyphs defined by content procedures
    Type3 {
        /// First code covered by `widths`
        first_char: u32,
        /// Widths in glyph space
        widths: Vec<f32>,
        /// Glyph space to text space
        matrix: Matrix,
    },
}

/// A font resource reduced to what text positioning needs.
#[derive(Debug, Clone, PartialEq)]
pub struct Font {
    /// `/BaseFont`, empty for Type3
    pub base_font: String,
    /// Width data
    pub kind: FontKind,
}

impl Font {
    /// Load a font dictionary.
    pub fn load(obj: &Object, store: &mut ObjectStore, registry: &FontRegistry) -> Result<Self> {
        let dict = store.resolve_dict(obj).ok_or_else(|| Error::InvalidObjectType {
            expected: "Dictionary".into(),
            found: obj.type_name().into(),
        })?;
        let base_font = dict.get_name("BaseFont").unwrap_or_default().to_string();

        let kind = match dict.get_name("Subtype") {
            Some("Type0") => {
                let descendant = match dict.get("DescendantFonts").map(|d| store.resolve(d)) {
                    Some(Object::Array(items)) => items.first().and_then(|d| store.resolve_dict(d)),
                    _ => None,
                }
                .ok_or_else(|| Error::StructuralInvariantViolation("Type0 font has no descendant".into()))?;
                let default_width = descendant.get_number("DW").unwrap_or(DEFAULT_CID_WIDTH);
                let w = descendant.get("W").map(|w| store.resolve(w)).unwrap_or(Object::Null);
                FontKind::Composite {
                    default_width,
                    widths: parse_cid_widths(&w, store),
                }
            },
            Some("Type3") => {
                let matrix = dict
                    .get("FontMatrix")
                    .and_then(Matrix::from_object)
                    .unwrap_or(Matrix::scaling(0.001, 0.001));
                FontKind::Type3 {
                    first_char: dict.get_int("FirstChar").unwrap_or(0).max(0) as u32,
                    widths: number_array(dict.get("Widths"), store),
                    matrix,
                }
            },
            _ => {
                let descriptor = dict
                    .get("FontDescriptor")
                    .and_then(|d| store.resolve_dict(d))
                    .unwrap_or_default();
                let widths = number_array(dict.get("Widths"), store);
                let fixed_pitch = descriptor.get_int("Flags").is_some_and(|f| f & 1 != 0)
                    || FontRegistry::canonical_name(&base_font).starts_with("Courier");
                let missing_width = descriptor.get_number("MissingWidth").unwrap_or(if fixed_pitch {
                    FIXED_PITCH_WIDTH
                } else {
                    DEFAULT_WIDTH
                });
                let fallback = if widths.is_empty() {
                    registry
                        .lookup(&base_font)
                        .cloned()
                        .or_else(|| fixed_pitch.then(|| FontMetrics::fixed(FIXED_PITCH_WIDTH)))
                } else {
                    None
                };
                if widths.is_empty() && fallback.is_none() {
                    log::debug!("font {} has no widths; using {}", base_font, missing_width);
                }
                FontKind::Simple {
                    first_char: dict.get_int("FirstChar").unwrap_or(0).max(0) as u32,
                    widths,
                    missing_width,
                    fallback,
                }
            },
        };

        Ok(Font { base_font, kind })
    }

    /// Split a string operand into `(code, byte length)` pairs.
    pub fn codes(&self, bytes: &[u8]) -> Vec<(u32, usize)> {
        match self.kind {
            FontKind::Composite { .. } => bytes
                .chunks_exact(2)
                .map(|c| ((u32::from(c[0]) << 8) | u32::from(c[1]), 2))
                .collect(),
            _ => bytes.iter().map(|&b| (u32::from(b), 1)).collect(),
        }
    }

    /// Advance of `code` in 1000ths of text space units.
    pub fn width(&self, code: u32) -> f32 {
        match &self.kind {
            FontKind::Simple {
                first_char,
                widths,
                missing_width,
                fallback,
            } => {
                if let Some(w) = table_lookup(widths, *first_char, code) {
                    return w;
                }
                match fallback {
                    Some(metrics) => metrics.width(code),
                    None => *missing_width,
                }
            },
            FontKind::Composite { default_width, widths } => widths.get(&code).copied().unwrap_or(*default_width),
            FontKind::Type3 {
                first_char,
                widths,
                matrix,
            } => table_lookup(widths, *first_char, code).unwrap_or(0.0) * matrix.a * 1000.0,
        }
    }

    /// Whether word spacing applies to this code.
    pub fn is_word_space(&self, code: u32, len: usize) -> bool {
        code == 32 && len == 1
    }
}

fn table_lookup(widths: &[f32], first_char: u32, code: u32) -> Option<f32> {
    let index = code.checked_sub(first_char)? as usize;
    widths.get(index).copied()
}

fn number_array(obj: Option<&Object>, store: &mut ObjectStore) -> Vec<f32> {
    match obj.map(|o| store.resolve(o)) {
        Some(Object::Array(items)) => items
            .iter()
            .map(|item| store.resolve(item).as_number().unwrap_or(0.0))
            .collect(),
        _ => Vec::new(),
    }
}

/// `/W` holds runs of `c [w1 w2 ...]` and `c_first c_last w`.
fn parse_cid_widths(w: &Object, store: &mut ObjectStore) -> BTreeMap<u32, f32> {
    let mut widths = BTreeMap::new();
    let items = match w.as_array() {
        Some(items) => items,
        None => return widths,
    };

    let mut i = 0;
    while i < items.len() {
        let first = match items[i].as_integer() {
            Some(c) if c >= 0 => c as u32,
            _ => {
                log::warn!("malformed /W entry at {}", i);
                break;
            },
        };
        match items.get(i + 1).map(|o| store.resolve(o)) {
            Some(Object::Array(list)) => {
                for (offset, value) in list.iter().enumerate() {
                    if let Some(v) = value.as_number() {
                        widths.insert(first + offset as u32, v);
                    }
                }
                i += 2;
            },
            Some(last) => {
                let (last, value) = match (last.as_integer(), items.get(i + 2).and_then(Object::as_number)) {
                    (Some(l), Some(v)) if l >= first as i64 => (l as u32, v),
                    _ => {
                        log::warn!("malformed /W range at {}", i);
                        break;
                    },
                };
                for code in first..=last.min(first.saturating_add(0xFFFF)) {
                    widths.insert(code, value);
                }
                i += 3;
            },
            None => break,
        }
    }
    widths
}
