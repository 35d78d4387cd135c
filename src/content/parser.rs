//! Content stream tokenizer.
//!
//! Content streams are postfix: operands accumulate on a stack until an
//! operator keyword arrives, then the operator consumes them and the stack is
//! cleared.
//!
//! ```text
//! BT
//!   /F1 12 Tf
//!   100 700 Td
//!   (Hello, World!) Tj
//! ET
//! ```

use crate::content::operators::{FillRule, Operator, TextElement};
use crate::decoders::{decode_chain, filter_chain, DecodeLimits};
use crate::error::Result;
use crate::lexer::{is_delimiter, is_whitespace, skip_ws, token, Token};
use crate::object::{Dictionary, Object};
use crate::parser::parse_object;

/// Parse a decoded content stream into operators.
///
/// Bytes that cannot start a token are skipped one at a time, so a damaged
/// stream still yields every operator that can be recovered.
///
/// ```
/// use pdf_engine::content::{parse_content_stream, Operator};
///
/// let ops = parse_content_stream(b"BT /F1 12 Tf 100 700 Td (Hello) Tj ET").unwrap();
/// assert_eq!(ops.len(), 5);
/// assert!(matches!(ops[2], Operator::Td { tx, ty } if tx == 100.0 && ty == 700.0));
/// ```
pub fn parse_content_stream(data: &[u8]) -> Result<Vec<Operator>> {
    let mut operators = Vec::new();
    let mut operands: Vec<Object> = Vec::new();
    let mut input = data;

    loop {
        input = match skip_ws(input) {
            Ok((rest, _)) => rest,
            Err(_) => input,
        };
        if input.is_empty() {
            break;
        }

        match token(input) {
            Ok((rest, Token::Keyword(word))) => {
                let name = String::from_utf8_lossy(word);
                if name == "BI" {
                    operands.clear();
                    match parse_inline_image(rest) {
                        Some((after, op)) => {
                            operators.push(op);
                            input = after;
                        },
                        None => {
                            log::warn!("unterminated inline image");
                            break;
                        },
                    }
                    continue;
                }
                operators.push(build_operator(&name, std::mem::take(&mut operands)));
                input = rest;
            },
            Ok((rest, Token::R)) => {
                operators.push(build_operator("R", std::mem::take(&mut operands)));
                input = rest;
            },
            Ok((
                rest,
                Token::ArrayEnd | Token::DictEnd | Token::ObjStart | Token::ObjEnd | Token::StreamStart | Token::StreamEnd,
            )) => {
                log::debug!("skipping stray token in content stream");
                input = rest;
            },
            Ok(_) => match parse_object(input) {
                Ok((rest, obj)) => {
                    operands.push(obj);
                    input = rest;
                },
                Err(_) => input = &input[1..],
            },
            Err(_) => input = &input[1..],
        }
    }

    if !operands.is_empty() {
        log::debug!("{} trailing operands without an operator", operands.len());
    }
    Ok(operators)
}

fn build_operator(name: &str, operands: Vec<Object>) -> Operator {
    let num = |i: usize, default: f32| get_number(&operands, i).unwrap_or(default);
    let name_at = |i: usize, default: &str| get_name(&operands, i).unwrap_or(default).to_string();

    match name {
        // Text positioning
        "Td" => Operator::Td {
            tx: num(0, 0.0),
            ty: num(1, 0.0),
        },
        "TD" => Operator::TD {
            tx: num(0, 0.0),
            ty: num(1, 0.0),
        },
        "Tm" => Operator::Tm {
            a: num(0, 1.0),
            b: num(1, 0.0),
            c: num(2, 0.0),
            d: num(3, 1.0),
            e: num(4, 0.0),
            f: num(5, 0.0),
        },
        "T*" => Operator::TStar,

        // Text showing
        "Tj" => Operator::Tj {
            text: get_string(&operands, 0),
        },
        "TJ" => {
            let array = match operands.first() {
                Some(Object::Array(items)) => items
                    .iter()
                    .filter_map(|obj| match obj {
                        Object::String(s) => Some(TextElement::String(s.clone())),
                        other => other.as_number().map(TextElement::Offset),
                    })
                    .collect(),
                _ => Vec::new(),
            };
            Operator::TJ { array }
        },
        "'" => Operator::Quote {
            text: get_string(&operands, 0),
        },
        "\"" => Operator::DoubleQuote {
            word_space: num(0, 0.0),
            char_space: num(1, 0.0),
            text: get_string(&operands, 2),
        },

        // Text state
        "Tc" => Operator::Tc { char_space: num(0, 0.0) },
        "Tw" => Operator::Tw { word_space: num(0, 0.0) },
        "Tz" => Operator::Tz { scale: num(0, 100.0) },
        "TL" => Operator::TL { leading: num(0, 0.0) },
        "Tf" => Operator::Tf {
            font: name_at(0, ""),
            size: num(1, 12.0),
        },
        "Tr" => Operator::Tr {
            render: get_number(&operands, 0).unwrap_or(0.0).clamp(0.0, 7.0) as u8,
        },
        "Ts" => Operator::Ts { rise: num(0, 0.0) },
        "d0" => Operator::SetGlyphWidth {
            wx: num(0, 0.0),
            wy: num(1, 0.0),
        },
        "d1" => Operator::SetGlyphWidthAndBounds {
            wx: num(0, 0.0),
            wy: num(1, 0.0),
            bbox: [num(2, 0.0), num(3, 0.0), num(4, 0.0), num(5, 0.0)],
        },

        // Graphics state
        "q" => Operator::SaveState,
        "Q" => Operator::RestoreState,
        "cm" => Operator::Cm {
            a: num(0, 1.0),
            b: num(1, 0.0),
            c: num(2, 0.0),
            d: num(3, 1.0),
            e: num(4, 0.0),
            f: num(5, 0.0),
        },
        "w" => Operator::SetLineWidth { width: num(0, 1.0) },
        "d" => Operator::SetDash {
            array: operands.first().and_then(Object::as_number_array).unwrap_or_default(),
            phase: num(1, 0.0),
        },
        "J" => Operator::SetLineCap {
            cap_style: num(0, 0.0).clamp(0.0, 2.0) as u8,
        },
        "j" => Operator::SetLineJoin {
            join_style: num(0, 0.0).clamp(0.0, 2.0) as u8,
        },
        "M" => Operator::SetMiterLimit { limit: num(0, 10.0) },
        "ri" => Operator::SetRenderingIntent {
            intent: name_at(0, "RelativeColorimetric"),
        },
        "i" => Operator::SetFlatness { tolerance: num(0, 1.0) },
        "gs" => Operator::SetExtGState {
            dict_name: name_at(0, ""),
        },

        // Color
        "rg" => Operator::SetFillRgb {
            r: num(0, 0.0),
            g: num(1, 0.0),
            b: num(2, 0.0),
        },
        "RG" => Operator::SetStrokeRgb {
            r: num(0, 0.0),
            g: num(1, 0.0),
            b: num(2, 0.0),
        },
        "g" => Operator::SetFillGray { gray: num(0, 0.0) },
        "G" => Operator::SetStrokeGray { gray: num(0, 0.0) },
        "k" => Operator::SetFillCmyk {
            c: num(0, 0.0),
            m: num(1, 0.0),
            y: num(2, 0.0),
            k: num(3, 1.0),
        },
        "K" => Operator::SetStrokeCmyk {
            c: num(0, 0.0),
            m: num(1, 0.0),
            y: num(2, 0.0),
            k: num(3, 1.0),
        },
        "cs" => Operator::SetFillColorSpace {
            name: name_at(0, "DeviceGray"),
        },
        "CS" => Operator::SetStrokeColorSpace {
            name: name_at(0, "DeviceGray"),
        },
        "sc" | "scn" => Operator::SetFillColor {
            components: numbers(&operands),
            pattern: pattern_name(&operands),
        },
        "SC" | "SCN" => Operator::SetStrokeColor {
            components: numbers(&operands),
            pattern: pattern_name(&operands),
        },

        // Text objects
        "BT" => Operator::BeginText,
        "ET" => Operator::EndText,

        // Path construction
        "m" => Operator::MoveTo {
            x: num(0, 0.0),
            y: num(1, 0.0),
        },
        "l" => Operator::LineTo {
            x: num(0, 0.0),
            y: num(1, 0.0),
        },
        "c" => Operator::CurveTo {
            x1: num(0, 0.0),
            y1: num(1, 0.0),
            x2: num(2, 0.0),
            y2: num(3, 0.0),
            x3: num(4, 0.0),
            y3: num(5, 0.0),
        },
        "v" => Operator::CurveToV {
            x2: num(0, 0.0),
            y2: num(1, 0.0),
            x3: num(2, 0.0),
            y3: num(3, 0.0),
        },
        "y" => Operator::CurveToY {
            x1: num(0, 0.0),
            y1: num(1, 0.0),
            x3: num(2, 0.0),
            y3: num(3, 0.0),
        },
        "h" => Operator::ClosePath,
        "re" => Operator::Rectangle {
            x: num(0, 0.0),
            y: num(1, 0.0),
            width: num(2, 0.0),
            height: num(3, 0.0),
        },

        // Path painting
        "S" => Operator::Stroke,
        "s" => Operator::CloseStroke,
        "f" | "F" => Operator::Fill { rule: FillRule::NonZero },
        "f*" => Operator::Fill { rule: FillRule::EvenOdd },
        "B" => Operator::FillStroke { rule: FillRule::NonZero },
        "B*" => Operator::FillStroke { rule: FillRule::EvenOdd },
        "b" => Operator::CloseFillStroke { rule: FillRule::NonZero },
        "b*" => Operator::CloseFillStroke { rule: FillRule::EvenOdd },
        "n" => Operator::EndPath,
        "W" => Operator::Clip { rule: FillRule::NonZero },
        "W*" => Operator::Clip { rule: FillRule::EvenOdd },

        // Shading and XObjects
        "sh" => Operator::PaintShading { name: name_at(0, "") },
        "Do" => Operator::Do { name: name_at(0, "") },

        // Marked content and compatibility
        "MP" => Operator::MarkPoint { tag: name_at(0, "") },
        "DP" => Operator::MarkPointDict {
            tag: name_at(0, ""),
            properties: operands.get(1).cloned().unwrap_or(Object::Null),
        },
        "BMC" => Operator::BeginMarkedContent { tag: name_at(0, "") },
        "BDC" => Operator::BeginMarkedContentDict {
            tag: name_at(0, ""),
            properties: operands.get(1).cloned().unwrap_or(Object::Null),
        },
        "EMC" => Operator::EndMarkedContent,
        "BX" => Operator::BeginCompatibility,
        "EX" => Operator::EndCompatibility,

        _ => Operator::Other {
            name: name.to_string(),
            operands,
        },
    }
}

fn get_number(operands: &[Object], index: usize) -> Option<f32> {
    operands.get(index).and_then(Object::as_number)
}

fn get_string(operands: &[Object], index: usize) -> Vec<u8> {
    operands
        .get(index)
        .and_then(Object::as_string)
        .map(<[u8]>::to_vec)
        .unwrap_or_default()
}

fn get_name(operands: &[Object], index: usize) -> Option<&str> {
    operands.get(index).and_then(Object::as_name)
}

fn numbers(operands: &[Object]) -> Vec<f32> {
    operands.iter().filter_map(Object::as_number).collect()
}

fn pattern_name(operands: &[Object]) -> Option<String> {
    operands.last().and_then(Object::as_name).map(str::to_string)
}

// ============================================================================
// Inline images
// ============================================================================

/// Full key for an inline-image dictionary abbreviation.
fn expand_key(key: &str) -> &str {
    match key {
        "BPC" => "BitsPerComponent",
        "CS" => "ColorSpace",
        "D" => "Decode",
        "DP" => "DecodeParms",
        "F" => "Filter",
        "H" => "Height",
        "IM" => "ImageMask",
        "I" => "Interpolate",
        "L" => "Length",
        "W" => "Width",
        other => other,
    }
}

/// Full name for an abbreviated color space or filter value.
fn expand_value(value: Object) -> Object {
    match value {
        Object::Name(name) => {
            let full = match name.as_str() {
                "G" => "DeviceGray",
                "RGB" => "DeviceRGB",
                "CMYK" => "DeviceCMYK",
                "I" => "Indexed",
                "AHx" => "ASCIIHexDecode",
                "A85" => "ASCII85Decode",
                "LZW" => "LZWDecode",
                "Fl" => "FlateDecode",
                "RL" => "RunLengthDecode",
                "CCF" => "CCITTFaxDecode",
                "DCT" => "DCTDecode",
                _ => return Object::Name(name),
            };
            Object::name(full)
        },
        Object::Array(items) => Object::Array(items.into_iter().map(expand_value).collect()),
        other => other,
    }
}

/// Parse `<key value>* ID <data> EI` following a `BI` keyword.
fn parse_inline_image(input: &[u8]) -> Option<(&[u8], Operator)> {
    let mut dict = Dictionary::new();
    let mut remaining = input;

    loop {
        remaining = skip_ws(remaining).map_or(remaining, |(rest, _)| rest);
        if remaining.is_empty() {
            return None;
        }
        if remaining.starts_with(b"ID") && ends_keyword(remaining.get(2)) {
            remaining = &remaining[2..];
            break;
        }
        let (rest, key) = parse_object(remaining).ok()?;
        let (rest, value) = parse_object(rest).ok()?;
        remaining = rest;
        if let Some(key) = key.as_name() {
            let value = if key == "DP" || key == "DecodeParms" { value } else { expand_value(value) };
            dict.insert(expand_key(key).to_string(), value);
        }
    }

    // A single whitespace byte separates ID from the data
    let separated = remaining.first().is_some_and(|&b| is_whitespace(b));
    if separated {
        remaining = &remaining[1..];
    }

    let (data_end, resume) = find_image_end(remaining, &dict, separated)?;
    Some((
        &remaining[resume..],
        Operator::InlineImage {
            dict,
            data: remaining[..data_end].to_vec(),
        },
    ))
}

/// True when `next` ends a keyword.
fn ends_keyword(next: Option<&u8>) -> bool {
    next.map_or(true, |&b| is_whitespace(b) || is_delimiter(b))
}

/// Positions of `EI` preceded by whitespace and followed by whitespace, a
/// delimiter or the end of the stream. Returns `(data_end, resume)`.
///
/// When `separated` is set the whitespace after `ID` was already consumed,
/// so an `EI` at offset 0 ends an image with no data bytes.
fn ei_candidates(data: &[u8], separated: bool) -> impl Iterator<Item = (usize, usize)> + '_ {
    let empty = (separated && data.starts_with(b"EI") && ends_keyword(data.get(2))).then_some((0, 2));
    let rest = (1..data.len().saturating_sub(1)).filter_map(move |i| {
        let found = &data[i..i + 2] == b"EI" && is_whitespace(data[i - 1]) && ends_keyword(data.get(i + 2));
        found.then_some((i - 1, i + 2))
    });
    empty.into_iter().chain(rest)
}

/// Pick the `EI` that ends the image. Each candidate is tried in turn, and
/// a candidate is rejected when its data does not decode (or is too short
/// for the declared size), in which case the search resumes two bytes past
/// that `EI`.
fn find_image_end(data: &[u8], dict: &Dictionary, separated: bool) -> Option<(usize, usize)> {
    let mut first = None;
    for (end, resume) in ei_candidates(data, separated) {
        if first.is_none() {
            first = Some((end, resume));
        }
        if inline_data_fits(dict, &data[..end]) {
            return Some((end, resume));
        }
        log::debug!("inline image data ending at {} did not decode; trying next EI", end);
    }
    if first.is_some() {
        log::warn!("no EI candidate produced a decodable inline image; using the first");
    }
    first
}

fn inline_data_fits(dict: &Dictionary, data: &[u8]) -> bool {
    match filter_chain(dict) {
        Ok(chain) if !chain.is_empty() => decode_chain(data, &chain, &DecodeLimits::default()).is_ok(),
        Ok(_) => expected_raw_len(dict).map_or(true, |n| data.len() >= n),
        Err(_) => true,
    }
}

fn expected_raw_len(dict: &Dictionary) -> Option<usize> {
    let width = dict.get("Width")?.as_integer()?.max(0) as usize;
    let height = dict.get("Height")?.as_integer()?.max(0) as usize;
    let mask = dict.get("ImageMask").and_then(Object::as_bool).unwrap_or(false);
    let (components, bpc) = if mask {
        (1, 1)
    } else {
        let components = match dict.get("ColorSpace") {
            Some(Object::Name(n)) if n == "DeviceGray" => 1,
            Some(Object::Name(n)) if n == "DeviceRGB" => 3,
            Some(Object::Name(n)) if n == "DeviceCMYK" => 4,
            Some(Object::Array(items)) if items.first().and_then(Object::as_name) == Some("Indexed") => 1,
            _ => return None,
        };
        let bpc = dict.get("BitsPerComponent").and_then(Object::as_integer).unwrap_or(8).max(1) as usize;
        (components, bpc)
    };
    Some((width * components * bpc).div_ceil(8) * height)
}
