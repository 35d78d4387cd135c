//! PNG and TIFF predictors applied after Flate/LZW decoding.
//!
//! PNG rows (predictor 10-15) each start with a tag byte naming the algorithm
//! for that row; the `Predictor` value itself only announces "PNG". TIFF
//! predictor 2 is horizontal differencing per component.

use super::param_int;
use crate::error::{Error, Result};
use crate::object::Dictionary;

/// PNG predictor algorithms, by row tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PngPredictor {
    /// No prediction
    None = 0,
    /// Difference from the byte one pixel to the left
    Sub = 1,
    /// Difference from the byte above
    Up = 2,
    /// Difference from the mean of left and above
    Average = 3,
    /// Paeth predictor
    Paeth = 4,
}

impl PngPredictor {
    fn from_tag(tag: u8) -> Option<Self> {
        Some(match tag {
            0 => PngPredictor::None,
            1 => PngPredictor::Sub,
            2 => PngPredictor::Up,
            3 => PngPredictor::Average,
            4 => PngPredictor::Paeth,
            _ => return None,
        })
    }
}

/// Predictor parameters from a `DecodeParms` dictionary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeParams {
    /// Predictor algorithm (1 = none, 2 = TIFF, 10-15 = PNG)
    pub predictor: i64,
    /// Samples per row
    pub columns: usize,
    /// Color components per sample
    pub colors: usize,
    /// Bits per component
    pub bits_per_component: usize,
}

impl Default for DecodeParams {
    fn default() -> Self {
        Self {
            predictor: 1,
            columns: 1,
            colors: 1,
            bits_per_component: 8,
        }
    }
}

impl DecodeParams {
    /// Read `Predictor`, `Columns`, `Colors` and `BitsPerComponent`.
    pub fn from_dict(params: &Dictionary) -> Self {
        Self {
            predictor: param_int(params, "Predictor", 1),
            columns: param_int(params, "Columns", 1).max(1) as usize,
            colors: param_int(params, "Colors", 1).max(1) as usize,
            bits_per_component: param_int(params, "BitsPerComponent", 8).max(1) as usize,
        }
    }

    /// Bytes of pixel data per row, excluding any PNG tag byte.
    pub fn pixel_bytes_per_row(&self) -> usize {
        (self.columns * self.colors * self.bits_per_component).div_ceil(8)
    }

    /// Bytes per row as stored, including the PNG tag byte.
    pub fn bytes_per_row(&self) -> usize {
        if self.predictor >= 10 {
            self.pixel_bytes_per_row() + 1
        } else {
            self.pixel_bytes_per_row()
        }
    }

    /// Bytes per complete pixel, at least one.
    pub fn bytes_per_pixel(&self) -> usize {
        (self.colors * self.bits_per_component).div_ceil(8).max(1)
    }
}

/// Reverse a predictor.
pub fn decode_predictor(data: &[u8], params: &DecodeParams) -> Result<Vec<u8>> {
    match params.predictor {
        1 => Ok(data.to_vec()),
        2 => decode_tiff_predictor(data, params),
        10..=15 => decode_png_predictor(data, params),
        other => Err(Error::filter("Predictor", format!("unsupported predictor {}", other))),
    }
}

fn decode_png_predictor(data: &[u8], params: &DecodeParams) -> Result<Vec<u8>> {
    let row_len = params.pixel_bytes_per_row();
    let stride = row_len + 1;
    let bpp = params.bytes_per_pixel();

    let mut output = Vec::with_capacity(data.len() / stride * row_len + row_len);
    let mut prev = vec![0u8; row_len];
    let mut current = vec![0u8; row_len];

    // A truncated final row is decoded as far as it goes
    for row in data.chunks(stride) {
        let tag = row[0];
        let encoded = &row[1..];
        let predictor = PngPredictor::from_tag(tag)
            .ok_or_else(|| Error::filter("Predictor", format!("invalid PNG row tag {}", tag)))?;

        for (i, &byte) in encoded.iter().enumerate() {
            let left = if i >= bpp { current[i - bpp] } else { 0 };
            let up = prev[i];
            let up_left = if i >= bpp { prev[i - bpp] } else { 0 };
            current[i] = byte.wrapping_add(predict(predictor, left, up, up_left));
        }

        output.extend_from_slice(&current[..encoded.len()]);
        std::mem::swap(&mut prev, &mut current);
    }

    Ok(output)
}

fn predict(predictor: PngPredictor, left: u8, up: u8, up_left: u8) -> u8 {
    match predictor {
        PngPredictor::None => 0,
        PngPredictor::Sub => left,
        PngPredictor::Up => up,
        PngPredictor::Average => ((left as u16 + up as u16) / 2) as u8,
        PngPredictor::Paeth => paeth_predictor(left as i16, up as i16, up_left as i16) as u8,
    }
}

fn paeth_predictor(a: i16, b: i16, c: i16) -> i16 {
    let p = a + b - c;
    let pa = (p - a).abs();
    let pb = (p - b).abs();
    let pc = (p - c).abs();

    if pa <= pb && pa <= pc {
        a
    } else if pb <= pc {
        b
    } else {
        c
    }
}

fn decode_tiff_predictor(data: &[u8], params: &DecodeParams) -> Result<Vec<u8>> {
    let row_len = params.pixel_bytes_per_row();
    let colors = params.colors;
    let mut output = Vec::with_capacity(data.len());

    for row in data.chunks(row_len) {
        match params.bits_per_component {
            8 => {
                let start = output.len();
                for (i, &byte) in row.iter().enumerate() {
                    let left = if i >= colors { output[start + i - colors] } else { 0 };
                    output.push(byte.wrapping_add(left));
                }
            },
            16 => {
                let mut samples: Vec<u16> = row
                    .chunks(2)
                    .map(|pair| u16::from_be_bytes([pair[0], *pair.get(1).unwrap_or(&0)]))
                    .collect();
                for i in colors..samples.len() {
                    samples[i] = samples[i].wrapping_add(samples[i - colors]);
                }
                let mut bytes: Vec<u8> = samples.iter().flat_map(|s| s.to_be_bytes()).collect();
                bytes.truncate(row.len());
                output.extend_from_slice(&bytes);
            },
            bpc @ (1 | 2 | 4) => output.extend_from_slice(&tiff_sub_byte_row(row, colors, bpc)),
            other => {
                return Err(Error::filter(
                    "Predictor",
                    format!("TIFF predictor with {} bits per component", other),
                ))
            },
        }
    }

    Ok(output)
}

fn tiff_sub_byte_row(row: &[u8], colors: usize, bpc: usize) -> Vec<u8> {
    let mask = ((1u16 << bpc) - 1) as u8;
    let count = row.len() * 8 / bpc;
    let mut samples = Vec::with_capacity(count);
    for i in 0..count {
        let bit = i * bpc;
        let shift = 8 - bpc - (bit % 8);
        samples.push((row[bit / 8] >> shift) & mask);
    }
    for i in colors..samples.len() {
        samples[i] = samples[i].wrapping_add(samples[i - colors]) & mask;
    }
    let mut out = vec![0u8; row.len()];
    for (i, &s) in samples.iter().enumerate() {
        let bit = i * bpc;
        let shift = 8 - bpc - (bit % 8);
        out[bit / 8] |= s << shift;
    }
    out
}
