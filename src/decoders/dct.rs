//! DCTDecode (JPEG).
//!
//! The filter pipeline passes JPEG data through untouched; pixel decoding
//! happens in the image resolver. `probe_jpeg` reads the frame header so a
//! caller can size an image without decoding it.

use crate::decoders::StreamDecoder;
use crate::error::{Error, Result};
use image::codecs::jpeg::JpegDecoder;
use image::{ColorType, ImageDecoder};
use std::io::Cursor;

/// DCTDecode filter: identity.
pub struct DctDecoder;

impl StreamDecoder for DctDecoder {
    fn decode(&self, input: &[u8]) -> Result<Vec<u8>> {
        Ok(input.to_vec())
    }

    fn name(&self) -> &str {
        "DCTDecode"
    }
}

/// Frame information for a JPEG stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JpegInfo {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Color components (1, 3 or 4)
    pub components: u8,
}

/// Read JPEG dimensions and component count.
pub fn probe_jpeg(data: &[u8]) -> Result<JpegInfo> {
    let decoder = JpegDecoder::new(Cursor::new(data)).map_err(|e| Error::filter("DCTDecode", e.to_string()))?;
    let (width, height) = decoder.dimensions();
    let components = match decoder.color_type() {
        ColorType::L8 | ColorType::L16 => 1,
        ColorType::Rgb8 | ColorType::Rgb16 => 3,
        _ => 4,
    };
    Ok(JpegInfo {
        width,
        height,
        components,
    })
}

/// Decode JPEG into interleaved 8-bit samples.
pub fn decode_jpeg(data: &[u8]) -> Result<(JpegInfo, Vec<u8>)> {
    let info = probe_jpeg(data)?;
    let decoder = JpegDecoder::new(Cursor::new(data)).map_err(|e| Error::filter("DCTDecode", e.to_string()))?;
    let mut pixels = vec![0u8; decoder.total_bytes() as usize];
    decoder
        .read_image(&mut pixels)
        .map_err(|e| Error::filter("DCTDecode", e.to_string()))?;
    Ok((info, pixels))
}
