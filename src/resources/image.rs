//! Image XObjects and inline images, decoded to RGBA8.

use crate::decoders::{decode_jpeg, DecodedStream, Filter};
use crate::error::{Error, Result};
use crate::object::{Dictionary, DictionaryExt, Object};
use crate::resources::colorspace::ColorSpace;
use crate::resources::SampleReader;

/// Largest image accepted, in pixels.
const MAX_PIXELS: u64 = 1 << 26;

/// Decoded image, row-major from the top, four bytes per pixel.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageData {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// RGBA8 samples
    pub rgba: Vec<u8>,
}

impl ImageData {
    /// RGBA of one pixel.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = ((y * self.width + x) * 4) as usize;
        self.rgba.get(i..i + 4).and_then(|p| p.try_into().ok())
    }
}

/// Decode an image whose filters have already run.
///
/// `color_space` is ignored for stencil masks, which paint `fill` wherever
/// the sample selects paint and are transparent elsewhere.
pub fn decode_image(
    dict: &Dictionary,
    decoded: &DecodedStream,
    color_space: Option<&ColorSpace>,
    fill: [u8; 3],
) -> Result<ImageData> {
    let width = dict.get_int("Width").unwrap_or(0);
    let height = dict.get_int("Height").unwrap_or(0);
    if width <= 0 || height <= 0 {
        return Err(Error::StructuralInvariantViolation(format!(
            "image has invalid size {}x{}",
            width, height
        )));
    }
    let (width, height) = (width as u32, height as u32);
    if width as u64 * height as u64 > MAX_PIXELS {
        return Err(Error::StructuralInvariantViolation(format!(
            "image of {}x{} pixels exceeds the limit",
            width, height
        )));
    }

    if let Some(stage) = &decoded.image_codec {
        return match stage.filter {
            Filter::DCTDecode => decode_dct(&decoded.data, width, height, color_space),
            other => Err(Error::NotImplemented(format!("{} images", other.name()))),
        };
    }

    if dict.get_bool("ImageMask").unwrap_or(false) {
        return Ok(decode_stencil(dict, &decoded.data, width, height, fill));
    }

    let color_space =
        color_space.ok_or_else(|| Error::StructuralInvariantViolation("image has no /ColorSpace".into()))?;
    let bpc = dict.get_int("BitsPerComponent").unwrap_or(8) as u32;
    if !matches!(bpc, 1 | 2 | 4 | 8 | 16) {
        return Err(Error::StructuralInvariantViolation(format!(
            "unsupported BitsPerComponent {}",
            bpc
        )));
    }

    let n = color_space.components();
    let decode = decode_ranges(dict, color_space.default_decode(bpc), n);
    let color_key = dict
        .get("Mask")
        .and_then(Object::as_number_array)
        .filter(|m| m.len() == 2 * n);
    let max = ((1u64 << bpc) - 1) as f32;

    let data = padded(&decoded.data, row_bytes(width, n as u32, bpc) * height as usize);
    let mut rgba = Vec::with_capacity((width * height * 4) as usize);
    let mut raw = vec![0u32; n];
    let mut components = vec![0f32; n];
    let mut reader = SampleReader::new(&data);

    for _ in 0..height {
        for _ in 0..width {
            for (i, slot) in raw.iter_mut().enumerate() {
                *slot = reader.read(bpc).unwrap_or(0);
                let (dmin, dmax) = decode[i];
                components[i] = dmin + *slot as f32 * (dmax - dmin) / max;
            }
            let masked = color_key.as_ref().is_some_and(|key| {
                raw.iter()
                    .enumerate()
                    .all(|(i, &v)| v as f32 >= key[2 * i] && v as f32 <= key[2 * i + 1])
            });
            rgba.extend_from_slice(&color_space.to_rgb8(&components));
            rgba.push(if masked { 0 } else { 255 });
        }
        reader.align();
    }

    Ok(ImageData { width, height, rgba })
}

fn decode_dct(data: &[u8], width: u32, height: u32, color_space: Option<&ColorSpace>) -> Result<ImageData> {
    let (info, pixels) = decode_jpeg(data)?;
    if info.width != width || info.height != height {
        log::warn!(
            "JPEG is {}x{} but the image dictionary says {}x{}",
            info.width,
            info.height,
            width,
            height
        );
    }
    let count = (info.width * info.height) as usize;
    let per_pixel = if count == 0 { 0 } else { pixels.len() / count };
    let space = match (per_pixel, color_space) {
        (1, _) => ColorSpace::Gray,
        (4, _) => ColorSpace::Cmyk,
        (_, Some(cs)) if cs.components() == per_pixel => cs.clone(),
        _ => ColorSpace::Rgb,
    };

    let mut rgba = Vec::with_capacity(count * 4);
    let mut components = vec![0f32; per_pixel];
    for px in pixels.chunks_exact(per_pixel.max(1)).take(count) {
        for (slot, &v) in components.iter_mut().zip(px) {
            *slot = v as f32 / 255.0;
        }
        rgba.extend_from_slice(&space.to_rgb8(&components));
        rgba.push(255);
    }
    Ok(ImageData {
        width: info.width,
        height: info.height,
        rgba,
    })
}

fn decode_stencil(dict: &Dictionary, data: &[u8], width: u32, height: u32, fill: [u8; 3]) -> ImageData {
    // Decode [1 0] flips which sample value paints
    let paint_bit = match dict.get("Decode").and_then(Object::as_number_array).as_deref() {
        Some([d0, _]) if *d0 == 1.0 => 1,
        _ => 0,
    };
    let data = padded(data, row_bytes(width, 1, 1) * height as usize);
    let mut reader = SampleReader::new(&data);
    let mut rgba = Vec::with_capacity((width * height * 4) as usize);
    for _ in 0..height {
        for _ in 0..width {
            let paint = reader.read(1) == Some(paint_bit);
            rgba.extend_from_slice(&fill);
            rgba.push(if paint { 255 } else { 0 });
        }
        reader.align();
    }
    ImageData { width, height, rgba }
}

fn decode_ranges(dict: &Dictionary, default: Vec<(f32, f32)>, n: usize) -> Vec<(f32, f32)> {
    match dict.get("Decode").and_then(Object::as_number_array) {
        Some(values) if values.len() == 2 * n => values.chunks_exact(2).map(|c| (c[0], c[1])).collect(),
        _ => default,
    }
}

fn row_bytes(width: u32, components: u32, bpc: u32) -> usize {
    ((width as usize) * (components as usize) * (bpc as usize)).div_ceil(8)
}

fn padded(data: &[u8], expected: usize) -> Vec<u8> {
    let mut out = data.to_vec();
    if out.len() < expected {
        log::warn!("image data is {} bytes short; padding", expected - out.len());
        out.resize(expected, 0);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoders::FilterStage;
    use crate::dict;

    fn raw(data: &[u8]) -> DecodedStream {
        DecodedStream {
            data: data.to_vec(),
            image_codec: None,
        }
    }

    fn image_dict(w: i32, h: i32, bpc: i32) -> Dictionary {
        dict! {
            "Width" => Object::Integer(w),
            "Height" => Object::Integer(h),
            "BitsPerComponent" => Object::Integer(bpc),
        }
    }

    #[test]
    fn test_rgb_8bit() {
        let img = decode_image(
            &image_dict(2, 1, 8),
            &raw(&[255, 0, 0, 0, 255, 0]),
            Some(&ColorSpace::Rgb),
            [0; 3],
        )
        .unwrap();
        assert_eq!(img.pixel(0, 0), Some([255, 0, 0, 255]));
        assert_eq!(img.pixel(1, 0), Some([0, 255, 0, 255]));
        assert_eq!(img.pixel(2, 0), None);
    }

    #[test]
    fn test_gray_1bit_rows_are_byte_aligned() {
        // 3 pixels per row, second row starts on a new byte
        let img = decode_image(
            &image_dict(3, 2, 1),
            &raw(&[0b1010_0000, 0b0100_0000]),
            Some(&ColorSpace::Gray),
            [0; 3],
        )
        .unwrap();
        assert_eq!(img.pixel(0, 0), Some([255, 255, 255, 255]));
        assert_eq!(img.pixel(1, 0), Some([0, 0, 0, 255]));
        assert_eq!(img.pixel(1, 1), Some([255, 255, 255, 255]));
    }

    #[test]
    fn test_16bit_and_decode_inversion() {
        let mut dict = image_dict(1, 1, 16);
        dict.insert("Decode".into(), Object::Array(vec![1.into(), 0.into()]));
        let img = decode_image(&dict, &raw(&[0xFF, 0xFF]), Some(&ColorSpace::Gray), [0; 3]).unwrap();
        assert_eq!(img.pixel(0, 0), Some([0, 0, 0, 255]));
    }

    #[test]
    fn test_indexed_4bit() {
        let cs = ColorSpace::Indexed {
            base: Box::new(ColorSpace::Rgb),
            hival: 1,
            palette: vec![0, 0, 255, 255, 255, 0],
        };
        let img = decode_image(&image_dict(2, 1, 4), &raw(&[0x01]), Some(&cs), [0; 3]).unwrap();
        assert_eq!(img.pixel(0, 0), Some([0, 0, 255, 255]));
        assert_eq!(img.pixel(1, 0), Some([255, 255, 0, 255]));
    }

    #[test]
    fn test_stencil_mask_and_inverted_decode() {
        let mut dict = image_dict(2, 1, 1);
        dict.insert("ImageMask".into(), Object::Boolean(true));
        let img = decode_image(&dict, &raw(&[0b0100_0000]), None, [9, 8, 7]).unwrap();
        assert_eq!(img.pixel(0, 0), Some([9, 8, 7, 255]));
        assert_eq!(img.pixel(1, 0), Some([9, 8, 7, 0]));

        dict.insert("Decode".into(), Object::Array(vec![1.into(), 0.into()]));
        let img = decode_image(&dict, &raw(&[0b0100_0000]), None, [9, 8, 7]).unwrap();
        assert_eq!(img.pixel(0, 0), Some([9, 8, 7, 0]));
        assert_eq!(img.pixel(1, 0), Some([9, 8, 7, 255]));
    }

    #[test]
    fn test_color_key_mask() {
        let mut dict = image_dict(2, 1, 8);
        dict.insert("Mask".into(), Object::Array(vec![0.into(), 10.into()]));
        let img = decode_image(&dict, &raw(&[5, 200]), Some(&ColorSpace::Gray), [0; 3]).unwrap();
        assert_eq!(img.pixel(0, 0).map(|p| p[3]), Some(0));
        assert_eq!(img.pixel(1, 0).map(|p| p[3]), Some(255));
    }

    #[test]
    fn test_short_data_is_padded() {
        let img = decode_image(&image_dict(2, 2, 8), &raw(&[255]), Some(&ColorSpace::Gray), [0; 3]).unwrap();
        assert_eq!(img.rgba.len(), 16);
        assert_eq!(img.pixel(1, 1), Some([0, 0, 0, 255]));
    }

    #[test]
    fn test_rejects_bad_dimensions_and_jpx() {
        assert!(decode_image(&image_dict(0, 1, 8), &raw(&[]), Some(&ColorSpace::Gray), [0; 3]).is_err());

        let jpx = DecodedStream {
            data: vec![0; 4],
            image_codec: Some(FilterStage {
                filter: Filter::JPXDecode,
                params: Dictionary::new(),
            }),
        };
        let err = decode_image(&image_dict(1, 1, 8), &jpx, Some(&ColorSpace::Rgb), [0; 3]).unwrap_err();
        assert!(matches!(err, Error::NotImplemented(_)));
    }
}
