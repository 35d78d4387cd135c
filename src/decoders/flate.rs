//! FlateDecode (zlib/deflate) via flate2.

use crate::decoders::StreamDecoder;
use crate::error::{Error, Result};
use flate2::read::{DeflateDecoder, ZlibDecoder};
use flate2::write::ZlibEncoder;
use flate2::Compression;
use std::io::{Read, Write};

/// FlateDecode filter.
///
/// Falls back to raw deflate when the zlib wrapper is damaged, and keeps
/// whatever was inflated before a corrupt tail.
pub struct FlateDecoder;

impl StreamDecoder for FlateDecoder {
    fn decode(&self, input: &[u8]) -> Result<Vec<u8>> {
        let mut output = Vec::new();
        let zlib_err = match ZlibDecoder::new(input).read_to_end(&mut output) {
            Ok(_) => return Ok(output),
            Err(e) => e,
        };

        if !output.is_empty() {
            log::warn!("FlateDecode recovered {} bytes before corruption: {}", output.len(), zlib_err);
            return Ok(output);
        }

        // Raw deflate, with and without a (broken) two byte zlib header
        for skip in [0usize, 2] {
            if input.len() <= skip {
                break;
            }
            output.clear();
            match DeflateDecoder::new(&input[skip..]).read_to_end(&mut output) {
                Ok(_) if !output.is_empty() => {
                    log::debug!("FlateDecode: raw deflate (skip {}) gave {} bytes", skip, output.len());
                    return Ok(output);
                },
                Err(_) if !output.is_empty() => {
                    log::warn!("FlateDecode: partial raw deflate recovery, {} bytes", output.len());
                    return Ok(output);
                },
                _ => {},
            }
        }

        Err(Error::filter(self.name(), zlib_err.to_string()))
    }

    fn name(&self) -> &str {
        "FlateDecode"
    }
}

/// Zlib-compress data at the default level.
pub fn encode_flate(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::with_capacity(data.len() / 2 + 16), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip() {
        let original = b"Hello, FlateDecode! Hello, FlateDecode!";
        let compressed = encode_flate(original).unwrap();
        assert_eq!(FlateDecoder.decode(&compressed).unwrap(), original);
    }

    #[test]
    fn test_empty_roundtrip() {
        let compressed = encode_flate(b"").unwrap();
        assert!(FlateDecoder.decode(&compressed).unwrap().is_empty());
    }

    #[test]
    fn test_raw_deflate_fallback() {
        let mut encoder = flate2::write::DeflateEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b"raw deflate payload").unwrap();
        let raw = encoder.finish().unwrap();
        assert_eq!(FlateDecoder.decode(&raw).unwrap(), b"raw deflate payload");
    }

    #[test]
    fn test_garbage_fails() {
        let err = FlateDecoder.decode(b"\xFF\xFF\xFF\xFF not compressed").unwrap_err();
        assert!(matches!(err, Error::FilterDecodeFailure { .. }));
    }
}
