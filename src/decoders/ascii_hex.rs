//! ASCIIHexDecode.
//!
//! Pairs of hex digits become bytes. Whitespace is skipped, `>` ends the
//! data, and a final odd digit is completed with an implicit `0`.

use crate::decoders::StreamDecoder;
use crate::error::{Error, Result};

/// ASCIIHexDecode filter.
pub struct AsciiHexDecoder;

impl StreamDecoder for AsciiHexDecoder {
    fn decode(&self, input: &[u8]) -> Result<Vec<u8>> {
        let mut output = Vec::with_capacity(input.len() / 2);
        let mut high: Option<u8> = None;

        for &c in input {
            if c == b'>' {
                break;
            }
            if crate::lexer::is_whitespace(c) {
                continue;
            }
            let nibble = hex_digit_to_value(c).ok_or_else(|| {
                Error::filter(self.name(), format!("invalid hex digit 0x{:02X}", c))
            })?;
            match high.take() {
                Some(h) => output.push((h << 4) | nibble),
                None => high = Some(nibble),
            }
        }

        if let Some(h) = high {
            output.push(h << 4);
        }

        Ok(output)
    }

    fn name(&self) -> &str {
        "ASCIIHexDecode"
    }
}

/// Encode bytes as uppercase hex terminated by `>`, wrapped every 64 digits.
pub fn encode_ascii_hex(data: &[u8]) -> Vec<u8> {
    const DIGITS: &[u8; 16] = b"0123456789ABCDEF";
    let mut out = Vec::with_capacity(data.len() * 2 + data.len() / 32 + 1);
    for (i, &byte) in data.iter().enumerate() {
        if i > 0 && i % 32 == 0 {
            out.push(b'\n');
        }
        out.push(DIGITS[(byte >> 4) as usize]);
        out.push(DIGITS[(byte & 0x0F) as usize]);
    }
    out.push(b'>');
    out
}

fn hex_digit_to_value(digit: u8) -> Option<u8> {
    match digit {
        b'0'..=b'9' => Some(digit - b'0'),
        b'A'..=b'F' => Some(digit - b'A' + 10),
        b'a'..=b'f' => Some(digit - b'a' + 10),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_simple() {
        assert_eq!(AsciiHexDecoder.decode(b"48656C6C6F").unwrap(), b"Hello");
    }

    #[test]
    fn test_decode_with_whitespace_and_case() {
        assert_eq!(AsciiHexDecoder.decode(b"48 65\n6c\t6C 6f").unwrap(), b"Hello");
    }

    #[test]
    fn test_decode_odd_length_pads() {
        assert_eq!(AsciiHexDecoder.decode(b"486").unwrap(), b"H`");
    }

    #[test]
    fn test_decode_stops_at_eod() {
        assert_eq!(AsciiHexDecoder.decode(b"4142>zz").unwrap(), b"AB");
    }

    #[test]
    fn test_decode_empty() {
        assert!(AsciiHexDecoder.decode(b"").unwrap().is_empty());
        assert!(AsciiHexDecoder.decode(b">").unwrap().is_empty());
    }

    #[test]
    fn test_invalid_digit_fails() {
        let err = AsciiHexDecoder.decode(b"4G").unwrap_err();
        assert!(err.to_string().contains("ASCIIHexDecode"));
    }

    #[test]
    fn test_encode_roundtrip() {
        let data: Vec<u8> = (0..=255u8).collect();
        let encoded = encode_ascii_hex(&data);
        assert!(encoded.ends_with(b">"));
        assert_eq!(AsciiHexDecoder.decode(&encoded).unwrap(), data);
    }
}
