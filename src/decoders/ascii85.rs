//! ASCII85Decode.
//!
//! Five characters in `!`..`u` encode four bytes; `z` stands for four zero
//! bytes and `~>` ends the data. A final partial group of n characters
//! yields n-1 bytes.

use crate::decoders::StreamDecoder;
use crate::error::{Error, Result};

/// ASCII85Decode filter.
pub struct Ascii85Decoder;

impl StreamDecoder for Ascii85Decoder {
    fn decode(&self, input: &[u8]) -> Result<Vec<u8>> {
        let input = input.strip_prefix(b"<~").unwrap_or(input);
        let mut output = Vec::with_capacity(input.len() * 4 / 5);
        let mut group = [0u8; 5];
        let mut count = 0;

        for &byte in input {
            match byte {
                b'~' => break,
                b'z' => {
                    if count != 0 {
                        return Err(Error::filter(self.name(), "'z' inside a group"));
                    }
                    output.extend_from_slice(&[0, 0, 0, 0]);
                },
                b'!'..=b'u' => {
                    group[count] = byte - b'!';
                    count += 1;
                    if count == 5 {
                        output.extend_from_slice(&group_value(&group, self.name())?.to_be_bytes());
                        count = 0;
                    }
                },
                _ if crate::lexer::is_whitespace(byte) => {},
                _ => {
                    return Err(Error::filter(
                        self.name(),
                        format!("invalid character 0x{:02X}", byte),
                    ));
                },
            }
        }

        if count > 0 {
            if count == 1 {
                return Err(Error::filter(self.name(), "final group has a single character"));
            }
            for slot in group.iter_mut().skip(count) {
                *slot = 84;
            }
            let bytes = group_value(&group, self.name())?.to_be_bytes();
            output.extend_from_slice(&bytes[..count - 1]);
        }

        Ok(output)
    }

    fn name(&self) -> &str {
        "ASCII85Decode"
    }
}

fn group_value(group: &[u8; 5], filter: &str) -> Result<u32> {
    let value = group.iter().fold(0u64, |acc, &d| acc * 85 + d as u64);
    u32::try_from(value).map_err(|_| Error::filter(filter, "group value exceeds 32 bits"))
}

/// Encode bytes as ASCII85 terminated by `~>`.
pub fn encode_ascii85(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() * 5 / 4 + 4);
    let mut line = 0;

    for chunk in data.chunks(4) {
        let mut word = [0u8; 4];
        word[..chunk.len()].copy_from_slice(chunk);
        let mut value = u32::from_be_bytes(word);

        if chunk.len() == 4 && value == 0 {
            out.push(b'z');
            line += 1;
        } else {
            let mut digits = [0u8; 5];
            for d in digits.iter_mut().rev() {
                *d = (value % 85) as u8 + b'!';
                value /= 85;
            }
            out.extend_from_slice(&digits[..chunk.len() + 1]);
            line += chunk.len() + 1;
        }

        if line >= 75 {
            out.push(b'\n');
            line = 0;
        }
    }

    out.extend_from_slice(b"~>");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    // ============================================================================
    // Decoding
    // ============================================================================

    #[test]
    fn test_decode_simple() {
        assert_eq!(Ascii85Decoder.decode(b"<+U,m").unwrap(), b"Test");
    }

    #[test]
    fn test_decode_z_groups() {
        assert_eq!(Ascii85Decoder.decode(b"zz").unwrap(), vec![0u8; 8]);
    }

    #[test]
    fn test_decode_whitespace_and_markers() {
        assert_eq!(Ascii85Decoder.decode(b"<~<+U ,m~>").unwrap(), b"Test");
        assert_eq!(Ascii85Decoder.decode(b"<+U\n,m~>garbage").unwrap(), b"Test");
    }

    #[test]
    fn test_decode_partial_group() {
        // "Hi" -> 3 characters
        let encoded = encode_ascii85(b"Hi");
        assert_eq!(encoded.len(), 3 + 2);
        assert_eq!(Ascii85Decoder.decode(&encoded).unwrap(), b"Hi");
    }

    #[test]
    fn test_decode_errors() {
        assert!(Ascii85Decoder.decode(b"Hello\x00").is_err());
        assert!(Ascii85Decoder.decode(b"!z").is_err());
        assert!(Ascii85Decoder.decode(b"!").is_err());
        // "uuuuu" is larger than 2^32 - 1
        assert!(Ascii85Decoder.decode(b"uuuuu").is_err());
    }

    #[test]
    fn test_decode_empty() {
        assert!(Ascii85Decoder.decode(b"").unwrap().is_empty());
        assert!(Ascii85Decoder.decode(b"~>").unwrap().is_empty());
    }

    // ============================================================================
    // Encoding
    // ============================================================================

    #[test]
    fn test_encode_known_value() {
        assert_eq!(encode_ascii85(b"Test"), b"<+U,m~>");
        assert_eq!(encode_ascii85(&[0, 0, 0, 0]), b"z~>");
    }

    #[test]
    fn test_encode_roundtrip_lengths() {
        for len in 0..12usize {
            let data: Vec<u8> = (0..len as u8).map(|b| b.wrapping_mul(91)).collect();
            let encoded = encode_ascii85(&data);
            assert_eq!(Ascii85Decoder.decode(&encoded).unwrap(), data, "len {}", len);
        }
    }
}
