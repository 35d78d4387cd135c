//! RunLengthDecode.
//!
//! - Length byte 0-127: copy the next N+1 bytes literally
//! - Length byte 128: end of data
//! - Length byte 129-255: repeat the next byte 257-N times

use crate::decoders::StreamDecoder;
use crate::error::{Error, Result};

/// RunLengthDecode filter.
pub struct RunLengthDecoder;

impl StreamDecoder for RunLengthDecoder {
    fn decode(&self, input: &[u8]) -> Result<Vec<u8>> {
        let mut output = Vec::new();
        let mut i = 0;

        while i < input.len() {
            let length = input[i];
            i += 1;

            match length {
                0..=127 => {
                    let count = length as usize + 1;
                    if i + count > input.len() {
                        return Err(Error::filter(
                            self.name(),
                            format!("literal run needs {} bytes, {} left", count, input.len() - i),
                        ));
                    }
                    output.extend_from_slice(&input[i..i + count]);
                    i += count;
                },
                128 => break,
                129..=255 => {
                    let count = 257 - length as usize;
                    let byte = *input
                        .get(i)
                        .ok_or_else(|| Error::filter(self.name(), "missing byte for repeat run"))?;
                    i += 1;
                    output.resize(output.len() + count, byte);
                },
            }
        }

        Ok(output)
    }

    fn name(&self) -> &str {
        "RunLengthDecode"
    }
}

/// Run-length encode, ending with the 128 terminator.
///
/// Runs of three or more equal bytes become repeat runs; everything else is
/// gathered into literal runs of at most 128 bytes.
pub fn encode_run_length(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() + data.len() / 128 + 2);
    let mut literal: Vec<u8> = Vec::with_capacity(128);
    let mut i = 0;

    let flush = |literal: &mut Vec<u8>, out: &mut Vec<u8>| {
        if !literal.is_empty() {
            out.push((literal.len() - 1) as u8);
            out.extend_from_slice(literal);
            literal.clear();
        }
    };

    while i < data.len() {
        let byte = data[i];
        let run = data[i..].iter().take(128).take_while(|&&b| b == byte).count();

        if run >= 3 {
            flush(&mut literal, &mut out);
            out.push((257 - run) as u8);
            out.push(byte);
            i += run;
        } else {
            literal.push(byte);
            if literal.len() == 128 {
                flush(&mut literal, &mut out);
            }
            i += 1;
        }
    }

    flush(&mut literal, &mut out);
    out.push(128);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_literal() {
        let input = vec![4, b'H', b'e', b'l', b'l', b'o'];
        assert_eq!(RunLengthDecoder.decode(&input).unwrap(), b"Hello");
    }

    #[test]
    fn test_decode_repeat() {
        // 257 - 253 = 4 copies
        assert_eq!(RunLengthDecoder.decode(&[253, b'A', 128]).unwrap(), b"AAAA");
    }

    #[test]
    fn test_decode_stops_at_eod() {
        assert_eq!(RunLengthDecoder.decode(&[0, b'X', 128, 0, b'Y']).unwrap(), b"X");
    }

    #[test]
    fn test_decode_truncated() {
        assert!(RunLengthDecoder.decode(&[5, b'a']).is_err());
        assert!(RunLengthDecoder.decode(&[200]).is_err());
    }

    #[test]
    fn test_encode_mixed() {
        let data = b"abcccccccd";
        let encoded = encode_run_length(data);
        assert_eq!(encoded, vec![1, b'a', b'b', 250, b'c', 0, b'd', 128]);
        assert_eq!(RunLengthDecoder.decode(&encoded).unwrap(), data);
    }

    #[test]
    fn test_encode_long_runs_split() {
        let data = vec![7u8; 300];
        let encoded = encode_run_length(&data);
        assert_eq!(RunLengthDecoder.decode(&encoded).unwrap(), data);

        let literal: Vec<u8> = (0..300u32).map(|i| (i % 251) as u8).collect();
        let encoded = encode_run_length(&literal);
        assert_eq!(RunLengthDecoder.decode(&encoded).unwrap(), literal);
    }

    #[test]
    fn test_encode_empty() {
        assert_eq!(encode_run_length(b""), vec![128]);
        assert!(RunLengthDecoder.decode(&[128]).unwrap().is_empty());
    }
}
