//! LZWDecode.
//!
//! PDF's LZW reads MSB-first codes starting at 9 bits, with 256 as the clear
//! code and 257 as end of data. `EarlyChange` (default 1) widens the code one
//! entry before the table fills, the TIFF convention.
//!
//! weezl does the work; a table-based decoder handles streams weezl refuses
//! (missing end code, codes past the table).

use super::param_int;
use crate::decoders::StreamDecoder;
use crate::error::{Error, Result};
use crate::object::Dictionary;
use weezl::{BitOrder, decode::Decoder as WeezlDecoder, encode::Encoder as WeezlEncoder};

const CLEAR_CODE: u16 = 256;
const EOD_CODE: u16 = 257;
const FIRST_CODE: u16 = 258;
const MAX_CODE_BITS: u32 = 12;

/// LZWDecode filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LzwDecoder {
    /// Widen codes one entry early
    pub early_change: bool,
}

impl Default for LzwDecoder {
    fn default() -> Self {
        Self { early_change: true }
    }
}

impl LzwDecoder {
    /// Read `EarlyChange` from a `DecodeParms` dictionary.
    pub fn from_params(params: &Dictionary) -> Self {
        Self {
            early_change: param_int(params, "EarlyChange", 1) != 0,
        }
    }

    fn decode_weezl(&self, input: &[u8]) -> Result<Vec<u8>> {
        let mut decoder = if self.early_change {
            WeezlDecoder::with_tiff_size_switch(BitOrder::Msb, 8)
        } else {
            WeezlDecoder::new(BitOrder::Msb, 8)
        };
        decoder
            .decode(input)
            .map_err(|e| Error::filter(self.name(), format!("{:?}", e)))
    }

    fn decode_table(&self, input: &[u8]) -> Result<Vec<u8>> {
        let early = u16::from(self.early_change);
        let mut table: Vec<Vec<u8>> = Vec::with_capacity(4096);
        reset_table(&mut table);
        let mut code_bits = 9u32;
        let mut prev: Option<u16> = None;
        let mut output = Vec::with_capacity(input.len() * 2);

        let mut acc: u32 = 0;
        let mut acc_bits = 0u32;
        let mut bytes = input.iter();

        loop {
            while acc_bits < code_bits {
                match bytes.next() {
                    Some(&b) => {
                        acc = (acc << 8) | b as u32;
                        acc_bits += 8;
                    },
                    None => return Ok(output),
                }
            }
            let code = ((acc >> (acc_bits - code_bits)) & ((1 << code_bits) - 1)) as u16;
            acc_bits -= code_bits;

            match code {
                CLEAR_CODE => {
                    reset_table(&mut table);
                    code_bits = 9;
                    prev = None;
                    continue;
                },
                EOD_CODE => return Ok(output),
                _ => {},
            }

            let next = table.len() as u16;
            let entry = match prev {
                None => table
                    .get(code as usize)
                    .cloned()
                    .ok_or_else(|| Error::filter(self.name(), format!("code {} before any entry", code)))?,
                Some(p) => {
                    let prev_entry = table[p as usize].clone();
                    let entry = if code < next {
                        table[code as usize].clone()
                    } else if code == next {
                        let mut e = prev_entry.clone();
                        e.push(prev_entry[0]);
                        e
                    } else {
                        return Err(Error::filter(
                            self.name(),
                            format!("code {} beyond table size {}", code, next),
                        ));
                    };
                    if table.len() < 4096 {
                        let mut added = prev_entry;
                        added.push(entry[0]);
                        table.push(added);
                    }
                    entry
                },
            };

            output.extend_from_slice(&entry);
            prev = Some(code);

            if (table.len() as u16) + early >= (1 << code_bits) && code_bits < MAX_CODE_BITS {
                code_bits += 1;
            }
        }
    }
}

fn reset_table(table: &mut Vec<Vec<u8>>) {
    table.clear();
    table.extend((0..=255u8).map(|b| vec![b]));
    // Clear and EOD occupy slots 256 and 257
    table.push(Vec::new());
    table.push(Vec::new());
    debug_assert_eq!(table.len(), FIRST_CODE as usize);
}

impl StreamDecoder for LzwDecoder {
    fn decode(&self, input: &[u8]) -> Result<Vec<u8>> {
        match self.decode_weezl(input) {
            Ok(data) => Ok(data),
            Err(e) => {
                log::debug!("{}; retrying with table decoder", e);
                self.decode_table(input)
            },
        }
    }

    fn name(&self) -> &str {
        "LZWDecode"
    }
}

/// LZW-encode with `EarlyChange` 1, the PDF default.
pub fn encode_lzw(data: &[u8]) -> Result<Vec<u8>> {
    WeezlEncoder::with_tiff_size_switch(BitOrder::Msb, 8)
        .encode(data)
        .map_err(|e| Error::filter("LZWDecode", format!("encode: {:?}", e)))
}
