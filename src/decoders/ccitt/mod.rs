//! CCITTFaxDecode: Modified Huffman, Group 3 2-D and Group 4.
//!
//! Rows are tracked as lists of changing elements (the columns where the
//! color flips, starting from white). Two-dimensional rows are coded against
//! the previous row's list. Output is packed 1-bit rows, MSB first, where a
//! 0 bit is black unless `BlackIs1` is set.

mod bit_reader;
mod codes;

use self::bit_reader::BitReader;
use self::codes::{EOL_CODE, EOL_LEN, MAX_CODE_LEN, Mode, lookup_mode, lookup_run};
use super::param_int;
use crate::decoders::StreamDecoder;
use crate::error::{Error, Result};
use crate::object::{Dictionary, DictionaryExt};

/// Parameters from a CCITTFaxDecode `DecodeParms` dictionary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CcittParams {
    /// < 0: Group 4; 0: Modified Huffman; > 0: mixed 1-D/2-D Group 3
    pub k: i64,
    /// Pixels per row
    pub columns: usize,
    /// Rows to decode (0 = until end of data)
    pub rows: usize,
    /// Rows are preceded by EOL codes
    pub end_of_line: bool,
    /// Each row starts on a byte boundary
    pub encoded_byte_align: bool,
    /// Data ends with an end-of-block marker
    pub end_of_block: bool,
    /// 1 bits are black
    pub black_is_1: bool,
}

impl Default for CcittParams {
    fn default() -> Self {
        Self {
            k: 0,
            columns: 1728,
            rows: 0,
            end_of_line: false,
            encoded_byte_align: false,
            end_of_block: true,
            black_is_1: false,
        }
    }
}

impl CcittParams {
    /// Read parameters, falling back to defaults for missing keys.
    pub fn from_dict(params: &Dictionary) -> Self {
        let defaults = Self::default();
        Self {
            k: param_int(params, "K", defaults.k),
            columns: param_int(params, "Columns", defaults.columns as i64).max(1) as usize,
            rows: param_int(params, "Rows", 0).max(0) as usize,
            end_of_line: params.get_bool("EndOfLine").unwrap_or(defaults.end_of_line),
            encoded_byte_align: params.get_bool("EncodedByteAlign").unwrap_or(defaults.encoded_byte_align),
            end_of_block: params.get_bool("EndOfBlock").unwrap_or(defaults.end_of_block),
            black_is_1: params.get_bool("BlackIs1").unwrap_or(defaults.black_is_1),
        }
    }

    /// Bytes per packed output row.
    pub fn row_bytes(&self) -> usize {
        self.columns.div_ceil(8)
    }
}

/// CCITTFaxDecode filter.
pub struct CcittFaxDecoder {
    params: CcittParams,
}

impl CcittFaxDecoder {
    /// Create a decoder for the given parameters.
    pub fn new(params: CcittParams) -> Self {
        Self { params }
    }
}

/// Why a row stopped early.
enum RowError {
    /// Ran out of bits
    Exhausted,
    /// Bit pattern matches no code
    Invalid(String),
}

type RowResult<T> = std::result::Result<T, RowError>;

impl StreamDecoder for CcittFaxDecoder {
    fn decode(&self, input: &[u8]) -> Result<Vec<u8>> {
        let p = &self.params;
        let mut reader = BitReader::new(input);
        let mut output = Vec::with_capacity(p.row_bytes() * p.rows.max(1));
        let mut reference: Vec<usize> = Vec::new();
        let mut decoded_rows = 0usize;

        loop {
            if p.rows > 0 && decoded_rows >= p.rows {
                break;
            }
            if p.encoded_byte_align && p.k < 0 {
                reader.align();
            }

            if self.at_end_of_block(&mut reader) {
                log::trace!("CCITTFaxDecode: end of block after {} rows", decoded_rows);
                break;
            }
            if reader.is_exhausted() {
                break;
            }

            let two_dimensional = match p.k {
                k if k < 0 => true,
                0 => false,
                _ => match reader.read_bit() {
                    Some(tag) => tag == 0,
                    None => break,
                },
            };

            let mut changes = Vec::new();
            let outcome = if two_dimensional {
                decode_2d_row(&mut reader, &reference, p.columns, &mut changes)
            } else {
                decode_1d_row(&mut reader, p.columns, &mut changes)
            };

            match outcome {
                Ok(()) => {},
                Err(RowError::Exhausted) => {
                    // Trailing fill bits produce an empty partial row
                    if changes.is_empty() {
                        break;
                    }
                    log::warn!("CCITTFaxDecode: data ended inside row {}", decoded_rows);
                    pack_row(&changes, p, &mut output);
                    break;
                },
                Err(RowError::Invalid(reason)) => {
                    return Err(Error::filter(self.name(), format!("row {}: {}", decoded_rows, reason)));
                },
            }

            pack_row(&changes, p, &mut output);
            reference = changes;
            decoded_rows += 1;

            if p.encoded_byte_align && p.k >= 0 && !p.end_of_line {
                reader.align();
            }
        }

        Ok(output)
    }

    fn name(&self) -> &str {
        "CCITTFaxDecode"
    }
}

impl CcittFaxDecoder {
    /// Consume EOL codes (with fill bits) before a row. Returns true at an
    /// end-of-block sequence: two EOLs in a row (EOFB), or for Group 3 2-D
    /// an EOL, tag bit and another EOL (start of RTC).
    fn at_end_of_block(&self, reader: &mut BitReader) -> bool {
        if !consume_eol(reader) {
            return false;
        }
        if self.params.k > 0 {
            let after_eol = reader.position();
            reader.read_bit();
            if consume_eol(reader) {
                return true;
            }
            reader.seek(after_eol);
            return false;
        }
        consume_eol(reader)
    }
}

/// Consume an EOL code, allowing leading fill zeros. Restores the position
/// when no EOL follows.
fn consume_eol(reader: &mut BitReader) -> bool {
    let start = reader.position();
    let mut zeros = 0;
    while reader.peek_bits(1) == Some(0) {
        reader.read_bit();
        zeros += 1;
    }
    if zeros >= EOL_LEN - 1 && reader.peek_bits(1) == Some(EOL_CODE) {
        reader.read_bit();
        return true;
    }
    reader.seek(start);
    false
}

/// Read one color run (make-up codes followed by a terminating code).
fn read_run(reader: &mut BitReader, white: bool) -> RowResult<usize> {
    let mut total = 0usize;
    loop {
        let mut code = 0u16;
        let mut len = 0;
        let run = loop {
            let bit = reader.read_bit().ok_or(RowError::Exhausted)?;
            code = (code << 1) | bit as u16;
            len += 1;
            if let Some(run) = lookup_run(white, len, code) {
                break run;
            }
            if len >= MAX_CODE_LEN {
                return Err(RowError::Invalid(format!(
                    "invalid {} run code {:0width$b}",
                    if white { "white" } else { "black" },
                    code,
                    width = len
                )));
            }
        };
        total += run as usize;
        if run < 64 {
            return Ok(total);
        }
    }
}

fn read_mode(reader: &mut BitReader) -> RowResult<Mode> {
    let mut code = 0u16;
    for len in 1..=7 {
        let bit = reader.read_bit().ok_or(RowError::Exhausted)?;
        code = (code << 1) | bit as u16;
        if let Some(mode) = lookup_mode(len, code) {
            return Ok(mode);
        }
    }
    Err(RowError::Invalid(format!("invalid mode code {:07b}", code)))
}

fn decode_1d_row(reader: &mut BitReader, columns: usize, changes: &mut Vec<usize>) -> RowResult<()> {
    let mut a0 = 0usize;
    let mut white = true;
    while a0 < columns {
        let run = read_run(reader, white)?;
        a0 = (a0 + run).min(columns);
        changes.push(a0);
        white = !white;
    }
    Ok(())
}

/// First changing element on the reference row after `a0` whose index
/// parity gives it the color opposite to the current one, and the element
/// after it.
fn find_b1_b2(reference: &[usize], a0: Option<usize>, white: bool, columns: usize) -> (usize, usize) {
    // Even indices start black runs
    let parity = if white { 0 } else { 1 };
    let mut i = parity;
    while i < reference.len() {
        let beyond = match a0 {
            None => true,
            Some(a0) => reference[i] > a0,
        };
        if beyond {
            break;
        }
        i += 2;
    }
    let b1 = reference.get(i).copied().unwrap_or(columns);
    let b2 = reference.get(i + 1).copied().unwrap_or(columns);
    (b1, b2)
}

fn decode_2d_row(
    reader: &mut BitReader,
    reference: &[usize],
    columns: usize,
    changes: &mut Vec<usize>,
) -> RowResult<()> {
    // None stands for the imaginary element before column 0
    let mut a0: Option<usize> = None;
    let mut white = true;

    while a0.map_or(true, |a| a < columns) {
        let (b1, b2) = find_b1_b2(reference, a0, white, columns);
        let start = a0.unwrap_or(0);

        match read_mode(reader)? {
            Mode::Pass => {
                a0 = Some(b2.max(start));
            },
            Mode::Horizontal => {
                let first = read_run(reader, white)?;
                let second = read_run(reader, !white)?;
                let a1 = (start + first).min(columns);
                let a2 = (a1 + second).min(columns);
                changes.push(a1);
                changes.push(a2);
                a0 = Some(a2);
            },
            Mode::Vertical(delta) => {
                let a1 = (b1 as i64 + delta as i64).clamp(start as i64, columns as i64) as usize;
                changes.push(a1);
                a0 = Some(a1);
                white = !white;
            },
        }
    }
    Ok(())
}

/// Append one packed row rendered from its changing elements.
fn pack_row(changes: &[usize], params: &CcittParams, output: &mut Vec<u8>) {
    let row_start = output.len();
    output.resize(row_start + params.row_bytes(), 0);
    let row = &mut output[row_start..];

    let mut x = 0usize;
    let mut white = true;
    for &next in changes.iter().chain(std::iter::once(&params.columns)) {
        let end = next.min(params.columns);
        // Bits set to 1 are white unless BlackIs1
        if white != params.black_is_1 {
            for col in x..end {
                row[col / 8] |= 0x80 >> (col % 8);
            }
        }
        x = x.max(end);
        white = !white;
    }
}
