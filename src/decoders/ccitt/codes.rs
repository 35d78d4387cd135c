//! Modified Huffman run-length codes and 2-D mode codes (ITU-T T.4).
//!
//! Tables list bit patterns in run order: terminating codes cover runs 0-63,
//! make-up codes cover multiples of 64. Lookup maps are keyed by
//! `(code length, code value)`.

use lazy_static::lazy_static;
use std::collections::HashMap;

/// White runs 0..=63.
const WHITE_TERMINATING: [&str; 64] = [
    "00110101", "000111", "0111", "1000", "1011", "1100", "1110", "1111", "10011", "10100",
    "00111", "01000", "001000", "000011", "110100", "110101", "101010", "101011", "0100111",
    "0001100", "0001000", "0010111", "0000011", "0000100", "0101000", "0101011", "0010011",
    "0100100", "0011000", "00000010", "00000011", "00011010", "00011011", "00010010",
    "00010011", "00010100", "00010101", "00010110", "00010111", "00101000", "00101001",
    "00101010", "00101011", "00101100", "00101101", "00000100", "00000101", "00001010",
    "00001011", "01010010", "01010011", "01010100", "01010101", "00100100", "00100101",
    "01011000", "01011001", "01011010", "01011011", "01001010", "01001011", "00110010",
    "00110011", "00110100",
];

/// White runs 64..=1728, step 64.
const WHITE_MAKEUP: [&str; 27] = [
    "11011", "10010", "010111", "0110111", "00110110", "00110111", "01100100", "01100101",
    "01101000", "01100111", "011001100", "011001101", "011010010", "011010011", "011010100",
    "011010101", "011010110", "011010111", "011011000", "011011001", "011011010", "011011011",
    "010011000", "010011001", "010011010", "011000", "010011011",
];

/// Black runs 0..=63.
const BLACK_TERMINATING: [&str; 64] = [
    "0000110111", "010", "11", "10", "011", "0011", "0010", "00011", "000101", "000100",
    "0000100", "0000101", "0000111", "00000100", "00000111", "000011000", "0000010111",
    "0000011000", "0000001000", "00001100111", "00001101000", "00001101100", "00000110111",
    "00000101000", "00000010111", "00000011000", "000011001010", "000011001011", "000011001100",
    "000011001101", "000001101000", "000001101001", "000001101010", "000001101011",
    "000011010010", "000011010011", "000011010100", "000011010101", "000011010110",
    "000011010111", "000001101100", "000001101101", "000011011010", "000011011011",
    "000001010100", "000001010101", "000001010110", "000001010111", "000001100100",
    "000001100101", "000001010010", "000001010011", "000000100100", "000000110111",
    "000000111000", "000000100111", "000000101000", "000001011000", "000001011001",
    "000000101011", "000000101100", "000001011010", "000001100110", "000001100111",
];

/// Black runs 64..=1728, step 64.
const BLACK_MAKEUP: [&str; 27] = [
    "0000001111", "000011001000", "000011001001", "000001011011", "000000110011",
    "000000110100", "000000110101", "0000001101100", "0000001101101", "0000001001010",
    "0000001001011", "0000001001100", "0000001001101", "0000001110010", "0000001110011",
    "0000001110100", "0000001110101", "0000001110110", "0000001110111", "0000001010010",
    "0000001010011", "0000001010100", "0000001010101", "0000001011010", "0000001011011",
    "0000001100100", "0000001100101",
];

/// Runs 1792..=2560, step 64, for either color.
const SHARED_MAKEUP: [&str; 13] = [
    "00000001000", "00000001100", "00000001101", "000000010010", "000000010011", "000000010100",
    "000000010101", "000000010110", "000000010111", "000000011100", "000000011101",
    "000000011110", "000000011111",
];

/// Longest run code in bits.
pub(crate) const MAX_CODE_LEN: usize = 13;

/// End-of-line code: eleven zeros then a one.
pub(crate) const EOL_CODE: u32 = 0x001;
pub(crate) const EOL_LEN: usize = 12;

type CodeMap = HashMap<(u8, u16), u16>;

fn build(terminating: &[&str], makeup: &[&str]) -> CodeMap {
    let mut map = HashMap::with_capacity(terminating.len() + makeup.len() + SHARED_MAKEUP.len());
    let mut insert = |code: &str, run: u16| {
        let value = code.bytes().fold(0u16, |acc, b| (acc << 1) | (b - b'0') as u16);
        map.insert((code.len() as u8, value), run);
    };
    for (run, code) in terminating.iter().enumerate() {
        insert(code, run as u16);
    }
    for (i, code) in makeup.iter().enumerate() {
        insert(code, 64 * (i as u16 + 1));
    }
    for (i, code) in SHARED_MAKEUP.iter().enumerate() {
        insert(code, 1792 + 64 * i as u16);
    }
    map
}

lazy_static! {
    static ref WHITE_CODES: CodeMap = build(&WHITE_TERMINATING, &WHITE_MAKEUP);
    static ref BLACK_CODES: CodeMap = build(&BLACK_TERMINATING, &BLACK_MAKEUP);
}

/// Look up a run code of one color.
pub(crate) fn lookup_run(white: bool, len: usize, code: u16) -> Option<u16> {
    let map: &CodeMap = if white { &WHITE_CODES } else { &BLACK_CODES };
    map.get(&(len as u8, code)).copied()
}

/// Two-dimensional coding modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Mode {
    Pass,
    Horizontal,
    /// a1 is b1 plus this offset
    Vertical(i8),
}

/// Match a 2-D mode code of `len` bits.
pub(crate) fn lookup_mode(len: usize, code: u16) -> Option<Mode> {
    Some(match (len, code) {
        (1, 0b1) => Mode::Vertical(0),
        (3, 0b011) => Mode::Vertical(1),
        (3, 0b010) => Mode::Vertical(-1),
        (3, 0b001) => Mode::Horizontal,
        (4, 0b0001) => Mode::Pass,
        (6, 0b000011) => Mode::Vertical(2),
        (6, 0b000010) => Mode::Vertical(-2),
        (7, 0b0000011) => Mode::Vertical(3),
        (7, 0b0000010) => Mode::Vertical(-3),
        _ => return None,
    })
}
