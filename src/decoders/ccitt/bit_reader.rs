//! MSB-first bit cursor over a byte slice.

#[derive(Debug, Clone)]
pub(crate) struct BitReader<'a> {
    data: &'a [u8],
    bit: usize,
}

impl<'a> BitReader<'a> {
    pub(crate) fn new(data: &'a [u8]) -> Self {
        Self { data, bit: 0 }
    }

    pub(crate) fn read_bit(&mut self) -> Option<u8> {
        let byte = *self.data.get(self.bit >> 3)?;
        let value = (byte >> (7 - (self.bit & 7))) & 1;
        self.bit += 1;
        Some(value)
    }

    /// Read `n` (at most 32) bits; `None` if fewer remain.
    pub(crate) fn read_bits(&mut self, n: usize) -> Option<u32> {
        if self.remaining() < n {
            return None;
        }
        let mut value = 0u32;
        for _ in 0..n {
            value = (value << 1) | self.read_bit()? as u32;
        }
        Some(value)
    }

    pub(crate) fn peek_bits(&self, n: usize) -> Option<u32> {
        self.clone().read_bits(n)
    }

    pub(crate) fn align(&mut self) {
        self.bit = (self.bit + 7) & !7;
    }

    pub(crate) fn remaining(&self) -> usize {
        (self.data.len() * 8).saturating_sub(self.bit)
    }

    pub(crate) fn is_exhausted(&self) -> bool {
        self.remaining() == 0
    }

    pub(crate) fn position(&self) -> usize {
        self.bit
    }

    pub(crate) fn seek(&mut self, bit: usize) {
        self.bit = bit;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reads_msb_first() {
        let mut r = BitReader::new(&[0b1010_0000, 0xFF]);
        assert_eq!(r.read_bit(), Some(1));
        assert_eq!(r.read_bit(), Some(0));
        assert_eq!(r.read_bits(2), Some(0b10));
        assert_eq!(r.peek_bits(4), Some(0));
        r.align();
        assert_eq!(r.position(), 8);
        assert_eq!(r.read_bits(8), Some(0xFF));
        assert!(r.is_exhausted());
        assert_eq!(r.read_bit(), None);
    }

    #[test]
    fn test_short_read_leaves_position() {
        let mut r = BitReader::new(&[0xAB]);
        r.seek(4);
        assert_eq!(r.read_bits(8), None);
        assert_eq!(r.position(), 4);
    }
}
