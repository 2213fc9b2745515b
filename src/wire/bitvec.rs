//! Growable bit vector with a stable wire form.
//!
//! The versioned serialization format prefixes each record with one of these:
//! bit N set means logical field N follows in the stream. Bit positions come
//! from each type's content-flag enum and never change once shipped; new
//! fields append new bits.
//!
//! Wire form: u32 word count, then that many little-endian u32 words, bit K
//! living in word `K / 32` at position `K % 32`.

use std::io::{Read, Write};

use super::stream::{read_count, read_u32, write_u32};
use super::WireResult;

/// Variable-width bit set.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BitVector {
    words: Vec<u32>,
}

impl BitVector {
    /// Create an empty bit vector (all bits clear).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set bit `bit`, growing storage as needed.
    pub fn set_bit(&mut self, bit: usize) {
        let word = bit / 32;
        if word >= self.words.len() {
            self.words.resize(word + 1, 0);
        }
        self.words[word] |= 1 << (bit % 32);
    }

    /// Clear bit `bit`. Bits beyond storage are already clear.
    pub fn clear_bit(&mut self, bit: usize) {
        let word = bit / 32;
        if word < self.words.len() {
            self.words[word] &= !(1 << (bit % 32));
        }
    }

    /// Test bit `bit`. Bits beyond storage read as clear.
    #[must_use]
    pub fn is_bit_set(&self, bit: usize) -> bool {
        let word = bit / 32;
        word < self.words.len() && self.words[word] & (1 << (bit % 32)) != 0
    }

    /// Set bits `0..n`. Convenience for writers that emit every field.
    #[must_use]
    pub fn with_first_bits(n: usize) -> Self {
        let mut bits = Self::new();
        for bit in 0..n {
            bits.set_bit(bit);
        }
        bits
    }

    /// Write the wire form: word count then words.
    pub fn write(&self, w: &mut dyn Write) -> WireResult<()> {
        write_u32(w, self.words.len() as u32)?;
        for word in &self.words {
            write_u32(w, *word)?;
        }
        Ok(())
    }

    /// Read the wire form.
    pub fn read(r: &mut dyn Read) -> WireResult<Self> {
        let count = read_count(r, "bit vector")?;
        let mut words = Vec::with_capacity(count);
        for _ in 0..count {
            words.push(read_u32(r)?);
        }
        Ok(Self { words })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_and_test() {
        let mut bits = BitVector::new();
        assert!(!bits.is_bit_set(0));

        bits.set_bit(0);
        bits.set_bit(33);
        assert!(bits.is_bit_set(0));
        assert!(!bits.is_bit_set(1));
        assert!(bits.is_bit_set(33));
        assert!(!bits.is_bit_set(65));

        bits.clear_bit(33);
        assert!(!bits.is_bit_set(33));
    }

    #[test]
    fn test_with_first_bits() {
        let bits = BitVector::with_first_bits(4);
        for bit in 0..4 {
            assert!(bits.is_bit_set(bit));
        }
        assert!(!bits.is_bit_set(4));
    }

    #[test]
    fn test_wire_round_trip() {
        let mut bits = BitVector::new();
        bits.set_bit(2);
        bits.set_bit(40);

        let mut buf = Vec::new();
        bits.write(&mut buf).unwrap();
        // Two words: count prefix + 2 * 4 bytes.
        assert_eq!(buf.len(), 4 + 8);

        let decoded = BitVector::read(&mut buf.as_slice()).unwrap();
        assert_eq!(decoded, bits);
    }

    #[test]
    fn test_empty_wire_form() {
        let bits = BitVector::new();
        let mut buf = Vec::new();
        bits.write(&mut buf).unwrap();
        assert_eq!(buf, [0, 0, 0, 0]);

        let decoded = BitVector::read(&mut buf.as_slice()).unwrap();
        assert!(!decoded.is_bit_set(0));
    }
}
