//! Growable bit vector backing the reachability index and finality
//! aggregation bits.

use std::fmt;

use serde::{Deserialize, Serialize};

const WORD_BITS: usize = 32;

/// A fixed-capacity bit vector stored in 32-bit words.
///
/// Indices at or beyond [`BitSet::size`] read as unset and are ignored on
/// write; callers size the set before use and call [`BitSet::grow`] when the
/// hashgraph outgrows it.
#[derive(Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BitSet {
    size: usize,
    words: Vec<u32>,
}

impl BitSet {
    /// Create a set of `size` cleared bits.
    pub fn new(size: usize) -> Self {
        Self {
            size,
            words: vec![0; size.div_ceil(WORD_BITS)],
        }
    }

    /// Number of addressable bits.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn get(&self, index: usize) -> bool {
        if index >= self.size {
            return false;
        }
        self.words[index / WORD_BITS] & (1 << (index % WORD_BITS)) != 0
    }

    pub fn set(&mut self, index: usize, value: bool) {
        debug_assert!(index < self.size, "bit {index} out of range {}", self.size);
        if index >= self.size {
            return;
        }
        let mask = 1 << (index % WORD_BITS);
        if value {
            self.words[index / WORD_BITS] |= mask;
        } else {
            self.words[index / WORD_BITS] &= !mask;
        }
    }

    pub fn flip(&mut self, index: usize) {
        debug_assert!(index < self.size, "bit {index} out of range {}", self.size);
        if index >= self.size {
            return;
        }
        self.words[index / WORD_BITS] ^= 1 << (index % WORD_BITS);
    }

    /// Bitwise OR. The result has the larger of the two sizes.
    pub fn or(&self, other: &BitSet) -> BitSet {
        let size = self.size.max(other.size);
        let mut out = BitSet::new(size);
        for (i, w) in out.words.iter_mut().enumerate() {
            *w = self.words.get(i).copied().unwrap_or(0) | other.words.get(i).copied().unwrap_or(0);
        }
        out
    }

    /// Bitwise AND. The result has the larger of the two sizes.
    pub fn and(&self, other: &BitSet) -> BitSet {
        let size = self.size.max(other.size);
        let mut out = BitSet::new(size);
        for (i, w) in out.words.iter_mut().enumerate() {
            *w = self.words.get(i).copied().unwrap_or(0) & other.words.get(i).copied().unwrap_or(0);
        }
        out
    }

    /// In-place OR, used when folding dependency bitsets.
    pub fn or_assign(&mut self, other: &BitSet) {
        if other.size > self.size {
            self.grow(other.size);
        }
        for (w, o) in self.words.iter_mut().zip(&other.words) {
            *w |= *o;
        }
    }

    /// Extend capacity to at least `min_size`, doubling until sufficient.
    /// Every previously set bit is preserved.
    pub fn grow(&mut self, min_size: usize) {
        if min_size <= self.size {
            return;
        }
        let mut size = self.size.max(1);
        while size < min_size {
            size *= 2;
        }
        self.size = size;
        self.words.resize(size.div_ceil(WORD_BITS), 0);
    }

    /// Number of set bits.
    pub fn count_ones(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Indices of the set bits, ascending.
    pub fn ones(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.size).filter(move |&i| self.get(i))
    }

    /// Little-endian byte encoding: bit `i` lives in byte `i / 8`.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes: Vec<u8> = self.words.iter().flat_map(|w| w.to_le_bytes()).collect();
        bytes.truncate(self.size.div_ceil(8));
        bytes
    }

    /// Inverse of [`BitSet::to_bytes`]; the size becomes `8 * bytes.len()`.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut set = BitSet::new(bytes.len() * 8);
        for (i, chunk) in bytes.chunks(4).enumerate() {
            let mut word = [0u8; 4];
            word[..chunk.len()].copy_from_slice(chunk);
            set.words[i] = u32::from_le_bytes(word);
        }
        set
    }
}

impl fmt::Debug for BitSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BitSet({}/{})", self.count_ones(), self.size)
    }
}

impl fmt::Display for BitSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for i in 0..self.size {
            f.write_str(if self.get(i) { "1" } else { "0" })?;
        }
        Ok(())
    }
}
