//! Seed views over a [`Read`]: canonical k-mer words and their extension.
//!
//! Per spec §3/§4.1, a seed is a *view* (offset + length into its owning
//! read) rather than an owned copy, and canonicalization picks the
//! lexicographically smaller of the forward and reverse-complement words.

use crate::mapping::base::{Base, Read, complement_base};

/// The orientation a seed's canonical word was drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Forward,
    ReverseComplement,
}

impl Orientation {
    #[inline]
    #[must_use]
    pub fn flip(self) -> Self {
        match self {
            Orientation::Forward => Orientation::ReverseComplement,
            Orientation::ReverseComplement => Orientation::Forward,
        }
    }
}

/// A lightweight view on a read: an offset and base length, with no owned
/// sequence data of its own.
#[derive(Debug, Clone, Copy)]
pub struct Seed<'r> {
    read: &'r Read,
    offset: usize,
    length: usize,
}

impl<'r> Seed<'r> {
    /// Builds a seed view at `offset` with `length` bases. Panics if the span
    /// would run past the read's end; callers (the seed placement step in
    /// §4.1) are expected to have already checked `offset + length <= L`.
    #[must_use]
    pub fn new(read: &'r Read, offset: usize, length: usize) -> Self {
        assert!(offset + length <= read.len(), "seed span exceeds read length");
        Self { read, offset, length }
    }

    #[inline]
    #[must_use]
    pub fn read(&self) -> &'r Read {
        self.read
    }

    #[inline]
    #[must_use]
    pub fn offset(&self) -> usize {
        self.offset
    }

    #[inline]
    #[must_use]
    pub fn length(&self) -> usize {
        self.length
    }

    /// The primary (unextended) forward bases.
    #[inline]
    #[must_use]
    pub fn forward_bases(&self) -> &'r [Base] {
        &self.read.bases()[self.offset..self.offset + self.length]
    }

    /// True if any base within the seed span is `N` (spec §4.1: seeds
    /// containing N are skipped during placement).
    #[must_use]
    pub fn contains_n(&self) -> bool {
        self.forward_bases().iter().any(|&b| b == crate::mapping::base::BASE_N)
    }

    /// The reverse-complement of the seed's bases.
    #[must_use]
    pub fn reverse_complement_bases(&self) -> Vec<Base> {
        self.forward_bases().iter().rev().map(|&b| complement_base(b)).collect()
    }

    /// Canonicalizes the seed: compares the forward word to its
    /// reverse-complement lexicographically and returns the smaller, along
    /// with which orientation it came from.
    #[must_use]
    pub fn canonical_word(&self) -> (Vec<Base>, Orientation) {
        let forward = self.forward_bases().to_vec();
        let revcomp = self.reverse_complement_bases();
        if revcomp < forward {
            (revcomp, Orientation::ReverseComplement)
        } else {
            (forward, Orientation::Forward)
        }
    }

    /// Extends the seed by `half_extension` bases on each side (flanking
    /// context from the owning read), respecting `orientation`. Bases beyond
    /// the read's ends are zero-padded, matching the six-base-half padding
    /// rule in spec §4.1 step 1 generalized to an arbitrary half-extension.
    #[must_use]
    pub fn extended_word(&self, half_extension: usize, orientation: Orientation) -> Vec<Base> {
        let bases = self.read.bases();
        let left_start = self.offset.saturating_sub(half_extension);
        let left_pad = half_extension.saturating_sub(self.offset);
        let right_end = (self.offset + self.length + half_extension).min(bases.len());
        let right_pad = (self.offset + self.length + half_extension).saturating_sub(bases.len());

        let mut word = Vec::with_capacity(self.length + 2 * half_extension);
        word.extend(std::iter::repeat_n(Base::default(), left_pad));
        word.extend_from_slice(&bases[left_start..self.offset]);
        word.extend_from_slice(self.forward_bases());
        word.extend_from_slice(&bases[self.offset + self.length..right_end]);
        word.extend(std::iter::repeat_n(Base::default(), right_pad));

        match orientation {
            Orientation::Forward => word,
            Orientation::ReverseComplement => word.iter().rev().map(|&b| complement_base(b)).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::base::Read;

    fn read(seq: &[u8]) -> Read {
        let quals = vec![30u8; seq.len()];
        Read::new(b"r1", seq, &quals, 0, 0)
    }

    #[test]
    fn canonical_picks_smaller_word() {
        let r = read(b"TTTTT");
        let seed = Seed::new(&r, 0, 5);
        let (word, orientation) = seed.canonical_word();
        // revcomp(TTTTT) = AAAAA, which is lexicographically smaller.
        assert_eq!(word, crate::mapping::base::encode_sequence(b"AAAAA"));
        assert_eq!(orientation, Orientation::ReverseComplement);
    }

    #[test]
    fn palindromic_seed_prefers_forward() {
        let r = read(b"ACGT");
        let seed = Seed::new(&r, 0, 4);
        let (_, orientation) = seed.canonical_word();
        assert_eq!(orientation, Orientation::Forward);
    }

    #[test]
    fn contains_n_detects_ambiguous_bases() {
        let r = read(b"ACNGT");
        assert!(Seed::new(&r, 1, 3).contains_n());
        assert!(!Seed::new(&r, 3, 2).contains_n());
    }

    #[test]
    fn extended_word_pads_at_read_boundary() {
        let r = read(b"ACGTACGT");
        let seed = Seed::new(&r, 0, 3);
        let extended = seed.extended_word(2, Orientation::Forward);
        // 2 bases of left padding, then the full 3+2 right bases.
        assert_eq!(extended.len(), 7);
        assert_eq!(&extended[..2], &[0, 0]);
    }
}
