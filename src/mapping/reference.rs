//! Reference sequence view: forward/reverse-complement base access over
//! arbitrary intervals, plus contig "hole" (inter-contig padding) tracking.
//!
//! Construction of the underlying hash-table/reference directory is out of
//! scope (spec §1); this module only implements the read-only view the
//! mapper and aligner consume, shared by reference across worker threads the
//! same way `aligner_process` shares `references: Vec<FastaSeq>` in the
//! teacher.

use crate::mapping::base::{Base, complement_base, encode_sequence};

/// An inter-contig padding region: `[start, end)` in the packed reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hole {
    pub start: usize,
    pub end: usize,
}

/// A read-only view over packed 4-bit reference bases, with named contigs and
/// explicit hole (padding) regions between them.
#[derive(Debug)]
pub struct ReferenceView {
    bases: Vec<Base>,
    contig_names: Vec<String>,
    contig_offsets: Vec<usize>,
    holes: Vec<Hole>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReferenceError;

impl std::fmt::Display for ReferenceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "reference sequence/header mismatch")
    }
}
impl std::error::Error for ReferenceError {}

impl ReferenceView {
    /// Builds a view from a list of `(name, ascii_sequence)` contigs,
    /// concatenating them with a single-base hole between each (enough to
    /// exercise "chain starts inside a hole" per spec §4.5 step 2; a real
    /// hash-table reference directory pads far more generously, which is
    /// irrelevant to the contract this view exposes).
    #[must_use]
    pub fn from_contigs(contigs: &[(&str, &[u8])]) -> Self {
        let mut bases = Vec::new();
        let mut contig_names = Vec::with_capacity(contigs.len());
        let mut contig_offsets = Vec::with_capacity(contigs.len());
        let mut holes = Vec::new();

        for (i, (name, seq)) in contigs.iter().enumerate() {
            if i > 0 {
                let hole_start = bases.len();
                bases.push(crate::mapping::base::BASE_PAD);
                holes.push(Hole {
                    start: hole_start,
                    end: bases.len(),
                });
            }
            contig_names.push((*name).to_string());
            contig_offsets.push(bases.len());
            bases.extend(encode_sequence(seq));
        }

        Self {
            bases,
            contig_names,
            contig_offsets,
            holes,
        }
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.bases.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bases.is_empty()
    }

    #[must_use]
    pub fn contig_name(&self, global_position: usize) -> Option<&str> {
        let index = self.contig_offsets.partition_point(|&start| start <= global_position);
        index.checked_sub(1).map(|i| self.contig_names[i].as_str())
    }

    /// The 0-based position of `global_position` within its containing
    /// contig, if any.
    #[must_use]
    pub fn contig_local_position(&self, global_position: usize) -> Option<usize> {
        let index = self.contig_offsets.partition_point(|&start| start <= global_position);
        index.checked_sub(1).map(|i| global_position - self.contig_offsets[i])
    }

    /// True if `position` falls inside a tracked hole (inter-contig padding).
    #[must_use]
    pub fn is_in_hole(&self, position: usize) -> bool {
        self.holes.iter().any(|h| position >= h.start && position < h.end)
    }

    /// Fetches `len` forward bases starting at `start`. Out-of-range bases
    /// (beyond the end of the packed reference) are returned as padding
    /// rather than erroring, since the wavefront window computation (spec
    /// §4.5 step 1) may legitimately overshoot at contig ends.
    #[must_use]
    pub fn fetch_forward(&self, start: usize, len: usize) -> Vec<Base> {
        let mut out = Vec::with_capacity(len);
        for i in start..start + len {
            out.push(self.bases.get(i).copied().unwrap_or(crate::mapping::base::BASE_PAD));
        }
        out
    }

    /// Fetches `len` bases starting at `start` and reverse-complements them,
    /// matching the chain-orientation-dependent fetch in spec §4.5 step 2.
    #[must_use]
    pub fn fetch_reverse_complement(&self, start: usize, len: usize) -> Vec<Base> {
        let forward = self.fetch_forward(start, len);
        forward.into_iter().rev().map(complement_base).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_forward_matches_input() {
        let r = ReferenceView::from_contigs(&[("chr1", b"ACGTACGT")]);
        assert_eq!(r.fetch_forward(0, 4), encode_sequence(b"ACGT"));
    }

    #[test]
    fn fetch_reverse_complement_flips() {
        let r = ReferenceView::from_contigs(&[("chr1", b"AAGG")]);
        assert_eq!(r.fetch_reverse_complement(0, 4), encode_sequence(b"CCTT"));
    }

    #[test]
    fn out_of_range_fetch_pads() {
        let r = ReferenceView::from_contigs(&[("chr1", b"AC")]);
        let fetched = r.fetch_forward(0, 5);
        assert_eq!(fetched.len(), 5);
        assert_eq!(fetched[2], crate::mapping::base::BASE_PAD);
    }

    #[test]
    fn hole_between_contigs_is_tracked() {
        let r = ReferenceView::from_contigs(&[("chr1", b"AC"), ("chr2", b"GT")]);
        assert!(r.is_in_hole(2));
        assert!(!r.is_in_hole(0));
        assert!(!r.is_in_hole(3));
    }

    #[test]
    fn contig_lookup_resolves_name_and_local_position() {
        let r = ReferenceView::from_contigs(&[("chr1", b"AC"), ("chr2", b"GTAC")]);
        assert_eq!(r.contig_name(0), Some("chr1"));
        assert_eq!(r.contig_name(3), Some("chr2"));
        assert_eq!(r.contig_local_position(3), Some(0));
        assert_eq!(r.contig_local_position(4), Some(1));
    }
}
