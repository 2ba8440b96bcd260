//! Vectorized striped Smith-Waterman scoring, used as a fast score-only
//! alternative to [`crate::align::wavefront`] when a traceback CIGAR is not
//! needed (spec §4.4 "Striped SIMD alternative").
//!
//! Grounded on `zoe`'s own striped-SW profile machinery (the same primitive
//! the teacher's standalone `aligner` subcommand used via
//! `SharedProfiles::smith_waterman_alignment_from_i8`), rather than a
//! hand-rolled `portable_simd` kernel: `zoe` already ships a `multiversion`-
//! dispatched striped implementation, so reimplementing one from scratch
//! would just be a worse copy of a dependency already in the stack.

use crate::mapping::base::{Base, decode_base};
use zoe::{
    alignment::{MaybeAligned, ProfileSets, SharedProfiles},
    data::matrices::WeightMatrix,
};

/// Scoring parameters for the striped aligner, kept separate from the
/// wavefront engine's [`crate::align::wavefront::ScoringScheme`] because the
/// two engines take their penalties in different sign conventions (`zoe`
/// expects non-positive mismatch/gap weights).
#[derive(Debug, Clone, Copy)]
pub struct StripedScoring {
    pub match_score: i8,
    pub mismatch_penalty: i8,
    pub gap_open: i8,
    pub gap_extend: i8,
}

impl Default for StripedScoring {
    fn default() -> Self {
        Self {
            match_score: 1,
            mismatch_penalty: -4,
            gap_open: -6,
            gap_extend: -1,
        }
    }
}

/// The outcome of a striped alignment: just a score, since the striped
/// kernel is used as a cheap upper-bound check before paying for a banded
/// wavefront traceback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StripedScore {
    pub score: u32,
}

/// A reusable striped aligner bound to one scoring scheme.
pub struct StripedAligner {
    weight_matrix: WeightMatrix<'static, i8, 5>,
    gap_open: i8,
    gap_extend: i8,
}

impl StripedAligner {
    #[must_use]
    pub fn new(scoring: StripedScoring) -> Self {
        Self {
            weight_matrix: WeightMatrix::new_dna_matrix(scoring.match_score, scoring.mismatch_penalty, None),
            gap_open: scoring.gap_open,
            gap_extend: scoring.gap_extend,
        }
    }

    fn decode(codes: &[Base]) -> Vec<u8> {
        codes.iter().map(|&b| decode_base(b)).collect()
    }

    /// Aligns `query` (4-bit encoded) against `reference_window` (4-bit
    /// encoded), returning `None` when the pair is unmapped (no positive
    /// scoring alignment exists).
    #[must_use]
    pub fn align(&self, query: &[Base], reference_window: &[Base]) -> Option<StripedScore> {
        let query_bytes = Self::decode(query);
        let reference_bytes = Self::decode(reference_window);

        let profile =
            SharedProfiles::<32, 16, 8, 5>::new_with_w256(query_bytes, &self.weight_matrix, self.gap_open, self.gap_extend)
                .ok()?;

        match profile.sw_align_from_i8(zoe::alignment::SeqSrc::Reference(&reference_bytes)) {
            MaybeAligned::Some(alignment) => Some(StripedScore { score: alignment.score }),
            MaybeAligned::Overflowed | MaybeAligned::Unmapped => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_sequences_score_positively() {
        let aligner = StripedAligner::new(StripedScoring::default());
        let seq = crate::mapping::base::encode_sequence(b"ACGTACGTACGTACGT");
        let result = aligner.align(&seq, &seq);
        assert!(result.is_some());
        assert!(result.unwrap().score > 0);
    }

    #[test]
    fn unrelated_sequences_score_lower_than_identical() {
        let aligner = StripedAligner::new(StripedScoring::default());
        let query = crate::mapping::base::encode_sequence(b"ACGTACGTACGTACGT");
        let unrelated = crate::mapping::base::encode_sequence(b"TTTTTTTTTTTTTTTT");
        let identical_score = aligner.align(&query, &query).unwrap().score;
        let unrelated_score = aligner.align(&query, &unrelated).map_or(0, |s| s.score);
        assert!(unrelated_score < identical_score);
    }
}
