//! Pair enumeration, mate rescue, pair scoring, and secondary/supplementary
//! selection (spec §4.6 "Pair handling").

use crate::align::generator::Alignment;
use crate::align::insert_size::InsertSizeParameters;
use crate::align::mapq::compute_pair_mapq;

/// Expected relative orientation between mates, per spec §3/§6's flag
/// bitmask semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairOrientation {
    /// Mate 1 forward, mate 2 reverse, mate 2 downstream of mate 1.
    ForwardReverse,
    ReverseForward,
    ForwardForward,
    ReverseReverse,
}

#[derive(Debug, Clone, Copy)]
pub struct PairConfig {
    pub expected_orientation: PairOrientation,
    pub unpaired_penalty: i32,
    pub proper_pair_threshold: i32,
    pub snp_cost: i32,
    pub sec_aligns: usize,
    pub sec_score_delta: i32,
}

#[derive(Debug, Clone)]
pub struct PairCandidate {
    pub mate1: Alignment,
    pub mate2: Alignment,
    pub is_pair: bool,
    pub rescued: bool,
    pub score: i32,
    pub proper_pair: bool,
}

/// `isPair`: orientation matches, insert length is within `[min, max]`, and
/// both mates agree on diagonal-consistent placement (spec §4.6
/// "Enumeration").
#[must_use]
pub fn is_pair(mate1_reverse: bool, mate2_reverse: bool, observed_insert: i64, expected: &InsertSizeParameters, orientation: PairOrientation) -> bool {
    let orientation_matches = match orientation {
        PairOrientation::ForwardReverse => !mate1_reverse && mate2_reverse,
        PairOrientation::ReverseForward => mate1_reverse && !mate2_reverse,
        PairOrientation::ForwardForward => !mate1_reverse && !mate2_reverse,
        PairOrientation::ReverseReverse => mate1_reverse && mate2_reverse,
    };
    orientation_matches && observed_insert >= expected.min && observed_insert <= expected.max
}

/// `score = a0.score + a1.score - pairPenalty`, where `pairPenalty` combines
/// the unpaired penalty and a deviation-from-expected-insert penalty (spec
/// §4.6 "Pair score").
#[must_use]
pub fn pair_score(mate1: &Alignment, mate2: &Alignment, observed_insert: i64, expected: &InsertSizeParameters, config: &PairConfig) -> i32 {
    let deviation = ((observed_insert as f64 - expected.mean) / expected.stddev.max(1.0)).abs();
    let insert_penalty = (deviation * config.snp_cost as f64) as i32;
    mate1.score + mate2.score - insert_penalty
}

/// Builds a pair candidate from two single-end alignments, applying the pair
/// score and proper-pair threshold (spec §4.6).
#[must_use]
pub fn build_pair(mate1: Alignment, mate2: Alignment, observed_insert: i64, expected: &InsertSizeParameters, config: &PairConfig) -> PairCandidate {
    let is_pair = is_pair(mate1.reverse, mate2.reverse, observed_insert, expected, config.expected_orientation);
    let score = if is_pair {
        pair_score(&mate1, &mate2, observed_insert, expected, config)
    } else {
        mate1.score + mate2.score - config.unpaired_penalty
    };
    let proper_pair = is_pair && score >= config.proper_pair_threshold;

    PairCandidate {
        mate1,
        mate2,
        is_pair,
        rescued: false,
        score,
        proper_pair,
    }
}

/// Attempts mate rescue: given a strong anchor on one mate with no paired
/// partner, probes a reference window at the expected insert distance for a
/// gapped alignment (spec §4.6 "Mate rescue"). The actual windowed SW call is
/// the caller's responsibility (it needs `ReferenceView`/`AlignmentGenerator`
/// access); this records whether a rescued candidate clears the threshold.
#[must_use]
pub fn accept_rescue(anchor: &Alignment, rescued: &Alignment, config: &PairConfig) -> bool {
    anchor.score + rescued.score - config.unpaired_penalty >= config.proper_pair_threshold
}

/// Computes the primary pair's MAPQ/XQ given the best and next-best
/// non-overlapping pair scores (spec §4.6 "Pair MAPQ").
#[must_use]
pub fn primary_mapq(best_score: i32, next_best_score: i32, config: &PairConfig, read_len_avg: u32) -> (i32, i32) {
    compute_pair_mapq(best_score, next_best_score, config.snp_cost, read_len_avg)
}

/// Selects up to `secAligns` secondary candidates within `secScoreDelta` of
/// the primary, sorted by descending score (spec §4.6 "Secondary
/// alignments").
#[must_use]
pub fn select_secondary<'a>(candidates: &'a [PairCandidate], primary_score: i32, config: &PairConfig) -> Vec<&'a PairCandidate> {
    let mut eligible: Vec<&PairCandidate> = candidates
        .iter()
        .filter(|c| primary_score - c.score <= config.sec_score_delta)
        .collect();
    eligible.sort_by_key(|c| std::cmp::Reverse(c.score));
    eligible.truncate(config.sec_aligns);
    eligible
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::align::cigar::Cigar;

    fn alignment(score: i32) -> Alignment {
        alignment_with_strand(score, false)
    }

    fn alignment_with_strand(score: i32, reverse: bool) -> Alignment {
        Alignment {
            reference_position: 0,
            score,
            cigar: Cigar::default(),
            mismatches: 0,
            ineligible: false,
            smith_waterman_done: false,
            perfect: true,
            reverse,
        }
    }

    fn expected() -> InsertSizeParameters {
        InsertSizeParameters {
            mean: 400.0,
            stddev: 40.0,
            min: 320,
            max: 480,
            rescue_min: 300,
            rescue_max: 500,
            sigma_factor: 0,
            orientation: PairOrientation::ForwardReverse,
            is_init_done: true,
        }
    }

    #[test]
    fn fr_orientation_within_range_is_a_pair() {
        assert!(is_pair(false, true, 410, &expected(), PairOrientation::ForwardReverse));
    }

    #[test]
    fn wrong_orientation_is_not_a_pair() {
        assert!(!is_pair(false, false, 410, &expected(), PairOrientation::ForwardReverse));
    }

    #[test]
    fn insert_outside_range_is_not_a_pair() {
        assert!(!is_pair(false, true, 1000, &expected(), PairOrientation::ForwardReverse));
    }

    #[test]
    fn proper_pair_requires_threshold() {
        let config = PairConfig {
            expected_orientation: PairOrientation::ForwardReverse,
            unpaired_penalty: 20,
            proper_pair_threshold: 30,
            snp_cost: 6,
            sec_aligns: 2,
            sec_score_delta: 5,
        };
        let candidate = build_pair(alignment_with_strand(25, false), alignment_with_strand(25, true), 410, &expected(), &config);
        assert!(candidate.is_pair);
        assert!(candidate.proper_pair);
    }

    #[test]
    fn secondary_selection_respects_delta_and_cap() {
        let config = PairConfig {
            expected_orientation: PairOrientation::ForwardReverse,
            unpaired_penalty: 20,
            proper_pair_threshold: 0,
            snp_cost: 6,
            sec_aligns: 1,
            sec_score_delta: 3,
        };
        let candidates = vec![
            build_pair(alignment(50), alignment(50), 410, &expected(), &config),
            build_pair(alignment(49), alignment(48), 410, &expected(), &config),
            build_pair(alignment(10), alignment(10), 410, &expected(), &config),
        ];
        let secondary = select_secondary(&candidates, 100, &config);
        assert_eq!(secondary.len(), 1);
    }
}
