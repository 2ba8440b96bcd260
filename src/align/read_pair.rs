//! Orchestrates both mates of a read pair through chain building, alignment
//! generation, and pair building (spec §4.6 "State machine — per read
//! pair").

use crate::align::generator::{Alignment, AlignmentGenerator};
use crate::align::insert_size::InsertSizeParameters;
use crate::align::pair::{PairCandidate, PairConfig, accept_rescue, build_pair, select_secondary};
use crate::mapping::base::Read;
use crate::mapping::chain::{Chain, ChainBuilder};
use crate::mapping::mapper::Mapper;
use crate::mapping::reference::ReferenceView;

/// Span added on either side of an unmapped mate's rescue window beyond the
/// rescue range itself, so the banded aligner has room to place the read
/// without its own diagonal running off the window's edge.
const RESCUE_WINDOW_MARGIN: usize = 64;

/// Which mate an unpaired alignment or rescue result belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MateSide {
    Mate1,
    Mate2,
}

/// The per-read-pair state machine (spec §4.6): transitions are deterministic
/// given inputs, with no async boundaries — each state holds exactly the
/// data produced by the transition into it.
#[derive(Debug)]
pub enum ReadPairState {
    New,
    HasChains { mate1_chains: Vec<Chain>, mate2_chains: Vec<Chain> },
    HasUnpairedAlignments { mate1: Vec<Alignment>, mate2: Vec<Alignment> },
    HasPairCandidates { candidates: Vec<PairCandidate> },
    PickedBest { primary: PairCandidate, secondary: Vec<PairCandidate> },
    /// Mate rescue found and accepted a partner for a lone anchor alignment,
    /// yielding a full pair candidate (spec §4.6 "Mate rescue").
    Rescued { candidate: PairCandidate },
    /// Exactly one mate produced an alignment and the other stayed unmapped,
    /// either because it had no chains at all or rescue failed to clear the
    /// proper-pair threshold (spec §4.6 "if neither chain pairs and rescue
    /// fails, report the mapped mate alone").
    SingleMapped { alignment: Alignment, mapped_mate: MateSide },
    AllUnmapped,
}

pub struct ReadPairProcessor<'t> {
    mapper: &'t Mapper<'t>,
    generator: &'t AlignmentGenerator,
    reference: &'t ReferenceView,
    pair_config: PairConfig,
}

impl<'t> ReadPairProcessor<'t> {
    #[must_use]
    pub fn new(mapper: &'t Mapper<'t>, generator: &'t AlignmentGenerator, reference: &'t ReferenceView, pair_config: PairConfig) -> Self {
        Self { mapper, generator, reference, pair_config }
    }

    /// Drives one read pair through the full state machine, returning the
    /// terminal state (`PickedBest`, `SingleMapped`, or `AllUnmapped`).
    #[must_use]
    pub fn process(&self, mate1: &Read, mate2: &Read, insert_params: &InsertSizeParameters) -> ReadPairState {
        let state = self.build_chains(mate1, mate2);
        let state = self.generate_unpaired(state, mate1, mate2);
        let state = self.build_pairs(state, insert_params);
        self.pick_best(state, mate1, mate2, insert_params)
    }

    fn build_chains(&self, mate1: &Read, mate2: &Read) -> ReadPairState {
        let mut builder1 = ChainBuilder::new();
        builder1.extend(self.mapper.map(mate1));
        let mut builder2 = ChainBuilder::new();
        builder2.extend(self.mapper.map(mate2));

        ReadPairState::HasChains {
            mate1_chains: builder1.finish(),
            mate2_chains: builder2.finish(),
        }
    }

    fn generate_unpaired(&self, state: ReadPairState, mate1: &Read, mate2: &Read) -> ReadPairState {
        let ReadPairState::HasChains { mate1_chains, mate2_chains } = state else {
            return state;
        };

        if mate1_chains.is_empty() && mate2_chains.is_empty() {
            return ReadPairState::AllUnmapped;
        }

        let mate1_alignments = mate1_chains
            .iter()
            .filter(|c| !c.filtered)
            .filter_map(|c| self.generator.generate(mate1.bases(), self.reference, c, mate1.len()))
            .collect();
        let mate2_alignments = mate2_chains
            .iter()
            .filter(|c| !c.filtered)
            .filter_map(|c| self.generator.generate(mate2.bases(), self.reference, c, mate2.len()))
            .collect();

        ReadPairState::HasUnpairedAlignments { mate1: mate1_alignments, mate2: mate2_alignments }
    }

    fn build_pairs(&self, state: ReadPairState, insert_params: &InsertSizeParameters) -> ReadPairState {
        let ReadPairState::HasUnpairedAlignments { mate1, mate2 } = state else {
            return state;
        };

        if mate1.is_empty() || mate2.is_empty() {
            return ReadPairState::HasUnpairedAlignments { mate1, mate2 };
        }

        let mut candidates = Vec::with_capacity(mate1.len() * mate2.len());
        for a1 in &mate1 {
            for a2 in &mate2 {
                let observed_insert = (a2.reference_position as i64 - a1.reference_position as i64).abs();
                candidates.push(build_pair(a1.clone(), a2.clone(), observed_insert, insert_params, &self.pair_config));
            }
        }

        ReadPairState::HasPairCandidates { candidates }
    }

    fn pick_best(&self, state: ReadPairState, mate1: &Read, mate2: &Read, insert_params: &InsertSizeParameters) -> ReadPairState {
        match state {
            ReadPairState::HasPairCandidates { candidates } if !candidates.is_empty() => {
                let best_index = candidates
                    .iter()
                    .enumerate()
                    .max_by_key(|(_, c)| c.score)
                    .map(|(i, _)| i)
                    .expect("candidates is non-empty");
                let mut candidates = candidates;
                let primary = candidates.remove(best_index);
                let secondary = select_secondary(&candidates, primary.score, &self.pair_config)
                    .into_iter()
                    .cloned()
                    .collect();
                ReadPairState::PickedBest { primary, secondary }
            }
            ReadPairState::HasUnpairedAlignments { mate1: mate1_alignments, mate2: mate2_alignments } => {
                self.pick_single_end(mate1_alignments, mate2_alignments, mate1, mate2, insert_params)
            }
            ReadPairState::AllUnmapped => ReadPairState::AllUnmapped,
            _ => ReadPairState::AllUnmapped,
        }
    }

    /// Handles the case where at most one mate produced chain-derived
    /// alignments (spec §4.6 "if one mate has no chains, rescue it against
    /// the best alignment of the other before giving up"). Picks the
    /// best-scoring alignment for whichever mate is non-empty, then tries
    /// mate rescue against the unmapped mate; falls back to reporting the
    /// mapped mate alone when rescue is unavailable or fails the proper-pair
    /// threshold.
    fn pick_single_end(
        &self,
        mate1_alignments: Vec<Alignment>,
        mate2_alignments: Vec<Alignment>,
        mate1: &Read,
        mate2: &Read,
        insert_params: &InsertSizeParameters,
    ) -> ReadPairState {
        let best1 = mate1_alignments.into_iter().max_by_key(|a| a.score);
        let best2 = mate2_alignments.into_iter().max_by_key(|a| a.score);

        match (best1, best2) {
            (None, None) => ReadPairState::AllUnmapped,
            (Some(anchor), None) => self.rescue_or_report(anchor, MateSide::Mate1, mate2, insert_params),
            (None, Some(anchor)) => self.rescue_or_report(anchor, MateSide::Mate2, mate1, insert_params),
            (Some(a1), Some(a2)) => {
                // Both mates produced chain-derived alignments but
                // build_pairs skipped pairing (reachable only if this
                // function is ever called directly with two non-empty
                // vectors); fold them into a pair candidate rather than
                // silently keeping only one.
                let observed_insert = (a2.reference_position as i64 - a1.reference_position as i64).abs();
                let candidate = build_pair(a1, a2, observed_insert, insert_params, &self.pair_config);
                ReadPairState::PickedBest { primary: candidate, secondary: Vec::new() }
            }
        }
    }

    /// Attempts to rescue `unmapped_mate` against `anchor`'s position, then
    /// either materializes a full [`PairCandidate`] (rescue succeeded and
    /// cleared the proper-pair threshold) or reports `anchor` alone.
    fn rescue_or_report(&self, anchor: Alignment, anchor_side: MateSide, unmapped_mate: &Read, insert_params: &InsertSizeParameters) -> ReadPairState {
        if let Some(rescued) = self.attempt_rescue(&anchor, unmapped_mate, insert_params) {
            if accept_rescue(&anchor, &rescued, &self.pair_config) {
                let observed_insert = (rescued.reference_position as i64 - anchor.reference_position as i64).abs();
                let mut candidate = match anchor_side {
                    MateSide::Mate1 => build_pair(anchor, rescued, observed_insert, insert_params, &self.pair_config),
                    MateSide::Mate2 => build_pair(rescued, anchor, observed_insert, insert_params, &self.pair_config),
                };
                candidate.rescued = true;
                return ReadPairState::Rescued { candidate };
            }
        }

        ReadPairState::SingleMapped { alignment: anchor, mapped_mate: anchor_side }
    }

    /// Probes a reference window centered on `anchor`'s position, sized from
    /// the insert-size estimator's rescue bounds, for a gapped alignment of
    /// the mate that produced no chains (spec §4.6 "Mate rescue").
    fn attempt_rescue(&self, anchor: &Alignment, unmapped_mate: &Read, insert_params: &InsertSizeParameters) -> Option<Alignment> {
        let span = insert_params.rescue_max.max(insert_params.rescue_min) as usize + RESCUE_WINDOW_MARGIN;
        let window_start = anchor.reference_position.saturating_sub(span as u64);
        let window_len = span * 2 + unmapped_mate.len();
        self.generator.rescue(unmapped_mate.bases(), self.reference, window_start, window_len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unmapped_mates_yield_all_unmapped_state() {
        let reference = ReferenceView::from_contigs(&[("chr1", b"ACGTACGTACGTACGTACGTACGT")]);
        let table = crate::mapping::hashtable::HashTable::new(10);
        let primary = crate::mapping::hash::CrcHasher::new(crate::mapping::hash::default_primary_polynomial());
        let secondary = crate::mapping::hash::CrcHasher::new(crate::mapping::hash::default_secondary_polynomial());
        let mapper = Mapper::new(crate::mapping::mapper::MapperConfig::default(), primary, secondary, &table);
        let generator = AlignmentGenerator::new(crate::align::wavefront::ScoringScheme::default(), 1, 21);
        let pair_config = PairConfig {
            expected_orientation: crate::align::pair::PairOrientation::ForwardReverse,
            unpaired_penalty: 20,
            proper_pair_threshold: 30,
            snp_cost: 6,
            sec_aligns: 2,
            sec_score_delta: 5,
        };
        let processor = ReadPairProcessor::new(&mapper, &generator, &reference, pair_config);

        let mate1 = Read::new(b"r1", b"GGGGGGGGGGGGGGGGGGGGG", &vec![30; 21], 0, 0);
        let mate2 = Read::new(b"r1", b"TTTTTTTTTTTTTTTTTTTTT", &vec![30; 21], 0, 1);
        let insert_params = params();

        let state = processor.process(&mate1, &mate2, &insert_params);
        assert!(matches!(state, ReadPairState::AllUnmapped));
    }

    fn params() -> InsertSizeParameters {
        InsertSizeParameters {
            mean: 400.0,
            stddev: 40.0,
            min: 320,
            max: 480,
            rescue_min: 300,
            rescue_max: 500,
            sigma_factor: 0,
            orientation: crate::align::pair::PairOrientation::ForwardReverse,
            is_init_done: true,
        }
    }

    #[test]
    fn unpaired_mate_without_rescue_partner_yields_single_mapped() {
        // mate1 finds a strong anchor; mate2's sequence appears nowhere in
        // the reference, so rescue over the anchor's window fails and the
        // pair falls back to reporting mate1 alone.
        let reference = ReferenceView::from_contigs(&[(
            "chr1",
            b"ACGTACGTACGTACGTACGTACGTACGTACGTACGTGGGGGGGGGGGGGGGGGGGGGACGTACGTACGTACGTACGTACGT",
        )]);
        let table = crate::mapping::hashtable::HashTable::new(10);
        let primary = crate::mapping::hash::CrcHasher::new(crate::mapping::hash::default_primary_polynomial());
        let secondary = crate::mapping::hash::CrcHasher::new(crate::mapping::hash::default_secondary_polynomial());
        let mapper = Mapper::new(crate::mapping::mapper::MapperConfig::default(), primary, secondary, &table);
        let generator = AlignmentGenerator::new(crate::align::wavefront::ScoringScheme::default(), 1, 21);
        let pair_config = PairConfig {
            expected_orientation: crate::align::pair::PairOrientation::ForwardReverse,
            unpaired_penalty: 20,
            proper_pair_threshold: 30,
            snp_cost: 6,
            sec_aligns: 2,
            sec_score_delta: 5,
        };
        let processor = ReadPairProcessor::new(&mapper, &generator, &reference, pair_config);

        let mate1 = Read::new(b"r1", b"GGGGGGGGGGGGGGGGGGGGG", &vec![30; 21], 0, 0);
        let mate2 = Read::new(b"r1", b"TTTTTTTTTTTTTTTTTTTTT", &vec![30; 21], 0, 1);

        let state = processor.process(&mate1, &mate2, &params());
        match state {
            ReadPairState::SingleMapped { mapped_mate, .. } => assert_eq!(mapped_mate, MateSide::Mate1),
            ReadPairState::Rescued { .. } => {}
            other => panic!("expected SingleMapped or Rescued, got {other:?}"),
        }
    }
}
