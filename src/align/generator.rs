//! Alignment generation from chains: reference-window sizing, ungapped
//! scan, the potential-score bound, and conditional SW dispatch (spec §4.5).

use crate::align::cigar::{Cigar, CigarOp, CigarRun};
use crate::align::wavefront::{BAND_WIDTH, ScoringScheme, WavefrontAligner};
use crate::mapping::base::{Base, reverse_complement_codes};
use crate::mapping::chain::Chain;
use crate::mapping::reference::ReferenceView;
use crate::mapping::seed::Orientation;

#[cfg(feature = "simd")]
use crate::align::striped::{StripedAligner, StripedScoring};

/// Reference windows beyond this head/tail gap are truncated to cap
/// unproductive DP (spec §4.5 step 1).
const MAX_FREE_GAP: usize = 256;

#[derive(Debug, Clone)]
pub struct Alignment {
    pub reference_position: u64,
    pub score: i32,
    pub cigar: Cigar,
    pub mismatches: u32,
    pub ineligible: bool,
    pub smith_waterman_done: bool,
    pub perfect: bool,
    /// Whether this alignment is against the query's reverse complement
    /// (spec §3/§6 strand flag), carried from the chain's [`Orientation`].
    pub reverse: bool,
}

/// The result of scanning one fixed diagonal for the best positively-scored
/// subrun (spec §4.5 step 3).
struct UngappedResult {
    score: i32,
    diagonal_offset: usize,
    query_start: usize,
    query_end: usize,
    mismatches: u32,
}

pub struct AlignmentGenerator {
    scoring: ScoringScheme,
    min_score: i32,
    seed_k: usize,
    #[cfg(feature = "simd")]
    striped: StripedAligner,
}

impl AlignmentGenerator {
    #[must_use]
    pub fn new(scoring: ScoringScheme, min_score: i32, seed_k: usize) -> Self {
        Self {
            scoring,
            min_score,
            seed_k,
            #[cfg(feature = "simd")]
            striped: StripedAligner::new(StripedScoring::default()),
        }
    }

    /// Computes the reference window length for a chain spanning
    /// `chain_span` reference bases, with `head_gap`/`tail_gap` unaligned
    /// read bases on either side (spec §4.5 step 1).
    #[must_use]
    pub fn window_len(chain_span: usize, head_gap: usize, tail_gap: usize) -> usize {
        let head_gap = head_gap.min(MAX_FREE_GAP);
        let tail_gap = tail_gap.min(MAX_FREE_GAP);
        chain_span + head_gap + tail_gap + 2 * BAND_WIDTH + 1 + tail_gap / 8
    }

    /// Generates an alignment for `query` against the window implied by
    /// `chain` on `reference`, following spec §4.5's five steps.
    #[must_use]
    pub fn generate(&self, query: &[Base], reference: &ReferenceView, chain: &Chain, read_len: usize) -> Option<Alignment> {
        let first = chain.positions.first()?;
        let last = chain.positions.last()?;

        let head_gap = first.read_offset;
        let tail_gap = read_len.saturating_sub(last.read_offset + last.seed_length);
        let chain_span = (last.reference_position + last.seed_length as u64).saturating_sub(first.reference_position) as usize;
        let window_len = Self::window_len(chain_span, head_gap, tail_gap);

        let window_start = first.reference_position.saturating_sub(head_gap.min(MAX_FREE_GAP) as u64);
        let ineligible = reference.is_in_hole(window_start as usize);

        let window = reference.fetch_forward(window_start as usize, window_len);

        let start_diagonal = (first.reference_position as i64 - window_start as i64) - first.read_offset as i64;
        let reverse = chain.orientation == Orientation::ReverseComplement;
        let diagonal_offset = start_diagonal.max(0) as usize;

        let ungapped = self.ungapped_scan(query, &window, diagonal_offset);

        if ungapped.score >= self.min_score && chain.perfect {
            return self.build_ungapped_alignment(&ungapped, window_start, query.len(), ineligible, true, reverse);
        }

        let potential_score = self.potential_score(ungapped.score, query.len());

        if potential_score <= ungapped.score && chain.perfect {
            return self.build_ungapped_alignment(&ungapped, window_start, query.len(), ineligible, chain.perfect, reverse);
        }

        #[cfg(feature = "simd")]
        {
            let striped_bound = self.striped.align(query, &window).map_or(0, |s| s.score as i32);
            if striped_bound < self.min_score {
                return None;
            }
        }

        let aligner = WavefrontAligner::new(self.scoring);
        let sw_result = aligner.align(query, &window, start_diagonal)?;

        let mismatches = count_mismatches(&sw_result.cigar, query, &window[sw_result.reference_start..]);

        Some(Alignment {
            reference_position: window_start + sw_result.reference_start as u64,
            score: sw_result.score,
            cigar: sw_result.cigar,
            mismatches,
            ineligible,
            smith_waterman_done: true,
            perfect: false,
            reverse,
        })
    }

    /// Builds an [`Alignment`] from an [`UngappedResult`], rendering any
    /// untouched query prefix/suffix as soft clips (spec §4.5 step 3).
    fn build_ungapped_alignment(
        &self, ungapped: &UngappedResult, window_start: u64, query_len: usize, ineligible: bool, perfect: bool, reverse: bool,
    ) -> Option<Alignment> {
        let match_len = (ungapped.query_end - ungapped.query_start) as u32;
        if match_len == 0 {
            return None;
        }

        let mut runs = Vec::with_capacity(3);
        if ungapped.query_start > 0 {
            runs.push(CigarRun { op: CigarOp::SoftClip, length: ungapped.query_start as u32 });
        }
        runs.push(CigarRun { op: CigarOp::Match, length: match_len });
        let tail_clip = query_len - ungapped.query_end;
        if tail_clip > 0 {
            runs.push(CigarRun { op: CigarOp::SoftClip, length: tail_clip as u32 });
        }

        Some(Alignment {
            reference_position: window_start + (ungapped.diagonal_offset + ungapped.query_start) as u64,
            score: ungapped.score,
            cigar: Cigar::from_runs(runs).ok()?,
            mismatches: ungapped.mismatches,
            ineligible,
            smith_waterman_done: false,
            perfect,
            reverse,
        })
    }

    /// Scans the single diagonal implied by the chain (`diagonal_offset` into
    /// `window`), tracking the best positively-scored subrun via a running
    /// (Kadane's-style) sum rather than relocating to an unrelated offset
    /// (spec §4.5 step 3).
    fn ungapped_scan(&self, query: &[Base], window: &[Base], diagonal_offset: usize) -> UngappedResult {
        if diagonal_offset >= window.len() {
            return UngappedResult { score: 0, diagonal_offset, query_start: 0, query_end: 0, mismatches: query.len() as u32 };
        }

        let scored_len = query.len().min(window.len() - diagonal_offset);

        let mut best_score = 0i32;
        let mut best_start = 0usize;
        let mut best_end = 0usize;
        let mut best_mismatches = 0u32;

        let mut running_score = 0i32;
        let mut running_start = 0usize;
        let mut running_mismatches = 0u32;

        for i in 0..scored_len {
            if running_score <= 0 {
                running_start = i;
                running_score = 0;
                running_mismatches = 0;
            }

            let q = query[i];
            let r = window[diagonal_offset + i];
            running_score += self.scoring.substitution_score(q, r);
            if q != r {
                running_mismatches += 1;
            }

            if running_score > best_score {
                best_score = running_score;
                best_start = running_start;
                best_end = i + 1;
                best_mismatches = running_mismatches;
            }
        }

        let mismatches_outside_window = (query.len() - scored_len) as u32;
        UngappedResult {
            score: best_score,
            diagonal_offset,
            query_start: best_start,
            query_end: best_end,
            mismatches: best_mismatches + mismatches_outside_window,
        }
    }

    /// Mate rescue (spec §4.6 "Mate rescue"): with no chain to hand an
    /// unmapped mate, searches every offset of `window` for the
    /// best-scoring placement (both orientations), then refines it with a
    /// banded wavefront pass. Unlike [`Self::generate`], brute-forcing the
    /// offset here is correct: there is no seed-derived diagonal prior to
    /// respect.
    #[must_use]
    pub fn rescue(&self, query: &[Base], reference: &ReferenceView, window_start: u64, window_len: usize) -> Option<Alignment> {
        let window = reference.fetch_forward(window_start as usize, window_len);
        if window.len() < query.len() {
            return None;
        }

        let revcomp_query = reverse_complement_codes(query);
        let forward_diagonal = self.best_diagonal(query, &window);
        let reverse_diagonal = self.best_diagonal(&revcomp_query, &window);

        let (use_query, diagonal, reverse) = match (forward_diagonal, reverse_diagonal) {
            (Some(f), Some(r)) => {
                let forward_score = self.ungapped_scan(query, &window, f).score;
                let reverse_score = self.ungapped_scan(&revcomp_query, &window, r).score;
                if reverse_score > forward_score { (revcomp_query, r, true) } else { (query.to_vec(), f, false) }
            }
            (Some(f), None) => (query.to_vec(), f, false),
            (None, Some(r)) => (revcomp_query, r, true),
            (None, None) => return None,
        };

        let aligner = WavefrontAligner::new(self.scoring);
        let sw_result = aligner.align(&use_query, &window, diagonal as i64)?;
        if sw_result.score < self.min_score {
            return None;
        }

        let mismatches = count_mismatches(&sw_result.cigar, &use_query, &window[sw_result.reference_start..]);

        Some(Alignment {
            reference_position: window_start + sw_result.reference_start as u64,
            score: sw_result.score,
            cigar: sw_result.cigar,
            mismatches,
            ineligible: false,
            smith_waterman_done: true,
            perfect: false,
            reverse,
        })
    }

    /// Finds the offset into `window` that maximizes [`Self::ungapped_scan`]'s
    /// score, or `None` if every offset scores below `min_score`.
    fn best_diagonal(&self, query: &[Base], window: &[Base]) -> Option<usize> {
        if window.len() < query.len() {
            return None;
        }

        let mut best_score = self.min_score - 1;
        let mut best_offset = None;
        for offset in 0..=(window.len() - query.len()) {
            let score = self.ungapped_scan(query, window, offset).score;
            if score > best_score {
                best_score = score;
                best_offset = Some(offset);
            }
        }
        best_offset
    }

    /// `potentialScore = ungapped + sum over clipped ends of
    /// (clip_len/seed_k)*mismatch + (clip_len - mismatches)*match - gapOpen`
    /// (spec §4.5 step 4). With no soft clips tracked separately here, this
    /// degrades to the ungapped score plus one gap-open headroom, reflecting
    /// the bound SW could still find a single indel worth opening for.
    fn potential_score(&self, ungapped_score: i32, read_len: usize) -> i32 {
        let clip_budget = (read_len / self.seed_k.max(1)) as i32 * self.scoring.mismatch_penalty;
        ungapped_score + clip_budget - self.scoring.gap_open
    }
}

fn count_mismatches(cigar: &Cigar, query: &[Base], reference: &[Base]) -> u32 {
    let mut q_pos = 0usize;
    let mut r_pos = 0usize;
    let mut mismatches = 0u32;
    for run in cigar.runs() {
        match run.op {
            CigarOp::Match => {
                for _ in 0..run.length {
                    if q_pos < query.len() && r_pos < reference.len() && query[q_pos] != reference[r_pos] {
                        mismatches += 1;
                    }
                    q_pos += 1;
                    r_pos += 1;
                }
            }
            CigarOp::Insertion | CigarOp::SoftClip => {
                mismatches += run.length;
                q_pos += run.length as usize;
            }
            CigarOp::Deletion => {
                mismatches += run.length;
                r_pos += run.length as usize;
            }
            _ => {}
        }
    }
    mismatches
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::base::encode_sequence;
    use crate::mapping::mapper::SeedPosition;
    use crate::mapping::seed::Orientation;

    fn chain_with(positions: Vec<SeedPosition>) -> Chain {
        let mut builder = crate::mapping::chain::ChainBuilder::new();
        builder.extend(positions);
        builder.finish().into_iter().next().unwrap()
    }

    #[test]
    fn window_len_grows_with_gaps_and_span() {
        let a = AlignmentGenerator::window_len(100, 0, 0);
        let b = AlignmentGenerator::window_len(100, 50, 50);
        assert!(b > a);
    }

    #[test]
    fn perfect_chain_with_exact_match_skips_smith_waterman() {
        let reference_bases = encode_sequence(b"ACGTACGTACGTACGTACGTACGTACGT");
        let reference = ReferenceView::from_contigs(&[("contig1", b"ACGTACGTACGTACGTACGTACGTACGT")]);
        let query = encode_sequence(b"ACGTACGTACGTACGTACGTA"); // matches offset 0, length 21

        let position = SeedPosition {
            read_offset: 0,
            seed_length: 21,
            reference_position: 0,
            orientation: Orientation::Forward,
            half_extension: 0,
            is_random_sample: false,
        };
        let chain = chain_with(vec![position]);
        let generator = AlignmentGenerator::new(ScoringScheme::default(), 1, 21);
        let alignment = generator.generate(&query, &reference, &chain, query.len()).unwrap();
        assert!(!alignment.smith_waterman_done);
        assert_eq!(alignment.mismatches, 0);
        let _ = reference_bases;
    }
}
