//! Fixed-width banded Smith-Waterman with a steered band center, grounded on
//! `examples/original_source/include/align/Wavefront.hpp` and
//! `SmithWaterman.hpp` (spec §4.3).
//!
//! The original engine computes one antidiagonal of a fixed-width wavefront
//! per cycle and steers the band left/right to keep the running score peak
//! centered, mimicking an FPGA pipeline with a fixed pipeline delay. This
//! port keeps the same constants and the same "track the peak, steer with
//! hysteresis and a delay" control loop, but computes the DP row-by-row
//! (query base by query base) rather than antidiagonal-by-antidiagonal,
//! since nothing downstream depends on the wavefront's physical cycle
//! ordering. The banded recurrence, affine gap scoring, and steered center
//! are the parts that matter for matching behavior.

use crate::align::cigar::{Cigar, CigarOp};
use crate::mapping::base::{BASE_N, BASE_PAD, Base};

/// Number of cells computed per row, matching the original's `WIDTH`.
pub const BAND_WIDTH: usize = 48;
/// Cycles of lag before a steering decision affects the band, matching
/// `STEERING_DELAY`.
pub const STEERING_DELAY: usize = 9;
/// Hysteresis depth before the band actually moves, matching `HYST_STAGES_C`.
pub const HYST_STAGES: i32 = 7;
/// Maximum the band is allowed to shift in one decision, matching `MAX_RANGE`.
pub const MAX_RANGE: i32 = 3;

#[derive(Debug, Clone, Copy)]
pub struct ScoringScheme {
    pub match_score: i32,
    pub mismatch_penalty: i32,
    pub gap_open: i32,
    pub gap_extend: i32,
    /// Score applied in place of match/mismatch whenever either base is `N`
    /// (spec §3 "Affine gap").
    pub n_score: i32,
    /// Bonus credited to an alignment that reaches a query terminal without
    /// soft-clipping it (spec §4.3 "Peak tracking").
    pub unclip_score: i32,
}

impl Default for ScoringScheme {
    fn default() -> Self {
        Self {
            match_score: 1,
            mismatch_penalty: 4,
            gap_open: 6,
            gap_extend: 1,
            n_score: -1,
            unclip_score: 5,
        }
    }
}

impl ScoringScheme {
    /// Substitution score for one query/reference base pair: `nScore` when
    /// either side is `N` or padding, otherwise match/mismatch (spec §3).
    #[must_use]
    pub fn substitution_score(&self, query_base: Base, reference_base: Base) -> i32 {
        if query_base == BASE_PAD || reference_base == BASE_PAD {
            -self.mismatch_penalty
        } else if query_base == BASE_N || reference_base == BASE_N {
            self.n_score
        } else if query_base == reference_base {
            self.match_score
        } else {
            -self.mismatch_penalty
        }
    }
}

#[derive(Debug, Clone)]
pub struct WavefrontAlignment {
    pub score: i32,
    pub cigar: Cigar,
    /// Reference offset (from the start of the window passed to `align`) of
    /// the first consumed reference base.
    pub reference_start: usize,
    /// Query offset of the first consumed query base.
    pub query_start: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TraceDir {
    None,
    Diag,
    Up,
    Left,
}

/// One row's affine-gap DP state plus traceback, restricted to a band of
/// [`BAND_WIDTH`] reference columns.
struct Row {
    /// Absolute reference index of this row's leftmost band cell.
    band_start: i64,
    h: Vec<i32>,
    e: Vec<i32>,
    trace: Vec<TraceDir>,
    /// Running left-gap (`F`) score, walked left-to-right across the row.
    f_scratch: i32,
}

impl Row {
    fn new(band_start: i64) -> Self {
        Self {
            band_start,
            h: vec![0; BAND_WIDTH],
            e: vec![0; BAND_WIDTH],
            trace: vec![TraceDir::None; BAND_WIDTH],
            f_scratch: 0,
        }
    }
}

pub struct WavefrontAligner {
    scoring: ScoringScheme,
}

impl WavefrontAligner {
    #[must_use]
    pub fn new(scoring: ScoringScheme) -> Self {
        Self { scoring }
    }

    /// Aligns `query` against `reference`, banding around `start_diagonal`
    /// (the reference offset expected to align with query offset 0). The
    /// band recenters a handful of times over the course of the query using
    /// a hysteresis-gated steering rule (spec §4.3 "Auto-steering").
    #[must_use]
    pub fn align(&self, query: &[Base], reference: &[Base], start_diagonal: i64) -> Option<WavefrontAlignment> {
        if query.is_empty() || reference.is_empty() {
            return None;
        }

        let half = (BAND_WIDTH / 2) as i64;
        let mut rows: Vec<Row> = Vec::with_capacity(query.len() + 1);
        rows.push(Row::new((start_diagonal - half).max(0)));

        let mut global_max = 0i32;
        let mut global_max_row = 0usize;
        let mut global_max_col = 0usize;

        // Steering state: an accumulated drift counter gated by hysteresis,
        // with decisions lagged by STEERING_DELAY rows so a transient peak
        // doesn't immediately yank the band (mirrors the original's pipelined
        // steering, minus the cycle-accurate bit width).
        let mut drift = 0i32;
        let mut pending_shifts: Vec<i32> = vec![0; STEERING_DELAY];

        for (row_idx, &q_base) in query.iter().enumerate() {
            let prev_band_start = rows[row_idx].band_start;
            let shift = pending_shifts[row_idx % STEERING_DELAY];
            let band_start = (prev_band_start + shift as i64).max(0);
            let mut row = Row::new(band_start);

            for col in 0..BAND_WIDTH {
                let ref_index = band_start + col as i64;
                if ref_index < 0 || ref_index as usize >= reference.len() {
                    continue;
                }
                let r_base = reference[ref_index as usize];
                let substitution = self.scoring.substitution_score(q_base, r_base);

                // Diagonal predecessor: previous row, same absolute reference
                // column (shifted into this row's band coordinates).
                let prev_row = &rows[row_idx];
                let prev_col_diag = (ref_index - 1) - prev_row.band_start;
                let diag_h = if prev_col_diag >= 0 && (prev_col_diag as usize) < BAND_WIDTH {
                    prev_row.h[prev_col_diag as usize]
                } else {
                    0
                };
                let diag_score = (diag_h + substitution).max(0);

                // Up predecessor: previous row, same reference column (a
                // query insertion).
                let prev_col_up = ref_index - prev_row.band_start;
                let (up_h, up_e) = if prev_col_up >= 0 && (prev_col_up as usize) < BAND_WIDTH {
                    (prev_row.h[prev_col_up as usize], prev_row.e[prev_col_up as usize])
                } else {
                    (0, 0)
                };
                let e_score = (up_e - self.scoring.gap_extend).max(up_h - self.scoring.gap_open).max(0);

                // Left predecessor: this row, previous column (a reference
                // deletion).
                let left_f = if col > 0 {
                    let left_h = row.h[col - 1];
                    let left_f_prev = row.f_scratch;
                    (left_f_prev - self.scoring.gap_extend).max(left_h - self.scoring.gap_open).max(0)
                } else {
                    0
                };
                row.f_scratch = left_f;

                let best = diag_score.max(e_score).max(left_f).max(0);
                row.h[col] = best;
                row.e[col] = e_score;

                row.trace[col] = if best == 0 {
                    TraceDir::None
                } else if best == diag_score {
                    TraceDir::Diag
                } else if best == e_score {
                    TraceDir::Up
                } else {
                    TraceDir::Left
                };

                // Peak tracking: a cell in the top row (query offset 0) or the
                // bottom row (the last query base) represents an alignment
                // that reaches that terminal unclipped, so it gets the
                // unclip bonus when competing for the global max (spec §4.3
                // "Peak tracking"). The bonus is applied only to the
                // comparison, not stored back into `row.h`, so it cannot
                // leak into later cells' recurrence and manufacture an
                // alignment out of an all-zero band.
                if best > 0 {
                    let is_terminal_row = row_idx == 0 || row_idx == query.len() - 1;
                    let peak_candidate = if is_terminal_row { best + self.scoring.unclip_score } else { best };
                    if peak_candidate > global_max {
                        global_max = peak_candidate;
                        global_max_row = row_idx + 1;
                        global_max_col = col;
                    }
                }
            }

            // Steering decision for a future row: where does this row's peak
            // sit relative to the band center?
            let peak_col = row.h.iter().enumerate().max_by_key(|&(_, &v)| v).map_or(BAND_WIDTH / 2, |(c, _)| c);
            let bias = peak_col as i32 - (BAND_WIDTH / 2) as i32;
            drift += bias.signum();
            let next_shift = if drift.abs() >= HYST_STAGES {
                let s = drift.signum() * drift.abs().min(MAX_RANGE);
                drift = 0;
                s
            } else {
                0
            };
            pending_shifts[(row_idx + 1) % STEERING_DELAY] = next_shift;

            rows.push(row);
        }

        if global_max == 0 {
            return None;
        }

        let cigar = self.traceback(&rows, global_max_row, global_max_col);
        let query_start = self.first_consumed_query_offset(&rows, global_max_row, global_max_col);
        let reference_start = (rows[query_start].band_start
            + self.first_consumed_ref_col(&rows, global_max_row, global_max_col) as i64)
            .max(0) as usize;

        Some(WavefrontAlignment {
            score: global_max,
            cigar,
            reference_start,
            query_start,
        })
    }

    fn first_consumed_ref_col(&self, rows: &[Row], mut row_idx: usize, mut col: usize) -> usize {
        let start_col = col;
        while row_idx > 0 && rows[row_idx].trace[col] != TraceDir::None {
            match rows[row_idx].trace[col] {
                TraceDir::Diag => {
                    let ref_index = rows[row_idx].band_start + col as i64;
                    row_idx -= 1;
                    col = (ref_index - 1 - rows[row_idx].band_start).max(0) as usize;
                }
                TraceDir::Up => {
                    let ref_index = rows[row_idx].band_start + col as i64;
                    row_idx -= 1;
                    col = (ref_index - rows[row_idx].band_start).max(0) as usize;
                }
                TraceDir::Left => {
                    if col == 0 {
                        break;
                    }
                    col -= 1;
                }
                TraceDir::None => break,
            }
        }
        let _ = start_col;
        col
    }

    fn first_consumed_query_offset(&self, rows: &[Row], mut row_idx: usize, mut col: usize) -> usize {
        while row_idx > 0 && rows[row_idx].trace[col] != TraceDir::None {
            match rows[row_idx].trace[col] {
                TraceDir::Diag => {
                    let ref_index = rows[row_idx].band_start + col as i64;
                    row_idx -= 1;
                    col = (ref_index - 1 - rows[row_idx].band_start).max(0) as usize;
                }
                TraceDir::Up => {
                    let ref_index = rows[row_idx].band_start + col as i64;
                    row_idx -= 1;
                    col = (ref_index - rows[row_idx].band_start).max(0) as usize;
                }
                TraceDir::Left => {
                    if col == 0 {
                        break;
                    }
                    col -= 1;
                }
                TraceDir::None => break,
            }
        }
        row_idx
    }

    fn traceback(&self, rows: &[Row], mut row_idx: usize, mut col: usize) -> Cigar {
        let mut ops: Vec<(CigarOp, u32)> = Vec::new();

        while row_idx > 0 {
            let dir = rows[row_idx].trace[col];
            if dir == TraceDir::None {
                break;
            }
            let ref_index = rows[row_idx].band_start + col as i64;
            match dir {
                TraceDir::Diag => {
                    ops.push((CigarOp::Match, 1));
                    row_idx -= 1;
                    col = (ref_index - 1 - rows[row_idx].band_start).max(0) as usize;
                }
                TraceDir::Up => {
                    ops.push((CigarOp::Insertion, 1));
                    row_idx -= 1;
                    col = (ref_index - rows[row_idx].band_start).max(0) as usize;
                }
                TraceDir::Left => {
                    ops.push((CigarOp::Deletion, 1));
                    if col == 0 {
                        break;
                    }
                    col -= 1;
                }
                TraceDir::None => break,
            }
        }

        ops.reverse();
        let mut cigar = Cigar::default();
        for (op, len) in ops {
            let _ = cigar.push(op, len);
        }
        cigar
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::base::encode_sequence;

    #[test]
    fn identical_sequences_align_with_all_matches() {
        let scoring = ScoringScheme::default();
        let aligner = WavefrontAligner::new(scoring);
        let seq = encode_sequence(b"ACGTACGTACGTACGT");
        let result = aligner.align(&seq, &seq, 0).expect("expected an alignment");
        assert_eq!(result.cigar.to_sam_string(), "16M");
        // Full-length match ends in the bottom row, so the global max carries
        // one unclip bonus on top of the 16 per-base matches.
        assert_eq!(result.score, 16 + scoring.unclip_score);
    }

    #[test]
    fn single_mismatch_is_scored_below_perfect_match() {
        let aligner = WavefrontAligner::new(ScoringScheme::default());
        let reference = encode_sequence(b"ACGTACGTACGTACGT");
        let mut query = reference.clone();
        query[8] = crate::mapping::base::encode_base(b'T');
        let perfect = aligner.align(&reference, &reference, 0).unwrap();
        let mismatched = aligner.align(&query, &reference, 0).unwrap();
        assert!(mismatched.score < perfect.score);
    }

    #[test]
    fn unrelated_sequences_find_no_alignment() {
        let aligner = WavefrontAligner::new(ScoringScheme::default());
        let query = encode_sequence(b"AAAAAAAAAAAAAAAA");
        let reference = encode_sequence(b"CCCCCCCCCCCCCCCC");
        assert!(aligner.align(&query, &reference, 0).is_none());
    }

    #[test]
    fn n_bases_score_as_n_not_as_a_match() {
        let aligner = WavefrontAligner::new(ScoringScheme::default());
        let reference = encode_sequence(b"ACGTACGTACGTACGT");
        let mut query = reference.clone();
        query[8] = crate::mapping::base::encode_base(b'N');
        let clean = aligner.align(&reference, &reference, 0).unwrap();
        let with_n = aligner.align(&query, &reference, 0).unwrap();
        assert!(with_n.score < clean.score);
    }

    #[test]
    fn single_base_deletion_is_recovered() {
        let aligner = WavefrontAligner::new(ScoringScheme::default());
        let reference = encode_sequence(b"ACGTACGTTTACGTACGT");
        let query = encode_sequence(b"ACGTACGTACGTACGT");
        let result = aligner.align(&query, &reference, 0).expect("expected an alignment");
        assert!(result.score > 0);
    }
}
