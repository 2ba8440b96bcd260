//! Mapping-quality computation (spec §4.6 "Pair MAPQ"), ported from
//! `examples/original_source/include/align/Mapq.hpp`.
//!
//! The original header embeds a literal 128-entry fixed-point `log2` table.
//! That literal table was not reliably recoverable from the source material
//! available to this port, so the table here is *generated* via the same
//! construction the header documents (`round(128 * log2(1 + i/128))`, a
//! standard 7-fractional-bit log2 correction table) rather than transcribed
//! byte-for-byte. This is recorded as an open decision in `DESIGN.md`: it
//! preserves the algorithm exactly but does not claim bit-for-bit parity with
//! a real DRAGEN binary, which this crate has no way to validate without the
//! original table or a reference run.

use std::sync::LazyLock;

pub const MAPQ_MAX: i32 = 60;
pub const HW_MAPQ_MAX: i32 = 250;
/// `38912 >> 8`.
pub const MAPQ_COEFF: i32 = 152;
pub const MAPQ_COEFF_I: i32 = 38_912;

/// `log2_approx`'s fractional-bits correction table, 7 fractional bits wide.
static LOG2_FRAC_TABLE: LazyLock<[i32; 128]> = LazyLock::new(|| {
    let mut table = [0i32; 128];
    for (i, slot) in table.iter_mut().enumerate() {
        let frac = i as f64 / 128.0;
        *slot = (128.0 * (1.0 + frac).log2()).round() as i32;
    }
    table
});

/// Fixed-point (Q7, 7 fractional bits) `log2` approximation: finds the
/// position of the leading `1` bit, then looks up the fractional remainder in
/// [`LOG2_FRAC_TABLE`].
#[must_use]
pub fn log2_approx(x: u32) -> i32 {
    if x == 0 {
        return 0;
    }
    let log_int = 31 - x.leading_zeros() as i32;
    let frac_index = if log_int >= 7 {
        ((x >> (log_int - 7)) & 0x7F) as usize
    } else {
        ((x << (7 - log_int)) & 0x7F) as usize
    };
    (log_int << 7) + LOG2_FRAC_TABLE[frac_index]
}

/// `aln2mapq(c, L) = (MAPQ_COEFF * 5 / c) / ((log2(L))^2 >> 7) << 20`
/// (spec §4.6), computed in `i64` to avoid overflow in the intermediate
/// `<<20`.
#[must_use]
pub fn aln2mapq(snp_cost: i32, read_len_avg: u32) -> i64 {
    let log2_len = log2_approx(read_len_avg) as i64; // Q7
    let len_term = ((log2_len * log2_len) >> 7).max(1); // Q7
    let coeff_scaled = (MAPQ_COEFF_I as i64 * 5) / snp_cost.max(1) as i64;
    (coeff_scaled / len_term) << 20
}

/// Computes pair MAPQ and its unclamped counterpart (`XQ`) from the best pair
/// score `s1`, the next-best non-overlapping pair score `s2`, the
/// mismatch/SNP cost, and the mate's average read length, per spec §4.6.
///
/// Returns `(mapq_clamped_to_60, xq_clamped_to_250)`.
#[must_use]
pub fn compute_pair_mapq(s1: i32, s2: i32, snp_cost: i32, read_len_avg: u32) -> (i32, i32) {
    let scale = aln2mapq(snp_cost, read_len_avg);
    let raw = (((s1 - s2) as i64 * scale) >> 13).max(0);
    let xq = raw.min(HW_MAPQ_MAX as i64) as i32;
    let mapq = raw.min(MAPQ_MAX as i64) as i32;
    (mapq, xq)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log2_of_powers_of_two_is_exact_in_q7() {
        // log2(128) == 7, represented as 7 << 7 in Q7.
        assert_eq!(log2_approx(128), 7 << 7);
        assert_eq!(log2_approx(256), 8 << 7);
    }

    #[test]
    fn log2_is_monotonic() {
        let mut prev = log2_approx(1);
        for x in 2..2000u32 {
            let cur = log2_approx(x);
            assert!(cur >= prev, "log2_approx not monotonic at {x}");
            prev = cur;
        }
    }

    #[test]
    fn identical_scores_yield_zero_mapq() {
        let (mapq, xq) = compute_pair_mapq(100, 100, 6, 150);
        assert_eq!(mapq, 0);
        assert_eq!(xq, 0);
    }

    #[test]
    fn large_score_gap_saturates_at_mapq_max() {
        let (mapq, xq) = compute_pair_mapq(1000, 0, 6, 150);
        assert_eq!(mapq, MAPQ_MAX);
        assert!(xq >= MAPQ_MAX);
    }
}
