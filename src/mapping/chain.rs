//! Chain building: groups seed positions into diagonal-coherent chains per
//! orientation, then filters dominated chains (spec §4.2).

use crate::mapping::{mapper::SeedPosition, seed::Orientation};

/// Base diagonal tolerance (in reference bases) before accounting for
/// extension; grows with `half_extension` to absorb indels near extended
/// seeds, per spec §4.2.
const DIAGONAL_TOLERANCE_BASE: i64 = 2;
const DIAGONAL_TOLERANCE_PER_EXTENSION: i64 = 2;

/// How much longer a dominating chain's covered length must be, relative to
/// the dominated chain, to filter it (spec §4.2).
const FILTER_LEN_RATIO: f64 = 1.5;

/// Diagonals within this many bases are considered "close enough" for the
/// dominance check (a looser bound than the chain-membership tolerance).
const DOMINANCE_DIAGONAL_TOLERANCE: i64 = 4;

#[derive(Debug, Clone)]
pub struct Chain {
    pub orientation: Orientation,
    pub diagonal: i64,
    pub positions: Vec<SeedPosition>,
    pub filtered: bool,
    pub perfect: bool,
    pub only_random_samples: bool,
    pub extra: bool,
}

impl Chain {
    fn new(position: SeedPosition, orientation: Orientation) -> Self {
        let diagonal = crate::mapping::mapper::diagonal(position.reference_position, position.read_offset);
        let perfect = position.half_extension == 0 && !position.is_random_sample;
        let only_random_samples = position.is_random_sample;
        Self {
            orientation,
            diagonal,
            positions: vec![position],
            filtered: false,
            perfect,
            only_random_samples,
            extra: false,
        }
    }

    fn tolerance_for(position: &SeedPosition) -> i64 {
        DIAGONAL_TOLERANCE_BASE + DIAGONAL_TOLERANCE_PER_EXTENSION * position.half_extension as i64
    }

    fn accepts(&self, position: &SeedPosition) -> bool {
        let candidate_diagonal = crate::mapping::mapper::diagonal(position.reference_position, position.read_offset);
        let tolerance = Self::tolerance_for(position).max(DIAGONAL_TOLERANCE_BASE);
        (candidate_diagonal - self.diagonal).abs() <= tolerance && self.last_read_offset() < position.read_offset
    }

    fn push(&mut self, position: SeedPosition) {
        if self.positions.len() == 1 {
            // A chain stops being trivially "perfect" the moment it grows
            // past its founding seed.
            self.perfect = false;
        }
        self.only_random_samples &= position.is_random_sample;
        self.positions.push(position);
    }

    fn last_read_offset(&self) -> usize {
        self.positions.last().map_or(0, |p| p.read_offset)
    }

    fn read_offset_span(&self) -> (usize, usize) {
        let first = self.positions.first().map_or(0, |p| p.read_offset);
        let last = self
            .positions
            .last()
            .map_or(0, |p| p.read_offset + p.seed_length);
        (first, last)
    }

    /// The covered read length: the union span from the first seed's start to
    /// the last seed's end.
    #[must_use]
    pub fn covered_len(&self) -> usize {
        let (first, last) = self.read_offset_span();
        last.saturating_sub(first)
    }
}

/// Builds chains for one read, grouping seed positions by orientation.
#[derive(Default)]
pub struct ChainBuilder {
    forward: Vec<Chain>,
    reverse: Vec<Chain>,
}

impl ChainBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a seed position, chosen into an existing compatible chain or
    /// starting a new one (spec §4.2).
    pub fn insert(&mut self, position: SeedPosition) {
        let chains = match position.orientation {
            Orientation::Forward => &mut self.forward,
            Orientation::ReverseComplement => &mut self.reverse,
        };

        if let Some(chain) = chains.iter_mut().find(|c| c.accepts(&position)) {
            chain.push(position);
        } else {
            chains.push(Chain::new(position, position.orientation));
        }
    }

    pub fn extend(&mut self, positions: impl IntoIterator<Item = SeedPosition>) {
        for position in positions {
            self.insert(position);
        }
    }

    /// Finalizes chain construction: sorts by decreasing covered length and
    /// applies the dominated-chain filter, per spec §4.2. Consumes the
    /// builder and returns both orientations' chains, sorted.
    #[must_use]
    pub fn finish(mut self) -> Vec<Chain> {
        self.forward.sort_by_key(|c| std::cmp::Reverse(c.covered_len()));
        self.reverse.sort_by_key(|c| std::cmp::Reverse(c.covered_len()));

        Self::filter_dominated(&mut self.forward);
        Self::filter_dominated(&mut self.reverse);

        let mut all = self.forward;
        all.extend(self.reverse);
        all
    }

    fn filter_dominated(chains: &mut [Chain]) {
        for i in 0..chains.len() {
            if chains[i].filtered {
                continue;
            }
            let (i_first, i_last) = chains[i].read_offset_span();
            let i_len = chains[i].covered_len();
            let i_diag = chains[i].diagonal;

            for j in (i + 1)..chains.len() {
                if chains[j].filtered {
                    continue;
                }
                let (j_first, j_last) = chains[j].read_offset_span();
                let j_len = chains[j].covered_len();

                let close_diagonal = (i_diag - chains[j].diagonal).abs() <= DOMINANCE_DIAGONAL_TOLERANCE;
                let contains_span = i_first <= j_first && j_last <= i_last;
                let strictly_longer = (i_len as f64) > FILTER_LEN_RATIO * (j_len as f64);

                if close_diagonal && contains_span && strictly_longer {
                    chains[j].filtered = true;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn position(read_offset: usize, reference_position: u64, seed_length: usize, half_extension: usize) -> SeedPosition {
        SeedPosition {
            read_offset,
            seed_length,
            reference_position,
            orientation: Orientation::Forward,
            half_extension,
            is_random_sample: false,
        }
    }

    #[test]
    fn colinear_positions_merge_into_one_chain() {
        let mut builder = ChainBuilder::new();
        builder.insert(position(0, 1000, 21, 0));
        builder.insert(position(21, 1021, 21, 0));
        builder.insert(position(42, 1042, 21, 0));
        let chains = builder.finish();
        assert_eq!(chains.len(), 1);
        assert_eq!(chains[0].positions.len(), 3);
    }

    #[test]
    fn divergent_diagonal_starts_new_chain() {
        let mut builder = ChainBuilder::new();
        builder.insert(position(0, 1000, 21, 0));
        builder.insert(position(21, 5000, 21, 0));
        let chains = builder.finish();
        assert_eq!(chains.len(), 2);
    }

    #[test]
    fn single_full_length_seed_is_perfect() {
        let mut builder = ChainBuilder::new();
        builder.insert(position(0, 1000, 21, 0));
        let chains = builder.finish();
        assert!(chains[0].perfect);
    }

    #[test]
    fn growing_a_chain_clears_perfect() {
        let mut builder = ChainBuilder::new();
        builder.insert(position(0, 1000, 21, 0));
        builder.insert(position(21, 1021, 21, 0));
        let chains = builder.finish();
        assert!(!chains[0].perfect);
    }

    #[test]
    fn dominated_short_chain_is_filtered() {
        let mut builder = ChainBuilder::new();
        // Long chain spanning the whole read on diagonal 1000.
        for i in 0..5 {
            builder.insert(position(i * 21, 1000 + i as u64 * 21, 21, 0));
        }
        // A short, contained chain on the same diagonal but a read offset the
        // long chain never visited (so it cannot simply merge in).
        builder.insert(position(10, 1010, 21, 0));
        let chains = builder.finish();
        assert!(chains.iter().any(|c| c.filtered));
    }
}
