//! Seed mapping: composes hash-table probes with seed extension and interval
//! sampling into a list of seed positions per read (spec §4.1).

use crate::mapping::{
    base::{BASE_N, Read},
    crc32c,
    hash::CrcHasher,
    hashtable::{HashTable, ProbeResult, sample_interval, seed_state_k_sample, seed_state_one_sample},
    seed::{Orientation, Seed},
};

/// Tunables for seed placement and extension, bound to one hash-table config
/// (spec §4.1 "Input").
#[derive(Debug, Clone)]
pub struct MapperConfig {
    pub primary_seed_length: usize,
    pub seed_period: usize,
    /// Bit `i` set means offsets with `offset % seed_period == i` are placed.
    pub seed_pattern: u64,
    pub force_last_n: usize,
    pub max_seed_freq: u32,
    pub target_seed_freq: usize,
    pub max_extension_steps: u32,
}

impl Default for MapperConfig {
    fn default() -> Self {
        Self {
            primary_seed_length: 21,
            seed_period: 1,
            seed_pattern: 1,
            force_last_n: 1,
            max_seed_freq: 16,
            target_seed_freq: 5,
            max_extension_steps: 4,
        }
    }
}

/// One resolved seed hit, consumed by the chain builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeedPosition {
    pub read_offset: usize,
    pub seed_length: usize,
    pub reference_position: u64,
    pub orientation: Orientation,
    pub half_extension: usize,
    pub is_random_sample: bool,
}

/// Tracks the single best interval candidate seen across a read's placements
/// (spec §4.1 "Global best interval tracking"), prioritized by (length,
/// seed length, extension depth).
#[derive(Debug, Clone, Copy)]
struct BestInterval {
    start: u32,
    length: u32,
    read_offset: usize,
    seed_length: usize,
    half_extension: usize,
    orientation: Orientation,
}

impl BestInterval {
    fn priority(&self) -> (u32, usize, usize) {
        (self.length, self.seed_length, self.half_extension)
    }
}

pub struct Mapper<'t> {
    config: MapperConfig,
    primary_hasher: CrcHasher,
    secondary_hasher: CrcHasher,
    table: &'t HashTable,
}

/// Packs 4-bit codes two-per-byte, little nibble first, for use as CRC hash
/// input (the hasher operates on bytes, not nibbles).
fn pack_nibbles(codes: &[u8]) -> Vec<u8> {
    codes
        .chunks(2)
        .map(|pair| pair[0] | (pair.get(1).copied().unwrap_or(0) << 4))
        .collect()
}

impl<'t> Mapper<'t> {
    #[must_use]
    pub fn new(config: MapperConfig, primary_hasher: CrcHasher, secondary_hasher: CrcHasher, table: &'t HashTable) -> Self {
        Self {
            config,
            primary_hasher,
            secondary_hasher,
            table,
        }
    }

    /// Enumerates seed placement offsets per spec §4.1 "Seed placement".
    fn placements(&self, read: &Read) -> Vec<usize> {
        let k = self.config.primary_seed_length;
        let len = read.len();
        if len < k {
            return Vec::new();
        }

        let mut offsets: Vec<usize> = (0..=len - k)
            .filter(|&o| {
                let bit = (o % self.config.seed_period.max(1)) as u32;
                (self.config.seed_pattern >> bit) & 1 != 0
            })
            .filter(|&o| !read.bases()[o..o + k].contains(&BASE_N))
            .collect();

        if self.config.force_last_n > 0 && len >= k {
            let last_start = len - k;
            for back in 0..self.config.force_last_n {
                if back > last_start {
                    break;
                }
                let o = last_start - back;
                if !read.bases()[o..o + k].contains(&BASE_N) && !offsets.contains(&o) {
                    offsets.push(o);
                }
            }
        }

        offsets.sort_unstable();
        offsets.dedup();
        offsets
    }

    /// Maps every valid seed placement in `read` to its resolved positions.
    #[must_use]
    pub fn map(&self, read: &Read) -> Vec<SeedPosition> {
        let mut out = Vec::new();
        let mut best: Option<BestInterval> = None;

        for offset in self.placements(read) {
            let seed = Seed::new(read, offset, self.config.primary_seed_length);
            let (word, orientation) = seed.canonical_word();
            let hash = self.primary_hasher.hash64(&pack_nibbles(&word));

            self.resolve(read, &seed, hash, orientation, 0, 0, &mut out, &mut best);
        }

        if let Some(best) = best
            && !out.iter().any(|p| !p.is_random_sample)
        {
            out.extend(self.sample_from_best(read, best));
        }

        out
    }

    #[allow(clippy::too_many_arguments)]
    fn resolve(
        &self, read: &Read, seed: &Seed, hash: u64, orientation: Orientation, half_extension: usize, depth: u32,
        out: &mut Vec<SeedPosition>, best: &mut Option<BestInterval>,
    ) {
        if depth > self.config.max_extension_steps {
            return;
        }

        match self.table.probe(hash) {
            ProbeResult::Empty => {}
            ProbeResult::Hits(hits) => {
                for (position, reverse_complement) in hits {
                    let final_orientation = if reverse_complement { orientation.flip() } else { orientation };
                    out.push(SeedPosition {
                        read_offset: seed.offset(),
                        seed_length: seed.length(),
                        reference_position: position,
                        orientation: final_orientation,
                        half_extension,
                        is_random_sample: false,
                    });
                }
            }
            ProbeResult::Extend { ext_len, ext_id } => {
                let half = ext_len as usize / 2;
                if seed.offset() < half || seed.offset() + seed.length() + half > read.len() {
                    // Extension would run past the read; extension fails per spec §4.1 step 5.
                    return;
                }
                let extended = seed.extended_word(half, orientation);
                let mut key = pack_nibbles(&extended);
                key.extend_from_slice(&ext_id.to_le_bytes());
                let next_hash = self.secondary_hasher.hash64(&key);
                self.resolve(read, seed, next_hash, orientation, half, depth + 1, out, best);
            }
            ProbeResult::Interval { start, length } => {
                if length <= self.config.max_seed_freq && length > 0 {
                    for (position, reverse_complement) in self.table.extend_table_slice(start, length) {
                        let final_orientation = if reverse_complement { orientation.flip() } else { orientation };
                        out.push(SeedPosition {
                            read_offset: seed.offset(),
                            seed_length: seed.length(),
                            reference_position: position,
                            orientation: final_orientation,
                            half_extension,
                            is_random_sample: false,
                        });
                    }
                } else if length > 0 {
                    let candidate = BestInterval {
                        start,
                        length,
                        read_offset: seed.offset(),
                        seed_length: seed.length(),
                        half_extension,
                        orientation,
                    };
                    if best.is_none_or(|b| candidate.priority() > b.priority()) {
                        *best = Some(candidate);
                    }

                    let state = seed_state_one_sample(read.name(), read.position_in_template(), seed.offset() as u32);
                    let sampled = sample_interval(state, length, self.config.target_seed_freq, |_| false, |_| false);
                    for idx in sampled {
                        if let Some(&(position, reverse_complement)) =
                            self.table.extend_table_slice(start, length).get(idx as usize)
                        {
                            let final_orientation = if reverse_complement { orientation.flip() } else { orientation };
                            out.push(SeedPosition {
                                read_offset: seed.offset(),
                                seed_length: seed.length(),
                                reference_position: position,
                                orientation: final_orientation,
                                half_extension,
                                is_random_sample: true,
                            });
                        }
                    }
                }
            }
        }
    }

    /// Draws up to `target_seed_freq` random samples from the globally-best
    /// interval candidate, marking the resulting positions as samples (spec
    /// §4.1 "Global best interval tracking").
    fn sample_from_best(&self, read: &Read, best: BestInterval) -> Vec<SeedPosition> {
        let state = seed_state_k_sample(read.name(), read.position_in_template());
        let hits = self.table.extend_table_slice(best.start, best.length);
        sample_interval(state, best.length, self.config.target_seed_freq, |_| false, |_| false)
            .into_iter()
            .filter_map(|idx| hits.get(idx as usize).copied())
            .map(|(position, reverse_complement)| SeedPosition {
                read_offset: best.read_offset,
                seed_length: best.seed_length,
                reference_position: position,
                orientation: if reverse_complement { best.orientation.flip() } else { best.orientation },
                half_extension: best.half_extension,
                is_random_sample: true,
            })
            .collect()
    }
}

/// Exposed for `mapping::chain`'s diagonal computation: `d = refPos - readOffset`.
#[inline]
#[must_use]
pub fn diagonal(reference_position: u64, read_offset: usize) -> i64 {
    reference_position as i64 - read_offset as i64
}

/// Used by deterministic-sampling tests downstream to confirm the CRC stream
/// is exercised consistently between `mapper` and `hashtable`.
#[must_use]
pub fn debug_interval_digest(read_name: &[u8]) -> u32 {
    crc32c::hash(0, read_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::hash::{default_primary_polynomial, default_secondary_polynomial};

    fn build_read(seq: &[u8]) -> Read {
        Read::new(b"read1", seq, &vec![30u8; seq.len()], 0, 0)
    }

    #[test]
    fn unique_seed_is_found_via_direct_hit() {
        let mut table = HashTable::new(10);
        let primary = CrcHasher::new(default_primary_polynomial());
        let secondary = CrcHasher::new(default_secondary_polynomial());

        let read = build_read(b"ACGTACGTACGTACGTACGTA"); // 21 bases
        let seed = Seed::new(&read, 0, 21);
        let (word, _) = seed.canonical_word();
        let hash = primary.hash64(&pack_nibbles(&word));
        table.insert_hit(hash, 1000, false);

        let mapper = Mapper::new(MapperConfig::default(), primary, secondary, &table);
        let positions = mapper.map(&read);
        assert!(positions.iter().any(|p| p.reference_position == 1000));
    }

    #[test]
    fn empty_table_yields_no_positions() {
        let table = HashTable::new(10);
        let primary = CrcHasher::new(default_primary_polynomial());
        let secondary = CrcHasher::new(default_secondary_polynomial());
        let read = build_read(b"ACGTACGTACGTACGTACGTA");
        let mapper = Mapper::new(MapperConfig::default(), primary, secondary, &table);
        assert!(mapper.map(&read).is_empty());
    }

    #[test]
    fn short_read_has_no_placements() {
        let table = HashTable::new(10);
        let primary = CrcHasher::new(default_primary_polynomial());
        let secondary = CrcHasher::new(default_secondary_polynomial());
        let read = build_read(b"ACGT");
        let mapper = Mapper::new(MapperConfig::default(), primary, secondary, &table);
        assert!(mapper.map(&read).is_empty());
    }
}
