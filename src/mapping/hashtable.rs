//! Hash-table record model, bucket probing, and deterministic interval
//! sampling (spec §3 "Hash-table records", §4.1 "Interval expansion" and
//! "Interval sampling").
//!
//! Construction of the table from a reference FASTA and its concrete on-disk
//! layout are explicitly out of scope (spec §1); this module only implements
//! the consumer-facing probe contract, backed here by a plain in-memory
//! open-addressed table suitable for tests and for a mapper fed by something
//! other than a real DRAGEN reference directory.

use crate::mapping::crc32c;

/// One 8-byte hash-table record, decoded into a tagged union.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Record {
    /// An unused slot; probing stops here.
    Empty,
    /// Deprecated high-frequency marker; treated as interval sampling with a
    /// fixed `K` per spec §9's minimal-implementation allowance.
    HiFreq { digest_tag: u16 },
    /// Probe again with a longer seed: `ext_len` flanking bases are added on
    /// each side, `ext_id` folds into the next hash's input.
    Extend { digest_tag: u16, ext_len: u8, ext_id: u32 },
    /// Bucket-chaining metadata: continue probing at `next_bucket`.
    Chain { next_bucket: u32 },
    /// Start of an extend-table interval (combined with a following
    /// [`Record::IntervalLength`] or used alone when `SLE`-encoded).
    IntervalStart { start: u32 },
    /// Length of an extend-table interval.
    IntervalLength { length: u16 },
    /// Start and length encoded together (`SL`/`SLE` forms collapse to this
    /// once decoded).
    IntervalStartLength { start: u32, length: u16 },
    /// A concrete reference hit.
    Hit {
        position: u64,
        reverse_complement: bool,
        digest_tag: u16,
    },
}

const TAG_EMPTY: u64 = 0;
const TAG_HIFREQ: u64 = 1;
const TAG_EXTEND: u64 = 2;
const TAG_CHAIN: u64 = 3;
const TAG_INTERVAL_START: u64 = 4;
const TAG_INTERVAL_LENGTH: u64 = 5;
const TAG_INTERVAL_SL: u64 = 6;
const TAG_HIT: u64 = 7;

impl Record {
    /// Packs this record into its 8-byte wire form: bits[0..3) are the tag,
    /// the remaining 61 bits are tag-specific payload.
    #[must_use]
    pub fn encode(self) -> u64 {
        match self {
            Record::Empty => TAG_EMPTY,
            Record::HiFreq { digest_tag } => TAG_HIFREQ | ((digest_tag as u64) << 3),
            Record::Extend {
                digest_tag,
                ext_len,
                ext_id,
            } => TAG_EXTEND | ((digest_tag as u64) << 3) | ((ext_len as u64) << 19) | ((ext_id as u64) << 27),
            Record::Chain { next_bucket } => TAG_CHAIN | ((next_bucket as u64) << 3),
            Record::IntervalStart { start } => TAG_INTERVAL_START | ((start as u64) << 3),
            Record::IntervalLength { length } => TAG_INTERVAL_LENGTH | ((length as u64) << 3),
            Record::IntervalStartLength { start, length } => {
                TAG_INTERVAL_SL | ((start as u64) << 3) | ((length as u64) << 35)
            }
            Record::Hit {
                position,
                reverse_complement,
                digest_tag,
            } => TAG_HIT | ((position & 0xFF_FFFF_FFFF) << 3) | ((reverse_complement as u64) << 43) | ((digest_tag as u64) << 44),
        }
    }

    /// Decodes an 8-byte wire record.
    #[must_use]
    pub fn decode(raw: u64) -> Self {
        match raw & 0x7 {
            TAG_EMPTY => Record::Empty,
            TAG_HIFREQ => Record::HiFreq {
                digest_tag: (raw >> 3) as u16,
            },
            TAG_EXTEND => Record::Extend {
                digest_tag: ((raw >> 3) & 0xFFFF) as u16,
                ext_len: ((raw >> 19) & 0xFF) as u8,
                ext_id: (raw >> 27) as u32,
            },
            TAG_CHAIN => Record::Chain {
                next_bucket: (raw >> 3) as u32,
            },
            TAG_INTERVAL_START => Record::IntervalStart { start: (raw >> 3) as u32 },
            TAG_INTERVAL_LENGTH => Record::IntervalLength {
                length: (raw >> 3) as u16,
            },
            TAG_INTERVAL_SL => Record::IntervalStartLength {
                start: ((raw >> 3) & 0xFFFF_FFFF) as u32,
                length: (raw >> 35) as u16,
            },
            TAG_HIT => Record::Hit {
                position: (raw >> 3) & 0xFF_FFFF_FFFF,
                reverse_complement: (raw >> 43) & 1 != 0,
                digest_tag: (raw >> 44) as u16,
            },
            _ => Record::Empty,
        }
    }
}

/// An open-addressed table of 64-byte (8-record) buckets.
pub struct HashTable {
    buckets: Vec<[u64; 8]>,
    extend_table: Vec<u64>,
    address_bits: u32,
}

/// The outcome of probing one bucket chain for a hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeResult {
    Empty,
    Hits(Vec<(u64, bool)>),
    Extend { ext_len: u8, ext_id: u32 },
    Interval { start: u32, length: u32 },
}

impl HashTable {
    /// Builds an empty table with `2^address_bits` buckets.
    #[must_use]
    pub fn new(address_bits: u32) -> Self {
        Self {
            buckets: vec![[Record::Empty.encode(); 8]; 1usize << address_bits],
            extend_table: Vec::new(),
            address_bits,
        }
    }

    #[must_use]
    pub fn address_bits(&self) -> u32 {
        self.address_bits
    }

    fn bucket_index(&self, hash: u64) -> usize {
        (hash >> (64 - self.address_bits)) as usize % self.buckets.len()
    }

    /// Digest tag used to discriminate collisions within a bucket (the
    /// highest bits after the address segment).
    fn digest_tag(&self, hash: u64) -> u16 {
        ((hash >> (64 - self.address_bits - 16)) & 0xFFFF) as u16
    }

    /// Inserts a concrete hit record at the given hash's bucket. Intended for
    /// tests and for feeding a mapper without a real reference directory;
    /// returns `false` if the bucket chain is full.
    pub fn insert_hit(&mut self, hash: u64, position: u64, reverse_complement: bool) -> bool {
        let idx = self.bucket_index(hash);
        let tag = self.digest_tag(hash);
        let bucket = &mut self.buckets[idx];
        for slot in bucket.iter_mut() {
            if Record::decode(*slot) == Record::Empty {
                *slot = Record::Hit {
                    position,
                    reverse_complement,
                    digest_tag: tag,
                }
                .encode();
                return true;
            }
        }
        false
    }

    pub fn insert_extend(&mut self, hash: u64, ext_len: u8, ext_id: u32) -> bool {
        let idx = self.bucket_index(hash);
        let tag = self.digest_tag(hash);
        let bucket = &mut self.buckets[idx];
        for slot in bucket.iter_mut() {
            if Record::decode(*slot) == Record::Empty {
                *slot = Record::Extend {
                    digest_tag: tag,
                    ext_len,
                    ext_id,
                }
                .encode();
                return true;
            }
        }
        false
    }

    /// Appends hit records to the extend table and inserts an interval
    /// pointer at `hash`'s bucket.
    pub fn insert_interval(&mut self, hash: u64, hits: &[(u64, bool)]) -> bool {
        let start = self.extend_table.len() as u32;
        for &(position, rc) in hits {
            self.extend_table.push(
                Record::Hit {
                    position,
                    reverse_complement: rc,
                    digest_tag: 0,
                }
                .encode(),
            );
        }
        let idx = self.bucket_index(hash);
        let bucket = &mut self.buckets[idx];
        for slot in bucket.iter_mut() {
            if Record::decode(*slot) == Record::Empty {
                *slot = Record::IntervalStartLength {
                    start,
                    length: hits.len() as u16,
                }
                .encode();
                return true;
            }
        }
        false
    }

    /// Scans the bucket chain for `hash`, per spec §4.1 primary-probe step 3:
    /// returns hits if a matching digest tag is found, an [`ProbeResult::Extend`]
    /// if extension is required, an interval if one is present, or
    /// [`ProbeResult::Empty`] once an empty slot is reached.
    #[must_use]
    pub fn probe(&self, hash: u64) -> ProbeResult {
        let idx = self.bucket_index(hash);
        let tag = self.digest_tag(hash);
        let mut hits = Vec::new();

        for &slot in &self.buckets[idx] {
            match Record::decode(slot) {
                Record::Empty => break,
                Record::Hit {
                    position,
                    reverse_complement,
                    digest_tag,
                } if digest_tag == tag => hits.push((position, reverse_complement)),
                Record::Extend { digest_tag, ext_len, ext_id } if digest_tag == tag => {
                    return ProbeResult::Extend { ext_len, ext_id };
                }
                Record::IntervalStartLength { start, length } => {
                    return ProbeResult::Interval {
                        start,
                        length: length as u32,
                    };
                }
                Record::HiFreq { digest_tag } if digest_tag == tag => {
                    // Minimal HIFREQ handling per spec §9: treat as an
                    // interval of length 0 so callers fall through to the
                    // sampling path with K = hiFreqRandHit.
                    return ProbeResult::Interval { start: 0, length: 0 };
                }
                _ => {}
            }
        }

        if hits.is_empty() { ProbeResult::Empty } else { ProbeResult::Hits(hits) }
    }

    /// Reads `length` consecutive hit records from the extend table starting
    /// at `start`.
    #[must_use]
    pub fn extend_table_slice(&self, start: u32, length: u32) -> Vec<(u64, bool)> {
        self.extend_table[start as usize..(start + length) as usize]
            .iter()
            .map(|&raw| match Record::decode(raw) {
                Record::Hit {
                    position,
                    reverse_complement,
                    ..
                } => (position, reverse_complement),
                _ => (0, false),
            })
            .collect()
    }
}

/// Computes the deterministic seed state `S` for 1-sample mode (used after a
/// failed extension), per spec §4.1.
#[must_use]
pub fn seed_state_one_sample(read_name: &[u8], read_pos_in_template: u8, seed_read_offset: u32) -> u32 {
    let name_hash = crc32c::hash(0, read_name);
    (name_hash.wrapping_add((read_pos_in_template as u32) << 31)) | (1 << 30) | (seed_read_offset & 0x3FFF_FFFF)
}

/// Computes the deterministic seed state `S` for K-sample mode (extra
/// interval), per spec §4.1.
#[must_use]
pub fn seed_state_k_sample(read_name: &[u8], read_pos_in_template: u8) -> u32 {
    crc32c::hash(0, read_name) ^ ((read_pos_in_template as u32) << 31)
}

const MAX_SAMPLE_ROUNDS: u32 = 1 << 14;
const HIT_BITSET_BITS: usize = 1 << 14;

/// Samples up to `k` positions from a `(start, length)` interval using the
/// CRC32C stream described in spec §4.1, rejecting positions that are
/// already fetched or ALT-incompatible, and de-duplicating via a 14-bit hit
/// bitset keyed on `seed_state + idx`.
pub fn sample_interval(
    seed_state: u32, length: u32, k: usize, mut already_fetched: impl FnMut(u32) -> bool,
    mut alt_incompatible: impl FnMut(u32) -> bool,
) -> Vec<u32> {
    if length == 0 || k == 0 {
        return Vec::new();
    }

    let mut hit_bitset = vec![false; HIT_BITSET_BITS];
    let mut accepted = Vec::with_capacity(k);
    let mut state = seed_state;

    for x in 0..MAX_SAMPLE_ROUNDS {
        state = crc32c::hash(state, &x.to_le_bytes());
        let idx = ((length as u64 * state as u64) >> 32) as u32;

        if already_fetched(idx) || alt_incompatible(idx) {
            continue;
        }

        let key = crc32c::hash(0, &seed_state.wrapping_add(idx).to_le_bytes()) as usize % HIT_BITSET_BITS;
        if hit_bitset[key] {
            continue;
        }
        hit_bitset[key] = true;

        accepted.push(idx);
        if accepted.len() >= k {
            break;
        }
    }

    accepted
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_roundtrips() {
        let records = [
            Record::Empty,
            Record::HiFreq { digest_tag: 0x1234 },
            Record::Extend {
                digest_tag: 0xABCD,
                ext_len: 12,
                ext_id: 99,
            },
            Record::Chain { next_bucket: 777 },
            Record::IntervalStartLength { start: 4096, length: 300 },
            Record::Hit {
                position: 0xABCDEF,
                reverse_complement: true,
                digest_tag: 0x55,
            },
        ];
        for record in records {
            assert_eq!(Record::decode(record.encode()), record);
        }
    }

    #[test]
    fn probe_returns_empty_for_untouched_bucket() {
        let table = HashTable::new(8);
        assert_eq!(table.probe(0x1234_5678_9ABC_DEF0), ProbeResult::Empty);
    }

    #[test]
    fn probe_finds_inserted_hit() {
        let mut table = HashTable::new(8);
        let hash = 0x1111_2222_3333_4444;
        table.insert_hit(hash, 500, false);
        assert_eq!(table.probe(hash), ProbeResult::Hits(vec![(500, false)]));
    }

    #[test]
    fn probe_returns_extend_record() {
        let mut table = HashTable::new(8);
        let hash = 0xAAAA_BBBB_CCCC_DDDD;
        table.insert_extend(hash, 10, 42);
        assert_eq!(table.probe(hash), ProbeResult::Extend { ext_len: 10, ext_id: 42 });
    }

    #[test]
    fn probe_resolves_interval_and_extend_table() {
        let mut table = HashTable::new(8);
        let hash = 0x5555_6666_7777_8888;
        let hits = vec![(10, false), (20, true), (30, false)];
        table.insert_interval(hash, &hits);
        let ProbeResult::Interval { start, length } = table.probe(hash) else {
            panic!("expected interval");
        };
        assert_eq!(table.extend_table_slice(start, length), hits);
    }

    #[test]
    fn interval_sampling_is_deterministic() {
        let s = seed_state_k_sample(b"read-42", 0);
        let a = sample_interval(s, 1_000_000, 5, |_| false, |_| false);
        let b = sample_interval(s, 1_000_000, 5, |_| false, |_| false);
        assert_eq!(a, b);
        assert_eq!(a.len(), 5);
    }

    #[test]
    fn interval_sampling_respects_rejection_predicates() {
        let s = seed_state_k_sample(b"read-1", 1);
        let sampled = sample_interval(s, 1_000, 3, |_| true, |_| false);
        assert!(sampled.is_empty());
    }
}
