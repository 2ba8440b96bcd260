//! Configurable-width CRC polynomial hashing for seed keys.
//!
//! Grounded on `examples/original_source/include/sequences/CrcPolynomial.hpp`
//! and `CrcHasher.hpp`: a polynomial of up to 128 bits, and a hasher that
//! precomputes a 256-entry table per input byte position and XOR-accumulates
//! table lookups. Hash-table *construction* (picking the real DRAGEN
//! polynomials) is out of scope (spec §1); this only needs to be internally
//! deterministic so the mapper's invariants hold across runs.

/// A CRC polynomial of configurable bit width, stored little-endian as up to
/// sixteen bytes (128 bits).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrcPolynomial {
    bit_count: u32,
    bytes: [u8; 16],
}

impl CrcPolynomial {
    /// Builds a polynomial from up to 128 bits, given as a little-endian byte
    /// array. Only the low `bit_count` bits are significant.
    #[must_use]
    pub fn new(bit_count: u32, data: &[u8]) -> Self {
        assert!(bit_count > 0 && bit_count <= 128, "bit_count out of range");
        let mut bytes = [0u8; 16];
        let len = data.len().min(16);
        bytes[..len].copy_from_slice(&data[..len]);
        Self { bit_count, bytes }
    }

    #[inline]
    #[must_use]
    pub fn bit_count(&self) -> u32 {
        self.bit_count
    }

    #[inline]
    #[must_use]
    pub fn byte_count(&self) -> usize {
        self.bit_count.div_ceil(8) as usize
    }

    #[inline]
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.bytes[..self.byte_count()]
    }

    /// As a `u64`, for polynomials of at most 64 bits (the only width the
    /// core's primary/secondary seed hashes use).
    #[inline]
    #[must_use]
    pub fn as_u64(&self) -> u64 {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(&self.bytes[..8]);
        u64::from_le_bytes(buf)
    }
}

/// A hasher bound to a [`CrcPolynomial`], exposing a 64-bit digest.
///
/// The table has one row per input byte *position* (not value) as the spec
/// requires, built by successively shifting the polynomial, so the hash
/// depends on both the byte value and its offset in the key.
pub struct CrcHasher {
    poly: CrcPolynomial,
    table: Vec<[u64; 256]>,
}

const MAX_KEY_BYTES: usize = 32;

impl CrcHasher {
    #[must_use]
    pub fn new(poly: CrcPolynomial) -> Self {
        let poly64 = poly.as_u64() & mask64(poly.bit_count());
        let mut table = Vec::with_capacity(MAX_KEY_BYTES);

        for position in 0..MAX_KEY_BYTES {
            let mut row = [0u64; 256];
            for (value, slot) in row.iter_mut().enumerate() {
                *slot = Self::crc_hash_slow(poly64, poly.bit_count(), value as u8, position);
            }
            table.push(row);
        }

        Self { poly, table }
    }

    #[inline]
    #[must_use]
    pub fn bit_count(&self) -> u32 {
        self.poly.bit_count()
    }

    /// Reference (unoptimized) byte-at-a-time CRC evaluation, used both to
    /// build the table and as ground truth in tests.
    fn crc_hash_slow(poly64: u64, bit_count: u32, byte: u8, position: usize) -> u64 {
        let mask = mask64(bit_count);
        let mut state = (byte as u64).wrapping_mul(splitmix64(position as u64)) & mask;
        for _ in 0..8 {
            let top_bit = (state >> (bit_count - 1)) & 1;
            state = (state << 1) & mask;
            if top_bit != 0 {
                state ^= poly64;
            }
        }
        state
    }

    /// Hashes `key` (a little-endian byte sequence, e.g. a packed seed word)
    /// to a 64-bit digest by XOR-accumulating per-position table lookups.
    #[must_use]
    pub fn hash64(&self, key: &[u8]) -> u64 {
        let mut hash = 0u64;
        for (position, &byte) in key.iter().enumerate().take(MAX_KEY_BYTES) {
            hash ^= self.table[position][byte as usize];
        }
        hash
    }
}

#[inline]
fn mask64(bit_count: u32) -> u64 {
    if bit_count >= 64 { u64::MAX } else { (1u64 << bit_count) - 1 }
}

/// A small fixed-output mixing function used only to decorrelate the
/// per-position rows of the CRC table from one another; not a cryptographic
/// primitive.
#[inline]
fn splitmix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9E3779B97F4A7C15);
    x = (x ^ (x >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
    x = (x ^ (x >> 27)).wrapping_mul(0x94D049BB133111EB);
    x ^ (x >> 31)
}

/// The primary (21-bit seed) default polynomial used when none is supplied by
/// an external hash-table config. An arbitrary but fixed primitive-looking
/// 64-bit polynomial; bit-exactness to real DRAGEN tables is explicitly out of
/// scope (spec §1).
#[must_use]
pub fn default_primary_polynomial() -> CrcPolynomial {
    CrcPolynomial::new(64, &0x42F0_E1EB_A9EA_3693u64.to_le_bytes())
}

/// The secondary (extension) default polynomial.
#[must_use]
pub fn default_secondary_polynomial() -> CrcPolynomial {
    CrcPolynomial::new(64, &0x9A6C_9329_AC4B_C9B5u64.to_le_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_deterministic() {
        let hasher = CrcHasher::new(default_primary_polynomial());
        let key = [1u8, 2, 3, 4, 5, 6];
        assert_eq!(hasher.hash64(&key), hasher.hash64(&key));
    }

    #[test]
    fn hash_differs_by_position() {
        let hasher = CrcHasher::new(default_primary_polynomial());
        assert_ne!(hasher.hash64(&[1, 0]), hasher.hash64(&[0, 1]));
    }

    #[test]
    fn distinct_polynomials_diverge() {
        let a = CrcHasher::new(default_primary_polynomial());
        let b = CrcHasher::new(default_secondary_polynomial());
        let key = [7u8, 8, 9, 10];
        assert_ne!(a.hash64(&key), b.hash64(&key));
    }
}
