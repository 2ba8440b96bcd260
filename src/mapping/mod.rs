//! Seed-and-extend read mapping: 4-bit base encoding, the CRC seed hasher,
//! the hash table and its interval sampling, seed placement/extension, and
//! chain building (spec §3 "Data Model", §4.1, §4.2).

pub mod base;
pub mod chain;
pub mod crc32c;
pub mod hash;
pub mod hashtable;
pub mod mapper;
pub mod reference;
pub mod seed;
