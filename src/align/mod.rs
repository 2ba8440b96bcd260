//! Alignment: CIGAR modeling, the banded wavefront and striped Smith-Waterman
//! engines, alignment generation from chains, pair building, MAPQ, and insert
//! size estimation (spec §4.3-§4.7).

pub mod cigar;
pub mod generator;
pub mod insert_size;
pub mod logging;
pub mod mapq;
pub mod pair;
pub mod read_pair;
pub mod striped;
pub mod wavefront;
