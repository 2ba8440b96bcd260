//! The 4-stage concurrent pipeline (spec §4.8): blocking input into
//! [`RECORDS_AT_A_TIME`](block::RECORDS_AT_A_TIME)-sized blocks, ticketing
//! them through `Read` → `GetInsertSizes` → `Align` → `Store`, and emitting
//! SAM records.

pub mod block;
pub mod config;
pub mod emitter;
pub mod ticket;
pub mod worker_pool;
