//! `RECORDS_AT_A_TIME` batching of input records into blocks (spec §4.8
//! "Block size"), decoupled from the input format: callers supply an
//! iterator already yielding converted records (pairs or singles), produced
//! upstream via `utils::paired_reads`'s `ZipPairedReadsExt`/
//! `DeinterleavedPairedReadsExt`.

/// A block must divide the insert-size estimator's initial interval (spec
/// §4.8); the estimator's `interval_size` should be chosen as a divisor of
/// this constant.
pub const RECORDS_AT_A_TIME: usize = 100_000;

/// One ticketed block of records, numbered monotonically from 0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadBlock<T> {
    pub ticket: u64,
    pub records: Vec<T>,
}

/// Slices an incoming record iterator into [`RECORDS_AT_A_TIME`]-sized,
/// monotonically-ticketed blocks. The final block may be shorter.
pub struct BlockSource<I> {
    inner: I,
    next_ticket: u64,
}

impl<I, T, E> BlockSource<I>
where
    I: Iterator<Item = Result<T, E>>,
{
    #[must_use]
    pub fn new(inner: I) -> Self {
        Self { inner, next_ticket: 0 }
    }

    /// Pulls the next block, propagating the first error encountered and
    /// discarding any partially-filled block at that point — per spec §7,
    /// the pipeline never partially commits a block.
    pub fn next_block(&mut self) -> Option<Result<ReadBlock<T>, E>> {
        let mut records = Vec::with_capacity(RECORDS_AT_A_TIME);
        for _ in 0..RECORDS_AT_A_TIME {
            match self.inner.next() {
                Some(Ok(record)) => records.push(record),
                Some(Err(e)) => return Some(Err(e)),
                None => break,
            }
        }

        if records.is_empty() {
            return None;
        }

        let ticket = self.next_ticket;
        self.next_ticket += 1;
        Some(Ok(ReadBlock { ticket, records }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocks_are_ticketed_monotonically() {
        let records: Vec<Result<u32, ()>> = (0..5).map(Ok).collect();
        let mut source = BlockSource::new(records.into_iter());
        let first = source.next_block().unwrap().unwrap();
        assert_eq!(first.ticket, 0);
        assert_eq!(first.records, vec![0, 1, 2, 3, 4]);
        assert!(source.next_block().is_none());
    }

    #[test]
    fn error_is_propagated_and_stops_the_block() {
        let records: Vec<Result<u32, &str>> = vec![Ok(1), Ok(2), Err("broken record")];
        let mut source = BlockSource::new(records.into_iter());
        let result = source.next_block().unwrap();
        assert_eq!(result, Err("broken record"));
    }

    #[test]
    fn block_size_caps_at_records_at_a_time() {
        let records: Vec<Result<u32, ()>> = (0..(RECORDS_AT_A_TIME + 10) as u32).map(Ok).collect();
        let mut source = BlockSource::new(records.into_iter());
        let first = source.next_block().unwrap().unwrap();
        assert_eq!(first.records.len(), RECORDS_AT_A_TIME);
        let second = source.next_block().unwrap().unwrap();
        assert_eq!(second.records.len(), 10);
        assert_eq!(second.ticket, 1);
    }
}
