//! Bounded concurrent execution of the align stage over a block's read pairs
//! (spec §4.8 "Stages", §5 "Concurrency model"), grounded on the teacher's
//! `dev_no_rayon`-gated parallel dispatch in `processes/standalone/aligner/mod.rs`
//! (`align_all`, using `par_bridge` under rayon and a plain iterator
//! otherwise).

use crate::align::insert_size::InsertSizeParameters;
use crate::align::read_pair::ReadPairState;
use crate::mapping::base::Read;
use crate::pipeline::ticket::PipelineGate;

#[cfg(not(feature = "dev_no_rayon"))]
use rayon::prelude::*;

/// One mate pair pulled out of a block, ready to be driven through
/// [`crate::align::read_pair::ReadPairProcessor`].
pub struct PairWorkItem {
    pub mate1: Read,
    pub mate2: Read,
}

/// Runs `process_pair` over every item in `items`, under `mapperThreads`-many
/// workers. Rayon's global pool enforces the thread cap in the default
/// build; the `dev_no_rayon` feature runs strictly sequentially for
/// deterministic single-threaded debugging, matching the teacher's
/// `align_all`.
pub fn run_align_stage<F>(items: Vec<PairWorkItem>, insert_params: &InsertSizeParameters, process_pair: F) -> Vec<ReadPairState>
where
    F: Fn(&Read, &Read, &InsertSizeParameters) -> ReadPairState + Sync,
{
    #[cfg(not(feature = "dev_no_rayon"))]
    {
        items.par_iter().map(|item| process_pair(&item.mate1, &item.mate2, insert_params)).collect()
    }

    #[cfg(feature = "dev_no_rayon")]
    {
        items.iter().map(|item| process_pair(&item.mate1, &item.mate2, insert_params)).collect()
    }
}

/// Runs the align stage for one ticketed block, latching the shared
/// [`PipelineGate`] as failed if `process_pair` panics partway through
/// (caught at the block granularity, per spec §4.8 "Cancellation": a failure
/// in one block's alignment must stop the rest of the pipeline rather than
/// silently skip the block).
pub fn run_align_stage_for_block<F>(
    gate: &PipelineGate,
    ticket: u64,
    items: Vec<PairWorkItem>,
    insert_params: &InsertSizeParameters,
    process_pair: F,
) -> Result<Vec<ReadPairState>, ()>
where
    F: Fn(&Read, &Read, &InsertSizeParameters) -> ReadPairState + Sync,
{
    gate.wait_turn(crate::pipeline::ticket::Stage::Align, ticket)?;
    let results = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| run_align_stage(items, insert_params, process_pair)));
    gate.advance(crate::pipeline::ticket::Stage::Align, ticket);

    results.map_err(|_| {
        gate.latch_failure();
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::align::insert_size::InsertSizeParameters;

    fn read(name: &[u8], seq: &[u8]) -> Read {
        Read::new(name, seq, &vec![30; seq.len()], 0, 0)
    }

    fn params() -> InsertSizeParameters {
        InsertSizeParameters {
            mean: 300.0,
            stddev: 30.0,
            min: 210,
            max: 390,
            rescue_min: 150,
            rescue_max: 450,
            sigma_factor: 0,
            orientation: crate::align::pair::PairOrientation::ForwardReverse,
            is_init_done: true,
        }
    }

    #[test]
    fn align_stage_processes_every_item() {
        let items = vec![
            PairWorkItem { mate1: read(b"r1", b"ACGT"), mate2: read(b"r1", b"TGCA") },
            PairWorkItem { mate1: read(b"r2", b"ACGT"), mate2: read(b"r2", b"TGCA") },
        ];
        let results = run_align_stage(items, &params(), |_, _, _| ReadPairState::AllUnmapped);
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| matches!(r, ReadPairState::AllUnmapped)));
    }

    #[test]
    fn gated_stage_advances_ticket_on_success() {
        let gate = PipelineGate::new();
        let items = vec![PairWorkItem { mate1: read(b"r1", b"ACGT"), mate2: read(b"r1", b"TGCA") }];
        let result = run_align_stage_for_block(&gate, 0, items, &params(), |_, _, _| ReadPairState::AllUnmapped);
        assert!(result.is_ok());
        assert!(gate.wait_turn(crate::pipeline::ticket::Stage::Align, 1).is_ok());
    }

    #[test]
    fn panicking_worker_latches_pipeline_failure() {
        let gate = PipelineGate::new();
        let items = vec![PairWorkItem { mate1: read(b"r1", b"ACGT"), mate2: read(b"r1", b"TGCA") }];
        let result = run_align_stage_for_block(&gate, 0, items, &params(), |_, _, _| panic!("boom"));
        assert!(result.is_err());
        assert!(gate.has_failed());
    }
}
