//! The four-stage FIFO gate that orders blocks through `blockToRead` →
//! `blockToGetInsertSizes` → `blockToAlign` → `blockToStore` (spec §4.8,
//! §5), grounded on the teacher's `AlignmentWriterThreaded` pattern (a
//! single mutex-guarded counter plus condvar wakeup) but generalized from
//! one gate to four ordered ones.

use std::sync::{Condvar, Mutex};

/// The four pipeline stages, in the order every block must pass through
/// them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Read,
    GetInsertSizes,
    Align,
    Store,
}

const STAGE_COUNT: usize = 4;

fn stage_index(stage: Stage) -> usize {
    match stage {
        Stage::Read => 0,
        Stage::GetInsertSizes => 1,
        Stage::Align => 2,
        Stage::Store => 3,
    }
}

struct GateState {
    /// Next ticket each stage is willing to admit.
    next_ticket: [u64; STAGE_COUNT],
    /// Set once any worker observes a failure; all other workers must exit
    /// their wait loops at the next opportunity (spec §4.8 "Cancellation").
    failed: bool,
}

/// A single mutex+condvar gate shared by all pipeline worker threads,
/// enforcing strict ticket order on `Read`, `GetInsertSizes`, and `Store`
/// (FIFO), while `Align` is only bounded by `mapperThreads` concurrency
/// (enforced separately by `pipeline::worker_pool`, not by this gate).
pub struct PipelineGate {
    state: Mutex<GateState>,
    condvar: Condvar,
}

impl Default for PipelineGate {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineGate {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(GateState { next_ticket: [0; STAGE_COUNT], failed: false }),
            condvar: Condvar::new(),
        }
    }

    /// Blocks the calling thread until `ticket` is next in line for `stage`,
    /// then returns. Returns `Err(())` if the pipeline was latched as failed
    /// while waiting.
    pub fn wait_turn(&self, stage: Stage, ticket: u64) -> Result<(), ()> {
        let index = stage_index(stage);
        let mut state = self.state.lock().unwrap();
        while state.next_ticket[index] != ticket {
            if state.failed {
                return Err(());
            }
            state = self.condvar.wait(state).unwrap();
        }
        if state.failed {
            return Err(());
        }
        Ok(())
    }

    /// Marks `ticket` as complete for `stage`, admitting the next ticket and
    /// waking all waiters (the original's `waitForChange` semantics require
    /// waking everyone, not just the next in line, since several stages
    /// share this gate).
    pub fn advance(&self, stage: Stage, ticket: u64) {
        let index = stage_index(stage);
        let mut state = self.state.lock().unwrap();
        state.next_ticket[index] = ticket + 1;
        self.condvar.notify_all();
    }

    /// Latches a worker failure, per spec §4.8: the first exception is
    /// recorded and every other worker observes it at its next wait.
    pub fn latch_failure(&self) {
        let mut state = self.state.lock().unwrap();
        state.failed = true;
        self.condvar.notify_all();
    }

    #[must_use]
    pub fn has_failed(&self) -> bool {
        self.state.lock().unwrap().failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn tickets_are_admitted_in_order() {
        let gate = Arc::new(PipelineGate::new());
        assert!(gate.wait_turn(Stage::Read, 0).is_ok());
        gate.advance(Stage::Read, 0);
        assert!(gate.wait_turn(Stage::Read, 1).is_ok());
    }

    #[test]
    fn out_of_order_waiter_blocks_until_advanced() {
        let gate = Arc::new(PipelineGate::new());
        let gate2 = Arc::clone(&gate);

        let handle = thread::spawn(move || gate2.wait_turn(Stage::Store, 1));

        thread::sleep(std::time::Duration::from_millis(20));
        gate.advance(Stage::Store, 0);

        assert!(handle.join().unwrap().is_ok());
    }

    #[test]
    fn latched_failure_releases_waiters_with_err() {
        let gate = Arc::new(PipelineGate::new());
        let gate2 = Arc::clone(&gate);

        let handle = thread::spawn(move || gate2.wait_turn(Stage::Align, 5));
        thread::sleep(std::time::Duration::from_millis(20));
        gate.latch_failure();

        assert!(handle.join().unwrap().is_err());
        assert!(gate.has_failed());
    }

    #[test]
    fn stages_are_independent() {
        let gate = PipelineGate::new();
        gate.advance(Stage::Read, 0);
        // Store's counter is untouched by Read's advance.
        assert!(gate.wait_turn(Stage::Store, 0).is_ok());
    }
}
