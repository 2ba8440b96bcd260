//! Rolling insert-size estimation (spec §4.7), grounded on
//! `examples/original_source/src/include/align/InsertSizeDistribution.hpp`
//! and `InsertSizeParameters.hpp`.

use std::sync::{Condvar, Mutex};

use crate::align::pair::PairOrientation;

/// How many standard deviations around the mean a mate-rescue search window
/// spans, absent a recoverable original default (see DESIGN.md).
const RESCUE_SIGMAS: f64 = 5.0;

/// The fixed-point insert-size summary handed to the aligner once an
/// interval has been filled (spec §4.7 `InsertSizeParameters`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InsertSizeParameters {
    pub mean: f64,
    pub stddev: f64,
    pub min: i64,
    pub max: i64,
    /// Mate-rescue search bounds, wider than `[min, max]` so rescue can
    /// recover pairs the ordinary pairing window would reject outright
    /// (spec §4.7, `original_source`'s `InsertSizeParameters::rescueMin_`/
    /// `rescueMax_`).
    pub rescue_min: i64,
    pub rescue_max: i64,
    /// `round_ties_even(0x2F200 / stddev)`, saturating at `u16::MAX`, per
    /// spec §9's IEEE-rounding open question.
    pub sigma_factor: u16,
    /// Expected relative mate orientation for this run, carried unchanged
    /// across recomputes.
    pub orientation: PairOrientation,
    pub is_init_done: bool,
}

/// An orientation-agreeing observation contributed by a primary alignment.
#[derive(Debug, Clone, Copy)]
pub struct InsertObservation {
    pub observed_length: i64,
    pub mapq: u8,
}

#[derive(Debug, Clone, Copy)]
pub struct EstimatorConfig {
    pub interval_size: usize,
    pub sample_size: usize,
    pub interval_memory: usize,
    pub interval_delay: usize,
    pub continuous_update: bool,
    pub sampling_enabled: bool,
    pub fallback: InsertSizeParameters,
    pub aligner_mapq_max: u8,
}

struct EstimatorState {
    samples: Vec<i64>,
    current: InsertSizeParameters,
    observations_since_interval: usize,
    get_calls_this_interval: usize,
    add_calls_this_interval: usize,
}

/// A rolling insert-size estimator shared across pipeline worker threads.
///
/// `getInsertSizeParameters` blocks on the condvar until the current
/// interval has filled (spec §4.7), unless sampling is disabled. The FIFO
/// ticket in `pipeline::ticket` guarantees `add`/`get` call counts stay in
/// lockstep per interval.
pub struct InsertSizeEstimator {
    config: EstimatorConfig,
    state: Mutex<EstimatorState>,
    condvar: Condvar,
}

impl InsertSizeEstimator {
    #[must_use]
    pub fn new(config: EstimatorConfig) -> Self {
        let current = config.fallback;
        Self {
            state: Mutex::new(EstimatorState {
                samples: Vec::with_capacity(config.sample_size),
                current,
                observations_since_interval: 0,
                get_calls_this_interval: 0,
                add_calls_this_interval: 0,
            }),
            condvar: Condvar::new(),
            config,
        }
    }

    /// Contributes at most one observation per read pair; only alignments
    /// with `MAPQ >= min(20, alignerMapqMax)` and agreeing orientation
    /// count (spec §4.7).
    pub fn add(&self, observation: InsertObservation) {
        let min_mapq = self.config.aligner_mapq_max.min(20);
        if observation.mapq < min_mapq {
            return;
        }

        let mut state = self.state.lock().unwrap();
        state.add_calls_this_interval += 1;
        state.samples.push(observation.observed_length);
        state.observations_since_interval += 1;

        if state.samples.len() >= self.config.interval_size {
            self.recompute(&mut state);
            state.current.is_init_done = true;
            self.condvar.notify_all();
        }
    }

    /// Blocks until the current interval has filled, unless sampling is
    /// disabled, in which case the fixed fallback parameters are returned
    /// immediately (spec §4.7).
    #[must_use]
    pub fn get_insert_size_parameters(&self, _read_len: usize) -> InsertSizeParameters {
        if !self.config.sampling_enabled {
            return self.config.fallback;
        }

        let mut state = self.state.lock().unwrap();
        state.get_calls_this_interval += 1;
        while !state.current.is_init_done {
            state = self.condvar.wait(state).unwrap();
        }
        state.current
    }

    fn recompute(&self, state: &mut EstimatorState) {
        let n = state.samples.len() as f64;
        let mean = state.samples.iter().sum::<i64>() as f64 / n;
        let variance = state.samples.iter().map(|&x| (x as f64 - mean).powi(2)).sum::<f64>() / n;
        let stddev = variance.sqrt().max(1e-9);

        let sigma_factor = sigma_factor_from_stddev(stddev);

        let keep = self.config.interval_memory.min(state.samples.len());
        let drop_count = state.samples.len() - keep;
        state.samples.drain(0..drop_count);

        state.current = InsertSizeParameters {
            mean,
            stddev,
            min: (mean - 3.0 * stddev) as i64,
            max: (mean + 3.0 * stddev) as i64,
            rescue_min: (mean - RESCUE_SIGMAS * stddev).max(0.0) as i64,
            rescue_max: (mean + RESCUE_SIGMAS * stddev) as i64,
            sigma_factor,
            orientation: state.current.orientation,
            is_init_done: true,
        };

        if !self.config.continuous_update {
            state.samples.clear();
        }
        state.observations_since_interval = 0;
    }
}

/// `round_ties_even(0x2F200 / stddev)`, saturating at `u16::MAX` (spec §9).
#[must_use]
pub fn sigma_factor_from_stddev(stddev: f64) -> u16 {
    const NUMERATOR: f64 = 0x2F200 as f64;
    let scaled = (NUMERATOR / stddev).round_ties_even();
    if scaled >= u16::MAX as f64 { u16::MAX } else { scaled.max(0.0) as u16 }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> EstimatorConfig {
        EstimatorConfig {
            interval_size: 4,
            sample_size: 100,
            interval_memory: 100,
            interval_delay: 0,
            continuous_update: true,
            sampling_enabled: true,
            fallback: InsertSizeParameters {
                mean: 300.0,
                stddev: 50.0,
                min: 150,
                max: 450,
                rescue_min: 50,
                rescue_max: 550,
                sigma_factor: 0,
                orientation: PairOrientation::ForwardReverse,
                is_init_done: false,
            },
            aligner_mapq_max: 60,
        }
    }

    #[test]
    fn sigma_factor_is_monotonically_decreasing_in_stddev() {
        assert!(sigma_factor_from_stddev(10.0) > sigma_factor_from_stddev(100.0));
    }

    #[test]
    fn sigma_factor_saturates_for_tiny_stddev() {
        assert_eq!(sigma_factor_from_stddev(0.0001), u16::MAX);
    }

    #[test]
    fn low_mapq_observations_are_ignored() {
        let estimator = InsertSizeEstimator::new(config());
        for _ in 0..10 {
            estimator.add(InsertObservation { observed_length: 300, mapq: 5 });
        }
        assert!(!estimator.state.lock().unwrap().current.is_init_done);
    }

    #[test]
    fn interval_fills_and_unblocks() {
        let estimator = InsertSizeEstimator::new(config());
        for len in [290, 300, 310, 305] {
            estimator.add(InsertObservation { observed_length: len, mapq: 40 });
        }
        let params = estimator.get_insert_size_parameters(150);
        assert!(params.is_init_done);
        assert!((params.mean - 301.25).abs() < 1.0);
    }

    #[test]
    fn sampling_disabled_returns_fallback_immediately() {
        let mut cfg = config();
        cfg.sampling_enabled = false;
        let estimator = InsertSizeEstimator::new(cfg);
        let params = estimator.get_insert_size_parameters(150);
        assert_eq!(params, cfg.fallback);
    }
}
