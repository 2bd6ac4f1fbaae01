//! Run driver: walks the forcing sequence and emits output.

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use tracing::{info, warn};

use sf_physics::SnowModel;

use crate::controller::StepController;
use crate::error::{EngineError, EngineResult};
use crate::forcing::ForcingSource;
use crate::store::{PixelSnapshot, StateStore};

/// Where emitted snapshots go.
pub trait OutputSink {
    fn emit(
        &mut self,
        timestamp: DateTime<Utc>,
        snapshots: &[PixelSnapshot],
    ) -> EngineResult<()>;
}

/// Discards everything. Useful for timing runs and tests.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullSink;

impl OutputSink for NullSink {
    fn emit(&mut self, _timestamp: DateTime<Utc>, _snapshots: &[PixelSnapshot]) -> EngineResult<()> {
        Ok(())
    }
}

/// Collects every emission in memory. Test support.
#[derive(Clone, Debug, Default)]
pub struct MemorySink {
    pub emissions: Vec<(DateTime<Utc>, Vec<PixelSnapshot>)>,
}

impl OutputSink for MemorySink {
    fn emit(&mut self, timestamp: DateTime<Utc>, snapshots: &[PixelSnapshot]) -> EngineResult<()> {
        self.emissions.push((timestamp, snapshots.to_vec()));
        Ok(())
    }
}

/// Lifecycle of a run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DriverState {
    #[default]
    Init,
    Running,
    Complete,
    Failed,
}

/// What a completed run did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Data steps advanced.
    pub steps_run: usize,
    /// Output emissions flushed to the sink.
    pub records_emitted: usize,
    /// Units that bottomed out at floor resolution at least once.
    pub floor_units: usize,
}

/// Drives a whole run: fetches forcing, advances every active unit one
/// data step at a time, and flushes snapshots at the configured cadence.
pub struct RunDriver<'m, M: SnowModel> {
    model: &'m M,
    controller: StepController,
    store: StateStore,
    output_frequency: usize,
    temps_in_c: bool,
    state: DriverState,
}

impl<'m, M: SnowModel> RunDriver<'m, M> {
    pub fn new(
        model: &'m M,
        controller: StepController,
        store: StateStore,
        output_frequency: usize,
        temps_in_c: bool,
    ) -> Self {
        Self {
            model,
            controller,
            store,
            output_frequency: output_frequency.max(1),
            temps_in_c,
            state: DriverState::Init,
        }
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    /// Run over `times`, an ordered sequence of forcing timestamps. The
    /// first timestamp seeds the "previous" record; every later one closes
    /// a data interval. Point runs emit every step; grid runs emit every
    /// `output_frequency` steps and always at the end.
    pub fn run<S: ForcingSource, K: OutputSink>(
        &mut self,
        source: &mut S,
        sink: &mut K,
        times: &[DateTime<Utc>],
    ) -> EngineResult<RunSummary> {
        let result = self.run_inner(source, sink, times);
        self.state = match &result {
            Ok(_) => DriverState::Complete,
            Err(_) => DriverState::Failed,
        };
        result
    }

    fn run_inner<S: ForcingSource, K: OutputSink>(
        &mut self,
        source: &mut S,
        sink: &mut K,
        times: &[DateTime<Utc>],
    ) -> EngineResult<RunSummary> {
        let mut summary = RunSummary::default();
        let Some((&t0, rest)) = times.split_first() else {
            return Ok(summary);
        };

        self.state = DriverState::Running;
        info!(start = %t0, steps = rest.len(), units = self.store.len(), "run starting");

        let mut prev = source.fetch(t0)?;
        self.check_frame(t0, &prev)?;
        source.acknowledge(t0)?;
        let last = rest.len();

        for (k, &t_k) in rest.iter().enumerate().map(|(i, t)| (i + 1, t)) {
            let cur = source.fetch(t_k)?;
            self.check_frame(t_k, &cur)?;
            let first_step = k == 1;

            self.advance_all(&prev, &cur, first_step, t_k)?;
            summary.steps_run += 1;

            let emit = self.store.is_point() || k % self.output_frequency == 0 || k == last;
            if emit {
                let snapshots = self.store.snapshots(self.temps_in_c);
                sink.emit(t_k, &snapshots)?;
                self.store.reset_accumulators();
                summary.records_emitted += 1;
            }

            source.acknowledge(t_k)?;
            prev = cur;
        }

        summary.floor_units = self.store.floor_units();
        if summary.floor_units > 0 {
            warn!(
                floor_units = summary.floor_units,
                "units ran at floor resolution with mass change over threshold"
            );
        }
        info!(
            steps = summary.steps_run,
            emitted = summary.records_emitted,
            "run complete"
        );
        Ok(summary)
    }

    /// Every frame must carry exactly one record per unit; a narrower
    /// frame would otherwise leave the surplus units silently frozen.
    fn check_frame(
        &self,
        timestamp: DateTime<Utc>,
        frame: &[sf_physics::ForcingRecord],
    ) -> EngineResult<()> {
        if frame.len() != self.store.len() {
            return Err(EngineError::FrameMismatch {
                timestamp,
                expected: self.store.len(),
                found: frame.len(),
            });
        }
        Ok(())
    }

    /// Advance every active unit through one data interval. Units are
    /// independent, so they run in parallel over disjoint slots of the
    /// store; masked units are left bit-for-bit untouched.
    fn advance_all(
        &mut self,
        prev: &[sf_physics::ForcingRecord],
        cur: &[sf_physics::ForcingRecord],
        first_step: bool,
        timestamp: DateTime<Utc>,
    ) -> EngineResult<()> {
        let controller = &self.controller;
        let model = self.model;

        let failure = self
            .store
            .units
            .par_iter_mut()
            .zip(prev.par_iter().zip(cur.par_iter()))
            .enumerate()
            .filter(|(_, (unit, _))| unit.site.mask)
            .find_map_first(|(i, (unit, (f0, f1)))| {
                controller
                    .advance(model, unit, f0, f1, first_step)
                    .err()
                    .map(|e| (i, e))
            });

        match failure {
            Some((unit, source)) => Err(EngineError::StepFailed {
                timestamp,
                unit,
                source,
            }),
            None => Ok(()),
        }
    }
}
