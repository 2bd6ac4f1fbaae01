//! Adaptive step controller: advances one unit through one data timestep.
//!
//! The controller walks the timestep ladder top-down. Each data interval is
//! covered by NORMAL-level steps; a trial step whose mass change exceeds the
//! level's threshold is discarded and re-run as `intervals` child-level
//! steps over the same span. SMALL is the floor: its result is accepted
//! even over threshold, and the unit is marked as having run at floor
//! resolution. Every accepted sub-step folds its fluxes into the unit's
//! accumulator weighted by the sub-step's duration, so output averages are
//! true time averages no matter how finely the interval was subdivided.

use tracing::warn;

use sf_core::{TimestepLevel, TstepHierarchy};
use sf_physics::{ForcingRecord, ModelParams, PhysicsResult, SnowModel};

use crate::store::PixelUnit;

#[derive(Clone, Debug)]
pub struct StepController {
    hierarchy: TstepHierarchy,
    params: ModelParams,
    stop_no_snow: bool,
}

impl StepController {
    pub fn new(hierarchy: TstepHierarchy, params: ModelParams, stop_no_snow: bool) -> Self {
        Self {
            hierarchy,
            params,
            stop_no_snow,
        }
    }

    pub fn hierarchy(&self) -> &TstepHierarchy {
        &self.hierarchy
    }

    /// Advance `unit` by exactly one data interval bracketed by `f0` and
    /// `f1`. On success the unit's clock has moved by the full interval and
    /// its accumulator reflects exactly the sub-steps executed. On error
    /// the unit must be considered lost; the run aborts.
    pub fn advance<M: SnowModel>(
        &self,
        model: &M,
        unit: &mut PixelUnit,
        f0: &ForcingRecord,
        f1: &ForcingRecord,
        first_step: bool,
    ) -> PhysicsResult<()> {
        let data_dur = self.hierarchy.data_duration_s();

        // Snow-free unit with nothing incoming: nothing for the physics to
        // do, but time still passes.
        if self.stop_no_snow && unit.snow.layer_count == 0 && f0.m_pp == 0.0 {
            unit.accum.advance_idle(data_dur);
            unit.current_time += data_dur;
            return Ok(());
        }

        let mut start = *f0;
        let mut end = *f1;
        start.warm_rain_floor();
        end.warm_rain_floor();

        let n = self.hierarchy.level(TimestepLevel::Normal).intervals as usize;
        let share = 1.0 / n as f64;
        let mut first = first_step;
        for i in 0..n {
            let a = i as f64 * share;
            let b = (i + 1) as f64 * share;
            let fa = start.lerp(&end, a).precip_share(share);
            let fb = start.lerp(&end, b).precip_share(share);
            self.try_level(model, TimestepLevel::Normal, unit, &fa, &fb, &mut first)?;
        }

        unit.current_time += data_dur;
        Ok(())
    }

    /// Run one trial step at `level` over [`fa`, `fb`]; subdivide on a
    /// threshold breach, accept otherwise.
    fn try_level<M: SnowModel>(
        &self,
        model: &M,
        level: TimestepLevel,
        unit: &mut PixelUnit,
        fa: &ForcingRecord,
        fb: &ForcingRecord,
        first: &mut bool,
    ) -> PhysicsResult<()> {
        let info = self.hierarchy.level(level);
        let outcome = model.step(
            &unit.snow,
            &unit.site,
            fa,
            fb,
            info.duration_s,
            *first,
            &self.params,
        )?;

        let mass_change = (outcome.state.m_s - unit.snow.m_s).abs();
        let over = info.threshold.is_some_and(|t| mass_change > t);

        if over && level != TimestepLevel::Small {
            // Discard the trial result and cover the same span at the next
            // finer resolution.
            let child = match level.child() {
                Some(c) => c,
                None => unreachable!("only SMALL has no child"),
            };
            let n = self.hierarchy.level(child).intervals as usize;
            let share = 1.0 / n as f64;
            for i in 0..n {
                let a = i as f64 * share;
                let b = (i + 1) as f64 * share;
                let ca = fa.lerp(fb, a).precip_share(share);
                let cb = fa.lerp(fb, b).precip_share(share);
                self.try_level(model, child, unit, &ca, &cb, first)?;
            }
            return Ok(());
        }

        if over {
            // Floor level, still over threshold: accept and flag.
            if !unit.ran_at_floor {
                warn!(
                    mass_change,
                    threshold = info.threshold.unwrap_or(f64::NAN),
                    "mass change over threshold at floor resolution"
                );
            }
            unit.ran_at_floor = true;
        }

        unit.snow = outcome.state;
        unit.accum.record(&outcome.fluxes, info.duration_s);
        *first = false;
        Ok(())
    }
}
