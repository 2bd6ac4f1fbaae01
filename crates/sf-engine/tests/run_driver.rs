//! Driver-level behavior: emission cadence, accumulator reset, failure
//! propagation, and the real-time producer/consumer loop.

use std::thread;

use chrono::{DateTime, Duration, TimeZone, Utc};
use sf_core::{MassThresholds, OutputMode, TimeSteps, TstepHierarchy};
use sf_engine::{
    ArchiveSource, EngineError, DriverState, MemorySink, PixelUnit, RealtimeSource, RunDriver,
    StateStore, StepController, VariableFrame,
};
use sf_physics::{
    FluxTerms, ForcingRecord, ModelParams, PhysicsError, PhysicsResult, SiteProps, SnowModel,
    SnowState, StepOutcome,
};

/// Constant fluxes, constant small mass gain. Fails on demand when the air
/// temperature carries the poison value.
struct SteadyModel {
    poison_t_a: Option<f64>,
}

impl SnowModel for SteadyModel {
    fn step(
        &self,
        state: &SnowState,
        _site: &SiteProps,
        f_start: &ForcingRecord,
        f_end: &ForcingRecord,
        dt_s: f64,
        _first_step: bool,
        _params: &ModelParams,
    ) -> PhysicsResult<StepOutcome> {
        if self
            .poison_t_a
            .is_some_and(|p| f_start.t_a == p || f_end.t_a == p)
        {
            return Err(PhysicsError::NonPhysical {
                what: "poisoned forcing",
            });
        }
        let mut next = *state;
        next.layer_count = 1;
        next.m_s += 0.001 * dt_s;
        Ok(StepOutcome {
            state: next,
            fluxes: FluxTerms {
                r_n: 42.0,
                melt: 0.1,
                ..FluxTerms::default()
            },
        })
    }
}

fn steady() -> SteadyModel {
    SteadyModel { poison_t_a: None }
}

fn controller() -> StepController {
    let hierarchy = TstepHierarchy::build(
        &TimeSteps::default(),
        OutputMode::Data,
        &MassThresholds::default(),
    )
    .unwrap();
    StepController::new(hierarchy, ModelParams::default(), false)
}

fn unit() -> PixelUnit {
    PixelUnit::new(
        SiteProps::new(2000.0, 0.005),
        SnowState::from_initial(1.0, 300.0, -2.0, -2.0, 0.0),
    )
}

fn times(n: usize) -> Vec<DateTime<Utc>> {
    let t0 = Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap();
    (0..n as i64).map(|k| t0 + Duration::hours(k)).collect()
}

fn archive(times: &[DateTime<Utc>], n_units: usize) -> ArchiveSource {
    let mut src = ArchiveSource::new();
    for (k, &t) in times.iter().enumerate() {
        let rec = ForcingRecord {
            t_a: 260.0 + k as f64,
            ..ForcingRecord::default()
        };
        src.insert(t, vec![rec; n_units]);
    }
    src
}

#[test]
fn point_run_emits_every_data_step() {
    // 11 timestamps bracket 10 data steps.
    let ts = times(11);
    let mut source = archive(&ts, 1);
    let mut sink = MemorySink::default();
    let model = steady();
    let mut driver = RunDriver::new(&model, controller(), StateStore::new(vec![unit()]), 1, true);

    let summary = driver.run(&mut source, &mut sink, &ts).unwrap();

    assert_eq!(driver.state(), DriverState::Complete);
    assert_eq!(summary.steps_run, 10);
    assert_eq!(summary.records_emitted, 10);
    assert_eq!(sink.emissions.len(), 10);
    for (k, (t, snapshots)) in sink.emissions.iter().enumerate() {
        assert_eq!(*t, ts[k + 1]);
        assert_eq!(snapshots.len(), 1);
    }
}

#[test]
fn grid_run_honors_output_frequency() {
    let ts = times(6);
    let mut source = archive(&ts, 2);
    let mut sink = MemorySink::default();
    let model = steady();
    let store = StateStore::new(vec![unit(), unit()]);
    let mut driver = RunDriver::new(&model, controller(), store, 2, true);

    let summary = driver.run(&mut source, &mut sink, &ts).unwrap();

    // 5 steps, frequency 2: emissions at k = 2, 4 and the final k = 5.
    assert_eq!(summary.steps_run, 5);
    assert_eq!(summary.records_emitted, 3);
    let emitted: Vec<_> = sink.emissions.iter().map(|(t, _)| *t).collect();
    assert_eq!(emitted, vec![ts[2], ts[4], ts[5]]);
}

#[test]
fn accumulators_reset_after_each_emission() {
    let ts = times(4);
    let mut source = archive(&ts, 1);
    let mut sink = MemorySink::default();
    let model = steady();
    let mut driver = RunDriver::new(&model, controller(), StateStore::new(vec![unit()]), 1, true);

    driver.run(&mut source, &mut sink, &ts).unwrap();

    // Every emission covers exactly one hour of constant flux, so each
    // reported average is the constant itself; no carry-over between them.
    for (_, snapshots) in &sink.emissions {
        assert!((snapshots[0].em.r_n_bar - 42.0).abs() < 1e-9);
        assert!((snapshots[0].em.melt_sum - 0.1).abs() < 1e-9);
    }
    let after = &driver.store().units[0].accum;
    assert_eq!(after.time_since_out, 0.0);
    assert_eq!(after.r_n_sum, 0.0);
}

#[test]
fn failure_reports_timestamp_and_unit() {
    let ts = times(5);
    let mut source = ArchiveSource::new();
    for (k, &t) in ts.iter().enumerate() {
        // Unit 1 sees the poison value at the step ending at ts[3].
        let bad = k == 3;
        source.insert(
            t,
            vec![
                ForcingRecord {
                    t_a: 260.0,
                    ..ForcingRecord::default()
                },
                ForcingRecord {
                    t_a: if bad { -1.0 } else { 260.0 },
                    ..ForcingRecord::default()
                },
            ],
        );
    }
    let model = SteadyModel {
        poison_t_a: Some(-1.0),
    };
    let store = StateStore::new(vec![unit(), unit()]);
    let mut driver = RunDriver::new(&model, controller(), store, 1, true);
    let mut sink = MemorySink::default();

    let err = driver.run(&mut source, &mut sink, &ts).unwrap_err();

    assert_eq!(driver.state(), DriverState::Failed);
    match err {
        EngineError::StepFailed {
            timestamp, unit, ..
        } => {
            assert_eq!(timestamp, ts[3]);
            assert_eq!(unit, 1);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn narrow_forcing_frame_aborts_instead_of_freezing_units() {
    let ts = times(3);
    // Frames carry one record but the run has two units.
    let mut source = archive(&ts, 1);
    let model = steady();
    let store = StateStore::new(vec![unit(), unit()]);
    let mut driver = RunDriver::new(&model, controller(), store, 1, true);
    let mut sink = MemorySink::default();

    let err = driver.run(&mut source, &mut sink, &ts).unwrap_err();

    assert_eq!(driver.state(), DriverState::Failed);
    assert!(matches!(
        err,
        EngineError::FrameMismatch {
            timestamp,
            expected: 2,
            found: 1,
        } if timestamp == ts[0]
    ));
    // Neither unit moved.
    for u in &driver.store().units {
        assert_eq!(u.current_time, 0.0);
    }
}

#[test]
fn missing_archive_timestamp_aborts() {
    let ts = times(4);
    let mut source = archive(&ts[..3], 1);
    let model = steady();
    let mut driver = RunDriver::new(&model, controller(), StateStore::new(vec![unit()]), 1, true);
    let mut sink = MemorySink::default();

    let err = driver.run(&mut source, &mut sink, &ts).unwrap_err();
    assert_eq!(driver.state(), DriverState::Failed);
    assert!(matches!(
        err,
        EngineError::ForcingUnavailable { timestamp } if timestamp == ts[3]
    ));
}

#[test]
fn realtime_run_consumes_producer_frames_and_acknowledges() {
    let ts = times(4);
    let (mut source, handles) = RealtimeSource::channel(1);

    let producer_times = ts.clone();
    let senders = handles.senders;
    let producer = thread::spawn(move || {
        for (k, &t) in producer_times.iter().enumerate() {
            for (var, tx) in &senders {
                let value = match var.name() {
                    "t_a" => 260.0 + k as f64,
                    "percent_snow" => 0.0,
                    _ => 0.0,
                };
                tx.send(VariableFrame {
                    timestamp: t,
                    values: vec![value],
                })
                .unwrap();
            }
        }
        // Dropping the senders ends the feed; the run is already done with
        // every timestamp it needs by then.
    });

    let model = steady();
    let mut driver = RunDriver::new(&model, controller(), StateStore::new(vec![unit()]), 1, true);
    let mut sink = MemorySink::default();
    let summary = driver.run(&mut source, &mut sink, &ts).unwrap();
    producer.join().unwrap();

    assert_eq!(driver.state(), DriverState::Complete);
    assert_eq!(summary.steps_run, 3);
    assert_eq!(sink.emissions.len(), 3);

    // Every consumed timestamp was acknowledged, in order.
    let acks: Vec<_> = handles.acks.try_iter().collect();
    assert_eq!(acks, ts);
}
