//! Forcing sources: where bracketing meteorological records come from.
//!
//! Batch runs read from an [`ArchiveSource`] that holds the whole forcing
//! sequence in memory, keyed by timestamp. Real-time runs read from a
//! [`RealtimeSource`] fed by producer threads, one channel per forcing
//! variable; the driver blocks until every variable for the requested
//! timestamp has arrived, then acknowledges the timestamp on a dedicated
//! channel so producers can release upstream resources.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use crossbeam_channel::{unbounded, Receiver, Sender};
use tracing::debug;

use sf_physics::ForcingRecord;

use crate::error::{EngineError, EngineResult};

/// Supplies one [`ForcingRecord`] per unit for a requested timestamp.
pub trait ForcingSource {
    fn fetch(&mut self, timestamp: DateTime<Utc>) -> EngineResult<Vec<ForcingRecord>>;

    /// Signal that the records for `timestamp` are no longer needed.
    fn acknowledge(&mut self, _timestamp: DateTime<Utc>) -> EngineResult<()> {
        Ok(())
    }
}

/// Random-access source over a fully materialized forcing sequence.
#[derive(Clone, Debug, Default)]
pub struct ArchiveSource {
    frames: BTreeMap<DateTime<Utc>, Vec<ForcingRecord>>,
}

impl ArchiveSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, timestamp: DateTime<Utc>, records: Vec<ForcingRecord>) {
        self.frames.insert(timestamp, records);
    }

    /// The ordered timestamps this archive covers.
    pub fn timestamps(&self) -> Vec<DateTime<Utc>> {
        self.frames.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

impl ForcingSource for ArchiveSource {
    fn fetch(&mut self, timestamp: DateTime<Utc>) -> EngineResult<Vec<ForcingRecord>> {
        self.frames
            .get(&timestamp)
            .cloned()
            .ok_or(EngineError::ForcingUnavailable { timestamp })
    }
}

/// The forcing variables a real-time producer feeds, one channel each.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ForcingVariable {
    AirTemp,
    VaporPressure,
    WindSpeed,
    NetSolar,
    IncomingThermal,
    SoilTemp,
    PrecipMass,
    PercentSnow,
    RhoSnow,
    PrecipTemp,
}

impl ForcingVariable {
    pub const ALL: [ForcingVariable; 10] = [
        Self::AirTemp,
        Self::VaporPressure,
        Self::WindSpeed,
        Self::NetSolar,
        Self::IncomingThermal,
        Self::SoilTemp,
        Self::PrecipMass,
        Self::PercentSnow,
        Self::RhoSnow,
        Self::PrecipTemp,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::AirTemp => "t_a",
            Self::VaporPressure => "e_a",
            Self::WindSpeed => "u",
            Self::NetSolar => "s_n",
            Self::IncomingThermal => "i_lw",
            Self::SoilTemp => "t_g",
            Self::PrecipMass => "m_pp",
            Self::PercentSnow => "percent_snow",
            Self::RhoSnow => "rho_snow",
            Self::PrecipTemp => "t_pp",
        }
    }

    fn index(self) -> usize {
        self as usize
    }

    fn apply(self, record: &mut ForcingRecord, value: f64) {
        match self {
            Self::AirTemp => record.t_a = value,
            Self::VaporPressure => record.e_a = value,
            Self::WindSpeed => record.u = value,
            Self::NetSolar => record.s_n = value,
            Self::IncomingThermal => record.i_lw = value,
            Self::SoilTemp => record.t_g = value,
            Self::PrecipMass => record.m_pp = value,
            Self::PercentSnow => record.percent_snow = value,
            Self::RhoSnow => record.rho_snow = value,
            Self::PrecipTemp => record.t_pp = value,
        }
    }
}

/// One variable's values for every unit at one timestamp.
#[derive(Clone, Debug)]
pub struct VariableFrame {
    pub timestamp: DateTime<Utc>,
    pub values: Vec<f64>,
}

/// Producer-side handles for a real-time run: one sender per forcing
/// variable, plus the receiver of per-timestep acknowledgments.
pub struct RealtimeHandles {
    pub senders: Vec<(ForcingVariable, Sender<VariableFrame>)>,
    pub acks: Receiver<DateTime<Utc>>,
}

/// Blocking incremental source fed by concurrent producers.
///
/// `fetch` waits indefinitely for every variable at the requested
/// timestamp. A missing or late variable shows up as blocking, not as a
/// timeout; that is the intended suspension point of real-time runs. A
/// dropped producer turns the wait into [`EngineError::SourceExhausted`].
///
/// Frames ahead of the requested timestamp are buffered per variable and
/// served once their timestamp is fetched. Buffered entries for timestamps
/// the driver never asks for stay in memory for the life of the source.
pub struct RealtimeSource {
    n_units: usize,
    receivers: Vec<(ForcingVariable, Receiver<VariableFrame>)>,
    pending: Vec<BTreeMap<DateTime<Utc>, Vec<f64>>>,
    ack: Sender<DateTime<Utc>>,
}

impl RealtimeSource {
    /// Create the source together with the handles its producers need.
    pub fn channel(n_units: usize) -> (RealtimeSource, RealtimeHandles) {
        let mut senders = Vec::with_capacity(ForcingVariable::ALL.len());
        let mut receivers = Vec::with_capacity(ForcingVariable::ALL.len());
        for var in ForcingVariable::ALL {
            let (tx, rx) = unbounded();
            senders.push((var, tx));
            receivers.push((var, rx));
        }
        let (ack_tx, ack_rx) = unbounded();
        let source = RealtimeSource {
            n_units,
            receivers,
            pending: vec![BTreeMap::new(); ForcingVariable::ALL.len()],
            ack: ack_tx,
        };
        let handles = RealtimeHandles {
            senders,
            acks: ack_rx,
        };
        (source, handles)
    }
}

impl ForcingSource for RealtimeSource {
    fn fetch(&mut self, timestamp: DateTime<Utc>) -> EngineResult<Vec<ForcingRecord>> {
        let mut records = vec![ForcingRecord::default(); self.n_units];
        for (var, rx) in &self.receivers {
            let slot = &mut self.pending[var.index()];
            let values = loop {
                if let Some(values) = slot.remove(&timestamp) {
                    break values;
                }
                match rx.recv() {
                    Ok(frame) => {
                        slot.insert(frame.timestamp, frame.values);
                    }
                    Err(_) => return Err(EngineError::SourceExhausted { timestamp }),
                }
            };
            if values.len() != self.n_units {
                return Err(EngineError::FrameMismatch {
                    timestamp,
                    expected: self.n_units,
                    found: values.len(),
                });
            }
            for (record, value) in records.iter_mut().zip(values) {
                var.apply(record, value);
            }
        }
        debug!(%timestamp, "forcing frame assembled");
        Ok(records)
    }

    fn acknowledge(&mut self, timestamp: DateTime<Utc>) -> EngineResult<()> {
        // A departed downstream consumer is not an error; the ack is
        // advisory.
        let _ = self.ack.send(timestamp);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn t(h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, h, 0, 0).unwrap()
    }

    #[test]
    fn archive_fetch_and_miss() {
        let mut src = ArchiveSource::new();
        src.insert(t(0), vec![ForcingRecord::default()]);
        assert_eq!(src.fetch(t(0)).unwrap().len(), 1);
        assert!(matches!(
            src.fetch(t(1)),
            Err(EngineError::ForcingUnavailable { .. })
        ));
    }

    #[test]
    fn archive_timestamps_are_ordered() {
        let mut src = ArchiveSource::new();
        src.insert(t(2), vec![]);
        src.insert(t(0), vec![]);
        src.insert(t(1), vec![]);
        assert_eq!(src.timestamps(), vec![t(0), t(1), t(2)]);
    }

    #[test]
    fn realtime_assembles_records_from_all_variables() {
        let (mut src, handles) = RealtimeSource::channel(2);
        for (var, tx) in &handles.senders {
            let value = var.index() as f64;
            tx.send(VariableFrame {
                timestamp: t(0),
                values: vec![value, value + 100.0],
            })
            .unwrap();
        }
        let records = src.fetch(t(0)).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].t_a, ForcingVariable::AirTemp.index() as f64);
        assert_eq!(
            records[1].t_pp,
            ForcingVariable::PrecipTemp.index() as f64 + 100.0
        );
    }

    #[test]
    fn realtime_buffers_out_of_order_frames() {
        let (mut src, handles) = RealtimeSource::channel(1);
        for (_, tx) in &handles.senders {
            tx.send(VariableFrame {
                timestamp: t(1),
                values: vec![1.0],
            })
            .unwrap();
            tx.send(VariableFrame {
                timestamp: t(0),
                values: vec![0.0],
            })
            .unwrap();
        }
        assert_eq!(src.fetch(t(0)).unwrap()[0].t_a, 0.0);
        assert_eq!(src.fetch(t(1)).unwrap()[0].t_a, 1.0);
    }

    #[test]
    fn narrow_variable_frame_is_rejected() {
        let (mut src, handles) = RealtimeSource::channel(2);
        for (_, tx) in &handles.senders {
            tx.send(VariableFrame {
                timestamp: t(0),
                values: vec![1.0],
            })
            .unwrap();
        }
        assert!(matches!(
            src.fetch(t(0)),
            Err(EngineError::FrameMismatch {
                expected: 2,
                found: 1,
                ..
            })
        ));
    }

    #[test]
    fn dropped_producer_exhausts_the_source() {
        let (mut src, handles) = RealtimeSource::channel(1);
        drop(handles.senders);
        assert!(matches!(
            src.fetch(t(0)),
            Err(EngineError::SourceExhausted { .. })
        ));
    }

    #[test]
    fn acknowledgments_reach_the_consumer() {
        let (mut src, handles) = RealtimeSource::channel(1);
        src.acknowledge(t(0)).unwrap();
        assert_eq!(handles.acks.recv().unwrap(), t(0));
    }
}
