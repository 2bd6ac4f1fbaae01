//! Flat CSV output for point runs.
//!
//! One comma-separated line per emission, in the fixed legacy column
//! order: elapsed time in hours, energy budget averages, layer energy
//! terms, heat storage, mass change sums, then snow properties. No
//! header row.

use std::io::Write;

use chrono::{DateTime, Utc};

use sf_engine::{EngineResult, OutputSink, PixelSnapshot};

use crate::ResultsResult;

const SEC_TO_HR: f64 = 1.0 / 3600.0;

pub struct PointWriter<W: Write> {
    out: W,
}

impl<W: Write> PointWriter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    /// Write one record. Temperatures are written as captured; whether
    /// they are Celsius or Kelvin was decided at snapshot time.
    pub fn write_record(&mut self, snap: &PixelSnapshot) -> ResultsResult<()> {
        let em = &snap.em;
        let sn = &snap.snow;
        write!(self.out, "{},", snap.current_time * SEC_TO_HR)?;
        write!(
            self.out,
            "{:.3},{:.3},{:.3},{:.3},{:.3},{:.3},",
            em.r_n_bar, em.h_bar, em.l_v_e_bar, em.g_bar, em.m_bar, em.delta_q_bar
        )?;
        write!(self.out, "{:.3},{:.3},", em.g_0_bar, em.delta_q_0_bar)?;
        write!(
            self.out,
            "{:.9e},{:.9e},{:.9e},",
            em.cc_s_0, em.cc_s_l, em.cc_s
        )?;
        write!(
            self.out,
            "{:.8},{:.8},{:.8},",
            em.e_s_sum, em.melt_sum, em.ro_pred_sum
        )?;
        write!(
            self.out,
            "{:.6},{:.6},{:.6},{:.3},",
            sn.z_s_0, sn.z_s_l, sn.z_s, sn.rho
        )?;
        write!(
            self.out,
            "{:.3},{:.3},{:.3},{:.3},",
            sn.m_s_0, sn.m_s_l, sn.m_s, sn.h2o
        )?;
        writeln!(self.out, "{:.5},{:.5},{:.5}", sn.t_s_0, sn.t_s_l, sn.t_s)?;
        Ok(())
    }

    pub fn flush(&mut self) -> ResultsResult<()> {
        self.out.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> OutputSink for PointWriter<W> {
    fn emit(&mut self, _timestamp: DateTime<Utc>, snapshots: &[PixelSnapshot]) -> EngineResult<()> {
        for snap in snapshots {
            self.write_record(snap)?;
        }
        self.flush()?;
        Ok(())
    }
}
