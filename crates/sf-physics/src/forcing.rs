//! Meteorological forcing records.

use serde::{Deserialize, Serialize};

use sf_core::consts::FREEZE;

use crate::error::{PhysicsError, PhysicsResult};

/// One timestamped set of meteorological inputs for one simulation unit.
///
/// SI units throughout: temperatures in Kelvin, vapor pressure in Pa, wind
/// in m/s, radiation in W/m^2, precipitation mass in kg/m^2 over the
/// record's interval, precipitation density in kg/m^3.
///
/// Two consecutive records bracket one data timestep. The continuous
/// variables are interpolated linearly across sub-steps; the precipitation
/// variables belong to the interval they fall in and are split across
/// sub-steps by duration, never interpolated.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ForcingRecord {
    /// Air temperature (K).
    pub t_a: f64,
    /// Vapor pressure (Pa).
    pub e_a: f64,
    /// Wind speed (m/s).
    pub u: f64,
    /// Net solar radiation (W/m^2).
    pub s_n: f64,
    /// Incoming thermal (longwave) radiation (W/m^2).
    pub i_lw: f64,
    /// Soil/ground temperature (K).
    pub t_g: f64,
    /// Precipitation mass over the interval (kg/m^2).
    pub m_pp: f64,
    /// Fraction of precipitation mass falling as snow, [0, 1].
    pub percent_snow: f64,
    /// Density of the snow fraction (kg/m^3).
    pub rho_snow: f64,
    /// Precipitation temperature (K).
    pub t_pp: f64,
}

impl ForcingRecord {
    /// Linearly interpolate the continuous variables between `self` and
    /// `other` at `frac` in [0, 1]. Precipitation fields are copied from
    /// `self` untouched; assigning the sub-step's share is the caller's
    /// job (see [`ForcingRecord::precip_share`]).
    pub fn lerp(&self, other: &ForcingRecord, frac: f64) -> ForcingRecord {
        let lin = |a: f64, b: f64| a + (b - a) * frac;
        ForcingRecord {
            t_a: lin(self.t_a, other.t_a),
            e_a: lin(self.e_a, other.e_a),
            u: lin(self.u, other.u),
            s_n: lin(self.s_n, other.s_n),
            i_lw: lin(self.i_lw, other.i_lw),
            t_g: lin(self.t_g, other.t_g),
            m_pp: self.m_pp,
            percent_snow: self.percent_snow,
            rho_snow: self.rho_snow,
            t_pp: self.t_pp,
        }
    }

    /// Replace the precipitation mass with this sub-step's duration share
    /// of the interval total. Phase fraction, density and temperature are
    /// held constant, so the shares of all sub-steps sum exactly to the
    /// interval's mass.
    pub fn precip_share(&self, fraction: f64) -> ForcingRecord {
        ForcingRecord {
            m_pp: self.m_pp * fraction,
            ..*self
        }
    }

    /// Rain cannot fall below freezing: when liquid mass is present, the
    /// precipitation temperature is floored at the melting point.
    pub fn warm_rain_floor(&mut self) {
        let mass_rain = self.m_pp * (1.0 - self.percent_snow);
        if mass_rain > 0.0 && self.t_pp < FREEZE {
            self.t_pp = FREEZE;
        }
    }

    /// Check that the record is usable by a snow model.
    pub fn validate(&self) -> PhysicsResult<()> {
        for (what, value) in [
            ("air temperature", self.t_a),
            ("vapor pressure", self.e_a),
            ("wind speed", self.u),
            ("net solar", self.s_n),
            ("incoming thermal", self.i_lw),
            ("soil temperature", self.t_g),
            ("precip mass", self.m_pp),
            ("percent snow", self.percent_snow),
            ("precip density", self.rho_snow),
            ("precip temperature", self.t_pp),
        ] {
            if !value.is_finite() {
                return Err(PhysicsError::NonFinite { what, value });
            }
        }
        if self.m_pp < 0.0 {
            return Err(PhysicsError::NonPhysical {
                what: "negative precipitation mass",
            });
        }
        if self.u < 0.0 {
            return Err(PhysicsError::NonPhysical {
                what: "negative wind speed",
            });
        }
        if !(0.0..=1.0).contains(&self.percent_snow) {
            return Err(PhysicsError::NonPhysical {
                what: "percent_snow outside [0, 1]",
            });
        }
        if self.m_pp > 0.0 && self.percent_snow > 0.0 && self.rho_snow <= 0.0 {
            return Err(PhysicsError::NonPhysical {
                what: "snowfall with non-positive density",
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(t_a: f64, m_pp: f64) -> ForcingRecord {
        ForcingRecord {
            t_a,
            e_a: 500.0,
            u: 2.0,
            s_n: 100.0,
            i_lw: 280.0,
            t_g: FREEZE,
            m_pp,
            percent_snow: 1.0,
            rho_snow: 100.0,
            t_pp: FREEZE - 2.0,
        }
    }

    #[test]
    fn lerp_is_linear_in_continuous_fields() {
        let a = rec(270.0, 0.0);
        let b = rec(274.0, 0.0);
        let mid = a.lerp(&b, 0.5);
        assert_eq!(mid.t_a, 272.0);
        assert_eq!(a.lerp(&b, 0.0).t_a, 270.0);
        assert_eq!(a.lerp(&b, 1.0).t_a, 274.0);
    }

    #[test]
    fn lerp_does_not_touch_precip() {
        let a = rec(270.0, 5.0);
        let b = rec(274.0, 0.0);
        let mid = a.lerp(&b, 0.5);
        assert_eq!(mid.m_pp, 5.0);
        assert_eq!(mid.rho_snow, 100.0);
    }

    #[test]
    fn precip_shares_sum_to_total() {
        let a = rec(270.0, 5.0);
        let quarters: f64 = (0..4).map(|_| a.precip_share(0.25).m_pp).sum();
        assert!((quarters - 5.0).abs() < 1e-12);
    }

    #[test]
    fn warm_rain_floored_at_freezing() {
        let mut r = rec(275.0, 3.0);
        r.percent_snow = 0.4;
        r.t_pp = FREEZE - 5.0;
        r.warm_rain_floor();
        assert_eq!(r.t_pp, FREEZE);
    }

    #[test]
    fn cold_snowfall_keeps_its_temperature() {
        let mut r = rec(270.0, 3.0);
        r.warm_rain_floor();
        assert_eq!(r.t_pp, FREEZE - 2.0);
    }

    #[test]
    fn validate_rejects_bad_records() {
        let mut r = rec(270.0, 2.0);
        r.percent_snow = 1.5;
        assert!(r.validate().is_err());

        let mut r = rec(270.0, -1.0);
        r.percent_snow = 1.0;
        assert!(r.validate().is_err());

        let mut r = rec(f64::NAN, 0.0);
        r.m_pp = 0.0;
        assert!(r.validate().is_err());

        assert!(rec(270.0, 2.0).validate().is_ok());
    }
}
