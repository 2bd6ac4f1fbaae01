//! Physical constants and unit conversions shared across the workspace.
//!
//! All state and forcing fields are SI: temperatures in Kelvin, masses in
//! kg/m^2, energy fluxes in W/m^2, durations in seconds.

/// Melting point of water, K (0 C).
pub const FREEZE: f64 = 273.16;

/// Kelvin to Celsius.
pub fn k_to_c(t: f64) -> f64 {
    t - FREEZE
}

/// Celsius to Kelvin.
pub fn c_to_k(t: f64) -> f64 {
    t + FREEZE
}

/// Minutes to seconds.
pub fn min_to_sec(minutes: f64) -> f64 {
    minutes * 60.0
}

/// Hours to minutes.
pub fn hrs_to_min(hours: f64) -> f64 {
    hours * 60.0
}

/// Seconds to hours.
pub fn sec_to_hr(seconds: f64) -> f64 {
    seconds / 3600.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn temperature_round_trip() {
        assert_eq!(k_to_c(FREEZE), 0.0);
        assert_eq!(c_to_k(0.0), FREEZE);
        assert_eq!(c_to_k(k_to_c(300.0)), 300.0);
    }

    #[test]
    fn duration_conversions() {
        assert_eq!(min_to_sec(60.0), 3600.0);
        assert_eq!(hrs_to_min(6.0), 360.0);
        assert_eq!(sec_to_hr(7200.0), 2.0);
    }
}
