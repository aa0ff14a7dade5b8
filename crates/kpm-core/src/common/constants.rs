//! Physical and numerical constants shared by the spectral kernels and the
//! response pipelines.

/// Boltzmann constant in eV/K.
pub const BOLTZMANN_EV_PER_K: f64 = 8.617_330_3e-5;

/// Largest `|beta (x - mu)|` evaluated through `exp`; beyond it the Fermi
/// occupation is saturated to exactly 0 or 1.
pub const FERMI_EXPONENT_LIMIT: f64 = 700.0;

/// Spin degeneracy assumed when the store does not record one.
pub const DEFAULT_SPIN_DEGENERACY: usize = 1;

#[cfg(test)]
mod tests {
    use super::{BOLTZMANN_EV_PER_K, DEFAULT_SPIN_DEGENERACY, FERMI_EXPONENT_LIMIT};

    #[test]
    fn boltzmann_constant_gives_room_temperature_thermal_energy() {
        let thermal_energy = BOLTZMANN_EV_PER_K * 300.0;
        assert!((thermal_energy - 0.025_851_99).abs() < 1.0e-8);
    }

    #[test]
    fn fermi_exponent_limit_stays_below_f64_overflow() {
        assert!(FERMI_EXPONENT_LIMIT.exp().is_finite());
        assert!((FERMI_EXPONENT_LIMIT + 5.0).exp().is_finite());
        assert!(!(FERMI_EXPONENT_LIMIT * 2.0).exp().is_finite());
        assert_eq!(DEFAULT_SPIN_DEGENERACY, 1);
    }
}
